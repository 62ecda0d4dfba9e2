//! Local, key-holding counterpart for development and tests.
//!
//! It plays the remote party: decrypts the blinded factors of a
//! multiplication (which reveal nothing without the blinders) and, for bit
//! extraction, decrypts the operand itself. The latter LEAKS the operand to
//! whoever runs the oracle.

use anyhow::{ensure, Result};
use rug::Integer;

use crate::{
    centered, dec, enc, Ciphertext, PaillierPrivateKey, PaillierPublicKey, RemoteBitExtractor,
    RemoteMultiplier,
};

/// Bits wider than this are refused; comparison operands are machine words.
pub const MAX_EXTRACT_WIDTH: usize = 128;

pub struct LocalOracle {
    pk: PaillierPublicKey,
    sk: PaillierPrivateKey,
}

impl LocalOracle {
    pub fn new(pk: PaillierPublicKey, sk: PaillierPrivateKey) -> Self {
        Self { pk, sk }
    }

    /// Decrypt to the centered representative in (-n/2, n/2].
    pub fn reveal(&self, c: &Ciphertext) -> Result<Integer> {
        Ok(centered(dec(&self.sk, c)?, &self.pk.n()))
    }
}

impl RemoteMultiplier for LocalOracle {
    fn mult_batch(&mut self, blinded_pairs: &[(Ciphertext, Ciphertext)]) -> Result<Vec<Ciphertext>> {
        let mut rng = rand::thread_rng();
        blinded_pairs
            .iter()
            .map(|(x, y)| {
                let xv = dec(&self.sk, x)?;
                let yv = dec(&self.sk, y)?;
                enc(&self.pk, &(xv * yv), &mut rng)
            })
            .collect()
    }
}

impl RemoteBitExtractor for LocalOracle {
    fn extract_bits(&mut self, x: &Ciphertext, width: usize) -> Result<Vec<Ciphertext>> {
        ensure!(
            (1..=MAX_EXTRACT_WIDTH).contains(&width),
            "bit width {width} outside 1..={MAX_EXTRACT_WIDTH}"
        );
        let v = self.reveal(x)?;
        // two's complement: take v mod 2^width
        let modulus = Integer::from(1) << width as u32;
        let mut r = v % &modulus;
        if r.is_negative() {
            r += &modulus;
        }
        let mut rng = rand::thread_rng();
        (0..width as u32)
            .map(|i| {
                let bit = Integer::from(r.get_bit(i) as u8);
                enc(&self.pk, &bit, &mut rng)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen;

    #[test]
    fn mult_batch_multiplies_each_pair() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let mut oracle = LocalOracle::new(pk.clone(), sk);
        let pairs: Vec<_> = [(3, 4), (-2, 5), (0, 9)]
            .iter()
            .map(|&(x, y)| {
                (
                    enc(&pk, &Integer::from(x), &mut rng).unwrap(),
                    enc(&pk, &Integer::from(y), &mut rng).unwrap(),
                )
            })
            .collect();
        let prods = oracle.mult_batch(&pairs).unwrap();
        let got: Vec<Integer> = prods.iter().map(|c| oracle.reveal(c).unwrap()).collect();
        assert_eq!(got, vec![12, -10, 0]);
    }

    #[test]
    fn extract_bits_wraps_and_checks_width() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let mut oracle = LocalOracle::new(pk.clone(), sk);
        let c = enc(&pk, &Integer::from(12), &mut rng).unwrap();
        let bits: Vec<Integer> = oracle
            .extract_bits(&c, 4)
            .unwrap()
            .iter()
            .map(|b| oracle.reveal(b).unwrap())
            .collect();
        assert_eq!(bits, vec![0, 0, 1, 1]);

        // 17 does not fit in 4 bits and wraps to 1
        let c = enc(&pk, &Integer::from(17), &mut rng).unwrap();
        let bits = oracle.extract_bits(&c, 4).unwrap();
        assert_eq!(oracle.reveal(&bits[0]).unwrap(), 1);
        assert_eq!(oracle.reveal(&bits[3]).unwrap(), 0);

        assert!(oracle.extract_bits(&c, 0).is_err());
        assert!(oracle.extract_bits(&c, MAX_EXTRACT_WIDTH + 1).is_err());
    }
}
