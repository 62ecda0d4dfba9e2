//! `EvalContext` over Paillier: additions are local, ciphertext products go
//! through the blinded two-party multiplication, and bit extraction is
//! delegated to a `RemoteBitExtractor`.

use std::cell::RefCell;

use anyhow::{ensure, Result};
use rug::Integer;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::{Bound, ContextId, EvalContext};
use crate::{
    add, add_plain, blind_pair, enc, mul_plain, rand_mod_n, unblind_product, Ciphertext,
    PaillierPublicKey, RemoteBitExtractor, RemoteMultiplier,
};

#[cfg(test)]
use std::cell::Cell;

#[cfg(test)]
thread_local! {
    pub static ALLOW_RAW_MULT: Cell<bool> = Cell::new(false);
}

/// Encrypted integer bound to the key it was encrypted under.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncInt {
    pub c: Ciphertext,
    pub ctx: ContextId,
}

impl EncInt {
    pub fn new(c: Ciphertext, ctx: ContextId) -> Self {
        Self { c, ctx }
    }
}

impl Bound for EncInt {
    fn context_id(&self) -> ContextId {
        self.ctx
    }
}

// Fresh-random blinded multiply for two ciphertexts.
pub fn mul_ct_ct(
    pk: &PaillierPublicKey,
    x: &Ciphertext,
    y: &Ciphertext,
    mult: &mut dyn RemoteMultiplier,
) -> Result<Ciphertext> {
    let mut rng = rand::thread_rng();
    let n = pk.n();
    // fresh blinders every call
    let a = rand_mod_n(&n, &mut rng);
    let b = rand_mod_n(&n, &mut rng);
    let (xa, yb) = blind_pair(pk, x, y, &a, &b, &mut rng)?;

    #[cfg(test)]
    let mut prods = ALLOW_RAW_MULT.with(|flag| {
        flag.set(true);
        let r = mult.mult_batch(&[(xa, yb)]);
        flag.set(false);
        r
    })?;

    #[cfg(not(test))]
    let mut prods = mult.mult_batch(&[(xa, yb)])?;

    ensure!(
        prods.len() == 1,
        "multiplier returned {} products for 1 pair",
        prods.len()
    );
    let prod_blinded = prods.remove(0);
    unblind_product(pk, x, y, &prod_blinded, &a, &b)
}

/// Paillier evaluation context. `O` is the counterpart that performs
/// blinded multiplications and bit extractions.
pub struct PaillierContext<O> {
    pk: PaillierPublicKey,
    id: ContextId,
    oracle: RefCell<O>,
}

impl<O> PaillierContext<O>
where
    O: RemoteMultiplier + RemoteBitExtractor,
{
    pub fn new(pk: PaillierPublicKey, oracle: O) -> Self {
        let id = ContextId::of_key(&pk);
        Self {
            pk,
            id,
            oracle: RefCell::new(oracle),
        }
    }

    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.pk
    }

    /// Encrypt a caller-side integer under this context's key.
    pub fn encrypt(&self, m: &Integer) -> Result<EncInt> {
        let c = enc(&self.pk, m, &mut rand::thread_rng())?;
        Ok(EncInt::new(c, self.id))
    }

    fn check(&self, v: &EncInt) -> Result<()> {
        ensure!(
            v.ctx == self.id,
            "ciphertext bound to {:?} used with context {:?}",
            v.ctx,
            self.id
        );
        Ok(())
    }
}

impl<O> EvalContext for PaillierContext<O>
where
    O: RemoteMultiplier + RemoteBitExtractor,
{
    type Value = EncInt;

    fn id(&self) -> ContextId {
        self.id
    }

    fn encrypt_const(&self, k: i64) -> Result<EncInt> {
        self.encrypt(&Integer::from(k))
    }

    fn add(&self, a: &EncInt, b: &EncInt) -> Result<EncInt> {
        self.check(a)?;
        self.check(b)?;
        Ok(EncInt::new(add(&self.pk, &a.c, &b.c), self.id))
    }

    fn mul(&self, a: &EncInt, b: &EncInt) -> Result<EncInt> {
        self.check(a)?;
        self.check(b)?;
        trace!("paillier blinded multiply");
        let mut oracle = self.oracle.borrow_mut();
        let c = mul_ct_ct(&self.pk, &a.c, &b.c, &mut *oracle)?;
        Ok(EncInt::new(c, self.id))
    }

    fn add_plain(&self, a: &EncInt, k: i64) -> Result<EncInt> {
        self.check(a)?;
        let c = add_plain(&self.pk, &a.c, &Integer::from(k))?;
        Ok(EncInt::new(c, self.id))
    }

    fn mul_plain(&self, a: &EncInt, k: i64) -> Result<EncInt> {
        self.check(a)?;
        let c = mul_plain(&self.pk, &a.c, &Integer::from(k))?;
        Ok(EncInt::new(c, self.id))
    }

    fn extract_bits(&self, v: &EncInt, width: usize) -> Result<Vec<EncInt>> {
        self.check(v)?;
        let bits = self.oracle.borrow_mut().extract_bits(&v.c, width)?;
        ensure!(
            bits.len() == width,
            "bit extractor returned {} bits, expected {width}",
            bits.len()
        );
        Ok(bits
            .into_iter()
            .map(|c| EncInt::new(c, self.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{centered, dec, keygen, LocalOracle};

    // Refuses any multiplication that does not come through mul_ct_ct.
    struct GuardedMult(LocalOracle);

    impl RemoteMultiplier for GuardedMult {
        fn mult_batch(&mut self, pairs: &[(Ciphertext, Ciphertext)]) -> Result<Vec<Ciphertext>> {
            let allowed = ALLOW_RAW_MULT.with(|f| f.get());
            assert!(allowed, "ct×ct multiply must go through mul_ct_ct (blinded, uniform Z_n).");
            self.0.mult_batch(pairs)
        }
    }

    impl RemoteBitExtractor for GuardedMult {
        fn extract_bits(&mut self, x: &Ciphertext, width: usize) -> Result<Vec<Ciphertext>> {
            self.0.extract_bits(x, width)
        }
    }

    fn setup() -> (PaillierContext<GuardedMult>, crate::PaillierPrivateKey) {
        let (pk, sk) = keygen(512, &mut rand::thread_rng()).unwrap();
        let oracle = LocalOracle::new(pk.clone(), sk.clone());
        (PaillierContext::new(pk, GuardedMult(oracle)), sk)
    }

    fn reveal(ctx: &PaillierContext<GuardedMult>, sk: &crate::PaillierPrivateKey, v: &EncInt) -> Integer {
        centered(dec(sk, &v.c).unwrap(), &ctx.public_key().n())
    }

    #[test]
    fn context_arithmetic_matches_integers() {
        let (ctx, sk) = setup();
        let a = ctx.encrypt_const(-7).unwrap();
        let b = ctx.encrypt_const(6).unwrap();
        assert_eq!(reveal(&ctx, &sk, &ctx.add(&a, &b).unwrap()), -1);
        assert_eq!(reveal(&ctx, &sk, &ctx.sub(&a, &b).unwrap()), -13);
        assert_eq!(reveal(&ctx, &sk, &ctx.mul(&a, &b).unwrap()), -42);
        assert_eq!(reveal(&ctx, &sk, &ctx.one_minus(&b).unwrap()), -5);
        assert_eq!(reveal(&ctx, &sk, &ctx.add_plain(&a, 10).unwrap()), 3);
    }

    #[test]
    fn extract_bits_is_lsb_first_twos_complement() {
        let (ctx, sk) = setup();
        let v = ctx.encrypt_const(-3).unwrap();
        let bits: Vec<Integer> = ctx
            .extract_bits(&v, 4)
            .unwrap()
            .iter()
            .map(|b| reveal(&ctx, &sk, b))
            .collect();
        // -3 = 0b1101 in 4-bit two's complement
        assert_eq!(bits, vec![1, 0, 1, 1]);
    }

    #[test]
    fn foreign_ciphertext_is_rejected() {
        let (ctx, _sk) = setup();
        let (other, _) = setup();
        let a = ctx.encrypt_const(1).unwrap();
        let b = other.encrypt_const(1).unwrap();
        let err = ctx.mul(&a, &b).unwrap_err();
        assert!(err.to_string().contains("used with context"));
    }
}
