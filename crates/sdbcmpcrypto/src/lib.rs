//! sdbcmp-crypto: minimal Paillier implementation, blinded ciphertext
//! multiplication, and the evaluation-context abstraction the comparison
//! engine is written against.
//!
//! SECURITY NOTE: `LocalOracle` holds the secret key and answers
//! multiplication and bit-extraction requests by decrypting. It exists for
//! bring-up and tests; a deployment puts a remote party behind the
//! `RemoteMultiplier` / `RemoteBitExtractor` traits instead.

use anyhow::{anyhow, Result};
use rand::RngCore;
use rug::integer::Order;
use rug::Integer;
use serde::{Deserialize, Serialize};

pub mod context;
pub mod oracle;
pub mod paillier;

pub use context::{ApproxContext, Bound, ContextId, EvalContext};
pub use oracle::LocalOracle;
pub use paillier::{mul_ct_ct, EncInt, PaillierContext};

// ---------------- Paillier core ----------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaillierPublicKey {
    #[serde(with = "serde_bytes")]
    pub n: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n2: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaillierPrivateKey {
    #[serde(with = "serde_bytes")]
    pub lambda: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub mu: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n2: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl PaillierPublicKey {
    pub fn n(&self) -> Integer {
        int_from_be(&self.n)
    }
    pub fn n2(&self) -> Integer {
        int_from_be(&self.n2)
    }
}

impl PaillierPrivateKey {
    pub fn n(&self) -> Integer {
        int_from_be(&self.n)
    }
    pub fn n2(&self) -> Integer {
        int_from_be(&self.n2)
    }
    pub fn lambda(&self) -> Integer {
        int_from_be(&self.lambda)
    }
    pub fn mu(&self) -> Integer {
        int_from_be(&self.mu)
    }
}

#[inline]
fn int_from_be(bytes: &[u8]) -> Integer {
    Integer::from_digits(bytes, Order::MsfBe)
}

#[inline]
fn int_to_be(i: &Integer) -> Vec<u8> {
    i.to_digits::<u8>(Order::MsfBe)
}

/// Canonical representative of `z` in `[0, n)`.
pub fn reduce_mod(z: Integer, n: &Integer) -> Integer {
    let mut r = z % n;
    if r.is_negative() {
        r += n;
    }
    r
}

/// Map a residue in `[0, n)` to its centered representative in `(-n/2, n/2]`.
pub fn centered(v: Integer, n: &Integer) -> Integer {
    let mut half_n = n.clone();
    half_n >>= 1;
    if v > half_n {
        v - n
    } else {
        v
    }
}

/// Uniform non-negative integer in `[0, 2^bits)`.
pub fn rand_int_bits(bits: usize, rng: &mut impl RngCore) -> Integer {
    if bits == 0 {
        return Integer::new();
    }
    let nbytes = (bits + 7) / 8;
    let mut bytes = vec![0u8; nbytes];
    rng.fill_bytes(&mut bytes);
    // mask off any extra MSBs so the value < 2^bits
    let excess = 8 * nbytes - bits;
    if excess > 0 {
        bytes[0] &= 0xFFu8 >> excess;
    }
    Integer::from_digits(&bytes, Order::MsfBe)
}

/// Uniform element of `Z_n` by rejection sampling.
pub fn rand_mod_n(n: &Integer, rng: &mut impl RngCore) -> Integer {
    let bits = n.significant_bits() as usize;
    loop {
        let c = rand_int_bits(bits, rng);
        if &c < n {
            return c;
        }
    }
}

// Non-zero randomizer r in Z_n for encryption / rerandomization.
fn rand_unit(n: &Integer, rng: &mut impl RngCore) -> Integer {
    loop {
        let r = rand_mod_n(n, rng);
        if r != 0 {
            return r;
        }
    }
}

pub fn keygen(
    bits: u32,
    rng: &mut impl RngCore,
) -> Result<(PaillierPublicKey, PaillierPrivateKey)> {
    use rug::integer::IsPrime;
    if bits < 64 {
        return Err(anyhow!("paillier modulus must be at least 64 bits, got {bits}"));
    }
    let half = bits / 2;
    let mut gen_prime = |bits: u32| -> Integer {
        loop {
            let mut bytes = vec![0u8; (bits as usize + 7) / 8];
            rng.fill_bytes(&mut bytes);
            // force top bit and odd
            if let Some(b) = bytes.first_mut() {
                *b |= 0x80;
            }
            if let Some(b) = bytes.last_mut() {
                *b |= 1;
            }
            let mut p = Integer::from_digits(&bytes, Order::MsfBe);
            p.next_prime_mut();
            if p.is_probably_prime(25) != IsPrime::No {
                return p;
            }
        }
    };
    let p = gen_prime(half);
    let mut q = gen_prime(half);
    while q == p {
        q = gen_prime(half);
    }
    let n: Integer = (&p * &q).into();
    let n2: Integer = (&n * &n).into();
    let lambda = lcm(&(p - 1), &(q - 1));
    let g: Integer = n.clone() + 1;

    // mu = (L(g^lambda mod n^2))^{-1} mod n
    let gl = g
        .pow_mod(&lambda, &n2)
        .map_err(|_| anyhow!("g^lambda mod n^2 undefined"))?;
    let mu = l_fn(&gl, &n)
        .invert(&n)
        .map_err(|_| anyhow!("L(g^lambda) is not invertible mod n"))?;

    let pk = PaillierPublicKey {
        n: int_to_be(&n),
        n2: int_to_be(&n2),
    };
    let sk = PaillierPrivateKey {
        lambda: int_to_be(&lambda),
        mu: int_to_be(&mu),
        n: pk.n.clone(),
        n2: pk.n2.clone(),
    };
    Ok((pk, sk))
}

// L(u) = (u - 1) / n
fn l_fn(u: &Integer, n: &Integer) -> Integer {
    let mut t = u.clone();
    t -= 1;
    t / n
}

fn lcm(a: &Integer, b: &Integer) -> Integer {
    let g = a.clone().gcd(b);
    let prod: Integer = (a * b).into();
    prod / g
}

/// Encrypt `m` (reduced mod n, so negative inputs wrap to `n - |m|`).
pub fn enc(pk: &PaillierPublicKey, m: &Integer, rng: &mut impl RngCore) -> Result<Ciphertext> {
    let n = pk.n();
    let n2 = pk.n2();
    let r = rand_unit(&n, rng);
    let g: Integer = n.clone() + 1;
    let m = reduce_mod(m.clone(), &n);
    let gm = g
        .pow_mod(&m, &n2)
        .map_err(|_| anyhow!("g^m mod n^2 undefined"))?;
    let rn = r
        .pow_mod(&n, &n2)
        .map_err(|_| anyhow!("r^n mod n^2 undefined"))?;
    let c = (gm * rn) % &n2;
    Ok(Ciphertext(int_to_be(&c)))
}

pub fn dec(sk: &PaillierPrivateKey, c: &Ciphertext) -> Result<Integer> {
    let n = sk.n();
    let n2 = sk.n2();
    let ci = int_from_be(&c.0);
    let u = ci
        .pow_mod(&sk.lambda(), &n2)
        .map_err(|_| anyhow!("c^lambda mod n^2 undefined"))?;
    Ok((l_fn(&u, &n) * sk.mu()) % &n)
}

pub fn add(pk: &PaillierPublicKey, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    let n2 = pk.n2();
    let ai = int_from_be(&a.0);
    let bi = int_from_be(&b.0);
    Ciphertext(int_to_be(&((ai * bi) % n2)))
}

pub fn add_plain(pk: &PaillierPublicKey, a: &Ciphertext, k: &Integer) -> Result<Ciphertext> {
    let n = pk.n();
    let n2 = pk.n2();
    let ai = int_from_be(&a.0);
    let g: Integer = n.clone() + 1;
    let k = reduce_mod(k.clone(), &n);
    let ek = g
        .pow_mod(&k, &n2)
        .map_err(|_| anyhow!("g^k mod n^2 undefined"))?;
    Ok(Ciphertext(int_to_be(&((ai * ek) % n2))))
}

pub fn mul_plain(pk: &PaillierPublicKey, a: &Ciphertext, k: &Integer) -> Result<Ciphertext> {
    let n = pk.n();
    let n2 = pk.n2();
    let ai = int_from_be(&a.0);
    // exponentiate by k modulo n^2 (negative k handled via mod n)
    let kk = reduce_mod(k.clone(), &n);
    let c = ai
        .pow_mod(&kk, &n2)
        .map_err(|_| anyhow!("c^k mod n^2 undefined"))?;
    Ok(Ciphertext(int_to_be(&c)))
}

pub fn rerandomize(pk: &PaillierPublicKey, a: &Ciphertext, rng: &mut impl RngCore) -> Result<Ciphertext> {
    let n = pk.n();
    let n2 = pk.n2();
    let r = rand_unit(&n, rng);
    let ri = r
        .pow_mod(&n, &n2)
        .map_err(|_| anyhow!("r^n mod n^2 undefined"))?;
    let ai = int_from_be(&a.0);
    Ok(Ciphertext(int_to_be(&((ai * ri) % n2))))
}

pub fn hash_key(pk: &PaillierPublicKey) -> String {
    ContextId::of_key(pk).to_string()
}

// ------------- Protocol helper traits -------------

/// Interface for sending blinded pairs to a counterpart for
/// ciphertext×ciphertext multiplication. Each returned ciphertext encrypts
/// the product of the plaintexts of the corresponding pair.
pub trait RemoteMultiplier {
    fn mult_batch(&mut self, blinded_pairs: &[(Ciphertext, Ciphertext)])
        -> Result<Vec<Ciphertext>>;
}

/// Interface for decomposing an encrypted integer into `width` encrypted
/// bits, least-significant first, in two's complement. Values outside the
/// width wrap.
pub trait RemoteBitExtractor {
    fn extract_bits(&mut self, x: &Ciphertext, width: usize) -> Result<Vec<Ciphertext>>;
}

/// Client-side blinding for secure multiplication: returns `(E(x + a), E(y + b))`.
pub fn blind_pair(
    pk: &PaillierPublicKey,
    x: &Ciphertext,
    y: &Ciphertext,
    a: &Integer,
    b: &Integer,
    rng: &mut impl RngCore,
) -> Result<(Ciphertext, Ciphertext)> {
    let enc_a = enc(pk, a, rng)?;
    let enc_b = enc(pk, b, rng)?;
    Ok((add(pk, x, &enc_a), add(pk, y, &enc_b)))
}

/// Client-side unblinding: `E(xy)` from `E((x + a)(y + b))`, `E(x)`, `E(y)` and the blinders.
pub fn unblind_product(
    pk: &PaillierPublicKey,
    x: &Ciphertext,
    y: &Ciphertext,
    prod_blinded: &Ciphertext,
    a: &Integer,
    b: &Integer,
) -> Result<Ciphertext> {
    // xy = (x + a)(y + b) - b x - a y - ab
    let nb: Integer = (-b).into();
    let na: Integer = (-a).into();
    let ab: Integer = (a * b).into();
    let nab: Integer = (-ab).into();

    let term2 = mul_plain(pk, x, &nb)?;
    let term3 = mul_plain(pk, y, &na)?;
    let tmp = add(pk, &add(pk, prod_blinded, &term2), &term3);
    add_plain(pk, &tmp, &nab)
}

// --- Simple JSON (de)serialization helpers for keys and configs ---

pub fn save_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn load_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T> {
    let data = std::fs::read(path)
        .map_err(|e| anyhow!("failed to read {path}: {e}"))?;
    Ok(serde_json::from_slice(&data)?)
}

// ------------------- Tests -------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn paillier_add_mul_plain_roundtrip() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let n = pk.n();

        for _ in 0..30 {
            let a: i64 = rng.gen_range(-1_000_000..1_000_000);
            let b: i64 = rng.gen_range(-1_000_000..1_000_000);
            let ca = enc(&pk, &Integer::from(a), &mut rng).unwrap();
            let cb = enc(&pk, &Integer::from(b), &mut rng).unwrap();
            // Homomorphic add: Dec(E(a) * E(b)) == (a + b) mod n
            let sum_dec = dec(&sk, &add(&pk, &ca, &cb)).unwrap();
            let sum_exp = reduce_mod(Integer::from(a) + Integer::from(b), &n);
            assert_eq!(sum_dec, sum_exp, "add: Dec(E(a)+E(b)) != (a+b) mod n");
            // Scalar multiply: Dec(E(a)^k) == (a * k) mod n
            let k: i64 = rng.gen_range(-1000..1000);
            let prod_dec = dec(&sk, &mul_plain(&pk, &ca, &Integer::from(k)).unwrap()).unwrap();
            let prod_exp = reduce_mod(Integer::from(a) * Integer::from(k), &n);
            assert_eq!(prod_dec, prod_exp, "mul_plain: Dec(E(a)^k) != (a*k) mod n");
        }
    }

    #[test]
    fn add_plain_and_rerandomize_preserve_plaintext() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let c = enc(&pk, &Integer::from(41), &mut rng).unwrap();
        let c1 = add_plain(&pk, &c, &Integer::from(-42)).unwrap();
        assert_eq!(centered(dec(&sk, &c1).unwrap(), &pk.n()), -1);

        let c2 = rerandomize(&pk, &c, &mut rng).unwrap();
        assert_ne!(c, c2);
        assert_eq!(dec(&sk, &c2).unwrap(), 41);
    }

    #[test]
    fn blind_unblind_product() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let n = pk.n();

        let x = Integer::from(12345);
        let y = Integer::from(-54321);
        let ex = enc(&pk, &x, &mut rng).unwrap();
        let ey = enc(&pk, &y, &mut rng).unwrap();
        let a = Integer::from(777);
        let b = Integer::from(-333);
        let (xa, yb) = blind_pair(&pk, &ex, &ey, &a, &b, &mut rng).unwrap();
        // the multiplying party only ever sees the blinded plaintexts
        let xa_p = dec(&sk, &xa).unwrap();
        let yb_p = dec(&sk, &yb).unwrap();
        let prod_blinded = enc(&pk, &Integer::from(&xa_p * &yb_p), &mut rng).unwrap();
        let xy = unblind_product(&pk, &ex, &ey, &prod_blinded, &a, &b).unwrap();
        let xy_exp = reduce_mod(Integer::from(&x * &y), &n);
        assert_eq!(dec(&sk, &xy).unwrap(), xy_exp, "unblind_product: Dec != (x*y) mod n");
    }

    #[test]
    fn keygen_rejects_tiny_modulus() {
        assert!(keygen(32, &mut rand::thread_rng()).is_err());
    }

    #[test]
    fn key_json_roundtrip_keeps_hash() {
        let (pk, _sk) = keygen(256, &mut rand::thread_rng()).unwrap();
        let path = std::env::temp_dir().join(format!("sdbcmp-pk-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        save_json(&path, &pk).unwrap();
        let loaded: PaillierPublicKey = load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(hash_key(&pk), hash_key(&loaded));
    }
}
