//! Evaluation-context abstraction.
//!
//! An `EvalContext` is the shared, read-mostly handle holding scheme
//! parameters and evaluation keys. Every encrypted value it produces is bound
//! to it through a `ContextId`; values from different contexts must never be
//! combined. All operations take `&self` and return fresh values.

use std::fmt;

use anyhow::Result;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::PaillierPublicKey;

/// Identity of an evaluation context: a 32-byte digest of its public
/// parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub [u8; 32]);

impl ContextId {
    /// Id of a Paillier context: BLAKE3 over the public modulus.
    pub fn of_key(pk: &PaillierPublicKey) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(&pk.n);
        h.update(&pk.n2);
        Self(*h.finalize().as_bytes())
    }

    /// Fresh id for contexts that have no public key material.
    pub fn random(label: &str, rng: &mut impl RngCore) -> Self {
        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);
        let mut h = blake3::Hasher::new();
        h.update(label.as_bytes());
        h.update(&nonce);
        Self(*h.finalize().as_bytes())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough to tell contexts apart in logs
        write!(f, "ContextId(")?;
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// A value that knows which evaluation context produced it.
pub trait Bound {
    fn context_id(&self) -> ContextId;
}

/// Homomorphic operations the comparison engine consumes.
///
/// Implementations fail loudly (return `Err`) when they cannot evaluate an
/// operation, e.g. when a depth budget is exhausted or a remote party
/// refuses; callers propagate those errors unchanged.
pub trait EvalContext {
    type Value: Clone + Bound;

    fn id(&self) -> ContextId;

    /// Fresh encryption of a small integer constant, bound to this context.
    fn encrypt_const(&self, k: i64) -> Result<Self::Value>;

    fn add(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    /// Ciphertext × ciphertext multiplication. Consumes one level of
    /// multiplicative depth.
    fn mul(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    fn add_plain(&self, a: &Self::Value, k: i64) -> Result<Self::Value>;

    fn mul_plain(&self, a: &Self::Value, k: i64) -> Result<Self::Value>;

    /// Decompose an encrypted integer into `width` encrypted bits, least
    /// significant first, two's complement.
    fn extract_bits(&self, v: &Self::Value, width: usize) -> Result<Vec<Self::Value>>;

    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        let neg_b = self.mul_plain(b, -1)?;
        self.add(a, &neg_b)
    }

    /// `1 - a`, using only plaintext operations.
    fn one_minus(&self, a: &Self::Value) -> Result<Self::Value> {
        let neg_a = self.mul_plain(a, -1)?;
        self.add_plain(&neg_a, 1)
    }

    fn owns(&self, v: &Self::Value) -> bool {
        v.context_id() == self.id()
    }
}

/// Contexts whose plaintext space holds approximate reals (CKKS-like).
pub trait ApproxContext: EvalContext {
    fn encrypt_real(&self, x: f64) -> Result<Self::Value>;

    fn mul_real(&self, a: &Self::Value, x: f64) -> Result<Self::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_differ() {
        let mut rng = rand::thread_rng();
        let a = ContextId::random("ctx", &mut rng);
        let b = ContextId::random("ctx", &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_full_hex() {
        let id = ContextId([0xab; 32]);
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert!(s.starts_with("abab"));
        assert_eq!(format!("{id:?}"), "ContextId(abababababab..)");
    }
}
