//! Cleartext baseline for the comparison circuits.
//!
//! `ClearContext` evaluates exactly the operations an encrypted backend
//! would, on `f64` cleartexts, while keeping the bookkeeping a real scheme
//! imposes: every value is bound to the context that made it, products
//! consume multiplicative depth against a fixed budget, and multiplication
//! counts are recorded so circuit cost can be asserted in tests.

use std::cell::Cell;

use anyhow::{bail, ensure, Result};
use sdbcmpcrypto::context::{ApproxContext, Bound, ContextId, EvalContext};
use sdbcmpcrypto::load_json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearConfig {
    /// Maximum multiplicative depth any value may reach.
    pub depth_budget: u32,
    /// Depth charged to bits produced by `extract_bits`.
    pub extraction_depth: u32,
}

impl Default for ClearConfig {
    fn default() -> Self {
        Self {
            depth_budget: 64,
            extraction_depth: 0,
        }
    }
}

impl ClearConfig {
    pub fn load(path: &str) -> Result<Self> {
        load_json(path)
    }
}

#[derive(Clone, Debug)]
pub struct ClearValue {
    v: f64,
    depth: u32,
    ctx: ContextId,
}

impl ClearValue {
    /// The cleartext this value stands for.
    pub fn reveal(&self) -> f64 {
        self.v
    }

    /// Cleartext rounded to the nearest integer, for bit-valued results.
    pub fn reveal_int(&self) -> i64 {
        self.v.round() as i64
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

impl Bound for ClearValue {
    fn context_id(&self) -> ContextId {
        self.ctx
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearStats {
    pub multiplications: u64,
    pub max_depth: u32,
}

pub struct ClearContext {
    id: ContextId,
    config: ClearConfig,
    stats: Cell<ClearStats>,
}

impl ClearContext {
    pub fn new(config: ClearConfig) -> Self {
        Self {
            id: ContextId::random("sdbcmp-cleartext", &mut rand::thread_rng()),
            config,
            stats: Cell::new(ClearStats::default()),
        }
    }

    pub fn config(&self) -> &ClearConfig {
        &self.config
    }

    /// Fresh (depth 0) value.
    pub fn encrypt(&self, x: f64) -> ClearValue {
        ClearValue {
            v: x,
            depth: 0,
            ctx: self.id,
        }
    }

    pub fn stats(&self) -> ClearStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(ClearStats::default());
    }

    fn check(&self, v: &ClearValue) -> Result<()> {
        ensure!(
            v.ctx == self.id,
            "value bound to {:?} used with context {:?}",
            v.ctx,
            self.id
        );
        Ok(())
    }

    fn derive(&self, v: f64, depth: u32) -> Result<ClearValue> {
        if depth > self.config.depth_budget {
            warn!(depth, budget = self.config.depth_budget, "depth budget exhausted");
            bail!(
                "multiplicative depth {depth} exceeds budget {}",
                self.config.depth_budget
            );
        }
        let mut stats = self.stats.get();
        stats.max_depth = stats.max_depth.max(depth);
        self.stats.set(stats);
        Ok(ClearValue {
            v,
            depth,
            ctx: self.id,
        })
    }
}

impl Default for ClearContext {
    fn default() -> Self {
        Self::new(ClearConfig::default())
    }
}

impl EvalContext for ClearContext {
    type Value = ClearValue;

    fn id(&self) -> ContextId {
        self.id
    }

    fn encrypt_const(&self, k: i64) -> Result<ClearValue> {
        Ok(self.encrypt(k as f64))
    }

    fn add(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearValue> {
        self.check(a)?;
        self.check(b)?;
        self.derive(a.v + b.v, a.depth.max(b.depth))
    }

    fn mul(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearValue> {
        self.check(a)?;
        self.check(b)?;
        let mut stats = self.stats.get();
        stats.multiplications += 1;
        self.stats.set(stats);
        self.derive(a.v * b.v, a.depth.max(b.depth) + 1)
    }

    fn add_plain(&self, a: &ClearValue, k: i64) -> Result<ClearValue> {
        self.check(a)?;
        self.derive(a.v + k as f64, a.depth)
    }

    fn mul_plain(&self, a: &ClearValue, k: i64) -> Result<ClearValue> {
        self.check(a)?;
        self.derive(a.v * k as f64, a.depth)
    }

    fn extract_bits(&self, v: &ClearValue, width: usize) -> Result<Vec<ClearValue>> {
        self.check(v)?;
        ensure!((1..=63).contains(&width), "bit width {width} outside 1..=63");
        let x = v.v.round();
        ensure!(
            x.is_finite() && (x - v.v).abs() < 1e-6,
            "bit extraction of non-integral value {}",
            v.v
        );
        let bits = wrap_u64(x) & ((1u64 << width) - 1);
        let depth = v.depth + self.config.extraction_depth;
        (0..width)
            .map(|i| self.derive(((bits >> i) & 1) as f64, depth))
            .collect()
    }
}

// Finite integral `x` modulo 2^64. At or beyond 2^63 in magnitude `x` is a
// multiple of 2^11, so the remainder is exact in f64.
fn wrap_u64(x: f64) -> u64 {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;
    if x.abs() < TWO_63 {
        x as i64 as u64
    } else {
        x.rem_euclid(2.0 * TWO_63) as u64
    }
}

impl ApproxContext for ClearContext {
    fn encrypt_real(&self, x: f64) -> Result<ClearValue> {
        Ok(self.encrypt(x))
    }

    fn mul_real(&self, a: &ClearValue, x: f64) -> Result<ClearValue> {
        self.check(a)?;
        self.derive(a.v * x, a.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_tracks_depth_and_count() {
        let ctx = ClearContext::default();
        let a = ctx.encrypt(3.0);
        let b = ctx.encrypt(4.0);
        let ab = ctx.mul(&a, &b).unwrap();
        let abb = ctx.mul(&ab, &b).unwrap();
        assert_eq!(abb.reveal(), 48.0);
        assert_eq!(abb.depth(), 2);
        let sum = ctx.add(&abb, &a).unwrap();
        assert_eq!(sum.depth(), 2);
        assert_eq!(
            ctx.stats(),
            ClearStats {
                multiplications: 2,
                max_depth: 2
            }
        );
        ctx.reset_stats();
        assert_eq!(ctx.stats(), ClearStats::default());
    }

    #[test]
    fn depth_budget_is_enforced() {
        let ctx = ClearContext::new(ClearConfig {
            depth_budget: 2,
            ..ClearConfig::default()
        });
        let mut x = ctx.encrypt(1.5);
        x = ctx.mul(&x, &x).unwrap();
        x = ctx.mul(&x, &x).unwrap();
        let err = ctx.mul(&x, &x).unwrap_err();
        assert!(err.to_string().contains("exceeds budget 2"));
    }

    #[test]
    fn values_from_another_context_are_refused() {
        let a = ClearContext::default();
        let b = ClearContext::default();
        let x = a.encrypt(1.0);
        let y = b.encrypt(1.0);
        assert!(a.add(&x, &y).is_err());
        assert!(a.owns(&x));
        assert!(!a.owns(&y));
    }

    #[test]
    fn extract_bits_lsb_first() {
        let ctx = ClearContext::new(ClearConfig {
            extraction_depth: 3,
            ..ClearConfig::default()
        });
        let bits = ctx.extract_bits(&ctx.encrypt(-3.0), 4).unwrap();
        let plain: Vec<i64> = bits.iter().map(|b| b.reveal_int()).collect();
        assert_eq!(plain, vec![1, 0, 1, 1]);
        assert!(bits.iter().all(|b| b.depth() == 3));
        assert!(ctx.extract_bits(&ctx.encrypt(0.5), 4).is_err());
    }

    #[test]
    fn extract_bits_wraps_values_beyond_i64() {
        let ctx = ClearContext::default();
        let plain = |x: f64, w: usize| -> Vec<i64> {
            ctx.extract_bits(&ctx.encrypt(x), w)
                .unwrap()
                .iter()
                .map(|b| b.reveal_int())
                .collect()
        };
        let two_63 = 2f64.powi(63);
        assert_eq!(plain(two_63, 4), vec![0, 0, 0, 0]);
        assert_eq!(plain(-two_63, 4), vec![0, 0, 0, 0]);
        assert_eq!(plain(2f64.powi(64), 4), vec![0, 0, 0, 0]);
        // 2^63 + 2^12 keeps bit 12
        let bits = plain(two_63 + 4096.0, 13);
        assert_eq!(bits[12], 1);
        assert!(bits[..12].iter().all(|&b| b == 0));
        // -2^63 - 2^11 is ...1 1000 0000 0000 below bit 63
        let bits = plain(-two_63 - 2048.0, 13);
        assert_eq!(&bits[11..], &[1, 1]);
        assert!(bits[..11].iter().all(|&b| b == 0));
        assert_eq!(plain(-1.0, 63), vec![1; 63]);
        assert!(ctx.extract_bits(&ctx.encrypt(f64::INFINITY), 4).is_err());
    }

    #[test]
    fn config_loads_from_json_file() {
        let path = std::env::temp_dir().join(format!("sdbcmp-clear-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "depth_budget": 5, "extraction_depth": 2 }"#).unwrap();
        let cfg = ClearConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.depth_budget, 5);
        assert_eq!(cfg.extraction_depth, 2);
        assert!(ClearConfig::load("/nonexistent/sdbcmp-clear.json").is_err());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: ClearConfig = serde_json::from_str(r#"{ "depth_budget": 9 }"#).unwrap();
        assert_eq!(cfg.depth_budget, 9);
        assert_eq!(cfg.extraction_depth, 0);
    }
}
