use sdbcmpcrypto::load_json;
use serde::{Deserialize, Serialize};

use crate::error::{CompareError, CompareResult};

/// Defaults for comparison entry points that take widths and modes from
/// configuration rather than per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Bits extracted per operand in `compare_values`.
    pub bit_width: usize,
    /// Read operands as two's complement.
    pub signed: bool,
    /// Memoized product tree instead of the naive fold for equality.
    pub use_optimization: bool,
    /// Newton steps for reciprocals.
    pub reciprocal_iterations: u32,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            bit_width: 16,
            signed: false,
            use_optimization: true,
            reciprocal_iterations: 3,
        }
    }
}

impl CompareConfig {
    pub fn load(path: &str) -> CompareResult<Self> {
        let cfg: Self = load_json(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CompareResult<()> {
        if self.bit_width == 0 {
            return Err(CompareError::ZeroWidth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: CompareConfig = serde_json::from_str(r#"{ "signed": true }"#).unwrap();
        assert_eq!(
            cfg,
            CompareConfig {
                signed: true,
                ..CompareConfig::default()
            }
        );
    }

    #[test]
    fn load_validates() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("sdbcmp-config-good-{}.json", std::process::id()));
        let bad = dir.join(format!("sdbcmp-config-bad-{}.json", std::process::id()));
        std::fs::write(&good, r#"{ "bit_width": 32, "reciprocal_iterations": 5 }"#).unwrap();
        std::fs::write(&bad, r#"{ "bit_width": 0 }"#).unwrap();

        let cfg = CompareConfig::load(good.to_str().unwrap()).unwrap();
        assert_eq!(cfg.bit_width, 32);
        assert_eq!(cfg.reciprocal_iterations, 5);
        assert!(cfg.use_optimization);
        assert!(matches!(
            CompareConfig::load(bad.to_str().unwrap()),
            Err(CompareError::ZeroWidth)
        ));
        assert!(matches!(
            CompareConfig::load("/nonexistent/sdbcmp.json"),
            Err(CompareError::Context(_))
        ));

        let _ = std::fs::remove_file(good);
        let _ = std::fs::remove_file(bad);
    }
}
