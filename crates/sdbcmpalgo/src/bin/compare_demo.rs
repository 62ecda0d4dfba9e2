//! Compare two integers under a fresh Paillier key, with the local oracle
//! standing in for the key holder, and print the decrypted answer.

use anyhow::{ensure, Result};
use clap::Parser;
use rug::Integer;
use sdbcmpalgo::{compare_values, is_equal, Bits, CompareConfig, ComparisonKind};
use sdbcmpcrypto::{dec, hash_key, keygen, EvalContext, LocalOracle, PaillierContext};
use tracing::info;

#[derive(Parser, Debug)]
struct Opt {
    /// Left operand
    #[arg(long, allow_hyphen_values = true)]
    a: i64,
    /// Right operand
    #[arg(long, allow_hyphen_values = true)]
    b: i64,
    /// One of eq, gt, lt, ge, le
    #[arg(long, default_value = "lt")]
    kind: String,
    /// Bits per operand (overrides the config file)
    #[arg(long)]
    width: Option<usize>,
    /// Two's complement operands
    #[arg(long)]
    signed: bool,
    /// Use the naive fold for equality
    #[arg(long)]
    naive: bool,
    /// JSON CompareConfig
    #[arg(long)]
    config: Option<String>,
    /// Paillier modulus size in bits
    #[arg(long, default_value_t = 512)]
    key_bits: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = Opt::parse();
    let mut cfg = match &opt.config {
        Some(path) => CompareConfig::load(path)?,
        None => CompareConfig::default(),
    };
    if let Some(w) = opt.width {
        cfg.bit_width = w;
    }
    cfg.signed |= opt.signed;
    cfg.use_optimization &= !opt.naive;
    cfg.validate()?;
    let kind: ComparisonKind = opt.kind.parse()?;

    let (pk, sk) = keygen(opt.key_bits, &mut rand::thread_rng())?;
    info!(key = %hash_key(&pk), bits = opt.key_bits, "generated paillier key");
    let ctx = PaillierContext::new(pk.clone(), LocalOracle::new(pk, sk.clone()));

    let x = ctx.encrypt(&Integer::from(opt.a))?;
    let y = ctx.encrypt(&Integer::from(opt.b))?;

    let res = if kind == ComparisonKind::Equal {
        // equality goes through the configured strategy
        let a = Bits::new(ctx.extract_bits(&x, cfg.bit_width)?);
        let b = Bits::new(ctx.extract_bits(&y, cfg.bit_width)?);
        is_equal(&ctx, &a, &b, cfg.use_optimization)?
    } else {
        compare_values(&ctx, &x, &y, cfg.bit_width, kind, cfg.signed)?
    };

    let bit = dec(&sk, &res.c)?;
    ensure!(bit == 0 || bit == 1, "comparison decrypted to non-bit {bit}");
    println!(
        "{} {} {} ({} bits, {}) = {}",
        opt.a,
        kind,
        opt.b,
        cfg.bit_width,
        if cfg.signed { "signed" } else { "unsigned" },
        bit == 1
    );
    Ok(())
}
