//! Logarithms by normalized Taylor expansion.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::super::basic::{add, mul, neg, sub};
use super::super::factory::{make_constant, make_constant_f64};
use super::super::{Context, LogMode, Value};
use super::{bit_floor_factor, polynomial};

const LN_2: f64 = std::f64::consts::LN_2;
const LOG2_E: f64 = std::f64::consts::LOG2_E;
const LOG10_E: f64 = std::f64::consts::LOG10_E;

/// Splits a positive value into `(g, h)` with `x = g * 2^h`, `g` in
/// `[0.5, 1)` and `h` an integer value.
fn log2_dec<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    input: &Value<K, true>,
) -> Result<(Value<K, true>, Value<K, true>)> {
    let fracbits = ctx.fxp_fracbits() as i64;
    let (aligned, factor, h1bits) = bit_floor_factor(ctx, input)?;

    // x_norm = x / (2 * bitfloor(x)), in [0.5, 1)
    let x_norm = mul(ctx, &aligned, &factor)?;

    // log2(bitfloor(x)) = sum_i h1bit_i * (i - fracbits)
    let mut log2_bitfloor = make_constant(ctx, 0, input.shape())?;
    for (i, bit) in h1bits.iter().enumerate() {
        let weight = make_constant(ctx, i as i64 - fracbits, input.shape())?;
        let term = mul(ctx, bit, &weight)?;
        log2_bitfloor = add(ctx, &log2_bitfloor, &term)?;
    }

    let one = make_constant(ctx, 1, input.shape())?;
    let h = add(ctx, &one, &log2_bitfloor)?;
    Ok((x_norm, h))
}

/// `ln(x)` for `x` in `(0, 2]` via `ln(1 - t) = -(t + t^2/2 + ...)`.
fn log_taylor_core<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_log_iters.max(2) as usize;

    let mut coef = Vec::with_capacity(n_iters);
    coef.push(make_constant(ctx, 0, x.shape())?);
    coef.push(make_constant(ctx, 1, x.shape())?);
    for i in 2..n_iters {
        coef.push(make_constant_f64(ctx, 1.0 / i as f64, x.shape())?);
    }

    let one = make_constant(ctx, 1, x.shape())?;
    let t = sub(ctx, &one, x)?;
    let series = polynomial(ctx, &coef, &t)?;
    neg(ctx, &series)
}

fn log_taylor<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let (g, h) = log2_dec(ctx, x)?;
    let ln2 = make_constant_f64(ctx, LN_2, x.shape())?;
    let ln_g = log_taylor_core(ctx, &g)?;
    let scaled_h = mul(ctx, &ln2, &h)?;
    add(ctx, &ln_g, &scaled_h)
}

/// Natural logarithm of a positive value.
pub fn log<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    match ctx.config().fxp_log_mode {
        LogMode::Taylor => log_taylor(ctx, x),
    }
}

/// Base-2 logarithm of a positive value.
pub fn log2<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let (g, h) = log2_dec(ctx, x)?;
    let log2e = make_constant_f64(ctx, LOG2_E, x.shape())?;
    let ln_g = log_taylor_core(ctx, &g)?;
    let log2_g = mul(ctx, &log2e, &ln_g)?;
    add(ctx, &log2_g, &h)
}

/// Base-10 logarithm of a positive value.
pub fn log10<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let (g, h) = log2_dec(ctx, x)?;
    let log10_2 = make_constant_f64(ctx, 2.0f64.log10(), x.shape())?;
    let log10_e = make_constant_f64(ctx, LOG10_E, x.shape())?;
    let ln_g = log_taylor_core(ctx, &g)?;
    let low = mul(ctx, &log10_e, &ln_g)?;
    let high = mul(ctx, &log10_2, &h)?;
    add(ctx, &low, &high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::basic::{input, open};
    use crate::context::factory::{make_private, to_f64_vec};
    use crate::context::Config;
    use crate::mpc::{SeededPrep, Semi2k};
    use crate::network::run_parties;

    fn run_log(f: impl Fn(&Context<SeededPrep>, &Value<64, true>) -> Result<Value<64, true>> + Send + Sync, xs: &[f64]) -> Vec<f64> {
        let xs = xs.to_vec();
        let n = xs.len() as i64;
        let f = &f;
        let results = run_parties(2, move |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(16),
                Semi2k::new(Box::new(player), SeededPrep::new(0x106, pid, 2)),
            );
            let x = make_private::<_, 64>(&ctx, 0, (pid == 0).then_some(&xs[..]), &[n]).unwrap();
            let share = input(&ctx, &x).unwrap();
            let y = f(&ctx, &share).unwrap();
            to_f64_vec(&open(&ctx, &y).unwrap()).unwrap()
        });
        results.into_iter().next().unwrap()
    }

    #[test]
    fn test_natural_log() {
        let y = run_log(log, &[1.0, 2.0, 8.0]);
        assert!(y[0].abs() < 0.02, "ln(1) gave {}", y[0]);
        assert!((y[1] - 2.0f64.ln()).abs() < 0.02, "ln(2) gave {}", y[1]);
        assert!((y[2] - 8.0f64.ln()).abs() < 0.02, "ln(8) gave {}", y[2]);
    }

    #[test]
    fn test_log2_log10() {
        let y = run_log(log2, &[8.0, 0.5]);
        assert!((y[0] - 3.0).abs() < 0.02, "log2(8) gave {}", y[0]);
        assert!((y[1] + 1.0).abs() < 0.02, "log2(0.5) gave {}", y[1]);
        let y = run_log(log10, &[100.0]);
        assert!((y[0] - 2.0).abs() < 0.02, "log10(100) gave {}", y[0]);
    }
}
