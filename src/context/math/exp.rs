//! Exponentials.

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;

use super::super::basic::{add, mul};
use super::super::factory::{make_constant, make_constant_f64};
use super::super::{Context, ExpMode, Value};
use super::{polynomial, pow};

const LN_2: f64 = std::f64::consts::LN_2;

/// `exp(x)` as the compound-interest limit `(1 + x/N)^N` with
/// `N = 2^iters`, evaluated by repeated squaring.
fn exp_euler<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_exp_iters;
    ensure_contract!(
        n_iters <= 62 && n_iters as i64 <= ctx.fxp_fracbits() as i64,
        "exp euler iterations exceed limit"
    );
    let n = 1i64 << n_iters;

    let one = make_constant_f64(ctx, 1.0, x.shape())?;
    let inv_n = make_constant_f64(ctx, 1.0 / n as f64, x.shape())?;

    let step = mul(ctx, x, &inv_n)?;
    let t = add(ctx, &one, &step)?;
    pow(ctx, &t, n)
}

/// `exp(x)` as a truncated Taylor series around zero; accurate for
/// moderate arguments, with the iteration count bounding the degree.
fn exp_taylor<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_exp_iters.max(2) as usize;

    let mut coef = Vec::with_capacity(n_iters);
    coef.push(make_constant(ctx, 1, x.shape())?);
    let mut factorial = 1.0f64;
    for i in 1..n_iters {
        factorial *= i as f64;
        coef.push(make_constant_f64(ctx, 1.0 / factorial, x.shape())?);
    }

    polynomial(ctx, &coef, x)
}

/// `exp(x)`, mode-selected by the context.
pub fn exp<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    match ctx.config().fxp_exp_mode {
        ExpMode::Euler => exp_euler(ctx, x),
        ExpMode::Taylor => exp_taylor(ctx, x),
    }
}

/// `2^x = exp(ln 2 * x)`.
pub fn exp2<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let ln2 = make_constant_f64(ctx, LN_2, x.shape())?;
    let scaled = mul(ctx, &ln2, x)?;
    exp(ctx, &scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::basic::{input, open};
    use crate::context::factory::{make_private, to_f64_vec};
    use crate::context::Config;
    use crate::mpc::{SeededPrep, Semi2k};
    use crate::network::run_parties;

    fn run_exp(mode: ExpMode, xs: &[f64]) -> Vec<f64> {
        let xs = xs.to_vec();
        let n = xs.len() as i64;
        let results = run_parties(2, move |pid, player| {
            let mut config = Config::with_fracbits(16);
            config.fxp_exp_mode = mode;
            config.fxp_exp_iters = 8;
            let ctx = Context::new(
                config,
                Semi2k::new(Box::new(player), SeededPrep::new(0xe4, pid, 2)),
            );
            let x = make_private::<_, 64>(&ctx, 0, (pid == 0).then_some(&xs[..]), &[n]).unwrap();
            let share = input(&ctx, &x).unwrap();
            let e = exp(&ctx, &share).unwrap();
            to_f64_vec(&open(&ctx, &e).unwrap()).unwrap()
        });
        results.into_iter().next().unwrap()
    }

    #[test]
    fn test_exp_euler() {
        let e = run_exp(ExpMode::Euler, &[0.0, 1.0, -1.0]);
        assert!((e[0] - 1.0).abs() < 0.01, "exp(0) gave {}", e[0]);
        assert!((e[1] - 1.0f64.exp()).abs() < 0.03, "exp(1) gave {}", e[1]);
        assert!((e[2] - (-1.0f64).exp()).abs() < 0.01, "exp(-1) gave {}", e[2]);
    }

    #[test]
    fn test_exp_taylor() {
        let e = run_exp(ExpMode::Taylor, &[0.5, -0.5]);
        assert!((e[0] - 0.5f64.exp()).abs() < 0.01, "exp(0.5) gave {}", e[0]);
        assert!((e[1] - (-0.5f64).exp()).abs() < 0.01, "exp(-0.5) gave {}", e[1]);
    }

    #[test]
    fn test_exp2() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(16),
                Semi2k::new(Box::new(player), SeededPrep::new(0xe5, pid, 2)),
            );
            let x = make_private::<_, 64>(&ctx, 0, (pid == 0).then_some(&[3.0][..]), &[1]).unwrap();
            let share = input(&ctx, &x).unwrap();
            let e = exp2(&ctx, &share).unwrap();
            to_f64_vec(&open(&ctx, &e).unwrap()).unwrap()
        });
        for e in results {
            assert!((e[0] - 8.0).abs() < 0.15, "exp2(3) gave {}", e[0]);
        }
    }
}
