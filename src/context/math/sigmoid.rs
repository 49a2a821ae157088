//! The logistic function.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::super::basic::{add, mul, sub};
use super::super::factory::make_constant_f64;
use super::super::{Context, SigmoidMode, Value};

/// Euler integration of `y' = y (1 - y)` from `y(0) = 0.5` over `x`,
/// taking the configured number of steps.
fn sigmoid_euler<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_sigmoid_iters.max(1);

    let half = make_constant_f64(ctx, 0.5, x.shape())?;
    let one = make_constant_f64(ctx, 1.0, x.shape())?;
    let inv_n = make_constant_f64(ctx, 1.0 / n_iters as f64, x.shape())?;

    let step = mul(ctx, x, &inv_n)?;
    let mut y = half;
    for _ in 0..n_iters {
        let slope = sub(ctx, &one, &y)?;
        let t = mul(ctx, &step, &slope)?;
        let growth = add(ctx, &one, &t)?;
        y = mul(ctx, &y, &growth)?;
    }
    Ok(y)
}

/// `sigmoid(x) = 1 / (1 + exp(-x))`, mode-selected by the context.
pub fn sigmoid<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    match ctx.config().fxp_sigmoid_mode {
        SigmoidMode::Euler => sigmoid_euler(ctx, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::basic::{input, open};
    use crate::context::factory::{make_private, to_f64_vec};
    use crate::context::Config;
    use crate::mpc::{SeededPrep, Semi2k};
    use crate::network::run_parties;

    #[test]
    fn test_sigmoid() {
        let results = run_parties(2, |pid, player| {
            let mut config = Config::with_fracbits(16);
            config.fxp_sigmoid_iters = 16;
            let ctx = Context::new(
                config,
                Semi2k::new(Box::new(player), SeededPrep::new(0x516, pid, 2)),
            );
            let x = make_private::<_, 64>(
                &ctx,
                0,
                (pid == 0).then_some(&[0.0, 2.0, -2.0][..]),
                &[3],
            )
            .unwrap();
            let share = input(&ctx, &x).unwrap();
            let s = sigmoid(&ctx, &share).unwrap();
            to_f64_vec(&open(&ctx, &s).unwrap()).unwrap()
        });
        for s in results {
            assert!((s[0] - 0.5).abs() < 0.01, "sigmoid(0) gave {}", s[0]);
            assert!((s[1] - 0.8808).abs() < 0.05, "sigmoid(2) gave {}", s[1]);
            assert!((s[2] - 0.1192).abs() < 0.05, "sigmoid(-2) gave {}", s[2]);
            assert!((s[1] + s[2] - 1.0).abs() < 0.1, "sigmoid symmetry broken");
        }
    }
}
