//! Square roots by Goldschmidt iteration.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::super::basic::{add, mul, sub};
use super::super::factory::{make_constant, make_constant_f64};
use super::super::{Context, SqrtMode, Value};
use super::{bit_floor_factor, polynomial};

/// Least-squares seed for `1/sqrt(x)` on `[0.5, 1)`; the degree-5 fit
/// stays within 1.9e-5 of the true value.
fn rsqrt_initial_guess<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let coef = [
        make_constant_f64(ctx, 3.215_748_48, x.shape())?,
        make_constant_f64(ctx, -7.494_353_59, x.shape())?,
        make_constant_f64(ctx, 12.424_072_52, x.shape())?,
        make_constant_f64(ctx, -12.114_989_93, x.shape())?,
        make_constant_f64(ctx, 6.357_803_54, x.shape())?,
        make_constant_f64(ctx, -1.388_290_93, x.shape())?,
    ];
    polynomial(ctx, &coef, x)
}

/// `sqrt(x)` for `x` in `[0.5, 1)`.
///
/// Tracks `g -> sqrt(x)` and `h -> 1/(2 sqrt(x))`; each step multiplies
/// both by `1.5 - g h`, which converges to one.
fn sqrt_goldschmidt_core<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_sqrt_iters.max(1);

    let half = make_constant_f64(ctx, 0.5, x.shape())?;
    let three_halves = make_constant_f64(ctx, 1.5, x.shape())?;

    let y0 = rsqrt_initial_guess(ctx, x)?;
    let mut g = mul(ctx, &y0, x)?;
    let mut h = mul(ctx, &y0, &half)?;

    for _ in 0..n_iters {
        let gh = mul(ctx, &g, &h)?;
        let t = sub(ctx, &three_halves, &gh)?;
        h = mul(ctx, &h, &t)?;
        g = mul(ctx, &g, &t)?;
    }
    Ok(g)
}

fn sqrt_goldschmidt<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    input: &Value<K, true>,
) -> Result<Value<K, true>> {
    let fracbits = ctx.fxp_fracbits() as i64;
    let (aligned, factor, h1bits) = bit_floor_factor(ctx, input)?;

    // x_norm in [0.5, 1)
    let x_norm = mul(ctx, &aligned, &factor)?;
    let x_norm_sqrt = sqrt_goldschmidt_core(ctx, &x_norm)?;

    // sqrt of the power of two the factor removed
    let mut h_sqrt = make_constant(ctx, 0, input.shape())?;
    for (i, bit) in h1bits.iter().enumerate() {
        let weight =
            make_constant_f64(ctx, (2.0f64).powf(0.5 * (1 + i as i64 - fracbits) as f64), input.shape())?;
        let term = mul(ctx, bit, &weight)?;
        h_sqrt = add(ctx, &h_sqrt, &term)?;
    }

    mul(ctx, &x_norm_sqrt, &h_sqrt)
}

/// Square root of a non-negative value.
pub fn sqrt<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    match ctx.config().fxp_sqrt_mode {
        SqrtMode::Goldschmidt => sqrt_goldschmidt(ctx, x),
    }
}
