//! Division by Newton-Raphson iteration.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::super::basic::{abs, mul, sign, sub};
use super::super::factory::{make_constant, make_constant_f64};
use super::super::{Context, DivMode, Value};
use super::bit_floor_factor;

/// Reciprocal of a value in `[0.5, 1)` by Newton iteration.
///
/// The affine seed `2.9142 - 2 b` keeps the initial error below 0.09
/// over the whole range, so every iteration roughly doubles the correct
/// bits.
fn reciprocal_newton_norm<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    b: &Value<K, true>,
) -> Result<Value<K, true>> {
    let n_iters = ctx.config().fxp_div_iters;

    let two = make_constant_f64(ctx, 2.0, b.shape())?;
    let seed = make_constant_f64(ctx, 2.9142, b.shape())?;

    let scaled = mul(ctx, &two, b)?;
    let mut x = sub(ctx, &seed, &scaled)?;
    for _ in 0..n_iters {
        let bx = mul(ctx, b, &x)?;
        let residual = sub(ctx, &two, &bx)?;
        x = mul(ctx, &x, &residual)?;
    }
    Ok(x)
}

fn div_newton<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    a: &Value<K, true>,
    b: &Value<K, true>,
) -> Result<Value<K, true>> {
    let b_sign = sign(ctx, b)?;
    let b_abs = abs(ctx, b)?;
    let (b_aligned, b_factor, _) = bit_floor_factor(ctx, &b_abs)?;
    let b_norm = mul(ctx, &b_aligned, &b_factor)?;

    let b_norm_reciprocal = reciprocal_newton_norm(ctx, &b_norm)?;

    let signed_a = mul(ctx, a, &b_sign)?;
    let scaled_a = mul(ctx, &signed_a, &b_factor)?;
    mul(ctx, &scaled_a, &b_norm_reciprocal)
}

/// Division `a / b`; `b` must be non-zero.
pub fn div<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    a: &Value<K, true>,
    b: &Value<K, true>,
) -> Result<Value<K, true>> {
    match ctx.config().fxp_div_mode {
        DivMode::Newton => div_newton(ctx, a, b),
    }
}

/// Reciprocal `1 / x`; `x` must be non-zero.
pub fn reciprocal<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
) -> Result<Value<K, true>> {
    let one = make_constant(ctx, 1, x.shape())?;
    div(ctx, &one, x)
}
