//! Fixed-point math over secret values.
//!
//! Every routine here is built from the basic operation set, so it runs
//! under any visibility; algorithm choice and iteration counts come
//! from the context's [`Config`](super::Config).

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;

use super::basic::{add, bitcomp, h1bitdec, mul, square};
use super::factory::make_constant;
use super::{Context, Value};

pub mod div;
pub mod exp;
pub mod log;
pub mod round;
pub mod sigmoid;
pub mod sqrt;

pub use div::{div, reciprocal};
pub use exp::{exp, exp2};
pub use log::{log, log10, log2};
pub use round::{ceil, floor, fraction};
pub use sigmoid::sigmoid;
pub use sqrt::sqrt;

/// Evaluates `coef[0] + coef[1] x + coef[2] x^2 + ...` by Horner's
/// method.
pub fn polynomial<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    coef: &[Value<K, S>],
    x: &Value<K, S>,
) -> Result<Value<K, S>> {
    if coef.is_empty() {
        return make_constant(ctx, 0, x.shape());
    }
    if coef.len() == 1 {
        return Ok(coef[0].clone());
    }
    let mut ans = coef[coef.len() - 1].clone();
    for c in coef.iter().rev().skip(1) {
        let scaled = mul(ctx, x, &ans)?;
        ans = add(ctx, c, &scaled)?;
    }
    Ok(ans)
}

/// Integer power by repeated squaring; negative exponents go through
/// the reciprocal.
pub fn pow<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    x: &Value<K, true>,
    y: i64,
) -> Result<Value<K, true>> {
    if y < 0 {
        let inv = reciprocal(ctx, x)?;
        return pow(ctx, &inv, -y);
    }
    if y == 0 {
        return make_constant(ctx, 1, x.shape());
    }
    if y == 1 {
        return Ok(x.clone());
    }
    if y == 2 {
        return square(ctx, x);
    }

    let bits = 64 - (y as u64).leading_zeros();
    let mut ans = if y & 1 == 1 {
        x.clone()
    } else {
        make_constant(ctx, 1, x.shape())?
    };
    let mut x_pow = x.clone();
    for i in 1..bits {
        x_pow = square(ctx, &x_pow)?;
        if (y >> i) & 1 == 1 {
            ans = mul(ctx, &ans, &x_pow)?;
        }
    }
    Ok(ans)
}

/// Normalization step shared by division, square root and logarithm.
///
/// Aligns the positive input to the context fracbits, then returns its
/// highest-set-bit decomposition over `2 * fracbits` positions together
/// with the factor that maps the input into `[0.5, 1)` (the composition
/// of the reversed bits).
pub(crate) fn bit_floor_factor<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    input: &Value<K, true>,
) -> Result<(Value<K, true>, Value<K, true>, Vec<Value<K, true>>)> {
    let fracbits = ctx.fxp_fracbits() as i64;
    ensure_contract!(
        input.fracbits() <= fracbits,
        "input fracbits {} exceed the context target {fracbits}",
        input.fracbits()
    );
    ensure_contract!(
        2 * fracbits <= K as i64,
        "normalization needs 2 * fracbits <= K"
    );
    let shift = (fracbits - input.fracbits()) as u32;
    let aligned = super::raw::r_lshift(ctx, input, shift)?.set_fracbits(fracbits, true)?;

    let h1bits = h1bitdec(ctx, &aligned, 2 * fracbits as u32)?;
    let reversed: Vec<Value<K, true>> = h1bits.iter().rev().cloned().collect();
    let factor = bitcomp(ctx, &reversed, fracbits)?;

    Ok((aligned, factor, h1bits))
}
