//! Fixed-point layer: fracbits bookkeeping above the raw dispatch.
//!
//! Additions align their operands to the larger fracbits by left
//! shifting the smaller; multiplications add the operand fracbits and
//! truncate back down to the context's target; comparisons and bit
//! decompositions produce integer (fracbits 0) results.

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;

use super::raw::*;
use super::{Context, Value};

fn check_fracbits<const K: u32, const S: bool>(value: &Value<K, S>, what: &str) -> Result<()> {
    ensure_contract!(value.fracbits() >= 0, "{what}: operand fracbits are unset");
    Ok(())
}

/// Shares a private value, keeping its fracbits.
pub fn f_input<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(input, "input")?;
    r_input(ctx, input)?.set_fracbits(input.fracbits(), true)
}

/// Opens a value, keeping its fracbits.
pub fn f_open<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(input, "open")?;
    r_open(ctx, input)?.set_fracbits(input.fracbits(), true)
}

/// Negation, fracbits preserved.
pub fn f_neg<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(input, "neg")?;
    r_neg(ctx, input)?.set_fracbits(input.fracbits(), true)
}

/// Addition after aligning both operands to the larger fracbits.
pub fn f_add<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(lhs, "add")?;
    check_fracbits(rhs, "add")?;
    let fracbits = lhs.fracbits().max(rhs.fracbits());

    let mut lhs = lhs.clone();
    let mut rhs = rhs.clone();
    if lhs.fracbits() != fracbits {
        let shift = (fracbits - lhs.fracbits()) as u32;
        lhs = r_lshift(ctx, &lhs, shift)?.set_fracbits(fracbits, true)?;
    }
    if rhs.fracbits() != fracbits {
        let shift = (fracbits - rhs.fracbits()) as u32;
        rhs = r_lshift(ctx, &rhs, shift)?.set_fracbits(fracbits, true)?;
    }

    r_add(ctx, &lhs, &rhs)?.set_fracbits(fracbits, true)
}

fn truncate_to_target<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: Value<K, S>,
    fracbits: i64,
) -> Result<Value<K, S>> {
    let target = ctx.fxp_fracbits() as i64;
    if fracbits > target {
        let truncated = r_trunc(ctx, &value, (fracbits - target) as u32)?;
        truncated.set_fracbits(target, true)
    } else {
        value.set_fracbits(fracbits, true)
    }
}

/// Multiplication; the product's fracbits are the operand sum, cut back
/// to the context target by truncation.
pub fn f_mul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(lhs, "mul")?;
    check_fracbits(rhs, "mul")?;
    let fracbits = lhs.fracbits() + rhs.fracbits();
    let ans = r_mul(ctx, lhs, rhs)?;
    truncate_to_target(ctx, ans, fracbits)
}

/// Square via [`f_mul`] with itself.
pub fn f_square<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_mul(ctx, input, input)
}

/// Matrix multiplication with the same fracbits policy as [`f_mul`].
pub fn f_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    check_fracbits(lhs, "matmul")?;
    check_fracbits(rhs, "matmul")?;
    let fracbits = lhs.fracbits() + rhs.fracbits();
    let ans = r_matmul(ctx, lhs, rhs)?;
    truncate_to_target(ctx, ans, fracbits)
}

/// Sign bit; the result is an integer in `{0, 1}`.
pub fn f_msb<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    r_msb(ctx, input)?.set_fracbits(0, true)
}

/// Equality to zero; the result is an integer in `{0, 1}`.
pub fn f_eqz<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    r_eqz(ctx, input)?.set_fracbits(0, true)
}

/// Bit decomposition; every bit is an integer.
pub fn f_bitdec<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
    nbits: u32,
) -> Result<Vec<Value<K, S>>> {
    r_bitdec(ctx, input, nbits)?
        .into_iter()
        .map(|v| v.set_fracbits(0, true))
        .collect()
}

/// Highest-set-bit decomposition; every bit is an integer.
pub fn f_h1bitdec<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
    nbits: u32,
) -> Result<Vec<Value<K, S>>> {
    r_h1bitdec(ctx, input, nbits)?
        .into_iter()
        .map(|v| v.set_fracbits(0, true))
        .collect()
}
