//! User-facing operations over [`Value`]s.
//!
//! Everything routes through the fixed-point layer, so mixing plain and
//! fixed-point operands aligns scales automatically and products come
//! back truncated to the context's fracbits target.

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;

use super::factory::make_constant;
use super::fxp::*;
use super::{Context, Value};

/// Shares a private value among all parties.
pub fn input<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_input(ctx, value)
}

/// Opens a value so every party learns it.
pub fn open<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_open(ctx, value)
}

/// Elementwise negation.
pub fn neg<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_neg(ctx, value)
}

/// Elementwise addition.
pub fn add<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_add(ctx, lhs, rhs)
}

/// Elementwise subtraction.
pub fn sub<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let negated = f_neg(ctx, rhs)?;
    f_add(ctx, lhs, &negated)
}

/// Elementwise multiplication.
pub fn mul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_mul(ctx, lhs, rhs)
}

/// Elementwise square.
pub fn square<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_square(ctx, value)
}

/// Matrix multiplication of two 2-D values.
pub fn matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_matmul(ctx, lhs, rhs)
}

/// Sign bit: `1` where the element is negative, else `0`.
pub fn msb<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_msb(ctx, value)
}

/// Equality to zero: `1` where the element is zero, else `0`.
pub fn eqz<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    f_eqz(ctx, value)
}

/// Sign: `-1` where negative, `1` where zero or positive.
pub fn sign<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    let one = make_constant(ctx, 1, value.shape())?;
    let two = make_constant(ctx, 2, value.shape())?;
    let negative = msb(ctx, value)?;
    let twice = mul(ctx, &two, &negative)?;
    sub(ctx, &one, &twice)
}

/// Absolute value, `x * sign(x)`.
pub fn abs<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    let s = sign(ctx, value)?;
    mul(ctx, value, &s)
}

/// Decomposes the low `nbits` bits of every element.
pub fn bitdec<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
    nbits: u32,
) -> Result<Vec<Value<K, S>>> {
    f_bitdec(ctx, value, nbits)
}

/// Keeps only the highest set bit below `nbits`, decomposed.
pub fn h1bitdec<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
    nbits: u32,
) -> Result<Vec<Value<K, S>>> {
    f_h1bitdec(ctx, value, nbits)
}

/// Recomposes bits into a number, `sum_i bit_i * 2^i`, then interprets
/// the result with the given fracbits.
pub fn bitcomp<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    bits: &[Value<K, S>],
    fracbits: i64,
) -> Result<Value<K, S>> {
    ensure_contract!(!bits.is_empty(), "bit composition with zero input bits");
    let shape = bits[0].shape().to_vec();

    let zero = make_constant(ctx, 0, &shape)?;
    let one = make_constant(ctx, 1, &shape)?;
    let two = make_constant(ctx, 2, &shape)?;

    let mut ans = zero;
    let mut power = one;
    for bit in bits {
        ensure_contract!(bit.fracbits() == 0, "bitcomp expects integer bits");
        let term = mul(ctx, bit, &power)?;
        ans = add(ctx, &ans, &term)?;
        power = mul(ctx, &power, &two)?;
    }

    ans.set_fracbits(fracbits, true)
}
