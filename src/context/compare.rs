//! Comparisons, boolean algebra and oblivious selection over values.
//!
//! Boolean operands here are values in `{0, 1}` with fracbits 0, the
//! shape the comparison operators produce.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::basic::{add, eqz, msb, mul, sub};
use super::factory::make_constant;
use super::{Context, Value};

/// Logical negation of a `{0, 1}` value.
pub fn logical_not<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    value: &Value<K, S>,
) -> Result<Value<K, S>> {
    let one = make_constant(ctx, 1, value.shape())?;
    sub(ctx, &one, value)
}

/// Logical conjunction of two `{0, 1}` values.
pub fn logical_and<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    mul(ctx, lhs, rhs)
}

/// Logical disjunction of two `{0, 1}` values.
pub fn logical_or<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let n_lhs = logical_not(ctx, lhs)?;
    let n_rhs = logical_not(ctx, rhs)?;
    let n_ans = logical_and(ctx, &n_lhs, &n_rhs)?;
    logical_not(ctx, &n_ans)
}

/// Oblivious selection: `cond == 0 ? v0 : v1` elementwise, without
/// revealing `cond`.
pub fn conditional<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    cond: &Value<K, S>,
    v0: &Value<K, S>,
    v1: &Value<K, S>,
) -> Result<Value<K, S>> {
    let diff = sub(ctx, v1, v0)?;
    let picked = mul(ctx, cond, &diff)?;
    add(ctx, v0, &picked)
}

/// Elementwise `lhs < rhs` as a `{0, 1}` value.
pub fn less<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let diff = sub(ctx, lhs, rhs)?;
    msb(ctx, &diff)
}

/// Elementwise `lhs > rhs` as a `{0, 1}` value.
pub fn greater<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    less(ctx, rhs, lhs)
}

/// Elementwise `lhs <= rhs` as a `{0, 1}` value.
pub fn less_eq<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let gt = greater(ctx, lhs, rhs)?;
    logical_not(ctx, &gt)
}

/// Elementwise `lhs >= rhs` as a `{0, 1}` value.
pub fn greater_eq<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let lt = less(ctx, lhs, rhs)?;
    logical_not(ctx, &lt)
}

/// Elementwise equality as a `{0, 1}` value.
pub fn equal<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let diff = sub(ctx, lhs, rhs)?;
    eqz(ctx, &diff)
}

/// Elementwise minimum.
pub fn min<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let gt = greater(ctx, lhs, rhs)?;
    conditional(ctx, &gt, lhs, rhs)
}

/// Elementwise maximum.
pub fn max<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let lt = less(ctx, lhs, rhs)?;
    conditional(ctx, &lt, lhs, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::basic::{input, open};
    use crate::context::factory::{make_private_ints, to_int_vec};
    use crate::context::Config;
    use crate::mpc::{SeededPrep, Semi2k};
    use crate::network::run_parties;

    #[test]
    fn test_comparisons_and_selection() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0xc0de, pid, 2)),
            );
            let x = make_private_ints::<_, 64, true>(
                &ctx,
                0,
                (pid == 0).then_some(&[-1i64, 5, 3][..]),
                &[3],
            )
            .unwrap();
            let y = make_private_ints::<_, 64, true>(
                &ctx,
                1,
                (pid == 1).then_some(&[3i64, 3, 3][..]),
                &[3],
            )
            .unwrap();
            let xs = input(&ctx, &x).unwrap();
            let ys = input(&ctx, &y).unwrap();

            let lt = less(&ctx, &xs, &ys).unwrap();
            let ge = greater_eq(&ctx, &xs, &ys).unwrap();
            let eq = equal(&ctx, &xs, &ys).unwrap();
            let mn = min(&ctx, &xs, &ys).unwrap();
            let mx = max(&ctx, &xs, &ys).unwrap();

            (
                to_int_vec(&open(&ctx, &lt).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &ge).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &eq).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &mn).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &mx).unwrap()).unwrap(),
            )
        });
        for (lt, ge, eq, mn, mx) in results {
            assert_eq!(lt, vec![1, 0, 0]);
            assert_eq!(ge, vec![0, 1, 1]);
            assert_eq!(eq, vec![0, 0, 1]);
            assert_eq!(mn, vec![-1, 3, 3]);
            assert_eq!(mx, vec![3, 5, 3]);
        }
    }

    #[test]
    fn test_boolean_algebra() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0xb001, pid, 2)),
            );
            let a = make_private_ints::<_, 32, true>(
                &ctx,
                0,
                (pid == 0).then_some(&[0i64, 0, 1, 1][..]),
                &[4],
            )
            .unwrap();
            let b = make_private_ints::<_, 32, true>(
                &ctx,
                1,
                (pid == 1).then_some(&[0i64, 1, 0, 1][..]),
                &[4],
            )
            .unwrap();
            let sa = input(&ctx, &a).unwrap();
            let sb = input(&ctx, &b).unwrap();
            let and = logical_and(&ctx, &sa, &sb).unwrap();
            let or = logical_or(&ctx, &sa, &sb).unwrap();
            let not = logical_not(&ctx, &sa).unwrap();
            (
                to_int_vec(&open(&ctx, &and).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &or).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &not).unwrap()).unwrap(),
            )
        });
        for (and, or, not) in results {
            assert_eq!(and, vec![0, 0, 0, 1]);
            assert_eq!(or, vec![0, 1, 1, 1]);
            assert_eq!(not, vec![1, 1, 0, 0]);
        }
    }
}
