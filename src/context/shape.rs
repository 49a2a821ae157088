//! Shape-level operations over values: concatenation and reductions.

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;
use crate::ndarray::{self, Slice, SliceArg};

use super::basic::add;
use super::compare::{max as max2, min as min2};
use super::raw::r_lshift;
use super::{Context, Value};

/// Concatenates values end-to-end along `axis`.
///
/// All operands must share one visibility; differing fracbits are
/// aligned up to the largest.
pub fn concatenate<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    values: &[Value<K, S>],
    axis: usize,
) -> Result<Value<K, S>> {
    ensure_contract!(!values.is_empty(), "concatenate of zero values");
    let visibility = values[0].visibility();
    let mut fracbits = values[0].fracbits();
    for value in values {
        ensure_contract!(
            value.visibility() == visibility,
            "concatenate with inconsistent visibility"
        );
        fracbits = fracbits.max(value.fracbits());
    }

    let mut aligned = Vec::with_capacity(values.len());
    for value in values {
        let shift = (fracbits - value.fracbits()) as u32;
        aligned.push(r_lshift(ctx, value, shift)?.set_fracbits(fracbits, true)?);
    }

    let ans = if visibility.is_share() {
        let data: Vec<_> = aligned
            .iter()
            .map(|v| v.data_s().map(Clone::clone))
            .collect::<Result<_>>()?;
        Value::new().assign_s(ndarray::concatenate(&data, axis)?)
    } else {
        let data: Vec<_> = aligned
            .iter()
            .map(|v| v.data_p().map(Clone::clone))
            .collect::<Result<_>>()?;
        Value::new().assign_p(ndarray::concatenate(&data, axis)?)
    };

    ans.set_visibility(visibility, false)?.set_fracbits(fracbits, false)
}

/// Pairwise tree reduction along an axis, or over the flattened value
/// when no axis is given.
///
/// Splitting into even and odd halves keeps the combining operator's
/// round count logarithmic in the axis length.
fn reduce<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    combine: impl Fn(&Context<Pr>, &Value<K, S>, &Value<K, S>) -> Result<Value<K, S>>,
    input: &Value<K, S>,
    axis: Option<i64>,
) -> Result<Value<K, S>> {
    let (input, axis) = match axis {
        None => (input.reshape(&[input.numel()])?, 0usize),
        Some(axis) => {
            let ndim = input.ndim() as i64;
            let norm = if axis < 0 { axis + ndim } else { axis };
            ensure_contract!((0..ndim).contains(&norm), "invalid reduce axis {axis}");
            (input.clone(), norm as usize)
        }
    };
    let ndim = input.ndim();
    ensure_contract!(input.numel() > 0, "reduce of an empty value");

    let full = vec![SliceArg::Range(Slice::all()); ndim];
    let mut last_idx = full.clone();
    last_idx[axis] = SliceArg::Range(Slice::from(-1));
    let mut even_idx = full.clone();
    even_idx[axis] = SliceArg::Range(Slice { stop: Some(-1), step: Some(2), ..Slice::default() });
    let mut odd_idx = full;
    odd_idx[axis] = SliceArg::Range(Slice { start: Some(1), step: Some(2), ..Slice::default() });

    let mut carry: Option<Value<K, S>> = None;
    let mut ans = input;
    while ans.shape()[axis] >= 2 {
        if ans.shape()[axis] % 2 == 1 {
            let last = ans.slice(&last_idx)?;
            carry = Some(match carry {
                None => last,
                Some(acc) => combine(ctx, &acc, &last)?,
            });
        }
        let lhs = ans.slice(&even_idx)?;
        let rhs = ans.slice(&odd_idx)?;
        ans = combine(ctx, &lhs, &rhs)?;
    }
    if let Some(carry) = carry {
        ans = combine(ctx, &ans, &carry)?;
    }
    Ok(ans)
}

/// Sum along `axis`, or of every element when `axis` is `None`.
pub fn sum<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
    axis: Option<i64>,
) -> Result<Value<K, S>> {
    reduce(ctx, |ctx, lhs, rhs| add(ctx, lhs, rhs), input, axis)
}

/// Minimum along `axis`, or of every element when `axis` is `None`.
pub fn min<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
    axis: Option<i64>,
) -> Result<Value<K, S>> {
    reduce(ctx, |ctx, lhs, rhs| min2(ctx, lhs, rhs), input, axis)
}

/// Maximum along `axis`, or of every element when `axis` is `None`.
pub fn max<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
    axis: Option<i64>,
) -> Result<Value<K, S>> {
    reduce(ctx, |ctx, lhs, rhs| max2(ctx, lhs, rhs), input, axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::basic::{input, open};
    use crate::context::factory::{make_private_ints, make_public_ints, to_int_vec};
    use crate::context::Config;
    use crate::mpc::{SeededPrep, Semi2k};
    use crate::network::run_parties;

    #[test]
    fn test_concatenate_values() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0xcc, pid, 2)),
            );
            let a = make_public_ints::<_, 64, true>(&ctx, &[1, 2], &[2]).unwrap();
            let b = make_public_ints::<_, 64, true>(&ctx, &[3, 4, 5], &[3]).unwrap();
            let c = concatenate(&ctx, &[a, b], 0).unwrap();
            to_int_vec(&c).unwrap()
        });
        for r in results {
            assert_eq!(r, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn test_concatenate_shares_along_columns() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0xcd, pid, 2)),
            );
            let a = make_private_ints::<_, 64, true>(
                &ctx,
                0,
                (pid == 0).then_some(&[1i64, 2, 3, 4][..]),
                &[2, 2],
            )
            .unwrap();
            let b = make_private_ints::<_, 64, true>(
                &ctx,
                1,
                (pid == 1).then_some(&[9i64, 8][..]),
                &[2, 1],
            )
            .unwrap();
            let sa = input(&ctx, &a).unwrap();
            let sb = input(&ctx, &b).unwrap();
            let c = concatenate(&ctx, &[sa, sb], 1).unwrap();
            assert_eq!(c.shape(), &[2, 3]);
            to_int_vec(&open(&ctx, &c).unwrap()).unwrap()
        });
        for r in results {
            assert_eq!(r, vec![1, 2, 9, 3, 4, 8]);
        }
    }

    #[test]
    fn test_sum_reduction() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0x5c, pid, 2)),
            );
            let x = make_private_ints::<_, 64, true>(
                &ctx,
                0,
                (pid == 0).then_some(&[1i64, 2, 3, 4, 5, 6][..]),
                &[2, 3],
            )
            .unwrap();
            let xs = input(&ctx, &x).unwrap();
            let total = sum(&ctx, &xs, None).unwrap();
            let rows = sum(&ctx, &xs, Some(1)).unwrap();
            let cols = sum(&ctx, &xs, Some(0)).unwrap();
            (
                to_int_vec(&open(&ctx, &total).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &rows).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &cols).unwrap()).unwrap(),
            )
        });
        for (total, rows, cols) in results {
            assert_eq!(total, vec![21]);
            assert_eq!(rows, vec![6, 15]);
            assert_eq!(cols, vec![5, 7, 9]);
        }
    }

    #[test]
    fn test_min_max_reduction() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(8),
                Semi2k::new(Box::new(player), SeededPrep::new(0x5d, pid, 2)),
            );
            let x = make_private_ints::<_, 64, true>(
                &ctx,
                0,
                (pid == 0).then_some(&[4i64, -2, 9, 0, 7][..]),
                &[5],
            )
            .unwrap();
            let xs = input(&ctx, &x).unwrap();
            let lo = min(&ctx, &xs, None).unwrap();
            let hi = max(&ctx, &xs, None).unwrap();
            (
                to_int_vec(&open(&ctx, &lo).unwrap()).unwrap(),
                to_int_vec(&open(&ctx, &hi).unwrap()).unwrap(),
            )
        });
        for (lo, hi) in results {
            assert_eq!(lo, vec![-2]);
            assert_eq!(hi, vec![9]);
        }
    }
}
