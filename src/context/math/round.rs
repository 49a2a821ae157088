//! Rounding toward integers.

use crate::error::Result;
use crate::mpc::Preprocessing;

use super::super::basic::{bitcomp, bitdec, neg, sub};
use super::super::factory::make_constant;
use super::super::{Context, Value};

/// The fractional part of `x`, in `[0, 1)`.
///
/// Recomposes the low fracbits of the representation, which for
/// negative values yields the distance up from the floor.
pub fn fraction<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    x: &Value<K, S>,
) -> Result<Value<K, S>> {
    if x.fracbits() == 0 {
        return make_constant(ctx, 0, x.shape());
    }
    let nbits = x.fracbits() as u32;
    let bits = bitdec(ctx, x, nbits)?;
    bitcomp(ctx, &bits, x.fracbits())
}

/// Rounds toward negative infinity, keeping the fracbits of `x`.
pub fn floor<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    x: &Value<K, S>,
) -> Result<Value<K, S>> {
    if x.fracbits() == 0 {
        return Ok(x.clone());
    }
    let frac = fraction(ctx, x)?;
    sub(ctx, x, &frac)
}

/// Rounds toward positive infinity, keeping the fracbits of `x`.
pub fn ceil<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    x: &Value<K, S>,
) -> Result<Value<K, S>> {
    let negated = neg(ctx, x)?;
    let floored = floor(ctx, &negated)?;
    neg(ctx, &floored)
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
    fn test_floor_ceil_fraction() {
        let results = run_parties(2, |pid, player| {
            let ctx = Context::new(
                Config::with_fracbits(12),
                Semi2k::new(Box::new(player), SeededPrep::new(0xf100, pid, 2)),
            );
            let x = make_private::<_, 64>(
                &ctx,
                0,
                (pid == 0).then_some(&[2.75, -2.75, 3.0][..]),
                &[3],
            )
            .unwrap();
            let share = input(&ctx, &x).unwrap();
            let fl = floor(&ctx, &share).unwrap();
            let ce = ceil(&ctx, &share).unwrap();
            let fr = fraction(&ctx, &share).unwrap();
            (
                to_f64_vec(&open(&ctx, &fl).unwrap()).unwrap(),
                to_f64_vec(&open(&ctx, &ce).unwrap()).unwrap(),
                to_f64_vec(&open(&ctx, &fr).unwrap()).unwrap(),
            )
        });
        for (fl, ce, fr) in results {
            assert_eq!(fl, vec![2.0, -3.0, 3.0]);
            assert_eq!(ce, vec![3.0, -2.0, 3.0]);
            assert_eq!(fr, vec![0.75, 0.25, 0.0]);
        }
    }
}
