//! Runtime visibility dispatch.
//!
//! The `r_*` functions inspect the visibility tags of their operands
//! and route to the matching primitive variant, swapping operands of
//! commutative verbs where only one orientation exists.

use crate::error::{ensure_contract, Error, Result};
use crate::mpc::Preprocessing;

use super::primitive::*;
use super::{Context, Value, Visibility};

fn bad_visibility<T>() -> Result<T> {
    Err(Error::Contract("operation on a value with invalid visibility".into()))
}

/// Shares a private value; inputs must be private.
pub fn r_input<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    ensure_contract!(input.is_private(), "input data must be private");
    pr_input(ctx, input)
}

/// Opens a value to public: identity for public values, promotion then
/// opening for private ones, a plain opening for shares.
pub fn r_open<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    match input.visibility() {
        Visibility::Public => Ok(input.clone()),
        Visibility::Private(_) => {
            let share = pr_input(ctx, input)?;
            sh_open(ctx, &share)
        }
        Visibility::Share => sh_open(ctx, input),
        Visibility::Invalid => bad_visibility(),
    }
}

macro_rules! raw_unary {
    ($(#[$doc:meta])* $fname:ident, $pb:ident, $pr:ident, $sh:ident) => {
        $(#[$doc])*
        pub fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            match input.visibility() {
                Visibility::Public => $pb(ctx, input),
                Visibility::Private(_) => $pr(ctx, input),
                Visibility::Share => $sh(ctx, input),
                Visibility::Invalid => bad_visibility(),
            }
        }
    };
}

raw_unary!(
    /// Elementwise negation under any visibility.
    r_neg, pb_neg, pr_neg, sh_neg
);
raw_unary!(
    /// Sign bit (`1` iff negative) under any visibility.
    r_msb, pb_msb, pr_msb, sh_msb
);
raw_unary!(
    /// Equality to zero under any visibility.
    r_eqz, pb_eqz, pr_eqz, sh_eqz
);

macro_rules! raw_binary {
    ($(#[$doc:meta])* $fname:ident,
     $pbpb:ident, $prpb:ident, $shpb:ident, $prpr:ident, $shpr:ident, $shsh:ident) => {
        $(#[$doc])*
        pub fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            use Visibility::*;
            match (lhs.visibility(), rhs.visibility()) {
                (Public, Public) => $pbpb(ctx, lhs, rhs),
                (Public, Private(_)) => $prpb(ctx, rhs, lhs),
                (Public, Share) => $shpb(ctx, rhs, lhs),
                (Private(_), Public) => $prpb(ctx, lhs, rhs),
                (Private(_), Private(_)) => $prpr(ctx, lhs, rhs),
                (Private(_), Share) => $shpr(ctx, rhs, lhs),
                (Share, Public) => $shpb(ctx, lhs, rhs),
                (Share, Private(_)) => $shpr(ctx, lhs, rhs),
                (Share, Share) => $shsh(ctx, lhs, rhs),
                _ => bad_visibility(),
            }
        }
    };
}

raw_binary!(
    /// Elementwise addition under any visibility pair.
    r_add, pbpb_add, prpb_add, shpb_add, prpr_add, shpr_add, shsh_add
);
raw_binary!(
    /// Elementwise multiplication under any visibility pair.
    r_mul, pbpb_mul, prpb_mul, shpb_mul, prpr_mul, shpr_mul, shsh_mul
);

macro_rules! raw_shift {
    ($(#[$doc:meta])* $fname:ident, $pb:ident, $pr:ident, $sh:ident) => {
        $(#[$doc])*
        pub fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Value<K, S>> {
            match input.visibility() {
                Visibility::Public => $pb(ctx, input, nbits),
                Visibility::Private(_) => $pr(ctx, input, nbits),
                Visibility::Share => $sh(ctx, input, nbits),
                Visibility::Invalid => bad_visibility(),
            }
        }
    };
}

raw_shift!(
    /// Left shift by `nbits` under any visibility.
    r_lshift, pb_lshift, pr_lshift, sh_lshift
);
raw_shift!(
    /// Truncation (right shift) by `nbits` under any visibility.
    r_trunc, pb_trunc, pr_trunc, sh_trunc
);

macro_rules! raw_bitdec {
    ($(#[$doc:meta])* $fname:ident, $pb:ident, $pr:ident, $sh:ident) => {
        $(#[$doc])*
        pub fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Vec<Value<K, S>>> {
            match input.visibility() {
                Visibility::Public => $pb(ctx, input, nbits),
                Visibility::Private(_) => $pr(ctx, input, nbits),
                Visibility::Share => $sh(ctx, input, nbits),
                Visibility::Invalid => bad_visibility(),
            }
        }
    };
}

raw_bitdec!(
    /// Bit decomposition of the low `nbits` bits under any visibility.
    r_bitdec, pb_bitdec, pr_bitdec, sh_bitdec
);
raw_bitdec!(
    /// Highest-set-bit decomposition under any visibility.
    r_h1bitdec, pb_h1bitdec, pr_h1bitdec, sh_h1bitdec
);

/// Matrix multiplication under any visibility pair.
pub fn r_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    use Visibility::*;
    match (lhs.visibility(), rhs.visibility()) {
        (Public, Public) => pbpb_matmul(ctx, lhs, rhs),
        (Public, Private(_)) => pbpr_matmul(ctx, lhs, rhs),
        (Public, Share) => pbsh_matmul(ctx, lhs, rhs),
        (Private(_), Public) => prpb_matmul(ctx, lhs, rhs),
        (Private(_), Private(_)) => prpr_matmul(ctx, lhs, rhs),
        (Private(_), Share) => prsh_matmul(ctx, lhs, rhs),
        (Share, Public) => shpb_matmul(ctx, lhs, rhs),
        (Share, Private(_)) => shpr_matmul(ctx, lhs, rhs),
        (Share, Share) => shsh_matmul(ctx, lhs, rhs),
        _ => bad_visibility(),
    }
}
