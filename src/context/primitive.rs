//! Visibility-pair variants of every protocol verb.
//!
//! For a binary verb there are nine combinations of Public, Private and
//! Share operands; the families below collapse to six thanks to
//! commutativity, with the raw layer swapping arguments for the rest.
//! Private operands compute locally at their owner and pass through
//! unchanged elsewhere; mixed private pairs are promoted to shares.

use crate::error::{Error, Result};
use crate::mpc::Preprocessing;

use super::wrapper::*;
use super::{Context, Value, Visibility};

fn owner_of<const K: u32, const S: bool>(value: &Value<K, S>) -> Result<usize> {
    value
        .owner()
        .ok_or_else(|| Error::Contract("private value without owner".into()))
}

/// Shares a private input.
pub(crate) fn pr_input<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_input_p(ctx, input)?.set_visibility(Visibility::Share, false)
}

/// Opens a share to a public value.
pub(crate) fn sh_open<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_open_s(ctx, input)?.set_visibility(Visibility::Public, false)
}

macro_rules! primitive_unary {
    ($pb:ident, $pr:ident, $sh:ident, $wp:ident, $ws:ident) => {
        pub(crate) fn $pb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            $wp(ctx, input)?.set_visibility(Visibility::Public, false)
        }

        pub(crate) fn $pr<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            let owner = owner_of(input)?;
            if ctx.pid() == owner {
                $wp(ctx, input)?.set_visibility(Visibility::Private(owner), false)
            } else {
                Ok(input.clone())
            }
        }

        pub(crate) fn $sh<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            $ws(ctx, input)?.set_visibility(Visibility::Share, false)
        }
    };
}

primitive_unary!(pb_neg, pr_neg, sh_neg, prot_neg_p, prot_neg_s);
primitive_unary!(pb_msb, pr_msb, sh_msb, prot_msb_p, prot_msb_s);
primitive_unary!(pb_eqz, pr_eqz, sh_eqz, prot_eqz_p, prot_eqz_s);

macro_rules! primitive_binary {
    ($pbpb:ident, $prpb:ident, $shpb:ident, $prpr:ident, $shpr:ident, $shsh:ident,
     $wpp:ident, $wsp:ident, $wss:ident) => {
        pub(crate) fn $pbpb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            $wpp(ctx, lhs, rhs)?.set_visibility(Visibility::Public, false)
        }

        /// Private op public: local at the owner.
        pub(crate) fn $prpb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            let owner = owner_of(lhs)?;
            if ctx.pid() == owner {
                $wpp(ctx, lhs, rhs)?.set_visibility(Visibility::Private(owner), false)
            } else {
                Ok(lhs.clone())
            }
        }

        pub(crate) fn $shpb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            $wsp(ctx, lhs, rhs)?.set_visibility(Visibility::Share, false)
        }

        /// Private op private: local when the owners match, shared
        /// otherwise.
        pub(crate) fn $prpr<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            let lowner = owner_of(lhs)?;
            let rowner = owner_of(rhs)?;
            if lowner == rowner {
                if ctx.pid() == lowner {
                    $wpp(ctx, lhs, rhs)?.set_visibility(Visibility::Private(lowner), false)
                } else {
                    Ok(lhs.clone())
                }
            } else {
                let lhs_share = pr_input(ctx, lhs)?;
                let rhs_share = pr_input(ctx, rhs)?;
                $shsh(ctx, &lhs_share, &rhs_share)
            }
        }

        /// Share op private: the private side is shared first.
        pub(crate) fn $shpr<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            let rhs_share = pr_input(ctx, rhs)?;
            $shsh(ctx, lhs, &rhs_share)
        }

        pub(crate) fn $shsh<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            $wss(ctx, lhs, rhs)?.set_visibility(Visibility::Share, false)
        }
    };
}

primitive_binary!(
    pbpb_add, prpb_add, shpb_add, prpr_add, shpr_add, shsh_add,
    prot_add_pp, prot_add_sp, prot_add_ss
);
primitive_binary!(
    pbpb_mul, prpb_mul, shpb_mul, prpr_mul, shpr_mul, shsh_mul,
    prot_mul_pp, prot_mul_sp, prot_mul_ss
);

macro_rules! primitive_shift {
    ($pb:ident, $pr:ident, $sh:ident, $wp:ident, $ws:ident) => {
        pub(crate) fn $pb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Value<K, S>> {
            $wp(ctx, input, nbits)?.set_visibility(Visibility::Public, false)
        }

        pub(crate) fn $pr<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Value<K, S>> {
            let owner = owner_of(input)?;
            if ctx.pid() == owner {
                $wp(ctx, input, nbits)?.set_visibility(Visibility::Private(owner), false)
            } else {
                Ok(input.clone())
            }
        }

        pub(crate) fn $sh<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Value<K, S>> {
            $ws(ctx, input, nbits)?.set_visibility(Visibility::Share, false)
        }
    };
}

primitive_shift!(pb_lshift, pr_lshift, sh_lshift, prot_lshift_p, prot_lshift_s);
primitive_shift!(pb_trunc, pr_trunc, sh_trunc, prot_trunc_p, prot_trunc_s);

macro_rules! primitive_bitdec {
    ($pb:ident, $pr:ident, $sh:ident, $wp:ident, $ws:ident) => {
        pub(crate) fn $pb<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Vec<Value<K, S>>> {
            $wp(ctx, input, nbits)?
                .into_iter()
                .map(|v| v.set_visibility(Visibility::Public, false))
                .collect()
        }

        pub(crate) fn $pr<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Vec<Value<K, S>>> {
            let owner = owner_of(input)?;
            if ctx.pid() == owner {
                $wp(ctx, input, nbits)?
                    .into_iter()
                    .map(|v| v.set_visibility(Visibility::Private(owner), false))
                    .collect()
            } else {
                Ok(vec![input.clone(); nbits as usize])
            }
        }

        pub(crate) fn $sh<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Vec<Value<K, S>>> {
            $ws(ctx, input, nbits)?
                .into_iter()
                .map(|v| v.set_visibility(Visibility::Share, false))
                .collect()
        }
    };
}

primitive_bitdec!(pb_bitdec, pr_bitdec, sh_bitdec, prot_bitdec_p, prot_bitdec_s);
primitive_bitdec!(pb_h1bitdec, pr_h1bitdec, sh_h1bitdec, prot_h1bitdec_p, prot_h1bitdec_s);

/* ----------------------------- matmul ----------------------------- */

pub(crate) fn pbpb_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_matmul_pp(ctx, lhs, rhs)?.set_visibility(Visibility::Public, false)
}

pub(crate) fn shpb_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_matmul_sp(ctx, lhs, rhs)?.set_visibility(Visibility::Share, false)
}

pub(crate) fn pbsh_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_matmul_ps(ctx, lhs, rhs)?.set_visibility(Visibility::Share, false)
}

pub(crate) fn shsh_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    prot_matmul_ss(ctx, lhs, rhs)?.set_visibility(Visibility::Share, false)
}

pub(crate) fn prpb_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let owner = owner_of(lhs)?;
    if ctx.pid() == owner {
        prot_matmul_pp(ctx, lhs, rhs)?.set_visibility(Visibility::Private(owner), false)
    } else {
        Ok(lhs.clone())
    }
}

pub(crate) fn pbpr_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let owner = owner_of(rhs)?;
    if ctx.pid() == owner {
        prot_matmul_pp(ctx, lhs, rhs)?.set_visibility(Visibility::Private(owner), false)
    } else {
        Ok(rhs.clone())
    }
}

pub(crate) fn prpr_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let lowner = owner_of(lhs)?;
    let rowner = owner_of(rhs)?;
    if lowner == rowner {
        if ctx.pid() == lowner {
            prot_matmul_pp(ctx, lhs, rhs)?.set_visibility(Visibility::Private(lowner), false)
        } else {
            Ok(lhs.clone())
        }
    } else {
        let lhs_share = pr_input(ctx, lhs)?;
        let rhs_share = pr_input(ctx, rhs)?;
        shsh_matmul(ctx, &lhs_share, &rhs_share)
    }
}

pub(crate) fn shpr_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let rhs_share = pr_input(ctx, rhs)?;
    shsh_matmul(ctx, lhs, &rhs_share)
}

pub(crate) fn prsh_matmul<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    lhs: &Value<K, S>,
    rhs: &Value<K, S>,
) -> Result<Value<K, S>> {
    let lhs_share = pr_input(ctx, lhs)?;
    shsh_matmul(ctx, &lhs_share, rhs)
}
