//! Protocol redirection layer.
//!
//! Each function here flattens its operand arrays, drives one protocol
//! primitive, and reshapes the result, leaving visibility and fracbits
//! for the layers above. Visibility of the *data* (plain vs share) is a
//! hard contract at this level.

use crate::error::{ensure_contract, Error, Result};
use crate::mpc::Preprocessing;
use crate::ndarray::NdArray;
use crate::ring::Z2;

use super::{Context, Value};

fn flatten<const K: u32, const S: bool>(arr: &NdArray<Z2<K, S>>) -> Result<NdArray<Z2<K, S>>> {
    arr.reshape(&[arr.numel()])
}

fn unflatten<const K: u32, const S: bool>(
    arr: &NdArray<Z2<K, S>>,
    shape: &[i64],
) -> Result<NdArray<Z2<K, S>>> {
    arr.reshape(shape)
}

/// `(m, n, k)` of a matrix product from the operand shapes.
fn deduce_matmul_shape(lhs: &[i64], rhs: &[i64]) -> Result<(i64, i64, i64)> {
    ensure_contract!(
        lhs.len() == 2 && rhs.len() == 2,
        "matmul expects 2-D operands, got {lhs:?} x {rhs:?}"
    );
    ensure_contract!(
        lhs[1] == rhs[0],
        "matmul inner dimensions differ: {lhs:?} x {rhs:?}"
    );
    Ok((lhs[0], lhs[1], rhs[1]))
}

pub(crate) fn prot_input_p<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    ensure_contract!(input.is_private(), "input expects a private value");
    let owner = input
        .owner()
        .ok_or_else(|| Error::Contract("private value without owner".into()))?;
    let shape = input.shape().to_vec();
    let fans = if ctx.pid() == owner {
        let fin = flatten(input.data_p()?)?;
        ctx.protocol().input_p(&fin)?
    } else {
        ctx.protocol().input_p_remote(owner, input.numel())?
    };
    Ok(Value::new().assign_s(unflatten(&fans, &shape)?))
}

pub(crate) fn prot_open_s<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    input: &Value<K, S>,
) -> Result<Value<K, S>> {
    ensure_contract!(input.is_share(), "open expects a share value");
    let shape = input.shape().to_vec();
    let fin = flatten(input.data_s()?)?;
    let fans = ctx.protocol().open_s(&fin)?;
    Ok(Value::new().assign_p(unflatten(&fans, &shape)?))
}

macro_rules! wrap_unary {
    ($fname:ident, $meth:ident, $data:ident, $assign:ident, $check:ident, $what:literal) => {
        pub(crate) fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            ensure_contract!(input.$check(), concat!($what, " expects a ", stringify!($check), " value"));
            let shape = input.shape().to_vec();
            let fin = flatten(input.$data()?)?;
            let fans = ctx.protocol().$meth(&fin)?;
            Ok(Value::new().$assign(unflatten(&fans, &shape)?))
        }
    };
}

wrap_unary!(prot_neg_p, neg_p, data_p, assign_p, is_plain, "neg_p");
wrap_unary!(prot_neg_s, neg_s, data_s, assign_s, is_share, "neg_s");
wrap_unary!(prot_msb_p, msb_p, data_p, assign_p, is_plain, "msb_p");
wrap_unary!(prot_msb_s, msb_s, data_s, assign_s, is_share, "msb_s");
wrap_unary!(prot_eqz_p, eqz_p, data_p, assign_p, is_plain, "eqz_p");
wrap_unary!(prot_eqz_s, eqz_s, data_s, assign_s, is_share, "eqz_s");

macro_rules! wrap_binary {
    ($fname:ident, $meth:ident, $ldata:ident, $rdata:ident, $assign:ident,
     $lcheck:ident, $rcheck:ident, $what:literal) => {
        pub(crate) fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            ensure_contract!(
                lhs.$lcheck() && rhs.$rcheck(),
                concat!($what, ": operand data kind mismatch")
            );
            ensure_contract!(
                lhs.shape() == rhs.shape(),
                concat!($what, ": shape mismatch {:?} vs {:?}"),
                lhs.shape(),
                rhs.shape()
            );
            let shape = lhs.shape().to_vec();
            let flhs = flatten(lhs.$ldata()?)?;
            let frhs = flatten(rhs.$rdata()?)?;
            let fans = ctx.protocol().$meth(&flhs, &frhs)?;
            Ok(Value::new().$assign(unflatten(&fans, &shape)?))
        }
    };
}

wrap_binary!(prot_add_pp, add_pp, data_p, data_p, assign_p, is_plain, is_plain, "add_pp");
wrap_binary!(prot_add_sp, add_sp, data_s, data_p, assign_s, is_share, is_plain, "add_sp");
wrap_binary!(prot_add_ss, add_ss, data_s, data_s, assign_s, is_share, is_share, "add_ss");
wrap_binary!(prot_mul_pp, mul_pp, data_p, data_p, assign_p, is_plain, is_plain, "mul_pp");
wrap_binary!(prot_mul_sp, mul_sp, data_s, data_p, assign_s, is_share, is_plain, "mul_sp");
wrap_binary!(prot_mul_ss, mul_ss, data_s, data_s, assign_s, is_share, is_share, "mul_ss");

macro_rules! wrap_matmul {
    ($fname:ident, $meth:ident, $ldata:ident, $rdata:ident, $assign:ident,
     $lcheck:ident, $rcheck:ident, $what:literal) => {
        pub(crate) fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            lhs: &Value<K, S>,
            rhs: &Value<K, S>,
        ) -> Result<Value<K, S>> {
            ensure_contract!(
                lhs.$lcheck() && rhs.$rcheck(),
                concat!($what, ": operand data kind mismatch")
            );
            let (m, n, k) = deduce_matmul_shape(lhs.shape(), rhs.shape())?;
            let flhs = flatten(lhs.$ldata()?)?;
            let frhs = flatten(rhs.$rdata()?)?;
            let fans = ctx.protocol().$meth(&flhs, &frhs, m, n, k)?;
            Ok(Value::new().$assign(unflatten(&fans, &[m, k])?))
        }
    };
}

wrap_matmul!(prot_matmul_pp, matmul_pp, data_p, data_p, assign_p, is_plain, is_plain, "matmul_pp");
wrap_matmul!(prot_matmul_sp, matmul_sp, data_s, data_p, assign_s, is_share, is_plain, "matmul_sp");
wrap_matmul!(prot_matmul_ps, matmul_ps, data_p, data_s, assign_s, is_plain, is_share, "matmul_ps");
wrap_matmul!(prot_matmul_ss, matmul_ss, data_s, data_s, assign_s, is_share, is_share, "matmul_ss");

macro_rules! wrap_shift {
    ($fname:ident, $meth:ident, $data:ident, $assign:ident, $check:ident, $what:literal) => {
        pub(crate) fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Value<K, S>> {
            ensure_contract!(input.$check(), concat!($what, ": operand data kind mismatch"));
            let shape = input.shape().to_vec();
            let fin = flatten(input.$data()?)?;
            let fans = ctx.protocol().$meth(&fin, nbits)?;
            Ok(Value::new().$assign(unflatten(&fans, &shape)?))
        }
    };
}

wrap_shift!(prot_lshift_p, lshift_p, data_p, assign_p, is_plain, "lshift_p");
wrap_shift!(prot_lshift_s, lshift_s, data_s, assign_s, is_share, "lshift_s");
wrap_shift!(prot_trunc_p, trunc_p, data_p, assign_p, is_plain, "trunc_p");
wrap_shift!(prot_trunc_s, trunc_s, data_s, assign_s, is_share, "trunc_s");

macro_rules! wrap_bitdec {
    ($fname:ident, $meth:ident, $data:ident, $assign:ident, $check:ident, $what:literal) => {
        pub(crate) fn $fname<Pr: Preprocessing, const K: u32, const S: bool>(
            ctx: &Context<Pr>,
            input: &Value<K, S>,
            nbits: u32,
        ) -> Result<Vec<Value<K, S>>> {
            ensure_contract!(input.$check(), concat!($what, ": operand data kind mismatch"));
            let shape = input.shape().to_vec();
            let fin = flatten(input.$data()?)?;
            let fans = ctx.protocol().$meth(&fin, nbits)?;
            fans.into_iter()
                .map(|arr| Ok(Value::new().$assign(unflatten(&arr, &shape)?)))
                .collect()
        }
    };
}

wrap_bitdec!(prot_bitdec_p, bitdec_p, data_p, assign_p, is_plain, "bitdec_p");
wrap_bitdec!(prot_bitdec_s, bitdec_s, data_s, assign_s, is_share, "bitdec_s");
wrap_bitdec!(prot_h1bitdec_p, h1bitdec_p, data_p, assign_p, is_plain, "h1bitdec_p");
wrap_bitdec!(prot_h1bitdec_s, h1bitdec_s, data_s, assign_s, is_share, "h1bitdec_s");
