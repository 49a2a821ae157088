//! Value construction and extraction.
//!
//! Floats are encoded with the context's fracbits target; integers get
//! fracbits 0. Private factories take the data only at the owner; the
//! other parties pass the shape and get a placeholder of the right size.

use crate::error::{ensure_contract, Result};
use crate::mpc::Preprocessing;
use crate::ndarray::NdArray;
use crate::ring::{decode_f64, encode_f64, SignedZ2, Z2};

use super::{Context, Value, Visibility};

fn numel_of(shape: &[i64]) -> i64 {
    shape.iter().product::<i64>().max(i64::from(shape.is_empty()))
}

/// A public integer constant with fracbits 0, filled to `shape`.
pub fn make_constant<Pr: Preprocessing, const K: u32, const S: bool>(
    _ctx: &Context<Pr>,
    value: i64,
    shape: &[i64],
) -> Result<Value<K, S>> {
    let arr = NdArray::filled(Z2::from(value), shape);
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Public, false)?
        .set_fracbits(0, false)
}

/// A public integer value with fracbits 0.
pub fn make_public_ints<Pr: Preprocessing, const K: u32, const S: bool>(
    _ctx: &Context<Pr>,
    data: &[i64],
    shape: &[i64],
) -> Result<Value<K, S>> {
    let arr = NdArray::from_vec(data.iter().map(|&v| Z2::from(v)).collect(), shape);
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Public, false)?
        .set_fracbits(0, false)
}

/// A public fixed-point constant encoded with the context's fracbits,
/// filled to `shape`.
pub fn make_constant_f64<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    value: f64,
    shape: &[i64],
) -> Result<Value<K, true>> {
    let fracbits = ctx.fxp_fracbits();
    let arr = NdArray::filled(encode_f64::<K>(value, fracbits), shape);
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Public, false)?
        .set_fracbits(fracbits as i64, false)
}

/// A public fixed-point value encoded with the context's fracbits.
pub fn make_public<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    data: &[f64],
    shape: &[i64],
) -> Result<Value<K, true>> {
    let fracbits = ctx.fxp_fracbits();
    let arr = NdArray::from_vec(
        data.iter().map(|&v| encode_f64::<K>(v, fracbits)).collect(),
        shape,
    );
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Public, false)?
        .set_fracbits(fracbits as i64, false)
}

/// A private integer value owned by `owner` with fracbits 0.
///
/// The owner passes `Some(data)`; everyone else passes `None` and a
/// placeholder of `shape` is used.
pub fn make_private_ints<Pr: Preprocessing, const K: u32, const S: bool>(
    ctx: &Context<Pr>,
    owner: usize,
    data: Option<&[i64]>,
    shape: &[i64],
) -> Result<Value<K, S>> {
    let arr = match data {
        Some(data) => {
            ensure_contract!(
                ctx.pid() == owner,
                "only the owner (party {owner}) may supply private data"
            );
            NdArray::from_vec(data.iter().map(|&v| Z2::from(v)).collect(), shape)
        }
        None => NdArray::filled(Z2::zero(), shape),
    };
    ensure_contract!(
        arr.numel() == numel_of(shape),
        "private data does not match shape {shape:?}"
    );
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Private(owner), false)?
        .set_fracbits(0, false)
}

/// A private fixed-point value owned by `owner`, encoded with the
/// context's fracbits.
pub fn make_private<Pr: Preprocessing, const K: u32>(
    ctx: &Context<Pr>,
    owner: usize,
    data: Option<&[f64]>,
    shape: &[i64],
) -> Result<Value<K, true>> {
    let fracbits = ctx.fxp_fracbits();
    let arr = match data {
        Some(data) => {
            ensure_contract!(
                ctx.pid() == owner,
                "only the owner (party {owner}) may supply private data"
            );
            NdArray::from_vec(
                data.iter().map(|&v| encode_f64::<K>(v, fracbits)).collect(),
                shape,
            )
        }
        None => NdArray::filled(SignedZ2::zero(), shape),
    };
    ensure_contract!(
        arr.numel() == numel_of(shape),
        "private data does not match shape {shape:?}"
    );
    Value::new()
        .assign_p(arr)
        .set_visibility(Visibility::Private(owner), false)?
        .set_fracbits(fracbits as i64, false)
}

/// Decodes an opened fixed-point value to floats using its fracbits.
pub fn to_f64_vec<const K: u32>(value: &Value<K, true>) -> Result<Vec<f64>> {
    ensure_contract!(value.is_public(), "only public values can be decoded");
    ensure_contract!(value.fracbits() >= 0, "value fracbits are unset");
    let fracbits = value.fracbits() as u32;
    Ok(value.data_p()?.iter().map(|x| decode_f64::<K>(x, fracbits)).collect())
}

/// Reads an opened integer value (fracbits 0) as signed integers.
pub fn to_int_vec<const K: u32, const S: bool>(value: &Value<K, S>) -> Result<Vec<i128>> {
    ensure_contract!(value.is_public(), "only public values can be decoded");
    ensure_contract!(
        value.fracbits() == 0,
        "expected an integer value, fracbits are {}",
        value.fracbits()
    );
    Ok(value.data_p()?.iter().map(|x| x.to_i128()).collect())
}
