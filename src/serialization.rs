//! Length-framed binary serialization.
//!
//! Every value is a concatenation of fields: trivially serializable
//! scalars as `ceil(bits / 8)` little-endian bytes, containers as a
//! `u64` count followed by their elements, strings as length plus UTF-8,
//! tuples in declaration order, and arrays as their shape vector
//! followed by the elements in row-major order. Short reads surface as
//! [`Error::Decode`], never as silent truncation.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::ndarray::NdArray;
use crate::ring::{Fixed, Z2};

/// Accumulates encoded fields into a byte buffer.
#[derive(Default)]
pub struct Serializer {
    buf: Vec<u8>,
}

impl Serializer {
    /// Empty serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one encodable value.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }

    /// Appends raw bytes verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the serializer, yielding the encoded payload.
    pub fn finalize(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Reads encoded fields back out of a byte buffer.
pub struct Deserializer {
    buf: Vec<u8>,
    pos: usize,
}

impl Deserializer {
    /// Wraps a received payload.
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// Decodes the next value.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode(self)
    }

    /// Takes the next `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Decode(format!(
                "short read: wanted {n} bytes, {} left",
                self.buf.len() - self.pos
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// A value with a defined wire representation.
pub trait Encode {
    /// Appends this value to the serializer.
    fn encode(&self, s: &mut Serializer);
}

/// A value reconstructible from its wire representation.
pub trait Decode: Sized {
    /// Reads one value off the deserializer.
    fn decode(d: &mut Deserializer) -> Result<Self>;
}

macro_rules! trivial_int {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode(&self, s: &mut Serializer) {
                s.write_bytes(&self.to_le_bytes());
            }
        }
        impl Decode for $t {
            fn decode(d: &mut Deserializer) -> Result<Self> {
                let bytes = d.read_bytes(std::mem::size_of::<$t>())?;
                Ok(<$t>::from_le_bytes(bytes.try_into().expect("sized read")))
            }
        }
    )*};
}

trivial_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl Encode for bool {
    fn encode(&self, s: &mut Serializer) {
        s.write_bytes(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok(d.read_bytes(1)?[0] != 0)
    }
}

impl Encode for usize {
    fn encode(&self, s: &mut Serializer) {
        (*self as u64).encode(s);
    }
}

impl Decode for usize {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok(u64::decode(d)? as usize)
    }
}

impl Encode for str {
    fn encode(&self, s: &mut Serializer) {
        (self.len() as u64).encode(s);
        s.write_bytes(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, s: &mut Serializer) {
        self.as_str().encode(s);
    }
}

impl Decode for String {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        let len = u64::decode(d)? as usize;
        let bytes = d.read_bytes(len)?.to_vec();
        String::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid utf-8: {e}")))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, s: &mut Serializer) {
        (self.len() as u64).encode(s);
        for item in self {
            item.encode(s);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        let len = u64::decode(d)? as usize;
        let mut out = Vec::with_capacity(len.min(d.remaining()));
        for _ in 0..len {
            out.push(T::decode(d)?);
        }
        Ok(out)
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, s: &mut Serializer) {
        self.0.encode(s);
        self.1.encode(s);
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok((A::decode(d)?, B::decode(d)?))
    }
}

impl<A: Encode, B: Encode, C: Encode> Encode for (A, B, C) {
    fn encode(&self, s: &mut Serializer) {
        self.0.encode(s);
        self.1.encode(s);
        self.2.encode(s);
    }
}

impl<A: Decode, B: Decode, C: Decode> Decode for (A, B, C) {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok((A::decode(d)?, B::decode(d)?, C::decode(d)?))
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, s: &mut Serializer) {
        (self.len() as u64).encode(s);
        for (k, v) in self {
            k.encode(s);
            v.encode(s);
        }
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        let len = u64::decode(d)? as usize;
        let mut out = BTreeMap::new();
        for _ in 0..len {
            out.insert(K::decode(d)?, V::decode(d)?);
        }
        Ok(out)
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, s: &mut Serializer) {
        (self.len() as u64).encode(s);
        for item in self {
            item.encode(s);
        }
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        let len = u64::decode(d)? as usize;
        let mut out = BTreeSet::new();
        for _ in 0..len {
            out.insert(T::decode(d)?);
        }
        Ok(out)
    }
}

impl<const K: u32, const S: bool> Encode for Z2<K, S> {
    /// K-bit two's-complement little-endian packing, `ceil(K / 8)` bytes.
    fn encode(&self, s: &mut Serializer) {
        s.write_bytes(&self.to_le_bytes()[..Self::N_BYTES]);
    }
}

impl<const K: u32, const S: bool> Decode for Z2<K, S> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok(Self::from_le_slice(d.read_bytes(Self::N_BYTES)?))
    }
}

impl<const K: u32, const D: u32> Encode for Fixed<K, D> {
    fn encode(&self, s: &mut Serializer) {
        self.underlying().encode(s);
    }
}

impl<const K: u32, const D: u32> Decode for Fixed<K, D> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        Ok(Self::from_underlying(Decode::decode(d)?))
    }
}

impl<T: Copy + Encode> Encode for NdArray<T> {
    /// Shape vector, then the elements in row-major order.
    fn encode(&self, s: &mut Serializer) {
        let shape: Vec<u64> = self.shape().iter().map(|&d| d as u64).collect();
        shape.encode(s);
        for item in self.iter() {
            item.encode(s);
        }
    }
}

impl<T: Copy + Decode> Decode for NdArray<T> {
    fn decode(d: &mut Deserializer) -> Result<Self> {
        let shape: Vec<u64> = Vec::decode(d)?;
        let shape: Vec<i64> = shape.into_iter().map(|d| d as i64).collect();
        let numel: i64 = shape.iter().product::<i64>().max(i64::from(shape.is_empty()));
        let mut data = Vec::with_capacity(numel as usize);
        for _ in 0..numel {
            data.push(T::decode(d)?);
        }
        Ok(NdArray::from_vec(data, &shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::SignedZ2;

    fn round_trip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut s = Serializer::new();
        s.write(&value);
        let mut d = Deserializer::new(s.finalize().to_vec());
        let back: T = d.read().unwrap();
        assert_eq!(back, value);
        assert_eq!(d.remaining(), 0);
    }

    #[test]
    fn test_scalar_round_trips() {
        round_trip(0xdead_beefu32);
        round_trip(-12345i64);
        round_trip(u128::MAX);
        round_trip(true);
        round_trip(String::from("Party0"));
    }

    #[test]
    fn test_container_round_trips() {
        round_trip(vec![1u16, 2, 3]);
        round_trip((7u8, String::from("x")));
        round_trip((1u64, 2u64, 3u64));
        let mut m = BTreeMap::new();
        m.insert(String::from("a"), 1u32);
        m.insert(String::from("b"), 2u32);
        round_trip(m);
        round_trip(BTreeSet::from([5u8, 9]));
    }

    #[test]
    fn test_ring_round_trip_and_width() {
        let x = SignedZ2::<66>::from(-3i64);
        let mut s = Serializer::new();
        s.write(&x);
        assert_eq!(s.len(), 9); // ceil(66 / 8)
        round_trip(x);
        round_trip(SignedZ2::<128>::from(i128::MIN));
        round_trip(crate::ring::UnsignedZ2::<1>::one());
    }

    #[test]
    fn test_ndarray_round_trip() {
        let arr = NdArray::from_vec((0..6i64).map(SignedZ2::<32>::from).collect(), &[2, 3]);
        round_trip(arr);
    }

    #[test]
    fn test_short_read_is_error() {
        let mut s = Serializer::new();
        s.write(&7u64);
        let mut bytes = s.finalize().to_vec();
        bytes.truncate(3);
        let mut d = Deserializer::new(bytes);
        assert!(matches!(d.read::<u64>(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_field_concatenation() {
        let mut s = Serializer::new();
        s.write(&1u8).write(&2u16);
        assert_eq!(s.finalize().to_vec(), vec![1, 2, 0]);
    }
}
