//! The unit of computation: an array paired with its visibility and
//! fixed-point scale.

use crate::error::{ensure_contract, Result};
use crate::ndarray::{NdArray, SliceArg};
use crate::network::PartyId;
use crate::ring::Z2;

use super::visibility::Visibility;

/// Payload of a [`Value`]: nothing yet, a plain array, or a share array.
///
/// Under Semi2k the share domain equals the plain domain, so both arms
/// carry the same ring.
#[derive(Clone, Debug, Default)]
pub enum ValueData<const K: u32, const S: bool> {
    /// No data assigned yet.
    #[default]
    Empty,
    /// Public or private plaintext.
    Plain(NdArray<Z2<K, S>>),
    /// This party's additive share.
    Share(NdArray<Z2<K, S>>),
}

/// An array value tagged with visibility and fractional bits.
///
/// Cheap to clone: the payload is a shared buffer handle plus scalars.
/// Visibility and fracbits are each set exactly once unless the caller
/// forces a reinterpretation.
#[derive(Clone, Debug)]
pub struct Value<const K: u32, const S: bool> {
    data: ValueData<K, S>,
    fracbits: i64,
    vis: Visibility,
}

impl<const K: u32, const S: bool> Default for Value<K, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: u32, const S: bool> Value<K, S> {
    /// An empty value with invalid visibility and unset fracbits.
    pub fn new() -> Self {
        Self { data: ValueData::Empty, fracbits: -1, vis: Visibility::Invalid }
    }

    /// Assigns plaintext data, keeping visibility and fracbits.
    pub fn assign_p(mut self, data: NdArray<Z2<K, S>>) -> Self {
        self.data = ValueData::Plain(data);
        self
    }

    /// Assigns share data, keeping visibility and fracbits.
    pub fn assign_s(mut self, data: NdArray<Z2<K, S>>) -> Self {
        self.data = ValueData::Share(data);
        self
    }

    /// The fractional bit count, `-1` while unset.
    pub fn fracbits(&self) -> i64 {
        self.fracbits
    }

    /// Sets the fractional bit count.
    ///
    /// Fails when already set, unless `force` reinterprets the scale.
    pub fn set_fracbits(mut self, fracbits: i64, force: bool) -> Result<Self> {
        ensure_contract!(fracbits >= 0, "fracbits must be non-negative, got {fracbits}");
        ensure_contract!(
            self.fracbits < 0 || force,
            "fracbits already set to {}; pass force to reinterpret",
            self.fracbits
        );
        self.fracbits = fracbits;
        Ok(self)
    }

    /// The visibility tag.
    pub fn visibility(&self) -> Visibility {
        self.vis
    }

    /// Sets the visibility.
    ///
    /// Fails when already set, unless `force` overrides it.
    pub fn set_visibility(mut self, vis: Visibility, force: bool) -> Result<Self> {
        ensure_contract!(
            self.vis.is_invalid() || force,
            "visibility already set to {:?}; pass force to override",
            self.vis
        );
        self.vis = vis;
        Ok(self)
    }

    /// Whether the value is public.
    pub fn is_public(&self) -> bool {
        self.vis.is_public()
    }

    /// Whether the value is private to one party.
    pub fn is_private(&self) -> bool {
        self.vis.is_private()
    }

    /// The owning party of a private value.
    pub fn owner(&self) -> Option<PartyId> {
        self.vis.owner()
    }

    /// Whether the payload is plaintext (public or private data).
    pub fn is_plain(&self) -> bool {
        matches!(self.data, ValueData::Plain(_))
    }

    /// Whether the payload is a share.
    pub fn is_share(&self) -> bool {
        matches!(self.data, ValueData::Share(_))
    }

    /// The plaintext payload.
    pub fn data_p(&self) -> Result<&NdArray<Z2<K, S>>> {
        match &self.data {
            ValueData::Plain(arr) => Ok(arr),
            _ => Err(crate::error::Error::Contract(
                "expected a plain value".into(),
            )),
        }
    }

    /// The share payload.
    pub fn data_s(&self) -> Result<&NdArray<Z2<K, S>>> {
        match &self.data {
            ValueData::Share(arr) => Ok(arr),
            _ => Err(crate::error::Error::Contract(
                "expected a share value".into(),
            )),
        }
    }

    fn array(&self) -> Option<&NdArray<Z2<K, S>>> {
        match &self.data {
            ValueData::Empty => None,
            ValueData::Plain(arr) | ValueData::Share(arr) => Some(arr),
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.array().map(NdArray::ndim).unwrap_or(0)
    }

    /// Number of elements.
    pub fn numel(&self) -> i64 {
        self.array().map(NdArray::numel).unwrap_or(0)
    }

    /// The shape, empty while no data is assigned.
    pub fn shape(&self) -> &[i64] {
        self.array().map(NdArray::shape).unwrap_or(&[])
    }

    /// The strides, empty while no data is assigned.
    pub fn strides(&self) -> &[i64] {
        self.array().map(NdArray::strides).unwrap_or(&[])
    }

    /// Buffer offset of the view.
    pub fn offset(&self) -> i64 {
        self.array().map(NdArray::offset).unwrap_or(0)
    }

    fn map_data(
        &self,
        f: impl FnOnce(&NdArray<Z2<K, S>>) -> Result<NdArray<Z2<K, S>>>,
    ) -> Result<Self> {
        let mapped = match &self.data {
            ValueData::Empty => ValueData::Empty,
            ValueData::Plain(arr) => ValueData::Plain(f(arr)?),
            ValueData::Share(arr) => ValueData::Share(f(arr)?),
        };
        Ok(Self { data: mapped, fracbits: self.fracbits, vis: self.vis })
    }

    /// Deep copy of the payload into a fresh compact buffer.
    pub fn copy(&self) -> Result<Self> {
        self.map_data(|arr| Ok(arr.copy()))
    }

    /// Slices the payload; visibility and fracbits carry over.
    pub fn slice(&self, args: &[SliceArg]) -> Result<Self> {
        self.map_data(|arr| arr.slice(args))
    }

    /// Reshapes the payload.
    pub fn reshape(&self, new_shape: &[i64]) -> Result<Self> {
        self.map_data(|arr| arr.reshape(new_shape))
    }

    /// Transposes the payload.
    pub fn transpose(&self) -> Result<Self> {
        self.map_data(|arr| Ok(arr.transpose()))
    }

    /// Broadcasts the payload to a wider shape.
    pub fn broadcast_to(&self, new_shape: &[i64]) -> Result<Self> {
        self.map_data(|arr| arr.broadcast_to(new_shape))
    }

    /// Gathers elements of a 1-D payload.
    pub fn permute(&self, indices: &[i64]) -> Result<Self> {
        self.map_data(|arr| arr.permute(indices))
    }

    /// Replaces elements of a 1-D payload at `indices` with `values`.
    pub fn substitute(&self, indices: &[i64], values: &Self) -> Result<Self> {
        ensure_contract!(
            self.is_plain() == values.is_plain(),
            "substitute requires matching plain/share payloads"
        );
        let other = match values.array() {
            Some(arr) => arr,
            None => {
                return Err(crate::error::Error::Contract(
                    "substitute with an empty value".into(),
                ))
            }
        };
        self.map_data(|arr| arr.substitute(indices, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::SignedZ2;

    type V = Value<32, true>;

    fn plain(data: &[i64]) -> V {
        let arr = NdArray::from_vec(
            data.iter().map(|&v| SignedZ2::from(v)).collect(),
            &[data.len() as i64],
        );
        V::new().assign_p(arr)
    }

    #[test]
    fn test_visibility_set_once() {
        let v = plain(&[1, 2]).set_visibility(Visibility::Public, false).unwrap();
        assert!(v.is_public());
        assert!(v.clone().set_visibility(Visibility::Share, false).is_err());
        let forced = v.set_visibility(Visibility::Share, true).unwrap();
        assert!(forced.visibility().is_share());
    }

    #[test]
    fn test_fracbits_set_once() {
        let v = plain(&[1]).set_fracbits(10, false).unwrap();
        assert_eq!(v.fracbits(), 10);
        assert!(v.clone().set_fracbits(12, false).is_err());
        assert_eq!(v.set_fracbits(12, true).unwrap().fracbits(), 12);
    }

    #[test]
    fn test_plain_share_discrimination() {
        let v = plain(&[1, 2, 3]);
        assert!(v.is_plain() && !v.is_share());
        assert!(v.data_p().is_ok());
        assert!(v.data_s().is_err());
        let s = V::new().assign_s(NdArray::filled(SignedZ2::zero(), &[3]));
        assert!(s.is_share());
        assert!(s.data_p().is_err());
    }

    #[test]
    fn test_shape_ops_preserve_tags() {
        let v = plain(&[1, 2, 3, 4, 5, 6])
            .set_visibility(Visibility::Private(1), false)
            .unwrap()
            .set_fracbits(4, false)
            .unwrap();
        let r = v.reshape(&[2, 3]).unwrap();
        assert_eq!(r.shape(), &[2, 3]);
        assert_eq!(r.fracbits(), 4);
        assert_eq!(r.owner(), Some(1));
        let t = r.transpose().unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        let idx = [5, 4, 3, 2, 1, 0];
        let p = v.permute(&idx).unwrap();
        let back = v.substitute(&idx, &p).unwrap();
        assert_eq!(
            back.data_p().unwrap().to_vec(),
            v.data_p().unwrap().to_vec()
        );
    }

    #[test]
    fn test_empty_value() {
        let v = V::new();
        assert_eq!(v.numel(), 0);
        assert!(v.shape().is_empty());
        assert!(v.visibility().is_invalid());
        assert_eq!(v.fracbits(), -1);
    }
}
