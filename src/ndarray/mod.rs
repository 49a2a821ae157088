//! Multidimensional array views over shared buffers.
//!
//! An [`NdArray`] is a reference-counted contiguous buffer plus
//! `(shape, strides, offset)`. Views returned by [`NdArray::slice`],
//! [`NdArray::reshape`] (on linear strides), [`NdArray::transpose`] and
//! [`NdArray::broadcast_to`] alias the same buffer; writes through one
//! view are visible through every alias. Copy-on-write happens only at
//! the API boundary ([`NdArray::copy`], [`NdArray::make_unique`]).

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::error::{ensure_contract, Result};

mod iter;

pub use iter::{LinearIter, NdIter};

/// Shared element storage.
///
/// The buffer is interior-mutable so that aliasing views can write
/// through it, mirroring a shared-pointer array. Callers must not write
/// the same element from two threads at once; a protocol context drives
/// its arrays from a single logical task.
pub struct Buffer<T> {
    cells: Box<[UnsafeCell<T>]>,
}

unsafe impl<T: Send> Send for Buffer<T> {}
unsafe impl<T: Send + Sync> Sync for Buffer<T> {}

impl<T: Copy> Buffer<T> {
    fn from_vec(data: Vec<T>) -> Self {
        Self { cells: data.into_iter().map(UnsafeCell::new).collect() }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        unsafe { *self.cells[index].get() }
    }

    #[inline]
    fn set(&self, index: usize, value: T) {
        unsafe {
            *self.cells[index].get() = value;
        }
    }

    fn snapshot(&self) -> Vec<T> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// A slice specification for one dimension: `start..stop` by `step`.
///
/// Unset fields take python-style defaults; negative values count from
/// the end of the dimension, and a negative step reverses it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Slice {
    /// First index, default 0 (or the last index for negative steps).
    pub start: Option<i64>,
    /// One-past-last index, default the dimension size.
    pub stop: Option<i64>,
    /// Step, default 1; must be non-zero.
    pub step: Option<i64>,
}

impl Slice {
    /// Full-dimension slice.
    pub fn all() -> Self {
        Self::default()
    }

    /// Slice from `start` to the end of the dimension.
    pub fn from(start: i64) -> Self {
        Self { start: Some(start), stop: None, step: None }
    }

    /// Slice of `start..stop`.
    pub fn range(start: i64, stop: i64) -> Self {
        Self { start: Some(start), stop: Some(stop), step: None }
    }

    /// Slice of `start..stop` with an explicit step.
    pub fn range_step(start: i64, stop: i64, step: i64) -> Self {
        Self { start: Some(start), stop: Some(stop), step: Some(step) }
    }
}

/// One indexing argument: keep a dimension through a [`Slice`] or drop
/// it with an integer index.
#[derive(Clone, Copy, Debug)]
pub enum SliceArg {
    /// Keep the dimension, restricted by the slice.
    Range(Slice),
    /// Drop the dimension at this index (negative counts from the end).
    Index(i64),
}

/// Row-major strides of a compact array with the given shape.
pub fn compact_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = vec![0i64; shape.len()];
    let mut acc = 1i64;
    for d in (0..shape.len()).rev() {
        strides[d] = acc;
        acc *= shape[d].max(0);
    }
    strides
}

fn numel_of(shape: &[i64]) -> i64 {
    shape.iter().product::<i64>().max(if shape.is_empty() { 1 } else { 0 })
}

/// Multidimensional view of a shared buffer.
#[derive(Clone)]
pub struct NdArray<T: Copy> {
    buffer: Arc<Buffer<T>>,
    shape: Vec<i64>,
    strides: Vec<i64>,
    offset: i64,
}

impl<T: Copy> NdArray<T> {
    /// Builds a compact array from `data` with the given shape.
    pub fn from_vec(data: Vec<T>, shape: &[i64]) -> Self {
        assert_eq!(
            data.len() as i64,
            numel_of(shape),
            "buffer of {} elements cannot take shape {:?}",
            data.len(),
            shape
        );
        let strides = compact_strides(shape);
        Self {
            buffer: Arc::new(Buffer::from_vec(data)),
            shape: shape.to_vec(),
            strides,
            offset: 0,
        }
    }

    /// Builds a compact array holding `value` everywhere.
    pub fn filled(value: T, shape: &[i64]) -> Self {
        Self::from_vec(vec![value; numel_of(shape) as usize], shape)
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements, the product of the shape.
    pub fn numel(&self) -> i64 {
        numel_of(&self.shape)
    }

    /// The shape vector.
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// The strides vector; a stride of 0 denotes broadcasting.
    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    /// Offset of the first element inside the buffer.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Whether this view and `other` share one buffer.
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Whether strides are row-major compact and the offset zero.
    pub fn is_compact(&self) -> bool {
        self.offset == 0 && self.strides == compact_strides(&self.shape)
    }

    /// Whether strides equal `s * compact_strides(shape)` for some `s`.
    pub fn is_linear(&self) -> bool {
        let compact = compact_strides(&self.shape);
        let scale = match self.strides.last() {
            Some(&s) => s,
            None => return true,
        };
        self.strides.iter().zip(compact.iter()).all(|(&st, &c)| st == scale * c)
    }

    fn normalize_index(&self, dim: usize, index: i64) -> i64 {
        let len = self.shape[dim];
        let norm = if index < 0 { index + len } else { index };
        assert!(
            (0..len).contains(&norm),
            "index {index} out of bounds for dimension {dim} of size {len}"
        );
        norm
    }

    fn buffer_index(&self, index: &[i64]) -> usize {
        assert_eq!(
            index.len(),
            self.ndim(),
            "expected {} indices, got {}",
            self.ndim(),
            index.len()
        );
        let mut pos = self.offset;
        for (d, &i) in index.iter().enumerate() {
            pos += self.normalize_index(d, i) * self.strides[d];
        }
        pos as usize
    }

    /// Bounds-checked element read; negative indices count from the end.
    pub fn elem(&self, index: &[i64]) -> T {
        self.buffer.get(self.buffer_index(index))
    }

    /// Bounds-checked element write, visible through every alias.
    pub fn set_elem(&self, index: &[i64], value: T) {
        self.buffer.set(self.buffer_index(index), value);
    }

    /// 1-D element read.
    pub fn get(&self, index: i64) -> T {
        self.elem(&[index])
    }

    /// Clones the buffer if other views share it, making this view the
    /// sole owner of its storage.
    pub fn make_unique(&mut self) {
        if Arc::strong_count(&self.buffer) > 1 {
            *self = self.copy();
        }
    }

    /// New view of the same buffer restricted by `args`.
    ///
    /// Integer arguments drop their dimension. Never allocates.
    pub fn slice(&self, args: &[SliceArg]) -> Result<Self> {
        ensure_contract!(
            args.len() <= self.ndim(),
            "slice takes at most {} arguments, got {}",
            self.ndim(),
            args.len()
        );
        let mut shape = Vec::new();
        let mut strides = Vec::new();
        let mut offset = self.offset;
        for (d, arg) in args.iter().enumerate() {
            match arg {
                SliceArg::Index(i) => {
                    offset += self.normalize_index(d, *i) * self.strides[d];
                }
                SliceArg::Range(sl) => {
                    let (start, count, step) = resolve_slice(self.shape[d], sl)?;
                    offset += start * self.strides[d];
                    shape.push(count);
                    strides.push(self.strides[d] * step);
                }
            }
        }
        for d in args.len()..self.ndim() {
            shape.push(self.shape[d]);
            strides.push(self.strides[d]);
        }
        Ok(Self { buffer: self.buffer.clone(), shape, strides, offset })
    }

    /// Reinterprets the elements under a new shape.
    ///
    /// Shares the buffer when the strides are linear; otherwise the
    /// elements are materialized into a fresh compact buffer first.
    pub fn reshape(&self, new_shape: &[i64]) -> Result<Self> {
        ensure_contract!(
            numel_of(new_shape) == self.numel(),
            "cannot reshape {:?} ({} elements) into {:?}",
            self.shape,
            self.numel(),
            new_shape
        );
        if self.is_linear() {
            let scale = self.strides.last().copied().unwrap_or(1);
            let strides: Vec<i64> =
                compact_strides(new_shape).iter().map(|&c| c * scale).collect();
            Ok(Self {
                buffer: self.buffer.clone(),
                shape: new_shape.to_vec(),
                strides,
                offset: self.offset,
            })
        } else {
            self.copy().reshape(new_shape)
        }
    }

    /// Broadcasts to `new_shape`, padding the shape with leading ones
    /// and giving size-1 dimensions a stride of 0. Never allocates.
    pub fn broadcast_to(&self, new_shape: &[i64]) -> Result<Self> {
        ensure_contract!(
            new_shape.len() >= self.ndim(),
            "cannot broadcast {:?} to lower-rank {:?}",
            self.shape,
            new_shape
        );
        let pad = new_shape.len() - self.ndim();
        let mut strides = vec![0i64; new_shape.len()];
        for d in 0..self.ndim() {
            let src = self.shape[d];
            let dst = new_shape[pad + d];
            if src == dst {
                strides[pad + d] = self.strides[d];
            } else {
                ensure_contract!(
                    src == 1,
                    "cannot broadcast dimension of size {src} to {dst}"
                );
                strides[pad + d] = 0;
            }
        }
        Ok(Self {
            buffer: self.buffer.clone(),
            shape: new_shape.to_vec(),
            strides,
            offset: self.offset,
        })
    }

    /// Reverses shape and strides.
    pub fn transpose(&self) -> Self {
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.reverse();
        strides.reverse();
        Self { buffer: self.buffer.clone(), shape, strides, offset: self.offset }
    }

    /// Gathers `out[i] = self[indices[i]]` into a compact 1-D array.
    pub fn permute(&self, indices: &[i64]) -> Result<Self> {
        ensure_contract!(self.ndim() == 1, "permute expects a 1-D array");
        let data = indices.iter().map(|&i| self.get(i)).collect();
        Ok(Self::from_vec(data, &[indices.len() as i64]))
    }

    /// Compact 1-D copy with positions `indices[i]` replaced by
    /// `values[i]`.
    pub fn substitute(&self, indices: &[i64], values: &Self) -> Result<Self> {
        ensure_contract!(self.ndim() == 1, "substitute expects a 1-D array");
        ensure_contract!(
            indices.len() as i64 == values.numel(),
            "substitute got {} indices for {} values",
            indices.len(),
            values.numel()
        );
        let ans = self.copy();
        for (slot, &i) in indices.iter().enumerate() {
            ans.set_elem(&[i], values.get(slot as i64));
        }
        Ok(ans)
    }

    /// This view if already compact, otherwise a compact copy.
    pub fn compact(&self) -> Self {
        if self.is_compact() {
            self.clone()
        } else {
            self.copy()
        }
    }

    /// Fresh compact buffer holding the elements in row-major order.
    pub fn copy(&self) -> Self {
        Self::from_vec(self.iter().collect(), &self.shape)
    }

    /// Row-major iterator over the elements, valid for any strides.
    pub fn iter(&self) -> NdIter<'_, T> {
        NdIter::new(self)
    }

    /// Fast iterator stepping by the innermost stride.
    ///
    /// Returns `None` when the strides are not linear.
    pub fn linear_iter(&self) -> Option<LinearIter<'_, T>> {
        if self.is_linear() {
            Some(LinearIter::new(self))
        } else {
            None
        }
    }

    /// Elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Elementwise construction of a fresh compact array.
    pub fn map<U: Copy>(&self, f: impl FnMut(T) -> U) -> NdArray<U> {
        NdArray::from_vec(self.iter().map(f).collect(), &self.shape)
    }

    /// Elementwise combination of two equally shaped arrays.
    pub fn zip_map<U: Copy, V: Copy>(
        &self,
        other: &NdArray<U>,
        mut f: impl FnMut(T, U) -> V,
    ) -> NdArray<V> {
        assert_eq!(
            self.shape, other.shape,
            "zip_map over mismatched shapes {:?} and {:?}",
            self.shape, other.shape
        );
        let data = self.iter().zip(other.iter()).map(|(a, b)| f(a, b)).collect();
        NdArray::from_vec(data, &self.shape)
    }

    pub(crate) fn buffer(&self) -> &Buffer<T> {
        &self.buffer
    }

    /// Buffer snapshot in storage order, used by tests and benches.
    pub fn buffer_to_vec(&self) -> Vec<T> {
        self.buffer.snapshot()
    }
}

impl<T: Copy + PartialEq> PartialEq for NdArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.iter().eq(other.iter())
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for NdArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NdArray{:?}{:?}", self.shape, self.to_vec())
    }
}

/// Concatenates arrays of matching shapes along `axis` into a compact
/// array.
pub fn concatenate<T: Copy + Default>(arrays: &[NdArray<T>], axis: usize) -> Result<NdArray<T>> {
    ensure_contract!(!arrays.is_empty(), "concatenate of zero arrays");
    let ndim = arrays[0].ndim();
    ensure_contract!(axis < ndim, "concatenate axis {axis} out of range");
    let mut out_shape = arrays[0].shape().to_vec();
    out_shape[axis] = 0;
    for arr in arrays {
        ensure_contract!(arr.ndim() == ndim, "concatenate rank mismatch");
        for d in 0..ndim {
            ensure_contract!(
                d == axis || arr.shape()[d] == arrays[0].shape()[d],
                "concatenate shape mismatch on dimension {d}"
            );
        }
        out_shape[axis] += arr.shape()[axis];
    }

    let out = NdArray::filled(T::default(), &out_shape);
    let mut base = 0i64;
    for arr in arrays {
        let mut index = vec![0i64; ndim];
        for _ in 0..arr.numel() {
            let mut out_index = index.clone();
            out_index[axis] += base;
            out.set_elem(&out_index, arr.elem(&index));
            for d in (0..ndim).rev() {
                index[d] += 1;
                if index[d] < arr.shape()[d] {
                    break;
                }
                index[d] = 0;
            }
        }
        base += arr.shape()[axis];
    }
    Ok(out)
}

fn resolve_slice(len: i64, sl: &Slice) -> Result<(i64, i64, i64)> {
    let step = sl.step.unwrap_or(1);
    ensure_contract!(step != 0, "slice step must be non-zero");
    let norm = |v: i64| if v < 0 { v + len } else { v };
    if step > 0 {
        let start = sl.start.map(norm).unwrap_or(0).clamp(0, len);
        let stop = sl.stop.map(norm).unwrap_or(len).clamp(0, len);
        let count = if stop > start { (stop - start + step - 1) / step } else { 0 };
        Ok((start, count, step))
    } else {
        let start = sl.start.map(norm).unwrap_or(len - 1).clamp(-1, len - 1);
        let stop = sl.stop.map(norm).unwrap_or(-1).clamp(-1, len - 1);
        let count = if start > stop { (start - stop - step - 1) / -step } else { 0 };
        Ok((start, count, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(n: i64) -> NdArray<i64> {
        NdArray::from_vec((0..n).collect(), &[n])
    }

    #[test]
    fn test_reshape_shares_buffer() {
        let a = arange(12);
        let b = a.reshape(&[3, 4]).unwrap();
        assert!(a.shares_buffer_with(&b));
        assert_eq!(b.elem(&[1, 2]), 6);
        let c = b.reshape(b.shape()).unwrap();
        assert!(c.shares_buffer_with(&b));
    }

    #[test]
    fn test_reshape_materializes_nonlinear() {
        let a = arange(12).reshape(&[3, 4]).unwrap();
        let t = a.transpose();
        let r = t.reshape(&[12]).unwrap();
        assert!(!r.shares_buffer_with(&a));
        assert_eq!(r.to_vec(), vec![0, 4, 8, 1, 5, 9, 2, 6, 10, 3, 7, 11]);
    }

    #[test]
    fn test_slice_offsets() {
        let a = arange(10);
        let s = a.slice(&[SliceArg::Range(Slice::from(3))]).unwrap();
        assert_eq!(s.numel(), 7);
        for j in 0..7 {
            assert_eq!(s.get(j), a.get(3 + j));
        }
        assert!(s.shares_buffer_with(&a));
    }

    #[test]
    fn test_slice_negative_step() {
        let a = arange(5);
        let rev = a
            .slice(&[SliceArg::Range(Slice { step: Some(-1), ..Slice::default() })])
            .unwrap();
        assert_eq!(rev.to_vec(), vec![4, 3, 2, 1, 0]);
        let evens = a
            .slice(&[SliceArg::Range(Slice::range_step(0, 5, 2))])
            .unwrap();
        assert_eq!(evens.to_vec(), vec![0, 2, 4]);
    }

    #[test]
    fn test_slice_integer_drops_dimension() {
        let a = arange(12).reshape(&[3, 4]).unwrap();
        let row = a.slice(&[SliceArg::Index(1)]).unwrap();
        assert_eq!(row.shape(), &[4]);
        assert_eq!(row.to_vec(), vec![4, 5, 6, 7]);
        let last = a.slice(&[SliceArg::Index(-1), SliceArg::Index(-1)]).unwrap();
        assert_eq!(last.ndim(), 0);
        assert_eq!(last.elem(&[]), 11);
    }

    #[test]
    fn test_broadcast_never_allocates() {
        let a = arange(4);
        let b = a.broadcast_to(&[3, 4]).unwrap();
        assert!(b.shares_buffer_with(&a));
        assert_eq!(b.strides()[0], 0);
        assert_eq!(b.elem(&[2, 3]), 3);
        assert_eq!(b.numel(), 12);
        assert!(arange(3).broadcast_to(&[2, 4]).is_err());
    }

    #[test]
    fn test_transpose() {
        let a = arange(6).reshape(&[2, 3]).unwrap();
        let t = a.transpose();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.elem(&[2, 1]), a.elem(&[1, 2]));
    }

    #[test]
    fn test_permute_substitute_round_trip() {
        let a = arange(6);
        let idx = [5, 3, 0, 1, 4, 2];
        let p = a.permute(&idx).unwrap();
        assert_eq!(p.to_vec(), vec![5, 3, 0, 1, 4, 2]);
        let back = a.substitute(&idx, &p).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_compact_copy_identity() {
        let a = arange(8);
        assert!(a.is_compact());
        assert!(a.compact().shares_buffer_with(&a));
        let rev = a
            .slice(&[SliceArg::Range(Slice { step: Some(-1), ..Slice::default() })])
            .unwrap();
        assert!(!rev.is_compact());
        let c = rev.compact();
        assert!(!c.shares_buffer_with(&a));
        assert_eq!(c, rev);
    }

    #[test]
    fn test_aliasing_writes() {
        let a = arange(6);
        let view = a.slice(&[SliceArg::Range(Slice::from(2))]).unwrap();
        view.set_elem(&[0], 99);
        assert_eq!(a.get(2), 99);
        let mut unique = a.clone();
        unique.make_unique();
        unique.set_elem(&[0], -1);
        assert_eq!(a.get(0), 0);
    }

    #[test]
    fn test_linear_iterator() {
        let a = arange(10);
        let s = a.slice(&[SliceArg::Range(Slice::range_step(1, 10, 3))]).unwrap();
        assert!(s.is_linear());
        let via_linear: Vec<_> = s.linear_iter().unwrap().collect();
        assert_eq!(via_linear, vec![1, 4, 7]);
        let t = arange(6).reshape(&[2, 3]).unwrap().transpose();
        assert!(t.linear_iter().is_none());
    }

    #[test]
    fn test_map_zip_map() {
        let a = arange(4);
        let b = a.map(|x| x * 10);
        assert_eq!(b.to_vec(), vec![0, 10, 20, 30]);
        let c = a.zip_map(&b, |x, y| x + y);
        assert_eq!(c.to_vec(), vec![0, 11, 22, 33]);
    }

    #[test]
    fn test_concatenate() {
        let a = arange(2);
        let b = arange(3).map(|x| x + 10);
        let c = concatenate(&[a, b], 0).unwrap();
        assert_eq!(c.to_vec(), vec![0, 1, 10, 11, 12]);

        let m = arange(4).reshape(&[2, 2]).unwrap();
        let n = arange(2).reshape(&[2, 1]).unwrap();
        let cols = concatenate(&[m.clone(), n], 1).unwrap();
        assert_eq!(cols.shape(), &[2, 3]);
        assert_eq!(cols.to_vec(), vec![0, 1, 0, 2, 3, 1]);
        assert!(concatenate(&[m, arange(3).reshape(&[3, 1]).unwrap()], 1).is_err());
    }
}
