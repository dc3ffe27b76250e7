//! Flat-index ↔ multi-dimensional coordinate mapping
//!
//! Every kernel in this crate addresses dense row-major buffers through a
//! flat element index. This module is the single layout authority: the flat
//! index is decomposed into per-axis coordinates (and recomposed) against an
//! explicit dimension array, so the extractors and the reducer can never
//! drift apart on layout assumptions.

/// Decompose a flat row-major index into per-axis coordinates.
///
/// `dims` lists the axis extents outermost-first; the returned coordinates
/// use the same order. The innermost axis (the last entry of `dims`) varies
/// fastest, matching the row-major tensor shapes documented on each kernel.
///
/// # Examples
///
/// ```
/// use convfold::decompose;
///
/// // Shape (2, 3, 4): flat index 17 = 1*12 + 1*4 + 1
/// assert_eq!(decompose(17, [2, 3, 4]), [1, 1, 1]);
/// // The innermost axis varies fastest
/// assert_eq!(decompose(1, [2, 3, 4]), [0, 0, 1]);
/// ```
#[inline]
pub fn decompose<const N: usize>(mut flat: usize, dims: [usize; N]) -> [usize; N] {
    let mut coords = [0usize; N];
    for axis in (0..N).rev() {
        coords[axis] = flat % dims[axis];
        flat /= dims[axis];
    }
    coords
}

/// Recompose per-axis coordinates into a flat row-major index.
///
/// Inverse of [`decompose`] for coordinates within `dims`.
///
/// # Examples
///
/// ```
/// use convfold::{decompose, flatten};
///
/// let dims = [2, 3, 4];
/// assert_eq!(flatten([1, 1, 1], dims), 17);
/// assert_eq!(flatten(decompose(23, dims), dims), 23);
/// ```
#[inline]
pub fn flatten<const N: usize>(coords: [usize; N], dims: [usize; N]) -> usize {
    let mut flat = 0usize;
    for axis in 0..N {
        debug_assert!(
            coords[axis] < dims[axis],
            "coordinate {} out of range for axis {} with extent {}",
            coords[axis],
            axis,
            dims[axis]
        );
        flat = flat * dims[axis] + coords[axis];
    }
    flat
}
