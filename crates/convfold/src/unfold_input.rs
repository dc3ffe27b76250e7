//! Forward unfold (im2col): image → patches
//!
//! Rearranges sliding-window patches of a 4D image into a 6D patches tensor
//! so that the convolution itself reduces to one dense matrix multiply per
//! batch element. Each destination element is owned by exactly one unit of
//! work; taps that fall outside the (zero-padded) image are simply never
//! written, so the destination **must be zero-filled by the caller** before
//! every invocation.

use scirs2_core::numeric::{Num, Zero};

use crate::error::{ensure_len, KernelError, KernelResult};
use crate::geometry::ConvGeometry;
use crate::shape::{decompose, flatten};

const KERNEL_NAME: &str = "unfold_input";

/// Extract forward convolution patches from an image.
///
/// Fills `patches`, row-major shape
/// `(batch, chan_in, kernel, kernel, h_out, w_out)`, such that element
/// `(b, c, k1, k2, oh, ow)` equals image element `(b, c, y, x)` with
/// `y = oh·stride + k1 − padding` and `x = ow·stride + k2 − padding`,
/// whenever `y` and `x` fall inside the image. Out-of-range taps are
/// skipped, not clamped: the destination keeps its prior value there.
///
/// `image` has row-major shape `(batch, chan_in, h_in, w_in)`.
///
/// # Preconditions
///
/// `patches` must be zero-filled immediately before the call (asserted in
/// debug builds), and the geometry must satisfy the output-size formula —
/// an inconsistent descriptor produces wrong patches, not an error.
///
/// # Errors
///
/// Returns an error if either buffer length disagrees with the geometry, or
/// if the geometry has a zero dimension.
///
/// # Complexity
///
/// Time: O(batch · chan_in · kernel² · h_out · w_out)
///
/// # Examples
///
/// ```
/// use convfold::{unfold_input, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(1, 1, 1, 3, 3, 2, 1, 0);
/// let image: Vec<f32> = (1..=9).map(|v| v as f32).collect();
/// let mut patches = vec![0.0f32; geom.input_patches_len()];
/// unfold_input(&geom, &image, &mut patches).unwrap();
///
/// // Patch element (k1=0, k2=0, oh=0, ow=0) is image element (0, 0)
/// assert_eq!(patches[0], 1.0);
/// // Patch element (k1=1, k2=1, oh=1, ow=1) is image element (2, 2)
/// assert_eq!(patches[geom.input_patches_len() - 1], 9.0);
/// ```
pub fn unfold_input<T>(geom: &ConvGeometry, image: &[T], patches: &mut [T]) -> KernelResult<()>
where
    T: Copy + Num,
{
    validate(geom, image.len(), patches.len())?;
    debug_assert!(
        patches.iter().all(Zero::is_zero),
        "{}: destination must be zero-filled before extraction",
        KERNEL_NAME
    );

    let dims = [
        geom.batch,
        geom.chan_in,
        geom.kernel,
        geom.kernel,
        geom.h_out,
        geom.w_out,
    ];
    let image_dims = [geom.batch, geom.chan_in, geom.h_in, geom.w_in];

    for (idx, dst) in patches.iter_mut().enumerate() {
        let [b, c, k1, k2, oh, ow] = decompose(idx, dims);
        let y = match source_coord(oh, k1, geom.stride, geom.padding, geom.h_in) {
            Some(y) => y,
            None => continue,
        };
        let x = match source_coord(ow, k2, geom.stride, geom.padding, geom.w_in) {
            Some(x) => x,
            None => continue,
        };
        *dst = image[flatten([b, c, y, x], image_dims)];
    }
    Ok(())
}

/// Parallel variant of [`unfold_input`].
///
/// Splits the destination into disjoint rows along the innermost spatial
/// axis; output is bit-identical to the serial version.
///
/// # Examples
///
/// ```
/// use convfold::{unfold_input, unfold_input_parallel, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(2, 3, 1, 5, 5, 3, 1, 1);
/// let image: Vec<f32> = (0..geom.image_len()).map(|v| v as f32).collect();
///
/// let mut serial = vec![0.0f32; geom.input_patches_len()];
/// unfold_input(&geom, &image, &mut serial).unwrap();
///
/// let mut parallel = vec![0.0f32; geom.input_patches_len()];
/// unfold_input_parallel(&geom, &image, &mut parallel).unwrap();
///
/// assert_eq!(serial, parallel);
/// ```
#[cfg(feature = "parallel")]
pub fn unfold_input_parallel<T>(
    geom: &ConvGeometry,
    image: &[T],
    patches: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num + Send + Sync,
{
    use scirs2_core::parallel_ops::*;

    validate(geom, image.len(), patches.len())?;
    debug_assert!(
        patches.iter().all(Zero::is_zero),
        "{}: destination must be zero-filled before extraction",
        KERNEL_NAME
    );

    let row_dims = [
        geom.batch,
        geom.chan_in,
        geom.kernel,
        geom.kernel,
        geom.h_out,
    ];
    let image_dims = [geom.batch, geom.chan_in, geom.h_in, geom.w_in];
    let stride = geom.stride;
    let padding = geom.padding;

    patches
        .par_chunks_mut(geom.w_out)
        .enumerate()
        .for_each(|(row, chunk)| {
            let [b, c, k1, k2, oh] = decompose(row, row_dims);
            // The whole row shares one y; a rejected y skips the row.
            let y = match source_coord(oh, k1, stride, padding, geom.h_in) {
                Some(y) => y,
                None => return,
            };
            for (ow, dst) in chunk.iter_mut().enumerate() {
                if let Some(x) = source_coord(ow, k2, stride, padding, geom.w_in) {
                    *dst = image[flatten([b, c, y, x], image_dims)];
                }
            }
        });
    Ok(())
}

/// Map one output-grid position and kernel offset to its image coordinate.
///
/// Underflow into the padding border is rejected by explicit comparison
/// before subtracting — never by wraparound — and positions at or beyond the
/// image extent are rejected afterwards.
#[inline]
fn source_coord(
    out: usize,
    k: usize,
    stride: usize,
    padding: usize,
    extent: usize,
) -> Option<usize> {
    let pos = out * stride + k;
    if pos < padding {
        return None;
    }
    let pos = pos - padding;
    if pos >= extent {
        return None;
    }
    Some(pos)
}

fn validate(geom: &ConvGeometry, image_len: usize, patches_len: usize) -> KernelResult<()> {
    if geom.has_zero_dim() {
        return Err(KernelError::zero_dimension(KERNEL_NAME));
    }
    ensure_len(KERNEL_NAME, "image", geom.image_len(), image_len)?;
    ensure_len(KERNEL_NAME, "patches", geom.input_patches_len(), patches_len)?;
    debug_assert!(
        geom.is_consistent(),
        "{}: geometry violates the output-size formula: {:?}",
        KERNEL_NAME,
        geom
    );
    Ok(())
}
