//! Backward unfold: output-gradient → patches on the input spatial grid
//!
//! The algebraic inverse of [`unfold_input`](crate::unfold_input): instead of
//! asking "which image element does this output tap read", each unit of work
//! asks "which output position would have read *this* input element under
//! *this* kernel offset". Re-indexed this way, the patches line up with the
//! input spatial grid, so the input gradient becomes one batched matrix
//! multiply against the transposed filters.
//!
//! Three guards decide whether an output position exists: the shifted
//! coordinate must not underflow the kernel offset, the difference must be
//! exactly divisible by the stride (misaligned taps contribute nothing and
//! are skipped, never rounded), and the quotient must lie inside the output
//! grid. As in the forward direction, a failed guard leaves the pre-zeroed
//! destination untouched.

use scirs2_core::numeric::{Num, Zero};

use crate::error::{ensure_len, KernelError, KernelResult};
use crate::geometry::ConvGeometry;
use crate::shape::{decompose, flatten};

const KERNEL_NAME: &str = "unfold_output";

/// Extract backward convolution patches from an output-side tensor.
///
/// Fills `patches`, row-major shape
/// `(batch, chan_out, kernel, kernel, h_in, w_in)`, such that element
/// `(b, o, k1, k2, y, x)` equals `grad_output` element `(b, o, oh, ow)`
/// where `oh = (y + padding − k1) / stride` and
/// `ow = (x + padding − k2) / stride`, provided both divisions are exact and
/// both quotients lie inside the output grid. Elements with no valid output
/// position keep their prior value.
///
/// `grad_output` has row-major shape `(batch, chan_out, h_out, w_out)` — in
/// the backward pass this is the gradient flowing into the convolution's
/// output.
///
/// # Preconditions
///
/// `patches` must be zero-filled immediately before the call (asserted in
/// debug builds); the geometry must satisfy the output-size formula.
///
/// # Errors
///
/// Returns an error if either buffer length disagrees with the geometry, or
/// if the geometry has a zero dimension.
///
/// # Complexity
///
/// Time: O(batch · chan_out · kernel² · h_in · w_in)
///
/// # Examples
///
/// ```
/// use convfold::{unfold_output, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(1, 1, 1, 3, 3, 2, 1, 0);
/// let grad_output: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0]; // 2x2 output grid
/// let mut patches = vec![0.0f32; geom.output_patches_len()];
/// unfold_output(&geom, &grad_output, &mut patches).unwrap();
///
/// // (k1=0, k2=0, y=0, x=0) inverts to (oh=0, ow=0)
/// assert_eq!(patches[0], 1.0);
/// // (k1=0, k2=0, y=2, x=2) would need oh=2 ≥ h_out ⇒ untouched
/// assert_eq!(patches[2 * 3 + 2], 0.0);
/// ```
pub fn unfold_output<T>(
    geom: &ConvGeometry,
    grad_output: &[T],
    patches: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num,
{
    validate(geom, grad_output.len(), patches.len())?;
    debug_assert!(
        patches.iter().all(Zero::is_zero),
        "{}: destination must be zero-filled before extraction",
        KERNEL_NAME
    );

    let dims = [
        geom.batch,
        geom.chan_out,
        geom.kernel,
        geom.kernel,
        geom.h_in,
        geom.w_in,
    ];
    let out_dims = [geom.batch, geom.chan_out, geom.h_out, geom.w_out];

    for (idx, dst) in patches.iter_mut().enumerate() {
        let [b, o, k1, k2, y, x] = decompose(idx, dims);
        let oh = match output_position(y, k1, geom.stride, geom.padding, geom.h_out) {
            Some(oh) => oh,
            None => continue,
        };
        let ow = match output_position(x, k2, geom.stride, geom.padding, geom.w_out) {
            Some(ow) => ow,
            None => continue,
        };
        *dst = grad_output[flatten([b, o, oh, ow], out_dims)];
    }
    Ok(())
}

/// Parallel variant of [`unfold_output`].
///
/// Splits the destination into disjoint rows along the innermost spatial
/// axis; output is bit-identical to the serial version.
///
/// # Examples
///
/// ```
/// use convfold::{unfold_output, unfold_output_parallel, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(2, 1, 3, 5, 5, 3, 2, 1);
/// let grad_output: Vec<f32> = (0..geom.out_image_len()).map(|v| v as f32).collect();
///
/// let mut serial = vec![0.0f32; geom.output_patches_len()];
/// unfold_output(&geom, &grad_output, &mut serial).unwrap();
///
/// let mut parallel = vec![0.0f32; geom.output_patches_len()];
/// unfold_output_parallel(&geom, &grad_output, &mut parallel).unwrap();
///
/// assert_eq!(serial, parallel);
/// ```
#[cfg(feature = "parallel")]
pub fn unfold_output_parallel<T>(
    geom: &ConvGeometry,
    grad_output: &[T],
    patches: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num + Send + Sync,
{
    use scirs2_core::parallel_ops::*;

    validate(geom, grad_output.len(), patches.len())?;
    debug_assert!(
        patches.iter().all(Zero::is_zero),
        "{}: destination must be zero-filled before extraction",
        KERNEL_NAME
    );

    let row_dims = [
        geom.batch,
        geom.chan_out,
        geom.kernel,
        geom.kernel,
        geom.h_in,
    ];
    let out_dims = [geom.batch, geom.chan_out, geom.h_out, geom.w_out];
    let stride = geom.stride;
    let padding = geom.padding;

    patches
        .par_chunks_mut(geom.w_in)
        .enumerate()
        .for_each(|(row, chunk)| {
            let [b, o, k1, k2, y] = decompose(row, row_dims);
            // The whole row shares one oh; a rejected oh skips the row.
            let oh = match output_position(y, k1, stride, padding, geom.h_out) {
                Some(oh) => oh,
                None => return,
            };
            for (x, dst) in chunk.iter_mut().enumerate() {
                if let Some(ow) = output_position(x, k2, stride, padding, geom.w_out) {
                    *dst = grad_output[flatten([b, o, oh, ow], out_dims)];
                }
            }
        });
    Ok(())
}

/// Invert the forward tap relation for one axis.
///
/// Solves `out·stride + k − padding = pos` for `out`. The subtraction is
/// guarded by explicit comparison, the division by an explicit divisibility
/// check — truncating a misaligned tap would silently attribute it to the
/// wrong output position.
#[inline]
fn output_position(
    pos: usize,
    k: usize,
    stride: usize,
    padding: usize,
    extent: usize,
) -> Option<usize> {
    let shifted = pos + padding;
    if shifted < k {
        return None;
    }
    let delta = shifted - k;
    if delta % stride != 0 {
        return None;
    }
    let out = delta / stride;
    if out >= extent {
        return None;
    }
    Some(out)
}

fn validate(geom: &ConvGeometry, grad_output_len: usize, patches_len: usize) -> KernelResult<()> {
    if geom.has_zero_dim() {
        return Err(KernelError::zero_dimension(KERNEL_NAME));
    }
    ensure_len(KERNEL_NAME, "grad_output", geom.out_image_len(), grad_output_len)?;
    ensure_len(KERNEL_NAME, "patches", geom.output_patches_len(), patches_len)?;
    debug_assert!(
        geom.is_consistent(),
        "{}: geometry violates the output-size formula: {:?}",
        KERNEL_NAME,
        geom
    );
    Ok(())
}
