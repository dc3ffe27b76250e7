//! Filter layout transforms for the backward pass
//!
//! Two symmetric kernels around the batched matrix multiply that produces
//! the input gradient and the filter gradient:
//!
//! - [`transpose_filters`] replicates the filter tensor across the batch
//!   axis with its channel axes swapped, so the downstream matmul can run
//!   uniformly batch-parallel against the backward patches.
//! - [`accumulate_filter_grad`] folds the per-batch partial filter-gradient
//!   contributions back into the canonical filter-gradient layout, with
//!   add-into semantics so sub-batches accumulate across calls.

use scirs2_core::numeric::Num;

use crate::error::{ensure_len, KernelError, KernelResult};
use crate::geometry::ConvGeometry;
use crate::shape::{decompose, flatten};

/// Replicate a filter tensor across the batch axis with channel axes swapped.
///
/// `filters` has row-major shape `(chan_out, chan_in, kernel, kernel)`;
/// `transposed` is filled as `(batch, chan_in, chan_out, kernel, kernel)`,
/// every batch slice an identical channel-swapped copy of `filters`. Each
/// unit of work reads one source element and writes it into all `batch`
/// destination slots; destination ranges of different units never overlap.
///
/// Unlike the extractors, every destination element is written, so no
/// zero-fill precondition applies.
///
/// # Errors
///
/// Returns an error if either buffer length disagrees with the geometry, or
/// if the geometry has a zero dimension.
///
/// # Examples
///
/// ```
/// use convfold::{transpose_filters, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(2, 2, 1, 3, 3, 1, 1, 0);
/// // filters (chan_out=1, chan_in=2, 1, 1)
/// let filters = vec![3.0f32, 5.0];
/// let mut transposed = vec![0.0f32; geom.broadcast_filter_len()];
/// transpose_filters(&geom, &filters, &mut transposed).unwrap();
///
/// // Both batch slices hold the channel-swapped copy (chan_in=2, chan_out=1, 1, 1)
/// assert_eq!(transposed, vec![3.0, 5.0, 3.0, 5.0]);
/// ```
pub fn transpose_filters<T>(
    geom: &ConvGeometry,
    filters: &[T],
    transposed: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num,
{
    validate(
        "transpose_filters",
        geom,
        ("filters", filters.len()),
        ("transposed", transposed.len()),
    )?;

    let slice_len = geom.filter_len();
    let tr_dims = [geom.chan_in, geom.chan_out, geom.kernel, geom.kernel];
    let filter_dims = [geom.chan_out, geom.chan_in, geom.kernel, geom.kernel];

    for idx in 0..slice_len {
        let [c, o, k1, k2] = decompose(idx, tr_dims);
        let value = filters[flatten([o, c, k1, k2], filter_dims)];
        for b in 0..geom.batch {
            transposed[b * slice_len + idx] = value;
        }
    }
    Ok(())
}

/// Parallel variant of [`transpose_filters`].
///
/// Each batch slice of the destination is filled independently; output is
/// bit-identical to the serial version.
#[cfg(feature = "parallel")]
pub fn transpose_filters_parallel<T>(
    geom: &ConvGeometry,
    filters: &[T],
    transposed: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num + Send + Sync,
{
    use scirs2_core::parallel_ops::*;

    validate(
        "transpose_filters",
        geom,
        ("filters", filters.len()),
        ("transposed", transposed.len()),
    )?;

    let slice_len = geom.filter_len();
    let tr_dims = [geom.chan_in, geom.chan_out, geom.kernel, geom.kernel];
    let filter_dims = [geom.chan_out, geom.chan_in, geom.kernel, geom.kernel];

    transposed.par_chunks_mut(slice_len).for_each(|slice| {
        for (idx, dst) in slice.iter_mut().enumerate() {
            let [c, o, k1, k2] = decompose(idx, tr_dims);
            *dst = filters[flatten([o, c, k1, k2], filter_dims)];
        }
    });
    Ok(())
}

/// Sum per-batch partial filter-gradient contributions into the filter
/// gradient, add-into.
///
/// `batched` has row-major shape `(batch, chan_in, chan_out, kernel, kernel)`
/// (the transposed layout produced upstream by the batched matmul);
/// `filter_grad` has the canonical shape `(chan_out, chan_in, kernel, kernel)`.
/// Each destination element receives `+=` of the batch-axis sum at its
/// transposed offset, so repeated calls accumulate gradients across
/// sub-batches rather than overwriting them. Destination indices are unique
/// per unit of work; no atomics are needed.
///
/// # Errors
///
/// Returns an error if either buffer length disagrees with the geometry, or
/// if the geometry has a zero dimension.
///
/// # Examples
///
/// ```
/// use convfold::{accumulate_filter_grad, ConvGeometry};
///
/// let geom = ConvGeometry::for_conv(2, 2, 1, 3, 3, 1, 1, 0);
/// // batched (batch=2, chan_in=2, chan_out=1, 1, 1)
/// let batched = vec![1.0f32, 2.0, 10.0, 20.0];
/// let mut filter_grad = vec![100.0f32, 0.0]; // (chan_out=1, chan_in=2, 1, 1)
/// accumulate_filter_grad(&geom, &batched, &mut filter_grad).unwrap();
///
/// // 100 + (1 + 10), 0 + (2 + 20)
/// assert_eq!(filter_grad, vec![111.0, 22.0]);
/// ```
pub fn accumulate_filter_grad<T>(
    geom: &ConvGeometry,
    batched: &[T],
    filter_grad: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num,
{
    validate(
        "accumulate_filter_grad",
        geom,
        ("filter_grad", filter_grad.len()),
        ("batched", batched.len()),
    )?;

    let slice_len = geom.filter_len();
    let grad_dims = [geom.chan_out, geom.chan_in, geom.kernel, geom.kernel];
    let tr_dims = [geom.chan_in, geom.chan_out, geom.kernel, geom.kernel];

    for (idx, dst) in filter_grad.iter_mut().enumerate() {
        let [o, c, k1, k2] = decompose(idx, grad_dims);
        let src = flatten([c, o, k1, k2], tr_dims);
        let mut sum = T::zero();
        for b in 0..geom.batch {
            sum = sum + batched[b * slice_len + src];
        }
        *dst = *dst + sum;
    }
    Ok(())
}

/// Parallel variant of [`accumulate_filter_grad`].
///
/// One unit of work per destination element; output is bit-identical to the
/// serial version.
#[cfg(feature = "parallel")]
pub fn accumulate_filter_grad_parallel<T>(
    geom: &ConvGeometry,
    batched: &[T],
    filter_grad: &mut [T],
) -> KernelResult<()>
where
    T: Copy + Num + Send + Sync,
{
    use scirs2_core::parallel_ops::*;

    validate(
        "accumulate_filter_grad",
        geom,
        ("filter_grad", filter_grad.len()),
        ("batched", batched.len()),
    )?;

    let slice_len = geom.filter_len();
    let grad_dims = [geom.chan_out, geom.chan_in, geom.kernel, geom.kernel];
    let tr_dims = [geom.chan_in, geom.chan_out, geom.kernel, geom.kernel];

    filter_grad
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, dst)| {
            let [o, c, k1, k2] = decompose(idx, grad_dims);
            let src = flatten([c, o, k1, k2], tr_dims);
            let mut sum = T::zero();
            for b in 0..geom.batch {
                sum = sum + batched[b * slice_len + src];
            }
            *dst = *dst + sum;
        });
    Ok(())
}

fn validate(
    kernel: &'static str,
    geom: &ConvGeometry,
    filter_side: (&'static str, usize),
    batched_side: (&'static str, usize),
) -> KernelResult<()> {
    if geom.has_zero_dim() {
        return Err(KernelError::zero_dimension(kernel));
    }
    ensure_len(kernel, filter_side.0, geom.filter_len(), filter_side.1)?;
    ensure_len(
        kernel,
        batched_side.0,
        geom.broadcast_filter_len(),
        batched_side.1,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed_filters(geom: &ConvGeometry) -> Vec<f32> {
        (1..=geom.filter_len()).map(|v| v as f32).collect()
    }

    #[test]
    fn test_transpose_swaps_channel_axes() {
        // chan_out=2, chan_in=3, kernel=2
        let geom = ConvGeometry::for_conv(2, 3, 2, 4, 4, 2, 1, 0);
        let filters = indexed_filters(&geom);
        let mut transposed = vec![0.0f32; geom.broadcast_filter_len()];
        transpose_filters(&geom, &filters, &mut transposed).unwrap();

        let filter_dims = [2, 3, 2, 2];
        let tr_dims = [3, 2, 2, 2];
        let slice_len = geom.filter_len();
        for b in 0..geom.batch {
            for o in 0..2 {
                for c in 0..3 {
                    for k1 in 0..2 {
                        for k2 in 0..2 {
                            assert_eq!(
                                transposed[b * slice_len + flatten([c, o, k1, k2], tr_dims)],
                                filters[flatten([o, c, k1, k2], filter_dims)]
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_broadcast_slices_identical() {
        let geom = ConvGeometry::for_conv(4, 2, 3, 5, 5, 3, 1, 1);
        let filters = indexed_filters(&geom);
        let mut transposed = vec![0.0f32; geom.broadcast_filter_len()];
        transpose_filters(&geom, &filters, &mut transposed).unwrap();

        let slice_len = geom.filter_len();
        let first = &transposed[..slice_len];
        for b in 1..geom.batch {
            assert_eq!(&transposed[b * slice_len..(b + 1) * slice_len], first);
        }
    }

    #[test]
    fn test_accumulate_sums_batch_axis() {
        let geom = ConvGeometry::for_conv(3, 2, 2, 4, 4, 2, 1, 0);
        let slice_len = geom.filter_len();

        // batch slice b holds the transposed filter scaled by (b+1)
        let filters = indexed_filters(&geom);
        let mut transposed = vec![0.0f32; geom.broadcast_filter_len()];
        transpose_filters(&geom, &filters, &mut transposed).unwrap();
        for b in 0..geom.batch {
            for v in &mut transposed[b * slice_len..(b + 1) * slice_len] {
                *v *= (b + 1) as f32;
            }
        }

        let mut filter_grad = vec![0.0f32; slice_len];
        accumulate_filter_grad(&geom, &transposed, &mut filter_grad).unwrap();

        // Σ_b (b+1) = 6, at the un-transposed index
        for (idx, grad) in filter_grad.iter().enumerate() {
            assert_eq!(*grad, 6.0 * filters[idx]);
        }
    }

    #[test]
    fn test_accumulate_adds_into_existing_values() {
        let geom = ConvGeometry::for_conv(2, 1, 1, 3, 3, 2, 1, 0);
        let batched = vec![1.0f32; geom.broadcast_filter_len()];

        let mut filter_grad = vec![0.5f32; geom.filter_len()];
        accumulate_filter_grad(&geom, &batched, &mut filter_grad).unwrap();
        assert!(filter_grad.iter().all(|&v| v == 2.5));

        // Second call accumulates, never overwrites
        accumulate_filter_grad(&geom, &batched, &mut filter_grad).unwrap();
        assert!(filter_grad.iter().all(|&v| v == 4.5));
    }

    #[test]
    fn test_rejects_wrong_buffer_lengths() {
        let geom = ConvGeometry::for_conv(2, 2, 2, 4, 4, 2, 1, 0);
        let filters = vec![0.0f32; geom.filter_len()];
        let mut transposed = vec![0.0f32; geom.broadcast_filter_len() - 1];
        let err = transpose_filters(&geom, &filters, &mut transposed).unwrap_err();
        assert_eq!(
            err,
            KernelError::buffer_size_mismatch(
                "transpose_filters",
                "transposed",
                geom.broadcast_filter_len(),
                geom.broadcast_filter_len() - 1,
            )
        );

        // The mismatch must name the buffer the caller actually passed
        let batched = vec![0.0f32; geom.broadcast_filter_len()];
        let mut filter_grad = vec![0.0f32; geom.filter_len() + 2];
        let err = accumulate_filter_grad(&geom, &batched, &mut filter_grad).unwrap_err();
        assert_eq!(
            err,
            KernelError::buffer_size_mismatch(
                "accumulate_filter_grad",
                "filter_grad",
                geom.filter_len(),
                geom.filter_len() + 2,
            )
        );

        let short = vec![0.0f32; geom.broadcast_filter_len() - 1];
        let mut filter_grad = vec![0.0f32; geom.filter_len()];
        let err = accumulate_filter_grad(&geom, &short, &mut filter_grad).unwrap_err();
        assert_eq!(
            err,
            KernelError::buffer_size_mismatch(
                "accumulate_filter_grad",
                "batched",
                geom.broadcast_filter_len(),
                geom.broadcast_filter_len() - 1,
            )
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_serial() {
        let geom = ConvGeometry::for_conv(3, 2, 4, 5, 5, 3, 1, 1);
        let filters = indexed_filters(&geom);

        let mut serial = vec![0.0f32; geom.broadcast_filter_len()];
        transpose_filters(&geom, &filters, &mut serial).unwrap();
        let mut parallel = vec![0.0f32; geom.broadcast_filter_len()];
        transpose_filters_parallel(&geom, &filters, &mut parallel).unwrap();
        assert_eq!(serial, parallel);

        let batched: Vec<f32> = (0..geom.broadcast_filter_len())
            .map(|v| (v % 7) as f32)
            .collect();
        let mut grad_serial = vec![1.0f32; geom.filter_len()];
        accumulate_filter_grad(&geom, &batched, &mut grad_serial).unwrap();
        let mut grad_parallel = vec![1.0f32; geom.filter_len()];
        accumulate_filter_grad_parallel(&geom, &batched, &mut grad_parallel).unwrap();
        assert_eq!(grad_serial, grad_parallel);
    }
}
