//! Convolution geometry descriptor
//!
//! A [`ConvGeometry`] carries every dimension governing one 2D convolution:
//! batch count, channel counts, spatial extents on both sides, kernel side,
//! stride and padding. It computes no data — the four kernels in this crate
//! all take it by reference and trust its fields exactly. In particular the
//! descriptor does **not** enforce that `h_out`/`w_out` match the standard
//! output-size formula; callers that build the struct literally are
//! responsible for supplying consistent values (see [`ConvGeometry::for_conv`]
//! for the constructor that derives them).

/// Standard convolution output size: `(in + 2·padding − kernel) / stride + 1`.
///
/// # Examples
///
/// ```
/// use convfold::out_size;
///
/// assert_eq!(out_size(5, 0, 3, 1), 3);
/// assert_eq!(out_size(4, 1, 3, 2), 2);
/// ```
pub const fn out_size(in_size: usize, padding: usize, kernel: usize, stride: usize) -> usize {
    (in_size + 2 * padding - kernel) / stride + 1
}

/// Immutable dimensions of one 2D convolution.
///
/// All tensors passed to the kernels are dense row-major flat slices whose
/// logical shapes are derived from these fields; the `*_len` accessors give
/// the exact element count each kernel expects for each buffer role.
///
/// Counts and offsets are computed in `usize`; on the 64-bit targets this
/// crate is built for, products of six realistic dimension sizes cannot
/// overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    /// Step of the sliding window, identical on both spatial axes.
    pub stride: usize,
    /// Implicit zero-padding on every image border.
    pub padding: usize,
    /// Side of the square kernel.
    pub kernel: usize,
    /// Batch count.
    pub batch: usize,
    /// Input channel count.
    pub chan_in: usize,
    /// Output channel count.
    pub chan_out: usize,
    /// Input image height.
    pub h_in: usize,
    /// Output image height; must satisfy the [`out_size`] formula.
    pub h_out: usize,
    /// Input image width.
    pub w_in: usize,
    /// Output image width; must satisfy the [`out_size`] formula.
    pub w_out: usize,
}

impl ConvGeometry {
    /// Build a descriptor with `h_out`/`w_out` derived via [`out_size`].
    ///
    /// # Examples
    ///
    /// ```
    /// use convfold::ConvGeometry;
    ///
    /// let geom = ConvGeometry::for_conv(2, 3, 8, 5, 5, 3, 1, 0);
    /// assert_eq!(geom.h_out, 3);
    /// assert_eq!(geom.w_out, 3);
    /// assert!(geom.is_consistent());
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub const fn for_conv(
        batch: usize,
        chan_in: usize,
        chan_out: usize,
        h_in: usize,
        w_in: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        ConvGeometry {
            stride,
            padding,
            kernel,
            batch,
            chan_in,
            chan_out,
            h_in,
            h_out: out_size(h_in, padding, kernel, stride),
            w_in,
            w_out: out_size(w_in, padding, kernel, stride),
        }
    }

    /// Element count of the input image tensor `(batch, chan_in, h_in, w_in)`.
    pub const fn image_len(&self) -> usize {
        self.batch * self.chan_in * self.h_in * self.w_in
    }

    /// Element count of the output-side tensor `(batch, chan_out, h_out, w_out)`.
    pub const fn out_image_len(&self) -> usize {
        self.batch * self.chan_out * self.h_out * self.w_out
    }

    /// Element count of the forward patches tensor
    /// `(batch, chan_in, kernel, kernel, h_out, w_out)`.
    pub const fn input_patches_len(&self) -> usize {
        self.batch * self.chan_in * self.kernel * self.kernel * self.h_out * self.w_out
    }

    /// Element count of the backward patches tensor
    /// `(batch, chan_out, kernel, kernel, h_in, w_in)`.
    pub const fn output_patches_len(&self) -> usize {
        self.batch * self.chan_out * self.kernel * self.kernel * self.h_in * self.w_in
    }

    /// Element count of the filter tensor `(chan_out, chan_in, kernel, kernel)`.
    pub const fn filter_len(&self) -> usize {
        self.chan_out * self.chan_in * self.kernel * self.kernel
    }

    /// Element count of the transposed/broadcast filter tensor
    /// `(batch, chan_in, chan_out, kernel, kernel)`.
    pub const fn broadcast_filter_len(&self) -> usize {
        self.batch * self.filter_len()
    }

    /// Whether any dimension the kernels divide or chunk by is zero.
    ///
    /// Degenerate descriptors are rejected with
    /// [`KernelError::ZeroDimension`](crate::KernelError::ZeroDimension)
    /// rather than left to panic inside a kernel. `padding` may be zero.
    pub const fn has_zero_dim(&self) -> bool {
        self.stride == 0
            || self.kernel == 0
            || self.batch == 0
            || self.chan_in == 0
            || self.chan_out == 0
            || self.h_in == 0
            || self.h_out == 0
            || self.w_in == 0
            || self.w_out == 0
    }

    /// Whether `h_out`/`w_out` match the [`out_size`] formula for the other
    /// fields.
    ///
    /// The kernels never call this on the hot path; an inconsistent
    /// descriptor is undefined behavior at this layer (spurious zeros or
    /// dropped taps, never memory unsafety). Debug builds assert it.
    pub fn is_consistent(&self) -> bool {
        !self.has_zero_dim()
            && self.h_in + 2 * self.padding >= self.kernel
            && self.w_in + 2 * self.padding >= self.kernel
            && self.h_out == out_size(self.h_in, self.padding, self.kernel, self.stride)
            && self.w_out == out_size(self.w_in, self.padding, self.kernel, self.stride)
    }
}
