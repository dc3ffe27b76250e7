//! Error types for the unfold kernels
//!
//! The taxonomy is deliberately small: these are pure index-transformation
//! kernels with no I/O. Out-of-range source coordinates are *not* errors —
//! they are defined as silent no-writes into a pre-zeroed destination — and
//! an inconsistent geometry descriptor is the caller's bug, not a recoverable
//! condition. What remains fallible at this boundary is a buffer whose length
//! does not match the geometry, and a degenerate (zero) dimension the kernels
//! cannot divide or chunk by.

use thiserror::Error;

/// Error type for unfold kernel operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A caller-supplied buffer does not hold the geometry-derived element count
    #[error("{kernel}: {role} buffer holds {actual} elements, geometry requires {expected}")]
    BufferSizeMismatch {
        kernel: &'static str,
        role: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The geometry descriptor has a zero dimension the kernel would divide by
    #[error("{kernel}: geometry dimensions must be positive")]
    ZeroDimension { kernel: &'static str },
}

/// Result type for unfold kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Create a buffer size mismatch error
    pub fn buffer_size_mismatch(
        kernel: &'static str,
        role: &'static str,
        expected: usize,
        actual: usize,
    ) -> Self {
        KernelError::BufferSizeMismatch {
            kernel,
            role,
            expected,
            actual,
        }
    }

    /// Create a zero dimension error
    pub fn zero_dimension(kernel: &'static str) -> Self {
        KernelError::ZeroDimension { kernel }
    }
}

/// Check one buffer length against its geometry-derived element count.
pub(crate) fn ensure_len(
    kernel: &'static str,
    role: &'static str,
    expected: usize,
    actual: usize,
) -> KernelResult<()> {
    if actual != expected {
        return Err(KernelError::buffer_size_mismatch(
            kernel, role, expected, actual,
        ));
    }
    Ok(())
}
