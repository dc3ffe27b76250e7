//! # convfold
//!
//! Unfold/fold (im2col, col2im) index-transformation kernels for 2D convolution.
//!
//! ## Overview
//!
//! This crate provides the index transformations that reduce 2D convolution —
//! forward pass, input gradient, and filter gradient — to batched dense matrix
//! multiplies. The kernels perform no arithmetic beyond copying and summing:
//! they rearrange tensor data so that a general matmul routine does the math.
//!
//! **Key Features:**
//! - **Input patch extraction** (im2col) - forward unfold into `(batch, chan_in, k, k, h_out, w_out)` (serial & parallel)
//! - **Output patch extraction** - backward unfold of the output gradient onto the input grid (serial & parallel)
//! - **Filter transpose-broadcast** - channel-swapped, batch-replicated filter layout for the backward matmul
//! - **Filter gradient reduction** - batch-axis sum with add-into accumulation across sub-batches
//! - **Shared geometry descriptor** - one [`ConvGeometry`] drives every shape and length in the pipeline
//!
//! Out-of-range source coordinates (padding region, misaligned strides,
//! positions beyond the output grid) are silent no-writes into a pre-zeroed
//! destination, never errors and never clamped.
//!
//! ## Quick Start
//!
//! ```rust
//! use convfold::{unfold_input, ConvGeometry};
//!
//! // One 5x5 single-channel image, 3x3 kernel, stride 1, no padding
//! let geom = ConvGeometry::for_conv(1, 1, 1, 5, 5, 3, 1, 0);
//! let image: Vec<f32> = (0..geom.image_len()).map(|v| v as f32).collect();
//!
//! // Destination must be zero-filled; shape (1, 1, 3, 3, 3, 3)
//! let mut patches = vec![0.0f32; geom.input_patches_len()];
//! unfold_input(&geom, &image, &mut patches).unwrap();
//!
//! // Patch (k1=0, k2=0, oh=0, ow=0) reads image (y=0, x=0)
//! assert_eq!(patches[0], image[0]);
//!
//! // A GEMM over (chan_in·k·k) now computes the convolution:
//! //   output[b, o, oh, ow] = Σ filters[o, c, k1, k2] · patches[b, c, k1, k2, oh, ow]
//! ```
//!
//! ## Backward pass
//!
//! [`unfold_output`] re-indexes the output gradient onto the input spatial
//! grid, [`transpose_filters`] prepares the filters for the input-gradient
//! matmul, and [`accumulate_filter_grad`] folds per-batch partials into the
//! filter gradient. See each function's docs for the exact shape contracts.
//!
//! ## Features
//!
//! - `parallel` (default) - Enable `*_parallel` variants using rayon
//!
//! ## SciRS2 Integration
//!
//! This crate uses `scirs2-core` for numeric traits and parallel operations.
//! Direct use of `rayon` or `num-traits` is not permitted.

#![deny(warnings)]

pub mod error;
pub mod filters;
pub mod geometry;
pub mod shape;
pub mod unfold_input;
pub mod unfold_output;


// Re-exports
pub use error::{KernelError, KernelResult};
pub use filters::*;
pub use geometry::{out_size, ConvGeometry};
pub use shape::{decompose, flatten};
pub use unfold_input::*;
pub use unfold_output::*;
