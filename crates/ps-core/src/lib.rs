//! Foundational types for stencil filtering.
//!
//! ## Pixel Buffers
//! Samples are `u16`, row-major and channel-interleaved: sample `(x, y, c)`
//! is stored at `(y * width + x) * channels + c`. Every sample stays within
//! `[0, max_value]`.
//!
//! ## Row Windows
//! [`ImageRows`] exposes whole rows of an image while keeping full-image
//! coordinates. A worker that only received its own rows plus a halo reads
//! through the same accessors as one holding the whole image.
//!
//! ## Border Modes
//! Out-of-range taps are skipped by default. Clamp and reflect-101 are
//! available as alternatives; reflect-101 mirrors around edge pixels without
//! repeating edge elements.

mod border;
mod error;
mod kernel;
mod pixel;

pub use border::{BorderMode, map_index};
pub use error::Error;
pub use kernel::{Filter, Kernel};
pub use pixel::{ImageRows, PixelBuffer, PixelFormat};
