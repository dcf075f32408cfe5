//! Umbrella crate for the `pixel-stencil` workspace.
//!
//! Re-exports the raster types, the parallel convolution engine and the
//! plain-text PNM codec under one name.

pub use ps_conv::*;
pub use ps_core::*;

pub mod pnm {
    pub use ps_pnm::*;
}
