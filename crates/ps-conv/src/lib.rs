//! Parallel 3x3 (and larger odd) stencil convolution.
//!
//! Work is split statically into disjoint regions by [`partition`]. Each
//! region is evaluated by exactly one worker, so output writes never race and
//! no locks are taken. Two execution models share the same evaluator:
//!
//! - shared memory ([`Backend::Threads`], [`Backend::Rayon`]): workers write
//!   disjoint slices of one output buffer; assembly is the join itself;
//! - isolated memory ([`Backend::Isolated`]): workers receive owned row
//!   slices over channels and return [`PartialResult`]s that are gathered by
//!   rank.
//!
//! Every backend produces output identical to [`convolve_sequential`].

pub mod assemble;
mod engine;
pub mod isolated;
pub mod partition;
mod reduce;
mod shared;
pub mod stencil;

pub use assemble::{PartialResult, RowAssembler};
pub use engine::{Backend, ConvolveConfig, convolve, convolve_sequential};
pub use isolated::{Distribution, run_isolated};
pub use partition::{Region, Strategy, partition};
pub use reduce::parallel_sum;
pub use stencil::evaluate;
