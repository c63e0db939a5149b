//! The `icgen_core` crate generates initial conditions for n-body and field
//! based cosmological simulations.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction) and `OdeSystem`.
//! - **Solvers**: adaptive Tsitouras 5(4) integration onto an even grid.
//! - **Model**: the King (1966) cluster density law and its Poisson system.
//! - **Potential / Sampler / Transform**: the sampling pipeline from the
//!   potential table to Cartesian particle records.
//! - **Storage**: interchangeable output sinks (VTU time series, JSON).
//! - **Field**: power law filtered Gaussian random fields.

pub mod error;
pub mod field;
pub mod model;
pub mod pipeline;
pub mod potential;
pub mod sampler;
pub mod solvers;
pub mod storage;
pub mod traits;
pub mod transform;

pub use error::{Error, Result};
