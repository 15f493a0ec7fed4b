//! The `omega_core` crate builds rotationally symmetric Omega lenses from their
//! optical design and exports them as triangle meshes.
//!
//! Key components:
//! - **Roots**: bracket-growing bisection and a 2-D Newton–Raphson solver.
//! - **Sigma**: aplanatic surface profiles (`SigmaCurve`) and their domain search.
//! - **Intersection**: nearest-sample and Newton strategies for joining two profiles.
//! - **Omega**: the inner contour of the joined lens and its summary.
//! - **Mesh / STL**: surface of revolution and ASCII/binary STL output.
//! - **Pipeline**: configuration-driven construction with optional viewers.
pub mod config;
pub mod error;
pub mod intersection;
pub mod mesh;
pub mod omega;
pub mod pipeline;
pub mod roots;
pub mod sigma;
pub mod stl;
pub mod traits;

pub use config::{CoefficientLens, LensDesign, LensParameters, PipelineConfig};
pub use error::{LensError, Result};
pub use pipeline::{build_lens, run, LensBuild};
