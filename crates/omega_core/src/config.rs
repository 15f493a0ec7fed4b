//! Pipeline configuration and the lens parameter document.

use crate::error::{LensError, Result};
use crate::intersection::IntersectionStrategy;
use crate::roots::{BisectionSettings, NewtonSettings};
use crate::sigma::{OpticalParameters, ShapeCoefficients, SurfaceDefinition};
use crate::stl::StlFormat;
use serde::{Deserialize, Serialize};

/// Optical design of a two-surface lens.
///
/// The first surface images the object at `z0` onto `z1` going from `n0` into
/// `n1`; the second surface, shifted by `t`, images `z1` onto `z2` going back
/// into `n0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensParameters {
    pub z0: f64,
    pub z1: f64,
    pub z2: f64,
    pub n0: f64,
    pub n1: f64,
    #[serde(default)]
    pub t: f64,
}

impl LensParameters {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| LensError::config(format!("invalid lens parameters: {err}")))
    }

    /// Parameters of the two refracting surfaces.
    pub fn surfaces(&self) -> (OpticalParameters, OpticalParameters) {
        (
            OpticalParameters::new(self.z0, self.z1, self.n0, self.n1),
            OpticalParameters::new(-self.z1, self.z2, self.n1, self.n0).with_shift(self.t),
        )
    }
}

/// Source of the two surface definitions of a lens.
pub trait LensSurfaces {
    /// First surface, then the second (shifted) surface.
    fn surface_definitions(&self) -> [SurfaceDefinition; 2];
}

impl LensSurfaces for LensParameters {
    fn surface_definitions(&self) -> [SurfaceDefinition; 2] {
        let (first, second) = self.surfaces();
        [
            SurfaceDefinition::Optical(first),
            SurfaceDefinition::Optical(second),
        ]
    }
}

/// A lens given directly by the coefficients of both surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientLens {
    pub sigma1: ShapeCoefficients,
    pub sigma2: ShapeCoefficients,
    /// Axial shift of `sigma2`.
    #[serde(default)]
    pub t: f64,
}

impl CoefficientLens {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| LensError::config(format!("invalid lens coefficients: {err}")))
    }
}

impl LensSurfaces for CoefficientLens {
    fn surface_definitions(&self) -> [SurfaceDefinition; 2] {
        [
            SurfaceDefinition::Coefficients {
                coefficients: self.sigma1,
                t_shift: 0.0,
            },
            SurfaceDefinition::Coefficients {
                coefficients: self.sigma2,
                t_shift: self.t,
            },
        ]
    }
}

/// Either lens document form, told apart by its fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LensDesign {
    Optical(LensParameters),
    Coefficients(CoefficientLens),
}

impl LensDesign {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| {
            LensError::config(format!(
                "lens document is neither optical parameters nor coefficients: {err}"
            ))
        })
    }
}

impl From<LensParameters> for LensDesign {
    fn from(params: LensParameters) -> Self {
        LensDesign::Optical(params)
    }
}

impl From<CoefficientLens> for LensDesign {
    fn from(lens: CoefficientLens) -> Self {
        LensDesign::Coefficients(lens)
    }
}

impl LensSurfaces for LensDesign {
    fn surface_definitions(&self) -> [SurfaceDefinition; 2] {
        match self {
            LensDesign::Optical(params) => params.surface_definitions(),
            LensDesign::Coefficients(lens) => lens.surface_definitions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    /// Points per sigma curve.
    pub rho_points: usize,
    /// Half the number of angular steps in the revolution.
    pub angular_points: usize,
}

impl Default for SampleCounts {
    fn default() -> Self {
        Self {
            rho_points: 10,
            angular_points: 10,
        }
    }
}

impl SampleCounts {
    /// Angular steps around the axis; always even.
    pub fn angular_steps(&self) -> usize {
        2 * self.angular_points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub show_2d: bool,
    pub show_3d: bool,
    pub sampling: SampleCounts,
    pub strategy: IntersectionStrategy,
    pub bisection: BisectionSettings,
    pub newton: NewtonSettings,
    /// Largest accepted distance between the two trimmed curve ends.
    pub join_tolerance: f64,
    pub solid_name: String,
    pub format: StlFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            show_2d: false,
            show_3d: false,
            sampling: SampleCounts::default(),
            strategy: IntersectionStrategy::default(),
            bisection: BisectionSettings::default(),
            newton: NewtonSettings::default(),
            join_tolerance: 1e-6,
            solid_name: "surface".to_string(),
            format: StlFormat::Ascii,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| LensError::config(format!("invalid pipeline config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling.rho_points < 2 {
            return Err(LensError::config("rho_points must be at least 2"));
        }
        if self.sampling.angular_points == 0 {
            return Err(LensError::config("angular_points must be positive"));
        }
        if self.join_tolerance.is_nan() || self.join_tolerance < 0.0 {
            return Err(LensError::config("join_tolerance must be non-negative"));
        }
        Ok(())
    }
}
