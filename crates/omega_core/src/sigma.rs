//! Sigma curves: the meridional profile of a single aplanatic refracting
//! surface, written as a Cartesian oval `z(ρ)`, `r(ρ)`.
//!
//! Sign convention: `z0` is the object distance measured towards negative `z`,
//! so a distant object on the incoming side is given as a large positive
//! number. The coefficients are computed from the object coordinate
//! `-(z0 - t_shift)` and the image coordinate `zi - t_shift`. The second
//! surface of a lens therefore takes `-z1` as its object distance, since the
//! first surface's image lies on the positive side.

use std::borrow::Cow;

use crate::error::{LensError, Result};
use crate::roots::{bisect, BisectionSettings};
use crate::traits::ProfileCurve;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest radial parameter ever evaluated; `ρ = 0` is a removable singularity.
pub const RHO_EPSILON: f64 = 1e-6;

/// Initial upper bound for the domain search.
pub const RHO_SEARCH_START: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalParameters {
    /// Object position.
    pub z0: f64,
    /// Image position.
    pub zi: f64,
    /// Refractive index on the object side.
    pub n0: f64,
    /// Refractive index on the image side.
    pub ni: f64,
    /// Axial translation applied to the whole surface.
    #[serde(default)]
    pub t_shift: f64,
}

impl OpticalParameters {
    pub fn new(z0: f64, zi: f64, n0: f64, ni: f64) -> Self {
        Self {
            z0,
            zi,
            n0,
            ni,
            t_shift: 0.0,
        }
    }

    pub fn with_shift(self, t_shift: f64) -> Self {
        Self { t_shift, ..self }
    }
}

/// The four Cartesian-oval coefficients `G`, `O`, `T`, `S`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeCoefficients {
    #[serde(alias = "G")]
    pub g: f64,
    #[serde(alias = "O")]
    pub o: f64,
    #[serde(alias = "T")]
    pub t: f64,
    #[serde(alias = "S")]
    pub s: f64,
}

impl ShapeCoefficients {
    pub fn from_parameters(params: &OpticalParameters) -> Result<Self> {
        let OpticalParameters {
            z0,
            zi,
            n0,
            ni,
            t_shift,
        } = *params;
        if ![z0, zi, n0, ni, t_shift].iter().all(|v| v.is_finite()) {
            return Err(LensError::config("optical parameters must be finite"));
        }
        if ni == n0 {
            return Err(LensError::config(format!(
                "refractive indices must differ (n0 = ni = {n0})"
            )));
        }

        let obj = -(z0 - t_shift);
        let img = zi - t_shift;

        let index_product = nonzero(ni * n0, "n0 * ni")?;
        let conjugates = nonzero(img * obj, "zi * z0 after shift")?;
        let forward = nonzero(ni * img - n0 * obj, "ni * zi - n0 * z0")?;
        let backward = nonzero(ni * obj - n0 * img, "ni * z0 - n0 * zi")?;
        let weighted = ni * ni * img - n0 * n0 * obj;

        let coefficients = Self {
            g: weighted * weighted / (index_product * forward * backward),
            o: backward / (conjugates * (ni - n0)),
            t: (ni - n0) * (ni + n0).powi(2) / (4.0 * index_product * conjugates * forward),
            s: (ni + n0) * weighted / (2.0 * index_product * conjugates * forward),
        };

        coefficients.validate()?;
        Ok(coefficients)
    }

    pub fn validate(&self) -> Result<()> {
        if [self.g, self.o, self.t, self.s].iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(LensError::config(format!(
                "shape coefficients are not finite: {self:?}"
            )))
        }
    }

    /// Unshifted axial coordinate. NaN where the radicand turns negative.
    pub fn z(&self, rho: f64) -> f64 {
        let rho2 = rho * rho;
        let numerator = (self.o + self.t * rho2) * rho2;
        let radicand = 1.0 + (2.0 * self.s - self.o * self.o * self.g) * rho2;
        numerator / (1.0 + self.s * rho2 + radicand.sqrt())
    }
}

fn nonzero(value: f64, what: &str) -> Result<f64> {
    if value == 0.0 || !value.is_finite() {
        Err(LensError::config(format!(
            "degenerate optical parameters: {what} = {value}"
        )))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSample {
    pub rho: f64,
    pub z: f64,
    pub r: f64,
}

impl CurveSample {
    pub fn point(&self) -> [f64; 2] {
        [self.z, self.r]
    }
}

/// How a curve stores its points.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveBacking {
    /// Samples over `[ε, ρ_max]` computed once at construction.
    Materialized(Vec<CurveSample>),
    /// Points are evaluated from the closed form on request.
    Lazy,
}

/// How a single surface is specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceDefinition {
    /// Conjugate positions and refractive indices.
    Optical(OpticalParameters),
    /// Coefficients given directly, plus the axial shift.
    Coefficients {
        coefficients: ShapeCoefficients,
        t_shift: f64,
    },
}

/// One refracting surface. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaCurve {
    params: Option<OpticalParameters>,
    coefficients: ShapeCoefficients,
    t_shift: f64,
    sample_count: usize,
    rho_max: f64,
    backing: CurveBacking,
}

impl SigmaCurve {
    /// Builds a curve and stores its samples.
    pub fn materialized(
        params: OpticalParameters,
        sample_count: usize,
        bisection: &BisectionSettings,
    ) -> Result<Self> {
        Self::lazy(params, sample_count, bisection)?.into_materialized()
    }

    /// Builds a curve that evaluates its points on demand.
    pub fn lazy(
        params: OpticalParameters,
        sample_count: usize,
        bisection: &BisectionSettings,
    ) -> Result<Self> {
        let coefficients = ShapeCoefficients::from_parameters(&params)?;
        Self::with_coefficients(
            Some(params),
            coefficients,
            params.t_shift,
            sample_count,
            bisection,
        )
    }

    /// Builds a lazy curve straight from its shape coefficients.
    pub fn from_coefficients(
        coefficients: ShapeCoefficients,
        t_shift: f64,
        sample_count: usize,
        bisection: &BisectionSettings,
    ) -> Result<Self> {
        coefficients.validate()?;
        if !t_shift.is_finite() {
            return Err(LensError::config(format!("axial shift must be finite (got {t_shift})")));
        }
        Self::with_coefficients(None, coefficients, t_shift, sample_count, bisection)
    }

    pub fn from_definition(
        definition: SurfaceDefinition,
        sample_count: usize,
        bisection: &BisectionSettings,
    ) -> Result<Self> {
        match definition {
            SurfaceDefinition::Optical(params) => Self::lazy(params, sample_count, bisection),
            SurfaceDefinition::Coefficients {
                coefficients,
                t_shift,
            } => Self::from_coefficients(coefficients, t_shift, sample_count, bisection),
        }
    }

    fn with_coefficients(
        params: Option<OpticalParameters>,
        coefficients: ShapeCoefficients,
        t_shift: f64,
        sample_count: usize,
        bisection: &BisectionSettings,
    ) -> Result<Self> {
        if sample_count < 2 {
            return Err(LensError::config(format!(
                "a sigma curve needs at least 2 samples (got {sample_count})"
            )));
        }
        let rho_max = discover_rho_max(&coefficients, bisection)?;
        debug!(rho_max, ?coefficients, t_shift, "sigma curve domain found");

        Ok(Self {
            params,
            coefficients,
            t_shift,
            sample_count,
            rho_max,
            backing: CurveBacking::Lazy,
        })
    }

    /// Computes and stores the samples over `[ε, ρ_max]`.
    pub fn into_materialized(mut self) -> Result<Self> {
        if let CurveBacking::Lazy = self.backing {
            let samples = self.sample_range(self.rho_max)?;
            self.backing = CurveBacking::Materialized(samples);
        }
        Ok(self)
    }

    /// Optical parameters, absent for curves built from coefficients.
    pub fn params(&self) -> Option<&OpticalParameters> {
        self.params.as_ref()
    }

    pub fn t_shift(&self) -> f64 {
        self.t_shift
    }

    pub fn coefficients(&self) -> &ShapeCoefficients {
        &self.coefficients
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Smallest positive `ρ` where the curve meets the axis.
    pub fn rho_max(&self) -> f64 {
        self.rho_max
    }

    pub fn backing(&self) -> &CurveBacking {
        &self.backing
    }

    /// All samples over `[ε, ρ_max]`.
    pub fn samples(&self) -> Result<Cow<'_, [CurveSample]>> {
        match &self.backing {
            CurveBacking::Materialized(samples) => Ok(Cow::Borrowed(samples)),
            CurveBacking::Lazy => self.sample_range(self.rho_max).map(Cow::Owned),
        }
    }

    /// `sample_count` samples over `[ε, rho_end]`, ending exactly at `rho_end`.
    pub fn samples_up_to(&self, rho_end: f64) -> Result<Vec<CurveSample>> {
        self.sample_range(rho_end)
    }

    fn sample_range(&self, rho_end: f64) -> Result<Vec<CurveSample>> {
        if !rho_end.is_finite() || rho_end <= RHO_EPSILON {
            return Err(LensError::config(format!(
                "cannot sample a sigma curve up to rho = {rho_end}"
            )));
        }
        let last = (self.sample_count - 1) as f64;
        (0..self.sample_count)
            .map(|k| {
                let rho = if k + 1 == self.sample_count {
                    rho_end
                } else {
                    RHO_EPSILON + (rho_end - RHO_EPSILON) * k as f64 / last
                };
                self.sample_at(rho)
            })
            .collect()
    }

    fn sample_at(&self, rho: f64) -> Result<CurveSample> {
        let z = self.z_at(rho);
        if !z.is_finite() {
            return Err(LensError::NonFinite {
                solver: "sigma curve",
                location: format!("rho = {rho}"),
            });
        }
        Ok(CurveSample {
            rho,
            z,
            r: radial(rho, z - self.t_shift),
        })
    }
}

impl ProfileCurve for SigmaCurve {
    fn z_at(&self, rho: f64) -> f64 {
        self.coefficients.z(rho) + self.t_shift
    }

    fn r_at(&self, rho: f64) -> f64 {
        radial(rho, self.coefficients.z(rho))
    }
}

fn radial(rho: f64, unshifted_z: f64) -> f64 {
    (rho * rho - unshifted_z * unshifted_z).max(0.0).sqrt()
}

fn discover_rho_max(
    coefficients: &ShapeCoefficients,
    bisection: &BisectionSettings,
) -> Result<f64> {
    let gap = |rho: f64| {
        let z = coefficients.z(rho);
        rho * rho - z * z
    };
    bisect(gap, RHO_EPSILON, RHO_SEARCH_START, bisection)
}
