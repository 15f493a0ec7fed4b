//! Locating the point where two sigma curves meet.
//!
//! Two strategies share the [`CurveIntersector`] contract: a brute-force
//! nearest-sample search over materialized curves and a Newton search in the
//! curves' joint parameter space `(ρ1, ρ2)`.

use crate::error::{LensError, Result};
use crate::roots::{newton_raphson_2d, NewtonSettings};
use crate::sigma::{CurveSample, SigmaCurve};
use crate::traits::ProfileCurve;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    /// Parameter on each curve at the meeting point.
    pub rho: [f64; 2],
    /// Sample indices, present when the intersection was found on samples.
    pub sample_indices: Option<[usize; 2]>,
    /// Physical `(z, r)` location.
    pub point: [f64; 2],
    /// Distance between the two curves' points at `rho`.
    pub gap: f64,
    /// Accuracy the producing strategy guarantees for `point`.
    pub tolerance: f64,
}

pub trait CurveIntersector {
    fn intersect(&self, first: &SigmaCurve, second: &SigmaCurve) -> Result<Intersection>;
}

/// Which intersector the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntersectionStrategy {
    Newton { initial_guess: [f64; 2] },
    NearestSample,
}

impl Default for IntersectionStrategy {
    fn default() -> Self {
        IntersectionStrategy::Newton {
            initial_guess: [1.0, 1.0],
        }
    }
}

impl IntersectionStrategy {
    pub fn intersector(
        &self,
        settings: NewtonSettings,
        join_tolerance: f64,
    ) -> Box<dyn CurveIntersector> {
        match *self {
            IntersectionStrategy::Newton { initial_guess } => Box::new(NewtonIntersector {
                initial_guess,
                settings,
                tolerance: join_tolerance,
            }),
            IntersectionStrategy::NearestSample => Box::new(NearestSampleIntersector),
        }
    }

    /// Whether curves must carry stored samples for this strategy.
    pub fn needs_samples(&self) -> bool {
        matches!(self, IntersectionStrategy::NearestSample)
    }
}

/// Picks the closest pair of samples; accuracy is bounded by sample spacing.
///
/// The pair is only accepted when the sampled polylines actually cross and
/// the pair's midpoint lies within half the longer crossing segment of that
/// crossing. A pair involving an on-axis vertex is never a rim junction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestSampleIntersector;

impl NearestSampleIntersector {
    pub fn intersect_samples(
        &self,
        first: &[CurveSample],
        second: &[CurveSample],
    ) -> Result<Intersection> {
        if first.is_empty() || second.is_empty() {
            return Err(LensError::config(
                "nearest-sample intersection needs non-empty curves",
            ));
        }

        let mut best = (f64::INFINITY, 0usize, 0usize);
        for (i, a) in first.iter().enumerate() {
            for (j, b) in second.iter().enumerate() {
                let d = distance(a.point(), b.point());
                if d < best.0 {
                    best = (d, i, j);
                }
            }
        }
        let (gap, i, j) = best;
        if !gap.is_finite() {
            return Err(LensError::NonFinite {
                solver: "nearest-sample intersection",
                location: format!("samples ({i}, {j})"),
            });
        }

        let (a, b) = (first[i], second[j]);
        let point = [0.5 * (a.z + b.z), 0.5 * (a.r + b.r)];
        let crossing = nearest_crossing(first, second, point);
        let Some((crossing, segment)) = crossing.filter(|_| i > 0 && j > 0) else {
            return Err(LensError::GeometryMismatch {
                distance: gap,
                tolerance: 0.0,
            });
        };

        let tolerance = 0.5 * segment;
        let offset = distance(point, crossing);
        debug!(i, j, gap, offset, tolerance, "nearest samples found");
        if offset.is_nan() || offset > tolerance {
            return Err(LensError::GeometryMismatch {
                distance: offset,
                tolerance,
            });
        }

        Ok(Intersection {
            rho: [a.rho, b.rho],
            sample_indices: Some([i, j]),
            point,
            gap,
            tolerance,
        })
    }
}

impl CurveIntersector for NearestSampleIntersector {
    fn intersect(&self, first: &SigmaCurve, second: &SigmaCurve) -> Result<Intersection> {
        let a = first.samples()?;
        let b = second.samples()?;
        self.intersect_samples(&a, &b)
    }
}

/// Crossing of the two sample polylines closest to `near`, with the length of
/// the longer of the two segments that cross there.
fn nearest_crossing(
    first: &[CurveSample],
    second: &[CurveSample],
    near: [f64; 2],
) -> Option<([f64; 2], f64)> {
    let mut best: Option<(f64, [f64; 2], f64)> = None;
    for p in first.windows(2) {
        for q in second.windows(2) {
            let (p0, p1, q0, q1) = (p[0].point(), p[1].point(), q[0].point(), q[1].point());
            let Some(crossing) = segment_crossing(p0, p1, q0, q1) else {
                continue;
            };
            let d = distance(crossing, near);
            if best.map_or(true, |(closest, _, _)| d < closest) {
                best = Some((d, crossing, distance(p0, p1).max(distance(q0, q1))));
            }
        }
    }
    best.map(|(_, crossing, segment)| (crossing, segment))
}

/// Point where segments `p0p1` and `q0q1` meet, endpoints included.
pub(crate) fn segment_crossing(
    p0: [f64; 2],
    p1: [f64; 2],
    q0: [f64; 2],
    q1: [f64; 2],
) -> Option<[f64; 2]> {
    let d1 = [p1[0] - p0[0], p1[1] - p0[1]];
    let d2 = [q1[0] - q0[0], q1[1] - q0[1]];
    let denom = cross(d1, d2);
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let w = [q0[0] - p0[0], q0[1] - p0[1]];
    let s = cross(w, d2) / denom;
    let u = cross(w, d1) / denom;
    let unit = 0.0..=1.0;
    (unit.contains(&s) && unit.contains(&u)).then(|| [p0[0] + s * d1[0], p0[1] + s * d1[1]])
}

fn cross(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Solves `z1(ρ1) = z2(ρ2)`, `r1(ρ1) = r2(ρ2)` from an initial guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonIntersector {
    pub initial_guess: [f64; 2],
    pub settings: NewtonSettings,
    /// Reported as the intersection tolerance.
    pub tolerance: f64,
}

impl NewtonIntersector {
    pub fn solve<A, B>(&self, first: &A, second: &B) -> Result<Intersection>
    where
        A: ProfileCurve + ?Sized,
        B: ProfileCurve + ?Sized,
    {
        let residual = |rho1: f64, rho2: f64| {
            let [z1, r1] = first.point_at(rho1);
            let [z2, r2] = second.point_at(rho2);
            [z1 - z2, r1 - r2]
        };
        let solution = newton_raphson_2d(residual, self.initial_guess, &self.settings)?;

        // Both profiles are even in rho, so a negative root names the same point.
        let rho = [solution.x[0].abs(), solution.x[1].abs()];
        let point = first.point_at(rho[0]);
        let gap = distance(point, second.point_at(rho[1]));
        debug!(
            rho1 = rho[0],
            rho2 = rho[1],
            iterations = solution.iterations,
            gap,
            "parametric intersection found"
        );

        Ok(Intersection {
            rho,
            sample_indices: None,
            point,
            gap,
            tolerance: self.tolerance,
        })
    }
}

impl CurveIntersector for NewtonIntersector {
    fn intersect(&self, first: &SigmaCurve, second: &SigmaCurve) -> Result<Intersection> {
        self.solve(first, second)
    }
}

pub(crate) fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}
