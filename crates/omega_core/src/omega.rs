//! Joining two sigma curves into the inner contour of an Omega lens.

use crate::error::{LensError, Result};
use crate::intersection::{distance, CurveIntersector, Intersection};
use crate::sigma::{CurveSample, SigmaCurve};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Headline figures of a built lens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensSummary {
    /// `(z, r)` where the two surfaces meet.
    pub intersection: [f64; 2],
    pub rho_intersection: [f64; 2],
    /// Conjugate positions, known only for optically specified surfaces.
    pub object_position: Option<f64>,
    pub image_position: Option<f64>,
    /// Axial offset of the second surface.
    pub width: f64,
    pub diameter: f64,
}

#[derive(Debug, Clone)]
pub struct OmegaLens {
    first: SigmaCurve,
    second: SigmaCurve,
    intersection: Intersection,
    contour: Vec<[f64; 2]>,
}

impl OmegaLens {
    /// Trims both curves at their intersection and joins them.
    ///
    /// The contour runs along `first` from the axis to the junction, then back
    /// along `second` towards its own vertex. The two trimmed ends must lie
    /// within `max(intersection.tolerance, join_tolerance)` of each other.
    pub fn build(
        first: SigmaCurve,
        second: SigmaCurve,
        intersector: &dyn CurveIntersector,
        join_tolerance: f64,
    ) -> Result<Self> {
        if join_tolerance.is_nan() || join_tolerance < 0.0 {
            return Err(LensError::config("join_tolerance must be non-negative"));
        }

        let intersection = intersector.intersect(&first, &second)?;
        let head = trimmed_prefix(&first, intersection.rho[0], index_of(&intersection, 0))?;
        let tail = trimmed_prefix(&second, intersection.rho[1], index_of(&intersection, 1))?;

        let (Some(head_end), Some(tail_end)) = (head.last(), tail.last()) else {
            return Err(LensError::config("trimmed curve is empty"));
        };
        let tolerance = intersection.tolerance.max(join_tolerance);
        let gap = distance(head_end.point(), tail_end.point());
        if gap.is_nan() || gap > tolerance {
            return Err(LensError::GeometryMismatch {
                distance: gap,
                tolerance,
            });
        }

        let contour = head
            .iter()
            .chain(tail.iter().rev())
            .map(CurveSample::point)
            .collect();

        Ok(Self {
            first,
            second,
            intersection,
            contour,
        })
    }

    pub fn first(&self) -> &SigmaCurve {
        &self.first
    }

    pub fn second(&self) -> &SigmaCurve {
        &self.second
    }

    pub fn intersection(&self) -> &Intersection {
        &self.intersection
    }

    /// Ordered `(z, r)` points of the inner contour.
    pub fn inner_contour(&self) -> &[[f64; 2]] {
        &self.contour
    }

    pub fn diameter(&self) -> f64 {
        2.0 * self.intersection.point[1]
    }

    pub fn summary(&self) -> LensSummary {
        LensSummary {
            intersection: self.intersection.point,
            rho_intersection: self.intersection.rho,
            object_position: self.first.params().map(|params| params.z0),
            image_position: self.second.params().map(|params| params.zi),
            width: self.second.t_shift(),
            diameter: self.diameter(),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        info!(
            z = summary.intersection[0],
            r = summary.intersection[1],
            object_position = ?summary.object_position,
            image_position = ?summary.image_position,
            width = summary.width,
            diameter = summary.diameter,
            "lens built"
        );
    }
}

fn index_of(intersection: &Intersection, curve: usize) -> Option<usize> {
    intersection.sample_indices.map(|indices| indices[curve])
}

fn trimmed_prefix(curve: &SigmaCurve, rho: f64, index: Option<usize>) -> Result<Vec<CurveSample>> {
    match index {
        Some(index) => {
            let samples = curve.samples()?;
            samples
                .get(..=index)
                .map(<[CurveSample]>::to_vec)
                .ok_or_else(|| {
                    LensError::config(format!(
                        "intersection index {index} is past the curve's {} samples",
                        samples.len()
                    ))
                })
        }
        None => curve.samples_up_to(rho),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersection::{
        segment_crossing, NearestSampleIntersector, NewtonIntersector,
    };
    use crate::roots::{BisectionSettings, NewtonSettings};
    use crate::sigma::OpticalParameters;

    struct FixedIntersector(Intersection);

    impl CurveIntersector for FixedIntersector {
        fn intersect(&self, _first: &SigmaCurve, _second: &SigmaCurve) -> Result<Intersection> {
            Ok(self.0)
        }
    }

    fn curves(samples: usize, stored: bool) -> (SigmaCurve, SigmaCurve) {
        let settings = BisectionSettings::default();
        let first = OpticalParameters::new(100000.0, 60.0, 1.0, 1.5);
        let second = OpticalParameters::new(-60.0, 30.0, 1.5, 1.0).with_shift(4.0);
        let build = |params| {
            if stored {
                SigmaCurve::materialized(params, samples, &settings)
            } else {
                SigmaCurve::lazy(params, samples, &settings)
            }
        };
        (build(first).expect("first"), build(second).expect("second"))
    }

    fn newton() -> NewtonIntersector {
        NewtonIntersector {
            initial_guess: [1.0, 1.0],
            settings: NewtonSettings::default(),
            tolerance: 1e-6,
        }
    }

    #[test]
    fn inner_contour_joins_at_the_intersection() {
        let (first, second) = curves(40, false);
        let lens = OmegaLens::build(first, second, &newton(), 1e-6).expect("lens");
        let contour = lens.inner_contour();
        assert_eq!(contour.len(), 80);

        let junction = lens.intersection().point;
        assert!(distance(contour[39], junction) < 1e-9);
        assert!(distance(contour[40], junction) < 1e-6);

        // Ends sit near each surface's vertex on the axis.
        assert!(contour[0][1] < 1e-5);
        assert!((contour[79][0] - 4.0).abs() < 1e-5);
    }

    #[test]
    fn inner_contour_has_no_gaps_or_reversals_in_rho() {
        let (first, second) = curves(40, false);
        let lens = OmegaLens::build(first, second, &newton(), 1e-6).expect("lens");
        let rho = lens.intersection().rho;
        let head = lens.first().samples_up_to(rho[0]).expect("head");
        let tail = lens.second().samples_up_to(rho[1]).expect("tail");
        assert!(head.windows(2).all(|w| w[0].rho < w[1].rho));
        assert!(tail.windows(2).all(|w| w[0].rho < w[1].rho));
        assert_eq!(lens.inner_contour()[40], tail[39].point());
    }

    #[test]
    fn inner_contour_does_not_cross_itself() {
        let (first, second) = curves(40, false);
        let lens = OmegaLens::build(first, second, &newton(), 1e-6).expect("lens");
        let segments: Vec<_> = lens
            .inner_contour()
            .windows(2)
            .map(|w| (w[0], w[1]))
            .collect();

        for (k, &(p0, p1)) in segments.iter().enumerate() {
            for &(q0, q1) in segments.iter().skip(k + 2) {
                if let Some(hit) = segment_crossing(p0, p1, q0, q1) {
                    let at_shared_end = [p0, p1, q0, q1]
                        .iter()
                        .any(|&end| distance(end, hit) < 1e-9);
                    assert!(
                        at_shared_end,
                        "segments {p0:?}-{p1:?} and {q0:?}-{q1:?} meet at {hit:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn summary_reports_diameter_and_width() {
        let (first, second) = curves(20, false);
        let lens = OmegaLens::build(first, second, &newton(), 1e-6).expect("lens");
        let summary = lens.summary();
        assert!((summary.diameter - 2.0 * 10.182229968999227).abs() < 1e-5);
        assert_eq!(summary.width, 4.0);
        assert_eq!(summary.object_position, Some(100000.0));
        assert_eq!(summary.image_position, Some(30.0));
    }

    #[test]
    fn nearest_sample_contour_uses_stored_prefixes() {
        let (first, second) = curves(400, true);
        let lens = OmegaLens::build(first, second, &NearestSampleIntersector, 1e-6).expect("lens");
        let [i, j] = lens.intersection().sample_indices.expect("indices");
        assert_eq!(lens.inner_contour().len(), i + j + 2);
    }

    #[test]
    fn disagreeing_prefixes_are_reported() {
        let (first, second) = curves(20, false);
        let bogus = FixedIntersector(Intersection {
            rho: [10.0, 30.0],
            sample_indices: None,
            point: [0.0, 0.0],
            gap: 0.0,
            tolerance: 1e-6,
        });
        let result = OmegaLens::build(first, second, &bogus, 1e-6);
        assert!(matches!(result, Err(LensError::GeometryMismatch { .. })));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (first, second) = curves(20, true);
        let bogus = FixedIntersector(Intersection {
            rho: [10.0, 10.0],
            sample_indices: Some([25, 0]),
            point: [0.0, 0.0],
            gap: 0.0,
            tolerance: 1.0,
        });
        let result = OmegaLens::build(first, second, &bogus, 1e-6);
        assert!(matches!(result, Err(LensError::Configuration(_))));
    }
}
