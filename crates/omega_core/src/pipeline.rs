//! End-to-end lens construction: parameters → curves → contour → mesh → STL.

use std::path::Path;

use crate::config::{LensSurfaces, PipelineConfig};
use crate::error::Result;
use crate::mesh::{revolve_contour, Mesh};
use crate::omega::{LensSummary, OmegaLens};
use crate::sigma::{CurveSample, SigmaCurve};
use crate::stl::{save_stl, to_ascii_stl};
use tracing::debug;

/// Read-only snapshot handed to a 2-D viewer.
#[derive(Debug, Clone, Copy)]
pub struct ProfileView<'a> {
    pub first: &'a [CurveSample],
    pub second: &'a [CurveSample],
    pub inner_contour: &'a [[f64; 2]],
    pub intersection: [f64; 2],
    pub width: f64,
    pub diameter: f64,
}

/// Presentation hooks. Viewers only ever see shared references.
pub trait LensViewer {
    fn show_profile(&mut self, _view: &ProfileView<'_>) {}

    fn show_mesh(&mut self, _mesh: &Mesh) {}
}

/// Viewer that shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViewer;

impl LensViewer for NoViewer {}

#[derive(Debug, Clone)]
pub struct LensBuild {
    pub lens: OmegaLens,
    pub mesh: Mesh,
}

impl LensBuild {
    pub fn summary(&self) -> LensSummary {
        self.lens.summary()
    }

    pub fn to_ascii_stl(&self, name: &str) -> Result<String> {
        to_ascii_stl(&self.mesh, name)
    }

    /// Writes the mesh using the configured solid name and format.
    pub fn export<P: AsRef<Path>>(&self, path: P, config: &PipelineConfig) -> Result<()> {
        save_stl(path, &self.mesh, &config.solid_name, config.format)
    }
}

pub fn build_lens<L>(lens: &L, config: &PipelineConfig) -> Result<LensBuild>
where
    L: LensSurfaces + ?Sized,
{
    build_lens_with_viewer(lens, config, &mut NoViewer)
}

/// Builds the lens and mesh, calling the viewer for each enabled view.
///
/// Any solver failure aborts before a mesh is generated.
pub fn build_lens_with_viewer<L>(
    design: &L,
    config: &PipelineConfig,
    viewer: &mut dyn LensViewer,
) -> Result<LensBuild>
where
    L: LensSurfaces + ?Sized,
{
    config.validate()?;

    let samples = config.sampling.rho_points;
    let [first, second] = design.surface_definitions();
    let mut first = SigmaCurve::from_definition(first, samples, &config.bisection)?;
    let mut second = SigmaCurve::from_definition(second, samples, &config.bisection)?;
    if config.strategy.needs_samples() {
        first = first.into_materialized()?;
        second = second.into_materialized()?;
    }

    let intersector = config
        .strategy
        .intersector(config.newton, config.join_tolerance);
    let lens = OmegaLens::build(first, second, intersector.as_ref(), config.join_tolerance)?;
    lens.log_summary();

    let mesh = revolve_contour(lens.inner_contour(), config.sampling.angular_steps())?;
    debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "lens mesh generated"
    );

    if config.show_2d {
        let first_samples = lens.first().samples()?;
        let second_samples = lens.second().samples()?;
        let summary = lens.summary();
        viewer.show_profile(&ProfileView {
            first: &first_samples,
            second: &second_samples,
            inner_contour: lens.inner_contour(),
            intersection: summary.intersection,
            width: summary.width,
            diameter: summary.diameter,
        });
    }
    if config.show_3d {
        viewer.show_mesh(&mesh);
    }

    Ok(LensBuild { lens, mesh })
}

/// Builds the lens and writes it to `path`.
pub fn run<L, P>(design: &L, config: &PipelineConfig, path: P) -> Result<LensBuild>
where
    L: LensSurfaces + ?Sized,
    P: AsRef<Path>,
{
    let build = build_lens(design, config)?;
    build.export(path, config)?;
    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoefficientLens, LensDesign, LensParameters};
    use crate::error::LensError;
    use crate::sigma::ShapeCoefficients;
    use crate::intersection::IntersectionStrategy;
    use crate::stl::parse_ascii_stl;

    #[derive(Default)]
    struct RecordingViewer {
        profiles: usize,
        meshes: usize,
        contour_len: usize,
    }

    impl LensViewer for RecordingViewer {
        fn show_profile(&mut self, view: &ProfileView<'_>) {
            self.profiles += 1;
            self.contour_len = view.inner_contour.len();
        }

        fn show_mesh(&mut self, _mesh: &Mesh) {
            self.meshes += 1;
        }
    }

    fn reference() -> LensParameters {
        LensParameters {
            z0: 100000.0,
            z1: 60.0,
            z2: 30.0,
            n0: 1.0,
            n1: 1.5,
            t: 4.0,
        }
    }

    #[test]
    fn default_pipeline_builds_reference_lens() {
        let build = build_lens(&reference(), &PipelineConfig::default()).expect("lens");
        assert_eq!(build.lens.inner_contour().len(), 20);
        assert_eq!(build.mesh.vertex_count(), 20 * 20);
        assert_eq!(build.mesh.triangle_count(), 2 * 19 * 20);
    }

    #[test]
    fn viewers_are_called_only_when_enabled() {
        let mut viewer = RecordingViewer::default();
        build_lens_with_viewer(&reference(), &PipelineConfig::default(), &mut viewer)
            .expect("lens");
        assert_eq!((viewer.profiles, viewer.meshes), (0, 0));

        let config = PipelineConfig {
            show_2d: true,
            show_3d: true,
            ..PipelineConfig::default()
        };
        build_lens_with_viewer(&reference(), &config, &mut viewer).expect("lens");
        assert_eq!((viewer.profiles, viewer.meshes), (1, 1));
        assert_eq!(viewer.contour_len, 20);
    }

    #[test]
    fn degenerate_parameters_abort_before_meshing() {
        let params = LensParameters {
            n1: 1.0,
            ..reference()
        };
        let mut viewer = RecordingViewer::default();
        let config = PipelineConfig {
            show_3d: true,
            ..PipelineConfig::default()
        };
        let result = build_lens_with_viewer(&params, &config, &mut viewer);
        assert!(matches!(result, Err(LensError::Configuration(_))));
        assert_eq!(viewer.meshes, 0);
    }

    #[test]
    fn run_writes_the_mesh_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lens.stl");
        let build = run(&reference(), &PipelineConfig::default(), &path).expect("run");

        let text = std::fs::read_to_string(&path).expect("read back");
        assert!(text.starts_with("solid surface\n"));
        assert!(text.trim_end().ends_with("endsolid surface"));
        assert_eq!(text.matches("facet normal").count(), build.mesh.triangle_count());
    }

    #[test]
    fn exported_text_parses_back_to_the_same_facets() {
        let build = build_lens(&reference(), &PipelineConfig::default()).expect("lens");
        let document = parse_ascii_stl(&build.to_ascii_stl("lens").expect("stl")).expect("parse");
        assert_eq!(document.name, "lens");
        assert_eq!(document.facets.len(), build.mesh.triangle_count());
        for (t, facet) in document.facets.iter().enumerate() {
            assert_eq!(facet.vertices, build.mesh.corners(t));
        }
    }

    #[test]
    fn nearest_sample_strategy_lands_near_the_newton_junction() {
        let newton = build_lens(&reference(), &PipelineConfig::default()).expect("newton");
        let config = PipelineConfig {
            sampling: crate::config::SampleCounts {
                rho_points: 400,
                angular_points: 4,
            },
            strategy: IntersectionStrategy::NearestSample,
            ..PipelineConfig::default()
        };
        let nearest = build_lens(&reference(), &config).expect("nearest");

        let [i, j] = nearest
            .lens
            .intersection()
            .sample_indices
            .expect("sample indices");
        assert_eq!(nearest.lens.inner_contour().len(), i + j + 2);
        assert_eq!(nearest.mesh.vertex_count(), (i + j + 2) * 8);

        let a = newton.summary().intersection;
        let b = nearest.summary().intersection;
        assert!(((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt() < 0.5);
    }

    #[test]
    fn coefficient_document_builds_the_same_lens() {
        let params = reference();
        let (first, second) = params.surfaces();
        let design = LensDesign::from(CoefficientLens {
            sigma1: ShapeCoefficients::from_parameters(&first).expect("first"),
            sigma2: ShapeCoefficients::from_parameters(&second).expect("second"),
            t: params.t,
        });

        let optical = build_lens(&params, &PipelineConfig::default()).expect("optical");
        let direct = build_lens(&design, &PipelineConfig::default()).expect("coefficients");
        assert_eq!(direct.lens.inner_contour(), optical.lens.inner_contour());
        assert_eq!(direct.summary().width, 4.0);
        assert_eq!(direct.summary().object_position, None);
        assert_eq!(optical.summary().object_position, Some(100000.0));
    }

    #[test]
    fn coarse_nearest_sample_lens_is_rejected() {
        let config = PipelineConfig {
            strategy: IntersectionStrategy::NearestSample,
            ..PipelineConfig::default()
        };
        let result = build_lens(&reference(), &config);
        assert!(matches!(result, Err(LensError::GeometryMismatch { .. })));
    }
}
