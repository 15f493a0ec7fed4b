//! Sweeping a meridional contour around the `z` axis.

use std::f64::consts::TAU;

use crate::error::{LensError, Result};
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Checks that every triangle references an existing vertex.
    pub fn validate(&self) -> Result<()> {
        let count = self.vertices.len();
        for (t, triangle) in self.triangles.iter().enumerate() {
            if let Some(&bad) = triangle.iter().find(|&&i| i as usize >= count) {
                return Err(LensError::config(format!(
                    "triangle {t} references vertex {bad} (vertex count = {count})"
                )));
            }
        }
        Ok(())
    }

    /// Corner positions of triangle `index`. Panics on an invalid mesh.
    pub fn corners(&self, index: usize) -> [[f64; 3]; 3] {
        self.triangles[index].map(|i| self.vertices[i as usize])
    }

    /// Vertex positions flattened as `[x, y, z, x, y, z, ...]`.
    pub fn flat_vertices(&self) -> Vec<f64> {
        self.vertices.iter().flatten().copied().collect()
    }

    pub fn flat_triangles(&self) -> Vec<u32> {
        self.triangles.iter().flatten().copied().collect()
    }
}

/// Revolves an ordered `(z, r)` contour into `contour.len() * n_phi` vertices.
///
/// Vertex `(ring, angle)` lives at index `ring * n_phi + angle` and angles wrap
/// modulo `n_phi`, so the seam shares vertices. Both ends stay open.
pub fn revolve_contour(contour: &[[f64; 2]], n_phi: usize) -> Result<Mesh> {
    let n_theta = contour.len();
    if n_theta < 2 {
        return Err(LensError::config(format!(
            "revolution needs at least 2 contour points (got {n_theta})"
        )));
    }
    if n_phi < 2 {
        return Err(LensError::config(format!(
            "revolution needs at least 2 angular steps (got {n_phi})"
        )));
    }
    if n_theta
        .checked_mul(n_phi)
        .map_or(true, |total| total > u32::MAX as usize)
    {
        return Err(LensError::config(format!(
            "{n_theta} x {n_phi} vertices do not fit 32-bit indices"
        )));
    }

    let angles: Vec<(f64, f64)> = (0..n_phi)
        .map(|j| (TAU * j as f64 / n_phi as f64).sin_cos())
        .collect();

    let mut vertices = Vec::with_capacity(n_theta * n_phi);
    for &[z, r] in contour {
        for &(sin, cos) in &angles {
            vertices.push([r * cos, r * sin, z]);
        }
    }

    Ok(Mesh {
        vertices,
        triangles: revolution_triangles(n_theta, n_phi),
    })
}

/// Two co-oriented triangles per cell, split along the `(i, j)`–`(i+1, j+1)`
/// diagonal.
pub fn revolution_triangles(n_theta: usize, n_phi: usize) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(2 * n_theta.saturating_sub(1) * n_phi);
    for i in 0..n_theta.saturating_sub(1) {
        for j in 0..n_phi {
            let j2 = (j + 1) % n_phi;
            let v0 = (i * n_phi + j) as u32;
            let v1 = ((i + 1) * n_phi + j) as u32;
            let v2 = ((i + 1) * n_phi + j2) as u32;
            let v3 = (i * n_phi + j2) as u32;
            triangles.push([v0, v1, v2]);
            triangles.push([v0, v2, v3]);
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn small_revolution_has_expected_counts() {
        let contour = [[0.0, 1.0], [1.0, 2.0], [2.0, 1.0]];
        let mesh = revolve_contour(&contour, 4).expect("mesh");
        assert_eq!(mesh.vertex_count(), 12);
        assert_eq!(mesh.triangle_count(), 16);
        assert!(mesh.triangles.iter().flatten().all(|&i| i < 12));
        mesh.validate().expect("indices in range");
    }

    #[test]
    fn vertices_follow_ring_major_order() {
        let contour = [[0.5, 2.0], [1.5, 3.0]];
        let mesh = revolve_contour(&contour, 4).expect("mesh");
        let quarter = mesh.vertices[1];
        assert_relative_eq!(quarter[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(quarter[1], 2.0, epsilon = 1e-12);
        assert_eq!(quarter[2], 0.5);
        assert_eq!(mesh.vertices[4], [3.0, 0.0, 1.5]);
    }

    #[test]
    fn seam_wraps_without_duplicate_vertices() {
        let triangles = revolution_triangles(2, 3);
        assert_eq!(triangles.len(), 6);
        assert_eq!(triangles[4], [2, 5, 3]);
        assert_eq!(triangles[5], [2, 3, 0]);
    }

    #[test]
    fn neighbouring_triangles_share_the_diagonal() {
        let triangles = revolution_triangles(3, 5);
        for pair in triangles.chunks(2) {
            assert_eq!(pair[0][0], pair[1][0]);
            assert_eq!(pair[0][2], pair[1][1]);
        }
    }

    #[test]
    fn every_face_points_the_same_way() {
        // A cylinder of radius 1: outward normals have positive radial part
        // for one winding and negative for the other, never mixed.
        let contour = [[0.0, 1.0], [1.0, 1.0], [2.0, 1.0]];
        let mesh = revolve_contour(&contour, 8).expect("mesh");
        let signs: Vec<bool> = (0..mesh.triangle_count())
            .map(|t| {
                let [a, b, c] = mesh.corners(t);
                let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
                let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
                let n = [
                    e1[1] * e2[2] - e1[2] * e2[1],
                    e1[2] * e2[0] - e1[0] * e2[2],
                ];
                let centroid = [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0];
                n[0] * centroid[0] + n[1] * centroid[1] > 0.0
            })
            .collect();
        assert!(signs.iter().all(|&s| s == signs[0]));
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(revolve_contour(&[[0.0, 1.0]], 4).is_err());
        assert!(revolve_contour(&[[0.0, 1.0], [1.0, 1.0]], 1).is_err());
    }

    #[test]
    fn validate_catches_out_of_range_indices() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]],
            triangles: vec![[0, 1, 2]],
        };
        assert!(matches!(mesh.validate(), Err(LensError::Configuration(_))));
    }
}
