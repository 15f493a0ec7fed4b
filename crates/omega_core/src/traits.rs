/// A meridional profile `(z(ρ), r(ρ))` parameterized by a radial variable.
///
/// Implementors are read-only: evaluating a point never changes the curve.
pub trait ProfileCurve {
    /// Axial coordinate of the profile at `rho`.
    fn z_at(&self, rho: f64) -> f64;

    /// Distance from the symmetry axis at `rho`.
    fn r_at(&self, rho: f64) -> f64;

    /// The `(z, r)` point at `rho`.
    fn point_at(&self, rho: f64) -> [f64; 2] {
        [self.z_at(rho), self.r_at(rho)]
    }
}
