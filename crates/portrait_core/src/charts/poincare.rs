//! Chart maps for the unweighted Poincare sphere (p = q = 1).
//!
//! Every stored sphere point lies on the closed upper hemisphere. The chart
//! conventions are:
//!
//!   R2: (x, y)  -> (x, y, 1) / s,           s = sqrt(1 + x^2 + y^2)
//!   U1: (z1, z2) = (Y/X, Z/X) for X > 0, z2 >= 0 on the primary side
//!   V1: (z1, z2) = (Y/X, Z/X) for X < 0, z2 <= 0 on the primary side
//!   U2: (z1, z2) = (X/Y, Z/Y) for Y > 0
//!   V2: (z1, z2) = (X/Y, Z/Y) for Y < 0
//!
//! The mirror charts (vv1 for U1, uu1 for V1, ...) parameterize the upper
//! hemisphere near the equator from the far side by reflecting z2, so the
//! seam maps agree exactly at z2 = 0. Antipodal identification of equator
//! points is handled by the tracing layer, never inside these maps.

use super::SpherePoint;

pub fn r2_to_sphere(x: f64, y: f64) -> SpherePoint {
    let s = (1.0 + x * x + y * y).sqrt();
    [x / s, y / s, 1.0 / s]
}

pub fn sphere_to_r2(p: &SpherePoint) -> (f64, f64) {
    (p[0] / p[2], p[1] / p[2])
}

pub fn u1_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    let s = (1.0 + z1 * z1 + z2 * z2).sqrt();
    [1.0 / s, z1 / s, z2 / s]
}

pub fn sphere_to_u1(p: &SpherePoint) -> (f64, f64) {
    (p[1] / p[0], p[2] / p[0])
}

pub fn v1_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    let s = (1.0 + z1 * z1 + z2 * z2).sqrt();
    [-1.0 / s, -z1 / s, -z2 / s]
}

pub fn sphere_to_v1(p: &SpherePoint) -> (f64, f64) {
    (p[1] / p[0], p[2] / p[0])
}

pub fn u2_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    let s = (1.0 + z1 * z1 + z2 * z2).sqrt();
    [z1 / s, 1.0 / s, z2 / s]
}

pub fn sphere_to_u2(p: &SpherePoint) -> (f64, f64) {
    (p[0] / p[1], p[2] / p[1])
}

pub fn v2_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    let s = (1.0 + z1 * z1 + z2 * z2).sqrt();
    [-z1 / s, -1.0 / s, -z2 / s]
}

pub fn sphere_to_v2(p: &SpherePoint) -> (f64, f64) {
    (p[0] / p[1], p[2] / p[1])
}

// Mirror charts: same local coordinates, reflected z2, so that near the seam
// (z2 close to 0 from either side) the image stays on the upper hemisphere
// and the two parameterizations agree at z2 = 0.

pub fn vv1_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    u1_to_sphere(z1, -z2)
}

pub fn sphere_to_vv1(p: &SpherePoint) -> (f64, f64) {
    let (z1, z2) = sphere_to_u1(p);
    (z1, -z2)
}

pub fn uu1_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    v1_to_sphere(z1, -z2)
}

pub fn sphere_to_uu1(p: &SpherePoint) -> (f64, f64) {
    let (z1, z2) = sphere_to_v1(p);
    (z1, -z2)
}

pub fn vv2_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    u2_to_sphere(z1, -z2)
}

pub fn sphere_to_vv2(p: &SpherePoint) -> (f64, f64) {
    let (z1, z2) = sphere_to_u2(p);
    (z1, -z2)
}

pub fn uu2_to_sphere(z1: f64, z2: f64) -> SpherePoint {
    v2_to_sphere(z1, -z2)
}

pub fn sphere_to_uu2(p: &SpherePoint) -> (f64, f64) {
    let (z1, z2) = sphere_to_v2(p);
    (z1, -z2)
}

/// Embeds chart-local coordinates on the sphere, chart by chart.
pub fn chart_to_sphere(chart: super::Chart, x: f64, y: f64) -> SpherePoint {
    match chart {
        super::Chart::R2 => r2_to_sphere(x, y),
        super::Chart::U1 => u1_to_sphere(x, y),
        super::Chart::V1 => v1_to_sphere(x, y),
        super::Chart::U2 => u2_to_sphere(x, y),
        super::Chart::V2 => v2_to_sphere(x, y),
    }
}

/// Projects a sphere point into chart-local coordinates.
pub fn sphere_to_chart(chart: super::Chart, p: &SpherePoint) -> (f64, f64) {
    match chart {
        super::Chart::R2 => sphere_to_r2(p),
        super::Chart::U1 => sphere_to_u1(p),
        super::Chart::V1 => sphere_to_v1(p),
        super::Chart::U2 => sphere_to_u2(p),
        super::Chart::V2 => sphere_to_v2(p),
    }
}
