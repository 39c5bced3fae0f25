//! Coordinate charts covering the Poincare / Poincare-Lyapunov sphere.
//!
//! Five local charts cover the sphere: the finite plane R2 and four charts
//! (U1, U2, V1, V2) covering neighborhoods of the circle at infinity from the
//! four axis directions. `poincare` holds the unweighted (p = q = 1) maps,
//! `lyapunov` the weighted ones, and `view` the per-view dispatch the rest of
//! the engine selects once and then calls through.

pub mod lyapunov;
pub mod poincare;
pub mod view;

use serde::{Deserialize, Serialize};

/// Compactified sphere coordinates.
///
/// In Poincare mode this is `(X, Y, Z)` on the closed upper unit hemisphere
/// (`Z >= 0`, equator = circle at infinity). In Poincare-Lyapunov mode the
/// triple is `(d, a, b)`: `d = 0` for a finite point with plane coordinates
/// `(a, b)`, `d = 1` for an annulus point `(s, theta)` with `s -> 0` at
/// infinity.
pub type SpherePoint = [f64; 3];

/// Points with `|Z|` below this are treated as lying on the equator.
pub const EQUATOR_EPS: f64 = 1.0e-8;

/// Z threshold below which the finite chart becomes ill-conditioned and the
/// engine works in the chart at infinity instead.
pub const CHART_Z_THRESHOLD: f64 = 1.0e-2;

/// Sphere-metric threshold under which two singularities coincide.
pub const COINCIDENCE_TOL: f64 = 1.0e-8;

/// Identifier of the local chart a coordinate pair is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chart {
    R2,
    U1,
    V1,
    U2,
    V2,
}

impl Chart {
    /// Chart id as written in the result tables.
    pub fn from_code(code: i32) -> Option<Chart> {
        match code {
            0 => Some(Chart::R2),
            1 => Some(Chart::U1),
            2 => Some(Chart::V1),
            3 => Some(Chart::U2),
            4 => Some(Chart::V2),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Chart::R2 => 0,
            Chart::U1 => 1,
            Chart::V1 => 2,
            Chart::U2 => 3,
            Chart::V2 => 4,
        }
    }

    pub fn is_finite(self) -> bool {
        self == Chart::R2
    }
}

/// The chart a Poincare-sphere point naturally falls in: R2 while the finite
/// chart is still well-conditioned, otherwise the U/V chart of the dominant
/// axis direction. The seam test `z2 >= 0` is inclusive, favoring the
/// primary chart.
pub fn natural_chart(p: &SpherePoint) -> Chart {
    if p[2] > CHART_Z_THRESHOLD {
        return Chart::R2;
    }
    if p[0].abs() >= p[1].abs() {
        if p[0] >= 0.0 {
            Chart::U1
        } else {
            Chart::V1
        }
    } else if p[1] >= 0.0 {
        Chart::U2
    } else {
        Chart::V2
    }
}

/// True if a Poincare-sphere point lies on the circle at infinity.
pub fn is_at_infinity(p: &SpherePoint) -> bool {
    p[2].abs() < EQUATOR_EPS
}

/// Distance between two Poincare-sphere points under the chart-appropriate
/// metric: angular distance for two equator points, Euclidean distance after
/// projection to the finite plane otherwise. Mixed pairs never coincide.
pub fn sphere_distance(a: &SpherePoint, b: &SpherePoint) -> f64 {
    match (is_at_infinity(a), is_at_infinity(b)) {
        (true, true) => {
            let ta = a[1].atan2(a[0]);
            let tb = b[1].atan2(b[0]);
            let mut d = (ta - tb).abs();
            if d > std::f64::consts::PI {
                d = 2.0 * std::f64::consts::PI - d;
            }
            d
        }
        (false, false) => {
            let (xa, ya) = poincare::sphere_to_r2(a);
            let (xb, yb) = poincare::sphere_to_r2(b);
            ((xa - xb).powi(2) + (ya - yb).powi(2)).sqrt()
        }
        _ => f64::INFINITY,
    }
}

/// Distance between two Poincare-Lyapunov points: Euclidean in the finite
/// disk, `(delta s, delta theta)` norm on the annulus, infinite across the
/// two regions.
pub fn plsphere_distance(a: &SpherePoint, b: &SpherePoint) -> f64 {
    let fin_a = a[0] == 0.0;
    let fin_b = b[0] == 0.0;
    match (fin_a, fin_b) {
        (true, true) => ((a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt(),
        (false, false) => {
            let mut dt = (a[2] - b[2]).abs();
            if dt > std::f64::consts::PI {
                dt = 2.0 * std::f64::consts::PI - dt;
            }
            ((a[1] - b[1]).powi(2) + dt * dt).sqrt()
        }
        _ => f64::INFINITY,
    }
}

/// Which compactification the whole study works in. Selected once at load
/// time; everything downstream dispatches through it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CompactMode {
    Poincare,
    Lyapunov(lyapunov::PlWeights),
}

impl Default for CompactMode {
    fn default() -> Self {
        CompactMode::Poincare
    }
}

impl CompactMode {
    /// Builds the mode for given weights, collapsing trivial weights to the
    /// plain Poincare sphere.
    pub fn from_weights(p: i32, q: i32) -> CompactMode {
        let w = lyapunov::PlWeights::new(p, q);
        if w.is_trivial() {
            CompactMode::Poincare
        } else {
            CompactMode::Lyapunov(w)
        }
    }

    pub fn natural_chart(&self, p: &SpherePoint) -> Chart {
        match self {
            CompactMode::Poincare => natural_chart(p),
            CompactMode::Lyapunov(_) => lyapunov::natural_chart_pl(p),
        }
    }

    pub fn chart_to_sphere(&self, chart: Chart, x: f64, y: f64) -> SpherePoint {
        match self {
            CompactMode::Poincare => poincare::chart_to_sphere(chart, x, y),
            CompactMode::Lyapunov(w) => lyapunov::chart_to_plsphere(chart, x, y, *w),
        }
    }

    pub fn sphere_to_chart(&self, chart: Chart, p: &SpherePoint) -> (f64, f64) {
        match self {
            CompactMode::Poincare => poincare::sphere_to_chart(chart, p),
            CompactMode::Lyapunov(w) => lyapunov::plsphere_to_chart(chart, p, *w),
        }
    }

    pub fn plane_to_sphere(&self, x: f64, y: f64) -> SpherePoint {
        match self {
            CompactMode::Poincare => poincare::r2_to_sphere(x, y),
            CompactMode::Lyapunov(w) => lyapunov::plane_to_plsphere(x, y, *w),
        }
    }

    /// Finite-plane coordinates of a sphere point; `None` at infinity.
    pub fn sphere_to_plane(&self, p: &SpherePoint) -> Option<(f64, f64)> {
        if self.is_at_infinity(p) {
            return None;
        }
        match self {
            CompactMode::Poincare => Some(poincare::sphere_to_r2(p)),
            CompactMode::Lyapunov(w) => Some(lyapunov::plsphere_to_plane(p, *w)),
        }
    }

    pub fn is_at_infinity(&self, p: &SpherePoint) -> bool {
        match self {
            CompactMode::Poincare => is_at_infinity(p),
            CompactMode::Lyapunov(_) => lyapunov::is_at_infinity_pl(p),
        }
    }

    /// Chart-appropriate coincidence metric (see [`sphere_distance`]).
    pub fn distance(&self, a: &SpherePoint, b: &SpherePoint) -> f64 {
        match self {
            CompactMode::Poincare => sphere_distance(a, b),
            CompactMode::Lyapunov(_) => plsphere_distance(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{natural_chart, plsphere_distance, sphere_distance, Chart, CompactMode};

    #[test]
    fn chart_codes_round_trip() {
        for chart in [Chart::R2, Chart::U1, Chart::V1, Chart::U2, Chart::V2] {
            assert_eq!(Chart::from_code(chart.code()), Some(chart));
        }
        assert_eq!(Chart::from_code(7), None);
    }

    #[test]
    fn natural_chart_picks_finite_plane_away_from_equator() {
        assert_eq!(natural_chart(&[0.1, 0.1, 0.99]), Chart::R2);
    }

    #[test]
    fn natural_chart_picks_dominant_axis_near_equator() {
        assert_eq!(natural_chart(&[0.999, 0.01, 1e-4]), Chart::U1);
        assert_eq!(natural_chart(&[-0.999, 0.01, 1e-4]), Chart::V1);
        assert_eq!(natural_chart(&[0.01, 0.999, 1e-4]), Chart::U2);
        assert_eq!(natural_chart(&[0.01, -0.999, 1e-4]), Chart::V2);
    }

    #[test]
    fn equator_points_use_angular_distance() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        assert!((sphere_distance(&a, &b) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn mixed_finite_infinite_points_never_coincide() {
        let fin = [0.0, 0.0, 1.0];
        let inf = [1.0, 0.0, 0.0];
        assert!(sphere_distance(&fin, &inf).is_infinite());
        assert!(plsphere_distance(&[0.0, 0.5, 0.5], &[1.0, 0.2, 0.0]).is_infinite());
    }

    #[test]
    fn trivial_weights_collapse_to_poincare_mode() {
        assert_eq!(CompactMode::from_weights(1, 1), CompactMode::Poincare);
        assert!(matches!(
            CompactMode::from_weights(2, 3),
            CompactMode::Lyapunov(_)
        ));
    }

    #[test]
    fn mode_round_trips_chart_coordinates() {
        for mode in [CompactMode::Poincare, CompactMode::from_weights(2, 1)] {
            let p = mode.chart_to_sphere(Chart::U1, 0.4, 0.3);
            let (z1, z2) = mode.sphere_to_chart(Chart::U1, &p);
            assert!((z1 - 0.4).abs() < 1e-9);
            assert!((z2 - 0.3).abs() < 1e-9);
        }
    }
}
