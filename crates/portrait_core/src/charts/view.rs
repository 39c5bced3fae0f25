//! View-coordinate dispatch.
//!
//! The front-end fixes a view (sphere disk, finite plane, or one of the four
//! charts at infinity) and a compactification mode once; everything after
//! that goes through a [`ViewMap`] selected by [`select_view`]. This replaces
//! the function-pointer tables of older phase-portrait programs with a trait
//! object chosen at setup time.

use super::lyapunov::{self, PlWeights};
use super::{poincare, Chart, SpherePoint};
use serde::{Deserialize, Serialize};

/// The view whose 2-D coordinates the drawing layer works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewType {
    /// Projection of the whole sphere onto the unit disk.
    Sphere,
    /// The finite plane, untransformed.
    Plane,
    U1,
    U2,
    V1,
    V2,
}

/// Bidirectional map between view coordinates and compactified sphere
/// coordinates, plus the visibility test for the view's domain.
pub trait ViewMap {
    /// True if the view coordinate lies in the view's visible domain.
    fn is_valid_viewcoord(&self, u: f64, v: f64) -> bool;

    /// Lifts a view coordinate onto the sphere; `None` outside the domain.
    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint>;

    /// Projects a sphere point into view coordinates.
    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64);

    /// Convenience: embeds a finite-plane point and projects it into the
    /// view.
    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64);

    /// Convenience: lifts a view coordinate and projects it onto the finite
    /// plane. `None` outside the view domain or at infinity.
    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)>;
}

/// Selects the transform set for a (view, compactification-mode) pair.
/// Trivial weights (p = q = 1) get the plain Poincare maps.
pub fn select_view(view: ViewType, w: PlWeights) -> Box<dyn ViewMap> {
    if w.is_trivial() {
        match view {
            ViewType::Sphere => Box::new(PoincareSphereView),
            ViewType::Plane => Box::new(PoincarePlaneView),
            ViewType::U1 => Box::new(PoincareChartView { chart: Chart::U1 }),
            ViewType::U2 => Box::new(PoincareChartView { chart: Chart::U2 }),
            ViewType::V1 => Box::new(PoincareChartView { chart: Chart::V1 }),
            ViewType::V2 => Box::new(PoincareChartView { chart: Chart::V2 }),
        }
    } else {
        match view {
            ViewType::Sphere => Box::new(LyapunovSphereView { w }),
            ViewType::Plane => Box::new(LyapunovPlaneView { w }),
            ViewType::U1 => Box::new(LyapunovChartView { chart: Chart::U1, w }),
            ViewType::U2 => Box::new(LyapunovChartView { chart: Chart::U2, w }),
            ViewType::V1 => Box::new(LyapunovChartView { chart: Chart::V1, w }),
            ViewType::V2 => Box::new(LyapunovChartView { chart: Chart::V2, w }),
        }
    }
}

struct PoincareSphereView;

impl ViewMap for PoincareSphereView {
    fn is_valid_viewcoord(&self, u: f64, v: f64) -> bool {
        u * u + v * v <= 1.0
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        let rest = 1.0 - u * u - v * v;
        if rest < 0.0 {
            return None;
        }
        Some([u, v, rest.sqrt()])
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        (p[0], p[1])
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        self.sphere_to_view(&poincare::r2_to_sphere(x, y))
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        let p = self.view_to_sphere(u, v)?;
        if super::is_at_infinity(&p) {
            return None;
        }
        Some(poincare::sphere_to_r2(&p))
    }
}

struct PoincarePlaneView;

impl ViewMap for PoincarePlaneView {
    fn is_valid_viewcoord(&self, _u: f64, _v: f64) -> bool {
        true
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        Some(poincare::r2_to_sphere(u, v))
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        poincare::sphere_to_r2(p)
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        Some((u, v))
    }
}

struct PoincareChartView {
    chart: Chart,
}

impl ViewMap for PoincareChartView {
    fn is_valid_viewcoord(&self, _u: f64, v: f64) -> bool {
        // Each chart view shows its primary side of the seam; the test is
        // inclusive so the equator itself is visible.
        match self.chart {
            Chart::U1 | Chart::U2 => v >= 0.0,
            Chart::V1 | Chart::V2 => v <= 0.0,
            Chart::R2 => true,
        }
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        if !self.is_valid_viewcoord(u, v) {
            return None;
        }
        Some(poincare::chart_to_sphere(self.chart, u, v))
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        poincare::sphere_to_chart(self.chart, p)
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        self.sphere_to_view(&poincare::r2_to_sphere(x, y))
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        let p = self.view_to_sphere(u, v)?;
        if super::is_at_infinity(&p) {
            return None;
        }
        Some(poincare::sphere_to_r2(&p))
    }
}

/// Radius at which the finite unit disk ends in the annulus view; the band
/// out to radius 1 shows the annulus down to s = 0 (infinity).
const FINITE_RING_RADIUS: f64 = 0.75;

struct LyapunovSphereView {
    w: PlWeights,
}

impl ViewMap for LyapunovSphereView {
    fn is_valid_viewcoord(&self, u: f64, v: f64) -> bool {
        u * u + v * v <= 1.0
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        let rho = (u * u + v * v).sqrt();
        if rho > 1.0 {
            return None;
        }
        if rho <= FINITE_RING_RADIUS {
            Some([0.0, u / FINITE_RING_RADIUS, v / FINITE_RING_RADIUS])
        } else {
            let s = (1.0 - rho) / (1.0 - FINITE_RING_RADIUS);
            Some([1.0, s, v.atan2(u)])
        }
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        if p[0] == 0.0 {
            (p[1] * FINITE_RING_RADIUS, p[2] * FINITE_RING_RADIUS)
        } else {
            let rho = 1.0 - p[1] * (1.0 - FINITE_RING_RADIUS);
            (rho * p[2].cos(), rho * p[2].sin())
        }
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        self.sphere_to_view(&lyapunov::plane_to_plsphere(x, y, self.w))
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        let p = self.view_to_sphere(u, v)?;
        if lyapunov::is_at_infinity_pl(&p) {
            return None;
        }
        Some(lyapunov::plsphere_to_plane(&p, self.w))
    }
}

struct LyapunovPlaneView {
    w: PlWeights,
}

impl ViewMap for LyapunovPlaneView {
    fn is_valid_viewcoord(&self, _u: f64, _v: f64) -> bool {
        true
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        Some(lyapunov::plane_to_plsphere(u, v, self.w))
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        lyapunov::plsphere_to_plane(p, self.w)
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        Some((u, v))
    }
}

struct LyapunovChartView {
    chart: Chart,
    w: PlWeights,
}

impl ViewMap for LyapunovChartView {
    fn is_valid_viewcoord(&self, _u: f64, v: f64) -> bool {
        // Weighted charts parameterize their sector with z2 >= 0.
        v >= 0.0
    }

    fn view_to_sphere(&self, u: f64, v: f64) -> Option<SpherePoint> {
        if !self.is_valid_viewcoord(u, v) {
            return None;
        }
        Some(lyapunov::chart_to_plsphere(self.chart, u, v, self.w))
    }

    fn sphere_to_view(&self, p: &SpherePoint) -> (f64, f64) {
        lyapunov::plsphere_to_chart(self.chart, p, self.w)
    }

    fn plane_to_view(&self, x: f64, y: f64) -> (f64, f64) {
        self.sphere_to_view(&lyapunov::plane_to_plsphere(x, y, self.w))
    }

    fn view_to_plane(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        let p = self.view_to_sphere(u, v)?;
        if lyapunov::is_at_infinity_pl(&p) {
            return None;
        }
        Some(lyapunov::plsphere_to_plane(&p, self.w))
    }
}
