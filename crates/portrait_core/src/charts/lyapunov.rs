//! Chart maps for the Poincare-Lyapunov sphere with weights (p, q).
//!
//! The weighted compactification writes points near infinity as
//! `x = cos(theta) / s^p`, `y = sin(theta) / s^q` with `s -> 0` at infinity.
//! A compactified point is the triple `(d, a, b)` described in
//! `charts::SpherePoint`: the finite unit disk keeps its plane coordinates
//! (`d = 0`), everything outside is annulus coordinates `(s, theta)`
//! (`d = 1`). Recovering `s` from plane coordinates needs a 1-D root solve;
//! `x^2 s^(2p) + y^2 s^(2q)` is strictly increasing in `s`, so a safeguarded
//! Newton iteration with a bisection fallback always lands on the root.

use super::{Chart, SpherePoint};

/// Compactification weights. `p = q = 1` degenerates to the plain Poincare
/// sphere and callers are expected to dispatch to `charts::poincare` then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlWeights {
    pub p: i32,
    pub q: i32,
}

impl PlWeights {
    pub fn new(p: i32, q: i32) -> Self {
        Self { p, q }
    }

    pub fn is_trivial(self) -> bool {
        self.p == 1 && self.q == 1
    }

    fn pf(self) -> f64 {
        f64::from(self.p)
    }

    fn qf(self) -> f64 {
        f64::from(self.q)
    }
}

impl Default for PlWeights {
    fn default() -> Self {
        Self { p: 1, q: 1 }
    }
}

const ROOT_MAX_ITERS: usize = 60;
const ROOT_RESIDUAL_TOL: f64 = 1.0e-14;

/// Root of `a * s^(2p) + b * s^(2q) = 1` on `(0, 1]`, for `a + b >= 1`
/// (the function is monotone and crosses 1 inside the interval).
fn solve_radius(a: f64, b: f64, w: PlWeights) -> f64 {
    let tp = 2 * w.p;
    let tq = 2 * w.q;
    let f = |s: f64| a * s.powi(tp) + b * s.powi(tq) - 1.0;
    let df = |s: f64| {
        f64::from(tp) * a * s.powi(tp - 1) + f64::from(tq) * b * s.powi(tq - 1)
    };

    let mut lo = 0.0;
    let mut hi = 1.0;
    let mut s = 0.5;
    for _ in 0..ROOT_MAX_ITERS {
        let value = f(s);
        if value.abs() <= ROOT_RESIDUAL_TOL {
            return s;
        }
        if value > 0.0 {
            hi = s;
        } else {
            lo = s;
        }
        let slope = df(s);
        let newton = if slope > 0.0 { s - value / slope } else { -1.0 };
        s = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    s
}

pub fn plane_to_plsphere(x: f64, y: f64, w: PlWeights) -> SpherePoint {
    if x * x + y * y <= 1.0 {
        return [0.0, x, y];
    }
    let s = solve_radius(x * x, y * y, w);
    let theta = (y * s.powi(w.q)).atan2(x * s.powi(w.p));
    [1.0, s, theta]
}

pub fn plsphere_to_plane(p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    if p[0] == 0.0 {
        (p[1], p[2])
    } else {
        annulus_to_plane(p[1], p[2], w)
    }
}

pub fn annulus_to_plane(s: f64, theta: f64, w: PlWeights) -> (f64, f64) {
    (theta.cos() / s.powi(w.p), theta.sin() / s.powi(w.q))
}

/// Shared by the four directional charts: `z2` is the chart parameter along
/// the compactified axis, `z1` the transverse one. `axis_cos`/`axis_sin`
/// orient the chart (U1: +x, V1: -x, U2: +y, V2: -y).
fn directional_to_plsphere(z1: f64, z2: f64, w: PlWeights, chart: Chart) -> SpherePoint {
    // Solve in the scale-free variable v = s / z2 so the map stays exact as
    // z2 -> 0 (the plane coordinates overflow there, v does not).
    let (wp, wq, z1_sq) = match chart {
        Chart::U1 | Chart::V1 => (w.p, w.q, z1 * z1),
        Chart::U2 | Chart::V2 => (w.q, w.p, z1 * z1),
        Chart::R2 => unreachable!("finite chart handled by the caller"),
    };
    let v = solve_radius(1.0, z1_sq, PlWeights { p: wp, q: wq });
    let s = v * z2;
    if s < 1.0 {
        let (co, si) = match chart {
            Chart::U1 => (v.powi(wp), z1 * v.powi(wq)),
            Chart::V1 => (-v.powi(wp), z1 * v.powi(wq)),
            Chart::U2 => (z1 * v.powi(wq), v.powi(wp)),
            Chart::V2 => (z1 * v.powi(wq), -v.powi(wp)),
            Chart::R2 => unreachable!(),
        };
        [1.0, s, si.atan2(co)]
    } else {
        let (x, y) = match chart {
            Chart::U1 => (z2.powi(-w.p), z1 * z2.powi(-w.q)),
            Chart::V1 => (-z2.powi(-w.p), z1 * z2.powi(-w.q)),
            Chart::U2 => (z1 * z2.powi(-w.p), z2.powi(-w.q)),
            Chart::V2 => (z1 * z2.powi(-w.p), -z2.powi(-w.q)),
            Chart::R2 => unreachable!(),
        };
        [0.0, x, y]
    }
}

pub fn u1_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    directional_to_plsphere(z1, z2, w, Chart::U1)
}

pub fn v1_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    directional_to_plsphere(z1, z2, w, Chart::V1)
}

pub fn u2_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    directional_to_plsphere(z1, z2, w, Chart::U2)
}

pub fn v2_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    directional_to_plsphere(z1, z2, w, Chart::V2)
}

pub fn plsphere_to_u1(p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    if p[0] == 0.0 {
        let (x, y) = (p[1], p[2]);
        (y * x.powf(-w.qf() / w.pf()), x.powf(-1.0 / w.pf()))
    } else {
        let (s, theta) = (p[1], p[2]);
        let co = theta.cos();
        (
            theta.sin() * co.powf(-w.qf() / w.pf()),
            s * co.powf(-1.0 / w.pf()),
        )
    }
}

pub fn plsphere_to_v1(p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    if p[0] == 0.0 {
        let (x, y) = (p[1], p[2]);
        (y * (-x).powf(-w.qf() / w.pf()), (-x).powf(-1.0 / w.pf()))
    } else {
        let (s, theta) = (p[1], p[2]);
        let co = -theta.cos();
        (
            theta.sin() * co.powf(-w.qf() / w.pf()),
            s * co.powf(-1.0 / w.pf()),
        )
    }
}

pub fn plsphere_to_u2(p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    if p[0] == 0.0 {
        let (x, y) = (p[1], p[2]);
        (x * y.powf(-w.pf() / w.qf()), y.powf(-1.0 / w.qf()))
    } else {
        let (s, theta) = (p[1], p[2]);
        let si = theta.sin();
        (
            theta.cos() * si.powf(-w.pf() / w.qf()),
            s * si.powf(-1.0 / w.qf()),
        )
    }
}

pub fn plsphere_to_v2(p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    if p[0] == 0.0 {
        let (x, y) = (p[1], p[2]);
        (x * (-y).powf(-w.pf() / w.qf()), (-y).powf(-1.0 / w.qf()))
    } else {
        let (s, theta) = (p[1], p[2]);
        let si = -theta.sin();
        (
            theta.cos() * si.powf(-w.pf() / w.qf()),
            s * si.powf(-1.0 / w.qf()),
        )
    }
}

// Mirror charts, reflected z2 exactly as in the Poincare case.

pub fn vv1_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    u1_to_plsphere(z1, -z2, w)
}

pub fn uu1_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    v1_to_plsphere(z1, -z2, w)
}

pub fn vv2_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    u2_to_plsphere(z1, -z2, w)
}

pub fn uu2_to_plsphere(z1: f64, z2: f64, w: PlWeights) -> SpherePoint {
    v2_to_plsphere(z1, -z2, w)
}

/// Chart-by-chart embedding, the weighted analogue of
/// `poincare::chart_to_sphere`.
pub fn chart_to_plsphere(chart: Chart, x: f64, y: f64, w: PlWeights) -> SpherePoint {
    match chart {
        Chart::R2 => plane_to_plsphere(x, y, w),
        Chart::U1 => u1_to_plsphere(x, y, w),
        Chart::V1 => v1_to_plsphere(x, y, w),
        Chart::U2 => u2_to_plsphere(x, y, w),
        Chart::V2 => v2_to_plsphere(x, y, w),
    }
}

pub fn plsphere_to_chart(chart: Chart, p: &SpherePoint, w: PlWeights) -> (f64, f64) {
    match chart {
        Chart::R2 => plsphere_to_plane(p, w),
        Chart::U1 => plsphere_to_u1(p, w),
        Chart::V1 => plsphere_to_v1(p, w),
        Chart::U2 => plsphere_to_u2(p, w),
        Chart::V2 => plsphere_to_v2(p, w),
    }
}

/// The chart a Poincare-Lyapunov point naturally falls in.
pub fn natural_chart_pl(p: &SpherePoint) -> Chart {
    if p[0] == 0.0 {
        return Chart::R2;
    }
    let theta = p[2];
    let (co, si) = (theta.cos(), theta.sin());
    if co.abs() >= si.abs() {
        if co >= 0.0 {
            Chart::U1
        } else {
            Chart::V1
        }
    } else if si >= 0.0 {
        Chart::U2
    } else {
        Chart::V2
    }
}

/// True if a Poincare-Lyapunov point lies on the circle at infinity.
pub fn is_at_infinity_pl(p: &SpherePoint) -> bool {
    p[0] != 0.0 && p[1].abs() < super::EQUATOR_EPS
}
