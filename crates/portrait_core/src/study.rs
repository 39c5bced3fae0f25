//! Per-field model: one polynomial vector field in all of its charts, its
//! GCF curve, its isoclines, and its classified singularities.

use crate::charts::{Chart, CompactMode, SpherePoint};
use crate::orbits::OrbitPoint;
use crate::poly::{Poly2, Poly3};
use crate::singularity::Singularity;
use serde::{Deserialize, Serialize};

/// A scalar curve given per chart: five bivariate polynomials plus the
/// cylinder polynomial used on the Poincare-Lyapunov annulus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartCurve {
    pub r2: Poly2,
    pub u1: Poly2,
    pub v1: Poly2,
    pub u2: Poly2,
    pub v2: Poly2,
    pub cylinder: Poly3,
}

impl ChartCurve {
    pub fn chart_poly(&self, chart: Chart) -> &Poly2 {
        match chart {
            Chart::R2 => &self.r2,
            Chart::U1 => &self.u1,
            Chart::V1 => &self.v1,
            Chart::U2 => &self.u2,
            Chart::V2 => &self.v2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.r2.is_empty()
            && self.u1.is_empty()
            && self.v1.is_empty()
            && self.u2.is_empty()
            && self.v2.is_empty()
            && self.cylinder.is_empty()
    }

    /// Samples the zero set of the curve over a rectangular plane window on
    /// an `n x n` grid: sign changes along grid rows and columns are
    /// interpolated to root estimates. The resulting points are unordered.
    pub fn zero_crossings(
        &self,
        mode: CompactMode,
        x_range: (f64, f64),
        y_range: (f64, f64),
        n: usize,
    ) -> Vec<SpherePoint> {
        if n < 2 {
            return Vec::new();
        }
        let value = |x: f64, y: f64| self.eval_at(mode, &mode.plane_to_sphere(x, y));
        let coord = |range: (f64, f64), i: usize| {
            range.0 + (range.1 - range.0) * (i as f64) / ((n - 1) as f64)
        };
        let mut out = Vec::new();
        // The row pass visits every grid node, so it also owns the samples
        // that are roots exactly; the column pass only interpolates strict
        // sign changes and cannot duplicate them.
        for j in 0..n {
            let y = coord(y_range, j);
            let mut prev = value(coord(x_range, 0), y);
            if prev == 0.0 {
                out.push(mode.plane_to_sphere(coord(x_range, 0), y));
            }
            for i in 1..n {
                let x = coord(x_range, i);
                let cur = value(x, y);
                if cur == 0.0 {
                    out.push(mode.plane_to_sphere(x, y));
                } else if prev * cur < 0.0 {
                    let x_prev = coord(x_range, i - 1);
                    let root = x_prev + (x - x_prev) * prev / (prev - cur);
                    out.push(mode.plane_to_sphere(root, y));
                }
                prev = cur;
            }
        }
        for i in 0..n {
            let x = coord(x_range, i);
            let mut prev = value(x, coord(y_range, 0));
            for j in 1..n {
                let y = coord(y_range, j);
                let cur = value(x, y);
                if prev * cur < 0.0 {
                    let y_prev = coord(y_range, j - 1);
                    let root = y_prev + (y - y_prev) * prev / (prev - cur);
                    out.push(mode.plane_to_sphere(x, root));
                }
                prev = cur;
            }
        }
        out
    }

    /// Evaluates the curve at a compactified point, in whichever chart the
    /// point naturally lies. On the weighted annulus this is the cylinder
    /// polynomial in `(s, cos theta, sin theta)`.
    pub fn eval_at(&self, mode: CompactMode, p: &SpherePoint) -> f64 {
        match mode {
            CompactMode::Poincare => {
                let chart = mode.natural_chart(p);
                let (x, y) = mode.sphere_to_chart(chart, p);
                self.chart_poly(chart).eval(x, y)
            }
            CompactMode::Lyapunov(_) => {
                if p[0] == 0.0 {
                    self.r2.eval(p[1], p[2])
                } else {
                    self.cylinder.eval(p[1], p[2].cos(), p[2].sin())
                }
            }
        }
    }
}

/// The two components of a vector field, per chart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartVectorField {
    pub r2: (Poly2, Poly2),
    pub u1: (Poly2, Poly2),
    pub v1: (Poly2, Poly2),
    pub u2: (Poly2, Poly2),
    pub v2: (Poly2, Poly2),
    /// `(ds/dt, dtheta/dt)` on the weighted annulus.
    pub cylinder: (Poly3, Poly3),
}

impl ChartVectorField {
    pub fn chart_components(&self, chart: Chart) -> &(Poly2, Poly2) {
        match chart {
            Chart::R2 => &self.r2,
            Chart::U1 => &self.u1,
            Chart::V1 => &self.v1,
            Chart::U2 => &self.u2,
            Chart::V2 => &self.v2,
        }
    }

    pub fn eval_chart(&self, chart: Chart, x: f64, y: f64) -> (f64, f64) {
        let (f, g) = self.chart_components(chart);
        (f.eval(x, y), g.eval(x, y))
    }

    pub fn eval_cylinder(&self, s: f64, theta: f64) -> (f64, f64) {
        let (co, si) = (theta.cos(), theta.sin());
        (
            self.cylinder.0.eval(s, co, si),
            self.cylinder.1.eval(s, co, si),
        )
    }
}

/// One isocline curve attached to a vector field, with its accumulated plot
/// points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Isocline {
    pub curve: ChartCurve,
    pub points: Vec<OrbitPoint>,
}

/// The study of a single polynomial vector field, populated from the
/// precomputed result tables and reset wholesale on reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFieldStudy {
    pub vector_field: ChartVectorField,
    /// Curve of non-isolated singularities; empty when the field has none.
    pub gcf: ChartCurve,
    pub isoclines: Vec<Isocline>,
    pub singularities: Vec<Singularity>,
    /// Whether the line at infinity is itself a trajectory of singular
    /// points for this field.
    pub singinf: bool,
    /// Global orientation flag (+1/-1) consulted together with `singinf`
    /// when crossing to the mirrored hemisphere.
    pub dir_vec_field: i32,
}

impl VectorFieldStudy {
    /// Sign of the GCF at a compactified point: +1 where the field is
    /// "real", -1 in the shaded region. Fields without a GCF are positive
    /// everywhere.
    pub fn gcf_sign_at(&self, mode: CompactMode, p: &SpherePoint) -> i32 {
        if self.gcf.is_empty() {
            return 1;
        }
        if self.gcf.eval_at(mode, p) >= 0.0 {
            1
        } else {
            -1
        }
    }

    /// Attaches an isocline curve; its points are sampled by the caller.
    pub fn add_isocline(&mut self, curve: ChartCurve) {
        self.isoclines.push(Isocline {
            curve,
            points: Vec::new(),
        });
    }

    /// Clears every accumulated plot-point sequence (separatrices, blow-up
    /// arcs, isoclines) without touching the loaded data.
    pub fn clear_plot_points(&mut self) {
        for iso in &mut self.isoclines {
            iso.points.clear();
        }
        for sing in &mut self.singularities {
            match sing {
                Singularity::Saddle(s) => {
                    for sep in &mut s.separatrices {
                        sep.points.clear();
                    }
                }
                Singularity::SemiElementary(s) => {
                    for sep in &mut s.separatrices {
                        sep.points.clear();
                    }
                }
                Singularity::Degenerate(s) => {
                    for b in &mut s.blow_up {
                        b.points.clear();
                        b.left_disk = false;
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartCurve, ChartVectorField, VectorFieldStudy};
    use crate::charts::{Chart, CompactMode};
    use crate::poly::{Poly2, Poly3, Term2, Term3};

    fn x_poly() -> Poly2 {
        Poly2::new(vec![Term2 {
            degx: 1,
            degy: 0,
            coeff: 1.0,
        }])
    }

    #[test]
    fn chart_curve_evaluates_in_the_natural_chart() {
        let curve = ChartCurve {
            r2: x_poly(),
            ..Default::default()
        };
        let mode = CompactMode::Poincare;
        let p = mode.plane_to_sphere(2.0, -1.0);
        assert!((curve.eval_at(mode, &p) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn chart_curve_uses_the_cylinder_poly_on_the_annulus() {
        let curve = ChartCurve {
            cylinder: Poly3::new(vec![Term3 {
                degr: 1,
                degc: 0,
                degs: 0,
                coeff: 2.0,
            }]),
            ..Default::default()
        };
        let mode = CompactMode::from_weights(2, 1);
        let p = [1.0, 0.25, 0.0];
        assert!((curve.eval_at(mode, &p) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_crossings_trace_the_curve() {
        let curve = ChartCurve {
            r2: x_poly(),
            u1: Poly2::constant(1.0),
            v1: Poly2::constant(-1.0),
            ..Default::default()
        };
        let mode = CompactMode::Poincare;
        let crossings = curve.zero_crossings(mode, (-1.0, 1.0), (-1.0, 1.0), 9);
        assert!(!crossings.is_empty());
        for p in &crossings {
            let (x, _) = mode.sphere_to_plane(p).expect("crossing should be finite");
            assert!(x.abs() < 1e-9, "crossing strayed to x = {x}");
        }
    }

    #[test]
    fn gcf_sign_defaults_to_positive_without_a_gcf() {
        let study = VectorFieldStudy::default();
        let p = CompactMode::Poincare.plane_to_sphere(1.0, 1.0);
        assert_eq!(study.gcf_sign_at(CompactMode::Poincare, &p), 1);
    }

    #[test]
    fn gcf_sign_tracks_the_curve_sign() {
        let study = VectorFieldStudy {
            gcf: ChartCurve {
                r2: x_poly(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mode = CompactMode::Poincare;
        assert_eq!(study.gcf_sign_at(mode, &mode.plane_to_sphere(1.0, 0.0)), 1);
        assert_eq!(
            study.gcf_sign_at(mode, &mode.plane_to_sphere(-1.0, 0.0)),
            -1
        );
    }

    #[test]
    fn vector_field_components_dispatch_by_chart() {
        let vf = ChartVectorField {
            u1: (x_poly(), Poly2::constant(3.0)),
            ..Default::default()
        };
        assert_eq!(vf.eval_chart(Chart::U1, 2.0, 0.0), (2.0, 3.0));
        assert_eq!(vf.eval_chart(Chart::R2, 2.0, 0.0), (0.0, 0.0));
    }
}
