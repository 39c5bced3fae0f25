//! Session state: the loaded study (one or more vector fields plus the
//! separating curves of a piecewise configuration), the user-tunable
//! integration parameters, and the plot objects accumulated so far.

use crate::charts::CompactMode;
use crate::orbits::{Orbit, OrbitPoint, PointColor, SepType};
use crate::study::{ChartCurve, VectorFieldStudy};
use serde::{Deserialize, Serialize};

/// Tunable integration parameters. These are read by every solver run; the
/// defaults mirror the values a fresh session starts with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Initial step size handed to the adaptive stepper.
    pub step_size: f64,
    /// Smallest step the adaptive controller may take before a step is
    /// accepted regardless of its error estimate.
    pub h_min: f64,
    /// Largest step the controller may grow to.
    pub h_max: f64,
    /// Smaller floor used while hunting for a separating-curve crossing.
    pub branch_h_min: f64,
    /// Per-step local error tolerance.
    pub tolerance: f64,
    /// Number of points produced by one "integrate" command.
    pub int_points: usize,
    /// How many limit-cycle grid samples are processed between cancellation
    /// checks.
    pub lc_check_cadence: usize,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        IntegrationSettings {
            step_size: 0.01,
            h_min: 1e-6,
            h_max: 0.1,
            branch_h_min: 1e-8,
            tolerance: 1e-8,
            int_points: 200,
            lc_check_cadence: 4,
        }
    }
}

/// Display options that affect how plot points are produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlotSettings {
    /// Draw orbit segments dashed where the GCF is negative.
    pub dashes: bool,
    /// Include singularities that lie outside their own field's region.
    pub show_virtual: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        PlotSettings {
            dashes: true,
            show_virtual: false,
        }
    }
}

/// One separating curve of a piecewise configuration, with the points
/// sampled for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeparatingCurve {
    pub curve: ChartCurve,
    pub points: Vec<OrbitPoint>,
}

/// One region of a piecewise configuration: the index of the vector field
/// active there, and the sign of every separating curve inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfRegion {
    pub vf_index: usize,
    pub signs: Vec<i32>,
}

/// Which object subsequent trace commands act on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Selection {
    pub vf: usize,
    pub singularity: Option<usize>,
    pub separatrix: usize,
}

/// A stored limit cycle: the orbit traced once around plus the section
/// crossing it was found at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCycle {
    pub points: Vec<OrbitPoint>,
    /// Position along the transverse section, as a fraction of its length.
    pub section_t: f64,
}

/// Everything loaded and computed for one problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub mode: CompactMode,
    pub vfs: Vec<VectorFieldStudy>,
    pub curves: Vec<SeparatingCurve>,
    pub vf_regions: Vec<VfRegion>,
    pub settings: IntegrationSettings,
    pub plot: PlotSettings,
    pub orbits: Vec<Orbit>,
    pub limit_cycles: Vec<LimitCycle>,
    pub selection: Selection,
}

impl Study {
    pub fn is_piecewise(&self) -> bool {
        !self.curves.is_empty()
    }

    pub fn selected_vf(&self) -> Option<&VectorFieldStudy> {
        self.vfs.get(self.selection.vf)
    }

    /// Drops every plotted object but keeps the loaded study data, so the
    /// user can restart from a clean plot without reloading.
    pub fn clear_plot(&mut self) {
        self.orbits.clear();
        self.limit_cycles.clear();
        for curve in &mut self.curves {
            curve.points.clear();
        }
        for vf in &mut self.vfs {
            vf.clear_plot_points();
        }
    }

    /// Samples plot points for every separating curve and isocline over a
    /// rectangular plane window, replacing previous samples.
    pub fn sample_curve_points(&mut self, x_range: (f64, f64), y_range: (f64, f64), n: usize) {
        let mode = self.mode;
        let as_points = |positions: Vec<crate::charts::SpherePoint>, color: PointColor| {
            positions
                .into_iter()
                .map(|pos| OrbitPoint {
                    pos,
                    color,
                    dashed: false,
                    direction: 1,
                    sep_type: SepType::Unstable,
                })
                .collect::<Vec<_>>()
        };
        for curve in &mut self.curves {
            let hits = curve.curve.zero_crossings(mode, x_range, y_range, n);
            curve.points = as_points(hits, PointColor::Background);
        }
        for vf in &mut self.vfs {
            for iso in &mut vf.isoclines {
                let hits = iso.curve.zero_crossings(mode, x_range, y_range, n);
                iso.points = as_points(hits, PointColor::Orbit);
            }
        }
    }

    /// Select the next singularity (cyclically) of the current field that
    /// can actually be traced; returns false when the field has none.
    pub fn select_next_traceable(&mut self) -> bool {
        let Some(vf) = self.vfs.get(self.selection.vf) else {
            return false;
        };
        let n = vf.singularities.len();
        if n == 0 {
            return false;
        }
        let start = self.selection.singularity.map_or(0, |i| (i + 1) % n);
        for off in 0..n {
            let i = (start + off) % n;
            if vf.singularities[i].is_traceable() {
                self.selection.singularity = Some(i);
                self.selection.separatrix = 0;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{IntegrationSettings, Study};
    use crate::charts::Chart;
    use crate::orbits::{Orbit, SepType};
    use crate::poly::Poly1;
    use crate::singularity::{
        Node, Position, Saddle, SemiElementary, Separatrix, Singularity, SingularityBase,
    };
    use crate::study::VectorFieldStudy;

    fn base() -> SingularityBase {
        SingularityBase {
            x0: 0.0,
            y0: 0.0,
            chart: Chart::R2,
            position: Position::Unmarked,
        }
    }

    #[test]
    fn settings_defaults_match_a_fresh_session() {
        let s = IntegrationSettings::default();
        assert_eq!(s.step_size, 0.01);
        assert_eq!(s.h_min, 1e-6);
        assert_eq!(s.tolerance, 1e-8);
        assert_eq!(s.int_points, 200);
    }

    #[test]
    fn clear_plot_keeps_loaded_data() {
        let mut study = Study::default();
        study.vfs.push(VectorFieldStudy::default());
        study.orbits.push(Orbit::new([0.0, 0.0, 1.0], 0.01, 1));
        study.clear_plot();
        assert!(study.orbits.is_empty());
        assert_eq!(study.vfs.len(), 1);
    }

    #[test]
    fn curve_sampling_fills_separating_curve_points() {
        use crate::orbits::PointColor;
        use crate::poly::{Poly2, Term2};
        use crate::session::SeparatingCurve;
        use crate::study::ChartCurve;

        let mut study = Study::default();
        study.curves.push(SeparatingCurve {
            curve: ChartCurve {
                r2: Poly2::new(vec![Term2 {
                    degx: 1,
                    degy: 0,
                    coeff: 1.0,
                }]),
                u1: Poly2::constant(1.0),
                v1: Poly2::constant(-1.0),
                ..Default::default()
            },
            points: Vec::new(),
        });
        study.sample_curve_points((-1.0, 1.0), (-1.0, 1.0), 9);
        let points = &study.curves[0].points;
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.color == PointColor::Background));
    }

    #[test]
    fn selection_skips_untraceable_singularities() {
        let mut study = Study::default();
        let mut vf = VectorFieldStudy::default();
        vf.singularities.push(Singularity::Node(Node {
            base: base(),
            stability: 1,
        }));
        vf.singularities.push(Singularity::Saddle(Saddle {
            base: base(),
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: -1.0,
            vector_field: Default::default(),
            separatrices: vec![Separatrix::new(SepType::Unstable, 1, false, Poly1::default())],
            epsilon: 0.01,
        }));
        study.vfs.push(vf);
        assert!(study.select_next_traceable());
        assert_eq!(study.selection.singularity, Some(1));
        // A second call wraps around and lands on the same saddle.
        assert!(study.select_next_traceable());
        assert_eq!(study.selection.singularity, Some(1));
    }

    #[test]
    fn semi_elementary_with_separatrices_is_traceable() {
        let se = Singularity::SemiElementary(SemiElementary {
            base: base(),
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            vector_field: Default::default(),
            separatrices: vec![Separatrix::new(SepType::Stable, 1, false, Poly1::default())],
            setype: 1,
            epsilon: 0.01,
        });
        assert!(se.is_traceable());
    }
}
