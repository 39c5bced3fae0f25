//! Limit-cycle search along a transverse section.
//!
//! The user supplies a section segment; the search samples it, measures the
//! Poincare first-return displacement at each sample, and bisects every
//! sign change of the displacement down to a cycle. Each confirmed cycle is
//! integrated once around and stored. The return integrations can be long,
//! so the scan polls a cancellation callback at a fixed cadence.

use crate::integrator::{IntegrationStatus, OrbitIntegrator, TraceStyle};
use crate::orbits::{OrbitPoint, PointColor, SepType};
use crate::session::{LimitCycle, Study};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Hard cap on integration steps per first-return computation.
const MAX_RETURN_STEPS: usize = 20_000;
const BISECT_MAX_ITERS: usize = 50;
const BISECT_WIDTH_TOL: f64 = 1.0e-10;

/// A transverse section to scan, in plane coordinates, with the spacing of
/// the samples taken along it (also in plane units).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SectionQuery {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub grid_spacing: f64,
}

struct Section {
    a: (f64, f64),
    d: (f64, f64),
    len2: f64,
}

impl Section {
    fn new(q: &SectionQuery) -> Option<Section> {
        let d = (q.x2 - q.x1, q.y2 - q.y1);
        let len2 = d.0 * d.0 + d.1 * d.1;
        if len2 > 0.0 {
            Some(Section {
                a: (q.x1, q.y1),
                d,
                len2,
            })
        } else {
            None
        }
    }

    fn point(&self, t: f64) -> (f64, f64) {
        (self.a.0 + t * self.d.0, self.a.1 + t * self.d.1)
    }

    /// Signed side of the section's supporting line.
    fn side(&self, p: (f64, f64)) -> f64 {
        self.d.0 * (p.1 - self.a.1) - self.d.1 * (p.0 - self.a.0)
    }

    /// Parameter of the orthogonal projection of `p` onto the section.
    fn param(&self, p: (f64, f64)) -> f64 {
        ((p.0 - self.a.0) * self.d.0 + (p.1 - self.a.1) * self.d.1) / self.len2
    }
}

fn cycle_style() -> TraceStyle {
    TraceStyle {
        color: PointColor::LimitCycle,
        sep_type: SepType::Unstable,
    }
}

/// Integrates from section parameter `t` until the trajectory crosses the
/// section segment again, and reports the crossing parameter. `collect`
/// keeps the visited points (used when storing a confirmed cycle). Returns
/// `None` when the trajectory escapes, stalls, or never comes back.
fn first_return(
    study: &Study,
    section: &Section,
    t: f64,
    collect: bool,
) -> Option<(f64, Vec<OrbitPoint>)> {
    let (sx, sy) = section.point(t);
    let start = study.mode.plane_to_sphere(sx, sy);
    let mut walker =
        OrbitIntegrator::new(study, start, study.settings.step_size, 1, cycle_style()).ok()?;

    let mut points = Vec::new();
    let mut prev_plane = (sx, sy);
    // The start sits on the section; the side sign arms on the first point
    // clearly off the line, so leaving does not count as a return.
    let mut prev_side = 0.0;
    for _ in 0..MAX_RETURN_STEPS {
        let step = walker.advance(1);
        let point = *step.first()?;
        if walker.status() != IntegrationStatus::InProgress {
            return None;
        }
        let plane = study.mode.sphere_to_plane(&point.pos)?;
        let side = section.side(plane);
        if prev_side != 0.0 && side * prev_side < 0.0 {
            let u = prev_side / (prev_side - side);
            let hit = (
                prev_plane.0 + u * (plane.0 - prev_plane.0),
                prev_plane.1 + u * (plane.1 - prev_plane.1),
            );
            let tr = section.param(hit);
            if (0.0..=1.0).contains(&tr) {
                if collect {
                    points.push(OrbitPoint {
                        pos: study.mode.plane_to_sphere(hit.0, hit.1),
                        ..point
                    });
                }
                return Some((tr, points));
            }
        }
        if side != 0.0 {
            prev_side = side;
        }
        prev_plane = plane;
        if collect {
            points.push(point);
        }
    }
    None
}

/// Return displacement g(t): how far along the section the first return
/// lands from where it started. A root of g is a cycle candidate.
fn displacement(study: &Study, section: &Section, t: f64) -> Option<f64> {
    first_return(study, section, t, false).map(|(tr, _)| tr - t)
}

impl Study {
    /// Scans a transverse section for limit cycles. Every confirmed cycle
    /// is stored with one full revolution of plot points; the number of
    /// cycles found is returned. `cancel` is polled between grid samples
    /// (at the configured cadence) and aborts the scan when it answers
    /// true, keeping whatever was already found.
    pub fn search_limit_cycles(
        &mut self,
        query: SectionQuery,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<usize> {
        if self.vfs.is_empty() {
            bail!("No vector field is loaded");
        }
        let Some(section) = Section::new(&query) else {
            bail!("The section endpoints coincide");
        };
        if !(query.grid_spacing > 0.0) {
            bail!("Grid spacing must be positive, got {}", query.grid_spacing);
        }
        // Spacing in section-parameter units, stretched slightly so the
        // last sample lands exactly on the far endpoint.
        let samples = (section.len2.sqrt() / query.grid_spacing).ceil() as usize + 1;
        let spacing = 1.0 / (samples - 1) as f64;

        let mut found = Vec::new();
        let mut prev: Option<(f64, f64)> = None;
        for i in 0..samples {
            if i % self.settings.lc_check_cadence == 0 && cancel() {
                break;
            }
            let t = i as f64 * spacing;
            let Some(g) = displacement(self, &section, t) else {
                prev = None;
                continue;
            };
            if let Some((t_prev, g_prev)) = prev {
                if g_prev * g < 0.0 {
                    if let Some(cycle) = self.refine_cycle(&section, t_prev, g_prev, t, spacing) {
                        found.push(cycle);
                    }
                }
            }
            prev = Some((t, g));
        }
        let count = found.len();
        self.limit_cycles.extend(found);
        Ok(count)
    }

    /// Bisects a sign change of the return displacement down to a cycle,
    /// then checks that the displacement actually collapsed there before
    /// storing it.
    fn refine_cycle(
        &self,
        section: &Section,
        mut lo: f64,
        mut g_lo: f64,
        mut hi: f64,
        spacing: f64,
    ) -> Option<LimitCycle> {
        for _ in 0..BISECT_MAX_ITERS {
            if hi - lo < BISECT_WIDTH_TOL {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let g_mid = displacement(self, section, mid)?;
            if g_mid * g_lo <= 0.0 {
                hi = mid;
            } else {
                lo = mid;
                g_lo = g_mid;
            }
        }
        let t = 0.5 * (lo + hi);

        // A genuine cycle pins the return displacement down to the grid
        // resolution; a sign change whose displacement never shrinks is a
        // section-endpoint artifact of a spiraling return, not a cycle.
        let g = displacement(self, section, t)?;
        if g.abs() > spacing {
            return None;
        }

        let (_, points) = first_return(self, section, t, true)?;
        Some(LimitCycle {
            points,
            section_t: t,
        })
    }
}
