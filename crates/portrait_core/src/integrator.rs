//! Resumable orbit integration on the compactified sphere.
//!
//! The integrator walks one trajectory, choosing the best chart for each
//! step, handing the chart-local polynomial field to the RKF78 stepper, and
//! handling the two global events: crossing the equator (the line at
//! infinity) and crossing a separating curve of a piecewise configuration.

use crate::charts::{lyapunov, Chart, CompactMode, SpherePoint, EQUATOR_EPS};
use crate::orbits::{Orbit, OrbitPoint, PointColor, SepType};
use crate::regions::vf_index_at;
use crate::session::Study;
use crate::solvers::{adaptive_step, Rkf78};
use anyhow::{anyhow, bail, Result};
use std::f64::consts::PI;

/// Why an integration run came to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    /// The run produced its requested points and can be resumed.
    InProgress,
    /// The trajectory hit the equator while it is a line of singularities.
    EquatorReached,
    /// The trajectory entered a point the region table does not cover.
    Unclassified,
    /// The field evaluates to (numerically) zero here; there is nothing
    /// more to draw. Recoverable for the caller, never an error.
    FieldVanished,
}

/// Below this field magnitude the walk is considered stationary.
pub(crate) const MIN_FIELD_NORM: f64 = 1.0e-12;

/// Outcome of crossing the equator: the continuation point and whether the
/// time direction (and with it the stability labels) reverses.
///
/// The casing is the even-degree rule: when the compactified field reverses
/// orientation on the far hemisphere (`dir_vec_field == -1`), following the
/// same trajectory across infinity means integrating the antipodal copy
/// backwards. A singular equator is never crossed at all.
#[derive(Debug, Clone, Copy)]
pub struct EquatorCrossing {
    pub pos: SpherePoint,
    pub flip_time: bool,
    pub stop: bool,
}

pub fn flip_across_equator(
    mode: CompactMode,
    p: &SpherePoint,
    singinf: bool,
    dir_vec_field: i32,
) -> EquatorCrossing {
    let pos = match mode {
        CompactMode::Poincare => [-p[0], -p[1], -p[2]],
        CompactMode::Lyapunov(_) => {
            // Keep theta in (-pi, pi] so annulus distances stay within one
            // wrap of each other no matter how many crossings accumulate.
            let theta = (p[2] + 2.0 * PI).rem_euclid(2.0 * PI) - PI;
            [1.0, -p[1], theta]
        }
    };
    EquatorCrossing {
        pos,
        flip_time: !singinf && dir_vec_field == -1,
        stop: singinf,
    }
}

fn local_to_sphere(mode: CompactMode, chart: Option<Chart>, x: f64, y: f64) -> SpherePoint {
    match chart {
        Some(c) => mode.chart_to_sphere(c, x, y),
        None => [1.0, x, y],
    }
}

/// Moves a PL point to its canonical representation: finite inside the unit
/// disk, annulus outside.
fn pl_normalize(p: SpherePoint, w: lyapunov::PlWeights) -> SpherePoint {
    if p[0] == 0.0 {
        if p[1] * p[1] + p[2] * p[2] > 1.0 {
            lyapunov::plane_to_plsphere(p[1], p[2], w)
        } else {
            p
        }
    } else if p[1] > 1.0 {
        let (x, y) = lyapunov::annulus_to_plane(p[1], p[2], w);
        [0.0, x, y]
    } else {
        p
    }
}

fn clamp_to_equator(mode: CompactMode, q: &SpherePoint) -> SpherePoint {
    match mode {
        CompactMode::Poincare => {
            let n = (q[0] * q[0] + q[1] * q[1]).sqrt();
            if n > 0.0 {
                [q[0] / n, q[1] / n, 0.0]
            } else {
                *q
            }
        }
        CompactMode::Lyapunov(_) => [1.0, 0.0, q[2]],
    }
}

/// What the integrator plots: plain orbits keep one color, separatrix
/// traces carry their stability class (which can flip at the equator).
#[derive(Debug, Clone, Copy)]
pub struct TraceStyle {
    pub color: PointColor,
    pub sep_type: SepType,
}

impl TraceStyle {
    pub fn orbit() -> Self {
        TraceStyle {
            color: PointColor::Orbit,
            sep_type: SepType::Unstable,
        }
    }

    pub fn separatrix(sep_type: SepType) -> Self {
        TraceStyle {
            color: PointColor::for_sep(sep_type),
            sep_type,
        }
    }

    fn is_separatrix(&self) -> bool {
        !matches!(self.color, PointColor::Orbit | PointColor::LimitCycle)
    }
}

/// One resumable trajectory walk over a loaded study.
pub struct OrbitIntegrator<'a> {
    study: &'a Study,
    vf_index: usize,
    pos: SpherePoint,
    h: f64,
    direction: i8,
    style: TraceStyle,
    solver: Rkf78<f64>,
    status: IntegrationStatus,
}

impl<'a> OrbitIntegrator<'a> {
    /// Starts a walk at a compactified point. `direction` is the time
    /// direction (+1 forward, -1 backward). Fails when the start point
    /// belongs to no declared region.
    pub fn new(
        study: &'a Study,
        start: SpherePoint,
        h: f64,
        direction: i8,
        style: TraceStyle,
    ) -> Result<Self> {
        if !(h > 0.0) {
            bail!("Initial step size must be positive, got {h}");
        }
        let vf_index = vf_index_at(study, &start)
            .ok_or_else(|| anyhow!("Start point belongs to no declared region"))?;
        Ok(OrbitIntegrator {
            study,
            vf_index,
            pos: start,
            h: h * f64::from(direction),
            direction,
            style,
            solver: Rkf78::new(),
            status: IntegrationStatus::InProgress,
        })
    }

    /// Resumes a stored orbit where it left off.
    pub fn resume(study: &'a Study, orbit: &Orbit) -> Result<Self> {
        let vf_index = vf_index_at(study, &orbit.current)
            .ok_or_else(|| anyhow!("Stored orbit endpoint belongs to no declared region"))?;
        Ok(OrbitIntegrator {
            study,
            vf_index,
            pos: orbit.current,
            h: orbit.current_h,
            direction: orbit.direction,
            style: TraceStyle::orbit(),
            solver: Rkf78::new(),
            status: IntegrationStatus::InProgress,
        })
    }

    pub fn status(&self) -> IntegrationStatus {
        self.status
    }

    pub fn position(&self) -> SpherePoint {
        self.pos
    }

    pub fn step_size(&self) -> f64 {
        self.h
    }

    pub fn current_vf(&self) -> usize {
        self.vf_index
    }

    /// Produces up to `n` further points, stopping early at a singular
    /// equator or an unclassified point.
    pub fn advance(&mut self, n: usize) -> Vec<OrbitPoint> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.step() {
                Some(point) => out.push(point),
                None => break,
            }
        }
        out
    }

    /// Raw stepping coordinates for the current position: the chart (None
    /// for the weighted annulus) and the local pair.
    fn stepping_chart(&self) -> (Option<Chart>, f64, f64) {
        match self.study.mode {
            CompactMode::Poincare => {
                let chart = self.study.mode.natural_chart(&self.pos);
                let (x, y) = self.study.mode.sphere_to_chart(chart, &self.pos);
                (Some(chart), x, y)
            }
            CompactMode::Lyapunov(_) => {
                if self.pos[0] == 0.0 {
                    (Some(Chart::R2), self.pos[1], self.pos[2])
                } else {
                    (None, self.pos[1], self.pos[2])
                }
            }
        }
    }

    /// One accepted step with region awareness: when the endpoint lands in a
    /// different region, the step is retried at half size until the floor,
    /// so the crossing point itself is resolved sharply. After the crossing
    /// the walk continues under the region's own field.
    fn step(&mut self) -> Option<OrbitPoint> {
        if self.status != IntegrationStatus::InProgress {
            return None;
        }
        let settings = self.study.settings;
        let mode = self.study.mode;
        let (chart, x, y) = self.stepping_chart();
        let vf = &self.study.vfs[self.vf_index];
        let system = move |x: f64, y: f64| match chart {
            Some(c) => vf.vector_field.eval_chart(c, x, y),
            None => vf.vector_field.eval_cylinder(x, y),
        };
        let (fx, fy) = system(x, y);
        if fx.hypot(fy) < MIN_FIELD_NORM {
            self.status = IntegrationStatus::FieldVanished;
            return None;
        }

        let mut h = self.h;
        let mut floor = settings.h_min;
        let mut cap = settings.h_max;
        let mut taken;
        loop {
            taken = adaptive_step(
                &mut self.solver,
                &system,
                x,
                y,
                h,
                floor,
                cap,
                settings.tolerance,
            );
            let q = local_to_sphere(mode, chart, taken.x, taken.y);
            let crossed_region = !self.study.curves.is_empty()
                && vf_index_at(self.study, &q) != Some(self.vf_index);
            if !crossed_region || taken.h_used.abs() <= settings.branch_h_min {
                break;
            }
            h = taken.h_used * 0.5;
            floor = settings.branch_h_min;
            cap = h.abs().max(settings.branch_h_min);
        }
        self.h = taken.h_next.clamp(-settings.h_max, settings.h_max);

        let mut q = local_to_sphere(mode, chart, taken.x, taken.y);
        if let CompactMode::Lyapunov(w) = mode {
            q = pl_normalize(q, w);
        }
        if let Some(stop) = self.handle_equator(&mut q) {
            self.pos = q;
            self.status = stop;
            return Some(self.make_point(q));
        }
        self.pos = q;
        if !self.study.curves.is_empty() {
            match vf_index_at(self.study, &q) {
                Some(idx) => self.vf_index = idx,
                None => {
                    self.status = IntegrationStatus::Unclassified;
                    return Some(self.make_point(q));
                }
            }
        }
        Some(self.make_point(q))
    }

    fn at_equator(&self, q: &SpherePoint) -> bool {
        match self.study.mode {
            CompactMode::Poincare => q[2].abs() < EQUATOR_EPS,
            CompactMode::Lyapunov(_) => q[0] != 0.0 && q[1].abs() < EQUATOR_EPS,
        }
    }

    /// Detects an equator crossing at `q`, rewrites `q` to the continuation
    /// point and applies the time flip. Returns a terminal status when the
    /// equator is singular.
    fn handle_equator(&mut self, q: &mut SpherePoint) -> Option<IntegrationStatus> {
        let mode = self.study.mode;
        let vf = &self.study.vfs[self.vf_index];
        let (singinf, dir_vec_field) = (vf.singinf, vf.dir_vec_field);
        if self.at_equator(q) && singinf {
            *q = clamp_to_equator(mode, q);
            return Some(IntegrationStatus::EquatorReached);
        }
        let crossed = match mode {
            CompactMode::Poincare => q[2] < 0.0,
            CompactMode::Lyapunov(_) => q[0] != 0.0 && q[1] < 0.0,
        };
        if !crossed {
            return None;
        }
        let crossing = flip_across_equator(mode, q, singinf, dir_vec_field);
        if crossing.stop {
            *q = clamp_to_equator(mode, q);
            return Some(IntegrationStatus::EquatorReached);
        }
        *q = crossing.pos;
        if crossing.flip_time {
            self.h = -self.h;
            self.direction = -self.direction;
            self.style.sep_type = self.style.sep_type.opposite();
            if self.style.is_separatrix() {
                self.style.color = PointColor::for_sep(self.style.sep_type);
            }
        }
        None
    }

    fn make_point(&self, pos: SpherePoint) -> OrbitPoint {
        let vf = &self.study.vfs[self.vf_index];
        let dashed = self.study.plot.dashes && vf.gcf_sign_at(self.study.mode, &pos) < 0;
        OrbitPoint {
            pos,
            color: self.style.color,
            dashed,
            direction: self.direction,
            sep_type: self.style.sep_type,
        }
    }
}

impl Study {
    /// Starts a new orbit at a point of the compactified sphere and
    /// integrates the first batch of points.
    pub fn start_orbit(&mut self, start: SpherePoint, direction: i8) -> Result<()> {
        let mut walker = OrbitIntegrator::new(
            self,
            start,
            self.settings.step_size,
            direction,
            TraceStyle::orbit(),
        )?;
        let points = walker.advance(self.settings.int_points);
        let (current, h) = (walker.position(), walker.step_size());
        let mut orbit = Orbit::new(start, h, direction);
        orbit.current = current;
        orbit.points = points;
        self.orbits.push(orbit);
        Ok(())
    }

    /// Extends the most recent orbit by another batch of points.
    pub fn continue_orbit(&mut self) -> Result<()> {
        let Some(last) = self.orbits.last() else {
            bail!("There is no orbit to continue");
        };
        let mut walker = OrbitIntegrator::resume(self, last)?;
        let points = walker.advance(self.settings.int_points);
        let (current, h) = (walker.position(), walker.step_size());
        let last = self.orbits.last_mut().expect("orbit list was non-empty");
        last.points.extend(points);
        last.current = current;
        last.current_h = h;
        Ok(())
    }

    pub fn delete_last_orbit(&mut self) {
        self.orbits.pop();
    }

    pub fn delete_all_orbits(&mut self) {
        self.orbits.clear();
    }
}
