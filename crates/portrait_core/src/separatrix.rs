//! Separatrix tracing: seeding a branch from its local Taylor curve and
//! following it with the orbit integrator.
//!
//! A saddle-like singularity knows its branches as reduced-coordinate
//! Taylor curves. Tracing a branch seeds a short arc of the curve, then
//! hands the last arc point to the integrator, forward in time for
//! unstable branches and backward for stable ones. Degenerate points trace
//! inside the blow-up disk with the blown-up local field first.

use crate::charts::SpherePoint;
use crate::integrator::{OrbitIntegrator, TraceStyle, MIN_FIELD_NORM};
use crate::orbits::{OrbitPoint, PointColor, SepType};
use crate::regions::is_inside_region_eps;
use crate::session::Study;
use crate::singularity::{apply_transformations, chain_orientation, BlowUpPoint, Singularity};
use crate::solvers::{adaptive_step, Rkf78};
use anyhow::{anyhow, bail, Result};

/// Number of points sampled from the local Taylor curve before the
/// integrator takes over.
const SEED_POINTS: usize = 100;

/// Radius of the blow-up disk in local coordinates; outside it the true
/// field takes over from the blown-up one.
const BLOW_UP_RADIUS: f64 = 1.0;

/// Hard cap on local blow-up steps, for branches that never leave the disk
/// (a nilpotent center inside the disk, say).
const BLOW_UP_MAX_STEPS: usize = 10_000;

fn time_direction(sep_type: SepType) -> i8 {
    match sep_type {
        SepType::Unstable | SepType::CenterUnstable => 1,
        SepType::Stable | SepType::CenterStable => -1,
    }
}

/// How many branches the selected singularity offers.
fn branch_count(sing: &Singularity) -> usize {
    match sing {
        Singularity::Saddle(s) => s.separatrices.len(),
        Singularity::SemiElementary(s) => s.separatrices.len(),
        Singularity::Degenerate(s) => s.blow_up.len(),
        _ => 0,
    }
}

fn seed_is_admissible(study: &Study, vf_i: usize, p: &SpherePoint) -> bool {
    !study.is_piecewise() || is_inside_region_eps(study, vf_i, p, study.settings.tolerance)
}

/// Seeds one Taylor-curve branch of an elementary saddle-like point.
/// Seeding stops at the first point outside the branch's own region; the
/// arc may come back empty when the branch leaves its region immediately.
fn seed_branch(study: &Study, vf_i: usize, s_i: usize, sep_i: usize) -> Vec<OrbitPoint> {
    let sing = &study.vfs[vf_i].singularities[s_i];
    let (sep, epsilon) = match sing {
        Singularity::Saddle(s) => (&s.separatrices[sep_i], s.epsilon),
        Singularity::SemiElementary(s) => (&s.separatrices[sep_i], s.epsilon),
        _ => return Vec::new(),
    };
    let chart = sing.base().chart;
    let direction = time_direction(sep.sep_type);
    let mut arc = Vec::with_capacity(SEED_POINTS);
    for i in 1..=SEED_POINTS {
        let t = f64::from(sep.direction) * epsilon * (i as f64) / (SEED_POINTS as f64);
        let (u, v) = sep.local_curve(t);
        let (x, y) = sing.local_to_chart(u, v);
        let p = study.mode.chart_to_sphere(chart, x, y);
        if !seed_is_admissible(study, vf_i, &p) {
            break;
        }
        arc.push(OrbitPoint {
            pos: p,
            color: PointColor::for_sep(sep.sep_type),
            dashed: false,
            direction,
            sep_type: sep.sep_type,
        });
    }
    arc
}

/// Seeds a blow-up branch and integrates it with the blown-up local field
/// until the orbit leaves the blow-up disk. Points are pushed through the
/// transformation chain for display. The returned flag records whether the
/// disk boundary was actually crossed; only then may the true field take
/// over from the blown-up one.
fn seed_blow_up(study: &Study, vf_i: usize, s_i: usize, b_i: usize) -> (Vec<OrbitPoint>, bool) {
    let Singularity::Degenerate(d) = &study.vfs[vf_i].singularities[s_i] else {
        return (Vec::new(), false);
    };
    let b = &d.blow_up[b_i];
    let chart = d.base.chart;
    let direction = time_direction(b.sep_type);
    let mut arc = Vec::with_capacity(SEED_POINTS);
    for i in 1..=SEED_POINTS {
        let t = d.epsilon * (i as f64) / (SEED_POINTS as f64);
        let (x, y) = b.chart_curve(t);
        let p = study.mode.chart_to_sphere(chart, x, y);
        if !seed_is_admissible(study, vf_i, &p) {
            return (arc, false);
        }
        arc.push(blow_up_point(b, p, direction));
    }

    // Follow the blown-up field in the local chart until the orbit leaves
    // the disk, the local field dies, or the step cap runs out.
    let local = |x: f64, y: f64| (b.vector_field.0.eval(x, y), b.vector_field.1.eval(x, y));
    let settings = &study.settings;
    let mut solver = Rkf78::new();
    let orient = chain_orientation(&b.transformations);
    let mut h = settings.step_size * f64::from(direction) * f64::from(orient);
    let (mut lx, mut ly) = {
        let t = d.epsilon;
        (b.x0 + t, b.y0 + b.taylor.eval(t))
    };
    for _ in 0..BLOW_UP_MAX_STEPS {
        if (lx - b.x0).hypot(ly - b.y0) > BLOW_UP_RADIUS {
            return (arc, true);
        }
        let (fx, fy) = local(lx, ly);
        if fx.hypot(fy) < MIN_FIELD_NORM {
            return (arc, false);
        }
        let taken = adaptive_step(
            &mut solver,
            &local,
            lx,
            ly,
            h,
            settings.h_min,
            settings.h_max,
            settings.tolerance,
        );
        lx = taken.x;
        ly = taken.y;
        h = taken.h_next;
        let (x, y) = apply_transformations(&b.transformations, lx, ly);
        let p = study.mode.chart_to_sphere(chart, x, y);
        if !seed_is_admissible(study, vf_i, &p) {
            return (arc, false);
        }
        arc.push(blow_up_point(b, p, direction));
    }
    (arc, false)
}

fn blow_up_point(b: &BlowUpPoint, pos: SpherePoint, direction: i8) -> OrbitPoint {
    OrbitPoint {
        pos,
        color: PointColor::for_sep(b.sep_type),
        dashed: false,
        direction,
        sep_type: b.sep_type,
    }
}

/// Runs the integrator from the end of an already-produced arc.
fn integrate_from(
    study: &Study,
    arc_end: &OrbitPoint,
    sep_type: SepType,
) -> Result<Vec<OrbitPoint>> {
    let mut walker = OrbitIntegrator::new(
        study,
        arc_end.pos,
        study.settings.step_size,
        time_direction(sep_type),
        TraceStyle::separatrix(sep_type),
    )?;
    Ok(walker.advance(study.settings.int_points))
}

impl Study {
    fn selection_indices(&self) -> Result<(usize, usize, usize)> {
        let vf_i = self.selection.vf;
        let vf = self
            .vfs
            .get(vf_i)
            .ok_or_else(|| anyhow!("Selected vector field {vf_i} does not exist"))?;
        let s_i = self
            .selection
            .singularity
            .ok_or_else(|| anyhow!("No singularity is selected"))?;
        let sing = vf
            .singularities
            .get(s_i)
            .ok_or_else(|| anyhow!("Selected singularity {s_i} does not exist"))?;
        if branch_count(sing) == 0 {
            bail!("The selected singularity has no separatrices to trace");
        }
        Ok((vf_i, s_i, self.selection.separatrix % branch_count(sing)))
    }

    /// Traces one branch. The returned flag is the blow-up disk-exit state
    /// for degenerate branches; elementary branches hand over to the true
    /// field right after their seed arc and always report `true`.
    fn trace_branch(&self, vf_i: usize, s_i: usize, sep_i: usize) -> Result<(Vec<OrbitPoint>, bool)> {
        let sing = &self.vfs[vf_i].singularities[s_i];
        let (mut arc, sep_type, handoff) = match sing {
            Singularity::Degenerate(d) => {
                let (arc, left_disk) = seed_blow_up(self, vf_i, s_i, sep_i);
                (arc, d.blow_up[sep_i].sep_type, left_disk)
            }
            Singularity::Saddle(s) => (
                seed_branch(self, vf_i, s_i, sep_i),
                s.separatrices[sep_i].sep_type,
                true,
            ),
            Singularity::SemiElementary(s) => (
                seed_branch(self, vf_i, s_i, sep_i),
                s.separatrices[sep_i].sep_type,
                true,
            ),
            _ => bail!("The selected singularity has no separatrices to trace"),
        };
        let Some(end) = arc.last().copied() else {
            bail!("The separatrix leaves its region immediately");
        };
        if handoff {
            let tail = integrate_from(self, &end, sep_type)?;
            arc.extend(tail);
        }
        Ok((arc, handoff))
    }

    fn commit_branch(&mut self, vf_i: usize, s_i: usize, sep_i: usize, points: Vec<OrbitPoint>) {
        match &mut self.vfs[vf_i].singularities[s_i] {
            Singularity::Saddle(s) => s.separatrices[sep_i].points.extend(points),
            Singularity::SemiElementary(s) => s.separatrices[sep_i].points.extend(points),
            Singularity::Degenerate(d) => d.blow_up[sep_i].points.extend(points),
            _ => {}
        }
    }

    fn clear_branch(&mut self, vf_i: usize, s_i: usize, sep_i: usize) {
        match &mut self.vfs[vf_i].singularities[s_i] {
            Singularity::Saddle(s) => s.separatrices[sep_i].points.clear(),
            Singularity::SemiElementary(s) => s.separatrices[sep_i].points.clear(),
            Singularity::Degenerate(d) => {
                d.blow_up[sep_i].points.clear();
                d.blow_up[sep_i].left_disk = false;
            }
            _ => {}
        }
    }

    fn record_disk_exit(&mut self, vf_i: usize, s_i: usize, sep_i: usize, left_disk: bool) {
        if let Singularity::Degenerate(d) = &mut self.vfs[vf_i].singularities[s_i] {
            d.blow_up[sep_i].left_disk = left_disk;
        }
    }

    /// Traces the selected separatrix from scratch: Taylor seed arc, then
    /// the first integrated batch. Replaces any previous trace.
    pub fn start_separatrix(&mut self) -> Result<()> {
        let (vf_i, s_i, sep_i) = self.selection_indices()?;
        let (points, left_disk) = self.trace_branch(vf_i, s_i, sep_i)?;
        self.clear_branch(vf_i, s_i, sep_i);
        self.commit_branch(vf_i, s_i, sep_i, points);
        self.record_disk_exit(vf_i, s_i, sep_i, left_disk);
        Ok(())
    }

    /// Extends an already-traced separatrix by another integrated batch.
    pub fn continue_separatrix(&mut self) -> Result<()> {
        let (vf_i, s_i, sep_i) = self.selection_indices()?;
        let sing = &self.vfs[vf_i].singularities[s_i];
        let (last, sep_type) = match sing {
            Singularity::Saddle(s) => {
                let sep = &s.separatrices[sep_i];
                (sep.points.last().copied(), sep.sep_type)
            }
            Singularity::SemiElementary(s) => {
                let sep = &s.separatrices[sep_i];
                (sep.points.last().copied(), sep.sep_type)
            }
            Singularity::Degenerate(d) => {
                let b = &d.blow_up[sep_i];
                if !b.left_disk {
                    bail!("The blow-up trace has not left its local disk yet");
                }
                (b.points.last().copied(), b.sep_type)
            }
            _ => bail!("The selected singularity has no separatrices to trace"),
        };
        let Some(end) = last else {
            bail!("The selected separatrix has not been traced yet");
        };
        let tail = integrate_from(self, &end, sep_type)?;
        self.commit_branch(vf_i, s_i, sep_i, tail);
        Ok(())
    }

    /// Moves the branch selection forward; past the last branch it hops to
    /// the next traceable singularity of the current field.
    pub fn next_separatrix(&mut self) -> Result<()> {
        let (vf_i, s_i, sep_i) = self.selection_indices()?;
        let count = branch_count(&self.vfs[vf_i].singularities[s_i]);
        if sep_i + 1 < count {
            self.selection.separatrix = sep_i + 1;
        } else if !self.select_next_traceable() {
            bail!("The current field has no traceable singularity");
        }
        Ok(())
    }

    /// Traces every branch of the selected singularity in one call.
    /// Branches that leave their region immediately are skipped.
    pub fn trace_all_separatrices(&mut self) -> Result<()> {
        let (vf_i, s_i, _) = self.selection_indices()?;
        let count = branch_count(&self.vfs[vf_i].singularities[s_i]);
        for sep_i in 0..count {
            if let Ok((points, left_disk)) = self.trace_branch(vf_i, s_i, sep_i) {
                self.clear_branch(vf_i, s_i, sep_i);
                self.commit_branch(vf_i, s_i, sep_i, points);
                self.record_disk_exit(vf_i, s_i, sep_i, left_disk);
            }
        }
        Ok(())
    }

    /// Changes the seed-arc length of the selected singularity. Every trace
    /// of that singularity is dropped, since its start arc is now stale.
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(epsilon > 0.0) {
            bail!("Epsilon must be positive, got {epsilon}");
        }
        let (vf_i, s_i, _) = self.selection_indices()?;
        match &mut self.vfs[vf_i].singularities[s_i] {
            Singularity::Saddle(s) => {
                s.epsilon = epsilon;
                for sep in &mut s.separatrices {
                    sep.points.clear();
                }
            }
            Singularity::SemiElementary(s) => {
                s.epsilon = epsilon;
                for sep in &mut s.separatrices {
                    sep.points.clear();
                }
            }
            Singularity::Degenerate(d) => {
                d.epsilon = epsilon;
                for b in &mut d.blow_up {
                    b.points.clear();
                    b.left_disk = false;
                }
            }
            _ => bail!("The selected singularity has no separatrices to trace"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::charts::{Chart, CompactMode};
    use crate::orbits::SepType;
    use crate::poly::{Poly1, Poly2, Term2};
    use crate::session::Study;
    use crate::singularity::{
        fan_out_separatrices, BlowUpPoint, Degenerate, Position, Saddle, Singularity,
        SingularityBase, Transformation,
    };
    use crate::study::{ChartVectorField, VectorFieldStudy};

    fn term(degx: u32, degy: u32, coeff: f64) -> Term2 {
        Term2 { degx, degy, coeff }
    }

    // Linear saddle x' = x, y' = -y at the origin, identity linearization.
    // The directional charts carry the compactified images of the same
    // field: z1' = -2 z1, z2' = -z2 toward the x-axis ends and z1' = 2 z1,
    // z2' = z2 toward the y-axis ends.
    fn saddle_study() -> Study {
        let mut study = Study::default();
        let x_end_pair = || {
            (
                Poly2::new(vec![term(1, 0, -2.0)]),
                Poly2::new(vec![term(0, 1, -1.0)]),
            )
        };
        let y_end_pair = || {
            (
                Poly2::new(vec![term(1, 0, 2.0)]),
                Poly2::new(vec![term(0, 1, 1.0)]),
            )
        };
        let mut vf = VectorFieldStudy {
            vector_field: ChartVectorField {
                r2: (
                    Poly2::new(vec![term(1, 0, 1.0)]),
                    Poly2::new(vec![term(0, 1, -1.0)]),
                ),
                u1: x_end_pair(),
                v1: x_end_pair(),
                u2: y_end_pair(),
                v2: y_end_pair(),
                ..Default::default()
            },
            dir_vec_field: 1,
            ..Default::default()
        };
        vf.singularities.push(Singularity::Saddle(Saddle {
            base: SingularityBase {
                x0: 0.0,
                y0: 0.0,
                chart: Chart::R2,
                position: Position::Standalone,
            },
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            vector_field: Default::default(),
            separatrices: fan_out_separatrices(
                &Poly1::default(),
                SepType::Unstable,
                Chart::R2,
                false,
            ),
            epsilon: 0.01,
        }));
        study.vfs.push(vf);
        study.selection.singularity = Some(0);
        study.selection.separatrix = 0;
        study
    }

    fn sep_points(study: &Study, sep_i: usize) -> &[crate::orbits::OrbitPoint] {
        let Singularity::Saddle(s) = &study.vfs[0].singularities[0] else {
            panic!("study should hold a saddle");
        };
        &s.separatrices[sep_i].points
    }

    #[test]
    fn unstable_branch_runs_out_along_the_x_axis() {
        let mut study = saddle_study();
        study.start_separatrix().expect("trace should start");
        let points = sep_points(&study, 0);
        assert!(points.len() > 100, "seed arc plus integrated tail expected");
        for p in points {
            if let Some((x, y)) = CompactMode::Poincare.sphere_to_plane(&p.pos) {
                assert!(x > 0.0, "unstable branch should run right, got x = {x}");
                assert!(y.abs() < 1e-6, "branch should hug the x axis, got y = {y}");
            }
            assert_eq!(p.sep_type, SepType::Unstable);
        }
        // Exponential growth pushes the branch far out within one batch.
        let last = points.last().expect("trace should emit points");
        let (x, _) = CompactMode::Poincare
            .sphere_to_plane(&last.pos)
            .unwrap_or((f64::INFINITY, 0.0));
        assert!(x > 1.0);
    }

    #[test]
    fn stable_branch_integrates_backwards_along_the_y_axis() {
        let mut study = saddle_study();
        // Branches 2 and 3 are the stable pair, tangent to the second axis.
        study.selection.separatrix = 2;
        study.start_separatrix().expect("trace should start");
        let points = sep_points(&study, 2);
        for p in points {
            if let Some((x, y)) = CompactMode::Poincare.sphere_to_plane(&p.pos) {
                assert!(x.abs() < 1e-6, "stable branch should hug the y axis");
                assert!(y > 0.0);
            }
            assert_eq!(p.sep_type, SepType::Stable);
        }
    }

    #[test]
    fn continue_appends_and_epsilon_reset_clears() {
        let mut study = saddle_study();
        study.start_separatrix().expect("trace should start");
        let first = sep_points(&study, 0).len();
        study.continue_separatrix().expect("trace should continue");
        assert!(sep_points(&study, 0).len() > first);
        study.set_epsilon(0.02).expect("epsilon should update");
        assert!(sep_points(&study, 0).is_empty());
        let Singularity::Saddle(s) = &study.vfs[0].singularities[0] else {
            unreachable!();
        };
        assert_eq!(s.epsilon, 0.02);
    }

    #[test]
    fn next_separatrix_cycles_through_the_fan() {
        let mut study = saddle_study();
        for expected in [1, 2, 3] {
            study.next_separatrix().expect("selection should advance");
            assert_eq!(study.selection.separatrix, expected);
        }
        // Wrapping hops to the next traceable singularity; with only one,
        // the selection comes back around to branch 0.
        study.next_separatrix().expect("selection should wrap");
        assert_eq!(study.selection.separatrix, 0);
        assert_eq!(study.selection.singularity, Some(0));
    }

    #[test]
    fn trace_all_fills_every_branch() {
        let mut study = saddle_study();
        study.trace_all_separatrices().expect("all branches trace");
        for sep_i in 0..4 {
            assert!(!sep_points(&study, sep_i).is_empty());
        }
    }

    // One degenerate point whose blow-up chain is the identity, with the
    // given blown-up local field and a branch along the local x axis.
    fn degenerate_study(local: (Poly2, Poly2)) -> Study {
        let mut study = Study::default();
        let mut vf = VectorFieldStudy {
            vector_field: ChartVectorField {
                r2: (
                    Poly2::new(vec![term(1, 0, 1.0)]),
                    Poly2::new(vec![term(0, 1, -1.0)]),
                ),
                ..Default::default()
            },
            dir_vec_field: 1,
            ..Default::default()
        };
        vf.singularities.push(Singularity::Degenerate(Degenerate {
            base: SingularityBase {
                x0: 0.0,
                y0: 0.0,
                chart: Chart::R2,
                position: Position::Standalone,
            },
            epsilon: 0.01,
            blow_up: vec![BlowUpPoint {
                transformations: vec![Transformation {
                    x0: 0.0,
                    y0: 0.0,
                    c1: 1.0,
                    c2: 1.0,
                    d1: 1,
                    d2: 0,
                    d3: 0,
                    d4: 1,
                    d: 1,
                }],
                vector_field: local,
                x0: 0.0,
                y0: 0.0,
                taylor: Poly1::default(),
                sep_type: SepType::Unstable,
                points: Vec::new(),
                left_disk: false,
            }],
        }));
        study.vfs.push(vf);
        study.selection.singularity = Some(0);
        study
    }

    #[test]
    fn degenerate_branch_traces_through_its_blow_up_chain() {
        // Local field x' = x, y' = -y pushes the branch out of the disk.
        let mut study = degenerate_study((
            Poly2::new(vec![term(1, 0, 1.0)]),
            Poly2::new(vec![term(0, 1, -1.0)]),
        ));
        study.start_separatrix().expect("blow-up trace should start");
        let Singularity::Degenerate(d) = &study.vfs[0].singularities[0] else {
            unreachable!();
        };
        assert!(d.blow_up[0].left_disk);
        let points = &d.blow_up[0].points;
        assert!(points.len() > 100);
        let last = points.last().expect("trace should emit points");
        let (x, y) = CompactMode::Poincare
            .sphere_to_plane(&last.pos)
            .unwrap_or((f64::INFINITY, 0.0));
        assert!(x > 1.0, "branch should leave the blow-up disk, got x = {x}");
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn blow_up_branch_stuck_in_its_disk_never_meets_the_true_field() {
        // Local field x' = -y, y' = x circles inside the disk forever, so
        // the trace must stay local and must not be continuable.
        let mut study = degenerate_study((
            Poly2::new(vec![term(0, 1, -1.0)]),
            Poly2::new(vec![term(1, 0, 1.0)]),
        ));
        study.start_separatrix().expect("blow-up trace should start");
        let Singularity::Degenerate(d) = &study.vfs[0].singularities[0] else {
            unreachable!();
        };
        assert!(!d.blow_up[0].left_disk);
        assert!(!d.blow_up[0].points.is_empty());
        for p in &d.blow_up[0].points {
            let (x, y) = CompactMode::Poincare
                .sphere_to_plane(&p.pos)
                .expect("a trapped trace stays finite");
            assert!(
                x.hypot(y) < 0.5,
                "trace escaped the blow-up disk at ({x}, {y})"
            );
        }
        assert!(study.continue_separatrix().is_err());
    }
}
