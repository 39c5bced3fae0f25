//! Piecewise-region classification: which vector field governs a given
//! point of the compactified plane, and which singularities are real versus
//! virtual under that assignment.

use crate::charts::{CompactMode, SpherePoint, COINCIDENCE_TOL};
use crate::session::Study;
use crate::singularity::Position;

/// Sign of a separating curve at a compactified point. Zero counts as
/// positive so every point gets a definite classification.
pub fn curve_sign_at(study: &Study, curve_index: usize, p: &SpherePoint) -> i32 {
    let value = study.curves[curve_index].curve.eval_at(study.mode, p);
    if value >= 0.0 {
        1
    } else {
        -1
    }
}

/// Sign vector of every separating curve at `p`.
pub fn signs_at(study: &Study, p: &SpherePoint) -> Vec<i32> {
    (0..study.curves.len())
        .map(|i| curve_sign_at(study, i, p))
        .collect()
}

/// Index of the vector field active at `p`, or `None` when the sign vector
/// matches no declared region. A study without separating curves is a
/// single-field study and always answers field 0, provided a field has
/// been loaded at all.
pub fn vf_index_at(study: &Study, p: &SpherePoint) -> Option<usize> {
    if study.vfs.is_empty() {
        return None;
    }
    if study.curves.is_empty() {
        return Some(0);
    }
    let signs = signs_at(study, p);
    study
        .vf_regions
        .iter()
        .find(|r| r.signs == signs)
        .map(|r| r.vf_index)
}

/// Whether `p` lies in the region governed by field `vf_index`.
pub fn is_inside_region(study: &Study, vf_index: usize, p: &SpherePoint) -> bool {
    vf_index_at(study, p) == Some(vf_index)
}

/// Like [`is_inside_region`], but a curve value within `eps` of zero is
/// allowed to match either sign. Used for points that sit on a separating
/// curve up to numerical noise, such as Taylor-seeded separatrix starts.
pub fn is_inside_region_eps(study: &Study, vf_index: usize, p: &SpherePoint, eps: f64) -> bool {
    if study.curves.is_empty() {
        return vf_index == 0;
    }
    study.vf_regions.iter().any(|r| {
        r.vf_index == vf_index
            && study.curves.iter().zip(&r.signs).all(|(c, &want)| {
                let value = c.curve.eval_at(study.mode, p);
                value.abs() <= eps || (value >= 0.0) == (want > 0)
            })
    })
}

/// Whether a singularity stored with field `vf_index` lies in that field's
/// own region (a "real" singularity of the piecewise system).
pub fn is_real_singularity(study: &Study, vf_index: usize, p: &SpherePoint) -> bool {
    is_inside_region(study, vf_index, p)
}

/// Marks every singularity of every field as standalone, virtual, or part
/// of a coinciding group. Two singularities coincide when their
/// compactified positions agree up to [`COINCIDENCE_TOL`]; the first real
/// member of a group is its main representative.
pub fn mark_all_singularities(study: &mut Study) {
    // Collect positions and reality first so the mutable pass below does
    // not have to re-borrow the study.
    let mode = study.mode;
    let mut entries: Vec<(usize, usize, SpherePoint, bool)> = Vec::new();
    for (vf_i, vf) in study.vfs.iter().enumerate() {
        for (s_i, sing) in vf.singularities.iter().enumerate() {
            let base = sing.base();
            let p = mode.chart_to_sphere(base.chart, base.x0, base.y0);
            let real = is_real_singularity(study, vf_i, &p);
            entries.push((vf_i, s_i, p, real));
        }
    }

    let n = entries.len();
    let mut positions = vec![Position::Unmarked; n];
    let mut grouped = vec![false; n];
    for i in 0..n {
        if grouped[i] {
            continue;
        }
        let mut group = vec![i];
        for j in (i + 1)..n {
            if !grouped[j] && mode.distance(&entries[i].2, &entries[j].2) < COINCIDENCE_TOL {
                group.push(j);
            }
        }
        if group.len() == 1 {
            positions[i] = if entries[i].3 {
                Position::Standalone
            } else {
                Position::Virtual
            };
        } else {
            let main = group.iter().copied().find(|&k| entries[k].3);
            for &k in &group {
                grouped[k] = true;
                positions[k] = if Some(k) == main {
                    Position::CoincidingMain
                } else if entries[k].3 {
                    Position::Coinciding
                } else {
                    Position::CoincidingVirtual
                };
            }
        }
        grouped[i] = true;
    }

    for (idx, (vf_i, s_i, _, _)) in entries.into_iter().enumerate() {
        study.vfs[vf_i].singularities[s_i].base_mut().position = positions[idx];
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_inside_region_eps, is_real_singularity, mark_all_singularities, signs_at, vf_index_at,
    };
    use crate::charts::{Chart, CompactMode};
    use crate::poly::{Poly2, Term2};
    use crate::session::{SeparatingCurve, Study, VfRegion};
    use crate::singularity::{Node, Position, Singularity, SingularityBase};
    use crate::study::{ChartCurve, VectorFieldStudy};

    fn x_curve() -> SeparatingCurve {
        // x = 0 in the plane; in the directional charts the sign of x is
        // carried by the chart itself.
        SeparatingCurve {
            curve: ChartCurve {
                r2: Poly2::new(vec![Term2 {
                    degx: 1,
                    degy: 0,
                    coeff: 1.0,
                }]),
                u1: Poly2::constant(1.0),
                v1: Poly2::constant(-1.0),
                u2: Poly2::new(vec![Term2 {
                    degx: 1,
                    degy: 0,
                    coeff: 1.0,
                }]),
                v2: Poly2::new(vec![Term2 {
                    degx: 1,
                    degy: 0,
                    coeff: -1.0,
                }]),
                ..Default::default()
            },
            points: Vec::new(),
        }
    }

    fn split_study() -> Study {
        let mut study = Study::default();
        study.vfs.push(VectorFieldStudy::default());
        study.vfs.push(VectorFieldStudy::default());
        study.curves.push(x_curve());
        study.vf_regions.push(VfRegion {
            vf_index: 0,
            signs: vec![1],
        });
        study.vf_regions.push(VfRegion {
            vf_index: 1,
            signs: vec![-1],
        });
        study
    }

    fn node_at(x0: f64, y0: f64) -> Singularity {
        Singularity::Node(Node {
            base: SingularityBase {
                x0,
                y0,
                chart: Chart::R2,
                position: Position::Unmarked,
            },
            stability: 1,
        })
    }

    #[test]
    fn single_field_studies_classify_everything_as_field_zero() {
        let mut study = Study::default();
        study.vfs.push(VectorFieldStudy::default());
        let p = CompactMode::Poincare.plane_to_sphere(3.0, -4.0);
        assert_eq!(vf_index_at(&study, &p), Some(0));
    }

    #[test]
    fn sign_vector_selects_the_region_field() {
        let study = split_study();
        let right = CompactMode::Poincare.plane_to_sphere(1.0, 0.5);
        let left = CompactMode::Poincare.plane_to_sphere(-1.0, 0.5);
        assert_eq!(signs_at(&study, &right), vec![1]);
        assert_eq!(vf_index_at(&study, &right), Some(0));
        assert_eq!(vf_index_at(&study, &left), Some(1));
    }

    #[test]
    fn epsilon_match_accepts_points_on_the_curve() {
        let study = split_study();
        let on_curve = CompactMode::Poincare.plane_to_sphere(0.0, 1.0);
        assert!(is_inside_region_eps(&study, 0, &on_curve, 1e-6));
        assert!(is_inside_region_eps(&study, 1, &on_curve, 1e-6));
        let right = CompactMode::Poincare.plane_to_sphere(1.0, 0.0);
        assert!(!is_inside_region_eps(&study, 1, &right, 1e-6));
    }

    #[test]
    fn singularities_outside_their_region_are_virtual() {
        let mut study = split_study();
        study.vfs[0].singularities.push(node_at(1.0, 0.0));
        study.vfs[0].singularities.push(node_at(-1.0, 0.0));
        mark_all_singularities(&mut study);
        assert_eq!(
            study.vfs[0].singularities[0].position(),
            Position::Standalone
        );
        assert_eq!(study.vfs[0].singularities[1].position(), Position::Virtual);
    }

    #[test]
    fn coinciding_group_gets_one_main_representative() {
        let mut study = split_study();
        // Field 0 owns the right half-plane, so its copy is the real one.
        study.vfs[0].singularities.push(node_at(2.0, 0.0));
        study.vfs[1].singularities.push(node_at(2.0, 0.0));
        mark_all_singularities(&mut study);
        assert_eq!(
            study.vfs[0].singularities[0].position(),
            Position::CoincidingMain
        );
        assert_eq!(
            study.vfs[1].singularities[0].position(),
            Position::CoincidingVirtual
        );
    }

    #[test]
    fn marking_twice_leaves_the_classification_unchanged() {
        let mut study = split_study();
        study.vfs[0].singularities.push(node_at(1.0, 0.0));
        study.vfs[0].singularities.push(node_at(-1.0, 0.0));
        study.vfs[1].singularities.push(node_at(1.0, 0.0));
        mark_all_singularities(&mut study);
        let first: Vec<_> = study
            .vfs
            .iter()
            .flat_map(|vf| vf.singularities.iter().map(|s| s.position()))
            .collect();
        mark_all_singularities(&mut study);
        let second: Vec<_> = study
            .vfs
            .iter()
            .flat_map(|vf| vf.singularities.iter().map(|s| s.position()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn virtual_member_seen_first_still_yields_one_real_main() {
        let mut study = split_study();
        // Field 1 owns the left half-plane; field 0's copy at the same spot
        // is enumerated first but is only virtual there.
        study.vfs[0].singularities.push(node_at(-2.0, 0.0));
        study.vfs[1].singularities.push(node_at(-2.0, 0.0));
        mark_all_singularities(&mut study);
        assert_eq!(
            study.vfs[0].singularities[0].position(),
            Position::CoincidingVirtual
        );
        assert_eq!(
            study.vfs[1].singularities[0].position(),
            Position::CoincidingMain
        );
    }

    #[test]
    fn real_singularity_check_respects_region_ownership() {
        let study = split_study();
        let right = CompactMode::Poincare.plane_to_sphere(2.0, 0.0);
        assert!(is_real_singularity(&study, 0, &right));
        assert!(!is_real_singularity(&study, 1, &right));
    }
}
