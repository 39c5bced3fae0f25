//! Singularity catalogue: the classified critical points of one vector
//! field, as read from the precomputed result tables.
//!
//! Locations are chart-local; the chart id travels with every singularity.
//! Elementary and semi-elementary points carry the linearization (or blow-up
//! Jacobian) that maps reduced local coordinates back to the chart, and
//! saddle-like points own their separatrix lists. Degenerate points own an
//! ordered blow-up chain instead of a flat separatrix list.

use crate::charts::Chart;
use crate::orbits::{OrbitPoint, SepType};
use crate::poly::{Poly1, Poly2};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// De-duplication tag assigned by the region classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Position {
    /// Not yet marked.
    #[default]
    Unmarked,
    /// The only singularity at its sphere location.
    Standalone,
    /// Lies outside every region owned by its vector field; never drawn,
    /// never traced.
    Virtual,
    /// First-marked real singularity of a coinciding group.
    CoincidingMain,
    /// Real singularity coinciding with an earlier-marked main.
    Coinciding,
    /// Virtual singularity coinciding with a real one.
    CoincidingVirtual,
}

impl Position {
    pub fn is_virtual(self) -> bool {
        matches!(self, Position::Virtual | Position::CoincidingVirtual)
    }
}

/// One separatrix of a saddle-like singularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Separatrix {
    pub sep_type: SepType,
    /// Integration direction along the local parameter (+1 / -1).
    pub direction: i8,
    /// True for the mirrored duplicate of an independently computed branch.
    pub copy: bool,
    /// Local curve in reduced coordinates: the branch tangent to the first
    /// axis is `(t, T(t))`, the one tangent to the second is `(T(t), t)`.
    pub taylor: Poly1,
    pub tangent_to_second_axis: bool,
    /// Accumulated plot points; cleared when epsilon changes.
    pub points: Vec<OrbitPoint>,
}

impl Separatrix {
    pub fn new(sep_type: SepType, direction: i8, copy: bool, taylor: Poly1) -> Self {
        Self {
            sep_type,
            direction,
            copy,
            taylor,
            tangent_to_second_axis: false,
            points: Vec::new(),
        }
    }

    /// Local curve point at parameter `t`, before the linearization map.
    pub fn local_curve(&self, t: f64) -> (f64, f64) {
        if self.tangent_to_second_axis {
            (self.taylor.eval(t), t)
        } else {
            (t, self.taylor.eval(t))
        }
    }
}

/// Builds the separatrix list a stored table record fans out into.
///
/// A finite (R2) saddle-like point always gets 4 separatrices: both branch
/// choices in both directions. A point on a chart at infinity gets 4 when
/// the line at infinity is itself singular, otherwise only the 2 branches
/// that leave the equator.
pub fn fan_out_separatrices(
    taylor: &Poly1,
    sep_type: SepType,
    chart: Chart,
    singinf: bool,
) -> Vec<Separatrix> {
    let mut seps = vec![
        Separatrix::new(sep_type, 1, false, taylor.clone()),
        Separatrix::new(sep_type, -1, true, taylor.clone()),
    ];
    if chart.is_finite() || singinf {
        let mut second = Separatrix::new(sep_type.opposite(), 1, false, taylor.clone());
        second.tangent_to_second_axis = true;
        let mut second_copy = Separatrix::new(sep_type.opposite(), -1, true, taylor.clone());
        second_copy.tangent_to_second_axis = true;
        seps.push(second);
        seps.push(second_copy);
    }
    seps
}

/// One monomial substitution of a blow-up chain:
/// `(x, y) -> (x0 + c1 x^d1 y^d2, y0 + c2 x^d3 y^d4)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transformation {
    pub x0: f64,
    pub y0: f64,
    pub c1: f64,
    pub c2: f64,
    pub d1: u32,
    pub d2: u32,
    pub d3: u32,
    pub d4: u32,
    /// Orientation of the substitution: -1 when it reverses time.
    pub d: i32,
}

impl Transformation {
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.x0 + self.c1 * x.powi(self.d1 as i32) * y.powi(self.d2 as i32),
            self.y0 + self.c2 * x.powi(self.d3 as i32) * y.powi(self.d4 as i32),
        )
    }
}

/// Applies a blow-up chain in order, local blow-up coordinates to chart
/// coordinates.
pub fn apply_transformations(chain: &[Transformation], x: f64, y: f64) -> (f64, f64) {
    chain.iter().fold((x, y), |(x, y), t| t.apply(x, y))
}

/// Net time orientation of a chain (product of the per-step signs).
pub fn chain_orientation(chain: &[Transformation]) -> i32 {
    chain.iter().map(|t| t.d).product()
}

/// One elementary point of a degenerate singularity's blow-up chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlowUpPoint {
    /// Substitutions mapping local blow-up coordinates to the singularity's
    /// chart, applied in order.
    pub transformations: Vec<Transformation>,
    /// Blown-up local vector field, integrated while inside the unit
    /// blow-up disk.
    pub vector_field: (Poly2, Poly2),
    /// Coordinates of the elementary point in the local blow-up chart.
    pub x0: f64,
    pub y0: f64,
    pub taylor: Poly1,
    pub sep_type: SepType,
    pub points: Vec<OrbitPoint>,
    /// Whether the stored trace has crossed the blow-up disk boundary; the
    /// true field only continues the branch once it has.
    pub left_disk: bool,
}

impl BlowUpPoint {
    /// Local curve point at parameter `t`, pushed through the
    /// transformation chain into chart coordinates.
    pub fn chart_curve(&self, t: f64) -> (f64, f64) {
        let (x, y) = (self.x0 + t, self.y0 + self.taylor.eval(t));
        apply_transformations(&self.transformations, x, y)
    }
}

/// Fields common to every singularity variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingularityBase {
    pub x0: f64,
    pub y0: f64,
    pub chart: Chart,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saddle {
    pub base: SingularityBase,
    /// Linearization matrix entries, row-major.
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub vector_field: (Poly2, Poly2),
    pub separatrices: Vec<Separatrix>,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub base: SingularityBase,
    /// +1 unstable, -1 stable.
    pub stability: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakFocus {
    pub base: SingularityBase,
    /// Order of the focus (0 when undetermined / center candidate).
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrongFocus {
    pub base: SingularityBase,
    pub stability: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemiElementary {
    pub base: SingularityBase,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub vector_field: (Poly2, Poly2),
    pub separatrices: Vec<Separatrix>,
    /// Saddle-node/saddle variant, 1..=8.
    pub setype: u8,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Degenerate {
    pub base: SingularityBase,
    pub epsilon: f64,
    /// Ordered blow-up chain; integration follows this order.
    pub blow_up: Vec<BlowUpPoint>,
}

/// A classified singularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Singularity {
    Saddle(Saddle),
    Node(Node),
    WeakFocus(WeakFocus),
    StrongFocus(StrongFocus),
    SemiElementary(SemiElementary),
    Degenerate(Degenerate),
}

impl Singularity {
    pub fn base(&self) -> &SingularityBase {
        match self {
            Singularity::Saddle(s) => &s.base,
            Singularity::Node(s) => &s.base,
            Singularity::WeakFocus(s) => &s.base,
            Singularity::StrongFocus(s) => &s.base,
            Singularity::SemiElementary(s) => &s.base,
            Singularity::Degenerate(s) => &s.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut SingularityBase {
        match self {
            Singularity::Saddle(s) => &mut s.base,
            Singularity::Node(s) => &mut s.base,
            Singularity::WeakFocus(s) => &mut s.base,
            Singularity::StrongFocus(s) => &mut s.base,
            Singularity::SemiElementary(s) => &mut s.base,
            Singularity::Degenerate(s) => &mut s.base,
        }
    }

    pub fn chart(&self) -> Chart {
        self.base().chart
    }

    pub fn position(&self) -> Position {
        self.base().position
    }

    /// True for variants that own separatrices or a blow-up chain and can
    /// be traced.
    pub fn is_traceable(&self) -> bool {
        matches!(
            self,
            Singularity::Saddle(_) | Singularity::SemiElementary(_) | Singularity::Degenerate(_)
        ) && !self.position().is_virtual()
    }

    /// Linearization map from reduced local coordinates to chart
    /// coordinates, where the variant carries one.
    pub fn linearization(&self) -> Option<Matrix2<f64>> {
        match self {
            Singularity::Saddle(s) => Some(Matrix2::new(s.a, s.b, s.c, s.d)),
            Singularity::SemiElementary(s) => Some(Matrix2::new(s.a, s.b, s.c, s.d)),
            _ => None,
        }
    }

    /// Chart-local position of a reduced-coordinate point: linearization
    /// applied, then translated to the singularity location.
    pub fn local_to_chart(&self, u: f64, v: f64) -> (f64, f64) {
        let base = self.base();
        match self.linearization() {
            Some(m) => {
                let w = m * Vector2::new(u, v);
                (base.x0 + w.x, base.y0 + w.y)
            }
            None => (base.x0 + u, base.y0 + v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_transformations, chain_orientation, fan_out_separatrices, Chart, Position,
        Separatrix, SepType, Singularity, SingularityBase, Saddle, Transformation,
    };
    use crate::poly::{Poly1, Term1};

    fn flat_taylor() -> Poly1 {
        Poly1::default()
    }

    #[test]
    fn finite_saddle_record_fans_out_to_four_separatrices() {
        let seps = fan_out_separatrices(&flat_taylor(), SepType::Unstable, Chart::R2, false);
        assert_eq!(seps.len(), 4);
        let originals = seps.iter().filter(|s| !s.copy).count();
        assert_eq!(originals, 2);
        let unstable = seps
            .iter()
            .filter(|s| s.sep_type == SepType::Unstable)
            .count();
        assert_eq!(unstable, 2);
    }

    #[test]
    fn infinite_saddle_gets_two_separatrices_unless_equator_is_singular() {
        let plain = fan_out_separatrices(&flat_taylor(), SepType::Stable, Chart::U1, false);
        assert_eq!(plain.len(), 2);
        let singular = fan_out_separatrices(&flat_taylor(), SepType::Stable, Chart::U1, true);
        assert_eq!(singular.len(), 4);
    }

    #[test]
    fn local_curve_respects_the_tangent_axis() {
        let taylor = Poly1::new(vec![Term1 { exp: 2, coeff: 3.0 }]);
        let mut sep = Separatrix::new(SepType::Stable, 1, false, taylor);
        assert_eq!(sep.local_curve(2.0), (2.0, 12.0));
        sep.tangent_to_second_axis = true;
        assert_eq!(sep.local_curve(2.0), (12.0, 2.0));
    }

    #[test]
    fn transformations_compose_in_chain_order() {
        // First blow up: (x, y) -> (x, x y); then translate x.
        let chain = [
            Transformation {
                x0: 0.0,
                y0: 0.0,
                c1: 1.0,
                c2: 1.0,
                d1: 1,
                d2: 0,
                d3: 1,
                d4: 1,
                d: 1,
            },
            Transformation {
                x0: 1.0,
                y0: 0.0,
                c1: 1.0,
                c2: 1.0,
                d1: 1,
                d2: 0,
                d3: 0,
                d4: 1,
                d: -1,
            },
        ];
        let (x, y) = apply_transformations(&chain, 2.0, 3.0);
        // (2, 3) -> (2, 6) -> (3, 6)
        assert_eq!((x, y), (3.0, 6.0));
        assert_eq!(chain_orientation(&chain), -1);
    }

    #[test]
    fn linearization_maps_reduced_coordinates_into_the_chart() {
        let saddle = Singularity::Saddle(Saddle {
            base: SingularityBase {
                x0: 1.0,
                y0: -1.0,
                chart: Chart::R2,
                position: Position::Standalone,
            },
            a: 2.0,
            b: 0.0,
            c: 0.0,
            d: 0.5,
            vector_field: (Default::default(), Default::default()),
            separatrices: Vec::new(),
            epsilon: 0.1,
        });
        assert_eq!(saddle.local_to_chart(1.0, 2.0), (3.0, 0.0));
    }

    #[test]
    fn virtual_positions_are_never_traceable() {
        let mut saddle = Saddle {
            base: SingularityBase {
                x0: 0.0,
                y0: 0.0,
                chart: Chart::R2,
                position: Position::Virtual,
            },
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: -1.0,
            vector_field: (Default::default(), Default::default()),
            separatrices: Vec::new(),
            epsilon: 0.1,
        };
        assert!(!Singularity::Saddle(saddle.clone()).is_traceable());
        saddle.base.position = Position::Standalone;
        assert!(Singularity::Saddle(saddle).is_traceable());
    }

    #[test]
    fn position_virtual_flags() {
        assert!(Position::Virtual.is_virtual());
        assert!(Position::CoincidingVirtual.is_virtual());
        assert!(!Position::CoincidingMain.is_virtual());
    }
}
