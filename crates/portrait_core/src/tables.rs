//! Readers for the precomputed result tables.
//!
//! Every table is a whitespace-delimited token stream written by the
//! symbolic stage. Reading is strict and all-or-nothing: a malformed token
//! produces a [`TableError`] and nothing is committed.

use crate::charts::{Chart, CompactMode};
use crate::orbits::SepType;
use crate::poly::{Poly1, Poly2, Poly3, Term1, Term2, Term3};
use crate::regions::mark_all_singularities;
use crate::session::{SeparatingCurve, Study, VfRegion};
use crate::singularity::{
    fan_out_separatrices, BlowUpPoint, Degenerate, Node, Position, Saddle, SemiElementary,
    Singularity, SingularityBase, StrongFocus, Transformation, WeakFocus,
};
use crate::study::{ChartCurve, ChartVectorField, VectorFieldStudy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table ended early after {0} tokens")]
    UnexpectedEof(usize),
    #[error("Token {index} ({token:?}) is not a valid {expected}")]
    BadToken {
        index: usize,
        token: String,
        expected: &'static str,
    },
    #[error("Table does not start with the P5 marker")]
    BadMarker,
    #[error("Unknown chart code {0}")]
    UnknownChart(i32),
    #[error("Unknown separatrix type code {0}")]
    UnknownSepType(i32),
    #[error("Unknown singularity record tag {0}")]
    UnknownRecordTag(i32),
    #[error("Invalid semi-elementary type {0} (expected 1..=8)")]
    BadSeType(i64),
    #[error("Trailing tokens after a complete table")]
    TrailingTokens,
    #[error("Header declares {declared} vector fields but {supplied} were supplied")]
    FieldCountMismatch { declared: usize, supplied: usize },
}

struct Scanner<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    index: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            tokens: text.split_whitespace(),
            index: 0,
        }
    }

    fn token(&mut self) -> Result<&'a str, TableError> {
        match self.tokens.next() {
            Some(t) => {
                self.index += 1;
                Ok(t)
            }
            None => Err(TableError::UnexpectedEof(self.index)),
        }
    }

    fn f64(&mut self) -> Result<f64, TableError> {
        let t = self.token()?;
        t.parse().map_err(|_| TableError::BadToken {
            index: self.index,
            token: t.to_string(),
            expected: "number",
        })
    }

    fn i64(&mut self) -> Result<i64, TableError> {
        let t = self.token()?;
        t.parse().map_err(|_| TableError::BadToken {
            index: self.index,
            token: t.to_string(),
            expected: "integer",
        })
    }

    fn i32(&mut self) -> Result<i32, TableError> {
        let t = self.token()?;
        t.parse().map_err(|_| TableError::BadToken {
            index: self.index,
            token: t.to_string(),
            expected: "integer",
        })
    }

    fn u32(&mut self) -> Result<u32, TableError> {
        let t = self.token()?;
        t.parse().map_err(|_| TableError::BadToken {
            index: self.index,
            token: t.to_string(),
            expected: "non-negative integer",
        })
    }

    fn usize(&mut self) -> Result<usize, TableError> {
        let t = self.token()?;
        t.parse().map_err(|_| TableError::BadToken {
            index: self.index,
            token: t.to_string(),
            expected: "count",
        })
    }

    fn marker(&mut self) -> Result<(), TableError> {
        if self.token()? == "P5" {
            Ok(())
        } else {
            Err(TableError::BadMarker)
        }
    }

    fn chart(&mut self) -> Result<Chart, TableError> {
        let code = self.i32()?;
        Chart::from_code(code).ok_or(TableError::UnknownChart(code))
    }

    fn sep_type(&mut self) -> Result<SepType, TableError> {
        let code = self.i32()?;
        SepType::from_code(code).ok_or(TableError::UnknownSepType(code))
    }

    fn finish(self) -> Result<(), TableError> {
        let mut tokens = self.tokens;
        if tokens.next().is_some() {
            Err(TableError::TrailingTokens)
        } else {
            Ok(())
        }
    }
}

fn read_poly1(sc: &mut Scanner) -> Result<Poly1, TableError> {
    let n = sc.usize()?;
    let mut terms = Vec::with_capacity(n);
    for _ in 0..n {
        let exp = sc.u32()?;
        let coeff = sc.f64()?;
        terms.push(Term1 { exp, coeff });
    }
    Ok(Poly1::new(terms))
}

fn read_poly2(sc: &mut Scanner) -> Result<Poly2, TableError> {
    let n = sc.usize()?;
    let mut terms = Vec::with_capacity(n);
    for _ in 0..n {
        let degx = sc.u32()?;
        let degy = sc.u32()?;
        let coeff = sc.f64()?;
        terms.push(Term2 { degx, degy, coeff });
    }
    Ok(Poly2::new(terms))
}

fn read_poly3(sc: &mut Scanner) -> Result<Poly3, TableError> {
    let n = sc.usize()?;
    let mut terms = Vec::with_capacity(n);
    for _ in 0..n {
        let degr = sc.u32()?;
        let degc = sc.u32()?;
        let degs = sc.u32()?;
        let coeff = sc.f64()?;
        terms.push(Term3 {
            degr,
            degc,
            degs,
            coeff,
        });
    }
    Ok(Poly3::new(terms))
}

// Chart order in every table: R2, U1, U2, V1, V2, then the cylinder.
fn read_chart_curve(sc: &mut Scanner) -> Result<ChartCurve, TableError> {
    Ok(ChartCurve {
        r2: read_poly2(sc)?,
        u1: read_poly2(sc)?,
        u2: read_poly2(sc)?,
        v1: read_poly2(sc)?,
        v2: read_poly2(sc)?,
        cylinder: read_poly3(sc)?,
    })
}

fn read_poly2_pair(sc: &mut Scanner) -> Result<(Poly2, Poly2), TableError> {
    Ok((read_poly2(sc)?, read_poly2(sc)?))
}

/// Contents of the header/curves table: how many fields to expect, the
/// compactification weights, and (for piecewise configurations) the
/// separating curves with their region sign table.
#[derive(Debug, Clone)]
pub struct CurvesTable {
    pub num_vfs: usize,
    pub weights: (i32, i32),
    pub curves: Vec<ChartCurve>,
    pub regions: Vec<VfRegion>,
}

pub fn read_curves_table(text: &str) -> Result<CurvesTable, TableError> {
    let mut sc = Scanner::new(text);
    sc.marker()?;
    let num_vfs = sc.usize()?;
    let p = sc.i32()?;
    let q = sc.i32()?;
    let ncurves = sc.usize()?;
    let mut curves = Vec::with_capacity(ncurves);
    for _ in 0..ncurves {
        curves.push(read_chart_curve(&mut sc)?);
    }
    let nregions = sc.usize()?;
    let mut regions = Vec::with_capacity(nregions);
    for _ in 0..nregions {
        let vf_index = sc.usize()?;
        let mut signs = Vec::with_capacity(ncurves);
        for _ in 0..ncurves {
            signs.push(sc.i32()?);
        }
        regions.push(VfRegion { vf_index, signs });
    }
    sc.finish()?;
    Ok(CurvesTable {
        num_vfs,
        weights: (p, q),
        curves,
        regions,
    })
}

/// Reads one field's vector-field table: the field in every chart, its GCF
/// (possibly empty), and the equator flags. Singularities come from the
/// separate finite/infinite tables.
pub fn read_vec_table(text: &str) -> Result<VectorFieldStudy, TableError> {
    let mut sc = Scanner::new(text);
    sc.marker()?;
    let vector_field = ChartVectorField {
        r2: read_poly2_pair(&mut sc)?,
        u1: read_poly2_pair(&mut sc)?,
        u2: read_poly2_pair(&mut sc)?,
        v1: read_poly2_pair(&mut sc)?,
        v2: read_poly2_pair(&mut sc)?,
        cylinder: (read_poly3(&mut sc)?, read_poly3(&mut sc)?),
    };
    let gcf = read_chart_curve(&mut sc)?;
    let singinf = sc.i32()? != 0;
    let dir_vec_field = sc.i32()?;
    sc.finish()?;
    Ok(VectorFieldStudy {
        vector_field,
        gcf,
        isoclines: Vec::new(),
        singularities: Vec::new(),
        singinf,
        dir_vec_field,
    })
}

fn base(x0: f64, y0: f64, chart: Chart) -> SingularityBase {
    SingularityBase {
        x0,
        y0,
        chart,
        position: Position::Unmarked,
    }
}

// A semi-elementary point's separatrix kind is determined by its stored
// type: 1..=4 are the saddle-node cases (center separatrix), 5..=8 the
// saddle-like ones.
fn se_sep_type(setype: u8) -> SepType {
    match setype {
        1 | 3 => SepType::CenterUnstable,
        2 | 4 => SepType::CenterStable,
        5 | 7 => SepType::Unstable,
        _ => SepType::Stable,
    }
}

fn read_saddle(sc: &mut Scanner, singinf: bool) -> Result<Singularity, TableError> {
    let x0 = sc.f64()?;
    let y0 = sc.f64()?;
    let a = sc.f64()?;
    let b = sc.f64()?;
    let c = sc.f64()?;
    let d = sc.f64()?;
    let vector_field = read_poly2_pair(sc)?;
    let taylor = read_poly1(sc)?;
    let sep_type = sc.sep_type()?;
    let chart = sc.chart()?;
    let epsilon = sc.f64()?;
    let separatrices = fan_out_separatrices(&taylor, sep_type, chart, singinf);
    Ok(Singularity::Saddle(Saddle {
        base: base(x0, y0, chart),
        a,
        b,
        c,
        d,
        vector_field,
        separatrices,
        epsilon,
    }))
}

fn read_semi_elementary(sc: &mut Scanner, singinf: bool) -> Result<Singularity, TableError> {
    let x0 = sc.f64()?;
    let y0 = sc.f64()?;
    let a = sc.f64()?;
    let b = sc.f64()?;
    let c = sc.f64()?;
    let d = sc.f64()?;
    let vector_field = read_poly2_pair(sc)?;
    let taylor = read_poly1(sc)?;
    let setype_raw = sc.i64()?;
    if !(1..=8).contains(&setype_raw) {
        return Err(TableError::BadSeType(setype_raw));
    }
    let setype = setype_raw as u8;
    let chart = sc.chart()?;
    let epsilon = sc.f64()?;
    let separatrices = fan_out_separatrices(&taylor, se_sep_type(setype), chart, singinf);
    Ok(Singularity::SemiElementary(SemiElementary {
        base: base(x0, y0, chart),
        a,
        b,
        c,
        d,
        vector_field,
        separatrices,
        setype,
        epsilon,
    }))
}

fn read_degenerate(sc: &mut Scanner) -> Result<Singularity, TableError> {
    let x0 = sc.f64()?;
    let y0 = sc.f64()?;
    let epsilon = sc.f64()?;
    let nblowups = sc.usize()?;
    let mut blow_up = Vec::with_capacity(nblowups);
    for _ in 0..nblowups {
        let ntransforms = sc.usize()?;
        let mut transformations = Vec::with_capacity(ntransforms);
        for _ in 0..ntransforms {
            transformations.push(Transformation {
                x0: sc.f64()?,
                y0: sc.f64()?,
                c1: sc.f64()?,
                c2: sc.f64()?,
                d1: sc.u32()?,
                d2: sc.u32()?,
                d3: sc.u32()?,
                d4: sc.u32()?,
                d: sc.i32()?,
            });
        }
        let vector_field = read_poly2_pair(sc)?;
        let taylor = read_poly1(sc)?;
        let bx0 = sc.f64()?;
        let by0 = sc.f64()?;
        let sep_type = sc.sep_type()?;
        blow_up.push(BlowUpPoint {
            transformations,
            vector_field,
            x0: bx0,
            y0: by0,
            taylor,
            sep_type,
            points: Vec::new(),
            left_disk: false,
        });
    }
    let chart = sc.chart()?;
    Ok(Singularity::Degenerate(Degenerate {
        base: base(x0, y0, chart),
        epsilon,
        blow_up,
    }))
}

/// Reads a finite or infinite singularity table. The field's `singinf` flag
/// decides how many separatrices a saddle-like record fans out into.
pub fn read_singularity_table(text: &str, singinf: bool) -> Result<Vec<Singularity>, TableError> {
    let mut sc = Scanner::new(text);
    let count = sc.usize()?;
    let mut singularities = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = sc.i32()?;
        let sing = match tag {
            1 => read_saddle(&mut sc, singinf)?,
            2 => {
                let x0 = sc.f64()?;
                let y0 = sc.f64()?;
                let stability = sc.i32()?;
                let chart = sc.chart()?;
                Singularity::Node(Node {
                    base: base(x0, y0, chart),
                    stability,
                })
            }
            3 => {
                let x0 = sc.f64()?;
                let y0 = sc.f64()?;
                let order = sc.i32()?;
                let chart = sc.chart()?;
                Singularity::WeakFocus(WeakFocus {
                    base: base(x0, y0, chart),
                    order,
                })
            }
            4 => {
                let x0 = sc.f64()?;
                let y0 = sc.f64()?;
                let stability = sc.i32()?;
                let chart = sc.chart()?;
                Singularity::StrongFocus(StrongFocus {
                    base: base(x0, y0, chart),
                    stability,
                })
            }
            5 => read_semi_elementary(&mut sc, singinf)?,
            6 => read_degenerate(&mut sc)?,
            other => return Err(TableError::UnknownRecordTag(other)),
        };
        singularities.push(sing);
    }
    sc.finish()?;
    Ok(singularities)
}

/// The three tables describing one vector field.
#[derive(Debug, Clone, Copy)]
pub struct FieldTables<'a> {
    pub vec: &'a str,
    pub fin: &'a str,
    pub inf: &'a str,
}

/// Reads a complete study from its tables: the header/curves table plus one
/// table triple per declared field. Either every table parses and a fully
/// populated, marked study comes back, or nothing is committed.
pub fn load_study(curves: &str, fields: &[FieldTables]) -> Result<Study, TableError> {
    let header = read_curves_table(curves)?;
    if header.num_vfs != fields.len() {
        return Err(TableError::FieldCountMismatch {
            declared: header.num_vfs,
            supplied: fields.len(),
        });
    }
    let mut study = Study {
        mode: CompactMode::from_weights(header.weights.0, header.weights.1),
        ..Default::default()
    };
    study.curves = header
        .curves
        .into_iter()
        .map(|curve| SeparatingCurve {
            curve,
            points: Vec::new(),
        })
        .collect();
    study.vf_regions = header.regions;
    for t in fields {
        let mut vf = read_vec_table(t.vec)?;
        let mut singularities = read_singularity_table(t.fin, vf.singinf)?;
        singularities.extend(read_singularity_table(t.inf, vf.singinf)?);
        vf.singularities = singularities;
        study.vfs.push(vf);
    }
    mark_all_singularities(&mut study);
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::{
        load_study, read_curves_table, read_singularity_table, read_vec_table, FieldTables,
        TableError,
    };
    use crate::charts::Chart;
    use crate::orbits::SepType;
    use crate::singularity::Singularity;

    // x' = -y + x(1 - x^2 - y^2), y' = x + y(1 - x^2 - y^2) in R2 only,
    // with empty directional charts, no GCF, singinf = 0, dir = 1.
    const CIRCLE_VEC: &str = "P5\n\
        4  0 1 -1   1 0 1   3 0 -1   1 2 -1\n\
        4  1 0 1   0 1 1   2 1 -1   0 3 -1\n\
        0 0  0 0  0 0  0 0\n\
        0 0\n\
        0 0 0 0 0 0\n\
        0 1";

    #[test]
    fn vec_table_reads_the_plane_field_and_flags() {
        let vf = read_vec_table(CIRCLE_VEC).expect("circle vec table should parse");
        assert!(!vf.singinf);
        assert_eq!(vf.dir_vec_field, 1);
        assert!(vf.gcf.is_empty());
        let (dx, dy) = vf.vector_field.eval_chart(Chart::R2, 1.0, 0.0);
        assert!((dx - 0.0).abs() < 1e-12);
        assert!((dy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_field_curves_table_reduces_to_the_header() {
        let t = read_curves_table("P5 1 1 1 0 0").expect("trivial header should parse");
        assert_eq!(t.num_vfs, 1);
        assert_eq!(t.weights, (1, 1));
        assert!(t.curves.is_empty());
        assert!(t.regions.is_empty());
    }

    #[test]
    fn curves_table_reads_curves_and_region_rows() {
        // One curve (x = 0 in R2, constants elsewhere), two regions.
        let text = "P5 2 1 1 1\n\
            1 1 0 1\n\
            1 0 0 1\n\
            1 0 0 1\n\
            1 0 0 -1\n\
            1 0 0 -1\n\
            0\n\
            2\n\
            0 1\n\
            1 -1";
        let t = read_curves_table(text).expect("curves table should parse");
        assert_eq!(t.curves.len(), 1);
        assert_eq!(t.regions.len(), 2);
        assert_eq!(t.regions[1].vf_index, 1);
        assert_eq!(t.regions[1].signs, vec![-1]);
        assert!((t.curves[0].r2.eval(2.0, 5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn saddle_record_fans_out_at_load() {
        // Type 1, at the origin of R2, identity matrix, field (x, -y),
        // flat Taylor branch, unstable, chart 0, epsilon 0.01.
        let text = "1\n\
            1 0 0 1 0 0 1\n\
            1 1 0 1\n\
            1 0 1 -1\n\
            0\n\
            1 0 0.01";
        let sings = read_singularity_table(text, false).expect("saddle table should parse");
        assert_eq!(sings.len(), 1);
        let Singularity::Saddle(s) = &sings[0] else {
            panic!("record should decode as a saddle");
        };
        assert_eq!(s.base.chart, Chart::R2);
        assert_eq!(s.separatrices.len(), 4);
        assert_eq!(s.epsilon, 0.01);
    }

    #[test]
    fn degenerate_record_reads_its_blow_up_chain() {
        // Type 6 at (0, 0), epsilon 0.01, one blow-up point with one
        // transformation (x, xy), field (x, -y), flat Taylor, local point
        // (0, 1), stable; chart 0.
        let text = "1\n\
            6\n\
            0 0 0.01 1\n\
            1\n\
            0 0 1 1 1 0 1 1 1\n\
            1 1 0 1\n\
            1 0 1 -1\n\
            0\n\
            0 1 -1\n\
            0";
        let sings = read_singularity_table(text, false).expect("degenerate table should parse");
        let Singularity::Degenerate(d) = &sings[0] else {
            panic!("record should decode as degenerate");
        };
        assert_eq!(d.blow_up.len(), 1);
        assert_eq!(d.blow_up[0].transformations.len(), 1);
        assert_eq!(d.blow_up[0].sep_type, SepType::Stable);
        let (x, y) = d.blow_up[0].chart_curve(0.5);
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn load_assembles_and_marks_a_whole_study() {
        // One field, no piecewise curves, one finite saddle, nothing at
        // infinity.
        let fin = "1\n\
            1 0 0 1 0 0 1\n\
            1 1 0 1\n\
            1 0 1 -1\n\
            0\n\
            1 0 0.01";
        let study = load_study(
            "P5 1 1 1 0 0",
            &[FieldTables {
                vec: CIRCLE_VEC,
                fin,
                inf: "0",
            }],
        )
        .expect("study should load");
        assert_eq!(study.vfs.len(), 1);
        assert_eq!(study.vfs[0].singularities.len(), 1);
        assert_eq!(
            study.vfs[0].singularities[0].position(),
            crate::singularity::Position::Standalone
        );
    }

    #[test]
    fn load_rejects_a_field_count_mismatch() {
        assert!(matches!(
            load_study("P5 2 1 1 0 0", &[]),
            Err(TableError::FieldCountMismatch {
                declared: 2,
                supplied: 0
            })
        ));
    }

    #[test]
    fn malformed_tokens_are_hard_errors() {
        assert!(matches!(
            read_curves_table("Q5 1 1 1 0 0"),
            Err(TableError::BadMarker)
        ));
        assert!(matches!(
            read_curves_table("P5 1 1 x 0 0"),
            Err(TableError::BadToken { .. })
        ));
        assert!(matches!(
            read_curves_table("P5 1 1 1 0"),
            Err(TableError::UnexpectedEof(_))
        ));
        assert!(matches!(
            read_curves_table("P5 1 1 1 0 0 7"),
            Err(TableError::TrailingTokens)
        ));
        assert!(matches!(
            read_singularity_table("1 9", false),
            Err(TableError::UnknownRecordTag(9))
        ));
    }
}
