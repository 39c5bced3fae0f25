//! Sparse polynomial term lists in one, two, and three variables.
//!
//! These are the only polynomial representations the engine needs: the
//! symbolic reduction happens upstream (the external algebra engine writes
//! the result tables), so all we do here is store, evaluate, and display.
//! Term lists are immutable after construction; insertion order is
//! irrelevant for evaluation and only affects display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One term `coeff * t^exp` of a univariate polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term1 {
    pub exp: u32,
    pub coeff: f64,
}

/// One term `coeff * x^degx * y^degy` of a bivariate polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term2 {
    pub degx: u32,
    pub degy: u32,
    pub coeff: f64,
}

/// One term `coeff * r^degr * cos^degc * sin^degs`, used for the cylinder
/// (Poincare-Lyapunov annulus) charts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term3 {
    pub degr: u32,
    pub degc: u32,
    pub degs: u32,
    pub coeff: f64,
}

/// A univariate polynomial as a sparse term list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Poly1 {
    pub terms: Vec<Term1>,
}

/// A bivariate polynomial as a sparse term list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Poly2 {
    pub terms: Vec<Term2>,
}

/// A trivariate polynomial in `(r, cos, sin)` as a sparse term list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Poly3 {
    pub terms: Vec<Term3>,
}

fn powi(base: f64, exp: u32) -> f64 {
    // u32 degrees stay well inside i32 range for any real table.
    base.powi(exp as i32)
}

impl Poly1 {
    pub fn new(terms: Vec<Term1>) -> Self {
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.terms
            .iter()
            .map(|term| term.coeff * powi(t, term.exp))
            .sum()
    }
}

impl Poly2 {
    pub fn new(terms: Vec<Term2>) -> Self {
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.terms
            .iter()
            .map(|term| term.coeff * powi(x, term.degx) * powi(y, term.degy))
            .sum()
    }

    /// A single constant term, handy for tests and trivial curves.
    pub fn constant(value: f64) -> Self {
        Self {
            terms: vec![Term2 {
                degx: 0,
                degy: 0,
                coeff: value,
            }],
        }
    }
}

impl Poly3 {
    pub fn new(terms: Vec<Term3>) -> Self {
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates with `co = cos(theta)` and `si = sin(theta)` precomputed by
    /// the caller, matching how cylinder-chart points are stored.
    pub fn eval(&self, r: f64, co: f64, si: f64) -> f64 {
        self.terms
            .iter()
            .map(|term| term.coeff * powi(r, term.degr) * powi(co, term.degc) * powi(si, term.degs))
            .sum()
    }
}

fn fmt_coeff(f: &mut fmt::Formatter<'_>, coeff: f64, first: bool, has_vars: bool) -> fmt::Result {
    if first {
        if coeff < 0.0 {
            write!(f, "-")?;
        }
    } else if coeff < 0.0 {
        write!(f, " - ")?;
    } else {
        write!(f, " + ")?;
    }
    let magnitude = coeff.abs();
    if !has_vars || (magnitude - 1.0).abs() > f64::EPSILON {
        write!(f, "{magnitude}")?;
        if has_vars {
            write!(f, " ")?;
        }
    }
    Ok(())
}

fn fmt_power(f: &mut fmt::Formatter<'_>, name: &str, deg: u32, lead: bool) -> fmt::Result {
    if deg == 0 {
        return Ok(());
    }
    if !lead {
        write!(f, " ")?;
    }
    if deg == 1 {
        write!(f, "{name}")
    } else {
        write!(f, "{name}^{deg}")
    }
}

impl fmt::Display for Poly1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            fmt_coeff(f, term.coeff, i == 0, term.exp > 0)?;
            fmt_power(f, "t", term.exp, true)?;
        }
        Ok(())
    }
}

impl fmt::Display for Poly2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            let has_vars = term.degx > 0 || term.degy > 0;
            fmt_coeff(f, term.coeff, i == 0, has_vars)?;
            fmt_power(f, "x", term.degx, true)?;
            fmt_power(f, "y", term.degy, term.degx == 0)?;
        }
        Ok(())
    }
}

impl fmt::Display for Poly3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            let has_vars = term.degr > 0 || term.degc > 0 || term.degs > 0;
            fmt_coeff(f, term.coeff, i == 0, has_vars)?;
            fmt_power(f, "r", term.degr, true)?;
            fmt_power(f, "cos", term.degc, term.degr == 0)?;
            fmt_power(f, "sin", term.degs, term.degr == 0 && term.degc == 0)?;
        }
        Ok(())
    }
}
