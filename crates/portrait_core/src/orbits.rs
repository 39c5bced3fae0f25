//! Plot-point records and orbit anchors.
//!
//! The engine never touches pixels: everything it hands to the drawing layer
//! is an ordered sequence of [`OrbitPoint`] records in compactified sphere
//! coordinates. Sequences are append-only; "continue" operations extend
//! them, and they are cleared wholesale when the tracing radius changes.

use crate::charts::SpherePoint;
use serde::{Deserialize, Serialize};

/// Stability classification of a separatrix, also used to tag orbit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SepType {
    Stable,
    Unstable,
    CenterStable,
    CenterUnstable,
}

impl SepType {
    /// Tag as written in the result tables.
    pub fn from_code(code: i32) -> Option<SepType> {
        match code {
            -1 => Some(SepType::Stable),
            1 => Some(SepType::Unstable),
            0 => Some(SepType::CenterStable),
            2 => Some(SepType::CenterUnstable),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SepType::Stable => -1,
            SepType::Unstable => 1,
            SepType::CenterStable => 0,
            SepType::CenterUnstable => 2,
        }
    }

    /// Stable <-> unstable, center-stable <-> center-unstable.
    pub fn opposite(self) -> SepType {
        match self {
            SepType::Stable => SepType::Unstable,
            SepType::Unstable => SepType::Stable,
            SepType::CenterStable => SepType::CenterUnstable,
            SepType::CenterUnstable => SepType::CenterStable,
        }
    }
}

/// Color/classification tag attached to each plot point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointColor {
    Orbit,
    StableSep,
    UnstableSep,
    CenterStableSep,
    CenterUnstableSep,
    LimitCycle,
    /// Arc lying in the shaded region (negative GCF sign).
    Background,
}

impl PointColor {
    pub fn for_sep(sep_type: SepType) -> PointColor {
        match sep_type {
            SepType::Stable => PointColor::StableSep,
            SepType::Unstable => PointColor::UnstableSep,
            SepType::CenterStable => PointColor::CenterStableSep,
            SepType::CenterUnstable => PointColor::CenterUnstableSep,
        }
    }
}

/// One record of a plotted trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrbitPoint {
    /// Compactified sphere coordinates (see [`SpherePoint`]).
    pub pos: SpherePoint,
    pub color: PointColor,
    /// Drawn dashed when the point lies in a shaded (negative-GCF) region or
    /// the plot style asks for dashes.
    pub dashed: bool,
    /// Integration direction the point was produced with (+1 / -1).
    pub direction: i8,
    /// Stability classification carried along the trajectory.
    pub sep_type: SepType,
}

/// A user-started orbit together with its accumulated points and the state
/// needed to resume integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orbit {
    /// Starting point, compactified.
    pub start: SpherePoint,
    /// Current endpoint of the integration (resume position).
    pub current: SpherePoint,
    /// Signed step size to resume with.
    pub current_h: f64,
    pub direction: i8,
    pub points: Vec<OrbitPoint>,
}

impl Orbit {
    pub fn new(start: SpherePoint, h: f64, direction: i8) -> Self {
        Self {
            start,
            current: start,
            current_h: h,
            direction,
            points: Vec::new(),
        }
    }
}
