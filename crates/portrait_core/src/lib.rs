/// The `portrait_core` crate is the numerical engine behind the phase
/// portrait front-end: it loads the result tables the symbolic stage
/// produces, and turns them into plottable geometry on the compactified
/// plane.
///
/// Key components:
/// - **Charts**: Poincare sphere and weighted Poincare-Lyapunov
///   compactification, per-chart coordinate maps and view projections.
/// - **Tables**: strict readers for the precomputed vector-field, curve,
///   and singularity tables.
/// - **Solvers**: a generic RKF78 embedded stepper with adaptive step
///   control; the orbit integrator drives it chart by chart.
/// - **Tracing**: separatrix seeding and integration (including blow-up
///   chains of degenerate points) and the limit-cycle section scan.
pub mod charts;
pub mod integrator;
pub mod limitcycle;
pub mod orbits;
pub mod poly;
pub mod regions;
pub mod separatrix;
pub mod session;
pub mod singularity;
pub mod solvers;
pub mod study;
pub mod tables;
pub mod traits;
