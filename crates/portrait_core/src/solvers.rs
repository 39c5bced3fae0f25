use crate::traits::{PlanarSystem, Scalar};

/// Runge-Kutta-Fehlberg 7(8) embedded pair (NASA TR R-287), 13 stages.
///
/// The propagated solution is the 8th-order one; the 7th/8th difference term
/// gives the local error estimate. The systems integrated here are
/// autonomous, so the stage abscissae never enter the right-hand side.
pub struct Rkf78<T: Scalar> {
    k: [(T, T); 13],
}

/// Lower-triangular stage coefficients a[i][j] of the Fehlberg 7(8) tableau.
const RKF78_A: [[f64; 12]; 13] = [
    [0.0; 12],
    [
        2.0 / 27.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 36.0,
        1.0 / 12.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 24.0,
        0.0,
        1.0 / 8.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        5.0 / 12.0,
        0.0,
        -25.0 / 16.0,
        25.0 / 16.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        1.0 / 20.0,
        0.0,
        0.0,
        1.0 / 4.0,
        1.0 / 5.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -25.0 / 108.0,
        0.0,
        0.0,
        125.0 / 108.0,
        -65.0 / 27.0,
        125.0 / 54.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        31.0 / 300.0,
        0.0,
        0.0,
        0.0,
        61.0 / 225.0,
        -2.0 / 9.0,
        13.0 / 900.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2.0,
        0.0,
        0.0,
        -53.0 / 6.0,
        704.0 / 45.0,
        -107.0 / 9.0,
        67.0 / 90.0,
        3.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

/// 8th-order solution weights b[i] (stages 6..=9 and 12..=13 carry weight).
const RKF78_B8: [f64; 13] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

const RKF78_ERR_WEIGHT: f64 = 41.0 / 840.0;

impl<T: Scalar> Rkf78<T> {
    pub fn new() -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self { k: [(z, z); 13] }
    }

    /// Takes one embedded step of size `h` from `(x, y)`.
    /// Returns the 8th-order solution and the local error estimate.
    pub fn step(
        &mut self,
        system: &impl PlanarSystem<T>,
        x: T,
        y: T,
        h: T,
    ) -> ((T, T), T) {
        self.k[0] = system.apply(x, y);
        for stage in 1..13 {
            let mut ax = T::from_f64(0.0).unwrap();
            let mut ay = ax;
            for (j, k) in self.k.iter().enumerate().take(stage) {
                let a = RKF78_A[stage][j];
                if a != 0.0 {
                    let a = T::from_f64(a).unwrap();
                    ax = ax + a * k.0;
                    ay = ay + a * k.1;
                }
            }
            self.k[stage] = system.apply(x + h * ax, y + h * ay);
        }

        let mut sx = T::from_f64(0.0).unwrap();
        let mut sy = sx;
        for (i, k) in self.k.iter().enumerate() {
            let b = RKF78_B8[i];
            if b != 0.0 {
                let b = T::from_f64(b).unwrap();
                sx = sx + b * k.0;
                sy = sy + b * k.1;
            }
        }
        let next = (x + h * sx, y + h * sy);

        // err = |h| * 41/840 * ||k1 + k11 - k12 - k13||
        let ex = self.k[0].0 + self.k[10].0 - self.k[11].0 - self.k[12].0;
        let ey = self.k[0].1 + self.k[10].1 - self.k[11].1 - self.k[12].1;
        let w = T::from_f64(RKF78_ERR_WEIGHT).unwrap();
        let err = h.abs() * w * (ex * ex + ey * ey).sqrt();

        (next, err)
    }
}

impl<T: Scalar> Default for Rkf78<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one adaptive step.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveStep<T> {
    pub x: T,
    pub y: T,
    /// Step size actually taken (signed).
    pub h_used: T,
    /// Suggested step size for the next call (signed, clamped to the limits).
    pub h_next: T,
}

const STEP_SAFETY: f64 = 0.9;
const STEP_SHRINK_MIN: f64 = 0.125;
const STEP_GROW_MAX: f64 = 4.0;

/// Advances `(x, y)` by one accepted step, shrinking `h` until the embedded
/// error estimate drops below `tolerance` or `|h|` reaches `h_floor`. A step
/// at the floor is accepted regardless of its estimate, which is how the
/// integration limps across near-singular stretches instead of stalling.
pub fn adaptive_step<T: Scalar>(
    solver: &mut Rkf78<T>,
    system: &impl PlanarSystem<T>,
    x: T,
    y: T,
    h: T,
    h_floor: T,
    h_max: T,
    tolerance: T,
) -> AdaptiveStep<T> {
    let safety = T::from_f64(STEP_SAFETY).unwrap();
    let shrink_min = T::from_f64(STEP_SHRINK_MIN).unwrap();
    let grow_max = T::from_f64(STEP_GROW_MAX).unwrap();
    let eighth = T::from_f64(1.0 / 8.0).unwrap();

    let dir = if h < T::from_f64(0.0).unwrap() {
        T::from_f64(-1.0).unwrap()
    } else {
        T::from_f64(1.0).unwrap()
    };
    let mut mag = h.abs().min(h_max).max(h_floor);

    loop {
        let ((nx, ny), err) = solver.step(system, x, y, dir * mag);

        let factor = if err > T::from_f64(0.0).unwrap() {
            (safety * (tolerance / err).powf(eighth))
                .max(shrink_min)
                .min(grow_max)
        } else {
            grow_max
        };

        if err <= tolerance || mag <= h_floor {
            let next_mag = (mag * factor).min(h_max).max(h_floor);
            return AdaptiveStep {
                x: nx,
                y: ny,
                h_used: dir * mag,
                h_next: dir * next_mag,
            };
        }
        mag = (mag * factor).max(h_floor);
    }
}
