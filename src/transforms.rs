//! Clarke and Park transforms between the phase, stator fixed and rotor
//! fixed reference frames.
use core::f32::consts::PI;

use libm::{cosf, sinf};

use crate::FRAC_1_SQRT_3;

/// Volts per phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseVoltages {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl PhaseVoltages {
    /// Balanced three-phase set of amplitude `magnitude` at electrical angle
    /// `theta`, phase A leading.
    pub fn synthesize(magnitude: f32, theta: f32) -> Self {
        PhaseVoltages {
            a: magnitude * cosf(theta),
            b: magnitude * cosf(theta - 2. * PI / 3.),
            c: magnitude * cosf(theta + 2. * PI / 3.),
        }
    }
}

/// Stator fixed frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlphaBeta {
    pub alpha: f32,
    pub beta: f32,
}

/// Rotor fixed frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectQuadrature {
    pub d: f32,
    pub q: f32,
}

/// Clarke transform, three phases to the stator fixed frame.
///
/// Uses the two-input form, which assumes a balanced set (`a + b + c = 0`):
/// phase C is implied by A and B and does not enter the result.
pub fn clarke(phases: PhaseVoltages) -> AlphaBeta {
    AlphaBeta {
        alpha: phases.a,
        beta: FRAC_1_SQRT_3 * (phases.a + 2. * phases.b),
    }
}

/// Park transform, stator fixed frame to the frame rotated by `theta`.
pub fn park(value: AlphaBeta, theta: f32) -> DirectQuadrature {
    let (sin, cos) = (sinf(theta), cosf(theta));
    DirectQuadrature {
        d: value.alpha * cos + value.beta * sin,
        q: -value.alpha * sin + value.beta * cos,
    }
}

/// Inverse Park transform, rotor frame at `theta` back to stator fixed.
pub fn inverse_park(value: DirectQuadrature, theta: f32) -> AlphaBeta {
    let (sin, cos) = (sinf(theta), cosf(theta));
    AlphaBeta {
        alpha: value.d * cos - value.q * sin,
        beta: value.d * sin + value.q * cos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::TAU;
    use libm::fabsf;

    #[track_caller]
    fn assert_close(a: f32, b: f32, tolerance: f32) {
        assert!(fabsf(a - b) < tolerance, "{} != {}", a, b);
    }

    #[test]
    fn synthesized_phases_are_balanced() {
        for step in 0..64 {
            let theta = TAU * step as f32 / 64.;
            let phases = PhaseVoltages::synthesize(6., theta);
            assert_close(phases.a + phases.b + phases.c, 0., 1E-5);
        }
    }

    #[test]
    fn clarke_of_balanced_set_is_a_rotating_vector() {
        for step in 0..64 {
            let theta = TAU * step as f32 / 64.;
            let stationary = clarke(PhaseVoltages::synthesize(6., theta));
            assert_close(stationary.alpha, 6. * cosf(theta), 1E-4);
            assert_close(stationary.beta, 6. * sinf(theta), 1E-4);
        }
    }

    #[test]
    fn clarke_ignores_phase_c() {
        let with = clarke(PhaseVoltages { a: 1., b: 2., c: -3. });
        let without = clarke(PhaseVoltages { a: 1., b: 2., c: 100. });
        assert_eq!(with, without);
    }

    #[test]
    fn park_aligned_vector_is_pure_d() {
        let theta = 0.82;
        let dq = park(
            AlphaBeta {
                alpha: 2. * cosf(theta),
                beta: 2. * sinf(theta),
            },
            theta,
        );
        assert_close(dq.d, 2., 1E-5);
        assert_close(dq.q, 0., 1E-5);
    }

    #[test]
    fn park_round_trip() {
        let input = AlphaBeta {
            alpha: 2.,
            beta: -3.,
        };
        for step in 0..32 {
            let theta = TAU * step as f32 / 32. - PI;
            let result = inverse_park(park(input, theta), theta);
            assert_close(result.alpha, input.alpha, 1E-4);
            assert_close(result.beta, input.beta, 1E-4);
        }
    }
}
