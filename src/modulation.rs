//! Space vector modulation of a stator fixed voltage vector into three
//! center-aligned PWM compare values.
//!
//! Voltages are taken directly in carrier counts: a vector of magnitude `m`
//! asks for `m` counts of active vector time per carrier period.
use libm::roundf;

use crate::transforms::AlphaBeta;
use crate::SQRT_3;

/// PWM compare values per phase, `[0..period]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseDuties {
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

impl PhaseDuties {
    pub fn new(a: u16, b: u16, c: u16) -> Self {
        PhaseDuties { a, b, c }
    }

    /// 50% on every phase, no net voltage across the windings.
    pub fn neutral(period: u16) -> Self {
        let half = period / 2;
        PhaseDuties::new(half, half, half)
    }
}

/// Active and zero vector times within one carrier period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorTiming {
    /// 1..=6, counter-clockwise from the alpha axis
    pub sector: u8,
    pub t1: f32,
    pub t2: f32,
    pub t0: f32,
}

#[derive(Debug, Clone, Copy)]
enum Term {
    X,
    Y,
    Z,
    NegX,
    NegY,
    NegZ,
}

impl Term {
    fn pick(self, x: f32, y: f32, z: f32) -> f32 {
        match self {
            Term::X => x,
            Term::Y => y,
            Term::Z => z,
            Term::NegX => -x,
            Term::NegY => -y,
            Term::NegZ => -z,
        }
    }
}

/// (t1, t2) per sector, t1 being the vector the sector starts at.
const VECTOR_TIMES: [(Term, Term); 6] = [
    (Term::Y, Term::X),
    (Term::NegZ, Term::NegY),
    (Term::X, Term::Z),
    (Term::NegY, Term::NegX),
    (Term::Z, Term::Y),
    (Term::NegX, Term::NegZ),
];

/// Per sector and phase, whether the phase is high during t1 and t2.
// `rustfmt` would spread every row over six lines
#[rustfmt::skip]
const PHASE_ACTIVE: [[(f32, f32); 3]; 6] = [
    [(1., 1.), (0., 1.), (0., 0.)],
    [(1., 0.), (1., 1.), (0., 0.)],
    [(0., 0.), (1., 1.), (0., 1.)],
    [(0., 0.), (1., 0.), (1., 1.)],
    [(0., 1.), (0., 0.), (1., 1.)],
    [(1., 1.), (0., 0.), (1., 0.)],
];

/// Sector of the vector, 1..=6, each covering 60°.
///
/// Sector `n` spans `(60°(n-1), 60°n]`, except sector 1 which also owns 0°.
/// A vector on a boundary belongs to the lower-numbered sector.
pub fn sector(alpha: f32, beta: f32) -> u8 {
    if beta >= 0. {
        if beta <= SQRT_3 * alpha {
            1
        } else if beta >= -SQRT_3 * alpha {
            2
        } else {
            3
        }
    } else if beta >= SQRT_3 * alpha {
        4
    } else if beta <= -SQRT_3 * alpha {
        5
    } else {
        6
    }
}

/// Vector times for `(alpha, beta)` in `sector`, in carrier counts.
///
/// When the vector lies outside the hexagon reachable within one period the
/// active times are scaled down to fill the period exactly and `t0` is zero.
pub fn times(alpha: f32, beta: f32, sector: u8, period: u16) -> SectorTiming {
    let period = f32::from(period);
    let x = beta;
    let y = (SQRT_3 * alpha - beta) / 2.;
    let z = (-SQRT_3 * alpha - beta) / 2.;

    let Some(&(first, second)) = VECTOR_TIMES.get(usize::from(sector).wrapping_sub(1)) else {
        log::error!("Invalid modulation sector: {}", sector);
        return SectorTiming {
            sector,
            t1: 0.,
            t2: 0.,
            t0: period,
        };
    };

    // Rounding can push a time marginally negative on a sector boundary
    let mut t1 = first.pick(x, y, z).max(0.);
    let mut t2 = second.pick(x, y, z).max(0.);
    let mut t0 = period - t1 - t2;

    if t0 < 0. {
        log::warn!("Space vector saturated driver, active time: {}", t1 + t2);
        let scale = period / (t1 + t2);
        t1 *= scale;
        t2 *= scale;
        t0 = 0.;
    }

    SectorTiming { sector, t1, t2, t0 }
}

/// Compare values for the given vector times, centered in the period.
///
/// An invalid sector yields the neutral output.
pub fn duties(timing: SectorTiming, period: u16) -> PhaseDuties {
    let Some(phases) = PHASE_ACTIVE.get(usize::from(timing.sector).wrapping_sub(1)) else {
        log::error!("Invalid modulation sector: {}", timing.sector);
        return PhaseDuties::neutral(period);
    };

    let SectorTiming { t1, t2, t0, .. } = timing;
    let [a, b, c] = (*phases).map(|(k1, k2)| compare((k1 * t1 + k2 * t2 + t0) * 0.5, period));
    PhaseDuties { a, b, c }
}

fn compare(value: f32, period: u16) -> u16 {
    roundf(value.clamp(0., f32::from(period))) as u16
}

/// Implements Space Vector (Pulse-Width) modulation.
pub fn space_vector_modulation(vector: AlphaBeta, period: u16) -> PhaseDuties {
    let AlphaBeta { alpha, beta } = vector;
    let timing = times(alpha, beta, sector(alpha, beta), period);
    log::debug!("Modulating for: {:?}, timing: {:?}", vector, timing);
    duties(timing, period)
}
