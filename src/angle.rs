//! Position handling for a single absolute rotary sensor.
//!
//! Raw samples are integers cycling through `[0, resolution)`. Successive
//! samples are unwrapped along the shortest path, which is only valid if the
//! rotor turns less than half a revolution between two samples.
use core::f32::consts::TAU;

/// Shortest signed rotation from `old` to `new`, in sensor counts.
///
/// The result lies in `[-resolution / 2, resolution / 2)` and satisfies
/// `old + delta ≡ new (mod resolution)`. Both samples must already be range
/// reduced by the sensor.
pub fn angle_delta(new: u16, old: u16, resolution: u32) -> i32 {
    debug_assert!(u32::from(new) < resolution && u32::from(old) < resolution);
    let half = (resolution / 2) as i32;
    let d = i32::from(new) - i32::from(old);
    if d >= half {
        d - resolution as i32
    } else if d < -half {
        d + resolution as i32
    } else {
        d
    }
}

/// Mechanical angle of a raw sample in radians, `[0, 2PI)`.
pub fn to_radians(raw: u16, resolution: u32) -> f32 {
    f32::from(raw) * TAU / resolution as f32
}

/// Mechanical angle of a raw sample in degrees, `[0, 360)`.
pub fn to_degrees(raw: u16, resolution: u32) -> f32 {
    f32::from(raw) * 360. / resolution as f32
}

/// Electrical angle in radians, `[0, 2PI)`.
///
/// The pole pair scaling is applied in sensor counts before conversion so the
/// result never needs a floating point modulo.
pub fn electrical_angle(raw: u16, resolution: u32, pole_pairs: u32) -> f32 {
    let reduced = (u64::from(raw) * u64::from(pole_pairs)) % u64::from(resolution);
    // `reduced < resolution <= 65536`, it always fits
    to_radians(reduced as u16, resolution)
}

/// Tracks successive raw samples and counts whole revolutions.
///
/// Forward rotation is the direction of increasing raw samples. Wrapping from
/// `resolution - 1` to `0` adds a turn, wrapping from `0` to
/// `resolution - 1` removes one.
#[derive(Debug, Clone, Copy)]
pub struct AngleTracker {
    resolution: u32,
    last: Option<u16>,
    turns: i32,
}

impl AngleTracker {
    pub fn new(resolution: u32) -> Self {
        AngleTracker {
            resolution,
            last: None,
            turns: 0,
        }
    }

    pub fn with_initial(resolution: u32, sample: u16) -> Self {
        AngleTracker {
            last: Some(sample),
            ..AngleTracker::new(resolution)
        }
    }

    /// Feed a new sample, returning the unwrapped delta from the previous one.
    ///
    /// The first sample after construction or [`AngleTracker::reseed`] only
    /// seeds the tracker and yields a delta of zero.
    pub fn update(&mut self, sample: u16) -> i32 {
        let delta = match self.last {
            Some(last) => {
                let raw = i32::from(sample) - i32::from(last);
                let half = (self.resolution / 2) as i32;
                if raw < -half {
                    self.turns += 1;
                    log::debug!("Forward wrap, turns: {}", self.turns);
                } else if raw >= half {
                    self.turns -= 1;
                    log::debug!("Reverse wrap, turns: {}", self.turns);
                }
                angle_delta(sample, last, self.resolution)
            }
            None => 0,
        };
        self.last = Some(sample);
        delta
    }

    /// Forget the last sample, keeping the turn count.
    pub fn reseed(&mut self) {
        self.last = None;
    }

    pub fn turns(&self) -> i32 {
        self.turns
    }

    pub fn last(&self) -> Option<u16> {
        self.last
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Multi-turn position in revolutions.
    pub fn total_revolutions(&self) -> f32 {
        let fraction = self
            .last
            .map(|last| f32::from(last) / self.resolution as f32)
            .unwrap_or(0.);
        self.turns as f32 + fraction
    }
}
