//! Speed estimation from unwrapped position deltas.

const MICROS_PER_MINUTE: f32 = 60_000_000.;

/// Angular speed in revolutions per minute.
///
/// `delta` is the unwrapped rotation in sensor counts over `dt_us`
/// microseconds, as returned by [`crate::angle::AngleTracker::update`]. The
/// sign follows `delta`, so positive is forward rotation. A zero interval
/// yields zero rather than dividing by it.
pub fn speed_rpm(delta: i32, dt_us: u32, resolution: u32) -> f32 {
    if dt_us == 0 {
        return 0.;
    }
    // Floating point keeps sub-count resolution at low speeds
    delta as f32 * MICROS_PER_MINUTE / (resolution as f32 * dt_us as f32)
}
