use crate::MIN_TIME;

/// Linear ramp between two values over a configurable time.
///
/// The engine uses one of these per voice for portamento: every note-on
/// restarts the ramp from the previous note's frequency to the new note's
/// frequency over the configured glide time, even when the voice is already
/// sounding (legato).
pub struct Ramp {
    sample_rate: f32,
    current: f32,
    target: f32,
    increment: f32,
    remaining_samples: u32,
}

impl Ramp {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            current: 0.0,
            target: 0.0,
            increment: 0.0,
            remaining_samples: 0,
        }
    }

    /// Begin a new ramp from `start` to `end` over `glide_time` seconds.
    ///
    /// A glide time at or below the minimum representable time jumps straight
    /// to the target.
    pub fn set_value_range(&mut self, start: f32, end: f32, glide_time: f32) {
        if glide_time <= MIN_TIME {
            self.set_value(end);
            return;
        }

        let total_samples = (glide_time * self.sample_rate).round().max(1.0);
        self.current = start;
        self.target = end;
        self.increment = (end - start) / total_samples;
        self.remaining_samples = total_samples as u32;
    }

    /// Pin the ramp to a value immediately.
    pub fn set_value(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.remaining_samples = 0;
    }

    /// Current interpolated value; advances one sample.
    pub fn value(&mut self) -> f32 {
        let out = self.current;

        if self.remaining_samples > 0 {
            self.current += self.increment;
            self.remaining_samples -= 1;
            if self.remaining_samples == 0 {
                // Land exactly on the target regardless of rounding drift.
                self.current = self.target;
            }
        }

        out
    }

    pub fn is_done(&self) -> bool {
        self.remaining_samples == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn ramp_reaches_target() {
        let mut ramp = Ramp::new(SAMPLE_RATE);
        ramp.set_value_range(100.0, 200.0, 0.1); // 100 samples

        let first = ramp.value();
        assert!((first - 100.0).abs() < 1e-6);

        for _ in 0..100 {
            ramp.value();
        }

        assert!(ramp.is_done());
        assert!((ramp.value() - 200.0).abs() < 1e-3);
    }

    #[test]
    fn zero_glide_jumps_to_target() {
        let mut ramp = Ramp::new(SAMPLE_RATE);
        ramp.set_value_range(440.0, 880.0, 0.0);

        assert!(ramp.is_done());
        assert!((ramp.value() - 880.0).abs() < 1e-6);
    }

    #[test]
    fn downward_ramp_interpolates() {
        let mut ramp = Ramp::new(SAMPLE_RATE);
        ramp.set_value_range(880.0, 440.0, 0.05); // 50 samples

        for _ in 0..25 {
            ramp.value();
        }
        let midway = ramp.value();
        assert!(midway < 880.0 && midway > 440.0);

        for _ in 0..30 {
            ramp.value();
        }
        assert!((ramp.value() - 440.0).abs() < 1e-3);
    }

    #[test]
    fn retarget_mid_glide_restarts_from_given_start() {
        let mut ramp = Ramp::new(SAMPLE_RATE);
        ramp.set_value_range(100.0, 200.0, 0.1);
        for _ in 0..30 {
            ramp.value();
        }

        // Legato retarget: restart from a caller-chosen start value.
        ramp.set_value_range(150.0, 300.0, 0.02);
        assert!((ramp.value() - 150.0).abs() < 1e-6);
    }
}
