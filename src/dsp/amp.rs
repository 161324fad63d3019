use std::f32::consts::FRAC_PI_2;

/// Amplitude and stereo pan stage.
///
/// One voice owns three of these: a master stage carrying velocity, the
/// envelope-gain input (fed by the always-on modulation route) and the
/// gain-scale/pan modulation inputs, plus one lightweight stage per
/// oscillator that only contributes the stereo-spread pan offsets.
///
/// Pan uses an equal-power law. The gain-scale modulation input is a
/// multiplier around unity, so a negative depth on a tremolo route dips the
/// level below its base.
pub struct AmpStage {
    velocity_gain: f32,
    gain_db: f32,
    pan: f32,
    pan_mod: f32,
    env_gain: f32,
    gain_scale_mod: f32,

    left_gain: f32,
    right_gain: f32,
}

fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

impl AmpStage {
    pub fn new() -> Self {
        let mut amp = Self {
            velocity_gain: 1.0,
            gain_db: 0.0,
            pan: 0.0,
            pan_mod: 0.0,
            env_gain: 1.0,
            gain_scale_mod: 0.0,
            left_gain: 0.0,
            right_gain: 0.0,
        };
        amp.update();
        amp
    }

    /// Clear note-scoped state ahead of a fresh attack.
    pub fn reset(&mut self) {
        self.velocity_gain = 1.0;
        self.env_gain = 0.0;
        self.pan_mod = 0.0;
        self.gain_scale_mod = 0.0;
        self.update();
    }

    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity_gain = velocity.clamp(0.0, 1.0);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_pan_mod(&mut self, amount: f32) {
        self.pan_mod = amount;
    }

    pub fn set_gain_db(&mut self, db: f32) {
        self.gain_db = db.clamp(-96.0, 12.0);
    }

    /// Envelope-gain input, written by the always-on modulation route.
    pub fn set_env_gain(&mut self, gain: f32) {
        self.env_gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_gain_scale_mod(&mut self, amount: f32) {
        self.gain_scale_mod = amount;
    }

    /// Recompute the cached channel gains. Called once per control block.
    pub fn update(&mut self) {
        let pan = (self.pan + self.pan_mod).clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * 0.5 * FRAC_PI_2;

        let total = self.velocity_gain
            * db_to_linear(self.gain_db)
            * self.env_gain
            * (1.0 + self.gain_scale_mod).max(0.0);

        self.left_gain = total * angle.cos();
        self.right_gain = total * angle.sin();
    }

    pub fn process_mono(&self, sample: f32) -> [f32; 2] {
        [sample * self.left_gain, sample * self.right_gain]
    }

    pub fn process_stereo(&self, frame: [f32; 2]) -> [f32; 2] {
        [frame[0] * self.left_gain, frame[1] * self.right_gain]
    }
}

impl Default for AmpStage {
    fn default() -> Self {
        Self::new()
    }
}
