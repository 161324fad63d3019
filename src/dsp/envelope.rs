use crate::MIN_TIME;

/*
ADSR envelope with the lifecycle the voice pool needs.

Beyond the usual attack/decay/sustain/release ramps there are two exit
paths that exist purely for voice management:

  shutdown   A fast fixed-time fade used when a voice is stolen. The voice
             keeps generating while the envelope drains, then the mixing
             sweep reclaims the slot.

  kill       Immediate, discontinuous stop. Level snaps to zero and the
             envelope reports done on the next query.

The envelope is generated at CONTROL rate, not audio rate: `generate()` is
called once per control block, so `update_rate` passed at construction is
`sample_rate / CONTROL_SAMPLE_PERIOD`.

The modulation instance additionally exposes two source taps for the mod
matrix: the level itself and a "bias" tap centered on the sustain level,
each independently invertible and scaled by a common depth.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
    Shutdown,
    Done,
}

const SHUTDOWN_TIME: f32 = 0.01; // seconds

pub struct Envelope {
    update_rate: f32,

    attack_time: f32,
    decay_time: f32,
    sustain_gain: f32,
    release_time: f32,

    stage: EnvelopeState,
    level: f32,

    // Release/shutdown bookkeeping: snapshot at transition, interpolate to 0.
    fade_start_level: f32,
    fade_total: u32,
    fade_elapsed: u32,

    legato: bool,
    retrigger: bool,

    // Modulation-source shaping
    depth: f32,
    invert: bool,
    bias_invert: bool,
}

impl Envelope {
    pub fn new(update_rate: f32) -> Self {
        Self {
            update_rate,
            attack_time: 0.01,
            decay_time: 0.1,
            sustain_gain: 0.7,
            release_time: 0.3,
            stage: EnvelopeState::Off,
            level: 0.0,
            fade_start_level: 0.0,
            fade_total: 1,
            fade_elapsed: 0,
            legato: false,
            retrigger: false,
            depth: 1.0,
            invert: false,
            bias_invert: false,
        }
    }

    pub fn set_attack_time(&mut self, seconds: f32) {
        self.attack_time = seconds.max(MIN_TIME);
    }

    pub fn set_decay_time(&mut self, seconds: f32) {
        self.decay_time = seconds.max(MIN_TIME);
    }

    pub fn set_sustain_gain(&mut self, gain: f32) {
        self.sustain_gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_release_time(&mut self, seconds: f32) {
        self.release_time = seconds.max(0.0);
    }

    pub fn set_legato(&mut self, on: bool) {
        self.legato = on;
    }

    pub fn set_retrigger(&mut self, on: bool) {
        self.retrigger = on;
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(-1.0, 1.0);
    }

    pub fn set_invert(&mut self, on: bool) {
        self.invert = on;
    }

    pub fn set_bias_invert(&mut self, on: bool) {
        self.bias_invert = on;
    }

    /// Gate high.
    ///
    /// Legato mode leaves a running envelope untouched; retrigger mode ramps
    /// to full from the current level instead of snapping to zero.
    pub fn start(&mut self) {
        let running = !matches!(self.stage, EnvelopeState::Off | EnvelopeState::Done);
        if running && self.legato {
            return;
        }
        if !(running && self.retrigger) {
            self.level = 0.0;
        }
        self.stage = EnvelopeState::Attack;
        self.fade_elapsed = 0;
    }

    /// Gate low: release from the current level. A shutdown in progress
    /// keeps its faster fade.
    pub fn stop(&mut self) {
        if matches!(
            self.stage,
            EnvelopeState::Off | EnvelopeState::Done | EnvelopeState::Shutdown
        ) {
            return;
        }

        if self.release_time <= MIN_TIME {
            self.level = 0.0;
            self.stage = EnvelopeState::Done;
            return;
        }

        self.begin_fade(self.release_time, EnvelopeState::Release);
    }

    /// Fast fade-out used when the voice is stolen.
    pub fn shutdown(&mut self) {
        if matches!(self.stage, EnvelopeState::Off | EnvelopeState::Done) {
            return;
        }
        self.begin_fade(SHUTDOWN_TIME, EnvelopeState::Shutdown);
    }

    /// Immediate, discontinuous stop.
    pub fn kill(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeState::Done;
    }

    fn begin_fade(&mut self, seconds: f32, stage: EnvelopeState) {
        self.fade_start_level = self.level;
        self.fade_total = (seconds * self.update_rate).round().max(1.0) as u32;
        self.fade_elapsed = 0;
        self.stage = stage;
    }

    /// Advance one control block and return the new level.
    pub fn generate(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Off | EnvelopeState::Done => {
                self.level = 0.0;
            }

            EnvelopeState::Attack => {
                self.level += 1.0 / (self.attack_time * self.update_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }

            EnvelopeState::Decay => {
                let drop = (1.0 - self.sustain_gain) / (self.decay_time * self.update_rate);
                self.level -= drop;
                if self.level <= self.sustain_gain {
                    self.level = self.sustain_gain;
                    self.stage = EnvelopeState::Sustain;
                }
            }

            EnvelopeState::Sustain => {
                self.level = self.sustain_gain;
            }

            EnvelopeState::Release | EnvelopeState::Shutdown => {
                self.fade_elapsed = self.fade_elapsed.saturating_add(1);
                let progress = self.fade_elapsed as f32 / self.fade_total as f32;
                self.level = (self.fade_start_level * (1.0 - progress)).max(0.0);
                if self.fade_elapsed >= self.fade_total {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Done;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, EnvelopeState::Off | EnvelopeState::Done)
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }

    /// Primary modulation tap: the level, optionally inverted, scaled by depth.
    pub fn mod_source(&self) -> f32 {
        let value = if self.invert { 1.0 - self.level } else { self.level };
        value * self.depth
    }

    /// Bias tap: level relative to the sustain plateau, so the source is zero
    /// while the envelope sits at sustain.
    pub fn mod_source_bias(&self) -> f32 {
        let bias = self.level - self.sustain_gain;
        let value = if self.bias_invert { -bias } else { bias };
        value * self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One "sample" here is one control block.
    const UPDATE_RATE: f32 = 100.0;

    fn run(env: &mut Envelope, blocks: usize) {
        for _ in 0..blocks {
            env.generate();
        }
    }

    #[test]
    fn attack_reaches_full_level() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_attack_time(0.1); // 10 blocks
        env.start();

        run(&mut env, 10);
        assert!(env.level() > 0.99);
        assert!(!matches!(env.state(), EnvelopeState::Attack));
    }

    #[test]
    fn sustain_holds_target_level() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_attack_time(0.01);
        env.set_decay_time(0.05);
        env.set_sustain_gain(0.6);
        env.start();

        run(&mut env, 40);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((env.level() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn release_falls_back_to_done() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_release_time(0.05);
        env.start();
        run(&mut env, 30);

        env.stop();
        run(&mut env, 6);

        assert!(env.is_done());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn zero_release_is_done_immediately() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_release_time(0.0);
        env.start();
        run(&mut env, 20);

        env.stop();
        assert!(env.is_done());
    }

    #[test]
    fn shutdown_drains_quickly_and_reports_done() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.start();
        run(&mut env, 30);
        assert!(!env.is_done());

        env.shutdown();
        // SHUTDOWN_TIME at this rate rounds to a single block.
        run(&mut env, 2);
        assert!(env.is_done());
    }

    #[test]
    fn kill_is_immediate() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.start();
        run(&mut env, 5);

        env.kill();
        assert!(env.is_done());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn legato_start_does_not_restart() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_legato(true);
        env.set_attack_time(0.05);
        env.start();
        run(&mut env, 20);
        let before = env.level();

        env.start();
        assert_eq!(env.level(), before);
        assert!(!matches!(env.state(), EnvelopeState::Attack) || before < 1.0);
    }

    #[test]
    fn retrigger_ramps_from_current_level() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_retrigger(true);
        env.set_attack_time(0.1);
        env.start();
        run(&mut env, 8);
        let before = env.level();
        assert!(before > 0.0);

        env.start();
        assert_eq!(env.state(), EnvelopeState::Attack);
        assert!((env.level() - before).abs() < 1e-6);
    }

    #[test]
    fn bias_tap_is_zero_at_sustain() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_attack_time(0.01);
        env.set_decay_time(0.01);
        env.set_sustain_gain(0.5);
        env.start();
        run(&mut env, 30);

        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!(env.mod_source_bias().abs() < 1e-6);
        assert!((env.mod_source() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn invert_flips_primary_tap() {
        let mut env = Envelope::new(UPDATE_RATE);
        env.set_invert(true);
        env.set_attack_time(0.01);
        env.start();
        run(&mut env, 5);

        // Level is at full, inverted tap is at zero.
        assert!(env.mod_source().abs() < 1e-6);
    }
}
