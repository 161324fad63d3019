use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscillatorWaveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

/// Audio-band oscillator.
///
/// Pitch is assembled from several layered inputs: the base frequency (fed
/// every sample from the voice's portamento ramp), detune in cents, an octave
/// offset, pitch bend in semitones, and a modulation input in semitones
/// written by the mod matrix. `update()` folds all of them into the phase
/// increment once per control block; `generate()` advances one sample.
///
/// The phase-wrap flag from the most recent `generate()` is kept so a second
/// oscillator can be hard-synced to this one.
pub struct Oscillator {
    sample_rate: f32,
    waveform: OscillatorWaveform,
    playing: bool,

    phase: f32,
    phase_inc: f32,
    wrapped: bool,

    frequency: f32, // Base pitch in Hz, pre-modulation
    cents: f32,
    octave: i32,
    pitch_bend: f32,    // Semitones
    frequency_mod: f32, // Semitones, from the mod matrix

    pulse_width: f32,
    pulse_width_mod: f32,
    effective_pulse_width: f32,

    gain: f32,
    gain_mod: f32,
    effective_gain: f32,

    rng: fastrand::Rng,
}

impl Oscillator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            waveform: OscillatorWaveform::Saw,
            playing: false,
            phase: 0.0,
            phase_inc: 0.0,
            wrapped: false,
            frequency: 440.0,
            cents: 0.0,
            octave: 0,
            pitch_bend: 0.0,
            frequency_mod: 0.0,
            pulse_width: 0.5,
            pulse_width_mod: 0.0,
            effective_pulse_width: 0.5,
            gain: 1.0,
            gain_mod: 0.0,
            effective_gain: 1.0,
            rng: fastrand::Rng::with_seed(0x9e37_79b9),
        }
    }

    pub fn start(&mut self) {
        self.phase = 0.0;
        self.wrapped = false;
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Reset the phase without retriggering. Used for hard sync.
    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    /// Whether the last `generate()` wrapped the phase accumulator.
    pub fn wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.waveform = waveform;
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz.max(0.0);
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        self.frequency_mod = semitones;
    }

    pub fn set_cents(&mut self, cents: f32) {
        self.cents = cents.clamp(-1_200.0, 1_200.0);
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.clamp(-4, 4);
    }

    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.pitch_bend = semitones.clamp(-24.0, 24.0);
    }

    pub fn set_pulse_width(&mut self, width: f32) {
        self.pulse_width = width.clamp(0.0, 1.0);
    }

    pub fn set_pulse_width_mod(&mut self, amount: f32) {
        self.pulse_width_mod = amount;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_gain_mod(&mut self, amount: f32) {
        self.gain_mod = amount;
    }

    /// Fold base parameters and modulation inputs into the coefficients used
    /// by `generate()`. Called once per control block.
    pub fn update(&mut self) {
        let semis = self.pitch_bend + self.cents / 100.0 + self.frequency_mod;
        let final_freq = (self.frequency
            * 2.0_f32.powi(self.octave)
            * 2.0_f32.powf(semis / 12.0))
        .clamp(0.0, 20_000.0);

        self.phase_inc = final_freq / self.sample_rate;
        self.effective_pulse_width = (self.pulse_width + self.pulse_width_mod).clamp(0.05, 0.95);
        self.effective_gain = (self.gain + self.gain_mod).clamp(0.0, 2.0);
    }

    /// Produce one sample and advance the phase.
    pub fn generate(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }

        let sample = match self.waveform {
            OscillatorWaveform::Sine => (TAU * self.phase).sin(),
            OscillatorWaveform::Saw => 2.0 * self.phase - 1.0,
            OscillatorWaveform::Square => {
                if self.phase < self.effective_pulse_width {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorWaveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            OscillatorWaveform::Noise => self.rng.f32() * 2.0 - 1.0,
        };

        self.phase += self.phase_inc;
        self.wrapped = self.phase >= 1.0;
        if self.wrapped {
            self.phase -= 1.0;
        }

        sample * self.effective_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn running_osc(waveform: OscillatorWaveform, hz: f32) -> Oscillator {
        let mut osc = Oscillator::new(SAMPLE_RATE);
        osc.set_waveform(waveform);
        osc.set_frequency(hz);
        osc.update();
        osc.start();
        osc
    }

    #[test]
    fn sine_matches_reference() {
        let mut osc = running_osc(OscillatorWaveform::Sine, 440.0);

        for n in 0..64 {
            let expected = (TAU * 440.0 * n as f32 / SAMPLE_RATE).sin();
            let actual = osc.generate();
            assert!(
                (actual - expected).abs() < 1e-4,
                "sample {n}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn stopped_oscillator_is_silent() {
        let mut osc = running_osc(OscillatorWaveform::Saw, 110.0);
        osc.stop();
        for _ in 0..32 {
            assert_eq!(osc.generate(), 0.0);
        }
    }

    #[test]
    fn wrap_flag_fires_once_per_cycle() {
        // 1 kHz at 48 kHz wraps every 48 samples.
        let mut osc = running_osc(OscillatorWaveform::Saw, 1_000.0);

        let wraps = (0..480)
            .filter(|_| {
                osc.generate();
                osc.wrapped()
            })
            .count();
        // Allow one wrap of slack for phase-accumulator rounding.
        assert!((9..=11).contains(&wraps), "expected ~10 wraps, got {wraps}");
    }

    #[test]
    fn frequency_mod_shifts_pitch_by_semitones() {
        let mut osc = running_osc(OscillatorWaveform::Sine, 440.0);
        osc.set_frequency_mod(12.0); // One octave up
        osc.update();

        // Phase increment should now match 880 Hz.
        let expected_inc = 880.0 / SAMPLE_RATE;
        osc.generate();
        let wraps = (0..(SAMPLE_RATE as usize))
            .filter(|_| {
                osc.generate();
                osc.wrapped()
            })
            .count();
        assert!(
            (wraps as f32 - 880.0).abs() < 2.0,
            "expected ~880 wraps, got {wraps} (inc {expected_inc})"
        );
    }

    #[test]
    fn pulse_width_is_clamped() {
        let mut osc = running_osc(OscillatorWaveform::Square, 100.0);
        osc.set_pulse_width(9.0);
        osc.update();

        // Even fully clamped the square must still swing both ways.
        let samples: Vec<f32> = (0..960).map(|_| osc.generate()).collect();
        assert!(samples.iter().any(|&s| s > 0.0));
        assert!(samples.iter().any(|&s| s < 0.0));
    }

    #[test]
    fn noise_stays_in_range() {
        let mut osc = running_osc(OscillatorWaveform::Noise, 440.0);
        for _ in 0..1024 {
            let s = osc.generate();
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
