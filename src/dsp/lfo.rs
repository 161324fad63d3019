use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Control-rate low frequency oscillator.

Unlike the audio oscillator this advances once per control block, not once
per sample, so its phase increment is computed against the control rate
(`sample_rate / CONTROL_SAMPLE_PERIOD`). The modulation matrix reads the
unipolar `mod_source_normal_phase` tap; route depths decide sign and scale
per destination.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoWaveform {
    Sine,
    UpSaw,
    DownSaw,
    Square,
    Triangle,
    SampleHold,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoMode {
    /// Phase resets on every start.
    Sync,
    /// One cycle, then hold the final value.
    OneShot,
    /// Runs continuously; start does not reset phase.
    Free,
}

pub const MAX_LFO_FREQUENCY_HZ: f32 = 20.0;

pub struct Lfo {
    control_rate: f32,
    waveform: LfoWaveform,
    mode: LfoMode,
    running: bool,

    phase: f32,
    phase_inc: f32,
    cycled: bool, // OneShot: completed its single cycle

    frequency: f32,
    frequency_mod: f32, // Hz, from the mod matrix
    gain: f32,
    gain_mod: f32,
    effective_gain: f32,
    pulse_width: f32,

    held_sample: f32, // SampleHold state
    output: f32,
    rng: fastrand::Rng,
}

impl Lfo {
    pub fn new(control_rate: f32) -> Self {
        Self {
            control_rate,
            waveform: LfoWaveform::Sine,
            mode: LfoMode::Sync,
            running: false,
            phase: 0.0,
            phase_inc: 0.0,
            cycled: false,
            frequency: 1.0,
            frequency_mod: 0.0,
            gain: 1.0,
            gain_mod: 0.0,
            effective_gain: 1.0,
            pulse_width: 0.5,
            held_sample: 0.0,
            output: 0.0,
            rng: fastrand::Rng::with_seed(0x5_f0f0),
        }
    }

    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    pub fn set_mode(&mut self, mode: LfoMode) {
        self.mode = mode;
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz.clamp(0.01, MAX_LFO_FREQUENCY_HZ);
    }

    pub fn set_frequency_mod(&mut self, hz: f32) {
        self.frequency_mod = hz;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_gain_mod(&mut self, amount: f32) {
        self.gain_mod = amount;
    }

    pub fn set_pulse_width(&mut self, width: f32) {
        self.pulse_width = width.clamp(0.0, 1.0);
    }

    pub fn start(&mut self) {
        if !matches!(self.mode, LfoMode::Free) {
            self.phase = 0.0;
        }
        self.cycled = false;
        self.held_sample = self.rng.f32() * 2.0 - 1.0;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.output = 0.0;
    }

    /// Fold modulation inputs into the coefficients for the next `generate()`.
    pub fn update(&mut self) {
        let hz = (self.frequency + self.frequency_mod).clamp(0.0, MAX_LFO_FREQUENCY_HZ);
        self.phase_inc = hz / self.control_rate;
        self.effective_gain = (self.gain + self.gain_mod).clamp(0.0, 1.0);
    }

    /// Advance one control block; returns the bipolar, gain-scaled output.
    pub fn generate(&mut self) -> f32 {
        if !self.running {
            return 0.0;
        }

        let raw = match self.waveform {
            LfoWaveform::Sine => (TAU * self.phase).sin(),
            LfoWaveform::UpSaw => 2.0 * self.phase - 1.0,
            LfoWaveform::DownSaw => 1.0 - 2.0 * self.phase,
            LfoWaveform::Square => {
                if self.phase < self.pulse_width {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            LfoWaveform::SampleHold => self.held_sample,
        };

        if !(matches!(self.mode, LfoMode::OneShot) && self.cycled) {
            self.phase += self.phase_inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.cycled = true;
                self.held_sample = self.rng.f32() * 2.0 - 1.0;
            }
        }

        self.output = raw * self.effective_gain;
        self.output
    }

    /// Unipolar tap read by the modulation matrix.
    pub fn mod_source_normal_phase(&self) -> f32 {
        self.output * 0.5 + 0.5 * self.effective_gain
    }
}
