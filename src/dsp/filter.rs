use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type              | passes          | rejects      |
| ----------------- | --------------- | ------------ |
| low-pass          | below cutoff    | above cutoff |
| high-pass         | above cutoff    | below cutoff |
| band-pass         | around cutoff   | outside      |
| notch / band-stop | outside         | around       |

Three algorithms share this response menu: a one-pole (cheap, 6 dB/oct,
band responses approximated), a TPT state-variable filter (the default)
and a four-stage ladder. A voice owns one instance of each and switches
between them with `FilterAlgorithm`; parameters are re-applied by the
engine on every swap.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAlgorithm {
    OnePole,
    StateVariable,
    Ladder,
}

pub const MIN_CUTOFF_HZ: f32 = 20.0;
pub const MAX_CUTOFF_HZ: f32 = 20_000.0;
pub const MAX_Q: f32 = 10.0;

/// Shared parameter block: base values plus matrix-written modulation.
#[derive(Debug, Clone, Copy)]
struct FilterParams {
    filter_type: FilterType,
    frequency: f32,
    frequency_mod: f32, // Hz, from the mod matrix
    q: f32,
    q_mod: f32,
}

impl FilterParams {
    fn new() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            frequency: 20_000.0,
            frequency_mod: 0.0,
            q: 0.0,
            q_mod: 0.0,
        }
    }

    fn cutoff(&self) -> f32 {
        (self.frequency + self.frequency_mod).clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
    }

    fn resonance(&self) -> f32 {
        (self.q + self.q_mod).clamp(0.0, MAX_Q)
    }
}

macro_rules! filter_param_setters {
    () => {
        pub fn set_filter_type(&mut self, filter_type: FilterType) {
            self.params.filter_type = filter_type;
        }

        pub fn set_frequency(&mut self, hz: f32) {
            self.params.frequency = hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        }

        pub fn set_frequency_mod(&mut self, hz: f32) {
            self.params.frequency_mod = hz;
        }

        pub fn set_q(&mut self, q: f32) {
            self.params.q = q.clamp(0.0, MAX_Q);
        }

        pub fn set_q_mod(&mut self, q: f32) {
            self.params.q_mod = q;
        }
    };
}

/// 6 dB/octave one-pole. The band responses collapse to the nearest
/// single-pole shape: band-pass behaves as low-pass, notch as high-pass.
pub struct OnePoleFilter {
    sample_rate: f32,
    params: FilterParams,
    a0: f32,
    b1: f32,
    z1: [f32; 2],
}

impl OnePoleFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            params: FilterParams::new(),
            a0: 1.0,
            b1: 0.0,
            z1: [0.0; 2],
        }
    }

    filter_param_setters!();

    pub fn update(&mut self) {
        self.b1 = (-TAU * self.params.cutoff() / self.sample_rate).exp();
        self.a0 = 1.0 - self.b1;
    }

    pub fn process(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let lp = self.a0 * frame[ch] + self.b1 * self.z1[ch];
            self.z1[ch] = lp;
            out[ch] = match self.params.filter_type {
                FilterType::LowPass | FilterType::BandPass => lp,
                FilterType::HighPass | FilterType::Notch => frame[ch] - lp,
            };
        }
        out
    }

    pub fn reset(&mut self) {
        self.z1 = [0.0; 2];
    }
}

/// Topology-preserving state-variable filter, stereo.
pub struct SvFilter {
    sample_rate: f32,
    params: FilterParams,
    g: f32,
    k: f32,
    h: f32,
    ic1eq: [f32; 2], // First integrator's memory
    ic2eq: [f32; 2], // Second integrator's memory
}

impl SvFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            params: FilterParams::new(),
            g: 0.0,
            k: 2.0,
            h: 1.0,
            ic1eq: [0.0; 2],
            ic2eq: [0.0; 2],
        }
    }

    filter_param_setters!();

    pub fn update(&mut self) {
        // Prewarped integrator gain: g = tan(pi * fc / sr).
        self.g = (TAU * self.params.cutoff() / (2.0 * self.sample_rate)).tan();
        // Map resonance 0..MAX_Q onto damping 2..0.2; k must stay positive
        // or the filter rings forever.
        self.k = (2.0 - 1.8 * (self.params.resonance() / MAX_Q)).max(0.2);
        self.h = 1.0 / (1.0 + self.g * (self.g + self.k));
    }

    pub fn process(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let sample = frame[ch];
            let v3 = sample - self.ic2eq[ch];
            let v1 = self.h * (self.ic1eq[ch] + self.g * v3);
            let v2 = self.ic2eq[ch] + self.g * v1;

            self.ic1eq[ch] = 2.0 * v1 - self.ic1eq[ch];
            self.ic2eq[ch] = 2.0 * v2 - self.ic2eq[ch];

            out[ch] = match self.params.filter_type {
                FilterType::LowPass => v2,
                FilterType::BandPass => v1,
                FilterType::HighPass => sample - self.k * v1 - v2,
                FilterType::Notch => sample - self.k * v1,
            };
        }
        out
    }

    pub fn reset(&mut self) {
        self.ic1eq = [0.0; 2];
        self.ic2eq = [0.0; 2];
    }
}

/// Four cascaded one-pole stages with resonance feedback.
pub struct LadderFilter {
    sample_rate: f32,
    params: FilterParams,
    alpha: f32,
    feedback: f32,
    stages: [[f32; 4]; 2],
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            params: FilterParams::new(),
            alpha: 1.0,
            feedback: 0.0,
            stages: [[0.0; 4]; 2],
        }
    }

    filter_param_setters!();

    pub fn update(&mut self) {
        let g = (TAU * self.params.cutoff() / self.sample_rate).min(1.2);
        self.alpha = g / (1.0 + g);
        // Feedback approaching 4.0 self-oscillates; stop just short.
        self.feedback = 3.8 * (self.params.resonance() / MAX_Q);
    }

    pub fn process(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let s = &mut self.stages[ch];
            let input = frame[ch] - self.feedback * s[3];

            s[0] += self.alpha * (input.tanh() - s[0]);
            s[1] += self.alpha * (s[0] - s[1]);
            s[2] += self.alpha * (s[1] - s[2]);
            s[3] += self.alpha * (s[2] - s[3]);

            out[ch] = match self.params.filter_type {
                FilterType::LowPass => s[3],
                FilterType::HighPass => frame[ch] - s[3],
                FilterType::BandPass => s[1] - s[3],
                FilterType::Notch => frame[ch] - (s[1] - s[3]),
            };
        }
        out
    }

    pub fn reset(&mut self) {
        self.stages = [[0.0; 4]; 2];
    }
}
