use std::f32::consts::{FRAC_PI_2, TAU};

use crate::dsp::delay::DelayLine;

/*
Stereo chorus
=============

Thickens the summed voice output by mixing it with short, pitch-modulated
delayed copies of itself. Each channel has its own delay line; the two
modulating LFOs run in quadrature (90 degrees apart) so left and right
detune differently and the image widens.

Runs first in the engine's post chain, before the stereo delay.
*/

pub struct Chorus {
    sample_rate: f32,
    left: DelayLine,
    right: DelayLine,
    lfo_phase: f32,
    rate: f32,     // LFO Hz
    depth_ms: f32, // Modulation depth in ms
    mix: f32,      // Dry/wet
    base_delay_ms: f32,
}

impl Chorus {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            left: DelayLine::new(),
            right: DelayLine::new(),
            lfo_phase: 0.0,
            rate: 0.8,
            depth_ms: 2.0,
            mix: 0.4,
            base_delay_ms: 20.0, // Classic chorus base delay
        }
    }

    pub fn set_rate(&mut self, hz: f32) {
        self.rate = hz.clamp(0.1, 10.0);
    }

    pub fn set_depth_ms(&mut self, ms: f32) {
        self.depth_ms = ms.clamp(0.5, 10.0);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_base_delay_ms(&mut self, ms: f32) {
        self.base_delay_ms = ms.clamp(5.0, 50.0);
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.lfo_phase = 0.0;
    }

    pub fn process(&mut self, in_left: f32, in_right: f32) -> (f32, f32) {
        let ms_to_samples = self.sample_rate / 1_000.0;

        let lfo_l = self.lfo_phase.sin();
        let lfo_r = (self.lfo_phase + FRAC_PI_2).sin();

        let delay_l = (self.base_delay_ms + lfo_l * self.depth_ms) * ms_to_samples;
        let delay_r = (self.base_delay_ms + lfo_r * self.depth_ms) * ms_to_samples;

        let wet_l = self.left.read_interpolated(delay_l.max(1.0));
        let wet_r = self.right.read_interpolated(delay_r.max(1.0));

        self.left.write(in_left);
        self.right.write(in_right);

        self.lfo_phase += TAU * self.rate / self.sample_rate;
        if self.lfo_phase >= TAU {
            self.lfo_phase -= TAU;
        }

        let dry = 1.0 - self.mix;
        (
            in_left * dry + wet_l * self.mix,
            in_right * dry + wet_r * self.mix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn dry_mix_preserves_signal() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_mix(0.0);

        for n in 0..256 {
            let x = (n as f32 * 0.1).sin();
            let (l, r) = chorus.process(x, x);
            assert!((l - x).abs() < 1e-6);
            assert!((r - x).abs() < 1e-6);
        }
    }

    #[test]
    fn wet_output_stays_bounded() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_mix(0.5);
        chorus.set_depth_ms(5.0);
        chorus.set_rate(2.0);

        for n in 0..4096 {
            let x = (n as f32 * 0.05).sin();
            let (l, r) = chorus.process(x, x);
            assert!(l.is_finite() && r.is_finite());
            assert!(l.abs() < 2.0 && r.abs() < 2.0);
        }
    }

    #[test]
    fn channels_decorrelate_with_full_wet() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_mix(1.0);

        let mut diverged = false;
        for n in 0..8192 {
            let x = (n as f32 * 0.2).sin();
            let (l, r) = chorus.process(x, x);
            if (l - r).abs() > 1e-3 {
                diverged = true;
            }
        }
        assert!(diverged, "quadrature LFOs should decorrelate the channels");
    }
}
