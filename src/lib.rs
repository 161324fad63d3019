pub mod dsp;
pub mod synth; // Voice management, modulation routing, polyphony

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Samples between control-rate updates (envelopes, LFOs, mod matrix).
/// Must stay a power of two: voices wrap their control counter with a
/// bitmask, not a modulo.
pub const CONTROL_SAMPLE_PERIOD: u32 = 256;

pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
