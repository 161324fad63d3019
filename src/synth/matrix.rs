#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Shared modulation-routing engine
================================

The engine owns one of these; every voice gets a slot sized at pool
capacity (primary polyphony budget plus the stopping margin). A patch is a
source, an enabled flag and a list of weighted destination cables; patches
are evaluated in two phases per control block:

  phase Envelopes   envelope-sourced patches, applied right after the
                    envelopes generate
  phase Lfos        LFO-sourced patches, applied after both LFOs generate

Destinations are plain enum-indexed accumulators held per voice in
`ModValues` - one bank per phase. An update pass zeroes only its own
phase's bank and re-accumulates it, so the other bank's last values keep
contributing until that phase runs again. That is what makes the
LFO1→LFO2 cross-routes land one control block late: LFO 2 reads its
frequency/gain destinations *before* the LFO phase rewrites them.

Static patches occupy a fixed prefix of each voice's patch list, so their
slots stay valid for the voice's lifetime; dynamic patches append after
the prefix and are discarded by truncating back to it.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModSource {
    AmpEnv,
    ModEnv,
    ModEnvBias,
    Lfo1,
    Lfo2,
}

pub const NUM_MOD_SOURCES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModPhase {
    Envelopes,
    Lfos,
}

pub const NUM_MOD_PHASES: usize = 2;

impl ModSource {
    pub fn phase(self) -> ModPhase {
        match self {
            ModSource::AmpEnv | ModSource::ModEnv | ModSource::ModEnvBias => ModPhase::Envelopes,
            ModSource::Lfo1 | ModSource::Lfo2 => ModPhase::Lfos,
        }
    }
}

/// Where modulation lands. Units are destination-specific: pitch
/// destinations are in semitones, cutoff in Hz, Q in resonance units, pan
/// in [-1, 1], the gain destinations unitless.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModDest {
    Osc1Frequency,
    Osc2Frequency,
    Osc1PulseWidth,
    Osc2PulseWidth,
    FilterCutoff,
    FilterQ,
    Lfo1Frequency,
    Lfo2Frequency,
    Lfo1Gain,
    Lfo2Gain,
    AmpEnvGain,
    AmpGainScale,
    AmpPan,
}

pub const NUM_MOD_DESTS: usize = 13;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy)]
pub struct PatchCable {
    pub dest: ModDest,
    pub depth: f32,
}

impl PatchCable {
    pub fn new(dest: ModDest, depth: f32) -> Self {
        Self { dest, depth }
    }
}

#[derive(Debug, Clone)]
pub struct Patch {
    pub source: ModSource,
    pub cables: Vec<PatchCable>,
    pub enabled: bool,
}

impl Patch {
    pub fn new(source: ModSource, cables: Vec<PatchCable>, enabled: bool) -> Self {
        Self {
            source,
            cables,
            enabled,
        }
    }
}

/// Index of a patch within one voice's patch list.
pub type PatchSlot = usize;

/// Per-voice source readings and destination accumulators.
pub struct ModValues {
    sources: [f32; NUM_MOD_SOURCES],
    dests: [[f32; NUM_MOD_DESTS]; NUM_MOD_PHASES],
}

impl ModValues {
    pub fn new() -> Self {
        Self {
            sources: [0.0; NUM_MOD_SOURCES],
            dests: [[0.0; NUM_MOD_DESTS]; NUM_MOD_PHASES],
        }
    }

    pub fn set_source(&mut self, source: ModSource, value: f32) {
        self.sources[source as usize] = value;
    }

    pub fn source(&self, source: ModSource) -> f32 {
        self.sources[source as usize]
    }

    /// Consumed value of a destination: the sum of both phase banks.
    pub fn total(&self, dest: ModDest) -> f32 {
        self.dests[0][dest as usize] + self.dests[1][dest as usize]
    }

    pub fn clear(&mut self) {
        self.sources = [0.0; NUM_MOD_SOURCES];
        self.dests = [[0.0; NUM_MOD_DESTS]; NUM_MOD_PHASES];
    }

    fn clear_phase(&mut self, phase: ModPhase) {
        self.dests[phase as usize] = [0.0; NUM_MOD_DESTS];
    }

    fn accumulate(&mut self, phase: ModPhase, dest: ModDest, amount: f32) {
        self.dests[phase as usize][dest as usize] += amount;
    }
}

impl Default for ModValues {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ModMatrix {
    voices: Vec<Vec<Patch>>,
}

impl ModMatrix {
    /// `capacity` is the pool capacity: primary budget + stopping margin.
    pub fn new(capacity: usize) -> Self {
        Self {
            voices: (0..capacity).map(|_| Vec::new()).collect(),
        }
    }

    pub fn add_patch(&mut self, voice: usize, patch: Patch) -> PatchSlot {
        let list = &mut self.voices[voice];
        list.push(patch);
        list.len() - 1
    }

    pub fn set_enabled(&mut self, voice: usize, slot: PatchSlot, enabled: bool) {
        if let Some(patch) = self.voices[voice].get_mut(slot) {
            patch.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, voice: usize, slot: PatchSlot) -> bool {
        self.voices[voice]
            .get(slot)
            .map(|p| p.enabled)
            .unwrap_or(false)
    }

    pub fn patch_count(&self, voice: usize) -> usize {
        self.voices[voice].len()
    }

    /// Drop every patch past `keep` - used to discard a voice's dynamic tail.
    pub fn truncate(&mut self, voice: usize, keep: usize) {
        self.voices[voice].truncate(keep);
    }

    /// Evaluate all enabled patches of `phase` for one voice: zero that
    /// phase's destination bank, then accumulate source × depth per cable.
    pub fn update(&self, voice: usize, phase: ModPhase, values: &mut ModValues) {
        values.clear_phase(phase);

        for patch in &self.voices[voice] {
            if !patch.enabled || patch.source.phase() != phase {
                continue;
            }
            let source_value = values.source(patch.source);
            for cable in &patch.cables {
                values.accumulate(phase, cable.dest, source_value * cable.depth);
            }
        }
    }
}
