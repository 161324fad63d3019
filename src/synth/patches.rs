#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::synth::matrix::{ModDest, ModMatrix, ModSource, Patch, PatchCable, PatchSlot};

/*
Per-voice patch table
=====================

Every voice wires the same fixed menu of modulation routes into the shared
matrix at construction time:

  - one patch per `EnvRoute`, sourced from the mod envelope, and a parallel
    family sourced from its bias tap - all initially disabled;
  - one patch per `LfoRoute` per LFO - all initially disabled. Only LFO 1
    carries the two cross-routes into LFO 2's frequency and gain;
  - the always-on amp route (amp envelope → amp envelope-gain input).

Selection is one-hot per family: enabling a member first disables every
sibling, so at most one env route, one env-bias route and one route per
LFO are live at a time.

Dynamic patches append after the static prefix under pool-generated,
process-wide ids and are mirrored identically into every voice by the
engine.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoRoute {
    Gain,
    Pitch,
    PulseWidth,
    Cutoff,
    Resonance,
    Pan,
    /// Cross-route to LFO 2's frequency. Available on LFO 1 only.
    Lfo2Frequency,
    /// Cross-route to LFO 2's gain. Available on LFO 1 only.
    Lfo2Gain,
}

pub const NUM_LFO_ROUTES: usize = 8;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvRoute {
    Pitch,
    Cutoff,
    Resonance,
    /// Both LFOs' gains.
    LfoGain,
    /// Both LFOs' frequencies.
    LfoFrequency,
}

pub const NUM_ENV_ROUTES: usize = 5;

pub const NUM_LFOS: usize = 2;

/// Process-wide dynamic patch id, generated by the engine.
pub type PatchId = u32;

// Default route depths, in destination units.
const ENV_PITCH_SEMIS: f32 = 12.0;
const ENV_CUTOFF_HZ: f32 = 5_000.0;
const ENV_Q: f32 = 5.0;
const ENV_LFO_GAIN: f32 = 1.0;
const ENV_LFO_FREQ_HZ: f32 = 5.0;

const LFO_GAIN_SCALE: f32 = -1.0; // Tremolo dips below unity
const LFO_PITCH_SEMIS: f32 = 0.5;
const LFO_PULSE_WIDTH: f32 = 0.4;
const LFO_CUTOFF_HZ: f32 = 2_000.0;
const LFO_Q: f32 = 4.0;
const LFO_PAN: f32 = 1.0;
const LFO_CROSS_FREQ_HZ: f32 = 5.0;
const LFO_CROSS_GAIN: f32 = 1.0;

pub struct PatchTable {
    voice: usize,
    env_slots: [PatchSlot; NUM_ENV_ROUTES],
    env_bias_slots: [PatchSlot; NUM_ENV_ROUTES],
    lfo_slots: [[Option<PatchSlot>; NUM_LFO_ROUTES]; NUM_LFOS],
    static_count: usize,
    dynamic: Vec<(PatchId, PatchSlot)>,
}

fn env_cables(route: EnvRoute) -> Vec<PatchCable> {
    match route {
        EnvRoute::Pitch => vec![
            PatchCable::new(ModDest::Osc1Frequency, ENV_PITCH_SEMIS),
            PatchCable::new(ModDest::Osc2Frequency, ENV_PITCH_SEMIS),
        ],
        EnvRoute::Cutoff => vec![PatchCable::new(ModDest::FilterCutoff, ENV_CUTOFF_HZ)],
        EnvRoute::Resonance => vec![PatchCable::new(ModDest::FilterQ, ENV_Q)],
        EnvRoute::LfoGain => vec![
            PatchCable::new(ModDest::Lfo1Gain, ENV_LFO_GAIN),
            PatchCable::new(ModDest::Lfo2Gain, ENV_LFO_GAIN),
        ],
        EnvRoute::LfoFrequency => vec![
            PatchCable::new(ModDest::Lfo1Frequency, ENV_LFO_FREQ_HZ),
            PatchCable::new(ModDest::Lfo2Frequency, ENV_LFO_FREQ_HZ),
        ],
    }
}

fn lfo_cables(route: LfoRoute) -> Vec<PatchCable> {
    match route {
        LfoRoute::Gain => vec![PatchCable::new(ModDest::AmpGainScale, LFO_GAIN_SCALE)],
        LfoRoute::Pitch => vec![
            PatchCable::new(ModDest::Osc1Frequency, LFO_PITCH_SEMIS),
            PatchCable::new(ModDest::Osc2Frequency, LFO_PITCH_SEMIS),
        ],
        LfoRoute::PulseWidth => vec![
            PatchCable::new(ModDest::Osc1PulseWidth, LFO_PULSE_WIDTH),
            PatchCable::new(ModDest::Osc2PulseWidth, LFO_PULSE_WIDTH),
        ],
        LfoRoute::Cutoff => vec![PatchCable::new(ModDest::FilterCutoff, LFO_CUTOFF_HZ)],
        LfoRoute::Resonance => vec![PatchCable::new(ModDest::FilterQ, LFO_Q)],
        LfoRoute::Pan => vec![PatchCable::new(ModDest::AmpPan, LFO_PAN)],
        LfoRoute::Lfo2Frequency => vec![PatchCable::new(ModDest::Lfo2Frequency, LFO_CROSS_FREQ_HZ)],
        LfoRoute::Lfo2Gain => vec![PatchCable::new(ModDest::Lfo2Gain, LFO_CROSS_GAIN)],
    }
}

const ALL_LFO_ROUTES: [LfoRoute; NUM_LFO_ROUTES] = [
    LfoRoute::Gain,
    LfoRoute::Pitch,
    LfoRoute::PulseWidth,
    LfoRoute::Cutoff,
    LfoRoute::Resonance,
    LfoRoute::Pan,
    LfoRoute::Lfo2Frequency,
    LfoRoute::Lfo2Gain,
];

const ALL_ENV_ROUTES: [EnvRoute; NUM_ENV_ROUTES] = [
    EnvRoute::Pitch,
    EnvRoute::Cutoff,
    EnvRoute::Resonance,
    EnvRoute::LfoGain,
    EnvRoute::LfoFrequency,
];

impl PatchTable {
    /// Wire the full static route menu for one voice into the matrix.
    pub fn new(voice: usize, matrix: &mut ModMatrix) -> Self {
        let mut env_slots = [0; NUM_ENV_ROUTES];
        let mut env_bias_slots = [0; NUM_ENV_ROUTES];
        let mut lfo_slots = [[None; NUM_LFO_ROUTES]; NUM_LFOS];

        for (i, route) in ALL_ENV_ROUTES.iter().enumerate() {
            env_slots[i] = matrix.add_patch(
                voice,
                Patch::new(ModSource::ModEnv, env_cables(*route), false),
            );
        }
        for (i, route) in ALL_ENV_ROUTES.iter().enumerate() {
            env_bias_slots[i] = matrix.add_patch(
                voice,
                Patch::new(ModSource::ModEnvBias, env_cables(*route), false),
            );
        }

        for lfo in 0..NUM_LFOS {
            let source = if lfo == 0 { ModSource::Lfo1 } else { ModSource::Lfo2 };
            for (i, route) in ALL_LFO_ROUTES.iter().enumerate() {
                let is_cross = matches!(route, LfoRoute::Lfo2Frequency | LfoRoute::Lfo2Gain);
                if is_cross && lfo != 0 {
                    continue; // Cross-routes exist on LFO 1 only
                }
                lfo_slots[lfo][i] = Some(matrix.add_patch(
                    voice,
                    Patch::new(source, lfo_cables(*route), false),
                ));
            }
        }

        // Always-on: amp envelope drives the amp stage's envelope gain.
        matrix.add_patch(
            voice,
            Patch::new(
                ModSource::AmpEnv,
                vec![PatchCable::new(ModDest::AmpEnvGain, 1.0)],
                true,
            ),
        );

        let static_count = matrix.patch_count(voice);
        Self {
            voice,
            env_slots,
            env_bias_slots,
            lfo_slots,
            static_count,
            dynamic: Vec::new(),
        }
    }

    /// One-hot selection of an LFO's route; `None` disables the family.
    /// Requesting a cross-route on LFO 2 leaves the family fully disabled.
    pub fn set_lfo_route(
        &mut self,
        matrix: &mut ModMatrix,
        lfo_index: usize,
        route: Option<LfoRoute>,
    ) {
        let lfo_index = lfo_index.min(NUM_LFOS - 1);
        for slot in self.lfo_slots[lfo_index].iter().flatten() {
            matrix.set_enabled(self.voice, *slot, false);
        }
        if let Some(route) = route {
            if let Some(slot) = self.lfo_slots[lfo_index][route as usize] {
                matrix.set_enabled(self.voice, slot, true);
            }
        }
    }

    /// One-hot selection of the mod-envelope route family.
    pub fn set_env_route(&mut self, matrix: &mut ModMatrix, route: Option<EnvRoute>) {
        for slot in self.env_slots {
            matrix.set_enabled(self.voice, slot, false);
        }
        if let Some(route) = route {
            matrix.set_enabled(self.voice, self.env_slots[route as usize], true);
        }
    }

    /// One-hot selection of the mod-envelope *bias* route family.
    pub fn set_env_bias_route(&mut self, matrix: &mut ModMatrix, route: Option<EnvRoute>) {
        for slot in self.env_bias_slots {
            matrix.set_enabled(self.voice, slot, false);
        }
        if let Some(route) = route {
            matrix.set_enabled(self.voice, self.env_bias_slots[route as usize], true);
        }
    }

    /// Register a caller-defined route under a pool-generated id.
    ///
    /// Fails (returning `false`, with no side effects) if the id already
    /// exists for this voice - ids are engine-generated so this is purely
    /// defensive.
    pub fn create_patch(
        &mut self,
        matrix: &mut ModMatrix,
        id: PatchId,
        source: ModSource,
        cables: &[PatchCable],
        enabled: bool,
    ) -> bool {
        if self.dynamic.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let slot = matrix.add_patch(self.voice, Patch::new(source, cables.to_vec(), enabled));
        self.dynamic.push((id, slot));
        true
    }

    /// Toggle a dynamic route. Returns `false` if the id is unknown here.
    pub fn set_patch_enabled(&mut self, matrix: &mut ModMatrix, id: PatchId, enabled: bool) -> bool {
        match self.dynamic.iter().find(|(existing, _)| *existing == id) {
            Some(&(_, slot)) => {
                matrix.set_enabled(self.voice, slot, enabled);
                true
            }
            None => false,
        }
    }

    pub fn patch_enabled(&self, matrix: &ModMatrix, id: PatchId) -> Option<bool> {
        self.dynamic
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|&(_, slot)| matrix.is_enabled(self.voice, slot))
    }

    /// Unregister and discard every dynamic route of this voice.
    pub fn clear_patches(&mut self, matrix: &mut ModMatrix) {
        matrix.truncate(self.voice, self.static_count);
        self.dynamic.clear();
    }

    // Introspection used by the engine and tests.

    pub fn lfo_route_enabled(&self, matrix: &ModMatrix, lfo_index: usize, route: LfoRoute) -> bool {
        self.lfo_slots[lfo_index][route as usize]
            .map(|slot| matrix.is_enabled(self.voice, slot))
            .unwrap_or(false)
    }

    pub fn env_route_enabled(&self, matrix: &ModMatrix, route: EnvRoute) -> bool {
        matrix.is_enabled(self.voice, self.env_slots[route as usize])
    }

    pub fn env_bias_route_enabled(&self, matrix: &ModMatrix, route: EnvRoute) -> bool {
        matrix.is_enabled(self.voice, self.env_bias_slots[route as usize])
    }

    pub fn enabled_lfo_routes(&self, matrix: &ModMatrix, lfo_index: usize) -> usize {
        self.lfo_slots[lfo_index]
            .iter()
            .flatten()
            .filter(|slot| matrix.is_enabled(self.voice, **slot))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::matrix::{ModMatrix, ModPhase, ModValues};

    fn table() -> (ModMatrix, PatchTable) {
        let mut matrix = ModMatrix::new(1);
        let table = PatchTable::new(0, &mut matrix);
        (matrix, table)
    }

    #[test]
    fn static_routes_start_disabled_except_amp() {
        let (matrix, patches) = table();

        for route in ALL_ENV_ROUTES {
            assert!(!patches.env_route_enabled(&matrix, route));
            assert!(!patches.env_bias_route_enabled(&matrix, route));
        }
        for lfo in 0..NUM_LFOS {
            assert_eq!(patches.enabled_lfo_routes(&matrix, lfo), 0);
        }

        // The always-on amp route still propagates the amp envelope.
        let mut values = ModValues::new();
        values.set_source(ModSource::AmpEnv, 0.8);
        matrix.update(0, ModPhase::Envelopes, &mut values);
        assert!((values.total(ModDest::AmpEnvGain) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn lfo_selection_is_one_hot() {
        let (mut matrix, mut patches) = table();

        patches.set_lfo_route(&mut matrix, 0, Some(LfoRoute::Pitch));
        patches.set_lfo_route(&mut matrix, 0, Some(LfoRoute::Cutoff));

        assert!(!patches.lfo_route_enabled(&matrix, 0, LfoRoute::Pitch));
        assert!(patches.lfo_route_enabled(&matrix, 0, LfoRoute::Cutoff));
        assert_eq!(patches.enabled_lfo_routes(&matrix, 0), 1);

        patches.set_lfo_route(&mut matrix, 0, None);
        assert_eq!(patches.enabled_lfo_routes(&matrix, 0), 0);
    }

    #[test]
    fn lfo_families_are_independent() {
        let (mut matrix, mut patches) = table();

        patches.set_lfo_route(&mut matrix, 0, Some(LfoRoute::Pitch));
        patches.set_lfo_route(&mut matrix, 1, Some(LfoRoute::Pan));

        assert!(patches.lfo_route_enabled(&matrix, 0, LfoRoute::Pitch));
        assert!(patches.lfo_route_enabled(&matrix, 1, LfoRoute::Pan));
    }

    #[test]
    fn cross_routes_do_not_exist_on_lfo2() {
        let (mut matrix, mut patches) = table();

        patches.set_lfo_route(&mut matrix, 1, Some(LfoRoute::Lfo2Frequency));
        assert_eq!(patches.enabled_lfo_routes(&matrix, 1), 0);

        patches.set_lfo_route(&mut matrix, 0, Some(LfoRoute::Lfo2Frequency));
        assert_eq!(patches.enabled_lfo_routes(&matrix, 0), 1);
    }

    #[test]
    fn env_and_bias_families_select_independently() {
        let (mut matrix, mut patches) = table();

        patches.set_env_route(&mut matrix, Some(EnvRoute::Cutoff));
        patches.set_env_bias_route(&mut matrix, Some(EnvRoute::Pitch));

        assert!(patches.env_route_enabled(&matrix, EnvRoute::Cutoff));
        assert!(patches.env_bias_route_enabled(&matrix, EnvRoute::Pitch));

        patches.set_env_route(&mut matrix, Some(EnvRoute::Pitch));
        assert!(!patches.env_route_enabled(&matrix, EnvRoute::Cutoff));
        assert!(patches.env_bias_route_enabled(&matrix, EnvRoute::Pitch));
    }

    #[test]
    fn duplicate_dynamic_id_is_rejected() {
        let (mut matrix, mut patches) = table();
        let cables = [PatchCable::new(ModDest::FilterCutoff, 100.0)];

        assert!(patches.create_patch(&mut matrix, 7, ModSource::Lfo1, &cables, true));
        let count = matrix.patch_count(0);

        assert!(!patches.create_patch(&mut matrix, 7, ModSource::Lfo2, &cables, true));
        assert_eq!(matrix.patch_count(0), count, "failed create must not register");
    }

    #[test]
    fn dynamic_enable_round_trips() {
        let (mut matrix, mut patches) = table();
        let cables = [PatchCable::new(ModDest::AmpPan, 0.5)];

        assert!(patches.create_patch(&mut matrix, 3, ModSource::Lfo2, &cables, true));
        assert!(patches.set_patch_enabled(&mut matrix, 3, false));
        assert_eq!(patches.patch_enabled(&matrix, 3), Some(false));
        assert!(patches.set_patch_enabled(&mut matrix, 3, true));
        assert_eq!(patches.patch_enabled(&matrix, 3), Some(true));

        assert!(!patches.set_patch_enabled(&mut matrix, 99, true));
    }

    #[test]
    fn clear_patches_removes_only_dynamic_routes() {
        let (mut matrix, mut patches) = table();
        let static_count = matrix.patch_count(0);
        let cables = [PatchCable::new(ModDest::FilterQ, 1.0)];

        patches.create_patch(&mut matrix, 1, ModSource::ModEnv, &cables, true);
        patches.create_patch(&mut matrix, 2, ModSource::Lfo1, &cables, true);
        patches.clear_patches(&mut matrix);

        assert_eq!(matrix.patch_count(0), static_count);
        assert!(!patches.set_patch_enabled(&mut matrix, 1, true));

        // The id can be reused after clearing.
        assert!(patches.create_patch(&mut matrix, 1, ModSource::ModEnv, &cables, false));
    }
}
