use crate::{
    dsp::{
        amp::AmpStage,
        envelope::Envelope,
        filter::{FilterAlgorithm, FilterType, LadderFilter, OnePoleFilter, SvFilter},
        lfo::{Lfo, LfoMode, LfoWaveform},
        oscillator::{Oscillator, OscillatorWaveform},
        ramp::Ramp,
    },
    synth::{
        matrix::{ModDest, ModMatrix, ModPhase, ModSource, ModValues, PatchCable},
        patches::{EnvRoute, LfoRoute, PatchId, PatchTable},
    },
    CONTROL_SAMPLE_PERIOD,
};

/// Convert MIDI note number to frequency in Hz.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub(crate) fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/*
One note's worth of DSP state, and the two-rate generation loop that drives
it.

Per audio sample, `generate` pushes the portamento ramp into the
oscillators, refreshes the selected filter's coefficients, renders and pans
the oscillators and filters the result. Every CONTROL_SAMPLE_PERIOD
samples it additionally runs the control block in a fixed order:

    amp envelope → mod envelope → matrix phase Envelopes
    → LFO 1 update+generate → LFO 2 update+generate → matrix phase Lfos
    → oscillator / pan / amp parameter refresh

LFO 2 generates *before* the LFO phase applies LFO 1's cross-routes, so
cross-modulation always lands one control block late by design of the
two-bank matrix.

Lifecycle: Free (pool's free list) → Active/Sounding → Releasing →
Finished, swept back to Free by the engine's mixing loop. `shutdown` is
the soft path used by voice stealing: a fast envelope fade with the
active/finished flags untouched, so the voice keeps sounding in its slot
until the sweep reclaims it. `kill` is the hard path: audio stops
discontinuously and the voice reports finished on the next sweep.
*/

pub struct Voice {
    id: usize,
    sample_rate: f32,

    note: u8,
    generation: u64,
    active: bool,
    finished: bool,

    control_counter: u32,
    duration_samples: Option<u64>,
    elapsed_samples: u64,

    osc1: Oscillator,
    osc2: Oscillator,
    unison: bool,
    sync: bool,

    one_pole: OnePoleFilter,
    svf: SvFilter,
    ladder: LadderFilter,
    filter_algorithm: FilterAlgorithm,
    filter_freq_mod_offset: f32,

    amp: AmpStage,
    osc1_pan: AmpStage,
    osc2_pan: AmpStage,

    amp_env: Envelope,
    mod_env: Envelope,
    lfo1: Lfo,
    lfo2: Lfo,

    ramp: Ramp,
    glide_time: f32,

    values: ModValues,
    patches: PatchTable,
}

impl Voice {
    pub fn new(id: usize, sample_rate: f32, matrix: &mut ModMatrix) -> Self {
        let control_rate = sample_rate / CONTROL_SAMPLE_PERIOD as f32;

        Self {
            id,
            sample_rate,
            note: 0,
            generation: 0,
            active: false,
            finished: false,
            control_counter: 0,
            duration_samples: None,
            elapsed_samples: 0,
            osc1: Oscillator::new(sample_rate),
            osc2: Oscillator::new(sample_rate),
            unison: false,
            sync: false,
            one_pole: OnePoleFilter::new(sample_rate),
            svf: SvFilter::new(sample_rate),
            ladder: LadderFilter::new(sample_rate),
            filter_algorithm: FilterAlgorithm::StateVariable,
            filter_freq_mod_offset: 0.0,
            amp: AmpStage::new(),
            osc1_pan: AmpStage::new(),
            osc2_pan: AmpStage::new(),
            amp_env: Envelope::new(control_rate),
            mod_env: Envelope::new(control_rate),
            lfo1: Lfo::new(control_rate),
            lfo2: Lfo::new(control_rate),
            ramp: Ramp::new(sample_rate),
            glide_time: 0.0,
            values: ModValues::new(),
            patches: PatchTable::new(id, matrix),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Still producing sound and eligible for stealing.
    pub fn is_playing(&self) -> bool {
        self.active && !self.finished
    }

    // --- Lifecycle ------------------------------------------------------

    /// Assign a note to this voice.
    ///
    /// `glide_from_hz` is the pool's previous note frequency; the pitch ramp
    /// restarts from there even when the voice is already sounding (legato).
    pub fn note_on(
        &mut self,
        note: u8,
        velocity: f32,
        duration_secs: f32,
        glide_from_hz: f32,
        generation: u64,
    ) {
        self.duration_samples = if duration_secs > 0.0 {
            Some((duration_secs * self.sample_rate) as u64)
        } else {
            None
        };
        self.elapsed_samples = 0;
        self.generation = generation;

        let target = midi_note_to_freq(note);
        self.ramp.set_value_range(glide_from_hz, target, self.glide_time);

        if !self.osc1.is_playing() {
            self.amp.reset();
            self.amp.set_velocity(velocity);
            self.osc1.start();
            self.osc2.start();
        }

        self.lfo1.start();
        self.lfo2.start();
        self.amp_env.start();
        self.mod_env.start();

        self.note = note;
        self.active = true;
        self.finished = false;
        self.control_counter = 0; // Run the control block on the next sample
    }

    /// Release the note (or any note, with `all_notes_off`).
    pub fn note_off(&mut self, note: u8, all_notes_off: bool) {
        self.duration_samples = None;
        self.elapsed_samples = 0;

        if !self.finished && (all_notes_off || note == self.note) {
            self.amp_env.stop();
            self.mod_env.stop();

            // Zero release time: nothing left to ring out.
            if self.amp_env.is_done() {
                self.finished = true;
                self.amp.reset();
            }
        }
    }

    /// Hard, discontinuous stop. The voice reports finished immediately and
    /// the next mixing sweep reclaims the slot.
    pub fn kill(&mut self) {
        self.osc1.stop();
        self.osc2.stop();
        self.lfo1.stop();
        self.lfo2.stop();
        self.amp_env.kill();
        self.mod_env.kill();
        self.amp.reset();
        self.generation = 0;
        self.finished = true;
    }

    /// Soft background release used only when stealing: fast fade on both
    /// envelopes, flags untouched, the voice keeps generating until swept.
    pub fn shutdown(&mut self) {
        self.amp_env.shutdown();
        self.mod_env.shutdown();
    }

    /// Clear the lifecycle flags without touching audio state. Called only
    /// by the engine's mixing sweep when reclaiming a finished voice.
    pub fn reset(&mut self) {
        self.active = false;
        self.finished = false;
        self.generation = 0;
    }

    // --- Generation -----------------------------------------------------

    /// Render one stereo frame into `out`.
    pub fn generate(&mut self, matrix: &ModMatrix, out: &mut [f32; 2]) {
        out[0] = 0.0;
        out[1] = 0.0;

        if self.amp_env.is_done() {
            self.mod_env.kill();
            self.finished = true;
            return;
        }

        let freq = self.ramp.value();
        self.osc1.set_frequency(freq);
        self.osc2.set_frequency(freq);

        if self.control_counter & (CONTROL_SAMPLE_PERIOD - 1) == 0 {
            self.run_control_block(matrix);
        }
        self.control_counter = self.control_counter.wrapping_add(1);

        // Filter coefficients track their (possibly just-modulated)
        // parameters every sample.
        let cutoff_mod = self.values.total(ModDest::FilterCutoff) + self.filter_freq_mod_offset;
        let q_mod = self.values.total(ModDest::FilterQ);

        let frame = self.generate_oscillators();
        let filtered = match self.filter_algorithm {
            FilterAlgorithm::OnePole => {
                self.one_pole.set_frequency_mod(cutoff_mod);
                self.one_pole.set_q_mod(q_mod);
                self.one_pole.update();
                self.one_pole.process(frame)
            }
            FilterAlgorithm::StateVariable => {
                self.svf.set_frequency_mod(cutoff_mod);
                self.svf.set_q_mod(q_mod);
                self.svf.update();
                self.svf.process(frame)
            }
            FilterAlgorithm::Ladder => {
                self.ladder.set_frequency_mod(cutoff_mod);
                self.ladder.set_q_mod(q_mod);
                self.ladder.update();
                self.ladder.process(frame)
            }
        };

        out[0] = filtered[0];
        out[1] = filtered[1];

        // The envelope can only finish on a control-block boundary; catch it
        // the same sample it happens.
        if self.amp_env.is_done() {
            self.mod_env.kill();
            self.osc1.stop();
            self.osc2.stop();
            self.lfo1.stop();
            self.lfo2.stop();
            self.finished = true;
        }

        if let Some(duration) = self.duration_samples {
            self.elapsed_samples += 1;
            if self.elapsed_samples >= duration {
                let note = self.note;
                self.note_off(note, false);
            }
        }
    }

    fn generate_oscillators(&mut self) -> [f32; 2] {
        let s1 = self.osc1.generate();
        if self.sync && self.osc1.wrapped() {
            self.osc2.reset_phase();
        }
        let s2 = self.osc2.generate();

        if self.unison {
            // Summed mono through the amp's mono-in/stereo-out path; halved
            // to stay level-matched with the panned path.
            self.amp.process_mono((s1 + s2) * 0.5)
        } else {
            let f1 = self.osc1_pan.process_mono(s1);
            let f2 = self.osc2_pan.process_mono(s2);
            self.amp.process_stereo([f1[0] + f2[0], f1[1] + f2[1]])
        }
    }

    fn run_control_block(&mut self, matrix: &ModMatrix) {
        let amp_level = self.amp_env.generate();
        self.mod_env.generate();
        self.values.set_source(ModSource::AmpEnv, amp_level);
        self.values.set_source(ModSource::ModEnv, self.mod_env.mod_source());
        self.values
            .set_source(ModSource::ModEnvBias, self.mod_env.mod_source_bias());
        matrix.update(self.id, ModPhase::Envelopes, &mut self.values);

        self.lfo1
            .set_frequency_mod(self.values.total(ModDest::Lfo1Frequency));
        self.lfo1.set_gain_mod(self.values.total(ModDest::Lfo1Gain));
        self.lfo1.update();
        self.lfo1.generate();
        self.values
            .set_source(ModSource::Lfo1, self.lfo1.mod_source_normal_phase());

        // LFO 2 reads its destinations before the LFO phase rewrites them,
        // so the LFO1→LFO2 cross-routes are one control block late.
        self.lfo2
            .set_frequency_mod(self.values.total(ModDest::Lfo2Frequency));
        self.lfo2.set_gain_mod(self.values.total(ModDest::Lfo2Gain));
        self.lfo2.update();
        self.lfo2.generate();
        self.values
            .set_source(ModSource::Lfo2, self.lfo2.mod_source_normal_phase());

        matrix.update(self.id, ModPhase::Lfos, &mut self.values);

        self.osc1
            .set_frequency_mod(self.values.total(ModDest::Osc1Frequency));
        self.osc1
            .set_pulse_width_mod(self.values.total(ModDest::Osc1PulseWidth));
        self.osc1.update();
        self.osc2
            .set_frequency_mod(self.values.total(ModDest::Osc2Frequency));
        self.osc2
            .set_pulse_width_mod(self.values.total(ModDest::Osc2PulseWidth));
        self.osc2.update();

        self.osc1_pan.update();
        self.osc2_pan.update();
        self.amp.set_env_gain(self.values.total(ModDest::AmpEnvGain));
        self.amp
            .set_gain_scale_mod(self.values.total(ModDest::AmpGainScale));
        self.amp.set_pan_mod(self.values.total(ModDest::AmpPan));
        self.amp.update();
    }

    // --- Parameter fan-out targets --------------------------------------

    pub fn set_osc_waveform(&mut self, index: usize, waveform: OscillatorWaveform) {
        self.osc(index).set_waveform(waveform);
    }

    pub fn set_osc_gain(&mut self, index: usize, gain: f32) {
        self.osc(index).set_gain(gain);
    }

    pub fn set_osc_cents(&mut self, index: usize, cents: f32) {
        self.osc(index).set_cents(cents);
    }

    pub fn set_osc_octave(&mut self, index: usize, octave: i32) {
        self.osc(index).set_octave(octave);
    }

    pub fn set_osc_pulse_width(&mut self, index: usize, width: f32) {
        self.osc(index).set_pulse_width(width);
    }

    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.osc1.set_pitch_bend(semitones);
        self.osc2.set_pitch_bend(semitones);
    }

    pub fn set_sync(&mut self, on: bool) {
        self.sync = on;
    }

    pub fn set_unison(&mut self, on: bool) {
        self.unison = on;
    }

    /// Stereo spread: oscillator 1 pans left, oscillator 2 right.
    pub fn set_spread(&mut self, spread: f32) {
        let spread = spread.clamp(0.0, 1.0);
        self.osc1_pan.set_pan(-spread);
        self.osc2_pan.set_pan(spread);
    }

    pub fn set_glide_time(&mut self, seconds: f32) {
        self.glide_time = seconds.clamp(0.0, 1.0);
    }

    fn osc(&mut self, index: usize) -> &mut Oscillator {
        if index == 0 {
            &mut self.osc1
        } else {
            &mut self.osc2
        }
    }

    fn lfo(&mut self, index: usize) -> &mut Lfo {
        if index == 0 {
            &mut self.lfo1
        } else {
            &mut self.lfo2
        }
    }

    pub fn set_lfo_waveform(&mut self, index: usize, waveform: LfoWaveform) {
        self.lfo(index).set_waveform(waveform);
    }

    pub fn set_lfo_mode(&mut self, index: usize, mode: LfoMode) {
        self.lfo(index).set_mode(mode);
    }

    pub fn set_lfo_gain(&mut self, index: usize, gain: f32) {
        self.lfo(index).set_gain(gain);
    }

    pub fn set_lfo_frequency(&mut self, index: usize, hz: f32) {
        self.lfo(index).set_frequency(hz);
    }

    pub fn set_lfo_pulse_width(&mut self, index: usize, width: f32) {
        self.lfo(index).set_pulse_width(width);
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.one_pole.set_filter_type(filter_type);
        self.svf.set_filter_type(filter_type);
        self.ladder.set_filter_type(filter_type);
    }

    /// Hot-swap the current algorithm. The engine re-applies its cached
    /// cutoff/Q to the newly selected instance right after this.
    pub fn set_filter_algorithm(&mut self, algorithm: FilterAlgorithm) {
        if algorithm != self.filter_algorithm {
            self.filter_algorithm = algorithm;
            match algorithm {
                FilterAlgorithm::OnePole => self.one_pole.reset(),
                FilterAlgorithm::StateVariable => self.svf.reset(),
                FilterAlgorithm::Ladder => self.ladder.reset(),
            }
        }
    }

    pub fn set_filter_frequency(&mut self, hz: f32) {
        match self.filter_algorithm {
            FilterAlgorithm::OnePole => self.one_pole.set_frequency(hz),
            FilterAlgorithm::StateVariable => self.svf.set_frequency(hz),
            FilterAlgorithm::Ladder => self.ladder.set_frequency(hz),
        }
    }

    pub fn set_filter_q(&mut self, q: f32) {
        match self.filter_algorithm {
            FilterAlgorithm::OnePole => self.one_pole.set_q(q),
            FilterAlgorithm::StateVariable => self.svf.set_q(q),
            FilterAlgorithm::Ladder => self.ladder.set_q(q),
        }
    }

    /// Static cutoff offset applied on top of matrix modulation, in Hz.
    pub fn set_filter_frequency_mod(&mut self, hz: f32) {
        self.filter_freq_mod_offset = hz;
    }

    pub fn set_attack_time(&mut self, seconds: f32) {
        self.amp_env.set_attack_time(seconds);
    }

    pub fn set_decay_time(&mut self, seconds: f32) {
        self.amp_env.set_decay_time(seconds);
    }

    pub fn set_sustain_gain(&mut self, gain: f32) {
        self.amp_env.set_sustain_gain(gain);
    }

    pub fn set_release_time(&mut self, seconds: f32) {
        self.amp_env.set_release_time(seconds);
    }

    pub fn set_env_legato(&mut self, on: bool) {
        self.amp_env.set_legato(on);
        self.mod_env.set_legato(on);
    }

    pub fn set_env_retrigger(&mut self, on: bool) {
        self.amp_env.set_retrigger(on);
        self.mod_env.set_retrigger(on);
    }

    pub fn set_mod_env_depth(&mut self, depth: f32) {
        self.mod_env.set_depth(depth);
    }

    pub fn set_mod_env_invert(&mut self, on: bool) {
        self.mod_env.set_invert(on);
    }

    pub fn set_mod_env_bias_invert(&mut self, on: bool) {
        self.mod_env.set_bias_invert(on);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.amp.set_pan(pan);
    }

    pub fn set_gain_db(&mut self, db: f32) {
        self.amp.set_gain_db(db);
    }

    // --- Patch table pass-throughs --------------------------------------

    pub fn set_lfo_route(&mut self, matrix: &mut ModMatrix, lfo: usize, route: Option<LfoRoute>) {
        self.patches.set_lfo_route(matrix, lfo, route);
    }

    pub fn set_env_route(&mut self, matrix: &mut ModMatrix, route: Option<EnvRoute>) {
        self.patches.set_env_route(matrix, route);
    }

    pub fn set_env_bias_route(&mut self, matrix: &mut ModMatrix, route: Option<EnvRoute>) {
        self.patches.set_env_bias_route(matrix, route);
    }

    pub fn create_patch(
        &mut self,
        matrix: &mut ModMatrix,
        id: PatchId,
        source: ModSource,
        cables: &[PatchCable],
        enabled: bool,
    ) -> bool {
        self.patches.create_patch(matrix, id, source, cables, enabled)
    }

    pub fn set_patch_enabled(&mut self, matrix: &mut ModMatrix, id: PatchId, enabled: bool) -> bool {
        self.patches.set_patch_enabled(matrix, id, enabled)
    }

    pub fn clear_patches(&mut self, matrix: &mut ModMatrix) {
        self.patches.clear_patches(matrix);
    }
}
