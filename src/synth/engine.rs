use crate::{
    dsp::{
        chorus::Chorus,
        delay::{StereoDelay, StereoDelayMode},
        filter::{FilterAlgorithm, FilterType},
        lfo::{LfoMode, LfoWaveform},
        oscillator::OscillatorWaveform,
    },
    synth::{
        matrix::{ModMatrix, ModSource, PatchCable},
        message::{MessageReceiver, SynthMessage},
        patches::{EnvRoute, LfoRoute, PatchId},
        voice::{midi_note_to_freq, Voice},
    },
};

/// Extra slots past the polyphony budget, reserved for voices that are still
/// ringing out after being stolen.
pub const STOPPING_VOICE_MARGIN: usize = 8;

/*
The voice pool.

Slot ids are stable for the pool's lifetime; only slot contents change. The
free stack holds exactly the inactive slot ids (LIFO). Allocation policy in
poly mode, oldest-generation-first:

  1. primary budget has room         → pop a free slot
  2. budget full, margin slots free  → shutdown-steal the oldest (it keeps
                                       fading in its own slot until the
                                       sweep reclaims it), pop a margin slot
  3. free stack empty                → kill-steal the oldest and reuse its
                                       slot in place

Mono mode keeps a single cached voice and retargets it (legato). The mixing
sweep in `generate` reclaims finished voices and accumulates the rest, then
runs the post chain: chorus, then stereo delay.
*/
pub struct Synth {
    sample_rate: f32,
    max_voices: usize,
    mono: bool,

    voices: Vec<Voice>,
    free: Vec<usize>,
    num_active: usize,
    generation: u64,
    last_voice: Option<usize>,
    last_note: Option<u8>,

    matrix: ModMatrix,
    next_patch_id: PatchId,

    chorus: Chorus,
    chorus_enabled: bool,
    delay: StereoDelay,
    delay_enabled: bool,

    // Cached so a filter-algorithm swap can re-apply them to the newly
    // selected instance.
    filter_frequency: f32,
    filter_q: f32,
    filter_freq_mod: f32,
}

impl Synth {
    pub fn new(sample_rate: f32, max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        let capacity = max_voices + STOPPING_VOICE_MARGIN;

        let mut matrix = ModMatrix::new(capacity);
        let voices = (0..capacity)
            .map(|id| Voice::new(id, sample_rate, &mut matrix))
            .collect();

        Self {
            sample_rate,
            max_voices,
            mono: false,
            voices,
            // LIFO: slot 0 pops first.
            free: (0..capacity).rev().collect(),
            num_active: 0,
            generation: 0,
            last_voice: None,
            last_note: None,
            matrix,
            next_patch_id: 0,
            chorus: Chorus::new(sample_rate),
            chorus_enabled: false,
            delay: StereoDelay::new(sample_rate),
            delay_enabled: false,
            filter_frequency: 20_000.0,
            filter_q: 0.0,
            filter_freq_mod: 0.0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Pool capacity: the polyphony budget plus the stopping margin.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Concurrently usable voices: 1 in mono mode, else the full budget.
    pub fn num_voices(&self) -> usize {
        if self.mono {
            1
        } else {
            self.max_voices
        }
    }

    pub fn num_active_voices(&self) -> usize {
        self.num_active
    }

    pub fn num_free_voices(&self) -> usize {
        self.free.len()
    }

    pub fn is_mono(&self) -> bool {
        self.mono
    }

    // --- Note events ----------------------------------------------------

    /// Trigger a note. `duration_secs` > 0 schedules an automatic note-off.
    ///
    /// If no voice can be found (which requires the whole pool including the
    /// stopping margin to be unreclaimable) the note is dropped with a
    /// warning.
    pub fn note_on(&mut self, note: u8, velocity: f32, duration_secs: f32) {
        let velocity = velocity.clamp(0.0, 1.0);
        let glide_from = self
            .last_note
            .map(midi_note_to_freq)
            .unwrap_or_else(|| midi_note_to_freq(note));

        let slot = if self.mono {
            self.allocate_mono()
        } else {
            self.allocate_poly()
        };

        let Some(idx) = slot else {
            log::warn!("note-on {note} dropped: no voice available");
            return;
        };

        self.generation += 1;
        let newly_active = !self.voices[idx].is_active();
        self.voices[idx].note_on(note, velocity, duration_secs, glide_from, self.generation);

        // Every poly branch counts the new note (the kill-steal branch
        // already gave back the stolen voice's count); in mono only a
        // not-yet-counted voice does - legato reuse keeps its count.
        if !self.mono || newly_active {
            self.num_active += 1;
        }
        self.last_note = Some(note);
    }

    fn allocate_mono(&mut self) -> Option<usize> {
        if let Some(idx) = self.last_voice {
            return Some(idx);
        }
        let idx = self.free.pop();
        self.last_voice = idx;
        idx
    }

    fn allocate_poly(&mut self) -> Option<usize> {
        let has_budget = self.num_active < self.max_voices;
        if has_budget {
            if let Some(idx) = self.free.pop() {
                return Some(idx);
            }
        }

        if !self.free.is_empty() {
            // Budget exhausted but margin slots remain: soft-steal.
            if let Some(oldest) = self.oldest_playing_voice() {
                log::debug!("voice pool full, shutting down voice {oldest}");
                self.voices[oldest].shutdown();
            }
            return self.free.pop();
        }

        // Margin exhausted as well: hard-steal and reuse in place.
        if let Some(oldest) = self.oldest_playing_voice() {
            log::debug!("voice pool and margin full, killing voice {oldest}");
            self.voices[oldest].kill();
            self.num_active = self.num_active.saturating_sub(1);
            return Some(oldest);
        }

        None
    }

    /// Slot id of the oldest still-playing voice (smallest generation).
    /// Ties resolve to the lowest slot id.
    pub fn oldest_playing_voice(&self) -> Option<usize> {
        let mut oldest: Option<(usize, u64)> = None;
        for voice in &self.voices {
            if !voice.is_playing() {
                continue;
            }
            let replace = match oldest {
                Some((_, generation)) => voice.generation() < generation,
                None => true,
            };
            if replace {
                oldest = Some((voice.id(), voice.generation()));
            }
        }
        oldest.map(|(id, _)| id)
    }

    pub fn note_off(&mut self, note: u8, all_notes_off: bool) {
        for voice in &mut self.voices {
            voice.note_off(note, all_notes_off);
        }
    }

    /// Hard-stop every voice. Slots are reclaimed by the next mixing sweep.
    pub fn kill_all_notes(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }

    /// Switching into mono kills and frees every active voice except the
    /// newest, which becomes the legato cache.
    pub fn set_mono_mode(&mut self, mono: bool) {
        if mono == self.mono {
            return;
        }
        self.mono = mono;

        if mono {
            let newest = self
                .voices
                .iter()
                .filter(|v| v.is_playing())
                .max_by_key(|v| v.generation())
                .map(|v| v.id());

            for idx in 0..self.voices.len() {
                if Some(idx) == newest || !self.voices[idx].is_active() {
                    continue;
                }
                self.voices[idx].kill();
                self.voices[idx].reset();
                self.num_active = self.num_active.saturating_sub(1);
                self.free.push(idx);
            }
            self.last_voice = newest;
        } else {
            // Hand the mono cache back to the free stack if it is idle; the
            // mono-mode sweep never pushes it.
            if let Some(idx) = self.last_voice.take() {
                if !self.voices[idx].is_active() && !self.free.contains(&idx) {
                    self.free.push(idx);
                }
            }
        }
    }

    // --- Generation -----------------------------------------------------

    /// Render one stereo frame: sweep finished voices back to the free
    /// stack, accumulate the rest, then run chorus and stereo delay.
    pub fn generate(&mut self) -> (f32, f32) {
        let mut mix = [0.0f32; 2];
        let mut frame = [0.0f32; 2];

        for idx in 0..self.voices.len() {
            if self.voices[idx].is_finished() {
                if self.voices[idx].is_active() {
                    self.num_active = self.num_active.saturating_sub(1);
                    self.voices[idx].reset();
                    if !self.mono {
                        self.free.push(idx);
                    }
                }
                continue;
            }

            self.voices[idx].generate(&self.matrix, &mut frame);
            mix[0] += frame[0];
            mix[1] += frame[1];
        }

        let (mut left, mut right) = (mix[0], mix[1]);
        if self.chorus_enabled {
            (left, right) = self.chorus.process(left, right);
        }
        if self.delay_enabled {
            (left, right) = self.delay.process(left, right);
        }
        (left, right)
    }

    /// Block helper for callbacks, demos and benches.
    pub fn render(&mut self, out_left: &mut [f32], out_right: &mut [f32]) {
        for (l, r) in out_left.iter_mut().zip(out_right.iter_mut()) {
            let (fl, fr) = self.generate();
            *l = fl;
            *r = fr;
        }
    }

    pub fn handle_message(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn {
                note,
                velocity,
                duration_secs,
            } => self.note_on(note, velocity, duration_secs),
            SynthMessage::NoteOff { note } => self.note_off(note, false),
            SynthMessage::AllNotesOff { kill } => {
                if kill {
                    self.kill_all_notes();
                } else {
                    self.note_off(0, true);
                }
            }
            SynthMessage::PitchBend { semitones } => self.set_pitch_bend(semitones),
        }
    }

    /// Drain queued control messages; call at the top of each block.
    pub fn drain_messages<R: MessageReceiver>(&mut self, rx: &mut R) {
        while let Some(message) = rx.pop() {
            self.handle_message(message);
        }
    }

    // --- Dynamic patches ------------------------------------------------

    /// Create a caller-defined modulation route, mirrored identically into
    /// every voice. Returns the new process-wide patch id, or `None` if any
    /// voice rejected the id (defensive; ids are generated here).
    pub fn create_patch(
        &mut self,
        source: ModSource,
        cables: &[PatchCable],
        enabled: bool,
    ) -> Option<PatchId> {
        let id = self.next_patch_id;
        self.next_patch_id += 1;

        let mut ok = true;
        for voice in &mut self.voices {
            ok &= voice.create_patch(&mut self.matrix, id, source, cables, enabled);
        }
        ok.then_some(id)
    }

    /// Toggle a dynamic route on every voice. Returns `false` if the id is
    /// unknown.
    pub fn set_patch_enabled(&mut self, id: PatchId, enabled: bool) -> bool {
        let mut known = true;
        for voice in &mut self.voices {
            known &= voice.set_patch_enabled(&mut self.matrix, id, enabled);
        }
        known
    }

    /// Unregister and discard every dynamic route.
    pub fn clear_patches(&mut self) {
        for voice in &mut self.voices {
            voice.clear_patches(&mut self.matrix);
        }
    }

    // --- Parameter fan-out ----------------------------------------------
    //
    // Every setter clamps/validates, stores the engine-wide value where a
    // later re-apply needs it, then applies the identical call to all
    // voices (pool capacity included, so stolen-but-fading voices follow
    // parameter changes too).

    pub fn set_osc_waveform(&mut self, index: usize, waveform: OscillatorWaveform) {
        for voice in &mut self.voices {
            voice.set_osc_waveform(index, waveform);
        }
    }

    pub fn set_osc_gain(&mut self, index: usize, gain: f32) {
        for voice in &mut self.voices {
            voice.set_osc_gain(index, gain);
        }
    }

    pub fn set_osc_cents(&mut self, index: usize, cents: f32) {
        for voice in &mut self.voices {
            voice.set_osc_cents(index, cents);
        }
    }

    pub fn set_osc_octave(&mut self, index: usize, octave: i32) {
        for voice in &mut self.voices {
            voice.set_osc_octave(index, octave);
        }
    }

    pub fn set_osc_pulse_width(&mut self, index: usize, width: f32) {
        for voice in &mut self.voices {
            voice.set_osc_pulse_width(index, width);
        }
    }

    pub fn set_pitch_bend(&mut self, semitones: f32) {
        for voice in &mut self.voices {
            voice.set_pitch_bend(semitones);
        }
    }

    pub fn set_osc_sync(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_sync(on);
        }
    }

    pub fn set_osc_spread(&mut self, spread: f32) {
        for voice in &mut self.voices {
            voice.set_spread(spread);
        }
    }

    pub fn set_osc_unison(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_unison(on);
        }
    }

    pub fn set_portamento_time(&mut self, seconds: f32) {
        for voice in &mut self.voices {
            voice.set_glide_time(seconds);
        }
    }

    pub fn set_lfo_waveform(&mut self, index: usize, waveform: LfoWaveform) {
        for voice in &mut self.voices {
            voice.set_lfo_waveform(index, waveform);
        }
    }

    pub fn set_lfo_mode(&mut self, index: usize, mode: LfoMode) {
        for voice in &mut self.voices {
            voice.set_lfo_mode(index, mode);
        }
    }

    pub fn set_lfo_gain(&mut self, index: usize, gain: f32) {
        for voice in &mut self.voices {
            voice.set_lfo_gain(index, gain);
        }
    }

    pub fn set_lfo_frequency(&mut self, index: usize, hz: f32) {
        for voice in &mut self.voices {
            voice.set_lfo_frequency(index, hz);
        }
    }

    pub fn set_lfo_pulse_width(&mut self, index: usize, width: f32) {
        for voice in &mut self.voices {
            voice.set_lfo_pulse_width(index, width);
        }
    }

    /// One-hot LFO route selection, engine-wide.
    pub fn set_lfo_route(&mut self, index: usize, route: Option<LfoRoute>) {
        for voice in &mut self.voices {
            voice.set_lfo_route(&mut self.matrix, index, route);
        }
    }

    /// One-hot mod-envelope route selection, engine-wide.
    pub fn set_env_route(&mut self, route: Option<EnvRoute>) {
        for voice in &mut self.voices {
            voice.set_env_route(&mut self.matrix, route);
        }
    }

    /// One-hot mod-envelope bias route selection, engine-wide.
    pub fn set_env_bias_route(&mut self, route: Option<EnvRoute>) {
        for voice in &mut self.voices {
            voice.set_env_bias_route(&mut self.matrix, route);
        }
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        for voice in &mut self.voices {
            voice.set_filter_type(filter_type);
        }
    }

    /// Swap the active filter algorithm and re-apply the cached cutoff/Q to
    /// the newly selected instance on every voice.
    pub fn set_filter_algorithm(&mut self, algorithm: FilterAlgorithm) {
        for voice in &mut self.voices {
            voice.set_filter_algorithm(algorithm);
            voice.set_filter_frequency(self.filter_frequency);
            voice.set_filter_q(self.filter_q);
            voice.set_filter_frequency_mod(self.filter_freq_mod);
        }
    }

    pub fn set_filter_frequency(&mut self, hz: f32) {
        self.filter_frequency = hz;
        for voice in &mut self.voices {
            voice.set_filter_frequency(hz);
        }
    }

    pub fn set_filter_q(&mut self, q: f32) {
        self.filter_q = q;
        for voice in &mut self.voices {
            voice.set_filter_q(q);
        }
    }

    pub fn set_filter_frequency_mod(&mut self, hz: f32) {
        self.filter_freq_mod = hz;
        for voice in &mut self.voices {
            voice.set_filter_frequency_mod(hz);
        }
    }

    pub fn set_attack_time(&mut self, seconds: f32) {
        for voice in &mut self.voices {
            voice.set_attack_time(seconds);
        }
    }

    pub fn set_decay_time(&mut self, seconds: f32) {
        for voice in &mut self.voices {
            voice.set_decay_time(seconds);
        }
    }

    pub fn set_sustain_gain(&mut self, gain: f32) {
        for voice in &mut self.voices {
            voice.set_sustain_gain(gain);
        }
    }

    pub fn set_release_time(&mut self, seconds: f32) {
        for voice in &mut self.voices {
            voice.set_release_time(seconds);
        }
    }

    pub fn set_env_legato(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_env_legato(on);
        }
    }

    pub fn set_env_retrigger(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_env_retrigger(on);
        }
    }

    pub fn set_mod_env_depth(&mut self, depth: f32) {
        for voice in &mut self.voices {
            voice.set_mod_env_depth(depth);
        }
    }

    pub fn set_mod_env_invert(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_mod_env_invert(on);
        }
    }

    pub fn set_mod_env_bias_invert(&mut self, on: bool) {
        for voice in &mut self.voices {
            voice.set_mod_env_bias_invert(on);
        }
    }

    pub fn set_pan(&mut self, pan: f32) {
        for voice in &mut self.voices {
            voice.set_pan(pan);
        }
    }

    pub fn set_gain_db(&mut self, db: f32) {
        for voice in &mut self.voices {
            voice.set_gain_db(db);
        }
    }

    // --- Post effects ---------------------------------------------------

    pub fn set_chorus_enabled(&mut self, on: bool) {
        if on && !self.chorus_enabled {
            self.chorus.reset();
        }
        self.chorus_enabled = on;
    }

    pub fn set_chorus_rate(&mut self, hz: f32) {
        self.chorus.set_rate(hz);
    }

    pub fn set_chorus_depth_ms(&mut self, ms: f32) {
        self.chorus.set_depth_ms(ms);
    }

    pub fn set_chorus_mix(&mut self, mix: f32) {
        self.chorus.set_mix(mix);
    }

    pub fn set_delay_enabled(&mut self, on: bool) {
        if on && !self.delay_enabled {
            self.delay.reset();
        }
        self.delay_enabled = on;
    }

    pub fn set_delay_mode(&mut self, mode: StereoDelayMode) {
        self.delay.set_mode(mode);
    }

    pub fn set_delay_time_ms(&mut self, ms: f32) {
        self.delay.set_time_ms(ms);
    }

    pub fn set_delay_feedback(&mut self, feedback: f32) {
        self.delay.set_feedback(feedback);
    }

    pub fn set_delay_wet_level(&mut self, wet: f32) {
        self.delay.set_wet_level(wet);
    }

    #[cfg(test)]
    pub(crate) fn voice(&self, idx: usize) -> &Voice {
        &self.voices[idx]
    }
}
