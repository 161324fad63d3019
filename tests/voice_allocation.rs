//! End-to-end coverage of the voice pool: allocation, stealing,
//! reclamation, mono/poly semantics and the dynamic patch API.

use polyvox::synth::{
    engine::STOPPING_VOICE_MARGIN, matrix::ModDest, EnvRoute, LfoRoute, ModSource, PatchCable,
    Synth,
};

const SAMPLE_RATE: f32 = 48_000.0;

fn render(synth: &mut Synth, frames: usize) {
    for _ in 0..frames {
        synth.generate();
    }
}

#[test]
fn sequential_note_ons_use_distinct_slots() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    let free_before = synth.num_free_voices();

    for (i, note) in [60u8, 62, 64, 65].iter().enumerate() {
        synth.note_on(*note, 1.0, -1.0);
        assert_eq!(synth.num_active_voices(), i + 1);
        assert_eq!(synth.num_free_voices(), free_before - (i + 1));
    }
}

#[test]
fn fifth_note_on_a_four_voice_pool_uses_the_margin() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    assert_eq!(synth.capacity(), 4 + STOPPING_VOICE_MARGIN);

    for i in 0..5 {
        synth.note_on(60 + i, 1.0, -1.0);
    }

    // The fifth note soft-stole the oldest voice, which keeps fading in its
    // own slot, so five voices are momentarily active - the note must not
    // have been dropped.
    assert_eq!(synth.num_active_voices(), 5);
    assert_eq!(
        synth.num_free_voices(),
        synth.capacity() - 5,
        "margin slot should have been handed to the new note"
    );
}

#[test]
fn stealing_follows_generation_order() {
    let mut synth = Synth::new(SAMPLE_RATE, 2);

    synth.note_on(60, 1.0, -1.0); // generation 1 → slot 0
    synth.note_on(62, 1.0, -1.0); // generation 2 → slot 1
    let oldest = synth.oldest_playing_voice();
    assert_eq!(oldest, Some(0));

    // Exceed the budget: the generation-1 voice is shut down first.
    synth.note_on(64, 1.0, -1.0);
    render(&mut synth, 4_096); // Let the stolen voice drain and be swept

    // Now the oldest live voice is the generation-2 one.
    assert_eq!(synth.oldest_playing_voice(), Some(1));
}

#[test]
fn stolen_voice_is_reclaimed_once_drained() {
    let mut synth = Synth::new(SAMPLE_RATE, 1);

    synth.note_on(60, 1.0, -1.0);
    synth.note_on(72, 1.0, -1.0); // Soft-steals the first voice
    assert_eq!(synth.num_active_voices(), 2);

    render(&mut synth, 8_192);
    assert_eq!(
        synth.num_active_voices(),
        1,
        "shutdown voice should have drained and been swept"
    );
    assert_eq!(synth.num_free_voices(), synth.capacity() - 1);
}

#[test]
fn exhausting_budget_and_margin_never_drops_silently() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    let capacity = synth.capacity();

    // Saturate the whole pool without rendering, so nothing is reclaimed.
    for i in 0..capacity as u8 {
        synth.note_on(40 + i, 1.0, -1.0);
    }
    assert_eq!(synth.num_active_voices(), capacity);
    assert_eq!(synth.num_free_voices(), 0);

    // One more: kill-steals the oldest in place, still lands.
    synth.note_on(100, 1.0, -1.0);
    assert_eq!(synth.num_active_voices(), capacity);
}

#[test]
fn killed_voices_are_swept_on_the_next_pass() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    synth.note_on(60, 1.0, -1.0);
    synth.note_on(64, 1.0, -1.0);

    synth.kill_all_notes();
    // A single mixing pass reclaims every killed voice.
    synth.generate();

    assert_eq!(synth.num_active_voices(), 0);
    assert_eq!(synth.num_free_voices(), synth.capacity());
}

#[test]
fn mono_mode_reuses_the_same_slot_for_legato() {
    let mut synth = Synth::new(SAMPLE_RATE, 8);
    synth.set_mono_mode(true);
    synth.set_portamento_time(0.2);

    synth.note_on(48, 1.0, -1.0);
    let free_after_first = synth.num_free_voices();
    render(&mut synth, 1_024);

    synth.note_on(60, 1.0, -1.0);
    assert_eq!(
        synth.num_free_voices(),
        free_after_first,
        "legato retarget must not allocate"
    );
    assert_eq!(synth.num_active_voices(), 1);
}

#[test]
fn leaving_mono_mode_restores_polyphony() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    synth.set_mono_mode(true);
    synth.note_on(48, 1.0, -1.0);
    synth.note_off(48, false);
    render(&mut synth, 96_000);

    synth.set_mono_mode(false);
    assert_eq!(synth.num_free_voices(), synth.capacity());

    for i in 0..4 {
        synth.note_on(60 + i, 1.0, -1.0);
    }
    assert_eq!(synth.num_active_voices(), 4);
}

#[test]
fn auto_off_duration_releases_without_a_note_off() {
    let mut synth = Synth::new(SAMPLE_RATE, 2);
    synth.set_release_time(0.01);

    synth.note_on(60, 1.0, 0.05);
    assert_eq!(synth.num_active_voices(), 1);

    // 0.05 s note + 0.01 s release is well inside half a second.
    render(&mut synth, 24_000);
    assert_eq!(synth.num_active_voices(), 0);
}

#[test]
fn dynamic_patch_round_trip() {
    let mut synth = Synth::new(SAMPLE_RATE, 2);
    let cables = [PatchCable::new(ModDest::FilterCutoff, 1_500.0)];

    let id = synth
        .create_patch(ModSource::Lfo1, &cables, true)
        .expect("pool-generated id should be fresh");

    assert!(synth.set_patch_enabled(id, false));
    assert!(synth.set_patch_enabled(id, true));
    assert!(
        !synth.set_patch_enabled(id + 1_000, true),
        "unknown ids must report failure"
    );

    // Ids stay unique across creations.
    let id2 = synth
        .create_patch(ModSource::ModEnv, &cables, false)
        .expect("second patch");
    assert_ne!(id, id2);

    synth.clear_patches();
    assert!(!synth.set_patch_enabled(id, true));
    assert!(!synth.set_patch_enabled(id2, true));
}

#[test]
fn route_selection_and_rendering_stay_stable() {
    let mut synth = Synth::new(SAMPLE_RATE, 4);
    synth.set_lfo_route(0, Some(LfoRoute::Pitch));
    synth.set_lfo_route(1, Some(LfoRoute::Pan));
    synth.set_env_route(Some(EnvRoute::Cutoff));
    synth.set_env_bias_route(Some(EnvRoute::Pitch));
    synth.set_lfo_frequency(0, 6.0);
    synth.set_filter_frequency(1_200.0);

    synth.note_on(57, 1.0, -1.0);
    synth.note_on(61, 1.0, -1.0);

    let mut peak = 0.0f32;
    for _ in 0..12_000 {
        let (l, r) = synth.generate();
        assert!(l.is_finite() && r.is_finite());
        peak = peak.max(l.abs()).max(r.abs());
    }
    assert!(peak > 0.005, "modulated voices should still be audible");
}

#[test]
fn filter_algorithm_hot_swap_keeps_settings() {
    use polyvox::dsp::filter::FilterAlgorithm;

    let mut synth = Synth::new(SAMPLE_RATE, 2);
    synth.set_filter_frequency(800.0);
    synth.set_filter_q(2.0);
    synth.note_on(45, 1.0, -1.0);
    render(&mut synth, 1_024);

    for algorithm in [
        FilterAlgorithm::Ladder,
        FilterAlgorithm::OnePole,
        FilterAlgorithm::StateVariable,
    ] {
        synth.set_filter_algorithm(algorithm);
        for _ in 0..1_024 {
            let (l, r) = synth.generate();
            assert!(l.is_finite() && r.is_finite());
        }
    }
}
