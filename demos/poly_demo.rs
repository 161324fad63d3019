//! Offline walk-through of voice allocation, stealing and reclamation.
//! No audio device needed; run with: cargo run --example poly_demo

use polyvox::synth::{message::SynthMessage, Synth};
use rtrb::RingBuffer;

fn peak(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .chain(right.iter())
        .fold(0.0f32, |acc, &x| acc.max(x.abs()))
}

fn main() {
    println!("=== polyvox demo (offline) ===\n");

    let sample_rate = 48_000.0;
    let max_voices = 4;
    let block_size = 256;

    // Lock-free queue: control side pushes, audio side drains.
    let (mut tx, mut rx) = RingBuffer::<SynthMessage>::new(64);

    let mut synth = Synth::new(sample_rate, max_voices);
    synth.set_release_time(0.2);

    println!(
        "Created engine: {} voices + {} stopping-margin slots\n",
        synth.max_voices(),
        synth.capacity() - synth.max_voices()
    );

    let mut left = vec![0.0f32; block_size];
    let mut right = vec![0.0f32; block_size];

    // C major chord
    println!("Playing C major chord (C4, E4, G4):");
    for note in [60, 64, 67] {
        let _ = tx.push(SynthMessage::NoteOn {
            note,
            velocity: 1.0,
            duration_secs: -1.0,
        });
    }
    synth.drain_messages(&mut rx);
    synth.render(&mut left, &mut right);
    println!(
        "  active voices: {}, peak: {:.3}\n",
        synth.num_active_voices(),
        peak(&left, &right)
    );

    // Saturate the pool
    println!("Adding B4 and D5 - D5 soft-steals the oldest voice:");
    for note in [71, 74] {
        let _ = tx.push(SynthMessage::NoteOn {
            note,
            velocity: 1.0,
            duration_secs: -1.0,
        });
    }
    synth.drain_messages(&mut rx);
    synth.render(&mut left, &mut right);
    println!(
        "  active voices: {} (stolen voice still ringing in the margin)\n",
        synth.num_active_voices()
    );

    // Let the stolen voice drain
    for _ in 0..20 {
        synth.render(&mut left, &mut right);
    }
    println!(
        "After 20 blocks: active voices: {} (margin slot reclaimed)\n",
        synth.num_active_voices()
    );

    // Release everything
    println!("Releasing all notes...");
    let _ = tx.push(SynthMessage::AllNotesOff { kill: false });
    synth.drain_messages(&mut rx);
    for _ in 0..100 {
        synth.render(&mut left, &mut right);
    }
    println!(
        "After release: active voices: {}, free slots: {}/{}",
        synth.num_active_voices(),
        synth.num_free_voices(),
        synth.capacity()
    );

    // Timed notes: auto-off without an explicit note-off
    println!("\nTimed note: A3 for 0.1 s (auto-off)");
    synth.note_on(57, 1.0, 0.1);
    for _ in 0..40 {
        synth.render(&mut left, &mut right);
    }
    println!("  active voices: {}", synth.num_active_voices());
}
