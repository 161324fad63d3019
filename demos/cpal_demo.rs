//! Real-time playback through the default output device.
//! Run with: cargo run --example cpal_demo --features cpal-demo

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use polyvox::{
    synth::{message::SynthMessage, Synth},
    MAX_BLOCK_SIZE,
};
use rtrb::RingBuffer;
use std::{thread, time::Duration};

fn main() {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .expect("no default output device available");
    let config = device
        .default_output_config()
        .expect("failed to fetch default output config");

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;

    let (mut tx, rx) = RingBuffer::<SynthMessage>::new(64);

    let stream = device
        .build_output_stream(
            &config.into(),
            {
                let mut rx = rx;
                let mut synth = Synth::new(sample_rate, 8);
                synth.set_release_time(0.4);
                synth.set_chorus_enabled(true);
                let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
                let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

                move |data: &mut [f32], _| {
                    synth.drain_messages(&mut rx);

                    let total_frames = data.len() / channels;
                    let mut written = 0;
                    while written < total_frames {
                        let frames = (total_frames - written).min(MAX_BLOCK_SIZE);
                        synth.render(&mut left[..frames], &mut right[..frames]);

                        for i in 0..frames {
                            let base = (written + i) * channels;
                            data[base] = left[i];
                            if channels > 1 {
                                data[base + 1] = right[i];
                            }
                        }
                        written += frames;
                    }
                }
            },
            move |err| eprintln!("stream error: {err}"),
            None,
        )
        .expect("failed to build output stream");

    stream.play().expect("failed to start stream");

    // Walk a little arpeggio up the pool.
    for note in [48u8, 52, 55, 60, 64, 67, 72] {
        let _ = tx.push(SynthMessage::NoteOn {
            note,
            velocity: 0.9,
            duration_secs: -1.0,
        });
        thread::sleep(Duration::from_millis(250));
    }

    thread::sleep(Duration::from_millis(500));
    let _ = tx.push(SynthMessage::AllNotesOff { kill: false });
    thread::sleep(Duration::from_secs(1));
}
