#[cfg(feature = "rtrb")]
use rtrb::Consumer;

/// Control messages for driving the engine from another thread.
///
/// The audio thread drains these at the top of every rendered block; see
/// `Synth::drain_messages`.
#[derive(Debug, Copy, Clone)]
pub enum SynthMessage {
    NoteOn {
        note: u8,
        /// Normalized velocity, 0.0 to 1.0.
        velocity: f32,
        /// Auto-off duration in seconds; zero or negative means none.
        duration_secs: f32,
    },
    NoteOff {
        note: u8,
    },
    AllNotesOff {
        /// Hard-stop every voice instead of releasing.
        kill: bool,
    },
    PitchBend {
        semitones: f32,
    },
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
