// Purpose: voice management, modulation routing, polyphony.
// This layer owns allocation, stealing and the control-rate update ordering;
// the dsp modules stay focused on signal math.

pub mod engine;
pub mod matrix;
pub mod message;
pub mod patches;
pub mod voice;

pub use engine::{Synth, STOPPING_VOICE_MARGIN};
pub use matrix::{ModDest, ModSource, PatchCable};
pub use patches::{EnvRoute, LfoRoute, PatchId};
pub use voice::Voice;
