mod fallback;
#[cfg(feature = "native-decoder")]
pub(crate) mod native;
mod stage;

pub use fallback::{
    jittered_delay, synthesize_payload, FallbackInput, FallbackInputs, SynthesisTimer,
};
pub use stage::{DecodeStage, DecodeState, DecoderStrategy, TickOutcome};
