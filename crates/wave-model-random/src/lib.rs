//! wave-model-random: seeded random mutations for fuzzing the Wave
//! document model.
//!
//! [`generate`] walks a [`wave_model::automaton::NindoAutomaton`] over a
//! document and emits a [`wave_model::Nindo`] that the validator accepts, or,
//! when asked for an invalid one, rejects without it being ill-formed.

pub mod fuzzer;
pub mod nindo_generator;
pub mod parameters;

pub use fuzzer::Fuzzer;
pub use nindo_generator::{generate, MAX_ATTEMPTS};
pub use parameters::{AnnotationOption, Parameters};
