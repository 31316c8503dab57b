//! AI message generation via the OpenRouter API
//!
//! The runner talks to a [`Generator`]; [`OpenRouterGenerator`] is the
//! production implementation. Retries and the fallback template are the
//! runner's job, not the generator's.

mod client;
mod generator;
mod prompts;

pub use client::{GenerationError, OpenRouterClient};
pub use generator::{Generator, OpenRouterGenerator};
