//! visiotrack-ai: Gemini-backed visitor profile estimation.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};
