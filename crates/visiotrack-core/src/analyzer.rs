//! Image analyzer seam.
//!
//! The analyzer is an external service that estimates a [`Profile`] from a
//! photo. Implementations live outside this crate (`visiotrack-ai`); tests
//! use in-memory stubs.

use crate::types::{CapturedImage, Profile};
use async_trait::async_trait;
use thiserror::Error;

/// Instruction sent alongside the image.
pub const ANALYSIS_PROMPT: &str = "Analyze the person in this image. Based on visual cues, \
estimate their age range, gender, and a potential profession. Provide a plausible name or a \
descriptive title. Return the response in the specified JSON format.";

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analyzer unreachable: {0}")]
    Unreachable(String),
    #[error("analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analyzer response is not valid JSON: {0}")]
    Malformed(String),
    #[error("analyzer response is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("analyzer returned no content")]
    EmptyResponse,
    #[error("analyzer not configured: {0}")]
    NotConfigured(String),
}

/// Estimates a visitor profile from a photo.
///
/// A call may take arbitrarily long; it is the implementation's job to
/// eventually resolve.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, image: &CapturedImage) -> Result<Profile, AnalysisError>;
}
