//! Scan workflow: photo -> analysis -> operator review -> saved check-in.
//!
//! ```text
//! AwaitingImage -> Analyzing -> AnalysisFailed
//!                            -> Reviewing (editing <-> viewing) -> Saved
//! ```
//!
//! Analysis is the only suspension point. Each analysis is tagged with an
//! [`Attempt`]; a result for anything but the current attempt is dropped, so
//! a reset or a newer photo silently supersedes a slow response.

use crate::analyzer::{AnalysisError, Analyzer};
use crate::desk::Desk;
use crate::persistence::Slot;
use crate::store::StoreError;
use crate::types::{BlankField, CapturedImage, Profile, ProfileField, VisitorRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Message shown to the operator when analysis fails.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze the image. The AI may be unable to \
process this picture, or an API error occurred. Please try another image.";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScanError {
    #[error("`{action}` is not available while {state}")]
    NotReady {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    BlankField(#[from] BlankField),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ticket identifying one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    AwaitingImage,
    Analyzing {
        image: CapturedImage,
        attempt: Attempt,
    },
    AnalysisFailed {
        image: CapturedImage,
        message: String,
    },
    Reviewing {
        image: CapturedImage,
        /// Analyzer output, stored as the record's raw profile.
        raw: Profile,
        /// Operator-editable copy, stored as the enhanced profile.
        candidate: Profile,
        editing: bool,
    },
    Saved {
        id: Uuid,
    },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::AwaitingImage => "awaiting an image",
            ScanState::Analyzing { .. } => "analyzing",
            ScanState::AnalysisFailed { .. } => "analysis failed",
            ScanState::Reviewing { editing: true, .. } => "editing",
            ScanState::Reviewing { .. } => "reviewing",
            ScanState::Saved { .. } => "saved",
        }
    }

    /// Current editable profile, if a result is under review.
    pub fn candidate(&self) -> Option<&Profile> {
        match self {
            ScanState::Reviewing { candidate, .. } => Some(candidate),
            _ => None,
        }
    }
}

/// One operator's pass through the scan workflow.
///
/// Dropping the session is the cancel action.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    attempts: u64,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: ScanState::AwaitingImage,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// An image is ready: start analyzing it. Supersedes any pending attempt.
    pub fn begin_analysis(&mut self, image: CapturedImage) -> Attempt {
        self.attempts += 1;
        let attempt = Attempt(self.attempts);
        tracing::debug!(attempt = attempt.0, mime = image.mime.as_str(), "analysis started");
        self.state = ScanState::Analyzing { image, attempt };
        attempt
    }

    /// Deliver the analyzer's answer for `attempt`.
    ///
    /// Returns false (and changes nothing) if the attempt is no longer current.
    pub fn finish_analysis(
        &mut self,
        attempt: Attempt,
        result: Result<Profile, AnalysisError>,
    ) -> bool {
        let image = match &self.state {
            ScanState::Analyzing { attempt: current, image } if *current == attempt => image.clone(),
            _ => {
                tracing::debug!(attempt = attempt.0, "ignoring stale analysis result");
                return false;
            }
        };

        self.state = match result {
            Ok(profile) => {
                tracing::info!(attempt = attempt.0, name = %profile.name, "analysis complete");
                ScanState::Reviewing {
                    image,
                    raw: profile.clone(),
                    candidate: profile,
                    editing: false,
                }
            }
            Err(e) => {
                tracing::warn!(attempt = attempt.0, error = %e, "analysis failed");
                ScanState::AnalysisFailed {
                    image,
                    message: ANALYSIS_FAILED_MESSAGE.to_string(),
                }
            }
        };
        true
    }

    /// Analyze `image` with `analyzer` and record the outcome.
    pub async fn analyze<A>(&mut self, analyzer: &A, image: CapturedImage) -> &ScanState
    where
        A: Analyzer + ?Sized,
    {
        let attempt = self.begin_analysis(image.clone());
        let result = analyzer.analyze(&image).await;
        self.finish_analysis(attempt, result);
        &self.state
    }

    pub fn start_editing(&mut self) -> Result<(), ScanError> {
        self.set_editing("edit", true)
    }

    pub fn stop_editing(&mut self) -> Result<(), ScanError> {
        self.set_editing("done editing", false)
    }

    /// Overwrite one field of the candidate profile. Requires editing mode.
    ///
    /// A blank value is rejected and the candidate keeps its old value.
    pub fn edit_field(&mut self, field: ProfileField, value: &str) -> Result<(), ScanError> {
        let candidate = self.editable_candidate("edit field")?;
        let edited = candidate.with_field(field, value);
        edited.validate()?;
        *candidate = edited;
        Ok(())
    }

    /// Replace the whole candidate profile. Requires editing mode.
    pub fn replace_candidate(&mut self, profile: Profile) -> Result<(), ScanError> {
        let candidate = self.editable_candidate("replace profile")?;
        profile.validate()?;
        *candidate = profile;
        Ok(())
    }

    /// Commit the reviewed result as a new check-in at `now`.
    ///
    /// On a store error the session stays in review.
    pub fn save<S: Slot>(
        &mut self,
        desk: &mut Desk<S>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, ScanError> {
        let ScanState::Reviewing {
            image,
            raw,
            candidate,
            ..
        } = &self.state
        else {
            return Err(self.not_ready("save"));
        };

        let record =
            VisitorRecord::check_in(image.preview.clone(), raw.clone(), candidate.clone(), now);
        let id = desk.check_in(record)?;
        self.state = ScanState::Saved { id };
        Ok(id)
    }

    /// Discard everything and wait for a new image. Any in-flight analysis
    /// result will be ignored.
    pub fn reset(&mut self) {
        self.attempts += 1;
        self.state = ScanState::AwaitingImage;
    }

    fn set_editing(&mut self, action: &'static str, on: bool) -> Result<(), ScanError> {
        let state = self.state.name();
        match &mut self.state {
            ScanState::Reviewing { editing, .. } => {
                *editing = on;
                Ok(())
            }
            _ => Err(ScanError::NotReady { action, state }),
        }
    }

    fn editable_candidate(&mut self, action: &'static str) -> Result<&mut Profile, ScanError> {
        let state = self.state.name();
        match &mut self.state {
            ScanState::Reviewing {
                candidate,
                editing: true,
                ..
            } => Ok(candidate),
            _ => Err(ScanError::NotReady { action, state }),
        }
    }

    fn not_ready(&self, action: &'static str) -> ScanError {
        ScanError::NotReady {
            action,
            state: self.state.name(),
        }
    }
}
