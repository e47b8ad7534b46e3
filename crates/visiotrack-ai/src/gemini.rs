//! Gemini `generateContent` client.
//!
//! Sends the visitor photo as inline JPEG data together with a fixed
//! instruction and a JSON response schema, then validates the returned
//! profile with [`Profile::from_json`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use visiotrack_core::analyzer::ANALYSIS_PROMPT;
use visiotrack_core::{AnalysisError, Analyzer, CapturedImage, Profile};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Longest error body kept in an [`AnalysisError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Analyzer backed by the Gemini API.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        if config.api_key.trim().is_empty() {
            return Err(AnalysisError::NotConfigured(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl Analyzer for GeminiClient {
    async fn analyze(&self, image: &CapturedImage) -> Result<Profile, AnalysisError> {
        let url = self.endpoint();
        tracing::debug!(url = %url, model = %self.config.model, "calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(image, self.config.temperature))
            .send()
            .await
            .map_err(|e| AnalysisError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        let text = response_text(&parsed)?;
        Profile::from_json(&text)
    }
}

/// JSON body for a `generateContent` call.
fn request_body(image: &CapturedImage, temperature: f32) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": "image/jpeg", "data": image.jpeg_base64 } },
                { "text": ANALYSIS_PROMPT }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
            "temperature": temperature
        }
    })
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {
                "type": "STRING",
                "description": "A plausible name for the person based on general appearance. If a name is impossible to determine, provide a descriptive title like 'Professional Man in his 40s'."
            },
            "age": {
                "type": "STRING",
                "description": "A plausible estimation of the person's age range (e.g., '25-30', '40-45')."
            },
            "gender": {
                "type": "STRING",
                "description": "The estimated gender of the person (e.g., Male, Female)."
            },
            "profession": {
                "type": "STRING",
                "description": "A likely profession based on their attire, background, and overall appearance (e.g., Student, Doctor, Corporate Executive, Tourist)."
            }
        },
        "required": ["name", "age", "gender", "profession"]
    })
}

/// Concatenated text parts of the first candidate.
fn response_text(response: &GenerateContentResponse) -> Result<String, AnalysisError> {
    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text)
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
