use std::path::PathBuf;
use visiotrack_ai::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use visiotrack_ai::GeminiConfig;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database holding the visitor log.
    pub db_path: PathBuf,
    /// V4L2 device path used by `scan --camera` (default: /dev/video0).
    pub camera_device: String,
    /// Frames discarded before a snapshot (auto-exposure settling).
    pub warmup_frames: usize,
    /// Analyzer settings. The API key may be empty; scanning then fails.
    pub gemini: GeminiConfig,
}

impl Config {
    /// Load configuration from `VISIOTRACK_*` and `GEMINI_API_KEY` with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("visiotrack");

        let db_path = std::env::var("VISIOTRACK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("visitors.db"));

        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .unwrap_or_default();

        Self {
            db_path,
            camera_device: std::env::var("VISIOTRACK_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            warmup_frames: env_usize("VISIOTRACK_WARMUP_FRAMES", 4),
            gemini: GeminiConfig {
                api_key,
                model: std::env::var("VISIOTRACK_MODEL")
                    .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                api_base: std::env::var("VISIOTRACK_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                temperature: env_f32("VISIOTRACK_TEMPERATURE", DEFAULT_TEMPERATURE),
            },
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_helpers_fall_back_on_garbage() {
        std::env::set_var("VISIOTRACK_TEST_GARBAGE_NUMBER", "lots");
        assert_eq!(env_usize("VISIOTRACK_TEST_GARBAGE_NUMBER", 4), 4);
        assert_eq!(env_f32("VISIOTRACK_TEST_GARBAGE_NUMBER", 0.2), 0.2);
        assert_eq!(env_usize("VISIOTRACK_TEST_UNSET_NUMBER", 7), 7);
    }

    #[test]
    fn test_env_helpers_parse() {
        std::env::set_var("VISIOTRACK_TEST_TEMPERATURE", "0.7");
        assert_eq!(env_f32("VISIOTRACK_TEST_TEMPERATURE", 0.2), 0.7);
    }
}
