//! User settings and scheduler tuning.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::format::Format;

/// Settings pushed in by the host (popup/background).
///
/// Read-only from the core's point of view. An unrecognized `format`
/// deserializes to the default rather than failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(deserialize_with = "lenient_format")]
    pub format: Format,
    pub auto_copy: bool,
    pub multi_selection: bool,
    pub show_tooltips: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: Format::MathML,
            auto_copy: true,
            multi_selection: true,
            show_tooltips: true,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn lenient_format<'de, D>(deserializer: D) -> std::result::Result<Format, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Format::parse_lenient).unwrap_or_default())
}

/// Timing constants and error limits for detection and interaction.
///
/// All durations are milliseconds on the host clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Delay between start and the first engine detection.
    pub settle_delay_ms: u64,
    /// How long to wait for a MathJax "typesetting done" signal.
    pub renderer_ready_timeout_ms: u64,
    /// Follow-up rescans, measured from the first scan.
    pub rescan_delays_ms: [u64; 2],
    /// Quiet period after the last mutation before a scan runs.
    pub mutation_throttle_ms: u64,
    /// Containers registered per turn.
    pub batch_size: usize,
    pub max_init_attempts: u32,
    /// Extraction failures tolerated before extraction is switched off.
    pub max_errors: u32,
    pub success_reset_ms: u64,
    pub error_reset_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            renderer_ready_timeout_ms: 5_000,
            rescan_delays_ms: [1_000, 3_000],
            mutation_throttle_ms: 300,
            batch_size: 50,
            max_init_attempts: 3,
            max_errors: 10,
            success_reset_ms: 1_500,
            error_reset_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let s = Settings::from_json(r#"{"format":"latex"}"#).unwrap();
        assert_eq!(s.format, Format::LaTeX);
        assert!(s.auto_copy);
        assert!(s.multi_selection);
    }

    #[test]
    fn test_invalid_format_falls_back_to_mathml() {
        let s = Settings::from_json(r#"{"format":"png","autoCopy":false}"#).unwrap();
        assert_eq!(s.format, Format::MathML);
        assert!(!s.auto_copy);

        let s = Settings::from_json(r#"{"format":null}"#).unwrap();
        assert_eq!(s.format, Format::MathML);
    }

    #[test]
    fn test_scheduler_defaults() {
        let c = SchedulerConfig::default();
        assert_eq!(c.batch_size, 50);
        assert_eq!(c.max_init_attempts, 3);
        assert_eq!(c.rescan_delays_ms, [1_000, 3_000]);
    }
}
