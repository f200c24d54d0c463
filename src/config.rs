use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::{IndicatorSet, IndicatorSetError};
use crate::report::{ReportStyle, NO_DRIFT_MESSAGE};

pub const INTEGRATION_PROFILE: &str = "integration";
pub const UNIT_PROFILE: &str = "unit";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// GitHub Actions output file when `GITHUB_OUTPUT` is set, stdout otherwise.
    #[default]
    Auto,
    Github,
    Stdout,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    #[default]
    Text,
    Json,
    Table,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default)]
    pub format: DisplayFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub artifact: String,
    pub output_key: String,
    #[serde(default)]
    pub indicators: IndicatorSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_message: Option<String>,
    #[serde(default)]
    pub style: ReportStyle,
    #[serde(default)]
    pub only_failed_tests: bool,
}

/// A profile with every default filled in and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub name: String,
    pub artifact: PathBuf,
    pub output_key: String,
    pub indicators: IndicatorSet,
    pub default_message: String,
    pub style: ReportStyle,
    pub only_failed_tests: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile {profile}: artifact path is empty")]
    EmptyArtifact { profile: String },
    #[error("profile {profile}: invalid output key {key:?} (use letters, digits, '_' or '-')")]
    InvalidOutputKey { profile: String, key: String },
}

#[derive(Debug, Error)]
#[error("unknown profile: {name} (configured: {known})")]
pub struct UnknownProfile {
    pub name: String,
    pub known: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sink: Option<SinkKind>,
    pub format: Option<DisplayFormat>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub artifact: Option<String>,
    pub output_key: Option<String>,
    pub indicators: Option<Vec<String>>,
    pub default_message: Option<String>,
    pub legacy: bool,
    pub only_failed_tests: bool,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        self.artifact.is_none()
            && self.output_key.is_none()
            && self.indicators.is_none()
            && self.default_message.is_none()
            && !self.legacy
            && !self.only_failed_tests
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/drift-report/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(sink) = overrides.sink {
            self.output.sink = sink;
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
    }

    pub fn profile(&self, name: &str) -> Result<&ProfileConfig, UnknownProfile> {
        self.profiles.get(name).ok_or_else(|| UnknownProfile {
            name: name.to_string(),
            known: self.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
        })
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[output]
# auto | github | stdout
sink = "auto"
# text | json | table (stdout only)
format = "text"

[profiles.integration]
artifact = "integration-test-results.json"
output_key = "drift_report"
indicators = [
    "error: After applying this test step, the plan was not empty",
    "expected an error but got none",
]
# default_message = "No drift detected."
style = "standard"
only_failed_tests = false

[profiles.unit]
artifact = "unit-test-results.json"
output_key = "failed_tests_with_drift"
indicators = [
    "error: After applying this test step, the plan was not empty",
    "expected an error but got none",
]
# default_message = "No drift detected."
style = "standard"
only_failed_tests = false
"#;
        template.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            profiles: default_profiles(),
        }
    }
}

impl ProfileConfig {
    pub fn new(artifact: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            output_key: output_key.into(),
            indicators: IndicatorSet::default(),
            default_message: None,
            style: ReportStyle::Standard,
            only_failed_tests: false,
        }
    }

    pub fn apply_overrides(
        &mut self,
        overrides: ProfileOverrides,
    ) -> Result<(), IndicatorSetError> {
        if let Some(indicators) = overrides.indicators {
            self.indicators = IndicatorSet::new(indicators)?;
        }
        if let Some(artifact) = overrides.artifact {
            self.artifact = artifact;
        }
        if let Some(output_key) = overrides.output_key {
            self.output_key = output_key;
        }
        if let Some(default_message) = overrides.default_message {
            self.default_message = Some(default_message);
        }
        if overrides.legacy {
            self.style = ReportStyle::Legacy;
        }
        if overrides.only_failed_tests {
            self.only_failed_tests = true;
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedProfile, ProfileError> {
        if self.artifact.trim().is_empty() {
            return Err(ProfileError::EmptyArtifact {
                profile: name.to_string(),
            });
        }
        if !is_valid_output_key(&self.output_key) {
            return Err(ProfileError::InvalidOutputKey {
                profile: name.to_string(),
                key: self.output_key.clone(),
            });
        }
        let indicators = self.indicators.clone();
        let default_message = match (&self.default_message, self.style) {
            (Some(message), _) => message.clone(),
            (None, ReportStyle::Standard) => NO_DRIFT_MESSAGE.to_string(),
            (None, ReportStyle::Legacy) => indicators.first().to_string(),
        };
        Ok(ResolvedProfile {
            name: name.to_string(),
            artifact: expand_tilde(&self.artifact),
            output_key: self.output_key.clone(),
            indicators,
            default_message,
            style: self.style,
            only_failed_tests: self.only_failed_tests,
        })
    }
}

pub fn is_valid_output_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn default_profiles() -> BTreeMap<String, ProfileConfig> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        INTEGRATION_PROFILE.to_string(),
        ProfileConfig::new("integration-test-results.json", "drift_report"),
    );
    profiles.insert(
        UNIT_PROFILE.to_string(),
        ProfileConfig::new("unit-test-results.json", "failed_tests_with_drift"),
    );
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_default_config() {
        let parsed = Config::from_toml(&Config::default_template()).expect("template parses");
        let defaults = Config::default();
        assert_eq!(parsed.profiles, defaults.profiles);
        assert_eq!(parsed.output.sink, SinkKind::Auto);
        assert_eq!(parsed.output.format, DisplayFormat::Text);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed = Config::from_toml("[output]\nsink = \"stdout\"\n").expect("parses");
        assert_eq!(parsed.output.sink, SinkKind::Stdout);
        assert_eq!(
            parsed.profile(UNIT_PROFILE).expect("unit profile").output_key,
            "failed_tests_with_drift"
        );
    }

    #[test]
    fn profile_without_indicators_uses_both_generations() {
        let parsed = Config::from_toml(
            "[profiles.nightly]\nartifact = \"nightly.json\"\noutput_key = \"nightly_drift\"\n",
        )
        .expect("parses");
        let resolved = parsed
            .profile("nightly")
            .expect("nightly profile")
            .resolve("nightly")
            .expect("resolves");
        assert_eq!(resolved.indicators, IndicatorSet::default());
        assert_eq!(resolved.default_message, NO_DRIFT_MESSAGE);
        assert!(parsed.profile(INTEGRATION_PROFILE).is_err());
    }

    #[test]
    fn legacy_style_falls_back_to_first_indicator() {
        let mut profile = ProfileConfig::new("a.json", "drift_report");
        profile
            .apply_overrides(ProfileOverrides {
                legacy: true,
                ..ProfileOverrides::default()
            })
            .expect("no indicator override");
        let resolved = profile.resolve("a").expect("resolves");
        assert_eq!(resolved.style, ReportStyle::Legacy);
        assert_eq!(
            resolved.default_message,
            "error: After applying this test step, the plan was not empty"
        );
    }

    #[test]
    fn rejects_bad_keys_and_indicators() {
        let profile = ProfileConfig::new("a.json", "drift report");
        assert!(matches!(
            profile.resolve("a"),
            Err(ProfileError::InvalidOutputKey { .. })
        ));
        let mut profile = ProfileConfig::new("a.json", "drift_report");
        let overridden = profile.apply_overrides(ProfileOverrides {
            indicators: Some(vec!["plan".to_string(), String::new()]),
            ..ProfileOverrides::default()
        });
        assert_eq!(overridden, Err(IndicatorSetError::BlankIndicator(2)));
        let profile = ProfileConfig::new("  ", "drift_report");
        assert!(matches!(
            profile.resolve("a"),
            Err(ProfileError::EmptyArtifact { .. })
        ));
    }

    #[test]
    fn unknown_profile_lists_known_names() {
        let err = Config::default().profile("nightly").expect_err("unknown");
        assert_eq!(err.known, "integration, unit");
    }
}
