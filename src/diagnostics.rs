use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    ArtifactClassified {
        path: PathBuf,
        lines: usize,
        matches: usize,
    },
    UnparseableLine {
        line_number: usize,
        message: String,
    },
    RecordMatched {
        line_number: usize,
        indicator: String,
    },
}

/// Receives non-fatal events emitted while classifying an artifact.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics {
    pub profile: String,
}

impl TracingDiagnostics {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ArtifactClassified {
                path,
                lines,
                matches,
            } => {
                debug!(
                    profile = %self.profile,
                    path = %path.display(),
                    lines,
                    matches,
                    "artifact classified"
                );
            }
            Diagnostic::UnparseableLine {
                line_number,
                message,
            } => {
                warn!(
                    profile = %self.profile,
                    line = line_number,
                    error = %message,
                    "skipping unparseable log line"
                );
            }
            Diagnostic::RecordMatched {
                line_number,
                indicator,
            } => {
                debug!(profile = %self.profile, line = line_number, %indicator, "drift indicator matched");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn unparseable_lines(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::UnparseableLine { line_number, .. } => Some(line_number),
                _ => None,
            })
            .collect()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, diagnostic: Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
