use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PLAN_NOT_EMPTY: &str = "error: After applying this test step, the plan was not empty";
pub const EXPECTED_ERROR_MISSING: &str = "expected an error but got none";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndicatorSetError {
    #[error("indicator set is empty")]
    Empty,
    #[error("indicator #{0} is an empty string")]
    BlankIndicator(usize),
}

/// Ordered, non-empty set of substrings that mark a test output as drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct IndicatorSet {
    indicators: Vec<String>,
}

impl IndicatorSet {
    pub fn new<I, S>(indicators: I) -> Result<Self, IndicatorSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let indicators: Vec<String> = indicators.into_iter().map(Into::into).collect();
        if indicators.is_empty() {
            return Err(IndicatorSetError::Empty);
        }
        if let Some(idx) = indicators.iter().position(|s| s.is_empty()) {
            return Err(IndicatorSetError::BlankIndicator(idx + 1));
        }
        Ok(Self { indicators })
    }

    // construction guarantees at least one entry
    pub fn first(&self) -> &str {
        &self.indicators[0]
    }

    pub fn first_match(&self, output: &str) -> Option<&str> {
        self.indicators
            .iter()
            .find(|indicator| output.contains(indicator.as_str()))
            .map(String::as_str)
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
        }
    }
}

impl TryFrom<Vec<String>> for IndicatorSet {
    type Error = IndicatorSetError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IndicatorSet> for Vec<String> {
    fn from(value: IndicatorSet) -> Self {
        value.indicators
    }
}

impl Display for IndicatorSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let quoted: Vec<String> = self.indicators.iter().map(|s| format!("{s:?}")).collect();
        write!(f, "[{}]", quoted.join(", "))
    }
}

pub fn default_indicators() -> Vec<String> {
    vec![
        PLAN_NOT_EMPTY.to_string(),
        EXPECTED_ERROR_MISSING.to_string(),
    ]
}
