//! Accessor configuration, loadable from a `tessera.toml` file.
//!
//! ```toml
//! timezone = "Europe/Paris"
//! date_format = "yyyy-MM-dd"
//! number_format = "%.2f"
//! parallel_threshold = 10000
//! ```

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::data::{DataError, DataResult};

/// Default threshold above which per-row host functions run on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// Page key echoed back when a request does not carry one
pub const DEFAULT_PAGE_KEY: &str = "unknown page";

/// Settings shared by every accessor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessorConfig {
    /// IANA timezone used to localize naive datetime columns before they are
    /// converted to UTC for the client.
    pub timezone: String,

    /// Display format attached to datetime column descriptors.
    pub date_format: Option<String>,

    /// Display format attached to numeric column descriptors.
    pub number_format: Option<String>,

    /// Row count above which host functions are evaluated in parallel.
    pub parallel_threshold: usize,

    /// Page key used when the request has none.
    pub default_page_key: String,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            date_format: None,
            number_format: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            default_page_key: DEFAULT_PAGE_KEY.to_string(),
        }
    }
}

impl AccessorConfig {
    /// Load the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> DataResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DataError::Config(format!(
                "failed to read '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse the configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or names an unknown timezone.
    pub fn parse(content: &str) -> DataResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| DataError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> DataResult<()> {
        self.tz().map(|_| ())
    }

    /// The configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA timezone.
    pub fn tz(&self) -> DataResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| DataError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Builder-style timezone override.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}
