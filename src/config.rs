//! Probe configuration.
//!
//! Two layers:
//!
//! - [`ProbeConfig`]: plain data loaded from a `probe.toml` (or defaults).
//!   Budgets plus constant yes/no policies. This is what the CLI reads.
//! - [`ProbeOptions`]: what an engine actually runs with. Same budgets, but each
//!   policy is a predicate that sees the stream's state at the moment the
//!   decision is made. Build one from a [`ProbeConfig`], then override
//!   individual predicates with the builder methods.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! # max_mime_chunk_offset = 200    # omit = largest header any format needs to decide
//! max_mime_buffer_size = 4100       # bytes buffered while the format is unknown
//! max_dimensions_buffer_size = 64000 # bytes buffered while dimensions are unknown
//!
//! [policy]
//! require_mime = true               # unknown format is an error
//! require_dimensions = true         # missing dimensions is an error
//! exif = false                      # read JPEG EXIF orientation
//! require_valid_exif = false        # malformed EXIF is an error
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::error::ExifError;
use crate::formats::Format;
use crate::types::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default ceiling on bytes buffered while looking for a format.
pub const DEFAULT_MAX_MIME_BUFFER_SIZE: usize = 4100;
/// Default ceiling on bytes buffered while looking for dimensions.
pub const DEFAULT_MAX_DIMENSIONS_BUFFER_SIZE: usize = 64000;

/// Probe configuration loaded from `probe.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Byte budgets for format and dimension detection.
    pub limits: LimitsConfig,
    /// Which missing or malformed information is fatal.
    pub policy: PolicyConfig,
}

impl ProbeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_mime_chunk_offset == Some(0) {
            return Err(ConfigError::Validation(
                "limits.max_mime_chunk_offset must be non-zero".into(),
            ));
        }
        if self.limits.max_mime_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_mime_buffer_size must be non-zero".into(),
            ));
        }
        if self.limits.max_dimensions_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_dimensions_buffer_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Byte budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Stream offset past which format detection gives up. When absent, the
    /// largest number of header bytes any registered format needs to decide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mime_chunk_offset: Option<u64>,
    /// Bytes buffered while the format is still unknown.
    pub max_mime_buffer_size: usize,
    /// Bytes buffered while dimensions are still unknown.
    pub max_dimensions_buffer_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_mime_chunk_offset: None,
            max_mime_buffer_size: DEFAULT_MAX_MIME_BUFFER_SIZE,
            max_dimensions_buffer_size: DEFAULT_MAX_DIMENSIONS_BUFFER_SIZE,
        }
    }
}

/// Constant policies. Each one becomes an always-true or always-false
/// predicate in [`ProbeOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub require_mime: bool,
    pub require_dimensions: bool,
    pub exif: bool,
    pub require_valid_exif: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            require_mime: true,
            require_dimensions: true,
            exif: false,
            require_valid_exif: false,
        }
    }
}

/// Load `probe.toml` from `path`.
///
/// Returns defaults if the file does not exist. Returns `Err` if it exists but
/// is not valid TOML, has unknown keys, or fails validation.
pub fn load_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    if !path.exists() {
        return Ok(ProbeConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: ProbeConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// A documented `probe.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r#"# imgprobe configuration
# All options are optional - defaults shown below.

[limits]
# Stream offset past which format detection gives up.
# Omit to use the largest header any known format needs (200 bytes).
# max_mime_chunk_offset = 200

# Bytes buffered while the format is still unknown.
max_mime_buffer_size = 4100

# Bytes buffered while dimensions are still unknown.
max_dimensions_buffer_size = 64000

[policy]
# Fail when no known format is found.
require_mime = true

# Fail when the format is known but dimensions are not found.
require_dimensions = true

# Read EXIF orientation from JPEG APP1 segments and swap dimensions for
# rotated images (orientation 5-8).
exif = false

# Fail on malformed EXIF instead of ignoring it.
require_valid_exif = false
"#
}

// =============================================================================
// Runtime options
// =============================================================================

/// Stream state handed to the `require_mime` predicate.
#[derive(Debug, Clone, Copy)]
pub struct MimeContext<'a> {
    pub mime: Option<&'a str>,
    pub read_bytes: u64,
}

/// Stream state handed to the `require_dimensions` predicate.
#[derive(Debug, Clone, Copy)]
pub struct DimensionsContext<'a> {
    pub dimensions: Option<&'a Dimensions>,
    pub mime: Option<&'a str>,
    pub read_bytes: u64,
}

pub type RequireMimeFn = Box<dyn Fn(&MimeContext<'_>) -> bool + Send>;
pub type RequireDimensionsFn = Box<dyn Fn(&DimensionsContext<'_>) -> bool + Send>;
pub type ExifFn = Box<dyn Fn(&str, u64) -> bool + Send>;
pub type RequireValidExifFn = Box<dyn Fn(&ExifError, &str) -> bool + Send>;

/// Options an engine is constructed with. One per engine; never shared.
pub struct ProbeOptions {
    pub max_mime_chunk_offset: u64,
    pub max_mime_buffer_size: usize,
    pub max_dimensions_buffer_size: usize,
    pub require_mime: RequireMimeFn,
    pub require_dimensions: RequireDimensionsFn,
    pub exif: ExifFn,
    pub require_valid_exif: RequireValidExifFn,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}

impl ProbeOptions {
    /// Build options from config values, turning each policy flag into a
    /// constant predicate.
    pub fn from_config(config: &ProbeConfig) -> Self {
        let PolicyConfig {
            require_mime,
            require_dimensions,
            exif,
            require_valid_exif,
        } = config.policy.clone();
        Self {
            max_mime_chunk_offset: config
                .limits
                .max_mime_chunk_offset
                .unwrap_or_else(|| Format::max_min_bytes_to_decide() as u64),
            max_mime_buffer_size: config.limits.max_mime_buffer_size,
            max_dimensions_buffer_size: config.limits.max_dimensions_buffer_size,
            require_mime: Box::new(move |_| require_mime),
            require_dimensions: Box::new(move |_| require_dimensions),
            exif: Box::new(move |_, _| exif),
            require_valid_exif: Box::new(move |_, _| require_valid_exif),
        }
    }

    pub fn require_mime(mut self, f: impl Fn(&MimeContext<'_>) -> bool + Send + 'static) -> Self {
        self.require_mime = Box::new(f);
        self
    }

    pub fn require_dimensions(
        mut self,
        f: impl Fn(&DimensionsContext<'_>) -> bool + Send + 'static,
    ) -> Self {
        self.require_dimensions = Box::new(f);
        self
    }

    pub fn exif(mut self, f: impl Fn(&str, u64) -> bool + Send + 'static) -> Self {
        self.exif = Box::new(f);
        self
    }

    pub fn require_valid_exif(
        mut self,
        f: impl Fn(&ExifError, &str) -> bool + Send + 'static,
    ) -> Self {
        self.require_valid_exif = Box::new(f);
        self
    }

    pub fn max_dimensions_buffer_size(mut self, size: usize) -> Self {
        self.max_dimensions_buffer_size = size;
        self
    }

    pub fn max_mime_buffer_size(mut self, size: usize) -> Self {
        self.max_mime_buffer_size = size;
        self
    }

    pub fn max_mime_chunk_offset(mut self, offset: u64) -> Self {
        self.max_mime_chunk_offset = offset;
        self
    }
}

impl fmt::Debug for ProbeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeOptions")
            .field("max_mime_chunk_offset", &self.max_mime_chunk_offset)
            .field("max_mime_buffer_size", &self.max_mime_buffer_size)
            .field("max_dimensions_buffer_size", &self.max_dimensions_buffer_size)
            .finish_non_exhaustive()
    }
}
