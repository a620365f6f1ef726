//! Analysis request types and submit-time validation.
//!
//! A raw [`SubmitAnalysis`] body is turned into an [`AnalysisInput`] only
//! after validation succeeds, so nothing downstream of the submit handler
//! ever sees an unvalidated URL or device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum accepted length of a target URL.
pub const MAX_URL_LENGTH: usize = 2048;

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Device profile the analysis emulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
        }
    }
}

impl FromStr for Device {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            other => Err(CoreError::Validation(format!(
                "device must be one of desktop, mobile (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request / input
// ---------------------------------------------------------------------------

/// DTO for `POST /api/analyze`. Also the request body sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnalysis {
    #[validate(url(message = "url must be an absolute URL"))]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
}

/// A validated analysis request, as stored on the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub url: String,
    pub device: Device,
}

impl SubmitAnalysis {
    /// Validate the request and resolve defaults.
    ///
    /// A missing `device` becomes [`Device::Desktop`].
    pub fn into_input(self) -> Result<AnalysisInput, CoreError> {
        if self.url.len() > MAX_URL_LENGTH {
            return Err(CoreError::Validation(format!(
                "url exceeds maximum length of {MAX_URL_LENGTH} characters"
            )));
        }
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        Ok(AnalysisInput {
            url: self.url.trim().to_string(),
            device: self.device.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
