//! Resolution options.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```rust,ignore
//! let options = ResolveOptions::from_json(r#"{ "dangling": "ignore" }"#)?;
//! ```

use serde::{Deserialize, Serialize};

/// What to do with a pointer or property reference whose target does not
/// exist in the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Abort the pass with
    /// [`ResolveError::DanglingReference`](crate::ResolveError::DanglingReference).
    #[default]
    Fail,
    /// Drop the edge, log a warning and keep going.
    Ignore,
}

/// Cranelift optimization level for compiled expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    /// The value of Cranelift's `opt_level` setting.
    pub fn as_cranelift(&self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitOptions {
    pub opt_level: OptLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    pub dangling: DanglingPolicy,
    pub jit: JitOptions,
}

impl ResolveOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_dangling(mut self, dangling: DanglingPolicy) -> Self {
        self.dangling = dangling;
        self
    }
}
