//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::{Error, Result};

/// Strategy used to derive a window when none is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowInference {
    #[default]
    ConvexHull,
    BoundingBox,
}

/// What to do when an extensive entity aggregate reaches outside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowOverrun {
    /// Return no result.
    #[default]
    Refuse,
    /// Return the partial sum with a `TargetExceedsWindow` warning.
    Warn,
}

/// Policy knobs for the meaningfulness engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Treat every warning as fatal.
    pub warnings_as_errors: bool,
    /// Treat only these warnings as fatal.
    pub escalate: Vec<DiagnosticCode>,
    pub window_overrun: WindowOverrun,
    pub window_inference: WindowInference,
    /// Distance under which a query point coincides with a sample location.
    pub coincidence_tolerance: f64,
    /// Discretization points per block side for block prediction.
    pub block_discretization: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warnings_as_errors: false,
            escalate: Vec::new(),
            window_overrun: WindowOverrun::Refuse,
            window_inference: WindowInference::ConvexHull,
            coincidence_tolerance: 1e-9,
            block_discretization: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.coincidence_tolerance >= 0.0 && self.coincidence_tolerance.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "coincidence_tolerance",
                value: self.coincidence_tolerance.to_string(),
                reason: "must be a finite, non-negative distance".into(),
            });
        }
        if self.block_discretization == 0 {
            return Err(Error::InvalidParameter {
                name: "block_discretization",
                value: "0".into(),
                reason: "blocks need at least one discretization point".into(),
            });
        }
        Ok(())
    }

    pub fn escalates(&self, code: DiagnosticCode) -> bool {
        self.warnings_as_errors || self.escalate.contains(&code)
    }

    /// Fail with the first diagnostic the configuration treats as fatal.
    pub fn enforce(&self, diagnostics: Diagnostics) -> Result<Diagnostics> {
        let fatal = diagnostics
            .iter()
            .find(|d| !d.is_warning() || self.escalates(d.code))
            .cloned();
        match fatal {
            Some(d) => Err(Error::Escalated(Diagnostic::escalated(d))),
            None => Ok(diagnostics),
        }
    }
}
