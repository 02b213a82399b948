//! Diagnostics attached to construction and operation results.
//!
//! Meaningfulness violations are advisory by default: an operation still
//! returns its value, wrapped in [`Assessed`] together with the ordered
//! list of diagnostics that explain why the value should be read with care.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::RuleId;

/// Whether a diagnostic is advisory or fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Stable identifier of every meaningfulness outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Objects built without a window; an implicit one was inferred.
    NoWindow,
    /// Extensive entity aggregate over units not covered by the window.
    TargetExceedsWindow,
    /// Aggregate data re-aggregated onto different units.
    CannotReaggregateLattice,
    /// Prediction requested outside the field's domain.
    ExtrapolationBeyondDomain,
    /// Per-area statistic of entity marks without area normalization.
    MeanOfCounts,
    /// A point pattern used as if it sampled a field.
    InterpolatingEntityPattern,
    /// Areal aggregate read back at a point.
    AggregateQueriedAtPoint,
}

impl DiagnosticCode {
    pub const ALL: [DiagnosticCode; 7] = [
        DiagnosticCode::NoWindow,
        DiagnosticCode::TargetExceedsWindow,
        DiagnosticCode::CannotReaggregateLattice,
        DiagnosticCode::ExtrapolationBeyondDomain,
        DiagnosticCode::MeanOfCounts,
        DiagnosticCode::InterpolatingEntityPattern,
        DiagnosticCode::AggregateQueriedAtPoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::NoWindow => "NoWindow",
            DiagnosticCode::TargetExceedsWindow => "TargetExceedsWindow",
            DiagnosticCode::CannotReaggregateLattice => "CannotReaggregateLattice",
            DiagnosticCode::ExtrapolationBeyondDomain => "ExtrapolationBeyondDomain",
            DiagnosticCode::MeanOfCounts => "MeanOfCounts",
            DiagnosticCode::InterpolatingEntityPattern => "InterpolatingEntityPattern",
            DiagnosticCode::AggregateQueriedAtPoint => "AggregateQueriedAtPoint",
        }
    }

    /// The rule that produces this code.
    pub fn rule(&self) -> RuleId {
        match self {
            DiagnosticCode::InterpolatingEntityPattern => RuleId::A1,
            DiagnosticCode::TargetExceedsWindow => RuleId::A2,
            DiagnosticCode::AggregateQueriedAtPoint => RuleId::A3,
            DiagnosticCode::CannotReaggregateLattice => RuleId::A4,
            DiagnosticCode::NoWindow => RuleId::A5,
            DiagnosticCode::ExtrapolationBeyondDomain => RuleId::A6,
            DiagnosticCode::MeanOfCounts => RuleId::A7,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{kind, code, message}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn rule(&self) -> RuleId {
        self.code.rule()
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Same record with severity raised to `Error`.
    pub fn escalated(mut self) -> Self {
        self.severity = Severity::Error;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{kind} [{} {}] {}", self.rule(), self.code, self.message)
    }
}

/// Ordered sequence of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.0.iter().any(|d| d.code == code)
    }

    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.0.iter().map(|d| d.code).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(v: Vec<Diagnostic>) -> Self {
        Self(v)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A value paired with the diagnostics produced while computing it.
#[derive(Debug, Clone)]
pub struct Assessed<T> {
    pub value: T,
    pub diagnostics: Diagnostics,
}

impl<T> Assessed<T> {
    /// A value with no diagnostics.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with(value: T, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Assessed<U> {
        Assessed {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_maps_to_a_distinct_rule() {
        let mut rules: Vec<RuleId> = DiagnosticCode::ALL.iter().map(|c| c.rule()).collect();
        rules.sort();
        rules.dedup();
        assert_eq!(rules.len(), DiagnosticCode::ALL.len());
    }

    #[test]
    fn test_display_carries_rule_and_code() {
        let d = Diagnostic::warning(DiagnosticCode::MeanOfCounts, "mean of 3 entities");
        assert_eq!(d.to_string(), "warning [A7 MeanOfCounts] mean of 3 entities");
        assert_eq!(
            d.escalated().to_string(),
            "error [A7 MeanOfCounts] mean of 3 entities"
        );
    }

    #[test]
    fn test_diagnostics_queries() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.push(Diagnostic::warning(DiagnosticCode::NoWindow, "inferred"));
        diags.push(Diagnostic::warning(DiagnosticCode::MeanOfCounts, "mean"));

        assert_eq!(diags.len(), 2);
        assert!(diags.contains(DiagnosticCode::NoWindow));
        assert!(!diags.contains(DiagnosticCode::TargetExceedsWindow));
        assert!(!diags.has_errors());
        assert_eq!(
            diags.codes(),
            vec![DiagnosticCode::NoWindow, DiagnosticCode::MeanOfCounts]
        );
    }

    #[test]
    fn test_assessed_map_keeps_diagnostics() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(DiagnosticCode::NoWindow, "inferred"));
        let a = Assessed::with(2, diags).map(|v| v * 10);
        assert_eq!(a.value, 20);
        assert!(!a.is_clean());
    }
}
