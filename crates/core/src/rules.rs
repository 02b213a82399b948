//! The meaningfulness rule table (A1–A7).
//!
//! Every operation is classified from the support type of its source, the
//! kind of target it is asked to produce, and a handful of geometric and
//! statistical predicates. The classification is a pure lookup into
//! [`TABLE`]: each rule either fires or not, and the strongest effect among
//! the rules that fire decides the [`Disposition`].
//!
//! ```text
//! (operation, source, target, predicates) ──TABLE──▶ Proceed
//!                                                   | ProceedWithWarning(codes)
//!                                                   | Refuse(code)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::ReductionClass;
use crate::diagnostics::DiagnosticCode;

/// Named meaningfulness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Aggregate,
    Interpolate,
    Density,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Aggregate => "aggregate",
            Operation::Interpolate => "interpolate",
            Operation::Density => "density",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Support type of the dataset an operation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Field whose observations are point samples.
    PointField,
    /// Field whose observations are constant over their cell or polygon.
    AreaField,
    Objects,
    Lattice,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::PointField => "point field",
            SourceKind::AreaField => "area-constant field",
            SourceKind::Objects => "objects",
            SourceKind::Lattice => "lattice",
        };
        f.write_str(name)
    }
}

/// Support requested from an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Points,
    /// Aggregation units (polygons, grid cells).
    Units,
    /// Prediction blocks.
    Blocks,
}

/// Auxiliary facts the table conditions on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicates {
    /// Class of the requested reduction (aggregate only).
    pub reduction: Option<ReductionClass>,
    /// Target lies inside the source window or domain.
    pub target_within_extent: bool,
    /// The source window was declared, not inferred.
    pub window_authoritative: bool,
    /// Target units are geometrically identical to the source units.
    pub same_units: bool,
}

impl Default for Predicates {
    fn default() -> Self {
        Self {
            reduction: None,
            target_within_extent: true,
            window_authoritative: true,
            same_units: false,
        }
    }
}

/// What a fired rule does to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Warn,
    Refuse,
}

/// One row of the rule table.
pub struct Rule {
    pub id: RuleId,
    pub code: DiagnosticCode,
    pub effect: Effect,
    pub summary: &'static str,
    applies: fn(Operation, SourceKind, TargetKind, &Predicates) -> bool,
}

impl Rule {
    pub fn fires(
        &self,
        op: Operation,
        source: SourceKind,
        target: TargetKind,
        predicates: &Predicates,
    ) -> bool {
        (self.applies)(op, source, target, predicates)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("effect", &self.effect)
            .finish()
    }
}

fn completeness_dependent(p: &Predicates) -> bool {
    matches!(
        p.reduction,
        Some(ReductionClass::Extensive) | Some(ReductionClass::Extremal)
    )
}

pub static TABLE: [Rule; 7] = [
    Rule {
        id: RuleId::A1,
        code: DiagnosticCode::InterpolatingEntityPattern,
        effect: Effect::Warn,
        summary: "a point pattern is not a sample of a field; its intensity is not a value",
        applies: |op, src, _, _| op == Operation::Interpolate && src == SourceKind::Objects,
    },
    Rule {
        id: RuleId::A2,
        code: DiagnosticCode::TargetExceedsWindow,
        effect: Effect::Refuse,
        summary: "entity sums and counts hold only inside the window of a complete pattern",
        applies: |op, src, _, p| {
            op == Operation::Aggregate
                && src == SourceKind::Objects
                && completeness_dependent(p)
                && !p.target_within_extent
        },
    },
    Rule {
        id: RuleId::A3,
        code: DiagnosticCode::AggregateQueriedAtPoint,
        effect: Effect::Warn,
        summary: "lattice values describe whole units, not the points inside them",
        applies: |op, src, _, _| op == Operation::Query && src == SourceKind::Lattice,
    },
    Rule {
        id: RuleId::A4,
        code: DiagnosticCode::CannotReaggregateLattice,
        effect: Effect::Refuse,
        summary: "aggregates cannot be moved to other units without disaggregation",
        applies: |op, src, _, p| {
            matches!(op, Operation::Aggregate | Operation::Interpolate)
                && src == SourceKind::Lattice
                && !p.same_units
        },
    },
    Rule {
        id: RuleId::A5,
        code: DiagnosticCode::NoWindow,
        effect: Effect::Warn,
        summary: "an inferred window is complete only over the entities' own extent",
        applies: |op, src, _, p| {
            op == Operation::Aggregate && src == SourceKind::Objects && !p.window_authoritative
        },
    },
    Rule {
        id: RuleId::A6,
        code: DiagnosticCode::ExtrapolationBeyondDomain,
        effect: Effect::Warn,
        summary: "predictions outside the observed domain carry no claim of representativeness",
        applies: |op, src, _, p| {
            op == Operation::Interpolate && src != SourceKind::Lattice && !p.target_within_extent
        },
    },
    Rule {
        id: RuleId::A7,
        code: DiagnosticCode::MeanOfCounts,
        effect: Effect::Warn,
        summary: "per-area statistics of entities need an explicit area normalization",
        applies: |op, src, _, p| {
            op == Operation::Aggregate
                && src == SourceKind::Objects
                && p.reduction == Some(ReductionClass::Intensive)
        },
    },
];

/// Look up a rule by id.
pub fn rule(id: RuleId) -> &'static Rule {
    &TABLE[id as usize]
}

/// Terminal outcome of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Proceed,
    ProceedWithWarning,
    Refuse,
}

/// A fired rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    pub rule: RuleId,
    pub code: DiagnosticCode,
    pub effect: Effect,
}

/// Result of [`classify`]: the disposition plus every rule that fired,
/// in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub disposition: Disposition,
    pub findings: Vec<Finding>,
}

impl Verdict {
    fn from_findings(findings: Vec<Finding>) -> Self {
        let disposition = if findings.iter().any(|f| f.effect == Effect::Refuse) {
            Disposition::Refuse
        } else if findings.is_empty() {
            Disposition::Proceed
        } else {
            Disposition::ProceedWithWarning
        };
        Self {
            disposition,
            findings,
        }
    }

    /// Turn a refusal for `code` into a warning.
    pub fn soften(self, code: DiagnosticCode) -> Self {
        let findings = self
            .findings
            .into_iter()
            .map(|f| {
                if f.code == code {
                    Finding {
                        effect: Effect::Warn,
                        ..f
                    }
                } else {
                    f
                }
            })
            .collect();
        Self::from_findings(findings)
    }

    /// First refusing finding, if any.
    pub fn refusal(&self) -> Option<&Finding> {
        self.findings.iter().find(|f| f.effect == Effect::Refuse)
    }

    pub fn fired(&self, id: RuleId) -> bool {
        self.findings.iter().any(|f| f.rule == id)
    }
}

/// Classify an operation against the rule table.
pub fn classify(
    op: Operation,
    source: SourceKind,
    target: TargetKind,
    predicates: &Predicates,
) -> Verdict {
    let findings = TABLE
        .iter()
        .filter(|r| r.fires(op, source, target, predicates))
        .map(|r| Finding {
            rule: r.id,
            code: r.code,
            effect: r.effect,
        })
        .collect();
    Verdict::from_findings(findings)
}
