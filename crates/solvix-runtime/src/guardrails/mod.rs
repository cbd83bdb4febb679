//! Post-generation checks on draft bodies.
//!
//! A provider may invent invoice numbers, amounts or dates that are not in
//! the case context. Each [`Guardrail`] scans the draft and reports one or
//! more [`GuardrailCheck`]s; the [`GuardrailPipeline`] runs them in severity
//! order and tells the generator whether to ask for a corrected draft.
//!
//! | Guardrail | Severity | Fails when |
//! |-----------|----------|------------|
//! | `factual_grounding` | critical | an invoice number or amount is not in the context |
//! | `numerical_consistency` | critical | a stated total or days-overdue figure is wrong |
//! | `temporal_consistency` | high | a stated due date matches no obligation |
//! | `contextual_coherence` | medium | dispute, hardship or broken-promise history is ignored |
//!
//! Critical and high failures block; medium failures are reported as
//! warnings only.

mod coherence;
mod grounding;
mod numerical;
mod temporal;

pub use coherence::ContextualCoherenceGuardrail;
pub use grounding::FactualGroundingGuardrail;
pub use numerical::NumericalConsistencyGuardrail;
pub use temporal::TemporalConsistencyGuardrail;

use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use solvix_core::CaseContext;

lazy_static! {
    /// A money figure such as `1,550.50` or `300`.
    static ref FIGURE: Regex = Regex::new(r"^[\d,]*\d(?:\.\d+)?$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn blocks(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

/// Outcome of one check inside a guardrail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailCheck {
    pub guardrail: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

impl GuardrailCheck {
    pub fn pass(guardrail: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            guardrail,
            severity,
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(guardrail: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(guardrail, severity = ?severity, %message, "guardrail check failed");
        Self {
            guardrail,
            severity,
            passed: false,
            message,
        }
    }

    pub fn blocks(&self) -> bool {
        !self.passed && self.severity.blocks()
    }
}

/// One family of checks over a draft body.
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity;

    fn check(&self, draft: &str, context: &CaseContext) -> Vec<GuardrailCheck>;
}

/// Every check that ran, in run order.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailReport {
    checks: Vec<GuardrailCheck>,
}

impl GuardrailReport {
    pub fn checks(&self) -> &[GuardrailCheck] {
        &self.checks
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn should_block(&self) -> bool {
        self.checks.iter().any(GuardrailCheck::blocks)
    }

    /// Names of guardrails with a blocking failure, deduplicated.
    pub fn blocking_guardrails(&self) -> Vec<String> {
        names(self.checks.iter().filter(|c| c.blocks()))
    }

    pub fn warnings(&self) -> Vec<String> {
        names(self.checks.iter().filter(|c| !c.passed && !c.severity.blocks()))
    }

    /// Text appended to the user prompt when asking for a corrected draft.
    /// Empty when nothing failed.
    pub fn retry_feedback(&self) -> String {
        let failures: Vec<&GuardrailCheck> = self.checks.iter().filter(|c| !c.passed).collect();
        if failures.is_empty() {
            return String::new();
        }

        let mut out =
            String::from("\n\nYour previous draft failed validation. Fix these issues:\n");
        for failure in failures {
            let _ = writeln!(out, "- {}: {}", failure.guardrail, failure.message);
        }
        out.push_str(
            "Use only invoice numbers, amounts and dates that appear in the case details above.",
        );
        out
    }

    pub fn summary(&self, attempts: u32) -> GuardrailValidation {
        let run = self.checks.len();
        let passed = self.checks.iter().filter(|c| c.passed).count();
        GuardrailValidation {
            all_passed: self.all_passed(),
            guardrails_run: run,
            guardrails_passed: passed,
            blocking_failures: self.blocking_guardrails(),
            warnings: self.warnings(),
            factual_accuracy: if run == 0 {
                1.0
            } else {
                passed as f64 / run as f64
            },
            attempts,
        }
    }
}

fn names<'a>(checks: impl Iterator<Item = &'a GuardrailCheck>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for check in checks {
        if !out.iter().any(|n| n == check.guardrail) {
            out.push(check.guardrail.to_string());
        }
    }
    out
}

/// Guardrail outcome attached to a generated draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailValidation {
    pub all_passed: bool,
    pub guardrails_run: usize,
    pub guardrails_passed: usize,
    pub blocking_failures: Vec<String>,
    pub warnings: Vec<String>,

    /// Share of checks that passed.
    pub factual_accuracy: f64,

    /// Provider round trips spent on the draft, corrections included.
    pub attempts: u32,
}

/// Runs guardrails in severity order.
pub struct GuardrailPipeline {
    guardrails: Vec<Box<dyn Guardrail>>,
    fail_fast: bool,
}

impl std::fmt::Debug for GuardrailPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.guardrails.iter().map(|g| g.name()).collect();
        f.debug_struct("GuardrailPipeline")
            .field("guardrails", &names)
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

impl Default for GuardrailPipeline {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FactualGroundingGuardrail),
            Box::new(NumericalConsistencyGuardrail),
            Box::new(TemporalConsistencyGuardrail),
            Box::new(ContextualCoherenceGuardrail),
        ])
    }
}

impl GuardrailPipeline {
    pub fn new(mut guardrails: Vec<Box<dyn Guardrail>>) -> Self {
        guardrails.sort_by_key(|g| g.severity());
        Self {
            guardrails,
            fail_fast: true,
        }
    }

    /// Keep running after a critical failure.
    pub fn run_all(mut self) -> Self {
        self.fail_fast = false;
        self
    }

    /// Check `draft` against `context`. Stops after the first guardrail with
    /// a failing critical check unless built with [`Self::run_all`].
    pub fn validate(&self, draft: &str, context: &CaseContext) -> GuardrailReport {
        let mut checks = Vec::new();
        for guardrail in &self.guardrails {
            let results = guardrail.check(draft, context);
            let critical_failure = results
                .iter()
                .any(|c| !c.passed && c.severity == Severity::Critical);
            checks.extend(results);

            if critical_failure && self.fail_fast {
                tracing::warn!(guardrail = guardrail.name(), "critical guardrail failed");
                break;
            }
        }
        GuardrailReport { checks }
    }
}

/// Parse a figure captured from prose, e.g. `1,550.50`.
pub(crate) fn parse_figure(text: &str) -> Option<f64> {
    let text = text.trim();
    if !FIGURE.is_match(text) {
        return None;
    }
    text.replace(',', "").parse().ok()
}

/// Render amounts for messages, e.g. `[100.00, 250.50]`.
pub(crate) fn list_amounts(amounts: &[f64]) -> String {
    let parts: Vec<String> = amounts.iter().map(|a| format!("{a:.2}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::NaiveDate;
    use solvix_core::{CaseContext, Obligation, ObligationStatus};

    /// Two open invoices totalling 1,550.50.
    pub fn context() -> CaseContext {
        let mut ctx = CaseContext::new("p-1");
        ctx.party.name = "Brightside Ltd".into();
        ctx.party.customer_code = "BRI001".into();
        ctx.obligations = vec![
            Obligation {
                invoice_number: "INV-1001".into(),
                amount_due: 1200.0,
                due_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                days_past_due: 45,
                status: ObligationStatus::Open,
            },
            Obligation {
                invoice_number: "INV-1002".into(),
                amount_due: 350.5,
                due_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                days_past_due: 28,
                status: ObligationStatus::Open,
            },
        ];
        ctx
    }
}
