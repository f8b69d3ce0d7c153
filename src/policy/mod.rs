//! `policy` — severity classification and remediation decisions.
//!
//! - **Rule set** — loaded once at startup from a YAML artifact (or the
//!   built-in default), immutable afterward.
//! - **Evaluator** — assigns the final severity per drift record and
//!   derives one remediation action each.

pub mod evaluator;
pub mod rules;

pub use evaluator::PolicyEvaluator;
pub use rules::{AutoApplyRule, PolicyRuleSet};
