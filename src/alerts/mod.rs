pub mod evaluator;
pub mod ledger;
pub mod rules;

pub use evaluator::evaluate;
pub use ledger::AlertLedger;
pub use rules::{RuleError, RuleStore};
