//! Personalization rule engine for tea fortunes.
//!
//! Administrators author rules that pair conditions on the request context
//! (time of day, weather, location, scan count) with message transformations.
//! The engine evaluates active rules by descending priority, applies the first
//! fully matching rule and stops, unless that rule carries a `continue`
//! condition. Evaluation is pure and never fails: anything it cannot make sense
//! of degrades to the unmodified base message.

mod action;
mod condition;
mod context;
mod engine;
mod error;
pub mod fortune;
mod loader;
mod outcome;
mod rule;
mod service;
mod store;

pub use action::{apply_actions, ActionIssue, ActionValue, RuleAction};
pub use condition::{ConditionIssue, ConditionOperator, ConditionValue, RuleCondition};
pub use context::{Identity, UserContext, UNKNOWN};
pub use engine::{run, RuleEngine};
pub use error::RuleError;
pub use fortune::{
    Fortune, FortuneService, InMemoryCatalog, MessageCatalog, MessageGenerator, MessageSource,
};
pub use loader::{
    load_rules, load_rules_strict, parse_rules, validate_rule, validate_rules, ValidationIssue,
};
pub use outcome::PersonalizationOutcome;
pub use rule::Rule;
pub use service::{
    ErrorResponse, FortuneRequest, PersonalizeRequest, RuleApiBuilder, RuleDocument,
    RuleServiceConfig,
};
pub use store::{RuleHistoryEntry, RuleStore};
