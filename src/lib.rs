//! Tea fortune: personalized messages for QR-code scans.
//!
//! The workspace is split into a few crates:
//!
//! * `fortune-core`: errors, configuration and logging setup
//! * `fortune-rules`: the personalization rule engine, rule loading and
//!   validation, the versioned rule store, the fortune workflow and its REST API
//! * `fortune-cli`: the `fortune` binary
//!
//! This package re-exports the pieces callers normally need.

pub use fortune_core::{config, logging, ConfigError, CoreConfig, FortuneError};
pub use fortune_rules::*;

/// Rules the back-office starts from on a fresh install.
pub fn starter_rules() -> Vec<Rule> {
    vec![
        Rule::new("morning-messages", "Morning Messages", 10)
            .with_condition(RuleCondition::time(
                ConditionOperator::Between,
                ["06:00", "12:00"],
            ))
            .with_action(RuleAction::use_message_set("morning")),
        Rule::new("returning-customer", "Returning Customer", 30)
            .with_condition(RuleCondition::scan_count(ConditionOperator::GreaterThan, 3u32))
            .with_action(RuleAction::include_user_name())
            .with_action(RuleAction::use_message_set("returning")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_rules_are_valid() {
        let rules = starter_rules();
        assert!(validate_rules(&rules).is_empty());
        assert_eq!(RuleEngine::new(rules).rules()[0].id, "returning-customer");
    }
}
