use serde::{Deserialize, Serialize};

use crate::action::RuleAction;
use crate::condition::RuleCondition;
use crate::context::UserContext;

/// Admin-authored personalization rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier for the rule. Used for reporting and deduplication.
    pub id: String,
    /// Display name shown in the back-office.
    #[serde(default)]
    pub name: String,
    /// Inactive rules are never evaluated.
    #[serde(default = "Rule::default_active")]
    pub active: bool,
    /// Ordering priority. Higher numbers are evaluated first.
    #[serde(default)]
    pub priority: i32,
    /// All conditions must hold for the rule to fire. Empty always fires.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Actions applied, in order, when the rule fires.
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            priority,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn default_active() -> bool {
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether every condition holds for `ctx`.
    pub fn matches(&self, ctx: &UserContext) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(ctx))
    }

    /// Whether evaluation carries on to lower-priority rules after this one fires.
    pub fn is_chained(&self) -> bool {
        self.conditions.iter().any(RuleCondition::is_continue)
    }

    /// First non-blank message-set hint among the actions.
    pub fn message_set(&self) -> Option<&str> {
        self.actions.iter().find_map(RuleAction::message_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn parses_admin_rule_with_defaults() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "morning",
            "name": "Morning Messages",
            "priority": 10,
            "conditions": [{"type": "time", "operator": "between", "value": ["06:00", "12:00"]}],
            "actions": [{"type": "useMessageSet", "value": "morning"}]
        }))
        .expect("rule parses");

        assert!(rule.is_active());
        assert!(!rule.is_chained());
        assert_eq!(rule.message_set(), Some("morning"));
    }

    #[test]
    fn empty_condition_list_always_matches() {
        let time = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|date| date.and_hms_opt(3, 0, 0))
            .expect("valid timestamp");
        let rule = Rule::new("always", "Always", 0);
        assert!(rule.matches(&UserContext::at(time)));
    }

    #[test]
    fn continue_condition_marks_rule_as_chained() {
        let rule = Rule::new("tone", "Tone", 20)
            .with_condition(RuleCondition::weather(ConditionOperator::Contains, "sun"))
            .with_condition(RuleCondition::Continue);
        assert!(rule.is_chained());
    }
}
