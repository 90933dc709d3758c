use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::context::{Identity, UserContext};

/// Declarative message transformations triggered when a rule fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    /// Catalog hint naming the message set the base message should come from.
    /// Consumed before the engine runs; a no-op when applied.
    UseMessageSet {
        #[serde(default)]
        value: ActionValue,
    },
    /// Address the requester by display name.
    IncludeUserName {
        #[serde(default)]
        value: ActionValue,
    },
    /// Append a sentence about the requester's location.
    IncludeLocation {
        #[serde(default)]
        value: ActionValue,
    },
    /// Unrecognised action type. Passes the message through.
    #[serde(other)]
    Unknown,
}

/// Argument of an action. Only a boolean `true` switches a toggle on and only
/// text names a message set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ActionValue {
    Flag(bool),
    Text(String),
    /// Anything else. Kept so that a malformed rule still loads as a no-op.
    Other(Value),
}

impl Default for ActionValue {
    fn default() -> Self {
        ActionValue::Other(Value::Null)
    }
}

impl ActionValue {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ActionValue::Flag(true))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ActionValue::Text(text) => Some(text),
            _ => None,
        }
    }

    fn is_absent(&self) -> bool {
        matches!(self, ActionValue::Other(Value::Null))
    }
}

impl From<bool> for ActionValue {
    fn from(value: bool) -> Self {
        ActionValue::Flag(value)
    }
}

impl From<&str> for ActionValue {
    fn from(value: &str) -> Self {
        ActionValue::Text(value.to_string())
    }
}

impl From<String> for ActionValue {
    fn from(value: String) -> Self {
        ActionValue::Text(value)
    }
}

impl RuleAction {
    pub fn use_message_set(set: impl Into<String>) -> Self {
        RuleAction::UseMessageSet {
            value: ActionValue::Text(set.into()),
        }
    }

    pub fn include_user_name() -> Self {
        RuleAction::IncludeUserName {
            value: ActionValue::Flag(true),
        }
    }

    pub fn include_location() -> Self {
        RuleAction::IncludeLocation {
            value: ActionValue::Flag(true),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::UseMessageSet { .. } => "useMessageSet",
            RuleAction::IncludeUserName { .. } => "includeUserName",
            RuleAction::IncludeLocation { .. } => "includeLocation",
            RuleAction::Unknown => "unknown",
        }
    }

    /// The message set this action points the catalog at, if any.
    pub fn message_set(&self) -> Option<&str> {
        match self {
            RuleAction::UseMessageSet { value } => value
                .as_text()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
            _ => None,
        }
    }

    /// Transforms `message` according to this action.
    pub fn apply(&self, message: String, ctx: &UserContext, identity: &Identity) -> String {
        match self {
            RuleAction::IncludeUserName { value } if value.is_enabled() => {
                match identity.display_name() {
                    Some(name) => format!("{}, {}", name, lowercase_first(&message)),
                    None => message,
                }
            }
            RuleAction::IncludeLocation { value }
                if value.is_enabled() && ctx.has_known_location() =>
            {
                format!(
                    "{} In {}, this message resonates even more strongly.",
                    message, ctx.location
                )
            }
            RuleAction::UseMessageSet { .. }
            | RuleAction::IncludeUserName { .. }
            | RuleAction::IncludeLocation { .. }
            | RuleAction::Unknown => message,
        }
    }

    /// Checks the action's argument. A missing toggle is read as `false`.
    pub fn validate(&self) -> Result<(), ActionIssue> {
        let kind = self.kind();
        match self {
            RuleAction::UseMessageSet { .. } => self.message_set().map(|_| ()).ok_or(
                ActionIssue::MalformedValue {
                    kind,
                    expected: "a message set id",
                },
            ),
            RuleAction::IncludeUserName { value } | RuleAction::IncludeLocation { value } => {
                match value {
                    ActionValue::Flag(_) => Ok(()),
                    other if other.is_absent() => Ok(()),
                    _ => Err(ActionIssue::MalformedValue {
                        kind,
                        expected: "`true` or `false`",
                    }),
                }
            }
            RuleAction::Unknown => Err(ActionIssue::UnknownType),
        }
    }
}

/// Configuration problem found while validating an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionIssue {
    #[error("`{kind}` action expects {expected}; it will be ignored")]
    MalformedValue {
        kind: &'static str,
        expected: &'static str,
    },
    #[error("unrecognised action type; it will be ignored")]
    UnknownType,
}

/// Applies `actions` to `message` strictly in list order.
pub fn apply_actions(
    actions: &[RuleAction],
    message: &str,
    ctx: &UserContext,
    identity: &Identity,
) -> String {
    actions.iter().fold(message.to_string(), |current, action| {
        trace!(action = action.kind(), "applying action");
        action.apply(current, ctx, identity)
    })
}

fn lowercase_first(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn context() -> UserContext {
        let time = NaiveDate::from_ymd_opt(2024, 5, 12)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        UserContext::at(time)
    }

    #[test]
    fn prefixes_display_name_and_lowercases_first_letter() {
        let message = RuleAction::include_user_name().apply(
            "Welcome back to your tea journey.".into(),
            &context(),
            &Identity::named("Alice"),
        );
        assert_eq!(message, "Alice, welcome back to your tea journey.");
    }

    #[test]
    fn lowercasing_handles_non_ascii_initials() {
        assert_eq!(lowercase_first("Ébène"), "ébène");
        assert_eq!(lowercase_first(""), "");
    }

    #[test]
    fn user_name_is_skipped_without_a_name_or_when_disabled() {
        let base = "Steep slowly.".to_string();
        let anonymous =
            RuleAction::include_user_name().apply(base.clone(), &context(), &Identity::anonymous());
        assert_eq!(anonymous, base);

        let disabled = RuleAction::IncludeUserName { value: false.into() }.apply(
            base.clone(),
            &context(),
            &Identity::named("Alice"),
        );
        assert_eq!(disabled, base);
    }

    #[test]
    fn appends_location_sentence() {
        let ctx = context().with_location("New York");
        let message =
            RuleAction::include_location().apply("Find your calm today.".into(), &ctx, &Identity::anonymous());
        assert_eq!(
            message,
            "Find your calm today. In New York, this message resonates even more strongly."
        );
    }

    #[test]
    fn unknown_location_leaves_message_alone() {
        let message = RuleAction::include_location().apply(
            "Find your calm today.".into(),
            &context(),
            &Identity::anonymous(),
        );
        assert_eq!(message, "Find your calm today.");
    }

    #[test]
    fn message_set_and_unknown_actions_are_no_ops() {
        let base = "Breathe.".to_string();
        let ctx = context().with_location("Osaka");
        assert_eq!(
            RuleAction::use_message_set("morning").apply(base.clone(), &ctx, &Identity::named("Kai")),
            base
        );
        assert_eq!(RuleAction::Unknown.apply(base.clone(), &ctx, &Identity::named("Kai")), base);
    }

    #[test]
    fn actions_apply_in_list_order() {
        let ctx = context().with_location("Lisbon");
        let actions = vec![RuleAction::include_location(), RuleAction::include_user_name()];
        let message = apply_actions(&actions, "Rest well.", &ctx, &Identity::named("Rui"));
        assert_eq!(
            message,
            "Rui, rest well. In Lisbon, this message resonates even more strongly."
        );
    }

    #[test]
    fn parses_source_shapes() {
        let actions: Vec<RuleAction> = serde_json::from_value(json!([
            {"type": "useMessageSet", "value": "returning"},
            {"type": "includeUserName", "value": true},
            {"type": "sendCoupon", "value": "TEA10"}
        ]))
        .expect("actions parse");
        assert_eq!(actions[0].message_set(), Some("returning"));
        assert_eq!(actions[1], RuleAction::include_user_name());
        assert_eq!(actions[2], RuleAction::Unknown);
    }

    #[test]
    fn mistyped_values_load_as_no_ops() {
        let actions: Vec<RuleAction> = serde_json::from_value(json!([
            {"type": "includeUserName", "value": "true"},
            {"type": "includeLocation", "value": 1},
            {"type": "useMessageSet", "value": 7}
        ]))
        .expect("actions parse");

        let ctx = context().with_location("Osaka");
        let message = apply_actions(&actions, "Breathe.", &ctx, &Identity::named("Kai"));
        assert_eq!(message, "Breathe.");
        assert_eq!(actions[2].message_set(), None);
        assert!(actions.iter().all(|action| action.validate().is_err()));
    }

    #[test]
    fn missing_toggle_is_off_but_valid() {
        let action: RuleAction =
            serde_json::from_value(json!({"type": "includeUserName"})).expect("action parses");
        assert_eq!(action.validate(), Ok(()));
        assert_eq!(
            action.apply("Breathe.".into(), &context(), &Identity::named("Kai")),
            "Breathe."
        );
    }

    #[test]
    fn validation_reports_the_action_kind() {
        let issue = RuleAction::use_message_set(" ").validate().unwrap_err();
        assert_eq!(
            issue.to_string(),
            "`useMessageSet` action expects a message set id; it will be ignored"
        );
        assert_eq!(RuleAction::Unknown.validate(), Err(ActionIssue::UnknownType));
    }

    #[test]
    fn blank_message_set_is_not_a_hint() {
        assert_eq!(RuleAction::use_message_set("  ").message_set(), None);
    }
}
