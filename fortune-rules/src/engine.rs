use tracing::debug;

use crate::action::apply_actions;
use crate::context::{Identity, UserContext};
use crate::error::RuleError;
use crate::loader::load_rules;
use crate::outcome::PersonalizationOutcome;
use crate::rule::Rule;

/// Runtime executor that personalizes messages against a set of rules.
///
/// The engine owns an immutable snapshot of the rules; evaluation is pure, so a
/// single engine may be shared between request handlers without locking.
#[derive(Debug, Default, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Construct an engine from the provided rules, highest priority first.
    /// Rules with equal priority keep the order they were supplied in.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Loads rules from the given path (file or directory).
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, RuleError> {
        let rules = load_rules(path)?;
        Ok(Self::new(rules))
    }

    /// Borrow the underlying rule set in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether the engine contains no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that fire for `ctx`, in the order their actions would be applied.
    pub fn matching_rules(&self, ctx: &UserContext) -> Vec<&Rule> {
        firing_sequence(self.rules.iter(), ctx)
    }

    /// Message set the catalog should draw the base message from, if a fired
    /// rule asks for one.
    pub fn message_set_hint(&self, ctx: &UserContext) -> Option<&str> {
        self.matching_rules(ctx)
            .into_iter()
            .find_map(Rule::message_set)
    }

    /// Personalize `base` and report which rules fired.
    pub fn personalize(
        &self,
        base: &str,
        ctx: &UserContext,
        identity: &Identity,
    ) -> PersonalizationOutcome {
        personalize_sequence(firing_sequence(self.rules.iter(), ctx), base, ctx, identity)
    }

    /// Personalize `base`, returning only the resulting message.
    pub fn run(&self, base: &str, ctx: &UserContext, identity: &Identity) -> String {
        self.personalize(base, ctx, identity).message
    }
}

/// Evaluates a borrowed rule set without building an engine.
pub fn run(rules: &[Rule], base: &str, ctx: &UserContext, identity: &Identity) -> String {
    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
    personalize_sequence(firing_sequence(ordered, ctx), base, ctx, identity).message
}

// Rules must already be in evaluation order. The first fired rule without a
// `continue` condition ends the sequence.
fn firing_sequence<'a, I>(rules: I, ctx: &UserContext) -> Vec<&'a Rule>
where
    I: IntoIterator<Item = &'a Rule>,
{
    let mut fired = Vec::new();
    for rule in rules {
        if !rule.is_active() || !rule.matches(ctx) {
            continue;
        }

        debug!(rule_id = %rule.id, priority = rule.priority, "rule matched context");
        fired.push(rule);
        if !rule.is_chained() {
            break;
        }
    }
    fired
}

fn personalize_sequence(
    fired: Vec<&Rule>,
    base: &str,
    ctx: &UserContext,
    identity: &Identity,
) -> PersonalizationOutcome {
    let mut outcome = PersonalizationOutcome::new(base);
    for rule in fired {
        outcome.message = apply_actions(&rule.actions, &outcome.message, ctx, identity);
        outcome.record_rule(rule.id.clone());
        if let Some(set) = rule.message_set() {
            outcome.push_message_set(set);
        }
    }
    outcome
}
