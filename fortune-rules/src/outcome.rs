use serde::{Deserialize, Serialize};

/// Aggregated view of how rules shaped a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationOutcome {
    pub message: String,
    pub applied_rules: Vec<String>,
    /// `useMessageSet` hints carried by the fired rules, in firing order.
    pub message_sets: Vec<String>,
}

impl PersonalizationOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            applied_rules: Vec::new(),
            message_sets: Vec::new(),
        }
    }

    pub fn record_rule(&mut self, id: impl Into<String>) {
        self.applied_rules.push(id.into());
    }

    pub fn push_message_set(&mut self, set: impl Into<String>) {
        let set = set.into();
        if !self.message_sets.contains(&set) {
            self.message_sets.push(set);
        }
    }

    /// Whether any rule fired.
    pub fn is_personalized(&self) -> bool {
        !self.applied_rules.is_empty()
    }
}
