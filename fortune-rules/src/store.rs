use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{Rule, RuleEngine, RuleError};

/// Versioned history entry for a stored rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleHistoryEntry {
    pub version: u32,
    pub rule: Rule,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl RuleHistoryEntry {
    fn new(version: u32, rule: Rule, updated_by: Option<String>) -> Self {
        Self {
            version,
            rule,
            created_at: Utc::now(),
            updated_by,
        }
    }
}

struct StoredRule {
    /// Creation sequence; breaks priority ties when building engines.
    sequence: u64,
    versions: Vec<RuleHistoryEntry>,
}

#[derive(Default)]
struct Inner {
    next_sequence: u64,
    rules: HashMap<String, StoredRule>,
}

/// In-memory rule store with version tracking, used by the back-office API.
#[derive(Default, Clone)]
pub struct RuleStore {
    inner: Arc<RwLock<Inner>>,
}

impl RuleStore {
    /// Creates a new empty rule store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `rules`, in the order given.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let store = Self::new();
        for rule in rules {
            store.put_rule(rule, None);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the latest version of every rule, in creation order.
    pub fn list_rules(&self) -> Vec<RuleHistoryEntry> {
        let inner = self.inner.read();
        let mut stored: Vec<&StoredRule> = inner.rules.values().collect();
        stored.sort_by_key(|rule| rule.sequence);
        stored
            .into_iter()
            .filter_map(|rule| rule.versions.last().cloned())
            .collect()
    }

    /// Returns the full history for a specific rule.
    pub fn rule_history(&self, rule_id: &str) -> Vec<RuleHistoryEntry> {
        let inner = self.inner.read();
        inner
            .rules
            .get(rule_id)
            .map(|rule| rule.versions.clone())
            .unwrap_or_default()
    }

    /// Returns the latest version of a rule, if available.
    pub fn latest_rule(&self, rule_id: &str) -> Option<RuleHistoryEntry> {
        let inner = self.inner.read();
        inner
            .rules
            .get(rule_id)
            .and_then(|rule| rule.versions.last().cloned())
    }

    /// Inserts or updates a rule, returning the new history entry.
    pub fn put_rule(&self, mut rule: Rule, updated_by: Option<String>) -> RuleHistoryEntry {
        // Blank ids get a generated one.
        if rule.id.trim().is_empty() {
            rule.id = format!("rule-{}", Uuid::new_v4());
        }

        let mut inner = self.inner.write();
        let sequence = inner.next_sequence;
        let stored = inner
            .rules
            .entry(rule.id.clone())
            .or_insert_with(|| StoredRule {
                sequence,
                versions: Vec::new(),
            });
        let created = stored.versions.is_empty();

        let version = stored.versions.last().map(|last| last.version + 1).unwrap_or(1);
        let entry = RuleHistoryEntry::new(version, rule, updated_by);
        stored.versions.push(entry.clone());
        if created {
            inner.next_sequence += 1;
        }

        info!(rule_id = %entry.rule.id, version, "stored personalization rule");
        entry
    }

    /// Appends a version with `active` set as requested. A no-op when the
    /// latest version already has that state.
    pub fn set_active(
        &self,
        rule_id: &str,
        active: bool,
        updated_by: Option<String>,
    ) -> Result<RuleHistoryEntry, RuleError> {
        let mut inner = self.inner.write();
        let stored = inner
            .rules
            .get_mut(rule_id)
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;

        let latest = stored
            .versions
            .last()
            .cloned()
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;

        if latest.rule.active == active {
            return Ok(latest);
        }

        let mut toggled = latest.rule.clone();
        toggled.active = active;
        let entry = RuleHistoryEntry::new(latest.version + 1, toggled, updated_by);
        stored.versions.push(entry.clone());
        info!(rule_id, active, version = entry.version, "toggled personalization rule");
        Ok(entry)
    }

    /// Removes a rule and its history.
    pub fn remove_rule(&self, rule_id: &str) -> Result<(), RuleError> {
        let mut inner = self.inner.write();
        inner
            .rules
            .remove(rule_id)
            .map(|_| ())
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))
    }

    /// Builds a rule engine over the latest active rules.
    pub fn engine(&self) -> RuleEngine {
        let rules = self
            .list_rules()
            .into_iter()
            .filter(|entry| entry.rule.active)
            .map(|entry| entry.rule)
            .collect();
        RuleEngine::new(rules)
    }
}
