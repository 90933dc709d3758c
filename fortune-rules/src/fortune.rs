//! The "get fortune" workflow: choose a base message, then personalize it.
//!
//! `useMessageSet` hints are resolved here, before the engine runs, so the
//! engine itself only ever transforms text.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fortune_core::FortuneError;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{Identity, UserContext};
use crate::store::RuleStore;

/// Message set used when no fired rule names one.
pub const DEFAULT_MESSAGE_SET: &str = "default";

/// Served when neither the catalog nor the generator produce anything.
pub const FALLBACK_MESSAGE: &str =
    "Every cup holds a quiet beginning. Take a breath and enjoy this moment.";

/// Pool of candidate base messages, grouped into named message sets.
pub trait MessageCatalog: Send + Sync {
    fn messages(&self, message_set: &str) -> Vec<String>;
}

/// Opaque text generator (an AI provider in production).
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, message_set: &str, ctx: &UserContext) -> anyhow::Result<String>;
}

/// Catalog backed by a map of message set name to messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InMemoryCatalog {
    sets: HashMap<String, Vec<String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set<I, S>(mut self, name: impl Into<String>, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .insert(name.into(), messages.into_iter().map(Into::into).collect());
        self
    }

    /// Reads a YAML or JSON map of `set name -> [messages]`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FortuneError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|err| {
            FortuneError::CatalogError(format!("{}: {}", path.display(), err))
        })
    }

    pub fn set_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl MessageCatalog for InMemoryCatalog {
    fn messages(&self, message_set: &str) -> Vec<String> {
        self.sets.get(message_set).cloned().unwrap_or_default()
    }
}

/// Where the base message of a [`Fortune`] came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageSource {
    Catalog,
    Generator,
    Fallback,
}

/// A personalized fortune ready to be shown to the requester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Fortune {
    pub message: String,
    pub base_message: String,
    pub message_set: String,
    pub source: MessageSource,
    pub applied_rules: Vec<String>,
}

/// Orchestrates catalog lookup, generator fallback and rule evaluation.
pub struct FortuneService {
    store: RuleStore,
    catalog: Arc<dyn MessageCatalog>,
    generator: Option<Arc<dyn MessageGenerator>>,
    rng: Mutex<StdRng>,
}

impl FortuneService {
    pub fn new(store: RuleStore, catalog: Arc<dyn MessageCatalog>) -> Self {
        Self {
            store,
            catalog,
            generator: None,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn MessageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Makes catalog picks reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Produces a fortune for the requester. Never fails: every missing
    /// collaborator degrades to a less personalized message.
    pub async fn fortune(&self, ctx: &UserContext, identity: &Identity) -> Fortune {
        // Rules are re-read per request; admin edits show up on the next call.
        let engine = self.store.engine();
        let message_set = engine
            .message_set_hint(ctx)
            .unwrap_or(DEFAULT_MESSAGE_SET)
            .to_string();

        let (base_message, source) = self.base_message(&message_set, ctx).await;
        let outcome = engine.personalize(&base_message, ctx, identity);
        debug!(
            message_set = %message_set,
            ?source,
            applied = outcome.applied_rules.len(),
            "fortune prepared"
        );

        Fortune {
            message: outcome.message,
            base_message,
            message_set,
            source,
            applied_rules: outcome.applied_rules,
        }
    }

    async fn base_message(&self, message_set: &str, ctx: &UserContext) -> (String, MessageSource) {
        let picked = self.pick(message_set).or_else(|| {
            if message_set == DEFAULT_MESSAGE_SET {
                None
            } else {
                self.pick(DEFAULT_MESSAGE_SET)
            }
        });
        if let Some(message) = picked {
            return (message, MessageSource::Catalog);
        }

        if let Some(generator) = &self.generator {
            match generator.generate(message_set, ctx).await {
                Ok(message) if !message.trim().is_empty() => {
                    return (message.trim().to_string(), MessageSource::Generator);
                }
                Ok(_) => warn!(message_set, "generator returned an empty message"),
                Err(err) => warn!(message_set, error = %err, "message generation failed"),
            }
        }

        (FALLBACK_MESSAGE.to_string(), MessageSource::Fallback)
    }

    fn pick(&self, message_set: &str) -> Option<String> {
        let messages = self.catalog.messages(message_set);
        let mut rng = self.rng.lock();
        messages.choose(&mut *rng).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RuleAction;
    use crate::condition::{ConditionOperator, RuleCondition};
    use crate::rule::Rule;
    use chrono::NaiveDate;
    use mockall::mock;
    use std::io::Write;

    mock! {
        pub Generator {}

        #[async_trait]
        impl MessageGenerator for Generator {
            async fn generate(&self, message_set: &str, ctx: &UserContext) -> anyhow::Result<String>;
        }
    }

    fn context(scan_count: u32) -> UserContext {
        let time = NaiveDate::from_ymd_opt(2024, 5, 12)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        UserContext::at(time).with_scan_count(scan_count)
    }

    fn returning_store() -> RuleStore {
        RuleStore::with_rules(vec![Rule::new("returning", "Returning Customer", 30)
            .with_condition(RuleCondition::scan_count(ConditionOperator::GreaterThan, 3u32))
            .with_action(RuleAction::include_user_name())
            .with_action(RuleAction::use_message_set("returning"))])
    }

    #[tokio::test]
    async fn draws_from_hinted_set_and_personalizes() {
        let catalog = InMemoryCatalog::new()
            .with_set("default", ["Enjoy the first sip."])
            .with_set("returning", ["Welcome back to your tea journey."]);
        let service = FortuneService::new(returning_store(), Arc::new(catalog)).with_seed(7);

        let fortune = service.fortune(&context(5), &Identity::named("Alice")).await;
        assert_eq!(fortune.message_set, "returning");
        assert_eq!(fortune.source, MessageSource::Catalog);
        assert_eq!(fortune.message, "Alice, welcome back to your tea journey.");
        assert_eq!(fortune.applied_rules, vec!["returning".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_default_set() {
        let catalog = InMemoryCatalog::new().with_set("default", ["Enjoy the first sip."]);
        let service = FortuneService::new(returning_store(), Arc::new(catalog));

        let fortune = service.fortune(&context(5), &Identity::anonymous()).await;
        assert_eq!(fortune.message_set, "returning");
        assert_eq!(fortune.base_message, "Enjoy the first sip.");
        assert_eq!(fortune.message, "Enjoy the first sip.");
    }

    #[tokio::test]
    async fn asks_generator_when_catalog_is_empty() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|set, _| Ok(format!("A fresh leaf for the {set} crowd.")));

        let service = FortuneService::new(returning_store(), Arc::new(InMemoryCatalog::new()))
            .with_generator(Arc::new(generator));

        let fortune = service.fortune(&context(1), &Identity::anonymous()).await;
        assert_eq!(fortune.source, MessageSource::Generator);
        assert_eq!(fortune.message, "A fresh leaf for the default crowd.");
        assert!(fortune.applied_rules.is_empty());
    }

    #[tokio::test]
    async fn generator_failures_degrade_to_fallback() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(anyhow::anyhow!("provider unavailable")));

        let service = FortuneService::new(returning_store(), Arc::new(InMemoryCatalog::new()))
            .with_generator(Arc::new(generator));

        let fortune = service.fortune(&context(9), &Identity::named("Alice")).await;
        assert_eq!(fortune.source, MessageSource::Fallback);
        assert_eq!(fortune.base_message, FALLBACK_MESSAGE);
        assert_eq!(
            fortune.message,
            "Alice, every cup holds a quiet beginning. Take a breath and enjoy this moment."
        );
    }

    #[test]
    fn loads_catalog_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "default:\n  - Enjoy the first sip.\nmorning:\n  - Rise with the steam.\n  - Dawn tastes of jasmine."
        )
        .expect("write catalog");

        let catalog = InMemoryCatalog::from_path(file.path()).expect("catalog loads");
        assert_eq!(catalog.set_names(), vec!["default", "morning"]);
        assert_eq!(catalog.messages("morning").len(), 2);
        assert!(catalog.messages("evening").is_empty());
    }
}
