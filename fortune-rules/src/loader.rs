use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RuleError;
use crate::rule::Rule;

/// Problem found in an admin-authored rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub rule_id: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule_id, self.message)
    }
}

/// Loads rules from a file or a directory, keeping file order.
///
/// Validation issues are logged and the rules kept; the engine fails closed on
/// anything it cannot evaluate.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleError> {
    let path = path.as_ref();
    let rules = read_rules(path)?;

    for issue in validate_rules(&rules) {
        warn!(path = %path.display(), rule_id = %issue.rule_id, "{}", issue.message);
    }

    info!(path = %path.display(), count = rules.len(), "loaded personalization rules");
    Ok(rules)
}

/// Like [`load_rules`], but refuses rule sets with validation issues.
pub fn load_rules_strict(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleError> {
    let rules = read_rules(path.as_ref())?;
    let issues = validate_rules(&rules);
    if !issues.is_empty() {
        return Err(RuleError::Invalid(issues));
    }
    Ok(rules)
}

/// Collects configuration problems across a rule set.
pub fn validate_rules(rules: &[Rule]) -> Vec<ValidationIssue> {
    rules.iter().flat_map(validate_rule).collect()
}

/// Collects configuration problems for a single rule.
pub fn validate_rule(rule: &Rule) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if rule.id.trim().is_empty() {
        issues.push(ValidationIssue::new(&rule.id, "rule id must not be blank"));
    }
    issues.extend(validate_rule_contents(rule));
    issues
}

/// Checks conditions and actions, ignoring the id.
pub fn validate_rule_contents(rule: &Rule) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let id = rule.id.as_str();

    for (index, condition) in rule.conditions.iter().enumerate() {
        if let Err(issue) = condition.validate() {
            issues.push(ValidationIssue::new(
                id,
                format!("condition #{}: {}", index + 1, issue),
            ));
        }
    }

    for (index, action) in rule.actions.iter().enumerate() {
        if let Err(issue) = action.validate() {
            issues.push(ValidationIssue::new(
                id,
                format!("action #{}: {}", index + 1, issue),
            ));
        }
    }

    issues
}

/// Parses rules from an in-memory document (YAML or JSON).
pub fn parse_rules(raw: &str, origin: impl Into<PathBuf>) -> Result<Vec<Rule>, RuleError> {
    let origin = origin.into();
    let mut attempts = Vec::new();

    match serde_yaml::from_str::<RuleDocument>(raw) {
        Ok(doc) => return Ok(doc.rules),
        Err(err) => attempts.push(format!("rules document ({err})")),
    }

    match serde_yaml::from_str::<Vec<Rule>>(raw) {
        Ok(list) => return Ok(list),
        Err(err) => attempts.push(format!("list ({err})")),
    }

    match serde_yaml::from_str::<Rule>(raw) {
        Ok(rule) => return Ok(vec![rule]),
        Err(err) => attempts.push(format!("single rule ({err})")),
    }

    let message = format!("unable to parse rules using {}", attempts.join(", "));
    Err(RuleError::parse_error(origin, message))
}

fn read_rules(path: &Path) -> Result<Vec<Rule>, RuleError> {
    if !path.exists() {
        return Err(RuleError::MissingPath(path.display().to_string()));
    }

    let rules = if path.is_dir() {
        load_from_directory(path)?
    } else {
        load_from_file(path)?
    };

    deduplicate(&rules)?;
    Ok(rules)
}

fn load_from_directory(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| RuleError::from_io(path, err))? {
        let entry = entry.map_err(|err| RuleError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| RuleError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }

        let entry_path = entry.path();
        if let Some(ext) = entry_path.extension().and_then(|value| value.to_str()) {
            if matches!(ext, "json" | "yaml" | "yml") {
                files.push(entry_path);
            }
        }
    }

    // read_dir order is platform dependent; priority ties need a stable order.
    files.sort();

    let mut rules = Vec::new();
    for file in files {
        let mut file_rules = load_from_file(&file)?;
        rules.append(&mut file_rules);
    }
    Ok(rules)
}

fn load_from_file(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;
    parse_rules(&raw, path)
}

fn deduplicate(rules: &[Rule]) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(RuleError::DuplicateRule {
                id: rule.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    rules: Vec<Rule>,
}
