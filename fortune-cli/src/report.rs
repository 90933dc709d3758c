use colored::*;
use fortune_rules::{PersonalizationOutcome, Rule, ValidationIssue};

pub fn print_rules_ok(rules: &[Rule]) {
    println!(
        "{} {} rule(s), {} active",
        "✔ Rules look good:".green().bold(),
        rules.len(),
        rules.iter().filter(|rule| rule.active).count()
    );
    for rule in rules {
        let state = if rule.active { "active" } else { "inactive" };
        println!("  [{:>4}] {} ({}, {})", rule.priority, rule.id.bold(), rule.name, state);
    }
}

pub fn print_issues(issues: &[ValidationIssue]) {
    println!(
        "{} {} issue(s)",
        "✘ Rules need attention:".red().bold(),
        issues.len()
    );
    for issue in issues {
        println!("  {} {}", issue.rule_id.yellow(), issue.message);
    }
}

pub fn print_outcome(outcome: &PersonalizationOutcome) {
    println!("{}", outcome.message.bold());
    if outcome.applied_rules.is_empty() {
        println!("  {}", "no rule fired".dimmed());
        return;
    }
    println!("  Rules: {}", outcome.applied_rules.join(" → "));
    if !outcome.message_sets.is_empty() {
        println!("  Message sets: {}", outcome.message_sets.join(", "));
    }
}
