use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use fortune_core::config::CoreConfig;
use fortune_rules::{
    load_rules, load_rules_strict, FortuneService, Identity, InMemoryCatalog,
    PersonalizationOutcome, Rule, RuleApiBuilder, RuleEngine, RuleError, RuleServiceConfig,
    RuleStore, UserContext,
};
use tracing::info;

mod report;

#[derive(Parser)]
#[command(name = "fortune")]
#[command(about = "Tea fortune personalization rules", long_about = None)]
struct Cli {
    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, env = "FORTUNE_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a rule file or directory and report configuration problems
    Check(CheckArgs),
    /// Personalize a message against a rule set
    Evaluate(EvaluateArgs),
    /// Serve the rule admin and fortune REST API
    Serve(ServeArgs),
    /// Show version information
    Version,
}

#[derive(Args)]
struct CheckArgs {
    /// Rule file or directory
    rules: PathBuf,
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(long, env = "FORTUNE_RULES_PATH")]
    rules: PathBuf,
    /// Clock time of the request as HH:MM (defaults to now)
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    weather: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    scan_count: Option<u32>,
    /// Display name of the requester
    #[arg(long)]
    name: Option<String>,
    /// Print the outcome as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Base message to personalize
    message: String,
}

#[derive(Args)]
struct ServeArgs {
    /// Rule file or directory used to seed the store
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Message catalog (YAML/JSON map of message set to messages)
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CoreConfig::from_env().context("failed to load configuration")?;

    let level = cli.log_level.or_else(|| config.log_level.clone());
    if let Err(err) = fortune_core::logging::init_tracing(level.as_deref()) {
        eprintln!("⚠️ failed to initialise tracing: {err}");
    }

    match cli.command {
        Commands::Check(args) => check(args),
        Commands::Evaluate(args) => evaluate(args),
        Commands::Serve(args) => serve(args, config).await,
        Commands::Version => {
            println!("tea fortune v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check(args: CheckArgs) -> anyhow::Result<()> {
    match load_rules_strict(&args.rules) {
        Ok(rules) => {
            report::print_rules_ok(&rules);
            Ok(())
        }
        Err(RuleError::Invalid(issues)) => {
            report::print_issues(&issues);
            bail!("{} has {} validation issue(s)", args.rules.display(), issues.len())
        }
        Err(err) => Err(err).context("failed to load rules"),
    }
}

fn evaluate(args: EvaluateArgs) -> anyhow::Result<()> {
    let outcome = personalize(&args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        report::print_outcome(&outcome);
    }
    Ok(())
}

fn personalize(args: &EvaluateArgs) -> anyhow::Result<PersonalizationOutcome> {
    let engine = RuleEngine::from_path(&args.rules).context("failed to load rules")?;

    let time = match args.time.as_deref() {
        Some(raw) => today_at(parse_clock(raw)?),
        None => Local::now().naive_local(),
    };
    let mut ctx = UserContext::at(time);
    if let Some(weather) = &args.weather {
        ctx = ctx.with_weather(weather.as_str());
    }
    if let Some(location) = &args.location {
        ctx = ctx.with_location(location.as_str());
    }
    if let Some(scan_count) = args.scan_count {
        ctx = ctx.with_scan_count(scan_count);
    }
    let identity = args
        .name
        .as_deref()
        .map(Identity::named)
        .unwrap_or_default();

    Ok(engine.personalize(&args.message, &ctx, &identity))
}

async fn serve(args: ServeArgs, config: CoreConfig) -> anyhow::Result<()> {
    let rules_path = args.rules.or_else(|| config.rules_path.clone());
    let rules: Vec<Rule> = match rules_path {
        Some(path) if config.requires_valid_rules() => load_rules_strict(&path)
            .with_context(|| format!("rejected rules at {}", path.display()))?,
        Some(path) => load_rules(&path)
            .with_context(|| format!("failed to load rules at {}", path.display()))?,
        None => Vec::new(),
    };

    let catalog = match args.catalog.or_else(|| config.catalog_path.clone()) {
        Some(path) => InMemoryCatalog::from_path(&path)
            .with_context(|| format!("failed to load catalog at {}", path.display()))?,
        None => InMemoryCatalog::new(),
    };

    let store = RuleStore::with_rules(rules);
    info!(rules = store.len(), sets = ?catalog.set_names(), "seeded rule store");

    let fortunes = FortuneService::new(store, Arc::new(catalog));
    let service_config = RuleServiceConfig {
        bind_address: args.bind.unwrap_or(config.http_bind),
    };
    let shutdown = RuleApiBuilder::with_fortunes(fortunes)
        .serve(service_config)
        .await
        .context("failed to start rule service")?;

    shutdown_signal().await;
    info!("shutting down rule service");
    let _ = shutdown.send(());
    Ok(())
}

fn parse_clock(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM, got `{raw}`"))
}

fn today_at(clock: NaiveTime) -> NaiveDateTime {
    Local::now().date_naive().and_time(clock)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_clock_arguments() {
        let clock = parse_clock("08:05").expect("clock parses");
        assert_eq!(today_at(clock).format("%H:%M").to_string(), "08:05");
        assert!(parse_clock("8 o'clock").is_err());
    }

    #[test]
    fn parses_evaluate_arguments() {
        let cli = Cli::try_parse_from([
            "fortune",
            "evaluate",
            "--rules",
            "rules.yaml",
            "--time",
            "08:00",
            "--scan-count",
            "5",
            "--name",
            "Alice",
            "Welcome back to your tea journey.",
        ])
        .expect("arguments parse");

        match cli.command {
            Commands::Evaluate(args) => {
                assert_eq!(args.scan_count, Some(5));
                assert_eq!(args.name.as_deref(), Some("Alice"));
                assert_eq!(args.message, "Welcome back to your tea journey.");
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn check_reports_invalid_rule_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good = dir.path().join("good.yaml");
        fs::write(&good, "- id: always\n  actions:\n    - type: includeUserName\n      value: true\n")
            .expect("write");
        assert!(check(CheckArgs { rules: good }).is_ok());

        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "- id: odd\n  conditions:\n    - type: time\n      operator: contains\n      value: morning\n")
            .expect("write");
        assert!(check(CheckArgs { rules: bad }).is_err());
    }

    fn evaluate_args(rules: PathBuf, json: bool) -> EvaluateArgs {
        EvaluateArgs {
            rules,
            time: Some("08:00".into()),
            weather: None,
            location: Some("Kyoto".into()),
            scan_count: Some(5),
            name: Some("Alice".into()),
            json,
            message: "Welcome back to your tea journey.".into(),
        }
    }

    #[test]
    fn evaluate_personalizes_with_a_rule_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let rules = dir.path().join("rules.yaml");
        fs::write(
            &rules,
            r#"
- id: returning
  priority: 30
  conditions:
    - type: scanCount
      operator: greaterThan
      value: 3
  actions:
    - type: includeUserName
      value: true
    - type: useMessageSet
      value: returning
- id: morning
  priority: 10
  conditions:
    - type: time
      operator: between
      value: ["06:00", "12:00"]
  actions:
    - type: includeLocation
      value: true
"#,
        )
        .expect("write");

        let outcome = personalize(&evaluate_args(rules.clone(), false)).expect("evaluates");
        assert_eq!(outcome.message, "Alice, welcome back to your tea journey.");
        assert_eq!(outcome.applied_rules, vec!["returning".to_string()]);
        assert_eq!(outcome.message_sets, vec!["returning".to_string()]);

        let json = serde_json::to_value(&outcome).expect("outcome serializes");
        assert_eq!(json["appliedRules"][0], "returning");

        assert!(evaluate(evaluate_args(rules.clone(), true)).is_ok());
        assert!(evaluate(evaluate_args(rules, false)).is_ok());
    }

    #[test]
    fn evaluate_fails_on_a_missing_rule_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = evaluate(evaluate_args(dir.path().join("absent.yaml"), true)).unwrap_err();
        assert!(err.to_string().contains("failed to load rules"));
    }
}
