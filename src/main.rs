//! Claim mapper CLI entry point.
//!
//! Validates mapping configuration and resolves principals from claim
//! documents.

use anyhow::{Context, Result};
use clap::Parser;
use claim_mapper::{MappedJsonPath, MapperConfig, PrincipalMapper};
use serde_json::Value as JsonValue;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "claim-mapper")]
#[command(
    author,
    version,
    about = "Map token claims to principals with JSONPath rules"
)]
struct Args {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, env = "CLAIM_MAPPER_CONFIG")]
    config: Option<PathBuf>,

    /// Ad-hoc rule to evaluate instead of the configured mappings.
    /// May be given more than once.
    #[arg(short, long = "rule")]
    rules: Vec<String>,

    /// Claims document (JSON). Reads stdin when omitted or "-".
    #[arg(long)]
    claims: Option<PathBuf>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and rules, then exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# Claim Mapper Configuration Example
version: "1"

settings:
  # Principal used when no mapping yields a value (omit to fail instead)
  default_principal: null
  # Reject a mapping that yields more than one value
  require_unique: false

mappings:
  # Lowercased local part of the email claim
  - name: "email-local-part"
    description: "alice@example.com -> alice"
    enabled: true
    priority: 100
    rule: "$.user_info.email/([^@]+)@.*/$1/L"

  # Namespaced claim; escape slashes inside the path (single quotes keep
  # the backslashes intact in YAML)
  - name: "corp-username"
    priority: 75
    rule: '$["https:\/\/corp.example.com\/username"]'

  # Identity selected by a filter predicate
  - name: "corp-identity"
    priority: 60
    rule: "$.identities[?(@.provider == 'corp')].user_id"

  # Fall back to the subject claim
  - name: "subject"
    priority: 10
    rule: "$.sub"
"#;
    println!("{}", example);
}

fn read_claims(path: Option<&PathBuf>) -> Result<JsonValue> {
    let content = match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read claims file: {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read claims from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Claims are not valid JSON")
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for results
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if args.example_config {
        print_example_config();
        return Ok(());
    }

    if !args.rules.is_empty() {
        let rules = args
            .rules
            .iter()
            .map(|r| MappedJsonPath::new(r.as_str()).with_context(|| format!("Invalid rule: {r}")))
            .collect::<Result<Vec<_>>>()?;

        if args.validate {
            info!(rules = rules.len(), "Rules are valid");
            return Ok(());
        }

        let claims = read_claims(args.claims.as_ref())?;
        let mut output = serde_json::Map::new();
        for rule in &rules {
            let values = rule.eval(&claims);
            debug!(rule = %rule, values = values.len(), "Evaluated rule");
            output.insert(rule.to_string(), values.into());
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => MapperConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MapperConfig::default(),
    };

    let mapper = PrincipalMapper::new(config)?;

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let claims = read_claims(args.claims.as_ref())?;
    let principal = mapper.identify(&claims)?;

    info!(principal = %principal.name, mapping = ?principal.mapping, "Resolved principal");

    let output = serde_json::json!({
        "principal": principal.name,
        "mapping": principal.mapping,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
