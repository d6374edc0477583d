#![deny(unsafe_code)]

//! CaseAssist CLI: configuration checks and offline session simulation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use caseassist_config::AppConfig;
use caseassist_core::engine::{LocalEngineFactory, SearchTransport, StaticTransport};
use caseassist_core::logging::Diagnostic;
use caseassist_core::middleware::rewrite_photo_url;
use caseassist_core::resolver::{self, ConfigResolver, ConfigSource, FileConfigSource};
use caseassist_core::{
    Action, BootState, Bootstrapper, DiagnosticsCollector, DiagnosticsReader, InterfaceDeps,
    InterfaceProps, MemoryLocation, MemoryStorage, Readiness, SearchComponent, SearchEngine,
    SearchInterface, SessionRegistry,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Captured events kept for the simulation report.
const DIAGNOSTICS_CAPACITY: usize = 512;

/// CaseAssist: search-interface tooling for the case-creation flow.
#[derive(Parser)]
#[command(name = "caseassist", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "caseassist.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Run a scripted session against the in-memory engine.
    Simulate(SimulateArgs),

    /// Print the rewritten form of a profile photo URL.
    RewritePhoto {
        url: String,
    },

    /// Select the result template for a set of raw fields.
    Template {
        /// Raw result fields as `field=value`.
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

#[derive(Args, Debug, Default)]
struct SimulateArgs {
    /// JSON configuration payload; overrides the `[remote]` section.
    #[arg(long)]
    payload: Option<PathBuf>,

    /// JSON search response served to every search.
    #[arg(long)]
    response: Option<PathBuf>,

    /// Serialized case data handed to the interface.
    #[arg(long)]
    case_data: Option<String>,

    /// Components attached to the same engine id.
    #[arg(long, default_value_t = 1)]
    components: usize,

    /// Generated-answer toggles to apply after initialization.
    #[arg(long, default_value_t = 0)]
    toggles: usize,

    /// Fragment pushed as an external hash change after initialization.
    #[arg(long)]
    hash: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let collector = DiagnosticsCollector::new(DIAGNOSTICS_CAPACITY);
    let diagnostics = collector.reader();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(collector)
        .init();

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Simulate(args) => cmd_simulate(&config, &args, &diagnostics).await?,
        Commands::RewritePhoto { url } => println!("{}", rewrite_photo_url(&url)),
        Commands::Template { fields } => cmd_template(&config, &fields)?,
    }

    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// What a simulated session did.
#[derive(Debug)]
struct SimulationReport {
    engine_id: String,
    state: BootState,
    readiness: Readiness,
    components_initialized: usize,
    engines_built: usize,
    dispatched: Vec<Action>,
    templates: Vec<String>,
    fragment: String,
}

async fn cmd_simulate(
    config: &AppConfig,
    args: &SimulateArgs,
    diagnostics: &DiagnosticsReader,
) -> Result<()> {
    let report = simulate(config, args).await?;
    print_report(&report, &diagnostics.warnings());
    Ok(())
}

async fn simulate(config: &AppConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    let source: Arc<dyn ConfigSource> = match &args.payload {
        Some(path) => Arc::new(FileConfigSource::new(path)),
        None => resolver::source_from_config(config),
    };
    let transport: Arc<dyn SearchTransport> = match &args.response {
        Some(path) => {
            let body = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading search response {}", path.display()))?;
            Arc::new(StaticTransport::new(body))
        }
        None => Arc::new(StaticTransport::empty()),
    };

    let factory = LocalEngineFactory::new(transport);
    let registry = SessionRegistry::new();
    let bootstrapper = Arc::new(Bootstrapper::new(
        registry.clone(),
        ConfigResolver::new(source),
        Arc::new(factory.clone()),
    ));
    let location = Arc::new(MemoryLocation::new(""));
    let templates = Arc::new(config.build_template_selector()?);
    let engine_id = config.interface.engine_id.clone();

    let components: Vec<SearchComponent> = (0..args.components)
        .map(|i| {
            let component =
                SearchComponent::new(&format!("component-{i}"), &engine_id, Arc::clone(&templates));
            component.register(&registry);
            component
        })
        .collect();

    let deps = InterfaceDeps {
        bootstrapper,
        storage: Arc::new(MemoryStorage::new()),
        location: location.clone(),
    };
    let props = InterfaceProps::from_config(config, args.case_data.as_deref());
    let (service, handle) = SearchInterface::new(props, deps).channel();
    let task = tokio::spawn(service.run());

    let readiness = handle.ready().await;
    info!(engine_id = %engine_id, readiness = ?readiness, "Simulated interface settled");
    if readiness == Readiness::Ready {
        if let Some(hash) = &args.hash {
            location.push(hash);
        }
        for _ in 0..args.toggles {
            handle.toggle_generated_answer().await?;
        }
    }
    handle.shutdown().await?;
    task.await.context("interface task panicked")?;

    let engines = factory.built();
    let engine = engines.last();
    let templates = engine
        .map(|engine| {
            engine
                .results()
                .iter()
                .map(|result| {
                    templates
                        .select(&result.raw)
                        .map_or_else(|| "-".to_string(), |rule| rule.name.clone())
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SimulationReport {
        state: registry.state(&engine_id),
        readiness,
        components_initialized: components.iter().filter(|c| c.is_initialized()).count(),
        engines_built: engines.len(),
        dispatched: engine.map(|e| e.dispatched()).unwrap_or_default(),
        templates,
        fragment: engine.map(|e| e.fragment()).unwrap_or_default(),
        engine_id,
    })
}

fn print_report(report: &SimulationReport, warnings: &[Diagnostic]) {
    println!("engine:      {} ({:?}, {:?})", report.engine_id, report.state, report.readiness);
    println!("engines:     {}", report.engines_built);
    println!("components:  {} initialized", report.components_initialized);
    println!("dispatch log:");
    if report.dispatched.is_empty() {
        println!("  (none)");
    }
    for (i, action) in report.dispatched.iter().enumerate() {
        println!("  {:>3}. {:<16} {:?}", i + 1, action.name(), action);
    }
    if !report.templates.is_empty() {
        println!("templates:   {}", report.templates.join(", "));
    }
    println!("fragment:    #{}", report.fragment);
    println!("warnings:");
    if warnings.is_empty() {
        println!("  (none)");
    }
    for warning in warnings {
        println!(
            "  [{:>8.3}s] {} {}",
            warning.elapsed_secs, warning.level, warning.message
        );
    }
}

fn cmd_template(config: &AppConfig, fields: &[String]) -> Result<()> {
    let selector = config.build_template_selector()?;
    let raw = parse_fields(fields)?;
    match selector.select(&raw) {
        Some(rule) => {
            println!("{}", rule.name);
            if !rule.fields.is_empty() {
                println!("fields: {}", rule.fields.join(", "));
            }
        }
        None => println!("no template matches"),
    }
    Ok(())
}

/// Parse `field=value` pairs into raw result fields.
fn parse_fields(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut raw = Map::new();
    for pair in pairs {
        let Some((field, value)) = pair.split_once('=') else {
            bail!("expected field=value, got '{pair}'");
        };
        raw.insert(field.trim().to_string(), Value::String(value.to_string()));
    }
    Ok(raw)
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseassist_test_utils::fixtures::{CONFIG_PAYLOAD, search_response};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_fields() {
        let raw = parse_fields(&["objecttype=Support File".to_string()]).unwrap();
        assert_eq!(raw["objecttype"], Value::String("Support File".into()));
        assert!(parse_fields(&["objecttype".to_string()]).is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_simulate_with_payload() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload.json");
        let response = dir.path().join("response.json");
        tokio::fs::write(&payload, CONFIG_PAYLOAD).await.unwrap();
        tokio::fs::write(&response, search_response().to_string())
            .await
            .unwrap();

        let args = SimulateArgs {
            payload: Some(payload),
            response: Some(response),
            components: 3,
            toggles: 2,
            hash: Some("q=rigging".into()),
            ..Default::default()
        };
        let report = simulate(&AppConfig::default(), &args).await.unwrap();

        assert_eq!(report.state, BootState::Initialized);
        assert_eq!(report.readiness, Readiness::Ready);
        assert_eq!(report.engines_built, 1);
        assert_eq!(report.components_initialized, 3);
        assert_eq!(report.fragment, "q=rigging");
        assert_eq!(report.templates, vec!["discussion", "case", "youtube"]);
        let names: Vec<&str> = report.dispatched.iter().map(Action::name).collect();
        assert_eq!(
            names,
            vec![
                "set_context",
                "update_query",
                "execute_search",
                "set_context",
                "execute_search",
                "set_context",
                "execute_search",
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_simulate_without_configuration() {
        let args = SimulateArgs {
            components: 2,
            toggles: 1,
            ..Default::default()
        };
        let report = simulate(&AppConfig::default(), &args).await.unwrap();

        assert_eq!(report.state, BootState::Unavailable);
        assert_eq!(report.readiness, Readiness::Unavailable);
        assert_eq!(report.engines_built, 0);
        assert_eq!(report.components_initialized, 0);
        assert!(report.dispatched.is_empty());
    }
}
