//! `warden`: evaluate documents against compliance scenarios.
//!
//! Results are printed as JSON on stdout. Logs go to stderr and are
//! filtered with `RUST_LOG`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warden_core::threshold;
use warden_core::{Case, Document, ScenarioClassifier, ScenarioRegistry, Verdict};
use warden_runtime::{AnswerAgent, CaseRunner, RuntimeConfig, ScorerAgent};

#[derive(Parser)]
#[command(name = "warden", author, version, about, long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate every scenario in a directory
    Validate {
        /// Scenario directory
        dir: PathBuf,
    },

    /// Classify a document by scenario keywords
    Classify {
        #[arg(long, default_value = "scenarios")]
        scenarios: PathBuf,

        /// Document text file
        file: PathBuf,
    },

    /// Evaluate one document
    Evaluate {
        #[arg(long, default_value = "scenarios")]
        scenarios: PathBuf,

        /// Document text file
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = AgentKind::Offline)]
        agent: AgentKind,

        /// Runtime config (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate every `.txt` file in a directory
    Batch {
        #[arg(long, default_value = "scenarios")]
        scenarios: PathBuf,

        /// Directory of document text files
        docs: PathBuf,

        #[arg(long, value_enum, default_value_t = AgentKind::Offline)]
        agent: AgentKind,

        /// Runtime config (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write results here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Compare a value against a limit
    Threshold {
        value: f64,
        limit: f64,

        /// greater_than, less_than, greater_or_equal or less_or_equal
        #[arg(long, default_value = "greater_than")]
        comparator: String,
    },
}

/// Who answers the decision-tree questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    /// Evidence scorer only, no network
    Offline,
    /// Claude via the Anthropic API (ReAct loop)
    Anthropic,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warden=debug" } else { "warden=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate { dir } => cmd_validate(&dir),
        Commands::Classify { scenarios, file } => cmd_classify(&scenarios, &file),
        Commands::Evaluate {
            scenarios,
            file,
            agent,
            config,
        } => cmd_evaluate(&scenarios, &file, agent, config.as_deref()).await,
        Commands::Batch {
            scenarios,
            docs,
            agent,
            config,
            output,
        } => cmd_batch(&scenarios, &docs, agent, config.as_deref(), output.as_deref()).await,
        Commands::Threshold {
            value,
            limit,
            comparator,
        } => cmd_threshold(value, limit, &comparator),
    }
}

fn cmd_validate(dir: &Path) -> Result<()> {
    let registry = load_registry(dir)?;

    let summary: Vec<_> = registry
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "name": s.name,
                "start": s.start,
                "questions": s.questions.len(),
                "keywords": s.keywords,
            })
        })
        .collect();

    info!(scenarios = registry.len(), "All scenarios valid");
    print_json(&summary)
}

fn cmd_classify(scenarios: &Path, file: &Path) -> Result<()> {
    let registry = load_registry(scenarios)?;
    let text = read_text(file)?;

    match ScenarioClassifier::new().classify(&text, &registry) {
        Some(classification) => print_json(&classification),
        None => {
            info!("No scenario keywords matched");
            print_json(&serde_json::json!({ "scenario_id": null }))
        }
    }
}

async fn cmd_evaluate(
    scenarios: &Path,
    file: &Path,
    agent: AgentKind,
    config: Option<&Path>,
) -> Result<()> {
    let runner = build_runner(scenarios, agent, config)?;
    let document = Document::new(document_id(file), read_text(file)?);

    let case = runner.run_case(&document).await;
    print_json(&case)
}

async fn cmd_batch(
    scenarios: &Path,
    docs: &Path,
    agent: AgentKind,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let runner = build_runner(scenarios, agent, config)?;
    let documents = read_documents(docs)?;
    if documents.is_empty() {
        warn!(dir = %docs.display(), "No .txt documents found");
    }

    let mut cases = runner.run_batch(documents).await;
    cases.sort_by(|a, b| a.article_id.cmp(&b.article_id));

    let summary = BatchSummary::from_cases(&cases);
    summary.log();

    let json = serde_json::to_string_pretty(&cases)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Results written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_threshold(value: f64, limit: f64, comparator: &str) -> Result<()> {
    let check = threshold::compare(value, limit, comparator)?;
    print_json(&check)
}

fn build_runner(scenarios: &Path, agent: AgentKind, config: Option<&Path>) -> Result<CaseRunner> {
    let registry = Arc::new(load_registry(scenarios)?);
    let config = match config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let agent = build_agent(agent, &config)?;

    Ok(CaseRunner::builder()
        .registry(registry)
        .agent(agent)
        .config(config)
        .build()?)
}

fn build_agent(kind: AgentKind, config: &RuntimeConfig) -> Result<Arc<dyn AnswerAgent>> {
    match kind {
        AgentKind::Offline => Ok(Arc::new(ScorerAgent::default())),
        AgentKind::Anthropic => anthropic_agent(config),
    }
}

#[cfg(feature = "anthropic")]
fn anthropic_agent(config: &RuntimeConfig) -> Result<Arc<dyn AnswerAgent>> {
    use warden_runtime::providers::AnthropicProvider;
    use warden_runtime::ReactAgent;

    let provider = AnthropicProvider::from_config(&config.llm.provider)?;
    Ok(Arc::new(ReactAgent::new(Arc::new(provider), config)))
}

#[cfg(not(feature = "anthropic"))]
fn anthropic_agent(_config: &RuntimeConfig) -> Result<Arc<dyn AnswerAgent>> {
    bail!("warden was built without the `anthropic` feature")
}

fn load_registry(dir: &Path) -> Result<ScenarioRegistry> {
    let registry = ScenarioRegistry::load_dir(dir)
        .with_context(|| format!("Failed to load scenarios from {}", dir.display()))?;
    if registry.is_empty() {
        bail!("No scenarios found in {}", dir.display());
    }
    Ok(registry)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every `.txt` file in `dir`, sorted by path. The file stem is the id.
fn read_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| Ok(Document::new(document_id(path), read_text(path)?)))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Counts reported after a batch.
#[derive(Debug, Default, PartialEq)]
struct BatchSummary {
    total: usize,
    verdicts: BTreeMap<String, usize>,
    failed: usize,
    flagged_for_review: usize,
    documents_needed: Vec<String>,
}

impl BatchSummary {
    fn from_cases(cases: &[Case]) -> Self {
        let mut summary = BatchSummary {
            total: cases.len(),
            ..Default::default()
        };

        for case in cases {
            *summary.verdicts.entry(case.verdict.to_string()).or_default() += 1;
            if case.error.is_some() {
                summary.failed += 1;
            }
            if !case.uncertain_node_ids.is_empty() {
                summary.flagged_for_review += 1;
            }
            if case.verdict == Verdict::MissingInfo {
                for field in &case.missing_fields {
                    if !summary.documents_needed.contains(&field.suggested_documents) {
                        summary.documents_needed.push(field.suggested_documents.clone());
                    }
                }
            }
        }
        summary
    }

    fn log(&self) {
        info!(total = self.total, failed = self.failed, "Batch complete");
        for (verdict, count) in &self.verdicts {
            info!(verdict = %verdict, count, "Verdicts");
        }
        if self.flagged_for_review > 0 {
            info!(cases = self.flagged_for_review, "Flagged for review");
        }
        for document in &self.documents_needed {
            info!(document = %document, "Documents needed");
        }
    }
}
