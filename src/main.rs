mod application;
mod config;
mod domain;
mod infrastructure;

use application::builtin;
use application::registry::ToolRegistry;
use application::resolver::PromptSource;
use application::session::{
    BuildRequest, BuilderSession, OpenSession, SessionOptions, TurnOutcome,
};
use clap::{Parser, ValueEnum};
use config::AppConfig;
use domain::artifact::ConfigurationArtifact;
use infrastructure::model::GeminiClient;
use infrastructure::remote::HttpSchemaSource;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "agent-forge",
    version,
    about = "Builds agent configurations from natural-language goals"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    endpoint: Option<String>,
    /// Fetch tool schemas from a definitions server instead of the
    /// built-in set.
    #[arg(long)]
    registry_url: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Build)]
    mode: RunMode,
    #[arg(long)]
    goal: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    output: Option<String>,
    /// Skip the interactive plan approval step.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Build,
    Open,
}

struct StdinPrompter;

impl PromptSource for StdinPrompter {
    fn prompt(&self, message: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{message}")?;
        stdout.flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim_end_matches(['\n', '\r']).to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting agent-forge");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, registry_url = ?cli.registry_url, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }
    if let Some(endpoint) = cli.endpoint.clone() {
        config.endpoint = endpoint;
    }
    if cli.registry_url.is_some() {
        config.registry_url = cli.registry_url.clone();
    }

    let api_key = std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok();
    if api_key.is_none() {
        warn!("Neither GEMINI_API_KEY nor GOOGLE_API_KEY is set; model calls will fail");
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let provider = GeminiClient::new(
        config.endpoint.clone(),
        config.model.clone(),
        api_key,
        timeout,
    )?;

    let registry = match &config.registry_url {
        Some(url) => {
            info!(url = url.as_str(), "Loading tool registry from remote source");
            let source = HttpSchemaSource::new(url.clone(), timeout)?;
            ToolRegistry::fetch(&source).await?
        }
        None => ToolRegistry::from_declarations(&builtin::declarations()),
    };
    if registry.is_empty() {
        warn!("Tool registry is empty; only tool-free agents can be built");
    }
    info!(tools = registry.len(), "Tool registry ready");
    let registry = Arc::new(registry);

    let prompts = StdinPrompter;
    match cli.mode {
        RunMode::Build => run_build(&cli, &config, &provider, registry, &prompts).await?,
        RunMode::Open => run_open(&cli, &config, &provider, registry, &prompts).await?,
    }
    info!("agent-forge finished");
    Ok(())
}

async fn run_build(
    cli: &Cli,
    config: &AppConfig,
    provider: &GeminiClient,
    registry: Arc<ToolRegistry>,
    prompts: &StdinPrompter,
) -> Result<(), Box<dyn Error>> {
    let agent_name = match cli.name.clone() {
        Some(name) => name,
        None => prompts.prompt("What would you like to name your new agent? ")?,
    };
    let description = match cli.description.clone() {
        Some(description) => description,
        None => prompts.prompt(&format!("Provide a brief description for '{agent_name}': "))?,
    };
    let goal = match cli.goal.clone() {
        Some(goal) => goal,
        None => prompts.prompt(&format!(
            "In one sentence, describe the main goal of '{agent_name}': "
        ))?,
    };

    let session = BuilderSession::new(provider, registry, prompts).with_options(SessionOptions {
        max_iterations: config.max_iterations,
        approve_plan: !cli.yes,
    });

    let report = match session
        .build(BuildRequest {
            goal,
            agent_name,
            description,
        })
        .await
    {
        Ok(report) => report,
        Err(error) => {
            eprintln!("{}", error.user_message());
            return Err(error.into());
        }
    };

    for skipped in &report.skipped {
        eprintln!("Skipped `{}`: {}", skipped.tool_name, skipped.reason);
    }
    write_artifact(&report.artifact, cli.output.as_deref())
}

async fn run_open(
    cli: &Cli,
    config: &AppConfig,
    provider: &GeminiClient,
    registry: Arc<ToolRegistry>,
    prompts: &StdinPrompter,
) -> Result<(), Box<dyn Error>> {
    println!("Hello! I'm the agent builder. Describe what you'd like to automate (type 'exit' to quit).");
    let mut session = OpenSession::new(provider, registry, prompts, config.max_iterations);

    loop {
        let input = prompts.prompt("You: ")?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        match session.turn(input).await {
            Ok(TurnOutcome::Reply(reply)) => println!("{reply}"),
            Ok(TurnOutcome::Finalized(artifact)) => {
                write_artifact(&artifact, cli.output.as_deref())?;
                break;
            }
            // Exchange-scoped failures end only the current turn.
            Err(error) if error.is_exchange_scoped() => {
                eprintln!("{}", error.user_message());
            }
            Err(error) => {
                eprintln!("{}", error.user_message());
                return Err(error.into());
            }
        }
    }
    Ok(())
}

fn write_artifact(
    artifact: &ConfigurationArtifact,
    output: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let rendered = serde_json::to_string_pretty(artifact)?;
    let path = output.map(str::to_string).unwrap_or_else(|| artifact.file_name());
    fs::write(&path, format!("{rendered}\n"))?;
    println!("{rendered}");
    println!("Configuration saved to '{path}'");
    info!(path = path.as_str(), "Artifact written");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
