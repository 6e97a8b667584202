use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

use luna::agent::{self, ReasoningConfig, ReasoningEngine, TurnConfig};
use luna::config::Config;
use luna::context;
use luna::observability::TurnCounters;
use luna::profile::ProfileRecord;
use luna::providers;
use luna::search::SearchClient;
use luna::session::Session;
use luna::tools;

/// Luna — the portfolio assistant core.
#[derive(Parser, Debug)]
#[command(name = "luna")]
#[command(version)]
#[command(about = "Grounded portfolio assistant with tool-call recovery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with Luna (one-shot with MESSAGE, interactive otherwise)
    Chat {
        /// The message to send; omit for an interactive session
        message: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Run the server-side search relay
    Gateway {
        /// Bind host
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the optimized context and its validation report
    Context {
        /// Token budget override
        #[arg(long)]
        max_tokens: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG, defaults to INFO.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Chat { message, model } => run_chat(&config, message, model.as_deref()).await,
        Commands::Gateway { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            luna::gateway::run_gateway(&config).await
        }
        Commands::Context { max_tokens } => {
            let profile = ProfileRecord::embedded();
            let budget = max_tokens.unwrap_or(config.context.max_tokens);
            let ctx = context::build_optimized_context(profile, None, budget);
            println!("{}", ctx.user_context);
            println!("\n--- estimated tokens: {} / {budget}", ctx.estimated_tokens);

            let report = context::validate_context(profile, &ctx);
            if report.ok {
                println!("--- validation: ok");
            } else {
                println!("--- validation issues: {:?}", report.issues);
            }
            Ok(())
        }
    }
}

async fn run_chat(config: &Config, message: Option<String>, model: Option<&str>) -> Result<()> {
    let profile = ProfileRecord::embedded();
    let provider = providers::create_provider(&config.provider.name, config.api_key.as_deref())?;
    let search = Arc::new(SearchClient::new(&config.search.relay_url));
    let tools = tools::default_tools(search, config.search.count);
    let model = model.unwrap_or(&config.default_model);

    let mut session = Session::with_greeting();
    let mut counters = TurnCounters::default();

    if let Some(message) = message {
        run_one_turn(
            config, profile, provider.as_ref(), &tools, model, &mut session, &mut counters,
            &message,
        )
        .await;
        return Ok(());
    }

    println!("🌙 Luna interactive mode — ketik /quit untuk keluar.\n");
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        run_one_turn(
            config, profile, provider.as_ref(), &tools, model, &mut session, &mut counters, line,
        )
        .await;
    }

    tracing::info!(
        answered = counters.answered,
        errored = counters.errored,
        tools_executed = counters.tools_executed,
        "session finished"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_one_turn(
    config: &Config,
    profile: &ProfileRecord,
    provider: &dyn providers::Provider,
    tools: &[Box<dyn tools::Tool>],
    model: &str,
    session: &mut Session,
    counters: &mut TurnCounters,
    message: &str,
) {
    // Feature-flagged multi-turn loop; the single-turn orchestrator is the
    // primary path.
    if config.reasoning.multi_turn {
        let engine = ReasoningEngine::new(
            provider,
            tools,
            context::system_prompt(profile),
            ReasoningConfig {
                max_iterations: config.reasoning.max_iterations,
                model: model.to_string(),
                params: config.generation_params(),
            },
        );
        match engine.reason(message, &[]).await {
            Ok(result) => {
                println!("\n{}\n", result.final_answer);
                tracing::info!(
                    iterations = result.total_iterations,
                    confidence = ?result.confidence,
                    sources = result.search_results.len(),
                    "reasoning turn finished"
                );
            }
            Err(e) => println!("\n{}\n", e),
        }
        return;
    }

    let outcome = agent::run_turn(
        TurnConfig {
            provider,
            tools,
            profile,
            model,
            params: config.generation_params(),
            memory_options: config.memory_options(),
            context_max_tokens: config.context.max_tokens,
            status_delay: agent::DEFAULT_STATUS_DELAY,
        },
        session,
        message,
        counters,
        None,
    )
    .await;

    println!("\n{}\n", outcome.content);
    if !outcome.sources.is_empty() {
        println!("Sumber:");
        for source in &outcome.sources {
            println!("  - {} ({})", source.title, source.url);
        }
        println!();
    }
    if outcome.tool_calls > 0 {
        tracing::info!(
            tool_calls = outcome.tool_calls,
            duration_ms = outcome.duration_ms,
            "turn completed with tool use"
        );
    }
}
