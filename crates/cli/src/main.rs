use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use consulta_cache::ResultCache;
use consulta_core::{classify_query, DispatchOutcome};
use consulta_dispatch::{DispatchConfig, Dispatcher};
use consulta_handlers::registry_from_env;
use consulta_observability::{init_tracing, AppMetrics};

const SLOW_QUERY_HINT_AFTER_MS: u64 = 20_000;

#[derive(Debug, Parser)]
#[command(name = "consulta")]
#[command(about = "Route questions about the Brazilian economy to specialized handlers")]
struct Cli {
    /// Use local handlers even if an API token is configured.
    #[arg(long, global = true)]
    offline: bool,

    #[command(flatten)]
    timing: TimingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct TimingArgs {
    #[arg(long, global = true, env = "CONSULTA_DEADLINE_SECS", default_value_t = 30)]
    deadline_secs: u64,

    #[arg(long, global = true, env = "CONSULTA_GRACE_SECS", default_value_t = 5)]
    grace_secs: u64,

    #[arg(long, global = true, env = "CONSULTA_MAX_STEPS", default_value_t = 20)]
    max_steps: u32,

    #[arg(long, global = true, env = "CONSULTA_CACHE_TTL_SECS", default_value_t = 1800)]
    cache_ttl_secs: u64,
}

impl TimingArgs {
    fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            deadline: Duration::from_secs(self.deadline_secs),
            grace: Duration::from_secs(self.grace_secs),
            max_handler_steps: self.max_steps,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session.
    Chat,
    /// Dispatch one query and print the outcome as JSON.
    Ask { query: String },
    /// Show how a query would be classified.
    Classify { query: String },
}

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Quit,
    Help,
    Status,
    ClearScreen,
    CacheClear,
    CacheInfo,
    Empty,
    Query(&'a str),
}

fn parse_repl_line(line: &str) -> ReplCommand<'_> {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();

    match lower.as_str() {
        "" => ReplCommand::Empty,
        "quit" | "exit" | "sair" => ReplCommand::Quit,
        "help" | "ajuda" => ReplCommand::Help,
        "status" | "info" => ReplCommand::Status,
        "clear" | "limpar" => ReplCommand::ClearScreen,
        "cache clear" => ReplCommand::CacheClear,
        "cache" | "cache info" => ReplCommand::CacheInfo,
        _ => ReplCommand::Query(trimmed),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("consulta_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Classify { query } => {
            println!("{}", serde_json::to_string_pretty(&classify_query(&query))?);
        }
        Command::Ask { query } => {
            let dispatcher = build_dispatcher(&cli.timing, cli.offline)?;
            let outcome = dispatcher.dispatch(&query).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Chat => {
            let dispatcher = build_dispatcher(&cli.timing, cli.offline)?;
            run_chat(dispatcher).await?;
        }
    }

    Ok(())
}

fn build_dispatcher(timing: &TimingArgs, offline: bool) -> Result<Dispatcher> {
    let config = timing.dispatch_config();
    let registry = registry_from_env(offline)?;

    Dispatcher::new(
        registry,
        ResultCache::new(config.cache_ttl),
        config,
        AppMetrics::shared(),
    )
    .context("invalid dispatch settings")
}

async fn run_chat(dispatcher: Dispatcher) -> Result<()> {
    println!("Consulta chat mode. type 'help' for commands, 'quit' to leave.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        match parse_repl_line(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => continue,
            ReplCommand::Help => print_help(),
            ReplCommand::Status => print_status(&dispatcher)?,
            ReplCommand::ClearScreen => {
                print!("\x1B[2J\x1B[1;1H");
                io::stdout().flush()?;
            }
            ReplCommand::CacheClear => {
                let cleared = dispatcher.cache().clear();
                println!("cache cleared ({cleared} entries)");
            }
            ReplCommand::CacheInfo => {
                let cache = dispatcher.cache();
                println!(
                    "cache: {} entries, ttl {}s",
                    cache.size(),
                    cache.ttl().as_secs()
                );
            }
            ReplCommand::Query(query) => {
                let outcome = dispatcher.dispatch(query).await;
                render_outcome(&outcome);
            }
        }
    }

    Ok(())
}

fn render_outcome(outcome: &DispatchOutcome) {
    match (&outcome.content, &outcome.error_message) {
        (Some(content), _) => println!("\n{content}\n"),
        (None, Some(message)) => println!("\n{message}\n"),
        (None, None) => println!("\n(no content)\n"),
    }

    println!("status: {:?}{}", outcome.status, if outcome.cached { " (cached)" } else { "" });
    println!("processing time: {:.2}s", outcome.duration_ms as f64 / 1000.0);
    if let Some(handler) = outcome.handler_used {
        println!("handler: {handler}");
    }
    if let Some(classification) = &outcome.classification {
        println!(
            "intent: {} (confidence {:.2})",
            classification.intent, classification.confidence
        );
        if !classification.entities.is_empty() {
            println!("entities: {}", classification.entities.join(", "));
        }
    }

    if outcome.duration_ms > SLOW_QUERY_HINT_AFTER_MS {
        println!("hint: that took a while. specific queries such as 'PIB Brasil 2023' answer faster.");
    }
    println!();
}

fn print_help() {
    println!("commands:");
    println!("  help | ajuda        show this help");
    println!("  status | info       dispatcher settings and counters");
    println!("  clear | limpar      clear the screen");
    println!("  cache info          cached entries and ttl");
    println!("  cache clear         drop every cached answer");
    println!("  quit | exit | sair  leave");
    println!("anything else is dispatched as a query, e.g. 'PIB Brasil 2023' or 'clima em Recife'.");
}

fn print_status(dispatcher: &Dispatcher) -> Result<()> {
    let config = dispatcher.config();
    println!(
        "deadline {:?}, grace {:?}, max steps {}, cache ttl {:?}",
        config.deadline, config.grace, config.max_handler_steps, config.cache_ttl
    );
    println!("cache entries: {}", dispatcher.cache().size());
    println!(
        "{}",
        serde_json::to_string_pretty(&dispatcher.metrics().snapshot())?
    );
    Ok(())
}
