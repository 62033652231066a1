//! Switchboard CLI: chat with a coordinator agent that hands off to specialists.

mod router;

use anyhow::{Context, Result};
use clap::Parser;
use router::Router;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use switchboard_api::{GeminiClient, GeminiFactory};
use switchboard_config::{CliOverrides, MemoryBackend, MemorySettings, SwitchboardConfig};
use switchboard_core::{
    AgentRegistry, ChatAgentConfig, ChatManager, LoopLimits, MemoryMode, RoutingChatManager,
    SpecialistDefinition,
};
use switchboard_memory::{InMemoryStore, JsonFileStore, MemoryAdapters};

#[derive(Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Multi-agent chat router for Gemini models"
)]
struct Cli {
    /// Send a single prompt and print the response (non-interactive)
    #[arg(short, long)]
    print: Option<String>,

    /// Session id to talk in
    #[arg(long, default_value = "cli")]
    session: String,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// API key (overrides GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Memory backend: none, memory or file
    #[arg(long, value_parser = parse_backend)]
    memory: Option<MemoryBackend>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,

    /// Talk to a single agent without sub-conversation routing
    #[arg(long)]
    no_routing: bool,
}

fn parse_backend(value: &str) -> Result<MemoryBackend, String> {
    match value {
        "none" => Ok(MemoryBackend::None),
        "memory" => Ok(MemoryBackend::Memory),
        "file" => Ok(MemoryBackend::File),
        other => Err(format!("unknown memory backend '{other}' (expected none, memory or file)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = SwitchboardConfig::load(CliOverrides {
        api_key: cli.api_key,
        model: cli.model,
        memory_backend: cli.memory,
    })
    .context("Failed to load configuration")?;

    let client = GeminiClient::new(&config.api_key, &config.api_base_url)
        .context("Failed to create API client")?;
    let router = build_router(client, &config, cli.no_routing)?;

    let result = match cli.print {
        Some(prompt) => {
            let reply = router.process_message(&cli.session, &prompt).await;
            println!("{reply}");
            Ok(())
        }
        None => repl(&router, &config, &cli.session).await,
    };

    router.shutdown().await;
    result
}

fn build_router(client: GeminiClient, config: &SwitchboardConfig, no_routing: bool) -> Result<Router> {
    let limits = LoopLimits {
        max_iterations: config.agent.max_iterations,
        model_timeout: Some(Duration::from_secs(config.agent.model_timeout_secs)),
        tool_timeout: Some(Duration::from_secs(config.agent.tool_timeout_secs)),
    };
    let definitions = config
        .specialists
        .iter()
        .map(|s| SpecialistDefinition {
            role: s.role.clone(),
            objective: s.objective.clone(),
            context: s.context.clone(),
            model: s.model.clone(),
            enable_google_search: s.enable_google_search,
        })
        .collect();
    let registry = Arc::new(
        AgentRegistry::new(Arc::new(GeminiFactory::new(client)), config.model.clone())
            .with_limits(limits.clone())
            .with_definitions(definitions),
    );

    let memory = memory_mode(&config.memory);
    let coordinator = ChatAgentConfig {
        role: config.coordinator.role.clone(),
        objective: config.coordinator.objective.clone(),
        context: config.coordinator.context.clone(),
        model: Some(config.model.clone()),
        enable_google_search: config.agent.enable_google_search,
        thinking_model: config.agent.thinking_model,
        enable_specialist_delegation: !config.specialists.is_empty(),
        enable_memory_tools: config.memory.backend != MemoryBackend::None,
        limits,
    };

    if no_routing || config.specialists.is_empty() {
        if !no_routing {
            tracing::info!("no specialists configured, routing disabled");
        }
        let provider = registry
            .provider_for(&config.model)
            .context("Failed to create model provider")?;
        let manager = ChatManager::new(coordinator, provider, memory).with_registry(registry);
        return Ok(Router::Plain(manager));
    }

    let manager = RoutingChatManager::new(coordinator, registry, memory)
        .context("Failed to create coordinator")?;
    Ok(Router::Routing(manager))
}

fn memory_mode(settings: &MemorySettings) -> MemoryMode {
    match (settings.backend, settings.shared) {
        (MemoryBackend::None, _) => MemoryMode::None,
        (MemoryBackend::Memory, true) => {
            MemoryMode::Shared(MemoryAdapters::all(Arc::new(InMemoryStore::new())))
        }
        (MemoryBackend::Memory, false) => MemoryMode::PerSession(Arc::new(|| {
            MemoryAdapters::all(Arc::new(InMemoryStore::new()))
        })),
        (MemoryBackend::File, true) => {
            MemoryMode::Shared(MemoryAdapters::all(Arc::new(JsonFileStore::new(&settings.dir))))
        }
        (MemoryBackend::File, false) => {
            let dir = settings.dir.clone();
            MemoryMode::PerSession(Arc::new(move || {
                MemoryAdapters::all(Arc::new(JsonFileStore::new(dir.clone())))
            }))
        }
    }
}

async fn repl(router: &Router, config: &SwitchboardConfig, session_id: &str) -> Result<()> {
    let stdin = io::stdin();

    let specialists = if config.specialists.is_empty() {
        "none".to_string()
    } else {
        config
            .specialists
            .iter()
            .map(|s| s.role.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    eprintln!(
        "switchboard v{} (model: {}, specialists: {}, session: {})",
        env!("CARGO_PKG_VERSION"),
        config.model,
        specialists,
        session_id
    );
    eprintln!("Type your message. /help for commands, Ctrl+D to exit.\n");

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin
            .lock()
            .read_line(&mut input)
            .context("Failed to read from stdin")?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(handled) = handle_slash_command(input, router, session_id).await {
            match handled {
                SlashResult::Continue => continue,
                SlashResult::Break => break,
                SlashResult::Unknown => {
                    eprintln!("Unknown command: {input}. Type /help for available commands.");
                    continue;
                }
            }
        }

        let reply = router.process_message(session_id, input).await;
        println!("{reply}");
        println!();
    }

    Ok(())
}

enum SlashResult {
    Continue,
    Break,
    Unknown,
}

async fn handle_slash_command(input: &str, router: &Router, session_id: &str) -> Option<SlashResult> {
    if !input.starts_with('/') {
        return None;
    }

    match input {
        "/quit" | "/exit" => Some(SlashResult::Break),
        "/end" => {
            if router.end_session(session_id).await {
                eprintln!("Session '{session_id}' ended. The next message starts fresh.");
            } else {
                eprintln!("Session '{session_id}' has not started yet.");
            }
            Some(SlashResult::Continue)
        }
        "/status" => {
            eprintln!("{}", router.status(session_id).await);
            Some(SlashResult::Continue)
        }
        "/help" => {
            print_help();
            Some(SlashResult::Continue)
        }
        _ => Some(SlashResult::Unknown),
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help    Show this help");
    eprintln!("  /status  Show which agent is answering");
    eprintln!("  /end     End the session and forget its in-process state");
    eprintln!("  /exit    Exit");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_memory_backends() {
        assert_eq!(parse_backend("file"), Ok(MemoryBackend::File));
        assert_eq!(parse_backend("none"), Ok(MemoryBackend::None));
        assert!(parse_backend("redis").is_err());
    }

    #[test]
    fn memory_mode_follows_settings() {
        let settings = |backend, shared| MemorySettings {
            backend,
            shared,
            dir: PathBuf::from("/tmp/switchboard-test"),
        };
        assert!(matches!(memory_mode(&settings(MemoryBackend::None, true)), MemoryMode::None));
        assert!(matches!(
            memory_mode(&settings(MemoryBackend::Memory, true)),
            MemoryMode::Shared(_)
        ));
        assert!(matches!(
            memory_mode(&settings(MemoryBackend::File, false)),
            MemoryMode::PerSession(_)
        ));
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::parse_from(["switchboard", "--no-routing", "--session", "s2", "-p", "hi"]);
        assert!(cli.no_routing);
        assert_eq!(cli.session, "s2");
        assert_eq!(cli.print.as_deref(), Some("hi"));
        assert_eq!(cli.memory, None);
    }
}
