mod cli;
mod commands;
mod view;

use std::process::ExitCode;
use std::sync::Arc;

use parley_common::EventBus;
use parley_config::schema::ParleyConfig;
use parley_session::{
    spawn_session, Intent, IpcGateway, PromptTemplate, RuntimeOptions, SessionController,
};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "parley=info";

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("\n--- Parley crashed ---");
        eprintln!("Please report this issue at: https://github.com/parley-chat/parley/issues");
        eprintln!("----------------------\n");

        default_hook(info);
    }));
}

fn init_logging(directive: &str) {
    let directive = directive
        .parse::<Directive>()
        .or_else(|_| DEFAULT_DIRECTIVE.parse::<Directive>());
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive {
        filter = filter.add_directive(directive);
    }
    // stdout belongs to the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn prompt_template(config: &ParleyConfig, raw: bool) -> Option<PromptTemplate> {
    if raw || !config.backend.wrap_prompt {
        return None;
    }
    match config.backend.prompt_template {
        Some(ref template) => PromptTemplate::new(template.as_str()).or_else(|| {
            tracing::warn!("prompt_template has no {{instruction}} placeholder, using default");
            Some(PromptTemplate::default())
        }),
        None => Some(PromptTemplate::default()),
    }
}

/// The model to load at startup. A blank path means "don't auto-load".
fn startup_model(cli: Option<String>, configured: Option<String>) -> Option<String> {
    cli.or(configured).filter(|path| !path.trim().is_empty())
}

async fn run(args: cli::Args, config: ParleyConfig) -> parley_common::Result<()> {
    // Start the backend process
    let command = args
        .backend
        .clone()
        .unwrap_or_else(|| config.backend.command.clone());
    let template = prompt_template(&config, args.raw);
    let gateway = Arc::new(IpcGateway::spawn(&command, &config.backend.args, template)?);

    let bus = Arc::new(EventBus::new(config.session.event_capacity as usize));
    let controller = SessionController::with_event_bus(gateway, config.inference.clone(), bus);
    let options = RuntimeOptions {
        intent_capacity: config.session.intent_capacity as usize,
    };
    let handle = spawn_session(controller, options)?;

    if let Some(path) = startup_model(args.model, config.model.path) {
        handle.send(Intent::LoadModel(path)).await?;
    }

    view::run(handle).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    install_panic_hook();

    // Parse CLI arguments
    let args = cli::parse();

    // Load config before logging so its level applies; report failures after.
    let loaded = match args.config {
        Some(ref path) => parley_config::load_config_from(path),
        None => parley_config::load_config(),
    };
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.directive())
        .unwrap_or(DEFAULT_DIRECTIVE);
    init_logging(args.log_level.as_deref().unwrap_or(level));

    tracing::info!("Parley v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        ParleyConfig::default()
    });

    match run(args, config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Parley failed: {e}");
            eprintln!("parley: {e}");
            ExitCode::FAILURE
        }
    }
}
