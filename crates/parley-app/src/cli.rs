use std::path::PathBuf;

use clap::Parser;

/// Parley: chat with a locally loaded language model.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct Args {
    /// Model file to load at startup (overrides `model.path`).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Backend executable (overrides `backend.command`).
    #[arg(short = 'b', long)]
    pub backend: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Send prompts to the backend without the instruction template.
    #[arg(long)]
    pub raw: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
