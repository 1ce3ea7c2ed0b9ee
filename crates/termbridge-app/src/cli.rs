use clap::Parser;

/// Headless host for the terminal session bridge.
#[derive(Parser, Debug)]
#[command(name = "termbridge", version, about)]
pub struct Args {
    /// Execute a program instead of the default shell.
    #[arg(short = 'e', long)]
    pub execute: Option<String>,

    /// Working directory to start sessions in.
    #[arg(short = 'd', long)]
    pub directory: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
