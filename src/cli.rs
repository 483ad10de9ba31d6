use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser, Serialize)]
#[command(about = "Scoreboard rankings pulled from a game server console")]
pub struct Cli {
    /// Path of the YAML configuration document
    #[arg(long, default_value = "config.yaml")]
    #[serde(skip)]
    pub config: PathBuf,
    /// Refresh the rankings once, print them and exit
    #[arg(long)]
    #[serde(skip)]
    pub once: bool,
    /// One of TRACE, DEBUG, INFO, WARN, ERROR
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_level: Option<String>,
}
