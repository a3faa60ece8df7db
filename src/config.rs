use clap::Parser;
use std::path::PathBuf;

use crate::tree::DEFAULT_MAX_DEPTH;

/// Command-line arguments for gradetreed
#[derive(Parser, Debug, Clone)]
#[command(name = "gradetreed")]
#[command(about = "Weighted grade tree sidecar speaking line-delimited JSON on stdio")]
#[command(version)]
pub struct Args {
    /// Workspace folder to open at startup
    #[arg(long, env = "GRADETREED_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Deepest allowed item nesting
    #[arg(
        long,
        env = "GRADETREED_MAX_DEPTH",
        default_value_t = DEFAULT_MAX_DEPTH as u16,
        value_parser = clap::value_parser!(u16).range(1..=256)
    )]
    pub max_depth: u16,
}

impl Args {
    pub fn max_depth(&self) -> usize {
        usize::from(self.max_depth)
    }
}
