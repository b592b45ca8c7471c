use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use wikipath_core::{Heuristic, SearchMethod};

#[derive(Debug, Parser)]
#[command(name = "wikipath")]
#[command(about = "Find a chain of hyperlinks between two Wikipedia articles", long_about = None)]
pub struct Cli {
    /// Article to start from (URL or title).
    pub start: String,
    /// Article to reach.
    pub finish: String,

    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Only used by A*.
    #[arg(long, value_enum)]
    pub heuristic: Option<HeuristicArg>,

    /// Search backend, e.g. http://127.0.0.1:5001
    #[arg(long)]
    pub server: Option<String>,

    /// RON settings file; defaults to ./wikipath.ron when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub backoff: Option<BackoffArg>,

    /// Also write the diagnostic log to ./wikipath.log.
    #[arg(long)]
    pub log_file: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Bfs,
    AStar,
}

impl From<MethodArg> for SearchMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Bfs => SearchMethod::Bfs,
            MethodArg::AStar => SearchMethod::AStar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HeuristicArg {
    Links,
    Categories,
}

impl From<HeuristicArg> for Heuristic {
    fn from(arg: HeuristicArg) -> Self {
        match arg {
            HeuristicArg::Links => Heuristic::Links,
            HeuristicArg::Categories => Heuristic::Categories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    Fixed,
    Escalating,
}
