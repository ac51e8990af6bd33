//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};

use crate::statistics::WorkState;

/// Shiori - Annict watch history dashboard
#[derive(Parser)]
#[command(name = "shiori")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "s")]
    Serve,

    /// Print the dashboard as JSON
    #[command(alias = "d")]
    Dashboard {
        /// Number of watched works to include
        #[arg(long, default_value = "10")]
        page_size: i32,
    },

    /// List one page of works as JSON
    #[command(alias = "ls")]
    Works {
        #[arg(value_enum)]
        state: StateArg,

        #[arg(long, default_value = "20")]
        page_size: i32,

        /// Cursor returned by the previous page
        #[arg(long, default_value = "")]
        cursor: String,
    },

    /// Record the next episode of every work in progress
    Start,

    /// Start watching a work, given its page URL or numeric id
    Add {
        /// e.g. https://annict.com/works/6489
        target: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Watching,
    Watched,
}

impl From<StateArg> for WorkState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Watching => Self::Watching,
            StateArg::Watched => Self::Watched,
        }
    }
}

/// Extracts the numeric work id from `https://annict.com/works/<id>` or a bare id.
#[must_use]
pub fn parse_work_id(target: &str) -> Option<i64> {
    target
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
        .filter(|id| *id > 0)
}
