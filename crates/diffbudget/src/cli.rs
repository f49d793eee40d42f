use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "diffbudget",
    version,
    about = "Fit git diffs into a language model's context window"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify configuration file path
    #[arg(long, global = true, env = "DIFFBUDGET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, env = "DIFFBUDGET_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

/// Settings that feed the budget calculation. Unset values come from config.
#[derive(Debug, Clone, Default, Args)]
pub struct BudgetArgs {
    /// LLM provider (openai, groq, claude, ...)
    #[arg(long, env = "DIFFBUDGET_PROVIDER")]
    pub provider: Option<String>,

    /// Model name; defaults to the provider's configured model
    #[arg(long, env = "DIFFBUDGET_MODEL")]
    pub model: Option<String>,

    /// Prompt style, used to estimate prompt overhead
    #[arg(long)]
    pub style: Option<String>,

    /// Tokens reserved for the model's response
    #[arg(long)]
    pub output_tokens: Option<usize>,

    /// Tokens reserved for the changed-files list
    #[arg(long)]
    pub files_list_reserve: Option<usize>,

    /// Additional safety buffer
    #[arg(long)]
    pub safety_margin: Option<usize>,
}

/// Where the diff is read from. Defaults to stdin.
#[derive(Debug, Clone, Default, Args)]
pub struct InputArgs {
    /// Collect staged and unstaged changes of the current repository
    #[arg(long, conflicts_with = "input")]
    pub git: bool,

    /// Read the diff from a file
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show how many diff tokens fit a model's context window
    Budget {
        #[command(flatten)]
        budget: BudgetArgs,

        /// Print the allocation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Truncate a diff to its token budget, dropping whole files first
    Truncate {
        #[command(flatten)]
        budget: BudgetArgs,

        #[command(flatten)]
        input: InputArgs,

        /// Maximum tokens for diff content (auto-calculated if not set)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Keep the end of the diff instead of its beginning
        #[arg(long)]
        keep_end: bool,

        /// Print the result as JSON instead of the bare diff
        #[arg(long)]
        json: bool,
    },

    /// Count the tokens of a diff or any text
    Count {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        json: bool,
    },

    /// List known model context windows
    Models {
        /// Only list this provider's models
        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        json: bool,
    },
}
