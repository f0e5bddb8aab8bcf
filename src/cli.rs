use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "statlab", about = "Introductory statistics companion: R console, normal distribution explorer, study assistants", version)]
#[command(group(ArgGroup::new("mode").args(["r", "repl", "questions", "interpret", "normal"]).multiple(false)))]
#[command(group(ArgGroup::new("assistant").args(["questions", "interpret"]).multiple(false)))]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    /// R code, a research topic or R output, depending on the mode.
    #[arg(value_name = "INPUT")]
    pub input: Option<String>,

    /// Run R code once and print its console output.
    #[arg(long = "r")]
    pub r: bool,

    /// Open the interactive R console.
    #[arg(long)]
    pub repl: bool,

    /// Draft testable research questions for a topic.
    #[arg(short = 'q', long)]
    pub questions: bool,

    /// Explain statistical output in plain language.
    #[arg(short = 'i', long)]
    pub interpret: bool,

    /// Explore the normal distribution.
    #[arg(short = 'n', long)]
    pub normal: bool,

    /// Read R code from a file (with --r).
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Read a topic, R output or notes from files (with --questions or --interpret).
    /// Can be used multiple times: --doc a.txt --doc b.txt
    #[arg(long = "doc", action = clap::ArgAction::Append, requires = "assistant")]
    pub doc: Vec<String>,

    /// Where to save the plot of a --r run (defaults to PLOT_OUTPUT_PATH).
    #[arg(long = "plot-out", value_name = "PATH")]
    pub plot_out: Option<PathBuf>,

    /// Initial mean for --normal.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub mean: f64,

    /// Initial standard deviation for --normal.
    #[arg(long, default_value_t = 1.0)]
    pub sd: f64,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 0.0, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Upper bound on generated tokens.
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,

    /// Prettify Markdown output (buffer then render at end).
    #[arg(long)]
    pub md: bool,
    /// Disable Markdown prettifying (print chunks as they arrive).
    #[arg(long = "no-md")]
    pub no_md: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
