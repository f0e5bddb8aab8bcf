use std::io::{self, Read};

use anyhow::{anyhow, Context, Result};
use is_terminal::IsTerminal;
use tracing::debug;

use statlab::cli::Cli;
use statlab::config::Config;
use statlab::handlers;
use statlab::llm::ChatOptions;
use statlab::role::AssistantRole;
use statlab::telemetry::{init_tracing, LogTarget};
use statlab::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = Config::load();

    let stdin_is_tty = io::stdin().is_terminal();
    let any_mode = args.r || args.repl || args.questions || args.interpret || args.normal;
    // Without a mode or any input, open the console.
    let console = args.repl || (!any_mode && stdin_is_tty && args.input.is_none() && args.file.is_none());
    let full_screen = console || (args.normal && io::stdout().is_terminal());
    let log_target = if full_screen { LogTarget::default_file() } else { LogTarget::Stderr };
    init_tracing(&cfg, log_target)?;
    debug!(config = %cfg.config_path.display(), "configuration loaded");

    // stdin handling (pipe support)
    let mut from_stdin = String::new();
    if !stdin_is_tty && !console {
        io::stdin().read_to_string(&mut from_stdin)?;
    }

    let mut input = utils::combine_inputs(&from_stdin, args.input.as_deref().unwrap_or_default());

    if let Some(path) = &args.file {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read R script '{}'", path.display()))?;
        input = utils::combine_inputs(&code, &input);
    }

    // Process document files if --doc is provided
    if !args.doc.is_empty() {
        let doc_content = utils::read_documents(&args.doc)
            .map_err(|e| anyhow!("Document processing failed: {}", e))?;
        input = utils::combine_inputs(&doc_content, &input);
    }

    let md = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("PRETTIFY_MARKDOWN")
    };

    // Resolve model: CLI overrides config; fall back to DEFAULT_MODEL
    let chat_options = || ChatOptions {
        model: args
            .model
            .clone()
            .or_else(|| cfg.get("DEFAULT_MODEL"))
            .unwrap_or_else(|| "gpt-4o".to_string()),
        temperature: args.temperature,
        top_p: args.top_p,
        max_tokens: args.max_tokens,
    };

    // Route to handler
    if args.normal {
        handlers::normal::run(args.mean, args.sd)
    } else if args.questions {
        handlers::assistant::run(AssistantRole::ResearchQuestions, &input, &cfg, chat_options(), md).await
    } else if args.interpret {
        handlers::assistant::run(AssistantRole::InterpretOutput, &input, &cfg, chat_options(), md).await
    } else if console {
        let init = Some(input.as_str()).filter(|s| !s.trim().is_empty());
        handlers::repl::run(&cfg, init).await
    } else {
        handlers::run::run(&input, &cfg, args.plot_out.as_deref()).await
    }
}
