//! Study assistant handler: one prompt in, one Markdown answer out.

use anyhow::{bail, Result};
use futures_util::StreamExt;

use crate::{
    config::Config,
    llm::{ChatMessage, ChatOptions, LlmClient, Role, StreamEvent},
    printer::MarkdownPrinter,
    role::AssistantRole,
};

pub async fn run(
    role: AssistantRole,
    input: &str,
    cfg: &Config,
    opts: ChatOptions,
    markdown: bool,
) -> Result<()> {
    if input.trim().is_empty() {
        bail!("{}", role.missing_input_hint());
    }
    let client = LlmClient::from_config(cfg)?;
    let messages = vec![
        ChatMessage::new(Role::System, role.system_text()),
        ChatMessage::new(Role::User, role.user_prompt(input)),
    ];

    if markdown {
        let text = client.complete(messages, opts).await?;
        MarkdownPrinter::default().print(&text);
        return Ok(());
    }

    let mut stream = client.chat_stream(messages, opts);
    while let Some(ev) = stream.next().await {
        match ev? {
            StreamEvent::Content(t) => print!("{}", t),
            StreamEvent::Done => {
                println!();
                break;
            }
        }
    }
    Ok(())
}
