//! `spindle chat`: interactive or single-message chat.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use spindle_advisors::AdvisorChain;
use spindle_agent::ChatClient;
use spindle_core::Advisor;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::pipeline;

pub async fn run(message: Option<String>, conversation: String, stream: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;
    let client = pipeline.client;
    let memory = pipeline.memory_advisor;

    if let Some(msg) = message {
        reply(&client, &memory, &conversation, &msg, stream).await?;
        return Ok(());
    }

    println!();
    println!("  Spindle chat");
    println!("  Endpoint:      {}", config.base_url);
    println!("  Model:         {}", config.default_model);
    println!("  Conversation:  {conversation}");
    println!(
        "  Advisors:      {}",
        client.advisors().merged(&AdvisorChain::new().with(memory.clone())).names().join(", ")
    );
    println!("  Tools:         {}", client.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter. Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        if let Err(e) = reply(&client, &memory, &conversation, line, stream).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

async fn reply(
    client: &ChatClient,
    memory: &Arc<dyn Advisor>,
    conversation: &str,
    text: &str,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let prompt = client
        .prompt()
        .advisor(memory.clone())
        .user(text)
        .conversation_id(conversation);

    if !stream {
        let content = prompt.content().await?;
        for line in content.lines() {
            println!("  Assistant > {line}");
        }
        return Ok(());
    }

    print!("  Assistant > ");
    std::io::stdout().flush()?;
    let mut fragments = prompt.stream();
    while let Some(fragment) = fragments.next().await {
        print!("{}", fragment?);
        std::io::stdout().flush()?;
    }
    println!();
    Ok(())
}
