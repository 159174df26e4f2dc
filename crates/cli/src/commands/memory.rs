//! `spindle memory`: inspect stored conversations.

use spindle_core::{ConversationId, Role};

use crate::pipeline;

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let memory = pipeline::open_memory(&config).await?;

    println!("Memory backend: {}", config.memory.backend);
    let ids = memory.conversation_ids().await?;
    if ids.is_empty() {
        println!("   No conversations stored.");
        return Ok(());
    }
    for id in ids {
        let count = memory.load(&id).await?.len();
        println!("   {id}  ({count} messages)");
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let memory = pipeline::open_memory(&config).await?;

    let history = memory.load(&ConversationId::from(id)).await?;
    if history.is_empty() {
        println!("   No history for conversation '{id}'.");
    }
    for message in history {
        println!("[{}] {}", role_label(message.role), message.content);
    }
    Ok(())
}

pub async fn clear(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let memory = pipeline::open_memory(&config).await?;

    memory.clear(&ConversationId::from(id)).await?;
    println!("Cleared conversation '{id}'.");
    Ok(())
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}
