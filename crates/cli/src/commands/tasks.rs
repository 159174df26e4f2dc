//! `spindle tasks`: the model manages tasks through the task tools.

use crate::pipeline;

const SYSTEM: &str = "You are a project assistant. Use the task tools to create, assign and update tasks. \
                      Reply with a short summary of what you changed.";

pub async fn run(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;

    let response = pipeline.client.prompt().system(SYSTEM).user(message).call().await?;
    println!("{}", response.content());

    let tasks = pipeline.tasks.list().await;
    if tasks.is_empty() {
        return Ok(());
    }
    println!();
    println!("  {:>3}  {:<12}  {:<16}  TITLE", "ID", "STATUS", "ASSIGNEE");
    for task in tasks {
        println!(
            "  {:>3}  {:<12}  {:<16}  {}",
            task.id,
            task.status.as_str(),
            task.assignee,
            task.title
        );
    }
    if let Some(rounds) = response.metadata.get("tool_rounds") {
        println!();
        println!("  Tool rounds: {rounds}");
    }
    Ok(())
}
