//! `spindle sentiment`: classify text into a fixed label.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;

    let sentiment: Sentiment = pipeline
        .client
        .prompt()
        .user("Classify the sentiment of the following text: {text}")
        .param("text", text)
        .entity()
        .await?;

    println!("{sentiment:?}");
    Ok(())
}
