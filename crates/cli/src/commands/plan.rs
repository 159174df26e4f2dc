//! `spindle plan`: a structured travel itinerary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::pipeline;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    pub activity: String,
    pub location: String,
    pub day: String,
    pub time: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Itinerary {
    pub activities: Vec<Activity>,
}

const PROMPT: &str = "What should I do in {city} over {days} days? \
                      List one activity per slot with its location, day and time.";

pub async fn run(city: &str, days: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;

    let itinerary: Itinerary = pipeline
        .client
        .prompt()
        .user(PROMPT)
        .param("city", city)
        .param("days", days)
        .entity()
        .await?;

    print!("{}", render(city, &itinerary));
    Ok(())
}

fn render(city: &str, itinerary: &Itinerary) -> String {
    let mut out = format!("  Itinerary for {city}\n\n");
    let mut current_day = None;
    for a in &itinerary.activities {
        if current_day != Some(a.day.as_str()) {
            out.push_str(&format!("  {}\n", a.day));
            current_day = Some(a.day.as_str());
        }
        out.push_str(&format!("    {:<7} {} ({})\n", a.time, a.activity, a.location));
    }
    out
}
