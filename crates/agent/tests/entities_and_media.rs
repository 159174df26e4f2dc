//! Structured output, media generation and evaluators.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::*;
use schemars::JsonSchema;
use serde::Deserialize;
use spindle_agent::{ChatClient, EvaluationRequest, FactCheckingEvaluator, RelevancyEvaluator};
use spindle_advisors::MessageChatMemoryAdvisor;
use spindle_config::AppConfig;
use spindle_core::memory::ChatMemory;
use spindle_memory::InMemoryChatMemory;
use spindle_core::media::{ImageModel, ImageOptions, Media, SpeechModel, SpeechOptions};
use spindle_core::{Error, ProviderError};

#[derive(Debug, Deserialize, JsonSchema)]
struct Activity {
    activity: String,
    location: String,
    day: String,
    time: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Itinerary {
    activities: Vec<Activity>,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Sentiment {
    Positive,
    Negative,
}

#[tokio::test]
async fn entity_requests_a_schema_and_parses_the_reply() {
    let reply = "```json\n{\"activities\":[{\"activity\":\"Tram 28\",\"location\":\"Alfama\",\"day\":\"Day 1\",\"time\":\"09:00\"}]}\n```";
    let provider = ScriptedProvider::new(vec![text(reply)]);
    let client = ChatClient::builder(provider.clone()).build();

    let plan: Itinerary = client
        .prompt()
        .user("Plan a day in {city}")
        .param("city", "Lisbon")
        .entity()
        .await
        .unwrap();
    assert_eq!(plan.activities.len(), 1);
    assert_eq!(plan.activities[0].location, "Alfama");
    assert_eq!(plan.activities[0].activity, "Tram 28");
    assert_eq!(plan.activities[0].day, "Day 1");
    assert_eq!(plan.activities[0].time, "09:00");

    let sent = &provider.requests()[0];
    let user = &sent.messages.last().unwrap().content;
    assert!(user.starts_with("Plan a day in Lisbon"));
    assert!(user.contains("JSON Schema"));
    let format = sent.response_format.as_ref().expect("json_schema response format");
    assert_eq!(format["type"], "json_schema");
}

#[tokio::test]
async fn enum_entity_accepts_a_bare_word() {
    let provider = ScriptedProvider::new(vec![text("POSITIVE")]);
    let client = ChatClient::builder(provider.clone()).build();

    let sentiment: Sentiment = client
        .prompt()
        .user("Classify: I love this product")
        .entity()
        .await
        .unwrap();
    assert_eq!(sentiment, Sentiment::Positive);
    assert!(provider.requests()[0].response_format.is_none());
}

#[tokio::test]
async fn format_instructions_reach_the_model_but_not_memory() {
    let provider = ScriptedProvider::new(vec![text("POSITIVE"), text("Hello again")]);
    let memory = Arc::new(InMemoryChatMemory::new());
    let client = ChatClient::builder(provider.clone())
        .default_advisor(Arc::new(MessageChatMemoryAdvisor::new(memory.clone())))
        .build();

    let sentiment: Sentiment = client
        .prompt()
        .user("Classify: I love it")
        .conversation_id("c")
        .entity()
        .await
        .unwrap();
    assert_eq!(sentiment, Sentiment::Positive);
    assert!(provider.requests()[0].messages[0].content.contains("JSON Schema"));

    let stored = memory.load(&"c".into()).await.unwrap();
    assert_eq!(stored[0].content, "Classify: I love it");
    assert!(!stored[0].content.contains("JSON Schema"));

    let reply = client.prompt().user("hello").conversation_id("c").call().await.unwrap();
    assert!(!reply.context.contains_key("format_instructions"));
    let second = &provider.requests()[1];
    assert_eq!(second.messages.len(), 3);
    assert!(second.messages.iter().all(|m| !m.content.contains("JSON Schema")));
}

#[tokio::test]
async fn unparseable_reply_fails_without_a_partial_entity() {
    let provider = ScriptedProvider::new(vec![text("{\"activities\": [{\"activity\": \"Tram\"")]);
    let client = ChatClient::builder(provider).build();

    let err = client
        .prompt()
        .user("Plan a trip")
        .entity::<Itinerary>()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StructuredOutputParse { .. }));
}

#[derive(Default)]
struct RecordingSpeech {
    seen: Mutex<Vec<SpeechOptions>>,
}

#[async_trait]
impl SpeechModel for RecordingSpeech {
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<Media, ProviderError> {
        self.seen.lock().unwrap().push(options.clone());
        Ok(Media::bytes("audio/mpeg", text.as_bytes().to_vec()))
    }
}

struct UrlImages;

#[async_trait]
impl ImageModel for UrlImages {
    async fn generate_image(&self, prompt: &str, _options: &ImageOptions) -> Result<Media, ProviderError> {
        Ok(Media::url("image/png", format!("https://images.test/{}.png", prompt.len())))
    }
}

#[tokio::test]
async fn media_without_a_model_is_a_config_error() {
    let client = ChatClient::builder(ScriptedProvider::new(vec![])).build();
    assert!(matches!(client.speak("hello").await, Err(Error::Config { .. })));
    assert!(matches!(client.generate_image("a cat").await, Err(Error::Config { .. })));
}

#[tokio::test]
async fn speech_uses_configured_defaults_under_call_options() {
    let speech = Arc::new(RecordingSpeech::default());
    let client = ChatClient::builder(ScriptedProvider::new(vec![]))
        .with_config(&AppConfig::default())
        .speech_model(speech.clone())
        .image_model(Arc::new(UrlImages))
        .build();

    let audio = client.speak("hello").await.unwrap();
    assert_eq!(audio.as_bytes(), Some(&b"hello"[..]));

    let options = SpeechOptions {
        voice: Some("nova".into()),
        ..SpeechOptions::default()
    };
    client.speak_with("hi", &options).await.unwrap();

    let seen = speech.seen.lock().unwrap().clone();
    assert_eq!(seen[0].model.as_deref(), Some("tts-1"));
    assert_eq!(seen[0].voice.as_deref(), Some("alloy"));
    assert_eq!(seen[1].voice.as_deref(), Some("nova"));
    assert_eq!(seen[1].model.as_deref(), Some("tts-1"));

    let image = client.generate_image("a cat").await.unwrap();
    assert!(image.as_bytes().is_none());
    assert_eq!(image.mime_type, "image/png");
}

#[tokio::test]
async fn relevancy_evaluator_grades_with_the_model() {
    let provider = ScriptedProvider::new(vec![text("YES")]);
    let evaluator = RelevancyEvaluator::new(ChatClient::builder(provider.clone()).build());

    let request = EvaluationRequest::new(
        "What is the capital of Denmark?",
        vec!["Copenhagen is the capital of Denmark.".into()],
        "Copenhagen",
    );
    let graded = evaluator.evaluate(&request).await.unwrap();
    assert!(graded.pass);
    assert_eq!(graded.score, 1.0);

    let prompt = &provider.requests()[0].messages[0].content;
    assert!(prompt.contains("What is the capital of Denmark?"));
    assert!(prompt.contains("Copenhagen is the capital of Denmark."));
    assert!(!prompt.contains("{query}"));
}

#[tokio::test]
async fn fact_checking_rejects_unsupported_claims() {
    let provider = ScriptedProvider::new(vec![text("no")]);
    let evaluator = FactCheckingEvaluator::new(ChatClient::builder(provider).build());

    let request = EvaluationRequest::new(
        "",
        vec!["The Earth is the third planet from the Sun.".into()],
        "The Earth is the fourth planet from the Sun.",
    );
    let graded = evaluator.evaluate(&request).await.unwrap();
    assert!(!graded.pass);
    assert_eq!(graded.feedback, "no");
}
