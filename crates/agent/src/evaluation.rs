//! Model-graded evaluators.
//!
//! Both evaluators ask the model a yes/no question about a previous answer
//! and fold the reply into an [`EvaluationResponse`].

use serde::{Deserialize, Serialize};
use spindle_core::Result;
use tracing::debug;

use crate::client::ChatClient;

const RELEVANCY_TEMPLATE: &str = "\
Your task is to evaluate if the response for the query
is in line with the context information provided.

You have two options to answer. Either YES or NO.

Answer YES, if the response for the query
is in line with context information otherwise NO.

Query:
{query}

Response:
{response}

Context:
{context}

Answer:";

const FACT_CHECKING_TEMPLATE: &str = "\
Evaluate whether or not the following claim is supported by the provided document.
Respond with \"yes\" if the claim is supported, or \"no\" if it is not.

Document:
{document}

Claim:
{claim}";

/// What is being graded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The question the graded answer responded to
    pub user_text: String,

    /// Context the answer should be grounded in
    #[serde(default)]
    pub documents: Vec<String>,

    /// The graded answer
    pub response_content: String,
}

impl EvaluationRequest {
    pub fn new(user_text: impl Into<String>, documents: Vec<String>, response_content: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            documents,
            response_content: response_content.into(),
        }
    }

    fn context(&self) -> String {
        self.documents.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub pass: bool,
    pub score: f32,
    /// The grader's raw answer
    pub feedback: String,
}

impl EvaluationResponse {
    fn from_answer(answer: String) -> Self {
        let pass = answer.trim().to_ascii_lowercase().starts_with("yes");
        Self {
            pass,
            score: if pass { 1.0 } else { 0.0 },
            feedback: answer,
        }
    }
}

/// Is the answer in line with the query and the provided context?
pub struct RelevancyEvaluator {
    client: ChatClient,
    template: String,
}

impl RelevancyEvaluator {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            template: RELEVANCY_TEMPLATE.into(),
        }
    }

    /// Custom template with `{query}`, `{response}` and `{context}` placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse> {
        let answer = self
            .client
            .prompt()
            .user(self.template.as_str())
            .param("query", &request.user_text)
            .param("response", &request.response_content)
            .param("context", request.context())
            .content()
            .await?;
        debug!(answer = %answer.trim(), "Relevancy graded");
        Ok(EvaluationResponse::from_answer(answer))
    }
}

/// Is the claim supported by the documents?
pub struct FactCheckingEvaluator {
    client: ChatClient,
    template: String,
}

impl FactCheckingEvaluator {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            template: FACT_CHECKING_TEMPLATE.into(),
        }
    }

    /// Custom template with `{document}` and `{claim}` placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// The graded claim is `response_content`.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse> {
        let answer = self
            .client
            .prompt()
            .user(self.template.as_str())
            .param("document", request.context())
            .param("claim", &request.response_content)
            .content()
            .await?;
        debug!(answer = %answer.trim(), "Claim graded");
        Ok(EvaluationResponse::from_answer(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_answers_pass() {
        let graded = EvaluationResponse::from_answer("YES".into());
        assert!(graded.pass);
        assert_eq!(graded.score, 1.0);
        assert!(EvaluationResponse::from_answer("  yes, it is.\n".into()).pass);
    }

    #[test]
    fn anything_else_fails() {
        for answer in ["NO", "no", "I am not sure", ""] {
            let graded = EvaluationResponse::from_answer(answer.into());
            assert!(!graded.pass, "{answer:?} should fail");
            assert_eq!(graded.score, 0.0);
            assert_eq!(graded.feedback, answer);
        }
    }

    #[test]
    fn documents_join_into_context() {
        let request = EvaluationRequest::new("q", vec!["a".into(), "b".into()], "r");
        assert_eq!(request.context(), "a\nb");
    }
}
