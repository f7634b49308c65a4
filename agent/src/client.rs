//! HTTP decision service driven by a [`ServiceProfile`].

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::catalog::{AuthScheme, ServiceProfile, WireFormat};
use crate::decision::{validate_decision, DecisionService, MoveDecision, MoveRequest};
use crate::error::DecisionError;
use crate::prompt::{format_prompt, strip_code_fences, SYSTEM_PROMPT};

/// Gemini sampling settings sent with every request.
const GEMINI_TOP_P: f32 = 0.95;
const GEMINI_TOP_K: u32 = 40;

#[derive(Clone)]
pub struct HttpDecisionService {
    client: reqwest::Client,
    profile: ServiceProfile,
    model: String,
    temperature: f32,
    credential: String,
}

impl std::fmt::Debug for HttpDecisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDecisionService")
            .field("service", &self.profile.id)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl HttpDecisionService {
    pub fn new(
        profile: ServiceProfile,
        model: String,
        temperature: f32,
        credential: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            profile,
            model,
            temperature,
            credential,
        }
    }

    fn request_body(&self, request: &MoveRequest) -> Value {
        let user_prompt = format_prompt(request);
        match self.profile.wire {
            WireFormat::ChatCompletions => {
                let mut body = json!({
                    "model": self.model,
                    "temperature": self.temperature,
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": user_prompt }
                    ]
                });
                if let Some(max_tokens) = self.profile.max_tokens {
                    body["max_tokens"] = json!(max_tokens);
                }
                if self.profile.json_mode {
                    body["response_format"] = json!({ "type": "json_object" });
                }
                if self.profile.disable_streaming {
                    body["stream"] = json!(false);
                }
                body
            }
            WireFormat::Gemini => json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": SYSTEM_PROMPT }] },
                    { "role": "user", "parts": [{ "text": user_prompt }] }
                ],
                "generationConfig": {
                    "temperature": self.temperature,
                    "topP": GEMINI_TOP_P,
                    "topK": GEMINI_TOP_K,
                    "maxOutputTokens": self.profile.max_tokens.unwrap_or(8192),
                    "stopSequences": []
                }
            }),
        }
    }

    /// Pull the model's text out of the vendor envelope.
    fn extract_text(&self, envelope: &Value) -> Option<String> {
        let text = match self.profile.wire {
            WireFormat::ChatCompletions => envelope["choices"][0]["message"]["content"].as_str(),
            WireFormat::Gemini => envelope["candidates"][0]["content"]["parts"][0]["text"].as_str(),
        }?;
        Some(if self.profile.strip_code_fences {
            strip_code_fences(text)
        } else {
            text.to_string()
        })
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    #[instrument(skip(self, request), fields(service = %self.profile.id, model = %self.model))]
    async fn decide(&self, request: &MoveRequest) -> Result<MoveDecision, DecisionError> {
        let url = self.profile.endpoint_for(&self.model);
        debug!(%url, legal = request.legal_moves.len(), "Sending decision request");

        let mut builder = self.client.post(&url).json(&self.request_body(request));
        builder = match &self.profile.auth {
            AuthScheme::Bearer => builder.bearer_auth(&self.credential),
            AuthScheme::Header(name) => builder.header(name.as_str(), &self.credential),
        };

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "Decision request failed");
            DecisionError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Decision service returned an error");
            return Err(DecisionError::ServiceError {
                service: self.profile.display_name.clone(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| DecisionError::MalformedResponse(format!("response body: {e}")))?;

        let text = self.extract_text(&envelope).ok_or_else(|| {
            error!(response = %envelope, "No content in decision response");
            DecisionError::MalformedResponse(format!(
                "Invalid response format from {}",
                self.profile.display_name
            ))
        })?;

        let decision: MoveDecision = serde_json::from_str(&text)
            .map_err(|e| DecisionError::MalformedResponse(format!("{e}: {text}")))?;

        let decision = validate_decision(decision, &request.legal_moves)?;
        info!(mv = %decision.mv, "Decision received");
        Ok(decision)
    }

    fn label(&self) -> String {
        format!("{} {}", self.profile.display_name, self.model)
    }
}
