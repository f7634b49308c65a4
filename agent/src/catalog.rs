//! Vendor profiles and the model catalog.
//!
//! Vendors differ only in data: endpoint, auth header, wire format and a few
//! payload flags. Adding a vendor means adding a profile, not code.

use serde::{Deserialize, Serialize};

use crate::client::HttpDecisionService;
use crate::error::DecisionError;

/// How the credential is attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// A named header carrying the raw key, e.g. `x-goog-api-key`.
    Header(String),
}

/// Request and response shape spoken by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// `messages` in, `choices[0].message.content` out.
    ChatCompletions,
    /// `contents`/`generationConfig` in, `candidates[0].content.parts[0].text` out.
    Gemini,
}

/// Inclusive temperature range a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempRange {
    pub min: f32,
    pub max: f32,
}

impl TempRange {
    pub const DEFAULT: TempRange = TempRange { min: 0.1, max: 1.0 };

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    pub fn clamp(&self, t: f32) -> f32 {
        if t.is_nan() {
            return self.midpoint();
        }
        t.clamp(self.min, self.max)
    }
}

impl Default for TempRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub temperature: TempRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub id: String,
    pub display_name: String,
    /// Endpoint URL; `{model}` is replaced by the model id.
    pub endpoint: String,
    pub auth: AuthScheme,
    pub wire: WireFormat,
    /// Ask for `response_format: json_object`.
    #[serde(default)]
    pub json_mode: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Send `stream: false` explicitly.
    #[serde(default)]
    pub disable_streaming: bool,
    /// Strip markdown code fences before parsing the payload.
    #[serde(default)]
    pub strip_code_fences: bool,
    /// Environment variable consulted when no credential is stored.
    pub api_key_env: String,
    pub models: Vec<ModelInfo>,
}

impl ServiceProfile {
    pub fn endpoint_for(&self, model: &str) -> String {
        self.endpoint.replace("{model}", model)
    }

    pub fn model(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn default_model(&self) -> Option<&ModelInfo> {
        self.models.first()
    }

    /// Temperature range of `model`, or the default range for unlisted models.
    pub fn temp_range(&self, model: &str) -> TempRange {
        self.model(model).map(|m| m.temperature).unwrap_or_default()
    }
}

/// All known decision services.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRegistry {
    services: Vec<ServiceProfile>,
}

impl ServiceRegistry {
    pub fn new(services: Vec<ServiceProfile>) -> Self {
        Self { services }
    }

    /// The services shipped with the arena.
    pub fn builtin() -> Self {
        Self::new(vec![
            chat_profile(
                "groq",
                "Groq",
                "https://api.groq.com/openai/v1/chat/completions",
                "GROQ_API_KEY",
                &[
                    ("llama-3.3-70b-versatile", "LLaMa 3.3 70B Versatile"),
                    ("llama-3.3-70b-specdec", "LLaMa 3.3 70B SpecDec"),
                    ("llama-3.1-8b", "LLaMa 3.1 8B"),
                    ("mixtral-8x7b-32768", "Mixtral 8x7B"),
                ],
            )
            .json_mode()
            .max_tokens(8024),
            chat_profile(
                "openai",
                "OpenAI",
                "https://api.openai.com/v1/chat/completions",
                "OPENAI_API_KEY",
                &[
                    ("gpt-4", "GPT-4"),
                    ("gpt-4-turbo", "GPT-4 Turbo"),
                    ("gpt-4o", "GPT-4o"),
                    ("gpt-3.5-turbo", "GPT-3.5 Turbo"),
                ],
            )
            .json_mode(),
            ServiceProfile {
                id: "gemini".into(),
                display_name: "Google Gemini".into(),
                endpoint:
                    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
                        .into(),
                auth: AuthScheme::Header("x-goog-api-key".into()),
                wire: WireFormat::Gemini,
                json_mode: false,
                max_tokens: Some(8192),
                disable_streaming: false,
                strip_code_fences: true,
                api_key_env: "GEMINI_API_KEY".into(),
                models: models(&[
                    ("gemini-2.0-flash-exp", "Gemini Flash"),
                    ("gemini-2.0-pro-exp", "Gemini Pro"),
                    ("gemini-2.0-ultra-exp", "Gemini Ultra"),
                ]),
            },
            chat_profile(
                "grok",
                "xAI Grok",
                "https://api.x.ai/v1/chat/completions",
                "XAI_API_KEY",
                &[("grok-beta", "Grok Beta")],
            )
            .no_streaming(),
            chat_profile(
                "openrouter",
                "OpenRouter",
                "https://openrouter.ai/api/v1/chat/completions",
                "OPENROUTER_API_KEY",
                &[
                    ("anthropic/claude-3-opus:beta", "Claude 3 Opus"),
                    ("anthropic/claude-3-sonnet", "Claude 3 Sonnet"),
                    ("anthropic/claude-3-haiku", "Claude 3 Haiku"),
                    ("meta-llama/llama-3-70b-instruct", "Llama 3 70B"),
                    ("meta-llama/llama-3-8b-instruct", "Llama 3 8B"),
                    ("mistralai/mistral-large", "Mistral Large"),
                    ("mistralai/mistral-8x7b", "Mistral 8x7B"),
                    ("google/gemini-1.5-pro-latest", "Gemini 1.5 Pro"),
                    ("google/gemini-1.5-flash-latest", "Gemini 1.5 Flash"),
                ],
            ),
        ])
    }

    pub fn services(&self) -> &[ServiceProfile] {
        &self.services
    }

    pub fn get(&self, id: &str) -> Option<&ServiceProfile> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn profile(&self, id: &str) -> Result<&ServiceProfile, DecisionError> {
        self.get(id)
            .ok_or_else(|| DecisionError::UnknownService(id.to_string()))
    }

    /// Build a client for `service`/`model`. The temperature is clamped into
    /// the model's range; an empty credential is rejected up front.
    pub fn connect(
        &self,
        service: &str,
        model: &str,
        temperature: f32,
        credential: &str,
    ) -> Result<HttpDecisionService, DecisionError> {
        let profile = self.profile(service)?;
        let info = profile
            .model(model)
            .ok_or_else(|| DecisionError::UnknownModel {
                service: service.to_string(),
                model: model.to_string(),
            })?;
        if credential.trim().is_empty() {
            return Err(DecisionError::MissingCredential(profile.display_name.clone()));
        }
        Ok(HttpDecisionService::new(
            profile.clone(),
            info.id.clone(),
            info.temperature.clamp(temperature),
            credential.trim().to_string(),
        ))
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn models(entries: &[(&str, &str)]) -> Vec<ModelInfo> {
    entries
        .iter()
        .map(|(id, name)| ModelInfo {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            temperature: TempRange::DEFAULT,
        })
        .collect()
}

fn chat_profile(
    id: &str,
    display_name: &str,
    endpoint: &str,
    api_key_env: &str,
    entries: &[(&str, &str)],
) -> ServiceProfile {
    ServiceProfile {
        id: id.to_string(),
        display_name: display_name.to_string(),
        endpoint: endpoint.to_string(),
        auth: AuthScheme::Bearer,
        wire: WireFormat::ChatCompletions,
        json_mode: false,
        max_tokens: None,
        disable_streaming: false,
        strip_code_fences: false,
        api_key_env: api_key_env.to_string(),
        models: models(entries),
    }
}

impl ServiceProfile {
    fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    fn no_streaming(mut self) -> Self {
        self.disable_streaming = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_services() {
        let registry = ServiceRegistry::builtin();
        let ids: Vec<&str> = registry.services().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["groq", "openai", "gemini", "grok", "openrouter"]);
        let groq = registry.get("groq").unwrap();
        assert!(groq.json_mode);
        assert_eq!(groq.max_tokens, Some(8024));
        assert_eq!(
            registry.get("gemini").unwrap().auth,
            AuthScheme::Header("x-goog-api-key".into())
        );
    }

    #[test]
    fn test_endpoint_template() {
        let registry = ServiceRegistry::builtin();
        let gemini = registry.get("gemini").unwrap();
        assert_eq!(
            gemini.endpoint_for("gemini-2.0-pro-exp"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-pro-exp:generateContent"
        );
    }

    #[test]
    fn test_temp_range_midpoint_and_clamp() {
        let range = TempRange::DEFAULT;
        assert!((range.midpoint() - 0.55).abs() < 1e-6);
        assert_eq!(range.clamp(2.0), 1.0);
        assert_eq!(range.clamp(0.0), 0.1);
        assert_eq!(range.clamp(0.7), 0.7);
    }

    #[test]
    fn test_connect_errors() {
        let registry = ServiceRegistry::builtin();
        assert_eq!(
            registry.connect("nope", "x", 0.5, "k").unwrap_err(),
            DecisionError::UnknownService("nope".into())
        );
        assert!(matches!(
            registry.connect("groq", "gpt-4", 0.5, "k").unwrap_err(),
            DecisionError::UnknownModel { .. }
        ));
        assert_eq!(
            registry.connect("groq", "llama-3.1-8b", 0.5, "  ").unwrap_err(),
            DecisionError::MissingCredential("Groq".into())
        );
        assert!(registry.connect("groq", "llama-3.1-8b", 0.5, "key").is_ok());
    }
}
