use agent::ServiceRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Human,
    Agent,
}

impl std::str::FromStr for PlayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "agent" | "ai" => Ok(Self::Agent),
            other => Err(format!("unknown player kind: {other}")),
        }
    }
}

impl std::fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Who plays one side. Service, model and temperature are kept for human
/// players too so switching back to an agent restores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    #[serde(rename = "playerType")]
    pub kind: PlayerKind,
    #[serde(rename = "serviceId")]
    pub service: String,
    #[serde(rename = "modelId")]
    pub model: String,
    pub temperature: f32,
}

impl PlayerConfig {
    pub fn human() -> Self {
        Self {
            kind: PlayerKind::Human,
            ..Self::agent_default(&ServiceRegistry::builtin())
        }
    }

    /// First model of the first service at its midpoint temperature.
    pub fn agent_default(registry: &ServiceRegistry) -> Self {
        let (service, model, temperature) = registry
            .services()
            .first()
            .and_then(|s| s.default_model().map(|m| (s.id.clone(), m.id.clone(), m.temperature.midpoint())))
            .unwrap_or_default();
        Self {
            kind: PlayerKind::Agent,
            service,
            model,
            temperature,
        }
    }

    pub fn agent(service: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            kind: PlayerKind::Agent,
            service: service.into(),
            model: model.into(),
            temperature,
        }
    }

    pub fn is_human(&self) -> bool {
        self.kind == PlayerKind::Human
    }

    /// Pull stored values back into what the catalog allows: unknown models
    /// fall back to the service's first model and the temperature is clamped.
    pub fn normalized(mut self, registry: &ServiceRegistry) -> Self {
        let Some(profile) = registry.get(&self.service) else {
            return self;
        };
        if profile.model(&self.model).is_none() {
            if let Some(first) = profile.default_model() {
                self.model = first.id.clone();
                self.temperature = first.temperature.midpoint();
            }
        }
        self.temperature = profile.temp_range(&self.model).clamp(self.temperature);
        self
    }

    /// Apply a partial change. Switching service without naming a model
    /// picks that service's first model; an explicit temperature is kept
    /// but clamped into the model's range.
    pub fn updated(
        &self,
        kind: PlayerKind,
        service: Option<String>,
        model: Option<String>,
        temperature: Option<f32>,
        registry: &ServiceRegistry,
    ) -> Self {
        let mut next = self.clone();
        next.kind = kind;
        if let Some(service) = service {
            if service != next.service && model.is_none() {
                next.model.clear();
            }
            next.service = service;
        }
        if let Some(model) = model {
            next.model = model;
        }
        let mut next = next.normalized(registry);
        if let Some(t) = temperature {
            next.temperature = registry
                .get(&next.service)
                .map(|profile| profile.temp_range(&next.model).clamp(t))
                .unwrap_or(t);
        }
        next
    }

    /// Label used in logs and PGN headers.
    pub fn label(&self) -> String {
        match self.kind {
            PlayerKind::Human => "Human".to_string(),
            PlayerKind::Agent => self.model.clone(),
        }
    }
}
