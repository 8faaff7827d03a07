//! Discovery of usable backends from configuration markers.

use crate::logging::SharedEventLogger;
use crate::provider::{ModelProvider, ProviderConfig};
use crate::providers::{create_provider, defaults};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderFamily {
    OpenAi,
    Anthropic,
    Google,
    Cohere,
    Ollama,
}

impl ProviderFamily {
    /// Preference order used when listing candidates.
    pub const ALL: [ProviderFamily; 5] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Google,
        Self::Cohere,
        Self::Ollama,
    ];

    /// Environment variable whose presence enables the family.
    pub fn marker(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::Cohere => "COHERE_API_KEY",
            Self::Ollama => "OLLAMA_BASE_URL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Google => "gemini-2.0-flash",
            Self::Cohere => "command",
            Self::Ollama => "llama2",
        }
    }

    fn label_prefix(self) -> &'static str {
        match self {
            Self::Google => "gemini/",
            Self::Ollama => "ollama/",
            _ => "",
        }
    }
}

/// A configured backend, labelled the way its model is addressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    pub family: ProviderFamily,
    pub model: String,
}

impl ProviderCandidate {
    pub fn new(family: ProviderFamily, model: impl Into<String>) -> Self {
        let model = model.into();
        let prefix = family.label_prefix();
        if !prefix.is_empty() {
            if let Some(bare) = model.strip_prefix(prefix) {
                return Self {
                    family,
                    model: bare.to_string(),
                };
            }
        }
        Self { family, model }
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.family.label_prefix(), self.model)
    }
}

impl fmt::Display for ProviderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Optional overrides read from the configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub google_model: Option<String>,
    pub cohere_model: Option<String>,
    pub ollama_model: Option<String>,
    pub ollama_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub google_base_url: Option<String>,
    pub cohere_base_url: Option<String>,
}

impl ProviderSettings {
    fn model_for(&self, family: ProviderFamily) -> Option<&str> {
        match family {
            ProviderFamily::OpenAi => self.openai_model.as_deref(),
            ProviderFamily::Anthropic => self.anthropic_model.as_deref(),
            ProviderFamily::Google => self.google_model.as_deref(),
            ProviderFamily::Cohere => self.cohere_model.as_deref(),
            ProviderFamily::Ollama => self.ollama_model.as_deref(),
        }
    }

    fn base_url_for(&self, family: ProviderFamily) -> &str {
        let configured = match family {
            ProviderFamily::OpenAi => self.openai_base_url.as_deref(),
            ProviderFamily::Anthropic => self.anthropic_base_url.as_deref(),
            ProviderFamily::Google => self.google_base_url.as_deref(),
            ProviderFamily::Cohere => self.cohere_base_url.as_deref(),
            ProviderFamily::Ollama => self.ollama_base_url.as_deref(),
        };
        configured.unwrap_or(match family {
            ProviderFamily::OpenAi => defaults::OPENAI_BASE_URL,
            ProviderFamily::Anthropic => defaults::ANTHROPIC_BASE_URL,
            ProviderFamily::Google => defaults::GOOGLE_BASE_URL,
            ProviderFamily::Cohere => defaults::COHERE_BASE_URL,
            ProviderFamily::Ollama => DEFAULT_OLLAMA_BASE_URL,
        })
    }
}

/// A candidate paired with the backend that serves it.
#[derive(Clone)]
pub struct RegisteredCandidate {
    pub candidate: ProviderCandidate,
    pub provider: Arc<dyn ModelProvider>,
}

impl RegisteredCandidate {
    pub fn new(candidate: ProviderCandidate, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            candidate,
            provider,
        }
    }

    pub fn label(&self) -> String {
        self.candidate.label()
    }
}

#[derive(Clone, Debug)]
struct Entry {
    candidate: ProviderCandidate,
    config: ProviderConfig,
}

/// Ordered list of configured backends, fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<Entry>,
}

impl ProviderRegistry {
    pub fn from_env(settings: &ProviderSettings) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), settings)
    }

    /// Builds the registry from any key lookup. Missing or blank markers exclude the family.
    /// Ollama is also enabled by an `ollama_base_url` setting.
    pub fn from_lookup<F>(lookup: F, settings: &ProviderSettings) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut entries = Vec::new();
        for family in ProviderFamily::ALL {
            let marker = lookup(family.marker())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            let marker = match (family, marker) {
                (_, Some(m)) => m,
                (ProviderFamily::Ollama, None) => match &settings.ollama_base_url {
                    Some(url) if !url.trim().is_empty() => url.trim().to_string(),
                    _ => continue,
                },
                (_, None) => continue,
            };

            let model = settings
                .model_for(family)
                .unwrap_or(family.default_model());
            let candidate = ProviderCandidate::new(family, model);
            let config = Self::config_for(&candidate, marker, settings);
            entries.push(Entry { candidate, config });
        }
        Self { entries }
    }

    fn config_for(
        candidate: &ProviderCandidate,
        marker: String,
        settings: &ProviderSettings,
    ) -> ProviderConfig {
        let id = candidate.label();
        let model = candidate.model.clone();
        let base_url = settings.base_url_for(candidate.family).to_string();
        match candidate.family {
            ProviderFamily::OpenAi => ProviderConfig::OpenAi {
                id,
                base_url,
                api_key: marker,
                model,
            },
            ProviderFamily::Anthropic => ProviderConfig::Anthropic {
                id,
                base_url,
                api_key: marker,
                model,
            },
            ProviderFamily::Google => ProviderConfig::Google {
                id,
                base_url,
                api_key: marker,
                model,
            },
            ProviderFamily::Cohere => ProviderConfig::Cohere {
                id,
                base_url,
                api_key: marker,
                model,
            },
            // The marker is the server address.
            ProviderFamily::Ollama => ProviderConfig::Ollama {
                id,
                base_url: marker,
                model,
            },
        }
    }

    pub fn list_candidates(&self) -> Vec<ProviderCandidate> {
        self.entries.iter().map(|e| e.candidate.clone()).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.candidate.label()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.entries.iter().map(|e| e.config.clone()).collect()
    }

    /// One backend per candidate, in preference order.
    pub fn build_providers(&self, logger: SharedEventLogger) -> Vec<RegisteredCandidate> {
        self.entries
            .iter()
            .map(|e| {
                RegisteredCandidate::new(
                    e.candidate.clone(),
                    create_provider(e.config.clone(), logger.clone()),
                )
            })
            .collect()
    }
}
