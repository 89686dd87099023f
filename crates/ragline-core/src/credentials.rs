use std::collections::HashMap;
use std::sync::Arc;

use ragline_llm::{EmbeddingProviderKind, GenerationProviderKind, Secret};

use crate::config::ResolvedSecrets;
use crate::error::RagError;
use crate::settings::SettingsStore;

/// API keys by hosted provider: keys saved in the settings store win over the
/// environment. Only held in memory.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<GenerationProviderKind, Secret>,
    settings: Option<Arc<SettingsStore>>,
}

impl Credentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank keys are treated as absent.
    #[must_use]
    pub fn with_key(mut self, provider: GenerationProviderKind, key: Secret) -> Self {
        if key.is_blank() {
            self.keys.remove(&provider);
        } else {
            self.keys.insert(provider, key);
        }
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn from_secrets(secrets: &ResolvedSecrets) -> Self {
        let mut credentials = Self::new();
        if let Some(key) = &secrets.openrouter_api_key {
            credentials = credentials.with_key(GenerationProviderKind::OpenRouter, key.clone());
        }
        if let Some(key) = &secrets.bedrock_api_key {
            credentials = credentials.with_key(GenerationProviderKind::Bedrock, key.clone());
        }
        credentials
    }

    fn key(&self, provider: GenerationProviderKind) -> Option<Secret> {
        self.settings
            .as_ref()
            .and_then(|s| s.api_key(provider))
            .or_else(|| self.keys.get(&provider).cloned())
    }

    #[must_use]
    pub fn is_configured(&self, provider: GenerationProviderKind) -> bool {
        self.key(provider).is_some()
    }

    /// # Errors
    ///
    /// Returns [`RagError::Unauthorized`] when no key is configured for `provider`.
    pub fn generation(&self, provider: GenerationProviderKind) -> Result<Secret, RagError> {
        self.key(provider).ok_or(RagError::Unauthorized {
            provider: provider.as_str(),
        })
    }

    /// Hosted embedding backends reuse the key of the matching generation provider;
    /// local ones need none.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Unauthorized`] when the backend needs a key that is missing.
    pub fn embedding(&self, provider: EmbeddingProviderKind) -> Result<Option<Secret>, RagError> {
        match provider.credential_owner() {
            None => Ok(None),
            Some(owner) => self
                .key(owner)
                .map(Some)
                .ok_or(RagError::Unauthorized {
                    provider: provider.as_str(),
                }),
        }
    }
}
