//! Runtime settings persisted next to the vector index: API keys (age-encrypted),
//! the model catalog and named system-prompt templates.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use age::secrecy::ExposeSecret;
use age::x25519;
use base64::{Engine, engine::general_purpose::STANDARD};
use ragline_llm::{GenerationProviderKind, Secret};
use ragline_memory::MemoryError;
use ragline_memory::snapshot::{SnapshotFile, read_json_or_default};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const SETTINGS_FILE: &str = "settings.json";
pub const KEY_FILE: &str = "settings.key";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to read key file: {0}")]
    KeyRead(std::io::Error),

    #[error("failed to write key file: {0}")]
    KeyWrite(std::io::Error),

    #[error("failed to parse age identity: {0}")]
    KeyParse(String),

    #[error("age encryption failed: {0}")]
    Encrypt(String),

    #[error("age decryption failed: {0}")]
    Decrypt(#[from] age::DecryptError),

    #[error("stored API keys are not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("I/O error during encryption: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in stored API keys: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] MemoryError),

    #[error("settings lock poisoned")]
    LockPoisoned,
}

impl SettingsError {
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// A named system prompt. At most one template is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub default: bool,
}

impl PromptTemplate {
    #[must_use]
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            prompt: prompt.into(),
            default: false,
        }
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// A generation model offered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub id: String,
    pub provider: GenerationProviderKind,
    pub model_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelEntry {
    #[must_use]
    pub fn new(
        provider: GenerationProviderKind,
        model_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            provider,
            model_id: model_id.into(),
            display_name: display_name.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Key update: an absent field keeps the stored key, a blank one removes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeysUpdate {
    #[serde(default)]
    pub openrouter: Option<String>,
    #[serde(default)]
    pub bedrock: Option<String>,
}

/// Stored keys reduced to their last four characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaskedApiKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrock: Option<String>,
}

/// Plaintext key set; only ever serialized into the encrypted payload.
#[derive(Default, Serialize, Deserialize)]
struct StoredKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    openrouter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bedrock: Option<String>,
}

impl StoredKeys {
    fn slot(&mut self, provider: GenerationProviderKind) -> &mut Option<String> {
        match provider {
            GenerationProviderKind::OpenRouter => &mut self.openrouter,
            GenerationProviderKind::Bedrock => &mut self.bedrock,
        }
    }

    fn get(&self, provider: GenerationProviderKind) -> Option<&str> {
        match provider {
            GenerationProviderKind::OpenRouter => self.openrouter.as_deref(),
            GenerationProviderKind::Bedrock => self.bedrock.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    /// base64 of the age ciphertext of [`StoredKeys`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_keys: Option<String>,
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    system_prompts: Vec<PromptTemplate>,
    #[serde(default)]
    models_seeded: bool,
}

#[derive(Default)]
struct SettingsState {
    file: SettingsFile,
    keys: StoredKeys,
    generation: u64,
}

/// Settings shared by the gateway, credential lookup and prompt resolution.
pub struct SettingsStore {
    identity: x25519::Identity,
    state: RwLock<SettingsState>,
    snapshot: SnapshotFile,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("snapshot", &self.snapshot.path())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Open the store under `dir`.
    ///
    /// Keys are encrypted to `identity` when given, otherwise to the identity in
    /// `settings.key`, which is generated on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read or parsed, or if the stored keys
    /// do not decrypt with it.
    pub async fn open(dir: impl AsRef<Path>, identity: Option<&Secret>) -> Result<Self, SettingsError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(SettingsError::KeyWrite)?;

        let identity = match identity {
            Some(secret) => parse_identity(secret.expose())?,
            None => load_or_create_identity(&dir.join(KEY_FILE)).await?,
        };

        let path = dir.join(SETTINGS_FILE);
        let load_path = path.clone();
        let file: SettingsFile = tokio::task::spawn_blocking(move || read_json_or_default(&load_path))
            .await
            .map_err(MemoryError::from)??;
        let keys = match &file.api_keys {
            Some(blob) => decrypt_keys(&identity, blob)?,
            None => StoredKeys::default(),
        };

        tracing::info!(
            models = file.models.len(),
            prompts = file.system_prompts.len(),
            path = %path.display(),
            "settings loaded"
        );

        Ok(Self {
            identity,
            state: RwLock::new(SettingsState {
                file,
                keys,
                generation: 0,
            }),
            snapshot: SnapshotFile::new(path, 0),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }

    /// Merge `update` into the stored keys and persist them encrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the snapshot write fails.
    pub async fn save_api_keys(&self, update: ApiKeysUpdate) -> Result<(), SettingsError> {
        self.mutate(|state| {
            for (provider, value) in [
                (GenerationProviderKind::OpenRouter, update.openrouter),
                (GenerationProviderKind::Bedrock, update.bedrock),
            ] {
                if let Some(value) = value {
                    let value = value.trim();
                    *state.keys.slot(provider) = (!value.is_empty()).then(|| value.to_owned());
                }
            }
            let empty = state.keys.openrouter.is_none() && state.keys.bedrock.is_none();
            state.file.api_keys = if empty {
                None
            } else {
                Some(encrypt_keys(&self.identity, &state.keys)?)
            };
            Ok(())
        })
        .await?;
        tracing::info!("API keys updated");
        Ok(())
    }

    #[must_use]
    pub fn api_key(&self, provider: GenerationProviderKind) -> Option<Secret> {
        let state = self.read_state().ok()?;
        state.keys.get(provider).map(Secret::new)
    }

    #[must_use]
    pub fn masked_api_keys(&self) -> MaskedApiKeys {
        let Ok(state) = self.read_state() else {
            return MaskedApiKeys::default();
        };
        MaskedApiKeys {
            openrouter: state.keys.openrouter.as_deref().map(mask),
            bedrock: state.keys.bedrock.as_deref().map(mask),
        }
    }

    /// Insert or replace a catalog entry; an empty id gets a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] for a blank model id or display name.
    pub async fn save_model(&self, mut model: ModelEntry) -> Result<ModelEntry, SettingsError> {
        if model.model_id.trim().is_empty() {
            return Err(SettingsError::Invalid("model_id is required".into()));
        }
        if model.display_name.trim().is_empty() {
            return Err(SettingsError::Invalid("display_name is required".into()));
        }
        if model.id.trim().is_empty() {
            model.id = uuid::Uuid::new_v4().to_string();
        }

        let saved = model.clone();
        self.mutate(move |state| {
            let models = &mut state.file.models;
            match models.iter_mut().find(|m| m.id == model.id) {
                Some(existing) => *existing = model,
                None => models.push(model),
            }
            Ok(())
        })
        .await?;
        Ok(saved)
    }

    /// Catalog entries, optionally for one provider, ordered by provider then name.
    #[must_use]
    pub fn list_models(&self, provider: Option<GenerationProviderKind>) -> Vec<ModelEntry> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        let mut models: Vec<ModelEntry> = state
            .file
            .models
            .iter()
            .filter(|m| provider.is_none_or(|p| m.provider == p))
            .cloned()
            .collect();
        models.sort_by(|a, b| {
            a.provider
                .as_str()
                .cmp(b.provider.as_str())
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        models
    }

    /// Returns `false` for an unknown id, which writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot write fails.
    pub async fn delete_model(&self, id: &str) -> Result<bool, SettingsError> {
        self.mutate_if(|state| {
            let before = state.file.models.len();
            state.file.models.retain(|m| m.id != id);
            before != state.file.models.len()
        })
        .await
    }

    /// Seed the catalog with the configured generation models once.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot write fails.
    pub async fn seed_models(&self, config: &Config) -> Result<usize, SettingsError> {
        let seeds = [
            ModelEntry::new(
                GenerationProviderKind::OpenRouter,
                config.generation.openrouter.model.clone(),
                format!("{} (OpenRouter)", config.generation.openrouter.model),
            ),
            ModelEntry::new(
                GenerationProviderKind::Bedrock,
                config.generation.bedrock.model.clone(),
                format!("{} (Bedrock)", config.generation.bedrock.model),
            ),
        ];

        let mut seeded = 0;
        let changed = self
            .mutate_if(|state| {
                if state.file.models_seeded {
                    return false;
                }
                for mut seed in seeds {
                    seed.id = uuid::Uuid::new_v4().to_string();
                    state.file.models.push(seed);
                    seeded += 1;
                }
                state.file.models_seeded = true;
                true
            })
            .await?;
        if changed {
            tracing::info!(seeded, "seeded model catalog from configuration");
        }
        Ok(seeded)
    }

    /// Insert or replace a template. Saving a default demotes every other template.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] for a blank name or prompt.
    pub async fn save_prompt(
        &self,
        mut template: PromptTemplate,
    ) -> Result<PromptTemplate, SettingsError> {
        if template.name.trim().is_empty() {
            return Err(SettingsError::Invalid("name is required".into()));
        }
        if template.prompt.trim().is_empty() {
            return Err(SettingsError::Invalid("prompt is required".into()));
        }
        if template.id.trim().is_empty() {
            template.id = uuid::Uuid::new_v4().to_string();
        }

        let saved = template.clone();
        self.mutate(move |state| {
            let prompts = &mut state.file.system_prompts;
            if template.default {
                for other in prompts.iter_mut() {
                    other.default = false;
                }
            }
            match prompts.iter_mut().find(|p| p.id == template.id) {
                Some(existing) => *existing = template,
                None => prompts.push(template),
            }
            Ok(())
        })
        .await?;
        Ok(saved)
    }

    #[must_use]
    pub fn list_prompts(&self) -> Vec<PromptTemplate> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        let mut prompts = state.file.system_prompts.clone();
        prompts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        prompts
    }

    #[must_use]
    pub fn default_prompt(&self) -> Option<PromptTemplate> {
        let state = self.read_state().ok()?;
        state.file.system_prompts.iter().find(|p| p.default).cloned()
    }

    /// Returns `false` for an unknown id. Deleting the default leaves none.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot write fails.
    pub async fn delete_prompt(&self, id: &str) -> Result<bool, SettingsError> {
        self.mutate_if(|state| {
            let before = state.file.system_prompts.len();
            state.file.system_prompts.retain(|p| p.id != id);
            before != state.file.system_prompts.len()
        })
        .await
    }

    async fn mutate<F>(&self, apply: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut SettingsState) -> Result<(), SettingsError>,
    {
        let (generation, file) = {
            let mut state = self.write_state()?;
            apply(&mut state)?;
            state.generation += 1;
            (state.generation, state.file.clone())
        };
        self.snapshot.write(generation, file).await?;
        Ok(())
    }

    /// Persist only when `apply` reports a change.
    async fn mutate_if<F>(&self, apply: F) -> Result<bool, SettingsError>
    where
        F: FnOnce(&mut SettingsState) -> bool,
    {
        let (generation, file) = {
            let mut state = self.write_state()?;
            if !apply(&mut state) {
                return Ok(false);
            }
            state.generation += 1;
            (state.generation, state.file.clone())
        };
        self.snapshot.write(generation, file).await?;
        Ok(true)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, SettingsState>, SettingsError> {
        self.state.read().map_err(|_| SettingsError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, SettingsState>, SettingsError> {
        self.state.write().map_err(|_| SettingsError::LockPoisoned)
    }
}

/// `****` followed by the last four characters; short keys are fully hidden.
fn mask(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "****".into();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{tail}")
}

fn parse_identity(text: &str) -> Result<x25519::Identity, SettingsError> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .ok_or_else(|| SettingsError::KeyParse("no identity line found".into()))?
        .parse::<x25519::Identity>()
        .map_err(|e| SettingsError::KeyParse(e.to_owned()))
}

async fn load_or_create_identity(path: &Path) -> Result<x25519::Identity, SettingsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_identity(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let identity = x25519::Identity::generate();
            let contents = format!(
                "# ragline settings key\n{}\n",
                identity.to_string().expose_secret()
            );
            write_key_file(path.to_path_buf(), contents).await?;
            tracing::info!(path = %path.display(), "generated settings encryption key");
            Ok(identity)
        }
        Err(e) => Err(SettingsError::KeyRead(e)),
    }
}

async fn write_key_file(path: PathBuf, contents: String) -> Result<(), SettingsError> {
    tokio::fs::write(&path, contents)
        .await
        .map_err(SettingsError::KeyWrite)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(SettingsError::KeyWrite)?;
    }
    Ok(())
}

fn encrypt_keys(identity: &x25519::Identity, keys: &StoredKeys) -> Result<String, SettingsError> {
    let plaintext = serde_json::to_vec(keys)?;
    let recipient = identity.to_public();
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| SettingsError::Encrypt(e.to_string()))?;

    let mut ciphertext = Vec::new();
    let mut writer = encryptor.wrap_output(&mut ciphertext)?;
    writer.write_all(&plaintext)?;
    writer.finish()?;
    Ok(STANDARD.encode(ciphertext))
}

fn decrypt_keys(identity: &x25519::Identity, blob: &str) -> Result<StoredKeys, SettingsError> {
    let ciphertext = STANDARD.decode(blob)?;
    let decryptor = age::Decryptor::new(&ciphertext[..])?;
    let mut reader = decryptor.decrypt(std::iter::once(identity as &dyn age::Identity))?;
    let mut plaintext = Vec::new();
    reader.read_to_end(&mut plaintext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
