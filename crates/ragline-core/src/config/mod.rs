mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ragline_memory::ChunkerConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// `--config` wins, then `RAGLINE_CONFIG`, then `config/default.toml`.
    #[must_use]
    pub fn resolve_path(cli: Option<&Path>) -> PathBuf {
        if let Some(path) = cli {
            return path.to_path_buf();
        }
        std::env::var("RAGLINE_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retrieval.chunk_size == 0 {
            bail!("retrieval.chunk_size must be greater than 0");
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            bail!(
                "retrieval.chunk_overlap ({}) must be less than retrieval.chunk_size ({})",
                self.retrieval.chunk_overlap,
                self.retrieval.chunk_size
            );
        }
        if self.retrieval.max_context_chunks == 0 {
            bail!("retrieval.max_context_chunks must be greater than 0");
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than 0");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.generation.openrouter.model.trim().is_empty() {
            bail!("generation.openrouter.model must not be empty");
        }
        if self.generation.bedrock.model.trim().is_empty() {
            bail!("generation.bedrock.model must not be empty");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be greater than 0");
        }

        if self.secrets.openrouter_api_key.is_none() && self.secrets.bedrock_api_key.is_none() {
            tracing::warn!(
                "no generation API key configured (RAGLINE_OPENROUTER_API_KEY or \
                 RAGLINE_BEDROCK_API_KEY); chat requests will be rejected"
            );
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the chunk settings are inconsistent.
    pub fn chunker_config(&self) -> anyhow::Result<ChunkerConfig> {
        ChunkerConfig::new(self.retrieval.chunk_size, self.retrieval.chunk_overlap)
            .context("invalid chunking configuration")
    }
}
