use std::path::PathBuf;

use ragline_llm::Secret;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_server();
        self.apply_env_overrides_models();
        self.apply_env_overrides_retrieval();
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_PORT value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_VECTOR_STORE_PATH") {
            self.storage.vector_store_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RAGLINE_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
    }

    fn apply_env_overrides_models(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_EMBEDDING_PROVIDER") {
            if let Ok(kind) = v.parse() {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_EMBEDDING_DIMENSIONS") {
            if let Ok(dim) = v.parse::<usize>() {
                self.embedding.dimensions = dim;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_EMBEDDING_DIMENSIONS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_OLLAMA_BASE_URL") {
            self.embedding.ollama_base_url = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_OPENROUTER_MODEL") {
            self.generation.openrouter.model = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_BEDROCK_REGION") {
            self.generation.bedrock.region = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_BEDROCK_MODEL") {
            self.generation.bedrock.model = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_SYSTEM_PROMPT")
            && !v.trim().is_empty()
        {
            self.generation.system_prompt = v;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_MAX_CONTEXT_CHUNKS") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.max_context_chunks = n;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_MAX_CONTEXT_CHUNKS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_CHUNK_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.chunk_size = n;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_CHUNK_OVERLAP") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.chunk_overlap = n;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_CHUNK_OVERLAP value: {v}");
            }
        }
    }

    /// Read API keys from the environment. Blank values count as unset.
    pub fn resolve_secrets(&mut self) {
        self.secrets.openrouter_api_key =
            Secret::non_blank(std::env::var("RAGLINE_OPENROUTER_API_KEY").ok());
        self.secrets.bedrock_api_key =
            Secret::non_blank(std::env::var("RAGLINE_BEDROCK_API_KEY").ok());
        self.secrets.settings_key = Secret::non_blank(std::env::var("RAGLINE_SETTINGS_KEY").ok());
    }
}
