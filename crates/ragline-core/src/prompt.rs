use std::sync::Arc;

use crate::settings::SettingsStore;

/// Separator placed between retrieved fragments in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Join retrieved fragment texts in ranked order.
#[must_use]
pub fn context_block<S: AsRef<str>>(fragments: &[S]) -> String {
    let parts: Vec<&str> = fragments.iter().map(AsRef::as_ref).collect();
    parts.join(CONTEXT_SEPARATOR)
}

/// Append the knowledge base section to `base`; an empty context leaves `base` unchanged.
#[must_use]
pub fn augment(base: &str, context: &str) -> String {
    if context.is_empty() {
        return base.to_owned();
    }
    format!(
        "{base}\n\nKNOWLEDGE BASE:\n{context}\n\nUse this knowledge to answer questions naturally."
    )
}

/// Default system prompt: the stored default template over the configured one.
#[derive(Debug)]
pub struct SystemPrompts {
    configured: String,
    settings: Option<Arc<SettingsStore>>,
}

impl SystemPrompts {
    #[must_use]
    pub fn new(configured: impl Into<String>) -> Self {
        Self {
            configured: configured.into(),
            settings: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Request value, else the stored default template, else the configured default.
    #[must_use]
    pub fn resolve(&self, requested: Option<&str>) -> String {
        if let Some(prompt) = requested.filter(|p| !p.trim().is_empty()) {
            return prompt.to_owned();
        }
        self.current()
    }

    #[must_use]
    pub fn current(&self) -> String {
        self.stored().unwrap_or_else(|| self.configured.clone())
    }

    #[must_use]
    pub fn configured(&self) -> &str {
        &self.configured
    }

    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.stored().is_some()
    }

    fn stored(&self) -> Option<String> {
        self.settings
            .as_ref()
            .and_then(|s| s.default_prompt())
            .map(|t| t.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PromptTemplate;

    #[test]
    fn context_joined_with_separator() {
        assert_eq!(context_block(&["a", "b", "c"]), "a\n\n---\n\nb\n\n---\n\nc");
        assert_eq!(context_block::<&str>(&[]), "");
    }

    #[test]
    fn augment_appends_knowledge_base() {
        let prompt = augment("Be helpful.", "fact one");
        assert_eq!(
            prompt,
            "Be helpful.\n\nKNOWLEDGE BASE:\nfact one\n\nUse this knowledge to answer questions naturally."
        );
    }

    #[test]
    fn augment_without_context_is_base() {
        assert_eq!(augment("Be helpful.", ""), "Be helpful.");
    }

    #[tokio::test]
    async fn resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SettingsStore::open(dir.path(), None).await.unwrap());
        let prompts = SystemPrompts::new("configured").with_settings(Arc::clone(&store));
        assert_eq!(prompts.resolve(None), "configured");
        assert_eq!(prompts.resolve(Some("  ")), "configured");

        store
            .save_prompt(PromptTemplate::new("Draft", "not default"))
            .await
            .unwrap();
        assert!(!prompts.is_overridden());

        let stored = store
            .save_prompt(PromptTemplate::new("Support", "stored").as_default())
            .await
            .unwrap();
        assert!(prompts.is_overridden());
        assert_eq!(prompts.resolve(None), "stored");
        assert_eq!(prompts.resolve(Some("request")), "request");

        store.delete_prompt(&stored.id).await.unwrap();
        assert!(!prompts.is_overridden());
        assert_eq!(prompts.current(), "configured");
    }
}
