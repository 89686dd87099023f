use std::path::Path;

use anyhow::{Context, bail};
use ragline_core::Config;

/// Write the default configuration to `path`.
pub fn run(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    let toml_str = render_default()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &toml_str)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Config written to {}", path.display());
    print_next_steps(path);
    Ok(())
}

pub(crate) fn render_default() -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(&Config::default())?)
}

fn print_next_steps(path: &Path) {
    println!();
    println!("API keys are read from the environment only:");
    println!("  export RAGLINE_OPENROUTER_API_KEY=...");
    println!("  export RAGLINE_BEDROCK_API_KEY=...");
    println!();
    println!("Then:");
    println!("  ragline --config {} ingest notes.md", path.display());
    println!("  ragline --config {} ask \"What do the notes say?\"", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_default_parses_back() {
        let rendered = render_default().unwrap();
        assert!(rendered.contains("[retrieval]"));
        assert!(!rendered.contains("api_key"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.retrieval.chunk_size, 1000);
        assert_eq!(parsed.retrieval.chunk_overlap, 200);
        assert_eq!(parsed.server.port, 3000);
        parsed.validate().unwrap();
    }

    #[test]
    fn run_writes_file_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("default.toml");
        run(&path, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_default().unwrap());
    }

    #[test]
    fn run_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragline.toml");
        std::fs::write(&path, "# mine").unwrap();

        assert!(run(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");

        run(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[server]"));
    }
}
