//! `hrdesk init`: Write a default config file.

use std::path::Path;

use anyhow::Context;
use hrdesk_config::AppConfig;

pub fn run(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(default_path.as_path());

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Wrote {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Point knowledge.path at your HR data (JSON)");
    println!("  2. export GEMINI_API_KEY=...   (or add GOOGLE_API_KEY to the secrets file)");
    println!("  3. hrdesk doctor");
    println!("  4. hrdesk serve");

    Ok(())
}
