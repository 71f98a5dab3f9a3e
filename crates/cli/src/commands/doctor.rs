//! `hrdesk doctor`: Diagnose the setup.

use std::path::Path;

use hrdesk_config::AppConfig;
use hrdesk_core::KnowledgeBase;

pub async fn run(config_path: Option<&Path>, ping: bool) -> anyhow::Result<()> {
    println!("🩺 HRDesk Doctor — Setup Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let default_path = AppConfig::config_dir().join("config.toml");
    let shown = config_path.unwrap_or(default_path.as_path());
    let config = match super::load_config(config_path) {
        Ok(config) => {
            if shown.exists() {
                println!("  ✅ Config file valid ({})", shown.display());
            } else {
                println!("  ⚠️  No config file at {} — using defaults (`hrdesk init` writes one)", shown.display());
            }
            config
        }
        Err(e) => {
            println!("  ❌ {e:#}");
            println!("\n  ⚠️  Fix the config file first.");
            anyhow::bail!("config file is invalid");
        }
    };

    match KnowledgeBase::load(&config.knowledge.path) {
        Ok(kb) => println!(
            "  ✅ Knowledge file {} ({} bytes as sent to the model)",
            kb.path().display(),
            kb.snapshot().len()
        ),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    let api_key = match config.resolve_api_key() {
        Ok(key) => {
            println!("  ✅ API key found in {}", key.source());
            Some(key)
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
            None
        }
    };

    if let Some(key) = api_key {
        match hrdesk_providers::build_from_config(&config, &key) {
            Ok(provider) => {
                println!(
                    "  ✅ Provider '{}' with model {}",
                    provider.name(),
                    config.provider.model
                );
                if ping {
                    match provider.health_check().await {
                        Ok(true) => println!("  ✅ Provider reachable"),
                        Ok(false) => {
                            println!("  ❌ Provider rejected the health request");
                            issues += 1;
                        }
                        Err(e) => {
                            println!("  ❌ Provider unreachable: {e}");
                            issues += 1;
                        }
                    }
                }
            }
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        anyhow::bail!("{issues} setup issue(s) found");
    }

    Ok(())
}
