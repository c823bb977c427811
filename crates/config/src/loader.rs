use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HeraldConfig};

/// Standard config file name, checked project-local then user-global.
const CONFIG_FILENAME: &str = "herald.toml";

/// Load config from the given path.
///
/// `${ENV_VAR}` placeholders are substituted before parsing, and secret env
/// overrides are applied after.
pub fn load_config(path: &Path) -> anyhow::Result<HeraldConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config: HeraldConfig = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./herald.toml` (project-local)
/// 2. `~/.config/herald/herald.toml` (user-global)
///
/// Returns `HeraldConfig::default()` (plus env overrides) if no config file
/// is found or the file fails to load.
pub fn discover_and_load() -> HeraldConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = HeraldConfig::default();
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    let p = PathBuf::from(CONFIG_FILENAME);
    if p.exists() {
        return Some(p);
    }

    // User-global: ~/.config/herald/
    if let Some(dirs) = directories::ProjectDirs::from("", "", "herald") {
        let p = dirs.config_dir().join(CONFIG_FILENAME);
        if p.exists() {
            return Some(p);
        }
    }

    None
}

/// Apply environment-variable overrides for values that are usually injected
/// rather than written into the config file.
fn apply_env_overrides(config: &mut HeraldConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut HeraldConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(secret) = lookup("HERALD_WEBHOOK_SECRET")
        && !secret.is_empty()
    {
        config.webhook.secret = Some(Secret::new(secret));
    }
    if let Some(key) = lookup("HERALD_COMPLETION_API_KEY")
        && !key.is_empty()
    {
        config.completion.api_key = Some(Secret::new(key));
    }
    if let Some(url) = lookup("HERALD_DELIVERY_URL")
        && !url.is_empty()
    {
        config.delivery.base_url = Some(url);
    }
}
