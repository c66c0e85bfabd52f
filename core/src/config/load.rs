use std::path::{Path, PathBuf};

use super::types::{AppConfig, BackendConfig};

/// Get the default fluxbridge data directory: ~/.fluxbridge
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".fluxbridge"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.fluxbridge/config.toml (highest)
    let data_dir = get_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if user_config.exists() {
        let s = std::fs::read_to_string(&user_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    // Fill in the weights cache directory if the config left it empty.
    if cfg.weights.dir.trim().is_empty() {
        let weights_dir = data_dir.join("weights");
        std::fs::create_dir_all(&weights_dir)?;
        cfg.weights.dir = weights_dir.to_string_lossy().to_string();
    }

    // Update logging directory to use the data directory if not set.
    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    if let Ok(v) = std::env::var("FLUXBRIDGE_WEBUI_URL") {
        if !v.trim().is_empty() {
            if let BackendConfig::WebUi(ref mut webui_cfg) = cfg.backend {
                webui_cfg.base_url = v;
            }
        }
    }
    if let Ok(v) = std::env::var("FLUXBRIDGE_WEIGHTS_DIR") {
        if !v.trim().is_empty() {
            cfg.weights.dir = v;
        }
    }
    if let Ok(v) = std::env::var("FLUXBRIDGE_DISABLE_PREVIEW") {
        if !v.trim().is_empty() && v != "0" {
            cfg.preview.enabled = false;
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_back_from_toml() {
        let cfg = AppConfig::default();
        let s = toml::to_string(&cfg).unwrap();
        let parsed: AppConfig = toml::from_str(&s).unwrap();
        assert_eq!(parsed.preview.every_n_steps, 1);
        assert_eq!(parsed.preview.refresh_period_ms, 250);
        assert!(parsed.preview.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
[preview]
mirror_stderr = false
"#,
        )
        .unwrap();
        assert!(!cfg.preview.mirror_stderr);
        assert!(cfg.preview.enabled);
        assert_eq!(cfg.engine.preset, "flux");
    }
}
