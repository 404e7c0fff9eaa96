use anyhow::{Context, Result};
use codesheet_core::Settings;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub(crate) fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "codesheet")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Settings from `path`, or from the default config file when it exists.
pub(crate) fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.is_file() => p,
            _ => return Ok(Settings::default()),
        },
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(settings)
}
