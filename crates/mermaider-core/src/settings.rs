use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Overrides the config directory (useful for tests and per-project setups).
pub const HOME_ENV: &str = "MERMAIDER_HOME";
pub const PROVIDER_ENV: &str = "MERMAIDER_PROVIDER";
pub const MODEL_ENV: &str = "MERMAIDER_MODEL";
pub const API_KEY_ENV: &str = "MERMAIDER_API_KEY";

const SETTINGS_FILE: &str = "settings.json";
const SECRETS_FILE: &str = "secrets.toml";

/// Resolve the config directory (~/.mermaider/ unless MERMAIDER_HOME is set).
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mermaider")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Client-side limit for a single LLM call.
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

/// Conventional API key variable for a provider, if it needs one.
pub fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "google" => Some("GOOGLE_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

/// Read `settings.json`. A missing file yields the defaults.
pub fn read_settings_from(dir: &Path) -> Result<AiSettings> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(AiSettings::default());
    }
    Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
}

pub fn write_settings_to(dir: &Path, settings: &AiSettings) -> Result<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(dir.join(SETTINGS_FILE), json)?;
    Ok(())
}

/// Read top-level string entries of `secrets.toml`. A missing file is empty.
pub fn read_secrets(dir: &Path) -> Result<HashMap<String, String>> {
    let path = dir.join(SECRETS_FILE);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let doc: toml_edit::DocumentMut = fs::read_to_string(&path)?.parse()?;
    Ok(doc
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.to_string(), s.to_string())))
        .collect())
}

/// Effective settings plus the config files that were skipped and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub settings: AiSettings,
    pub warnings: Vec<String>,
}

/// Layer environment and secrets over the settings file.
///
/// Precedence: environment, then `secrets.toml`, then `settings.json`.
/// A file that cannot be read is skipped and reported in `warnings`.
/// `env` is injected so callers (and tests) control the lookup.
pub fn resolve_settings_with(
    dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedSettings {
    let mut warnings = Vec::new();
    let mut settings = read_settings_from(dir).unwrap_or_else(|e| {
        warnings.push(format!("ignoring {}: {}", dir.join(SETTINGS_FILE).display(), e));
        AiSettings::default()
    });
    let secrets = read_secrets(dir).unwrap_or_else(|e| {
        warnings.push(format!("ignoring {}: {}", dir.join(SECRETS_FILE).display(), e));
        HashMap::new()
    });
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    if let Some(provider) = non_empty(env(PROVIDER_ENV)) {
        settings.provider = provider;
    }
    if let Some(model) = non_empty(env(MODEL_ENV)) {
        settings.model = model;
    }

    let provider_var = provider_key_var(&settings.provider);
    let from_env = non_empty(env(API_KEY_ENV)).or_else(|| provider_var.and_then(|v| non_empty(env(v))));
    let from_secrets = non_empty(secrets.get(API_KEY_ENV).cloned())
        .or_else(|| provider_var.and_then(|v| non_empty(secrets.get(v).cloned())));

    if let Some(key) = from_env.or(from_secrets) {
        settings.api_key = key;
    }
    ResolvedSettings { settings, warnings }
}

pub fn resolve_settings() -> ResolvedSettings {
    resolve_settings_with(&config_dir(), |name| std::env::var(name).ok())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_settings_with(dir.path(), no_env);
        assert_eq!(resolved.settings, AiSettings::default());
        assert!(resolved.warnings.is_empty());
        assert!(!ai_configured(&resolved.settings));
    }

    #[test]
    fn settings_round_trip_and_partial_files_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let custom = AiSettings {
            provider: "anthropic".into(),
            api_key: "k".into(),
            model: "claude-3-5-haiku-latest".into(),
            temperature: 0.0,
            timeout_secs: 15,
        };
        write_settings_to(dir.path(), &custom).unwrap();
        assert_eq!(read_settings_from(dir.path()).unwrap(), custom);

        std::fs::write(dir.path().join("settings.json"), r#"{"model":"llama3"}"#).unwrap();
        let s = read_settings_from(dir.path()).unwrap();
        assert_eq!(s.model, "llama3");
        assert_eq!(s.timeout_secs, 60);
    }

    #[test]
    fn env_beats_secrets_beats_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = AiSettings {
            api_key: "from-file".into(),
            ..Default::default()
        };
        write_settings_to(dir.path(), &file).unwrap();
        assert_eq!(resolve_settings_with(dir.path(), no_env).settings.api_key, "from-file");

        std::fs::write(dir.path().join("secrets.toml"), "OPENAI_API_KEY = \"from-secrets\"\n").unwrap();
        assert_eq!(resolve_settings_with(dir.path(), no_env).settings.api_key, "from-secrets");

        let env = |name: &str| (name == "OPENAI_API_KEY").then(|| "from-env".to_string());
        assert_eq!(resolve_settings_with(dir.path(), env).settings.api_key, "from-env");

        let env = |name: &str| match name {
            "MERMAIDER_API_KEY" => Some("generic".to_string()),
            "OPENAI_API_KEY" => Some("specific".to_string()),
            _ => None,
        };
        assert_eq!(resolve_settings_with(dir.path(), env).settings.api_key, "generic");
    }

    #[test]
    fn provider_override_selects_matching_key_variable() {
        let dir = tempfile::tempdir().unwrap();
        let env = |name: &str| match name {
            "MERMAIDER_PROVIDER" => Some("groq".to_string()),
            "GROQ_API_KEY" => Some("gsk".to_string()),
            "OPENAI_API_KEY" => Some("sk".to_string()),
            _ => None,
        };
        let s = resolve_settings_with(dir.path(), env).settings;
        assert_eq!(s.provider, "groq");
        assert_eq!(s.api_key, "gsk");
        assert!(ai_configured(&s));
    }

    #[test]
    fn ollama_needs_no_key() {
        let s = AiSettings {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..Default::default()
        };
        assert!(ai_configured(&s));
    }

    #[test]
    fn malformed_secrets_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secrets.toml"), "OPENAI_API_KEY = ").unwrap();
        assert!(read_secrets(dir.path()).is_err());

        let resolved = resolve_settings_with(dir.path(), no_env);
        assert_eq!(resolved.settings.api_key, "");
        assert_eq!(resolved.warnings.len(), 1);
        assert!(resolved.warnings[0].contains("secrets.toml"), "{:?}", resolved.warnings);
    }

    #[test]
    fn malformed_settings_file_falls_back_to_defaults_with_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{\"model\": ").unwrap();
        assert!(read_settings_from(dir.path()).is_err());

        let env = |name: &str| (name == "OPENAI_API_KEY").then(|| "sk".to_string());
        let resolved = resolve_settings_with(dir.path(), env);
        assert_eq!(resolved.settings.model, AiSettings::default().model);
        assert_eq!(resolved.settings.api_key, "sk");
        assert!(resolved.warnings[0].contains("settings.json"), "{:?}", resolved.warnings);
    }
}
