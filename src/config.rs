//! Configuration loader and validator for the recipe synchronizer.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub spoonacular: Spoonacular,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Recipe type catalog on disk. The bundled catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

/// Remote recipe API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Spoonacular {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

fn default_base_url() -> String {
    crate::spoonacular::SPOONACULAR_API_BASE.to_string()
}

fn default_limit() -> u32 {
    8
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// Default SQLite URL inside the data directory.
    pub fn database_url(&self) -> String {
        format!(
            "sqlite://{}/recipes.db",
            self.app.data_dir.trim_end_matches('/')
        )
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if let Some(path) = &cfg.app.catalog_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "app.catalog_path must be non-empty when set",
            ));
        }
    }

    if cfg.spoonacular.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("spoonacular.api_key must be non-empty"));
    }
    if Url::parse(&cfg.spoonacular.base_url).is_err() {
        return Err(ConfigError::Invalid("spoonacular.base_url must be a valid URL"));
    }
    if cfg.spoonacular.default_limit == 0 {
        return Err(ConfigError::Invalid("spoonacular.default_limit must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the project.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  catalog_path: "./resources/recipetypes.xml"

spoonacular:
  api_key: "YOUR_SPOONACULAR_API_KEY"
  base_url: "https://api.spoonacular.com/"
  default_limit: 8
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.spoonacular.default_limit, 8);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = r#"app:
  data_dir: "./data"
spoonacular:
  api_key: "k"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert!(cfg.app.catalog_path.is_none());
        assert_eq!(cfg.spoonacular.base_url, "https://api.spoonacular.com/");
        assert_eq!(cfg.spoonacular.default_limit, 8);
    }

    #[test]
    fn invalid_api_key() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.spoonacular.api_key = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("api_key")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_base_url_and_limit() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.spoonacular.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.spoonacular.default_limit = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.catalog_path = Some("".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn database_url_uses_data_dir() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "/tmp/recipes/".into();
        assert_eq!(cfg.database_url(), "sqlite:///tmp/recipes/recipes.db");
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.spoonacular.api_key, "YOUR_SPOONACULAR_API_KEY");
    }
}
