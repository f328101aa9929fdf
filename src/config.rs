use crate::error::{ChunkError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

const ENV_PREFIX: &str = "CODE_CHUNKER_";
const CONFIG_DIR_NAME: &str = "code-context-chunker";

/// Configuration for chunking a source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Function and method names that never become chunks (lifecycle dunders)
    pub excluded_names: Vec<String>,

    /// Class names skipped together with their methods (framework scaffolding)
    pub skipped_classes: Vec<String>,

    /// File extensions treated as Python sources, without the leading dot
    pub extensions: Vec<String>,

    /// Honour .gitignore and hidden-file filtering while walking
    pub respect_ignore_files: bool,

    /// Follow symbolic links while walking
    pub follow_links: bool,

    /// Upper bound on files analysed at once by the concurrent walk
    pub max_concurrency: usize,

    /// Number of chunks an indexer submits per batch
    pub index_batch_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            excluded_names: ["__init__", "__new__", "__del__", "__post_init__", "__init_subclass__"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skipped_classes: vec!["Migration".to_string()],
            extensions: vec!["py".to_string()],
            respect_ignore_files: false,
            follow_links: false,
            max_concurrency: 8,
            index_batch_size: 100,
        }
    }
}

impl ChunkerConfig {
    /// Build configuration from the environment.
    ///
    /// `.env` files are loaded first (working directory, then
    /// `$XDG_CONFIG_HOME/code-context-chunker/.env`); variables already set in the
    /// shell take priority over both.
    pub fn from_env() -> Result<Self> {
        load_env_files();

        let mut config = Self::default();
        if let Some(names) = env_list("EXCLUDED_NAMES") {
            config.excluded_names = names;
        }
        if let Some(names) = env_list("SKIPPED_CLASSES") {
            config.skipped_classes = names;
        }
        if let Some(exts) = env_list("EXTENSIONS") {
            config.extensions = exts
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        if let Some(flag) = env_parse::<bool>("RESPECT_IGNORE")? {
            config.respect_ignore_files = flag;
        }
        if let Some(flag) = env_parse::<bool>("FOLLOW_LINKS")? {
            config.follow_links = flag;
        }
        if let Some(n) = env_parse::<usize>("MAX_CONCURRENCY")? {
            config.max_concurrency = n;
        }
        if let Some(n) = env_parse::<usize>("INDEX_BATCH_SIZE")? {
            config.index_batch_size = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(ChunkError::invalid_config("extensions must not be empty"));
        }
        if self.max_concurrency == 0 {
            return Err(ChunkError::invalid_config("max_concurrency must be > 0"));
        }
        if self.index_batch_size == 0 {
            return Err(ChunkError::invalid_config("index_batch_size must be > 0"));
        }
        Ok(())
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_names.iter().any(|n| n == name)
    }

    pub fn is_skipped_class(&self, name: &str) -> bool {
        self.skipped_classes.iter().any(|n| n == name)
    }

    pub fn matches_extension(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Load .env files with priority order:
/// 1. Current working directory (project-specific config)
/// 2. XDG config directory (global default config)
fn load_env_files() {
    let cwd_env = std::env::current_dir().map(|p| p.join(".env")).ok();
    if let Some(path) = cwd_env {
        if path.exists() && dotenv::from_path(&path).is_ok() {
            tracing::debug!("Loaded .env from: {}", path.display());
            return;
        }
    }

    if let Some(config_dir) = xdg_config_dir() {
        let xdg_env = config_dir.join(CONFIG_DIR_NAME).join(".env");
        if xdg_env.exists() && dotenv::from_path(&xdg_env).is_ok() {
            tracing::debug!("Loaded .env from: {}", xdg_env.display());
            return;
        }
    }

    tracing::debug!("No .env file found, using environment variables only");
}

/// Get XDG config directory, fallback to ~/.config
fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_var(key).map(|raw| parse_list(&raw))
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ChunkError::invalid_config(format!("{ENV_PREFIX}{key} has invalid value '{raw}'"))
        }),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_config_is_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_excluded("__init__"));
        assert!(!config.is_excluded("area"));
        assert!(config.is_skipped_class("Migration"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = ChunkerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_extensions() {
        let config = ChunkerConfig {
            extensions: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn matches_configured_extensions() {
        let config = ChunkerConfig::default();
        assert!(config.matches_extension(Path::new("pkg/views.py")));
        assert!(!config.matches_extension(Path::new("pkg/views.pyc")));
        assert!(!config.matches_extension(Path::new("Makefile")));
    }

    #[test]
    fn list_parsing_drops_blanks() {
        assert_eq!(parse_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ChunkerConfig =
            serde_json::from_str(r#"{"max_concurrency": 2, "extensions": ["py", "pyi"]}"#).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.extensions, vec!["py", "pyi"]);
        assert_eq!(config.skipped_classes, vec!["Migration"]);
    }
}
