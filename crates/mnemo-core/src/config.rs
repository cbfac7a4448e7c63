//! Environment-driven engine configuration.

use std::path::PathBuf;

pub const DEFAULT_GLOBAL_DATABASE: &str = "global";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";
pub const DEFAULT_PAIRING_SOCKET: &str = "/tmp/mnemo-pairing.sock";
pub const DEFAULT_AUTHOR: &str = "mnemo";

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MnemoConfig {
    /// Database holding the shared promotion pool
    pub global_database: String,
    /// OpenAI API key; embeddings are disabled when absent
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub pairing_socket: PathBuf,
    /// Committer recorded on commits
    pub author: String,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            global_database: DEFAULT_GLOBAL_DATABASE.to_string(),
            openai_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            pairing_socket: PathBuf::from(DEFAULT_PAIRING_SOCKET),
            author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

impl MnemoConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - MNEMO_GLOBAL_DATABASE (optional, default: "global")
    /// - OPENAI_API_KEY (optional; empty counts as unset)
    /// - MNEMO_EMBEDDING_MODEL (optional, default: "text-embedding-3-small")
    /// - MNEMO_OLLAMA_URL (optional, default: "http://localhost:11434")
    /// - MNEMO_OLLAMA_MODEL (optional, default: "llama3")
    /// - MNEMO_PAIRING_SOCKET (optional, default: "/tmp/mnemo-pairing.sock")
    /// - MNEMO_AUTHOR (optional, default: "mnemo")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            global_database: get("MNEMO_GLOBAL_DATABASE").unwrap_or(defaults.global_database),
            openai_api_key: get("OPENAI_API_KEY"),
            embedding_model: get("MNEMO_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            ollama_url: get("MNEMO_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: get("MNEMO_OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            pairing_socket: get("MNEMO_PAIRING_SOCKET")
                .map(PathBuf::from)
                .unwrap_or(defaults.pairing_socket),
            author: get("MNEMO_AUTHOR").unwrap_or(defaults.author),
        }
    }

    pub fn embeddings_enabled(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = MnemoConfig::from_lookup(|_| None);
        assert_eq!(config, MnemoConfig::default());
        assert!(!config.embeddings_enabled());
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let env: HashMap<&str, &str> = [
            ("MNEMO_GLOBAL_DATABASE", "shared"),
            ("OPENAI_API_KEY", "   "),
            ("MNEMO_PAIRING_SOCKET", "/run/mnemo.sock"),
        ]
        .into_iter()
        .collect();
        let config = MnemoConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.global_database, "shared");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.pairing_socket, PathBuf::from("/run/mnemo.sock"));
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
    }
}
