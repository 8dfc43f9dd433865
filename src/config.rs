use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_ttl_seconds() -> i64 {
    7200
}

fn default_log_filter() -> String {
    "lfsgate=info,tower_http=info".to_string()
}

fn default_dir_mode() -> u32 {
    0o700
}

fn default_blob_mode() -> u32 {
    0o600
}

/// Server configuration, loadable from a TOML file with CLI overrides
/// layered on top. Every component that needs configuration receives an
/// `Arc<Config>` at construction rather than reaching for a global.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// BlobStore root directory.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// TokenStore directory. Falls back to a process-temp subdirectory when
    /// unset.
    #[serde(default)]
    pub token_dir: Option<PathBuf>,
    #[serde(default = "default_ttl_seconds")]
    pub token_ttl_seconds: i64,
    /// The configured set of repository paths this deployment will serve.
    /// Any request naming a repository outside this set is rejected before
    /// it reaches the blob store or token store.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Path to the external access-control oracle binary.
    #[serde(default)]
    pub oracle_binary: Option<PathBuf>,
    /// Mode applied to newly created blob fan-out directories. Secure
    /// (`0700`) by default; relax it (e.g. `0750`) only if some other
    /// process on the host needs read access to the data root. TOML
    /// accepts this as either a decimal or an `0o`-prefixed octal literal.
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,
    /// Mode applied to committed blob files. Secure (`0600`) by default.
    #[serde(default = "default_blob_mode")]
    pub blob_mode: u32,
    /// Overrides scheme+host for generated action URLs; when unset, URLs are
    /// derived from the incoming request's `Host`/`X-Forwarded-Proto`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// CLI overrides layered on top of a loaded (or default) `Config`.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
}

impl Config {
    const SEARCH_PATHS: &'static [&'static str] = &["./lfsgate.toml", "/etc/lfsgate/lfsgate.toml"];

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn resolved_token_dir(&self) -> PathBuf {
        self.token_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lfsgate-tokens"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    #[must_use]
    pub fn load_from_search_paths() -> Option<Self> {
        for path_str in Self::SEARCH_PATHS {
            let path = Path::new(path_str);
            if path.exists() {
                if let Ok(config) = Self::load(path) {
                    return Some(config);
                }
            }
        }
        None
    }

    pub fn load_with_overrides(
        config_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::load(path)?
        } else {
            Self::load_from_search_paths().unwrap_or_default()
        };

        if let Some(host) = overrides.host {
            config.host = host;
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }
        if let Some(data_root) = overrides.data_root {
            config.data_root = data_root;
        }
        if overrides.public_base_url.is_some() {
            config.public_base_url = overrides.public_base_url;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_root: default_data_root(),
            token_dir: None,
            token_ttl_seconds: default_ttl_seconds(),
            repositories: Vec::new(),
            oracle_binary: None,
            dir_mode: default_dir_mode(),
            blob_mode: default_blob_mode(),
            public_base_url: None,
            log_filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_priority_over_defaults() {
        let overrides = ConfigOverrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            data_root: Some(PathBuf::from("/srv/lfs")),
            public_base_url: None,
        };
        let config = Config::load_with_overrides(None, overrides).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_root, PathBuf::from("/srv/lfs"));
    }

    #[test]
    fn token_dir_falls_back_to_temp_subdirectory() {
        let config = Config::default();
        assert!(config.resolved_token_dir().ends_with("lfsgate-tokens"));
    }

    #[test]
    fn parses_toml_with_repository_allowlist() {
        let toml_str = r#"
            data_root = "/data"
            repositories = ["org/one", "org/two"]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.repositories, vec!["org/one", "org/two"]);
        assert_eq!(config.token_ttl_seconds, 7200);
        assert_eq!(config.dir_mode, 0o700);
        assert_eq!(config.blob_mode, 0o600);
    }

    #[test]
    fn dir_mode_accepts_octal_literal_from_toml() {
        let toml_str = r#"
            dir_mode = 0o750
            blob_mode = 0o640
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dir_mode, 0o750);
        assert_eq!(config.blob_mode, 0o640);
    }
}
