use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::OnappError;

pub const CONFIG_FILE_NAME: &str = ".onapp.toml";

/// Credentials and endpoint for the dashboard, from `~/.onapp.toml` with
/// environment variables taking precedence.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    /// DNS-resolvable hostname of the dashboard server, optionally with a
    /// scheme (`dashboard.example.org` or `https://dashboard.example.org`).
    pub server: String,
    /// API user, generally the account's email address.
    pub api_user: String,
    pub api_key: String,
}

/// Default config location in the invoking user's home directory.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(CONFIG_FILE_NAME)
}

/// Load the config file, apply environment overrides, and validate.
///
/// When `path` is `None` the default location is used and its absence is
/// fine (the environment may carry everything). An explicitly passed path
/// must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, OnappError> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_path);

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path).map_err(|source| OnappError::ConfigLoad {
            path: path.display().to_string(),
            source,
        })?;
        facet_toml::from_str(&contents).map_err(|e| OnappError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
    } else if explicit {
        return Err(OnappError::ConfigLoad {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    } else {
        Config::default()
    };

    config.override_from_env(|key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

impl Config {
    /// Environment variables beat the file. The getter is injected so tests
    /// don't touch the process environment.
    pub fn override_from_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(host) = get("ONAPP_HOST") {
            self.server = host;
        }
        if let Some(user) = get("ONAPP_USER") {
            self.api_user = user;
        }
        if let Some(password) = get("ONAPP_PASSWORD") {
            self.api_key = password;
        }
    }
}

fn validate_config(config: &Config) -> Result<(), OnappError> {
    let missing = [
        (config.server.is_empty(), "server"),
        (config.api_user.is_empty(), "api_user"),
        (config.api_key.is_empty(), "api_key"),
    ]
    .into_iter()
    .filter(|(empty, _)| *empty)
    .map(|(_, name)| name)
    .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OnappError::Validation {
            message: format!(
                "not configured: missing {} (set them in ~/{CONFIG_FILE_NAME} or via \
                 ONAPP_HOST/ONAPP_USER/ONAPP_PASSWORD)",
                missing.join(", ")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
server = "dashboard.example.org"
api_user = "user@example.org"
api_key = "1234"
"#;
        let config: Config = facet_toml::from_str(toml).unwrap();
        assert_eq!(config.server, "dashboard.example.org");
        assert_eq!(config.api_user, "user@example.org");
        assert_eq!(config.api_key, "1234");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn incomplete_config_rejected() {
        let config: Config = facet_toml::from_str("server = \"dashboard.example.org\"").unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("api_user"));
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config {
            server: "from-file.example.org".into(),
            api_user: "file-user".into(),
            api_key: "file-key".into(),
        };
        config.override_from_env(|key| match key {
            "ONAPP_HOST" => Some("from-env.example.org".into()),
            "ONAPP_PASSWORD" => Some("env-key".into()),
            _ => None,
        });
        assert_eq!(config.server, "from-env.example.org");
        assert_eq!(config.api_user, "file-user"); // untouched
        assert_eq!(config.api_key, "env-key");
    }

    #[test]
    fn env_alone_is_enough() {
        let mut config = Config::default();
        config.override_from_env(|key| match key {
            "ONAPP_HOST" => Some("dashboard.example.org".into()),
            "ONAPP_USER" => Some("user@example.org".into()),
            "ONAPP_PASSWORD" => Some("1234".into()),
            _ => None,
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_env_leaves_config_empty() {
        let mut config = Config::default();
        config.override_from_env(no_env);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn explicit_missing_path_errors() {
        let err = load_config(Some(Path::new("/nonexistent/onapp.toml"))).unwrap_err();
        assert!(matches!(err, OnappError::ConfigLoad { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onapp.toml");
        std::fs::write(
            &path,
            "server = \"dashboard.example.org\"\napi_user = \"u@example.org\"\napi_key = \"k\"\n",
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server, "dashboard.example.org");
    }
}
