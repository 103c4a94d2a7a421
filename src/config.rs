use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// One entry in the backend preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    Local,
    Ephemeral,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(BackendKind::Remote),
            "local" => Ok(BackendKind::Local),
            "ephemeral" | "memory" => Ok(BackendKind::Ephemeral),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Fallback order, highest preference first. Always ends with `Ephemeral`.
    pub backends: Vec<BackendKind>,
    pub snapshot_bucket_name: Option<String>,
    pub snapshot_object_key: String,
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    pub local_store_dir: PathBuf,
    pub local_store_key: String,
    pub default_admin_password: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let backends = parse_backends(
            &lookup("STORE_BACKENDS").unwrap_or_else(|| "remote,local,ephemeral".to_string()),
        )?;

        let snapshot_bucket_name = lookup("SNAPSHOT_BUCKET_NAME").filter(|b| !b.trim().is_empty());
        let snapshot_object_key = lookup("SNAPSHOT_OBJECT_KEY")
            .unwrap_or_else(|| "api/database/emm_database.json".to_string());

        let aws_region = lookup("AWS_DEFAULT_REGION").unwrap_or_else(|| "ca-central-1".to_string());
        let localstack_endpoint = lookup("AWS_ENDPOINT_URL");

        let local_store_dir = PathBuf::from(lookup("LOCAL_STORE_DIR").unwrap_or_else(|| "./.emm".to_string()));
        let local_store_key = lookup("LOCAL_STORE_KEY").unwrap_or_else(|| "emm_sqlite_db".to_string());
        if local_store_key.is_empty() || local_store_key.contains(['/', '\\']) {
            return Err(ConfigError::InvalidVar(
                "LOCAL_STORE_KEY".into(),
                "must be a non-empty name without path separators".into(),
            ));
        }

        let default_admin_password =
            lookup("DEFAULT_ADMIN_PASSWORD").unwrap_or_else(|| "admin".to_string());

        Ok(Config {
            bind_address,
            backends,
            snapshot_bucket_name,
            snapshot_object_key,
            aws_region,
            localstack_endpoint,
            local_store_dir,
            local_store_key,
            default_admin_password,
        })
    }

    /// The remote bucket, or an error naming the variable that is missing.
    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.snapshot_bucket_name
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("SNAPSHOT_BUCKET_NAME".into()))
    }
}

fn parse_backends(raw: &str) -> Result<Vec<BackendKind>, ConfigError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let kind = part
            .parse::<BackendKind>()
            .map_err(|e| ConfigError::InvalidVar("STORE_BACKENDS".into(), e))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    // Ephemeral terminates the chain; anything listed after it is unreachable.
    if let Some(pos) = kinds.iter().position(|k| *k == BackendKind::Ephemeral) {
        kinds.truncate(pos + 1);
    } else {
        kinds.push(BackendKind::Ephemeral);
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_prefer_remote_then_local_then_memory() {
        let config = config_from(&[]).unwrap();
        assert_eq!(
            config.backends,
            vec![BackendKind::Remote, BackendKind::Local, BackendKind::Ephemeral]
        );
        assert_eq!(config.default_admin_password, "admin");
        assert_eq!(config.local_store_key, "emm_sqlite_db");
        assert!(config.snapshot_bucket_name.is_none());
        assert!(config.require_bucket().is_err());
    }

    #[test]
    fn ephemeral_is_appended_when_missing() {
        let config = config_from(&[("STORE_BACKENDS", "local")]).unwrap();
        assert_eq!(config.backends, vec![BackendKind::Local, BackendKind::Ephemeral]);
    }

    #[test]
    fn entries_after_ephemeral_are_dropped() {
        let config = config_from(&[("STORE_BACKENDS", "memory, remote")]).unwrap();
        assert_eq!(config.backends, vec![BackendKind::Ephemeral]);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = config_from(&[("STORE_BACKENDS", "remote,sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar(var, _) if var == "STORE_BACKENDS"));
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        assert!(config_from(&[("BIND_ADDRESS", "nowhere")]).is_err());
    }

    #[test]
    fn store_key_with_separator_is_rejected() {
        assert!(config_from(&[("LOCAL_STORE_KEY", "../escape")]).is_err());
    }
}
