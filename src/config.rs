use serde::Deserialize;

use std::path::PathBuf;

/// Portal settings, read from the same figment as Rocket's own configuration
/// (`Rocket.toml` and `ROCKET_*` environment variables).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub database_path: PathBuf,
    pub storage_root: PathBuf,
    pub public_base_url: String,
    /// Base URL of the hosted identity provider's OAuth endpoints.
    pub identity_url: String,
    pub staging_dir: Option<PathBuf>,
    /// Admin routes refuse every request while this is unset.
    pub admin_token: Option<String>,
    pub agency_notify_url: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> PortalConfig {
        PortalConfig {
            database_path: PathBuf::from("portal.db"),
            storage_root: PathBuf::from("storage"),
            public_base_url: "http://localhost:8000".to_string(),
            identity_url: "http://localhost:9999/auth/v1".to_string(),
            staging_dir: None,
            admin_token: None,
            agency_notify_url: None,
        }
    }
}

impl PortalConfig {
    /// Where the signup staging record lives: the configured directory, or the
    /// user's local data directory.
    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.staging_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("portal")))
    }

    pub fn admin_token_matches(&self, token: &str) -> bool {
        match &self.admin_token {
            Some(expected) => !expected.is_empty() && expected == token,
            None => false,
        }
    }
}
