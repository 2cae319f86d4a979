use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use uuid::Uuid;

/// Runtime configuration for the local client service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub user_id: String,
    pub build_id: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw:?}"))?,
            None => 8080,
        };
        let data_dir = lookup("AGORA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/agora"));
        let user_id = lookup("AGORA_USER_ID").context("AGORA_USER_ID must be set")?;
        if user_id.trim().is_empty() {
            bail!("AGORA_USER_ID must not be empty");
        }
        let build_id = lookup("AGORA_BUILD_ID").unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            host,
            port,
            data_dir,
            user_id,
            build_id,
        })
    }
}
