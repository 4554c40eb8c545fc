use std::{fs, path::Path};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// User-provided config files may set any subset of fields.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub db_url: Option<String>,
    pub log_level: Option<String>,
}

impl PartialConfig {
    fn merge_into(self, final_config: &mut FinalConfig) {
        if let Some(host) = self.host {
            final_config.host = host;
        }
        if let Some(port) = self.port {
            final_config.port = port;
        }
        if let Some(token) = self.token {
            final_config.token = token;
        }
        if let Some(db_url) = self.db_url {
            final_config.db_url = db_url;
        }
        if let Some(log_level) = self.log_level {
            final_config.log_level = log_level;
        }
    }
}

// The fully resolved configuration used by the application.
#[derive(Debug, Deserialize, Serialize)]
pub struct FinalConfig {
    pub host: String,
    pub port: u16,
    /// Bearer / x-api-key token gating both the client and admin APIs.
    /// Empty means authentication is disabled.
    pub token: String,
    pub db_url: String,
    pub log_level: String,
}

fn get_env_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn get_config_from_env() -> PartialConfig {
    PartialConfig {
        host: get_env_var("HOST"),
        port: get_env_var("PORT"),
        token: get_env_var("TOKEN"),
        db_url: get_env_var("DB_URL"),
        log_level: get_env_var("LOG_LEVEL"),
    }
}

pub static CONFIG: Lazy<FinalConfig> = Lazy::new(|| {
    let mut final_config = FinalConfig {
        host: "0.0.0.0".to_string(),
        port: 7070,
        token: String::new(),
        db_url: "./storage/modelmux.db".to_string(),
        log_level: "info".to_string(),
    };

    // File overrides defaults, environment overrides both.
    let user_config_path = Path::new("config.yaml");
    if user_config_path.exists() {
        if let Ok(config_str) = fs::read_to_string(user_config_path) {
            let user_config: PartialConfig = serde_yaml::from_str(&config_str).unwrap_or_else(|e| {
                panic!(
                    "failed to parse configuration file at {:?}: {}",
                    user_config_path, e
                )
            });
            user_config.merge_into(&mut final_config);
        }
    }

    get_config_from_env().merge_into(&mut final_config);

    final_config
});
