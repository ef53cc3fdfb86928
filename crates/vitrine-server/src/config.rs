//! Environment-driven server configuration and its startup contract.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    /// On-disk root of the `public/` tree served at `/public` and holding
    /// uploaded images.
    pub public_dir: PathBuf,
    pub session_key: String,
    pub activation_key: String,
    /// Prefix the activation token is appended to when building the link
    /// emailed to a registering user.
    pub activation_url_base: String,
    pub smtp_from: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub upload_max_bytes: usize,
    pub max_page_limit: i64,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            db_path: PathBuf::from("vitrine.sqlite"),
            public_dir: PathBuf::from("public"),
            session_key: "vitrine-dev-session-key".to_string(),
            activation_key: "vitrine-dev-activation-key".to_string(),
            activation_url_base: "http://localhost:3000/activation/".to_string(),
            smtp_from: "shop@vitrine.local".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            max_body_bytes: 2 * 1024 * 1024,
            upload_max_bytes: 1024 * 1024,
            max_page_limit: 50,
            log_json: false,
        }
    }
}

/// Rejects configurations the server must not start with.
pub fn validate_startup_config_contract(config: &ServerConfig) -> Result<(), String> {
    if config.bind_addr.trim().is_empty() {
        return Err("bind address must not be empty".to_string());
    }
    if config.session_key.trim().is_empty() {
        return Err("session key must not be empty".to_string());
    }
    if config.activation_key.trim().is_empty() {
        return Err("activation key must not be empty".to_string());
    }
    if config.session_key == config.activation_key {
        return Err("session key and activation key must differ".to_string());
    }
    if config.activation_url_base.trim().is_empty() {
        return Err("activation url base must not be empty".to_string());
    }
    if config.smtp_from.trim().is_empty() {
        return Err("smtp from address must not be empty".to_string());
    }
    if config
        .cors_allowed_origins
        .iter()
        .any(|origin| origin.trim().is_empty())
    {
        return Err("cors allowed origins must not contain empty entries".to_string());
    }
    if config.max_body_bytes == 0 {
        return Err("max body bytes must be greater than zero".to_string());
    }
    if config.upload_max_bytes == 0 {
        return Err("upload limit must be greater than zero".to_string());
    }
    if config.upload_max_bytes > config.max_body_bytes {
        return Err("upload limit must not exceed max body bytes".to_string());
    }
    if config.max_page_limit < 1 {
        return Err("max page limit must be at least 1".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_contract() {
        validate_startup_config_contract(&ServerConfig::default()).expect("default config");
    }

    #[test]
    fn empty_session_key_is_rejected() {
        let config = ServerConfig {
            session_key: "  ".to_string(),
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&config).expect_err("must reject");
        assert!(err.contains("session key"));
    }

    #[test]
    fn shared_token_key_is_rejected() {
        let config = ServerConfig {
            session_key: "same".to_string(),
            activation_key: "same".to_string(),
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&config).expect_err("must reject");
        assert!(err.contains("must differ"));
    }

    #[test]
    fn upload_limit_above_body_limit_is_rejected() {
        let config = ServerConfig {
            max_body_bytes: 1024,
            upload_max_bytes: 2048,
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&config).expect_err("must reject");
        assert!(err.contains("upload limit"));
    }

    #[test]
    fn zero_page_limit_is_rejected() {
        let config = ServerConfig {
            max_page_limit: 0,
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&config).expect_err("must reject");
        assert!(err.contains("page limit"));
    }

    #[test]
    fn empty_cors_origin_entry_is_rejected() {
        let config = ServerConfig {
            cors_allowed_origins: vec!["http://localhost:3000".to_string(), String::new()],
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&config).expect_err("must reject");
        assert!(err.contains("cors"));
    }
}
