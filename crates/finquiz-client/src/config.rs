//! Client configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use finquiz_core::context::SessionContext;
use finquiz_core::session::{SessionConfig, SessionServices};

use crate::catalog::HttpCatalogClient;
use crate::oracle::{self, HttpScoringOracle};
use crate::results::HttpResultClient;

/// Where the learning platform lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_url")]
    pub base_url: String,
    #[serde(default = "default_tests_path")]
    pub tests_path: String,
    #[serde(default = "default_points_path")]
    pub points_path: String,
    #[serde(default = "default_points_path")]
    pub submit_path: String,
    #[serde(default = "default_platform_timeout")]
    pub timeout_secs: u64,
}

/// Where the scoring oracle lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default = "default_evaluate_path")]
    pub evaluate_path: String,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

/// Credentials for platform requests.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn default_platform_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_tests_path() -> String {
    "/api/tests-list".to_string()
}
fn default_points_path() -> String {
    "/api/user-points".to_string()
}
fn default_platform_timeout() -> u64 {
    30
}
fn default_oracle_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_evaluate_path() -> String {
    oracle::DEFAULT_EVALUATE_PATH.to_string()
}
fn default_oracle_timeout() -> u64 {
    oracle::DEFAULT_TIMEOUT_SECS
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            tests_path: default_tests_path(),
            points_path: default_points_path(),
            submit_path: default_points_path(),
            timeout_secs: default_platform_timeout(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            evaluate_path: default_evaluate_path(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

/// Top-level finquiz configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinquizConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl FinquizConfig {
    /// The authentication context for platform requests.
    pub fn context(&self) -> SessionContext {
        let context = SessionContext::new(self.auth.user_id.clone());
        match &self.auth.token {
            Some(token) => context.with_token(token.clone()),
            None => context,
        }
    }

    pub fn oracle(&self) -> Result<HttpScoringOracle> {
        HttpScoringOracle::new(
            &self.oracle.base_url,
            &self.oracle.evaluate_path,
            self.oracle.timeout_secs,
        )
        .context("failed to create oracle client")
    }

    pub fn catalog_client(&self) -> Result<HttpCatalogClient> {
        HttpCatalogClient::new(&self.platform, self.context())
            .context("failed to create catalog client")
    }

    pub fn result_client(&self) -> Result<HttpResultClient> {
        HttpResultClient::new(&self.platform, self.context())
            .context("failed to create result client")
    }

    /// Oracle and result sink wired for a session.
    pub fn services(&self) -> Result<SessionServices> {
        Ok(SessionServices {
            oracle: Arc::new(self.oracle()?),
            sink: Arc::new(self.result_client()?),
        })
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_config(config: &mut FinquizConfig) {
    config.platform.base_url = resolve_env_vars(&config.platform.base_url);
    config.oracle.base_url = resolve_env_vars(&config.oracle.base_url);
    config.auth.user_id = resolve_env_vars(&config.auth.user_id);
    config.auth.token = config
        .auth
        .token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.is_empty());
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `finquiz.toml` in the current directory
/// 2. `~/.config/finquiz/config.toml`
///
/// Environment variable overrides: `FINQUIZ_PLATFORM_URL`, `FINQUIZ_ORACLE_URL`,
/// `FINQUIZ_TOKEN`.
pub fn load_config() -> Result<FinquizConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<FinquizConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("finquiz.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => FinquizConfig::default(),
    };

    resolve_config(&mut config);

    // Env var overrides are taken literally
    if let Ok(url) = std::env::var("FINQUIZ_PLATFORM_URL") {
        config.platform.base_url = url;
    }
    if let Ok(url) = std::env::var("FINQUIZ_ORACLE_URL") {
        config.oracle.base_url = url;
    }
    if let Ok(token) = std::env::var("FINQUIZ_TOKEN") {
        config.auth.token = Some(token).filter(|t| !t.is_empty());
    }

    Ok(config)
}

/// Parse a config document without touching the environment.
pub fn parse_config(content: &str) -> Result<FinquizConfig> {
    Ok(toml::from_str::<FinquizConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("finquiz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquiz_core::session::DeadlinePolicy;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_FINQUIZ_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_FINQUIZ_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_FINQUIZ_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_FINQUIZ_TEST_VAR");
    }

    #[test]
    fn resolved_values_are_not_rescanned() {
        std::env::set_var("_FINQUIZ_TEST_LOOP", "${_FINQUIZ_TEST_LOOP}");
        assert_eq!(
            resolve_env_vars("a${_FINQUIZ_TEST_LOOP}b"),
            "a${_FINQUIZ_TEST_LOOP}b"
        );
        std::env::remove_var("_FINQUIZ_TEST_LOOP");

        assert_eq!(resolve_env_vars("${_FINQUIZ_UNSET_VAR}/x/${"), "/x/${");
    }

    #[test]
    fn default_config() {
        let config = FinquizConfig::default();
        assert_eq!(config.platform.tests_path, "/api/tests-list");
        assert_eq!(config.platform.submit_path, "/api/user-points");
        assert_eq!(config.oracle.evaluate_path, "/ask-ai");
        assert_eq!(config.session.deadline, DeadlinePolicy::Soft);
        assert!(config.session.allow_retry_after_failure);
        assert!(!config.context().is_authenticated());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[platform]
base_url = "https://learn.example.com"
timeout_secs = 10

[oracle]
base_url = "https://grader.example.com"
evaluate_path = "/v2/grade"

[session]
deadline = "enforce"
allow_retry_after_failure = false

[auth]
user_id = "42"
token = "secret-token"
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.platform.base_url, "https://learn.example.com");
        assert_eq!(config.platform.points_path, "/api/user-points");
        assert_eq!(config.oracle.evaluate_path, "/v2/grade");
        assert_eq!(config.oracle.timeout_secs, 60);
        assert_eq!(config.session.deadline, DeadlinePolicy::Enforce);
        assert!(!config.session.allow_retry_after_failure);

        let context = config.context();
        assert_eq!(context.user_id, "42");
        assert_eq!(context.bearer().as_deref(), Some("Bearer secret-token"));
    }

    #[test]
    fn debug_masks_token() {
        let config = parse_config("[auth]\nuser_id = \"7\"\ntoken = \"hunter2\"\n").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn load_from_explicit_path_resolves_vars() {
        std::env::set_var("_FINQUIZ_TEST_TOKEN", "from-env");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finquiz.toml");
        std::fs::write(&path, "[auth]\ntoken = \"${_FINQUIZ_TEST_TOKEN}\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.auth.token.as_deref(), Some("from-env"));
        std::env::remove_var("_FINQUIZ_TEST_TOKEN");
    }

    #[test]
    fn empty_resolved_token_is_dropped() {
        let mut config = parse_config("[auth]\ntoken = \"${_FINQUIZ_UNSET_VAR}\"\n").unwrap();
        resolve_config(&mut config);
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn missing_explicit_path_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/finquiz.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn unknown_deadline_policy_fails() {
        assert!(parse_config("[session]\ndeadline = \"sometimes\"\n").is_err());
    }
}
