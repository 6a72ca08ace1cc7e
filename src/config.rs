use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://community-forum-backend.netlify.app/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_TIMEOUT_SECS: u64 = 60;

/// Client settings, usually derived from env.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub session_dir: PathBuf,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_dir: PathBuf::from(".forum-session"),
            user_agent: format!("forum-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_env() -> Self {
        fn string_env(name: &str) -> Option<String> { std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) }
        fn secs_env(name: &str, default: u64) -> u64 { string_env(name).and_then(|v| v.parse().ok()).unwrap_or(default) }
        let mut cfg = Self::new(string_env("FORUM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()));
        cfg.timeout = Duration::from_secs(secs_env("FORUM_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).clamp(1, MAX_TIMEOUT_SECS));
        if let Some(dir) = string_env("FORUM_SESSION_DIR") { cfg.session_dir = PathBuf::from(dir); }
        if let Some(ua) = string_env("FORUM_USER_AGENT") { cfg.user_agent = ua; }
        cfg
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn from_env_clamps_timeout_and_trims_url() {
        std::env::set_var("FORUM_API_URL", "http://localhost:9000/api/");
        std::env::set_var("FORUM_HTTP_TIMEOUT_SECS", "600");
        std::env::remove_var("FORUM_SESSION_DIR");
        let cfg = ClientConfig::from_env();
        assert_eq!(cfg.base_url, "http://localhost:9000/api");
        assert_eq!(cfg.timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
        assert_eq!(cfg.session_dir, PathBuf::from(".forum-session"));
        std::env::remove_var("FORUM_API_URL");
        std::env::remove_var("FORUM_HTTP_TIMEOUT_SECS");
    }

    #[test]
    #[serial_test::serial]
    fn defaults_without_env() {
        std::env::remove_var("FORUM_API_URL");
        std::env::remove_var("FORUM_HTTP_TIMEOUT_SECS");
        let cfg = ClientConfig::from_env();
        assert_eq!(cfg.base_url, DEFAULT_API_URL);
        assert_eq!(cfg.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
