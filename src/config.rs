use serde::Deserialize;

fn default_adk_host() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_name() -> String {
    "agent".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_run_timeout() -> u64 {
    120
}

fn default_session_timeout() -> u64 {
    30
}

fn default_health_timeout() -> u64 {
    5
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Base URL of the ADK backend.
    #[serde(default = "default_adk_host")]
    pub adk_host: String,
    /// Default backend app name, used when the caller's model is empty.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub require_api_key: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Long timeout for conversational run calls.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Short timeout for session create/delete calls.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adk_host: default_adk_host(),
            app_name: default_app_name(),
            port: default_port(),
            require_api_key: false,
            api_keys: Vec::new(),
            run_timeout_secs: default_run_timeout(),
            session_timeout_secs: default_session_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl Settings {
    fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("ADK_HOST") {
            self.adk_host = v;
        }
        if let Ok(v) = std::env::var("ADK_APP_NAME") {
            self.app_name = v;
        }
        if let Some(p) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = p;
        }
        if let Ok(v) = std::env::var("REQUIRE_API_KEY") {
            self.require_api_key = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = std::env::var("API_KEYS") {
            let keys: Vec<String> = v
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if !keys.is_empty() {
                self.api_keys = keys;
            }
        }
        self
    }
}

/// Load settings from a TOML file if present, then layer env overrides on top.
pub async fn load(path: &str) -> anyhow::Result<Settings> {
    let settings = match tokio::fs::read_to_string(path).await {
        Ok(text) => toml::from_str(&text)?,
        Err(_) => {
            tracing::info!("config file {path} not found, using defaults");
            Settings::default()
        }
    };
    Ok(settings.apply_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.adk_host, "http://localhost:8000");
        assert_eq!(s.app_name, "agent");
        assert!(!s.require_api_key);
        assert!(s.run_timeout_secs > s.session_timeout_secs);
        assert!(s.session_timeout_secs > s.health_timeout_secs);
    }

    #[test]
    fn parses_partial_toml() {
        let s: Settings =
            toml::from_str("adk_host = \"http://adk:9000\"\nrequire_api_key = true\n").unwrap();
        assert_eq!(s.adk_host, "http://adk:9000");
        assert!(s.require_api_key);
        assert_eq!(s.port, 8080);
    }
}
