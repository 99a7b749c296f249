/// Configuration management
use crate::error::{Result, SyncError};
use crate::model::UserId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Marketplace origin, e.g. `https://market.example`
    pub base_url: String,

    /// Id of the signed-in user (own echoes are recognised by it)
    pub current_user_id: UserId,

    /// Opaque per-session token sent as the first frame after open
    pub auth_token: String,

    /// Session cookie forwarded on snapshot requests
    pub session_cookie: Option<String>,

    /// CSRF token for mutating snapshot requests
    pub csrf_token: Option<String>,

    /// Fixed delay before a reconnect attempt
    pub reconnect_delay: Duration,

    /// When false the runtime behaves as if streaming sockets were unavailable
    pub push_enabled: bool,

    /// True when the page context is the message view
    pub message_view: bool,

    /// Navigation fragment applied once the conversation list is loaded
    pub initial_fragment: Option<String>,

    /// Page sizes for the three paged snapshot endpoints
    pub conversation_page_size: usize,
    pub message_page_size: usize,
    pub notification_page_size: usize,

    /// Timeout for a single snapshot request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            current_user_id: 0,
            auth_token: String::new(),
            session_cookie: None,
            csrf_token: None,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            push_enabled: true,
            message_view: true,
            initial_fragment: None,
            conversation_page_size: 50,
            message_page_size: 100,
            notification_page_size: 50,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 4 {
            return Err(SyncError::Config(format!(
                "Usage: {} <base_url> <user_id> <auth_token> [--fragment <#list|#conversationN>] [--elsewhere] [--no-push] [--cookie <value>] [--csrf <token>] [--reconnect-ms <n>]",
                args.first().map(String::as_str).unwrap_or("marketsync")
            )));
        }

        let base_url = args[1].trim_end_matches('/').to_string();
        let current_user_id = args[2]
            .parse::<UserId>()
            .map_err(|_| SyncError::Config("User id must be a number".to_string()))?;
        let auth_token = args[3].clone();

        let mut initial_fragment = None;
        let mut message_view = true;
        let mut push_enabled = true;
        let mut session_cookie = None;
        let mut csrf_token = None;
        let mut reconnect_ms: Option<u64> = None;

        let mut i = 4;
        while i < args.len() {
            match args[i].as_str() {
                "--fragment" => {
                    let f = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--fragment requires an argument".to_string())
                    })?;
                    initial_fragment = Some(f.clone());
                    i += 2;
                }
                "--elsewhere" => {
                    message_view = false;
                    i += 1;
                }
                "--no-push" => {
                    push_enabled = false;
                    i += 1;
                }
                "--cookie" => {
                    let c = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--cookie requires a value".to_string())
                    })?;
                    session_cookie = Some(c.clone());
                    i += 2;
                }
                "--csrf" => {
                    let t = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--csrf requires a token".to_string())
                    })?;
                    csrf_token = Some(t.clone());
                    i += 2;
                }
                "--reconnect-ms" => {
                    let ms = args.get(i + 1).ok_or_else(|| {
                        SyncError::Config("--reconnect-ms requires a number".to_string())
                    })?;
                    reconnect_ms = Some(ms.parse::<u64>().map_err(|_| {
                        SyncError::Config("--reconnect-ms must be a valid number".to_string())
                    })?);
                    i += 2;
                }
                other => {
                    return Err(SyncError::Config(format!("Unknown argument: {}", other)));
                }
            }
        }

        // Env overrides
        if let Ok(c) = std::env::var("MARKETSYNC_COOKIE") {
            session_cookie = Some(c);
        }
        if let Ok(t) = std::env::var("MARKETSYNC_CSRF") {
            csrf_token = Some(t);
        }
        if let Some(ms) = std::env::var("MARKETSYNC_RECONNECT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            reconnect_ms = Some(ms);
        }
        if std::env::var("MARKETSYNC_NO_PUSH").is_ok() {
            push_enabled = false;
        }

        Ok(Self {
            base_url,
            current_user_id,
            auth_token,
            session_cookie,
            csrf_token,
            reconnect_delay: Duration::from_millis(
                reconnect_ms.unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
            ),
            push_enabled,
            message_view,
            initial_fragment,
            ..Default::default()
        })
    }

    /// Socket URL derived from the base URL, or `None` when streaming is unavailable.
    pub fn stream_url(&self) -> Option<String> {
        if !self.push_enabled {
            return None;
        }
        let (scheme, rest) = self.base_url.split_once("://")?;
        let ws_scheme = match scheme {
            "https" => "wss",
            "http" => "ws",
            "wss" | "ws" => scheme,
            _ => return None,
        };
        let host = rest.split('/').next().filter(|h| !h.is_empty())?;
        Some(format!("{}://{}/ws/", ws_scheme, host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_args_with_flags() {
        let config = Config::from_args(&args(&[
            "marketsync",
            "https://market.example/",
            "42",
            "sid~secret~agent",
            "--fragment",
            "#conversation7",
            "--reconnect-ms",
            "250",
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://market.example");
        assert_eq!(config.current_user_id, 42);
        assert_eq!(config.initial_fragment.as_deref(), Some("#conversation7"));
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert!(config.message_view);
    }

    #[test]
    fn test_missing_positionals() {
        assert!(Config::from_args(&args(&["marketsync", "http://x"])).is_err());
    }

    #[test]
    fn test_stream_url() {
        let mut config = Config {
            base_url: "https://market.example:8443/some/page".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.stream_url().as_deref(),
            Some("wss://market.example:8443/ws/")
        );

        config.base_url = "http://localhost:8080".to_string();
        assert_eq!(config.stream_url().as_deref(), Some("ws://localhost:8080/ws/"));

        config.base_url = "ftp://localhost".to_string();
        assert_eq!(config.stream_url(), None);

        config.base_url = "http://localhost".to_string();
        config.push_enabled = false;
        assert_eq!(config.stream_url(), None);
    }
}
