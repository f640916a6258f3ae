//! Client configuration

use std::time::Duration;

use crate::transport::ReconnectPolicy;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("server URL must start with http:// or https://, got {0:?}")]
    InvalidServerUrl(String),

    #[error("websocket path must start with '/', got {0:?}")]
    InvalidWsPath(String),

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("zoom limits out of order: min {min} > max {max}")]
    ZoomRange { min: f64, max: f64 },
}

/// Everything the client needs to reach the server and lay out the board
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the game server (`http://host:port`)
    pub server_url: String,
    pub ws_path: String,
    pub reconnect: ReconnectPolicy,
    pub keepalive: Duration,
    /// Window in which a second "next turn" activation confirms the first
    pub confirm_window: Duration,
    pub hex_size: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7000".to_string(),
            ws_path: "/ws".to_string(),
            reconnect: ReconnectPolicy::default(),
            keepalive: Duration::from_secs(25),
            confirm_window: Duration::from_millis(1500),
            hex_size: 24.0,
            canvas_width: 1024.0,
            canvas_height: 768.0,
            min_zoom: 0.25,
            max_zoom: 4.0,
        }
    }
}

impl ClientConfig {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = interval;
        self
    }

    pub fn with_confirm_window(mut self, window: Duration) -> Self {
        self.confirm_window = window;
        self
    }

    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    pub fn with_hex_size(mut self, size: f64) -> Self {
        self.hex_size = size;
        self
    }

    /// Base URL without a trailing slash
    pub fn http_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Websocket endpoint derived from the base URL
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        let base = self.http_base();
        let rest = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ConfigError::InvalidServerUrl(self.server_url.clone()));
        };
        Ok(format!("{}{}", rest, self.ws_path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ws_url()?;
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidWsPath(self.ws_path.clone()));
        }

        let positives = [
            ("hex_size", self.hex_size),
            ("canvas_width", self.canvas_width),
            ("canvas_height", self.canvas_height),
            ("min_zoom", self.min_zoom),
        ];
        for (field, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field });
            }
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::ZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }

        let durations = [
            ("keepalive", self.keepalive),
            ("confirm_window", self.confirm_window),
            ("reconnect.base_delay", self.reconnect.base_delay),
            ("reconnect.max_delay", self.reconnect.max_delay),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::NotPositive { field });
            }
        }
        Ok(())
    }
}
