use serde::Deserialize;

/// Top-level server configuration, loaded from `terrace.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
    pub communities: Vec<CommunityConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
            communities: Vec::new(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// HMAC secret for credential signatures. None = unsigned credentials
    /// are accepted (development mode).
    pub token_secret: Option<String>,
    /// How long a connection may remain unauthenticated before it is closed.
    pub handshake_timeout_secs: u64,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            handshake_timeout_secs: 10,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub connection_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Maximum chat message body length in characters.
    pub max_body_chars: usize,
    /// Retained messages per room before oldest are evicted.
    pub max_stored_messages: usize,
    /// Upper bound on the `limit` query parameter for history reads.
    pub history_page_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            connection_message_buffer: 256,
            ws_rate_limit_per_sec: 50.0,
            max_body_chars: 1024,
            max_stored_messages: 10_000,
            history_page_limit: 100,
        }
    }
}

/// One community known to the membership directory.
#[derive(Debug, Clone, Deserialize)]
pub struct CommunityConfig {
    pub id: String,
    /// Open communities admit any authenticated user.
    #[serde(default)]
    pub open: bool,
    /// User ids admitted to a closed community.
    #[serde(default)]
    pub members: Vec<u64>,
}

impl ServerConfig {
    /// Validate configuration, logging warnings for issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.auth.token_secret.is_some() {
            tracing::warn!(
                "token_secret is set in config file — use TERRACE_TOKEN_SECRET env var in production"
            );
        }
        if self.auth.token_secret.is_none() {
            tracing::warn!("No token_secret configured — unsigned credentials will be accepted");
        }
        if self.auth.handshake_timeout_secs == 0 {
            tracing::error!("auth.handshake_timeout_secs must be > 0");
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.connection_message_buffer == 0 {
            tracing::error!("limits.connection_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_body_chars == 0 {
            tracing::error!("limits.max_body_chars must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_stored_messages == 0 {
            tracing::error!("limits.max_stored_messages must be > 0");
            std::process::exit(1);
        }
        if self.limits.history_page_limit == 0 {
            tracing::error!("limits.history_page_limit must be > 0");
            std::process::exit(1);
        }

        for community in &self.communities {
            if !terrace_core::room::is_valid_room_id(&community.id) {
                tracing::error!(id = %community.id, "Invalid community id in config");
                std::process::exit(1);
            }
        }
    }

    /// Load config from `terrace.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("terrace.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from terrace.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse terrace.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No terrace.toml found, using defaults");
                ServerConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(addr) = std::env::var("TERRACE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(secret) = std::env::var("TERRACE_TOKEN_SECRET")
            && !secret.is_empty()
        {
            config.auth.token_secret = Some(secret);
        }
        if let Ok(val) = std::env::var("TERRACE_HANDSHAKE_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.auth.handshake_timeout_secs = n;
        }
        if let Ok(val) = std::env::var("TERRACE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("TERRACE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("TERRACE_MAX_STORED_MESSAGES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_stored_messages = n;
        }

        config
    }
}
