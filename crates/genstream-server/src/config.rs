use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "genstream-server")]
#[command(about = "Streams model generations to chat UIs over the UI message stream protocol")]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8787`.
    #[arg(long, env = "GENSTREAM_LISTEN", default_value = "127.0.0.1:8787")]
    pub listen: String,

    /// Bearer token required on `/api/chat`. Unset disables auth.
    #[arg(long, env = "GENSTREAM_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Provider used when the request names none.
    #[arg(long, env = "GENSTREAM_DEFAULT_PROVIDER", default_value = "openai")]
    pub default_provider: String,

    #[arg(long, env = "GENSTREAM_DEFAULT_MODEL", default_value = "gpt-5-nano")]
    pub default_model: String,

    /// Deadline for one generation, in seconds.
    #[arg(long, env = "GENSTREAM_RUN_TIMEOUT_SECS")]
    pub run_timeout_secs: Option<u64>,

    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "GENSTREAM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
