use crate::dispatch::BridgeSettings;
use crate::llm::{LlmProtocol, LlmSettings};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// MCP endpoint of the tool host
    #[arg(long, env = "MCP_URL")]
    pub mcp_url: Option<String>,

    /// Enable tool use
    #[arg(long, env = "MCP_ENABLED", value_parser = clap::builder::BoolishValueParser::new())]
    pub mcp_enabled: Option<bool>,

    /// Base URL of the model host
    #[arg(long, env = "OLLAMA_HOST")]
    pub llm_url: Option<String>,

    /// Model used for tool selection
    #[arg(long, env = "OLLAMA_MODEL")]
    pub model: Option<String>,

    /// API key for OpenAI-compatible hosts
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mcp: McpConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub static_dir: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct McpConfig {
    pub enabled: bool,
    pub url: String,
    pub cache_ttl_secs: u64,
    /// Bound for one transport attempt and for one session operation.
    pub timeout_secs: u64,
    /// Bound for a whole connect, across every transport attempt.
    pub connect_deadline_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub protocol: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("protocol", &self.protocol)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Priority: CLI flag > CLI env var > `TOOLBRIDGE_*` env > config file > defaults.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9000)?
            .set_default("server.static_dir", "static")?
            .set_default("server.request_timeout_secs", 150)?
            .set_default("mcp.enabled", true)?
            .set_default("mcp.url", "http://zabbix-mcp:8000/mcp")?
            .set_default("mcp.cache_ttl_secs", 300)?
            .set_default("mcp.timeout_secs", 10)?
            .set_default("mcp.connect_deadline_secs", 20)?
            .set_default("llm.base_url", "http://ollama:11434")?
            .set_default("llm.model", "qwen2.5:3b-instruct")?
            .set_default("llm.protocol", "auto")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.timeout_secs", 60)?;

        match &cli.config {
            Some(path) => {
                builder = builder.add_source(File::from(Path::new(path)).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)));
            }
            None => {}
        }

        // e.g. TOOLBRIDGE_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("TOOLBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.mcp_url {
            builder = builder.set_override("mcp.url", url)?;
        }
        if let Some(enabled) = cli.mcp_enabled {
            builder = builder.set_override("mcp.enabled", enabled)?;
        }
        if let Some(url) = cli.llm_url {
            builder = builder.set_override("llm.base_url", url)?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("llm.model", model)?;
        }
        if let Some(key) = cli.llm_api_key.filter(|k| !k.trim().is_empty()) {
            builder = builder.set_override("llm.api_key", key)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: String| Err(config::ConfigError::Message(msg));

        if self.server.port == 0 {
            return invalid("server.port must be non-zero".to_string());
        }
        for (key, value) in [("mcp.url", &self.mcp.url), ("llm.base_url", &self.llm.base_url)] {
            if value.trim().is_empty() {
                return invalid(format!("{key} cannot be empty"));
            }
            if let Err(e) = url::Url::parse(value) {
                return invalid(format!("{key} is not a valid URL ({value}): {e}"));
            }
        }
        if self.llm.model.trim().is_empty() {
            return invalid("llm.model cannot be empty".to_string());
        }
        if self.llm.temperature.is_nan() || self.llm.temperature < 0.0 {
            return invalid(format!(
                "llm.temperature must be >= 0, got {}",
                self.llm.temperature
            ));
        }
        if let Err(e) = self.llm.protocol.parse::<LlmProtocol>() {
            return invalid(format!("llm.protocol: {e}"));
        }
        for (key, secs) in [
            ("mcp.timeout_secs", self.mcp.timeout_secs),
            ("mcp.connect_deadline_secs", self.mcp.connect_deadline_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ] {
            if secs == 0 {
                return invalid(format!("{key} must be non-zero"));
            }
        }
        // the timeout middleware must never fire before the bridge can answer
        let budget = self.chat_budget();
        if self.request_timeout() <= budget {
            return invalid(format!(
                "server.request_timeout_secs ({}) must exceed the worst-case chat time of {}s \
                 (2 x (mcp.connect_deadline_secs + mcp.timeout_secs) + llm.timeout_secs)",
                self.server.request_timeout_secs,
                budget.as_secs()
            ));
        }
        Ok(())
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self.llm.base_url.trim_end_matches('/').to_string(),
            api_key: self.llm.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.llm.model.clone(),
            protocol: self.llm.protocol.parse().unwrap_or_default(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            tools_enabled: self.mcp.enabled,
            temperature: self.llm.temperature,
            model_timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }

    pub fn mcp_timeout(&self) -> Duration {
        Duration::from_secs(self.mcp.timeout_secs)
    }

    pub fn mcp_connect_deadline(&self) -> Duration {
        Duration::from_secs(self.mcp.connect_deadline_secs)
    }

    /// Longest a chat request can take inside the bridge: a catalog fetch, a
    /// model call and an invocation, each session costing at most one connect
    /// deadline plus one operation timeout.
    pub fn chat_budget(&self) -> Duration {
        let session = self.mcp_connect_deadline() + self.mcp_timeout();
        session * 2 + Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.mcp.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
