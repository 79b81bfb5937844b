use serial_test::serial;
use std::env;
use std::fs;
use std::io::Write;
use toolbridge::config::AppConfig;
use toolbridge::llm::LlmProtocol;

const VARS: &[&str] = &[
    "CONFIG_FILE",
    "PORT",
    "MCP_URL",
    "MCP_ENABLED",
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
    "LLM_API_KEY",
    "TOOLBRIDGE_SERVER__PORT",
    "TOOLBRIDGE_SERVER__REQUEST_TIMEOUT_SECS",
    "TOOLBRIDGE_MCP__URL",
    "TOOLBRIDGE_MCP__ENABLED",
    "TOOLBRIDGE_MCP__CACHE_TTL_SECS",
    "TOOLBRIDGE_LLM__MODEL",
    "TOOLBRIDGE_LLM__TEMPERATURE",
];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn load(args: &[&str]) -> Result<AppConfig, config::ConfigError> {
    let mut argv = vec!["toolbridge"];
    argv.extend_from_slice(args);
    AppConfig::load_from_args(argv)
}

fn yaml_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    file
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load(&[]).expect("defaults should load");

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.static_dir, "static");
    assert!(config.mcp.enabled);
    assert_eq!(config.mcp.url, "http://zabbix-mcp:8000/mcp");
    assert_eq!(config.mcp.cache_ttl_secs, 300);
    assert_eq!(config.llm.base_url, "http://ollama:11434");
    assert_eq!(config.llm.model, "qwen2.5:3b-instruct");
    assert!(config.llm.api_key.is_none());

    assert!(config.chat_budget() < config.request_timeout());

    let settings = config.llm_settings();
    assert_eq!(settings.protocol, LlmProtocol::Auto);
    assert_eq!(config.bridge_settings().temperature, 0.0);
}

#[test]
#[serial]
fn test_prefixed_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("TOOLBRIDGE_SERVER__PORT", "9090");
        env::set_var("TOOLBRIDGE_MCP__CACHE_TTL_SECS", "60");
        env::set_var("TOOLBRIDGE_LLM__MODEL", "llama3.1:8b");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.mcp.cache_ttl_secs, 60);
    assert_eq!(config.llm.model, "llama3.1:8b");

    clear_env_vars();
}

#[test]
#[serial]
fn test_legacy_env_vars() {
    clear_env_vars();
    unsafe {
        env::set_var("MCP_URL", "http://tools.internal:8000/mcp");
        env::set_var("MCP_ENABLED", "0");
        env::set_var("OLLAMA_HOST", "http://gpu-box:11434");
        env::set_var("OLLAMA_MODEL", "qwen2.5:7b-instruct");
        env::set_var("PORT", "8088");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.mcp.url, "http://tools.internal:8000/mcp");
    assert!(!config.mcp.enabled);
    assert!(!config.bridge_settings().tools_enabled);
    assert_eq!(config.llm.base_url, "http://gpu-box:11434");
    assert_eq!(config.llm.model, "qwen2.5:7b-instruct");
    assert_eq!(config.server.port, 8088);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("TOOLBRIDGE_SERVER__PORT", "9090");
    }

    let config = load(&["--port", "7171", "--model", "phi3"]).expect("Failed to load config");
    assert_eq!(config.server.port, 7171);
    assert_eq!(config.llm.model, "phi3");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let file = yaml_file(
        r#"
server:
  port: 7070
mcp:
  url: "http://file-host:8000/mcp"
llm:
  protocol: chat
  api_key: "sk-test"
"#,
    );

    let path = file.path().to_str().unwrap();
    let config = load(&["--config", path]).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.mcp.url, "http://file-host:8000/mcp");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm_settings().protocol, LlmProtocol::Chat);
    // untouched keys keep their defaults
    assert_eq!(config.mcp.timeout_secs, 10);
    assert_eq!(config.mcp.connect_deadline_secs, 20);
}

#[test]
#[serial]
fn test_env_beats_file() {
    clear_env_vars();

    let file = yaml_file("server:\n  port: 7070\n");
    unsafe {
        env::set_var("CONFIG_FILE", file.path());
        env::set_var("TOOLBRIDGE_SERVER__PORT", "9191");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.port, 9191);

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_config_file_is_an_error() {
    clear_env_vars();

    let result = load(&["--config", "/nonexistent/toolbridge.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    clear_env_vars();

    assert!(load(&["--port", "0"]).is_err());
    assert!(load(&["--mcp-url", ""]).is_err());
    assert!(load(&["--mcp-url", "not a url"]).is_err());

    unsafe {
        env::set_var("TOOLBRIDGE_LLM__TEMPERATURE", "-0.5");
    }
    let err = load(&[]).unwrap_err();
    assert!(err.to_string().contains("temperature"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "config.yaml";
    if fs::metadata(cwd_path).is_ok() {
        // never clobber a real config in the checkout
        return;
    }
    fs::write(cwd_path, "server:\n  port: 6060\n").expect("Failed to write ./config.yaml");

    let result = load(&[]);
    fs::remove_file(cwd_path).unwrap();

    assert_eq!(result.expect("Failed to load config").server.port, 6060);
}

#[test]
#[serial]
fn test_request_timeout_must_cover_chat_budget() {
    clear_env_vars();
    unsafe {
        env::set_var("TOOLBRIDGE_SERVER__REQUEST_TIMEOUT_SECS", "120");
    }

    let err = load(&[]).unwrap_err();
    assert!(err.to_string().contains("request_timeout_secs"));

    clear_env_vars();
}
