mod config;
mod error;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use mcp::{Server, ServerInfo};
use tracing::{debug, info};
use vapi::{CallInitiator, CallTools};

use config::Settings;
use error::Result;

const SETTINGS_FILE: &str = "vapi-mcp.toml";
const DOTENV_FILE: &str = ".env";
const SERVER_NAME: &str = "vapi";
const INSTRUCTIONS: &str = "Use make_call to place an outbound phone call. An AI voice \
    assistant dials phone_number (E.164, e.g. +12345678900) and works toward the given task. \
    The result contains the Vapi call id; the call itself continues after the tool returns.";

#[derive(Parser)]
#[command(name = "vapi-mcp")]
#[command(about = "MCP server for placing AI phone calls through Vapi", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./vapi-mcp.toml when present)
    #[arg(short, long, env = "VAPI_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Env file read for credentials not set in the environment (defaults to ./.env)
    #[arg(long, env = "VAPI_MCP_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    let dotenv = dotenv_vars(cli.env_file.as_deref())?;
    let server = build_server(settings, env_lookup(dotenv))?;

    info!("starting Vapi MCP server on stdio");
    server.serve_stdio().await?;
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Ok(Settings::load(path)?),
        None if Path::new(SETTINGS_FILE).exists() => Ok(Settings::load(SETTINGS_FILE)?),
        None => Ok(Settings::default()),
    }
}

/// Read `KEY=value` pairs from an env file without touching the process environment.
///
/// A missing file is not an error; a malformed one is.
fn dotenv_vars(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let path = path.unwrap_or(Path::new(DOTENV_FILE));
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    let vars = iter.collect::<std::result::Result<HashMap<_, _>, _>>()?;
    debug!(path = %path.display(), count = vars.len(), "loaded env file");
    Ok(vars)
}

/// Variables already in the environment win over the env file.
fn env_lookup(dotenv: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key: &str| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

/// Resolve configuration and register the tool. Fails if credentials are missing.
fn build_server(
    settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Server<CallTools>> {
    let config = settings.apply(vapi::Config::from_lookup(lookup)?);
    info!(
        phone_number_id = %config.phone_number_id,
        base_url = %config.base_url,
        timeout_secs = config.timeout.as_secs(),
        "Vapi tool initialized"
    );

    let initiator = CallInitiator::new(config)?;
    let info = ServerInfo {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Ok(Server::new(info, CallTools::new(initiator)).with_instructions(INSTRUCTIONS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::Error;
    use mcp::ToolHandler;

    fn vars(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn missing_api_key_fails_startup() {
        let result = build_server(
            Settings::default(),
            vars(&[("VAPI_PHONE_NUMBER_ID", "pn-1")]),
        );
        assert!(matches!(
            result,
            Err(Error::Vapi(vapi::Error::MissingEnv("VAPI_API_KEY")))
        ));
    }

    #[test]
    fn missing_phone_number_id_fails_startup() {
        let result = build_server(Settings::default(), vars(&[("VAPI_API_KEY", "key")]));
        assert!(matches!(
            result,
            Err(Error::Vapi(vapi::Error::MissingEnv("VAPI_PHONE_NUMBER_ID")))
        ));
    }

    #[test]
    fn registers_make_call() {
        let server = build_server(
            Settings::default(),
            vars(&[("VAPI_API_KEY", "key"), ("VAPI_PHONE_NUMBER_ID", "pn-1")]),
        )
        .unwrap();
        assert_eq!(server.info().name, "vapi");
        let tools = server.handler().tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, vapi::MAKE_CALL);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["vapi-mcp"]);
        assert_eq!(cli.log_level, "info");
        assert!(cli.env_file.is_none());
    }

    #[test]
    fn env_file_supplies_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# vapi credentials\nVAPI_MCP_TEST_KEY=from-file\nVAPI_MCP_TEST_PN=\"pn-9\"\n",
        )
        .unwrap();

        let vars = dotenv_vars(Some(&path)).unwrap();
        assert_eq!(vars["VAPI_MCP_TEST_KEY"], "from-file");
        assert_eq!(vars["VAPI_MCP_TEST_PN"], "pn-9");

        let server = build_server(Settings::default(), |key| match key {
            "VAPI_API_KEY" => vars.get("VAPI_MCP_TEST_KEY").cloned(),
            "VAPI_PHONE_NUMBER_ID" => vars.get("VAPI_MCP_TEST_PN").cloned(),
            _ => None,
        });
        assert!(server.is_ok());
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = dotenv_vars(Some(&dir.path().join(".env"))).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn malformed_env_file_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "VAPI_API_KEY='unterminated\n").unwrap();
        assert!(matches!(dotenv_vars(Some(&path)), Err(Error::Dotenv(_))));
    }

    #[test]
    fn process_env_wins_over_env_file() {
        // PATH is set in any test environment.
        let path = std::env::var("PATH").unwrap();
        let lookup = env_lookup(HashMap::from([
            ("PATH".to_string(), "from-file".to_string()),
            ("VAPI_MCP_TEST_ONLY_IN_FILE".to_string(), "file".to_string()),
        ]));
        assert_eq!(lookup("PATH").as_deref(), Some(path.as_str()));
        assert_eq!(lookup("VAPI_MCP_TEST_ONLY_IN_FILE").as_deref(), Some("file"));
    }
}
