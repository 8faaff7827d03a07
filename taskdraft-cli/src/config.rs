//! Command line, environment and file configuration.
//!
//! Sources, highest precedence first:
//! - CLI arguments (clap)
//! - Environment variables (clap `env`, seeded from `.env` by dotenv)
//! - The TOML file given by `--config`
//! - Built-in defaults

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use taskdraft_core::orchestrator::GenerationSettings;
use taskdraft_core::registry::ProviderSettings;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://todos.db";
/// `DATABASE_URL` value selecting the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Parser, Debug)]
#[command(name = "taskdraft", version, about = "Turn free text into structured todos")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "taskdraft.toml")]
    pub config: PathBuf,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Database URL, or `memory` for a throwaway store
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "TASKDRAFT_HOST")]
        host: Option<String>,
        #[arg(long, env = "TASKDRAFT_PORT")]
        port: Option<u16>,
        /// Origin allowed by the CORS layer
        #[arg(long, env = "TASKDRAFT_CORS_ORIGIN")]
        cors_origin: Option<String>,
    },
    /// Generate one todo draft and print it as JSON
    Generate { text: String },
    /// List the configured providers in preference order
    Providers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub providers: ProviderSettings,
    pub generation: GenerationSettings,
}

impl FileConfig {
    /// Reads the file at `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).with_context(|| format!("invalid config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub database_url: String,
    pub providers: ProviderSettings,
    pub generation: GenerationSettings,
}

impl AppConfig {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let (host, port, cors_origin) = match &cli.command {
            Some(Command::Serve {
                host,
                port,
                cors_origin,
            }) => (host.clone(), *port, cors_origin.clone()),
            _ => (None, None, None),
        };
        Self {
            host: host
                .or(file.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            cors_origin: cors_origin
                .or(file.server.cors_origin)
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            database_url: cli
                .database_url
                .clone()
                .or(file.database.url)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            providers: file.providers,
            generation: file.generation,
        }
    }

    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        Ok(Self::resolve(cli, FileConfig::load(&cli.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 9000
cors_origin = "https://todo.example"

[database]
url = "sqlite://file.db"

[providers]
openai_model = "gpt-4o-mini"
ollama_base_url = "http://gpu:11434"

[generation]
temperature = 0.1
"#;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["taskdraft"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_every_section() {
        let file = FileConfig::parse(SAMPLE).unwrap();
        assert_eq!(file.server.port, Some(9000));
        assert_eq!(file.database.url.as_deref(), Some("sqlite://file.db"));
        assert_eq!(file.providers.openai_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(file.generation.temperature, 0.1);
        assert_eq!(file.generation.max_tokens, 500);
    }

    #[test]
    fn defaults_apply_without_file() {
        let cfg = AppConfig::resolve(&cli(&["--database-url", "memory"]), FileConfig::default());
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.cors_origin, DEFAULT_CORS_ORIGIN);
        assert_eq!(cfg.database_url, MEMORY_DATABASE);
        assert_eq!(cfg.generation, GenerationSettings::default());
    }

    #[test]
    fn cli_flags_beat_file_values() {
        let file = FileConfig::parse(SAMPLE).unwrap();
        let cfg = AppConfig::resolve(
            &cli(&["--database-url", "sqlite://cli.db", "serve", "--port", "7000"]),
            file,
        );
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.database_url, "sqlite://cli.db");
        assert_eq!(cfg.cors_origin, "https://todo.example");
    }

    #[test]
    fn cors_origin_flag_beats_file_value() {
        let file = FileConfig::parse(SAMPLE).unwrap();
        let cfg = AppConfig::resolve(
            &cli(&["serve", "--cors-origin", "https://app.example"]),
            file,
        );
        assert_eq!(cfg.cors_origin, "https://app.example");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let file = FileConfig::load(Path::new("/nonexistent/taskdraft.toml")).unwrap();
        assert!(file.server.host.is_none());
    }

    #[test]
    fn example_file_matches_defaults() {
        let file = FileConfig::parse(include_str!("../../taskdraft.example.toml")).unwrap();
        let cfg = AppConfig::resolve(&cli(&["--database-url", "memory"]), file);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.cors_origin, DEFAULT_CORS_ORIGIN);
        assert_eq!(cfg.generation, GenerationSettings::default());
        assert_eq!(cfg.providers, ProviderSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(FileConfig::parse("[server]\nport = \"eighty\"").is_err());
    }

    #[test]
    fn generate_subcommand_takes_text() {
        assert_eq!(
            cli(&["generate", "buy milk"]).command,
            Some(Command::Generate {
                text: "buy milk".to_string()
            })
        );
    }
}
