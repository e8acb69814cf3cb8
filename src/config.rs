use std::path::PathBuf;

use clap::Args;
use mindful_core::{CoreResult, Database};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// SQLite database file (defaults to the platform data directory)
    #[arg(long, env = "MINDFUL_DATABASE")]
    pub database: Option<PathBuf>,
}

impl DatabaseArgs {
    /// Open the configured database and bring its schema up to date.
    pub fn open(&self) -> CoreResult<Database> {
        let db = match &self.database {
            Some(path) => Database::open(path)?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn describe(&self) -> String {
        match &self.database {
            Some(path) => path.display().to_string(),
            None => mindful_core::db::default_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "<default>".to_string()),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP API to
    #[arg(long, env = "MINDFUL_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port for the HTTP API
    #[arg(short, long, env = "MINDFUL_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

impl ServeArgs {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Base URL of a running server, derived from the same host and port settings.
pub fn server_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}
