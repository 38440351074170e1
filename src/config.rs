use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_SPREADSHEET_PATH: &str = "data/registrations.xlsx";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub spreadsheet_path: PathBuf,
    pub static_dir: PathBuf,
    /// Empty means any origin is accepted.
    pub cors_allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(10);
        let spreadsheet_path = std::env::var("SPREADSHEET_PATH")
            .or_else(|_| std::env::var("EXCEL_FILE_PATH"))
            .unwrap_or_else(|_| DEFAULT_SPREADSHEET_PATH.into());
        let port = std::env::var("APP_PORT")
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()
            .context("APP_PORT must be a port number")?
            .unwrap_or(8080);

        Ok(Self {
            database_url,
            db_max_connections,
            spreadsheet_path: PathBuf::from(spreadsheet_path),
            static_dir: PathBuf::from(
                std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()),
            ),
            cors_allowed_origins: parse_origins(
                &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
