//! Error types for the DragonFly harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Dev server failed to start: {0}")]
    ServerStartup(String),

    #[error("Dev server at {url} not ready after {attempts} attempts")]
    ServerNotReady { url: String, attempts: usize },

    #[error("Dev server exited before becoming ready ({0})")]
    ServerExited(String),

    #[error("Browser engine not available. Install with: npx playwright install chromium")]
    BrowserNotFound,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser probe exceeded {0} seconds")]
    BrowserTimeout(u64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;
