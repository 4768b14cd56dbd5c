use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read static page {}: {source}", .path.display())]
    ReadPage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read error template {}: {source}", .path.display())]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse error template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("failed to read configuration {}: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ParseConfig(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
