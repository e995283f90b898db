use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file given by NICFLOW_CONFIG does not exist: {0}")]
    ConfigFileNotFound(String),

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("API token not set; export {0}")]
    MissingToken(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
