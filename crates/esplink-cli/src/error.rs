use esplink_client::{ClientError, RegistryFull};
use thiserror::Error;

/// Errors reported by the `esplink` tool.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Registry(#[from] RegistryFull),

    #[error("module did not answer sync after {attempts} attempts")]
    SyncFailed { attempts: u32 },

    #[error("no reply to {0}")]
    NoReply(&'static str),

    #[error("{0} sends no response")]
    NoResponseExpected(&'static str),

    #[error("unknown command {name} (known: {known})")]
    UnknownCommand { name: String, known: String },

    #[error("{command}: cannot parse argument {index} ({value:?})")]
    InvalidArgument {
        command: &'static str,
        index: usize,
        value: String,
    },

    #[error("{0}: callback arguments cannot be given on the command line")]
    CallbackArgument(&'static str),
}
