/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::PathBuf;

use trace_analytics::CompileError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read file: {0}: {1}")]
    ReadFile(PathBuf, std::io::Error),
    #[error("failed to deserialize config: {0}: {1}")]
    DeserializeConfig(PathBuf, serde_yaml::Error),
    #[error("failed to read state: {0}")]
    ReadState(std::io::Error),
    #[error("failed to write state: {0}")]
    WriteState(std::io::Error),
    #[error("failed to deserialize state: {0}")]
    DeserializeState(serde_json::Error),
    #[error("failed to serialize state: {0}")]
    SerializeState(serde_json::Error),
    #[error("failed to serialize output: {0}")]
    Serialize(serde_json::Error),
    #[error("invalid filter: {0}")]
    Compile(#[from] CompileError),
}

#[derive(thiserror::Error, Debug)]
#[error("expected GROUP=MILLISECONDS, got '{0}'")]
pub struct InvalidGroupPercentile(pub String);
