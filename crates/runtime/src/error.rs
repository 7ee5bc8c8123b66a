use crate::model::ModelError;
use crate::schema::SchemaError;
use crate::tools::ToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("inference error: {0}")]
    Model(#[from] ModelError),

    #[error("tool host error: {0}")]
    Tool(#[from] ToolError),

    #[error("model response contained no text")]
    EmptyResponse,

    #[error("model still requested tools after {0} rounds")]
    ToolRoundsExhausted(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
