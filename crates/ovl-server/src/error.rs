use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] ovl_store::StoreError),

    #[error("origin client error: {0}")]
    Origin(#[from] reqwest::Error),

    #[error("request body error: {0}")]
    Body(#[from] axum::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
