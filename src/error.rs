pub type VisorResult<T> = Result<T, VisorError>;

#[derive(thiserror::Error, Debug)]
pub enum VisorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("bitmap load error: {0}")]
    BitmapLoad(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VisorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bitmap_load(msg: impl Into<String>) -> Self {
        Self::BitmapLoad(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
