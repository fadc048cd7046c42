use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("document `{id}` has no uid")]
    MissingUid { id: String },
    #[error("document `{id}` could not be decoded: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid timestamp `{value}`")]
    Timestamp { value: String },
}

impl DomainError {
    pub fn missing_uid(id: impl Into<String>) -> Self {
        Self::MissingUid { id: id.into() }
    }

    pub fn decode(id: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            id: id.into(),
            source,
        }
    }

    pub fn timestamp(value: impl Into<String>) -> Self {
        Self::Timestamp {
            value: value.into(),
        }
    }
}
