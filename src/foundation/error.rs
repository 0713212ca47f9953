pub type DiptychResult<T> = Result<T, DiptychError>;

#[derive(thiserror::Error, Debug)]
pub enum DiptychError {
    #[error("input cardinality error: {0}")]
    InputCardinality(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("missing context error: {0}")]
    MissingContext(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DiptychError {
    pub fn input_cardinality(msg: impl Into<String>) -> Self {
        Self::InputCardinality(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn missing_context(msg: impl Into<String>) -> Self {
        Self::MissingContext(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            DiptychError::input_cardinality("x")
                .to_string()
                .contains("input cardinality error:")
        );
        assert!(DiptychError::decode("x").to_string().contains("decode error:"));
        assert!(
            DiptychError::missing_context("x")
                .to_string()
                .contains("missing context error:")
        );
        assert!(
            DiptychError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(DiptychError::export("x").to_string().contains("export error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = DiptychError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
