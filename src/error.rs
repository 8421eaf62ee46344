pub type SynapseResult<T> = Result<T, SynapseError>;

#[derive(thiserror::Error, Debug)]
pub enum SynapseError {
    #[error("color error: {0}")]
    Color(String),

    #[error("options error: {0}")]
    Options(#[from] serde_json::Error),

    #[error("drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),
}

impl SynapseError {
    pub fn color(msg: impl Into<String>) -> Self {
        Self::Color(msg.into())
    }

    pub fn surface_unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(SynapseError::color("x").to_string().contains("color error:"));
        assert!(
            SynapseError::surface_unavailable("x")
                .to_string()
                .contains("drawing surface unavailable:")
        );

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(SynapseError::from(json_err).to_string().contains("options error:"));
    }
}
