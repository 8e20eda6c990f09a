//! Error types
//!
//! Nothing here is fatal to the simulation: every failure degrades to
//! "skip the optional effect, keep simulating".

/// Errors loading or saving [`Settings`](crate::Settings).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("failed to read settings file: {0}")]
    Read(#[source] std::io::Error),

    /// Failed to write the settings file.
    #[error("failed to write settings file: {0}")]
    Write(#[source] std::io::Error),

    /// Settings file is not valid JSON for [`Settings`](crate::Settings).
    #[error("failed to parse settings: {0}")]
    Parse(#[source] serde_json::Error),

    /// Settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors producing the surface color texture.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to read texture: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to decode texture: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoded image has zero width or height.
    #[error("texture is empty")]
    Empty,

    /// The decode worker exited without delivering a result.
    #[error("texture decode worker disconnected")]
    WorkerGone,
}

/// Errors from the remote impact-estimate service.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error("estimate transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("estimate service returned {status}{}", upstream_suffix(.message))]
    Upstream {
        status: u16,
        message: Option<String>,
    },

    #[error("estimate response decode error: {0}")]
    Decode(#[source] reqwest::Error),

    /// The estimate worker is not running.
    #[error("estimate service unavailable")]
    Unavailable,
}

fn upstream_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}
