//! Error types for the photo-watermark crate.

/// Errors that can occur while loading, rendering, exporting or persisting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A settings or template file could not be (de)serialized.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A color string is not `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// A template does not exist or cannot be stored under the given name.
    #[error("template error: {0}")]
    Template(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("webp".to_string());
        assert!(unsupported.to_string().contains("webp"));

        let color = Error::InvalidColor("#12".to_string());
        assert_eq!(color.to_string(), "invalid color: \"#12\"");

        let template = Error::Template("no template named T1".to_string());
        assert!(template.to_string().contains("T1"));
    }

    #[test]
    fn json_errors_convert() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
