pub type RenderResult<T> = std::result::Result<T, RenderError>;
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Failure to turn diagram source into a vector image.
///
/// Engine messages are carried verbatim so the host can surface the same text the underlying
/// engine produced (syntax errors especially).
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{message}")]
    Engine { message: String },

    #[error("engine output contained no root <svg> element")]
    MissingSvgRoot,
}

impl RenderError {
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to parse SVG for PNG rendering")]
    SvgParse,
    #[error("failed to allocate pixmap for raster rendering")]
    PixmapAlloc,
    #[error("failed to encode PNG")]
    PngEncode,
}
