//! Turns the current vector image into downloadable artifacts.
//!
//! Exports never touch the filesystem themselves: each operation produces an [`ExportArtifact`]
//! (bytes + suggested filename + mime type) and the host decides where it lands. A failed export
//! produces no artifact at all.

mod png;
mod svg;

pub use png::export_png;
pub use svg::export_svg;

pub const SVG_MIME: &str = "image/svg+xml";
pub const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// `diagram-<stamp>.<extension>` where `<stamp>` is UTC now as a compact ISO-8601 string:
/// separators stripped, sub-second precision discarded.
pub(crate) fn export_filename(extension: &str) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    format!("diagram-{stamp}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_compact_and_timestamped() {
        let name = export_filename("svg");
        assert!(name.starts_with("diagram-"));
        assert!(name.ends_with(".svg"));

        let stamp = &name["diagram-".len()..name.len() - ".svg".len()];
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "T");
        assert!(stamp[..8].bytes().all(|b| b.is_ascii_digit()));
        assert!(stamp[9..].bytes().all(|b| b.is_ascii_digit()));
    }
}
