use super::{ExportArtifact, SVG_MIME, export_filename};
use crate::image::VectorImage;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const GENERATOR_COMMENT: &str = "<!-- Generated by selkie diagram preview -->\n";

/// Serializes the image into a standalone SVG document.
pub fn export_svg(image: &VectorImage) -> ExportArtifact {
    let markup = image.svg();
    let mut doc =
        String::with_capacity(XML_DECLARATION.len() + GENERATOR_COMMENT.len() + markup.len());
    doc.push_str(XML_DECLARATION);
    doc.push_str(GENERATOR_COMMENT);
    doc.push_str(markup);

    ExportArtifact {
        filename: export_filename("svg"),
        mime: SVG_MIME,
        bytes: doc.into_bytes(),
    }
}
