//! Normalizes engine output into a consistent presentational shape.
//!
//! Both engines emit valid SVG, but with different sizing conventions: Mermaid pins an explicit
//! `max-width` style and Graphviz emits fixed `width`/`height` attributes. The preview panel (and
//! the export pipeline) want one shape: a root `viewBox`, top-left anchored scaling, and no
//! explicit sizing, so the image fits its container naturally.

use crate::error::{RenderError, RenderResult};
use crate::image::{DiagramKind, VectorImage, ViewBox};
use crate::rewrite::{rewrite_first_start_tag, rewrite_start_tags};

/// Parses `markup` (an engine's output, possibly with an XML prologue) and produces the
/// normalized [`VectorImage`].
pub fn normalize_svg(markup: &str, kind: DiagramKind) -> RenderResult<VectorImage> {
    let fragment = extract_svg_root(markup)?;

    // Read-side validation and attribute capture before any rewriting.
    let doc = roxmltree::Document::parse(fragment).map_err(|_| RenderError::MissingSvgRoot)?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RenderError::MissingSvgRoot);
    }
    let declared_view_box = root.attribute("viewBox").and_then(ViewBox::parse);
    let intrinsic_width = root.attribute("width").and_then(parse_length);
    let intrinsic_height = root.attribute("height").and_then(parse_length);
    drop(doc);

    // A missing viewBox is derived from the rendered bounds when they can be computed at all;
    // otherwise the attribute is simply left off and the export pipeline falls back on its own
    // dimension chain.
    let derived_view_box = if declared_view_box.is_none() {
        derive_view_box(fragment)
    } else {
        None
    };
    if declared_view_box.is_none() && derived_view_box.is_none() {
        log::debug!("no viewBox and no computable bounds; leaving root as-is");
    }

    let svg = rewrite_first_start_tag(fragment, "svg", |tag| {
        tag.remove_attr("width");
        tag.remove_attr("height");
        tag.set_attr("preserveAspectRatio", "xMinYMin meet");
        tag.set_attr("data-diagram-type", kind.as_str());
        if tag.attr("viewBox").is_none() {
            if let Some(vb) = derived_view_box {
                tag.set_attr("viewBox", &vb.to_attr_value());
            }
        }
        if let Some(style) = tag.attr("style").map(str::to_owned) {
            match strip_sizing_declarations(&style) {
                Some(stripped) => tag.set_attr("style", &stripped),
                None => {
                    tag.remove_attr("style");
                }
            }
        }
    });

    // Significant whitespace in labels must survive standalone serialization.
    let svg = rewrite_start_tags(&svg, "text", |tag| {
        if tag.attr("xml:space").is_none() {
            tag.set_attr("xml:space", "preserve");
        }
    });

    let view_box = declared_view_box.or(derived_view_box);
    Ok(VectorImage::new(
        svg,
        kind,
        view_box,
        intrinsic_width,
        intrinsic_height,
    ))
}

/// Locates the root `<svg>` element in `markup`, dropping any XML declaration or leading
/// whitespace an engine may have emitted around it.
fn extract_svg_root(markup: &str) -> RenderResult<&str> {
    let mut i = 0;
    loop {
        let rel = markup[i..].find("<svg").ok_or(RenderError::MissingSvgRoot)?;
        let start = i + rel;
        let after = markup.as_bytes().get(start + 4).copied();
        if matches!(after, Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')) {
            return Ok(markup[start..].trim_end());
        }
        i = start + 4;
    }
}

/// Derives a viewBox from the rendered content bounds, the same way the raster pipeline resolves
/// dimensions for viewBox-less documents. Returns `None` whenever the bounds cannot be computed;
/// callers skip silently in that case.
fn derive_view_box(svg: &str) -> Option<ViewBox> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &opt).ok()?;
    let bbox = tree.root().abs_stroke_bounding_box();
    let (width, height) = (f64::from(bbox.width()), f64::from(bbox.height()));
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return None;
    }
    Some(ViewBox {
        min_x: f64::from(bbox.x()),
        min_y: f64::from(bbox.y()),
        width,
        height,
    })
}

/// Drops `width`/`height`/`max-width` declarations from an inline style. Returns `None` when
/// nothing is left.
fn strip_sizing_declarations(style: &str) -> Option<String> {
    let kept: Vec<&str> = style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let property = decl.split(':').next().unwrap_or("").trim();
            !property.eq_ignore_ascii_case("width")
                && !property.eq_ignore_ascii_case("height")
                && !property.eq_ignore_ascii_case("max-width")
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}

/// `parseFloat`-style length reading: the longest numeric prefix, units ignored.
fn parse_length(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'+' | b'-' if end == 0 => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let parsed: f64 = s[..end].parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sizing_and_anchors_top_left() {
        let image = normalize_svg(
            r#"<svg width="200" height="100" viewBox="0 0 200 100" style="max-width: 200px; background: white"><rect width="10" height="10"/></svg>"#,
            DiagramKind::Mermaid,
        )
        .expect("normalize");

        let svg = image.svg();
        assert!(svg.starts_with("<svg"));
        assert!(!svg.contains(r#"<svg width="#));
        assert!(svg.contains(r#"preserveAspectRatio="xMinYMin meet""#));
        assert!(svg.contains(r#"data-diagram-type="mermaid""#));
        assert!(svg.contains("background: white"));
        assert!(!svg.contains("max-width"));
        assert_eq!(image.intrinsic_size(), (Some(200.0), Some(100.0)));
        assert_eq!(
            image.view_box(),
            Some(ViewBox {
                min_x: 0.0,
                min_y: 0.0,
                width: 200.0,
                height: 100.0
            })
        );
    }

    #[test]
    fn derives_view_box_from_content_bounds() {
        let image = normalize_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect x="0" y="0" width="40" height="20" fill="black"/></svg>"#,
            DiagramKind::Graphviz,
        )
        .expect("normalize");

        let vb = image.view_box().expect("derived viewBox");
        assert!(vb.width > 0.0 && vb.height > 0.0);
        assert!(image.svg().contains("viewBox="));
    }

    #[test]
    fn marks_text_whitespace_preserved() {
        let image = normalize_svg(
            r#"<svg viewBox="0 0 10 10"><text x="1">a  b</text></svg>"#,
            DiagramKind::Mermaid,
        )
        .expect("normalize");
        assert!(image.svg().contains(r#"xml:space="preserve""#));
    }

    #[test]
    fn drops_xml_prologue() {
        let image = normalize_svg(
            "<?xml version=\"1.0\"?>\n<svg viewBox=\"0 0 4 4\"/>",
            DiagramKind::Graphviz,
        )
        .expect("normalize");
        assert!(image.svg().starts_with("<svg"));
    }

    #[test]
    fn rejects_markup_without_svg_root() {
        let err = normalize_svg("<div>not svg</div>", DiagramKind::Mermaid).unwrap_err();
        assert!(matches!(err, RenderError::MissingSvgRoot));
    }

    #[test]
    fn parse_length_reads_units_and_percentages() {
        assert_eq!(parse_length("100px"), Some(100.0));
        assert_eq!(parse_length("100%"), Some(100.0));
        assert_eq!(parse_length(" 12.5pt"), Some(12.5));
        assert_eq!(parse_length("auto"), None);
    }
}
