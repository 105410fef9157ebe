use merman::render::HeadlessRenderer;

use crate::config::PreviewOptions;
use crate::error::{RenderError, RenderResult};
use crate::image::{DiagramKind, VectorImage, fmt_num};
use crate::normalize::normalize_svg;
use crate::rewrite::{parse_start_tag, rewrite_start_tags};

/// Mermaid adapter over [`merman`]'s headless renderer.
#[derive(Clone)]
pub struct MermaidEngine {
    renderer: HeadlessRenderer,
    corner_radius: f64,
}

impl MermaidEngine {
    pub fn new(options: &PreviewOptions) -> Self {
        Self {
            renderer: HeadlessRenderer::new(),
            corner_radius: options.corner_radius,
        }
    }

    pub async fn render(&self, source: &str) -> RenderResult<VectorImage> {
        // Parse first so syntax errors surface with the engine's own message instead of a layout
        // failure further in.
        let parsed = self
            .renderer
            .parse_diagram_sync(source)
            .map_err(|err| RenderError::engine(err.to_string()))?;
        if parsed.is_none() {
            return Err(RenderError::engine("no Mermaid diagram detected"));
        }

        // Render under a fresh time-derived id so internal marker ids from earlier renders of the
        // same session cannot collide.
        let diagram_id = format!("diagram-{}", chrono::Utc::now().timestamp_millis());
        let svg = self
            .renderer
            .render_svg_sync_with_diagram_id(source, &diagram_id)
            .map_err(|err| RenderError::engine(err.to_string()))?
            .ok_or(RenderError::MissingSvgRoot)?;

        let svg = round_node_corners(&svg, self.corner_radius);
        normalize_svg(&svg, DiagramKind::Mermaid)
    }
}

/// Ensures every shape inside a `g.node` group carries at least the default corner rounding.
/// Shapes that already declare `rx`/`ry` keep their values.
fn round_node_corners(svg: &str, radius: f64) -> String {
    let radius = fmt_num(radius);
    let mut out = String::with_capacity(svg.len() + 64);
    let mut i = 0;

    while let Some((inner_start, inner_end)) = next_node_group(svg, i) {
        out.push_str(&svg[i..inner_start]);
        let mut inner = svg[inner_start..inner_end].to_string();
        for shape in ["rect", "polygon", "path"] {
            inner = rewrite_start_tags(&inner, shape, |tag| {
                if tag.attr("rx").is_none() {
                    tag.set_attr("rx", &radius);
                }
                if tag.attr("ry").is_none() {
                    tag.set_attr("ry", &radius);
                }
            });
        }
        out.push_str(&inner);
        i = inner_end;
    }
    out.push_str(&svg[i..]);
    out
}

/// Finds the next `<g class="... node ...">` group at or after `from`. Returns the span of its
/// inner markup (between the start tag and the matching `</g>`).
fn next_node_group(svg: &str, from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    loop {
        let rel = svg[i..].find("<g")?;
        let start = i + rel;
        let after = svg.as_bytes().get(start + 2).copied();
        if !matches!(after, Some(b' ' | b'\t' | b'\n' | b'\r' | b'>')) {
            i = start + 2;
            continue;
        }
        let tag_end = find_gt(svg, start)?;
        let tag = parse_start_tag(&svg[start..tag_end]);
        let is_node = tag
            .as_ref()
            .and_then(|t| t.attr("class"))
            .is_some_and(|class| class.split_whitespace().any(|c| c == "node"));
        if !is_node || tag.is_some_and(|t| t.self_closing) {
            i = tag_end;
            continue;
        }

        // Walk to the matching close, counting nested groups.
        let mut depth = 1usize;
        let mut j = tag_end;
        while depth > 0 {
            let rel = svg[j..].find("</g")?;
            let close = j + rel;
            let opens = count_group_opens(&svg[j..close]);
            depth += opens;
            depth -= 1;
            j = close + 3;
            if depth == 0 {
                return Some((tag_end, close));
            }
        }
        return None;
    }
}

fn find_gt(svg: &str, start: usize) -> Option<usize> {
    let bytes = svg.as_bytes();
    let mut quote: Option<u8> = None;
    for (idx, &b) in bytes.iter().enumerate().skip(start) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(idx + 1),
                _ => {}
            },
        }
    }
    None
}

fn count_group_opens(chunk: &str) -> usize {
    let mut count = 0;
    let mut i = 0;
    while let Some(rel) = chunk[i..].find("<g") {
        let start = i + rel;
        let after = chunk.as_bytes().get(start + 2).copied();
        if matches!(after, Some(b' ' | b'\t' | b'\n' | b'\r' | b'>')) {
            // Self-closing groups never contribute a close tag.
            if let Some(end) = find_gt(chunk, start) {
                if !chunk[start..end].trim_end().ends_with("/>") {
                    count += 1;
                }
                i = end;
                continue;
            }
        }
        i = start + 2;
    }
    count
}
