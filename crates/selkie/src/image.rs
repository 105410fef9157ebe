use serde::{Deserialize, Serialize};

/// Which external engine a piece of source text is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Mermaid,
    Graphviz,
}

impl DiagramKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mermaid => "mermaid",
            Self::Graphviz => "graphviz",
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagramKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mermaid" => Ok(Self::Mermaid),
            "graphviz" | "dot" => Ok(Self::Graphviz),
            _ => Err(()),
        }
    }
}

/// Root `viewBox` of a vector image: the coordinate region mapped to the visible canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// Parses an SVG `viewBox` attribute value (four numbers, whitespace or comma separated).
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw
            .split([' ', '\t', '\n', '\r', ','])
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().ok());

        let min_x = parts.next()??;
        let min_y = parts.next()??;
        let width = parts.next()??;
        let height = parts.next()??;
        if parts.next().is_some() {
            return None;
        }
        if !(min_x.is_finite() && min_y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }
        Some(Self {
            min_x,
            min_y,
            width,
            height,
        })
    }

    pub(crate) fn to_attr_value(self) -> String {
        format!(
            "{} {} {} {}",
            fmt_num(self.min_x),
            fmt_num(self.min_y),
            fmt_num(self.width),
            fmt_num(self.height)
        )
    }
}

/// Formats a number the way SVG attributes usually carry them: no trailing `.0` on integers.
pub(crate) fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The currently displayed vector markup, tagged with the diagram kind that produced it.
///
/// Exactly one of these is "current" per preview session (or none). It is replaced wholesale on
/// each successful render; exports always act on a snapshot of the current one.
#[derive(Debug, Clone)]
pub struct VectorImage {
    svg: String,
    kind: DiagramKind,
    view_box: Option<ViewBox>,
    intrinsic_width: Option<f64>,
    intrinsic_height: Option<f64>,
}

impl VectorImage {
    pub(crate) fn new(
        svg: String,
        kind: DiagramKind,
        view_box: Option<ViewBox>,
        intrinsic_width: Option<f64>,
        intrinsic_height: Option<f64>,
    ) -> Self {
        Self {
            svg,
            kind,
            view_box,
            intrinsic_width,
            intrinsic_height,
        }
    }

    /// The normalized root `<svg>` element markup.
    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn kind(&self) -> DiagramKind {
        self.kind
    }

    pub fn view_box(&self) -> Option<ViewBox> {
        self.view_box
    }

    /// Width/height attributes the engine emitted before normalization stripped them.
    pub fn intrinsic_size(&self) -> (Option<f64>, Option<f64>) {
        (self.intrinsic_width, self.intrinsic_height)
    }
}
