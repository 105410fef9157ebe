use std::time::Duration;

use serde::Deserialize;

/// Session-wide tunables.
///
/// Everything has a sensible default; hosts typically deserialize this from a small TOML file and
/// override a field or two.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewOptions {
    /// Quiet period before a deferred (free-text edit) trigger actually renders.
    pub auto_render_delay_ms: u64,
    /// Minimum corner rounding applied to Mermaid node shapes that ship without one.
    pub corner_radius: f64,
    /// Raster surface size used when no dimension source can be resolved at all.
    pub fallback_width: f64,
    pub fallback_height: f64,
    pub graphviz: GraphvizOptions,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            auto_render_delay_ms: 400,
            corner_radius: 6.0,
            fallback_width: 1280.0,
            fallback_height: 720.0,
            graphviz: GraphvizOptions::default(),
        }
    }
}

impl PreviewOptions {
    pub fn auto_render_delay(&self) -> Duration {
        Duration::from_millis(self.auto_render_delay_ms)
    }
}

/// Construction-time configuration for the Graphviz worker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphvizOptions {
    pub debug_mode: bool,
    pub disable_optimizations: bool,
    pub disable_layout: bool,
}
