use layout::backends::svg::SVGWriter;
use layout::gv::{DotParser, GraphBuilder};

use crate::config::GraphvizOptions;
use crate::error::{RenderError, RenderResult};
use crate::image::{DiagramKind, VectorImage};
use crate::normalize::normalize_svg;

/// Graphviz adapter over the `layout` DOT compiler.
///
/// The compiler worker is built lazily on first use and is single-slot: after any render failure
/// it is discarded, and the next render constructs a fresh one instead of reusing a worker that
/// may have been left in a bad state.
pub struct GraphvizEngine {
    options: GraphvizOptions,
    worker: Option<DotCompiler>,
    generation: u64,
}

impl GraphvizEngine {
    pub fn new(options: GraphvizOptions) -> Self {
        Self {
            options,
            worker: None,
            generation: 0,
        }
    }

    /// How many workers have been constructed so far. Stays at zero until the first render.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn render(&mut self, source: &str) -> RenderResult<VectorImage> {
        let result = self
            .ensure_worker()
            .compile(source)
            .and_then(|svg| normalize_svg(&svg, DiagramKind::Graphviz));
        if result.is_err() {
            log::debug!("graphviz worker discarded after failure");
            self.worker = None;
        }
        result
    }

    fn ensure_worker(&mut self) -> &DotCompiler {
        if self.worker.is_none() {
            self.generation += 1;
            log::debug!("constructing graphviz worker (generation {})", self.generation);
        }
        let options = self.options.clone();
        self.worker.get_or_insert_with(|| DotCompiler::new(options))
    }
}

struct DotCompiler {
    options: GraphvizOptions,
}

impl DotCompiler {
    fn new(options: GraphvizOptions) -> Self {
        Self { options }
    }

    fn compile(&self, source: &str) -> RenderResult<String> {
        let mut parser = DotParser::new(source);
        let graph = parser
            .process()
            .map_err(|message| RenderError::Engine { message })?;

        let mut builder = GraphBuilder::new();
        builder.visit_graph(&graph);
        let mut visual = builder.get();

        let mut writer = SVGWriter::new();
        visual.do_it(
            self.options.debug_mode,
            self.options.disable_optimizations,
            self.options.disable_layout,
            &mut writer,
        );
        Ok(writer.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOT: &str = "digraph { a -> b; b -> c; }";

    #[tokio::test]
    async fn renders_dot_to_a_vector_image() {
        let mut engine = GraphvizEngine::new(GraphvizOptions::default());
        let image = engine.render(DOT).await.expect("render");
        assert_eq!(image.kind(), DiagramKind::Graphviz);
        assert!(image.svg().starts_with("<svg"));
    }

    #[tokio::test]
    async fn worker_is_lazy_and_reused_across_successes() {
        let mut engine = GraphvizEngine::new(GraphvizOptions::default());
        assert_eq!(engine.generation(), 0);
        engine.render(DOT).await.expect("first");
        engine.render("digraph { x -> y; }").await.expect("second");
        assert_eq!(engine.generation(), 1);
    }

    #[tokio::test]
    async fn failure_discards_the_worker_and_the_next_render_rebuilds() {
        let mut engine = GraphvizEngine::new(GraphvizOptions::default());
        engine.render(DOT).await.expect("warm up");
        assert_eq!(engine.generation(), 1);

        engine
            .render("this is not DOT at all")
            .await
            .expect_err("garbage must fail");
        assert_eq!(engine.generation(), 1);

        engine.render(DOT).await.expect("recovers");
        assert_eq!(engine.generation(), 2);
    }
}
