//! The two external rendering engines behind one capability.
//!
//! The session only ever sees [`RenderEngine`]: source text in, normalized [`VectorImage`] (or a
//! [`RenderError`](crate::RenderError)) out. [`EngineSet`] is the production implementation,
//! dispatching on [`DiagramKind`]; tests substitute their own scripted implementations.

mod graphviz;
mod mermaid;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::config::PreviewOptions;
use crate::error::RenderResult;
use crate::image::{DiagramKind, VectorImage};

pub use graphviz::GraphvizEngine;
pub use mermaid::MermaidEngine;

pub trait RenderEngine: Send + Sync {
    /// Renders `source` with the engine selected by `kind`.
    ///
    /// The returned future is `'static` so the caller can run it on a spawned task and keep
    /// processing triggers while a render is in flight.
    fn render(&self, kind: DiagramKind, source: &str) -> BoxFuture<'static, RenderResult<VectorImage>>;
}

/// Both engines bundled for a preview session.
///
/// The Mermaid side is a cheap clone per render; the Graphviz side is a single-slot worker that
/// tears itself down on failure, so it sits behind a mutex to keep the rebuild transitions
/// coherent when an in-flight render overlaps a newer one.
pub struct EngineSet {
    mermaid: MermaidEngine,
    graphviz: Arc<Mutex<GraphvizEngine>>,
}

impl EngineSet {
    pub fn new(options: &PreviewOptions) -> Self {
        Self {
            mermaid: MermaidEngine::new(options),
            graphviz: Arc::new(Mutex::new(GraphvizEngine::new(options.graphviz.clone()))),
        }
    }

    /// How many times the Graphviz worker has been constructed so far.
    pub async fn graphviz_generation(&self) -> u64 {
        self.graphviz.lock().await.generation()
    }
}

impl RenderEngine for EngineSet {
    fn render(&self, kind: DiagramKind, source: &str) -> BoxFuture<'static, RenderResult<VectorImage>> {
        let source = source.to_owned();
        match kind {
            DiagramKind::Mermaid => {
                let engine = self.mermaid.clone();
                Box::pin(async move { engine.render(&source).await })
            }
            DiagramKind::Graphviz => {
                let engine = Arc::clone(&self.graphviz);
                Box::pin(async move { engine.lock().await.render(&source).await })
            }
        }
    }
}
