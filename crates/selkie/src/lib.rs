#![forbid(unsafe_code)]

//! `selkie` is a headless diagram preview session: Mermaid or Graphviz/DOT source in, a
//! normalized SVG "current image" out, with on-demand SVG/PNG export.
//!
//! Rendering itself is delegated to two external engines — [`merman`] for Mermaid and the
//! `layout` DOT compiler for Graphviz. This crate owns everything around them: debounced render
//! scheduling with stale-result discard, output normalization, and the export pipeline.
//!
//! The entry point for interactive hosts is [`PreviewSession`]; one-shot hosts can use
//! [`engine::EngineSet`] and the `export` functions directly.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod image;
pub mod normalize;
pub mod session;

mod rewrite;

pub use config::{GraphvizOptions, PreviewOptions};
pub use error::{ExportError, RenderError};
pub use export::{ExportArtifact, export_png, export_svg};
pub use image::{DiagramKind, VectorImage, ViewBox};
pub use session::{PreviewEvent, PreviewSession, PreviewUpdate, Status};
