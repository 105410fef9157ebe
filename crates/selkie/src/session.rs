//! The preview session: a controller task owning all mutable preview state.
//!
//! Hosts feed [`PreviewEvent`]s in and react to [`PreviewUpdate`]s out; nothing else is shared.
//! Free-text edits are deferred triggers, coalesced behind a quiet period; manual renders and
//! kind switches execute immediately and cancel any pending deferred trigger.
//!
//! Every executed render gets a strictly increasing token. Only the render holding the
//! most-recently issued token may touch the output; anything that completes after being
//! superseded is dropped without a trace, so a slow render can never overwrite a newer one no
//! matter how completions interleave.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::config::PreviewOptions;
use crate::engine::RenderEngine;
use crate::error::RenderResult;
use crate::export::{self, ExportArtifact};
use crate::image::{DiagramKind, VectorImage};

#[derive(Debug)]
pub enum PreviewEvent {
    /// Free-text edit; renders after the quiet period elapses without another edit.
    SourceEdited(String),
    /// Diagram kind switch; renders immediately.
    KindSelected(DiagramKind),
    /// Manual render trigger; renders immediately and never skips as unchanged.
    RenderRequested,
    ExportSvgRequested,
    ExportPngRequested,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum PreviewUpdate {
    Status(Status),
    /// A successful render replaced the whole output.
    ImageReplaced(VectorImage),
    OutputCleared,
    /// Tracks whether a current image exists; hosts mirror this onto their export controls.
    ExportsEnabled(bool),
    ExportReady(ExportArtifact),
    ExportFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    /// The input is empty; not an error.
    NothingToRender,
    Rendering,
    Rendered,
    RenderFailed { message: String },
}

impl Status {
    /// The user-facing status line for this state.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::NothingToRender => {
                "Nothing to render. Paste Mermaid or DOT source to begin.".to_string()
            }
            Self::Rendering => "Rendering…".to_string(),
            Self::Rendered => "Diagram rendered. SVG and PNG export are available.".to_string(),
            Self::RenderFailed { message } => format!("Render failed: {message}"),
        }
    }
}

/// What caused a render to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit user action; always renders.
    Manual,
    /// Debounced edit or kind switch; skipped when nothing changed since the last success.
    Auto,
}

/// An executed render. Never mutated; superseded by any later request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub source: String,
    pub kind: DiagramKind,
    pub token: u64,
    pub trigger: Trigger,
}

struct Completion {
    request: RenderRequest,
    result: RenderResult<VectorImage>,
}

/// Handle to a running preview session task.
pub struct PreviewSession {
    events: mpsc::Sender<PreviewEvent>,
    task: JoinHandle<()>,
}

impl PreviewSession {
    /// Spawns the controller task. Updates arrive on the returned receiver in the order the
    /// session produced them.
    pub fn spawn(
        engine: Arc<dyn RenderEngine>,
        options: PreviewOptions,
    ) -> (Self, mpsc::Receiver<PreviewUpdate>) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let (updates_tx, updates_rx) = mpsc::channel(64);
        let (completions_tx, completions_rx) = mpsc::channel(8);

        let task = SessionTask {
            engine,
            options,
            updates: updates_tx,
            completions: completions_tx,
            kind: DiagramKind::Graphviz,
            source: String::new(),
            tokens_issued: 0,
            latest_token: 0,
            debounce_deadline: None,
            last_rendered: None,
            current: None,
        };
        let task = tokio::spawn(task.run(events_rx, completions_rx));

        (
            Self {
                events: events_tx,
                task,
            },
            updates_rx,
        )
    }

    pub async fn edit_source(&self, text: impl Into<String>) {
        self.send(PreviewEvent::SourceEdited(text.into())).await;
    }

    pub async fn select_kind(&self, kind: DiagramKind) {
        self.send(PreviewEvent::KindSelected(kind)).await;
    }

    pub async fn render_now(&self) {
        self.send(PreviewEvent::RenderRequested).await;
    }

    pub async fn export_svg(&self) {
        self.send(PreviewEvent::ExportSvgRequested).await;
    }

    pub async fn export_png(&self) {
        self.send(PreviewEvent::ExportPngRequested).await;
    }

    /// Stops the controller task and waits for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.events.send(PreviewEvent::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, event: PreviewEvent) {
        if self.events.send(event).await.is_err() {
            log::warn!("preview session task is gone; dropping event");
        }
    }
}

struct SessionTask {
    engine: Arc<dyn RenderEngine>,
    options: PreviewOptions,
    updates: mpsc::Sender<PreviewUpdate>,
    completions: mpsc::Sender<Completion>,
    kind: DiagramKind,
    source: String,
    tokens_issued: u64,
    /// Token of the most recently issued (or invalidated-to) render; completions carrying any
    /// other token are stale.
    latest_token: u64,
    debounce_deadline: Option<Instant>,
    /// (source, kind) of the last successful render; deferred triggers matching it are skipped.
    last_rendered: Option<(String, DiagramKind)>,
    current: Option<VectorImage>,
}

impl SessionTask {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<PreviewEvent>,
        mut completions: mpsc::Receiver<Completion>,
    ) {
        loop {
            let deadline = self.debounce_deadline;
            tokio::select! {
                event = events.recv() => match event {
                    None | Some(PreviewEvent::Shutdown) => break,
                    Some(event) => self.on_event(event).await,
                },
                Some(completion) = completions.recv() => {
                    self.on_completion(completion).await;
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.debounce_deadline = None;
                    self.execute_render(Trigger::Auto).await;
                }
            }
        }
    }

    async fn on_event(&mut self, event: PreviewEvent) {
        match event {
            PreviewEvent::SourceEdited(text) => {
                self.source = text;
                self.debounce_deadline = Some(Instant::now() + self.options.auto_render_delay());
            }
            PreviewEvent::KindSelected(kind) => {
                self.kind = kind;
                self.debounce_deadline = None;
                self.emit_status(Status::Idle).await;
                self.execute_render(Trigger::Auto).await;
            }
            PreviewEvent::RenderRequested => {
                self.debounce_deadline = None;
                self.execute_render(Trigger::Manual).await;
            }
            PreviewEvent::ExportSvgRequested => self.export_svg().await,
            PreviewEvent::ExportPngRequested => self.export_png().await,
            PreviewEvent::Shutdown => {}
        }
    }

    async fn execute_render(&mut self, trigger: Trigger) {
        let source = self.source.trim().to_string();

        if source.is_empty() {
            // An in-flight render must not resurrect a panel the user just cleared.
            self.issue_token();
            self.last_rendered = None;
            self.clear_output().await;
            self.emit_status(Status::NothingToRender).await;
            return;
        }

        if trigger == Trigger::Auto
            && self
                .last_rendered
                .as_ref()
                .is_some_and(|(s, k)| *s == source && *k == self.kind)
        {
            log::debug!("skipping deferred re-render of unchanged source");
            return;
        }

        let token = self.issue_token();
        let request = RenderRequest {
            source,
            kind: self.kind,
            token,
            trigger,
        };
        log::debug!(
            "render #{token} started ({}, {} bytes)",
            request.kind,
            request.source.len()
        );
        self.emit_status(Status::Rendering).await;

        let future = self.engine.render(request.kind, &request.source);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = future.await;
            let _ = completions.send(Completion { request, result }).await;
        });
    }

    async fn on_completion(&mut self, completion: Completion) {
        let Completion { request, result } = completion;
        if request.token != self.latest_token {
            // Superseded while in flight; no UI update, no status message.
            log::debug!("render #{} finished stale; discarded", request.token);
            return;
        }

        match result {
            Ok(image) => {
                log::debug!("render #{} applied", request.token);
                self.last_rendered = Some((request.source, request.kind));
                self.current = Some(image.clone());
                self.emit(PreviewUpdate::ImageReplaced(image)).await;
                self.emit(PreviewUpdate::ExportsEnabled(true)).await;
                self.emit_status(Status::Rendered).await;
            }
            Err(err) => {
                log::warn!("render #{} failed: {err}", request.token);
                self.clear_output().await;
                self.emit_status(Status::RenderFailed {
                    message: err.to_string(),
                })
                .await;
            }
        }
    }

    async fn export_svg(&mut self) {
        let Some(image) = &self.current else {
            log::debug!("svg export requested with no current image; ignoring");
            return;
        };
        let artifact = export::export_svg(image);
        self.emit(PreviewUpdate::ExportReady(artifact)).await;
    }

    async fn export_png(&mut self) {
        // Snapshot the current image so the export acts on exactly what was displayed when the
        // user asked, even if a render lands while the rasterizer runs.
        let Some(image) = self.current.clone() else {
            log::debug!("png export requested with no current image; ignoring");
            return;
        };
        let options = self.options.clone();
        let updates = self.updates.clone();
        tokio::spawn(async move {
            let update = match export::export_png(&image, &options) {
                Ok(artifact) => PreviewUpdate::ExportReady(artifact),
                Err(err) => {
                    log::warn!("png export failed: {err}");
                    PreviewUpdate::ExportFailed {
                        message: err.to_string(),
                    }
                }
            };
            let _ = updates.send(update).await;
        });
    }

    async fn clear_output(&mut self) {
        self.current = None;
        self.emit(PreviewUpdate::OutputCleared).await;
        self.emit(PreviewUpdate::ExportsEnabled(false)).await;
    }

    fn issue_token(&mut self) -> u64 {
        self.tokens_issued += 1;
        self.latest_token = self.tokens_issued;
        self.tokens_issued
    }

    async fn emit_status(&self, status: Status) {
        self.emit(PreviewUpdate::Status(status)).await;
    }

    async fn emit(&self, update: PreviewUpdate) {
        if self.updates.send(update).await.is_err() {
            log::debug!("updates receiver dropped; continuing without a listener");
        }
    }
}
