//! End-to-end session behavior with a scripted engine: debouncing, the skip-unchanged rule,
//! token ordering, and the empty-input state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use selkie::engine::RenderEngine;
use selkie::error::RenderResult;
use selkie::normalize::normalize_svg;
use selkie::{DiagramKind, PreviewOptions, PreviewSession, PreviewUpdate, Status, VectorImage};
use tokio::sync::mpsc;

/// Renders instantly unless the source has a scripted delay; the produced image embeds the
/// source text so assertions can tell outputs apart.
struct ScriptedEngine {
    delays: HashMap<&'static str, Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn new(delays: &[(&'static str, Duration)]) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(Self {
            delays: delays.iter().copied().collect(),
            calls: Arc::clone(&calls),
        });
        (engine, calls)
    }
}

fn image_for(source: &str, kind: DiagramKind) -> VectorImage {
    normalize_svg(
        &format!(r#"<svg viewBox="0 0 10 10"><text>{source}</text></svg>"#),
        kind,
    )
    .expect("scripted image")
}

impl RenderEngine for ScriptedEngine {
    fn render(&self, kind: DiagramKind, source: &str) -> BoxFuture<'static, RenderResult<VectorImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(source).copied().unwrap_or(Duration::ZERO);
        let source = source.to_owned();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(image_for(&source, kind))
        })
    }
}

async fn next_update(updates: &mut mpsc::Receiver<PreviewUpdate>) -> PreviewUpdate {
    tokio::time::timeout(Duration::from_secs(60), updates.recv())
        .await
        .expect("no update arrived")
        .expect("session closed the updates channel")
}

/// Drains the standard success sequence: Rendering, ImageReplaced, ExportsEnabled, Rendered.
/// Returns the replaced image.
async fn expect_render_applied(updates: &mut mpsc::Receiver<PreviewUpdate>) -> VectorImage {
    assert!(matches!(
        next_update(updates).await,
        PreviewUpdate::Status(Status::Rendering)
    ));
    let image = match next_update(updates).await {
        PreviewUpdate::ImageReplaced(image) => image,
        other => panic!("expected ImageReplaced, got {other:?}"),
    };
    assert!(matches!(
        next_update(updates).await,
        PreviewUpdate::ExportsEnabled(true)
    ));
    assert!(matches!(
        next_update(updates).await,
        PreviewUpdate::Status(Status::Rendered)
    ));
    image
}

#[tokio::test(start_paused = true)]
async fn deferred_rerender_of_unchanged_source_is_skipped() {
    let (engine, calls) = ScriptedEngine::new(&[]);
    let (session, mut updates) = PreviewSession::spawn(engine, PreviewOptions::default());

    session.edit_source("graph one").await;
    let image = expect_render_applied(&mut updates).await;
    assert!(image.svg().contains("graph one"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same text again: the deferred trigger fires and must be a no-op with no status change.
    session.edit_source("graph one").await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The very next update must belong to the changed source, proving the skip emitted nothing.
    session.edit_source("graph two").await;
    let image = expect_render_applied(&mut updates).await;
    assert!(image.svg().contains("graph two"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_render_is_never_skipped() {
    let (engine, calls) = ScriptedEngine::new(&[]);
    let (session, mut updates) = PreviewSession::spawn(engine, PreviewOptions::default());

    session.edit_source("graph one").await;
    expect_render_applied(&mut updates).await;

    session.render_now().await;
    expect_render_applied(&mut updates).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn later_render_wins_over_a_slow_earlier_one() {
    let (engine, calls) = ScriptedEngine::new(&[
        ("slow graph", Duration::from_secs(5)),
        ("fast graph", Duration::from_millis(10)),
    ]);
    let (session, mut updates) = PreviewSession::spawn(engine, PreviewOptions::default());

    session.edit_source("slow graph").await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Rendering)
    ));

    // Supersede while the slow render is still in flight.
    session.edit_source("fast graph").await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Rendering)
    ));
    let image = match next_update(&mut updates).await {
        PreviewUpdate::ImageReplaced(image) => image,
        other => panic!("expected ImageReplaced, got {other:?}"),
    };
    assert!(image.svg().contains("fast graph"));

    // Let the slow render finish; its completion must be discarded without any update.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::ExportsEnabled(true)
    ));
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Rendered)
    ));

    session.export_svg().await;
    match next_update(&mut updates).await {
        PreviewUpdate::ExportReady(artifact) => {
            let text = String::from_utf8(artifact.bytes).expect("utf-8");
            assert!(text.contains("fast graph"));
            assert!(!text.contains("slow graph"));
        }
        other => panic!("expected ExportReady, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clearing_the_input_disables_exports_and_prompts() {
    let (engine, calls) = ScriptedEngine::new(&[("slow graph", Duration::from_secs(5))]);
    let (session, mut updates) = PreviewSession::spawn(engine, PreviewOptions::default());

    session.edit_source("slow graph").await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Rendering)
    ));

    // Clear while the render is in flight: prompt immediately, and the late completion must not
    // resurrect the output.
    session.edit_source("").await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::OutputCleared
    ));
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::ExportsEnabled(false)
    ));
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::NothingToRender)
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;

    // Exports are no-ops while nothing is displayed.
    session.export_svg().await;
    session.export_png().await;

    // The next update anyone sees belongs to the next render.
    session.edit_source("digraph ok").await;
    let image = expect_render_applied(&mut updates).await;
    assert!(image.svg().contains("digraph ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn kind_switch_renders_immediately() {
    let (engine, calls) = ScriptedEngine::new(&[]);
    let (session, mut updates) = PreviewSession::spawn(engine, PreviewOptions::default());

    session.edit_source("graph one").await;
    let image = expect_render_applied(&mut updates).await;
    assert_eq!(image.kind(), DiagramKind::Graphviz);

    // No debounce wait on a kind switch: the status clears and the render starts at once.
    session.select_kind(DiagramKind::Mermaid).await;
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Idle)
    ));
    assert!(matches!(
        next_update(&mut updates).await,
        PreviewUpdate::Status(Status::Rendering)
    ));
    let image = match next_update(&mut updates).await {
        PreviewUpdate::ImageReplaced(image) => image,
        other => panic!("expected ImageReplaced, got {other:?}"),
    };
    assert_eq!(image.kind(), DiagramKind::Mermaid);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.shutdown().await;
}
