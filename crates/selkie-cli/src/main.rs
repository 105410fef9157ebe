//! CLI host for selkie preview sessions.
//!
//! `render` is a one-shot: source in, exported artifact out. `watch` keeps a session alive
//! against a file on disk: saves feed the debounced auto-render path, single-letter stdin
//! commands feed the immediate triggers, and exports land next to a continuously refreshed
//! `preview.svg`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};
use selkie::engine::{EngineSet, RenderEngine};
use selkie::{DiagramKind, PreviewOptions, PreviewSession, PreviewUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Render(selkie::RenderError),
    Export(selkie::ExportError),
    Config(String),
    Watch(notify::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Render(err) => write!(f, "{err}"),
            CliError::Export(err) => write!(f, "{err}"),
            CliError::Config(msg) => write!(f, "invalid config: {msg}"),
            CliError::Watch(err) => write!(f, "watch error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<notify::Error> for CliError {
    fn from(value: notify::Error) -> Self {
        Self::Watch(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Render,
    Watch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ExportFormat {
    #[default]
    Svg,
    Png,
}

impl FromStr for ExportFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    engine: Option<DiagramKind>,
    format: ExportFormat,
    out: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    input: Option<String>,
}

fn usage() -> &'static str {
    "selkie-cli\n\
\n\
USAGE:\n\
  selkie-cli [render] [--engine mermaid|graphviz] [--format svg|png] [--out <path>] [--config <path>] [<path>|-]\n\
  selkie-cli watch [--engine mermaid|graphviz] [--export-dir <dir>] [--config <path>] <path>\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', render reads from stdin.\n\
  - render writes the artifact to --out, or to ./diagram-<timestamp>.<ext> by default.\n\
  - watch re-renders on every save (debounced) and refreshes preview.svg in the export dir.\n\
    stdin commands: r=render now, m=mermaid, g=graphviz, s=save SVG, p=save PNG, q=quit.\n\
  - --config points at a TOML file deserialized into the session options.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();
    let mut iter = argv.iter().peekable();

    match iter.peek().map(|s| s.as_str()) {
        Some("render") => {
            iter.next();
        }
        Some("watch") => {
            args.command = Command::Watch;
            iter.next();
        }
        Some("help" | "--help" | "-h") => return Err(CliError::Usage("")),
        _ => {}
    }

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--engine" => {
                let value = iter.next().ok_or(CliError::Usage("--engine needs a value"))?;
                args.engine = Some(
                    DiagramKind::from_str(value)
                        .map_err(|_| CliError::Usage("--engine must be 'mermaid' or 'graphviz'"))?,
                );
            }
            "--format" => {
                let value = iter.next().ok_or(CliError::Usage("--format needs a value"))?;
                args.format = value
                    .parse()
                    .map_err(|_| CliError::Usage("--format must be 'svg' or 'png'"))?;
            }
            "--out" => {
                let value = iter.next().ok_or(CliError::Usage("--out needs a path"))?;
                args.out = Some(PathBuf::from(value));
            }
            "--export-dir" => {
                let value = iter
                    .next()
                    .ok_or(CliError::Usage("--export-dir needs a path"))?;
                args.export_dir = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = iter.next().ok_or(CliError::Usage("--config needs a path"))?;
                args.config = Some(PathBuf::from(value));
            }
            "--help" | "-h" => return Err(CliError::Usage("")),
            _ if arg.starts_with('-') && arg != "-" => {
                return Err(CliError::Usage("unknown flag"));
            }
            _ => {
                if args.input.is_some() {
                    return Err(CliError::Usage("more than one input path given"));
                }
                args.input = Some(arg.clone());
            }
        }
    }

    if args.command == Command::Watch && matches!(args.input.as_deref(), None | Some("-")) {
        return Err(CliError::Usage("watch requires a file path"));
    }

    Ok(args)
}

fn load_options(path: Option<&Path>) -> Result<PreviewOptions, CliError> {
    let Some(path) = path else {
        return Ok(PreviewOptions::default());
    };
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|err| CliError::Config(err.to_string()))
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    match run(&argv) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            if msg.is_empty() {
                println!("{}", usage());
            } else {
                eprintln!("{msg}\n\n{}", usage());
                std::process::exit(2);
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run(argv: &[String]) -> Result<(), CliError> {
    let args = parse_args(argv)?;
    let options = load_options(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match args.command {
        Command::Render => runtime.block_on(run_render(args, options)),
        Command::Watch => runtime.block_on(run_watch(args, options)),
    }
}

async fn run_render(args: Args, options: PreviewOptions) -> Result<(), CliError> {
    let source = read_input(args.input.as_deref())?;
    let kind = args.engine.unwrap_or(DiagramKind::Graphviz);

    let engines = EngineSet::new(&options);
    let image = engines
        .render(kind, source.trim())
        .await
        .map_err(CliError::Render)?;

    let artifact = match args.format {
        ExportFormat::Svg => selkie::export_svg(&image),
        ExportFormat::Png => selkie::export_png(&image, &options).map_err(CliError::Export)?,
    };

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&artifact.filename));
    std::fs::write(&out, &artifact.bytes)?;
    eprintln!("saved {}", out.display());
    Ok(())
}

async fn run_watch(args: Args, options: PreviewOptions) -> Result<(), CliError> {
    let path = PathBuf::from(args.input.as_deref().expect("checked in parse_args"));
    let export_dir = args.export_dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&export_dir)?;
    let kind = args.engine.unwrap_or(DiagramKind::Graphviz);

    let engine: Arc<dyn RenderEngine> = Arc::new(EngineSet::new(&options));
    let (session, mut updates) = PreviewSession::spawn(engine, options);

    // Seed the session, then let the kind switch trigger the initial render immediately.
    session.edit_source(std::fs::read_to_string(&path)?).await;
    session.select_kind(kind).await;

    let (fs_tx, mut fs_events) = mpsc::channel::<()>(8);
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if res.is_ok() {
            let _ = fs_tx.blocking_send(());
        }
    })?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;

    eprintln!(
        "watching {} — r=render, m=mermaid, g=graphviz, s=save SVG, p=save PNG, q=quit",
        path.display()
    );

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(()) = fs_events.recv() => {
                match std::fs::read_to_string(&path) {
                    Ok(text) => session.edit_source(text).await,
                    Err(err) => log::warn!("failed to re-read {}: {err}", path.display()),
                }
            }
            line = stdin_lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "" => {}
                    "q" => break,
                    "r" => session.render_now().await,
                    "m" => session.select_kind(DiagramKind::Mermaid).await,
                    "g" => session.select_kind(DiagramKind::Graphviz).await,
                    "s" => session.export_svg().await,
                    "p" => session.export_png().await,
                    other => eprintln!("unknown command: {other}"),
                },
                Ok(None) => break,
                Err(err) => return Err(CliError::Io(err)),
            },
            Some(update) = updates.recv() => handle_update(update, &export_dir)?,
        }
    }

    session.shutdown().await;
    Ok(())
}

fn handle_update(update: PreviewUpdate, export_dir: &Path) -> Result<(), CliError> {
    match update {
        PreviewUpdate::Status(status) => {
            let message = status.message();
            if !message.is_empty() {
                eprintln!("{message}");
            }
        }
        PreviewUpdate::ImageReplaced(image) => {
            let preview = export_dir.join("preview.svg");
            std::fs::write(&preview, image.svg())?;
            log::debug!("preview refreshed at {}", preview.display());
        }
        PreviewUpdate::OutputCleared => {
            let _ = std::fs::remove_file(export_dir.join("preview.svg"));
        }
        PreviewUpdate::ExportsEnabled(_) => {}
        PreviewUpdate::ExportReady(artifact) => {
            let dest = export_dir.join(&artifact.filename);
            std::fs::write(&dest, &artifact.bytes)?;
            eprintln!("saved {}", dest.display());
        }
        PreviewUpdate::ExportFailed { message } => eprintln!("export failed: {message}"),
    }
    Ok(())
}
