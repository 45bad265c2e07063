use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use scenecast::{
    PipelineConfig,
    job::JobState,
    media::FfmpegBackend,
    orchestrator::Orchestrator,
    providers::{AvatarClient, DirAssetResolver, NarrationChain, local::PiperNarrator},
    server,
};

#[derive(Parser, Debug)]
#[command(name = "scenecast", version)]
struct Cli {
    /// Pipeline config JSON; defaults apply for fields left out.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local piper TTS binary used for narration.
    #[arg(long, default_value = "piper")]
    piper_bin: PathBuf,

    /// Directory holding piper voice models (`<voice>.onnx`).
    #[arg(long, default_value = "voices")]
    piper_models: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the rendering service over HTTP.
    Serve(ServeArgs),
    /// Render a single request JSON to an MP4 and exit.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 4600)]
    port: u16,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input render request JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let orchestrator = build_orchestrator(&cli, config)?;

    match cli.cmd {
        Command::Serve(args) => cmd_serve(orchestrator, args).await,
        Command::Render(args) => cmd_render(orchestrator, args).await,
    }
}

fn build_orchestrator(cli: &Cli, config: PipelineConfig) -> anyhow::Result<Arc<Orchestrator>> {
    let policy = Orchestrator::retry_policy(&config);
    let narration = NarrationChain::new(
        vec![Arc::new(PiperNarrator::new(
            &cli.piper_bin,
            &cli.piper_models,
        ))],
        policy,
    );
    let avatar = AvatarClient::new(None, policy);
    let assets = Arc::new(DirAssetResolver::new(&config.asset_root));
    let backend = Arc::new(FfmpegBackend::new()?);
    Ok(Orchestrator::new(config, narration, avatar, assets, backend)?)
}

async fn cmd_serve(orchestrator: Arc<Orchestrator>, args: ServeArgs) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    orchestrator.spawn_retention_sweeper(shutdown.clone());

    let app = server::build_router(orchestrator);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "scenecast listening");
    axum::serve(listener, app).await?;
    shutdown.cancel();
    Ok(())
}

async fn cmd_render(orchestrator: Arc<Orchestrator>, args: RenderArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("open request '{}'", args.in_path.display()))?;
    let request: scenecast::RenderRequest =
        serde_json::from_str(&raw).with_context(|| "parse request JSON")?;

    let job_id = orchestrator.submit(request).await?;
    tracing::info!(%job_id, "submitted");

    let snapshot = loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let snapshot = orchestrator.get_status(job_id).await?;
        tracing::info!(
            progress = snapshot.progress_percent,
            stage = %snapshot.current_stage,
            "rendering"
        );
        if snapshot.state.is_terminal() {
            break snapshot;
        }
    };

    match snapshot.state {
        JobState::Completed => {
            let artifact = orchestrator.get_artifact(job_id).await?;
            move_artifact(&artifact, &args.out)
                .with_context(|| format!("move artifact to '{}'", args.out.display()))?;
            tracing::info!(out = %args.out.display(), "done");
            Ok(())
        }
        JobState::Cancelled => anyhow::bail!("job was cancelled"),
        _ => {
            let detail = snapshot
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            anyhow::bail!("render failed: {detail}")
        }
    }
}

/// Move the artifact out of the artifact root. Rename when possible; across
/// filesystems fall back to copy, removing the source only after the copy
/// landed, so there is never a moment with zero copies and never a stale
/// duplicate left behind.
fn move_artifact(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}
