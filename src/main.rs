use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use humantime::format_duration;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scroll_stage::config;
use scroll_stage::events::StageEvent;
use scroll_stage::geometry::{SharedViewport, Viewport};
use scroll_stage::simulate::{self, PageRecord, VirtualHost, VirtualPage};
use scroll_stage::stage::Stage;
use scroll_stage::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "scroll-stage",
    version,
    about = "scroll-driven gallery engine, dry-run over a virtual page"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Number of scroll steps from the top of the page to the bottom
    #[arg(long, value_name = "STEPS", default_value_t = 20)]
    sweep: usize,
    /// Override the configured viewport, e.g. 1280x800
    #[arg(long, value_name = "WxH", value_parser = parse_viewport)]
    viewport: Option<Viewport>,
    /// Only mount the named section
    #[arg(long, value_name = "NAME")]
    section: Option<String>,
    /// Treat every asset as already loaded instead of decoding frames
    #[arg(long = "no-preload")]
    no_preload: bool,
    /// After the sweep, jump straight to the named section
    #[arg(long = "jump-to", value_name = "NAME")]
    jump_to: Option<String>,
}

fn parse_viewport(raw: &str) -> Result<Viewport> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got {raw:?}"))?;
    let viewport = Viewport::new(
        w.trim().parse().context("invalid viewport width")?,
        h.trim().parse().context("invalid viewport height")?,
    );
    if viewport.is_degenerate() {
        bail!("viewport must have positive dimensions");
    }
    Ok(viewport)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct SweepLine {
    step: usize,
    scroll_y: f32,
    #[serde(flatten)]
    record: PageRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let Args {
        config,
        sweep,
        viewport,
        section,
        no_preload,
        jump_to,
    } = Args::parse();

    let mut cfg = config::Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if let Some(viewport) = viewport {
        cfg.viewport = viewport;
    }
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let page = VirtualPage::new(cfg.viewport);
    let mut stage = Stage::new(cfg.stage_settings(), SharedViewport::new(cfg.viewport));
    let placed = simulate::mount_sections(&mut stage, &cfg, &page, section.as_deref())?;
    tracing::info!(
        sections = placed.len(),
        page_height = page.total_height(),
        "sections mounted"
    );

    let (events_tx, events_rx) = mpsc::channel::<StageEvent>(64);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    if no_preload {
        for placed in &placed {
            stage.assume_assets_ready(placed.id);
        }
    }

    let mut tasks = JoinSet::new();

    // Stage driver
    tasks.spawn({
        let cancel = cancel.clone();
        let frame_interval = cfg.frame_interval;
        async move {
            tasks::driver::run(stage, events_rx, cancel, frame_interval)
                .await
                .context("driver task failed")
        }
    });

    simulate::announce_media(&events_tx, &cfg, &placed)
        .await
        .context("failed to report media durations")?;

    // Frame loaders
    let mut loaders = JoinSet::new();
    if !no_preload {
        for request in placed.iter().filter_map(|placed| placed.load_request()) {
            let events_tx = events_tx.clone();
            let cancel = cancel.clone();
            let max_in_flight = cfg.loader_max_concurrent_decodes;
            loaders.spawn(async move {
                tasks::loader::run(request, events_tx, cancel, max_in_flight)
                    .await
                    .context("loader task failed")
            });
        }
    }
    while let Some(res) = loaders.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    let started = Instant::now();
    let mut host = VirtualHost::new(
        page.clone(),
        events_tx,
        placed,
        cfg.activation_margin_px,
    );
    let steps = sweep.max(1);
    let max_scroll = page.max_scroll();
    let mut stats = host.flush().await?;
    for step in 0..=steps {
        if cancel.is_cancelled() {
            break;
        }
        let scroll_y = max_scroll * step as f32 / steps as f32;
        stats = host.scroll_to(scroll_y).await?;
        for record in page.drain_records() {
            let line = SweepLine {
                step,
                scroll_y,
                record,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    if let Some(name) = jump_to.filter(|_| !cancel.is_cancelled()) {
        stats = host.jump_to(&name).await?;
        let scroll_y = page.scroll_y();
        for record in page.drain_records() {
            let line = SweepLine {
                step: steps + 1,
                scroll_y,
                record,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    tracing::info!(
        steps,
        frames = stats.frames,
        geometry_reads = stats.geometry_reads,
        style_writes = stats.style_writes,
        elapsed = %format_duration(started.elapsed()),
        "sweep complete"
    );
    drop(host);

    cancel.cancel();
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
