use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "panelwave", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved panel reading order.
    Order(OrderArgs),
    /// Build the chapter timeline without synthesizing audio.
    Plan(PlanArgs),
    /// Run the full chapter pipeline with pre-rendered fragments.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct OrderArgs {
    /// Input chapter JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Pipeline configuration JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input chapter JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output timeline JSON.
    #[arg(long)]
    out: PathBuf,

    /// Pipeline configuration JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity snapshot from an earlier chapter of the same title.
    #[arg(long)]
    identities: Option<PathBuf>,

    /// Write the identity snapshot after this chapter.
    #[arg(long)]
    identities_out: Option<PathBuf>,

    /// Write the deduplicated synthesis request manifest.
    #[arg(long)]
    requests: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input chapter JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory holding `<fingerprint>.wav` fragments.
    #[arg(long)]
    fragments: PathBuf,

    /// Output mix. `.f32le` writes raw samples, anything else a WAV file.
    #[arg(long)]
    out: PathBuf,

    /// Pipeline configuration JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity snapshot from an earlier chapter of the same title.
    #[arg(long)]
    identities: Option<PathBuf>,

    /// Write the identity snapshot after this chapter.
    #[arg(long)]
    identities_out: Option<PathBuf>,

    /// Write the degraded-event report.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the timeline JSON as well.
    #[arg(long)]
    timeline: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Order(args) => cmd_order(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<panelwave::PipelineConfig> {
    match path {
        Some(p) => panelwave::PipelineConfig::from_path(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(panelwave::PipelineConfig::default()),
    }
}

fn load_chapter(path: &Path) -> anyhow::Result<panelwave::ChapterInput> {
    let chapter = panelwave::ChapterInput::from_path(path)
        .with_context(|| format!("load chapter '{}'", path.display()))?;
    chapter.validate()?;
    Ok(chapter)
}

fn load_store(path: Option<&Path>) -> anyhow::Result<panelwave::IdentityStore> {
    match path {
        Some(p) => {
            let snapshot = panelwave::IdentitySnapshot::from_path(p)
                .with_context(|| format!("load identity snapshot '{}'", p.display()))?;
            Ok(panelwave::IdentityStore::from_snapshot(&snapshot)?)
        }
        None => Ok(panelwave::IdentityStore::new()),
    }
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("write '{}'", path.display()))
}

fn write_snapshot(store: &panelwave::IdentityStore, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(p) = path {
        write_text(p, &store.snapshot().to_json_pretty()?)?;
    }
    Ok(())
}

fn cmd_order(args: OrderArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let chapter = load_chapter(&args.in_path)?;
    let order = panelwave::ReadingOrderResolver::new(&cfg.layout).resolve_chapter(&chapter);
    for panel in &order.panels {
        let marker = if panel.synthetic { " (synthetic)" } else { "" };
        println!(
            "{}\tpage {}\t{}{marker}",
            panel.ordinal.0, panel.page.0, panel.id
        );
    }
    for (a, b) in &order.spreads {
        println!("spread\tpages {} + {}", a.0, b.0);
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let chapter = load_chapter(&args.in_path)?;
    let mut store = load_store(args.identities.as_deref())?;

    let plan = panelwave::plan_chapter(&cfg, &mut store, &chapter)?;
    write_text(&args.out, &plan.timeline.to_json_pretty()?)?;

    if let Some(p) = &args.requests {
        let manifest = panelwave::RequestManifest::build(&plan.timeline, &cfg.timeline);
        write_text(p, &manifest.to_json_pretty()?)?;
        eprintln!("wrote {} synthesis requests to {}", manifest.len(), p.display());
    }
    write_snapshot(&store, args.identities_out.as_deref())?;

    println!(
        "{} panels, {} events, {:.3}s",
        plan.timeline.panels.len(),
        plan.timeline.events.len(),
        plan.timeline.total_duration
    );
    for (method, count) in plan.attribution_summary() {
        println!("{method:?}: {count}");
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let chapter = load_chapter(&args.in_path)?;
    let mut store = load_store(args.identities.as_deref())?;

    let synth = Arc::new(panelwave::DirectorySynthesizer::new(&args.fragments));
    let out = panelwave::run_chapter(&cfg, &mut store, &chapter, synth)?;

    if args.out.extension().is_some_and(|e| e == "f32le") {
        out.mix.write_f32le(&args.out)?;
    } else {
        out.mix.write_wav(&args.out)?;
    }
    if let Some(p) = &args.report {
        write_text(p, &out.mix.degraded.to_json_pretty()?)?;
    }
    if let Some(p) = &args.timeline {
        write_text(p, &out.plan.timeline.to_json_pretty()?)?;
    }
    write_snapshot(&store, args.identities_out.as_deref())?;

    println!(
        "{:.3}s at {} Hz x {}, {} degraded events",
        out.mix.duration_secs(),
        out.mix.sample_rate,
        out.mix.channels,
        out.mix.degraded.len()
    );
    Ok(())
}
