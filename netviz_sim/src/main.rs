//! NetViz playback CLI
//!
//! Replays a directory of geolocated probe traces against a simulated clock.

use clap::Parser;
use netviz_core::{GroupingStrategy, TimeStamp};
use netviz_env::{GeoLocator, TableGeoLocator, UnavailableGeoLocator};
use netviz_sim::synth::default_geo_table;
use netviz_sim::{
    ArgsFile, ConfigError, ExportRenderer, PlaybackConfig, PlaybackReport, PlaybackRunner,
    RendererSet, RerunRenderer, RunError, SynthConfig, TraceSynthesizer,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// NetViz trace playback
#[derive(Parser, Debug)]
#[command(name = "netviz-sim")]
#[command(about = "Replay geolocated network-probe traces on a simulated clock", long_about = None)]
struct Args {
    /// Ordered args file (dir, protocol, start, end, secs/day, [ms], [sec])
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trace directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Protocol filter: ALL or a tag such as TCP, ICMP, WEB [default: ALL]
    #[arg(short, long)]
    protocol: Option<String>,

    /// First file name to play (inclusive), e.g. 20_01_01-00:00
    #[arg(long)]
    start: Option<String>,

    /// Last file name to play (inclusive); equal to --start for a snapshot
    #[arg(long)]
    end: Option<String>,

    /// Animation seconds per simulated day
    #[arg(short = 's', long)]
    seconds_per_day: Option<u32>,

    /// Ticks per second [default: 10]
    #[arg(short, long)]
    frame_rate: Option<u32>,

    /// Response ceiling for network probes, milliseconds [default: 1000]
    #[arg(long)]
    max_response_ms: Option<f64>,

    /// Response ceiling for web requests, seconds [default: 15]
    #[arg(long)]
    max_response_sec: Option<f64>,

    /// Batching strategy (per-file, run-length) [default: per-file]
    #[arg(short, long)]
    grouping: Option<GroupingStrategy>,

    /// Merge co-located events before playback
    #[arg(long)]
    consolidate: bool,

    /// Geolocation table (ip, lat, lon); defaults to <dir>/geo.tsv
    #[arg(long)]
    geo_table: Option<PathBuf>,

    /// Pace ticks at the frame rate instead of fast-forwarding
    #[arg(long)]
    realtime: bool,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Export released events to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Stream released events to a Rerun viewer (needs the visualization feature)
    #[arg(long)]
    rerun: bool,

    /// JSON report on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Write this many synthetic trace files into --dir and exit
    #[arg(long)]
    synthesize: Option<usize>,

    /// Seed for --synthesize
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Builds the playback configuration: args file first, flags on top.
fn resolve_config(args: &Args) -> Result<PlaybackConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => PlaybackConfig::from(ArgsFile::load(path)?),
        None => PlaybackConfig::default(),
    };

    if let Some(dir) = &args.dir {
        config.directory = dir.clone();
    }
    if let Some(protocol) = &args.protocol {
        config.protocol = protocol.parse().unwrap_or_default();
    }
    if let Some(start) = &args.start {
        config.start = start.clone();
    }
    if let Some(end) = &args.end {
        config.end = end.clone();
    }
    if let Some(seconds) = args.seconds_per_day {
        config.seconds_per_day = seconds;
    }
    if let Some(frame_rate) = args.frame_rate {
        config.frame_rate = frame_rate;
    }
    if let Some(ms) = args.max_response_ms {
        config.ceilings.max_response_ms = ms;
    }
    if let Some(sec) = args.max_response_sec {
        config.ceilings.max_response_sec = sec;
    }
    if let Some(grouping) = args.grouping {
        config.grouping = grouping;
    }
    config.consolidate |= args.consolidate;

    Ok(config)
}

/// Opens the geolocation table, falling back to a locator that always misses.
fn open_geo(args: &Args, config: &PlaybackConfig) -> Box<dyn GeoLocator> {
    let path = match &args.geo_table {
        Some(path) => path.clone(),
        None => {
            let path = default_geo_table(&config.directory);
            if !path.is_file() {
                warn!("No geolocation table given and {} not found", path.display());
                return Box::new(UnavailableGeoLocator::new());
            }
            path
        }
    };

    match TableGeoLocator::from_file(&path) {
        Ok(table) => {
            info!("Geolocation: {} entries from {}", table.len(), path.display());
            Box::new(table)
        }
        Err(e) => {
            error!("Cannot open geolocation table: {}", e);
            Box::new(UnavailableGeoLocator::new())
        }
    }
}

fn synthesize(args: &Args, config: &PlaybackConfig, files: usize) -> Result<(), String> {
    if config.directory.as_os_str().is_empty() {
        return Err("--synthesize needs --dir".to_string());
    }
    let start = TimeStamp::parse(&config.start)
        .map_err(|e| format!("--synthesize needs a valid --start: {}", e))?;

    let synth_config = SynthConfig::new(&config.directory, start, files, args.seed);
    let summary = TraceSynthesizer::new(synth_config)
        .write()
        .map_err(|e| format!("Cannot write synthetic traces: {}", e))?;

    if let (Some(first), Some(last)) = (summary.files.first(), summary.files.last()) {
        info!(
            "Play with: netviz-sim --dir {} --start {} --end {} --seconds-per-day 12",
            config.directory.display(),
            first.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            last.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
        );
    }
    Ok(())
}

fn play(args: &Args, config: PlaybackConfig) -> Result<PlaybackReport, RunError> {
    config.validate()?;
    let geo = open_geo(args, &config);

    let mut exporter = args
        .export
        .as_ref()
        .map(|_| ExportRenderer::new(&config.start, &config.end));
    let mut viewer = if args.rerun {
        Some(RerunRenderer::new("netviz"))
    } else {
        None
    };

    let mut runner = PlaybackRunner::new(config);
    if let Some(max) = args.max_ticks {
        runner = runner.with_max_ticks(max);
    }

    let report = {
        let mut renderers = RendererSet::new();
        if let Some(exporter) = exporter.as_mut() {
            renderers = renderers.with(exporter);
        }
        if let Some(viewer) = viewer.as_mut().filter(|v| v.is_enabled()) {
            renderers = renderers.with(viewer);
        }

        if args.realtime {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(runner.run_realtime(&*geo, &mut renderers))?
        } else {
            runner.run(&*geo, &mut renderers)?
        }
    };

    if let (Some(path), Some(exporter)) = (&args.export, exporter) {
        let export = exporter.into_export();
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path.display()),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    Ok(report)
}

fn print_report(report: &PlaybackReport) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "Ingest: {} files read ({} skipped), {} lines, {} records kept, {} filtered, {} malformed",
        report.ingest.files_read,
        report.ingest.files_skipped,
        report.ingest.lines_read,
        report.ingest.records_retained,
        report.ingest.records_filtered,
        report.ingest.lines_malformed,
    );
    info!(
        "Playback: {} ticks (+{} min), clock {}, {} batches, {} events",
        report.ticks, report.minutes_per_tick, report.final_clock, report.batches_released, report.events_released,
    );
    info!(
        "Outcomes: {} measured, {} unreached, {} fallback, {} consolidated, {} off-map",
        report.outcomes.measured,
        report.outcomes.unreached,
        report.outcomes.fallback,
        report.outcomes.consolidated,
        report.outcomes.off_map,
    );
    if !report.geo_available {
        warn!("Geolocation unavailable: all events drawn off-map");
    }
    if report.snapshot_requested {
        info!("Snapshot requested: {}", report.label);
    }
    if report.truncated {
        warn!("Stopped early with {} batches pending", report.pending_batches);
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("NetViz playback v{}", env!("CARGO_PKG_VERSION"));
    }

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(files) = args.synthesize {
        if let Err(e) = synthesize(&args, &config, files) {
            error!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    let report = match play(&args, config) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Cannot serialize report: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print_report(&report);
    }
}
