//! Thermal Pipeline CLI
//!
//! Runs the pipeline against the built-in sensor emulator and writes
//! measurement logs to disk.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thermal_pipeline::{
    capture::EmulatedSensor,
    config::FileConfig,
    detection::SkinToneDetector,
    logging::{BackgroundLogSink, FileLogSink},
    metrics::PipelineMetrics,
    pipeline::{CameraPipeline, LatestFrameDisplay},
};
use tracing::{info, warn};

/// Thermal camera frame pipeline demo.
#[derive(Debug, Parser)]
#[command(name = "thermal-pipeline", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many frames have been processed.
    #[arg(short, long, default_value_t = 90)]
    frames: u64,

    /// Directory for measurement logs (overrides the config file).
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable face detection.
    #[arg(long)]
    no_faces: bool,

    /// Serve Prometheus metrics on this port (needs the `metrics` feature).
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Write the last displayed frame to this PNG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Thermal Pipeline v{}", thermal_pipeline::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        config.logging.directory = dir.clone();
    }
    if cli.no_faces {
        config.detection.enabled = false;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.enabled = true;
        config.metrics.port = port;
    }

    if let Err(e) = run(&cli, &config) {
        eprintln!("Pipeline failed: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &FileConfig) -> Result<(), Box<dyn std::error::Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    let sensor = EmulatedSensor::new(config.sensor.clone())?;
    let file_sink = Arc::new(FileLogSink::new(&config.logging.directory));
    let log_sink = Arc::new(BackgroundLogSink::spawn(file_sink, config.logging.queue_size)?);
    let display = Arc::new(LatestFrameDisplay::new());
    let metrics = Arc::new(PipelineMetrics::new()?);

    let mut builder = CameraPipeline::builder(config.pipeline_config(), Box::new(sensor))
        .display(display.clone())
        .log_sink(log_sink.clone())
        .metrics(Arc::clone(&metrics));
    if config.detection.enabled {
        builder = builder.detector(Arc::new(SkinToneDetector::default()));
    }
    let mut pipeline = builder.build()?;

    if config.metrics.enabled {
        spawn_metrics_server(Arc::clone(&metrics), config.metrics.port);
    }

    info!(
        directory = %config.logging.directory.display(),
        frames = cli.frames,
        "Streaming from emulator"
    );
    pipeline.start()?;

    let started = Instant::now();
    while !stop.load(Ordering::SeqCst)
        && pipeline.metrics_snapshot().frames_processed < cli.frames
    {
        std::thread::sleep(Duration::from_millis(50));
    }
    pipeline.stop();
    log_sink.shutdown();

    let snapshot = pipeline.metrics_snapshot();
    let delivered = display.delivered();
    info!(
        processed = snapshot.frames_processed,
        dropped = snapshot.frames_dropped,
        delivered = delivered,
        faces_attached = snapshot.detections_attached,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );
    if let Some(stats) = pipeline.latest_stats() {
        println!("{}", stats.summary(pipeline.settings().snapshot().unit));
    }

    if let Some(path) = &cli.snapshot {
        match display.latest() {
            Some(bundle) => {
                bundle.composited().save(path)?;
                info!(path = %path.display(), sequence = bundle.sequence, "Snapshot written");
                for label in bundle.labels() {
                    info!(
                        kind = ?label.kind,
                        x = label.anchor.x,
                        y = label.anchor.y,
                        "{}",
                        label.text
                    );
                }
            }
            None => warn!("No frame was displayed; snapshot skipped"),
        }
    }
    Ok(())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(metrics: Arc<PipelineMetrics>, port: u16) {
    use thermal_pipeline::metrics::{MetricsServer, MetricsServerConfig};

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), metrics);
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(_metrics: Arc<PipelineMetrics>, port: u16) {
    warn!(port, "Built without the `metrics` feature; exporter not started");
}
