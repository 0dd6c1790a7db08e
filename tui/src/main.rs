//! Spanboard Demo
//!
//! Runs a few concurrent fake services under a live dashboard so capture,
//! relevance selection and the final stdout replay can be watched.
//!
//! # Usage
//!
//! ```bash
//! spanboard-demo
//!
//! # Shorter run, custom config
//! spanboard-demo --scale 0.2 --config ./spanboard.toml
//!
//! # Verbose library logs (written to stderr)
//! RUST_LOG=spanboard_tui=debug spanboard-demo 2>demo.log
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spanboard_core::{load_config, load_config_from_path, SpanContext, SpanOptions};
use spanboard_tui::{capture_output, release_output, set_global_terminal, start_span, Terminal};

/// Spanboard demo - concurrent services under a live dashboard
#[derive(Parser, Debug)]
#[command(name = "spanboard-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "SPANBOARD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Multiplier for the number of jobs each service runs
    #[arg(short = 's', long, default_value_t = 1.0)]
    scale: f64,
}

fn main() -> Result<()> {
    // stdout is captured by the dashboard, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spanboard_demo=info,spanboard_tui=info,spanboard_core=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => load_config_from_path(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config().context("Failed to load config")?,
    };

    let terminal = Terminal::new(config).context("Failed to attach to stdout")?;
    set_global_terminal(terminal);
    capture_output().context("Failed to capture stdout")?;

    info!(scale = args.scale, "demo started");
    run_root(&SpanContext::background(), Jobs::scaled(args.scale));

    release_output();
    info!("demo finished");
    Ok(())
}

/// Job counts for each service
#[derive(Clone, Copy, Debug)]
struct Jobs {
    service_a: usize,
    service_a_fork: usize,
    service_c: usize,
}

impl Jobs {
    fn scaled(scale: f64) -> Self {
        Self {
            service_a: scale_count(1000.0, scale),
            service_a_fork: scale_count(300.0, scale),
            service_c: scale_count(2500.0, scale),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_count(base: f64, scale: f64) -> usize {
    (base * scale.max(0.0)).round() as usize
}

#[allow(clippy::cast_precision_loss)]
fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}

fn run_root(ctx: &SpanContext, jobs: Jobs) {
    let (ctx, span) = start_span(ctx, "root", SpanOptions::new());
    span.write("Hello, root in");
    println!("root started");

    thread::scope(|scope| {
        scope.spawn(|| run_service_a(&ctx, jobs));
        scope.spawn(|| run_service_b(&ctx, jobs));
    });

    println!("root done");
    span.end();
}

fn run_service_a(ctx: &SpanContext, jobs: Jobs) {
    let (ctx, span) = start_span(ctx, "service A", SpanOptions::new());
    span.write("start A");

    thread::scope(|scope| {
        scope.spawn(|| run_service_a_fork(&ctx, jobs));

        for i in 0..=jobs.service_a {
            span.write(format!("making job {i}"));
            span.set_progress(fraction(i, jobs.service_a));
            if i % 100 == 0 {
                println!("service A reached job {i}");
            }
            thread::sleep(Duration::from_millis(5));
        }
    });

    span.write("end A");
    span.end();
}

fn run_service_a_fork(ctx: &SpanContext, jobs: Jobs) {
    let (ctx, span) = start_span(ctx, "service A (fork)", SpanOptions::new());
    span.write("start A fork");

    for i in 0..=jobs.service_a_fork {
        span.write(format!("making FF job {i}"));
        span.set_progress(fraction(i, jobs.service_a_fork));

        if i % 50 == 0 {
            let (_, batch) = start_span(&ctx, format!("batch {}", i / 50), SpanOptions::new());
            batch.write(format!("flushing batch at job {i}"));
            batch.end();
        }
        thread::sleep(Duration::from_millis(5));
    }

    span.write("end A fork");
    span.end();
}

fn run_service_b(ctx: &SpanContext, jobs: Jobs) {
    let (ctx, span) = start_span(ctx, "service B", SpanOptions::new());
    span.write("b start");

    run_service_c(&ctx, jobs);

    span.write("b done");
    span.end();
}

fn run_service_c(ctx: &SpanContext, jobs: Jobs) {
    let (_, span) = start_span(
        ctx,
        "service C",
        SpanOptions::new().with_initial_progress(0.0),
    );
    span.write("start C");

    for i in 0..=jobs.service_c {
        span.write(format!("making c job {i}"));
        span.set_progress(fraction(i, jobs.service_c));
        thread::sleep(Duration::from_millis(1));
    }

    span.write("end C");
    span.end();
}
