//! sitesync CLI
//!
//! Mirrors a local directory into a bucket and invalidates the CDN.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitesync::cloud::{CdnClient, ObjectStore};
use sitesync::sync::TransformPolicy;
use sitesync::{SyncEngine, SyncOptions, SyncReport};

#[derive(Parser, Debug)]
#[command(name = "sitesync")]
#[command(about = "Incrementally sync a directory to S3 and invalidate CloudFront")]
#[command(version)]
struct Args {
    /// Target bucket
    #[arg(env = "SITESYNC_BUCKET")]
    bucket: String,

    /// Local directory to upload
    #[arg(env = "SITESYNC_PATH")]
    path: String,

    /// Upload every file even when unchanged
    #[arg(short, long, env = "SITESYNC_FORCE")]
    force: bool,

    /// Number of concurrent upload workers
    #[arg(short, long, env = "SITESYNC_WORKERS", default_value = "4")]
    workers: usize,

    /// Domain whose CloudFront distribution is invalidated (defaults to the bucket name)
    #[arg(short, long, env = "SITESYNC_DOMAIN")]
    domain: Option<String>,

    /// Skip the CloudFront invalidation
    #[arg(long)]
    no_invalidate: bool,

    /// Compare and report, but upload nothing
    #[arg(long)]
    dry_run: bool,

    /// Cache-Control header for uploaded objects
    #[arg(long, env = "SITESYNC_CACHE_CONTROL", default_value = "max-age=900")]
    cache_control: String,

    /// Files larger than this many bytes are gzipped
    #[arg(long, default_value = "500")]
    compress_threshold: u64,

    /// Extra attempts for transient upload failures
    #[arg(long, env = "SITESYNC_RETRIES", default_value = "2")]
    retries: u32,

    /// Follow symbolic links while walking
    #[arg(long)]
    follow_links: bool,

    /// Custom S3 endpoint (R2, MinIO)
    #[arg(long, env = "SITESYNC_ENDPOINT")]
    endpoint: Option<String>,

    /// AWS region override
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "SITESYNC_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn to_options(&self) -> SyncOptions {
        let root = PathBuf::from(shellexpand::tilde(&self.path).to_string());
        let mut options = SyncOptions::new(self.bucket.clone(), root);
        options.domain = Some(self.domain.clone().unwrap_or_else(|| self.bucket.clone()));
        options.force = self.force;
        options.workers = self.workers.max(1);
        options.invalidate = !self.no_invalidate;
        options.dry_run = self.dry_run;
        options.cache_control = self.cache_control.clone();
        options.retries = self.retries;
        options.follow_links = self.follow_links;
        options.transform = TransformPolicy::default().with_threshold(self.compress_threshold);
        options
    }
}

#[cfg(feature = "cloud")]
async fn collaborators(args: &Args) -> (Arc<dyn ObjectStore>, Arc<dyn CdnClient>) {
    use sitesync::cloud::{CloudFrontCdn, S3Store};

    let store = S3Store::from_env(args.endpoint.as_deref(), args.region.as_deref()).await;
    let cdn = CloudFrontCdn::from_env().await;
    (Arc::new(store), Arc::new(cdn))
}

#[cfg(not(feature = "cloud"))]
async fn collaborators(_args: &Args) -> (Arc<dyn ObjectStore>, Arc<dyn CdnClient>) {
    use sitesync::cloud::{MemoryCdn, MemoryStore};

    tracing::warn!("Built without the `cloud` feature, syncing into memory");
    (Arc::new(MemoryStore::new()), Arc::new(MemoryCdn::new(Vec::new())))
}

fn print_report(report: &SyncReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for key in &report.changed_keys {
        println!("{}", key);
    }
    println!(
        "{} scanned, {} uploaded ({} bytes), {} unchanged, {} failed in {}ms",
        report.files_scanned,
        report.stats.uploaded,
        report.stats.bytes_uploaded,
        report.stats.skipped,
        report.stats.failed,
        report.duration_ms()
    );
    if let Some(id) = &report.invalidation_id {
        println!("Invalidation: {}", id);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<SyncReport> {
    let options = args.to_options();
    let (store, cdn) = collaborators(&args).await;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight uploads");
            on_signal.cancel();
        }
    });

    let engine = SyncEngine::new(store, cdn, options);
    let report = engine
        .run(cancel)
        .await
        .with_context(|| format!("sync of {} failed", args.path))?;
    print_report(&report, args.json)?;
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitesync=info"));
    let (text, json) = if args.log_json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            ),
            None,
        )
    };
    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .init();

    match run(args).await {
        Ok(report) if report.cancelled => ExitCode::from(130),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
