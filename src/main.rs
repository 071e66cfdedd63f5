// SPDX-License-Identifier: MIT
//! `policystream` CLI — policy changes from git history.
//!
//! Two subcommands:
//!
//! - `diff` — one-shot comparison of two revisions; writes the changed
//!   policies as a YAML document.
//! - `stream` — incremental walk of the full history (or a bounded recent
//!   window), delivering every change to the selected sink.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use policystream::policy::{ChangeKind, PolicyChange};
use policystream::repo::{checkout, PolicyRepo};
use policystream::transport::{self, RelaySession};

#[derive(Parser)]
#[command(
    name = "policystream",
    about = "Policy changes from git history",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose (debug-level) logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show policy changes between two revisions as a YAML document.
    ///
    /// The common form compares the heads of two branches.
    Diff {
        /// Repository path or URI (discovered from the working directory
        /// when omitted).
        #[arg(long, short = 'r')]
        repo_uri: Option<String>,

        /// Source/baseline revision spec.
        #[arg(long, default_value = "master")]
        source: String,

        /// Target revision spec (default: repository HEAD).
        #[arg(long)]
        target: Option<String>,

        /// Output file (default: stdout).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Stream policy changes to a destination sink.
    Stream {
        /// Repository path or URI; http(s)/git@ URIs are cloned into a
        /// scratch checkout that is removed afterwards.
        #[arg(long, short = 'r')]
        repo_uri: Option<String>,

        /// Sink: `stdout`, `json`, or a fully-qualified stream/queue ARN.
        #[arg(long, short = 's', default_value = "stdout")]
        stream_uri: String,

        /// Only walk the most recent N commits.
        #[arg(long)]
        limit: Option<usize>,

        /// Role to assume for sink delivery.
        #[arg(long)]
        assume: Option<String>,

        /// Batch relay endpoint used for ARN sinks.
        #[arg(
            long,
            env = "POLICYSTREAM_RELAY_URL",
            default_value = "https://relay.policystream.dev"
        )]
        relay_url: String,

        /// Bearer token for the relay endpoint.
        #[arg(long, env = "POLICYSTREAM_RELAY_TOKEN", hide_env_values = true)]
        relay_token: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "policystream=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("POLICYSTREAM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the change stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Diff {
            repo_uri,
            source,
            target,
            output,
        } => run_diff(repo_uri, source, target, output).await,
        Command::Stream {
            repo_uri,
            stream_uri,
            limit,
            assume,
            relay_url,
            relay_token,
        } => run_stream(repo_uri, stream_uri, limit, assume, relay_url, relay_token).await,
    }
}

// ─── diff ────────────────────────────────────────────────────────────────────

async fn run_diff(
    repo_uri: Option<String>,
    source: String,
    target: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    // git2 is sync; keep object access off the async runtime.
    let changes = tokio::task::spawn_blocking(move || -> Result<Vec<PolicyChange>> {
        let (git, uri) = checkout::acquire(repo_uri.as_deref())?;
        let repo = PolicyRepo::new(uri, git);
        let target = target.unwrap_or_else(|| "HEAD".to_string());
        repo.delta_commits(&source, &target)
    })
    .await
    .context("diff worker panicked")??;

    // The diff form is a runnable policy document: every changed policy that
    // still exists on the target side.
    let policies: Vec<serde_yaml::Value> = changes
        .iter()
        .filter(|c| c.kind != ChangeKind::Removed)
        .map(|c| c.policy.body.clone())
        .collect();
    let document = serde_yaml::to_string(&serde_yaml::Value::Mapping(
        [(
            serde_yaml::Value::from("policies"),
            serde_yaml::Value::Sequence(policies),
        )]
        .into_iter()
        .collect(),
    ))?;

    match output {
        Some(path) => tokio::fs::write(&path, document)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{document}"),
    }
    Ok(())
}

// ─── stream ──────────────────────────────────────────────────────────────────

async fn run_stream(
    repo_uri: Option<String>,
    stream_uri: String,
    limit: Option<usize>,
    assume: Option<String>,
    relay_url: String,
    relay_token: Option<String>,
) -> Result<()> {
    let session = RelaySession::new(relay_url, relay_token, assume)?;
    let mut sink = transport::resolve(&stream_uri, &session)?;

    // Producer: the sequential walk on a blocking thread. Consumer: sink
    // delivery on the runtime. The bounded channel preserves FIFO order and
    // applies backpressure when the sink is flushing.
    let (tx, mut rx) = mpsc::channel::<PolicyChange>(64);
    let walker = tokio::task::spawn_blocking(move || -> Result<()> {
        let (git, uri) = checkout::acquire(repo_uri.as_deref())?;
        let mut repo = PolicyRepo::new(uri, git);
        for change in repo.delta_stream("HEAD", limit)? {
            let change = change?;
            if tx.blocking_send(change).is_err() {
                // Consumer hung up (delivery failure); its error wins.
                break;
            }
        }
        Ok(())
    });

    let mut change_count: u64 = 0;
    let mut delivery_result: Result<()> = Ok(());
    while let Some(change) = rx.recv().await {
        if let Err(e) = sink.send(change).await {
            delivery_result = Err(e.into());
            break;
        }
        change_count += 1;
    }
    drop(rx);

    walker.await.context("walk worker panicked")??;
    delivery_result?;
    sink.close().await?;

    info!(changes = change_count, "streamed policy changes");
    Ok(())
}
