//! `pageflow replay`: push a recorded mutation timeline through the scheduler.

use anyhow::Result;
use pageflow_client::{CallOutcome, Scheduler};
use pageflow_core::{AppConfig, Error};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, clap::Args)]
pub struct ReplayArgs {
    /// Window length in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub wait: u64,

    /// Call offsets in milliseconds from the start of the replay.
    #[arg(required = true, num_args = 1..)]
    pub at: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplayCall {
    pub at_ms: u64,
    pub outcome: CallOutcome,
}

/// One handler run: when it happened and which call's arguments it saw.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplayRun {
    pub at_ms: u64,
    pub call: usize,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub wait_ms: u64,
    pub calls: Vec<ReplayCall>,
    pub runs: Vec<ReplayRun>,
}

pub async fn run(config: &AppConfig, args: ReplayArgs) -> Result<Value> {
    let scheduler = Scheduler::from_config(&config.scheduler)?;
    let report = replay(&scheduler, Duration::from_millis(args.wait), args.at).await?;
    Ok(serde_json::to_value(report)?)
}

/// Call a recording handler at each offset, then wait for every window to close.
pub async fn replay(scheduler: &Scheduler, wait: Duration, mut offsets: Vec<u64>) -> Result<ReplayReport> {
    offsets.sort_unstable();

    let start = Instant::now();
    let runs = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let runs = runs.clone();
        move |call: usize| -> Result<(), Error> {
            let at_ms = start.elapsed().as_millis() as u64;
            tracing::debug!(call, at_ms, "handler ran");
            runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(ReplayRun { at_ms, call });
            Ok(())
        }
    };
    let debounced = scheduler.schedule("replay", wait, handler);

    let mut calls = Vec::with_capacity(offsets.len());
    for (index, at_ms) in offsets.into_iter().enumerate() {
        tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
        let outcome = debounced.call(index)?;
        calls.push(ReplayCall { at_ms, outcome });
    }

    while !scheduler.is_idle() {
        tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
    }

    let runs = runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone();
    Ok(ReplayReport { wait_ms: wait.as_millis() as u64, calls, runs })
}
