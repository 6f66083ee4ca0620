//! `apphub update` – run a check-and-update batch, printing progress.
//! Ctrl-C stops new updates from starting; running ones finish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use apphub_core::config::UpdaterConfig;
use apphub_core::orchestrator::{BatchSummary, PipelineState, ProgressEvent, Updater};
use apphub_core::shell::{spawn_check_and_update, DEFAULT_EVENT_CAPACITY};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_update(cfg: UpdaterConfig, only: Vec<String>, json: bool) -> Result<()> {
    let updater = Arc::new(tokio::task::spawn_blocking(move || Updater::from_config(cfg)).await??);
    let mut handle = spawn_check_and_update(updater, only, DEFAULT_EVENT_CAPACITY);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelled = false;
    let mut printer = ProgressPrinter::default();
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => {
                    if !json {
                        printer.print(&event);
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c, if !cancelled => {
                cancelled = true;
                eprintln!("Cancelling: no new updates will start, running ones will finish.");
                handle.cancel();
            }
        }
    }
    let summary = handle.finish().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    if summary.has_failures() {
        bail!("{} update(s) failed", summary.failed.len());
    }
    Ok(())
}

/// Per-application progress lines, with byte counts rate-limited.
#[derive(Default)]
struct ProgressPrinter {
    last_transfer: HashMap<String, Instant>,
}

impl ProgressPrinter {
    fn print(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::State {
                app_id,
                state,
                error,
            } => {
                match (state, error) {
                    (PipelineState::Done { ok: false }, Some(failure)) => {
                        println!("  [{app_id}] failed: {failure}")
                    }
                    _ => println!("  [{app_id}] {state}"),
                }
                if state.is_done() {
                    self.last_transfer.remove(app_id);
                }
            }
            ProgressEvent::Transfer {
                app_id,
                bytes,
                total,
            } => {
                let now = Instant::now();
                let finished = total.is_some_and(|t| *bytes >= t);
                let due = self
                    .last_transfer
                    .get(app_id)
                    .map_or(true, |last| now.duration_since(*last) >= PROGRESS_INTERVAL);
                if !(due || finished) {
                    return;
                }
                self.last_transfer.insert(app_id.clone(), now);
                let done_mib = *bytes as f64 / 1_048_576.0;
                match total {
                    Some(t) if *t > 0 => println!(
                        "  [{app_id}] {:.1} / {:.1} MiB ({:.0}%)",
                        done_mib,
                        *t as f64 / 1_048_576.0,
                        *bytes as f64 * 100.0 / *t as f64
                    ),
                    _ => println!("  [{app_id}] {:.1} MiB", done_mib),
                }
            }
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    let (updated, failed, up_to_date) = summary.counts();
    for u in &summary.updated {
        println!("updated     {} -> {}", u.app_id, u.version);
    }
    for f in &summary.failed {
        println!("failed      {} ({}): {}", f.app_id, f.failure.kind, f.failure.message);
    }
    println!("{updated} updated, {failed} failed, {up_to_date} up to date.");
    if summary.has_transient_failures() {
        println!("Some failures were network faults or cancellations; run `apphub update` again to retry.");
    }
}
