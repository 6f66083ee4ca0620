//! `apphub check` – list available updates without installing anything.

use std::sync::Arc;

use anyhow::Result;
use apphub_core::config::UpdaterConfig;
use apphub_core::orchestrator::Updater;

pub async fn run_check(cfg: UpdaterConfig, json: bool) -> Result<()> {
    let updater = Arc::new(tokio::task::spawn_blocking(move || Updater::from_config(cfg)).await??);
    let report = {
        let updater = Arc::clone(&updater);
        tokio::task::spawn_blocking(move || updater.check()).await??
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.candidates.is_empty() {
        println!("All {} application(s) are up to date.", report.up_to_date.len());
        return Ok(());
    }
    println!("{:<16} {:<12} {:<12} {}", "ID", "INSTALLED", "AVAILABLE", "FILE");
    for c in &report.candidates {
        let installed = if c.app.version.is_empty() { "-" } else { c.app.version.as_str() };
        println!(
            "{:<16} {:<12} {:<12} {}",
            c.app.id, installed, c.entry.version, c.entry.filename
        );
    }
    println!(
        "{} update(s) available, {} up to date.",
        report.candidates.len(),
        report.up_to_date.len()
    );
    Ok(())
}
