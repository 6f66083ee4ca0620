//! `apphub status` – show the local catalog.

use anyhow::{Context, Result};
use apphub_core::catalog::Catalog;
use apphub_core::config::UpdaterConfig;

pub fn run_status(cfg: &UpdaterConfig) -> Result<()> {
    let catalog = Catalog::load(&cfg.catalog_path)
        .with_context(|| format!("load catalog {}", cfg.catalog_path.display()))?;
    let apps = catalog.apps();
    if apps.is_empty() {
        println!("No applications in {}.", cfg.catalog_path.display());
        return Ok(());
    }
    println!("{:<16} {:<24} {:<10} {}", "ID", "NAME", "VERSION", "PATH");
    for app in apps {
        let version = if app.version.is_empty() { "-" } else { app.version.as_str() };
        let path = app
            .local_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<16} {:<24} {:<10} {}", app.id, app.name, version, path);
    }
    Ok(())
}
