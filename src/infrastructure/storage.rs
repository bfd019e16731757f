use crate::config::AnalyzerConfig;
use crate::services::staging::StagingArea;
use tracing::info;

/// Prepares the scratch directory for staged videos.
pub fn setup_staging(config: &AnalyzerConfig) -> anyhow::Result<StagingArea> {
    let staging = StagingArea::new(&config.staging_dir);
    staging.ensure_dir().map_err(|e| {
        anyhow::anyhow!(
            "cannot create staging directory {}: {}",
            config.staging_dir.display(),
            e
        )
    })?;

    info!("📂 Staging directory: {}", staging.dir().display());
    Ok(staging)
}
