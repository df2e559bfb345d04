use anyhow::{Context, Result};
use reqwest::Client;
use skuingest::periods::source::{HttpPeriodFetch, PeriodSource};
use skuingest::session::IngestSession;
use skuingest::table::DEFAULT_PREVIEW_ROWS;
use skuingest::upload::HttpUploadSink;
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Drives one ingestion session end to end: load periods, parse the file
/// named on the command line, log a bounded preview, submit.
#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let file = env::args()
        .nth(1)
        .context("usage: skuingest <file.csv|file.xlsx|file.xls>")?;
    let base: Url = env::var("PERIOD_API_BASE")
        .unwrap_or_else(|_| "http://localhost:3000/api/".to_string())
        .parse()
        .context("PERIOD_API_BASE is not a valid URL")?;
    let upload_url: Url = match env::var("UPLOAD_URL") {
        Ok(u) => u.parse().context("UPLOAD_URL is not a valid URL")?,
        Err(_) => base.join("sku-details-upload")?,
    };
    let source_id = env::var("SOURCE_CODE").unwrap_or_default();
    let source_label = env::var("SOURCE_DESC").unwrap_or_default();

    let client = Client::new();
    let mut session = IngestSession::new(
        source_id,
        source_label,
        PeriodSource::new(HttpPeriodFetch::new(client.clone(), base)),
        HttpUploadSink::new(client, upload_url),
    );

    // ─── 3) periods: fetch, normalize, auto-select ───────────────────
    session.load_periods().await;
    for period in session.periods() {
        info!(id = %period.id, label = %period.label, "period on offer");
    }
    info!(
        from = %session.selection().from_period_id,
        to = %session.selection().to_period_id,
        "default selection"
    );

    // ─── 4) parse the file and show a preview ────────────────────────
    let bytes = std::fs::read(&file).with_context(|| format!("reading {file}"))?;
    let name = std::path::Path::new(&file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.clone());
    session.select_file(bytes, &name).await?;

    if let Some(table) = session.table() {
        info!(rows = table.row_count(), headers = ?table.headers, "parsed");
        for row in table.preview(DEFAULT_PREVIEW_ROWS) {
            info!(index = row.row_index, cells = ?row.cells, "row");
        }
    }

    // ─── 5) submit ───────────────────────────────────────────────────
    session.submit().await?;
    info!("done");
    Ok(())
}
