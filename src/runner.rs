// src/runner.rs
//
// Top-level orchestration: discover (or resume) → pool → export.
// Data flows strictly forward; the only fatal points are the directory
// fetch and the final workbook write.

use log::{info, warn};
use reqwest::blocking::Client;

use crate::config::options::AppOptions;
use crate::core::net;
use crate::data::{DirectoryScan, RunSummary};
use crate::error::ScrapeError;
use crate::export::{self, TemplateSchema};
use crate::pool::{CancelHandle, Pool, PoolConfig};
use crate::progress::Progress;
use crate::specs::{card, directory};
use crate::store;

/// Run the full pipeline. `cancel` stops dispatch of new fetches when
/// triggered; everything already in flight still lands in the summary.
pub fn run(
    opts: &AppOptions,
    mut progress: Option<&mut dyn Progress>,
    cancel: CancelHandle,
) -> Result<RunSummary, ScrapeError> {
    let client = net::build_client(opts.scrape.timeout)?;
    let scan = resolve_scan(&client, opts)?;

    let event_names = scan.event_names();
    let links = scan.all_links();
    info!("{} event(s), {} card link(s)", event_names.len(), links.len());
    if let Some(p) = progress.as_deref_mut() {
        p.log(&format!("{} event(s), {} card link(s) to fetch", event_names.len(), links.len()));
    }

    let pool = Pool::with_cancel(
        PoolConfig {
            workers: opts.scrape.effective_workers(),
            min_request_interval: opts.scrape.min_request_interval,
        },
        cancel,
    );
    let results = pool.run(
        links,
        |link| card::fetch_and_parse(&client, link),
        progress.as_deref_mut(),
    );

    let schema = load_schema(opts);
    let (path, summary) = export::export(&event_names, results, &schema, &opts.export)?;

    info!(
        "done: {} attempted, {} ok, {} gone, {} failed → {}",
        summary.attempted,
        summary.succeeded,
        summary.not_found,
        summary.failed,
        path.display()
    );
    Ok(summary)
}

/// Discover the directory page and cache the scan, without fetching any
/// detail pages. Returns the scan and its session id (when caching is on).
pub fn scan_only(opts: &AppOptions) -> Result<(DirectoryScan, Option<String>), ScrapeError> {
    let client = net::build_client(opts.scrape.timeout)?;
    let scan = directory::discover(&client, &opts.scrape)?;
    let session = cache_scan(&scan, opts);
    Ok((scan, session))
}

/* ---------------- helpers ---------------- */

fn resolve_scan(client: &Client, opts: &AppOptions) -> Result<DirectoryScan, ScrapeError> {
    if let Some(id) = opts.scrape.session.as_deref() {
        if let Some(scan) = store::load_scan(id)? {
            info!("resumed session {id}: {} event(s), {} link(s)", scan.events.len(), scan.link_count());
            return Ok(scan);
        }
        warn!("session {id} missing or expired; re-scanning the directory page");
    }
    let scan = directory::discover(client, &opts.scrape)?;
    cache_scan(&scan, opts);
    Ok(scan)
}

fn cache_scan(scan: &DirectoryScan, opts: &AppOptions) -> Option<String> {
    if !opts.scrape.use_cache {
        return None;
    }
    match store::save_scan(scan) {
        Ok(id) => {
            info!("scan cached as session {id}");
            Some(id)
        }
        Err(e) => {
            // cache is a convenience, not a requirement
            warn!("could not cache scan: {e}");
            None
        }
    }
}

fn load_schema(opts: &AppOptions) -> TemplateSchema {
    let Some(path) = opts.export.template.as_deref() else {
        return TemplateSchema::default_columns();
    };
    match TemplateSchema::from_xlsx(path) {
        Ok(schema) if !schema.columns.is_empty() => schema,
        Ok(_) => {
            warn!("template {} has an empty header row; using default columns", path.display());
            TemplateSchema::default_columns()
        }
        Err(e) => {
            warn!("template unreadable ({e}); using default columns");
            TemplateSchema::default_columns()
        }
    }
}
