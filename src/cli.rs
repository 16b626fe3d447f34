// src/cli.rs
use std::path::PathBuf;
use std::time::Duration;
use std::{env, process};

use color_eyre::eyre::{Result, bail, eyre};

use crate::config::options::AppOptions;
use crate::data::RunSummary;
use crate::pool::CancelHandle;
use crate::progress::Progress;
use crate::runner;

struct CliFlags {
    list_events: bool,
}

pub fn run() -> Result<()> {
    let mut params = AppOptions::default();
    let mut flags = CliFlags { list_events: false };

    if env::args().len() == 1 {
        // only program name
        eprintln!(include_str!("cli_help.txt"));
        process::exit(2);
    }
    parse_cli(&mut params, &mut flags)?;

    if flags.list_events {
        return list_events(&params);
    }

    if params.scrape.directory_url.is_empty() && params.scrape.session.is_none() {
        bail!("Missing directory URL (or --session <id> to resume)");
    }

    let mut progress = CliProgress;
    let summary = runner::run(&params, Some(&mut progress), CancelHandle::new())?;
    print_summary(&summary);
    Ok(())
}

fn list_events(params: &AppOptions) -> Result<()> {
    if params.scrape.directory_url.is_empty() {
        bail!("--list-events needs a directory URL");
    }
    let (scan, session) = runner::scan_only(params)?;
    for sec in &scan.events {
        let date = match sec.date_hint {
            Some((m, d)) => format!("{m:02}月{d:02}日"),
            None => s!("--月--日"),
        };
        println!("{date}  {}  ({} cards)", sec.event_name, sec.links.len());
    }
    println!("{} event(s), {} link(s) total", scan.events.len(), scan.link_count());
    if let Some(id) = session {
        println!("Session: {id}  (resume with --session {id})");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    for (event, tally) in &summary.per_event {
        println!(
            "{event}: {} ok, {} gone, {} failed",
            tally.succeeded, tally.not_found, tally.failed
        );
    }
    println!(
        "Total: {} attempted, {} ok, {} gone, {} failed",
        summary.attempted, summary.succeeded, summary.not_found, summary.failed
    );
    if let Some(path) = &summary.out_path {
        println!("Wrote {}", path.display());
    }
}

fn parse_cli(params: &mut AppOptions, flags: &mut CliFlags) -> Result<()> {
    let mut args = env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--url" | "-u" => {
                params.scrape.directory_url = args.next().ok_or_else(|| eyre!("Missing value for --url"))?;
            }
            "-w" | "--workers" => {
                let v: usize = args.next().ok_or_else(|| eyre!("Missing worker count"))?.parse()?;
                if v == 0 { bail!("Worker count must be at least 1"); }
                params.scrape.workers = v;
            }
            "--single-thread" => params.scrape.single_thread = true,
            "--interval" => {
                let v: u64 = args.next().ok_or_else(|| eyre!("Missing value for --interval"))?.parse()?;
                params.scrape.min_request_interval = Duration::from_millis(v);
            }
            "--timeout" => {
                let v: u64 = args.next().ok_or_else(|| eyre!("Missing value for --timeout"))?.parse()?;
                params.scrape.timeout = Duration::from_secs(v);
            }
            "--template" => {
                params.export.template =
                    Some(PathBuf::from(args.next().ok_or_else(|| eyre!("Missing template path"))?));
            }
            "-o" | "--out" => {
                params.export.out_dir =
                    PathBuf::from(args.next().ok_or_else(|| eyre!("Missing output directory"))?);
            }
            "--prefix" => {
                params.export.prefix = args.next().ok_or_else(|| eyre!("Missing value for --prefix"))?;
            }
            "--list-events" => flags.list_events = true,
            "--session" => {
                params.scrape.session = Some(args.next().ok_or_else(|| eyre!("Missing session id"))?);
            }
            "--no-cache" => params.scrape.use_cache = false,
            "--target-dates" => params.scrape.target_dates_only = true,
            "-h" | "--help" => {
                eprintln!(include_str!("cli_help.txt"));
                process::exit(0);
            }
            other if !other.starts_with('-') && params.scrape.directory_url.is_empty() => {
                params.scrape.directory_url = s!(other);
            }
            other => bail!("Unknown arg: {other}"),
        }
    }

    Ok(())
}

/* ---------------- progress sink ---------------- */

struct CliProgress;

impl Progress for CliProgress {
    fn begin(&mut self, total: usize) {
        println!("Fetching {total} card page(s)…");
    }

    fn log(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn item_done(&mut self, current: usize, total: usize, desc: &str) {
        println!("  [{current}/{total}] ok    {desc}");
    }

    fn item_failed(&mut self, current: usize, total: usize, desc: &str) {
        println!("  [{current}/{total}] skip  {desc}");
    }
}
