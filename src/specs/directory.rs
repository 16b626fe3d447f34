// src/specs/directory.rs
//! Scraping *spec* for the event directory page.
//!
//! Purpose:
//! - Parse the **remote HTML** of the year directory and extract one
//!   `EventSection` per date heading, with every card detail link that
//!   appears inside that section's bounds.
//! - **No cap on the number of links.** A capped enumeration silently drops
//!   valid cards whenever an event has more entries than the cap.
//!
//! Structure assumptions (by design):
//! - Date headings look like `04月25日` (leading zeros optional) and sit in
//!   heading-ish tags (`h2`–`h5`, `th`, `dt`).
//! - Detail links share the directory's wiki slug followed by a numeric page
//!   id, e.g. `/some-wiki/918821`.
//! - A link seen under two sections belongs to the first (dropped from later
//!   ones with a warning, since an event assignment must be single-valued).

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use log::{debug, warn};
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::options::ScrapeOptions;
use crate::core::{net, sanitize::normalize_ws, sanitize::strip_title_suffix};
use crate::data::{CardLink, DirectoryScan, EventSection};
use crate::error::ScrapeError;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})月(\d{1,2})日").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

const HEADING_TAGS: [&str; 6] = ["h2", "h3", "h4", "h5", "th", "dt"];

/// Fetch the directory page and extract all event sections.
///
/// A fetch failure here is fatal to the run (there is nothing to scrape
/// without the directory); a page without any recognizable card-link
/// structure is a `Parse` error.
pub fn discover(client: &Client, opts: &ScrapeOptions) -> Result<DirectoryScan, ScrapeError> {
    let html = net::http_get(client, &opts.directory_url)?;
    let mut scan = parse_directory(&html, &opts.directory_url)?;
    if opts.target_dates_only {
        scan = retain_target_dates(scan);
    }
    Ok(scan)
}

/// Pure parse of a directory page. Testable offline.
pub fn parse_directory(html: &str, directory_url: &str) -> Result<DirectoryScan, ScrapeError> {
    let base = Url::parse(directory_url)
        .map_err(|e| ScrapeError::parse(directory_url, format!("bad directory url: {e}")))?;
    let slug = wiki_slug(&base)
        .ok_or_else(|| ScrapeError::parse(directory_url, "directory url has no wiki slug"))?;
    let base_id = page_id(base.path());

    let doc = Html::parse_document(html);

    let mut events: Vec<EventSection> = Vec::new();
    let mut current: Option<EventSection> = None;
    // url → owning event, for first-wins dedup across sections
    let mut assigned: HashMap<String, String> = HashMap::new();
    // links seen before the first date heading
    let mut orphans: Vec<String> = Vec::new();

    for node in doc.root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else { continue };
        let tag = el.value().name();

        if HEADING_TAGS.contains(&tag) {
            let text = normalize_ws(&el.text().collect::<String>());
            if let Some(caps) = DATE_RE.captures(&text) {
                if let Some(sec) = current.take() {
                    events.push(sec);
                }
                let month: u32 = caps[1].parse().unwrap_or(0);
                let day: u32 = caps[2].parse().unwrap_or(0);
                current = Some(EventSection {
                    event_name: event_name_from_heading(&text, &caps, month, day),
                    date_hint: Some((month, day)),
                    links: Vec::new(),
                });
                continue;
            }
        }

        if tag == "a" {
            let Some(href) = el.value().attr("href") else { continue };
            let Some(url) = detail_url(&base, &slug, base_id.as_deref(), href) else { continue };

            match current.as_mut() {
                Some(sec) => {
                    match assigned.get(&url) {
                        Some(owner) if *owner != sec.event_name => {
                            warn!("link {url} already assigned to \"{owner}\"; dropping from \"{}\"", sec.event_name);
                        }
                        Some(_) => {} // repeated within the same section
                        None => {
                            assigned.insert(url.clone(), sec.event_name.clone());
                            sec.links.push(CardLink {
                                url,
                                event_name: sec.event_name.clone(),
                                date_hint: sec.date_hint,
                            });
                        }
                    }
                }
                None => orphans.push(url),
            }
        }
    }
    if let Some(sec) = current.take() {
        events.push(sec);
    }

    if events.is_empty() {
        if orphans.is_empty() {
            return Err(ScrapeError::parse(directory_url, "no date sections or card links found"));
        }
        // No date headings at all: treat the whole page as one section named
        // after the page title.
        debug!("no date headings; falling back to whole-page section ({} links)", orphans.len());
        let name = page_title(&doc).unwrap_or_else(|| s!("追加カード"));
        let mut links = Vec::new();
        for url in orphans {
            if assigned.insert(url.clone(), name.clone()).is_none() {
                links.push(CardLink { url, event_name: name.clone(), date_hint: None });
            }
        }
        events.push(EventSection { event_name: name, date_hint: None, links });
    } else if !orphans.is_empty() {
        debug!("{} card links before the first date heading; ignored", orphans.len());
    }

    Ok(DirectoryScan { directory_url: s!(directory_url), events })
}

/// Keep only sections falling on scheduled release days:
/// 10/14/15/25, end of month, and the day before.
pub fn retain_target_dates(mut scan: DirectoryScan) -> DirectoryScan {
    let year = Local::now().year();
    scan.events.retain(|sec| match sec.date_hint {
        Some((month, day)) => is_target_date(year, month, day),
        None => false,
    });
    scan
}

pub fn is_target_date(year: i32, month: u32, day: u32) -> bool {
    if matches!(day, 10 | 14 | 15 | 25) {
        return true;
    }
    let month_end = days_in_month(year, month);
    day == month_end || day + 1 == month_end
}

/* ---------------- helpers ---------------- */

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// First non-empty path segment: the wiki the directory belongs to.
fn wiki_slug(url: &Url) -> Option<String> {
    url.path_segments()?.find(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Trailing numeric page id of a wiki path, if any.
fn page_id(path: &str) -> Option<String> {
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
        Some(last.to_string())
    } else {
        None
    }
}

/// Resolve `href` against the directory and keep it only if it is a card
/// detail page of the same wiki (numeric id, not the directory itself).
fn detail_url(base: &Url, slug: &str, base_id: Option<&str>, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    if url.host_str() != base.host_str() {
        return None;
    }
    let mut segs = url.path_segments()?.filter(|s| !s.is_empty());
    if segs.next() != Some(slug) {
        return None;
    }
    let id = segs.next()?;
    if segs.next().is_some() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if Some(id) == base_id {
        return None;
    }
    // Drop query/fragment so dedup keys on the page itself
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    Some(clean.to_string())
}

/// Heading text minus the date becomes the event name; when nothing usable
/// remains, synthesize one from the date.
fn event_name_from_heading(text: &str, caps: &regex::Captures, month: u32, day: u32) -> String {
    let m = caps.get(0).unwrap();
    let after = text[m.end()..].trim_matches(separators);
    let before = text[..m.start()].trim_matches(separators);
    let name = if !after.is_empty() { after } else { before };
    if name.is_empty() {
        format!("{month:02}月{day:02}日の追加カード")
    } else {
        s!(name)
    }
}

fn separators(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '：' | '-' | 'ー' | '～' | '、' | '（' | '）' | '(' | ')')
}

fn page_title(doc: &Html) -> Option<String> {
    let el = doc.select(&TITLE_SEL).next()?;
    let t = normalize_ws(&el.text().collect::<String>());
    let t = strip_title_suffix(&t);
    if t.is_empty() { None } else { Some(s!(t)) }
}
