// src/data.rs
//
// Shared data types for the scrape pipeline.
//
// - CardLink / EventSection / DirectoryScan: discovery output. Immutable once
//   produced; serde-serializable so a scan can sit in the session cache.
// - CardRecord: one parsed detail page. May be partially populated; absent
//   fields stay empty/None, never fabricated.
// - EventGroup: aggregation unit. Card order is pool completion order.
// - RunSummary: what happened, obtainable without an interactive log.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One discovered detail-page link, tied to its originating event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLink {
    pub url: String,
    pub event_name: String,
    /// (month, day) from the section heading, when one was present.
    pub date_hint: Option<(u32, u32)>,
}

/// One date/event section of the directory page. Zero-link sections are kept
/// so the export can show fetch losses instead of silently omitting an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSection {
    pub event_name: String,
    pub date_hint: Option<(u32, u32)>,
    pub links: Vec<CardLink>,
}

/// Full discovery result for one directory page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryScan {
    pub directory_url: String,
    pub events: Vec<EventSection>,
}

impl DirectoryScan {
    /// All links across all sections, in discovery order.
    pub fn all_links(&self) -> Vec<CardLink> {
        self.events.iter().flat_map(|e| e.links.iter().cloned()).collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.iter().map(|e| e.event_name.clone()).collect()
    }

    pub fn link_count(&self) -> usize {
        self.events.iter().map(|e| e.links.len()).sum()
    }
}

/// One skill row in display order. Fields may be empty when the page omits
/// the name or the effect text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
}

/// One parsed card detail page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CardRecord {
    pub name: String,
    /// Labeled field table (rarity, type, fan cap, added date, …).
    /// Absent labels are simply not present in the map.
    pub base_info: BTreeMap<String, String>,
    /// Numeric attribute cells keyed "<column> <row>". A cell that was present
    /// but did not parse as a number is kept as None.
    pub numeric_stats: BTreeMap<String, Option<u32>>,
    /// Center / live / support, in display order.
    pub skills: Vec<Skill>,
    /// Idol-road rewards, in display order.
    pub route_items: Vec<String>,
    pub source_event: String,
}

/// Cards grouped under one named event.
#[derive(Clone, Debug, Default)]
pub struct EventGroup {
    pub event_name: String,
    pub cards: Vec<CardRecord>,
}

/// Per-event fetch outcome counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventTally {
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl EventTally {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.not_found + self.failed
    }
}

/// Summary of one full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Keyed by event name; present for every discovered event, including
    /// ones with zero links.
    pub per_event: BTreeMap<String, EventTally>,
    pub out_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn record_success(&mut self, event: &str) {
        self.attempted += 1;
        self.succeeded += 1;
        self.per_event.entry(s!(event)).or_default().succeeded += 1;
    }

    pub fn record_not_found(&mut self, event: &str) {
        self.attempted += 1;
        self.not_found += 1;
        self.per_event.entry(s!(event)).or_default().not_found += 1;
    }

    pub fn record_failure(&mut self, event: &str) {
        self.attempted += 1;
        self.failed += 1;
        self.per_event.entry(s!(event)).or_default().failed += 1;
    }

    /// Ensure an event shows up even when it contributed no links.
    pub fn touch_event(&mut self, event: &str) {
        self.per_event.entry(s!(event)).or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_add_up() {
        let mut sum = RunSummary::default();
        sum.touch_event("empty");
        sum.record_success("a");
        sum.record_success("a");
        sum.record_not_found("a");
        sum.record_failure("b");

        assert_eq!(sum.attempted, 4);
        assert_eq!(sum.succeeded, 2);
        assert_eq!(sum.not_found, 1);
        assert_eq!(sum.failed, 1);
        assert_eq!(sum.per_event.len(), 3);
        assert_eq!(sum.per_event["a"].attempted(), 3);
        assert_eq!(sum.per_event["empty"], EventTally::default());
    }

    #[test]
    fn scan_flattens_links_in_order() {
        let scan = DirectoryScan {
            directory_url: s!("https://wiki.example/dir/1"),
            events: vec![
                EventSection {
                    event_name: s!("first"),
                    date_hint: Some((4, 25)),
                    links: vec![CardLink {
                        url: s!("https://wiki.example/dir/2"),
                        event_name: s!("first"),
                        date_hint: Some((4, 25)),
                    }],
                },
                EventSection { event_name: s!("empty"), date_hint: None, links: vec![] },
            ],
        };
        assert_eq!(scan.link_count(), 1);
        assert_eq!(scan.event_names(), vec!["first", "empty"]);
        assert_eq!(scan.all_links().len(), 1);
    }
}
