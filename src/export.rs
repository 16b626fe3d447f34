// src/export.rs
//
// Aggregation and spreadsheet export.
//
// - Group pool results by originating event, preserving every discovered
//   event, including ones with zero surviving cards, so the export
//   visibly reflects fetch losses.
// - Flatten each record onto the template's column sequence. Export-time
//   transforms only; records are never mutated.
// - Write one timestamped .xlsx per run, never overwriting prior exports.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use calamine::{Reader, open_workbook_auto};
use chrono::Local;
use log::warn;
use regex::Regex;
use rust_xlsxwriter::Workbook;

use crate::config::consts::{EVENT_COLUMN, EXPORT_TIMESTAMP_FMT};
use crate::config::options::ExportOptions;
use crate::data::{CardRecord, EventGroup, RunSummary};
use crate::error::ScrapeError;
use crate::pool::FetchResult;

static LV5_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lv\.5：([^/]+)").unwrap());
static LV3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lv\.3：([^/]+)").unwrap());

/// Column order for the output sheet, normally read from a template
/// workbook's header row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSchema {
    pub columns: Vec<String>,
}

impl TemplateSchema {
    /// Header row of the first sheet of an existing workbook.
    pub fn from_xlsx(path: &Path) -> Result<Self, ScrapeError> {
        let mut wb = open_workbook_auto(path)
            .map_err(|e| ScrapeError::parse(path.to_string_lossy(), format!("template: {e}")))?;
        let range = wb
            .worksheet_range_at(0)
            .ok_or_else(|| ScrapeError::parse(path.to_string_lossy(), "template has no sheets"))?
            .map_err(|e| ScrapeError::parse(path.to_string_lossy(), format!("template: {e}")))?;

        let columns: Vec<String> = range
            .rows()
            .next()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { columns })
    }

    /// Built-in fallback mirroring the reference workbook.
    pub fn default_columns() -> Self {
        let columns = [
            EVENT_COLUMN,
            "卡面名称",
            "center技能名称",
            "live技能名",
            "support技能名",
            "DA",
            "VO",
            "PF",
            "综合值",
            "center技能",
            "live技能（lv5）",
            "support技能（lv3）",
            "MV衣装",
            "房间衣装",
            "背景",
            "spp对应乐曲",
            "故事",
        ];
        Self { columns: columns.iter().map(|c| s!(*c)).collect() }
    }

    /// Columns for the actual sheet: the template's order, with the event
    /// column synthesized at the front when the template lacks it.
    pub fn output_columns(&self) -> Vec<String> {
        let mut cols = self.columns.clone();
        if !cols.iter().any(|c| c == EVENT_COLUMN) {
            cols.insert(0, s!(EVENT_COLUMN));
        }
        cols
    }
}

/// Group pool results by event. `event_names` is the full discovered set, in
/// discovery order, so zero-link and all-failed events still show up.
pub fn group_by_event(event_names: &[String], results: Vec<FetchResult>) -> (Vec<EventGroup>, RunSummary) {
    let mut groups: Vec<EventGroup> = event_names
        .iter()
        .map(|name| EventGroup { event_name: name.clone(), cards: Vec::new() })
        .collect();
    let mut index: HashMap<String, usize> =
        event_names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();

    let mut summary = RunSummary::default();
    for name in event_names {
        summary.touch_event(name);
    }

    for (link, result) in results {
        let idx = *index.entry(link.event_name.clone()).or_insert_with(|| {
            // shouldn't happen when results come from the same scan; keep the
            // card anyway rather than dropping it
            groups.push(EventGroup { event_name: link.event_name.clone(), cards: Vec::new() });
            groups.len() - 1
        });

        match result {
            Ok(record) => {
                summary.record_success(&link.event_name);
                groups[idx].cards.push(record);
            }
            Err(e) if e.is_not_found() => {
                warn!("skipped (gone): {}", link.url);
                summary.record_not_found(&link.event_name);
            }
            Err(e) => {
                warn!("failed: {e}");
                summary.record_failure(&link.event_name);
            }
        }
    }

    (groups, summary)
}

/// Aggregate, flatten and write the workbook. Returns the written path and
/// the run summary. Any write failure is fatal to the run.
pub fn export(
    event_names: &[String],
    results: Vec<FetchResult>,
    schema: &TemplateSchema,
    opts: &ExportOptions,
) -> Result<(PathBuf, RunSummary), ScrapeError> {
    let (groups, mut summary) = group_by_event(event_names, results);
    let columns = schema.output_columns();

    std::fs::create_dir_all(&opts.out_dir).map_err(|e| ScrapeError::io(&opts.out_dir, e))?;
    let ts = Local::now().format(EXPORT_TIMESTAMP_FMT).to_string();
    let path = opts.out_dir.join(join!(opts.prefix.as_str(), ts.as_str(), ".xlsx"));

    write_workbook(&path, &columns, &groups)?;
    summary.out_path = Some(path.clone());
    Ok((path, summary))
}

fn write_workbook(path: &Path, columns: &[String], groups: &[EventGroup]) -> Result<(), ScrapeError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in columns.iter().enumerate() {
        sheet
            .write_string(0, col as u16, name)
            .map_err(|e| xlsx_io(path, e))?;
    }

    let mut row: u32 = 1;
    for group in groups {
        for card in &group.cards {
            for (col, column) in columns.iter().enumerate() {
                let value = cell_value(card, column);
                if !value.is_empty() {
                    sheet
                        .write_string(row, col as u16, &value)
                        .map_err(|e| xlsx_io(path, e))?;
                }
            }
            row += 1;
        }
    }

    workbook.save(path).map_err(|e| xlsx_io(path, e))
}

fn xlsx_io(path: &Path, e: rust_xlsxwriter::XlsxError) -> ScrapeError {
    ScrapeError::io(path, io::Error::other(e))
}

/* ---------------- row flattening ---------------- */

/// One cell of the export row. Unknown template columns stay empty.
fn cell_value(card: &CardRecord, column: &str) -> String {
    match column {
        c if c == EVENT_COLUMN => card.source_event.clone(),
        "卡面名称" => display_name(card),
        "center技能名称" => skill_name(card, 0),
        "live技能名" => skill_name(card, 1),
        "support技能名" => skill_name(card, 2),
        "DA" => pick_stat(card, "Da"),
        "VO" => pick_stat(card, "Vo"),
        "PF" => pick_stat(card, "Pf"),
        "综合值" => pick_stat(card, "総合値"),
        "center技能" => skill_desc(card, 0),
        "live技能（lv5）" => level_pick(&skill_desc(card, 1), &LV5_RE),
        "support技能（lv3）" => level_pick(&skill_desc(card, 2), &LV3_RE),
        "MV衣装" => route_bucket(card, "MV衣装"),
        "房间衣装" => route_bucket(card, "ルーム衣装"),
        "背景" => route_bucket(card, "背景"),
        "spp对应乐曲" => route_bucket(card, "SPP"),
        _ => s!(),
    }
}

/// Card name with the rarity suffixed, e.g. "［…］HiMERU ☆5".
/// A bare digit rarity is normalized to "☆N" first.
fn display_name(card: &CardRecord) -> String {
    let mut rarity = card.base_info.get("レアリティ").cloned().unwrap_or_default();
    if !rarity.is_empty() && !rarity.starts_with('☆') && !rarity.starts_with('★') {
        if rarity.bytes().all(|b| b.is_ascii_digit()) {
            rarity = format!("☆{rarity}");
        }
    }
    if card.name.is_empty() || rarity.is_empty() {
        card.name.clone()
    } else {
        join!(card.name.as_str(), " ", rarity.as_str())
    }
}

fn skill_name(card: &CardRecord, idx: usize) -> String {
    card.skills.get(idx).map(|s| s.name.clone()).unwrap_or_default()
}

fn skill_desc(card: &CardRecord, idx: usize) -> String {
    card.skills.get(idx).map(|s| s.description.clone()).unwrap_or_default()
}

/// Best available value for one stat row: max-limit-break first, then
/// no-limit-break max, then initial.
fn pick_stat(card: &CardRecord, key: &str) -> String {
    for col in ["完凸MAX値", "無凸MAX値", "初期値"] {
        if let Some(Some(n)) = card.numeric_stats.get(&format!("{col} {key}")) {
            return n.to_string();
        }
    }
    s!()
}

fn level_pick(desc: &str, re: &Regex) -> String {
    re.captures(desc)
        .map(|c| s!(c[1].trim()))
        .unwrap_or_default()
}

fn route_bucket(card: &CardRecord, prefix: &str) -> String {
    let picks: Vec<&str> = card
        .route_items
        .iter()
        .filter(|i| i.starts_with(prefix))
        .map(|i| i.as_str())
        .collect();
    picks.join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Skill;
    use std::collections::BTreeMap;

    fn sample_card() -> CardRecord {
        let mut base_info = BTreeMap::new();
        base_info.insert(s!("レアリティ"), s!("5"));

        let mut numeric_stats = BTreeMap::new();
        numeric_stats.insert(s!("初期値 Da"), Some(8120));
        numeric_stats.insert(s!("無凸MAX値 Da"), Some(18020));
        numeric_stats.insert(s!("完凸MAX値 Da"), None); // unparsed cell
        numeric_stats.insert(s!("完凸MAX値 総合値"), Some(63120));

        CardRecord {
            name: s!("［裏表アンビバレンス］HiMERU"),
            base_info,
            numeric_stats,
            skills: vec![
                Skill { name: s!("まばゆい輝き"), description: s!("Daが40％up") },
                Skill {
                    name: s!("裏の顔"),
                    description: s!("Lv.1：25％up / Lv.5：スコアが45％upする"),
                },
                Skill { name: s!(), description: s!() },
            ],
            route_items: vec![
                s!("MV衣装（裏表アンビバレンス）"),
                s!("SPP「Crossing×Heart」"),
                s!("背景（ラウンジ）"),
            ],
            source_event: s!("クロススカウト"),
        }
    }

    #[test]
    fn name_gets_normalized_rarity_suffix() {
        assert_eq!(display_name(&sample_card()), "［裏表アンビバレンス］HiMERU ☆5");
    }

    #[test]
    fn stat_preference_skips_unparsed_cells() {
        let card = sample_card();
        // 完凸 Da is None, so the 無凸 value wins
        assert_eq!(pick_stat(&card, "Da"), "18020");
        assert_eq!(pick_stat(&card, "総合値"), "63120");
        assert_eq!(pick_stat(&card, "Vo"), "");
    }

    #[test]
    fn level_five_effect_extracted() {
        let card = sample_card();
        assert_eq!(cell_value(&card, "live技能（lv5）"), "スコアが45％upする");
        assert_eq!(cell_value(&card, "support技能（lv3）"), "");
    }

    #[test]
    fn route_items_bucketed_by_prefix() {
        let card = sample_card();
        assert_eq!(cell_value(&card, "MV衣装"), "MV衣装（裏表アンビバレンス）");
        assert_eq!(cell_value(&card, "spp对应乐曲"), "SPP「Crossing×Heart」");
        assert_eq!(cell_value(&card, "房间衣装"), "");
    }

    #[test]
    fn event_column_synthesized_once() {
        let schema = TemplateSchema { columns: vec![s!("卡面名称"), s!("DA")] };
        assert_eq!(schema.output_columns(), vec![EVENT_COLUMN, "卡面名称", "DA"]);

        let schema = TemplateSchema { columns: vec![s!("卡面名称"), s!(EVENT_COLUMN)] };
        // already present: keep the template's own position
        assert_eq!(schema.output_columns(), vec!["卡面名称", EVENT_COLUMN]);
    }

    #[test]
    fn unknown_template_columns_stay_empty() {
        assert_eq!(cell_value(&sample_card(), "故事"), "");
        assert_eq!(cell_value(&sample_card(), "Unnamed: 4"), "");
    }
}
