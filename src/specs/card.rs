// src/specs/card.rs
//! Scraping *spec* for one card detail page.
//!
//! Field contract (explicit, per field; "absent" is a result, not an error):
//! - name: `og:title` → `<title>` → `<h1>`, normalized to `［name］character`.
//!   A page without a full-width-bracketed title is not a card page.
//! - base_info: labeled rows レアリティ / タイプ/属性 / ファン上限 / 追加日.
//! - numeric_stats: the 総合値/Da/Vo/Pf table across 初期値/無凸MAX値/完凸MAX値
//!   columns; a cell that fails to parse is stored as None and the rest of the
//!   record survives.
//! - skills: センター / ライブ / サポート, always three entries in that order.
//! - route_items: idol-road reward lines, in displayed order.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};

use crate::core::{net, sanitize::normalize_ws, sanitize::parse_count, sanitize::strip_title_suffix};
use crate::data::{CardLink, CardRecord, Skill};
use crate::error::ScrapeError;

static OG_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());

static BRACKET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"［([^］]+)］\s*([^|｜\-]*)").unwrap());
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"「([^」]+)」").unwrap());
static LEVEL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lv\.\d+：").unwrap());
static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"スキル|ピース|アイテム|MV|ルーム衣装|SPP|背景|ボイス").unwrap()
});

const BASE_LABELS: [&str; 4] = ["レアリティ", "タイプ/属性", "ファン上限", "追加日"];
const STAT_COLUMNS: [&str; 3] = ["初期値", "無凸MAX値", "完凸MAX値"];
const STAT_ROWS: [&str; 4] = ["総合値", "Da", "Vo", "Pf"];
const SKILL_ROLES: [&str; 3] = ["センタースキル", "ライブスキル", "サポートスキル"];
const ROAD_HEADING: &str = "取得できるスキル";
const SECTION_STOPS: [&str; 4] = ["必要素材数", "IRマス詳細", "合計ステータス", "横にスクロール"];

/// One GET with the shared client, then a pure parse.
pub fn fetch_and_parse(client: &Client, link: &CardLink) -> Result<CardRecord, ScrapeError> {
    let html = net::http_get(client, &link.url)?;
    parse_card(&html, &link.url, &link.event_name)
}

/// Parse a fetched detail page. Fails only when the page is fundamentally not
/// a card page; individual missing fields yield a partial record.
pub fn parse_card(html: &str, url: &str, event: &str) -> Result<CardRecord, ScrapeError> {
    let doc = Html::parse_document(html);

    let name = card_name(&doc)
        .ok_or_else(|| ScrapeError::parse(url, "no bracketed card title"))?;
    if name.contains("プロフィール") || name.contains("詳細") {
        // Character profile / navigation pages share the id pattern but are
        // not cards.
        return Err(ScrapeError::parse(url, "not a card detail page"));
    }

    let lines = text_lines(&doc);

    Ok(CardRecord {
        name,
        base_info: extract_base_info(&doc, &lines),
        numeric_stats: extract_stats(&doc),
        skills: extract_skills(&lines),
        route_items: extract_route_items(&lines),
        source_event: s!(event),
    })
}

/* ---------------- card name ---------------- */

/// `og:title` → `<title>` → `<h1>`, first candidate with a bracketed name.
fn card_name(doc: &Html) -> Option<String> {
    let og = doc
        .select(&OG_TITLE_SEL)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(normalize_ws);
    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| normalize_ws(&el.text().collect::<String>()));
    let h1 = doc
        .select(&H1_SEL)
        .next()
        .map(|el| normalize_ws(&el.text().collect::<String>()));

    [og, title, h1]
        .into_iter()
        .flatten()
        .find_map(|t| name_from_title(&t))
}

fn name_from_title(title: &str) -> Option<String> {
    let t = strip_title_suffix(title);
    let caps = BRACKET_NAME_RE.captures(t)?;
    let bracket = caps[1].trim();
    let character = caps[2].trim();
    Some(format!("［{bracket}］{character}"))
}

/* ---------------- base info ---------------- */

fn extract_base_info(doc: &Html, lines: &[String]) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();

    // Pass 1: label/value table rows anywhere in the document.
    for table in doc.select(&TABLE_SEL) {
        for tr in table.select(&TR_SEL) {
            let cells: Vec<String> = tr
                .select(&CELL_SEL)
                .map(|c| normalize_ws(&c.text().collect::<String>()))
                .collect();
            if cells.len() < 2 {
                continue;
            }
            for label in BASE_LABELS {
                if cells[0].contains(label) && !cells[1].is_empty() {
                    info.entry(s!(label)).or_insert_with(|| cells[1].clone());
                }
            }
        }
    }

    // Pass 2: line scan for anything the tables did not yield.
    for label in BASE_LABELS {
        if info.contains_key(label) {
            continue;
        }
        if let Some(value) = label_from_lines(lines, label) {
            info.insert(s!(label), value);
        }
    }

    // Fan cap is a count; keep it comma-free like the rest of the numbers.
    if let Some(v) = info.get("ファン上限") {
        if let Some(n) = parse_count(v) {
            info.insert(s!("ファン上限"), n.to_string());
        }
    }

    info
}

/// Value on the label's own line, else the next non-empty line.
fn label_from_lines(lines: &[String], label: &str) -> Option<String> {
    let idx = lines.iter().position(|l| l.contains(label))?;
    let same_line = lines[idx]
        .split_once(label)
        .map(|(_, rest)| rest.trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '：'))
        .filter(|rest| !rest.is_empty())
        .map(|rest| s!(rest));
    same_line.or_else(|| {
        let next = lines.get(idx + 1)?;
        // A following label means the value is genuinely absent
        if BASE_LABELS.iter().any(|l| next.contains(l)) {
            None
        } else {
            Some(next.clone())
        }
    })
}

/* ---------------- numeric stats ---------------- */

fn extract_stats(doc: &Html) -> BTreeMap<String, Option<u32>> {
    let mut stats = BTreeMap::new();

    let Some(table) = doc.select(&TABLE_SEL).find(|t| {
        let text: String = t.text().collect();
        STAT_ROWS.iter().all(|r| text.contains(r))
    }) else {
        return stats;
    };

    // Column headers (初期値 / 無凸MAX値 / 完凸MAX値); first cell is the row
    // header placeholder.
    let mut columns: Vec<String> = Vec::new();
    for tr in table.select(&TR_SEL) {
        let cells: Vec<String> = tr
            .select(&CELL_SEL)
            .map(|c| normalize_ws(&c.text().collect::<String>()))
            .collect();
        if cells.iter().any(|c| STAT_COLUMNS.contains(&c.as_str())) {
            columns = cells.into_iter().skip(1).filter(|c| !c.is_empty()).collect();
            break;
        }
    }
    if columns.is_empty() {
        columns = STAT_COLUMNS.iter().map(|c| s!(*c)).collect();
    }

    for tr in table.select(&TR_SEL) {
        let cells: Vec<String> = tr
            .select(&CELL_SEL)
            .map(|c| normalize_ws(&c.text().collect::<String>()))
            .collect();
        let Some(row_label) = cells.first() else { continue };
        if !STAT_ROWS.contains(&row_label.as_str()) {
            continue;
        }
        for (idx, col) in columns.iter().enumerate() {
            if let Some(cell) = cells.get(idx + 1) {
                // None for unparseable cells; the record still counts.
                stats.insert(format!("{col} {row_label}"), parse_count(cell));
            }
        }
    }

    stats
}

/* ---------------- skills ---------------- */

/// A line introducing one skill. The combined section heading
/// (センター/ライブ/サポートスキル) contains every role name but never a
/// skill itself; the slash rules it out.
fn is_role_line(line: &str) -> bool {
    !line.contains('/') && SKILL_ROLES.iter().any(|r| line.contains(r))
}

/// Always three entries, in display order. Absent roles yield empty fields.
fn extract_skills(lines: &[String]) -> Vec<Skill> {
    let block_end = |from: usize| -> usize {
        (from..lines.len())
            .find(|&i| {
                is_role_line(&lines[i])
                    || lines[i].contains("アイドルロード")
                    || lines[i].contains(ROAD_HEADING)
            })
            .unwrap_or(lines.len())
    };

    SKILL_ROLES
        .iter()
        .map(|role| {
            let Some(start) = (0..lines.len())
                .find(|&i| is_role_line(&lines[i]) && lines[i].contains(role))
            else {
                return Skill::default();
            };
            let end = block_end(start + 1);
            let block = &lines[start..end];

            let mut name = QUOTED_RE
                .captures(&block[0])
                .map(|c| s!(c[1].trim()))
                .or_else(|| {
                    block[0].split_once(role).and_then(|(_, rest)| {
                        let rest = rest.trim_matches(|c: char| {
                            c.is_whitespace() || matches!(c, ':' | '：' | '「' | '」')
                        });
                        // navigation/common labels are not names
                        if rest.is_empty() || rest.contains("効果") || rest.contains("共通") || rest.contains("項目") {
                            None
                        } else {
                            Some(s!(rest))
                        }
                    })
                })
                .unwrap_or_default();
            if name.is_empty() {
                if let Some(q) = block.iter().skip(1).find_map(|l| QUOTED_RE.captures(l)) {
                    name = s!(q[1].trim());
                }
            }

            let effects: Vec<&str> = block
                .iter()
                .skip(1)
                .filter(|l| {
                    LEVEL_LINE_RE.is_match(l)
                        || l.contains('％')
                        || l.contains("ドロップ率")
                        || l.to_ascii_lowercase().contains("up")
                })
                .map(|l| l.as_str())
                .collect();

            Skill { name, description: effects.join(" / ") }
        })
        .collect()
}

/* ---------------- idol road ---------------- */

fn extract_route_items(lines: &[String]) -> Vec<String> {
    let Some(start) = lines.iter().position(|l| l.contains(ROAD_HEADING)) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for line in &lines[start + 1..] {
        if SECTION_STOPS.iter().any(|stop| line.contains(stop)) {
            break;
        }
        if ITEM_RE.is_match(line) {
            items.push(line.clone());
        }
    }
    items
}

/* ---------------- text helpers ---------------- */

/// Document text as normalized, non-empty lines (one per text node),
/// excluding script/style contents. Stands in for a structured text dump.
fn text_lines(doc: &Html) -> Vec<String> {
    let mut out = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| matches!(el.value().name(), "script" | "style"));
        if skipped {
            continue;
        }
        let line = normalize_ws(text);
        if !line.is_empty() {
            out.push(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_page() -> String {
        s!(r#"<html><head>
            <title>【wiki】［裏表アンビバレンス］HiMERU - attack wiki | Gamerch</title>
            <meta property="og:title" content="［裏表アンビバレンス］HiMERU | wiki">
        </head><body>
            <h1>［裏表アンビバレンス］HiMERU</h1>
            <h2>基本情報</h2>
            <table>
                <tr><th>レアリティ</th><td>☆5</td></tr>
                <tr><th>タイプ/属性</th><td>キラメキ</td></tr>
                <tr><th>ファン上限</th><td>8,500人</td></tr>
                <tr><th>追加日</th><td>2025年04月25日（クロススカウト）</td></tr>
            </table>
            <h2>ステータス</h2>
            <table>
                <tr><th></th><th>初期値</th><th>無凸MAX値</th><th>完凸MAX値</th></tr>
                <tr><th>総合値</th><td>23,510</td><td>52,340</td><td>63,120</td></tr>
                <tr><th>Da</th><td>8,120</td><td>18,020</td><td>21,700</td></tr>
                <tr><th>Vo</th><td>7,660</td><td>17,110</td><td>-</td></tr>
                <tr><th>Pf</th><td>7,730</td><td>17,210</td><td>20,730</td></tr>
            </table>
            <h2>センター/ライブ/サポートスキル</h2>
            <p>センタースキル「まばゆい輝き」</p>
            <p>キラメキタイプのDaが40％up</p>
            <p>ライブスキル「裏の顔」</p>
            <p>初期Lv.1：スコアが25％upする</p>
            <p>Lv.5：スコアが45％upする</p>
            <p>サポートスキル「表の顔」</p>
            <p>Lv.1：ピースのドロップ率が5％upする</p>
            <p>Lv.3：ピースのドロップ率が12％upする</p>
            <h2>アイドルロードで取得できるスキル/アイテム</h2>
            <ul>
                <li>ライブスキル「裏の顔」</li>
                <li>MV衣装（裏表アンビバレンス）</li>
                <li>ルーム衣装（裏表アンビバレンス）</li>
                <li>背景（ラウンジ）</li>
                <li>SPP「Crossing×Heart」</li>
            </ul>
            <h2>必要素材数</h2>
            <p>ピース×120</p>
        </body></html>"#)
    }

    #[test]
    fn parses_full_card_page() {
        let rec = parse_card(&card_page(), "https://wiki.example/some-game/1", "クロス").unwrap();

        assert_eq!(rec.name, "［裏表アンビバレンス］HiMERU");
        assert_eq!(rec.source_event, "クロス");

        assert_eq!(rec.base_info["レアリティ"], "☆5");
        assert_eq!(rec.base_info["タイプ/属性"], "キラメキ");
        assert_eq!(rec.base_info["ファン上限"], "8500");

        assert_eq!(rec.numeric_stats["完凸MAX値 総合値"], Some(63120));
        assert_eq!(rec.numeric_stats["初期値 Da"], Some(8120));
        // dash cell parses to None but stays present
        assert_eq!(rec.numeric_stats["完凸MAX値 Vo"], None);

        assert_eq!(rec.skills.len(), 3);
        assert_eq!(rec.skills[0].name, "まばゆい輝き");
        assert!(rec.skills[0].description.contains("40％up"));
        assert_eq!(rec.skills[1].name, "裏の顔");
        assert!(rec.skills[1].description.contains("Lv.5："));
        assert_eq!(rec.skills[2].name, "表の顔");
        assert!(rec.skills[2].description.contains("ドロップ率"));

        assert_eq!(rec.route_items.len(), 5);
        assert!(rec.route_items[1].starts_with("MV衣装"));
        assert!(rec.route_items.iter().all(|i| !i.contains("ピース×120")));
    }

    #[test]
    fn name_precedence_prefers_og_title() {
        let html = r#"<html><head>
            <meta property="og:title" content="［OG名］キャラA | wiki">
            <title>［TITLE名］キャラB | wiki</title>
        </head><body><h1>［H1名］キャラC</h1></body></html>"#;
        let rec = parse_card(html, "u", "e").unwrap();
        assert_eq!(rec.name, "［OG名］キャラA");
    }

    #[test]
    fn falls_back_to_h1_when_meta_unbracketed() {
        let html = r#"<html><head>
            <meta property="og:title" content="ただのページ">
            <title>ただのページ | wiki</title>
        </head><body><h1>☆4［お茶会の招待状］桜河こはく</h1></body></html>"#;
        let rec = parse_card(html, "u", "e").unwrap();
        assert_eq!(rec.name, "［お茶会の招待状］桜河こはく");
    }

    #[test]
    fn non_card_pages_are_parse_errors() {
        let profile = r#"<html><head><title>［詳細］キャラ プロフィール</title></head><body></body></html>"#;
        assert!(parse_card(profile, "u", "e").is_err());

        let plain = r#"<html><head><title>攻略トップ</title></head><body><p>menu</p></body></html>"#;
        let err = parse_card(plain, "u", "e").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
    }

    #[test]
    fn partial_page_yields_partial_record() {
        let html = r#"<html><head>
            <meta property="og:title" content="［名前だけ］キャラ | wiki">
        </head><body><p>under construction</p></body></html>"#;
        let rec = parse_card(html, "u", "e").unwrap();
        assert_eq!(rec.name, "［名前だけ］キャラ");
        assert!(rec.base_info.is_empty());
        assert!(rec.numeric_stats.is_empty());
        assert_eq!(rec.skills, vec![Skill::default(), Skill::default(), Skill::default()]);
        assert!(rec.route_items.is_empty());
    }
}
