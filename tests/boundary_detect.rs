mod common;

use common::{catalog, scanned_page, text_page, touch_pdf, with_source, FakeEngine, FakePage};
use statement_splitter::detect::{detect, BoundaryMap, StatementId, StatementRange};

const RULES: &str = r#"
[[statement_types]]
type_name = "bendigo"
match_criteria = [{ type = "keyword", value = "Bendigo" }]
split_type = "start_end"
start_pattern = 'Statement number\s+(\d+)'
must_not_contain = "Continued overleaf..."

[[statement_types]]
type_name = "standard"
match_criteria = [{ type = "regex", value = '\b1 of \d' }]
split_type = "list"
start_pattern = '\b1 of \d+'

[[statement_types]]
type_name = "footer"
match_criteria = [{ type = "keyword", value = "Footer Bank" }]
split_type = "list"
start_pattern = '(?i)page\s+1\s+of\s+\d+'
start_in_footer = true

[[statement_types]]
type_name = "phrase"
match_criteria = [{ type = "keyword", value = "ACCOUNT STATEMENT" }]
split_type = "start_end"
start_phrase = "ACCOUNT STATEMENT"
must_not_contain = "continued"

[[statement_types]]
type_name = "both"
match_criteria = [{ type = "keyword", value = "NEW STATEMENT" }]
split_type = "start_end"
start_pattern = 'Statement (?:number|ref)\s+(\w+)'
start_phrase = "NEW STATEMENT"
"#;

fn range(id: StatementId, start: u32, end: u32) -> StatementRange {
    StatementRange { id, start, end }
}

fn run(pages: Vec<FakePage>, rule: &str) -> (BoundaryMap, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let input = touch_pdf(dir.path(), "doc.pdf");
    let engine = FakeEngine::new().with_doc("doc.pdf", pages);
    let catalog = catalog(RULES);
    let rule = catalog.rule_for(rule).unwrap();
    let map = with_source(&engine, &input, |src| detect(src, rule, None).unwrap());
    (map, engine.calls())
}

#[test]
fn list_topology_splits_on_each_first_page() {
    let pages = (0..9)
        .map(|i| text_page(&format!("Page {} of 3", i % 3 + 1)))
        .collect();
    let (map, _) = run(pages, "standard");
    assert_eq!(map, BoundaryMap::Starts(vec![0, 3, 6]));
}

#[test]
fn start_end_closes_when_continuation_marker_disappears() {
    let pages = vec![
        text_page("Bendigo Bank Statement number 7 Continued overleaf..."),
        text_page("Continued overleaf..."),
        text_page("Continued overleaf..."),
        text_page("Closing balance"),
        text_page("Bendigo Bank Statement number 8"),
    ];
    let (map, _) = run(pages, "bendigo");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![
            range(StatementId::Number(7), 0, 3),
            range(StatementId::Number(8), 4, 4),
        ])
    );
}

#[test]
fn new_statement_number_closes_previous_on_prior_page() {
    let pages = vec![
        text_page("Statement number 1 Continued overleaf..."),
        text_page("Continued overleaf..."),
        text_page("Statement number 2 Continued overleaf..."),
        text_page("Continued overleaf..."),
    ];
    let (map, _) = run(pages, "bendigo");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![
            range(StatementId::Number(1), 0, 1),
            range(StatementId::Number(2), 2, 3),
        ])
    );
}

#[test]
fn repeated_number_keeps_statement_open() {
    let pages = vec![
        text_page("Statement number 9"),
        text_page("Statement number 9"),
        text_page("Other bank letter"),
    ];
    let (map, _) = run(pages, "bendigo");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![range(StatementId::Number(9), 0, 2)])
    );
}

#[test]
fn pages_outside_any_statement_are_tolerated() {
    let pages = vec![
        text_page("Cover letter"),
        text_page("Statement number 3"),
        text_page("Marketing insert"),
        text_page("Marketing insert"),
    ];
    let (map, _) = run(pages, "bendigo");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![range(StatementId::Number(3), 1, 2)])
    );
}

#[test]
fn phrase_start_uses_page_as_id() {
    let pages = vec![
        text_page("ACCOUNT STATEMENT continued"),
        text_page("continued"),
        text_page("end of statement"),
        text_page("ACCOUNT STATEMENT"),
    ];
    let (map, _) = run(pages, "phrase");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![
            range(StatementId::Page(0), 0, 2),
            range(StatementId::Page(3), 3, 3),
        ])
    );
}

#[test]
fn pattern_takes_precedence_over_phrase() {
    let pages = vec![
        text_page("NEW STATEMENT Statement number 5"),
        text_page("NEW STATEMENT"),
        text_page("Statement ref ABC"),
    ];
    let (map, _) = run(pages, "both");
    assert_eq!(
        map,
        BoundaryMap::Ranges(vec![
            range(StatementId::Number(5), 0, 0),
            range(StatementId::Page(1), 1, 1),
            // non-numeric capture falls back to the page id
            range(StatementId::Page(2), 2, 2),
        ])
    );
}

#[test]
fn scanned_document_detects_through_ocr() {
    let pages = vec![scanned_page("Page | 0f 2")];
    let (map, calls) = run(pages, "standard");
    assert_eq!(map, BoundaryMap::Starts(vec![0]));
    // first-page probe, then OCR only
    assert_eq!(calls, vec!["native:0", "ocr:0"]);
}

#[test]
fn short_text_layer_page_falls_back_to_ocr() {
    let mut sparse = scanned_page("1 of 2");
    sparse.native = "1".into();
    let pages = vec![text_page("Opening page 1 of 2"), text_page("Page 2 of 2"), sparse];
    let (map, calls) = run(pages, "standard");
    assert_eq!(map, BoundaryMap::Starts(vec![0, 2]));
    assert!(calls.contains(&"ocr:2".to_string()));
    assert!(!calls.contains(&"ocr:0".to_string()));
}

#[test]
fn unreadable_page_does_not_abort_scan() {
    let mut broken = scanned_page("1 of 2");
    broken.ocr_fails = true;
    let pages = vec![scanned_page("1 of 2"), broken, scanned_page("1 of 1")];
    let (map, _) = run(pages, "standard");
    assert_eq!(map, BoundaryMap::Starts(vec![0, 2]));
}

#[test]
fn footer_escalation_tries_text_layer_then_ocr_layouts() {
    let mut first = text_page("Footer Bank welcome pack");
    first.footer_ocr_line = "Page 1 of 2".into();
    let mut second = text_page("Footer Bank transactions");
    second.footer_native = "Page 2 of 2".into();
    let mut third = text_page("Footer Bank welcome pack");
    third.footer_native = "Page 1 of 1".into();

    let (map, calls) = run(vec![first, second, third], "footer");
    assert_eq!(map, BoundaryMap::Starts(vec![0, 2]));

    let page0: Vec<&str> = calls
        .iter()
        .map(|c| c.as_str())
        .filter(|c| c.ends_with(":0"))
        .collect();
    assert_eq!(
        page0,
        vec![
            "native:0",
            "native:0",
            "footer_native:0",
            "footer_ocr_block:0",
            "footer_ocr_line:0"
        ]
    );
    assert!(!calls.contains(&"footer_ocr_block:2".to_string()));
}

#[test]
fn footer_block_ocr_hit_skips_single_line() {
    let mut first = text_page("Footer Bank welcome pack");
    first.footer_ocr_block = "PAGE 1 OF 3".into();
    let (map, calls) = run(vec![first], "footer");
    assert_eq!(map, BoundaryMap::Starts(vec![0]));
    assert!(!calls.contains(&"footer_ocr_line:0".to_string()));
}

#[test]
fn body_match_skips_footer_extraction() {
    let (map, calls) = run(vec![text_page("Footer Bank page 1 of 4")], "footer");
    assert_eq!(map, BoundaryMap::Starts(vec![0]));
    assert!(calls.iter().all(|c| !c.starts_with("footer")));
}

#[test]
fn no_marker_yields_empty_map() {
    let (map, _) = run(vec![text_page("Nothing to see"), text_page("Still nothing")], "standard");
    assert!(map.is_empty());
    let (map, _) = run(vec![text_page("Nothing to see")], "bendigo");
    assert!(map.is_empty());
}

#[test]
fn detection_is_repeatable() {
    let pages = vec![
        text_page("Statement number 7"),
        text_page("Continued overleaf..."),
        text_page("Statement number 8"),
    ];
    let (a, _) = run(pages.clone(), "bendigo");
    let (b, _) = run(pages, "bendigo");
    assert_eq!(a, b);
    if let BoundaryMap::Ranges(r) = &a {
        assert!(r.iter().all(|r| r.end >= r.start));
        assert!(r.windows(2).all(|w| w[0].end < w[1].start));
    }
}
