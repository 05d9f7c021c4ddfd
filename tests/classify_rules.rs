mod common;

use common::{catalog, scanned_page, text_page, touch_pdf, with_source, FakeEngine, FakePage};
use statement_splitter::classify::{classify, first_match, UNKNOWN_TYPE};

const RULES: &str = r#"
[[statement_types]]
type_name = "bendigo_statement"
match_criteria = [{ type = "keyword", value = "Bendigo" }]
split_type = "start_end"
start_pattern = 'Statement number\s+(\d+)'
must_not_contain = "Continued overleaf..."

[[statement_types]]
type_name = "bom_statement"
match_criteria = [
    { type = "keyword", value = "FREEDOM" },
    { type = "keyword", value = "St.George" },
]
split_type = "list"
start_pattern = '\(page\s+1 of \d+\)'

[[statement_types]]
type_name = "standard_statement"
match_criteria = [{ type = "regex", value = '\b1 of \d' }]
split_type = "list"
start_pattern = '\b1 of \d+'
"#;

fn classify_pages(pages: Vec<FakePage>) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input = touch_pdf(dir.path(), "in.pdf");
    let engine = FakeEngine::new().with_doc("in.pdf", pages);
    let catalog = catalog(RULES);
    with_source(&engine, &input, |src| classify(&catalog, src, 12).0.type_name)
}

#[test]
fn first_rule_in_catalog_order_wins() {
    // matches both bendigo and standard; bendigo comes first
    let t = classify_pages(vec![text_page("Bendigo Bank page 1 of 2")]);
    assert_eq!(t, "bendigo_statement");
}

#[test]
fn criteria_within_a_rule_are_ored() {
    let t = classify_pages(vec![text_page("St.George everyday account")]);
    assert_eq!(t, "bom_statement");
}

#[test]
fn regex_criterion_matches_anywhere_in_leading_pages() {
    let t = classify_pages(vec![
        text_page("Cover letter for customer"),
        text_page("Summary page 1 of 4"),
    ]);
    assert_eq!(t, "standard_statement");
}

#[test]
fn keywords_are_case_sensitive() {
    let t = classify_pages(vec![text_page("bendigo freedom account")]);
    assert_eq!(t, UNKNOWN_TYPE);
}

#[test]
fn no_match_is_unknown() {
    let t = classify_pages(vec![text_page("Quarterly newsletter"), text_page("Nothing else")]);
    assert_eq!(t, UNKNOWN_TYPE);
}

#[test]
fn only_leading_pages_are_sampled() {
    let mut pages: Vec<FakePage> = (0..12).map(|_| text_page("Generic letter body")).collect();
    pages.push(text_page("Bendigo Bank"));
    assert_eq!(classify_pages(pages), UNKNOWN_TYPE);
}

#[test]
fn scanned_documents_classify_from_ocr_text() {
    let t = classify_pages(vec![scanned_page("FREEDOM ACCOUNT (page | 0f 3)")]);
    assert_eq!(t, "bom_statement");
}

#[test]
fn first_match_on_raw_text() {
    let catalog = catalog(RULES);
    assert_eq!(
        first_match(&catalog, "... 1 of 9 ...").map(|r| r.type_name.as_str()),
        Some("standard_statement")
    );
    assert!(first_match(&catalog, "").is_none());
}
