use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use citecheck_core::{Config, CoreError, MatchKind, check_document};

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:pPr><w:outlineLvl w:val="0"/></w:pPr>
  </w:style>
</w:styles>"#;

fn heading(text: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#)
}

fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

fn docx_bytes(body: &str) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        zip.write_all(document.as_bytes()).unwrap();
        zip.start_file("word/styles.xml", options).unwrap();
        zip.write_all(STYLES.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

fn write_docx(dir: &Path, name: &str, body: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, docx_bytes(&body.concat())).unwrap();
    path
}

#[test]
fn all_citations_present() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[
            heading("Introduction"),
            para("Prior work (Smith, 2020) and (Jones &amp; Brown, 2019) agree."),
            heading("References"),
            para("Smith, J. (2020). Title."),
            para("Jones, A., &amp; Brown, B. (2019). Title."),
        ],
    );

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert_eq!(analysis.citations.len(), 2);
    assert_eq!(analysis.result.entries.len(), 2);
    assert!(analysis.result.missing.is_empty());
    assert!(analysis.passed());
    assert!(analysis.result.matched.iter().all(|m| m.kind == MatchKind::Exact));
    assert!(analysis.markdown.contains("# References"));
}

#[test]
fn uncited_reference_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[
            para("As argued (Wilson, 2022)."),
            heading("References"),
            para("Smith, J. (2020). Title."),
        ],
    );

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert!(!analysis.passed());
    assert_eq!(analysis.result.missing.len(), 1);
    assert_eq!(analysis.result.missing[0].display, "Wilson, 2022");
}

#[test]
fn italic_et_al_is_still_checked() {
    let dir = tempfile::tempdir().unwrap();
    let italic = |text: &str| format!(r#"<w:r><w:rPr><w:i/></w:rPr><w:t>{text}</w:t></w:r>"#);
    let plain = |text: &str| format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#);
    let cited = format!(
        "<w:p>{}{}{}{}{}</w:p>",
        plain("As shown (Wilson "),
        italic("et al."),
        plain(", 2022) and ("),
        italic("Lee"),
        plain(", 2018)."),
    );
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[cited, heading("References"), para("Smith, J. (2020). Title.")],
    );

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert!(analysis.markdown.contains("(Wilson *et al.*, 2022)"));
    let missing: Vec<_> = analysis
        .result
        .missing
        .iter()
        .map(|c| c.display.as_str())
        .collect();
    assert_eq!(missing, vec!["Wilson et al., 2022", "Lee, 2018"]);
    assert!(!analysis.passed());
}

#[test]
fn no_reference_heading_reports_everything_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[
            para("Claims (Smith, 2020) and (Lee, 2018)."),
            heading("Sources"),
            para("Smith, J. (2020). Title."),
        ],
    );

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert!(analysis.section.is_none());
    assert!(analysis.result.entries.is_empty());
    assert_eq!(analysis.result.missing.len(), 2);
    assert_eq!(analysis.warnings.len(), 1);
    assert!(!analysis.passed());
}

#[test]
fn extra_heading_finds_custom_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[
            para("Claims (Smith, 2020)."),
            heading("Sources"),
            para("Smith, J. (2020). Title."),
        ],
    );

    let mut config = Config::default();
    config.add_headings(["Sources"]);
    let analysis = check_document(&path, &config).unwrap();
    assert!(analysis.passed());
}

#[test]
fn empty_document_passes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(dir.path(), "empty.docx", &[]);

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert!(analysis.citations.is_empty());
    assert!(analysis.result.entries.is_empty());
    assert!(analysis.passed());
}

#[test]
fn runs_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "paper.docx",
        &[
            para("See [2], [1] and (Smith et al., 2020)."),
            heading("References"),
            para("1. Smith, J., Lee, K. (2020). Title."),
            para("2. Jones, A. (2019). Title."),
        ],
    );

    let first = check_document(&path, &Config::default()).unwrap();
    let second = check_document(&path, &Config::default()).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.markdown, second.markdown);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn markdown_input_is_read_directly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.md");
    std::fs::write(
        &path,
        "Text (Smith, 2020).\n\n## Works Cited\n\n- Smith, J. (2020). Title.\n",
    )
    .unwrap();

    let analysis = check_document(&path, &Config::default()).unwrap();
    assert!(analysis.passed());
    assert_eq!(analysis.result.entries[0].text, "Smith, J. (2020). Title.");
}

#[test]
fn missing_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = check_document(&dir.path().join("absent.docx"), &Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::Input { .. }));
    assert!(err.to_string().contains("absent.docx"));
}

#[test]
fn corrupt_docx_is_a_conversion_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.docx");
    std::fs::write(&path, b"this is not a zip archive").unwrap();

    let err = check_document(&path, &Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::Conversion(_)));
}
