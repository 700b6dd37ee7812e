use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Failures specific to reading an Office Open XML package.
#[derive(Debug, Error)]
pub enum DocxError {
    /// The file is not a readable zip archive.
    #[error("invalid DOCX archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// The package has no main document part.
    #[error("DOCX package is missing {DOCUMENT_PART}")]
    MissingDocumentPart,
    /// The main document part could not be read.
    #[error("failed to read {DOCUMENT_PART}: {0}")]
    Io(#[from] std::io::Error),
    /// The main document part is not well-formed XML.
    #[error("malformed document XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Extract non-blank paragraph text from a DOCX package, one paragraph per line.
pub(super) fn extract_docx(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    match archive.by_name(DOCUMENT_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingDocumentPart),
        Err(error) => return Err(error.into()),
    }

    let paragraphs = paragraphs_from_xml(&xml)?;
    tracing::trace!(paragraphs = paragraphs.len(), "Decoded DOCX paragraphs");
    Ok(paragraphs
        .into_iter()
        .filter(|paragraph| !paragraph.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Walk `word/document.xml` and collect the text of every `w:p` element.
///
/// Text comes from `w:t` runs; `w:tab` contributes a tab and `w:br`/`w:cr` a line break, which
/// matches how word processors render a paragraph as plain text. Paragraphs nested inside a text
/// box are emitted on their own when they close, and the enclosing paragraph keeps its text.
/// `mc:Fallback` subtrees duplicate their `mc:Choice` sibling and are skipped.
fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut in_text_run = false;
    let mut fallback_depth = 0usize;

    loop {
        let event = reader.read_event()?;
        if fallback_depth > 0 {
            match event {
                Event::Start(_) => fallback_depth += 1,
                Event::End(_) => fallback_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(element) => match element.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text_run = true,
                b"Fallback" => fallback_depth = 1,
                _ => {}
            },
            Event::Empty(element) => {
                let paragraph = open.last_mut();
                match (element.local_name().as_ref(), paragraph) {
                    (b"tab", Some(text)) => text.push('\t'),
                    (b"br" | b"cr", Some(text)) => text.push('\n'),
                    // A self-closing paragraph is an empty line.
                    (b"p", _) => paragraphs.push(String::new()),
                    _ => {}
                }
            }
            Event::Text(text) if in_text_run => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.push_str(&text.unescape()?);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        paragraphs.push(paragraph);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}


#[cfg(test)]
mod tests {
    use super::test_support::build_docx;
    use super::*;

    #[test]
    fn joins_non_blank_paragraphs_with_newlines() {
        let bytes = build_docx(&["First paragraph.", "   ", "", "Second &amp; last."]);
        let text = extract_docx(&bytes).expect("valid docx");
        assert_eq!(text, "First paragraph.\nSecond & last.");
    }

    #[test]
    fn runs_tabs_and_breaks_are_preserved_within_a_paragraph() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:tab/><w:t>world</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t>line one</w:t><w:br/><w:t>line two</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = paragraphs_from_xml(xml).expect("well-formed");
        assert_eq!(paragraphs, vec!["Hello\tworld", "", "line one\nline two"]);
    }

    #[test]
    fn text_box_paragraphs_keep_the_enclosing_paragraph_intact() {
        let xml = r#"<w:body>
            <w:p><w:r><w:t xml:space="preserve">Before box. </w:t></w:r>
              <w:r><w:drawing><wps:txbx><w:txbxContent>
                <w:p><w:r><w:t>Inside box.</w:t></w:r></w:p>
              </w:txbxContent></wps:txbx></w:drawing></w:r>
              <w:r><w:t>After box.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Next paragraph.</w:t></w:r></w:p>
        </w:body>"#;
        let paragraphs = paragraphs_from_xml(xml).expect("well-formed");
        assert_eq!(
            paragraphs,
            vec!["Inside box.", "Before box. After box.", "Next paragraph."]
        );
    }

    #[test]
    fn alternate_content_fallback_is_not_extracted_twice() {
        let xml = r#"<w:body>
            <w:p><w:r><mc:AlternateContent>
              <mc:Choice Requires="wps"><w:drawing><w:txbxContent>
                <w:p><w:r><w:t>Boxed note.</w:t></w:r></w:p>
              </w:txbxContent></w:drawing></mc:Choice>
              <mc:Fallback><w:pict><v:textbox><w:txbxContent>
                <w:p><w:r><w:t>Boxed note.</w:t></w:r></w:p>
                <w:p/>
              </w:txbxContent></v:textbox></w:pict></mc:Fallback>
            </mc:AlternateContent></w:r><w:r><w:t>Body text.</w:t></w:r></w:p>
        </w:body>"#;
        let paragraphs = paragraphs_from_xml(xml).expect("well-formed");
        assert_eq!(paragraphs, vec!["Boxed note.", "Body text."]);
    }

    #[test]
    fn whitespace_between_elements_is_not_paragraph_text() {
        let xml = "<w:body><w:p>\n  <w:r>\n <w:t>only this</w:t>\n </w:r>\n</w:p></w:body>";
        let paragraphs = paragraphs_from_xml(xml).expect("well-formed");
        assert_eq!(paragraphs, vec!["only this"]);
    }

    #[test]
    fn archive_without_document_part_is_rejected() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("docProps/core.xml", SimpleFileOptions::default())
                .expect("start part");
            writer.write_all(b"<core/>").expect("write part");
            writer.finish().expect("finish");
        }
        let error = extract_docx(&buffer.into_inner()).unwrap_err();
        assert!(matches!(error, DocxError::MissingDocumentPart));
    }
}
