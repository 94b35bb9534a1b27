//! Native PDF text extraction with positions
//!
//! Walks each page's decoded content stream tracking the text cursor, and
//! emits a [`PositionedTextItem`] per shown string. No font metrics are
//! consulted; statement tables position every cell with its own `Td`/`Tm`,
//! which is all the table reconstructor needs.
//!
//! A document whose total extracted text stays under
//! [`NATIVE_TEXT_MIN_CHARS`] is treated as a scan and handed to the OCR
//! sub-path by the orchestrator.

use lopdf::content::Content;
use lopdf::{Document, Object};
use quid_core::{CancelToken, ParseError, ProgressSink, ProgressUpdate, Stage};

use crate::types::PositionedTextItem;

/// Below this many characters of native text across all pages, the
/// document is considered a scanned image.
pub const NATIVE_TEXT_MIN_CHARS: usize = 100;

/// In a `TJ` array, a kern adjustment at least this negative (thousandths
/// of an em) stands in for an inter-word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

fn unreadable(e: impl std::fmt::Display) -> ParseError {
    ParseError::DocumentUnreadable(e.to_string())
}

fn operand_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF string object's bytes. UTF-16BE when the BOM says so,
/// byte-per-char otherwise; glyphs our heuristics don't need degrade to
/// replacement characters rather than failing the page.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Cursor state of one page's text object walk.
#[derive(Default)]
struct TextCursor {
    x: f32,
    y: f32,
    line_x: f32,
    line_y: f32,
    leading: f32,
}

impl TextCursor {
    fn begin_text(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.line_x = 0.0;
        self.line_y = 0.0;
    }

    fn set_matrix(&mut self, e: f32, f: f32) {
        self.line_x = e;
        self.line_y = f;
        self.x = e;
        self.y = f;
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.line_x += dx;
        self.line_y += dy;
        self.x = self.line_x;
        self.y = self.line_y;
    }

    fn next_line(&mut self) {
        self.line_y -= self.leading;
        self.x = self.line_x;
        self.y = self.line_y;
    }
}

/// Extract positioned text items from an in-memory PDF.
///
/// Encrypted and structurally corrupt documents fail the whole run with
/// [`ParseError::DocumentUnreadable`]; there is no partial result.
pub fn extract_positioned(
    bytes: &[u8],
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<Vec<PositionedTextItem>, ParseError> {
    let doc = Document::load_mem(bytes).map_err(unreadable)?;
    if doc.is_encrypted() {
        return Err(ParseError::DocumentUnreadable(
            "document is password-protected".to_string(),
        ));
    }

    let pages = doc.get_pages();
    let page_count = pages.len().max(1);
    let mut items = Vec::new();

    for (index, (_page_number, page_id)) in pages.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ParseError::Cancelled);
        }
        sink.report(ProgressUpdate::new(
            Stage::Extracting,
            format!("Reading page {} of {page_count}", index + 1),
            ((index + 1) * 50 / page_count) as u8,
        ));

        let content_data = doc.get_page_content(page_id).map_err(unreadable)?;
        let content = Content::decode(&content_data).map_err(unreadable)?;
        walk_page(&content, index, &mut items);
    }

    tracing::debug!(items = items.len(), "native extraction finished");
    Ok(items)
}

fn walk_page(content: &Content, page: usize, items: &mut Vec<PositionedTextItem>) {
    let mut cursor = TextCursor { leading: 12.0, ..TextCursor::default() };

    let mut emit = |text: String, cursor: &TextCursor| {
        if !text.trim().is_empty() {
            items.push(PositionedTextItem {
                text: text.trim().to_string(),
                x: cursor.x,
                y: cursor.y,
                page,
            });
        }
    };

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => cursor.begin_text(),
            "Tm" => {
                if operands.len() >= 6 {
                    if let (Some(e), Some(f)) =
                        (operand_f32(&operands[4]), operand_f32(&operands[5]))
                    {
                        cursor.set_matrix(e, f);
                    }
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    if let (Some(dx), Some(dy)) =
                        (operand_f32(&operands[0]), operand_f32(&operands[1]))
                    {
                        if op.operator == "TD" {
                            cursor.leading = -dy;
                        }
                        cursor.translate(dx, dy);
                    }
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(operand_f32) {
                    cursor.leading = l;
                }
            }
            "T*" => cursor.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    emit(decode_pdf_string(bytes), &cursor);
                }
            }
            // ' and " show a string on the next line; " carries two
            // spacing operands before it.
            "'" | "\"" => {
                cursor.next_line();
                if let Some(Object::String(bytes, _)) =
                    operands.iter().rev().find(|o| matches!(o, Object::String(..)))
                {
                    emit(decode_pdf_string(bytes), &cursor);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = operands.first() {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            Object::Integer(i) if (*i as f32) <= -TJ_SPACE_THRESHOLD => {
                                text.push(' ')
                            }
                            Object::Real(r) if *r <= -TJ_SPACE_THRESHOLD => text.push(' '),
                            _ => {}
                        }
                    }
                    emit(text, &cursor);
                }
            }
            _ => {}
        }
    }
}

/// Total character count across items, for the scanned-document check.
pub fn total_chars(items: &[PositionedTextItem]) -> usize {
    items.iter().map(|i| i.text.chars().count()).sum()
}

/// Page count of an in-memory PDF, for sizing the OCR sub-path.
pub fn page_count(bytes: &[u8]) -> Result<usize, ParseError> {
    let doc = Document::load_mem(bytes).map_err(unreadable)?;
    Ok(doc.get_pages().len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, dictionary};
    use quid_core::NullSink;

    /// Build a one-page PDF placing each `(x, y, text)` run with its own Td.
    pub(crate) fn fixture_pdf(runs: &[(f32, f32, &str)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        for (x, y, text) in runs {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialize fixture pdf");
        buf
    }

    #[test]
    fn test_extracts_runs_with_positions() {
        let pdf = fixture_pdf(&[
            (40.0, 700.0, "Date"),
            (200.0, 700.0, "Description"),
            (420.0, 700.0, "Amount"),
            (40.0, 680.0, "12/03/2025"),
        ]);
        let items = extract_positioned(&pdf, &NullSink, &CancelToken::new()).unwrap();
        assert_eq!(items.len(), 4);

        let date = items.iter().find(|i| i.text == "Date").unwrap();
        assert_eq!(date.page, 0);
        assert!((date.x - 40.0).abs() < 0.01);
        assert!((date.y - 700.0).abs() < 0.01);

        let amount = items.iter().find(|i| i.text == "Amount").unwrap();
        assert!((amount.x - 420.0).abs() < 0.01);
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = extract_positioned(b"not a pdf at all", &NullSink, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ParseError::DocumentUnreadable(_)));
    }

    #[test]
    fn test_cancellation_wins_before_pages() {
        let pdf = fixture_pdf(&[(40.0, 700.0, "Date")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = extract_positioned(&pdf, &NullSink, &cancel).unwrap_err();
        assert!(matches!(err, ParseError::Cancelled));
    }

    #[test]
    fn test_total_chars() {
        let items = vec![
            PositionedTextItem { text: "abc".into(), x: 0.0, y: 0.0, page: 0 },
            PositionedTextItem { text: "defgh".into(), x: 0.0, y: 0.0, page: 0 },
        ];
        assert_eq!(total_chars(&items), 8);
    }

    #[test]
    fn test_utf16_bom_string() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "£45".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_pdf_string(&bytes), "£45");
    }
}
