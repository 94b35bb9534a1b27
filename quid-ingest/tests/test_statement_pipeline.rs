//! End-to-end pipeline runs over realistic statement fixtures.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use quid_core::{NullSink, ParseError, PeriodHint};
use quid_ingest::{RawDocument, StatementParser};

/// Build a one-page PDF placing each `(x, y, text)` run with its own Td.
fn fixture_pdf(runs: &[(f32, f32, &str)]) -> Vec<u8> {
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

const BANK_CSV: &[u8] = b"Transaction Date,Narrative,Money Out,Money In,Balance\n\
01/02/2025,TESCO STORES 3211,23.40,,976.60\n\
02/02/2025,GREGGS PLC,4.10,,972.50\n\
03/02/2025,PAYROLL ACME LTD,,1500.00,2472.50\n\
04/02/2025,COSTA COFFEE,3.20,,2469.30\n\
05/02/2025,CARD PAYMENT AMAZON,19.99,,2449.31\n";

#[test]
fn test_csv_statement_end_to_end() {
    let doc = RawDocument::new(BANK_CSV.to_vec(), "natwest_feb.csv");
    let outcome = StatementParser::new().parse(&doc, &NullSink).unwrap();

    assert_eq!(outcome.transactions.len(), 5);
    assert_eq!(outcome.transactions[0].amount, 23.40);
    assert_eq!(outcome.transactions[2].amount, -1500.00, "credit column negates");
    assert_eq!(outcome.transactions[4].balance, Some(2449.31));
    assert_eq!(outcome.bank.as_deref(), Some("NatWest"), "provider from filename");

    let mapping = outcome.mapping.expect("tabular runs carry a mapping");
    assert!(mapping.viable());
    assert!(outcome.quality.acceptable());
}

#[test]
fn test_parsing_is_idempotent() {
    let parse = || {
        let doc = RawDocument::new(BANK_CSV.to_vec(), "natwest_feb.csv");
        StatementParser::new().parse(&doc, &NullSink).unwrap()
    };
    let first = parse();
    let second = parse();

    assert_eq!(
        serde_json::to_string(&first.transactions).unwrap(),
        serde_json::to_string(&second.transactions).unwrap()
    );
    assert_eq!(first.quality, second.quality);
}

#[test]
fn test_split_header_pdf_statement() {
    let pdf = fixture_pdf(&[
        (40.0, 740.0, "Card Statement"),
        (40.0, 720.0, "Balance brought forward 250.00"),
        // Header split over two visual rows: the amount marker sits below.
        (40.0, 700.0, "Transaction Date"),
        (140.0, 700.0, "Process Date"),
        (250.0, 700.0, "Transaction Details"),
        (420.0, 688.0, "Amount £"),
        (40.0, 668.0, "12 Feb"),
        (140.0, 668.0, "13 Feb"),
        (250.0, 668.0, "CARD PAYMENT TESCO STORES"),
        (420.0, 668.0, "45.00"),
        (40.0, 648.0, "20 Dec"),
        (140.0, 648.0, "21 Dec"),
        (250.0, 648.0, "PAYMENT RECEIVED THANK YOU"),
        (420.0, 648.0, "100.00 CR"),
        (40.0, 600.0, "Please check your transactions and report any problems"),
    ]);
    let doc = RawDocument::new(pdf, "card_statement.pdf");
    let parser = StatementParser::new().with_period_hint(PeriodHint::new(2025, 2));
    let outcome = parser.parse(&doc, &NullSink).unwrap();

    assert_eq!(outcome.transactions.len(), 2);

    let purchase = &outcome.transactions[0];
    assert_eq!(purchase.date, chrono::NaiveDate::from_ymd_opt(2025, 2, 12).unwrap());
    assert_eq!(
        purchase.process_date,
        Some(chrono::NaiveDate::from_ymd_opt(2025, 2, 13).unwrap())
    );
    assert_eq!(purchase.amount, 45.00);

    let repayment = &outcome.transactions[1];
    assert_eq!(
        repayment.date,
        chrono::NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
        "December rolls back to the prior year in a February-ending period"
    );
    assert_eq!(repayment.amount, -100.00, "CR marker negates the magnitude");

    assert_eq!(outcome.starting_balance, Some(250.00));
}

#[test]
fn test_password_protected_style_garbage_fails_typed() {
    let doc = RawDocument::new(b"%PDF-1.7 then it all goes wrong".to_vec(), "broken.pdf");
    let err = StatementParser::new().parse(&doc, &NullSink).unwrap_err();
    assert!(matches!(err, ParseError::DocumentUnreadable(_)));
}
