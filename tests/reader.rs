mod common;

use common::{RecordingSink, TestWorkspace};
use tabload::{
    ImportError,
    progress::{CancellationToken, Checkpoint, LogSink},
    reader::TabularReader,
    rows::RowSet,
    settings::{ImportSettings, SourceOptions},
};

fn read_with(
    path: &std::path::Path,
    settings: &ImportSettings,
    options: &SourceOptions,
) -> Result<RowSet, ImportError> {
    let sink = LogSink;
    let cancel = CancellationToken::new();
    TabularReader::new(settings, options, Checkpoint::new(&sink, &cancel)).read(path)
}

fn read(path: &std::path::Path) -> Result<RowSet, ImportError> {
    read_with(path, &ImportSettings::for_table("t"), &SourceOptions::default())
}

fn cell(set: &RowSet, row: usize, col: usize) -> Option<&str> {
    set.rows()[row][col].as_deref()
}

#[test]
fn csv_headers_are_trimmed_and_deduplicated() {
    let ws = TestWorkspace::new();
    let path = ws.write("people.csv", " id , name ,name,\n1, Ada ,x,y\n");
    let set = read(&path).unwrap();
    assert_eq!(set.column_names(), vec!["id", "name", "name_2", "Column4"]);
    assert_eq!(cell(&set, 0, 1), Some("Ada"));
}

#[test]
fn csv_ragged_rows_are_padded_and_truncated() {
    let ws = TestWorkspace::new();
    let path = ws.write("ragged.csv", "a,b,c\n1\n1,2,3,4,5\n");
    let set = read(&path).unwrap();
    assert_eq!(set.rows()[0], vec![Some("1".to_string()), None, None]);
    assert_eq!(set.rows()[1].len(), 3);
    assert_eq!(cell(&set, 1, 2), Some("3"));
}

#[test]
fn csv_trimming_can_be_disabled() {
    let ws = TestWorkspace::new();
    let path = ws.write("pad.csv", "a\n  padded  \n");
    let settings = ImportSettings {
        trim_strings: false,
        ..ImportSettings::for_table("t")
    };
    let set = read_with(&path, &settings, &SourceOptions::default()).unwrap();
    assert_eq!(cell(&set, 0, 0), Some("  padded  "));
}

#[test]
fn empty_rows_are_logged_with_their_source_row_number() {
    let ws = TestWorkspace::new();
    let path = ws.write("gaps.csv", "a,b\n1,2\n , \n3,4\n");
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();
    let settings = ImportSettings::for_table("t");
    let options = SourceOptions::default();
    let set = TabularReader::new(&settings, &options, Checkpoint::new(&sink, &cancel))
        .read(&path)
        .unwrap();
    assert_eq!(set.row_count(), 2);
    assert!(sink.contains("Skipping empty row 3"));
    assert!(sink.errors().is_empty());
}

#[test]
fn tsv_and_custom_delimiters_are_honoured() {
    let ws = TestWorkspace::new();
    let path = ws.write("data.tsv", "a\tb\n1\t2\n");
    assert_eq!(read(&path).unwrap().column_names(), vec!["a", "b"]);

    let path = ws.write("semi.txt", "a;b\n1;2\n");
    let options = SourceOptions {
        delimiter: Some(b';'),
        ..SourceOptions::default()
    };
    let set = read_with(&path, &ImportSettings::for_table("t"), &options).unwrap();
    assert_eq!(cell(&set, 0, 1), Some("2"));
}

#[test]
fn legacy_encodings_are_transcoded() {
    let ws = TestWorkspace::new();
    // "café" in windows-1252
    let path = ws.write_bytes("latin.csv", b"name\ncaf\xe9\n");
    let options = SourceOptions {
        encoding: Some("windows-1252".to_string()),
        ..SourceOptions::default()
    };
    let set = read_with(&path, &ImportSettings::for_table("t"), &options).unwrap();
    assert_eq!(cell(&set, 0, 0), Some("café"));
}

#[test]
fn header_only_csv_has_no_data_rows() {
    let ws = TestWorkspace::new();
    let path = ws.write("header.csv", "a,b\n");
    assert!(matches!(read(&path), Err(ImportError::NoDataRows)));
    let path = ws.write("empty.csv", "");
    assert!(matches!(read(&path), Err(ImportError::EmptyHeader)));
}

#[test]
fn unsupported_extensions_are_rejected() {
    let ws = TestWorkspace::new();
    let path = ws.write("notes.pdf", "a\n1\n");
    assert!(matches!(
        read(&path),
        Err(ImportError::UnsupportedFormat { .. })
    ));
}

#[test]
fn workbook_cells_are_decoded_and_expanded() {
    let ws = TestWorkspace::new();
    let path = ws.write_workbook("book.xlsx", |wb| {
        let sheet = wb.add_worksheet();
        sheet.set_name("Data").unwrap();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "score").unwrap();
        sheet.write_string(0, 3, "note").unwrap();
        sheet.write_number(1, 0, 1).unwrap();
        sheet.write_number(1, 1, 98.5).unwrap();
        sheet.write_string(1, 3, " hi ").unwrap();
        // row 3 is missing entirely, row 4 only has its last cell
        sheet.write_string(3, 3, "tail").unwrap();
        sheet.write_number(4, 0, 3).unwrap();
        sheet.write_number(4, 1, 1500).unwrap();
    });
    let set = read(&path).unwrap();
    assert_eq!(set.column_names(), vec!["id", "score", "Column3", "note"]);
    assert_eq!(set.row_count(), 3);
    assert_eq!(
        set.rows()[0],
        vec![
            Some("1".to_string()),
            Some("98.5".to_string()),
            None,
            Some("hi".to_string())
        ]
    );
    assert_eq!(set.rows()[1], vec![None, None, None, Some("tail".to_string())]);
    assert_eq!(cell(&set, 2, 1), Some("1500"));
}

#[test]
fn multi_sheet_workbooks_need_a_sheet_choice() {
    let ws = TestWorkspace::new();
    let path = ws.write_workbook("two.xlsx", |wb| {
        let first = wb.add_worksheet();
        first.set_name("First").unwrap();
        first.write_string(0, 0, "a").unwrap();
        first.write_string(1, 0, "one").unwrap();
        let second = wb.add_worksheet();
        second.set_name("Second").unwrap();
        second.write_string(0, 0, "b").unwrap();
        second.write_string(1, 0, "two").unwrap();
    });
    assert!(matches!(
        read(&path),
        Err(ImportError::SheetSelectionRequired { .. })
    ));

    let options = SourceOptions {
        sheet: Some("Second".to_string()),
        ..SourceOptions::default()
    };
    let set = read_with(&path, &ImportSettings::for_table("t"), &options).unwrap();
    assert_eq!(set.column_names(), vec!["b"]);
    assert_eq!(cell(&set, 0, 0), Some("two"));

    let options = SourceOptions {
        sheet: Some("Third".to_string()),
        ..SourceOptions::default()
    };
    assert!(matches!(
        read_with(&path, &ImportSettings::for_table("t"), &options),
        Err(ImportError::SheetNotFound { .. })
    ));
}

#[test]
fn cancellation_surfaces_instead_of_partial_data() {
    let ws = TestWorkspace::new();
    let path = ws.write("data.csv", &common::numbered_csv(50));
    let sink = LogSink;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let settings = ImportSettings::for_table("t");
    let options = SourceOptions::default();
    let err = TabularReader::new(&settings, &options, Checkpoint::new(&sink, &cancel))
        .read(&path)
        .unwrap_err();
    assert!(err.is_cancelled());
}
