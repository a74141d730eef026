use proptest::prelude::*;
use tabload::{
    db::{SqlValue, memory::MemoryDatabase},
    import::{ImportCoordinator, ImportStatus},
    progress::LogSink,
    rows::{self, RowSet},
    schema::{InferenceOptions, InferredType, IntegerWidth, SchemaInferencer, infer},
    settings::ImportSettings,
    source::MemorySource,
};

fn single_column(values: &[String]) -> RowSet {
    RowSet::from_parts(
        ["value"],
        values.iter().map(|v| vec![Some(v.clone())]).collect(),
    )
}

proptest! {
    #[test]
    fn integer_columns_stay_integer(values in prop::collection::vec(-999_999_999i64..=999_999_999, 1..40)) {
        let literals: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let inferred = infer(&single_column(&literals)).columns()[0].inferred;
        let longest = literals.iter().map(|v| v.len()).max().unwrap_or(0);
        let expected = if longest <= 9 { IntegerWidth::Narrow } else { IntegerWidth::Wide };
        prop_assert_eq!(inferred, InferredType::Integer { width: expected });
    }

    #[test]
    fn one_fraction_turns_integers_into_decimal(
        values in prop::collection::vec(0i64..100_000, 1..40),
        position in any::<prop::sample::Index>(),
    ) {
        let mut literals: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let at = position.index(literals.len() + 1);
        literals.insert(at, "1.5".to_string());
        let inferred = infer(&single_column(&literals)).columns()[0].inferred;
        prop_assert_eq!(inferred, InferredType::Decimal);
    }

    #[test]
    fn one_word_turns_numbers_into_text(
        values in prop::collection::vec(0i64..100_000, 1..40),
        word in "[a-z]{1,20}",
    ) {
        let mut literals: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        literals.push(word);
        let longest = literals.iter().map(|v| v.chars().count()).max().unwrap_or(1);
        let inferred = infer(&single_column(&literals)).columns()[0].inferred;
        prop_assert_eq!(inferred, InferredType::Text { max_len: longest });
    }

    #[test]
    fn deduplicated_headers_are_unique(names in prop::collection::vec("[ab]{1,2}", 1..12)) {
        let columns = rows::build_columns(names.clone());
        prop_assert_eq!(columns.len(), names.len());
        let mut seen = std::collections::HashSet::new();
        for (ordinal, column) in columns.iter().enumerate() {
            prop_assert_eq!(column.ordinal, ordinal);
            prop_assert!(seen.insert(column.name.clone()), "duplicate {}", column.name);
        }
    }
}

#[test]
fn mixed_sheet_gets_one_type_per_column() {
    let set = RowSet::from_parts(
        ["id", "price", "placed", "note", "blank"],
        vec![
            vec![
                Some("1".to_string()),
                Some("9.99".to_string()),
                Some("2024-03-01".to_string()),
                Some("first".to_string()),
                None,
            ],
            vec![
                Some("12345678901".to_string()),
                Some("10".to_string()),
                Some("2024-03-02 10:15:00".to_string()),
                None,
                None,
            ],
        ],
    );
    let schema = infer(&set);
    let types: Vec<String> = schema.columns().iter().map(|c| c.sql_type()).collect();
    assert_eq!(
        types,
        vec!["BIGINT", "DECIMAL(18,2)", "DATETIME", "VARCHAR(5)", "VARCHAR(255)"]
    );
    assert!(schema.get("NOTE").unwrap().has_nulls());
    assert_eq!(schema.get("blank").unwrap().null_count, 2);
}

#[test]
fn narrow_integer_threshold_is_configurable() {
    let set = single_column(&["123456".to_string()]);
    let options = InferenceOptions {
        narrow_integer_max_len: 4,
        ..InferenceOptions::default()
    };
    let inferred = SchemaInferencer::new(options).infer(&set).columns()[0].inferred;
    assert_eq!(
        inferred,
        InferredType::Integer {
            width: IntegerWidth::Wide
        }
    );
}

#[test]
fn long_text_moves_to_text_tiers() {
    let set = single_column(&["x".repeat(300)]);
    let schema = infer(&set);
    assert_eq!(schema.columns()[0].sql_type(), "TEXT");
}

#[test]
fn integer_like_text_is_stored_verbatim() {
    let huge = "1".repeat(25);
    let db = MemoryDatabase::new();
    let sink = LogSink;
    let mut source = MemorySource::from_text_rows(vec![
        vec!["code", "serial"],
        vec!["10_20", huge.as_str()],
        vec!["30_40", "7"],
    ]);
    let summary = ImportCoordinator::new(ImportSettings::for_table("codes"), &sink)
        .run_source(&mut source, &mut db.connection())
        .unwrap();

    assert_eq!(summary.status, ImportStatus::Completed);
    let types: Vec<String> = summary.columns.iter().map(|c| c.sql_type()).collect();
    assert_eq!(types, vec!["VARCHAR(5)", "VARCHAR(25)"]);
    assert_eq!(
        db.rows("codes"),
        vec![
            vec![SqlValue::Text("10_20".to_string()), SqlValue::Text(huge.clone())],
            vec![SqlValue::Text("30_40".to_string()), SqlValue::Text("7".to_string())],
        ]
    );
}
