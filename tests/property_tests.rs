//! Property-based tests for value conversion, placeholder rewriting and
//! model materialization
//!
//! These tests verify through property-based testing that:
//! - Scalars survive a bind → select → read round trip unchanged
//! - Named placeholders are rewritten in textual order
//! - Models written with `add_model` are read back field for field

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use proptest_derive::Arbitrary;
    use rowbind::{
        params, AnsiEncoder, Model, ModelSchema, OrmError, Params, Session, SqlTemplateEngine,
        SqliteProvider, Value, ValueMap,
    };

    // Test infrastructure

    fn memory_session() -> Session {
        Session::new(SqliteProvider::in_memory(), AnsiEncoder)
    }

    #[derive(Debug, Clone, Default, PartialEq, Arbitrary)]
    struct Sample {
        id: i64,
        #[proptest(regex = "\\PC{0,32}")]
        label: String,
        #[proptest(strategy = "-1.0e9f64..1.0e9f64")]
        ratio: f64,
        flag: bool,
        small: i16,
        #[proptest(strategy = "proptest::option::of(\"[a-z ]{0,12}\")")]
        note: Option<String>,
        payload: Vec<u8>,
    }

    impl Model for Sample {
        fn schema() -> ModelSchema<Self> {
            ModelSchema::new("Sample", Sample::default)
                .field("id", |s| &s.id, |s| &mut s.id)
                .field("label", |s| &s.label, |s| &mut s.label)
                .field("ratio", |s| &s.ratio, |s| &mut s.ratio)
                .field("flag", |s| &s.flag, |s| &mut s.flag)
                .field("small", |s| &s.small, |s| &mut s.small)
                .field("note", |s| &s.note, |s| &mut s.note)
                .field("payload", |s| &s.payload, |s| &mut s.payload)
        }
    }

    const SAMPLE_DDL: &str = "CREATE TABLE \"Sample\" (
        id INTEGER, label TEXT, ratio REAL, flag INTEGER, small INTEGER, note TEXT, payload BLOB
    )";

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}".prop_map(|s: String| s)
    }

    proptest! {
        #[test]
        fn test_integer_round_trip(v in any::<i64>()) {
            let mut session = memory_session();
            let read: Option<i64> = session.query_one("SELECT ?", params![v]).unwrap();
            prop_assert_eq!(read, Some(v));
        }

        #[test]
        fn test_narrow_read_matches_range(v in any::<i64>()) {
            let mut session = memory_session();
            let read = session.query_one::<i16>("SELECT ?", params![v]);
            match i16::try_from(v) {
                Ok(expected) => prop_assert_eq!(read.unwrap(), Some(expected)),
                Err(_) => prop_assert!(matches!(read, Err(OrmError::Conversion(_)))),
            }
        }

        #[test]
        fn test_text_and_blob_round_trip(s in "\\PC{0,40}", b in prop::collection::vec(any::<u8>(), 0..64)) {
            let mut session = memory_session();
            let text: Option<String> = session.query_one("SELECT ?", params![s.clone()]).unwrap();
            prop_assert_eq!(text, Some(s));
            let blob: Option<Vec<u8>> = session.query_one("SELECT ?", params![b.clone()]).unwrap();
            prop_assert_eq!(blob, Some(b));
        }

        #[test]
        fn test_optional_round_trip(v in proptest::option::of(any::<i32>())) {
            let mut session = memory_session();
            let read: Option<Option<i32>> = session.query_one("SELECT ?", params![v]).unwrap();
            prop_assert_eq!(read, Some(v));
        }

        #[test]
        fn test_double_round_trip(v in -1.0e15f64..1.0e15f64) {
            let mut session = memory_session();
            let read: Option<f64> = session.query_one("SELECT ?", params![v]).unwrap();
            prop_assert_eq!(read, Some(v));
        }

        #[test]
        fn test_named_rewrite_preserves_order(
            names in prop::collection::vec(arb_name(), 1..8),
            hash_style in any::<bool>(),
        ) {
            let mut map = ValueMap::new();
            for (i, name) in names.iter().enumerate() {
                map.entry(name.clone()).or_insert(Value::BigInt(i as i64));
            }
            let tokens: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, n)| if hash_style ^ (i % 2 == 0) { format!("#{{{}}}", n) } else { format!("${{{}}}", n) })
                .collect();
            let sql = format!("SELECT {}", tokens.join(", "));

            let stmt = SqlTemplateEngine::render(&sql, Params::map(&map)).unwrap();
            let expected_sql = format!("SELECT {}", vec!["?"; names.len()].join(", "));
            prop_assert_eq!(stmt.sql(), expected_sql.as_str());
            let expected: Vec<Value> = names.iter().map(|n| map[n].clone()).collect();
            prop_assert_eq!(stmt.params(), expected.as_slice());
        }

        #[test]
        fn test_unknown_name_is_reported(name in arb_name()) {
            let map = rowbind::value_map! { "known" => 1_i64 };
            prop_assume!(name != "known");
            let sql = format!("SELECT ${{known}}, #{{{}}}", name);
            match SqlTemplateEngine::render(&sql, Params::map(&map)) {
                Err(OrmError::MissingParameter(token)) => prop_assert_eq!(token, format!("#{{{}}}", name)),
                other => prop_assert!(false, "Expected MissingParameter, got {:?}", other),
            }
        }

        #[test]
        fn test_model_round_trip(sample in any::<Sample>()) {
            let mut session = memory_session();
            session.execute(SAMPLE_DDL, Params::none()).unwrap();
            prop_assert_eq!(session.add_model(&sample, &[]).unwrap(), 1);

            let rows: Vec<Sample> = session.get_list(&ValueMap::new()).unwrap();
            prop_assert_eq!(rows, vec![sample]);
        }
    }
}
