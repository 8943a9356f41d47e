//! Snapshot tests for generated CRUD statements across quoting dialects

use insta::assert_snapshot;
use rowbind::{
    value_map, AnsiEncoder, BacktickEncoder, BracketEncoder, Model, ModelSchema,
    ParameterizedStatement, SqlBuilder, ValueMap,
};

#[derive(Debug, Default)]
struct Invoice {
    id: i64,
    customer: String,
    total: rowbind::Decimal,
    issued_on: Option<chrono::NaiveDate>,
}

impl Model for Invoice {
    fn schema() -> ModelSchema<Self> {
        ModelSchema::new("Invoice", Invoice::default)
            .field("id", |i| &i.id, |i| &mut i.id)
            .field("customer", |i| &i.customer, |i| &mut i.customer)
            .field("total", |i| &i.total, |i| &mut i.total)
            .field("issued_on", |i| &i.issued_on, |i| &mut i.issued_on)
    }
}

fn render(stmt: &ParameterizedStatement) -> String {
    let params: Vec<String> = stmt.params().iter().map(|p| format!("{:?}", p)).collect();
    format!("{}\n-- params: [{}]", stmt.sql(), params.join(", "))
}

#[test]
fn test_select_snapshots() {
    let filter = value_map! { "customer" => "acme", "id" => 7_i64 };

    let ansi = SqlBuilder::new(&AnsiEncoder).select::<Invoice>(&filter).unwrap();
    assert_snapshot!(render(&ansi), @r#"
    SELECT "id", "customer", "total", "issued_on" FROM "Invoice" WHERE 1=1 AND "customer" = ? AND "id" = ?
    -- params: [Text("acme"), BigInt(7)]
    "#);

    let mysql = SqlBuilder::new(&BacktickEncoder)
        .select::<Invoice>(&ValueMap::new())
        .unwrap();
    assert_snapshot!(render(&mysql), @r#"
    SELECT `id`, `customer`, `total`, `issued_on` FROM `Invoice`
    -- params: []
    "#);
}

#[test]
fn test_insert_snapshot() {
    let values = value_map! { "id" => 1_i64, "customer" => "acme", "issued_on" => None::<chrono::NaiveDate> };
    let stmt = SqlBuilder::new(&BracketEncoder).insert("Invoice", &values).unwrap();
    assert_snapshot!(render(&stmt), @r#"
    INSERT INTO [Invoice]([id], [customer], [issued_on]) VALUES(?, ?, ?)
    -- params: [BigInt(1), Text("acme"), Null]
    "#);
}

#[test]
fn test_update_snapshot() {
    let stmt = SqlBuilder::new(&AnsiEncoder)
        .update(
            "Invoice",
            &value_map! { "customer" => "globex" },
            &value_map! { "id" => 1_i64, "customer" => "acme" },
        )
        .unwrap();
    assert_snapshot!(render(&stmt), @r#"
    UPDATE "Invoice" SET "customer" = ? WHERE 1=1 AND "id" = ? AND "customer" = ?
    -- params: [Text("globex"), BigInt(1), Text("acme")]
    "#);
}

#[test]
fn test_delete_snapshots() {
    let encoder = |name: &str| name.to_lowercase();
    let builder = SqlBuilder::new(&encoder);

    let all = builder.delete("Invoice", &ValueMap::new()).unwrap();
    assert_snapshot!(render(&all), @r#"
    DELETE FROM invoice WHERE 1=1
    -- params: []
    "#);

    let one = builder.delete("Invoice", &value_map! { "ID" => 3_i64 }).unwrap();
    assert_snapshot!(render(&one), @r#"
    DELETE FROM invoice WHERE 1=1 AND id = ?
    -- params: [BigInt(3)]
    "#);
}
