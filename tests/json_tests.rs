// ==================== JSON Conversion Tests ====================

mod common;

use std::sync::Arc;

use common::{hierarchy, populate, rows_at_depth};
use modelset::{
    Column, ConverterRegistry, DataError, DataSet, DataSetOptions, ExprError, SchemaBuilder,
    SchemaDocument, SortDirection,
};
use serde_json::json;

#[test]
fn test_dataset_json_shape() {
    let h = hierarchy();
    let ds = populate(&h, 1);
    assert_eq!(
        ds.to_json_value().unwrap(),
        json!([{
            "Id": 0,
            "Name": "parent 0",
            "Children": [{
                "Id": 0,
                "ParentId": 0,
                "Value": 1,
                "GrandChildren": [{"Id": 0, "ChildId": 0, "Value": 1}]
            }]
        }])
    );
}

#[test]
fn test_dataset_round_trip() {
    let h = hierarchy();
    let ds = populate(&h, 3);
    let text = ds.to_json_string_pretty().unwrap();

    let parsed =
        DataSet::parse_json(Arc::clone(&h.schema), h.parent, DataSetOptions::default(), &text)
            .unwrap();
    assert_eq!(rows_at_depth(&parsed, &h, 2).len(), 27);
    assert_eq!(parsed.to_json_value().unwrap(), ds.to_json_value().unwrap());

    // NULL values survive as JSON null
    let child = rows_at_depth(&parsed, &h, 1)[1];
    assert_eq!(parsed.get(child, &h.child_value).unwrap(), None);
    let parent = rows_at_depth(&parsed, &h, 0)[2];
    assert_eq!(parsed.get(parent, &h.child_value.sum()).unwrap(), Some(2));
}

#[test]
fn test_parse_rejects_wrong_shapes() {
    let h = hierarchy();
    for bad in [
        r#"[{"Id": 1, "Children": {"Id": 2}}]"#,
        r#"[{"Id": 1, "GrandChildren": []}]"#,
        r#"[{"Id": 1.5}]"#,
        r#"[{"Id": 1"#,
    ] {
        let result = DataSet::parse_json(
            Arc::clone(&h.schema),
            h.parent,
            DataSetOptions::default(),
            bad,
        );
        assert!(result.is_err(), "accepted {}", bad);
    }
}

#[test]
fn test_expression_json_across_levels() {
    let h = hierarchy();
    let registry = ConverterRegistry::default();
    let expr = h
        .child_value
        .sum()
        .if_null(&Column::constant(0))
        .gt(&Column::parameter(1))
        .and(&h.parent_name.is_not_null())
        .into_expr();

    let json = registry.expr_to_json(&expr, &h.schema).unwrap();
    assert_eq!(json["$type"], "Binary");
    assert_eq!(json["right"]["name"], "IsNotNull");
    assert_eq!(
        json["right"]["args"][0],
        json!({"$type": "Column", "model": "Parent", "name": "Name"})
    );
    let parsed = registry.expr_from_json(&json, &h.schema).unwrap();
    assert_eq!(parsed, expr);

    let ds = populate(&h, 3);
    let parent = rows_at_depth(&ds, &h, 0)[0];
    assert_eq!(
        ds.eval(parent, &parsed).unwrap(),
        ds.eval(parent, &expr).unwrap()
    );
}

#[test]
fn test_schema_document_matches_builder() {
    let document = r#"{
        "models": [
            {
                "name": "Parent", "table": "parents",
                "columns": [
                    { "name": "Id", "type": "Int32", "nullable": false },
                    { "name": "Name", "type": "String" }
                ],
                "primary_key": ["Id"],
                "children": [
                    { "name": "Children", "model": "Child", "foreign_key": [["ParentId", "Id"]] }
                ]
            },
            {
                "name": "Child", "table": "children",
                "columns": [
                    { "name": "Id", "type": "Int32", "nullable": false },
                    { "name": "ParentId", "type": "Int32" },
                    { "name": "Value", "type": "Int32" }
                ],
                "primary_key": ["Id"]
            }
        ]
    }"#;
    let schema = SchemaDocument::from_json(document).unwrap().build().unwrap();
    let parent = schema.model_by_name("Parent").unwrap().id;
    let data = json!([
        {"Id": 1, "Name": "a", "Children": [{"Id": 10, "ParentId": 1, "Value": 4}]},
        {"Id": 2, "Name": "b", "Children": []}
    ]);
    let ds = DataSet::parse_json(
        Arc::clone(&schema),
        parent,
        DataSetOptions::default(),
        &data.to_string(),
    )
    .unwrap();
    assert_eq!(ds.to_json_value().unwrap(), data);
}

#[test]
fn test_non_finite_floats_never_reach_storage() {
    let mut b = SchemaBuilder::new();
    let reading = b.add_model("Reading", "readings").unwrap();
    let id = b.register_column::<i32>(reading, "Id").unwrap();
    let amount = b.register_column::<f64>(reading, "Amount").unwrap();
    b.set_primary_key(reading, &[("Id", SortDirection::Ascending)])
        .unwrap();
    let schema = b.build().unwrap();

    let mut ds = DataSet::new(Arc::clone(&schema), reading, DataSetOptions::default()).unwrap();
    let root = ds.root();
    let row = ds.add_row(root).unwrap();
    ds.set(row, &id, 1).unwrap();
    ds.set(row, &amount, 1e308).unwrap();

    for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        assert!(matches!(
            ds.set(row, &amount, bad),
            Err(DataError::Expression(ExprError::Overflow { .. }))
        ));
    }
    assert_eq!(ds.get(row, &amount).unwrap(), Some(1e308));

    // Overflowing arithmetic is an error rather than an infinity
    let scaled = &amount * &Column::constant(10.0);
    assert!(ds.get(row, &scaled).is_err());

    // What was stored survives a JSON round trip
    let text = ds.to_json_string().unwrap();
    let parsed = DataSet::parse_json(schema, reading, DataSetOptions::default(), &text).unwrap();
    let parsed_row = parsed.rows(parsed.root()).unwrap()[0];
    assert_eq!(parsed.get(parsed_row, &amount).unwrap(), Some(1e308));
}
