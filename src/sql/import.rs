//! Bulk import scripts for a populated DataSet.
//!
//! Rows are written in batches, one per model and depth, parents before
//! children. Each batch binds its rows as a single document parameter where
//! the dialect can shred one (`OPENJSON`, `.nodes()`, `JSON_TABLE`) and as
//! one multi-row `VALUES` list otherwise.

use base64::Engine;
use modelset_core::{DataType, ModelId, Value, DATETIME_FORMAT};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::generator::SqlGenerator;
use super::script::SqlScript;
use super::{Dialect, MySqlVersion, SqlServerVersion};
use crate::dataset::{DataSet, RowKey};
use crate::error::DataResult;
use crate::json::value_to_json;
use crate::schema::{ColumnDescriptor, Model};

const XML_ROOT: &str = "rows";
const XML_ROW: &str = "row";

struct Batch {
    model: ModelId,
    rows: Vec<RowKey>,
}

/// Render an import script inserting every data row of `dataset`.
///
/// Synthetic rows are skipped. Identity values are inserted as stored.
pub fn import_script(dataset: &DataSet, dialect: Dialect) -> DataResult<SqlScript> {
    let schema = dataset.schema();
    let mut generator = SqlGenerator::new(schema, dialect);
    for batch in batches(dataset)? {
        let model = schema.model(batch.model);
        debug!(
            model = %model.name,
            rows = batch.rows.len(),
            dialect = %dialect,
            "Import batch"
        );
        let columns: Vec<&ColumnDescriptor> = model.stored_columns().collect();
        match dialect {
            Dialect::SqlServer(version) => {
                let identity = model.identity_column().is_some();
                if identity {
                    generator.push(format!(
                        "SET IDENTITY_INSERT {} ON",
                        dialect.table_name(&model.table, false)
                    ));
                }
                if version >= SqlServerVersion::V2016 {
                    open_json(&mut generator, dataset, model, &columns, &batch.rows)?;
                } else {
                    xml_nodes(&mut generator, dataset, model, &columns, &batch.rows)?;
                }
                if identity {
                    generator.push(format!(
                        "SET IDENTITY_INSERT {} OFF",
                        dialect.table_name(&model.table, false)
                    ));
                }
            }
            Dialect::MySql(MySqlVersion::V8_0) => {
                json_table(&mut generator, dataset, model, &columns, &batch.rows)?
            }
            Dialect::MySql(MySqlVersion::V5_7) => {
                values_list(&mut generator, dataset, model, &columns, &batch.rows)?
            }
        }
    }
    Ok(generator.finish())
}

/// Breadth-first batches keyed by model and depth.
fn batches(dataset: &DataSet) -> DataResult<Vec<Batch>> {
    let schema = dataset.schema();
    let mut result = Vec::new();
    let mut level = vec![Batch {
        model: dataset.set_model(dataset.root())?,
        rows: dataset.rows(dataset.root())?.to_vec(),
    }];
    while !level.is_empty() {
        let mut next: Vec<Batch> = Vec::new();
        for batch in &level {
            let children = &schema.model(batch.model).children;
            for row in &batch.rows {
                for relationship in children {
                    let Some(set) = dataset.existing_child_set(*row, *relationship) else {
                        continue;
                    };
                    let rows = dataset.rows(set)?;
                    if rows.is_empty() {
                        continue;
                    }
                    let model = schema.relationship(*relationship).child;
                    match next.iter_mut().find(|b| b.model == model) {
                        Some(existing) => existing.rows.extend_from_slice(rows),
                        None => next.push(Batch {
                            model,
                            rows: rows.to_vec(),
                        }),
                    }
                }
            }
        }
        result.extend(level.into_iter().filter(|b| !b.rows.is_empty()));
        level = next;
    }
    Ok(result)
}

fn column_list(dialect: Dialect, columns: &[&ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// JSON path of a top-level member.
fn json_path(name: &str) -> String {
    let plain = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        format!("'$.{}'", name)
    } else {
        format!("'$.\"{}\"'", name.replace('"', "\\\"").replace('\'', "''"))
    }
}

/// Rows as a JSON array of objects. Binary values are hex text, with a `0x`
/// prefix when `prefixed`.
fn json_document(
    dataset: &DataSet,
    model: &Model,
    columns: &[&ColumnDescriptor],
    rows: &[RowKey],
    prefixed: bool,
) -> DataResult<String> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let mut object = Map::new();
        for column in columns {
            let value = dataset.get_value(*row, &model.slot_ref(column.slot))?;
            let json = match &value {
                Value::Binary(bytes) if prefixed => {
                    JsonValue::String(format!("0x{}", hex::encode_upper(bytes)))
                }
                Value::Binary(bytes) => JsonValue::String(hex::encode_upper(bytes)),
                other => value_to_json(other)?,
            };
            object.insert(column.name.clone(), json);
        }
        items.push(JsonValue::Object(object));
    }
    Ok(serde_json::to_string(&JsonValue::Array(items))?)
}

fn open_json(
    generator: &mut SqlGenerator<'_>,
    dataset: &DataSet,
    model: &Model,
    columns: &[&ColumnDescriptor],
    rows: &[RowKey],
) -> DataResult<()> {
    let dialect = generator.dialect();
    let types = dialect.type_mapper();
    let document = json_document(dataset, model, columns, rows, true)?;
    let parameter = generator.parameter(Value::Text(document), DataType::String)?;

    let mut select = Vec::with_capacity(columns.len());
    let mut with = Vec::with_capacity(columns.len());
    for column in columns {
        let name = dialect.quote(&column.name);
        if column.data_type == DataType::Binary {
            select.push(format!("CONVERT(VARBINARY(MAX), {}, 1)", name));
            with.push(format!("{} NVARCHAR(MAX) {}", name, json_path(&column.name)));
        } else {
            select.push(name.clone());
            with.push(format!(
                "{} {} {}",
                name,
                types.column_type(column.data_type, &column.facets),
                json_path(&column.name)
            ));
        }
    }
    generator.push(format!(
        "INSERT INTO {} ({})\nSELECT {}\nFROM OPENJSON({}) WITH ({})",
        dialect.table_name(&model.table, false),
        column_list(dialect, columns),
        select.join(", "),
        parameter,
        with.join(", ")
    ));
    Ok(())
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Element text of a value; None for NULL, which is written as a missing
/// element.
fn xml_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(_) => return None,
        Value::Text(s) => xml_escape(s),
        Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        Value::Guid(g) => g.hyphenated().to_string(),
        Value::Binary(b) => base64::engine::general_purpose::STANDARD.encode(b),
    };
    Some(text)
}

fn xml_nodes(
    generator: &mut SqlGenerator<'_>,
    dataset: &DataSet,
    model: &Model,
    columns: &[&ColumnDescriptor],
    rows: &[RowKey],
) -> DataResult<()> {
    let dialect = generator.dialect();
    let types = dialect.type_mapper();

    let mut document = format!("<{}>", XML_ROOT);
    for row in rows {
        document.push_str(&format!("<{}>", XML_ROW));
        for column in columns {
            let value = dataset.get_value(*row, &model.slot_ref(column.slot))?;
            if let Some(text) = xml_text(&value) {
                document.push_str(&format!("<{0}>{1}</{0}>", column.name, text));
            }
        }
        document.push_str(&format!("</{}>", XML_ROW));
    }
    document.push_str(&format!("</{}>", XML_ROOT));
    let parameter = generator.parameter_with_type(
        Value::Text(document),
        DataType::String,
        "XML".to_string(),
    )?;

    let select: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "r.value('({}/text())[1]', '{}')",
                c.name,
                types.column_type(c.data_type, &c.facets)
            )
        })
        .collect();
    generator.push(format!(
        "INSERT INTO {} ({})\nSELECT {}\nFROM {}.nodes('/{}/{}') AS x(r)",
        dialect.table_name(&model.table, false),
        column_list(dialect, columns),
        select.join(", "),
        parameter,
        XML_ROOT,
        XML_ROW
    ));
    Ok(())
}

fn json_table(
    generator: &mut SqlGenerator<'_>,
    dataset: &DataSet,
    model: &Model,
    columns: &[&ColumnDescriptor],
    rows: &[RowKey],
) -> DataResult<()> {
    let dialect = generator.dialect();
    let types = dialect.type_mapper();
    let document = json_document(dataset, model, columns, rows, false)?;
    let parameter = generator.parameter(Value::Text(document), DataType::String)?;

    let mut select = Vec::with_capacity(columns.len());
    let mut definitions = Vec::with_capacity(columns.len());
    for column in columns {
        let name = dialect.quote(&column.name);
        if column.data_type == DataType::Binary {
            select.push(format!("UNHEX({})", name));
            definitions.push(format!("{} LONGTEXT PATH {}", name, json_path(&column.name)));
        } else {
            select.push(name.clone());
            definitions.push(format!(
                "{} {} PATH {}",
                name,
                types.column_type(column.data_type, &column.facets),
                json_path(&column.name)
            ));
        }
    }
    generator.push(format!(
        "INSERT INTO {} ({})\nSELECT {}\nFROM JSON_TABLE({}, '$[*]' COLUMNS ({})) AS j",
        dialect.table_name(&model.table, false),
        column_list(dialect, columns),
        select.join(", "),
        parameter,
        definitions.join(", ")
    ));
    Ok(())
}

fn values_list(
    generator: &mut SqlGenerator<'_>,
    dataset: &DataSet,
    model: &Model,
    columns: &[&ColumnDescriptor],
    rows: &[RowKey],
) -> DataResult<()> {
    let dialect = generator.dialect();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let value = dataset.get_value(*row, &model.slot_ref(column.slot))?;
            values.push(generator.parameter(value, column.data_type)?);
        }
        tuples.push(format!("({})", values.join(", ")));
    }
    generator.push(format!(
        "INSERT INTO {} ({})\nVALUES {}",
        dialect.table_name(&model.table, false),
        column_list(dialect, columns),
        tuples.join(",\n")
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::dataset::DataSetOptions;
    use crate::schema::{ColumnFacets, Schema, SchemaBuilder, SortDirection};

    fn fixture() -> (Arc<Schema>, DataSet) {
        let mut b = SchemaBuilder::new();
        let order = b.add_model("Order", "orders").unwrap();
        let line = b.add_model("Line", "lines").unwrap();
        b.register_column_with::<i32>(order, "Id", ColumnFacets::identity())
            .unwrap();
        b.register_column_with::<String>(order, "Name", ColumnFacets::default().with_size(20))
            .unwrap();
        b.register_column::<i32>(line, "Id").unwrap();
        b.register_column::<i32>(line, "OrderId").unwrap();
        b.register_column::<Vec<u8>>(line, "Data").unwrap();
        b.set_primary_key(order, &[("Id", SortDirection::Ascending)])
            .unwrap();
        b.set_primary_key(line, &[("Id", SortDirection::Ascending)])
            .unwrap();
        b.register_child_model(order, line, "Lines", &[("OrderId", "Id")])
            .unwrap();
        let schema = b.build().unwrap();

        let mut ds = DataSet::new(Arc::clone(&schema), order, DataSetOptions::default()).unwrap();
        let root = ds.root();
        for (id, name) in [(1, "A"), (2, "B&C")] {
            let row = ds.add_row(root).unwrap();
            ds.set_by_name(row, "Id", id).unwrap();
            ds.set_by_name(row, "Name", name).unwrap();
        }
        let first = ds.row_at(root, 0).unwrap();
        let lines = ds.child_set_by_name(first, "Lines").unwrap();
        let line_row = ds.add_row(lines).unwrap();
        ds.set_by_name(line_row, "Id", 10).unwrap();
        ds.set_by_name(line_row, "OrderId", 1).unwrap();
        ds.set_by_name(line_row, "Data", Value::Binary(vec![0xab, 0x01]))
            .unwrap();
        (schema, ds)
    }

    fn document(script: &SqlScript, index: usize) -> JsonValue {
        match &script.parameters[index].value {
            Value::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("Expected a document parameter, got {:?}", other),
        }
    }

    #[test]
    fn test_open_json_import() {
        let (_schema, ds) = fixture();
        let script = import_script(&ds, Dialect::SqlServer(SqlServerVersion::V2016)).unwrap();
        assert_eq!(
            script.statements,
            vec![
                "SET IDENTITY_INSERT [orders] ON".to_string(),
                "INSERT INTO [orders] ([Id], [Name])\n\
                 SELECT [Id], [Name]\n\
                 FROM OPENJSON(@p1) WITH ([Id] INT '$.Id', [Name] NVARCHAR(20) '$.Name')"
                    .to_string(),
                "SET IDENTITY_INSERT [orders] OFF".to_string(),
                "INSERT INTO [lines] ([Id], [OrderId], [Data])\n\
                 SELECT [Id], [OrderId], CONVERT(VARBINARY(MAX), [Data], 1)\n\
                 FROM OPENJSON(@p2) WITH ([Id] INT '$.Id', [OrderId] INT '$.OrderId', [Data] NVARCHAR(MAX) '$.Data')"
                    .to_string(),
            ]
        );
        assert_eq!(
            document(&script, 0),
            json!([{"Id": 1, "Name": "A"}, {"Id": 2, "Name": "B&C"}])
        );
        assert_eq!(
            document(&script, 1),
            json!([{"Id": 10, "OrderId": 1, "Data": "0xAB01"}])
        );
        assert_eq!(script.parameters[0].native_type, "NVARCHAR(MAX)");
    }

    #[test]
    fn test_xml_import() {
        let (_schema, ds) = fixture();
        let script = import_script(&ds, Dialect::SqlServer(SqlServerVersion::V2012)).unwrap();
        assert_eq!(
            script.statements[1],
            "INSERT INTO [orders] ([Id], [Name])\n\
             SELECT r.value('(Id/text())[1]', 'INT'), r.value('(Name/text())[1]', 'NVARCHAR(20)')\n\
             FROM @p1.nodes('/rows/row') AS x(r)"
        );
        assert_eq!(
            script.parameters[0].value,
            Value::Text(
                "<rows><row><Id>1</Id><Name>A</Name></row><row><Id>2</Id><Name>B&amp;C</Name></row></rows>"
                    .to_string()
            )
        );
        assert_eq!(script.parameters[0].native_type, "XML");
        assert!(script.to_string().starts_with("DECLARE @p1 XML = N'<rows>"));
    }

    #[test]
    fn test_mysql_import() {
        let (_schema, ds) = fixture();
        let script = import_script(&ds, Dialect::MySql(MySqlVersion::V8_0)).unwrap();
        assert_eq!(script.statements.len(), 2);
        assert_eq!(
            script.statements[1],
            "INSERT INTO `lines` (`Id`, `OrderId`, `Data`)\n\
             SELECT `Id`, `OrderId`, UNHEX(`Data`)\n\
             FROM JSON_TABLE(@p2, '$[*]' COLUMNS (`Id` INT PATH '$.Id', `OrderId` INT PATH '$.OrderId', `Data` LONGTEXT PATH '$.Data')) AS j"
        );
        assert_eq!(
            document(&script, 1),
            json!([{"Id": 10, "OrderId": 1, "Data": "AB01"}])
        );

        let script = import_script(&ds, Dialect::MySql(MySqlVersion::V5_7)).unwrap();
        assert_eq!(
            script.statements[0],
            "INSERT INTO `orders` (`Id`, `Name`)\nVALUES (@p1, @p2),\n(@p3, @p4)"
        );
        assert_eq!(script.parameters.len(), 7);
        assert_eq!(script.parameters[3].value, Value::Text("B&C".to_string()));
    }

    #[test]
    fn test_empty_dataset_imports_nothing() {
        let (schema, _) = fixture();
        let order = schema.model_by_name("Order").unwrap().id;
        let ds = DataSet::new(schema, order, DataSetOptions::default()).unwrap();
        let script = import_script(&ds, Dialect::default()).unwrap();
        assert!(script.is_empty());
        assert!(script.parameters.is_empty());
    }
}
