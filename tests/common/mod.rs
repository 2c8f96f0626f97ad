//! Common test utilities for DataSet integration tests
//!
//! Provides a three-level Parent -> Child -> GrandChild schema and a helper
//! populating it with `count` rows per set at every level.

#![allow(dead_code)]

use std::sync::Arc;

use modelset::schema::RelationshipId;
use modelset::{Column, DataSet, DataSetOptions, ModelId, Schema, SchemaBuilder, SortDirection};

pub struct Hierarchy {
    pub schema: Arc<Schema>,
    pub parent: ModelId,
    pub child: ModelId,
    pub grand_child: ModelId,
    pub children: RelationshipId,
    pub grand_children: RelationshipId,
    pub parent_id: Column<i32>,
    pub parent_name: Column<String>,
    pub child_id: Column<i32>,
    pub child_value: Column<i32>,
    pub grand_child_id: Column<i32>,
    pub grand_child_value: Column<i32>,
}

pub fn hierarchy() -> Hierarchy {
    let mut b = SchemaBuilder::new();
    let parent = b.add_model("Parent", "parents").unwrap();
    let child = b.add_model("Child", "children").unwrap();
    let grand_child = b.add_model("GrandChild", "grand_children").unwrap();

    let parent_id = b.register_column::<i32>(parent, "Id").unwrap();
    let parent_name = b.register_column::<String>(parent, "Name").unwrap();
    let child_id = b.register_column::<i32>(child, "Id").unwrap();
    b.register_column::<i32>(child, "ParentId").unwrap();
    let child_value = b.register_column::<i32>(child, "Value").unwrap();
    let grand_child_id = b.register_column::<i32>(grand_child, "Id").unwrap();
    b.register_column::<i32>(grand_child, "ChildId").unwrap();
    let grand_child_value = b.register_column::<i32>(grand_child, "Value").unwrap();

    for model in [parent, child, grand_child] {
        b.set_primary_key(model, &[("Id", SortDirection::Ascending)])
            .unwrap();
    }
    let children = b
        .register_child_model(parent, child, "Children", &[("ParentId", "Id")])
        .unwrap();
    let grand_children = b
        .register_child_model(child, grand_child, "GrandChildren", &[("ChildId", "Id")])
        .unwrap();

    Hierarchy {
        schema: b.build().unwrap(),
        parent,
        child,
        grand_child,
        children,
        grand_children,
        parent_id,
        parent_name,
        child_id,
        child_value,
        grand_child_id,
        grand_child_value,
    }
}

/// `Value` is 1 on every row except the one at index 1 of each set, which
/// stays NULL.
pub fn value_at(index: i32, count: i32) -> Option<i32> {
    if index % count == 1 {
        None
    } else {
        Some(1)
    }
}

/// Populate `count` rows per set at every level. Ids are unique per level.
pub fn populate(h: &Hierarchy, count: i32) -> DataSet {
    let mut ds = DataSet::new(Arc::clone(&h.schema), h.parent, DataSetOptions::default()).unwrap();
    let root = ds.root();
    for p in 0..count {
        let parent = ds.add_row(root).unwrap();
        ds.set(parent, &h.parent_id, p).unwrap();
        ds.set(parent, &h.parent_name, format!("parent {}", p))
            .unwrap();
        let children = ds.child_set(parent, h.children).unwrap();
        for c in 0..count {
            let child_id = p * count + c;
            let child = ds.add_row(children).unwrap();
            ds.set(child, &h.child_id, child_id).unwrap();
            ds.set_by_name(child, "ParentId", p).unwrap();
            ds.set(child, &h.child_value, value_at(c, count)).unwrap();
            let grand_children = ds.child_set(child, h.grand_children).unwrap();
            for g in 0..count {
                let grand_child = ds.add_row(grand_children).unwrap();
                ds.set(grand_child, &h.grand_child_id, child_id * count + g)
                    .unwrap();
                ds.set_by_name(grand_child, "ChildId", child_id).unwrap();
                ds.set(grand_child, &h.grand_child_value, value_at(g, count))
                    .unwrap();
            }
        }
    }
    ds
}

/// Keys of every row of the given depth (0 = root set), in document order.
pub fn rows_at_depth(ds: &DataSet, h: &Hierarchy, depth: usize) -> Vec<modelset::RowKey> {
    let mut rows: Vec<_> = ds.rows(ds.root()).unwrap().to_vec();
    let relationships = [h.children, h.grand_children];
    for relationship in relationships.iter().take(depth) {
        rows = rows
            .iter()
            .filter_map(|row| ds.existing_child_set(*row, *relationship))
            .flat_map(|set| ds.rows(set).unwrap().to_vec())
            .collect();
    }
    rows
}
