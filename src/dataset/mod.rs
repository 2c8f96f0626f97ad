//! Hierarchical in-memory row store.
//!
//! A [`DataSet`] is an arena owning every row collection (set) and every row
//! of one hierarchy. The root set holds rows of the top-level model; each
//! attached row owns one child set per declared relationship. Rows and sets
//! are addressed by [`RowKey`] and [`SetKey`] handles. A row's parent is a
//! key, never a second owner.
//!
//! Rows and sets live in slabs. Removing a row drops its slot, and the slot
//! is reused by the next allocation. Keys carry a generation, so a key to a
//! removed row keeps reporting no model, no parent and the
//! [`RowState::Disposed`] state after its slot is reused.

mod computed;
mod events;
mod row;
mod validation;

pub use events::{DataSetEvent, SubscriptionId};
pub use row::DataRow;
pub use validation::{ValidationError, ValidationKind};

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use modelset_core::{ColumnRef, Expr, ModelId, Value};
use slab::Slab;
use tracing::{debug, trace};

use crate::column::{Column, ColumnType};
use crate::error::{DataError, DataResult};
use crate::schema::{RelationshipId, Schema};
use events::Observer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    index: u32,
    generation: u32,
}

impl RowKey {
    fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetKey {
    index: u32,
    generation: u32,
}

impl SetKey {
    fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Lifecycle state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Created but not inserted into a set.
    Detached,
    /// Inserted, with an ordinal and parent linkage.
    Attached,
    /// End-of-file row being written; promoted to `Attached` by the write.
    Editing,
    /// Removed. Model and parent references are cleared.
    Disposed,
}

/// Slab occupancy of a [`DataSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub rows: usize,
    pub sets: usize,
    pub row_capacity: usize,
    pub set_capacity: usize,
}

/// Synthetic row policies. At most one may be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataSetOptions {
    /// Keep an end-of-file row after the data rows; writing to it appends it.
    pub eof_row: bool,
    /// Show a read-only placeholder row while a set is empty.
    pub empty_row: bool,
}

impl DataSetOptions {
    pub fn validate(&self) -> DataResult<()> {
        if self.eof_row && self.empty_row {
            return Err(DataError::Config(
                "eof_row and empty_row are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Data,
    Eof,
    Placeholder,
}

struct RowSlot {
    generation: u32,
    model: Option<ModelId>,
    /// Owning set; the target set while detached.
    set: Option<SetKey>,
    parent: Option<RowKey>,
    ordinal: Option<usize>,
    state: RowState,
    kind: RowKind,
    values: Vec<Value>,
    computed: RefCell<Vec<Option<Value>>>,
    /// Child set per relationship, in the model's relationship order.
    children: Vec<Option<SetKey>>,
}

struct SetSlot {
    generation: u32,
    model: ModelId,
    parent_row: Option<RowKey>,
    relationship: Option<RelationshipId>,
    rows: Vec<RowKey>,
    revision: u64,
    eof: Option<RowKey>,
    placeholder: Option<RowKey>,
}

/// Saved row contents, used to re-create a moved row with its subtree.
struct RowSnapshot {
    values: Vec<Value>,
    children: Vec<Option<Vec<RowSnapshot>>>,
}

pub struct DataSet {
    schema: Arc<Schema>,
    options: DataSetOptions,
    root: SetKey,
    sets: Slab<SetSlot>,
    rows: Slab<RowSlot>,
    next_generation: u32,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSet")
            .field("model", &self.sets[self.root.index()].model)
            .field("sets", &self.sets.len())
            .field("rows", &self.rows.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DataSet {
    pub fn new(schema: Arc<Schema>, model: ModelId, options: DataSetOptions) -> DataResult<Self> {
        options.validate()?;
        if model.index() >= schema.models().len() {
            return Err(DataError::Argument(format!("unknown model id {}", model.0)));
        }
        let mut dataset = Self {
            schema,
            options,
            root: SetKey {
                index: 0,
                generation: 0,
            },
            sets: Slab::new(),
            rows: Slab::new(),
            next_generation: 0,
            observers: Vec::new(),
            next_subscription: 0,
        };
        dataset.root = dataset.create_set(model, None, None);
        Ok(dataset)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn options(&self) -> DataSetOptions {
        self.options
    }

    /// The top-level set.
    pub fn root(&self) -> SetKey {
        self.root
    }

    fn create_set(
        &mut self,
        model: ModelId,
        parent_row: Option<RowKey>,
        relationship: Option<RelationshipId>,
    ) -> SetKey {
        let generation = self.generation();
        let index = self.sets.insert(SetSlot {
            generation,
            model,
            parent_row,
            relationship,
            rows: Vec::new(),
            revision: 0,
            eof: None,
            placeholder: None,
        });
        let key = SetKey {
            index: index as u32,
            generation,
        };
        if self.options.eof_row {
            let eof = self.create_row(key, RowKind::Eof);
            self.sets[key.index()].eof = Some(eof);
        }
        if self.options.empty_row {
            let placeholder = self.create_row(key, RowKind::Placeholder);
            self.sets[key.index()].placeholder = Some(placeholder);
        }
        key
    }

    fn create_row(&mut self, set: SetKey, kind: RowKind) -> RowKey {
        let generation = self.generation();
        let slot = &self.sets[set.index()];
        let model = self.schema.model(slot.model);
        let values = model
            .columns
            .iter()
            .map(|c| c.facets.default.clone().unwrap_or_default())
            .collect();
        let parent = match kind {
            RowKind::Data => None,
            RowKind::Eof | RowKind::Placeholder => slot.parent_row,
        };
        let index = self.rows.insert(RowSlot {
            generation,
            model: Some(model.id),
            set: Some(set),
            parent,
            ordinal: None,
            state: RowState::Detached,
            kind,
            values,
            computed: RefCell::new(vec![None; model.columns.len()]),
            children: vec![None; model.children.len()],
        });
        RowKey {
            index: index as u32,
            generation,
        }
    }

    /// Generation stamped on the next slot, so keys to a dropped slot never
    /// match its reuse.
    fn generation(&mut self) -> u32 {
        let generation = self.next_generation;
        self.next_generation = generation.wrapping_add(1);
        generation
    }

    /// Slot of `set`. Keys to a dropped or reused slot are disposed.
    fn set_slot(&self, set: SetKey) -> DataResult<&SetSlot> {
        self.sets
            .get(set.index())
            .filter(|slot| slot.generation == set.generation)
            .ok_or(DataError::DisposedRow)
    }

    fn current_row(&self, row: RowKey) -> Option<&RowSlot> {
        self.rows
            .get(row.index())
            .filter(|slot| slot.generation == row.generation)
    }

    fn live_row(&self, row: RowKey) -> DataResult<&RowSlot> {
        self.current_row(row).ok_or(DataError::DisposedRow)
    }

    /// Live `(row, set)` slot counts and the slot capacity of each slab.
    /// Capacity only grows when no dropped slot is free for reuse.
    pub fn arena_stats(&self) -> ArenaStats {
        ArenaStats {
            rows: self.rows.len(),
            sets: self.sets.len(),
            row_capacity: self.rows.capacity(),
            set_capacity: self.sets.capacity(),
        }
    }

    // --- Observers ---

    /// Register an observer for every subsequent event.
    pub fn subscribe(&mut self, observer: impl FnMut(&DataSetEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: DataSetEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    // --- Set and row inspection ---

    pub fn rows(&self, set: SetKey) -> DataResult<&[RowKey]> {
        Ok(&self.set_slot(set)?.rows)
    }

    pub fn row_at(&self, set: SetKey, ordinal: usize) -> DataResult<RowKey> {
        let rows = self.rows(set)?;
        rows.get(ordinal)
            .copied()
            .ok_or(DataError::InvalidOrdinal {
                ordinal,
                count: rows.len(),
            })
    }

    /// Number of data rows. Synthetic rows are never counted.
    pub fn count(&self, set: SetKey) -> DataResult<usize> {
        Ok(self.set_slot(set)?.rows.len())
    }

    /// Row count as shown to a presentation layer, synthetic rows included.
    pub fn presentation_count(&self, set: SetKey) -> DataResult<usize> {
        let slot = self.set_slot(set)?;
        Ok(slot.rows.len() + slot.eof.is_some() as usize + slot.placeholder.is_some() as usize)
    }

    pub fn revision(&self, set: SetKey) -> DataResult<u64> {
        Ok(self.set_slot(set)?.revision)
    }

    pub fn eof_row(&self, set: SetKey) -> DataResult<Option<RowKey>> {
        Ok(self.set_slot(set)?.eof)
    }

    pub fn placeholder_row(&self, set: SetKey) -> DataResult<Option<RowKey>> {
        Ok(self.set_slot(set)?.placeholder)
    }

    pub fn set_model(&self, set: SetKey) -> DataResult<ModelId> {
        Ok(self.set_slot(set)?.model)
    }

    /// Row owning `set`, or None for the root set.
    pub fn set_parent(&self, set: SetKey) -> DataResult<Option<RowKey>> {
        Ok(self.set_slot(set)?.parent_row)
    }

    pub fn set_relationship(&self, set: SetKey) -> DataResult<Option<RelationshipId>> {
        Ok(self.set_slot(set)?.relationship)
    }

    pub fn row_state(&self, row: RowKey) -> DataResult<RowState> {
        Ok(self
            .current_row(row)
            .map_or(RowState::Disposed, |slot| slot.state))
    }

    pub fn ordinal(&self, row: RowKey) -> Option<usize> {
        self.current_row(row).and_then(|r| r.ordinal)
    }

    pub fn parent(&self, row: RowKey) -> Option<RowKey> {
        self.current_row(row).and_then(|r| r.parent)
    }

    pub fn model(&self, row: RowKey) -> Option<ModelId> {
        self.current_row(row).and_then(|r| r.model)
    }

    pub fn set_of(&self, row: RowKey) -> Option<SetKey> {
        self.current_row(row).and_then(|r| r.set)
    }

    /// True for end-of-file and placeholder rows.
    pub fn is_synthetic(&self, row: RowKey) -> bool {
        self.current_row(row)
            .is_some_and(|r| r.kind != RowKind::Data)
    }

    /// Child set of `row` for `relationship`, materialized on first access.
    pub fn child_set(&mut self, row: RowKey, relationship: RelationshipId) -> DataResult<SetKey> {
        let slot = self.live_row(row)?;
        if slot.state != RowState::Attached {
            return Err(DataError::Mutation(
                "child sets exist only on attached rows".to_string(),
            ));
        }
        let model_id = slot.model.ok_or(DataError::DisposedRow)?;
        let model = self.schema.model(model_id);
        let index = model
            .children
            .iter()
            .position(|r| *r == relationship)
            .ok_or_else(|| {
                DataError::Argument(format!(
                    "relationship {} does not belong to model '{}'",
                    relationship.0, model.name
                ))
            })?;
        Ok(self.ensure_child_set(row, model_id, index))
    }

    pub fn child_set_by_name(&mut self, row: RowKey, name: &str) -> DataResult<SetKey> {
        let model = self.live_row(row)?.model.ok_or(DataError::DisposedRow)?;
        let relationship = self.schema.relationship_by_name(model, name)?.id;
        self.child_set(row, relationship)
    }

    /// Child set if already materialized.
    pub fn existing_child_set(&self, row: RowKey, relationship: RelationshipId) -> Option<SetKey> {
        let slot = self.current_row(row)?;
        let model = self.schema.model(slot.model?);
        let index = model.children.iter().position(|r| *r == relationship)?;
        slot.children.get(index).copied().flatten()
    }

    fn ensure_child_set(&mut self, row: RowKey, model: ModelId, index: usize) -> SetKey {
        if let Some(existing) = self.rows[row.index()].children[index] {
            return existing;
        }
        let schema = Arc::clone(&self.schema);
        let relationship = schema.relationship(schema.model(model).children[index]);
        let set = self.create_set(relationship.child, Some(row), Some(relationship.id));
        self.rows[row.index()].children[index] = Some(set);
        set
    }

    /// Create empty child sets for every non-recursive relationship.
    fn materialize_children(&mut self, row: RowKey) {
        let schema = Arc::clone(&self.schema);
        let Some(model) = self.rows[row.index()].model else {
            return;
        };
        for (index, relationship) in schema.model(model).children.iter().enumerate() {
            if !schema.relationship(*relationship).recursive {
                self.ensure_child_set(row, model, index);
            }
        }
    }

    // --- Structural mutation ---

    /// Create a detached row targeting `set`, filled with column defaults.
    pub fn new_row(&mut self, set: SetKey) -> DataResult<RowKey> {
        self.set_slot(set)?;
        Ok(self.create_row(set, RowKind::Data))
    }

    /// Append a detached row to its target set. Returns its ordinal.
    pub fn attach(&mut self, row: RowKey) -> DataResult<usize> {
        let set = self.live_row(row)?.set.ok_or(DataError::DisposedRow)?;
        let ordinal = self.count(set)?;
        self.insert(set, ordinal, row)?;
        Ok(ordinal)
    }

    /// Create and append a new row.
    pub fn add_row(&mut self, set: SetKey) -> DataResult<RowKey> {
        let row = self.new_row(set)?;
        self.attach(row)?;
        Ok(row)
    }

    /// Insert a detached row at `ordinal`, shifting later rows up.
    pub fn insert(&mut self, set: SetKey, ordinal: usize, row: RowKey) -> DataResult<()> {
        let set_slot = self.set_slot(set)?;
        let count = set_slot.rows.len();
        if ordinal > count {
            return Err(DataError::InvalidOrdinal { ordinal, count });
        }
        let set_model = set_slot.model;
        let row_slot = self.live_row(row)?;
        if row_slot.kind != RowKind::Data || row_slot.state != RowState::Detached {
            return Err(DataError::Mutation("only detached rows can be inserted".to_string()));
        }
        if row_slot.model != Some(set_model) {
            return Err(DataError::Argument(format!(
                "row does not belong to model '{}'",
                self.schema.model(set_model).name
            )));
        }
        self.place_row(set, ordinal, row);
        Ok(())
    }

    fn place_row(&mut self, set: SetKey, ordinal: usize, row: RowKey) {
        if let Some(placeholder) = self.sets[set.index()].placeholder.take() {
            self.release_row(placeholder);
        }
        let parent = self.sets[set.index()].parent_row;
        self.sets[set.index()].rows.insert(ordinal, row);
        self.renumber(set, ordinal);
        {
            let slot = &mut self.rows[row.index()];
            slot.set = Some(set);
            slot.parent = parent;
            slot.state = RowState::Attached;
        }
        self.materialize_children(row);
        self.bump_structural(set);
        trace!(%set, %row, ordinal, "Row inserted");
        self.emit(DataSetEvent::RowInserted { set, row, ordinal });
    }

    pub fn remove_at(&mut self, set: SetKey, ordinal: usize) -> DataResult<()> {
        let count = self.count(set)?;
        if ordinal >= count {
            return Err(DataError::InvalidOrdinal { ordinal, count });
        }
        self.take_row(set, ordinal);
        Ok(())
    }

    /// Remove an attached row and dispose its subtree.
    pub fn remove(&mut self, row: RowKey) -> DataResult<()> {
        let slot = self.live_row(row)?;
        if slot.kind != RowKind::Data {
            return Err(DataError::Mutation("synthetic rows cannot be removed".to_string()));
        }
        match (slot.state, slot.set, slot.ordinal) {
            (RowState::Attached, Some(set), Some(ordinal)) => self.remove_at(set, ordinal),
            _ => Err(DataError::Mutation("row is not attached".to_string())),
        }
    }

    fn take_row(&mut self, set: SetKey, ordinal: usize) {
        let row = self.sets[set.index()].rows.remove(ordinal);
        self.renumber(set, ordinal);
        self.bump_structural(set);
        trace!(%set, %row, ordinal, "Row removed");
        self.emit(DataSetEvent::RowRemoved { set, row, ordinal });
        self.dispose_subtree(row);
        if self.options.empty_row && self.sets[set.index()].rows.is_empty() {
            let placeholder = self.create_row(set, RowKind::Placeholder);
            self.sets[set.index()].placeholder = Some(placeholder);
        }
    }

    /// Move the row at `from` by `offset` positions.
    ///
    /// The row and its descendants are disposed and re-created, so the moved
    /// row comes back under a new key. Returns that key.
    pub fn move_row(&mut self, set: SetKey, from: usize, offset: isize) -> DataResult<RowKey> {
        let count = self.count(set)?;
        if from >= count {
            return Err(DataError::InvalidOrdinal {
                ordinal: from,
                count,
            });
        }
        let target = from as isize + offset;
        if target < 0 {
            return Err(DataError::Argument(format!(
                "cannot move row {} by {}",
                from, offset
            )));
        }
        let target = target as usize;
        if target >= count {
            return Err(DataError::InvalidOrdinal {
                ordinal: target,
                count,
            });
        }
        let row = self.sets[set.index()].rows[from];
        if offset == 0 {
            return Ok(row);
        }

        let snapshot = self.snapshot(row);
        self.take_row(set, from);
        let moved = self.restore(set, target, &snapshot)?;
        debug!(%set, from, to = target, "Row moved");
        Ok(moved)
    }

    fn snapshot(&self, row: RowKey) -> RowSnapshot {
        let slot = &self.rows[row.index()];
        RowSnapshot {
            values: slot.values.clone(),
            children: slot
                .children
                .iter()
                .map(|child| {
                    child.map(|set| {
                        self.sets[set.index()]
                            .rows
                            .iter()
                            .map(|r| self.snapshot(*r))
                            .collect()
                    })
                })
                .collect(),
        }
    }

    fn restore(&mut self, set: SetKey, ordinal: usize, snapshot: &RowSnapshot) -> DataResult<RowKey> {
        let model = self.set_model(set)?;
        let row = self.create_row(set, RowKind::Data);
        self.rows[row.index()].values = snapshot.values.clone();
        self.insert(set, ordinal, row)?;
        for (index, children) in snapshot.children.iter().enumerate() {
            if let Some(children) = children {
                let child_set = self.ensure_child_set(row, model, index);
                for (ordinal, child) in children.iter().enumerate() {
                    self.restore(child_set, ordinal, child)?;
                }
            }
        }
        Ok(row)
    }

    fn renumber(&mut self, set: SetKey, from: usize) {
        let Self { sets, rows, .. } = self;
        for (offset, key) in sets[set.index()].rows[from..].iter().enumerate() {
            rows[key.index()].ordinal = Some(from + offset);
        }
    }

    /// Bump the revision of `set` and every set above it.
    fn bump_structural(&mut self, set: SetKey) {
        let mut current = Some(set);
        while let Some(key) = current {
            let slot = &mut self.sets[key.index()];
            slot.revision += 1;
            current = slot
                .parent_row
                .and_then(|row| self.rows[row.index()].set);
        }
    }

    /// Dispose `row` and every descendant, top-down.
    fn dispose_subtree(&mut self, row: RowKey) {
        let mut pending = vec![row];
        while let Some(key) = pending.pop() {
            let children: Vec<SetKey> = self.rows[key.index()]
                .children
                .iter()
                .flatten()
                .copied()
                .collect();
            for child in children {
                let Some(slot) = self.sets.try_remove(child.index()) else {
                    continue;
                };
                // Reversed so rows pop in ordinal order
                pending.extend(slot.rows.into_iter().rev());
                for synthetic in slot.eof.into_iter().chain(slot.placeholder) {
                    self.release_row(synthetic);
                }
            }
            self.release_row(key);
            self.emit(DataSetEvent::RowDisposed { row: key });
        }
    }

    /// Drop a row's slot, freeing it for reuse.
    fn release_row(&mut self, row: RowKey) {
        if self.current_row(row).is_some() {
            self.rows.remove(row.index());
        }
    }

    // --- Values ---

    /// Read a column of a row, computing local columns on demand.
    pub fn get_value(&self, row: RowKey, column: &ColumnRef) -> DataResult<Value> {
        self.live_row(row)?;
        Ok(self.read_value(row, column)?)
    }

    pub fn value_by_name(&self, row: RowKey, name: &str) -> DataResult<Value> {
        let model = self.live_row(row)?.model.ok_or(DataError::DisposedRow)?;
        let column = self.schema.model(model).column_ref(name)?;
        self.get_value(row, &column)
    }

    pub fn get<T: ColumnType>(&self, row: RowKey, column: &Column<T>) -> DataResult<Option<T>> {
        column.eval(self, row)
    }

    /// Evaluate an expression against a row.
    pub fn eval(&self, row: RowKey, expr: &Expr) -> DataResult<Value> {
        self.live_row(row)?;
        Ok(expr.eval(&DataRow::new(self, row))?)
    }

    pub fn data_row(&self, row: RowKey) -> DataResult<DataRow<'_>> {
        self.live_row(row)?;
        Ok(DataRow::new(self, row))
    }

    /// Write a stored column.
    ///
    /// Writing to the end-of-file row promotes it to an attached data row
    /// and appends a fresh end-of-file row.
    pub fn set_value(
        &mut self,
        row: RowKey,
        column: &ColumnRef,
        value: impl Into<Value>,
    ) -> DataResult<()> {
        let slot = self.live_row(row)?;
        let model = slot.model.ok_or(DataError::DisposedRow)?;
        let kind = slot.kind;
        if column.model != model {
            return Err(DataError::Argument(format!(
                "column '{}' does not belong to model '{}'",
                column.name,
                self.schema.model(model).name
            )));
        }
        let descriptor = self
            .schema
            .model(model)
            .columns
            .get(column.slot)
            .ok_or_else(|| DataError::Argument(format!("unknown column '{}'", column.name)))?;
        if descriptor.is_local() {
            return Err(DataError::Mutation(format!(
                "computed column '{}' is read-only",
                descriptor.name
            )));
        }
        if kind == RowKind::Placeholder {
            return Err(DataError::Mutation("placeholder row is read-only".to_string()));
        }
        let value = value.into().conform(descriptor.data_type)?;

        if kind == RowKind::Eof {
            self.rows[row.index()].state = RowState::Editing;
            self.rows[row.index()].values[column.slot] = value;
            self.promote_eof(row);
        } else {
            self.rows[row.index()].values[column.slot] = value;
        }

        let invalidated = self.invalidate_dependents(row, column.slot);
        let slot = &self.rows[row.index()];
        if slot.state != RowState::Attached {
            return Ok(());
        }
        if let Some(set) = slot.set {
            self.sets[set.index()].revision += 1;
        }
        self.emit(DataSetEvent::ValueChanged {
            row,
            slot: column.slot,
        });
        for slot in invalidated {
            self.emit(DataSetEvent::ValueChanged { row, slot });
        }
        Ok(())
    }

    fn promote_eof(&mut self, row: RowKey) {
        let Some(set) = self.rows[row.index()].set else {
            return;
        };
        self.sets[set.index()].eof = None;
        self.rows[row.index()].kind = RowKind::Data;
        let ordinal = self.sets[set.index()].rows.len();
        self.place_row(set, ordinal, row);
        let eof = self.create_row(set, RowKind::Eof);
        self.sets[set.index()].eof = Some(eof);
        debug!(%set, %row, "End-of-file row promoted");
    }

    /// Typed write. `None` stores NULL.
    pub fn set<T: ColumnType>(
        &mut self,
        row: RowKey,
        column: &Column<T>,
        value: impl Into<Option<T>>,
    ) -> DataResult<()> {
        let column = column.slot_ref()?;
        let value = value.into().map(T::into_value).unwrap_or_default();
        self.set_value(row, &column, value)
    }

    pub fn set_by_name(&mut self, row: RowKey, name: &str, value: impl Into<Value>) -> DataResult<()> {
        let model = self.live_row(row)?.model.ok_or(DataError::DisposedRow)?;
        let column = self.schema.model(model).column_ref(name)?;
        self.set_value(row, &column, value)
    }
}
