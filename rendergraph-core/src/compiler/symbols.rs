//! Symbol table: node → slot handles, built once per compilation.

use std::ops::Range;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::vm::Address;

/// Slots owned by one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Slots {
    values: Range<usize>,
    texture: Option<usize>,
    operation: Option<usize>,
}

/// Maps nodes to the value slots, texture slot and operation index
/// allocated for them.
///
/// The compiler addresses entries by [`NodeId`]; hosts look them up by the
/// node's string identifier.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: IndexMap<String, NodeId>,
    slots: Vec<Slots>,
    value_count: usize,
    texture_count: usize,
    operation_count: usize,
}

impl SymbolTable {
    pub(crate) fn new(graph: &Graph) -> Self {
        Self {
            names: graph
                .nodes()
                .map(|(id, node)| (node.id().to_string(), id))
                .collect(),
            slots: vec![Slots::default(); graph.node_count()],
            ..Self::default()
        }
    }

    /// Reserve `count` consecutive value slots for `node`.
    pub(crate) fn allocate_values(&mut self, node: NodeId, count: usize) -> Result<Range<usize>> {
        let start = self.value_count;
        let end = start + count;
        if end > Address::MAX_INDEX + 1 {
            return Err(Error::AddressSpaceExhausted { space: "value" });
        }
        self.value_count = end;
        self.slots[node.index()].values = start..end;
        Ok(start..end)
    }

    pub(crate) fn allocate_texture(&mut self, node: NodeId) -> Result<usize> {
        let slot = self.texture_count;
        if slot > Address::MAX_INDEX {
            return Err(Error::AddressSpaceExhausted { space: "texture" });
        }
        self.texture_count += 1;
        self.slots[node.index()].texture = Some(slot);
        Ok(slot)
    }

    pub(crate) fn allocate_operation(&mut self, node: NodeId) -> Result<usize> {
        let index = self.operation_count;
        if index > u16::MAX as usize {
            return Err(Error::AddressSpaceExhausted { space: "operation" });
        }
        self.operation_count += 1;
        self.slots[node.index()].operation = Some(index);
        Ok(index)
    }

    pub(crate) fn values_of(&self, node: NodeId) -> Range<usize> {
        self.slots[node.index()].values.clone()
    }

    pub(crate) fn texture_of(&self, node: NodeId) -> Option<usize> {
        self.slots[node.index()].texture
    }

    pub(crate) fn operation_of(&self, node: NodeId) -> Option<usize> {
        self.slots[node.index()].operation
    }

    /// Value slots of the node named `id`; one per output port for passes.
    pub fn value_slots(&self, id: &str) -> Option<Range<usize>> {
        let node = self.names.get(id)?;
        let values = self.values_of(*node);
        (!values.is_empty()).then_some(values)
    }

    /// First value slot of the node named `id`.
    pub fn value_slot(&self, id: &str) -> Option<usize> {
        self.value_slots(id).map(|slots| slots.start)
    }

    pub fn texture_slot(&self, id: &str) -> Option<usize> {
        self.texture_of(*self.names.get(id)?)
    }

    pub fn operation_index(&self, id: &str) -> Option<usize> {
        self.operation_of(*self.names.get(id)?)
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn texture_count(&self) -> usize {
        self.texture_count
    }

    pub fn operation_count(&self) -> usize {
        self.operation_count
    }
}
