//! Ordered, selectable operation lists.

pub mod builders;
pub mod operation;

use std::collections::BTreeMap;

pub use operation::{Operation, OperationKind};

/// A titled, ordered list of operations. Order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub title: String,
    pub operations: Vec<Operation>,
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            operations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_operations(title: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            title: title.into(),
            operations,
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, op: Operation) -> usize {
        self.operations.push(op);
        self.operations.len() - 1
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = Operation>) {
        self.operations.extend(ops);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Plan-level warning, added once.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    pub fn selected_operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.selected)
    }

    pub fn count_selected(&self) -> usize {
        self.selected_operations().count()
    }

    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        match self.operations.get_mut(index) {
            Some(op) => {
                op.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn set_all_selected(&mut self, selected: bool) {
        for op in &mut self.operations {
            op.selected = selected;
        }
    }

    /// Selected operations sharing a non-empty destination, keyed by
    /// destination. Values are indices into `operations`, in plan order.
    pub fn detect_destination_collisions(&self) -> BTreeMap<String, Vec<usize>> {
        let mut by_dst: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, op) in self.operations.iter().enumerate() {
            if !op.selected {
                continue;
            }
            if let Some(dst) = op.destination() {
                by_dst.entry(dst.to_string()).or_default().push(idx);
            }
        }
        by_dst.retain(|_, indices| indices.len() > 1);
        by_dst
    }

    /// Annotate colliding operations and add one summary warning. Calling it
    /// again leaves the plan unchanged.
    pub fn apply_collision_warnings(&mut self) -> usize {
        let collisions = self.detect_destination_collisions();
        if collisions.is_empty() {
            return 0;
        }
        for (dst, indices) in &collisions {
            let message = format!("Collision: multiple ops target {}", dst);
            for &idx in indices {
                self.operations[idx].add_warning(&message);
            }
        }
        self.add_warning(format!(
            "Detected {} destination collision(s); review before executing",
            collisions.len()
        ));
        collisions.len()
    }

    pub fn has_collisions(&self) -> bool {
        !self.detect_destination_collisions().is_empty()
    }
}
