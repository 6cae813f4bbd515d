use std::collections::BTreeMap;

use crate::model::{Id, LookupValue};

/// Id-indexed arena of lookup values.
///
/// Parent/child links are stored as ids on both sides and are only changed through
/// [`LookupTree::add_child`] and [`LookupTree::remove_child`], which update both ends.
#[derive(Debug, Clone, Default)]
pub struct LookupTree {
    values: BTreeMap<Id, LookupValue>,
}

impl LookupTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.values.contains_key(&id)
    }

    pub fn get(&self, id: Id) -> Option<&LookupValue> {
        self.values.get(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = &LookupValue> {
        self.values.values()
    }

    /// Stores `value` under `id`, keeping the child list of a value it replaces and
    /// linking it to its parent when the parent is present.
    pub fn insert(&mut self, id: Id, mut value: LookupValue) {
        value.id = Some(id);
        value.children = self
            .values
            .get(&id)
            .map(|existing| existing.children.clone())
            .unwrap_or_default();
        let parent_id = value.parent_id;
        self.values.insert(id, value);

        if let Some(parent_id) = parent_id {
            self.add_child(parent_id, id);
        }
    }

    /// Replaces the updatable state of a stored value without touching its links.
    pub fn update<F: FnOnce(&mut LookupValue)>(&mut self, id: Id, apply: F) -> bool {
        match self.values.get_mut(&id) {
            Some(value) => {
                apply(value);
                true
            }
            None => false,
        }
    }

    /// Removes a value and detaches it from its parent. Children keep a dangling parent id.
    pub fn remove(&mut self, id: Id) -> Option<LookupValue> {
        let parent_id = self.values.get(&id)?.parent_id;
        if let Some(parent_id) = parent_id {
            self.remove_child(parent_id, id);
        }
        self.values.remove(&id)
    }

    /// Links `child_id` under `parent_id`, detaching it from any previous parent.
    pub fn add_child(&mut self, parent_id: Id, child_id: Id) -> bool {
        if !self.contains(parent_id) || !self.contains(child_id) {
            return false;
        }

        let previous = self.values.get(&child_id).and_then(|c| c.parent_id);
        if let Some(previous) = previous.filter(|p| *p != parent_id) {
            self.remove_child(previous, child_id);
        }

        if let Some(child) = self.values.get_mut(&child_id) {
            child.parent_id = Some(parent_id);
        }
        if let Some(parent) = self.values.get_mut(&parent_id) {
            if !parent.children.contains(&child_id) {
                parent.children.push(child_id);
            }
        }
        true
    }

    pub fn remove_child(&mut self, parent_id: Id, child_id: Id) -> bool {
        let Some(parent) = self.values.get_mut(&parent_id) else {
            return false;
        };
        let before = parent.children.len();
        parent.children.retain(|c| *c != child_id);
        let removed = parent.children.len() != before;

        if let Some(child) = self.values.get_mut(&child_id) {
            if child.parent_id == Some(parent_id) {
                child.parent_id = None;
            }
        }
        removed
    }
}
