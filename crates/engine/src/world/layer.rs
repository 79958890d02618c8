use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Which layer key an entity is filed under when it joins the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPolicy {
    /// The largest depth seen since the last map load, including the new
    /// entity's own. An entity shallower than an earlier one lands in the
    /// deeper layer.
    #[default]
    RunningMax,
    /// The entity's own depth.
    OwnDepth,
}

/// Entities sharing one draw depth, in insertion order. Membership is fixed
/// when the entity is added; later depth changes do not move it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    depth: i32,
    members: Vec<EntityId>,
}

impl Layer {
    pub fn new(depth: i32) -> Self {
        Self {
            depth,
            members: Vec::new(),
        }
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn add(&mut self, id: EntityId) {
        self.members.push(id);
    }

    /// Drops members listed in `sorted_ids`, which must be sorted.
    pub(crate) fn remove_sorted(&mut self, sorted_ids: &[EntityId]) {
        self.members.retain(|id| sorted_ids.binary_search(id).is_err());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_sorted_keeps_insertion_order_of_survivors() {
        let mut layer = Layer::new(2);
        for raw in [5, 1, 9, 3] {
            layer.add(EntityId(raw));
        }
        layer.remove_sorted(&[EntityId(1), EntityId(4), EntityId(9)]);
        assert_eq!(layer.members(), &[EntityId(5), EntityId(3)]);
        assert_eq!(layer.depth(), 2);
    }

    #[test]
    fn layer_policy_parses_snake_case() {
        let policy: LayerPolicy = serde_json::from_str("\"own_depth\"").expect("policy");
        assert_eq!(policy, LayerPolicy::OwnDepth);
    }
}
