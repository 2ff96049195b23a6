//! Entity handles and a map-backed entity port.

use std::cell::RefCell;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::math::Position;
use crate::ports::EntityPort;

/// Opaque handle to a scene entity owned by the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub u64);

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Entity positions kept in a plain map.
///
/// Useful for hosts without a transform hierarchy and for tests. Positions can be
/// updated through a shared reference so the same table can be handed to the
/// sequencer and camera while the host keeps moving things around.
#[derive(Debug, Default)]
pub struct StaticEntities {
    positions: RefCell<HashMap<EntityRef, Position>>,
}

impl StaticEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, entity: EntityRef, position: Position) -> Self {
        self.set(entity, position);
        self
    }

    pub fn set(&self, entity: EntityRef, position: Position) {
        self.positions.borrow_mut().insert(entity, position);
    }

    /// Forget an entity, as if it had been destroyed.
    pub fn remove(&self, entity: EntityRef) -> Option<Position> {
        self.positions.borrow_mut().remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.positions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.borrow().is_empty()
    }
}

impl EntityPort for StaticEntities {
    fn position(&self, entity: EntityRef) -> Option<Position> {
        self.positions.borrow().get(&entity).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_entities_resolve_to_none() {
        let ents = StaticEntities::new().with(EntityRef(1), [1.0, 2.0, 0.0]);
        assert_eq!(ents.position(EntityRef(1)), Some([1.0, 2.0, 0.0]));
        ents.remove(EntityRef(1));
        assert_eq!(ents.position(EntityRef(1)), None);
        assert!(ents.is_empty());
    }

    #[test]
    fn entity_ref_is_transparent_in_json() {
        let json = serde_json::to_value(EntityRef(42)).unwrap();
        assert_eq!(json, serde_json::json!(42));
        assert_eq!(EntityRef(42).to_string(), "entity#42");
    }
}
