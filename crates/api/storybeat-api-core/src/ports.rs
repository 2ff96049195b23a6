//! Ports through which the sequencing core talks to the host.
//!
//! The core never renders, moves or loads anything itself. Hosts implement these
//! traits (or reuse the small implementations provided here) and hand them to the
//! dialogue sequencer and camera coordinator at construction time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::line::LineRecord;
use crate::math::Position;

/// A request to render one line of text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub line: LineRecord,
    /// Resolved world position the text bubble should be attached to.
    pub anchor: Position,
    pub source_tag: String,
}

/// Typewriter-style text renderer.
///
/// `display` must not block. The host reports completion by calling the sequencer's
/// `on_display_complete` exactly once per `display` call, either later or from inside
/// `display` itself.
pub trait TypewriterPort {
    fn display(&mut self, request: &DisplayRequest);
}

/// Resolves entities to their current world position.
pub trait EntityPort {
    /// `None` when the entity no longer exists.
    fn position(&self, entity: EntityRef) -> Option<Position>;
}

/// Read-only access to authored text.
pub trait ContentTable {
    fn lookup(&self, id: &str) -> Option<String>;

    /// Per-line spatial anchor, if the table carries one.
    fn anchor_of(&self, _id: &str) -> Option<EntityRef> {
        None
    }

    /// Resolve a full line record. Empty text is treated as missing.
    fn line(&self, id: &str) -> Option<LineRecord> {
        let text = self.lookup(id).filter(|t| !t.is_empty())?;
        Some(LineRecord {
            id: id.to_string(),
            text,
            spatial_anchor: self.anchor_of(id),
        })
    }
}

impl ContentTable for HashMap<String, String> {
    fn lookup(&self, id: &str) -> Option<String> {
        self.get(id).cloned()
    }
}

impl<T: ContentTable + ?Sized> ContentTable for Rc<T> {
    fn lookup(&self, id: &str) -> Option<String> {
        (**self).lookup(id)
    }

    fn anchor_of(&self, id: &str) -> Option<EntityRef> {
        (**self).anchor_of(id)
    }
}

impl<T: EntityPort + ?Sized> EntityPort for Rc<T> {
    fn position(&self, entity: EntityRef) -> Option<Position> {
        (**self).position(entity)
    }
}

/// Typewriter that only records what it was asked to show.
///
/// Clones share the same log, so a test can keep one clone and hand the other to the
/// sequencer.
#[derive(Clone, Debug, Default)]
pub struct RecordingTypewriter {
    shown: Rc<RefCell<Vec<DisplayRequest>>>,
}

impl RecordingTypewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DisplayRequest> {
        self.shown.borrow().clone()
    }

    /// Line ids in display order.
    pub fn shown_ids(&self) -> Vec<String> {
        self.shown.borrow().iter().map(|r| r.line.id.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.shown.borrow().len()
    }

    pub fn last(&self) -> Option<DisplayRequest> {
        self.shown.borrow().last().cloned()
    }
}

impl TypewriterPort for RecordingTypewriter {
    fn display(&mut self, request: &DisplayRequest) {
        self.shown.borrow_mut().push(request.clone());
    }
}
