use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use storybeat_api::{ContentTable, EntityPort, LineRecord, TypewriterPort};
use storybeat_signals::{next_signal, CancelToken, EventBus, SignalFuture};
use tracing::{debug, error};

use crate::config::DialogueConfig;
use crate::error::Rejected;
use crate::sequencer::{Effect, SequenceRequest, SequencerCore, SequencerState};

struct Shared {
    core: RefCell<SequencerCore>,
    port: Option<RefCell<Box<dyn TypewriterPort>>>,
    entities: Rc<dyn EntityPort>,
    bus: EventBus,
    outbox: RefCell<VecDeque<Effect>>,
    dispatching: Cell<bool>,
}

/// Shared handle to the scene's one line sequencer.
///
/// External code may read the state and call `start_sequence`, `proceed_to_next_line`,
/// `on_display_complete`, `pause`, `resume`, `end_sequence` and `abort`; nothing else mutates the
/// sequence. Effects (display requests, `on_complete`, the finished signal) run after
/// the state change is committed, in the order the state machine produced them. A call
/// made while effects are being delivered queues its own effects behind them.
#[derive(Clone)]
pub struct Dialogue {
    shared: Rc<Shared>,
}

impl Dialogue {
    /// Create the sequencer. Without a typewriter port the sequencer disables itself:
    /// every `start_sequence` is rejected with [`Rejected::Misconfigured`].
    pub fn new(
        cfg: DialogueConfig,
        port: Option<Box<dyn TypewriterPort>>,
        entities: Rc<dyn EntityPort>,
        bus: EventBus,
    ) -> Self {
        if port.is_none() {
            error!("dialogue created without a typewriter port; sequences are disabled");
        }
        Self {
            shared: Rc::new(Shared {
                core: RefCell::new(SequencerCore::new(cfg)),
                port: port.map(RefCell::new),
                entities,
                bus,
                outbox: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.port.is_some()
    }

    pub fn state(&self) -> SequencerState {
        self.shared.core.borrow().state()
    }

    /// Interaction prompts should stay hidden while this is true.
    pub fn is_playing_text(&self) -> bool {
        self.state() == SequencerState::PlayingText
    }

    pub fn current_line(&self) -> Option<LineRecord> {
        self.shared
            .core
            .borrow()
            .active()
            .and_then(|a| a.current().cloned())
    }

    pub fn source_tag(&self) -> Option<String> {
        self.shared
            .core
            .borrow()
            .active()
            .map(|a| a.source_tag().to_string())
    }

    /// True while an inline pause holds the current line.
    pub fn is_paused(&self) -> bool {
        self.shared.core.borrow().is_paused()
    }

    pub fn lines_remaining(&self) -> usize {
        self.shared
            .core
            .borrow()
            .active()
            .map_or(0, |a| a.remaining())
    }

    pub fn finished_signal(&self) -> String {
        self.shared.core.borrow().config().finished_signal.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Start showing `request.ids`. On success the first line is already requested from
    /// the typewriter when this returns.
    pub fn start_sequence(
        &self,
        request: SequenceRequest,
        content: &dyn ContentTable,
    ) -> Result<(), Rejected> {
        if !self.is_enabled() {
            error!(source_tag = %request.source_tag, "cannot start sequence: no typewriter port");
            return Err(Rejected::Misconfigured);
        }
        let (result, effects) =
            self.shared
                .core
                .borrow_mut()
                .start(request, content, &*self.shared.entities);
        self.dispatch(effects);
        result
    }

    /// Called by the typewriter when the current line is fully displayed.
    pub fn on_display_complete(&self) {
        let effects = self
            .shared
            .core
            .borrow_mut()
            .on_display_complete(&*self.shared.entities);
        self.dispatch(effects);
    }

    /// Manual continuation. Only valid in `WaitingForContinuation`; otherwise a logged no-op.
    pub fn proceed_to_next_line(&self) {
        let effects = self
            .shared
            .core
            .borrow_mut()
            .proceed(&*self.shared.entities);
        self.dispatch(effects);
    }

    /// Inline pause: a line that finishes while paused does not advance until
    /// [`Dialogue::resume`]. Returns `false` (and changes nothing) when no sequence is active.
    pub fn pause(&self) -> bool {
        self.shared.core.borrow_mut().pause()
    }

    pub fn resume(&self) {
        let effects = self
            .shared
            .core
            .borrow_mut()
            .resume(&*self.shared.entities);
        self.dispatch(effects);
    }

    /// End the active sequence: state goes to `Idle`, then `on_complete` runs, then the
    /// finished signal is published. No-op when nothing is active.
    pub fn end_sequence(&self) {
        let effects = self.shared.core.borrow_mut().end(false);
        self.dispatch(effects);
    }

    /// Abandon the active sequence. Same as [`Dialogue::end_sequence`] except the
    /// finished signal carries `"aborted": true`.
    pub fn abort(&self) {
        let effects = self.shared.core.borrow_mut().end(true);
        self.dispatch(effects);
    }

    /// Await the next finished signal of this sequencer.
    pub fn next_finished(&self, token: &CancelToken) -> SignalFuture {
        next_signal(&self.shared.bus, self.finished_signal(), token)
    }

    fn dispatch(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        self.shared.outbox.borrow_mut().extend(effects);
        if self.shared.dispatching.replace(true) {
            // An outer dispatch further up the stack delivers these.
            return;
        }

        loop {
            let next = self.shared.outbox.borrow_mut().pop_front();
            let Some(effect) = next else {
                break;
            };
            match effect {
                Effect::Display(request) => {
                    debug!(
                        line = %request.line.id,
                        source_tag = %request.source_tag,
                        "display line"
                    );
                    if let Some(port) = &self.shared.port {
                        port.borrow_mut().display(&request);
                    }
                }
                Effect::Callback(callback) => callback(),
                Effect::Publish(signal) => self.shared.bus.publish(signal),
                Effect::Settled => self.shared.core.borrow_mut().settle(),
            }
        }
        self.shared.dispatching.set(false);
    }
}

impl fmt::Debug for Dialogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialogue")
            .field("core", &*self.shared.core.borrow())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use storybeat_api::{RecordingTypewriter, StaticEntities};

    #[test]
    fn missing_port_disables_sequencer() {
        let dialogue = Dialogue::new(
            DialogueConfig::default(),
            None,
            Rc::new(StaticEntities::new()),
            EventBus::new(),
        );
        let mut content = HashMap::new();
        content.insert("a".to_string(), "A".to_string());
        assert_eq!(
            dialogue.start_sequence(SequenceRequest::new(["a"]), &content),
            Err(Rejected::Misconfigured)
        );
        assert_eq!(dialogue.state(), SequencerState::Idle);
    }

    #[test]
    fn queries_reflect_active_sequence() {
        let port = RecordingTypewriter::new();
        let dialogue = Dialogue::new(
            DialogueConfig::default(),
            Some(Box::new(port.clone())),
            Rc::new(StaticEntities::new()),
            EventBus::new(),
        );
        let mut content = HashMap::new();
        content.insert("a".to_string(), "A".to_string());
        content.insert("b".to_string(), "B".to_string());

        dialogue
            .start_sequence(SequenceRequest::new(["a", "b"]).tag("dock"), &content)
            .unwrap();
        assert!(dialogue.is_playing_text());
        assert_eq!(dialogue.current_line().map(|l| l.id), Some("a".to_string()));
        assert_eq!(dialogue.source_tag().as_deref(), Some("dock"));
        assert_eq!(dialogue.lines_remaining(), 1);
        assert_eq!(port.count(), 1);
    }
}
