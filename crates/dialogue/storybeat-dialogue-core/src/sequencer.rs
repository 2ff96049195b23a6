//! Dialogue state machine.
//!
//! Lifecycle of one sequence:
//!
//! ```text
//! Idle --start--> PlayingText --complete--> (more lines, Auto)   PlayingText
//!                             --complete--> (more lines, Manual) WaitingForContinuation --proceed--> PlayingText
//!                             --complete--> (queue empty)        Idle  (+ on_complete, finished signal)
//! ```
//!
//! An inline pause holds the sequence on the current line: a completion reported while
//! paused is recorded and only acted on at `resume`.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use storybeat_api::{
    ContentTable, DisplayRequest, EntityPort, EntityRef, LineRecord, Position, Signal,
};
use tracing::{debug, warn};

use crate::config::DialogueConfig;
use crate::error::Rejected;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    #[default]
    Idle,
    PlayingText,
    WaitingForContinuation,
}

/// How the sequencer moves past a fully displayed line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// Show the next line as soon as the previous one finishes (monologues).
    Auto,
    /// Park in `WaitingForContinuation` until the player proceeds.
    #[default]
    Manual,
}

impl From<bool> for AdvanceMode {
    /// `true` keeps the historic `auto_advance` meaning: advance without player input.
    fn from(auto_advance: bool) -> Self {
        if auto_advance {
            AdvanceMode::Auto
        } else {
            AdvanceMode::Manual
        }
    }
}

pub type CompletionCallback = Box<dyn FnOnce()>;

/// Everything needed to start a sequence.
pub struct SequenceRequest {
    pub ids: Vec<String>,
    pub anchor: Option<EntityRef>,
    pub advance: AdvanceMode,
    pub source_tag: String,
    pub on_complete: Option<CompletionCallback>,
}

impl SequenceRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            anchor: None,
            advance: AdvanceMode::default(),
            source_tag: String::new(),
            on_complete: None,
        }
    }

    pub fn anchor(mut self, anchor: EntityRef) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn advance(mut self, advance: impl Into<AdvanceMode>) -> Self {
        self.advance = advance.into();
        self
    }

    pub fn tag(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for SequenceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRequest")
            .field("ids", &self.ids)
            .field("anchor", &self.anchor)
            .field("advance", &self.advance)
            .field("source_tag", &self.source_tag)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// The sequence currently owned by the sequencer.
pub struct ActiveSequence {
    queue: VecDeque<LineRecord>,
    advance: AdvanceMode,
    anchor_override: Option<EntityRef>,
    on_complete: Option<CompletionCallback>,
    source_tag: String,
    current: Option<LineRecord>,
    shown: usize,
}

impl ActiveSequence {
    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn current(&self) -> Option<&LineRecord> {
        self.current.as_ref()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn advance_mode(&self) -> AdvanceMode {
        self.advance
    }
}

/// Side effects requested by the state machine, performed in order by the handle.
pub(crate) enum Effect {
    Display(DisplayRequest),
    Callback(CompletionCallback),
    Publish(Signal),
    /// All completion effects of an ended sequence have been delivered.
    Settled,
}

pub struct SequencerCore {
    cfg: DialogueConfig,
    state: SequencerState,
    active: Option<ActiveSequence>,
    /// True while an ended sequence is still delivering its completion effects.
    finishing: bool,
    /// Display requests issued whose completion has not been reported yet.
    outstanding: u32,
    /// Completions still owed for lines of sequences that already ended.
    stale_in_flight: u32,
    /// Inline-event pause flag.
    paused: bool,
    /// A completion arrived while paused.
    held_completion: bool,
}

impl SequencerCore {
    pub fn new(cfg: DialogueConfig) -> Self {
        Self {
            cfg,
            state: SequencerState::Idle,
            active: None,
            finishing: false,
            outstanding: 0,
            stale_in_flight: 0,
            paused: false,
            held_completion: false,
        }
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.cfg
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn active(&self) -> Option<&ActiveSequence> {
        self.active.as_ref()
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Completions the typewriter still owes for lines of ended sequences.
    pub fn stale_in_flight(&self) -> u32 {
        self.stale_in_flight
    }

    pub(crate) fn settle(&mut self) {
        self.finishing = false;
    }

    /// Build and start a sequence. Rejections leave the current state untouched; the
    /// only effect of a rejection is the `Empty` case calling `on_complete` right away.
    pub(crate) fn start(
        &mut self,
        request: SequenceRequest,
        content: &dyn ContentTable,
        entities: &dyn EntityPort,
    ) -> (Result<(), Rejected>, Vec<Effect>) {
        if self.finishing || self.state != SequencerState::Idle {
            warn!(
                source_tag = %request.source_tag,
                state = ?self.state,
                finishing = self.finishing,
                "sequence rejected: sequencer busy"
            );
            return (Err(Rejected::Busy), Vec::new());
        }

        let SequenceRequest {
            ids,
            anchor,
            advance,
            source_tag,
            on_complete,
        } = request;

        let mut queue = VecDeque::with_capacity(ids.len());
        for id in &ids {
            match content.line(id) {
                Some(line) => queue.push_back(line),
                None => warn!(line = %id, source_tag = %source_tag, "skipping line with no text"),
            }
        }

        if queue.is_empty() {
            warn!(
                source_tag = %source_tag,
                requested = ids.len(),
                "sequence rejected: nothing to show"
            );
            let effects = on_complete.map(Effect::Callback).into_iter().collect();
            return (Err(Rejected::Empty), effects);
        }

        debug!(source_tag = %source_tag, lines = queue.len(), ?advance, "sequence started");
        self.active = Some(ActiveSequence {
            queue,
            advance,
            anchor_override: anchor,
            on_complete,
            source_tag,
            current: None,
            shown: 0,
        });
        self.state = SequencerState::PlayingText;
        (Ok(()), self.advance_to_next_line(entities))
    }

    /// Pop the next line and request its display.
    pub(crate) fn advance_to_next_line(&mut self, entities: &dyn EntityPort) -> Vec<Effect> {
        let default_anchor = self.cfg.default_anchor;
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };
        let Some(line) = active.queue.pop_front() else {
            return Vec::new();
        };

        let anchor = resolve_anchor(&line, active.anchor_override, entities, default_anchor);
        let request = DisplayRequest {
            line: line.clone(),
            anchor,
            source_tag: active.source_tag.clone(),
        };
        active.current = Some(line);
        active.shown += 1;
        self.outstanding += 1;
        vec![Effect::Display(request)]
    }

    pub(crate) fn on_display_complete(&mut self, entities: &dyn EntityPort) -> Vec<Effect> {
        if self.stale_in_flight > 0 {
            self.stale_in_flight -= 1;
            debug!(
                remaining = self.stale_in_flight,
                "completion for a line of an ended sequence discarded"
            );
            return Vec::new();
        }
        if self.outstanding == 0 || self.state != SequencerState::PlayingText {
            warn!(state = ?self.state, "stale display completion discarded");
            return Vec::new();
        }
        self.outstanding -= 1;

        if self.paused {
            debug!("line complete while paused; holding");
            self.held_completion = true;
            return Vec::new();
        }
        self.finish_current_line(entities)
    }

    /// The current line is done: show the next one, park, or end.
    fn finish_current_line(&mut self, entities: &dyn EntityPort) -> Vec<Effect> {
        let (empty, advance) = match self.active.as_ref() {
            Some(active) => (active.queue.is_empty(), active.advance),
            None => return Vec::new(),
        };

        if empty {
            return self.end(false);
        }
        match advance {
            AdvanceMode::Auto => self.advance_to_next_line(entities),
            AdvanceMode::Manual => {
                self.state = SequencerState::WaitingForContinuation;
                Vec::new()
            }
        }
    }

    /// Hold the active sequence on its current line. Ignored while idle.
    pub(crate) fn pause(&mut self) -> bool {
        if self.active.is_none() {
            debug!("pause ignored: no active sequence");
            return false;
        }
        self.paused = true;
        true
    }

    /// Lift the pause, acting on any completion that arrived meanwhile.
    pub(crate) fn resume(&mut self, entities: &dyn EntityPort) -> Vec<Effect> {
        if !self.paused {
            return Vec::new();
        }
        self.paused = false;
        if std::mem::take(&mut self.held_completion) {
            return self.finish_current_line(entities);
        }
        Vec::new()
    }

    pub(crate) fn proceed(&mut self, entities: &dyn EntityPort) -> Vec<Effect> {
        if self.state != SequencerState::WaitingForContinuation {
            warn!(state = ?self.state, "proceed ignored: not waiting for continuation");
            return Vec::new();
        }
        self.state = SequencerState::PlayingText;
        self.advance_to_next_line(entities)
    }

    /// Tear down the active sequence. With nothing active this is a no-op.
    pub(crate) fn end(&mut self, aborted: bool) -> Vec<Effect> {
        let Some(active) = self.active.take() else {
            debug!("end requested with no active sequence");
            return Vec::new();
        };
        self.state = SequencerState::Idle;
        self.stale_in_flight += std::mem::take(&mut self.outstanding);
        self.paused = false;
        self.held_completion = false;
        self.finishing = true;
        debug!(source_tag = %active.source_tag, shown = active.shown, aborted, "sequence ended");

        let mut effects = Vec::with_capacity(3);
        if let Some(cb) = active.on_complete {
            effects.push(Effect::Callback(cb));
        }
        effects.push(Effect::Publish(Signal::with_payload(
            self.cfg.finished_signal.clone(),
            json!({
                "source_tag": active.source_tag,
                "lines_shown": active.shown,
                "aborted": aborted,
            }),
        )));
        effects.push(Effect::Settled);
        effects
    }
}

impl fmt::Debug for SequencerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerCore")
            .field("state", &self.state)
            .field(
                "source_tag",
                &self.active.as_ref().map(|a| a.source_tag.as_str()),
            )
            .field("remaining", &self.active.as_ref().map(|a| a.queue.len()))
            .field("finishing", &self.finishing)
            .field("paused", &self.paused)
            .field("stale_in_flight", &self.stale_in_flight)
            .finish()
    }
}

/// Line anchor, else sequence anchor, else the fixed default when the entity is gone.
fn resolve_anchor(
    line: &LineRecord,
    sequence_anchor: Option<EntityRef>,
    entities: &dyn EntityPort,
    default_anchor: Position,
) -> Position {
    let Some(entity) = line.spatial_anchor.or(sequence_anchor) else {
        return default_anchor;
    };
    match entities.position(entity) {
        Some(pos) => pos,
        None => {
            warn!(line = %line.id, %entity, "anchor entity not found; using default anchor");
            default_anchor
        }
    }
}
