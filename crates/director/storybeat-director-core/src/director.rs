//! Beat task pool.
//!
//! Every running beat is a future on one single-threaded [`LocalPool`]. A beat owns a
//! child token of the scope it was started under; cancelling either one removes the
//! beat's pending handlers at once and drops the future on the next poll, so no later
//! step of a cancelled beat ever runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::Abortable;
use futures::task::LocalSpawnExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storybeat_api::signal::names;
use storybeat_signals::CancelToken;
use tracing::{debug, error, info, warn};

use crate::beat::Beat;
use crate::error::BeatError;
use crate::runner::{run_beat, BeatContext};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatId(pub u64);

impl fmt::Display for BeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "beat#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatStatus {
    Completed,
    /// The sequencer refused the beat's lines.
    Skipped,
    Cancelled,
    Failed,
}

impl BeatStatus {
    fn of(result: &Result<(), BeatError>) -> Self {
        match result {
            Ok(()) => BeatStatus::Completed,
            Err(BeatError::Skipped(_)) => BeatStatus::Skipped,
            Err(BeatError::Cancelled) => BeatStatus::Cancelled,
            Err(_) => BeatStatus::Failed,
        }
    }
}

/// Outcome record for a beat that stopped running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishedBeat {
    pub id: BeatId,
    pub name: String,
    pub source_tag: String,
    pub status: BeatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct RunningBeat {
    name: String,
    token: CancelToken,
}

type RunningMap = Rc<RefCell<IndexMap<BeatId, RunningBeat>>>;

pub struct Director {
    pool: LocalPool,
    spawner: LocalSpawner,
    next_id: u64,
    running: RunningMap,
    finished: Rc<RefCell<Vec<FinishedBeat>>>,
}

impl Director {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool,
            spawner,
            next_id: 0,
            running: Rc::new(RefCell::new(IndexMap::new())),
            finished: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Queue `beat` under a child of `scope`. Nothing runs until the next [`Director::poll`].
    ///
    /// Beats are independent: several may run at once. Only the sequencer refuses a
    /// second concurrent sequence.
    pub fn run(&mut self, beat: Beat, ctx: BeatContext, scope: &CancelToken) -> BeatId {
        self.next_id += 1;
        let id = BeatId(self.next_id);
        let token = scope.child();
        let registration = token.abort_registration();
        let name = beat.name.clone();
        let source_tag = beat.tag().to_string();

        self.running.borrow_mut().insert(
            id,
            RunningBeat {
                name: name.clone(),
                token: token.clone(),
            },
        );
        info!(%id, beat = %name, "beat started");

        let running = Rc::clone(&self.running);
        let finished = Rc::clone(&self.finished);
        let bus = ctx.bus.clone();
        let task = async move {
            let body = Abortable::new(run_beat(beat, ctx, token), registration);
            let result = match body.await {
                Ok(result) => result,
                Err(_aborted) => Err(BeatError::Cancelled),
            };
            running.borrow_mut().shift_remove(&id);

            let status = BeatStatus::of(&result);
            match &result {
                Ok(()) => info!(%id, beat = %name, "beat completed"),
                Err(BeatError::Cancelled) => debug!(%id, beat = %name, "beat cancelled"),
                Err(err) => warn!(%id, beat = %name, %err, "beat stopped early"),
            }
            if status != BeatStatus::Cancelled {
                bus.emit(
                    names::BEAT_FINISHED,
                    json!({ "beat": name, "source_tag": source_tag, "status": status }),
                );
            }
            finished.borrow_mut().push(FinishedBeat {
                id,
                name,
                source_tag,
                status,
                error: result.err().map(|e| e.to_string()),
            });
        };

        if let Err(err) = self.spawner.spawn_local(task) {
            error!(%id, %err, "failed to spawn beat");
            if let Some(beat) = self.running.borrow_mut().shift_remove(&id) {
                beat.token.cancel();
            }
        }
        id
    }

    /// Cancel a running beat. Returns `false` if it is not running.
    pub fn cancel(&mut self, id: BeatId) -> bool {
        let entry = self.running.borrow_mut().shift_remove(&id);
        match entry {
            Some(beat) => {
                debug!(%id, beat = %beat.name, "cancelling beat");
                beat.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids of beats still running, in start order.
    pub fn running(&self) -> Vec<BeatId> {
        self.running
            .borrow()
            .iter()
            .filter(|(_, beat)| !beat.token.is_cancelled())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_running(&self, id: BeatId) -> bool {
        self.running
            .borrow()
            .get(&id)
            .is_some_and(|beat| !beat.token.is_cancelled())
    }

    /// Drive every beat until none can make progress without new input.
    pub fn poll(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Beats that stopped since the last drain.
    pub fn drain_finished(&mut self) -> Vec<FinishedBeat> {
        std::mem::take(&mut *self.finished.borrow_mut())
    }
}

impl Default for Director {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("running", &self.running())
            .field("finished", &self.finished.borrow().len())
            .finish()
    }
}
