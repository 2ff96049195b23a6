//! Beat model and JSON loading.
//!
//! ```json
//! {
//!   "name": "first_encounter",
//!   "source_tag": "harbor.keeper",
//!   "steps": [
//!     { "type": "focus_camera", "target": 2 },
//!     { "type": "show_lines", "ids": ["greet"], "anchor": 2, "advance": "auto" },
//!     { "type": "release_camera" }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use storybeat_api::EntityRef;
use storybeat_dialogue::AdvanceMode;

fn yes() -> bool {
    true
}

/// One step of a beat. Steps run strictly one after another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeatStep {
    /// Hand lines to the sequencer; optionally wait for its finished signal.
    ShowLines {
        ids: Vec<String>,
        #[serde(default)]
        anchor: Option<EntityRef>,
        #[serde(default)]
        advance: AdvanceMode,
        #[serde(default = "yes")]
        await_finish: bool,
    },
    FocusCamera {
        target: EntityRef,
        #[serde(default = "yes")]
        await_arrival: bool,
    },
    ReleaseCamera,
    Wait {
        seconds: f32,
    },
    PublishSignal {
        name: String,
        #[serde(default)]
        payload: JsonValue,
    },
    AwaitSignal {
        name: String,
    },
    /// Focus, wait for arrival, hold, then return to the default subject.
    PanAndReturn {
        target: EntityRef,
        hold: f32,
    },
    /// Change the camera's default subject.
    FollowSubject {
        entity: EntityRef,
    },
}

impl BeatStep {
    pub fn kind(&self) -> &'static str {
        match self {
            BeatStep::ShowLines { .. } => "show_lines",
            BeatStep::FocusCamera { .. } => "focus_camera",
            BeatStep::ReleaseCamera => "release_camera",
            BeatStep::Wait { .. } => "wait",
            BeatStep::PublishSignal { .. } => "publish_signal",
            BeatStep::AwaitSignal { .. } => "await_signal",
            BeatStep::PanAndReturn { .. } => "pan_and_return",
            BeatStep::FollowSubject { .. } => "follow_subject",
        }
    }

    pub fn show_lines<I, S>(ids: I, advance: AdvanceMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BeatStep::ShowLines {
            ids: ids.into_iter().map(Into::into).collect(),
            anchor: None,
            advance,
            await_finish: true,
        }
    }

    pub fn focus(target: EntityRef) -> Self {
        BeatStep::FocusCamera {
            target,
            await_arrival: true,
        }
    }

    pub fn wait(seconds: f32) -> Self {
        BeatStep::Wait { seconds }
    }

    pub fn publish(name: impl Into<String>, payload: JsonValue) -> Self {
        BeatStep::PublishSignal {
            name: name.into(),
            payload,
        }
    }

    pub fn await_signal(name: impl Into<String>) -> Self {
        BeatStep::AwaitSignal { name: name.into() }
    }
}

/// A named, authored script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub name: String,
    /// Tag carried into display requests and finished signals. Defaults to `name`.
    #[serde(default)]
    pub source_tag: String,
    #[serde(default)]
    pub steps: Vec<BeatStep>,
}

impl Beat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_tag: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn tagged(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn step(mut self, step: BeatStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn tag(&self) -> &str {
        if self.source_tag.is_empty() {
            &self.name
        } else {
            &self.source_tag
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let beat: Beat = serde_json::from_str(text).context("failed to parse beat json")?;
        if beat.name.is_empty() {
            bail!("beat has no name");
        }
        Ok(beat)
    }
}

#[derive(Debug, Deserialize)]
struct LibraryDoc {
    #[serde(default)]
    beats: Vec<Beat>,
}

/// Beats addressable by name, in authoring order.
#[derive(Clone, Debug, Default)]
pub struct BeatLibrary {
    beats: IndexMap<String, Beat>,
}

impl BeatLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "beats": [ ... ] }`. Duplicate names are an error.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: LibraryDoc =
            serde_json::from_str(text).context("failed to parse beat library json")?;
        let mut library = Self::new();
        for beat in doc.beats {
            if beat.name.is_empty() {
                bail!("beat library entry has no name");
            }
            if library.beats.contains_key(&beat.name) {
                bail!("duplicate beat '{}'", beat.name);
            }
            library.beats.insert(beat.name.clone(), beat);
        }
        Ok(library)
    }

    /// Insert or replace a beat.
    pub fn insert(&mut self, beat: Beat) -> Option<Beat> {
        self.beats.insert(beat.name.clone(), beat)
    }

    pub fn get(&self, name: &str) -> Option<&Beat> {
        self.beats.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.beats.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_defaults_fill_in() {
        let beat = Beat::from_json(
            r#"{
                "name": "dock",
                "steps": [
                    { "type": "show_lines", "ids": ["a", "b"] },
                    { "type": "focus_camera", "target": 4 },
                    { "type": "release_camera" },
                    { "type": "publish_signal", "name": "dock.done" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(beat.tag(), "dock");
        assert_eq!(
            beat.steps[0],
            BeatStep::ShowLines {
                ids: vec!["a".into(), "b".into()],
                anchor: None,
                advance: AdvanceMode::Manual,
                await_finish: true,
            }
        );
        assert_eq!(beat.steps[1], BeatStep::focus(EntityRef(4)));
        assert_eq!(beat.steps[2], BeatStep::ReleaseCamera);
        assert_eq!(beat.steps[3], BeatStep::publish("dock.done", JsonValue::Null));
    }

    #[test]
    fn unknown_step_type_is_an_error() {
        let err = Beat::from_json(r#"{ "name": "x", "steps": [ { "type": "dance" } ] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn library_keeps_authoring_order_and_rejects_duplicates() {
        let lib = BeatLibrary::from_json(
            &json!({ "beats": [ { "name": "b" }, { "name": "a", "source_tag": "t" } ] })
                .to_string(),
        )
        .unwrap();
        assert_eq!(lib.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(lib.get("a").map(Beat::tag), Some("t"));

        let dup = json!({ "beats": [ { "name": "a" }, { "name": "a" } ] }).to_string();
        assert!(BeatLibrary::from_json(&dup).is_err());
    }
}
