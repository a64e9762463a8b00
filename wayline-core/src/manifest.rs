//! Order manifest: the external description of a presentation.
//!
//! The wire shape is `order.json`: an `order` array mixing bare media
//! paths with `type`-tagged objects, plus `soundSections` mapping
//! cursor ranges to background tracks. Parsing converts the dynamic
//! mix into the closed [`Step`] union.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::step::{Choice, ChoiceSummary, Crossroad, Quiz, Start, Step, StepKind};

/// Manifest load failure. The one fatal error class: without a manifest
/// there is no sequence to navigate.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest contains no steps")]
    Empty,
}

/// One background-sound range. `end == -1` means "through the end of the
/// current sequence".
#[derive(Debug, Clone, Deserialize)]
pub struct SoundSection {
    pub start: i64,
    pub end: i64,
    pub sound: String,
}

/// Ordered sound sections with cursor lookup.
#[derive(Debug, Clone, Default)]
pub struct SoundSections(Vec<SoundSection>);

impl SoundSections {
    pub fn new(sections: Vec<SoundSection>) -> Self {
        Self(sections)
    }

    /// Background track for a cursor position, if any section covers it.
    /// `len` is the current sequence length, needed to resolve `end: -1`.
    pub fn sound_for(&self, index: usize, len: usize) -> Option<&str> {
        let index = index as i64;
        self.0
            .iter()
            .find(|section| {
                let end = if section.end == -1 {
                    len as i64 - 1
                } else {
                    section.end
                };
                index >= section.start && index <= end
            })
            .map(|section| section.sound.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed manifest: the seed steps and the sound map.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub steps: Vec<Step>,
    pub sounds: SoundSections,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    order: Vec<RawEntry>,
    #[serde(default, rename = "soundSections")]
    sound_sections: Vec<SoundSection>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Path(String),
    Node(RawNode),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawNode {
    StartButton(Start),
    Quiz(Quiz),
    Choice(Choice),
    Crossroad(Crossroad),
    ChoiceSummary(ChoiceSummary),
}

impl From<RawEntry> for Step {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Path(path) => Step::media(path),
            RawEntry::Node(node) => Step::new(match node {
                RawNode::StartButton(start) => StepKind::Start(start),
                RawNode::Quiz(quiz) => StepKind::Quiz(quiz),
                RawNode::Choice(choice) => StepKind::Choice(choice),
                RawNode::Crossroad(crossroad) => StepKind::Crossroad(crossroad),
                RawNode::ChoiceSummary(summary) => StepKind::ChoiceSummary(summary),
            }),
        }
    }
}

impl Manifest {
    /// Parse a manifest from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_json::from_str(json)?;
        if raw.order.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(Self {
            steps: raw.order.into_iter().map(Step::from).collect(),
            sounds: SoundSections::new(raw.sound_sections),
        })
    }

    /// Load and parse a manifest file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::MediaKind;

    const SAMPLE: &str = r#"{
        "order": [
            {"type": "start_button", "background": "intro.png", "title": "T",
             "subtitle": "S", "buttonText": "Go"},
            "a.png",
            {"type": "quiz", "question": "Q1?", "options": ["one", "two"]},
            {"type": "choice", "background": "bg.png", "choices": [
                {"id": "x", "image": "b.png",
                 "position": {"x": 0.5, "y": 0.5},
                 "size": {"width": 0.2, "height": 0.2},
                 "results": "c.png"}
            ]},
            {"type": "crossroad", "question": "q", "nextText": "n",
             "previousText": "p", "delayMs": 1000},
            "d.webm",
            {"type": "choice_summary", "title": "Done", "description": "All"}
        ],
        "soundSections": [
            {"start": 0, "end": 2, "sound": "calm.mp3"},
            {"start": 3, "end": -1, "sound": "tense.mp3"}
        ]
    }"#;

    #[test]
    fn parses_mixed_order_entries() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.steps.len(), 7);

        assert!(matches!(manifest.steps[0].kind(), StepKind::Start(_)));
        assert_eq!(manifest.steps[1].media_path(), Some("a.png"));
        assert!(manifest.steps[2].as_quiz().is_some());

        let choice = manifest.steps[3].as_choice().unwrap();
        assert_eq!(choice.choices[0].results.as_deref(), Some("c.png"));
        assert!((choice.choices[0].position.x - 0.5).abs() < 1e-9);

        let crossroad = manifest.steps[4].as_crossroad().unwrap();
        assert_eq!(crossroad.delay_ms, 1000);
        assert_eq!(crossroad.previous_text, "p");

        assert_eq!(
            crate::step::media_kind(manifest.steps[5].media_path().unwrap()),
            MediaKind::Video
        );
    }

    #[test]
    fn crossroad_delay_defaults_when_absent() {
        let json = r#"{"order": [
            {"type": "crossroad", "question": "q", "nextText": "n",
             "previousText": "p"}
        ]}"#;
        let manifest = Manifest::from_json(json).unwrap();
        assert_eq!(manifest.steps[0].as_crossroad().unwrap().delay_ms, 1000);
    }

    #[test]
    fn empty_order_is_fatal() {
        assert!(matches!(
            Manifest::from_json(r#"{"order": []}"#),
            Err(ManifestError::Empty)
        ));
    }

    #[test]
    fn sound_sections_resolve_open_end() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        let len = manifest.steps.len();
        assert_eq!(manifest.sounds.sound_for(0, len), Some("calm.mp3"));
        assert_eq!(manifest.sounds.sound_for(2, len), Some("calm.mp3"));
        assert_eq!(manifest.sounds.sound_for(3, len), Some("tense.mp3"));
        assert_eq!(manifest.sounds.sound_for(len - 1, len), Some("tense.mp3"));
        assert_eq!(manifest.sounds.sound_for(len, len), None);
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = Manifest::load("/nonexistent/order.json").await.unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }
}
