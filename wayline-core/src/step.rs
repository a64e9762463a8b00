//! Step model for the presentation sequence.
//!
//! A presentation is an ordered list of steps: plain media references
//! interleaved with typed interactive screens (quiz, choice, crossroad,
//! summary, start gate). The manifest format mixes bare path strings
//! with `type`-tagged objects; here every entry is one closed `Step`
//! union so dispatch is exhaustive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a step.
///
/// Media steps are identified by their content path, interactive steps by
/// a synthetic id minted at manifest load. Identities survive sequence
/// splices, which is what makes them usable as answer-store keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    /// Identity of a media step: its content path.
    pub fn media(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Fresh synthetic identity for an interactive step.
    pub fn synthetic() -> Self {
        Self(format!("node:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad media category, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Unknown,
}

/// Classify a media path by extension.
pub fn media_kind(path: &str) -> MediaKind {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => MediaKind::Image,
        "mp4" | "avi" | "mov" | "wmv" | "webm" => MediaKind::Video,
        "mp3" | "wav" | "ogg" | "m4a" => MediaKind::Audio,
        _ => MediaKind::Unknown,
    }
}

/// Fractional position within the square viewport region (0..1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Fractional size relative to the square viewport region (0..1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One selectable option on a choice screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub image: String,
    pub position: Position,
    pub size: Size,
    /// Media path spliced in after the choice when this option is picked.
    #[serde(default)]
    pub results: Option<String>,
}

/// Multiple-choice quiz screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
}

/// Branching screen: a background with positioned selectable images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub background: String,
    pub choices: Vec<ChoiceOption>,
}

impl Choice {
    /// Look up an option by id.
    pub fn option(&self, id: &str) -> Option<&ChoiceOption> {
        self.choices.iter().find(|c| c.id == id)
    }

    /// True if `path` is the `results` media of any option.
    pub fn is_result_media(&self, path: &str) -> bool {
        self.choices
            .iter()
            .any(|c| c.results.as_deref() == Some(path))
    }
}

/// Timed decision gate: continue forward, or return to the last choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crossroad {
    pub question: String,
    pub next_text: String,
    pub previous_text: String,
    /// The gate only becomes interactable this long after the step is
    /// reached.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    1000
}

/// Terminal aggregation view over recorded choice answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceSummary {
    pub title: String,
    pub description: String,
}

/// Entry gate shown before navigation begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Start {
    pub background: String,
    pub title: String,
    pub subtitle: String,
    pub button_text: String,
}

/// Payload of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Media(String),
    Quiz(Quiz),
    Choice(Choice),
    Crossroad(Crossroad),
    ChoiceSummary(ChoiceSummary),
    Start(Start),
}

/// One element of the presentation sequence.
///
/// Steps are immutable once created; only the sequence holding them is
/// mutated (by branch splices).
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    id: StepId,
    kind: StepKind,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        let id = match &kind {
            StepKind::Media(path) => StepId::media(path.clone()),
            _ => StepId::synthetic(),
        };
        Self { id, kind }
    }

    pub fn media(path: impl Into<String>) -> Self {
        Self::new(StepKind::Media(path.into()))
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Media path if this is a plain media step.
    pub fn media_path(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Media(path) => Some(path),
            _ => None,
        }
    }

    /// The single media identity shown full-screen when this step is
    /// current: the media path itself, or the background of a choice or
    /// start screen.
    pub fn primary_media(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Media(path) => Some(path),
            StepKind::Choice(choice) => Some(&choice.background),
            StepKind::Start(start) => Some(&start.background),
            _ => None,
        }
    }

    pub fn as_quiz(&self) -> Option<&Quiz> {
        match &self.kind {
            StepKind::Quiz(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&Choice> {
        match &self.kind {
            StepKind::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_crossroad(&self) -> Option<&Crossroad> {
        match &self.kind {
            StepKind::Crossroad(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_crossroad(&self) -> bool {
        matches!(self.kind, StepKind::Crossroad(_))
    }

    /// Every media identity this step can put on screen: the step's own
    /// media, or the backgrounds, option images and potential result
    /// media of an interactive step.
    pub fn reachable_media(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Media(path) => vec![path.as_str()],
            StepKind::Quiz(_) | StepKind::ChoiceSummary(_) => Vec::new(),
            StepKind::Choice(choice) => {
                let mut out = vec![choice.background.as_str()];
                for option in &choice.choices {
                    out.push(option.image.as_str());
                    if let Some(results) = &option.results {
                        out.push(results.as_str());
                    }
                }
                out
            }
            StepKind::Crossroad(_) => Vec::new(),
            StepKind::Start(start) => vec![start.background.as_str()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_by_extension() {
        assert_eq!(media_kind("a.png"), MediaKind::Image);
        assert_eq!(media_kind("dir/clip.WEBM"), MediaKind::Video);
        assert_eq!(media_kind("theme.mp3"), MediaKind::Audio);
        assert_eq!(media_kind("notes.txt"), MediaKind::Unknown);
        assert_eq!(media_kind("no_extension"), MediaKind::Unknown);
    }

    #[test]
    fn media_step_identity_is_path() {
        let step = Step::media("a.png");
        assert_eq!(step.id().as_str(), "a.png");
        assert_eq!(step.media_path(), Some("a.png"));
    }

    #[test]
    fn interactive_steps_get_distinct_ids() {
        let quiz = Quiz {
            question: "q".into(),
            options: vec!["a".into(), "b".into()],
        };
        let one = Step::new(StepKind::Quiz(quiz.clone()));
        let two = Step::new(StepKind::Quiz(quiz));
        assert_ne!(one.id(), two.id());
    }

    #[test]
    fn reachable_media_covers_choice_assets() {
        let choice = Choice {
            background: "bg.png".into(),
            choices: vec![ChoiceOption {
                id: "x".into(),
                image: "b.png".into(),
                position: Position { x: 0.5, y: 0.5 },
                size: Size {
                    width: 0.2,
                    height: 0.2,
                },
                results: Some("c.png".into()),
            }],
        };
        let step = Step::new(StepKind::Choice(choice));
        assert_eq!(step.reachable_media(), vec!["bg.png", "b.png", "c.png"]);
    }
}
