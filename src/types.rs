//! Core types for xaml-intellisense

use serde::{Deserialize, Serialize};

/// The kind of completion item
///
/// Drives both ranking (see [`CompletionKind::rank`]) and, on the editor side,
/// the icon shown next to the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionKind {
    Class,
    Property,
    AttachedProperty,
    StaticProperty,
    Namespace,
    MarkupExtension,
    Event,
    AttachedEvent,
    Enum,
    DataProperty,
    TargetTypeClass,
    Directive,
    PseudoClass,
    Name,
}

impl CompletionKind {
    /// Group order used when ranking; lower groups come first
    pub fn rank(self) -> u32 {
        match self {
            CompletionKind::MarkupExtension => 0,
            CompletionKind::Namespace => 1,
            CompletionKind::Property => 2,
            CompletionKind::AttachedProperty => 3,
            CompletionKind::StaticProperty => 4,
            CompletionKind::Event => 5,
            CompletionKind::AttachedEvent => 6,
            CompletionKind::Class => 7,
            CompletionKind::Enum => 8,
            other => 100 + other as u32,
        }
    }
}

/// A completion suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Text shown in the completion list
    pub display_text: String,
    /// Text replacing the range starting at [`CompletionSet::start_position`]
    pub insert_text: String,
    pub description: String,
    pub kind: CompletionKind,
    /// Caret position relative to the start of the inserted text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_cursor_offset: Option<usize>,
    /// Trailing part of `insert_text` that follows `display_text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl Completion {
    /// Create a completion whose insert text and description equal the display text
    pub fn new(text: impl Into<String>, kind: CompletionKind) -> Self {
        let text = text.into();
        Self {
            insert_text: text.clone(),
            description: text.clone(),
            display_text: text,
            kind,
            recommended_cursor_offset: None,
            suffix: None,
        }
    }

    /// Set custom insert text
    pub fn with_insert_text(mut self, text: impl Into<String>) -> Self {
        self.insert_text = text.into();
        self
    }

    /// Append a suffix to the insert text
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.insert_text.push_str(&suffix);
        self.suffix = Some(suffix);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set where the caret should land after insertion
    pub fn with_cursor_offset(mut self, offset: usize) -> Self {
        self.recommended_cursor_offset = Some(offset);
        self
    }
}

/// Ranked completions plus the offset replacement starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSet {
    pub start_position: usize,
    pub completions: Vec<Completion>,
}

/// One edit the editor has just applied to the buffer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
    pub old_position: usize,
    pub old_text: String,
    pub new_position: usize,
    pub new_text: String,
}

impl TextChange {
    /// An insertion of `text` at `position`
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self {
            old_position: position,
            old_text: String::new(),
            new_position: position,
            new_text: text.into(),
        }
    }

    /// `old` at `position` replaced by `new`
    pub fn replace(position: usize, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old_position: position,
            old_text: old.into(),
            new_position: position,
            new_text: new.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManipulationKind {
    Insert,
    Delete,
}

/// A primitive edit computed by the manipulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextManipulation {
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub kind: ManipulationKind,
}

impl TextManipulation {
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self {
            start: position,
            end: position,
            text: Some(text.into()),
            kind: ManipulationKind::Insert,
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            text: None,
            kind: ManipulationKind::Delete,
        }
    }

    /// Apply this manipulation to `text` in place
    pub fn apply(&self, text: &mut String) {
        match (&self.kind, &self.text) {
            (ManipulationKind::Insert, Some(insert)) => text.insert_str(self.start, insert),
            (ManipulationKind::Delete, _) => text.replace_range(self.start..self.end, ""),
            (ManipulationKind::Insert, None) => {}
        }
    }
}
