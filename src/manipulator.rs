//! Follow-up edits for a keystroke
//!
//! Given the document right after an edit, [`TextManipulator`] works out the
//! edits that keep the markup consistent:
//!
//! - renaming a start tag renames its end tag, as long as both names matched
//!   before the edit
//! - typing `/` inside an open start tag closes it as `/>`, removing an empty
//!   end tag that directly follows
//!
//! Only the text from the last `<` before the cursor is parsed.

use crate::types::{ManipulationKind, TextChange, TextManipulation};
use crate::xml_parser::{self, ParseSnapshot, ParserState};

/// Computes manipulations for one edit of `text`
///
/// `text` is the document after the edit and `position` the caret after it.
#[derive(Debug, Clone, Copy)]
pub struct TextManipulator<'a> {
    text: &'a str,
    position: usize,
}

/// Manipulations for `change`, sorted by descending start offset
pub fn compute(text: &str, cursor: usize, change: &TextChange) -> Vec<TextManipulation> {
    TextManipulator::new(text, cursor).manipulate(change)
}

impl<'a> TextManipulator<'a> {
    pub fn new(text: &'a str, position: usize) -> Self {
        Self {
            text,
            position: xml_parser::floor_char_boundary(text, position),
        }
    }

    /// Manipulations to apply, in order, after `change`
    ///
    /// Applying them in list order never invalidates a later offset.
    pub fn manipulate(&self, change: &TextChange) -> Vec<TextManipulation> {
        let mut edits = Vec::new();

        if change.new_text == "/" {
            edits.extend(self.auto_close(change.new_position));
        } else if is_name_edit(change) {
            edits.extend(self.sync_end_tag(change));
        }

        sort(&mut edits);
        if !edits.is_empty() {
            tracing::debug!("{} manipulation(s) for edit at {}", edits.len(), change.new_position);
        }
        edits
    }

    fn snapshot(&self, cursor: usize) -> ParseSnapshot<'a> {
        let start = xml_parser::last_tag_start(self.text, cursor);
        xml_parser::parse(self.text, start, cursor)
    }

    /// Mirror a start tag rename onto its end tag
    fn sync_end_tag(&self, change: &TextChange) -> Vec<TextManipulation> {
        let state = self.snapshot(self.position);
        if state.state() != ParserState::StartElement {
            return Vec::new();
        }
        let Some(name_start) = state.tag_name_start() else {
            return Vec::new();
        };

        let bytes = self.text.as_bytes();
        let mut name_end = self.position;
        while name_end < bytes.len() && xml_parser::is_name_byte(bytes[name_end]) {
            name_end += 1;
        }
        let name = &self.text[name_start..name_end];
        if name.is_empty() || name.starts_with(['/', '!', '?']) {
            return Vec::new();
        }

        // The edit must sit entirely within the current name
        let edit_start = change.new_position;
        let edit_end = edit_start + change.new_text.len();
        if edit_start < name_start
            || edit_end > name_end
            || !self
                .text
                .get(edit_start..)
                .is_some_and(|rest| rest.starts_with(change.new_text.as_str()))
        {
            return Vec::new();
        }

        let offset = edit_start - name_start;
        let previous = format!(
            "{}{}{}",
            &name[..offset],
            change.old_text,
            &name[offset + change.new_text.len()..]
        );

        let Some(closing) = state.seek_closing_tag() else {
            return Vec::new();
        };
        let (Some(closing_name), Some(closing_start)) = (closing.tag_name(), closing.tag_name_start())
        else {
            return Vec::new();
        };
        if closing_name.strip_prefix('/') != Some(previous.as_str()) {
            tracing::trace!("end tag {:?} not in sync with {:?}", closing_name, previous);
            return Vec::new();
        }

        // Skip the `/`
        let target = closing_start + 1 + offset;
        let mut edits = Vec::new();
        if !change.old_text.is_empty() {
            edits.push(TextManipulation::delete(target, target + change.old_text.len()));
        }
        if !change.new_text.is_empty() {
            edits.push(TextManipulation::insert(target, change.new_text.as_str()));
        }
        edits
    }

    /// Close a start tag after a typed `/` at `slash`
    fn auto_close(&self, slash: usize) -> Vec<TextManipulation> {
        if !self.text.get(slash..).is_some_and(|rest| rest.starts_with('/')) {
            return Vec::new();
        }

        let state = self.snapshot(slash);
        if !matches!(
            state.state(),
            ParserState::StartElement | ParserState::InsideElement | ParserState::AfterAttributeValue
        ) {
            return Vec::new();
        }
        let Some(name) = state.tag_name() else {
            return Vec::new();
        };
        if name.is_empty() || name.starts_with(['/', '!', '?']) {
            return Vec::new();
        }

        let bytes = self.text.as_bytes();
        let after = slash + 1;
        let mut next = after;
        while next < bytes.len() && matches!(bytes[next], b' ' | b'\t') {
            next += 1;
        }

        let mut edits = Vec::new();
        let follow = match bytes.get(next) {
            // Already `/>`
            Some(b'>') => next + 1,
            None | Some(b'\n' | b'\r' | b'<') => {
                edits.push(TextManipulation::insert(after, ">"));
                next
            }
            // Attributes follow the slash
            Some(_) => return Vec::new(),
        };

        if let Some(end) = empty_end_tag(self.text, follow, name) {
            edits.push(TextManipulation::delete(follow, end));
        }
        edits
    }
}

/// Whether the edit only touches name characters
fn is_name_edit(change: &TextChange) -> bool {
    let is_name = |s: &str| {
        s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    (!change.new_text.is_empty() || !change.old_text.is_empty())
        && is_name(&change.new_text)
        && is_name(&change.old_text)
}

/// End of `</name>` when it starts exactly at `start`
fn empty_end_tag(text: &str, start: usize, name: &str) -> Option<usize> {
    let rest = text.get(start..)?.strip_prefix("</")?.strip_prefix(name)?;
    let trimmed = rest.trim_start();
    trimmed.starts_with('>').then(|| text.len() - trimmed.len() + 1)
}

/// Descending start; a delete goes before an insert at the same offset
fn sort(edits: &mut [TextManipulation]) {
    edits.sort_by(|a, b| {
        b.start.cmp(&a.start).then_with(|| {
            let order = |kind: ManipulationKind| match kind {
                ManipulationKind::Delete => 0,
                ManipulationKind::Insert => 1,
            };
            order(a.kind).cmp(&order(b.kind))
        })
    });
}
