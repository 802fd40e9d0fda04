//! Character-level XML state machine
//!
//! Recovers "where the cursor is" in a partially typed, possibly invalid
//! document: the tag being written, the attribute under the cursor and the
//! chain of open ancestors. Parsing never fails; unterminated constructs are
//! treated as still open.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

/// Compiled attribute lookups, keyed by attribute name pattern
static ATTRIBUTE_REGEXES: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Patterns include the document's xaml prefix; bound the cache all the same
const MAX_CACHED_REGEXES: usize = 64;

/// Where the scanner is after the last consumed character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Element content, outside any tag
    None,
    InsideComment,
    InsideCdata,
    /// Typing the tag name: `<Tag|`
    StartElement,
    /// Inside a tag, between attributes: `<Tag |`
    InsideElement,
    /// Typing an attribute name: `<Tag Attr|`
    StartAttribute,
    /// After the attribute name, before the opening quote: `<Tag Attr=|`
    BeforeAttributeValue,
    /// Inside a quoted value: `<Tag Attr="val|`
    AttributeValue,
    /// Right after the closing quote: `<Tag Attr="val"|`
    AfterAttributeValue,
}

#[derive(Debug, Clone, Copy)]
struct OpenTag {
    /// Offset of `<`
    start: usize,
    /// Offset of `>`
    end: usize,
    name_start: usize,
    name_end: usize,
}

/// Parser state at some position of a document
///
/// Cheap to clone. Nothing public mutates a snapshot; scanning further always
/// derives a new one.
#[derive(Debug, Clone)]
pub struct ParseSnapshot<'a> {
    text: &'a str,
    pos: usize,
    state: ParserState,
    tag_start: usize,
    element_name_start: usize,
    element_name_end: Option<usize>,
    attribute_name_start: usize,
    attribute_name_end: Option<usize>,
    attribute_value_start: usize,
    quote: u8,
    seen_equals: bool,
    open_tags: Vec<OpenTag>,
}

/// Parse `text[scan_start..cursor]`
///
/// Offsets are byte offsets into `text`; both bounds are clamped to the text
/// and to character boundaries.
pub fn parse(text: &str, scan_start: usize, cursor: usize) -> ParseSnapshot<'_> {
    let end = floor_char_boundary(text, cursor);
    let start = floor_char_boundary(text, scan_start.min(end));
    let mut snapshot = ParseSnapshot::new(text, start);
    while snapshot.pos < end {
        snapshot.step();
    }
    snapshot
}

/// Offset of the last `<` before `cursor`, or 0
pub fn last_tag_start(text: &str, cursor: usize) -> usize {
    let end = floor_char_boundary(text, cursor);
    text[..end].rfind('<').unwrap_or(0)
}

pub(crate) fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

pub(crate) fn is_name_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'.' | b':') || c >= 0x80
}

impl<'a> ParseSnapshot<'a> {
    fn new(text: &'a str, start: usize) -> Self {
        Self {
            text,
            pos: start,
            state: ParserState::None,
            tag_start: 0,
            element_name_start: 0,
            element_name_end: None,
            attribute_name_start: 0,
            attribute_name_end: None,
            attribute_value_start: 0,
            quote: b'"',
            seen_equals: false,
            open_tags: Vec::new(),
        }
    }

    /// Consume one byte. Structural characters are all ASCII, so walking bytes
    /// never misreads a multi-byte character.
    fn step(&mut self) {
        let bytes = self.text.as_bytes();
        let i = self.pos;
        let c = bytes[i];
        self.pos += 1;

        match self.state {
            ParserState::InsideComment => {
                if i >= self.tag_start + 6 && self.ends_with_at(i, b"-->") {
                    self.state = ParserState::None;
                }
            }
            ParserState::InsideCdata => {
                if i >= self.tag_start + 11 && self.ends_with_at(i, b"]]>") {
                    self.state = ParserState::None;
                }
            }
            ParserState::None => {
                if c == b'<' {
                    self.begin_tag(i);
                }
            }
            ParserState::StartElement => {
                if i == self.tag_start + 3 && self.ends_with_at(i, b"<!--") {
                    self.state = ParserState::InsideComment;
                    return;
                }
                if i == self.tag_start + 8 && self.ends_with_at(i, b"<![CDATA[") {
                    self.state = ParserState::InsideCdata;
                    return;
                }
                match c {
                    b'<' => self.begin_tag(i),
                    b'>' => {
                        self.element_name_end = Some(i);
                        self.finish_tag(i);
                    }
                    // A leading slash belongs to a closing tag's name
                    b'/' if i > self.element_name_start => {
                        self.element_name_end = Some(i);
                        self.state = ParserState::InsideElement;
                    }
                    c if c.is_ascii_whitespace() => {
                        self.element_name_end = Some(i);
                        self.state = ParserState::InsideElement;
                    }
                    _ => {}
                }
            }
            ParserState::InsideElement => match c {
                b'>' => self.finish_tag(i),
                b'<' => self.begin_tag(i),
                b'/' => {}
                c if c.is_ascii_whitespace() => {}
                _ => self.begin_attribute(i),
            },
            ParserState::StartAttribute => match c {
                b'=' => {
                    self.attribute_name_end = Some(i);
                    self.seen_equals = true;
                    self.state = ParserState::BeforeAttributeValue;
                }
                b'>' => self.finish_tag(i),
                b'<' => self.begin_tag(i),
                b'/' => {
                    self.attribute_name_end = Some(i);
                    self.state = ParserState::InsideElement;
                }
                c if c.is_ascii_whitespace() => {
                    self.attribute_name_end = Some(i);
                    self.state = ParserState::BeforeAttributeValue;
                }
                _ => {}
            },
            ParserState::BeforeAttributeValue => match c {
                b'"' | b'\'' => {
                    self.quote = c;
                    self.attribute_value_start = i + 1;
                    self.state = ParserState::AttributeValue;
                }
                b'=' => self.seen_equals = true,
                b'>' => self.finish_tag(i),
                b'<' => self.begin_tag(i),
                b'/' => self.state = ParserState::InsideElement,
                c if c.is_ascii_whitespace() => {}
                // `<Tag Flag Other`: the previous attribute had no value
                _ if !self.seen_equals => self.begin_attribute(i),
                _ => {}
            },
            ParserState::AttributeValue => {
                if c == self.quote {
                    self.state = ParserState::AfterAttributeValue;
                }
            }
            ParserState::AfterAttributeValue => match c {
                b'>' => self.finish_tag(i),
                b'<' => self.begin_tag(i),
                b'/' => self.state = ParserState::InsideElement,
                c if c.is_ascii_whitespace() => self.state = ParserState::InsideElement,
                _ => self.begin_attribute(i),
            },
        }
    }

    fn ends_with_at(&self, i: usize, pattern: &[u8]) -> bool {
        let end = i + 1;
        end >= pattern.len() && &self.text.as_bytes()[end - pattern.len()..end] == pattern
    }

    fn begin_tag(&mut self, i: usize) {
        self.state = ParserState::StartElement;
        self.tag_start = i;
        self.element_name_start = i + 1;
        self.element_name_end = None;
        self.attribute_name_end = None;
        self.seen_equals = false;
    }

    fn begin_attribute(&mut self, i: usize) {
        self.state = ParserState::StartAttribute;
        self.attribute_name_start = i;
        self.attribute_name_end = None;
        self.seen_equals = false;
    }

    /// Handle the `>` at `i` that terminates the current tag
    fn finish_tag(&mut self, i: usize) {
        self.state = ParserState::None;
        let name_end = self.element_name_end.unwrap_or(i);
        let text = self.text;
        let name = &text[self.element_name_start..name_end];

        if let Some(closing) = name.strip_prefix('/') {
            // Pop to the nearest matching open tag; unmatched closes are ignored
            if let Some(index) = self
                .open_tags
                .iter()
                .rposition(|t| &text[t.name_start..t.name_end] == closing)
            {
                self.open_tags.truncate(index);
            }
        } else if name.is_empty() || name.starts_with(['?', '!']) {
            // declarations and processing instructions never nest
        } else if text.as_bytes()[i - 1] == b'/' {
            // self-closing
        } else {
            self.open_tags.push(OpenTag {
                start: self.tag_start,
                end: i,
                name_start: self.element_name_start,
                name_end,
            });
        }
    }

    fn in_tag(&self) -> bool {
        !matches!(
            self.state,
            ParserState::None | ParserState::InsideComment | ParserState::InsideCdata
        )
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// The document this snapshot was parsed from
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Offset up to which the document has been consumed
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Offset of the `<` of the tag under the cursor
    pub fn tag_start(&self) -> Option<usize> {
        self.in_tag().then_some(self.tag_start)
    }

    /// Offset of the first character of the current tag name
    pub fn tag_name_start(&self) -> Option<usize> {
        self.in_tag().then_some(self.element_name_start)
    }

    /// Name of the current tag; closing tags keep their leading `/`
    pub fn tag_name(&self) -> Option<&'a str> {
        if !self.in_tag() {
            return None;
        }
        let end = self.element_name_end.unwrap_or(self.pos);
        Some(&self.text[self.element_name_start..end])
    }

    pub fn attribute_name(&self) -> Option<&'a str> {
        match self.state {
            ParserState::StartAttribute => {
                Some(&self.text[self.attribute_name_start..self.pos])
            }
            ParserState::BeforeAttributeValue
            | ParserState::AttributeValue
            | ParserState::AfterAttributeValue => {
                let end = self.attribute_name_end.unwrap_or(self.pos);
                Some(&self.text[self.attribute_name_start..end])
            }
            _ => None,
        }
    }

    /// Value typed so far, up to the cursor
    pub fn attribute_value(&self) -> Option<&'a str> {
        (self.state == ParserState::AttributeValue)
            .then(|| &self.text[self.attribute_value_start..self.pos])
    }

    /// Start of the token being typed; only defined while typing a tag name,
    /// an attribute name or an attribute value
    pub fn current_value_start(&self) -> Option<usize> {
        match self.state {
            ParserState::StartElement => Some(self.element_name_start),
            ParserState::StartAttribute => Some(self.attribute_name_start),
            ParserState::AttributeValue => Some(self.attribute_value_start),
            _ => None,
        }
    }

    /// Number of open ancestors of the cursor position
    pub fn nesting_level(&self) -> usize {
        self.open_tags.len()
    }

    fn open_tag(&self, level: usize) -> Option<&OpenTag> {
        let index = self.open_tags.len().checked_sub(level + 1)?;
        self.open_tags.get(index)
    }

    /// Name of the ancestor `level` steps up; level 0 is the innermost open tag
    pub fn parent_tag_name(&self, level: usize) -> Option<&'a str> {
        self.open_tag(level)
            .map(|t| &self.text[t.name_start..t.name_end])
    }

    /// Value of the first attribute whose name matches `attribute_pattern` (a
    /// regular expression) on an ancestor, searching `max_levels` ancestors
    /// starting at `start_level`
    pub fn find_parent_attribute_value(
        &self,
        attribute_pattern: &str,
        start_level: usize,
        max_levels: usize,
    ) -> Option<&'a str> {
        let regex = attribute_regex(attribute_pattern)?;
        (start_level..start_level.saturating_add(max_levels))
            .map_while(|level| self.open_tag(level))
            .find_map(|tag| capture_value(&regex, &self.text[tag.start..=tag.end]))
    }

    /// Value of a matching attribute already written in the current tag
    pub fn current_tag_attribute_value(&self, attribute_pattern: &str) -> Option<&'a str> {
        if !self.in_tag() {
            return None;
        }
        let regex = attribute_regex(attribute_pattern)?;
        capture_value(&regex, &self.text[self.tag_start..self.pos])
    }

    /// Continue scanning a copy of this snapshot up to the end tag matching
    /// the start tag under the cursor
    ///
    /// The returned snapshot sits right after the end tag's name, so its
    /// [`tag_name`](Self::tag_name) is `/Name`. Returns `None` for
    /// self-closing tags, when the document ends first, or when an ancestor
    /// closes before the element does.
    pub fn seek_closing_tag(&self) -> Option<ParseSnapshot<'a>> {
        if self.tag_name()?.starts_with('/') {
            return None;
        }
        let bytes = self.text.as_bytes();
        let base = self.open_tags.len();
        let mut scan = self.clone();
        let mut element_open = false;

        while scan.pos < bytes.len() {
            scan.step();

            if !element_open {
                if scan.state == ParserState::None {
                    if scan.open_tags.len() != base + 1 {
                        return None;
                    }
                    element_open = true;
                }
                continue;
            }

            if scan.open_tags.len() <= base {
                return None;
            }

            let at_closing_tag = scan.state == ParserState::StartElement
                && scan.pos == scan.element_name_start + 1
                && bytes[scan.element_name_start] == b'/';
            if at_closing_tag && scan.open_tags.len() == base + 1 {
                while scan.pos < bytes.len() && is_name_byte(bytes[scan.pos]) {
                    scan.step();
                }
                return Some(scan);
            }
        }

        None
    }
}

fn attribute_regex(attribute_pattern: &str) -> Option<Regex> {
    let mut cache = ATTRIBUTE_REGEXES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(attribute_pattern) {
        return Some(regex.clone());
    }

    let regex = Regex::new(&format!(
        r#"\s(?:{attribute_pattern})\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#
    ))
    .ok()?;
    if cache.len() >= MAX_CACHED_REGEXES {
        cache.clear();
    }
    cache.insert(attribute_pattern.to_string(), regex.clone());
    Some(regex)
}

fn capture_value<'t>(regex: &Regex, tag_text: &'t str) -> Option<&'t str> {
    let captures = regex.captures(tag_text)?;
    captures
        .name("dq")
        .or_else(|| captures.name("sq"))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(text: &str) -> ParseSnapshot<'_> {
        parse(text, 0, text.len())
    }

    #[test]
    fn test_empty_document() {
        let state = parse_all("");
        assert_eq!(state.state(), ParserState::None);
        assert_eq!(state.nesting_level(), 0);
        assert_eq!(state.tag_name(), None);
    }

    #[test]
    fn test_start_element() {
        let state = parse_all("<UserControl><Butt");
        assert_eq!(state.state(), ParserState::StartElement);
        assert_eq!(state.tag_name(), Some("Butt"));
        assert_eq!(state.current_value_start(), Some(14));
        assert_eq!(state.parent_tag_name(0), Some("UserControl"));
    }

    #[test]
    fn test_inside_element() {
        let state = parse_all("<Button ");
        assert_eq!(state.state(), ParserState::InsideElement);
        assert_eq!(state.tag_name(), Some("Button"));
        assert_eq!(state.current_value_start(), None);
    }

    #[test]
    fn test_start_attribute() {
        let state = parse_all("<Button Wid");
        assert_eq!(state.state(), ParserState::StartAttribute);
        assert_eq!(state.attribute_name(), Some("Wid"));
        assert_eq!(state.current_value_start(), Some(8));
    }

    #[test]
    fn test_before_attribute_value() {
        let state = parse_all("<Button Width=");
        assert_eq!(state.state(), ParserState::BeforeAttributeValue);
        assert_eq!(state.attribute_name(), Some("Width"));
    }

    #[test]
    fn test_attribute_value() {
        let state = parse_all("<Button Width=\"12");
        assert_eq!(state.state(), ParserState::AttributeValue);
        assert_eq!(state.attribute_name(), Some("Width"));
        assert_eq!(state.attribute_value(), Some("12"));
        assert_eq!(state.current_value_start(), Some(15));
    }

    #[test]
    fn test_attribute_value_single_quotes() {
        let state = parse_all("<Button Tag='a\"b");
        assert_eq!(state.state(), ParserState::AttributeValue);
        assert_eq!(state.attribute_value(), Some("a\"b"));
    }

    #[test]
    fn test_every_offset_inside_value() {
        let text = "<Tag attr=\"val\">x</Tag>";
        let value_start = text.find("val").unwrap();
        for cursor in value_start..=value_start + 3 {
            let state = parse(text, 0, cursor);
            assert_eq!(state.state(), ParserState::AttributeValue, "cursor {}", cursor);
            assert_eq!(state.attribute_name(), Some("attr"));
        }
    }

    #[test]
    fn test_after_attribute_value() {
        let state = parse_all("<Button Width=\"12\"");
        assert_eq!(state.state(), ParserState::AfterAttributeValue);

        let state = parse_all("<Button Width=\"12\" ");
        assert_eq!(state.state(), ParserState::InsideElement);
    }

    #[test]
    fn test_gt_inside_value_is_literal() {
        let state = parse_all("<Button Tag=\"a>b\" Wi");
        assert_eq!(state.state(), ParserState::StartAttribute);
        assert_eq!(state.attribute_name(), Some("Wi"));
    }

    #[test]
    fn test_nesting_and_closing() {
        let state = parse_all("<A><B><C/></B><");
        assert_eq!(state.nesting_level(), 1);
        assert_eq!(state.parent_tag_name(0), Some("A"));
        assert_eq!(state.parent_tag_name(1), None);
    }

    #[test]
    fn test_closing_tag_name_keeps_slash() {
        let state = parse_all("<A></");
        assert_eq!(state.state(), ParserState::StartElement);
        assert_eq!(state.tag_name(), Some("/"));
        assert_eq!(state.parent_tag_name(0), Some("A"));
    }

    #[test]
    fn test_unmatched_close_is_ignored() {
        let state = parse_all("<A></B><");
        assert_eq!(state.nesting_level(), 1);
        assert_eq!(state.parent_tag_name(0), Some("A"));
    }

    #[test]
    fn test_close_pops_unclosed_children() {
        let state = parse_all("<A><B><C></B><");
        assert_eq!(state.nesting_level(), 1);
        assert_eq!(state.parent_tag_name(0), Some("A"));
    }

    #[test]
    fn test_self_closing_with_attributes() {
        let state = parse_all("<A><B Width=\"1\" /><");
        assert_eq!(state.nesting_level(), 1);
    }

    #[test]
    fn test_comment_is_opaque() {
        let state = parse_all("<A><!-- <B> \"x -->");
        assert_eq!(state.state(), ParserState::None);
        assert_eq!(state.nesting_level(), 1);

        let state = parse_all("<A><!-- <B ");
        assert_eq!(state.state(), ParserState::InsideComment);
    }

    #[test]
    fn test_cdata_is_opaque() {
        let state = parse_all("<A><![CDATA[ <B> ]]><");
        assert_eq!(state.state(), ParserState::StartElement);
        assert_eq!(state.parent_tag_name(0), Some("A"));

        let state = parse_all("<A><![CDATA[ <B> ");
        assert_eq!(state.state(), ParserState::InsideCdata);
    }

    #[test]
    fn test_declaration_does_not_nest() {
        let state = parse_all("<?xml version=\"1.0\"?>\n<A><");
        assert_eq!(state.nesting_level(), 1);
        assert_eq!(state.parent_tag_name(0), Some("A"));
    }

    #[test]
    fn test_never_panics_on_garbage() {
        let inputs = [
            "<<<<", ">>>", "<a b=\"<", "</>", "<!--", "<![CDATA[", "<a/ b", "=\"'<>/",
            "<é a=\"ü", "<a b c d=e>",
        ];
        for input in inputs {
            for cursor in 0..=input.len() {
                let state = parse(input, 0, cursor);
                let _ = (state.tag_name(), state.attribute_name(), state.attribute_value());
            }
        }
    }

    #[test]
    fn test_cursor_inside_multibyte_char() {
        let text = "<Ä";
        let state = parse(text, 0, 2);
        assert_eq!(state.position(), 1);
        assert_eq!(state.tag_name(), Some(""));
    }

    #[test]
    fn test_new_tag_inside_unterminated_tag() {
        let state = parse_all("<A><B Width=\"1\" <C");
        assert_eq!(state.state(), ParserState::StartElement);
        assert_eq!(state.tag_name(), Some("C"));
        assert_eq!(state.parent_tag_name(0), Some("A"));
    }

    #[test]
    fn test_find_parent_attribute_value() {
        let text = "<UserControl x:DataType=\"vm:Main\"><Grid Tag=\"1\"><Button ";
        let state = parse_all(text);
        assert_eq!(
            state.find_parent_attribute_value("(x:)?DataType", 0, usize::MAX),
            Some("vm:Main")
        );
        assert_eq!(state.find_parent_attribute_value("Tag", 0, 1), Some("1"));
        assert_eq!(state.find_parent_attribute_value("(x:)?DataType", 0, 1), None);
        assert_eq!(state.find_parent_attribute_value("Missing", 0, usize::MAX), None);
    }

    #[test]
    fn test_find_parent_attribute_value_ignores_prefixed_names() {
        let state = parse_all("<A d:DataType=\"X\"><B ");
        assert_eq!(state.find_parent_attribute_value("(x:)?DataType", 0, 5), None);
    }

    #[test]
    fn test_invalid_pattern_yields_none() {
        let state = parse_all("<A b=\"c\"><D ");
        assert_eq!(state.find_parent_attribute_value("(", 0, 5), None);
    }

    #[test]
    fn test_attribute_regex_is_cached() {
        let pattern = "CachedOnce(Attr)?";
        let state = parse_all("<A CachedOnce=\"1\"><B ");
        assert_eq!(state.find_parent_attribute_value(pattern, 0, 5), Some("1"));
        let cache = ATTRIBUTE_REGEXES
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        assert!(cache.contains_key(pattern));
        assert!(cache.len() <= MAX_CACHED_REGEXES);
    }

    #[test]
    fn test_current_tag_attribute_value() {
        let state = parse_all("<Setter Property=\"Width\" Value=\"");
        assert_eq!(state.current_tag_attribute_value("Property"), Some("Width"));
        assert_eq!(state.current_tag_attribute_value("Value"), None);
    }

    #[test]
    fn test_scan_from_offset() {
        let text = "<A><B></B><C Wi";
        let start = last_tag_start(text, text.len());
        let state = parse(text, start, text.len());
        assert_eq!(state.state(), ParserState::StartAttribute);
        assert_eq!(state.tag_name(), Some("C"));
        assert_eq!(state.nesting_level(), 0);
    }

    #[test]
    fn test_seek_closing_tag() {
        let text = "<A><B x=\"1\"><B/><C></C></B></A>";
        let state = parse(text, 0, 5);
        assert_eq!(state.tag_name(), Some("B"));

        let closing = state.seek_closing_tag().unwrap();
        assert_eq!(closing.tag_name(), Some("/B"));
        assert_eq!(closing.tag_name_start(), Some(text.rfind("/B").unwrap()));

        // The snapshot it was cloned from is untouched
        assert_eq!(state.tag_name(), Some("B"));
        assert_eq!(state.position(), 5);
    }

    #[test]
    fn test_seek_closing_tag_self_closing() {
        let text = "<A><B/></A>";
        let state = parse(text, 0, 5);
        assert!(state.seek_closing_tag().is_none());
    }

    #[test]
    fn test_seek_closing_tag_missing() {
        let text = "<A><B><C></C>";
        let state = parse(text, 0, 5);
        assert!(state.seek_closing_tag().is_none());
    }

    #[test]
    fn test_seek_closing_tag_extra_open() {
        // <C> is never closed, so </A> closes B implicitly
        let text = "<A><B><C></A>";
        let state = parse(text, 0, 5);
        assert!(state.seek_closing_tag().is_none());
    }

    #[test]
    fn test_seek_closing_tag_from_scan_start() {
        let text = "<Root><Alpha></Alpha></Root>";
        let start = last_tag_start(text, 12);
        let state = parse(text, start, 12);
        let closing = state.seek_closing_tag().unwrap();
        assert_eq!(closing.tag_name(), Some("/Alpha"));
    }
}
