//! Parser for markup extensions inside attribute values
//!
//! Handles `{Name Arg, Prop=Value, Prop2={Nested ...}}`. Nested extensions are
//! tracked on an explicit frame stack bounded by [`MAX_NESTING`], so separators
//! inside a nested extension never end an argument of the outer one.

/// Deepest extension nesting that is still parsed
pub const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    /// Not inside an open extension (not one at all, or already closed)
    None,
    /// Typing the extension name: `{Bind|`
    StartElement,
    /// Between arguments: `{Binding |`
    InsideElement,
    /// Typing an argument; positional or property name: `{Binding Pa|`
    StartAttribute,
    /// After `=`, nothing typed yet: `{Binding Mode=|`
    BeforeAttributeValue,
    /// Typing a property value: `{Binding Mode=One|`
    AttributeValue,
}

/// Result of parsing an attribute value up to the cursor
///
/// Describes the innermost extension still open at the end of the text.
/// Offsets are relative to the parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParseState<'a> {
    pub state: ExtensionState,
    pub element_name: Option<&'a str>,
    pub attribute_name: Option<&'a str>,
    pub attribute_value: Option<&'a str>,
    /// Arguments already completed in the innermost extension
    pub attributes_count: usize,
    pub current_value_start: Option<usize>,
    /// Nesting depth of the innermost open extension; 1 for the outermost
    pub depth: usize,
}

impl ExtensionParseState<'_> {
    fn none() -> Self {
        Self {
            state: ExtensionState::None,
            element_name: None,
            attribute_name: None,
            attribute_value: None,
            attributes_count: 0,
            current_value_start: None,
            depth: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    state: ExtensionState,
    name_start: usize,
    name_end: Option<usize>,
    attribute_start: usize,
    attribute_end: Option<usize>,
    value_start: usize,
    quoted: bool,
    attributes_count: usize,
    /// Positional argument ended by whitespace; `=` may still turn it into a
    /// property name (`{Binding Path = Name}`)
    last_positional: Option<(usize, usize)>,
}

impl Frame {
    fn new(name_start: usize) -> Self {
        Self {
            state: ExtensionState::StartElement,
            name_start,
            name_end: None,
            attribute_start: name_start,
            attribute_end: None,
            value_start: name_start,
            quoted: false,
            attributes_count: 0,
            last_positional: None,
        }
    }

    fn finish_argument(&mut self) {
        self.attributes_count += 1;
        self.state = ExtensionState::InsideElement;
    }
}

/// Parse an attribute value (starting with `{`) up to its end
pub fn parse(text: &str) -> ExtensionParseState<'_> {
    let bytes = text.as_bytes();
    let Some(open) = text.find(|c: char| !c.is_whitespace()) else {
        return ExtensionParseState::none();
    };
    if bytes[open] != b'{' {
        return ExtensionParseState::none();
    }

    let mut frames = vec![Frame::new(open + 1)];

    for (i, &c) in bytes.iter().enumerate().skip(open + 1) {
        let Some(frame) = frames.last_mut() else {
            // The outermost extension is closed; trailing text is not ours
            break;
        };

        let mut push_nested = false;
        let mut close = false;

        match frame.state {
            ExtensionState::None => break,
            ExtensionState::StartElement => match c {
                b'}' => close = true,
                b',' => {
                    frame.name_end = Some(i);
                    frame.state = ExtensionState::InsideElement;
                }
                c if c.is_ascii_whitespace() => {
                    frame.name_end = Some(i);
                    frame.state = ExtensionState::InsideElement;
                }
                _ => {}
            },
            ExtensionState::InsideElement => match c {
                b'}' => close = true,
                b'{' => {
                    frame.last_positional = None;
                    push_nested = true;
                }
                b'=' => {
                    if let Some((start, end)) = frame.last_positional.take() {
                        frame.attribute_start = start;
                        frame.attribute_end = Some(end);
                        frame.attributes_count -= 1;
                        frame.value_start = i + 1;
                        frame.state = ExtensionState::BeforeAttributeValue;
                    }
                }
                b',' => frame.last_positional = None,
                c if c.is_ascii_whitespace() => {}
                _ => {
                    frame.attribute_start = i;
                    frame.attribute_end = None;
                    frame.last_positional = None;
                    frame.state = ExtensionState::StartAttribute;
                }
            },
            ExtensionState::StartAttribute => match c {
                b'=' => {
                    frame.attribute_end = Some(i);
                    frame.value_start = i + 1;
                    frame.state = ExtensionState::BeforeAttributeValue;
                }
                b',' => frame.finish_argument(),
                b'}' => {
                    frame.attributes_count += 1;
                    close = true;
                }
                c if c.is_ascii_whitespace() => {
                    frame.last_positional = Some((frame.attribute_start, i));
                    frame.finish_argument();
                }
                _ => {}
            },
            ExtensionState::BeforeAttributeValue => match c {
                b'{' => push_nested = true,
                b'\'' => {
                    frame.quoted = true;
                    frame.value_start = i + 1;
                    frame.state = ExtensionState::AttributeValue;
                }
                b',' => frame.finish_argument(),
                b'}' => {
                    frame.attributes_count += 1;
                    close = true;
                }
                c if c.is_ascii_whitespace() => frame.value_start = i + 1,
                _ => {
                    frame.value_start = i;
                    frame.state = ExtensionState::AttributeValue;
                }
            },
            ExtensionState::AttributeValue => {
                if frame.quoted {
                    if c == b'\'' {
                        frame.quoted = false;
                    }
                } else {
                    match c {
                        b',' => frame.finish_argument(),
                        b'}' => {
                            frame.attributes_count += 1;
                            close = true;
                        }
                        _ => {}
                    }
                }
            }
        }

        if push_nested {
            if frames.len() >= MAX_NESTING {
                tracing::trace!("markup extension nesting limit reached at {}", i);
                return ExtensionParseState::none();
            }
            frames.push(Frame::new(i + 1));
        } else if close {
            frames.pop();
            if let Some(parent) = frames.last_mut() {
                // A nested extension is one complete argument of its parent
                parent.last_positional = None;
                parent.finish_argument();
            }
        }
    }

    let depth = frames.len();
    let Some(frame) = frames.pop() else {
        return ExtensionParseState::none();
    };

    let end = text.len();
    let element_name = &text[frame.name_start..frame.name_end.unwrap_or(end)];
    let (attribute_name, attribute_value, current_value_start) = match frame.state {
        ExtensionState::StartElement => (None, None, Some(frame.name_start)),
        ExtensionState::StartAttribute => (
            Some(&text[frame.attribute_start..end]),
            None,
            Some(frame.attribute_start),
        ),
        ExtensionState::BeforeAttributeValue | ExtensionState::AttributeValue => (
            frame
                .attribute_end
                .map(|attribute_end| text[frame.attribute_start..attribute_end].trim()),
            Some(&text[frame.value_start..end]),
            Some(frame.value_start),
        ),
        ExtensionState::InsideElement | ExtensionState::None => (None, None, None),
    };

    ExtensionParseState {
        state: frame.state,
        element_name: Some(element_name),
        attribute_name,
        attribute_value,
        attributes_count: frame.attributes_count,
        current_value_start,
        depth,
    }
}
