//! Attribute name completions

use super::{matches_prefix, Candidates, Context};
use crate::metadata::MetadataType;
use crate::types::{Completion, CompletionKind};
use crate::xml_parser::{is_name_byte, ParserState};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ATTRIBUTE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s([^\s="'<>/]+)\s*=\s*["']"#).unwrap());

/// Platforms accepted by `OnPlatform` and `On Options`
pub(crate) const PLATFORMS: [&str; 6] = ["Windows", "macOS", "Linux", "Android", "iOS", "Browser"];

/// Form factors accepted by `OnFormFactor` and `On Options`
pub(crate) const FORM_FACTORS: [&str; 2] = ["Desktop", "Mobile"];

/// A XAML language directive and when it may be written
struct Directive {
    name: &'static str,
    description: &'static str,
    applies: fn(&Context<'_>, Option<&MetadataType>) -> bool,
}

const DIRECTIVES: &[Directive] = &[
    Directive {
        name: "Class",
        description: "Code-behind class of the root element",
        applies: |ctx, _| ctx.state.nesting_level() == 0,
    },
    Directive {
        name: "Name",
        description: "Name of the element in its name scope",
        applies: |_, _| true,
    },
    Directive {
        name: "Key",
        description: "Key of the element in a resource dictionary",
        applies: |_, _| true,
    },
    Directive {
        name: "DataType",
        description: "Type of the data context for compiled bindings",
        applies: |_, _| true,
    },
    Directive {
        name: "TypeArguments",
        description: "Type arguments of a generic type",
        applies: |_, ty| ty.is_some_and(|t| t.is_generic),
    },
];

/// Complete an attribute name, or offer every attribute between attributes
pub(crate) fn complete(ctx: &Context<'_>, out: &mut Candidates) {
    let Some(tag) = ctx.state.tag_name() else {
        return;
    };
    if tag.is_empty() || tag.starts_with(['/', '?', '!']) {
        return;
    }

    let typed = if ctx.state.state() == ParserState::InsideElement {
        out.start = ctx.cursor;
        ""
    } else {
        ctx.state.attribute_name().unwrap_or("")
    };
    let suffix = !equals_follows(ctx.text, ctx.cursor);

    if let Some((owner, member)) = typed.rsplit_once('.') {
        out.start += owner.len() + 1;
        if let Some(owner) = ctx.lookup_type(owner) {
            out.extend(complete_attached_members(owner, member, suffix));
        }
        return;
    }

    let existing = existing_attributes(ctx);
    let tag_type = ctx.lookup_type(tag);

    if let Some(tag_type) = tag_type {
        out.extend(
            complete_members(tag_type, typed, suffix)
                .into_iter()
                .filter(|c| !existing.contains(c.display_text.as_str())),
        );
    }

    out.extend(
        complete_directives(ctx, tag_type, typed, suffix)
            .into_iter()
            .filter(|c| !existing.contains(c.display_text.as_str())),
    );
    out.extend(complete_platform_attributes(tag, typed, suffix));
    out.extend(complete_attached_owners(ctx, typed));
}

/// Attribute completion: `Name=""` with the caret between the quotes
fn attribute(name: &str, kind: CompletionKind, suffix: bool) -> Completion {
    let completion = Completion::new(name, kind);
    if suffix {
        completion
            .with_suffix("=\"\"")
            .with_cursor_offset(name.len() + 2)
    } else {
        completion
    }
}

/// Settable instance properties and events of the tag's type
fn complete_members(tag_type: &MetadataType, typed: &str, suffix: bool) -> Vec<Completion> {
    let properties = tag_type
        .properties
        .iter()
        .filter(|p| p.has_setter && !p.is_static && !p.is_attached && !p.name.is_empty())
        .filter(|p| matches_prefix(&p.name, typed))
        .map(|p| {
            attribute(&p.name, CompletionKind::Property, suffix)
                .with_description(format!("{}.{}", tag_type.full_name, p.name))
        });

    let events = tag_type
        .events
        .iter()
        .filter(|e| !e.is_attached && matches_prefix(&e.name, typed))
        .map(|e| attribute(&e.name, CompletionKind::Event, suffix));

    properties.chain(events).collect()
}

/// `Owner.Member` attributes
fn complete_attached_members(owner: &MetadataType, member: &str, suffix: bool) -> Vec<Completion> {
    let properties = owner
        .properties
        .iter()
        .filter(|p| p.is_attached && p.has_setter && matches_prefix(&p.name, member))
        .map(|p| attribute(&p.name, CompletionKind::AttachedProperty, suffix));

    let events = owner
        .events
        .iter()
        .filter(|e| e.is_attached && matches_prefix(&e.name, member))
        .map(|e| attribute(&e.name, CompletionKind::AttachedEvent, suffix));

    properties.chain(events).collect()
}

fn complete_directives(
    ctx: &Context<'_>,
    tag_type: Option<&MetadataType>,
    typed: &str,
    suffix: bool,
) -> Vec<Completion> {
    let prefix = ctx.xaml_prefix();
    DIRECTIVES
        .iter()
        .filter(|d| (d.applies)(ctx, tag_type))
        .map(|d| (d, format!("{}:{}", prefix, d.name)))
        .filter(|(d, full)| {
            matches_prefix(full, typed) || (!typed.contains(':') && matches_prefix(d.name, typed))
        })
        .map(|(d, full)| attribute(&full, CompletionKind::Directive, suffix).with_description(d.description))
        .collect()
}

/// Platform names on `OnPlatform`, form factors on `OnFormFactor`
fn complete_platform_attributes(tag: &str, typed: &str, suffix: bool) -> Vec<Completion> {
    let names: &[&str] = match tag {
        "OnPlatform" => &PLATFORMS,
        "OnFormFactor" => &FORM_FACTORS,
        _ => return Vec::new(),
    };

    std::iter::once("Default")
        .chain(names.iter().copied())
        .filter(|name| matches_prefix(name, typed))
        .map(|name| attribute(name, CompletionKind::Property, suffix))
        .collect()
}

/// `Grid.` style suggestions for types exposing attached members
fn complete_attached_owners(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    ctx.visible_types()
        .filter(|(name, t)| t.has_attached_members() && matches_prefix(name, typed))
        .map(|(name, t)| {
            Completion::new(name, CompletionKind::Class)
                .with_description(&t.full_name)
                .with_suffix(".")
        })
        .collect()
}

/// Whether the attribute under the cursor is already followed by `=`
fn equals_follows(text: &str, cursor: usize) -> bool {
    let bytes = text.as_bytes();
    let mut i = cursor;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    bytes.get(i) == Some(&b'=')
}

/// Names of the attributes already written in the current tag
fn existing_attributes<'a>(ctx: &Context<'a>) -> HashSet<&'a str> {
    let Some(tag_start) = ctx.state.tag_start() else {
        return HashSet::new();
    };
    let text = ctx.text;
    let end = text[ctx.cursor..]
        .find(['<', '>'])
        .map_or(text.len(), |offset| ctx.cursor + offset);

    ATTRIBUTE_NAME_REGEX
        .captures_iter(&text[tag_start..end])
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}
