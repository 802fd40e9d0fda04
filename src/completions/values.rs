//! Attribute value completions

use super::attributes::{FORM_FACTORS, PLATFORMS};
use super::{
    binding, markup, matches_prefix, selector_type_name, unwrap_type_extension, Candidates,
    Context,
};
use crate::metadata::{MetadataProperty, MetadataType, BINDING_PATH_TYPE, SYSTEM_TYPE};
use crate::selector::{self, SelectorStatement};
use crate::types::{Completion, CompletionKind};
use regex::Regex;
use std::sync::LazyLock;

static SETTER_PROPERTY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sProperty\s*=\s*["']([^"']*)["']"#).unwrap());

static ELEMENT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s(?:[A-Za-z_][\w.-]*:)?Name\s*=\s*["']([^"'{}]+)["']"#).unwrap());

/// Pseudo-classes understood by every control
const PSEUDO_CLASSES: &[&str] = &[
    "checked",
    "disabled",
    "empty",
    "focus",
    "focus-visible",
    "focus-within",
    "indeterminate",
    "pointerover",
    "pressed",
    "selected",
    "unchecked",
];

/// Selector functions, completed with their opening parenthesis
const SELECTOR_FUNCTIONS: &[&str] = &["is", "not", "nth-child", "nth-last-child"];

/// Complete the value of the attribute under the cursor
pub(crate) fn complete(ctx: &Context<'_>, out: &mut Candidates) {
    let (Some(tag), Some(attribute), Some(value)) = (
        ctx.state.tag_name(),
        ctx.state.attribute_name(),
        ctx.state.attribute_value(),
    ) else {
        return;
    };
    let value_start = out.start;

    if attribute == "xmlns" || attribute.starts_with("xmlns:") {
        out.extend(complete_namespaces(ctx, value));
        return;
    }

    if let Some(prefix) = attribute.strip_suffix(":Class") {
        if ctx.types.namespace_for(prefix) == Some(ctx.config.namespaces.xaml.as_str()) {
            out.extend(complete_classes(ctx, value));
        }
        return;
    }

    let trimmed = value.trim_start();
    if trimmed.starts_with('{') {
        // `{}` escapes a literal brace
        if !trimmed.starts_with("{}") {
            let start = value_start + value.len() - trimmed.len();
            markup::complete(ctx, trimmed, start, out);
        }
        return;
    }

    if tag == "Setter" && matches!(attribute, "Property" | "Value") {
        complete_setter(ctx, attribute, value, value_start, out);
        return;
    }

    if matches!(tag, "On" | "OnPlatform" | "OnFormFactor") {
        complete_on_platform(ctx, tag, attribute, value, value_start, out);
        return;
    }

    if attribute == format!("{}:DataType", ctx.xaml_prefix()) {
        out.extend(complete_type_names(ctx, attribute, value));
        return;
    }

    match ctx.lookup_value_property(tag, attribute) {
        Some(property) => complete_property_value(ctx, attribute, property, value, value_start, out),
        None => tracing::trace!("no property {} on {}", attribute, tag),
    }
}

/// Values of `property`, typed so far as `typed` starting at `value_start`
pub(crate) fn complete_property_value(
    ctx: &Context<'_>,
    attribute: &str,
    property: &MetadataProperty,
    typed: &str,
    value_start: usize,
    out: &mut Candidates,
) {
    let type_name = property.type_name.as_deref().unwrap_or_default();

    if type_name == BINDING_PATH_TYPE {
        binding::complete(ctx, typed, value_start, out);
        return;
    }

    if let Some(property_type) = ctx.property_type(property).filter(|t| t.has_hint_values()) {
        complete_hint_values(ctx, attribute, property_type, typed, value_start, out);
        return;
    }

    if type_name == SYSTEM_TYPE {
        out.extend(complete_type_names(ctx, attribute, typed));
        return;
    }

    if attribute == "Selector" {
        complete_selector(ctx, typed, value_start, out);
    }
}

/// Hint values of `property_type`
///
/// Composite values complete their last space or comma separated token only.
/// In a `Selector`, a token containing `:` completes pseudo-classes from the
/// colon on.
fn complete_hint_values(
    ctx: &Context<'_>,
    attribute: &str,
    property_type: &MetadataType,
    typed: &str,
    value_start: usize,
    out: &mut Candidates,
) {
    let mut offset = 0;
    let mut pseudo_classes_only = false;

    if property_type.is_composite_value {
        offset = typed.rfind([' ', ',']).map_or(0, |i| i + 1);
        if attribute == "Selector" {
            if let Some(colon) = typed[offset..].rfind(':') {
                offset += colon;
                pseudo_classes_only = true;
            }
        }
    }

    let search = &typed[offset..];
    out.start = value_start + offset;

    let context = ctx.xaml_context(Some(attribute));
    out.extend(
        property_type
            .hint_values_for(&context)
            .into_iter()
            .filter(|v| !pseudo_classes_only || v.starts_with(':'))
            .filter(|v| matches_prefix(v, search))
            .map(|v| {
                let kind = hint_kind(property_type, &v);
                Completion::new(v, kind)
            }),
    );
}

fn hint_kind(property_type: &MetadataType, value: &str) -> CompletionKind {
    if value.starts_with(':') {
        CompletionKind::PseudoClass
    } else if !property_type.is_enum && property_type.has_static_get_properties {
        CompletionKind::StaticProperty
    } else {
        CompletionKind::Enum
    }
}

/// Type names; `TargetType` and `Selector` values are style targets
fn complete_type_names(ctx: &Context<'_>, attribute: &str, typed: &str) -> Vec<Completion> {
    let kind = if matches!(attribute, "TargetType" | "Selector") {
        CompletionKind::TargetTypeClass
    } else {
        CompletionKind::Class
    };

    ctx.visible_types()
        .filter(|(_, t)| !t.is_markup_extension)
        .filter(|(name, _)| matches_prefix(name, typed))
        .map(|(name, t)| Completion::new(name, kind).with_description(&t.full_name))
        .collect()
}

/// Declared namespace URIs plus the `using:` and `clr-namespace:` forms
fn complete_namespaces(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    let clr_typed = typed.starts_with("clr-namespace:");
    let mut candidates = vec!["using:".to_string(), "clr-namespace:".to_string()];

    for key in ctx.metadata.namespaces().keys() {
        match key.strip_prefix("clr-namespace:") {
            Some(clr) => {
                if clr_typed {
                    candidates.push(key.clone());
                }
                let namespace = clr.split(';').next().unwrap_or(clr);
                candidates.push(format!("using:{}", namespace));
            }
            None => candidates.push(key.clone()),
        }
    }

    candidates
        .into_iter()
        .filter(|c| matches_prefix(c, typed))
        // `using:` entries only once the scheme is typed
        .filter(|c| c == "using:" || !c.starts_with("using:") || typed.starts_with("using:"))
        .map(|c| Completion::new(c, CompletionKind::Namespace))
        .collect()
}

/// `x:Class`: full names of the types compiled into the current assembly
fn complete_classes(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    let Some(assembly) = ctx.assembly else {
        return Vec::new();
    };

    ctx.metadata
        .types()
        .iter()
        .filter(|t| t.assembly.as_deref() == Some(assembly))
        .filter(|t| matches_prefix(&t.full_name, typed))
        .map(|t| Completion::new(&t.full_name, CompletionKind::Class))
        .collect()
}

/// `<Setter Property="..." Value="..."/>` inside a Style or ControlTheme
fn complete_setter(
    ctx: &Context<'_>,
    attribute: &str,
    value: &str,
    value_start: usize,
    out: &mut Candidates,
) {
    let target = setter_target_type(ctx);

    if attribute == "Property" {
        match value.rsplit_once('.') {
            Some((owner, member)) => {
                out.start = value_start + owner.len() + 1;
                let Some(owner) = ctx.lookup_type(owner) else {
                    return;
                };
                out.extend(
                    owner
                        .properties
                        .iter()
                        .filter(|p| p.is_attached && p.has_setter && matches_prefix(&p.name, member))
                        .map(|p| Completion::new(&p.name, CompletionKind::AttachedProperty)),
                );
            }
            None => {
                let Some(target) = target else {
                    return;
                };
                out.extend(
                    target
                        .properties
                        .iter()
                        .filter(|p| p.has_setter && !p.is_static && !p.is_attached)
                        .filter(|p| !p.name.is_empty() && matches_prefix(&p.name, value))
                        .map(|p| {
                            Completion::new(&p.name, CompletionKind::Property)
                                .with_description(format!("{}.{}", target.full_name, p.name))
                        }),
                );
            }
        }
        return;
    }

    let Some(property_name) = setter_property_name(ctx) else {
        return;
    };
    let property = match property_name.rsplit_once('.') {
        Some((owner, member)) => ctx.lookup_type(owner).and_then(|t| t.property(member)),
        None => target.and_then(|t| t.property(property_name)),
    };
    if let Some(property) = property {
        complete_property_value(ctx, attribute, property, value, value_start, out);
    }
}

/// `Property` of the current Setter, written before or after the cursor
fn setter_property_name<'a>(ctx: &Context<'a>) -> Option<&'a str> {
    if let Some(name) = ctx.state.current_tag_attribute_value("Property") {
        return Some(name);
    }
    let text = ctx.text;
    let rest = &text[ctx.cursor..];
    let rest = &rest[..rest.find(['<', '>']).unwrap_or(rest.len())];
    let captures = SETTER_PROPERTY_REGEX.captures(rest)?;
    captures.get(1).map(|m| m.as_str())
}

/// Type styled by the enclosing ControlTheme or Style
fn setter_target_type<'a>(ctx: &Context<'a>) -> Option<&'a MetadataType> {
    for level in 0..ctx.state.nesting_level() {
        let resolved = match ctx.state.parent_tag_name(level) {
            Some("ControlTheme") => ctx
                .state
                .find_parent_attribute_value("TargetType", level, 1)
                .and_then(|v| ctx.lookup_type(unwrap_type_extension(v))),
            Some("Style") => ctx
                .state
                .find_parent_attribute_value("Selector", level, 1)
                .and_then(|v| selector::parse(v).type_name)
                .and_then(|name| ctx.lookup_type(&selector_type_name(name))),
            _ => None,
        };
        if resolved.is_some() {
            return resolved;
        }
    }
    ctx.lookup_type(&ctx.config.completion.default_setter_target)
}

/// `On`, `OnPlatform` and `OnFormFactor` values
fn complete_on_platform(
    ctx: &Context<'_>,
    tag: &str,
    attribute: &str,
    value: &str,
    value_start: usize,
    out: &mut Candidates,
) {
    if tag == "On" && attribute == "Options" {
        let literals: &[&str] = if ctx.state.parent_tag_name(0) == Some("OnFormFactor") {
            &FORM_FACTORS
        } else {
            &PLATFORMS
        };
        let offset = value.rfind([' ', ',']).map_or(0, |i| i + 1);
        out.start = value_start + offset;
        out.extend(
            literals
                .iter()
                .filter(|l| matches_prefix(l, &value[offset..]))
                .map(|l| Completion::new(*l, CompletionKind::Enum)),
        );
        return;
    }
    if tag == "On" && attribute != "Content" {
        return;
    }

    // `On` sits one level deeper than its OnPlatform
    let level = if tag == "On" { 1 } else { 0 };
    if let Some(property) = wrapped_property(ctx, level) {
        complete_property_value(ctx, attribute, property, value, value_start, out);
    }
}

/// Property an OnPlatform at `level` provides the value of: the property
/// element it sits in, or the content property of its parent element
fn wrapped_property<'a>(ctx: &Context<'a>, level: usize) -> Option<&'a MetadataProperty> {
    let parent = ctx.state.parent_tag_name(level)?;
    match parent.split_once('.') {
        Some((owner, member)) => ctx.lookup_type(owner)?.property(member),
        None => ctx.lookup_type(parent)?.content_property(),
    }
}

/// Selector completions driven by the selector tokenizer
fn complete_selector(ctx: &Context<'_>, typed: &str, value_start: usize, out: &mut Candidates) {
    let parsed = selector::parse(typed);
    let token = parsed.token(typed);
    out.start = value_start + parsed.token_start;

    match parsed.statement {
        SelectorStatement::Start | SelectorStatement::TypeName | SelectorStatement::Traversal => {
            let search = selector_type_name(token);
            out.extend(
                ctx.visible_types()
                    .filter(|(_, t)| t.is_avalonia_object_type)
                    .filter(|(name, _)| matches_prefix(name, &search))
                    .map(|(name, t)| {
                        Completion::new(name.replace(':', "|"), CompletionKind::TargetTypeClass)
                            .with_description(&t.full_name)
                    }),
            );
        }
        SelectorStatement::Colon => {
            out.extend(
                PSEUDO_CLASSES
                    .iter()
                    .filter(|p| matches_prefix(p, token))
                    .map(|p| Completion::new(*p, CompletionKind::PseudoClass)),
            );
            out.extend(
                SELECTOR_FUNCTIONS
                    .iter()
                    .filter(|f| matches_prefix(f, token))
                    .map(|f| Completion::new(*f, CompletionKind::PseudoClass).with_suffix("(")),
            );
        }
        SelectorStatement::Property => {
            let Some(target) = selector_target(ctx, parsed.type_name) else {
                return;
            };
            out.extend(
                target
                    .properties
                    .iter()
                    .filter(|p| p.has_getter && !p.is_static && !p.is_attached)
                    .filter(|p| !p.name.is_empty() && matches_prefix(&p.name, token))
                    .map(|p| Completion::new(&p.name, CompletionKind::Property)),
            );
        }
        SelectorStatement::Value => {
            let property = parsed
                .property_name
                .and_then(|name| selector_target(ctx, parsed.type_name)?.property(name.trim()));
            if let Some(property_type) = property.and_then(|p| ctx.property_type(p)) {
                let context = ctx.xaml_context(Some("Selector"));
                out.extend(
                    property_type
                        .hint_values_for(&context)
                        .into_iter()
                        .filter(|v| matches_prefix(v, token))
                        .map(|v| Completion::new(v, CompletionKind::Enum)),
                );
            }
        }
        SelectorStatement::Name => {
            out.extend(
                ELEMENT_NAME_REGEX
                    .captures_iter(ctx.text)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .filter(|name| matches_prefix(name, token))
                    .map(|name| Completion::new(name, CompletionKind::Name)),
            );
        }
        SelectorStatement::Class | SelectorStatement::Template | SelectorStatement::Middle => {}
    }
}

fn selector_target<'a>(ctx: &Context<'a>, type_name: Option<&str>) -> Option<&'a MetadataType> {
    match type_name {
        Some(name) => ctx.lookup_type(&selector_type_name(name)),
        None => ctx.lookup_type(&ctx.config.completion.default_setter_target),
    }
}
