//! Tag name completions

use super::{matches_prefix, Candidates, Context};
use crate::types::{Completion, CompletionKind};

/// Complete the tag name under the cursor
pub(crate) fn complete(ctx: &Context<'_>, out: &mut Candidates) {
    let Some(tag) = ctx.state.tag_name() else {
        return;
    };

    if let Some(typed) = tag.strip_prefix('/') {
        out.extend(complete_closing_tag(ctx, typed));
    } else if let Some((type_name, member)) = tag.split_once('.') {
        out.start += type_name.len() + 1;
        out.extend(complete_property_elements(ctx, type_name, member));
    } else {
        out.extend(complete_types(ctx, tag));
    }
}

/// `</` closes the innermost open element
fn complete_closing_tag(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    let Some(parent) = ctx.state.parent_tag_name(0) else {
        return Vec::new();
    };
    if !matches_prefix(parent, typed) {
        return Vec::new();
    }

    vec![Completion::new(format!("/{}", parent), CompletionKind::Class)
        .with_description(format!("Close <{}>", parent))
        .with_suffix(">")]
}

/// `<Type.Member`: property elements of the parent, attached properties otherwise
fn complete_property_elements(ctx: &Context<'_>, type_name: &str, member: &str) -> Vec<Completion> {
    let Some(owner) = ctx.lookup_type(type_name) else {
        return Vec::new();
    };
    let same_type = ctx.state.parent_tag_name(0) == Some(type_name);

    owner
        .properties
        .iter()
        .filter(|p| !p.is_static && !p.name.is_empty())
        .filter(|p| if same_type { !p.is_attached } else { p.is_attached })
        .filter(|p| matches_prefix(&p.name, member))
        .map(|p| {
            let kind = if p.is_attached {
                CompletionKind::AttachedProperty
            } else {
                CompletionKind::Property
            };
            Completion::new(&p.name, kind)
                .with_description(format!("{}.{}", owner.full_name, p.name))
        })
        .collect()
}

/// Every type that may appear as an element here
fn complete_types(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    let context = ctx.xaml_context(None);
    ctx.visible_types()
        .filter(|(_, t)| !t.is_static && !t.is_enum)
        .filter(|(name, _)| matches_prefix(name, typed))
        .filter(|(_, t)| t.is_valid_for(&context))
        .map(|(name, t)| Completion::new(name, CompletionKind::Class).with_description(&t.full_name))
        .collect()
}
