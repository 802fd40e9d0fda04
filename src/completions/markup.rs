//! Markup extension completions inside attribute values

use super::{binding, matches_prefix, values, Candidates, Context};
use crate::markup_extension::{self, ExtensionState};
use crate::metadata::{CtorArgument, MetadataType, BINDING_PATH_TYPE};
use crate::types::{Completion, CompletionKind};

/// Complete inside `{...}`; `value_start` is the offset of the value in the document
pub(crate) fn complete(ctx: &Context<'_>, value: &str, value_start: usize, out: &mut Candidates) {
    let ext = markup_extension::parse(value);
    let Some(name) = ext.element_name else {
        return;
    };
    let extension = ctx.lookup_markup_extension(name);

    match ext.state {
        ExtensionState::StartElement => {
            out.start = value_start + ext.current_value_start.unwrap_or(0);
            out.extend(complete_extension_names(ctx, name));
        }
        ExtensionState::InsideElement | ExtensionState::StartAttribute => {
            let argument = ext.attribute_name.unwrap_or("");
            out.start = match ext.current_value_start {
                Some(start) => value_start + start,
                None => ctx.cursor,
            };
            let Some(extension) = extension else {
                return;
            };

            if !argument.contains('.') {
                out.extend(complete_arguments(extension, argument));
            }

            // Positional arguments only before any named one
            if ext.attributes_count > 0 {
                return;
            }
            if has_binding_path(extension) {
                let start = out.start;
                binding::complete(ctx, argument, start, out);
            } else {
                complete_ctor_argument(ctx, extension, argument, out);
            }
        }
        ExtensionState::BeforeAttributeValue | ExtensionState::AttributeValue => {
            let (Some(extension), Some(argument)) = (extension, ext.attribute_name) else {
                return;
            };
            let Some(property) = extension.property(argument) else {
                return;
            };
            let typed = ext.attribute_value.unwrap_or("");
            let start = value_start + ext.current_value_start.unwrap_or(value.len());
            out.start = start;
            values::complete_property_value(ctx, argument, property, typed, start, out);
        }
        ExtensionState::None => {}
    }
}

/// Extension names, written without their `Extension` suffix
fn complete_extension_names(ctx: &Context<'_>, typed: &str) -> Vec<Completion> {
    ctx.visible_types()
        .filter(|(_, t)| t.is_markup_extension)
        .map(|(name, t)| (name.strip_suffix("Extension").unwrap_or(name), t))
        .filter(|(name, _)| !name.is_empty() && !name.ends_with(':'))
        .filter(|(name, _)| matches_prefix(name, typed))
        .map(|(name, t)| {
            Completion::new(name, CompletionKind::MarkupExtension).with_description(&t.full_name)
        })
        .collect()
}

/// `Prop=` for every settable property of the extension
fn complete_arguments(extension: &MetadataType, typed: &str) -> Vec<Completion> {
    extension
        .properties
        .iter()
        .filter(|p| p.has_setter && !p.is_static && !p.name.is_empty())
        .filter(|p| matches_prefix(&p.name, typed))
        .map(|p| Completion::new(&p.name, CompletionKind::Property).with_suffix("="))
        .collect()
}

fn has_binding_path(extension: &MetadataType) -> bool {
    extension
        .properties
        .iter()
        .any(|p| p.type_name.as_deref() == Some(BINDING_PATH_TYPE))
}

/// The unnamed first argument, per the extension's constructor policy
fn complete_ctor_argument(
    ctx: &Context<'_>,
    extension: &MetadataType,
    argument: &str,
    out: &mut Candidates,
) {
    match extension.support_ctor_argument {
        CtorArgument::None => {}
        CtorArgument::HintValues => {
            let context = ctx.xaml_context(ctx.state.attribute_name());
            out.extend(
                extension
                    .hint_values_for(&context)
                    .into_iter()
                    .filter(|v| matches_prefix(v, argument))
                    .map(|v| Completion::new(v, CompletionKind::Enum)),
            );
        }
        CtorArgument::Type => {
            out.extend(
                ctx.visible_types()
                    .filter(|(name, _)| matches_prefix(name, argument))
                    .map(|(name, t)| {
                        Completion::new(name, CompletionKind::Class).with_description(&t.full_name)
                    }),
            );
        }
        CtorArgument::Object => match argument.rsplit_once('.') {
            // `Owner.Member`: static members and enum values of the owner
            Some((owner, member)) => {
                out.start += owner.len() + 1;
                let Some(owner) = ctx.lookup_type(owner) else {
                    return;
                };
                out.extend(
                    owner
                        .properties
                        .iter()
                        .filter(|p| p.is_static && p.has_getter && matches_prefix(&p.name, member))
                        .map(|p| Completion::new(&p.name, CompletionKind::StaticProperty)),
                );
                if owner.is_enum {
                    let context = ctx.xaml_context(ctx.state.attribute_name());
                    out.extend(
                        owner
                            .hint_values_for(&context)
                            .into_iter()
                            .filter(|v| matches_prefix(v, member))
                            .map(|v| Completion::new(v, CompletionKind::Enum)),
                    );
                }
            }
            None => out.extend(
                ctx.visible_types()
                    .filter(|(_, t)| t.has_static_get_properties || t.is_enum)
                    .filter(|(name, _)| matches_prefix(name, argument))
                    .map(|(name, t)| {
                        Completion::new(name, CompletionKind::Class)
                            .with_description(&t.full_name)
                            .with_suffix(".")
                    }),
            ),
        },
    }
}
