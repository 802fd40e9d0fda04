//! Completion engine
//!
//! [`CompletionEngine::get_completions`] parses the document up to the cursor,
//! resolves the xmlns aliases into a type table and hands the parser state to
//! the provider for that context. Results are ranked by kind, then by display
//! text.

mod attributes;
mod binding;
mod elements;
mod markup;
mod values;

use crate::aliases::{self, TypeTable, TypeTableCache};
use crate::config::EngineConfig;
use crate::metadata::{Metadata, MetadataProperty, MetadataType, XamlContext};
use crate::types::{Completion, CompletionSet};
use crate::xml_parser::{self, ParseSnapshot, ParserState};
use std::sync::Arc;

/// Produces completions for XAML documents
///
/// Keeps the resolved type table between calls; use one engine per caller.
#[derive(Debug, Default)]
pub struct CompletionEngine {
    config: EngineConfig,
    cache: TypeTableCache,
}

impl CompletionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            cache: TypeTableCache::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of times the type table has been built by this engine
    pub fn table_rebuilds(&self) -> usize {
        self.cache.rebuilds()
    }

    /// Completions for `cursor` (a byte offset into `text`)
    ///
    /// `None` when there is no metadata, the document is empty, the cursor is
    /// at 0, or nothing applies at this position.
    pub fn get_completions(
        &mut self,
        metadata: Option<&Arc<Metadata>>,
        text: &str,
        cursor: usize,
        assembly: Option<&str>,
    ) -> Option<CompletionSet> {
        let metadata = metadata?;
        if text.is_empty() || cursor == 0 {
            return None;
        }
        let cursor = xml_parser::floor_char_boundary(text, cursor);
        if cursor == 0 {
            return None;
        }

        let aliases = aliases::resolve_aliases(text, &self.config.namespaces.default);
        let types = self.cache.get_or_build(metadata, aliases, assembly);
        let state = xml_parser::parse(text, 0, cursor);

        let ctx = Context {
            metadata,
            types,
            text,
            cursor,
            state,
            assembly,
            config: &self.config,
        };

        let mut out = Candidates {
            start: ctx.state.current_value_start().unwrap_or(cursor),
            items: Vec::new(),
        };

        match ctx.state.state() {
            ParserState::StartElement => elements::complete(&ctx, &mut out),
            ParserState::InsideElement | ParserState::StartAttribute => {
                attributes::complete(&ctx, &mut out)
            }
            ParserState::AttributeValue => values::complete(&ctx, &mut out),
            other => tracing::trace!("no completions in state {:?}", other),
        }
        tracing::debug!(
            "{} candidate(s) in state {:?} from offset {}",
            out.items.len(),
            ctx.state.state(),
            out.start
        );

        if out.items.is_empty() {
            return None;
        }

        let mut completions = rank(out.items);
        if let Some(limit) = self.config.completion.max_results {
            completions.truncate(limit);
        }

        Some(CompletionSet {
            start_position: out.start.min(cursor),
            completions,
        })
    }
}

/// Order by kind group, then ordinally by display text; collapse duplicates
pub(crate) fn rank(mut items: Vec<Completion>) -> Vec<Completion> {
    items.sort_by(|a, b| {
        a.kind
            .rank()
            .cmp(&b.kind.rank())
            .then_with(|| a.display_text.cmp(&b.display_text))
    });
    items.dedup_by(|a, b| a.kind == b.kind && a.display_text == b.display_text);
    items
}

/// Case-insensitive `starts_with`
pub(crate) fn matches_prefix(candidate: &str, prefix: &str) -> bool {
    if prefix.is_ascii() {
        candidate.len() >= prefix.len()
            && candidate.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    } else {
        candidate.to_lowercase().starts_with(&prefix.to_lowercase())
    }
}

/// Replacement start and the candidates collected for one request
pub(crate) struct Candidates {
    pub start: usize,
    pub items: Vec<Completion>,
}

impl Candidates {
    pub fn extend(&mut self, completions: impl IntoIterator<Item = Completion>) {
        self.items.extend(completions);
    }
}

/// Everything a provider needs to answer one request
pub(crate) struct Context<'a> {
    pub metadata: &'a Metadata,
    pub types: &'a TypeTable,
    pub text: &'a str,
    pub cursor: usize,
    pub state: ParseSnapshot<'a>,
    pub assembly: Option<&'a str>,
    pub config: &'a EngineConfig,
}

impl<'a> Context<'a> {
    /// Resolve a (possibly prefixed) type name through the document aliases
    pub fn lookup_type(&self, name: &str) -> Option<&'a MetadataType> {
        let metadata = self.metadata;
        self.types.get(name).map(|index| metadata.type_at(index))
    }

    /// Resolve a markup extension name, preferring the `Extension`-suffixed type
    pub fn lookup_markup_extension(&self, name: &str) -> Option<&'a MetadataType> {
        self.lookup_type(&format!("{}Extension", name))
            .filter(|t| t.is_markup_extension)
            .or_else(|| self.lookup_type(name).filter(|t| t.is_markup_extension))
    }

    /// Type of the tag under the cursor
    pub fn tag_type(&self) -> Option<&'a MetadataType> {
        self.lookup_type(self.state.tag_name()?)
    }

    /// Property `name` of the element `tag`; `Owner.Name` resolves attached
    /// properties against `Owner`
    pub fn lookup_property(&self, tag: &str, name: &str) -> Option<&'a MetadataProperty> {
        match name.rsplit_once('.') {
            Some((owner, member)) => self.lookup_type(owner)?.property(member),
            None => self.lookup_type(tag)?.property(name),
        }
    }

    /// Property an attribute value is completed against: the named or
    /// attached property, else the unnamed or content property of the tag
    pub fn lookup_value_property(&self, tag: &str, name: &str) -> Option<&'a MetadataProperty> {
        if let Some(property) = self.lookup_property(tag, name) {
            return Some(property);
        }
        if name.contains(['.', ':']) {
            return None;
        }
        let tag_type = self.lookup_type(tag)?;
        tag_type
            .property("")
            .or_else(|| tag_type.content_property())
    }

    pub fn property_type(&self, property: &MetadataProperty) -> Option<&'a MetadataType> {
        let metadata = self.metadata;
        metadata.property_type(property)
    }

    /// Types visible in this document, with the names they are written as
    pub fn visible_types(&self) -> impl Iterator<Item = (&'a str, &'a MetadataType)> + 'a {
        let metadata = self.metadata;
        let types = self.types;
        types
            .iter()
            .filter(|(name, _)| !name.starts_with('{'))
            .map(move |(name, index)| (name, metadata.type_at(index)))
    }

    /// Prefix bound to the XAML language namespace, `x` when undeclared
    pub fn xaml_prefix(&self) -> &'a str {
        let types = self.types;
        types
            .prefix_for(&self.config.namespaces.xaml)
            .unwrap_or("x")
    }

    pub fn xaml_context<'s>(&'s self, attribute: Option<&'s str>) -> XamlContext<'s> {
        XamlContext {
            assembly_name: self.assembly,
            tag_name: self.state.tag_name(),
            parent_tag_name: self.state.parent_tag_name(0),
            attribute_name: attribute,
        }
    }

    /// Type named by the nearest `x:DataType`, the current tag included
    pub fn data_type(&self) -> Option<&'a MetadataType> {
        let pattern = format!("(?:{}:)?DataType", regex::escape(self.xaml_prefix()));
        let value = self
            .state
            .current_tag_attribute_value(&pattern)
            .or_else(|| self.state.find_parent_attribute_value(&pattern, 0, usize::MAX))?;
        self.lookup_type(unwrap_type_extension(value))
    }
}

/// `{x:Type Foo}` and `{x:Type TypeName=Foo}` → `Foo`
pub(crate) fn unwrap_type_extension(value: &str) -> &str {
    let value = value.trim();
    let Some(inner) = value
        .strip_prefix('{')
        .map(|v| v.strip_suffix('}').unwrap_or(v).trim())
    else {
        return value;
    };
    let Some((name, argument)) = inner.split_once(char::is_whitespace) else {
        return inner;
    };
    if !(name == "Type" || name.ends_with(":Type")) {
        return value;
    }
    let argument = argument.trim();
    argument
        .strip_prefix("TypeName")
        .and_then(|rest| rest.trim_start().strip_prefix('='))
        .map_or(argument, str::trim)
}

/// Avalonia selectors write namespaced types as `prefix|Type`
pub(crate) fn selector_type_name(name: &str) -> String {
    name.replace('|', ":")
}
