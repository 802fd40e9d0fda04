//! Binding path completions
//!
//! A path is resolved one dotted segment at a time through the property
//! graph. The first segment may redirect the source: `$self`, `$parent`,
//! `$parent[Type;N]` or `#elementName`; anything else starts from the nearest
//! `x:DataType`.

use super::{matches_prefix, Candidates, Context};
use crate::metadata::MetadataType;
use crate::types::{Completion, CompletionKind};
use regex::Regex;
use std::sync::LazyLock;

/// Elements carrying a `Name` or `x:Name` attribute: tag in group 1, name in group 2
static NAMED_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^\s<>/!?]+)[^<>]*?\s(?:[A-Za-z_][\w.-]*:)?Name\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});

/// Complete the last segment of `path`, which starts at `path_start`
pub(crate) fn complete(ctx: &Context<'_>, path: &str, path_start: usize, out: &mut Candidates) {
    let (head, last) = match path.rfind('.') {
        Some(dot) => (&path[..dot], &path[dot + 1..]),
        None => ("", path),
    };
    out.start = path_start + path.len() - last.len();

    let typed = last.trim_start_matches('!');
    out.start += last.len() - typed.len();
    if typed.starts_with(['$', '#']) {
        return;
    }

    let Some(source) = resolve(ctx, head) else {
        tracing::trace!("binding path source of {:?} not resolved", path);
        return;
    };

    out.extend(
        source
            .properties
            .iter()
            .filter(|p| p.has_getter && !p.is_static && !p.is_attached && !p.name.is_empty())
            .filter(|p| matches_prefix(&p.name, typed))
            .map(|p| {
                Completion::new(&p.name, CompletionKind::DataProperty).with_description(format!(
                    "{}.{}",
                    source.full_name, p.name
                ))
            }),
    );
}

/// Type reached by walking `head` (everything before the last dot)
fn resolve<'a>(ctx: &Context<'a>, head: &str) -> Option<&'a MetadataType> {
    let segments: Vec<&str> = if head.is_empty() {
        Vec::new()
    } else {
        split_path(head).into_iter().map(str::trim).collect()
    };

    let (mut current, rest) = match segments.first() {
        Some(first) if first.starts_with("$self") => (ctx.tag_type(), &segments[1..]),
        Some(first) if first.starts_with("$parent") => (parent_type(ctx, first), &segments[1..]),
        Some(first) if first.starts_with('#') => (named_element_type(ctx, &first[1..]), &segments[1..]),
        _ => (ctx.data_type(), &segments[..]),
    };

    for segment in rest {
        let name = clean_segment(segment);
        let property = match name.rsplit_once('.') {
            // Attached property, `(Owner.Member)`
            Some((owner, member)) => {
                current?;
                ctx.lookup_type(owner)?.property(member)?
            }
            None => current?.property(name)?,
        };
        current = if name == "DataContext" {
            // The data context type is not in the graph; assume x:DataType
            ctx.data_type()
        } else {
            ctx.property_type(property)
        };
    }

    current
}

/// Split on dots outside parentheses, keeping `(Owner.Prop)` whole
fn split_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// `!Prop`, `Prop[0]` and `(Owner.Prop)` all name `Prop`
fn clean_segment(segment: &str) -> &str {
    let segment = segment.trim_start_matches('!');
    let segment = segment.split('[').next().unwrap_or(segment);
    segment.trim_matches(|c| c == '(' || c == ')')
}

/// `$parent`, `$parent[Type]` or `$parent[Type;N]`
fn parent_type<'a>(ctx: &Context<'a>, segment: &str) -> Option<&'a MetadataType> {
    let Some(selector) = segment
        .strip_prefix("$parent")
        .and_then(|s| s.strip_prefix('['))
        .map(|s| s.trim_end_matches(']'))
    else {
        return ctx.lookup_type(ctx.state.parent_tag_name(0)?);
    };

    let (type_name, skip) = match selector.split_once(';') {
        Some((name, skip)) => (name.trim(), skip.trim().parse::<usize>().unwrap_or(0)),
        None => (selector.trim(), 0),
    };
    let target = ctx.lookup_type(type_name);

    // The ancestor chain only confirms the type; an unmatched name still
    // resolves to the named type
    let matched = (0..ctx.state.nesting_level())
        .filter_map(|level| ctx.state.parent_tag_name(level))
        .filter(|tag| {
            *tag == type_name
                || target.is_some_and(|t| {
                    ctx.lookup_type(tag)
                        .is_some_and(|ancestor| ancestor.full_name == t.full_name)
                })
        })
        .nth(skip);

    match matched {
        Some(tag) => ctx.lookup_type(tag),
        None => target,
    }
}

/// Type of the element declaring `x:Name="name"` (or `Name="name"`)
fn named_element_type<'a>(ctx: &Context<'a>, name: &str) -> Option<&'a MetadataType> {
    let tag = NAMED_ELEMENT
        .captures_iter(ctx.text)
        .find(|caps| caps.get(2).is_some_and(|m| m.as_str() == name))?
        .get(1)?
        .as_str();
    ctx.lookup_type(tag)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    fn data_view(body: &str) -> String {
        format!("{} x:DataType=\"vm:MainViewModel\">{}", HEADER, body)
    }

    #[test]
    fn test_property_via_data_type() {
        let text = "<UserControl x:DataType=\"Button\"><Button Tag=\"{Binding Conte";
        let set = completions(text).unwrap();
        let content = find(&set, "Content").unwrap();
        assert_eq!(content.kind, CompletionKind::DataProperty);
        assert_eq!(set.start_position, text.len() - 5);
    }

    #[test]
    fn test_data_type_from_prefixed_alias() {
        let text = data_view("<TextBlock Text=\"{Binding ");
        let set = completions(&text).unwrap();
        let names = displays(&set);
        assert!(names.contains(&"Title"));
        assert!(names.contains(&"Selected"));
        assert!(names.contains(&"Count"));
    }

    #[test]
    fn test_dotted_chain() {
        let text = data_view("<TextBlock Text=\"{Binding Selected.Pr");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Price"]);
        assert_eq!(set.start_position, text.len() - 2);
    }

    #[test]
    fn test_path_property() {
        let text = data_view("<TextBlock Text=\"{Binding Path=Selected.N");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Name"]);
    }

    #[test]
    fn test_unresolvable_segment() {
        let text = data_view("<TextBlock Text=\"{Binding Missing.N");
        assert!(completions(&text).is_none());
    }

    #[test]
    fn test_negation_stripped() {
        let text = data_view("<TextBlock Text=\"{Binding !Sel");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Selected"]);
        assert_eq!(set.start_position, text.len() - 3);
    }

    #[test]
    fn test_self_source() {
        let text = data_view("<Button Tag=\"{Binding $self.Cli");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["ClickMode"]);
    }

    #[test]
    fn test_parent_source() {
        let text = data_view("<Grid><Button Tag=\"{Binding $parent.Row");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["RowDefinitions"]);
    }

    #[test]
    fn test_parent_with_type() {
        let text = data_view("<Grid><Button Tag=\"{Binding $parent[UserControl].Wid");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Width"]);
    }

    #[test]
    fn test_parent_with_skip() {
        let text = data_view("<Grid><Grid><Button Tag=\"{Binding $parent[Grid;1].Row");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["RowDefinitions"]);
    }

    #[test]
    fn test_named_element_source() {
        let text = data_view("<TextBlock x:Name=\"label\"/><Button Tag=\"{Binding #label.Fore");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Foreground"]);
    }

    #[test]
    fn test_named_element_skips_other_names() {
        let text = data_view(
            "<Grid Name=\"layout\"/><TextBlock x:Name=\"label\"/><Button Tag=\"{Binding #label.Fore",
        );
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Foreground"]);
    }

    #[test]
    fn test_attached_property_segment() {
        let text = data_view("<TextBlock Text=\"{Binding Selected.(ToolTip.Tip).Pr");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Price"]);
        assert_eq!(set.start_position, text.len() - 2);
    }

    #[test]
    fn test_data_context_resolves_to_data_type() {
        let text = data_view("<Button Tag=\"{Binding $parent.DataContext.Ti");
        let set = completions(&text).unwrap();
        assert_eq!(displays(&set), vec!["Title"]);
    }

    #[test]
    fn test_no_data_type() {
        assert!(completions("<UserControl><Button Tag=\"{Binding Conte").is_none());
    }

    #[test]
    fn test_clean_segment() {
        assert_eq!(clean_segment("!Items[0]"), "Items");
        assert_eq!(clean_segment("(Grid.Row)"), "Grid.Row");
        assert_eq!(clean_segment("Name"), "Name");
    }

    #[test]
    fn test_split_path_keeps_parenthesized_segments() {
        assert_eq!(split_path("Selected.(Grid.Row).X"), vec!["Selected", "(Grid.Row)", "X"]);
        assert_eq!(split_path("A.B"), vec!["A", "B"]);
        assert_eq!(split_path("(Grid.Row"), vec!["(Grid.Row"]);
    }
}
