//! xmlns alias resolution and the per-document type table
//!
//! The root element's `xmlns` declarations are read with a tolerant scanner
//! that stops at the first malformed token. Aliases are resolved against the
//! metadata namespaces into a `prefix:TypeName` table, which the engine keeps
//! between requests for as long as metadata, aliases and assembly stay the
//! same.

use crate::metadata::Metadata;
use std::collections::HashMap;
use std::sync::Arc;

/// Declared aliases, in declaration order
pub type Aliases = Vec<(String, String)>;

/// Result of scanning the root element for namespace declarations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasScan {
    pub aliases: Aliases,
    /// The root start tag was read to its end without errors
    pub complete: bool,
}

struct Scanner<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Move past `terminator`; false if it never appears
    fn skip_past(&mut self, terminator: &str) -> bool {
        match self.rest().find(terminator) {
            Some(offset) => {
                self.pos += offset + terminator.len();
                true
            }
            None => false,
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() && crate::xml_parser::is_name_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn read_quoted(&mut self) -> Option<&'a str> {
        let quote = *self.bytes.get(self.pos).filter(|q| matches!(q, b'"' | b'\''))?;
        self.pos += 1;
        let start = self.pos;
        let length = self.bytes[start..].iter().position(|&b| b == quote)?;
        self.pos = start + length + 1;
        Some(&self.text[start..start + length])
    }
}

/// Read the xmlns declarations of the first element
pub fn scan_aliases(text: &str) -> AliasScan {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut scanner = Scanner {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };
    let mut scan = AliasScan::default();

    // Prolog: declarations, comments, doctype
    loop {
        scanner.skip_whitespace();
        let rest = scanner.rest();
        let skipped = if rest.starts_with("<?") {
            scanner.skip_past("?>")
        } else if rest.starts_with("<!--") {
            scanner.skip_past("-->")
        } else if rest.starts_with("<!") {
            scanner.skip_past(">")
        } else {
            break;
        };
        if !skipped {
            return scan;
        }
    }

    if !scanner.eat(b'<') || scanner.read_name().is_empty() {
        return scan;
    }

    loop {
        scanner.skip_whitespace();
        if scanner.eat(b'>') || (scanner.eat(b'/') && scanner.eat(b'>')) {
            scan.complete = true;
            return scan;
        }

        let name = scanner.read_name();
        if name.is_empty() {
            return scan;
        }
        scanner.skip_whitespace();
        if !scanner.eat(b'=') {
            return scan;
        }
        scanner.skip_whitespace();
        let Some(value) = scanner.read_quoted() else {
            return scan;
        };

        if name == "xmlns" {
            scan.aliases.push((String::new(), value.to_string()));
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            scan.aliases.push((prefix.to_string(), value.to_string()));
        }
    }
}

/// Aliases of `text`, with `default_namespace` bound to the empty prefix when
/// the document declares no default namespace
pub fn resolve_aliases(text: &str, default_namespace: &str) -> Aliases {
    let scan = scan_aliases(text);
    if !scan.complete {
        tracing::trace!("xmlns scan stopped early, {} aliases read", scan.aliases.len());
    }
    let mut aliases = scan.aliases;
    if !aliases.iter().any(|(prefix, _)| prefix.is_empty()) {
        aliases.insert(0, (String::new(), default_namespace.to_string()));
    }
    aliases
}

/// `prefix:TypeName` → type index, for one document's aliases
#[derive(Debug, Default)]
pub struct TypeTable {
    types: HashMap<String, usize>,
    /// Markup extensions reachable without their `Extension` suffix
    extension_aliases: HashMap<String, usize>,
    aliases: Aliases,
}

impl TypeTable {
    pub fn build(metadata: &Metadata, aliases: &[(String, String)], assembly: Option<&str>) -> Self {
        let mut table = TypeTable {
            aliases: aliases.to_vec(),
            ..Default::default()
        };

        for (prefix, uri) in aliases {
            for key in namespace_keys(metadata, uri, assembly) {
                let Some(namespace) = metadata.namespaces().get(&key) else {
                    continue;
                };
                for (name, &index) in namespace {
                    // Later declarations win on collision
                    table.types.insert(qualify(prefix, name), index);
                }
            }
        }

        for (name, &index) in &table.types {
            if !metadata.type_at(index).is_markup_extension {
                continue;
            }
            if let Some(short) = name.strip_suffix("Extension").filter(|s| !s.ends_with(':')) {
                if !short.is_empty() && !table.types.contains_key(short) {
                    table.extension_aliases.insert(short.to_string(), index);
                }
            }
        }

        table
    }

    /// Type index for a (possibly prefixed) name
    pub fn get(&self, name: &str) -> Option<usize> {
        self.types
            .get(name)
            .or_else(|| self.extension_aliases.get(name))
            .copied()
    }

    /// Every resolvable name, excluding suffix-less extension aliases
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.types.iter().map(|(name, &index)| (name.as_str(), index))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// Namespace bound to `prefix` (last declaration wins)
    pub fn namespace_for(&self, prefix: &str) -> Option<&str> {
        self.aliases
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Prefix bound to `namespace` (last declaration wins)
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.aliases
            .iter()
            .rev()
            .find(|(_, uri)| uri == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}

/// Metadata namespace keys an alias value may refer to
fn namespace_keys(metadata: &Metadata, uri: &str, assembly: Option<&str>) -> Vec<String> {
    if let Some(clr) = uri.strip_prefix("clr-namespace:") {
        if !clr.contains(";assembly=") {
            if let Some(assembly) = assembly {
                return vec![format!("{};assembly={}", uri, assembly)];
            }
        }
        return vec![uri.to_string()];
    }

    if let Some(namespace) = uri.strip_prefix("using:") {
        let exact = format!("clr-namespace:{};", namespace);
        let mut keys: Vec<String> = metadata
            .namespaces()
            .keys()
            .filter(|key| key.starts_with(&exact))
            .cloned()
            .collect();
        // The current assembly's types are registered last so they win
        if let Some(assembly) = assembly {
            let own = format!("{}assembly={}", exact, assembly);
            keys.sort_by_key(|key| *key == own);
        }
        return keys;
    }

    vec![uri.to_string()]
}

/// Type table kept across requests of one engine
#[derive(Debug, Default)]
pub struct TypeTableCache {
    entry: Option<CacheEntry>,
    rebuilds: usize,
}

#[derive(Debug)]
struct CacheEntry {
    metadata: Arc<Metadata>,
    aliases: Aliases,
    assembly: Option<String>,
    table: TypeTable,
}

impl TypeTableCache {
    /// Table for this key, rebuilt only when metadata identity, aliases or
    /// assembly differ from the previous request
    pub fn get_or_build(
        &mut self,
        metadata: &Arc<Metadata>,
        aliases: Aliases,
        assembly: Option<&str>,
    ) -> &TypeTable {
        let hit = self.entry.as_ref().is_some_and(|entry| {
            Arc::ptr_eq(&entry.metadata, metadata)
                && entry.aliases == aliases
                && entry.assembly.as_deref() == assembly
        });

        if !hit {
            self.entry = None;
        }

        let rebuilds = &mut self.rebuilds;
        let entry = self.entry.get_or_insert_with(|| {
            let table = TypeTable::build(metadata, &aliases, assembly);
            tracing::debug!(
                "type table rebuilt: {} aliases, {} types",
                aliases.len(),
                table.len()
            );
            *rebuilds += 1;
            CacheEntry {
                metadata: Arc::clone(metadata),
                aliases,
                assembly: assembly.map(str::to_string),
                table,
            }
        });
        &entry.table
    }

    /// Number of times the table had to be built
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
