//! Read contract of the type metadata graph, plus its JSON loader
//!
//! The graph is produced by an external assembly-metadata loader. Types live in
//! an arena; namespaces map a namespace key (xmlns URI or
//! `clr-namespace:Ns;assembly=Asm`) to type indices, and property types are
//! referenced by full type name.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Sentinel type name of binding-path properties
pub const BINDING_PATH_TYPE: &str = "{BindingPath}";

/// Full name of the reflection type; properties of this type take type names
pub const SYSTEM_TYPE: &str = "System.Type";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read metadata: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: PathBuf,
        source: serde_json::Error,
    },
    #[error("Metadata file not found: {0}")]
    NotFound(PathBuf),
    #[error("Duplicate type: {0}")]
    DuplicateType(String),
}

/// What a markup extension accepts as its first, unnamed argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CtorArgument {
    #[default]
    None,
    Type,
    Object,
    HintValues,
}

/// Where in the document a context callback is being asked about
#[derive(Debug, Clone, Copy, Default)]
pub struct XamlContext<'a> {
    pub assembly_name: Option<&'a str>,
    pub tag_name: Option<&'a str>,
    pub parent_tag_name: Option<&'a str>,
    pub attribute_name: Option<&'a str>,
}

pub type HintValuesFn = Arc<dyn Fn(&XamlContext<'_>) -> Vec<String> + Send + Sync>;
pub type ValidForContextFn = Arc<dyn Fn(&XamlContext<'_>) -> bool + Send + Sync>;

/// Callbacks a loader may attach to a type
#[derive(Clone, Default)]
pub struct ContextHooks {
    pub hint_values: Option<HintValuesFn>,
    pub valid_for_context: Option<ValidForContextFn>,
}

impl fmt::Debug for ContextHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHooks")
            .field("hint_values", &self.hint_values.is_some())
            .field("valid_for_context", &self.valid_for_context.is_some())
            .finish()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataProperty {
    pub name: String,
    #[serde(default)]
    pub is_attached: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default = "default_true")]
    pub has_getter: bool,
    #[serde(default = "default_true")]
    pub has_setter: bool,
    /// The type's content property (set by element children)
    #[serde(default)]
    pub is_content: bool,
    /// Full name of the property type
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEvent {
    pub name: String,
    #[serde(default)]
    pub is_attached: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataType {
    pub name: String,
    pub full_name: String,
    /// Namespace keys (xmlns URIs) this type is visible under
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Assembly the type is compiled into
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default)]
    pub is_enum: bool,
    #[serde(default)]
    pub is_markup_extension: bool,
    #[serde(default)]
    pub is_avalonia_object_type: bool,
    #[serde(default)]
    pub has_static_get_properties: bool,
    #[serde(default)]
    pub is_composite_value: bool,
    #[serde(default)]
    pub is_generic: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub properties: Vec<MetadataProperty>,
    #[serde(default)]
    pub events: Vec<MetadataEvent>,
    #[serde(default)]
    pub hint_values: Vec<String>,
    #[serde(default)]
    pub support_ctor_argument: CtorArgument,
    #[serde(skip)]
    pub hooks: ContextHooks,
}

impl MetadataType {
    pub fn has_hint_values(&self) -> bool {
        !self.hint_values.is_empty() || self.hooks.hint_values.is_some()
    }

    pub fn has_attached_members(&self) -> bool {
        self.properties.iter().any(|p| p.is_attached) || self.events.iter().any(|e| e.is_attached)
    }

    pub fn property(&self, name: &str) -> Option<&MetadataProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn content_property(&self) -> Option<&MetadataProperty> {
        self.properties.iter().find(|p| p.is_content)
    }

    /// Static hint values followed by whatever the context callback adds
    pub fn hint_values_for(&self, context: &XamlContext<'_>) -> Vec<String> {
        let mut values = self.hint_values.clone();
        if let Some(hook) = &self.hooks.hint_values {
            values.extend(hook(context));
        }
        values
    }

    pub fn is_valid_for(&self, context: &XamlContext<'_>) -> bool {
        self.hooks
            .valid_for_context
            .as_ref()
            .map_or(true, |hook| hook(context))
    }

    /// CLR namespace part of the full name
    pub fn clr_namespace(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or("", |(namespace, _)| namespace)
    }
}

/// The metadata graph consumed by the completion engine
#[derive(Debug, Default)]
pub struct Metadata {
    types: Vec<MetadataType>,
    namespaces: HashMap<String, HashMap<String, usize>>,
    by_full_name: HashMap<String, usize>,
}

impl Metadata {
    /// Build the graph and its namespace index
    pub fn new(types: Vec<MetadataType>) -> Result<Self, LoadError> {
        let mut metadata = Metadata::default();
        for ty in types {
            metadata.add_type(ty)?;
        }
        Ok(metadata)
    }

    /// Parse the JSON form written by the metadata loader
    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        Self::parse_json(content, Path::new("<memory>"))
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse_json(&content, path)
    }

    fn parse_json(content: &str, file: &Path) -> Result<Self, LoadError> {
        #[derive(Deserialize)]
        struct MetadataFile {
            #[serde(default)]
            types: Vec<MetadataType>,
        }

        let parsed: MetadataFile = serde_json::from_str(content).map_err(|e| LoadError::Parse {
            file: file.to_path_buf(),
            source: e,
        })?;
        Self::new(parsed.types)
    }

    fn add_type(&mut self, ty: MetadataType) -> Result<(), LoadError> {
        if self.by_full_name.contains_key(&ty.full_name) {
            return Err(LoadError::DuplicateType(ty.full_name));
        }
        let index = self.types.len();

        let mut keys = ty.namespaces.clone();
        if let Some(assembly) = &ty.assembly {
            keys.push(format!("clr-namespace:{};assembly={}", ty.clr_namespace(), assembly));
        }
        for key in keys {
            self.namespaces
                .entry(key)
                .or_default()
                .insert(ty.name.clone(), index);
        }

        self.by_full_name.insert(ty.full_name.clone(), index);
        self.types.push(ty);
        Ok(())
    }

    pub fn types(&self) -> &[MetadataType] {
        &self.types
    }

    pub fn type_at(&self, index: usize) -> &MetadataType {
        &self.types[index]
    }

    /// Namespace key → (type name → type index)
    pub fn namespaces(&self) -> &HashMap<String, HashMap<String, usize>> {
        &self.namespaces
    }

    pub fn find_type(&self, full_name: &str) -> Option<&MetadataType> {
        self.by_full_name.get(full_name).map(|&i| &self.types[i])
    }

    /// Mutable access, used to attach context callbacks after loading
    pub fn type_mut(&mut self, full_name: &str) -> Option<&mut MetadataType> {
        let index = *self.by_full_name.get(full_name)?;
        self.types.get_mut(index)
    }

    pub fn property_type(&self, property: &MetadataProperty) -> Option<&MetadataType> {
        property.type_name.as_deref().and_then(|name| self.find_type(name))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}
