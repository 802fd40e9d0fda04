//! xaml-intellisense: Context-aware completion for XAML markup
//!
//! This library provides completion candidates for Avalonia-style XAML
//! documents by parsing the text before the cursor and querying a type
//! metadata graph, and computes the follow-up edits that keep start and end
//! tags in sync while typing.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use xaml_intellisense::{CompletionEngine, Metadata, TextChange};
//!
//! let metadata = Arc::new(Metadata::load(Path::new("metadata.json")).unwrap());
//! let mut engine = CompletionEngine::new();
//!
//! let source = "<UserControl xmlns=\"https://github.com/avaloniaui\"><Bu";
//! if let Some(set) = engine.get_completions(Some(&metadata), source, source.len(), None) {
//!     for item in &set.completions {
//!         println!("{} ({:?})", item.display_text, item.kind);
//!     }
//! }
//!
//! let edits = xaml_intellisense::compute("<Tag/", 5, &TextChange::insert(4, "/"));
//! assert_eq!(edits.len(), 1);
//! ```

pub mod aliases;
pub mod completions;
pub mod config;
pub mod manipulator;
pub mod markup_extension;
pub mod metadata;
pub mod selector;
pub mod types;
pub mod xml_parser;

pub use completions::CompletionEngine;
pub use config::{ConfigError, EngineConfig};
pub use manipulator::{compute, TextManipulator};
pub use metadata::{
    CtorArgument, LoadError, Metadata, MetadataEvent, MetadataProperty, MetadataType, XamlContext,
};
pub use types::{
    Completion, CompletionKind, CompletionSet, ManipulationKind, TextChange, TextManipulation,
};
pub use xml_parser::{ParseSnapshot, ParserState};
