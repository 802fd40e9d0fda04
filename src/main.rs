//! xaml-intellisense CLI - Context-aware completion for XAML files
//!
//! # Usage
//!
//! ```bash
//! # Completions at a byte offset
//! xaml-intellisense --metadata metadata.json complete View.axaml 120
//!
//! # Parser state at a byte offset
//! xaml-intellisense context View.axaml 120
//!
//! # Follow-up edits after typing "Beta" at offset 6 (caret now at 10)
//! xaml-intellisense manipulate View.axaml 10 --new-text Beta --apply
//! ```

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xaml_intellisense::{
    compute, xml_parser, CompletionEngine, EngineConfig, Metadata, TextChange, TextManipulation,
};

#[derive(Parser)]
#[command(name = "xaml-intellisense")]
#[command(about = "Context-aware completion for XAML files")]
#[command(version)]
struct Cli {
    /// Type metadata JSON file
    #[arg(long, global = true, env = "XAML_METADATA")]
    metadata: Option<PathBuf>,

    /// Assembly the document belongs to
    #[arg(long, global = true, env = "XAML_ASSEMBLY")]
    assembly: Option<String>,

    /// Config file (defaults to .xaml-intellisense.yaml next to the document)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, short, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Get completions at a position
    Complete {
        /// XAML file (use - for stdin)
        file: PathBuf,

        /// Cursor byte offset
        offset: usize,
    },

    /// Parse and show the cursor context
    Context {
        /// XAML file (use - for stdin)
        file: PathBuf,

        /// Cursor byte offset
        offset: usize,
    },

    /// Compute follow-up edits for an edit already applied to the file
    Manipulate {
        /// XAML file after the edit (use - for stdin)
        file: PathBuf,

        /// Caret byte offset after the edit
        offset: usize,

        /// Inserted text
        #[arg(long, default_value = "")]
        new_text: String,

        /// Replaced text
        #[arg(long, default_value = "")]
        old_text: String,

        /// Offset the edit starts at (defaults to offset minus the inserted length)
        #[arg(long)]
        position: Option<usize>,

        /// Print the resulting document instead of the edits
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Complete { ref file, offset } => {
            let source = read_source(file)?;
            let config = load_config(cli.config.as_deref(), file)?;
            let Some(ref metadata_path) = cli.metadata else {
                bail!("No metadata file given (use --metadata or XAML_METADATA)");
            };
            let metadata = Arc::new(Metadata::load(metadata_path)?);
            tracing::debug!("loaded {} types", metadata.type_count());

            let mut engine = CompletionEngine::with_config(config);
            let result =
                engine.get_completions(Some(&metadata), &source, offset, cli.assembly.as_deref());

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                OutputFormat::Text => match result {
                    None => println!("No completions found"),
                    Some(set) => {
                        println!(
                            "Completions ({}) from offset {}:",
                            set.completions.len(),
                            set.start_position
                        );
                        for item in &set.completions {
                            let kind = format!("{:?}", item.kind);
                            println!(
                                "  {:30} {:18} {}",
                                item.display_text, kind, item.insert_text
                            );
                        }
                    }
                },
            }
        }

        Commands::Context { ref file, offset } => {
            let source = read_source(file)?;
            let state = xml_parser::parse(&source, 0, offset);
            let parents: Vec<&str> = (0..state.nesting_level())
                .filter_map(|level| state.parent_tag_name(level))
                .collect();

            match cli.format {
                OutputFormat::Json => {
                    #[derive(serde::Serialize)]
                    #[serde(rename_all = "camelCase")]
                    struct ContextOutput<'a> {
                        state: String,
                        tag_name: Option<&'a str>,
                        attribute_name: Option<&'a str>,
                        attribute_value: Option<&'a str>,
                        current_value_start: Option<usize>,
                        nesting_level: usize,
                        parents: Vec<&'a str>,
                    }

                    let output = ContextOutput {
                        state: format!("{:?}", state.state()),
                        tag_name: state.tag_name(),
                        attribute_name: state.attribute_name(),
                        attribute_value: state.attribute_value(),
                        current_value_start: state.current_value_start(),
                        nesting_level: state.nesting_level(),
                        parents,
                    };

                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Cursor Context at {}", state.position());
                    println!("  State:             {:?}", state.state());
                    println!("  Tag name:          {:?}", state.tag_name());
                    println!("  Attribute name:    {:?}", state.attribute_name());
                    println!("  Attribute value:   {:?}", state.attribute_value());
                    println!("  Value start:       {:?}", state.current_value_start());
                    println!("  Nesting level:     {}", state.nesting_level());
                    println!("  Parents:           {:?}", parents);
                }
            }
        }

        Commands::Manipulate {
            ref file,
            offset,
            ref new_text,
            ref old_text,
            position,
            apply,
        } => {
            let source = read_source(file)?;
            if offset > source.len() {
                bail!("Offset {} is past the end of the document ({} bytes)", offset, source.len());
            }
            let position = position.unwrap_or_else(|| offset.saturating_sub(new_text.len()));
            let change = TextChange {
                old_position: position,
                old_text: old_text.clone(),
                new_position: position,
                new_text: new_text.clone(),
            };
            let edits = compute(&source, offset, &change);

            if apply {
                print!("{}", apply_edits(&source, &edits));
                return Ok(());
            }

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&edits)?);
                }
                OutputFormat::Text => {
                    if edits.is_empty() {
                        println!("No manipulations");
                    }
                    for edit in &edits {
                        match edit.text {
                            Some(ref text) => println!("  insert {:6} {:?}", edit.start, text),
                            None => println!("  delete {:6} {}", edit.start, edit.end),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    if file.to_string_lossy() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
    }
}

/// Explicit config file, else the default locations next to the document
fn load_config(explicit: Option<&Path>, file: &Path) -> Result<EngineConfig> {
    if let Some(path) = explicit {
        return Ok(EngineConfig::load(path)?);
    }
    let dir = match file.parent() {
        Some(parent) if file.to_string_lossy() != "-" && !parent.as_os_str().is_empty() => {
            parent.to_path_buf()
        }
        _ => std::env::current_dir()?,
    };
    Ok(EngineConfig::load_default(&dir))
}

fn apply_edits(source: &str, edits: &[TextManipulation]) -> String {
    let mut result = source.to_string();
    for edit in edits {
        edit.apply(&mut result);
    }
    result
}
