//! Integration tests for the xaml-intellisense library and CLI

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempDir;
use xaml_intellisense::{
    compute, xml_parser, CompletionEngine, CompletionKind, CompletionSet, EngineConfig, LoadError,
    ManipulationKind, Metadata, ParserState, TextChange, TextManipulation,
};

const METADATA: &str = r#"{"types": [
    {"name": "UserControl", "fullName": "Avalonia.Controls.UserControl",
     "namespaces": ["https://github.com/avaloniaui"], "isAvaloniaObjectType": true,
     "properties": [
        {"name": "Content", "type": "System.Object", "isContent": true},
        {"name": "HorizontalAlignment", "type": "Avalonia.Layout.HorizontalAlignment"},
        {"name": "Width", "type": "System.Double"}
     ]},
    {"name": "Button", "fullName": "Avalonia.Controls.Button",
     "namespaces": ["https://github.com/avaloniaui"], "isAvaloniaObjectType": true,
     "properties": [
        {"name": "Content", "type": "System.Object", "isContent": true},
        {"name": "Tag", "type": "System.Object"},
        {"name": "HorizontalAlignment", "type": "Avalonia.Layout.HorizontalAlignment"},
        {"name": "Styles", "type": "Avalonia.Styling.Styles"}
     ],
     "events": [{"name": "Click"}]},
    {"name": "Border", "fullName": "Avalonia.Controls.Border",
     "namespaces": ["https://github.com/avaloniaui"], "isAvaloniaObjectType": true},
    {"name": "Style", "fullName": "Avalonia.Styling.Style",
     "namespaces": ["https://github.com/avaloniaui"]},
    {"name": "Grid", "fullName": "Avalonia.Controls.Grid",
     "namespaces": ["https://github.com/avaloniaui"], "isAvaloniaObjectType": true,
     "properties": [
        {"name": "Row", "type": "System.Int32", "isAttached": true}
     ]},
    {"name": "HorizontalAlignment", "fullName": "Avalonia.Layout.HorizontalAlignment",
     "namespaces": ["https://github.com/avaloniaui"], "isEnum": true,
     "hintValues": ["Stretch", "Left", "Center", "Right"]},
    {"name": "BindingExtension", "fullName": "Avalonia.Data.BindingExtension",
     "namespaces": ["https://github.com/avaloniaui"], "isMarkupExtension": true,
     "properties": [
        {"name": "Path", "type": "{BindingPath}"}
     ]}
]}"#;

const AVALONIA_ROOT: &str = r#"<UserControl xmlns="https://github.com/avaloniaui""#;

fn metadata() -> Arc<Metadata> {
    Arc::new(Metadata::from_json(METADATA).unwrap())
}

fn complete_at_end(text: &str) -> Option<CompletionSet> {
    CompletionEngine::new().get_completions(Some(&metadata()), text, text.len(), None)
}

fn apply(text: &str, edits: &[TextManipulation]) -> String {
    let mut result = text.to_string();
    for edit in edits {
        edit.apply(&mut result);
    }
    result
}

#[test]
fn test_closing_tag_resolves_open_ancestor() {
    let text = "<UserControl><Button><Button.Styles><Style/></Button.Styles></";
    let set = complete_at_end(text).unwrap();
    assert_eq!(set.completions.len(), 1);
    assert_eq!(set.completions[0].insert_text, "/Button>");
}

#[test]
fn test_attribute_name_scenario() {
    let text = "<UserControl HorizontalAlign";
    let set = complete_at_end(text).unwrap();
    let item = set
        .completions
        .iter()
        .find(|c| c.display_text == "HorizontalAlignment")
        .unwrap();
    assert_eq!(item.insert_text, "HorizontalAlignment=\"\"");
    assert_eq!(set.start_position, "<UserControl ".len());
}

#[test]
fn test_binding_path_scenario() {
    let text = "<UserControl x:DataType=\"Button\"><Button Tag=\"{Binding Conte";
    let set = complete_at_end(text).unwrap();
    let content = set
        .completions
        .iter()
        .find(|c| c.display_text == "Content")
        .unwrap();
    assert_eq!(content.kind, CompletionKind::DataProperty);
}

#[test]
fn test_ranking_groups_kinds() {
    let text = format!("{}><Button ", AVALONIA_ROOT);
    let set = complete_at_end(&text).unwrap();
    let items = &set.completions;

    let last_property = items
        .iter()
        .rposition(|c| c.kind == CompletionKind::Property)
        .unwrap();
    let first_class = items
        .iter()
        .position(|c| c.kind == CompletionKind::Class)
        .unwrap();
    assert!(last_property < first_class);

    for pair in items.windows(2) {
        if pair[0].kind == pair[1].kind {
            assert!(pair[0].display_text <= pair[1].display_text);
        }
    }
}

#[test]
fn test_no_completions_without_context() {
    let metadata = metadata();
    let mut engine = CompletionEngine::new();
    assert!(engine.get_completions(Some(&metadata), "", 0, None).is_none());
    assert!(engine.get_completions(Some(&metadata), "<Button ", 0, None).is_none());
    assert!(engine.get_completions(None, "<Button ", 8, None).is_none());
}

#[test]
fn test_parser_reports_attribute_value() {
    for text in [
        "<Tag attr=\"value\">text</Tag>",
        "<Root><Tag attr='a b c'/></Root>",
    ] {
        let start = text.find("attr=").unwrap() + 6;
        let end = start + text[start..].find(['"', '\'']).unwrap();
        for offset in start..=end {
            let state = xml_parser::parse(text, 0, offset);
            assert_eq!(state.state(), ParserState::AttributeValue, "{} at {}", text, offset);
            assert_eq!(state.attribute_name(), Some("attr"));
        }
    }
}

#[test]
fn test_manipulator_rename_scenario() {
    let text = "<AlphaBeta></Alpha>";
    let edits = compute(text, 10, &TextChange::insert(6, "Beta"));
    assert_eq!(apply(text, &edits), "<AlphaBeta></AlphaBeta>");
}

#[test]
fn test_manipulator_rename_whole_name() {
    let text = "<Gamma></Alpha>";
    let edits = compute(text, 6, &TextChange::replace(1, "Alpha", "Gamma"));
    assert_eq!(
        edits,
        vec![TextManipulation::delete(9, 14), TextManipulation::insert(9, "Gamma")]
    );
    assert_eq!(apply(text, &edits), "<Gamma></Gamma>");
}

#[test]
fn test_manipulator_auto_close_scenario() {
    let text = "<Tag/";
    let edits = compute(text, 5, &TextChange::insert(4, "/"));
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].kind, ManipulationKind::Insert);
    assert_eq!(apply(text, &edits), "<Tag/>");
}

#[test]
fn test_manipulations_sorted_descending() {
    let text = "<Tag/</Tag>";
    let edits = compute(text, 5, &TextChange::insert(4, "/"));
    assert!(edits.windows(2).all(|pair| pair[0].start >= pair[1].start));
    assert_eq!(apply(text, &edits), "<Tag/>");
}

#[test]
fn test_metadata_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("metadata.json");
    fs::write(&path, METADATA).unwrap();

    let metadata = Metadata::load(&path).unwrap();
    assert!(metadata.find_type("Avalonia.Controls.Button").is_some());

    let missing = Metadata::load(&temp.path().join("missing.json"));
    assert!(matches!(missing, Err(LoadError::NotFound(_))));
}

#[test]
fn test_engine_config_cap() {
    let config = EngineConfig::from_yaml("completion:\n  max_results: 2\n").unwrap();
    let mut engine = CompletionEngine::with_config(config);
    let text = format!("{}><Button ", AVALONIA_ROOT);
    let set = engine
        .get_completions(Some(&metadata()), &text, text.len(), None)
        .unwrap();
    assert_eq!(set.completions.len(), 2);
}

fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_xaml-intellisense"));
    command.env_remove("XAML_METADATA").env_remove("XAML_ASSEMBLY");
    command
}

fn write_metadata(dir: &Path) -> String {
    let path = dir.join("metadata.json");
    fs::write(&path, METADATA).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_cli_complete_json() {
    let temp = TempDir::new().unwrap();
    let metadata = write_metadata(temp.path());
    let file = temp.path().join("View.axaml");
    let source = format!("{}><Bu", AVALONIA_ROOT);
    fs::write(&file, &source).unwrap();

    let output = binary()
        .args(["--metadata", &metadata, "--format", "json", "complete"])
        .arg(&file)
        .arg(source.len().to_string())
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["startPosition"], source.len() - 2);
    assert_eq!(json["completions"][0]["displayText"], "Button");
    assert_eq!(json["completions"][0]["kind"], "class");
}

#[test]
fn test_cli_complete_uses_config_next_to_file() {
    let temp = TempDir::new().unwrap();
    let metadata = write_metadata(temp.path());
    fs::write(
        temp.path().join(".xaml-intellisense.yaml"),
        "completion:\n  max_results: 1\n",
    )
    .unwrap();
    let file = temp.path().join("View.axaml");
    let source = format!("{}><Button ", AVALONIA_ROOT);
    fs::write(&file, &source).unwrap();

    let output = binary()
        .args(["--metadata", &metadata, "--format", "json", "complete"])
        .arg(&file)
        .arg(source.len().to_string())
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["completions"].as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_complete_text_without_results() {
    let temp = TempDir::new().unwrap();
    let metadata = write_metadata(temp.path());
    let file = temp.path().join("View.axaml");
    fs::write(&file, "<UserControl>plain text").unwrap();

    let output = binary()
        .args(["--metadata", &metadata, "complete"])
        .arg(&file)
        .arg("20")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No completions found"));
}

#[test]
fn test_cli_complete_requires_metadata() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("View.axaml");
    fs::write(&file, "<Bu").unwrap();

    let output = binary()
        .arg("complete")
        .arg(&file)
        .arg("3")
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("metadata"));
}

#[test]
fn test_cli_context_from_stdin() {
    let source = "<Button Content=\"Hel";
    let mut child = binary()
        .args(["--format", "json", "context", "-"])
        .arg(source.len().to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn process");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(source.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["state"], "AttributeValue");
    assert_eq!(json["tagName"], "Button");
    assert_eq!(json["attributeName"], "Content");
    assert_eq!(json["attributeValue"], "Hel");
}

#[test]
fn test_cli_manipulate_apply() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("View.axaml");
    fs::write(&file, "<AlphaBeta></Alpha>").unwrap();

    let output = binary()
        .arg("manipulate")
        .arg(&file)
        .args(["10", "--new-text", "Beta", "--apply"])
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "<AlphaBeta></AlphaBeta>");
}

#[test]
fn test_cli_manipulate_json() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("View.axaml");
    fs::write(&file, "<Tag/").unwrap();

    let output = binary()
        .args(["--format", "json", "manipulate"])
        .arg(&file)
        .args(["5", "--new-text", "/"])
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["kind"], "insert");
    assert_eq!(json[0]["start"], 5);
    assert_eq!(json[0]["text"], ">");
}

#[test]
fn test_cli_manipulate_rejects_offset_past_end() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("View.axaml");
    fs::write(&file, "<Tag").unwrap();

    let output = binary()
        .arg("manipulate")
        .arg(&file)
        .args(["40", "--new-text", "/"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
}
