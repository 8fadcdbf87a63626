use serde_json::{Map, Value};

/// Plain text of an issue description.
///
/// REST v2 sends a string; v3 sends an Atlassian Document Format tree. Inline
/// nodes are concatenated as-is, block nodes and hard breaks end a line.
pub fn description_text(value: &Value) -> String {
    let mut out = String::new();
    walk(value, &mut out);
    out.trim().to_string()
}

fn walk(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(nodes) => nodes.iter().for_each(|n| walk(n, out)),
        Value::Object(node) => {
            match node.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = node.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
                Some("hardBreak") => out.push('\n'),
                Some("mention") => out.push_str(attr(node, "text")),
                Some("emoji") => out.push_str(attr(node, "shortName")),
                Some("inlineCard") => out.push_str(attr(node, "url")),
                _ => {
                    if let Some(content) = node.get("content") {
                        walk(content, out);
                    }
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\n');
                    }
                }
            }
        }
        _ => {}
    }
}

fn attr<'a>(node: &'a Map<String, Value>, name: &str) -> &'a str {
    node.get("attrs")
        .and_then(|a| a.get(name))
        .and_then(Value::as_str)
        .unwrap_or_default()
}
