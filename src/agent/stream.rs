use serde::Deserialize;
use serde_json::Value;

/// Events from the `claude` CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "user")]
    User {},

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
        /// Present when the CLI was asked for structured output.
        #[serde(default)]
        structured_output: Option<Value>,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// Extract a human-readable description from a tool use event
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str);
    match name {
        "Read" => format!("Reading: {}", field("file_path").unwrap_or("file")),
        "Write" => format!("Creating: {}", field("file_path").unwrap_or("file")),
        "Edit" => format!("Editing: {}", field("file_path").unwrap_or("file")),
        "Bash" => format!(
            "Running: {}",
            truncate_str(field("command").unwrap_or("command"), 40)
        ),
        "Glob" | "Grep" => format!("Searching: {}", field("pattern").unwrap_or("*")),
        _ => name.to_string(),
    }
}

/// Truncate a string with ellipsis, respecting char boundaries
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assistant_text() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello world"}]},"session_id":"abc"}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::Assistant { message, .. } = event else {
            panic!("Expected Assistant event");
        };
        let ContentBlock::Text { text } = &message.content[0] else {
            panic!("Expected Text");
        };
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn test_parse_assistant_tool_use() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"/foo/bar.rs"},"id":"123"}]}}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::Assistant { message, .. } = event else {
            panic!("Expected Assistant event");
        };
        assert!(matches!(&message.content[0], ContentBlock::ToolUse { name, .. } if name == "Read"));
    }

    #[test]
    fn test_unknown_content_block_tolerated() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hmm"}]}}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::Assistant { message, .. } = event else {
            panic!("Expected Assistant event");
        };
        assert!(matches!(message.content[0], ContentBlock::Other));
    }

    #[test]
    fn test_parse_result_with_structured_output() {
        let line = r#"{"type":"result","subtype":"success","result":"done","is_error":false,"structured_output":{"ok":true}}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::Result {
            result,
            is_error,
            structured_output,
            ..
        } = event
        else {
            panic!("Expected Result event");
        };
        assert_eq!(result.as_deref(), Some("done"));
        assert!(!is_error);
        assert_eq!(structured_output, Some(json!({"ok": true})));
    }

    #[test]
    fn test_parse_user_and_system_events() {
        let user = r#"{"type":"user","message":{"content":[]},"tool_use_result":{}}"#;
        assert!(matches!(
            serde_json::from_str::<StreamEvent>(user).unwrap(),
            StreamEvent::User {}
        ));
        let system = r#"{"type":"system","subtype":"init","cwd":"/tmp"}"#;
        assert!(matches!(
            serde_json::from_str::<StreamEvent>(system).unwrap(),
            StreamEvent::System { .. }
        ));
    }

    #[test]
    fn test_describe_tool_use() {
        assert_eq!(
            describe_tool_use("Read", &json!({"file_path": "src/main.rs"})),
            "Reading: src/main.rs"
        );
        let long = "x".repeat(100);
        let desc = describe_tool_use("Bash", &json!({"command": long}));
        assert!(desc.ends_with("..."));
        assert_eq!(describe_tool_use("WebFetch", &json!({})), "WebFetch");
    }
}
