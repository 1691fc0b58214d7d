//! Tool result helpers

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Pretty-printed JSON of `data` as a single text content item
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize response: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct PhaseReply {
        phase: String,
        is_modeled_transition: bool,
    }

    #[test]
    fn test_json_success() {
        let reply = PhaseReply {
            phase: "design".to_string(),
            is_modeled_transition: true,
        };
        let result = json_success(&reply).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);

        let value: serde_json::Value = match &result.content[0].raw {
            rmcp::model::RawContent::Text(text) => serde_json::from_str(&text.text).unwrap(),
            other => panic!("expected text content, got {:?}", other),
        };
        assert_eq!(value["phase"], "design");
    }
}
