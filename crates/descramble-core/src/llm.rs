//! AI collaborator contract.
//!
//! The pipeline treats the language model as an external collaborator behind
//! a narrow chat interface; transport, retries and authentication are the
//! implementor's concern. Restoration stages must survive any response shape
//! the collaborator produces, so the tolerant JSON extraction lives here too.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { temperature: 0.2, max_tokens: 4096 }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Chat transport supplied by the embedding application.
pub trait LlmClient: Send + Sync {
    fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse>;
}

/// Pulls a JSON document out of a chat response, tolerating markdown fences
/// and surrounding prose. Returns `None` when nothing parseable is present;
/// callers then treat the response as analysis-only text.
pub fn extract_json(content: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(content.trim()) {
        return Some(value);
    }
    for fence in ["```json", "```"] {
        if let Some(start) = content.find(fence) {
            let rest = &content[start + fence.len()..];
            if let Some(end) = rest.find("```") {
                if let Ok(value) = serde_json::from_str(rest[..end].trim()) {
                    return Some(value);
                }
            }
        }
    }
    // Last resort: the outermost brace-delimited region.
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        serde_json::from_str(content[start..=end].trim()).ok()
    } else {
        None
    }
}

/// Prompt builders for the deobfuscation-specific conversations.
pub mod prompts {
    use super::ChatMessage;
    use crate::model::VmFeatures;

    pub fn vm_analysis(code: &str, features: &VmFeatures) -> Vec<ChatMessage> {
        let hints = format!(
            "Structural hints: {} dispatcher cases, complexity {}, switch dispatch: {}, \
             instruction array: {}, program counter: {}.",
            features.instruction_count,
            features.complexity.as_str(),
            features.has_switch,
            features.has_instruction_array,
            features.has_program_counter,
        );
        vec![
            ChatMessage::system(
                "You are a JavaScript reverse engineer. Analyse virtual-machine protected \
                 code and answer with a single JSON object of the form \
                 {\"vmStructure\":{\"interpreterLoop\":\"\",\"bytecodeVar\":\"\",\"pcVar\":\"\",\
                 \"stackVar\":\"\"},\"instructionMap\":{},\"restorationApproach\":\"\",\
                 \"simplifiedLogic\":\"\"}. Put recovered source in simplifiedLogic.",
            ),
            ChatMessage::user(format!("{hints}\n\nCode:\n```javascript\n{code}\n```")),
        ]
    }

    pub fn string_array_recovery(declaration: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You recover string arrays from obfuscated JavaScript. Respond with only a \
                 JSON array of strings in declaration order.",
            ),
            ChatMessage::user(format!(
                "Recover the final contents of this string array declaration:\n{declaration}"
            )),
        ]
    }

    pub fn summary(code: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "Summarise what the following deobfuscated JavaScript does in a short \
                 paragraph. Note anything that still looks machine-generated.",
            ),
            ChatMessage::user(code.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_json() {
        let value = extract_json("{\"a\": 1}").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extracts_fenced_json() {
        let content = "Here is the analysis:\n```json\n{\"vmStructure\": {}}\n```\nDone.";
        assert!(extract_json(content).is_some());
    }

    #[test]
    fn extracts_brace_region_from_prose() {
        let content = "The structure is {\"pcVar\": \"i\"} as far as I can tell.";
        let value = extract_json(content).unwrap();
        assert_eq!(value["pcVar"], "i");
    }

    #[test]
    fn analysis_only_text_yields_none() {
        assert!(extract_json("This VM uses a stack machine with 12 opcodes.").is_none());
    }
}
