//! 模型输出 JSON 恢复模块
//! 从夹杂思考痕迹、代码围栏和散文的模型文本中提取 JSON 值

use log::{debug, warn};
use regex::Regex;
use serde_json::Value;

/// 从杂乱的模型输出中提取 JSON，失败返回 None，从不报错
pub fn extract_json(raw_text: &str) -> Option<Value> {
    let mut text = raw_text.trim().to_string();
    if text.is_empty() {
        warn!("Model output is empty");
        return None;
    }
    debug!("Raw model output: {}...", preview(&text, 200));

    // 服务端自身的 {"response": "..."} 包裹先解开
    if let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(&text) {
        if let Some(Value::String(inner)) = envelope.get("response") {
            debug!("Extracted 'response' field: {}...", preview(inner, 200));
            text = inner.trim().to_string();
        }
    }
    if text.is_empty() {
        warn!("Extracted response is empty");
        return None;
    }

    // 去掉思考块
    let think = Regex::new(r"(?s)<think>.*?</think>").unwrap();
    let thinking = Regex::new(r"(?s)<thinking>.*?</thinking>").unwrap();
    text = think.replace_all(&text, "").to_string();
    text = thinking.replace_all(&text, "").to_string();
    text = text.trim().to_string();

    // 去掉代码围栏
    text = strip_fences(&text);

    // 直接解析
    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return Some(value);
    }
    debug!("Direct JSON parsing failed, attempting bracket extraction");

    // 扫描第一段成对括号的候选
    let bracket = Regex::new(r"(\{[\s\S]*\}|\[[\s\S]*\])").unwrap();
    if let Some(found) = bracket.find(&text) {
        let candidate = found.as_str();
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
        // 单引号伪 JSON 修复
        let fixed = candidate.replace('\'', "\"").replace("None", "null");
        match serde_json::from_str::<Value>(&fixed) {
            Ok(value) => return Some(value),
            Err(e) => warn!("Failed to parse JSON candidate: {}", e),
        }
    }

    warn!("All JSON extraction attempts failed");
    None
}

/// 去掉前后代码围栏，语言标注一并去掉
fn strip_fences(text: &str) -> String {
    let mut out = text.trim();
    if out.starts_with("```") {
        out = match out.find('\n') {
            Some(pos) => &out[pos + 1..],
            None => out.trim_start_matches('`'),
        };
    }
    let mut out = out.trim().to_string();
    if out.ends_with("```") {
        out.truncate(out.len() - 3);
    }
    out.trim().to_string()
}

/// 日志预览截断，避免把整段模型输出写进日志
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_json() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_fence_without_language_tag() {
        let raw = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(raw), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_extract_with_surrounding_noise() {
        let raw = "noise {\"a\": 1} trailing";
        assert_eq!(extract_json(raw), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_single_quoted_pseudo_json() {
        let raw = "{'a': 1, 'b': None}";
        assert_eq!(extract_json(raw), Some(json!({"a": 1, "b": null})));
    }

    #[test]
    fn test_extract_not_json_at_all() {
        assert_eq!(extract_json("not json at all"), None);
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("   "), None);
    }

    #[test]
    fn test_extract_strips_think_blocks() {
        let raw = "<think>\nLet me reason about fractions first.\n</think>\n[{\"q\": \"x\"}]";
        assert_eq!(extract_json(raw), Some(json!([{"q": "x"}])));
    }

    #[test]
    fn test_extract_unwraps_response_envelope() {
        let raw = r#"{"model": "gpt-oss:20b", "response": "```json\n{\"a\": 2}\n```"}"#;
        assert_eq!(extract_json(raw), Some(json!({"a": 2})));
    }

    #[test]
    fn test_extract_object_without_envelope_passes_through() {
        let raw = r#"{"questions": []}"#;
        assert_eq!(extract_json(raw), Some(json!({"questions": []})));
    }

    #[test]
    fn test_extract_reasoning_preamble_before_array() {
        let raw = "Sure! Here are the questions:\n[{\"question\": \"What is 2 + 2?\"}]\nHope this helps.";
        assert_eq!(
            extract_json(raw),
            Some(json!([{"question": "What is 2 + 2?"}]))
        );
    }
}
