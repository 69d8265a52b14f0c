//! 题目归一化与校验模块
//! 把模型产出的松散 JSON 压成规范的题目结构，并做难度启发式估计与去重

use crate::models::{Difficulty, Question, QuestionType, TRUE_FALSE_OPTIONS};
use crate::services::extractor::preview;
use log::warn;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// 宽松转文本：数字、布尔照样收，缺失和 null 记为空串
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn field_text(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key).map(value_to_text).unwrap_or_default()
}

/// 归一化单题：类型同义词映射、按类型修复选项与答案、决定难度
///
/// `allowed_types` 给定时，解析出的类型不在其中的题目直接丢弃；
/// `target_difficulty` 给定时无条件覆盖题目难度，估计值只用于告警。
pub fn normalize_question(
    value: &Value,
    allowed_types: Option<&[QuestionType]>,
    target_difficulty: Option<Difficulty>,
) -> Option<Question> {
    let obj = value.as_object()?;

    let question_text = field_text(obj, "question").trim().to_string();
    let raw_type = field_text(obj, "type");
    let question_type = QuestionType::from_raw(&raw_type);

    if let Some(allowed) = allowed_types {
        if !allowed.contains(&question_type) {
            return None;
        }
    }

    let mut answer = field_text(obj, "answer").trim().to_string();
    let mut options: Vec<String> = obj
        .get("options")
        .and_then(Value::as_array)
        .map(|array| array.iter().map(value_to_text).collect())
        .unwrap_or_default();

    match question_type {
        QuestionType::Mcq => {
            // 答案不在选项里就拼进去：最多保留前三个已有选项再追加答案
            if !options.contains(&answer) {
                if options.len() >= 3 {
                    options.truncate(3);
                }
                options.push(answer.clone());
            }
            while options.len() < 4 {
                options.push(format!("Option {}", options.len() + 1));
            }
            options.truncate(4);
        }
        QuestionType::TrueFalse => {
            options = TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect();
            let raw_answer = answer.to_lowercase();
            answer = if matches!(raw_answer.as_str(), "true" | "t" | "correct") {
                TRUE_FALSE_OPTIONS[0].to_string()
            } else {
                TRUE_FALSE_OPTIONS[1].to_string()
            };
        }
        _ => {
            options.clear();
        }
    }

    let difficulty = match target_difficulty {
        Some(target) => {
            let estimated = estimate_difficulty(&question_text, &answer);
            if estimated != target {
                warn!(
                    "Difficulty mismatch for question '{}...': labeled {}, estimated {}, requested {}. Using requested difficulty.",
                    preview(&question_text, 50),
                    field_text(obj, "difficulty"),
                    estimated,
                    target
                );
            }
            target
        }
        None => estimate_difficulty(&question_text, &answer),
    };

    Some(Question {
        question: question_text,
        question_type,
        options,
        answer,
        topic: field_text(obj, "topic").trim().to_string(),
        subtopic: field_text(obj, "subtopic").trim().to_string(),
        difficulty,
    })
}

/// 结构有效性判定，不合格的题目整题丢弃
pub fn is_valid(question: &Question) -> bool {
    if question.question.trim().is_empty() {
        return false;
    }
    match question.question_type {
        QuestionType::Mcq => {
            question.options.len() >= 2 && !question.answer.trim().is_empty()
        }
        QuestionType::TrueFalse => TRUE_FALSE_OPTIONS.contains(&question.answer.as_str()),
        _ => !question.answer.trim().is_empty(),
    }
}

/// 难度启发式：看数字量级和步骤数
///
/// 步骤数从 1 起算，只有文本里出现运算符或运算关键词时才按
/// " and " 与逗号各加一步。
pub fn estimate_difficulty(question: &str, answer: &str) -> Difficulty {
    let text = format!("{} {}", question, answer);
    let lower = text.to_lowercase();

    let number_pattern = Regex::new(r"\d+\.?\d*").unwrap();
    let max_number = number_pattern
        .find_iter(&text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .fold(0.0_f64, f64::max);

    const ARITHMETIC_CUES: [&str; 11] = [
        "+", "-", "*", "/", "average", "total", "difference", "sum", "product", "divide",
        "multiply",
    ];
    let mut steps = 1usize;
    if ARITHMETIC_CUES.iter().any(|cue| lower.contains(cue)) {
        steps += lower.matches(" and ").count() + lower.matches(',').count();
    }

    if max_number < 20.0 && steps <= 1 {
        Difficulty::Easy
    } else if max_number < 100.0 && steps <= 2 {
        Difficulty::Medium
    } else if max_number < 1000.0 && steps > 2 {
        Difficulty::Hard
    } else {
        // 大数小步骤之类的模糊组合
        Difficulty::Medium
    }
}

/// 按题干文本去重（大小写不敏感、去首尾空白），保留先出现的一条
pub fn deduplicate_questions(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(questions.len());
    for question in questions {
        let key = question.question.trim().to_lowercase();
        if !key.is_empty() && seen.insert(key) {
            unique.push(question);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mcq_value() -> Value {
        json!({
            "question": "Mali buys 3 mangoes for 15 baht. How much is one mango?",
            "type": "mcq",
            "options": ["5 baht", "3 baht", "15 baht"],
            "answer": "5 baht",
            "topic": "Division",
            "subtopic": "Unit price",
            "difficulty": "Easy"
        })
    }

    #[test]
    fn test_normalize_maps_synonyms_to_canonical_types() {
        for (raw, expected) in [
            ("multiple_choice", QuestionType::Mcq),
            ("tf", QuestionType::TrueFalse),
            ("short", QuestionType::ShortAnswer),
            ("fib", QuestionType::FillInTheBlank),
            ("calculation", QuestionType::Numerical),
            ("essay", QuestionType::ShortAnswer),
        ] {
            let value = json!({"question": "What is 4?", "type": raw, "answer": "4"});
            let normalized = normalize_question(&value, None, None).unwrap();
            assert_eq!(normalized.question_type, expected, "raw type {}", raw);
        }
    }

    #[test]
    fn test_normalize_rejects_types_outside_allowed_set() {
        let value = json!({"question": "Is 4 even?", "type": "tf", "answer": "true"});
        let allowed = [QuestionType::Mcq];
        assert!(normalize_question(&value, Some(&allowed), None).is_none());
    }

    #[test]
    fn test_mcq_options_padded_to_four() {
        let value = json!({
            "question": "What is 2 + 2?",
            "type": "MCQ",
            "options": ["4"],
            "answer": "4"
        });
        let normalized = normalize_question(&value, None, None).unwrap();
        assert_eq!(normalized.options.len(), 4);
        assert_eq!(normalized.options[0], "4");
        assert_eq!(normalized.options[1], "Option 2");
        assert!(normalized.options.contains(&normalized.answer));
    }

    #[test]
    fn test_mcq_answer_spliced_into_options() {
        let value = json!({
            "question": "What is 6 * 7?",
            "type": "MCQ",
            "options": ["40", "41", "43", "44"],
            "answer": "42"
        });
        let normalized = normalize_question(&value, None, None).unwrap();
        assert_eq!(normalized.options, vec!["40", "41", "43", "42"]);
    }

    #[test]
    fn test_mcq_numeric_options_coerced_to_text() {
        let value = json!({
            "question": "What is 9 + 1?",
            "type": "MCQ",
            "options": [10, 11, 12, 13],
            "answer": 10
        });
        let normalized = normalize_question(&value, None, None).unwrap();
        assert_eq!(normalized.answer, "10");
        assert_eq!(normalized.options[0], "10");
    }

    #[test]
    fn test_true_false_forced_to_canonical_domain() {
        for (raw, expected) in [
            ("true", "Correct"),
            ("T", "Correct"),
            ("correct", "Correct"),
            ("false", "Wrong"),
            ("no idea", "Wrong"),
        ] {
            let value = json!({"question": "Is 7 prime?", "type": "true/false", "answer": raw});
            let normalized = normalize_question(&value, None, None).unwrap();
            assert_eq!(normalized.options, vec!["Correct", "Wrong"]);
            assert_eq!(normalized.answer, expected, "raw answer {}", raw);
        }
    }

    #[test]
    fn test_target_difficulty_always_wins() {
        let normalized =
            normalize_question(&mcq_value(), None, Some(Difficulty::Hard)).unwrap();
        assert_eq!(normalized.difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_difficulty_estimated_when_no_target() {
        let value = json!({
            "question": "What is 5 + 3?",
            "type": "short",
            "answer": "8",
            "difficulty": "Hard"
        });
        let normalized = normalize_question(&value, None, None).unwrap();
        assert_eq!(normalized.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize_question(&mcq_value(), None, Some(Difficulty::Easy)).unwrap();
        let round_tripped = serde_json::to_value(&first).unwrap();
        let second =
            normalize_question(&round_tripped, None, Some(Difficulty::Easy)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_is_valid_per_type() {
        let mut question = normalize_question(&mcq_value(), None, None).unwrap();
        assert!(is_valid(&question));

        question.answer = String::new();
        assert!(!is_valid(&question));

        let tf = Question {
            question: "Is 10 > 3?".to_string(),
            question_type: QuestionType::TrueFalse,
            options: vec!["Correct".to_string(), "Wrong".to_string()],
            answer: "Correct".to_string(),
            topic: String::new(),
            subtopic: String::new(),
            difficulty: Difficulty::Easy,
        };
        assert!(is_valid(&tf));
        let mut bad_tf = tf.clone();
        bad_tf.answer = "True".to_string();
        assert!(!is_valid(&bad_tf));

        let mut empty_text = tf;
        empty_text.question = "  ".to_string();
        assert!(!is_valid(&empty_text));
    }

    #[test]
    fn test_estimate_difficulty_concrete_cases() {
        assert_eq!(estimate_difficulty("What is 5 + 3?", "8"), Difficulty::Easy);
        assert_eq!(
            estimate_difficulty("A shop sells 45 eggs and 30 more arrive. Total?", "75"),
            Difficulty::Medium
        );
        assert_eq!(
            estimate_difficulty(
                "A farmer sells 500 kg of rice and 120 kg of corn and 80 kg of beans. What is the total weight?",
                "700"
            ),
            Difficulty::Hard
        );
        // 无数字、无运算提示
        assert_eq!(
            estimate_difficulty("Name the capital of Thailand.", "Bangkok"),
            Difficulty::Easy
        );
    }

    #[test]
    fn test_large_numbers_with_few_steps_fall_back_to_medium() {
        assert_eq!(
            estimate_difficulty("What is 2500 rounded to the nearest thousand?", "3000"),
            Difficulty::Medium
        );
    }

    #[test]
    fn test_deduplicate_is_case_insensitive() {
        let base = normalize_question(&mcq_value(), None, None).unwrap();
        let mut upper = base.clone();
        upper.question = format!("  {}  ", base.question.to_uppercase());
        let mut other = base.clone();
        other.question = "What is 1 + 1?".to_string();

        let unique = deduplicate_questions(vec![base.clone(), upper, other]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0], base);
    }

    #[test]
    fn test_deduplicate_drops_empty_text() {
        let mut question = normalize_question(&mcq_value(), None, None).unwrap();
        question.question = "   ".to_string();
        assert!(deduplicate_questions(vec![question]).is_empty());
    }
}
