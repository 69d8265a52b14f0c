//! 题目评审模块
//! 两级评审：整批粗筛找出可疑题，逐题详评产出结构化的问题与建议

use crate::config::{ModelConfig, RetryPolicy};
use crate::models::{BatchCritique, BatchFeedback, CritiqueFeedback, Difficulty, Question};
use crate::services::extractor::extract_json;
use crate::services::ollama::ModelRunner;
use crate::services::question::estimate_difficulty;
use log::{info, warn};
use serde_json::Value;

/// 题目评审器
pub struct QuestionEvaluator<'a, R: ModelRunner> {
    runner: &'a R,
    config: &'a ModelConfig,
}

impl<'a, R: ModelRunner> QuestionEvaluator<'a, R> {
    pub fn new(runner: &'a R, config: &'a ModelConfig) -> Self {
        Self { runner, config }
    }

    /// 整批粗筛：一次便宜的调用标记可疑下标。
    /// 解析失败重试用尽后放行全部（批级失败宁可漏报，不阻塞流水线）。
    pub async fn batch_critique(
        &self,
        questions: &[Question],
        topic_hint: &str,
        difficulty: Difficulty,
    ) -> BatchCritique {
        let questions_json = serde_json::to_string_pretty(questions).unwrap_or_default();
        let prompt = format!(
            r#"CRITIQUE THE FOLLOWING QUESTIONS AND RETURN JSON ONLY.

IMPORTANT: Return ONLY valid JSON, no thinking, no explanations.

Topic: {topic}
Difficulty: {difficulty}

Analyze these questions and return a JSON object with:
{{
    "flagged": [list of indices of problematic questions],
    "feedback": [
        {{
            "index": 0,
            "approved": true/false,
            "comments": "brief reason"
        }}
    ]
}}

Questions to critique:
{questions}

RETURN PURE JSON ONLY:"#,
            topic = if topic_hint.is_empty() { "General" } else { topic_hint },
            difficulty = difficulty,
            questions = questions_json,
        );

        let policy = RetryPolicy::attempts(2);
        for attempt in 1..=policy.max_attempts {
            info!("Batch critique attempt {}/{}", attempt, policy.max_attempts);
            let Some(raw) = self.runner.run(&self.config.critic_model, &prompt).await else {
                warn!("No response from critic model");
                continue;
            };
            let Some(parsed) = extract_json(&raw) else {
                warn!("Unusable batch critique output on attempt {}", attempt);
                continue;
            };
            if let Some(result) = parse_batch_critique(&parsed, questions.len()) {
                info!(
                    "Batch critique completed successfully, {} flagged",
                    result.flagged.len()
                );
                return result;
            }
            warn!("Invalid batch critique response on attempt {}", attempt);
        }

        warn!("Using fallback: approving all questions");
        BatchCritique {
            flagged: vec![],
            feedback: (0..questions.len())
                .map(|index| BatchFeedback {
                    index,
                    approved: true,
                    comments: "Fallback approval".to_string(),
                })
                .collect(),
        }
    }

    /// 逐题详评：每题一条反馈，顺序与输入一致。
    /// 解析失败重试用尽后全部判不通过（点名要详评就不能默默放行）。
    pub async fn critique_questions(
        &self,
        questions: &[Question],
        topic_hint: &str,
        difficulty: Difficulty,
    ) -> Vec<CritiqueFeedback> {
        if questions.is_empty() {
            return vec![];
        }

        let questions_json = serde_json::to_string_pretty(questions).unwrap_or_default();
        let prompt = format!(
            r#"Evaluate the following {count} questions for a quiz on {topic} ({difficulty} difficulty).

For each question, check:
1. Factual accuracy (is the answer correct?).
2. Topic relevance (does it match {topic}?).
3. Difficulty alignment (does it match {difficulty}? Use: Easy: <20, 1-step; Medium: <100, 2 steps; Hard: <1000, multi-step).
4. Clarity (is it clear and well-phrased?).
5. For MCQ: Are options realistic distractors (common mistakes, plausible values)?
6. Variety: Does it avoid repeating the same theme or scenario?
7. Cognitive mix: Is there a balance of direct calculation and conceptual/identify-type questions?
8. Language: Simple, short English for Grade 7-8 in Thailand?

Important:
- You MUST return feedback for every question.
- Each feedback object MUST include:
  * "index": the question index (0-based),
  * "issues": a non-empty list of strings (if no real issues, use ["Looks good"]),
  * "suggestions": a list of improvements (can be empty only if issues=["Looks good"]),
  * "approved": true or false.
- Do NOT skip any question.
- Return ONLY a valid JSON array, no thinking, no explanations.

Input questions:
{questions}"#,
            count = questions.len(),
            topic = if topic_hint.is_empty() { "General" } else { topic_hint },
            difficulty = difficulty,
            questions = questions_json,
        );

        let policy = RetryPolicy::attempts(2);
        let mut entries: Option<Vec<Value>> = None;
        for attempt in 1..=policy.max_attempts {
            info!(
                "Detailed critique attempt {}/{}",
                attempt, policy.max_attempts
            );
            let Some(raw) = self.runner.run(&self.config.critic_model, &prompt).await else {
                warn!("No response from critic model");
                continue;
            };
            let parsed = extract_json(&raw);
            match parsed.as_ref().and_then(Value::as_array) {
                Some(array) if array.len() == questions.len() => {
                    info!("Detailed critique completed successfully");
                    entries = Some(array.clone());
                    break;
                }
                _ => warn!("Invalid detailed critique response on attempt {}", attempt),
            }
        }

        let mut feedback = match entries {
            Some(entries) => collect_feedback(&entries, questions.len()),
            None => {
                warn!("Using fallback: rejecting all questions in detailed critique");
                (0..questions.len())
                    .map(|index| CritiqueFeedback {
                        index,
                        approved: false,
                        issues: vec!["Critique failed".to_string()],
                        suggestions: vec![],
                    })
                    .collect()
            }
        };

        for (question, entry) in questions.iter().zip(feedback.iter_mut()) {
            enforce_feedback(question, entry, difficulty);
            info!(
                "Critique for question {}: approved={}, issues={:?}, suggestions={:?}",
                entry.index, entry.approved, entry.issues, entry.suggestions
            );
        }
        feedback
    }

    /// 修复循环里的单题复评
    pub async fn critique_single(
        &self,
        question: &Question,
        topic_hint: &str,
        difficulty: Difficulty,
    ) -> CritiqueFeedback {
        self.critique_questions(std::slice::from_ref(question), topic_hint, difficulty)
            .await
            .remove(0)
    }
}

/// 解析粗筛响应，要求带 flagged 键的对象
fn parse_batch_critique(parsed: &Value, count: usize) -> Option<BatchCritique> {
    let obj = parsed.as_object()?;
    let flagged_raw = obj.get("flagged")?.as_array()?;
    let mut flagged: Vec<usize> = flagged_raw
        .iter()
        .filter_map(Value::as_u64)
        .map(|v| v as usize)
        .filter(|index| *index < count)
        .collect();
    flagged.sort_unstable();
    flagged.dedup();

    let feedback = obj
        .get("feedback")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(pos, entry)| {
                    let entry = entry.as_object()?;
                    let index = entry
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|v| v as usize)
                        .unwrap_or(pos);
                    (index < count).then(|| BatchFeedback {
                        index,
                        approved: entry
                            .get("approved")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        comments: entry
                            .get("comments")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(BatchCritique { flagged, feedback })
}

/// 把详评数组按 index（缺失时按位置）填入每题的槽位，坏条目记空白反馈
fn collect_feedback(entries: &[Value], count: usize) -> Vec<CritiqueFeedback> {
    let mut slots: Vec<CritiqueFeedback> = (0..count)
        .map(|index| CritiqueFeedback {
            index,
            approved: false,
            issues: vec![],
            suggestions: vec![],
        })
        .collect();

    for (pos, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let index = obj
            .get("index")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(pos);
        if index >= count {
            continue;
        }
        let mut issues = string_list(obj.get("issues"));
        if issues.is_empty() {
            // 有的模型只回一条 comments
            if let Some(comments) = obj.get("comments").and_then(Value::as_str) {
                if !comments.trim().is_empty() {
                    issues.push(comments.trim().to_string());
                }
            }
        }
        slots[index] = CritiqueFeedback {
            index,
            approved: obj
                .get("approved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            issues,
            suggestions: string_list(obj.get("suggestions")),
        };
    }
    slots
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 反馈完整性强制：难度不符是硬闸门，其余缺口补默认文案
fn enforce_feedback(question: &Question, feedback: &mut CritiqueFeedback, requested: Difficulty) {
    let estimated = estimate_difficulty(&question.question, &question.answer);
    if estimated != requested {
        feedback.issues.push(format!(
            "Difficulty mismatch: content suggests {}, but requested difficulty is {}.",
            estimated, requested
        ));
        feedback.suggestions.push(format!(
            "Adjust question content to match {} or update label.",
            requested
        ));
        feedback.approved = false;
    } else if feedback.issues.is_empty() {
        feedback.issues = vec!["Looks good".to_string()];
        feedback.approved = true;
    }

    if feedback.suggestions.is_empty() && feedback.issues != ["Looks good"] {
        feedback
            .suggestions
            .push("Rephrase question or simplify wording".to_string());
    }
}
