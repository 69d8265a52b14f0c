//! 题目生成模块
//! 负责整卷生成与单题修复的提示词工程和模型调用

use crate::config::{ModelConfig, RetryPolicy};
use crate::models::{CritiqueFeedback, Difficulty, GenerationTask, Question};
use crate::services::extractor::{extract_json, preview};
use crate::services::ollama::ModelRunner;
use crate::services::question::{is_valid, normalize_question};
use log::{error, info, warn};
use serde_json::Value;

/// 生成与修复提示词
pub struct QuizPromptBuilder;

impl QuizPromptBuilder {
    /// 整卷生成提示词
    pub fn full_quiz(task: &GenerationTask) -> String {
        let settings = &task.settings;
        let topics_json = serde_json::to_string_pretty(&settings.topics).unwrap_or_default();
        let counts_json =
            serde_json::to_string_pretty(&settings.question_types).unwrap_or_default();

        format!(
            r#"Generate a quiz in JSON format with the following details:
- Title: '{title}'
- Grade: {grade}
- Number of questions: {num_questions}
- Difficulty: {difficulty}
- Activity type: {activity_type}
- Topics: {topics}
- Question types: {counts}

CRITICAL REQUIREMENTS:
- ENGLISH LEVEL: Use VERY SIMPLE English suitable for ESL learners (Grade 7-8 Thailand)
- THAI CONTEXT: Use everyday Thai situations (baht, food, markets, schools, temples, transportation, family life)
- MATH LEVEL: Align with Thailand Basic Education Curriculum for Grade 7/8
- SENTENCE STRUCTURE: Short, clear sentences. Avoid complex grammar.
- VARIETY: Do not repeat the same theme or scenario across questions.

Difficulty: {difficulty}
- Easy: Single-step problems with numbers <20
- Medium: 1-2 step problems with numbers <100
- Hard: Multi-step problems with numbers <1000

Return a JSON object with:
- 'title': string
- 'settings': object with 'topics', 'difficulty', 'grade', 'activity_type'
- 'questions': list of question objects, each with 'question', 'type', 'options', 'answer', 'topic', 'subtopic', 'difficulty'
Ensure the output is valid JSON and contains only the requested quiz structure."#,
            title = task.title,
            grade = settings.grade,
            num_questions = task.num_questions(),
            difficulty = settings.difficulty,
            activity_type = settings.activity_type,
            topics = topics_json,
            counts = counts_json,
        )
    }

    /// 单题修复提示词，嵌入原题与评审反馈
    pub fn refine(question: &Question, feedback: &CritiqueFeedback, target: Difficulty) -> String {
        let question_json = serde_json::to_string_pretty(question).unwrap_or_default();
        format!(
            r#"Refine the following {qtype} question for {topic} ({subtopic}, {difficulty} difficulty) based on feedback.

Context:
- Students are Grade 7 or 8 in Thailand.
- Keep the English very simple.
- Use Thai everyday life examples (baht, food, rice, football, tuk-tuks, school, transport, farming, etc.).
- Stick to add, subtract, multiply, divide, squares, cubes, indices, roots.
- Ensure it is different in theme from other questions in the batch.
- For MCQs, provide realistic distractors.
- Follow difficulty rules: Easy (<20, 1-step), Medium (<100, 2 steps), Hard (<1000, multi-step).
- MUST match the requested difficulty: {difficulty}.

Original question: {question_json}
Issues: {issues:?}
Suggestions: {suggestions:?}
Return a single JSON object with fields: question, type, options, answer, topic, subtopic, difficulty."#,
            qtype = question.question_type,
            topic = question.topic,
            subtopic = question.subtopic,
            difficulty = target,
            question_json = question_json,
            issues = feedback.issues,
            suggestions = feedback.suggestions,
        )
    }
}

/// 题目生成器
pub struct QuestionGenerator<'a, R: ModelRunner> {
    runner: &'a R,
    config: &'a ModelConfig,
}

impl<'a, R: ModelRunner> QuestionGenerator<'a, R> {
    pub fn new(runner: &'a R, config: &'a ModelConfig) -> Self {
        Self { runner, config }
    }

    /// 整卷生成：带重试地要一个含 questions 数组的 JSON 对象，
    /// 全部失败返回 None，由调用方按整单失败处理
    pub async fn generate_quiz(&self, task: &GenerationTask) -> Option<Vec<Value>> {
        let prompt = QuizPromptBuilder::full_quiz(task);
        let policy = RetryPolicy::attempts(3);

        for attempt in 1..=policy.max_attempts {
            info!(
                "Attempting quiz generation (attempt {}/{})",
                attempt, policy.max_attempts
            );
            let Some(raw) = self.runner.run(&self.config.generator_model, &prompt).await else {
                warn!("No response from generation model");
                continue;
            };
            let Some(parsed) = extract_json(&raw) else {
                warn!("Unusable generator output on attempt {}", attempt);
                continue;
            };
            if let Some(questions) = parsed.get("questions").and_then(Value::as_array) {
                info!(
                    "Quiz generated successfully with {} raw questions",
                    questions.len()
                );
                return Some(questions.clone());
            }
            warn!("Invalid quiz response on attempt {}", attempt);
        }

        error!("Failed to generate quiz after all retries");
        None
    }

    /// 单题修复：一次调用，产出经过归一化和校验的替换题，失败返回 None
    pub async fn refine_question(
        &self,
        question: &Question,
        feedback: &CritiqueFeedback,
        target: Difficulty,
    ) -> Option<Question> {
        info!(
            "Refining question: {}... with issues: {:?}",
            preview(&question.question, 50),
            feedback.issues
        );
        let prompt = QuizPromptBuilder::refine(question, feedback, target);
        let raw = self.runner.run(&self.config.generator_model, &prompt).await?;
        let parsed = extract_json(&raw)?;
        if !parsed.is_object() {
            warn!(
                "Refinement did not return a question object: {}...",
                preview(&parsed.to_string(), 80)
            );
            return None;
        }

        let allowed = [question.question_type];
        let mut refined = normalize_question(&parsed, Some(&allowed), Some(target))?;
        if refined.topic.is_empty() {
            refined.topic = question.topic.clone();
        }
        if refined.subtopic.is_empty() {
            refined.subtopic = question.subtopic.clone();
        }
        if !is_valid(&refined) {
            warn!(
                "Failed to refine question, discarding: {}...",
                preview(&question.question, 50)
            );
            return None;
        }
        info!("Refined question: {}...", preview(&refined.question, 50));
        Some(refined)
    }
}
