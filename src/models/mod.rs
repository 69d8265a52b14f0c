use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 判断题固定答案域
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["Correct", "Wrong"];

/// 题目类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "True/False")]
    TrueFalse,
    #[serde(rename = "Short Answer")]
    ShortAnswer,
    #[serde(rename = "Fill-in-the-Blank")]
    FillInTheBlank,
    #[serde(rename = "Numerical")]
    Numerical,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Mcq,
        QuestionType::TrueFalse,
        QuestionType::ShortAnswer,
        QuestionType::FillInTheBlank,
        QuestionType::Numerical,
    ];

    /// 规范标签
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::TrueFalse => "True/False",
            QuestionType::ShortAnswer => "Short Answer",
            QuestionType::FillInTheBlank => "Fill-in-the-Blank",
            QuestionType::Numerical => "Numerical",
        }
    }

    /// 同义词归一（大小写不敏感），未识别的类型一律回落到简答题
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "multiple_choice" | "multiple-choice" | "mcq" => QuestionType::Mcq,
            "true/false" | "true_false" | "tf" => QuestionType::TrueFalse,
            "short" | "short answer" | "sa" => QuestionType::ShortAnswer,
            "fill" | "fill-in-the-blank" | "fib" => QuestionType::FillInTheBlank,
            "num" | "numerical" | "numeric" | "calculation" => QuestionType::Numerical,
            _ => QuestionType::ShortAnswer,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 难度枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 题目结构，归一化之后才会构造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subtopic: String,
    pub difficulty: Difficulty,
}

/// 详评反馈，每题一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueFeedback {
    pub index: usize,
    pub approved: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// 批评（粗筛）单题反馈
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFeedback {
    pub index: usize,
    pub approved: bool,
    pub comments: String,
}

/// 批评（粗筛）结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCritique {
    pub flagged: Vec<usize>,
    pub feedback: Vec<BatchFeedback>,
}

/// 主题下的子主题列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub subtopics: Vec<String>,
}

/// 一次生成任务的配置，保存后可无损重载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub grade: String,
    pub topics: BTreeMap<String, TopicSpec>,
    pub difficulty: Difficulty,
    pub activity_type: String,
    pub question_types: BTreeMap<QuestionType, usize>,
}

/// 生成任务输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub settings: QuizSettings,
}

impl GenerationTask {
    /// 目标题量 = 各类型数量之和
    pub fn num_questions(&self) -> usize {
        self.settings.question_types.values().sum()
    }

    /// 请求的类型集合
    pub fn allowed_types(&self) -> Vec<QuestionType> {
        self.settings
            .question_types
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(qtype, _)| *qtype)
            .collect()
    }
}

/// 流水线最终输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub settings: QuizSettings,
    pub questions: Vec<Question>,
}
