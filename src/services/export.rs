//! 导出适配模块
//! 把最终题目列表翻译给各消费方：Google Forms 请求体、Kahoot 表格、纯文本文档。
//! 适配层只读题目，不做网络调用，表单鉴权在范围之外

use crate::models::{Question, QuestionType, Quiz, TRUE_FALSE_OPTIONS};
use crate::utils::save_json;
use anyhow::Result;
use log::{info, warn};
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    GoogleForms,
    Kahoot,
    Document,
    Json,
}

impl ExportFormat {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "google forms" | "google_forms" | "forms" => Some(ExportFormat::GoogleForms),
            "kahoot" => Some(ExportFormat::Kahoot),
            "document" | "pdf" | "text" => Some(ExportFormat::Document),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// 建表单请求体
pub fn google_form_body(title: &str) -> Value {
    let title = title.trim();
    let title = if title.is_empty() {
        warn!("Title is empty after sanitization, using default 'Untitled Activity'");
        "Untitled Activity"
    } else {
        title
    };
    json!({"info": {"title": title}})
}

/// 描述与测验模式的 batchUpdate 请求
pub fn google_form_settings_requests(title: &str, description: &str) -> Vec<Value> {
    vec![
        json!({
            "updateFormInfo": {
                "info": {"title": title},
                "updateMask": "title"
            }
        }),
        json!({
            "updateFormInfo": {
                "info": {"description": description},
                "updateMask": "description"
            }
        }),
        json!({
            "updateSettings": {
                "settings": {
                    "quizSettings": {
                        "isQuiz": true
                    }
                },
                "updateMask": "quizSettings.isQuiz"
            }
        }),
    ]
}

/// 题目条目的 batchUpdate 请求：按类型分组（保持首次出现顺序），
/// 每组先分页符再节标题，每题计 1 分
pub fn google_form_item_requests(questions: &[Question]) -> Vec<Value> {
    let mut groups: Vec<(QuestionType, Vec<&Question>)> = Vec::new();
    for question in questions {
        match groups
            .iter_mut()
            .find(|(qtype, _)| *qtype == question.question_type)
        {
            Some((_, members)) => members.push(question),
            None => groups.push((question.question_type, vec![question])),
        }
    }

    let mut requests = Vec::new();
    let mut index = 0usize;
    for (qtype, members) in groups {
        requests.push(json!({
            "createItem": {
                "item": {"pageBreakItem": {}},
                "location": {"index": index}
            }
        }));
        index += 1;

        requests.push(json!({
            "createItem": {
                "item": {
                    "title": format!("{} Questions", qtype),
                    "textItem": {}
                },
                "location": {"index": index}
            }
        }));
        index += 1;

        for question in members {
            let item = match qtype {
                QuestionType::Mcq | QuestionType::TrueFalse => {
                    let mut options = question.options.clone();
                    if options.is_empty() {
                        if qtype == QuestionType::TrueFalse {
                            warn!(
                                "Added default options for True/False question '{}'",
                                question.question
                            );
                            options = TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect();
                        } else {
                            warn!(
                                "Skipping MCQ question '{}' due to missing options",
                                question.question
                            );
                            continue;
                        }
                    }
                    let option_values: Vec<Value> =
                        options.iter().map(|opt| json!({"value": opt})).collect();
                    json!({
                        "title": question.question,
                        "questionItem": {
                            "question": {
                                "required": true,
                                "choiceQuestion": {
                                    "type": "RADIO",
                                    "options": option_values,
                                    "shuffle": qtype == QuestionType::Mcq
                                },
                                "grading": {
                                    "pointValue": 1,
                                    "correctAnswers": {"answers": [{"value": question.answer}]}
                                }
                            }
                        }
                    })
                }
                _ => json!({
                    "title": question.question,
                    "questionItem": {
                        "question": {
                            "required": true,
                            "textQuestion": {"paragraph": false},
                            "grading": {
                                "pointValue": 1,
                                "correctAnswers": {"answers": [{"value": question.answer}]}
                            }
                        }
                    }
                }),
            };
            requests.push(json!({
                "createItem": {
                    "item": item,
                    "location": {"index": index}
                }
            }));
            index += 1;
        }
    }
    requests
}

/// Kahoot 模板表格：每题一行，选择/判断题平铺前四个选项列
pub fn write_kahoot_excel(questions: &[Question], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let headers = [
        "Question",
        "Answer",
        "Time Limit (sec)",
        "Answer 1",
        "Answer 2",
        "Answer 3",
        "Answer 4",
    ];
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (row, question) in questions.iter().enumerate() {
        let row = (row + 1) as u32;
        worksheet.write_string(row, 0, &question.question)?;
        worksheet.write_string(row, 1, &question.answer)?;
        worksheet.write_number(row, 2, 30.0)?;
        if matches!(
            question.question_type,
            QuestionType::Mcq | QuestionType::TrueFalse
        ) {
            for (i, option) in question.options.iter().take(4).enumerate() {
                worksheet.write_string(row, (3 + i) as u16, option)?;
            }
        }
    }

    workbook.save(path)?;
    info!("Kahoot Excel created: {}", path.display());
    Ok(())
}

/// 纯文本文档：一题一段
pub fn render_question_document(questions: &[Question]) -> String {
    let mut document = String::new();
    for (i, question) in questions.iter().enumerate() {
        document.push_str(&format!("Question {}: {}\n", i + 1, question.question));
        for (j, option) in question.options.iter().enumerate() {
            document.push_str(&format!("  {}. {}\n", j + 1, option));
        }
        document.push_str(&format!("Answer: {}\n\n", question.answer));
    }
    document
}

pub fn write_question_document(questions: &[Question], path: &Path) -> Result<()> {
    fs::write(path, render_question_document(questions))?;
    info!("Question document created: {}", path.display());
    Ok(())
}

/// 按格式导出一份测验，返回产物路径。
/// Google Forms 导出的是待提交的请求体文档，网络与鉴权由外部协作方负责
pub fn export_quiz(quiz: &Quiz, format: ExportFormat, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let stem = crate::utils::sanitize_title(&quiz.title);
    match format {
        ExportFormat::GoogleForms => {
            let path = out_dir.join(format!("{}_form_requests.json", stem));
            let payload = json!({
                "form": google_form_body(&quiz.title),
                "settingsRequests": google_form_settings_requests(&quiz.title, &quiz.description),
                "itemRequests": google_form_item_requests(&quiz.questions),
            });
            save_json(&path, &payload)?;
            Ok(path)
        }
        ExportFormat::Kahoot => {
            let path = out_dir.join(format!("{}_kahoot.xlsx", stem));
            write_kahoot_excel(&quiz.questions, &path)?;
            Ok(path)
        }
        ExportFormat::Document => {
            let path = out_dir.join(format!("{}.txt", stem));
            write_question_document(&quiz.questions, &path)?;
            Ok(path)
        }
        ExportFormat::Json => {
            let path = out_dir.join(format!("{}_questions.json", stem));
            save_json(&path, &quiz.questions)?;
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn mcq(text: &str, answer: &str) -> Question {
        Question {
            question: text.to_string(),
            question_type: QuestionType::Mcq,
            options: vec![
                answer.to_string(),
                "1".to_string(),
                "2".to_string(),
                "3".to_string(),
            ],
            answer: answer.to_string(),
            topic: String::new(),
            subtopic: String::new(),
            difficulty: Difficulty::Easy,
        }
    }

    fn short(text: &str, answer: &str) -> Question {
        Question {
            question: text.to_string(),
            question_type: QuestionType::ShortAnswer,
            options: vec![],
            answer: answer.to_string(),
            topic: String::new(),
            subtopic: String::new(),
            difficulty: Difficulty::Easy,
        }
    }

    #[test]
    fn test_form_items_grouped_by_type_in_first_appearance_order() {
        let questions = vec![
            mcq("What is 2 + 2?", "4"),
            short("Explain a fraction.", "Part of a whole"),
            mcq("What is 3 + 3?", "6"),
        ];
        let requests = google_form_item_requests(&questions);
        // 两组：各一个分页符、一个节标题，加三道题
        assert_eq!(requests.len(), 7);

        let section_titles: Vec<&str> = requests
            .iter()
            .filter_map(|r| {
                let item = &r["createItem"]["item"];
                item.get("textItem")
                    .and(item.get("title"))
                    .and_then(Value::as_str)
            })
            .collect();
        assert_eq!(section_titles, vec!["MCQ Questions", "Short Answer Questions"]);

        // location.index 连续递增
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(
                request["createItem"]["location"]["index"],
                Value::from(i as u64)
            );
        }
    }

    #[test]
    fn test_form_mcq_item_shape() {
        let questions = vec![mcq("What is 2 + 2?", "4")];
        let requests = google_form_item_requests(&questions);
        let question = &requests[2]["createItem"]["item"]["questionItem"]["question"];
        assert_eq!(question["choiceQuestion"]["type"], "RADIO");
        assert_eq!(question["choiceQuestion"]["shuffle"], true);
        assert_eq!(question["choiceQuestion"]["options"].as_array().unwrap().len(), 4);
        assert_eq!(question["grading"]["pointValue"], 1);
        assert_eq!(
            question["grading"]["correctAnswers"]["answers"][0]["value"],
            "4"
        );
    }

    #[test]
    fn test_form_text_item_shape_and_quiz_mode() {
        let questions = vec![short("Explain a ratio.", "A comparison of two numbers")];
        let requests = google_form_item_requests(&questions);
        let question = &requests[2]["createItem"]["item"]["questionItem"]["question"];
        assert_eq!(question["textQuestion"]["paragraph"], false);
        assert_eq!(question["grading"]["pointValue"], 1);

        let settings = google_form_settings_requests("Quiz", "About ratios");
        assert_eq!(
            settings[2]["updateSettings"]["settings"]["quizSettings"]["isQuiz"],
            true
        );
    }

    #[test]
    fn test_form_body_defaults_empty_title() {
        assert_eq!(
            google_form_body("  ")["info"]["title"],
            "Untitled Activity"
        );
    }

    #[test]
    fn test_render_document_paragraph_per_question() {
        let questions = vec![mcq("What is 2 + 2?", "4"), short("Define a prime.", "...")];
        let document = render_question_document(&questions);
        assert!(document.contains("Question 1: What is 2 + 2?"));
        assert!(document.contains("  1. 4\n"));
        assert!(document.contains("Question 2: Define a prime."));
        assert!(document.contains("Answer: 4\n\n"));
    }

    #[test]
    fn test_kahoot_excel_written_to_disk() {
        let dir = std::env::temp_dir().join(format!("chuti-export-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kahoot.xlsx");

        write_kahoot_excel(&[mcq("What is 2 + 2?", "4")], &path).unwrap();
        assert!(path.exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_export_format_from_raw() {
        assert_eq!(
            ExportFormat::from_raw("Google Forms"),
            Some(ExportFormat::GoogleForms)
        );
        assert_eq!(ExportFormat::from_raw("kahoot"), Some(ExportFormat::Kahoot));
        assert_eq!(ExportFormat::from_raw("PDF"), Some(ExportFormat::Document));
        assert_eq!(ExportFormat::from_raw("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_raw("docx"), None);
    }
}
