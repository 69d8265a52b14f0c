// 服务模块
// 提供核心业务逻辑服务

pub mod evaluator;
pub mod export;
pub mod extractor;
pub mod generator;
pub mod ollama;
pub mod pipeline;
pub mod question;
pub mod store;
pub mod worker;

pub use evaluator::QuestionEvaluator;

pub use export::{
    export_quiz,
    google_form_body,
    google_form_item_requests,
    google_form_settings_requests,
    render_question_document,
    write_kahoot_excel,
    write_question_document,
    ExportFormat,
};

pub use extractor::extract_json;

pub use generator::{QuestionGenerator, QuizPromptBuilder};

pub use ollama::{assemble_response_text, ModelRunner, OllamaClient};

pub use pipeline::QuizPipeline;

pub use question::{
    deduplicate_questions,
    estimate_difficulty,
    is_valid,
    normalize_question,
};

pub use store::{load_settings, save_settings, ActivityStore};

pub use worker::GenerationWorker;
