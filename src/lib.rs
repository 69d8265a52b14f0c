pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ModelConfig, RetryPolicy};
pub use models::{
    BatchCritique, BatchFeedback, CritiqueFeedback, Difficulty, GenerationTask, Question,
    QuestionType, Quiz, QuizSettings, TopicSpec,
};
pub use services::{
    ActivityStore, ExportFormat, GenerationWorker, ModelRunner, OllamaClient, QuizPipeline,
};
