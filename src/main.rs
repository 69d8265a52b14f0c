//! 出题引擎入口
//! 初始化日志与配置，读任务文件，跑流水线，落盘活动并按需导出

use anyhow::Result;
use chuti::services::export_quiz;
use chuti::utils;
use chuti::{
    ActivityStore, ExportFormat, GenerationTask, GenerationWorker, ModelConfig, OllamaClient,
    QuizPipeline,
};
use log::info;
use std::path::Path;

fn setup_logging() -> Result<()> {
    let logs_dir = utils::default_logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .chain(fern::log_file(logs_dir.join("chuti.log"))?)
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let mut args = std::env::args().skip(1);
    let Some(task_path) = args.next() else {
        eprintln!("Usage: chuti <task.json> [google-forms|kahoot|document|json]");
        std::process::exit(2);
    };
    let export_format = args.next().and_then(|raw| ExportFormat::from_raw(&raw));

    let config = ModelConfig::load(Path::new("config.json"));
    let client = OllamaClient::new(&config);
    let worker = GenerationWorker::spawn(QuizPipeline::new(client, config));

    let task: GenerationTask = utils::load_json(Path::new(&task_path))?;
    info!("Loaded task '{}' from {}", task.title, task_path);

    let quiz = worker.submit(task).await?;

    let store = ActivityStore::new(utils::default_activities_dir())?;
    let saved = store.save_activity(&quiz)?;
    println!("Saved activity to {}", saved.display());

    if let Some(format) = export_format {
        let exported = export_quiz(&quiz, format, store.dir())?;
        println!("Exported to {}", exported.display());
    }

    Ok(())
}
