//! 生成工作者模块
//! 后台单工作者串行处理生成任务，调用方经通道排队、凭 oneshot 取回结果

use crate::models::{GenerationTask, Quiz};
use crate::services::ollama::ModelRunner;
use crate::services::pipeline::QuizPipeline;
use anyhow::anyhow;
use log::{error, info};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

struct QueuedJob {
    id: Uuid,
    task: GenerationTask,
    reply: oneshot::Sender<anyhow::Result<Quiz>>,
}

/// 生成任务队列，同一时刻只有一个任务在跑，任务中途不可取消
#[derive(Clone)]
pub struct GenerationWorker {
    sender: mpsc::Sender<QueuedJob>,
}

impl GenerationWorker {
    /// 启动工作者并接管流水线
    pub fn spawn<R>(pipeline: QuizPipeline<R>) -> Self
    where
        R: ModelRunner + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<QueuedJob>(32);
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                info!("Job {} started: '{}'", job.id, job.task.title);
                let result = pipeline.run(&job.task).await;
                match &result {
                    Ok(quiz) => info!(
                        "Job {} completed with {} questions",
                        job.id,
                        quiz.questions.len()
                    ),
                    Err(e) => error!("Job {} failed: {}", job.id, e),
                }
                let _ = job.reply.send(result);
            }
        });
        Self { sender }
    }

    /// 排队一个任务并等待完成
    pub async fn submit(&self, task: GenerationTask) -> anyhow::Result<Quiz> {
        let (reply, receiver) = oneshot::channel();
        let job = QueuedJob {
            id: Uuid::new_v4(),
            task,
            reply,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow!("Generation worker is gone"))?;
        receiver
            .await
            .map_err(|_| anyhow!("Generation worker dropped the job"))?
    }
}
