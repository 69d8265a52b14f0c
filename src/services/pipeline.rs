//! 流水线编排模块
//! 生成 → 粗筛 → 抽查详评 → 就地修复 → 终检，一次任务跑完整个状态机

use crate::config::ModelConfig;
use crate::models::{CritiqueFeedback, Difficulty, GenerationTask, Question, Quiz};
use crate::services::evaluator::QuestionEvaluator;
use crate::services::extractor::preview;
use crate::services::generator::QuestionGenerator;
use crate::services::ollama::ModelRunner;
use crate::services::question::{deduplicate_questions, is_valid, normalize_question};
use anyhow::{bail, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 抽查样本量的上下界，20% 的批量落在这个区间里取
const MIN_SPOT_CHECK: usize = 5;
const MAX_SPOT_CHECK: usize = 10;
/// 每题修复尝试上限
const MAX_REFINE_ATTEMPTS: u32 = 3;

/// 出题流水线
pub struct QuizPipeline<R: ModelRunner> {
    runner: R,
    config: ModelConfig,
    sample_seed: Option<u64>,
}

impl<R: ModelRunner> QuizPipeline<R> {
    pub fn new(runner: R, config: ModelConfig) -> Self {
        Self {
            runner,
            config,
            sample_seed: None,
        }
    }

    /// 固定抽查随机种子，测试用来注入确定性
    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    /// 端到端执行一次生成任务。
    /// 只有整卷生成彻底失败才返回错误；题量不足降级为告警并返回部分结果。
    pub async fn run(&self, task: &GenerationTask) -> Result<Quiz> {
        let settings = &task.settings;
        let num_questions = task.num_questions();
        if settings.topics.is_empty() {
            bail!("No topics provided, cannot generate questions");
        }
        if num_questions == 0 {
            bail!("No question types selected");
        }

        info!(
            "Starting question generation: num_questions={}, difficulty={}, question_types={:?}",
            num_questions,
            settings.difficulty,
            settings.question_types
        );

        let generator = QuestionGenerator::new(&self.runner, &self.config);
        let evaluator = QuestionEvaluator::new(&self.runner, &self.config);
        let target = settings.difficulty;
        let allowed = task.allowed_types();
        let topic_hint = settings
            .topics
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        // 生成：整卷拿不到就是任务级失败
        let Some(raw_questions) = generator.generate_quiz(task).await else {
            bail!("Failed to generate quiz after all retries");
        };

        // 初检：归一化 + 有效性 + 去重
        let normalized: Vec<Question> = raw_questions
            .iter()
            .filter_map(|value| {
                match normalize_question(value, Some(&allowed), Some(target)) {
                    Some(question) if is_valid(&question) => Some(question),
                    _ => {
                        warn!(
                            "Dropping invalid question: {}",
                            preview(&value.to_string(), 80)
                        );
                        None
                    }
                }
            })
            .collect();
        let mut questions = deduplicate_questions(normalized);
        info!("{} questions survived normalization", questions.len());

        // 粗筛：便宜的一次整批评审
        let batch = evaluator
            .batch_critique(&questions, &topic_hint, target)
            .await;

        // 抽查集 = 模型标记 ∪ 随机抽样，粗筛不可靠，抽样兜住系统性漏报
        let targeted = self.select_targets(&batch.flagged, questions.len());
        info!(
            "Targeted critique on {} of {} questions ({} flagged)",
            targeted.len(),
            questions.len(),
            batch.flagged.len()
        );

        let subset: Vec<Question> = targeted.iter().map(|&i| questions[i].clone()).collect();
        let feedback = evaluator
            .critique_questions(&subset, &topic_hint, target)
            .await;

        // 修复：不通过的题就地替换，单题修不好不拖垮整单
        for (&slot, entry) in targeted.iter().zip(feedback.into_iter()) {
            if entry.approved {
                continue;
            }
            if let Some(repaired) = self
                .refine_slot(&generator, &evaluator, &questions[slot], entry, &topic_hint, target)
                .await
            {
                questions[slot] = repaired;
            }
        }

        // 终检：唯一权威闸门
        let survivors: Vec<Question> = questions
            .into_iter()
            .filter(|question| {
                if is_valid(question) {
                    true
                } else {
                    warn!(
                        "Dropping invalid question: {}",
                        preview(&question.question, 80)
                    );
                    false
                }
            })
            .collect();
        let mut final_questions = deduplicate_questions(survivors);
        final_questions.truncate(num_questions);

        if final_questions.len() < num_questions {
            warn!(
                "Generated only {}/{} questions after refinement",
                final_questions.len(),
                num_questions
            );
        }
        info!("Generated quiz contains {} questions", final_questions.len());

        Ok(Quiz {
            title: task.title.clone(),
            description: task.description.clone(),
            settings: settings.clone(),
            questions: final_questions,
        })
    }

    /// 挑出详评目标：标记下标去重后，再从未标记里抽一把
    fn select_targets(&self, flagged: &[usize], count: usize) -> Vec<usize> {
        let mut targets: Vec<usize> = flagged.iter().copied().filter(|i| *i < count).collect();
        targets.sort_unstable();
        targets.dedup();

        let mut unflagged: Vec<usize> = (0..count).filter(|i| !targets.contains(i)).collect();
        let sample_size = ((count as f64 * 0.2).ceil() as usize)
            .clamp(MIN_SPOT_CHECK, MAX_SPOT_CHECK)
            .min(unflagged.len());

        let mut rng = match self.sample_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        unflagged.shuffle(&mut rng);
        targets.extend(unflagged.into_iter().take(sample_size));
        targets.sort_unstable();
        targets
    }

    /// 单题修复循环：每次产出候选先复评，复评反馈顶替旧反馈；
    /// 预算用尽返回最后一个解析成功的候选（可能仍未通过），交给终检把关
    async fn refine_slot(
        &self,
        generator: &QuestionGenerator<'_, R>,
        evaluator: &QuestionEvaluator<'_, R>,
        original: &Question,
        mut feedback: CritiqueFeedback,
        topic_hint: &str,
        target: Difficulty,
    ) -> Option<Question> {
        let mut current: Option<Question> = None;
        for attempt in 1..=MAX_REFINE_ATTEMPTS {
            let base = current.as_ref().unwrap_or(original);
            let Some(candidate) = generator.refine_question(base, &feedback, target).await else {
                warn!(
                    "Refinement attempt {}/{} produced no usable candidate",
                    attempt, MAX_REFINE_ATTEMPTS
                );
                continue;
            };
            let verdict = evaluator.critique_single(&candidate, topic_hint, target).await;
            if verdict.approved {
                return Some(candidate);
            }
            feedback = verdict;
            current = Some(candidate);
        }
        warn!(
            "Refinement failed after {} attempts for question: {}...",
            MAX_REFINE_ATTEMPTS,
            preview(&original.question, 50)
        );
        current
    }
}
