//! 活动存储模块
//! 完成的测验落盘为 JSON 活动文档，任务设置可无损保存与重载

use crate::models::{GenerationTask, Quiz};
use crate::utils::{load_json, sanitize_title, save_json};
use anyhow::Result;
use chrono::Local;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// 活动目录封装
pub struct ActivityStore {
    dir: PathBuf,
}

impl ActivityStore {
    /// 打开活动目录，不存在就建
    pub fn new(dir: PathBuf) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created activities folder: {}", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 保存活动，文件名为 <净化标题>_<时间戳>.json
    pub fn save_activity(&self, quiz: &Quiz) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let file_name = format!("{}_{}.json", sanitize_title(&quiz.title), timestamp);
        let path = self.dir.join(file_name);
        save_json(&path, quiz)?;
        info!("Saved activity to {}", path.display());
        Ok(path)
    }

    pub fn load_activity(&self, path: &Path) -> Result<Quiz> {
        load_json(path)
    }

    /// 目录下全部活动文件，按名字排序
    pub fn list_activities(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// 保存任务设置
pub fn save_settings(path: &Path, task: &GenerationTask) -> Result<()> {
    save_json(path, task)
}

/// 重载任务设置
pub fn load_settings(path: &Path) -> Result<GenerationTask> {
    load_json(path)
}
