use anyhow::{Context, Result};
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 读取 JSON 文件并反序列化
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading JSON from {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

/// 序列化并写入 JSON 文件，必要时创建父目录
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Saving JSON to {}", path.display());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let text = serde_json::to_string_pretty(data)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// 文件名净化：保留字母数字、空格、下划线和连字符，其余替换为下划线
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 活动产物目录
pub fn default_activities_dir() -> PathBuf {
    PathBuf::from("Activities")
}

/// 日志目录
pub fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Fractions Quiz"), "Fractions Quiz");
        assert_eq!(sanitize_title("M1/2: Ratios?"), "M1_2_ Ratios_");
        assert_eq!(sanitize_title("week-3_review"), "week-3_review");
    }

    #[test]
    fn test_json_round_trip() {
        let dir = std::env::temp_dir().join(format!("chuti-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("data.json");
        let mut data = BTreeMap::new();
        data.insert("a".to_string(), 1u32);
        data.insert("b".to_string(), 2u32);

        save_json(&path, &data).unwrap();
        let loaded: BTreeMap<String, u32> = load_json(&path).unwrap();
        assert_eq!(loaded, data);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_json_missing_file_is_err() {
        let result: Result<serde_json::Value> = load_json(Path::new("no/such/file.json"));
        assert!(result.is_err());
    }
}
