// 配置管理模块
//
// 上传参数是进程级的全局默认值，只在共享工作池首次创建时生效一次；
// 之后再修改不会影响已经在运行的工作池。

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 默认 worker 数量
pub const DEFAULT_WORKERS: usize = 4;

/// 默认块内请求切分大小: 256KB
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// 默认每块尝试次数
pub const DEFAULT_TRY_TIMES: u32 = 3;

/// 上传参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// 任务队列容量，0 表示 workers * 4
    pub task_queue_size: usize,
    /// 并行 worker 数量
    pub workers: usize,
    /// 块内请求切分大小（字节）
    pub chunk_size: usize,
    /// 每个块的最大尝试次数
    pub try_times: u32,
}

impl UploadSettings {
    const DEFAULT: UploadSettings = UploadSettings {
        task_queue_size: DEFAULT_WORKERS * 4,
        workers: DEFAULT_WORKERS,
        chunk_size: DEFAULT_CHUNK_SIZE,
        try_times: DEFAULT_TRY_TIMES,
    };

    /// 将零值字段替换为默认值，不做其他校验
    pub fn normalized(mut self) -> Self {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.task_queue_size == 0 {
            self.task_queue_size = self.workers * 4;
        }
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if self.try_times == 0 {
            self.try_times = DEFAULT_TRY_TIMES;
        }
        self
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static SETTINGS: RwLock<UploadSettings> = parking_lot::const_rwlock(UploadSettings::DEFAULT);

/// 整体替换全局上传参数
///
/// 只影响之后首次创建的共享工作池，以及之后发起的上传对 chunk_size/try_times 的回退值。
pub fn set_settings(settings: UploadSettings) {
    let settings = settings.normalized();
    *SETTINGS.write() = settings;
    tracing::info!(
        "更新全局上传参数: workers={}, 队列容量={}, chunk_size={}, 尝试次数={}",
        settings.workers,
        settings.task_queue_size,
        settings.chunk_size,
        settings.try_times
    );
}

/// 当前全局上传参数
pub fn settings() -> UploadSettings {
    *SETTINGS.read()
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadSettings,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 从 TOML 文件加载配置
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        Ok(config)
    }

    /// 从文件加载，文件不存在时使用默认配置
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", path);
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
            }
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("写入配置文件失败: {:?}", path))?;
        Ok(())
    }

    /// 将上传配置安装为全局默认值
    pub fn apply(&self) {
        set_settings(self.upload);
    }
}
