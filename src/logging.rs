//! 日志系统配置
//!
//! 控制台输出 + 可选的按天滚动日志文件，超过保留天数的文件由 appender 自动清理

use crate::config::LogConfig;
use anyhow::{Context, Result};
use std::fs;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "kodo-rput";

/// 日志时间格式
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 构造按天滚动的日志文件写入器
fn file_appender(config: &LogConfig) -> Result<RollingFileAppender> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("创建日志目录失败: {:?}", config.log_dir))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.retention_days.max(1) as usize)
        .build(&config.log_dir)
        .context("创建日志文件写入器失败")
}

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量优先于配置中的级别。文件输出初始化失败时回退到仅控制台输出。
/// 全局订阅器已被设置时返回错误。
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(true);

    let appender = if config.enabled {
        match file_appender(config) {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!("{:#}, 回退到仅控制台输出", e);
                None
            }
        }
    } else {
        None
    };

    let Some(appender) = appender else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .context("初始化日志订阅器失败")?;

        info!("日志系统初始化完成（仅控制台输出）");
        return Ok(LogGuard { _file_guard: None });
    };

    let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("初始化日志订阅器失败")?;

    info!(
        "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}",
        config.log_dir, config.retention_days, config.level
    );

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}
