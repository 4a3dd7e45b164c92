// 单次上传的可选参数

use crate::config::UploadSettings;
use crate::transport::TransportError;
use crate::uploader::BlockResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 块完成回调：(块索引, 块大小, 上传结果)
///
/// 注意多个块是并行上传的，回调会在不同 worker 上并发触发。
pub type BlockDoneFn = Arc<dyn Fn(usize, u64, &BlockResult) + Send + Sync>;

/// 块失败回调：(块索引, 块大小, 最后一次错误)，仅在重试次数用尽后触发一次
pub type BlockErrorFn = Arc<dyn Fn(usize, u64, &TransportError) + Send + Sync>;

/// 自定义参数的前缀，不以此开头的参数会被服务端忽略
pub const CUSTOM_PARAM_PREFIX: &str = "x:";

/// 单次上传的可选参数
///
/// 零值字段会回退到全局配置。
#[derive(Clone, Default)]
pub struct PutExtra {
    /// 用户自定义参数
    pub params: HashMap<String, String>,
    /// 文件 MIME 类型
    pub mime_type: Option<String>,
    /// 块上传内部的请求切分大小，0 表示使用全局配置
    pub chunk_size: usize,
    /// 每个块的最大尝试次数，0 表示使用全局配置
    pub try_times: u32,
    /// 上传进度
    ///
    /// `None` 表示全新上传；续传时传入上一次失败调用留下的进度，长度必须等于块数量。
    /// 上传过程中原地更新：调用返回后（无论成功失败）保存着每个块的最新状态；
    /// 调用的 future 被中途丢弃时，保留已完成块的结果，仍在运行的块的结果会丢失。
    pub progresses: Option<Vec<BlockResult>>,
    /// 块完成回调
    pub on_block_done: Option<BlockDoneFn>,
    /// 块失败回调
    pub on_block_error: Option<BlockErrorFn>,
}

impl PutExtra {
    /// 从已保存的进度续传
    pub fn with_progresses(progresses: Vec<BlockResult>) -> Self {
        Self {
            progresses: Some(progresses),
            ..Default::default()
        }
    }

    /// 设置块完成回调
    pub fn on_block_done<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, u64, &BlockResult) + Send + Sync + 'static,
    {
        self.on_block_done = Some(Arc::new(f));
        self
    }

    /// 设置块失败回调
    pub fn on_block_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, u64, &TransportError) + Send + Sync + 'static,
    {
        self.on_block_error = Some(Arc::new(f));
        self
    }

    /// 仅保留以 `x:` 开头的自定义参数，按键排序
    pub fn custom_params(&self) -> Vec<(&str, &str)> {
        let mut params: Vec<(&str, &str)> = self
            .params
            .iter()
            .filter(|(k, _)| k.starts_with(CUSTOM_PARAM_PREFIX))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.sort_unstable();
        params
    }

    /// 用全局配置补全未设置的字段
    pub(crate) fn merge_defaults(&mut self, settings: &UploadSettings) {
        if self.chunk_size == 0 {
            self.chunk_size = settings.chunk_size;
        }
        if self.try_times == 0 {
            self.try_times = settings.try_times;
        }
    }

    /// 复制一份不含进度数组的参数，供块任务共享
    pub(crate) fn detached(&self) -> Self {
        Self {
            params: self.params.clone(),
            mime_type: self.mime_type.clone(),
            chunk_size: self.chunk_size,
            try_times: self.try_times,
            progresses: None,
            on_block_done: self.on_block_done.clone(),
            on_block_error: self.on_block_error.clone(),
        }
    }

    pub(crate) fn notify_done(&self, index: usize, size: u64, ret: &BlockResult) {
        if let Some(f) = &self.on_block_done {
            f(index, size, ret);
        }
    }

    pub(crate) fn notify_error(&self, index: usize, size: u64, err: &TransportError) {
        if let Some(f) = &self.on_block_error {
            f(index, size, err);
        }
    }
}

impl fmt::Debug for PutExtra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutExtra")
            .field("params", &self.params)
            .field("mime_type", &self.mime_type)
            .field("chunk_size", &self.chunk_size)
            .field("try_times", &self.try_times)
            .field("progresses", &self.progresses.as_ref().map(Vec::len))
            .field("on_block_done", &self.on_block_done.is_some())
            .field("on_block_error", &self.on_block_error.is_some())
            .finish()
    }
}
