// 上传错误类型

use crate::transport::TransportError;
use thiserror::Error;

/// 断点续传上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 进度数组长度与块数量不一致（未发起任何请求）
    #[error("无效的上传进度: 期望 {expected} 个块, 实际 {actual} 个")]
    InvalidPutProgress { expected: usize, actual: usize },

    /// 块数量超出当前平台可寻址范围（未发起任何请求）
    #[error("文件过大: {file_size} bytes")]
    FileTooLarge { file_size: u64 },

    /// 至少有一个块在用尽重试次数后仍然失败
    ///
    /// 不携带具体块信息，细节通过 `on_block_error` 回调或进度数组获取。
    #[error("断点续传上传失败")]
    PutFailed,

    /// 合并文件失败（原样透传）
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 合并结果无法解析为调用方期望的类型
    #[error("解析上传结果失败: {0}")]
    Decode(#[from] serde_json::Error),

    /// 本地文件访问失败
    #[error("本地文件访问失败: {0}")]
    Io(#[from] std::io::Error),

    /// 工作池已关闭，无法提交任务
    #[error("上传工作池已关闭")]
    PoolClosed,
}

impl UploadError {
    /// 是否可以用返回的进度再次调用以续传
    pub fn is_resumable(&self) -> bool {
        matches!(self, UploadError::PutFailed | UploadError::PoolClosed)
    }
}
