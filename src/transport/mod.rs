// 上传传输层接口
//
// 块上传（mkblk/bput）与合并（mkfile）的具体报文格式、以及由上传凭证构造
// 带鉴权的 HTTP 客户端，都由实现方提供；编排器只依赖这里的 trait。

use crate::uploader::{Block, BlockResult, PutExtra, ReadAt};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 服务端错误码：上下文无效（非法或长时间未使用被淘汰）
pub const INVALID_CTX: u16 = 701;

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 上下文无效，需要从头重新上传该块
    #[error("上传上下文无效或已过期 (code 701)")]
    InvalidContext,
    /// 服务端返回的校验和与本地计算不一致
    #[error("块校验和不匹配")]
    UnmatchedChecksum,
    /// 服务端返回的其他错误
    #[error("服务端错误: code={code}, message={message}")]
    Status { code: u16, message: String },
    /// 读取数据源或网络 I/O 失败
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// 根据服务端状态码构造错误
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        if code == INVALID_CTX {
            TransportError::InvalidContext
        } else {
            TransportError::Status {
                code,
                message: message.into(),
            }
        }
    }

    /// 是否值得重试
    ///
    /// 仅作参考：重试控制器对所有错误一视同仁地消耗重试次数。
    pub fn is_retriable(&self) -> bool {
        match self {
            TransportError::InvalidContext
            | TransportError::UnmatchedChecksum
            | TransportError::Io(_)
            | TransportError::Other(_) => true,
            TransportError::Status { code, .. } => *code >= 500 || *code == 406 || *code == 429,
        }
    }
}

/// 绑定了上传凭证的传输层
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// 上传一个块
    ///
    /// `progress` 是该块上一次的状态（全新上传时为零值），实现方据此续传，
    /// 并在返回前原地写入最新状态。实现内部可按 `extra.chunk_size` 再切分请求。
    /// 必须可以安全重试。
    async fn put_block(
        &self,
        progress: &mut BlockResult,
        source: &dyn ReadAt,
        block: Block,
        extra: &PutExtra,
    ) -> Result<(), TransportError>;

    /// 合并所有块生成最终文件
    ///
    /// `key` 为 `None` 时由服务端分配文件名。返回服务端的 JSON 响应。
    async fn make_file(
        &self,
        key: Option<&str>,
        file_size: u64,
        progresses: &[BlockResult],
        extra: &PutExtra,
    ) -> Result<serde_json::Value, TransportError>;
}

/// 根据上传凭证构造传输层
pub trait TransportFactory: Send + Sync {
    fn with_uptoken(&self, uptoken: &str) -> Arc<dyn UploadTransport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            TransportError::from_status(701, "ctx expired"),
            TransportError::InvalidContext
        ));
        match TransportError::from_status(599, "server busy") {
            TransportError::Status { code, message } => {
                assert_eq!(code, 599);
                assert_eq!(message, "server busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retriable() {
        assert!(TransportError::InvalidContext.is_retriable());
        assert!(TransportError::from_status(503, "").is_retriable());
        assert!(TransportError::from_status(429, "").is_retriable());
        assert!(!TransportError::from_status(401, "bad token").is_retriable());
        assert!(!TransportError::from_status(614, "file exists").is_retriable());
    }
}
