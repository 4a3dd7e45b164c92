// 断点续传上传模块
//
// - 文件按固定 4MB 划分为块，每个块独立上传、独立重试
// - 所有上传会话共享一个有界工作池
// - 部分块失败不会中止其他块，进度保留供下次续传
// - 全部块成功后才合并文件

pub mod block;
pub mod engine;
pub mod error;
pub mod options;
pub mod pool;
pub mod retry;
pub mod source;

#[cfg(test)]
pub(crate) mod testutil;

pub use block::{
    block_count, blocks, Block, BlockResult, BLOCK_BITS, BLOCK_MASK, BLOCK_SIZE,
};
pub use engine::{PutRet, ResumableUploader};
pub use error::UploadError;
pub use options::{BlockDoneFn, BlockErrorFn, PutExtra, CUSTOM_PARAM_PREFIX};
pub use pool::{Job, WorkerPool};
pub use retry::put_block_with_retry;
pub use source::ReadAt;
