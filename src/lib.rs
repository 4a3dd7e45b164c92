// Kodo 断点续传上传库
// 将大文件划分为固定大小的块，在共享的有界工作池上并行上传、独立重试，全部成功后合并

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 传输层接口
pub mod transport;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use config::{set_settings, settings, AppConfig, LogConfig, UploadSettings};
pub use logging::{init_logging, LogGuard};
pub use transport::{TransportError, TransportFactory, UploadTransport};
pub use uploader::{
    block_count, Block, BlockResult, PutExtra, PutRet, ReadAt, ResumableUploader, UploadError,
    WorkerPool, BLOCK_SIZE,
};
