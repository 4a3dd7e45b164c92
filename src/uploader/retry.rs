// 单个块的重试控制
//
// 每个块最多尝试 try_times 次，两次尝试之间没有等待；超时由传输层自行处理。
// 每次尝试都把该块的进度交给传输层原地更新，因此进度总是反映最近一次的状态。

use crate::transport::{TransportError, UploadTransport};
use crate::uploader::{Block, BlockResult, PutExtra, ReadAt};
use tracing::{debug, error, warn};

/// 带重试地上传一个块
///
/// 成功时触发 `on_block_done`；用尽重试次数后触发一次 `on_block_error` 并返回最后一次的错误。
pub async fn put_block_with_retry(
    transport: &dyn UploadTransport,
    progress: &mut BlockResult,
    source: &dyn ReadAt,
    block: Block,
    extra: &PutExtra,
) -> Result<(), TransportError> {
    let try_times = extra.try_times.max(1);
    let mut attempt = 1;

    loop {
        match transport.put_block(progress, source, block, extra).await {
            Ok(()) => {
                debug!(
                    "[块#{}] ✓ 上传成功 (大小: {} bytes, 第 {} 次尝试)",
                    block.index, block.size, attempt
                );
                extra.notify_done(block.index, block.size, progress);
                return Ok(());
            }
            Err(err) => {
                // 上下文失效后旧进度已无意义，下次从块起始处重新上传
                if matches!(err, TransportError::InvalidContext) {
                    *progress = BlockResult::default();
                }

                if attempt < try_times {
                    warn!(
                        "[块#{}] 上传失败，立即重试 ({}/{}): {}",
                        block.index, attempt, try_times, err
                    );
                    attempt += 1;
                    continue;
                }

                error!(
                    "[块#{}] 上传失败，已达最大尝试次数 ({}): {}",
                    block.index, try_times, err
                );
                extra.notify_error(block.index, block.size, &err);
                return Err(err);
            }
        }
    }
}
