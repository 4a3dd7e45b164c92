// 断点续传上传引擎
//
// 上传流程：
// 1. 校验（或分配）进度数组，长度不符立即失败，不产生任何请求
// 2. 用全局配置补全未设置的参数
// 3. 用上传凭证构造传输层（每次上传只构造一次）
// 4. 每个块构造一个任务提交到工作池
// 5. 每个任务在重试控制下上传，失败不影响其他块，所有块都会被尝试
// 6. 等待恰好 block_count 个完成通知
// 7. 有任何块失败则返回 PutFailed，不合并；已成功块的进度保留供续传
// 8. 全部成功后合并文件，结果原样返回

use crate::config;
use crate::transport::{TransportFactory, UploadTransport};
use crate::uploader::{
    block_count, blocks, put_block_with_retry, Block, BlockResult, Job, PutExtra, ReadAt,
    UploadError, WorkerPool,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// 合并文件后服务端返回的常用字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRet {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "persistentId", skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<String>,
}

/// 单个块任务的完成通知
struct BlockOutcome {
    index: usize,
    progress: BlockResult,
    succeeded: bool,
}

/// 断点续传上传器
///
/// 工作池由调用方注入，多个上传器可以共享同一个工作池。
#[derive(Clone)]
pub struct ResumableUploader {
    /// 传输层工厂
    factory: Arc<dyn TransportFactory>,
    /// 工作池
    pool: WorkerPool,
}

impl ResumableUploader {
    pub fn new(factory: Arc<dyn TransportFactory>, pool: WorkerPool) -> Self {
        Self { factory, pool }
    }

    /// 使用进程级共享工作池
    pub fn with_shared_pool(factory: Arc<dyn TransportFactory>) -> Result<Self, UploadError> {
        Ok(Self::new(factory, WorkerPool::shared()?.clone()))
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// 上传到指定的 key
    pub async fn put<T, R>(
        &self,
        uptoken: &str,
        key: &str,
        source: R,
        file_size: u64,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError>
    where
        T: DeserializeOwned,
        R: ReadAt + 'static,
    {
        self.rput(uptoken, Some(key), Arc::new(source), file_size, extra)
            .await
    }

    /// 上传，由服务端分配 key
    pub async fn put_without_key<T, R>(
        &self,
        uptoken: &str,
        source: R,
        file_size: u64,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError>
    where
        T: DeserializeOwned,
        R: ReadAt + 'static,
    {
        self.rput(uptoken, None, Arc::new(source), file_size, extra)
            .await
    }

    /// 上传本地文件到指定的 key
    pub async fn put_file<T: DeserializeOwned>(
        &self,
        uptoken: &str,
        key: &str,
        local_file: impl AsRef<Path>,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError> {
        self.rput_file(uptoken, Some(key), local_file.as_ref(), extra)
            .await
    }

    /// 上传本地文件，由服务端分配 key
    pub async fn put_file_without_key<T: DeserializeOwned>(
        &self,
        uptoken: &str,
        local_file: impl AsRef<Path>,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError> {
        self.rput_file(uptoken, None, local_file.as_ref(), extra)
            .await
    }

    async fn rput_file<T: DeserializeOwned>(
        &self,
        uptoken: &str,
        key: Option<&str>,
        local_file: &Path,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError> {
        let file = tokio::fs::File::open(local_file).await?;
        let file_size = file.metadata().await?.len();
        let file = file.into_std().await;

        self.rput(uptoken, key, Arc::new(file), file_size, extra)
            .await
    }

    async fn rput<T: DeserializeOwned>(
        &self,
        uptoken: &str,
        key: Option<&str>,
        source: Arc<dyn ReadAt>,
        file_size: u64,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError> {
        let session_id = Uuid::new_v4();
        let span = info_span!(
            "rput",
            session = %session_id,
            key = key.unwrap_or("<server-assigned>")
        );

        self.rput_session(uptoken, key, source, file_size, extra)
            .instrument(span)
            .await
    }

    async fn rput_session<T: DeserializeOwned>(
        &self,
        uptoken: &str,
        key: Option<&str>,
        source: Arc<dyn ReadAt>,
        file_size: u64,
        extra: &mut PutExtra,
    ) -> Result<T, UploadError> {
        let block_cnt = usize::try_from(block_count(file_size))
            .map_err(|_| UploadError::FileTooLarge { file_size })?;
        check_progresses(extra, block_cnt)?;

        extra.merge_defaults(&config::settings());
        let shared_extra = Arc::new(extra.detached());
        let transport = self.factory.with_uptoken(uptoken);

        // 进度一直留在 extra 中原地更新，调用被取消时调用方仍持有最新进度
        let progresses = extra
            .progresses
            .get_or_insert_with(|| vec![BlockResult::default(); block_cnt]);

        info!(
            "开始断点续传: 文件大小={} bytes, 块数量={}, 每块尝试次数={}",
            file_size, block_cnt, shared_extra.try_times
        );

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<BlockOutcome>();
        let mut submit_error = None;

        for block in blocks(file_size) {
            let job = block_job(
                block,
                progresses[block.index].clone(),
                transport.clone(),
                source.clone(),
                shared_extra.clone(),
                done_tx.clone(),
            );
            if let Err(e) = self.pool.submit(job).await {
                submit_error = Some(e);
                break;
            }
        }
        drop(done_tx);

        // 所有发送端都被丢弃后 recv 返回 None，未送达的通知按失败计
        let mut completed = 0usize;
        let mut failures = 0usize;
        while completed < block_cnt {
            let Some(outcome) = done_rx.recv().await else {
                break;
            };
            completed += 1;
            progresses[outcome.index] = outcome.progress;
            if !outcome.succeeded {
                failures += 1;
            }
        }
        let lost = block_cnt - completed;

        if let Some(err) = submit_error {
            warn!("提交块任务失败: {}", err);
            return Err(err);
        }

        if failures + lost > 0 {
            warn!(
                "断点续传失败: {}/{} 个块未成功 (其中 {} 个任务异常终止)",
                failures + lost,
                block_cnt,
                lost
            );
            return Err(UploadError::PutFailed);
        }

        let response = transport
            .make_file(key, file_size, &progresses[..], &shared_extra)
            .await?;

        info!("断点续传完成: {} 个块已合并", block_cnt);
        Ok(serde_json::from_value(response)?)
    }
}

/// 校验调用方传入的进度数组长度
fn check_progresses(extra: &PutExtra, block_cnt: usize) -> Result<(), UploadError> {
    match &extra.progresses {
        Some(progresses) if progresses.len() != block_cnt => {
            Err(UploadError::InvalidPutProgress {
                expected: block_cnt,
                actual: progresses.len(),
            })
        }
        _ => Ok(()),
    }
}

/// 构造单个块的任务
///
/// 任务独占该块的进度，结束后通过完成通知交还给编排器
fn block_job(
    block: Block,
    mut progress: BlockResult,
    transport: Arc<dyn UploadTransport>,
    source: Arc<dyn ReadAt>,
    extra: Arc<PutExtra>,
    done_tx: mpsc::UnboundedSender<BlockOutcome>,
) -> Job {
    let span = Span::current();
    Box::pin(
        async move {
            let result = put_block_with_retry(
                transport.as_ref(),
                &mut progress,
                source.as_ref(),
                block,
                &extra,
            )
            .await;

            let _ = done_tx.send(BlockOutcome {
                index: block.index,
                progress,
                succeeded: result.is_ok(),
            });
        }
        .instrument(span),
    )
}
