// 测试用的内存传输层

use crate::transport::{TransportError, TransportFactory, UploadTransport};
use crate::uploader::{Block, BlockResult, PutExtra, ReadAt};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum FailurePlan {
    Never,
    /// 每个块的前 k 次尝试失败
    FirstAttempts(u32),
    /// 每个块的前 k 次尝试返回上下文失效
    InvalidContextFirst(u32),
    Always,
    /// 指定的块总是失败
    Blocks(HashSet<usize>),
}

/// 记录调用情况并统计并发度的传输层
pub struct MockTransport {
    plan: FailurePlan,
    delay: Duration,
    fail_make_file: bool,
    calls: Mutex<HashMap<usize, u32>>,
    seen: Mutex<HashMap<usize, Vec<BlockResult>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    make_file_calls: AtomicUsize,
    last_make_file: Mutex<Option<(Option<String>, u64, Vec<BlockResult>)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            plan: FailurePlan::Never,
            delay: Duration::ZERO,
            fail_make_file: false,
            calls: Mutex::new(HashMap::new()),
            seen: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            make_file_calls: AtomicUsize::new(0),
            last_make_file: Mutex::new(None),
        }
    }

    pub fn fail_first(mut self, attempts: u32) -> Self {
        self.plan = FailurePlan::FirstAttempts(attempts);
        self
    }

    pub fn invalid_context_first(mut self, attempts: u32) -> Self {
        self.plan = FailurePlan::InvalidContextFirst(attempts);
        self
    }

    pub fn always_fail(mut self) -> Self {
        self.plan = FailurePlan::Always;
        self
    }

    pub fn fail_blocks(mut self, blocks: impl IntoIterator<Item = usize>) -> Self {
        self.plan = FailurePlan::Blocks(blocks.into_iter().collect());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_make_file(mut self) -> Self {
        self.fail_make_file = true;
        self
    }

    pub fn put_calls(&self, index: usize) -> u32 {
        self.calls.lock().get(&index).copied().unwrap_or(0)
    }

    pub fn total_put_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }

    /// 每次尝试开始时传入的进度
    pub fn seen_progress(&self, index: usize) -> Vec<BlockResult> {
        self.seen.lock().get(&index).cloned().unwrap_or_default()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn make_file_calls(&self) -> usize {
        self.make_file_calls.load(Ordering::SeqCst)
    }

    pub fn last_make_file(&self) -> Option<(Option<String>, u64, Vec<BlockResult>)> {
        self.last_make_file.lock().clone()
    }

    fn outcome(&self, index: usize, attempt: u32) -> Result<(), TransportError> {
        match &self.plan {
            FailurePlan::Never => Ok(()),
            FailurePlan::FirstAttempts(k) if attempt <= *k => {
                Err(TransportError::from_status(503, "service unavailable"))
            }
            FailurePlan::InvalidContextFirst(k) if attempt <= *k => {
                Err(TransportError::InvalidContext)
            }
            FailurePlan::Always => Err(TransportError::from_status(503, "service unavailable")),
            FailurePlan::Blocks(blocks) if blocks.contains(&index) => {
                Err(TransportError::from_status(503, "service unavailable"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn put_block(
        &self,
        progress: &mut BlockResult,
        source: &dyn ReadAt,
        block: Block,
        _extra: &PutExtra,
    ) -> Result<(), TransportError> {
        let attempt = {
            let mut calls = self.calls.lock();
            let count = calls.entry(block.index).or_insert(0);
            *count += 1;
            *count
        };
        self.seen
            .lock()
            .entry(block.index)
            .or_default()
            .push(progress.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let data = source.read_block(&block);
        self.active.fetch_sub(1, Ordering::SeqCst);
        let data = data?;

        progress.ctx = format!("ctx-{}-{}", block.index, attempt);
        progress.checksum = format!("len-{}", data.len());
        progress.offset = data.len() as u32;
        progress.host = "http://up.mock".to_string();

        self.outcome(block.index, attempt)
    }

    async fn make_file(
        &self,
        key: Option<&str>,
        file_size: u64,
        progresses: &[BlockResult],
        _extra: &PutExtra,
    ) -> Result<serde_json::Value, TransportError> {
        self.make_file_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_make_file.lock() = Some((
            key.map(str::to_string),
            file_size,
            progresses.to_vec(),
        ));

        if self.fail_make_file {
            return Err(TransportError::from_status(579, "callback failed"));
        }

        Ok(serde_json::json!({
            "key": key.unwrap_or("server-assigned"),
            "fsize": file_size,
            "blocks": progresses.len(),
        }))
    }
}

/// 记录上传凭证的工厂
pub struct MockFactory {
    transport: Arc<MockTransport>,
    tokens: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        Self {
            transport,
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

impl TransportFactory for MockFactory {
    fn with_uptoken(&self, uptoken: &str) -> Arc<dyn UploadTransport> {
        self.tokens.lock().push(uptoken.to_string());
        self.transport.clone()
    }
}
