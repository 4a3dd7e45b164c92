// 上传工作池
//
// 固定数量的 worker 从一个有界队列中逐个取出任务执行：
// - 队列满且所有 worker 都在忙时，提交方会被挂起（唯一的背压机制）
// - 多个上传会话共享同一个工作池，各自的块任务交错执行
// - 任务一旦被取出就运行到结束，不支持取消
// - 任务 panic 只会终止该任务，worker 继续工作

use crate::config::{self, UploadSettings};
use crate::uploader::UploadError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// 工作池任务
pub type Job = BoxFuture<'static, ()>;

/// 进程级共享工作池
static SHARED_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// 保证共享工作池只被构建一次
static SHARED_POOL_INIT: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// 上传工作池
#[derive(Clone)]
pub struct WorkerPool {
    /// 任务队列发送端
    sender: mpsc::Sender<Job>,
    /// worker 数量
    workers: usize,
    /// 队列容量
    queue_capacity: usize,
    /// 专属运行时（仅共享工作池持有）
    _runtime: Option<Arc<Runtime>>,
}

impl WorkerPool {
    /// 在当前 tokio 运行时上创建工作池
    ///
    /// 必须在 tokio 运行时内调用。所有克隆都被丢弃后 worker 会自动退出。
    pub fn new(settings: &UploadSettings) -> Self {
        Self::spawn_on(&Handle::current(), settings, None)
    }

    /// 获取进程级共享工作池
    ///
    /// 首次调用时按当时的全局配置创建，运行在专属的多线程运行时上，之后永不销毁；
    /// 之后再修改全局配置不会影响它。
    pub fn shared() -> Result<&'static WorkerPool, UploadError> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool);
        }

        let _guard = SHARED_POOL_INIT.lock();
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool);
        }

        let settings = config::settings();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.workers)
            .thread_name("rput-worker")
            .enable_all()
            .build()?;
        let runtime = Arc::new(runtime);
        let pool = Self::spawn_on(runtime.handle(), &settings, Some(runtime.clone()));

        Ok(SHARED_POOL.get_or_init(|| pool))
    }

    fn spawn_on(handle: &Handle, settings: &UploadSettings, runtime: Option<Arc<Runtime>>) -> Self {
        let settings = settings.normalized();
        let (sender, receiver) = mpsc::channel::<Job>(settings.task_queue_size);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..settings.workers {
            handle.spawn(worker_loop(worker_id, receiver.clone()));
        }

        info!(
            "创建上传工作池: workers={}, 队列容量={}",
            settings.workers, settings.task_queue_size
        );

        Self {
            sender,
            workers: settings.workers,
            queue_capacity: settings.task_queue_size,
            _runtime: runtime,
        }
    }

    /// 提交任务，队列已满时等待
    pub async fn submit(&self, job: Job) -> Result<(), UploadError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| UploadError::PoolClosed)
    }

    /// worker 数量
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 任务队列容量
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("dedicated_runtime", &self._runtime.is_some())
            .finish()
    }
}

async fn worker_loop(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        // 只在取任务时持有锁，执行任务时释放
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };

        let Some(job) = job else {
            debug!("[worker#{}] 任务队列已关闭，退出", worker_id);
            break;
        };

        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!("[worker#{}] 任务 panic，继续处理后续任务", worker_id);
        }
    }
}
