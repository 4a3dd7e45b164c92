// 全局上传参数与共享工作池
//
// 修改全局配置的测试放在独立的测试进程中，避免影响库内单元测试

use kodo_rput::{set_settings, settings, UploadSettings, WorkerPool};

#[test]
fn test_settings_frozen_after_shared_pool_created() {
    set_settings(UploadSettings {
        task_queue_size: 0,
        workers: 3,
        chunk_size: 512 * 1024,
        try_times: 5,
    });
    // 整体替换，零值字段按默认规则补全
    assert_eq!(
        settings(),
        UploadSettings {
            task_queue_size: 12,
            workers: 3,
            chunk_size: 512 * 1024,
            try_times: 5,
        }
    );

    let pool = WorkerPool::shared().unwrap();
    assert_eq!(pool.workers(), 3);
    assert_eq!(pool.queue_capacity(), 12);

    set_settings(UploadSettings {
        task_queue_size: 2,
        workers: 7,
        chunk_size: 0,
        try_times: 1,
    });
    let current = settings();
    assert_eq!(current.workers, 7);
    assert_eq!(current.task_queue_size, 2);
    assert_eq!(current.try_times, 1);
    assert_eq!(current.chunk_size, 256 * 1024);

    // 共享工作池已经创建，后续配置不再生效
    let again = WorkerPool::shared().unwrap();
    assert!(std::ptr::eq(pool, again));
    assert_eq!(again.workers(), 3);
    assert_eq!(again.queue_capacity(), 12);
}
