// 上传块划分与进度记录
//
// 块划分规则：
// - 块大小固定 4MB（1 << 22），仅最后一块为余数
// - 文件大小为 0 时没有任何块，直接进入合并阶段
// - 每个块的上传结果（BlockResult）即断点续传所需的进度

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// 块大小的位数：1 << 22 = 4MB
pub const BLOCK_BITS: u32 = 22;

/// 块大小: 4MB
pub const BLOCK_SIZE: u64 = 1 << BLOCK_BITS;

/// 块掩码，用于向上取整
pub const BLOCK_MASK: u64 = BLOCK_SIZE - 1;

/// 计算文件的块数量（向上取整）
///
/// 对任意 u64 大小都不会溢出；转换为 usize 由调用方负责
pub fn block_count(file_size: u64) -> u64 {
    file_size.div_ceil(BLOCK_SIZE)
}

/// 单个上传块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// 块索引
    pub index: usize,
    /// 块在文件中的起始偏移
    pub offset: u64,
    /// 块大小（最后一块可能小于 BLOCK_SIZE）
    pub size: u64,
}

impl Block {
    /// 根据文件大小计算第 `index` 个块，超出文件范围时返回 None
    pub fn new(index: usize, file_size: u64) -> Option<Self> {
        let offset = u64::try_from(index).ok()?.checked_mul(BLOCK_SIZE)?;
        if offset >= file_size {
            return None;
        }
        Some(Self {
            index,
            offset,
            size: (file_size - offset).min(BLOCK_SIZE),
        })
    }

    /// 字节范围
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.size
    }
}

/// 计算文件的全部块布局
pub fn blocks(file_size: u64) -> impl Iterator<Item = Block> {
    (0..).map_while(move |index| Block::new(index, file_size))
}

/// 单个块的上传结果
///
/// 由块上传操作原地更新，每次尝试（无论成功失败）后都反映最新的服务端状态。
/// 调用方可以序列化保存，下次调用时作为 `PutExtra::progresses` 传回以续传。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResult {
    /// 服务端上下文令牌
    #[serde(default)]
    pub ctx: String,
    /// 块校验和
    #[serde(default)]
    pub checksum: String,
    /// 已上传部分的 crc32
    #[serde(default)]
    pub crc32: u32,
    /// 块内已上传偏移
    #[serde(default)]
    pub offset: u32,
    /// 后续请求应使用的上传域名
    #[serde(default)]
    pub host: String,
}

impl BlockResult {
    /// 是否为零值（全新上传）
    pub fn is_empty(&self) -> bool {
        self.ctx.is_empty() && self.offset == 0
    }
}
