// 可随机读取的上传数据源

use crate::uploader::Block;
use std::io;
use std::sync::Arc;

/// 随机读取的数据源
///
/// 多个块任务会在不同 worker 上并发读取同一个数据源，因此要求 `Send + Sync`
/// 且读取不依赖共享的游标位置。
pub trait ReadAt: Send + Sync {
    /// 从 `offset` 处读取数据到 `buf`，返回实际读取的字节数
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// 读取一个完整的块
    fn read_block(&self, block: &Block) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0u8; block.size as usize];
        let mut filled = 0usize;
        while filled < buffer.len() {
            let n = self.read_at(&mut buffer[filled..], block.offset + filled as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "读取块 #{} 数据不完整: 期望 {} bytes, 实际 {} bytes",
                        block.index, block.size, filled
                    ),
                ));
            }
            filled += n;
        }
        Ok(buffer)
    }
}

fn read_from_slice(data: &[u8], buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let start = match usize::try_from(offset) {
        Ok(start) if start < data.len() => start,
        _ => return Ok(0),
    };
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    Ok(n)
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_from_slice(self, buf, offset)
    }
}

impl ReadAt for Arc<[u8]> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_from_slice(self, buf, offset)
    }
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}
