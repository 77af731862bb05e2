//! 参考文本的紧凑表示与取文本接口。

pub mod compact;
pub mod sparse;

pub use compact::{CompactBlock, CompactText, CompactTextBuilder, CompactTextIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    Forward,
    Reverse,
}

/// 按位置取出参考文本窗口（编码域）。
///
/// 结果写入调用方提供的缓冲区，以便每个 worker 复用同一块内存；
/// 返回实际取到的符号数（在文本末尾会被截断）。
pub trait TextRetriever {
    fn text_length(&self) -> u64;
    fn fetch(&self, position: u64, length: usize, out: &mut Vec<u8>) -> usize;
}

impl TextRetriever for [u8] {
    fn text_length(&self) -> u64 {
        self.len() as u64
    }

    fn fetch(&self, position: u64, length: usize, out: &mut Vec<u8>) -> usize {
        out.clear();
        let start = (position as usize).min(self.len());
        let end = start.saturating_add(length).min(self.len());
        out.extend_from_slice(&self[start..end]);
        end - start
    }
}

impl TextRetriever for Vec<u8> {
    fn text_length(&self) -> u64 {
        self.as_slice().text_length()
    }

    fn fetch(&self, position: u64, length: usize, out: &mut Vec<u8>) -> usize {
        self.as_slice().fetch(position, length, out)
    }
}
