use serde::{Deserialize, Serialize};

use super::sparse::{SparseBitmap, SparseBitmapBuilder};
use super::{TextRetriever, TraversalDirection};
use crate::error::{Error, Result};
use crate::util::dna::ENC_RANGE;

/// 每个块容纳的符号数
pub const BLOCK_SYMBOLS: u64 = 64;

/// 位平面紧凑文本：
/// - 每 64 个符号为一块，低两位平面（layer_0 / layer_1）交错存放在 `layers` 中；
/// - 第三位平面只对 N、分隔符等稀有符号置位，存放在稀疏位图里。
///
/// A/C/G/T 占满 2 bit 即可表示，绝大多数块的第三平面为零，因此平均开销接近 2 bit/符号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactText {
    layers: Vec<u64>,
    length: u64,
    sparse: SparseBitmap,
}

/// 一个 64 符号块的三个位平面
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactBlock {
    pub layer_0: u64,
    pub layer_1: u64,
    pub layer_2: u64,
}

impl CompactBlock {
    #[inline]
    pub fn symbol(&self, offset: u64) -> u8 {
        let b0 = (self.layer_0 >> offset) & 1;
        let b1 = (self.layer_1 >> offset) & 1;
        let b2 = (self.layer_2 >> offset) & 1;
        (b0 | (b1 << 1) | (b2 << 2)) as u8
    }

    /// 两个块中符号不同的位置掩码
    #[inline]
    pub fn diff_mask(&self, other: &CompactBlock) -> u64 {
        (self.layer_0 ^ other.layer_0) | (self.layer_1 ^ other.layer_1) | (self.layer_2 ^ other.layer_2)
    }
}

impl CompactText {
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn num_blocks(&self) -> u64 {
        (self.layers.len() / 2) as u64
    }

    pub fn size_in_bytes(&self) -> usize {
        self.layers.len() * 8 + self.sparse.size_in_bytes()
    }

    /// 第 `block_idx` 块；越界时返回全零块
    #[inline]
    pub fn block(&self, block_idx: u64) -> CompactBlock {
        let i = block_idx as usize;
        if 2 * i + 1 >= self.layers.len() {
            return CompactBlock::default();
        }
        CompactBlock {
            layer_0: self.layers[2 * i],
            layer_1: self.layers[2 * i + 1],
            layer_2: self.sparse.get(i),
        }
    }

    /// 从任意位置开始的 64 个符号（跨块拼接）。超出文本末尾的位均为零。
    pub fn block_at(&self, position: u64) -> CompactBlock {
        let bi = position / BLOCK_SYMBOLS;
        let shift = position % BLOCK_SYMBOLS;
        let lo = self.block(bi);
        if shift == 0 {
            return lo;
        }
        let hi = self.block(bi + 1);
        let join = |a: u64, b: u64| (a >> shift) | (b << (BLOCK_SYMBOLS - shift));
        CompactBlock {
            layer_0: join(lo.layer_0, hi.layer_0),
            layer_1: join(lo.layer_1, hi.layer_1),
            layer_2: join(lo.layer_2, hi.layer_2),
        }
    }

    pub fn symbol_at(&self, position: u64) -> Result<u8> {
        if position >= self.length {
            return Err(Error::PositionOutOfRange { position, length: self.length });
        }
        Ok(self.block(position / BLOCK_SYMBOLS).symbol(position % BLOCK_SYMBOLS))
    }

    /// 迭代器：正向产出 `position..len`，反向产出 `position, position-1, .., 0`
    pub fn iter_from(&self, position: u64, direction: TraversalDirection) -> CompactTextIter<'_> {
        let remaining = match direction {
            TraversalDirection::Forward => self.length.saturating_sub(position),
            TraversalDirection::Reverse => {
                if position < self.length {
                    position + 1
                } else {
                    0
                }
            }
        };
        CompactTextIter {
            text: self,
            position,
            remaining,
            direction,
            block_idx: u64::MAX,
            block: CompactBlock::default(),
        }
    }

    pub fn iter(&self) -> CompactTextIter<'_> {
        self.iter_from(0, TraversalDirection::Forward)
    }

    /// 统计两段等长窗口中不同符号的个数（按块比较，不逐符号解码）
    pub fn window_mismatches(&self, position: u64, other: &CompactText, other_position: u64, len: u64) -> u64 {
        let mut mismatches = 0u64;
        let mut done = 0u64;
        while done < len {
            let a = self.block_at(position + done);
            let b = other.block_at(other_position + done);
            let span = (len - done).min(BLOCK_SYMBOLS);
            let mask = if span == BLOCK_SYMBOLS { u64::MAX } else { (1u64 << span) - 1 };
            mismatches += (a.diff_mask(&b) & mask).count_ones() as u64;
            done += span;
        }
        mismatches
    }

    pub fn window_eq(&self, position: u64, other: &CompactText, other_position: u64, len: u64) -> bool {
        if position + len > self.length || other_position + len > other.length {
            return false;
        }
        self.window_mismatches(position, other, other_position, len) == 0
    }
}

impl TextRetriever for CompactText {
    fn text_length(&self) -> u64 {
        self.length
    }

    fn fetch(&self, position: u64, length: usize, out: &mut Vec<u8>) -> usize {
        out.clear();
        if position >= self.length {
            return 0;
        }
        let n = (length as u64).min(self.length - position) as usize;
        out.extend(self.iter_from(position, TraversalDirection::Forward).take(n));
        n
    }
}

pub struct CompactTextIter<'a> {
    text: &'a CompactText,
    position: u64,
    remaining: u64,
    direction: TraversalDirection,
    block_idx: u64,
    block: CompactBlock,
}

impl Iterator for CompactTextIter<'_> {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let bi = self.position / BLOCK_SYMBOLS;
        if bi != self.block_idx {
            self.block = self.text.block(bi);
            self.block_idx = bi;
        }
        let enc = self.block.symbol(self.position % BLOCK_SYMBOLS);
        self.remaining -= 1;
        match self.direction {
            TraversalDirection::Forward => self.position += 1,
            TraversalDirection::Reverse => self.position = self.position.wrapping_sub(1),
        }
        Some(enc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for CompactTextIter<'_> {}

/// 顺序追加构建器；`close` 之后长度固定，并生成稀疏的第三位平面
#[derive(Debug, Default)]
pub struct CompactTextBuilder {
    layers: Vec<u64>,
    sparse: SparseBitmapBuilder,
    layer_0: u64,
    layer_1: u64,
    layer_2: u64,
    position_mod64: u64,
    length: u64,
}

impl CompactTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(symbols: usize) -> Self {
        Self { layers: Vec::with_capacity(2 * (symbols / 64 + 1)), ..Self::default() }
    }

    pub fn push(&mut self, enc: u8) -> Result<()> {
        if enc >= ENC_RANGE {
            return Err(Error::InvalidCharacter { enc, position: self.length });
        }
        let bit = self.position_mod64;
        self.layer_0 |= ((enc & 1) as u64) << bit;
        self.layer_1 |= (((enc >> 1) & 1) as u64) << bit;
        self.layer_2 |= (((enc >> 2) & 1) as u64) << bit;
        self.length += 1;
        self.position_mod64 += 1;
        if self.position_mod64 == BLOCK_SYMBOLS {
            self.flush_block();
        }
        Ok(())
    }

    pub fn extend_from_slice(&mut self, encs: &[u8]) -> Result<()> {
        for &e in encs {
            self.push(e)?;
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn flush_block(&mut self) {
        self.layers.push(self.layer_0);
        self.layers.push(self.layer_1);
        self.sparse.add_block(self.layer_2);
        self.layer_0 = 0;
        self.layer_1 = 0;
        self.layer_2 = 0;
        self.position_mod64 = 0;
    }

    pub fn close(mut self) -> CompactText {
        if self.position_mod64 > 0 {
            self.flush_block();
        }
        CompactText { layers: self.layers, length: self.length, sparse: self.sparse.build() }
    }
}
