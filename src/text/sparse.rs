use serde::{Deserialize, Serialize};

/// 稀疏位图：只保存非零的 64-bit 字。
///
/// `presence` 中每一位标记对应块是否有非零字，`ranks` 是 `presence` 按字累计的
/// popcount，用于 O(1) 定位 `words` 中的下标。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseBitmap {
    presence: Vec<u64>,
    ranks: Vec<u32>,
    words: Vec<u64>,
}

impl SparseBitmap {
    #[inline]
    pub fn get(&self, block: usize) -> u64 {
        let (w, b) = (block / 64, block % 64);
        let Some(&p) = self.presence.get(w) else { return 0 };
        if (p >> b) & 1 == 0 {
            return 0;
        }
        let below = p & ((1u64 << b) - 1);
        let idx = self.ranks[w] as usize + below.count_ones() as usize;
        self.words[idx]
    }

    /// 实际存储的非零字数量
    pub fn num_stored(&self) -> usize {
        self.words.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        (self.presence.len() + self.words.len()) * 8 + self.ranks.len() * 4
    }
}

#[derive(Debug, Default)]
pub struct SparseBitmapBuilder {
    presence: Vec<u64>,
    words: Vec<u64>,
    num_blocks: usize,
}

impl SparseBitmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加下一个块的字（零字只占 presence 中的一位）
    pub fn add_block(&mut self, word: u64) {
        let (w, b) = (self.num_blocks / 64, self.num_blocks % 64);
        if w >= self.presence.len() {
            self.presence.push(0);
        }
        if word != 0 {
            self.presence[w] |= 1u64 << b;
            self.words.push(word);
        }
        self.num_blocks += 1;
    }

    pub fn build(self) -> SparseBitmap {
        let mut ranks = Vec::with_capacity(self.presence.len());
        let mut acc = 0u32;
        for &p in &self.presence {
            ranks.push(acc);
            acc += p.count_ones();
        }
        SparseBitmap { presence: self.presence, ranks, words: self.words }
    }
}
