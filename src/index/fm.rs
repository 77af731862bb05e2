use serde::{Deserialize, Serialize};

use super::CompressedIndex;
use crate::util::dna::ENC_RANGE;

/// FM 符号数：0 预留给 `$`，编码 e 存为 e + 1
pub const FM_SIGMA: usize = ENC_RANGE as usize + 1;

#[inline]
pub fn fm_symbol(enc: u8) -> u8 {
    enc + 1
}

/// FM 索引：
/// - C 表 + 定长分块的 Occ 采样（块内顺扫补偿）；
/// - SA 按文本位置稀疏采样（pos % sa_rate == 0），decode 时沿 LF 回溯到采样点。
#[derive(Debug, Serialize, Deserialize)]
pub struct FMIndex {
    pub block: u32,
    /// C[i] = 文本中符号 < i 的累计数量
    pub c: Vec<u32>,
    /// BWT 序列
    pub bwt: Vec<u8>,
    /// `$` 在 BWT 中的行号
    pub primary: u32,
    /// Occ 采样（行优先展平）：occ_samples[block_id * FM_SIGMA + c]
    pub occ_samples: Vec<u32>,
    pub sa_rate: u32,
    /// 被采样行的位图及其按字累计秩
    sa_marks: Vec<u64>,
    sa_mark_ranks: Vec<u32>,
    /// 采样到的文本位置（按行号顺序）
    sa_samples: Vec<u32>,
}

impl FMIndex {
    pub fn build(bwt: Vec<u8>, primary: usize, sa: &[u32], block: usize, sa_rate: usize) -> Self {
        assert!(block > 0 && sa_rate > 0, "occ block and sa rate must be positive");
        let n = bwt.len();

        let mut freq = vec![0u32; FM_SIGMA];
        for &ch in &bwt {
            freq[ch as usize] += 1;
        }
        let mut c = vec![0u32; FM_SIGMA + 1];
        for i in 0..FM_SIGMA {
            c[i + 1] = c[i] + freq[i];
        }

        let num_blocks = (n + block - 1) / block;
        let mut occ_samples = vec![0u32; num_blocks * FM_SIGMA];
        let mut running = [0u32; FM_SIGMA];
        for bi in 0..num_blocks {
            occ_samples[bi * FM_SIGMA..(bi + 1) * FM_SIGMA].copy_from_slice(&running);
            let end = ((bi + 1) * block).min(n);
            for &ch in &bwt[bi * block..end] {
                running[ch as usize] += 1;
            }
        }

        let mut sa_marks = vec![0u64; (n + 63) / 64];
        let mut sa_samples = Vec::with_capacity(n / sa_rate + 1);
        for (row, &p) in sa.iter().enumerate() {
            if p as usize % sa_rate == 0 {
                sa_marks[row / 64] |= 1u64 << (row % 64);
                sa_samples.push(p);
            }
        }
        let mut sa_mark_ranks = Vec::with_capacity(sa_marks.len());
        let mut acc = 0u32;
        for &w in &sa_marks {
            sa_mark_ranks.push(acc);
            acc += w.count_ones();
        }

        Self {
            block: block as u32,
            c,
            bwt,
            primary: primary as u32,
            occ_samples,
            sa_rate: sa_rate as u32,
            sa_marks,
            sa_mark_ranks,
            sa_samples,
        }
    }

    /// BWT[0..pos) 中符号 c 的出现次数
    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        if pos == 0 {
            return 0;
        }
        let block = self.block as usize;
        let bi = (pos - 1) / block;
        let base = self.occ_samples[bi * FM_SIGMA + c as usize];
        let add = self.bwt[bi * block..pos].iter().filter(|&&ch| ch == c).count() as u32;
        base + add
    }

    /// 在区间 [l, r) 上按 FM 符号 c 反向扩展
    #[inline]
    pub fn rank_range(&self, c: u8, l: usize, r: usize) -> (usize, usize) {
        let c0 = self.c[c as usize] as usize;
        (c0 + self.occ(c, l) as usize, c0 + self.occ(c, r) as usize)
    }

    /// 反向精确搜索；`pat` 为 3-bit 编码
    pub fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)> {
        let (mut l, mut r) = (0usize, self.bwt.len());
        for &a in pat.iter().rev() {
            (l, r) = self.rank_range(fm_symbol(a), l, r);
            if l >= r {
                return None;
            }
        }
        Some((l, r))
    }

    #[inline]
    fn lf(&self, row: usize) -> usize {
        debug_assert_ne!(row, self.primary as usize, "LF step through the sentinel row");
        let ch = self.bwt[row];
        self.c[ch as usize] as usize + self.occ(ch, row) as usize
    }

    #[inline]
    fn sampled(&self, row: usize) -> Option<u32> {
        let w = self.sa_marks[row / 64];
        let b = row % 64;
        if (w >> b) & 1 == 0 {
            return None;
        }
        let idx = self.sa_mark_ranks[row / 64] as usize + (w & ((1u64 << b) - 1)).count_ones() as usize;
        Some(self.sa_samples[idx])
    }

    /// 行号 -> 文本位置
    pub fn locate(&self, row: usize) -> u64 {
        assert!(row < self.bwt.len(), "rank {} outside index of length {}", row, self.bwt.len());
        let mut row = row;
        let mut steps = 0u64;
        loop {
            if let Some(p) = self.sampled(row) {
                return p as u64 + steps;
            }
            row = self.lf(row);
            steps += 1;
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.bwt.len()
            + (self.c.len() + self.occ_samples.len() + self.sa_mark_ranks.len() + self.sa_samples.len()) * 4
            + self.sa_marks.len() * 8
    }
}

impl CompressedIndex for FMIndex {
    fn length(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    fn rank_range_extend(&self, lo: usize, hi: usize, enc: u8) -> (usize, usize) {
        self.rank_range(fm_symbol(enc), lo, hi)
    }

    fn decode(&self, rank: usize) -> u64 {
        self.locate(rank)
    }
}
