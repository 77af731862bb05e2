//! Myers 位并行编辑距离（多字版本）。
//!
//! key 按 64 位分块，块间通过水平差值进位；文本起点自由（semi-global），
//! 只用来快速判断窗口内是否存在距离不超过上限的比对终点。

use crate::util::dna::{self, DNA_RANGE};

const WORD_BITS: usize = 64;

/// 编译好的 key：`peq[enc * words + w]` 第 i 位表示 key[w*64+i] == enc
#[derive(Debug, Default, Clone)]
pub struct BpmPattern {
    peq: Vec<u64>,
    words: usize,
    length: usize,
    pv: Vec<u64>,
    mv: Vec<u64>,
}

impl BpmPattern {
    pub fn new(key: &[u8]) -> Self {
        let mut p = Self::default();
        p.compile(key);
        p
    }

    /// 重新编译，复用已有内存
    pub fn compile(&mut self, key: &[u8]) {
        self.length = key.len();
        self.words = ((key.len() + WORD_BITS - 1) / WORD_BITS).max(1);
        self.peq.clear();
        self.peq.resize(DNA_RANGE as usize * self.words, 0);
        for (i, &enc) in key.iter().enumerate() {
            // N never matches
            if dna::is_canonical(enc) {
                self.peq[enc as usize * self.words + i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
            }
        }
    }

    pub fn key_length(&self) -> usize {
        self.length
    }

    /// 在整个文本上扫描，返回 `(终点（不含）, 距离)`，距离最小者优先，平分时取最靠前的终点。
    /// 最小距离超过 `max_error` 时返回 None。
    pub fn best_end(&mut self, text: &[u8], max_error: u32) -> Option<(usize, u32)> {
        if self.length == 0 {
            return Some((0, 0));
        }
        let words = self.words;
        self.pv.clear();
        self.pv.resize(words, !0u64);
        self.mv.clear();
        self.mv.resize(words, 0);
        let last_bit = 1u64 << ((self.length - 1) % WORD_BITS);
        let mut score = self.length as i64;
        let mut best: Option<(usize, u32)> = None;

        for (j, &enc) in text.iter().enumerate() {
            let row = if dna::is_canonical(enc) { Some(enc as usize * words) } else { None };
            // semi-global: the top boundary row never changes
            let mut hin = 0i32;
            for w in 0..words {
                let eq = row.map_or(0, |r| self.peq[r + w]);
                let (pv, mv) = (self.pv[w], self.mv[w]);
                let hin_neg = u64::from(hin < 0);
                let xv = eq | mv;
                let eq = eq | hin_neg;
                let xh = ((eq & pv).wrapping_add(pv) ^ pv) | eq;
                let mut ph = mv | !(xh | pv);
                let mut mh = pv & xh;
                if w == words - 1 {
                    if ph & last_bit != 0 {
                        score += 1;
                    }
                    if mh & last_bit != 0 {
                        score -= 1;
                    }
                }
                let hout = (ph >> 63) as i32 - (mh >> 63) as i32;
                ph <<= 1;
                mh <<= 1;
                mh |= hin_neg;
                ph |= u64::from(hin > 0);
                self.pv[w] = mh | !(xv | ph);
                self.mv[w] = ph & xv;
                hin = hout;
            }
            let d = score as u32;
            if d <= max_error && best.map_or(true, |(_, b)| d < b) {
                best = Some((j + 1, d));
            }
        }
        if best.is_none() && self.length as u32 <= max_error {
            // empty alignment at the window start
            best = Some((0, self.length as u32));
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semi_global(key: &[u8], text: &[u8]) -> Vec<u32> {
        // D[m][j] for every j, free start in text
        let mut prev = vec![0u32; text.len() + 1];
        for (i, &a) in key.iter().enumerate() {
            let mut cur = vec![i as u32 + 1; text.len() + 1];
            for j in 1..=text.len() {
                let cost = u32::from(a != text[j - 1] || !dna::is_canonical(a));
                cur[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(cur[j - 1] + 1);
            }
            prev = cur;
        }
        prev
    }

    fn lcg_seq(seed: &mut u64, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| {
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((*seed >> 33) % 4) as u8
            })
            .collect()
    }

    #[test]
    fn single_word_exact_hit() {
        let key = dna::encode_seq(b"ACGT");
        let text = dna::encode_seq(b"TTACGTTT");
        let mut p = BpmPattern::new(&key);
        assert_eq!(p.best_end(&text, 1), Some((6, 0)));
    }

    #[test]
    fn multi_word_matches_plain_dp() {
        let mut seed = 7u64;
        for &len in &[63usize, 64, 65, 150] {
            let key = lcg_seq(&mut seed, len);
            let mut text = lcg_seq(&mut seed, 10);
            let mut mutated = key.clone();
            mutated[len / 2] = (mutated[len / 2] + 1) % 4;
            mutated.remove(len / 3);
            text.extend_from_slice(&mutated);
            text.extend(lcg_seq(&mut seed, 10));

            let column = semi_global(&key, &text);
            let min = *column.iter().min().unwrap();
            let end = column.iter().position(|&d| d == min).unwrap();
            let mut p = BpmPattern::new(&key);
            assert_eq!(p.best_end(&text, 10), Some((end, min)), "len {}", len);
        }
    }

    #[test]
    fn filter_rejects_distant_windows() {
        let key = dna::encode_seq(b"AAAAAAAA");
        let text = dna::encode_seq(b"CCCCCCCCCC");
        let mut p = BpmPattern::new(&key);
        assert_eq!(p.best_end(&text, 2), None);
    }

    #[test]
    fn n_never_matches() {
        let key = dna::encode_seq(b"ACNT");
        let text = dna::encode_seq(b"ACNT");
        let mut p = BpmPattern::new(&key);
        assert_eq!(p.best_end(&text, 2), Some((4, 1)));
    }
}
