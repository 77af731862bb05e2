/// 构建后缀数组（前缀倍增，每轮按 (rank[i], rank[i+k]) 键排序）。
///
/// 输入为 FM 符号序列：0 为唯一的终止符 `$`，且必须位于末尾；
/// 其余符号 (1..sigma) 来自 3-bit 编码加一，分隔符也在其中。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    debug_assert_eq!(text[n - 1], 0, "text must end with the sentinel");

    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<u32> = text.iter().map(|&b| b as u32).collect();
    let mut next_rank = vec![0u32; n];

    // 越界的第二关键字视为最小（0），真实秩整体加一避免冲突
    let key = |rank: &[u32], i: usize, k: usize| -> (u32, u32) {
        let second = if i + k < n { rank[i + k] + 1 } else { 0 };
        (rank[i], second)
    };

    let mut k = 1usize;
    loop {
        sa.sort_unstable_by_key(|&i| key(&rank, i as usize, k));

        next_rank[sa[0] as usize] = 0;
        let mut classes = 1u32;
        for w in 1..n {
            let prev = sa[w - 1] as usize;
            let curr = sa[w] as usize;
            if key(&rank, prev, k) != key(&rank, curr, k) {
                classes += 1;
            }
            next_rank[curr] = classes - 1;
        }
        std::mem::swap(&mut rank, &mut next_rank);

        if classes as usize == n || k >= n {
            break;
        }
        k <<= 1;
    }
    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sa(text: &[u8]) -> Vec<u32> {
        let n = text.len();
        let mut suffixes: Vec<(usize, &[u8])> = (0..n).map(|i| (i, &text[i..])).collect();
        suffixes.sort_by(|a, b| a.1.cmp(b.1));
        suffixes.into_iter().map(|(i, _)| i as u32).collect()
    }

    fn make_text(len: usize) -> Vec<u8> {
        let mut x: u32 = 987_654;
        let mut v = Vec::with_capacity(len + 1);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(((x >> 16) % 6) as u8 + 1);
        }
        v.push(0);
        v
    }

    #[test]
    fn sa_basic() {
        // A C G T $ -> 1 2 3 4 0
        let text = [1u8, 2, 3, 4, 0];
        assert_eq!(build_sa(&text), vec![4, 0, 1, 2, 3]);
    }

    #[test]
    fn sa_matches_naive_on_random_texts() {
        for len in 0..=40 {
            let text = make_text(len);
            assert_eq!(build_sa(&text), naive_sa(&text), "mismatch on len={}", len);
        }
    }

    #[test]
    fn sa_handles_separators_and_repeats() {
        // A A A | A A A $
        let text = [1u8, 1, 1, 6, 1, 1, 1, 0];
        let sa = build_sa(&text);
        assert_eq!(sa, naive_sa(&text));
        assert_eq!(sa[0], 7);
    }
}
