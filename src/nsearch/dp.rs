//! 带状 Levenshtein DP 列。
//!
//! 索引向左扩展文本，所以 key 也按逆序处理：
//! `col_t[j] = ed(rkey[0..j], rtext[0..t])`，`rkey` 为逆序 key。
//! 只计算 `|j - t| <= k` 的带内单元，带外单元与超过 k 的值统一截断为 `k + 1`。

/// 文本长度为 0 时的初始列
pub fn init_column(column: &mut Vec<u32>, key_length: usize, max_error: u32) {
    let cap = max_error + 1;
    column.clear();
    column.extend((0..=key_length).map(|j| (j as u32).min(cap)));
}

/// 由上一列计算文本追加符号 `enc` 后的新列（新文本长度为 `text_length`）。
///
/// 返回 `(min_val, align_distance)`：列中最小值与整条 key 的比对距离。
pub fn compute_column(
    prev: &[u32],
    next: &mut Vec<u32>,
    rkey: &[u8],
    text_length: usize,
    enc: u8,
    max_error: u32,
) -> (u32, u32) {
    let m = rkey.len();
    debug_assert_eq!(prev.len(), m + 1);
    let cap = max_error + 1;
    let k = max_error as usize;
    next.clear();
    next.resize(m + 1, cap);

    let band_lo = text_length.saturating_sub(k);
    let band_hi = (text_length + k).min(m);
    let mut min_val = cap;
    if band_lo == 0 {
        next[0] = (text_length as u32).min(cap);
        min_val = next[0];
    }
    for j in band_lo.max(1)..=band_hi {
        let cost = u32::from(rkey[j - 1] != enc);
        let v = (prev[j - 1] + cost).min(prev[j] + 1).min(next[j - 1] + 1).min(cap);
        next[j] = v;
        min_val = min_val.min(v);
    }
    (min_val, next[m])
}
