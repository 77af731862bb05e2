use crate::config::SwgPenalties;
use crate::matches::CigarOp;
use crate::util::dna;

const NEG_INF: i32 = i32::MIN / 4;

#[derive(Clone, Copy, Debug)]
pub struct SwgParams {
    pub penalties: SwgPenalties,
    pub band_width: usize,
    /// 回溯时优先走对角线，使 gap 尽量靠左
    pub left_gap_alignment: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SwgResult {
    pub score: i32,
    /// 文本中比对终点（不含）
    pub text_end: usize,
}

/// DP 工作缓冲区，可跨调用复用
#[derive(Debug, Default)]
pub struct SwBuffer {
    h: Vec<i32>,
    e: Vec<i32>,
    f: Vec<i32>,
    /// 回溯得到的单位操作（逆序）
    pub ops: Vec<CigarOp>,
}

impl SwBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resize(&mut self, size: usize) {
        for m in [&mut self.h, &mut self.e, &mut self.f] {
            m.clear();
            m.resize(size, NEG_INF);
        }
        self.ops.clear();
    }
}

#[inline]
fn subst(a: u8, b: u8, p: &SwgPenalties) -> i32 {
    if a == b && dna::is_canonical(a) {
        p.match_score
    } else {
        -p.mismatch_penalty
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    H,
    E,
    F,
}

/// 带状仿射 gap 比对（Smith-Waterman-Gotoh 变体）：
/// key 必须全部比上，文本起点固定在窗口开头，终点自由。
///
/// `E` 为 key 中插入（纵向），`F` 为文本中缺失（横向）。
/// 成功时单位操作按逆序写入 `buf.ops`；带内无可行比对时返回 None。
pub fn banded_swg(key: &[u8], text: &[u8], p: SwgParams, buf: &mut SwBuffer) -> Option<SwgResult> {
    let m = key.len();
    let n = text.len();
    let rows = m + 1;
    let cols = n + 1;
    buf.resize(rows * cols);
    let pen = &p.penalties;
    let band = p.band_width;
    let gap = |len: usize| -(pen.gap_open + pen.gap_extend * len as i32);

    let h = &mut buf.h;
    let e = &mut buf.e;
    let f = &mut buf.f;

    h[0] = 0;
    for j in 1..=n.min(band) {
        h[j] = gap(j);
        f[j] = gap(j);
    }
    for i in 1..=m {
        let j_start = i.saturating_sub(band);
        let j_end = (i + band).min(n);
        if j_start == 0 {
            h[i * cols] = gap(i);
            e[i * cols] = gap(i);
        }
        for j in j_start.max(1)..=j_end {
            let idx = i * cols + j;
            let up_idx = (i - 1) * cols + j;
            let left_idx = i * cols + (j - 1);
            let diag_idx = (i - 1) * cols + (j - 1);

            let e_open = h[up_idx] - pen.gap_open - pen.gap_extend;
            let e_ext = e[up_idx] - pen.gap_extend;
            e[idx] = e_open.max(e_ext).max(NEG_INF);

            let f_open = h[left_idx] - pen.gap_open - pen.gap_extend;
            let f_ext = f[left_idx] - pen.gap_extend;
            f[idx] = f_open.max(f_ext).max(NEG_INF);

            let diag = h[diag_idx] + subst(key[i - 1], text[j - 1], pen);
            h[idx] = diag.max(e[idx]).max(f[idx]).max(NEG_INF);
        }
    }

    // free text end: best cell of the last row
    let mut best: Option<(i32, usize)> = None;
    for j in m.saturating_sub(band)..=(m + band).min(n) {
        let v = h[m * cols + j];
        if v > NEG_INF / 2 && best.map_or(true, |(b, _)| v > b) {
            best = Some((v, j));
        }
    }
    let (score, text_end) = best?;

    let (mut i, mut j) = (m, text_end);
    let mut state = State::H;
    while i > 0 || j > 0 {
        let idx = i * cols + j;
        match state {
            State::H => {
                if i == 0 {
                    buf.ops.push(CigarOp::Del);
                    j -= 1;
                    continue;
                }
                if j == 0 {
                    buf.ops.push(CigarOp::Ins);
                    i -= 1;
                    continue;
                }
                let diag_ok = h[idx] == h[(i - 1) * cols + (j - 1)] + subst(key[i - 1], text[j - 1], pen);
                let take_diag = diag_ok && (p.left_gap_alignment || (h[idx] != e[idx] && h[idx] != f[idx]));
                if take_diag {
                    let op = if key[i - 1] == text[j - 1] && dna::is_canonical(key[i - 1]) {
                        CigarOp::Match
                    } else {
                        CigarOp::Mismatch(text[j - 1])
                    };
                    buf.ops.push(op);
                    i -= 1;
                    j -= 1;
                } else if h[idx] == e[idx] {
                    state = State::E;
                } else if h[idx] == f[idx] {
                    state = State::F;
                } else {
                    debug_assert!(false, "swg traceback lost at ({}, {})", i, j);
                    return None;
                }
            }
            State::E => {
                buf.ops.push(CigarOp::Ins);
                let opened = i == 1 || e[idx] == h[(i - 1) * cols + j] - pen.gap_open - pen.gap_extend;
                if opened {
                    state = State::H;
                }
                i -= 1;
            }
            State::F => {
                buf.ops.push(CigarOp::Del);
                let opened = j == 1 || f[idx] == h[i * cols + (j - 1)] - pen.gap_open - pen.gap_extend;
                if opened {
                    state = State::H;
                }
                j -= 1;
            }
        }
    }
    Some(SwgResult { score, text_end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(band_width: usize) -> SwgParams {
        SwgParams { penalties: SwgPenalties::default(), band_width, left_gap_alignment: true }
    }

    fn ops_forward(buf: &SwBuffer) -> Vec<CigarOp> {
        buf.ops.iter().rev().copied().collect()
    }

    #[test]
    fn swg_perfect_match() {
        let key = dna::encode_seq(b"ACGTACGT");
        let text = dna::encode_seq(b"ACGTACGTTT");
        let mut buf = SwBuffer::new();
        let res = banded_swg(&key, &text, params(2), &mut buf).unwrap();
        assert_eq!(res, SwgResult { score: 8, text_end: 8 });
        assert!(ops_forward(&buf).iter().all(|&op| op == CigarOp::Match));
    }

    #[test]
    fn swg_single_mismatch() {
        let key = dna::encode_seq(b"ACGTACGT");
        let text = dna::encode_seq(b"ACGAACGT");
        let mut buf = SwBuffer::new();
        let res = banded_swg(&key, &text, params(1), &mut buf).unwrap();
        assert_eq!(res.score, 7 - 4);
        assert_eq!(ops_forward(&buf)[3], CigarOp::Mismatch(dna::ENC_A));
    }

    #[test]
    fn swg_deletion_in_read() {
        // text carries one extra base
        let key = dna::encode_seq(b"ACGTTGCAAC");
        let text = dna::encode_seq(b"ACGTTAGCAAC");
        let mut buf = SwBuffer::new();
        let res = banded_swg(&key, &text, params(2), &mut buf).unwrap();
        assert_eq!(res, SwgResult { score: 10 - 7, text_end: 11 });
        let ops = ops_forward(&buf);
        assert_eq!(ops.iter().filter(|&&op| op == CigarOp::Del).count(), 1);
        assert_eq!(ops.len(), 11);
    }

    #[test]
    fn swg_insertion_in_read() {
        let key = dna::encode_seq(b"ACGTTAGCAAC");
        let text = dna::encode_seq(b"ACGTTGCAACGG");
        let mut buf = SwBuffer::new();
        let res = banded_swg(&key, &text, params(2), &mut buf).unwrap();
        assert_eq!(res, SwgResult { score: 10 - 7, text_end: 10 });
        assert_eq!(ops_forward(&buf).iter().filter(|&&op| op == CigarOp::Ins).count(), 1);
    }

    #[test]
    fn gap_placement_follows_preference() {
        // the deleted T can sit at any of the three T positions
        let key = dna::encode_seq(b"ACTTGCA");
        let text = dna::encode_seq(b"ACTTTGCA");
        let mut buf = SwBuffer::new();
        banded_swg(&key, &text, params(2), &mut buf).unwrap();
        let left = ops_forward(&buf);
        assert_eq!(left.iter().position(|&op| op == CigarOp::Del), Some(2));

        let right = SwgParams { left_gap_alignment: false, ..params(2) };
        banded_swg(&key, &text, right, &mut buf).unwrap();
        let ops = ops_forward(&buf);
        assert_eq!(ops.iter().position(|&op| op == CigarOp::Del), Some(4));
    }

    #[test]
    fn band_too_narrow_is_infeasible() {
        let key = dna::encode_seq(b"ACGT");
        let text = dna::encode_seq(b"");
        let mut buf = SwBuffer::new();
        assert!(banded_swg(&key, &text, params(2), &mut buf).is_none());
    }
}
