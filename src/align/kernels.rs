use super::sw::{banded_swg, SwgParams};
use super::{AlignBuffers, AlignInput, AlignParams};
use crate::error::Result;
use crate::matches::cigar::{self, CigarBuffer, CigarOp};
use crate::matches::{MatchAlignment, MatchTrace};
use crate::util::dna;

/// 把正序单位操作写入 CIGAR 日志并统计距离与得分。
/// 开启整理时去掉两端的缺失，起点按前端缺失右移。
fn emit(ops: &[CigarOp], input: &AlignInput<'_>, params: &AlignParams, buf: &mut CigarBuffer) -> Result<Option<MatchTrace>> {
    let (mut lead, mut trail) = (0, 0);
    if params.cigar_curation {
        lead = ops.iter().take_while(|&&op| op == CigarOp::Del).count();
        trail = ops[lead..].iter().rev().take_while(|&&op| op == CigarOp::Del).count();
    }
    let start = buf.len();
    for &op in &ops[lead..ops.len() - trail] {
        if let Err(e) = buf.push(start, op, 1) {
            buf.truncate(start);
            return Err(e);
        }
    }
    let segment = buf.segment(start, buf.len() - start);
    let alignment = MatchAlignment {
        match_position: input.text_position + lead as u64,
        cigar_offset: start,
        cigar_length: segment.len(),
        effective_length: cigar::effective_length(input.key.len() as u64, segment),
        score: cigar::swg_score(segment, &params.penalties),
    };
    Ok(Some(MatchTrace::from_alignment(
        alignment,
        cigar::edit_distance(segment),
        cigar::event_distance(segment),
        alignment.score,
    )))
}

/// 平凡比对：距离直接取自搜索阶段。
/// 匹配文本与 key 不等长时，长度差写成末尾的 D / I，使 CIGAR 覆盖的参考长度与 `text_length` 一致
pub fn align_exact(input: &AlignInput<'_>, params: &AlignParams, buf: &mut CigarBuffer) -> Result<Option<MatchTrace>> {
    let m = input.key.len() as u64;
    let p = &params.penalties;
    let d = params.max_error;
    let text_length = if d == 0 { m } else { input.text_length };
    let start = buf.len();
    let pushed = buf.push(start, CigarOp::Match, m.min(text_length) as u32).and_then(|()| {
        if text_length > m {
            buf.push(start, CigarOp::Del, (text_length - m) as u32)
        } else {
            buf.push(start, CigarOp::Ins, (m - text_length) as u32)
        }
    });
    if let Err(e) = pushed {
        buf.truncate(start);
        return Err(e);
    }
    let score = p.match_score * m as i32 - d as i32 * (p.match_score + p.mismatch_penalty);
    let alignment = MatchAlignment {
        match_position: input.text_position,
        cigar_offset: start,
        cigar_length: buf.len() - start,
        effective_length: text_length,
        score,
    };
    Ok(Some(MatchTrace::from_alignment(alignment, d, d, score)))
}

/// 只允许错配；匹配文本与 key 不等长、窗口跨过序列分隔符或错配数超过上限时不可行
pub fn align_hamming(
    input: &AlignInput<'_>,
    params: &AlignParams,
    buffers: &mut AlignBuffers,
    buf: &mut CigarBuffer,
) -> Result<Option<MatchTrace>> {
    let m = input.key.len();
    // a hit of another length carries an indel
    if input.text_length != m as u64 || input.text.len() < m {
        return Ok(None);
    }
    if input.text[..m].contains(&dna::ENC_SEP) {
        return Ok(None);
    }
    buffers.ops.clear();
    let mut mismatches = 0u32;
    for (&a, &b) in input.key.iter().zip(&input.text[..m]) {
        let op = if a == b && dna::is_canonical(a) {
            CigarOp::Match
        } else {
            mismatches += 1;
            CigarOp::Mismatch(b)
        };
        buffers.ops.push(op);
    }
    if mismatches > params.max_error {
        return Ok(None);
    }
    emit(&buffers.ops, input, params, buf)
}

/// 编辑距离比对：先用位并行过滤，再做起点锚定、终点自由的 DP 回溯
pub fn align_levenshtein(
    input: &AlignInput<'_>,
    params: &AlignParams,
    buffers: &mut AlignBuffers,
    buf: &mut CigarBuffer,
) -> Result<Option<MatchTrace>> {
    let key = input.key;
    let text = input.text;
    if buffers.bpm.key_length() != key.len() {
        buffers.bpm.compile(key);
    }
    if buffers.bpm.best_end(text, params.max_error).is_none() {
        return Ok(None);
    }

    let (m, n) = (key.len(), text.len());
    let cols = n + 1;
    let dp = &mut buffers.dp;
    dp.clear();
    dp.resize((m + 1) * cols, 0);
    for j in 0..=n {
        dp[j] = j as u32;
    }
    for i in 1..=m {
        dp[i * cols] = i as u32;
        for j in 1..=n {
            let cost = u32::from(key[i - 1] != text[j - 1] || !dna::is_canonical(key[i - 1]));
            dp[i * cols + j] = (dp[(i - 1) * cols + j - 1] + cost)
                .min(dp[(i - 1) * cols + j] + 1)
                .min(dp[i * cols + j - 1] + 1);
        }
    }
    // longest end among the best ones
    let mut end = n;
    for j in (0..n).rev() {
        if dp[m * cols + j] < dp[m * cols + end] {
            end = j;
        }
    }
    if dp[m * cols + end] > params.max_error {
        return Ok(None);
    }

    let ops = &mut buffers.ops;
    ops.clear();
    let (mut i, mut j) = (m, end);
    while i > 0 || j > 0 {
        let here = dp[i * cols + j];
        let diag = if i > 0 && j > 0 {
            let cost = u32::from(key[i - 1] != text[j - 1] || !dna::is_canonical(key[i - 1]));
            (here == dp[(i - 1) * cols + j - 1] + cost).then_some(cost)
        } else {
            None
        };
        let up = i > 0 && here == dp[(i - 1) * cols + j] + 1;
        let left = j > 0 && here == dp[i * cols + j - 1] + 1;
        let take_diag = diag.is_some() && (params.left_gap_alignment || (!up && !left));
        if take_diag {
            ops.push(if diag == Some(0) { CigarOp::Match } else { CigarOp::Mismatch(text[j - 1]) });
            i -= 1;
            j -= 1;
        } else if up {
            ops.push(CigarOp::Ins);
            i -= 1;
        } else if left {
            ops.push(CigarOp::Del);
            j -= 1;
        } else {
            unreachable!("levenshtein traceback lost at ({}, {})", i, j);
        }
    }
    ops.reverse();
    let ops = std::mem::take(&mut buffers.ops);
    let result = emit(&ops, input, params, buf);
    buffers.ops = ops;
    result
}

/// 对角线上长度不小于 `min_len` 的精确匹配覆盖的 key 位置数
fn scaffold_coverage(key: &[u8], text: &[u8], band: usize, min_len: usize, covered: &mut Vec<bool>) -> usize {
    let m = key.len();
    covered.clear();
    covered.resize(m, false);
    let band = band as isize;
    for d in -band..=band {
        let mut i = if d < 0 { (-d) as usize } else { 0 };
        let mut run_start = i;
        loop {
            let j = i as isize + d;
            let inside = i < m && (j as usize) < text.len();
            let matched = inside && key[i] == text[j as usize] && dna::is_canonical(key[i]);
            if !matched {
                if i - run_start >= min_len {
                    covered[run_start..i].iter_mut().for_each(|c| *c = true);
                }
                run_start = i + 1;
            }
            if !inside {
                break;
            }
            i += 1;
        }
    }
    covered.iter().filter(|&&c| c).count()
}

/// 仿射 gap 比对（带宽 = 允许的最大误差）；可选先做锚点覆盖率检查
pub fn align_gap_affine(
    input: &AlignInput<'_>,
    params: &AlignParams,
    buffers: &mut AlignBuffers,
    buf: &mut CigarBuffer,
) -> Result<Option<MatchTrace>> {
    let band = params.max_error as usize;
    let scaffolding = &params.scaffolding;
    let min_len = scaffolding.min_matching_length as usize;
    if scaffolding.enabled && input.key.len() >= min_len {
        let covered = scaffold_coverage(input.key, input.text, band, min_len, &mut buffers.scaffold);
        if (covered as f64) < scaffolding.min_coverage * input.key.len() as f64 {
            return Ok(None);
        }
    }
    let sw = SwgParams { penalties: params.penalties, band_width: band, left_gap_alignment: params.left_gap_alignment };
    if banded_swg(input.key, input.text, sw, &mut buffers.sw).is_none() {
        return Ok(None);
    }
    buffers.ops.clear();
    buffers.ops.extend(buffers.sw.ops.iter().rev());
    let ops = std::mem::take(&mut buffers.ops);
    let result = emit(&ops, input, params, buf);
    buffers.ops = ops;
    result
}
