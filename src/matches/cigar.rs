use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::config::SwgPenalties;
use crate::error::{Error, Result};
use crate::util::dna;

/// CIGAR 操作（SAM 语义：`Ins` 只消耗 read，`Del` 只消耗参考）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    /// 单碱基错配，记录参考上的碱基
    Mismatch(u8),
    Ins,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarElement {
    pub op: CigarOp,
    pub length: u32,
}

/// 每个 query 独享的 CIGAR 日志：只追加，match 通过 (offset, length) 引用。
#[derive(Debug)]
pub struct CigarBuffer {
    ops: Vec<CigarElement>,
    limit: usize,
}

impl CigarBuffer {
    pub fn new(limit: usize) -> Self {
        Self { ops: Vec::with_capacity(limit.min(4096)), limit }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// 回退到给定长度（丢弃失败比对写入的部分）
    pub fn truncate(&mut self, len: usize) {
        self.ops.truncate(len);
    }

    /// 追加一个操作；相邻的同类 Match/Ins/Del 自动合并（只在 `segment_start` 之后合并）
    pub fn push(&mut self, segment_start: usize, op: CigarOp, length: u32) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        if self.ops.len() > segment_start {
            if let Some(last) = self.ops.last_mut() {
                let mergeable = !matches!(op, CigarOp::Mismatch(_));
                if mergeable && last.op == op {
                    last.length += length;
                    return Ok(());
                }
            }
        }
        if self.ops.len() >= self.limit {
            return Err(Error::CapacityExceeded { resource: "cigar", limit: self.limit });
        }
        self.ops.push(CigarElement { op, length });
        Ok(())
    }

    pub fn segment(&self, offset: usize, length: usize) -> &[CigarElement] {
        &self.ops[offset..offset + length]
    }
}

/// 有效长度 = read 长度 - 插入 + 缺失（即消耗的参考长度）
pub fn effective_length(read_length: u64, cigar: &[CigarElement]) -> u64 {
    let mut len = read_length as i64;
    for e in cigar {
        match e.op {
            CigarOp::Ins => len -= e.length as i64,
            CigarOp::Del => len += e.length as i64,
            _ => {}
        }
    }
    assert!(len >= 0, "match effective length must be positive");
    len as u64
}

/// 编辑距离：错配 + 插入/缺失的碱基数
pub fn edit_distance(cigar: &[CigarElement]) -> u32 {
    cigar
        .iter()
        .map(|e| match e.op {
            CigarOp::Match => 0,
            _ => e.length,
        })
        .sum()
}

/// 事件距离：错配数 + gap 个数（一个连续 gap 只算一次）
pub fn event_distance(cigar: &[CigarElement]) -> u32 {
    cigar
        .iter()
        .map(|e| match e.op {
            CigarOp::Match => 0,
            CigarOp::Mismatch(_) => e.length,
            CigarOp::Ins | CigarOp::Del => 1,
        })
        .sum()
}

/// 仿射 gap 得分
pub fn swg_score(cigar: &[CigarElement], p: &SwgPenalties) -> i32 {
    cigar
        .iter()
        .map(|e| {
            let len = e.length as i32;
            match e.op {
                CigarOp::Match => p.match_score * len,
                CigarOp::Mismatch(_) => -p.mismatch_penalty * len,
                CigarOp::Ins | CigarOp::Del => -(p.gap_open + p.gap_extend * len),
            }
        })
        .sum()
}

fn op_rank(op: CigarOp) -> u8 {
    match op {
        CigarOp::Match => 0,
        CigarOp::Mismatch(_) => 1,
        CigarOp::Ins => 2,
        CigarOp::Del => 3,
    }
}

/// CIGAR 全序：先比元素个数，再逐个比操作类型、错配碱基与长度
pub fn cigar_cmp(a: &[CigarElement], b: &[CigarElement]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        for (x, y) in a.iter().zip(b) {
            let ord = op_rank(x.op).cmp(&op_rank(y.op)).then_with(|| match (x.op, y.op) {
                (CigarOp::Mismatch(p), CigarOp::Mismatch(q)) => p.cmp(&q),
                _ => x.length.cmp(&y.length),
            });
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    })
}

/// 渲染为 SAM 风格字符串（错配并入 M）
pub fn to_cigar_string(cigar: &[CigarElement]) -> String {
    let mut out = String::new();
    let mut cur: Option<(char, u32)> = None;
    for e in cigar {
        let ch = match e.op {
            CigarOp::Match | CigarOp::Mismatch(_) => 'M',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
        };
        cur = match cur {
            Some((c, n)) if c == ch => Some((c, n + e.length)),
            Some((c, n)) => {
                let _ = write!(&mut out, "{}{}", n, c);
                Some((ch, e.length))
            }
            None => Some((ch, e.length)),
        };
    }
    if let Some((c, n)) = cur {
        let _ = write!(&mut out, "{}{}", n, c);
    }
    out
}

/// GEM 风格的紧凑描述：匹配长度为数字，错配写参考碱基，gap 用 `>n-` / `>n+`
pub fn to_match_string(cigar: &[CigarElement]) -> String {
    let mut out = String::new();
    for e in cigar {
        let _ = match e.op {
            CigarOp::Match => write!(&mut out, "{}", e.length),
            CigarOp::Mismatch(base) => write!(&mut out, "{}", dna::decode(base) as char),
            CigarOp::Ins => write!(&mut out, ">{}-", e.length),
            CigarOp::Del => write!(&mut out, ">{}+", e.length),
        };
    }
    out
}
