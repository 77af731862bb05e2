//! 匹配集合：去重、按得分有序维护、分层计数与聚合指标。
//!
//! 所有 CIGAR 都写在每个 query 独享的 [`CigarBuffer`] 中，
//! [`MatchTrace`] 只持有 `(offset, length)`。

pub mod cigar;
pub mod counters;
pub mod metrics;
pub mod store;

pub use cigar::{CigarBuffer, CigarElement, CigarOp};
pub use counters::MatchCounters;
pub use metrics::{MatchMetrics, UNSET_DISTANCE};
pub use store::{InsertOutcome, MatchStore};

use crate::index::{BsStrand, Strand};

/// 比对结果在索引文本上的描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchAlignment {
    /// 比对起点（索引文本坐标，双链文本中的位置）
    pub match_position: u64,
    pub cigar_offset: usize,
    pub cigar_length: usize,
    /// 消耗的参考长度
    pub effective_length: u64,
    pub score: i32,
}

/// 已定位、已打分的匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTrace {
    pub sequence_tag: u32,
    /// 定位后的 contig 内坐标（反向链已按有效长度修正为正向起点）
    pub text_position: u64,
    pub strand: Strand,
    pub bs_strand: BsStrand,
    pub edit_distance: u32,
    pub event_distance: u32,
    pub swg_score: i32,
    pub mapq: u8,
    pub alignment: MatchAlignment,
}

impl MatchTrace {
    /// 由比对结果构造，定位字段由 [`MatchStore::insert`] 填写
    pub fn from_alignment(alignment: MatchAlignment, edit_distance: u32, event_distance: u32, swg_score: i32) -> Self {
        Self {
            sequence_tag: 0,
            text_position: 0,
            strand: Strand::Forward,
            bs_strand: BsStrand::None,
            edit_distance,
            event_distance,
            swg_score,
            mapq: 0,
            alignment,
        }
    }

    /// 去重使用的起点键
    #[inline]
    pub fn begin_key(&self) -> u64 {
        self.alignment.match_position
    }

    /// 去重使用的终点键
    #[inline]
    pub fn end_key(&self) -> u64 {
        self.alignment.match_position + self.alignment.effective_length
    }
}

/// 尚未展开的索引行区间，区间内所有行与 query 的距离相同
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchInterval {
    pub lo: usize,
    pub hi: usize,
    pub distance: u32,
    /// 匹配文本长度
    pub text_length: u64,
}

impl MatchInterval {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.hi.saturating_sub(self.lo) as u64
    }
}

/// 位置模式下的候选：已解码位置，等待比对验证
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCandidate {
    pub index_position: u64,
    pub distance: u32,
    pub text_length: u64,
}
