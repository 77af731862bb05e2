//! 候选位置的重比对：精确 / Hamming / Levenshtein / 仿射 gap 四种模型。
//!
//! 所有 kernel 都把 CIGAR 追加到 query 的 [`CigarBuffer`]，返回待插入的 [`MatchTrace`]。
//! `Ok(None)` 表示在给定约束下比对不可行（候选被丢弃），`Err` 只表示容量耗尽。

pub mod bpm;
pub mod kernels;
pub mod sw;

use crate::config::{AlignmentModel, ScaffoldingParams, SearchParams, SwgPenalties};
use crate::error::Result;
use crate::matches::{CigarBuffer, CigarOp, MatchTrace};

pub use bpm::BpmPattern;
pub use kernels::{align_exact, align_gap_affine, align_hamming, align_levenshtein};
pub use sw::SwBuffer;

/// 一次比对的输入
#[derive(Debug, Clone, Copy)]
pub struct AlignInput<'a> {
    /// query（编码域）
    pub key: &'a [u8],
    /// 参考窗口，从 `text_position` 开始
    pub text: &'a [u8],
    /// 窗口起点的索引坐标
    pub text_position: u64,
    /// 搜索阶段匹配到的文本长度
    pub text_length: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AlignParams {
    pub max_error: u32,
    pub left_gap_alignment: bool,
    pub penalties: SwgPenalties,
    pub scaffolding: ScaffoldingParams,
    pub cigar_curation: bool,
}

impl AlignParams {
    pub fn from_search(params: &SearchParams, max_error: u32) -> Self {
        Self {
            max_error,
            left_gap_alignment: true,
            penalties: params.swg_penalties,
            scaffolding: params.scaffolding,
            cigar_curation: params.cigar_curation,
        }
    }
}

/// 每个 worker 的比对工作区
#[derive(Debug, Default)]
pub struct AlignBuffers {
    pub sw: SwBuffer,
    pub bpm: BpmPattern,
    dp: Vec<u32>,
    scaffold: Vec<bool>,
    /// 正序的单位操作
    ops: Vec<CigarOp>,
}

impl AlignBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每个 query 开始时调用
    pub fn prepare(&mut self, key: &[u8]) {
        self.bpm.compile(key);
    }
}

/// 按模型分派。距离为 0 或模型为 None 时直接生成平凡比对。
pub fn align(
    model: AlignmentModel,
    input: &AlignInput<'_>,
    params: &AlignParams,
    buffers: &mut AlignBuffers,
    cigar: &mut CigarBuffer,
) -> Result<Option<MatchTrace>> {
    if params.max_error == 0 || model == AlignmentModel::None {
        return align_exact(input, params, cigar);
    }
    match model {
        AlignmentModel::Hamming => align_hamming(input, params, buffers, cigar),
        AlignmentModel::Levenshtein => align_levenshtein(input, params, buffers, cigar),
        AlignmentModel::GapAffine => align_gap_affine(input, params, buffers, cigar),
        AlignmentModel::None => align_exact(input, params, cigar),
    }
}
