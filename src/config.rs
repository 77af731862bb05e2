use crate::error::{Error, Result};

/// 仿射 gap 打分参数；gap 长度 L 的代价为 `gap_open + gap_extend * L`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwgPenalties {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for SwgPenalties {
    fn default() -> Self {
        Self { match_score: 1, mismatch_penalty: 4, gap_open: 6, gap_extend: 1 }
    }
}

impl SwgPenalties {
    /// 给定 SWG 得分，推算能达到该得分的最小编辑距离（每个编辑至少损失 match+min(罚分)）
    pub fn min_edit_bound(&self, score: i32, key_length: u64) -> u64 {
        let perfect = self.match_score as i64 * key_length as i64;
        let loss = (perfect - score as i64).max(0);
        let per_edit = (self.match_score + self.mismatch_penalty.min(self.gap_open + self.gap_extend)) as i64;
        if per_edit <= 0 {
            return 0;
        }
        (loss / per_edit) as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AlignmentModel {
    /// 不重新比对，直接按区间距离生成平凡比对
    None,
    Hamming,
    Levenshtein,
    GapAffine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum NsearchMode {
    Full,
    Supercondensed,
}

/// 邻域搜索终止时产出区间还是逐个位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TerminationMode {
    Intervals,
    Positions,
}

/// 报告策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectParams {
    pub min_reported_strata: u64,
    pub min_reported_matches: u64,
    pub max_reported_matches: u64,
}

impl Default for SelectParams {
    fn default() -> Self {
        Self { min_reported_strata: 0, min_reported_matches: 10, max_reported_matches: 100 }
    }
}

/// gap-affine 比对的脚手架参数（锚点覆盖率门限）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaffoldingParams {
    pub enabled: bool,
    /// 锚点总长占 read 长度的最小比例
    pub min_coverage: f64,
    /// 单个锚点的最小精确匹配长度
    pub min_matching_length: u64,
}

impl Default for ScaffoldingParams {
    fn default() -> Self {
        Self { enabled: false, min_coverage: 0.8, min_matching_length: 10 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaxError {
    Absolute(u64),
    /// 占 read 长度的比例
    Fraction(f64),
}

impl MaxError {
    pub fn resolve(&self, key_length: u64) -> u64 {
        match *self {
            MaxError::Absolute(k) => k,
            MaxError::Fraction(f) => (f * key_length as f64).ceil() as u64,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchParams {
    pub max_error: MaxError,
    pub nsearch_mode: NsearchMode,
    pub termination: TerminationMode,
    pub alignment_model: AlignmentModel,
    pub swg_penalties: SwgPenalties,
    pub scaffolding: ScaffoldingParams,
    /// 去掉比对两端的缺失（起点随之右移）
    pub cigar_curation: bool,
    /// 最终报告的策略
    pub select_report: SelectParams,
    /// 比对阶段使用的策略（由 configure_se / configure_pe 派生）
    pub select_align: SelectParams,
    /// 每个 query 的 CIGAR 日志容量上限
    pub max_cigar_ops: usize,
    /// 每个 query 的邻域搜索待处理节点上限
    pub max_pending_nodes: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_error: MaxError::Fraction(0.04),
            nsearch_mode: NsearchMode::Supercondensed,
            termination: TerminationMode::Intervals,
            alignment_model: AlignmentModel::GapAffine,
            swg_penalties: SwgPenalties::default(),
            scaffolding: ScaffoldingParams::default(),
            cigar_curation: true,
            select_report: SelectParams::default(),
            select_align: SelectParams::default(),
            max_cigar_ops: 1 << 20,
            max_pending_nodes: 1 << 22,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        match self.max_error {
            MaxError::Fraction(f) if !(0.0..=1.0).contains(&f) => {
                return Err(Error::InvalidParameter(format!("max error fraction {} not in [0,1]", f)));
            }
            _ => {}
        }
        let p = &self.swg_penalties;
        if p.match_score < 0 || p.mismatch_penalty < 0 || p.gap_open < 0 || p.gap_extend < 0 {
            return Err(Error::InvalidParameter("SWG penalties must be non-negative".into()));
        }
        let s = &self.select_report;
        if s.max_reported_matches == 0 {
            return Err(Error::InvalidParameter("max reported matches must be positive".into()));
        }
        if s.min_reported_matches > s.max_reported_matches {
            return Err(Error::InvalidParameter(format!(
                "min reported matches ({}) exceeds max reported matches ({})",
                s.min_reported_matches, s.max_reported_matches
            )));
        }
        if !(0.0..=1.0).contains(&self.scaffolding.min_coverage) {
            return Err(Error::InvalidParameter("scaffolding coverage not in [0,1]".into()));
        }
        if self.max_cigar_ops == 0 || self.max_pending_nodes == 0 {
            return Err(Error::InvalidParameter("per-query capacities must be positive".into()));
        }
        Ok(())
    }
}

/// 进程级参数：搜索参数 + 运行参数
#[derive(Clone, Debug)]
pub struct MapperParams {
    pub search: SearchParams,
    pub threads: usize,
    /// 每处理多少条 read 汇报一次进度
    pub ticker_step: u64,
    /// 每批并行处理的 read 数
    pub batch_size: usize,
    /// 双端模式下最大模板长度（判定 concordant）
    pub max_template_length: u64,
}

impl Default for MapperParams {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            threads: 1,
            ticker_step: 10_000,
            batch_size: 4096,
            max_template_length: 1000,
        }
    }
}
