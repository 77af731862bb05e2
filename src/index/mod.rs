//! 参考索引：后缀数组 / BWT / FM 索引、双链定位器与打包好的 archive。
//!
//! 核心算法只通过 [`CompressedIndex`] 与 [`Locator`] 两个 trait 访问索引。

pub mod archive;
pub mod bwt;
pub mod fm;
pub mod locator;
pub mod sa;

pub use locator::{BsStrand, Contig, IndexLocator, Strand};

/// BWT 类全文索引的最小接口。
pub trait CompressedIndex {
    /// 索引行数（含终止符）
    fn length(&self) -> usize;
    /// 在 [lo, hi) 上用编码符号 `enc` 反向扩展；`lo >= hi` 表示空区间
    fn rank_range_extend(&self, lo: usize, hi: usize, enc: u8) -> (usize, usize);
    /// 行号 -> 索引文本位置
    fn decode(&self, rank: usize) -> u64;
}

/// 索引文本位置到基因组坐标的映射结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub position: u64,
    pub strand: Strand,
    /// 序列（contig）标签
    pub tag: u32,
    pub bs_strand: BsStrand,
}

pub trait Locator {
    fn map(&self, index_position: u64) -> Location;
}
