//! # nsearch-mapper
//!
//! 基于 FM 索引邻域搜索的近似 read 比对核心。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：从 FASTA 构建双链 FM 索引（后缀数组 + BWT）与紧凑参考文本
//! - **邻域搜索**：在索引上枚举编辑距离不超过 k 的全部文本（full / supercondensed）
//! - **匹配集合**：按坐标去重、按得分有序维护、分层计数
//! - **分层选择**：按报告策略解码区间并用 Hamming / Levenshtein / 仿射 gap 模型重比对
//! - **比对主循环**：rayon 并行的单端 / 双端驱动与 MAP 格式输出
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use nsearch_mapper::align::AlignBuffers;
//! use nsearch_mapper::config::{NsearchMode, SearchParams, TerminationMode};
//! use nsearch_mapper::index::archive::{Archive, ArchiveBuildOpt};
//! use nsearch_mapper::matches::MatchStore;
//! use nsearch_mapper::nsearch::NeighborhoodSearch;
//! use nsearch_mapper::select::Selector;
//! use nsearch_mapper::util::dna;
//!
//! let reference = b"ACGTACGTAGCTGATCGTAGGATTACAGGCATG".to_vec();
//! let archive = Archive::build(vec![("chr1".to_string(), reference)], ArchiveBuildOpt::default())?;
//!
//! // 允许 1 个编辑
//! let key = dna::encode_seq(b"GCTGTTCGTA");
//! let params = SearchParams::default();
//! let mut store = MatchStore::new(params.max_cigar_ops);
//! let mut nsearch = NeighborhoodSearch::new(params.max_pending_nodes);
//! nsearch.brute_force(&archive.fm, &key, 1, NsearchMode::Full, TerminationMode::Intervals, &mut store)?;
//!
//! let selector = Selector::new(&archive.fm, &archive.locator, &archive.text, &params);
//! let mut buffers = AlignBuffers::new();
//! buffers.prepare(&key);
//! let mut window = Vec::new();
//! selector.select_se(&key, &params.select_report, &mut store, &mut buffers, &mut window)?;
//! for t in store.traces() {
//!     println!("{}:{} edit={} score={}", t.strand.as_char(), t.text_position, t.edit_distance, t.swg_score);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`index`]：后缀数组、BWT、FM 索引、双链定位器与 archive 持久化
//! - [`text`]：紧凑参考文本（位平面 + 稀疏例外层）
//! - [`nsearch`]：邻域搜索
//! - [`matches`]：匹配集合、CIGAR 日志、分层计数
//! - [`align`]：候选位置的重比对 kernel
//! - [`select`]：单端 / 双端分层选择
//! - [`mapper`]：批量比对驱动
//! - [`io`]：FASTA / FASTQ 解析与 MAP 输出
//! - [`config`]：搜索、选择与运行参数
//! - [`util`]：DNA 编码 / 反向互补等工具函数

pub mod align;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod mapper;
pub mod matches;
pub mod nsearch;
pub mod select;
pub mod text;
pub mod util;

pub use error::{Error, Result};
