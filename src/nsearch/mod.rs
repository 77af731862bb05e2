//! 邻域搜索：在压缩索引上枚举与 query 编辑距离不超过 k 的全部文本。
//!
//! 每个节点是一个索引区间，向左扩展一个碱基即得到子节点；
//! 子节点的 DP 列由父列增量计算，超过 k 的分支与空区间都被剪掉。
//! 递归改写为显式工作栈（[`schedule::NsearchSchedule`]），每个分支持有自己的 DP 列。

pub mod dp;
pub mod schedule;

use tracing::{debug, trace};

use crate::config::{NsearchMode, TerminationMode};
use crate::error::{Error, Result};
use crate::index::CompressedIndex;
use crate::matches::{MatchInterval, MatchStore, PositionCandidate};
use crate::util::dna::DNA_RANGE;

pub use schedule::{NsearchSchedule, PendingOperation, SearchProfile};

/// 每个 worker 一份，跨 query 复用
#[derive(Debug)]
pub struct NeighborhoodSearch {
    schedule: NsearchSchedule,
    rkey: Vec<u8>,
}

impl NeighborhoodSearch {
    pub fn new(max_pending: usize) -> Self {
        Self { schedule: NsearchSchedule::new(max_pending), rkey: Vec::new() }
    }

    pub fn profile(&self) -> SearchProfile {
        self.schedule.profile
    }

    /// 从整个索引区间 `[0, length)` 开始的暴力邻域搜索
    pub fn brute_force<I: CompressedIndex + ?Sized>(
        &mut self,
        index: &I,
        key: &[u8],
        max_error: u32,
        mode: NsearchMode,
        termination: TerminationMode,
        store: &mut MatchStore,
    ) -> Result<u64> {
        let found = self.search_range(index, key, max_error, mode, termination, 0, index.length(), store)?;
        // every stratum up to max_error has been enumerated
        store.update_mcs(max_error as u64 + 1);
        Ok(found)
    }

    /// 从给定区间 `[lo, hi)` 开始搜索，返回终止时报告的行数（仅用于统计）
    #[allow(clippy::too_many_arguments)]
    pub fn search_range<I: CompressedIndex + ?Sized>(
        &mut self,
        index: &I,
        key: &[u8],
        max_error: u32,
        mode: NsearchMode,
        termination: TerminationMode,
        lo: usize,
        hi: usize,
        store: &mut MatchStore,
    ) -> Result<u64> {
        if key.is_empty() {
            return Err(Error::InvalidParameter("neighborhood search on an empty key".into()));
        }
        self.schedule.reset();
        if lo >= hi {
            return Ok(0);
        }
        assert!(hi <= index.length(), "search range [{}, {}) beyond index length {}", lo, hi, index.length());
        self.rkey.clear();
        self.rkey.extend(key.iter().rev());

        let k = max_error;
        let max_text_length = key.len() + k as usize;
        let root = self.schedule.pool.acquire();
        dp::init_column(self.schedule.pool.get_mut(root), key.len(), k);
        self.schedule.push(PendingOperation { lo, hi, text_length: 0, row: root })?;

        let mut total_found = 0u64;
        let mut children: [Option<PendingOperation>; DNA_RANGE as usize] = [None; DNA_RANGE as usize];
        while let Some(op) = self.schedule.pop() {
            self.schedule.profile.nodes += 1;
            let text_length = op.text_length + 1;
            let mut found = 0u64;
            for enc in 0..DNA_RANGE {
                children[enc as usize] = None;
                let child = self.schedule.pool.acquire();
                let (min_val, align_distance) = {
                    let (parent, next) = self.schedule.pool.pair_mut(op.row, child);
                    dp::compute_column(parent, next, &self.rkey, text_length, enc, k)
                };
                if min_val > k {
                    self.schedule.pool.release(child);
                    continue;
                }
                let (next_lo, next_hi) = index.rank_range_extend(op.lo, op.hi, enc);
                if next_lo >= next_hi {
                    self.schedule.pool.release(child);
                    continue;
                }
                let mut expand = false;
                match mode {
                    NsearchMode::Supercondensed => {
                        if align_distance <= k {
                            found += terminate(index, store, termination, next_lo, next_hi, text_length, align_distance);
                        } else if text_length < max_text_length {
                            expand = true;
                        }
                    }
                    NsearchMode::Full => {
                        if min_val <= align_distance && text_length < max_text_length {
                            expand = true;
                        }
                        if align_distance <= k {
                            found += terminate(index, store, termination, next_lo, next_hi, text_length, align_distance);
                        }
                    }
                }
                if expand {
                    children[enc as usize] = Some(PendingOperation { lo: next_lo, hi: next_hi, text_length, row: child });
                } else {
                    self.schedule.pool.release(child);
                }
            }
            self.schedule.pool.release(op.row);
            // reversed so that the smallest symbol is expanded first
            for child in children.iter().rev().flatten() {
                self.schedule.push(*child)?;
            }
            if found > 0 {
                self.schedule.profile.nodes_success += 1;
            } else {
                self.schedule.profile.nodes_fail += 1;
            }
            total_found += found;
        }

        let profile = self.schedule.profile;
        debug!(
            key_length = key.len(),
            max_error,
            nodes = profile.nodes,
            nodes_success = profile.nodes_success,
            nodes_fail = profile.nodes_fail,
            found = total_found,
            "neighborhood search finished"
        );
        Ok(total_found)
    }
}

/// 把一个被接受的节点交给匹配集合：区间模式存区间，位置模式逐行解码为候选位置
fn terminate<I: CompressedIndex + ?Sized>(
    index: &I,
    store: &mut MatchStore,
    termination: TerminationMode,
    lo: usize,
    hi: usize,
    text_length: usize,
    distance: u32,
) -> u64 {
    trace!(lo, hi, text_length, distance, "neighborhood hit");
    match termination {
        TerminationMode::Intervals => {
            store.add_interval(MatchInterval { lo, hi, distance, text_length: text_length as u64 });
        }
        TerminationMode::Positions => {
            for rank in lo..hi {
                store.add_position_candidate(PositionCandidate {
                    index_position: index.decode(rank),
                    distance,
                    text_length: text_length as u64,
                });
            }
        }
    }
    (hi - lo) as u64
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::index::archive::{Archive, ArchiveBuildOpt};
    use crate::text::TextRetriever;
    use crate::util::dna;

    const REFERENCE: &[u8] = b"TTGACCATGGCATGCAAGTCCGATTACAGGCATGCTTGACCAGTAGGCTNNACGTTGCA";

    fn archive() -> Archive {
        Archive::build(vec![("ref".to_string(), REFERENCE.to_vec())], ArchiveBuildOpt { occ_block: 8, sa_rate: 4 })
            .unwrap()
    }

    fn edit_distance(a: &[u8], b: &[u8]) -> u32 {
        let mut prev: Vec<u32> = (0..=b.len() as u32).collect();
        for i in 1..=a.len() {
            let mut cur = vec![i as u32; b.len() + 1];
            for j in 1..=b.len() {
                let cost = u32::from(a[i - 1] != b[j - 1]);
                cur[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(cur[j - 1] + 1);
            }
            prev = cur;
        }
        prev[b.len()]
    }

    /// (text position, text length, distance) of every reported row
    fn hits(archive: &Archive, key: &[u8], k: u32, mode: NsearchMode) -> BTreeSet<(u64, u64, u32)> {
        let mut ns = NeighborhoodSearch::new(1 << 16);
        let mut store = MatchStore::new(1024);
        ns.brute_force(&archive.fm, key, k, mode, TerminationMode::Intervals, &mut store).unwrap();
        let mut out = BTreeSet::new();
        for iv in store.intervals() {
            for rank in iv.lo..iv.hi {
                out.insert((archive.fm.decode(rank), iv.text_length, iv.distance));
            }
        }
        out
    }

    #[test]
    fn reported_distances_are_true_edit_distances() {
        let archive = archive();
        let key = dna::encode_seq(b"GGCATGCA");
        for mode in [NsearchMode::Full, NsearchMode::Supercondensed] {
            let found = hits(&archive, &key, 2, mode);
            assert!(!found.is_empty());
            let mut text = Vec::new();
            for &(pos, len, d) in &found {
                assert!(d <= 2);
                archive.text.fetch(pos, len as usize, &mut text);
                assert_eq!(edit_distance(&key, &text), d, "pos {} len {}", pos, len);
            }
        }
    }

    #[test]
    fn supercondensed_is_a_subset_of_full() {
        let archive = archive();
        let key = dna::encode_seq(b"TTGACCA");
        let full = hits(&archive, &key, 1, NsearchMode::Full);
        let condensed = hits(&archive, &key, 1, NsearchMode::Supercondensed);
        assert!(!condensed.is_empty());
        assert!(condensed.is_subset(&full));
        assert!(condensed.len() <= full.len());
    }

    #[test]
    fn zero_errors_is_exact_matching() {
        let archive = archive();
        let key = dna::encode_seq(b"GCATGC");
        let (l, r) = archive.fm.backward_search(&key).unwrap();
        let mut ns = NeighborhoodSearch::new(1 << 16);
        let mut store = MatchStore::new(1024);
        let found = ns
            .brute_force(&archive.fm, &key, 0, NsearchMode::Supercondensed, TerminationMode::Intervals, &mut store)
            .unwrap();
        assert_eq!(found, (r - l) as u64);
        assert_eq!(store.intervals(), &[MatchInterval { lo: l, hi: r, distance: 0, text_length: 6 }]);
        assert_eq!(store.max_complete_stratum(), 1);
    }

    #[test]
    fn absent_key_yields_nothing() {
        let archive = archive();
        let key = dna::encode_seq(b"AAAAAAAAAAAA");
        let mut ns = NeighborhoodSearch::new(1 << 16);
        let mut store = MatchStore::new(1024);
        let found = ns
            .brute_force(&archive.fm, &key, 1, NsearchMode::Full, TerminationMode::Intervals, &mut store)
            .unwrap();
        assert_eq!(found, 0);
        assert!(store.intervals().is_empty());
    }

    #[test]
    fn position_mode_decodes_every_row() {
        let archive = archive();
        let key = dna::encode_seq(b"GCATGC");
        let mut ns = NeighborhoodSearch::new(1 << 16);
        let mut store = MatchStore::new(1024);
        ns.brute_force(&archive.fm, &key, 0, NsearchMode::Supercondensed, TerminationMode::Positions, &mut store)
            .unwrap();
        let mut positions: Vec<u64> = store.position_candidates().iter().map(|c| c.index_position).collect();
        positions.sort_unstable();
        let (l, r) = archive.fm.backward_search(&key).unwrap();
        let mut expected: Vec<u64> = (l..r).map(|rank| archive.fm.decode(rank)).collect();
        expected.sort_unstable();
        assert_eq!(positions, expected);
        assert!(store.intervals().is_empty());
    }

    #[test]
    fn empty_key_is_rejected() {
        let archive = archive();
        let mut ns = NeighborhoodSearch::new(16);
        let mut store = MatchStore::new(16);
        let err = ns
            .brute_force(&archive.fm, &[], 1, NsearchMode::Full, TerminationMode::Intervals, &mut store)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn pending_capacity_aborts_the_query() {
        let archive = archive();
        let key = dna::encode_seq(b"GGCATGCA");
        let mut ns = NeighborhoodSearch::new(2);
        let mut store = MatchStore::new(1024);
        let err = ns
            .brute_force(&archive.fm, &key, 2, NsearchMode::Full, TerminationMode::Intervals, &mut store)
            .unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }
}
