//! 分层选择：按报告策略决定保留哪些匹配，并把区间匹配解码、重比对成 trace。
//!
//! 距离直方图由已定位的 trace 与尚未展开的区间共同组成；
//! 边界层（`reported_strata - 1`）只保留有限个匹配，先消耗 trace，剩余额度留给区间解码。

pub mod paired;

use tracing::trace;

use crate::align::{self, AlignBuffers, AlignInput, AlignParams};
use crate::config::{AlignmentModel, SearchParams, SelectParams};
use crate::error::Result;
use crate::index::{CompressedIndex, Locator};
use crate::matches::{MatchStore, MatchTrace};
use crate::text::TextRetriever;

pub use paired::{PairRelation, PairedMap, PairedMatches, TemplateLengthStats};

/// 单端比对阶段沿用报告策略
pub fn configure_se(params: &mut SearchParams) {
    params.select_align = params.select_report;
}

/// 双端比对阶段每端只需要少量候选用于配对
pub fn configure_pe(params: &mut SearchParams) {
    params.select_align = SelectParams { min_reported_strata: 0, min_reported_matches: 5, max_reported_matches: 5 };
}

/// 选择阶段需要的只读协作者
#[derive(Clone, Copy)]
pub struct Selector<'a> {
    index: &'a dyn CompressedIndex,
    locator: &'a dyn Locator,
    text: &'a dyn TextRetriever,
    params: &'a SearchParams,
}

impl<'a> Selector<'a> {
    pub fn new(
        index: &'a dyn CompressedIndex,
        locator: &'a dyn Locator,
        text: &'a dyn TextRetriever,
        params: &'a SearchParams,
    ) -> Self {
        Self { index, locator, text, params }
    }

    /// 单端选择：计算 `(reported_strata, last_stratum_reported_matches)`，
    /// 先整理已有 trace，再用剩余额度解码区间。
    pub fn select_se(
        &self,
        key: &[u8],
        select: &SelectParams,
        store: &mut MatchStore,
        buffers: &mut AlignBuffers,
        window: &mut Vec<u8>,
    ) -> Result<()> {
        let mut histogram = store.counters().clone();
        histogram.merge(store.interval_counters());
        let (reported_strata, last_stratum_reported_matches) = histogram.compute_matches_to_decode(select);
        trace!(reported_strata, last_stratum_reported_matches, "select single end");
        if reported_strata == 0 {
            store.clear_traces();
            store.clear_intervals();
            return Ok(());
        }
        let budget = process_trace_matches(store, reported_strata, last_stratum_reported_matches);
        self.process_interval_matches(key, store, reported_strata, budget, buffers, window)?;
        store.clear_intervals();
        Ok(())
    }

    /// 逐个解码区间：第一个位置做重比对，其余位置复用同一个比对结果。
    /// 边界层的区间受 `budget` 限制。
    pub fn process_interval_matches(
        &self,
        key: &[u8],
        store: &mut MatchStore,
        reported_strata: u64,
        budget: u64,
        buffers: &mut AlignBuffers,
        window: &mut Vec<u8>,
    ) -> Result<()> {
        let last_stratum = reported_strata - 1;
        let mut last_stratum_matches = 0u64;
        for i in 0..store.intervals().len() {
            if last_stratum_matches >= budget {
                break;
            }
            let interval = store.intervals()[i];
            if interval.is_empty() || interval.distance as u64 > last_stratum {
                continue;
            }
            let match_position = self.index.decode(interval.lo);
            let Some(aligned) =
                self.realign(key, match_position, interval.distance, interval.text_length, buffers, window, store)?
            else {
                trace!(match_position, distance = interval.distance, "interval realignment failed");
                continue;
            };
            store.insert(self.locator, aligned);
            // start shift left by end curation; every rank shares it
            let shift = aligned.alignment.match_position - match_position;

            let last_stratum_match = interval.distance as u64 == last_stratum;
            if last_stratum_match {
                last_stratum_matches += 1;
            }
            for rank in interval.lo + 1..interval.hi {
                if last_stratum_match {
                    if last_stratum_matches >= budget {
                        break;
                    }
                    last_stratum_matches += 1;
                }
                let mut expanded = aligned;
                expanded.alignment.match_position = self.index.decode(rank) + shift;
                store.insert(self.locator, expanded);
            }
        }
        Ok(())
    }

    /// 位置模式：逐个候选取文本、比对、插入；返回成功插入（含替换）的数量
    pub fn verify_candidates(
        &self,
        key: &[u8],
        store: &mut MatchStore,
        buffers: &mut AlignBuffers,
        window: &mut Vec<u8>,
    ) -> Result<usize> {
        let mut accepted = 0;
        for i in 0..store.position_candidates().len() {
            let candidate = store.position_candidates()[i];
            let aligned = self.realign(
                key,
                candidate.index_position,
                candidate.distance,
                candidate.text_length,
                buffers,
                window,
                store,
            )?;
            if let Some(aligned) = aligned {
                store.insert(self.locator, aligned);
                accepted += 1;
            }
        }
        store.clear_position_candidates();
        Ok(accepted)
    }

    /// 距离为 0 或模型为 None 时不取文本；Hamming 取 key 长度的窗口，其余模型取匹配文本长度
    #[allow(clippy::too_many_arguments)]
    fn realign(
        &self,
        key: &[u8],
        match_position: u64,
        distance: u32,
        text_length: u64,
        buffers: &mut AlignBuffers,
        window: &mut Vec<u8>,
        store: &mut MatchStore,
    ) -> Result<Option<MatchTrace>> {
        let model = self.params.alignment_model;
        window.clear();
        if distance > 0 && model != AlignmentModel::None {
            let length = match model {
                AlignmentModel::Hamming => key.len(),
                _ => text_length as usize,
            };
            self.text.fetch(match_position, length, window);
        }
        let input = AlignInput { key, text: window.as_slice(), text_position: match_position, text_length };
        let params = AlignParams::from_search(self.params, distance);
        align::align(model, &input, &params, buffers, store.cigar_mut())
    }
}

/// 按顺序保留边界层以内的 trace，边界层最多 `budget` 个；返回边界层剩余额度
pub fn process_trace_matches(store: &mut MatchStore, reported_strata: u64, budget: u64) -> u64 {
    let last_stratum = reported_strata - 1;
    let mut last_stratum_matches = 0u64;
    store.retain_traces(|t| {
        let distance = t.edit_distance as u64;
        if distance > last_stratum {
            return false;
        }
        if distance == last_stratum {
            if last_stratum_matches >= budget {
                return false;
            }
            last_stratum_matches += 1;
        }
        true
    });
    budget - last_stratum_matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::archive::{Archive, ArchiveBuildOpt};
    use crate::index::{BsStrand, Location, Strand};
    use crate::matches::{MatchAlignment, MatchInterval};
    use crate::config::{NsearchMode, TerminationMode};
    use crate::nsearch::NeighborhoodSearch;
    use crate::util::dna;

    /// 只实现 decode 的索引：行 10/11/12 解码为 500/620/781
    struct FixedDecode;

    impl CompressedIndex for FixedDecode {
        fn length(&self) -> usize {
            100
        }

        fn rank_range_extend(&self, _lo: usize, _hi: usize, _enc: u8) -> (usize, usize) {
            (0, 0)
        }

        fn decode(&self, rank: usize) -> u64 {
            match rank {
                10 => 500,
                11 => 620,
                12 => 781,
                r => r as u64,
            }
        }
    }

    struct Identity;

    impl Locator for Identity {
        fn map(&self, p: u64) -> Location {
            Location { position: p, strand: Strand::Forward, tag: 0, bs_strand: BsStrand::None }
        }
    }

    fn trace(position: u64, edit: u32) -> MatchTrace {
        let score = 50 - 5 * edit as i32;
        MatchTrace::from_alignment(
            MatchAlignment { match_position: position, cigar_offset: 0, cigar_length: 0, effective_length: 50, score },
            edit,
            edit,
            score,
        )
    }

    fn exact_params() -> SearchParams {
        SearchParams { alignment_model: AlignmentModel::None, ..SearchParams::default() }
    }

    #[test]
    fn stratified_policy_keeps_first_two_strata() {
        let mut store = MatchStore::new(64);
        let layout: &[(u32, u64)] = &[(0, 2), (1, 3), (2, 5)];
        let mut position = 0;
        for &(edit, n) in layout {
            for _ in 0..n {
                store.insert(&Identity, trace(position, edit));
                position += 100;
            }
        }
        let params = exact_params();
        let text: Vec<u8> = Vec::new();
        let selector = Selector::new(&FixedDecode, &Identity, &text, &params);
        let select = SelectParams { min_reported_strata: 2, min_reported_matches: 4, max_reported_matches: 10 };
        let mut buffers = AlignBuffers::new();
        let mut window = Vec::new();
        selector.select_se(&[0, 1, 2], &select, &mut store, &mut buffers, &mut window).unwrap();

        assert_eq!(store.num_traces(), 5);
        assert!(store.traces().iter().all(|t| t.edit_distance <= 1));
        assert!(store.check_consistency());
    }

    #[test]
    fn boundary_stratum_is_truncated_in_rank_order() {
        let mut store = MatchStore::new(64);
        for (i, edit) in [0u32, 1, 1, 1].into_iter().enumerate() {
            store.insert(&Identity, trace(i as u64 * 100, edit));
        }
        let remaining = process_trace_matches(&mut store, 2, 2);
        assert_eq!(remaining, 0);
        let positions: Vec<u64> = store.traces().iter().map(|t| t.text_position).collect();
        assert_eq!(positions, vec![0, 100, 200]);
        assert_eq!(store.counters().get(1), 2);
    }

    fn interval_store() -> MatchStore {
        let mut store = MatchStore::new(64);
        store.add_interval(MatchInterval { lo: 10, hi: 13, distance: 1, text_length: 6 });
        store
    }

    #[test]
    fn interval_expansion_follows_the_budget() {
        let params = exact_params();
        let text: Vec<u8> = Vec::new();
        let selector = Selector::new(&FixedDecode, &Identity, &text, &params);
        let key = dna::encode_seq(b"ACGTAC");
        let mut buffers = AlignBuffers::new();
        let mut window = Vec::new();

        let mut store = interval_store();
        let select = SelectParams { min_reported_strata: 0, min_reported_matches: 3, max_reported_matches: 100 };
        selector.select_se(&key, &select, &mut store, &mut buffers, &mut window).unwrap();
        let mut positions: Vec<u64> = store.traces().iter().map(|t| t.text_position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![500, 620, 781]);
        // every expanded trace shares the first alignment
        assert!(store.traces().iter().all(|t| t.alignment.cigar_offset == 0 && t.edit_distance == 1));

        let mut store = interval_store();
        let select = SelectParams { min_reported_strata: 0, min_reported_matches: 1, max_reported_matches: 1 };
        selector.select_se(&key, &select, &mut store, &mut buffers, &mut window).unwrap();
        assert_eq!(store.num_traces(), 1);
        assert_eq!(store.traces()[0].text_position, 500);
        assert!(store.intervals().is_empty());
    }

    #[test]
    fn empty_histogram_clears_everything() {
        let params = exact_params();
        let text: Vec<u8> = Vec::new();
        let selector = Selector::new(&FixedDecode, &Identity, &text, &params);
        let mut store = MatchStore::new(16);
        let mut buffers = AlignBuffers::new();
        let mut window = Vec::new();
        selector
            .select_se(&[0], &SelectParams::default(), &mut store, &mut buffers, &mut window)
            .unwrap();
        assert!(!store.is_mapped());
    }

    #[test]
    fn intervals_are_realigned_against_the_reference() {
        const REFERENCE: &[u8] = b"TTGACCATGGCATGCAAGTCCGATTACAGGCATGCTTGACCAGTAGGCTAACGTTGCA";
        let archive =
            Archive::build(vec![("ref".to_string(), REFERENCE.to_vec())], ArchiveBuildOpt { occ_block: 8, sa_rate: 4 })
                .unwrap();
        // one substitution against GATTACAGGCATG
        let key = dna::encode_seq(b"GATTCCAGGCATG");
        let mut params = SearchParams { alignment_model: AlignmentModel::GapAffine, ..SearchParams::default() };
        params.select_report = SelectParams { min_reported_strata: 0, min_reported_matches: 1, max_reported_matches: 10 };

        let mut store = MatchStore::new(1024);
        let mut nsearch = NeighborhoodSearch::new(1 << 16);
        nsearch
            .brute_force(&archive.fm, &key, 1, NsearchMode::Supercondensed, TerminationMode::Intervals, &mut store)
            .unwrap();
        assert!(!store.intervals().is_empty());

        let selector = Selector::new(&archive.fm, &archive.locator, &archive.text, &params);
        let mut buffers = AlignBuffers::new();
        buffers.prepare(&key);
        let mut window = Vec::new();
        selector.select_se(&key, &params.select_report, &mut store, &mut buffers, &mut window).unwrap();

        let best = store.primary().unwrap();
        assert_eq!(best.strand, Strand::Forward);
        assert_eq!(best.text_position, 21);
        assert_eq!(best.edit_distance, 1);
        assert_eq!(crate::matches::cigar::to_cigar_string(store.cigar_of(best)), "13M");
    }

    #[test]
    fn expanded_ranks_keep_the_curated_start() {
        // GATTACAGG twice, each preceded by an A
        const REFERENCE: &[u8] = b"TTAGATTACAGGTTTCAGATTACAGGCC";
        let archive =
            Archive::build(vec![("ref".to_string(), REFERENCE.to_vec())], ArchiveBuildOpt { occ_block: 8, sa_rate: 4 })
                .unwrap();
        let read = b"GATTACAGG";
        let key = dna::encode_seq(read);
        let params = SearchParams { alignment_model: AlignmentModel::GapAffine, ..SearchParams::default() };
        let select = SelectParams { min_reported_strata: 2, min_reported_matches: 100, max_reported_matches: 100 };

        let mut store = MatchStore::new(1024);
        let mut nsearch = NeighborhoodSearch::new(1 << 16);
        nsearch.brute_force(&archive.fm, &key, 1, NsearchMode::Full, TerminationMode::Intervals, &mut store).unwrap();
        // AGATTACAGG is a two-row interval at distance 1
        assert!(store.intervals().iter().any(|iv| iv.distance == 1 && iv.len() == 2 && iv.text_length == 10));

        let selector = Selector::new(&archive.fm, &archive.locator, &archive.text, &params);
        let mut buffers = AlignBuffers::new();
        buffers.prepare(&key);
        let mut window = Vec::new();
        selector.select_se(&key, &select, &mut store, &mut buffers, &mut window).unwrap();

        let mut exact: Vec<u64> = Vec::new();
        for t in store.traces().iter().filter(|t| t.strand == Strand::Forward && t.edit_distance == 0) {
            let pos = t.text_position as usize;
            assert_eq!(&REFERENCE[pos..pos + read.len()], &read[..], "edit-0 trace at {}", pos);
            exact.push(t.text_position);
        }
        exact.sort_unstable();
        assert_eq!(exact, vec![3, 17]);
    }

    #[test]
    fn hamming_skips_indel_hits_at_contig_edges() {
        const C2: &[u8] = b"GATTACAGGCATGCCTAG";
        let archive = Archive::build(
            vec![("c1".to_string(), b"AAAAAAAAAAAAAAAA".to_vec()), ("c2".to_string(), C2.to_vec())],
            ArchiveBuildOpt { occ_block: 8, sa_rate: 4 },
        )
        .unwrap();
        // reverse complement of C2[0..11] plus one base past the contig start
        let key = dna::encode_seq(b"TGCCTGTAATCA");
        let params = SearchParams { alignment_model: AlignmentModel::Hamming, ..SearchParams::default() };

        let mut store = MatchStore::new(1024);
        let mut nsearch = NeighborhoodSearch::new(1 << 16);
        nsearch.brute_force(&archive.fm, &key, 1, NsearchMode::Full, TerminationMode::Intervals, &mut store).unwrap();
        assert!(store.intervals().iter().any(|iv| iv.text_length == 11));

        let selector = Selector::new(&archive.fm, &archive.locator, &archive.text, &params);
        let mut buffers = AlignBuffers::new();
        buffers.prepare(&key);
        let mut window = Vec::new();
        selector.select_se(&key, &params.select_report, &mut store, &mut buffers, &mut window).unwrap();
        assert!(!store.is_mapped());
    }

    #[test]
    fn position_candidates_are_verified() {
        let reference = dna::encode_seq(b"AAAAACGTACGTTTTT");
        let params = SearchParams { alignment_model: AlignmentModel::Hamming, ..SearchParams::default() };
        let selector = Selector::new(&FixedDecode, &Identity, &reference, &params);
        let key = dna::encode_seq(b"ACGTACGA");
        let mut store = MatchStore::new(64);
        store.add_position_candidate(crate::matches::PositionCandidate { index_position: 4, distance: 1, text_length: 8 });
        // four mismatches at this offset
        store.add_position_candidate(crate::matches::PositionCandidate { index_position: 0, distance: 1, text_length: 8 });
        let mut buffers = AlignBuffers::new();
        let mut window = Vec::new();
        let accepted = selector.verify_candidates(&key, &mut store, &mut buffers, &mut window).unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(store.num_traces(), 1);
        assert!(store.position_candidates().is_empty());
        assert_eq!(store.primary().unwrap().text_position, 4);
        assert_eq!(store.primary().unwrap().edit_distance, 1);
    }

    #[test]
    fn paired_configuration_uses_small_budget() {
        let mut params = SearchParams::default();
        configure_pe(&mut params);
        assert_eq!(params.select_align.max_reported_matches, 5);
        configure_se(&mut params);
        assert_eq!(params.select_align, params.select_report);
    }
}
