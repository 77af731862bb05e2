use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

use super::cigar::{CigarBuffer, CigarElement};
use super::counters::MatchCounters;
use super::metrics::{MatchMetrics, UNSET_DISTANCE};
use super::{MatchInterval, MatchTrace, PositionCandidate};
use crate::config::SwgPenalties;
use crate::index::{Locator, Strand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 新位置
    Added,
    /// 重复位置，得分更高，替换了原有记录
    Replaced,
    /// 重复位置，得分不高于原有记录，丢弃
    Discarded,
}

/// 排序全序：得分高者优先，其次事件距离、编辑距离、序列标签、位置（小者优先）
pub fn rank_cmp(a: &MatchTrace, b: &MatchTrace) -> Ordering {
    b.swg_score
        .cmp(&a.swg_score)
        .then(a.event_distance.cmp(&b.event_distance))
        .then(a.edit_distance.cmp(&b.edit_distance))
        .then(a.sequence_tag.cmp(&b.sequence_tag))
        .then(a.text_position.cmp(&b.text_position))
        .then(a.strand.cmp(&b.strand))
}

/// 把索引坐标映射为 contig 坐标；反向链按有效长度回退到正向起点
fn locate<L: Locator + ?Sized>(locator: &L, trace: &mut MatchTrace) {
    let location = locator.map(trace.alignment.match_position);
    trace.sequence_tag = location.tag;
    trace.strand = location.strand;
    trace.bs_strand = location.bs_strand;
    trace.text_position = match location.strand {
        Strand::Forward => location.position,
        Strand::Reverse => {
            let effective_length = trace.alignment.effective_length;
            assert!(
                effective_length <= location.position,
                "effective length {} exceeds reverse-strand end {}",
                effective_length,
                location.position
            );
            location.position - effective_length
        }
    };
}

/// 单个 query 的匹配集合。
///
/// `traces` 始终按 [`rank_cmp`] 有序；`begin_index` / `end_index` 把起点 / 终点坐标映射到槽位。
/// 每条 trace 一定持有自己的起点键；终点键冲突时先到者持有。
/// 任何移动槽位的操作都必须同步两个映射。
#[derive(Debug)]
pub struct MatchStore {
    traces: Vec<MatchTrace>,
    begin_index: HashMap<u64, usize>,
    end_index: HashMap<u64, usize>,
    counters: MatchCounters,
    /// 未展开区间的分层计数，与 trace 计数分开维护
    interval_counters: MatchCounters,
    metrics: MatchMetrics,
    local: Vec<MatchTrace>,
    intervals: Vec<MatchInterval>,
    candidates: Vec<PositionCandidate>,
    cigar: CigarBuffer,
    max_complete_stratum: u64,
}

impl MatchStore {
    pub fn new(cigar_limit: usize) -> Self {
        Self {
            traces: Vec::new(),
            begin_index: HashMap::new(),
            end_index: HashMap::new(),
            counters: MatchCounters::new(),
            interval_counters: MatchCounters::new(),
            metrics: MatchMetrics::default(),
            local: Vec::new(),
            intervals: Vec::new(),
            candidates: Vec::new(),
            cigar: CigarBuffer::new(cigar_limit),
            max_complete_stratum: u64::MAX,
        }
    }

    /// 清空全部内容，保留已分配的容量供下一个 query 复用
    pub fn clear(&mut self) {
        self.clear_traces();
        self.interval_counters.clear();
        self.local.clear();
        self.intervals.clear();
        self.candidates.clear();
        self.cigar.clear();
        self.max_complete_stratum = u64::MAX;
    }

    /// 只清空已定位的匹配（索引、计数、指标一并重置）
    pub fn clear_traces(&mut self) {
        self.traces.clear();
        self.begin_index.clear();
        self.end_index.clear();
        self.counters.clear();
        self.metrics.clear();
    }

    pub fn traces(&self) -> &[MatchTrace] {
        &self.traces
    }

    pub fn num_traces(&self) -> usize {
        self.traces.len()
    }

    pub fn is_mapped(&self) -> bool {
        !self.traces.is_empty()
    }

    pub fn primary(&self) -> Option<&MatchTrace> {
        self.traces.first()
    }

    pub fn primary_mapq(&self) -> u8 {
        self.primary().map_or(0, |t| t.mapq)
    }

    /// mapq 由外部打分器赋值，不影响排序
    pub fn set_mapq(&mut self, slot: usize, mapq: u8) {
        self.traces[slot].mapq = mapq;
    }

    pub fn counters(&self) -> &MatchCounters {
        &self.counters
    }

    pub fn interval_counters(&self) -> &MatchCounters {
        &self.interval_counters
    }

    pub fn metrics(&self) -> &MatchMetrics {
        &self.metrics
    }

    pub fn cigar(&self) -> &CigarBuffer {
        &self.cigar
    }

    pub fn cigar_mut(&mut self) -> &mut CigarBuffer {
        &mut self.cigar
    }

    pub fn cigar_of(&self, trace: &MatchTrace) -> &[CigarElement] {
        self.cigar.segment(trace.alignment.cigar_offset, trace.alignment.cigar_length)
    }

    pub fn max_complete_stratum(&self) -> u64 {
        self.max_complete_stratum
    }

    pub fn update_mcs(&mut self, mcs: u64) {
        self.max_complete_stratum = self.max_complete_stratum.min(mcs);
    }

    pub fn min_edit_distance(&self) -> u32 {
        self.metrics.min_edit_distance
    }

    /// 最小编辑距离层的匹配数
    pub fn first_stratum_matches(&self) -> u64 {
        match self.metrics.min_edit_distance {
            UNSET_DISTANCE => 0,
            d => self.counters.get(d as u64),
        }
    }

    pub fn subdominant_stratum_matches(&self) -> u64 {
        self.counters.total() - self.first_stratum_matches()
    }

    /// 按起点或终点查找重复匹配
    pub fn lookup(&self, begin_position: u64, effective_length: u64) -> Option<usize> {
        self.begin_index
            .get(&begin_position)
            .or_else(|| self.end_index.get(&(begin_position + effective_length)))
            .copied()
    }

    /// 插入一个候选匹配，返回其最终槽位与处理结果。
    ///
    /// 重复位置保留得分更高者，平分时保留原记录。
    pub fn insert<L: Locator + ?Sized>(&mut self, locator: &L, mut candidate: MatchTrace) -> (usize, InsertOutcome) {
        candidate.mapq = 0;
        match self.lookup(candidate.alignment.match_position, candidate.alignment.effective_length) {
            None => {
                locate(locator, &mut candidate);
                self.counters.add(candidate.edit_distance as u64, 1);
                self.metrics.update(candidate.event_distance, candidate.edit_distance, candidate.swg_score);
                let slot = self.insert_sorted(candidate);
                (slot, InsertOutcome::Added)
            }
            Some(slot) if self.traces[slot].swg_score < candidate.swg_score => {
                locate(locator, &mut candidate);
                let slot = self.replace(slot, candidate);
                self.recompute_metrics();
                (slot, InsertOutcome::Replaced)
            }
            Some(slot) => {
                trace!(position = candidate.alignment.match_position, "duplicate match discarded");
                (slot, InsertOutcome::Discarded)
            }
        }
    }

    /// 二分查找插入点并后移，平分时排在已有记录之后
    fn insert_sorted(&mut self, candidate: MatchTrace) -> usize {
        let pos = self.traces.partition_point(|t| rank_cmp(t, &candidate) != Ordering::Greater);
        self.traces.insert(pos, candidate);
        // high-to-low so a freshly written end slot is never mistaken for an old one
        for slot in (pos + 1..self.traces.len()).rev() {
            self.relink(slot - 1, slot);
        }
        self.begin_index.insert(candidate.begin_key(), pos);
        self.end_index.entry(candidate.end_key()).or_insert(pos);
        pos
    }

    /// 槽位 `from` 的记录已移到 `to`
    fn relink(&mut self, from: usize, to: usize) {
        let moved = &self.traces[to];
        self.begin_index.insert(moved.begin_key(), to);
        if let Some(slot) = self.end_index.get_mut(&moved.end_key()) {
            if *slot == from {
                *slot = to;
            }
        }
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        let a_owns_end = self.end_index.get(&self.traces[a].end_key()) == Some(&a);
        let b_owns_end = self.end_index.get(&self.traces[b].end_key()) == Some(&b);
        self.traces.swap(a, b);
        self.begin_index.insert(self.traces[a].begin_key(), a);
        self.begin_index.insert(self.traces[b].begin_key(), b);
        if b_owns_end {
            self.end_index.insert(self.traces[a].end_key(), a);
        }
        if a_owns_end {
            self.end_index.insert(self.traces[b].end_key(), b);
        }
    }

    fn replace(&mut self, slot: usize, candidate: MatchTrace) -> usize {
        let old = self.traces[slot];
        if self.begin_index.get(&old.begin_key()) == Some(&slot) {
            self.begin_index.remove(&old.begin_key());
        }
        if self.end_index.get(&old.end_key()) == Some(&slot) {
            self.end_index.remove(&old.end_key());
        }
        self.counters.sub(old.edit_distance as u64, 1);
        self.counters.add(candidate.edit_distance as u64, 1);
        self.traces[slot] = candidate;
        self.begin_index.insert(candidate.begin_key(), slot);
        self.end_index.entry(candidate.end_key()).or_insert(slot);
        self.restore_order(slot)
    }

    /// 局部冒泡恢复有序。
    ///
    /// 前提：除 `slot` 之外序列有序。代价与移动距离成正比。
    fn restore_order(&mut self, mut slot: usize) -> usize {
        while slot > 0 && rank_cmp(&self.traces[slot - 1], &self.traces[slot]) == Ordering::Greater {
            self.swap_slots(slot - 1, slot);
            slot -= 1;
        }
        while slot + 1 < self.traces.len() && rank_cmp(&self.traces[slot], &self.traces[slot + 1]) == Ordering::Greater {
            self.swap_slots(slot, slot + 1);
            slot += 1;
        }
        slot
    }

    pub fn rebuild_index(&mut self) {
        self.begin_index.clear();
        self.end_index.clear();
        for (slot, t) in self.traces.iter().enumerate() {
            self.begin_index.insert(t.begin_key(), slot);
            self.end_index.entry(t.end_key()).or_insert(slot);
        }
    }

    pub fn recompute_metrics(&mut self) {
        self.metrics.clear();
        for t in &self.traces {
            self.metrics.update(t.event_distance, t.edit_distance, t.swg_score);
        }
    }

    fn recompute_counters(&mut self) {
        self.counters.clear();
        for t in &self.traces {
            self.counters.add(t.edit_distance as u64, 1);
        }
    }

    /// 按顺序保留满足条件的匹配（原地压缩，保持相对顺序）；返回删除数量
    pub fn retain_traces<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&MatchTrace) -> bool,
    {
        let before = self.traces.len();
        self.traces.retain(keep);
        let removed = before - self.traces.len();
        if removed > 0 {
            self.rebuild_index();
            self.recompute_counters();
            self.recompute_metrics();
        }
        removed
    }

    pub fn filter_by_min_score(&mut self, threshold: i32) -> usize {
        self.retain_traces(|t| t.swg_score >= threshold)
    }

    pub fn filter_by_mapq(&mut self, threshold: u8) -> usize {
        self.retain_traces(|t| t.mapq >= threshold)
    }

    pub fn sort_by_score(&mut self) {
        self.traces.sort_by(rank_cmp);
        self.rebuild_index();
    }

    /// 按 (序列, 位置) 排序；之后的插入不再保证有序，调用方应在报告前使用
    pub fn sort_by_sequence_position(&mut self) {
        self.traces.sort_by(|a, b| {
            a.sequence_tag.cmp(&b.sequence_tag).then(a.text_position.cmp(&b.text_position))
        });
        self.rebuild_index();
    }

    /// 暂存的局部匹配，彼此之间暂不去重
    pub fn add_local_match_pending(&mut self, trace: MatchTrace) {
        self.local.push(trace);
    }

    pub fn num_pending_local_matches(&self) -> usize {
        self.local.len()
    }

    /// 把暂存的局部匹配逐个走 `insert` 流程
    pub fn add_pending_local_matches<L: Locator + ?Sized>(&mut self, locator: &L) {
        let mut pending = std::mem::take(&mut self.local);
        for trace in pending.drain(..) {
            self.insert(locator, trace);
        }
        self.local = pending;
    }

    pub fn add_interval(&mut self, interval: MatchInterval) {
        if interval.is_empty() {
            return;
        }
        self.interval_counters.add(interval.distance as u64, interval.len());
        self.intervals.push(interval);
    }

    pub fn intervals(&self) -> &[MatchInterval] {
        &self.intervals
    }

    pub fn clear_intervals(&mut self) {
        self.intervals.clear();
        self.interval_counters.clear();
    }

    pub fn add_position_candidate(&mut self, candidate: PositionCandidate) {
        self.candidates.push(candidate);
    }

    pub fn position_candidates(&self) -> &[PositionCandidate] {
        &self.candidates
    }

    pub fn clear_position_candidates(&mut self) {
        self.candidates.clear();
    }

    /// 已找到足够多的匹配，且更差的匹配不可能再进入前 `max_reported_matches` 名
    pub fn max_matches_reached(
        &self,
        mcs: u64,
        key_length: u64,
        min_reported_strata: u64,
        max_reported_matches: u64,
        penalties: &SwgPenalties,
    ) -> bool {
        if !self.is_mapped() || min_reported_strata != 0 || max_reported_matches == 0 {
            return false;
        }
        if (self.traces.len() as u64) < max_reported_matches {
            return false;
        }
        let top = &self.traces[max_reported_matches as usize - 1];
        penalties.min_edit_bound(top.swg_score, key_length) <= mcs
    }

    /// 检查两个位置映射与计数是否与序列一致（测试与调试用）
    pub fn check_consistency(&self) -> bool {
        let begins_ok = self.traces.iter().enumerate().all(|(slot, t)| self.begin_index.get(&t.begin_key()) == Some(&slot));
        let begin_entries_ok = self
            .begin_index
            .iter()
            .all(|(&key, &slot)| self.traces.get(slot).map_or(false, |t| t.begin_key() == key));
        let end_entries_ok = self
            .end_index
            .iter()
            .all(|(&key, &slot)| self.traces.get(slot).map_or(false, |t| t.end_key() == key));
        let mut counters = MatchCounters::new();
        for t in &self.traces {
            counters.add(t.edit_distance as u64, 1);
        }
        let sorted = self.traces.windows(2).all(|w| rank_cmp(&w[0], &w[1]) != Ordering::Greater);
        begins_ok && begin_entries_ok && end_entries_ok && counters == self.counters && sorted
    }
}
