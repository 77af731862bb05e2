use std::cmp::Ordering;

use tracing::warn;

use crate::config::SelectParams;
use crate::index::Strand;
use crate::matches::{MatchStore, MatchTrace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairRelation {
    Concordant,
    Discordant,
}

/// 一对 mate 的组合；`end1` / `end2` 是各自 [`MatchStore`] 中的槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedMap {
    pub end1: usize,
    pub end2: usize,
    pub relation: PairRelation,
    /// 同一序列上两端覆盖的总跨度；不同序列时为 0
    pub template_length: u64,
    pub distance: u32,
    pub swg_score: i32,
}

/// 配对排序：concordant 优先，其次总得分高、总距离小，最后按槽位
fn paired_cmp(a: &PairedMap, b: &PairedMap) -> Ordering {
    a.relation
        .cmp(&b.relation)
        .then(b.swg_score.cmp(&a.swg_score))
        .then(a.distance.cmp(&b.distance))
        .then(a.end1.cmp(&b.end1))
        .then(a.end2.cmp(&b.end2))
}

fn span(t: &MatchTrace) -> (u64, u64) {
    (t.text_position, t.text_position + t.alignment.effective_length)
}

/// FR 方向：正向 mate 的起点不晚于反向 mate 的终点，且模板长度在上限内
fn relation_of(a: &MatchTrace, b: &MatchTrace, template_length: u64, max_template_length: u64) -> PairRelation {
    if a.sequence_tag != b.sequence_tag || a.strand == b.strand || template_length > max_template_length {
        return PairRelation::Discordant;
    }
    let (forward, reverse) = if a.strand == Strand::Forward { (a, b) } else { (b, a) };
    if span(forward).0 <= span(reverse).1 {
        PairRelation::Concordant
    } else {
        PairRelation::Discordant
    }
}

#[derive(Debug, Default)]
pub struct PairedMatches {
    maps: Vec<PairedMap>,
}

impl PairedMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }

    pub fn maps(&self) -> &[PairedMap] {
        &self.maps
    }

    pub fn num_maps(&self) -> usize {
        self.maps.len()
    }

    pub fn push(&mut self, map: PairedMap) {
        self.maps.push(map);
    }

    /// 两端各自的匹配两两组合，按配对序排好
    pub fn pair_ends(&mut self, end1: &MatchStore, end2: &MatchStore, max_template_length: u64) {
        self.maps.clear();
        for (i, a) in end1.traces().iter().enumerate() {
            for (j, b) in end2.traces().iter().enumerate() {
                let template_length = if a.sequence_tag == b.sequence_tag {
                    let (a_begin, a_end) = span(a);
                    let (b_begin, b_end) = span(b);
                    a_end.max(b_end) - a_begin.min(b_begin)
                } else {
                    0
                };
                self.maps.push(PairedMap {
                    end1: i,
                    end2: j,
                    relation: relation_of(a, b, template_length, max_template_length),
                    template_length,
                    distance: a.edit_distance + b.edit_distance,
                    swg_score: a.swg_score + b.swg_score,
                });
            }
        }
        self.maps.sort_by(paired_cmp);
    }

    /// O(n) 检查是否按配对序排列
    pub fn is_ranked(&self) -> bool {
        self.maps.windows(2).all(|w| paired_cmp(&w[0], &w[1]) != Ordering::Greater)
    }
}

/// 双端选择：唯一的 concordant 配对用来采样模板长度，超出上限的尾部截掉
pub fn select_pe(paired: &mut PairedMatches, select: &SelectParams, stats: &mut TemplateLengthStats) {
    let num_maps = paired.maps.len();
    if num_maps == 0 {
        return;
    }
    if num_maps == 1 && paired.maps[0].relation == PairRelation::Concordant {
        stats.sample(paired.maps[0].template_length);
    }
    if !paired.is_ranked() {
        warn!(num_maps, "paired maps out of order, re-sorting before truncation");
        paired.maps.sort_by(paired_cmp);
    }
    paired.maps.truncate(select.max_reported_matches as usize);
}

/// 模板长度的在线统计（Welford）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemplateLengthStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl TemplateLengthStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, template_length: u64) {
        self.count += 1;
        let x = template_length as f64;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 合并另一个 worker 的统计
    pub fn merge(&mut self, other: &TemplateLengthStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n = (self.count + other.count) as f64;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * self.count as f64 * other.count as f64 / n;
        self.mean += delta * other.count as f64 / n;
        self.count += other.count;
    }
}
