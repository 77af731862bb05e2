use crate::config::SelectParams;

/// 按编辑距离分层的计数直方图（stratum -> 数量）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCounters {
    counts: Vec<u64>,
    total: u64,
}

impl MatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.total = 0;
    }

    pub fn add(&mut self, distance: u64, n: u64) {
        let d = distance as usize;
        if self.counts.len() <= d {
            self.counts.resize(d + 1, 0);
        }
        self.counts[d] += n;
        self.total += n;
    }

    pub fn sub(&mut self, distance: u64, n: u64) {
        let d = distance as usize;
        assert!(
            d < self.counts.len() && self.counts[d] >= n,
            "counter underflow at distance {}",
            distance
        );
        self.counts[d] -= n;
        self.total -= n;
        while self.counts.last() == Some(&0) {
            self.counts.pop();
        }
    }

    pub fn get(&self, distance: u64) -> u64 {
        self.counts.get(distance as usize).copied().unwrap_or(0)
    }

    /// 直方图的层数（最大距离 + 1）
    pub fn num_strata(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// 第一个非零层
    pub fn min_distance(&self) -> Option<u64> {
        self.counts.iter().position(|&c| c > 0).map(|d| d as u64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.counts.iter().enumerate().map(|(d, &c)| (d as u64, c))
    }

    pub fn merge(&mut self, other: &MatchCounters) {
        for (d, c) in other.iter() {
            if c > 0 {
                self.add(d, c);
            }
        }
    }

    /// 根据报告策略计算 `(reported_strata, last_stratum_reported_matches)`。
    ///
    /// 距离 < reported_strata - 1 的层全部报告，边界层只保留 last_stratum_reported_matches 个。
    /// 返回 `reported_strata == 0` 表示没有任何可报告的匹配。
    pub fn compute_matches_to_decode(&self, params: &SelectParams) -> (u64, u64) {
        let mut total = 0u64;
        let mut strata_done = 0u64;
        for (d, count) in self.iter() {
            if count == 0 {
                continue;
            }
            if total + count > params.max_reported_matches {
                return (d + 1, params.max_reported_matches - total);
            }
            total += count;
            strata_done += 1;
            if strata_done >= params.min_reported_strata && total >= params.min_reported_matches {
                return (d + 1, count);
            }
        }
        match self.counts.iter().rposition(|&c| c > 0) {
            Some(last) => (last as u64 + 1, self.counts[last]),
            None => (0, 0),
        }
    }
}
