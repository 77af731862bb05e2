/// 未设置的距离指标
pub const UNSET_DISTANCE: u32 = u32::MAX;

/// 匹配集合的聚合指标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchMetrics {
    pub min_event_distance: u32,
    pub min_edit_distance: u32,
    pub min_swg_score: i32,
    pub max_swg_score: i32,
}

impl Default for MatchMetrics {
    fn default() -> Self {
        Self {
            min_event_distance: UNSET_DISTANCE,
            min_edit_distance: UNSET_DISTANCE,
            min_swg_score: i32::MAX,
            max_swg_score: i32::MIN,
        }
    }
}

impl MatchMetrics {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, event_distance: u32, edit_distance: u32, swg_score: i32) {
        self.min_event_distance = self.min_event_distance.min(event_distance);
        self.min_edit_distance = self.min_edit_distance.min(edit_distance);
        self.min_swg_score = self.min_swg_score.min(swg_score);
        self.max_swg_score = self.max_swg_score.max(swg_score);
    }

    pub fn is_unset(&self) -> bool {
        self.min_edit_distance == UNSET_DISTANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tracks_extremes() {
        let mut m = MatchMetrics::default();
        assert!(m.is_unset());
        m.update(2, 3, 40);
        m.update(1, 4, 55);
        assert_eq!((m.min_event_distance, m.min_edit_distance), (1, 3));
        assert_eq!((m.min_swg_score, m.max_swg_score), (40, 55));
        m.clear();
        assert!(m.is_unset());
    }
}
