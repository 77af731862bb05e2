use crate::error::{Error, Result};

/// 待扩展的搜索节点：索引区间 + 已匹配文本长度 + 该节点的 DP 列
#[derive(Debug, Clone, Copy)]
pub struct PendingOperation {
    pub lo: usize,
    pub hi: usize,
    pub text_length: usize,
    /// DP 列在 [`RowPool`] 中的编号
    pub row: usize,
}

/// DP 列池：列只借出、归还，不随 query 释放
#[derive(Debug, Default)]
pub struct RowPool {
    rows: Vec<Vec<u32>>,
    free: Vec<usize>,
}

impl RowPool {
    pub fn acquire(&mut self) -> usize {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.rows.push(Vec::new());
                self.rows.len() - 1
            }
        }
    }

    pub fn release(&mut self, id: usize) {
        debug_assert!(!self.free.contains(&id), "row {} released twice", id);
        self.free.push(id);
    }

    pub fn get(&self, id: usize) -> &[u32] {
        &self.rows[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Vec<u32> {
        &mut self.rows[id]
    }

    /// 同时取出父列（只读）与子列（可写）
    pub fn pair_mut(&mut self, parent: usize, child: usize) -> (&[u32], &mut Vec<u32>) {
        assert_ne!(parent, child, "parent and child rows must differ");
        if parent < child {
            let (a, b) = self.rows.split_at_mut(child);
            (a[parent].as_slice(), &mut b[0])
        } else {
            let (a, b) = self.rows.split_at_mut(parent);
            (b[0].as_slice(), &mut a[child])
        }
    }

    /// 所有列归还
    pub fn reset(&mut self) {
        self.free.clear();
        self.free.extend((0..self.rows.len()).rev());
    }

    pub fn num_allocated(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchProfile {
    /// 展开的节点数
    pub nodes: u64,
    /// 产生了至少一个匹配的节点
    pub nodes_success: u64,
    /// 没有产生匹配的节点
    pub nodes_fail: u64,
    pub max_depth: u64,
}

/// 邻域搜索的显式工作栈。
#[derive(Debug)]
pub struct NsearchSchedule {
    pending: Vec<PendingOperation>,
    pub pool: RowPool,
    pub profile: SearchProfile,
    max_pending: usize,
}

impl NsearchSchedule {
    pub fn new(max_pending: usize) -> Self {
        Self { pending: Vec::new(), pool: RowPool::default(), profile: SearchProfile::default(), max_pending }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.pool.reset();
        self.profile = SearchProfile::default();
    }

    pub fn push(&mut self, op: PendingOperation) -> Result<()> {
        if self.pending.len() >= self.max_pending {
            return Err(Error::CapacityExceeded { resource: "nsearch pending operations", limit: self.max_pending });
        }
        self.profile.max_depth = self.profile.max_depth.max(op.text_length as u64);
        self.pending.push(op);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<PendingOperation> {
        self.pending.pop()
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_recycles_rows() {
        let mut pool = RowPool::default();
        let a = pool.acquire();
        let b = pool.acquire();
        pool.get_mut(a).extend([1, 2, 3]);
        {
            let (parent, child) = pool.pair_mut(a, b);
            child.extend(parent.iter().map(|v| v + 1));
        }
        assert_eq!(pool.get(b), &[2, 3, 4]);
        pool.release(a);
        assert_eq!(pool.acquire(), a);
        pool.reset();
        pool.acquire();
        pool.acquire();
        assert_eq!(pool.num_allocated(), 2);
    }

    #[test]
    fn pending_capacity_is_enforced() {
        let mut schedule = NsearchSchedule::new(1);
        schedule.push(PendingOperation { lo: 0, hi: 1, text_length: 0, row: 0 }).unwrap();
        let err = schedule.push(PendingOperation { lo: 0, hi: 1, text_length: 1, row: 1 }).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
        assert_eq!(schedule.num_pending(), 1);
    }
}
