use serde::{Deserialize, Serialize};

use super::{Location, Locator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// 亚硫酸盐链标记；普通 DNA 索引恒为 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BsStrand {
    #[default]
    None,
    C2T,
    G2A,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contig {
    pub name: String,
    pub len: u32,
    /// 正向文本中的起始偏移
    pub offset: u32,
}

/// 双链索引的定位器。
///
/// 索引文本布局：`contig_0 | contig_1 | ... |` 构成长度为 R 的正向部分，
/// 其后紧跟整个正向部分的反向互补，最后是 `$`。
/// 反向部分的位置 p 映射到正向坐标的右端点 `2R - p`（不含），
/// 由调用方减去有效长度得到正向起点。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexLocator {
    pub contigs: Vec<Contig>,
    pub forward_length: u64,
}

impl IndexLocator {
    pub fn new(contigs: Vec<Contig>, forward_length: u64) -> Self {
        Self { contigs, forward_length }
    }

    pub fn contig_name(&self, tag: u32) -> &str {
        self.contigs.get(tag as usize).map(|c| c.name.as_str()).unwrap_or("*")
    }

    /// 正向坐标 -> contig 下标（最后一个 offset <= pos 的 contig）
    fn contig_of(&self, pos: u64) -> usize {
        let idx = self.contigs.partition_point(|c| c.offset as u64 <= pos);
        idx.saturating_sub(1)
    }
}

impl Locator for IndexLocator {
    fn map(&self, index_position: u64) -> Location {
        let r = self.forward_length;
        if index_position < r {
            let ci = self.contig_of(index_position);
            let offset = self.contigs.get(ci).map_or(0, |c| c.offset as u64);
            Location {
                position: index_position - offset,
                strand: Strand::Forward,
                tag: ci as u32,
                bs_strand: BsStrand::None,
            }
        } else {
            assert!(index_position < 2 * r, "index position {} beyond reverse strand", index_position);
            let forward_end = 2 * r - index_position;
            let ci = self.contig_of(forward_end - 1);
            let offset = self.contigs.get(ci).map_or(0, |c| c.offset as u64);
            Location {
                position: forward_end - offset,
                strand: Strand::Reverse,
                tag: ci as u32,
                bs_strand: BsStrand::None,
            }
        }
    }
}
