use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fm::{fm_symbol, FMIndex};
use super::locator::{Contig, IndexLocator};
use super::{bwt, sa};
use crate::text::{CompactText, CompactTextBuilder};
use crate::util::dna;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuildOpt {
    /// Occ 采样块大小
    pub occ_block: usize,
    /// SA 采样率
    pub sa_rate: usize,
}

impl Default for ArchiveBuildOpt {
    fn default() -> Self {
        Self { occ_block: 64, sa_rate: 8 }
    }
}

/// 双链 FM 索引 + 紧凑文本 + 定位器，作为一个整体序列化
#[derive(Debug, Serialize, Deserialize)]
pub struct Archive {
    pub fm: FMIndex,
    pub text: CompactText,
    pub locator: IndexLocator,
    pub meta: IndexMeta,
}

impl Archive {
    /// 从 (名称, ASCII 序列) 构建索引
    pub fn build<I>(records: I, opt: ArchiveBuildOpt) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut forward: Vec<u8> = Vec::new();
        let mut contigs: Vec<Contig> = Vec::new();
        for (name, seq) in records {
            let offset = forward.len() as u32;
            forward.extend(seq.iter().map(|&b| dna::encode(b)));
            let len = forward.len() as u32 - offset;
            contigs.push(Contig { name, len, offset });
            // separator between contigs
            forward.push(dna::ENC_SEP);
        }
        if contigs.is_empty() {
            bail!("reference contains no sequences");
        }
        if contigs.iter().all(|c| c.len == 0) {
            bail!("reference contains only empty sequences");
        }
        let forward_length = forward.len() as u64;
        let reverse = dna::revcomp_enc(&forward);

        let mut builder = CompactTextBuilder::with_capacity(2 * forward.len());
        builder.extend_from_slice(&forward)?;
        builder.extend_from_slice(&reverse)?;
        let text = builder.close();

        let mut fm_text: Vec<u8> = forward.iter().chain(reverse.iter()).map(|&e| fm_symbol(e)).collect();
        fm_text.push(0);
        debug!(symbols = fm_text.len(), "building suffix array");
        let sa_arr = sa::build_sa(&fm_text);
        let (bwt_arr, primary) = bwt::build_bwt(&fm_text, &sa_arr);
        let fm = FMIndex::build(bwt_arr, primary, &sa_arr, opt.occ_block, opt.sa_rate);

        info!(
            contigs = contigs.len(),
            forward_length,
            fm_bytes = fm.size_in_bytes(),
            text_bytes = text.size_in_bytes(),
            "archive built"
        );

        Ok(Self { fm, text, locator: IndexLocator::new(contigs, forward_length), meta: IndexMeta::default() })
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let f = std::fs::File::create(path)?;
        bincode::serialize_into(std::io::BufWriter::new(f), self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let archive: Self = bincode::deserialize_from(std::io::BufReader::new(f))?;
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{CompressedIndex, Locator, Strand};
    use crate::text::TextRetriever;

    #[test]
    fn both_strands_are_searchable() {
        let archive = Archive::build(
            vec![("chr1".to_string(), b"AAAACCCGTTG".to_vec())],
            ArchiveBuildOpt { occ_block: 4, sa_rate: 2 },
        )
        .unwrap();
        // CCCG on the forward strand
        let (l, r) = archive.fm.backward_search(&dna::encode_seq(b"CCCG")).unwrap();
        assert_eq!(r - l, 1);
        let loc = archive.locator.map(archive.fm.decode(l));
        assert_eq!((loc.strand, loc.position), (Strand::Forward, 4));

        // CAAC only exists as the reverse complement of GTTG
        let (l, r) = archive.fm.backward_search(&dna::encode_seq(b"CAAC")).unwrap();
        assert_eq!(r - l, 1);
        let loc = archive.locator.map(archive.fm.decode(l));
        assert_eq!(loc.strand, Strand::Reverse);
        assert_eq!(loc.position - 4, 7);

        let mut buf = Vec::new();
        archive.text.fetch(archive.fm.decode(l), 4, &mut buf);
        assert_eq!(buf, dna::encode_seq(b"CAAC"));
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!(Archive::build(Vec::new(), ArchiveBuildOpt::default()).is_err());
        assert!(Archive::build(vec![("e".to_string(), Vec::new())], ArchiveBuildOpt::default()).is_err());
    }
}
