//! MAP 文本输出：每个 read 一行
//! `tag \t read \t qual \t counters \t maps`。
//!
//! counters 按距离分层，`:` 分隔；最大完整层之后的第一个分隔符写成 `+`。
//! 紧凑模式下连续 3 个以上的 0 写成 `0x<n>`。
//! maps 形如 `seq:strand:pos:CIGAR`（1-based），多个以 `,` 分隔，未比上时为 `-`。

use std::fmt::Write;

use crate::index::IndexLocator;
use crate::matches::cigar::to_cigar_string;
use crate::matches::{MatchCounters, MatchStore, MatchTrace};
use crate::select::PairedMatches;

/// 无最大完整层信息
pub const MCS_UNKNOWN: u64 = u64::MAX;

pub fn format_counters(out: &mut String, counters: &MatchCounters, mcs: u64, compact: bool) {
    let mut strata = counters.num_strata() as u64;
    if mcs != MCS_UNKNOWN {
        strata = strata.max(mcs);
    }
    let strata = strata.max(1);
    let mut d = 0;
    while d < strata {
        if d > 0 {
            out.push(if d == mcs { '+' } else { ':' });
        }
        let count = counters.get(d);
        if compact && count == 0 {
            let mut run = 1;
            while d + run < strata && d + run != mcs && counters.get(d + run) == 0 {
                run += 1;
            }
            if run >= 3 {
                let _ = write!(out, "0x{}", run);
                d += run;
                continue;
            }
        }
        let _ = write!(out, "{}", count);
        d += 1;
    }
}

pub fn format_match(out: &mut String, store: &MatchStore, trace: &MatchTrace, locator: &IndexLocator) {
    let _ = write!(
        out,
        "{}:{}:{}:{}",
        locator.contig_name(trace.sequence_tag),
        trace.strand.as_char(),
        trace.text_position + 1,
        to_cigar_string(store.cigar_of(trace))
    );
}

fn push_bytes(out: &mut String, bytes: &[u8]) {
    out.push_str(&String::from_utf8_lossy(bytes));
}

/// 单端记录（含换行）
pub fn format_single_end(
    out: &mut String,
    tag: &str,
    read: &[u8],
    qual: Option<&[u8]>,
    histogram: &MatchCounters,
    store: &MatchStore,
    locator: &IndexLocator,
) {
    out.push_str(tag);
    out.push('\t');
    push_bytes(out, read);
    out.push('\t');
    push_bytes(out, qual.unwrap_or_default());
    out.push('\t');
    format_counters(out, histogram, store.max_complete_stratum(), true);
    out.push('\t');
    if store.is_mapped() {
        for (i, trace) in store.traces().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            format_match(out, store, trace, locator);
        }
    } else {
        out.push('-');
    }
    out.push('\n');
}

/// 双端记录：两端的 read / qual 以空格分隔，每个配对写成 `map1::map2`
#[allow(clippy::too_many_arguments)]
pub fn format_paired_end(
    out: &mut String,
    tag: &str,
    reads: [&[u8]; 2],
    quals: [Option<&[u8]>; 2],
    histogram: &MatchCounters,
    mcs: u64,
    ends: [&MatchStore; 2],
    paired: &PairedMatches,
    locator: &IndexLocator,
) {
    out.push_str(tag);
    out.push('\t');
    push_bytes(out, reads[0]);
    out.push(' ');
    push_bytes(out, reads[1]);
    out.push('\t');
    push_bytes(out, quals[0].unwrap_or_default());
    out.push(' ');
    push_bytes(out, quals[1].unwrap_or_default());
    out.push('\t');
    format_counters(out, histogram, mcs, true);
    out.push('\t');
    if paired.num_maps() == 0 {
        out.push('-');
    }
    for (i, map) in paired.maps().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        format_match(out, ends[0], &ends[0].traces()[map.end1], locator);
        out.push_str("::");
        format_match(out, ends[1], &ends[1].traces()[map.end2], locator);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BsStrand, Contig, Location, Locator, Strand};
    use crate::matches::{CigarOp, MatchAlignment};

    fn counters(pairs: &[(u64, u64)]) -> MatchCounters {
        let mut c = MatchCounters::new();
        for &(d, n) in pairs {
            c.add(d, n);
        }
        c
    }

    fn render(c: &MatchCounters, mcs: u64, compact: bool) -> String {
        let mut s = String::new();
        format_counters(&mut s, c, mcs, compact);
        s
    }

    #[test]
    fn counters_mark_the_complete_strata() {
        assert_eq!(render(&counters(&[(1, 2)]), 2, true), "0:2");
        assert_eq!(render(&counters(&[(1, 2)]), 1, true), "0+2");
        assert_eq!(render(&counters(&[(1, 2)]), 3, true), "0:2:0");
        assert_eq!(render(&MatchCounters::new(), MCS_UNKNOWN, true), "0");
    }

    #[test]
    fn compact_counters_collapse_zero_runs() {
        let c = counters(&[(5, 1)]);
        assert_eq!(render(&c, 7, true), "0x5:1:0");
        assert_eq!(render(&c, 7, false), "0:0:0:0:0:1:0");
        // runs never cross the marker
        assert_eq!(render(&c, 2, true), "0:0+0x3:1");
    }

    struct Identity;

    impl Locator for Identity {
        fn map(&self, p: u64) -> Location {
            Location { position: p, strand: Strand::Forward, tag: 0, bs_strand: BsStrand::None }
        }
    }

    #[test]
    fn single_end_line_layout() {
        let locator = IndexLocator::new(vec![Contig { name: "chr1".into(), len: 1000, offset: 0 }], 1001);
        let mut store = MatchStore::new(16);
        store.cigar_mut().push(0, CigarOp::Match, 4).unwrap();
        let alignment = MatchAlignment { match_position: 9, cigar_offset: 0, cigar_length: 1, effective_length: 4, score: 4 };
        store.insert(&Identity, MatchTrace::from_alignment(alignment, 0, 0, 4));
        store.update_mcs(2);

        let mut line = String::new();
        format_single_end(&mut line, "r1", b"ACGT", Some(&b"IIII"[..]), &counters(&[(0, 1)]), &store, &locator);
        assert_eq!(line, "r1\tACGT\tIIII\t1:0\tchr1:+:10:4M\n");

        store.clear();
        let mut line = String::new();
        format_single_end(&mut line, "r2", b"ACGT", None, &MatchCounters::new(), &store, &locator);
        assert_eq!(line, "r2\tACGT\t\t0\t-\n");
    }
}
