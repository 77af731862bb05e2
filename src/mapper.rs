//! 单端 / 双端比对主循环。
//!
//! 输入按批读取，每批用 rayon 并行处理；每个 worker 通过 `map_init` 持有自己的
//! [`SearchContext`]，跨 read 复用。结果按输入顺序写出。

use std::fmt;
use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::align::AlignBuffers;
use crate::config::{MapperParams, SearchParams, SelectParams, TerminationMode};
use crate::error::Error;
use crate::index::archive::Archive;
use crate::io::fastq::{ReadReader, ReadRecord};
use crate::io::map;
use crate::matches::{MatchCounters, MatchStore};
use crate::nsearch::NeighborhoodSearch;
use crate::select::{self, PairedMatches, Selector, TemplateLengthStats};
use crate::util::dna;

/// 当前 query 的描述，随错误一起上报
#[derive(Debug, Clone)]
pub struct QueryDiagnostics {
    pub tag: String,
    /// 在输入中的序号（从 0 开始）
    pub index: u64,
}

impl fmt::Display for QueryDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read #{} '{}'", self.index, self.tag)
    }
}

/// 共享进度计数，每处理 `step` 条 read 汇报一次
#[derive(Debug)]
pub struct Ticker {
    step: u64,
    processed: u64,
    next_report: u64,
    started: Instant,
}

impl Ticker {
    pub fn new(step: u64) -> Self {
        let step = step.max(1);
        Self { step, processed: 0, next_report: step, started: Instant::now() }
    }

    pub fn update(&mut self, n: u64) {
        self.processed += n;
        if self.processed >= self.next_report {
            info!(reads = self.processed, elapsed_s = self.started.elapsed().as_secs_f64(), "mapping progress");
            while self.next_report <= self.processed {
                self.next_report += self.step;
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}

/// 进度计数只是统计，持锁线程 panic 后照常使用
fn tick(ticker: &Mutex<Ticker>) {
    ticker.lock().unwrap_or_else(PoisonError::into_inner).update(1);
}

/// 每个 worker 一份的检索状态
#[derive(Debug)]
pub struct SearchContext {
    nsearch: NeighborhoodSearch,
    store: MatchStore,
    buffers: AlignBuffers,
    window: Vec<u8>,
    key: Vec<u8>,
    /// 选择前的距离直方图（trace 与区间合计），用于输出
    histogram: MatchCounters,
}

impl SearchContext {
    pub fn new(params: &SearchParams) -> Self {
        Self {
            nsearch: NeighborhoodSearch::new(params.max_pending_nodes),
            store: MatchStore::new(params.max_cigar_ops),
            buffers: AlignBuffers::new(),
            window: Vec::new(),
            key: Vec::new(),
            histogram: MatchCounters::new(),
        }
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    pub fn histogram(&self) -> &MatchCounters {
        &self.histogram
    }

    /// 邻域搜索 + 选择。空 read 视为未比上。
    pub fn search_se(
        &mut self,
        archive: &Archive,
        params: &SearchParams,
        select: &SelectParams,
        read: &[u8],
    ) -> crate::error::Result<()> {
        self.store.clear();
        self.histogram.clear();
        self.key.clear();
        self.key.extend(read.iter().map(|&b| dna::encode(b)));
        if self.key.is_empty() {
            return Ok(());
        }
        let key_length = self.key.len() as u64;
        let max_error = params.max_error.resolve(key_length).min(key_length) as u32;
        self.buffers.prepare(&self.key);
        self.nsearch.brute_force(
            &archive.fm,
            &self.key,
            max_error,
            params.nsearch_mode,
            params.termination,
            &mut self.store,
        )?;

        let selector = Selector::new(&archive.fm, &archive.locator, &archive.text, params);
        if params.termination == TerminationMode::Positions {
            selector.verify_candidates(&self.key, &mut self.store, &mut self.buffers, &mut self.window)?;
        }
        self.histogram.clone_from(self.store.counters());
        self.histogram.merge(self.store.interval_counters());
        selector.select_se(&self.key, select, &mut self.store, &mut self.buffers, &mut self.window)
    }
}

/// 双端 worker 状态
#[derive(Debug)]
pub struct PairedContext {
    end1: SearchContext,
    end2: SearchContext,
    paired: PairedMatches,
}

impl PairedContext {
    pub fn new(params: &SearchParams) -> Self {
        Self { end1: SearchContext::new(params), end2: SearchContext::new(params), paired: PairedMatches::new() }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MappingSummary {
    pub reads: u64,
    pub mapped: u64,
    /// 因单个 query 容量耗尽而按未比上输出的 read
    pub dropped: u64,
    pub template_length: TemplateLengthStats,
}

struct MappedRead {
    line: String,
    mapped: bool,
    dropped: bool,
    template_length: TemplateLengthStats,
}

/// 容量耗尽只影响当前 read；其他错误带上 read 信息向上传播
fn recoverable(result: crate::error::Result<()>, diag: &QueryDiagnostics) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e @ Error::CapacityExceeded { .. }) => {
            warn!(read = %diag, error = %e, "read dropped");
            Ok(false)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("while mapping {}", diag))),
    }
}

fn map_one_se(
    ctx: &mut SearchContext,
    archive: &Archive,
    params: &SearchParams,
    read: &ReadRecord,
    diag: &QueryDiagnostics,
) -> Result<MappedRead> {
    let searched = recoverable(ctx.search_se(archive, params, &params.select_align, &read.seq), diag)?;
    if !searched {
        ctx.store.clear();
        ctx.histogram.clear();
    }
    let mut line = String::new();
    map::format_single_end(
        &mut line,
        &read.tag,
        &read.seq,
        read.qual.as_deref(),
        &ctx.histogram,
        &ctx.store,
        &archive.locator,
    );
    Ok(MappedRead {
        line,
        mapped: ctx.store.is_mapped(),
        dropped: !searched,
        template_length: TemplateLengthStats::new(),
    })
}

#[allow(clippy::too_many_arguments)]
fn map_one_pe(
    ctx: &mut PairedContext,
    archive: &Archive,
    params: &SearchParams,
    max_template_length: u64,
    end1: &ReadRecord,
    end2: &ReadRecord,
    diag: &QueryDiagnostics,
) -> Result<MappedRead> {
    let select = params.select_align;
    let searched = recoverable(
        ctx.end1
            .search_se(archive, params, &select, &end1.seq)
            .and_then(|()| ctx.end2.search_se(archive, params, &select, &end2.seq)),
        diag,
    )?;
    let mut template_length = TemplateLengthStats::new();
    ctx.paired.clear();
    if searched {
        ctx.paired.pair_ends(&ctx.end1.store, &ctx.end2.store, max_template_length);
        select::paired::select_pe(&mut ctx.paired, &params.select_report, &mut template_length);
    } else {
        ctx.end1.store.clear();
        ctx.end2.store.clear();
    }
    let mut histogram = MatchCounters::new();
    for m in ctx.paired.maps() {
        histogram.add(m.distance as u64, 1);
    }
    let mcs = ctx.end1.store.max_complete_stratum().min(ctx.end2.store.max_complete_stratum());
    let mut line = String::new();
    map::format_paired_end(
        &mut line,
        &diag.tag,
        [end1.seq.as_slice(), end2.seq.as_slice()],
        [end1.qual.as_deref(), end2.qual.as_deref()],
        &histogram,
        mcs,
        [&ctx.end1.store, &ctx.end2.store],
        &ctx.paired,
        &archive.locator,
    );
    Ok(MappedRead { line, mapped: ctx.paired.num_maps() > 0, dropped: !searched, template_length })
}

fn read_batch<R: BufRead>(reader: &mut ReadReader<R>, batch: &mut Vec<ReadRecord>, size: usize) -> Result<()> {
    batch.clear();
    while batch.len() < size {
        match reader.next_record()? {
            Some(rec) => batch.push(rec),
            None => break,
        }
    }
    Ok(())
}

fn write_batch<W: Write>(results: Vec<Result<MappedRead>>, out: &mut W, summary: &mut MappingSummary) -> Result<()> {
    for result in results {
        let mapped = result?;
        summary.reads += 1;
        summary.mapped += u64::from(mapped.mapped);
        summary.dropped += u64::from(mapped.dropped);
        summary.template_length.merge(&mapped.template_length);
        out.write_all(mapped.line.as_bytes())?;
    }
    Ok(())
}

/// 单端比对：读入全部 read，按批并行处理并按输入顺序写出
pub fn map_single_end<R: BufRead, W: Write>(
    archive: &Archive,
    params: &MapperParams,
    reader: &mut ReadReader<R>,
    out: &mut W,
) -> Result<MappingSummary> {
    let mut search = params.search.clone();
    select::configure_se(&mut search);
    search.validate().context("invalid search parameters")?;

    let ticker = Mutex::new(Ticker::new(params.ticker_step));
    let mut summary = MappingSummary::default();
    let mut batch = Vec::with_capacity(params.batch_size);
    let mut first_index = 0u64;
    loop {
        read_batch(reader, &mut batch, params.batch_size.max(1))?;
        if batch.is_empty() {
            break;
        }
        let results: Vec<Result<MappedRead>> = batch
            .par_iter()
            .enumerate()
            .map_init(
                || SearchContext::new(&search),
                |ctx, (i, read)| {
                    let diag = QueryDiagnostics { tag: read.tag.clone(), index: first_index + i as u64 };
                    let result = map_one_se(ctx, archive, &search, read, &diag);
                    tick(&ticker);
                    result
                },
            )
            .collect();
        write_batch(results, out, &mut summary)?;
        first_index += batch.len() as u64;
    }
    out.flush()?;
    info!(reads = summary.reads, mapped = summary.mapped, dropped = summary.dropped, "single-end mapping finished");
    Ok(summary)
}

/// 双端比对：两个输入逐条配对，tag 必须一致
pub fn map_paired_end<R1: BufRead, R2: BufRead, W: Write>(
    archive: &Archive,
    params: &MapperParams,
    reader1: &mut ReadReader<R1>,
    reader2: &mut ReadReader<R2>,
    out: &mut W,
) -> Result<MappingSummary> {
    let mut search = params.search.clone();
    select::configure_pe(&mut search);
    search.validate().context("invalid search parameters")?;

    let ticker = Mutex::new(Ticker::new(params.ticker_step));
    let mut summary = MappingSummary::default();
    let batch_size = params.batch_size.max(1);
    let mut batch1 = Vec::with_capacity(batch_size);
    let mut batch2 = Vec::with_capacity(batch_size);
    let mut first_index = 0u64;
    loop {
        read_batch(reader1, &mut batch1, batch_size)?;
        read_batch(reader2, &mut batch2, batch_size)?;
        if batch1.len() != batch2.len() {
            bail!("paired inputs have different numbers of reads (after read #{})", first_index);
        }
        if batch1.is_empty() {
            break;
        }
        for (i, (a, b)) in batch1.iter().zip(&batch2).enumerate() {
            if a.tag != b.tag {
                bail!("read #{}: mate tags differ ('{}' vs '{}')", first_index + i as u64, a.tag, b.tag);
            }
        }
        let results: Vec<Result<MappedRead>> = batch1
            .par_iter()
            .zip(batch2.par_iter())
            .enumerate()
            .map_init(
                || PairedContext::new(&search),
                |ctx, (i, (end1, end2))| {
                    let diag = QueryDiagnostics { tag: end1.tag.clone(), index: first_index + i as u64 };
                    let result = map_one_pe(ctx, archive, &search, params.max_template_length, end1, end2, &diag);
                    tick(&ticker);
                    result
                },
            )
            .collect();
        write_batch(results, out, &mut summary)?;
        first_index += batch1.len() as u64;
    }
    out.flush()?;
    let stats = &summary.template_length;
    info!(
        pairs = summary.reads,
        mapped = summary.mapped,
        dropped = summary.dropped,
        template_samples = stats.count(),
        template_mean = stats.mean(),
        template_sd = stats.std_dev(),
        "paired-end mapping finished"
    );
    Ok(summary)
}
