use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nsearch_mapper::config::{
    AlignmentModel, MapperParams, MaxError, NsearchMode, ScaffoldingParams, SearchParams, SelectParams, SwgPenalties,
    TerminationMode,
};
use nsearch_mapper::index::archive::{Archive, ArchiveBuildOpt, IndexMeta};
use nsearch_mapper::io::fasta::read_reference;
use nsearch_mapper::io::fastq::ReadReader;
use nsearch_mapper::mapper;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "nsearch-mapper",
    author,
    version,
    about = "Approximate read mapper driven by FM-index neighborhood search",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the dual-strand FM index of a reference FASTA
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output prefix for the index file
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Occ checkpoint block size
        #[arg(long = "occ-block", default_value_t = 64)]
        occ_block: usize,
        /// Suffix array sampling rate
        #[arg(long = "sa-rate", default_value_t = 8)]
        sa_rate: usize,
    },
    /// Map reads (FASTQ or FASTA) against an index and write MAP records
    Map(MapArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Path to the index (.nsi)
    #[arg(short = 'i', long = "index")]
    index: String,
    /// Reads file (end 1 when --mates is given)
    reads: String,
    /// Mate file; enables paired-end mapping
    #[arg(short = 'p', long = "mates")]
    mates: Option<String>,
    /// Output MAP path (stdout if omitted)
    #[arg(short, long)]
    out: Option<String>,
    /// Max errors: an integer count or a fraction of the read length
    #[arg(short = 'e', long = "max-error", default_value = "0.04", value_parser = parse_max_error)]
    max_error: MaxError,
    #[arg(long = "nsearch-mode", value_enum, default_value_t = NsearchMode::Supercondensed)]
    nsearch_mode: NsearchMode,
    #[arg(long = "termination", value_enum, default_value_t = TerminationMode::Intervals)]
    termination: TerminationMode,
    #[arg(long = "alignment-model", value_enum, default_value_t = AlignmentModel::GapAffine)]
    alignment_model: AlignmentModel,
    #[arg(long = "match", default_value_t = 1)]
    match_score: i32,
    #[arg(long = "mismatch", default_value_t = 4)]
    mismatch_penalty: i32,
    #[arg(long = "gap-open", default_value_t = 6)]
    gap_open: i32,
    #[arg(long = "gap-ext", default_value_t = 1)]
    gap_extend: i32,
    /// Require exact-match anchors before gap-affine alignment
    #[arg(long = "scaffolding")]
    scaffolding: bool,
    #[arg(long = "scaffolding-min-coverage", default_value_t = 0.8)]
    scaffolding_min_coverage: f64,
    #[arg(long = "scaffolding-min-matching-length", default_value_t = 10)]
    scaffolding_min_matching_length: u64,
    /// Keep leading/trailing indels in reported CIGARs
    #[arg(long = "no-cigar-curation")]
    no_cigar_curation: bool,
    #[arg(long = "min-reported-strata", default_value_t = 0)]
    min_reported_strata: u64,
    #[arg(long = "min-reported-matches", default_value_t = 10)]
    min_reported_matches: u64,
    #[arg(short = 'M', long = "max-reported-matches", default_value_t = 100)]
    max_reported_matches: u64,
    /// Per-read neighborhood search pending-node limit
    #[arg(long = "max-pending-nodes", default_value_t = 1 << 22)]
    max_pending_nodes: usize,
    /// Per-read CIGAR log limit
    #[arg(long = "max-cigar-ops", default_value_t = 1 << 20)]
    max_cigar_ops: usize,
    /// Max template length of a concordant pair
    #[arg(long = "max-template-length", default_value_t = 1000)]
    max_template_length: u64,
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,
    /// Report progress every N reads
    #[arg(long = "ticker-step", default_value_t = 10_000)]
    ticker_step: u64,
    #[arg(long = "batch-size", default_value_t = 4096)]
    batch_size: usize,
}

fn parse_max_error(s: &str) -> std::result::Result<MaxError, String> {
    if s.contains('.') {
        let f: f64 = s.parse().map_err(|e| format!("invalid fraction '{}': {}", s, e))?;
        Ok(MaxError::Fraction(f))
    } else {
        let k: u64 = s.parse().map_err(|e| format!("invalid error count '{}': {}", s, e))?;
        Ok(MaxError::Absolute(k))
    }
}

impl MapArgs {
    fn params(&self) -> MapperParams {
        let select_report = SelectParams {
            min_reported_strata: self.min_reported_strata,
            min_reported_matches: self.min_reported_matches,
            max_reported_matches: self.max_reported_matches,
        };
        let search = SearchParams {
            max_error: self.max_error,
            nsearch_mode: self.nsearch_mode,
            termination: self.termination,
            alignment_model: self.alignment_model,
            swg_penalties: SwgPenalties {
                match_score: self.match_score,
                mismatch_penalty: self.mismatch_penalty,
                gap_open: self.gap_open,
                gap_extend: self.gap_extend,
            },
            scaffolding: ScaffoldingParams {
                enabled: self.scaffolding,
                min_coverage: self.scaffolding_min_coverage,
                min_matching_length: self.scaffolding_min_matching_length,
            },
            cigar_curation: !self.no_cigar_curation,
            select_report,
            select_align: select_report,
            max_cigar_ops: self.max_cigar_ops,
            max_pending_nodes: self.max_pending_nodes,
        };
        MapperParams {
            search,
            threads: self.threads.max(1),
            ticker_step: self.ticker_step,
            batch_size: self.batch_size,
            max_template_length: self.max_template_length,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Index { reference, output, occ_block, sa_rate } => {
            run_index(&reference, &output, ArchiveBuildOpt { occ_block, sa_rate })
        }
        Commands::Map(args) => run_map(&args),
    }
}

fn run_index(reference: &str, output: &str, opt: ArchiveBuildOpt) -> Result<()> {
    let records = read_reference(reference)?;
    let total_len: usize = records.iter().map(|(_, seq)| seq.len()).sum();
    info!(reference, sequences = records.len(), total_len, "reference loaded");

    let mut archive = Archive::build(records, opt).with_context(|| format!("building index of '{}'", reference))?;
    archive.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.nsi", output);
    archive.save_to_file(&out_path).with_context(|| format!("cannot write index to '{}'", out_path))?;
    info!(path = %out_path, "index saved");
    Ok(())
}

fn open_reads(path: &str) -> Result<ReadReader<std::io::BufReader<std::fs::File>>> {
    let fh = std::fs::File::open(path).with_context(|| format!("cannot open reads file '{}'", path))?;
    Ok(ReadReader::new(std::io::BufReader::new(fh)))
}

fn run_map(args: &MapArgs) -> Result<()> {
    let params = args.params();
    rayon::ThreadPoolBuilder::new().num_threads(params.threads).build_global().ok();

    let archive = Archive::load_from_file(&args.index).with_context(|| format!("cannot load index '{}'", args.index))?;
    if let Some(ts) = &archive.meta.build_timestamp {
        info!(index = %args.index, built = %ts, "index loaded");
    }

    let mut out: Box<dyn std::io::Write> = match &args.out {
        Some(path) => {
            let fh = std::fs::File::create(path).with_context(|| format!("cannot create output '{}'", path))?;
            Box::new(std::io::BufWriter::new(fh))
        }
        None => Box::new(std::io::BufWriter::new(std::io::stdout().lock())),
    };

    let mut reads = open_reads(&args.reads)?;
    let summary = match &args.mates {
        Some(mates) => {
            let mut mates = open_reads(mates)?;
            mapper::map_paired_end(&archive, &params, &mut reads, &mut mates, &mut out)?
        }
        None => mapper::map_single_end(&archive, &params, &mut reads, &mut out)?,
    };
    if summary.template_length.count() > 0 {
        info!(
            samples = summary.template_length.count(),
            mean = summary.template_length.mean(),
            std_dev = summary.template_length.std_dev(),
            "template length"
        );
    }
    Ok(())
}
