use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sambamba_stream::{Alignment, AlignmentStream, BamFile, Filter, Format, Region, SamFile};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sambamba-stream",
    about = "Stream and filter alignments through the sambamba engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print matching alignments, one tab-separated line per record.
    View(StreamArgs),
    /// Print the number of matching alignments.
    Count(StreamArgs),
    /// Print the file header.
    Header {
        /// BAM (or SAM with --sam) input.
        path: PathBuf,
        /// Input is SAM rather than BAM.
        #[arg(long)]
        sam: bool,
        /// Print the header text verbatim instead of a summary.
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Args, Debug)]
struct StreamArgs {
    /// BAM (or SAM with --sam) input.
    path: PathBuf,
    /// Input is SAM rather than BAM.
    #[arg(long)]
    sam: bool,
    /// Restrict to `chrom` or `chrom:start-end` (1-based, inclusive).
    #[arg(long)]
    region: Option<String>,
    /// Filter expression in the engine's own syntax.
    #[arg(long)]
    filter: Option<String>,
    /// Skip structurally invalid records.
    #[arg(long)]
    valid: bool,
    /// Decode MessagePack output instead of JSON.
    #[arg(long)]
    msgpack: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View(args) => run_view(args)?,
        Commands::Count(args) => run_count(args)?,
        Commands::Header { path, sam, raw } => run_header(path, sam, raw)?,
    }

    Ok(())
}

fn build_stream(args: StreamArgs) -> Result<AlignmentStream> {
    let mut stream = if args.sam {
        SamFile::open(&args.path)
            .with_context(|| format!("failed to open {}", args.path.display()))?
            .alignments()
    } else {
        BamFile::open(&args.path)
            .with_context(|| format!("failed to open {}", args.path.display()))?
            .alignments()
    };

    if let Some(region) = args.region.as_deref() {
        let (chromosome, interval) = parse_region(region)?;
        stream = stream.restrict_to(chromosome);
        if let Some(interval) = interval {
            stream = stream.overlapping(interval);
        }
    }
    if let Some(expression) = args.filter {
        stream = stream.with_filter(Filter::raw(expression));
    }
    if args.valid {
        stream = stream.validated_only();
    }
    if args.msgpack {
        stream = stream.with_format(Format::MsgPack);
    }
    Ok(stream)
}

fn run_view(args: StreamArgs) -> Result<()> {
    let stream = build_stream(args)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for (idx, alignment) in stream.into_iter().enumerate() {
        let alignment = alignment.with_context(|| format!("failed to read record {}", idx + 1))?;
        write_alignment(&mut out, &alignment)?;
    }

    out.flush()?;
    Ok(())
}

fn run_count(args: StreamArgs) -> Result<()> {
    let stream = build_stream(args)?;
    let count = stream.count().context("engine count failed")?;
    println!("{count}");
    Ok(())
}

fn run_header(path: PathBuf, sam: bool, raw: bool) -> Result<()> {
    let context = || format!("failed to read header of {}", path.display());

    if sam {
        let file = SamFile::open(&path).with_context(context)?;
        print_header(raw, || file.raw_header().map(str::to_string), || file.header().cloned())
            .with_context(context)
    } else {
        let file = BamFile::open(&path).with_context(context)?;
        print_header(raw, || file.raw_header().map(str::to_string), || file.header().cloned())
            .with_context(context)
    }
}

fn print_header(
    raw: bool,
    raw_header: impl FnOnce() -> sambamba_stream::Result<String>,
    header: impl FnOnce() -> sambamba_stream::Result<sambamba_stream::SamHeader>,
) -> sambamba_stream::Result<()> {
    if raw {
        print!("{}", raw_header()?);
        return Ok(());
    }

    let header = header()?;
    println!("version\t{}", header.version.as_deref().unwrap_or("-"));
    println!("sorting_order\t{}", header.sorting_order.as_deref().unwrap_or("-"));
    for sq in &header.sq_lines {
        println!("@SQ\t{}\t{}", sq.sequence_name, sq.sequence_length);
    }
    for rg in &header.rg_lines {
        println!("@RG\t{}\t{}", rg.identifier, rg.sample.as_deref().unwrap_or("-"));
    }
    for pg in &header.pg_lines {
        println!("@PG\t{}\t{}", pg.identifier, pg.program_name.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn parse_region(text: &str) -> Result<(String, Option<Region>)> {
    let Some((chromosome, interval)) = text.rsplit_once(':') else {
        return Ok((text.to_string(), None));
    };
    let Some((start, end)) = interval.split_once('-') else {
        bail!("region '{text}' must look like chrom:start-end");
    };
    let start: u32 = start
        .replace(',', "")
        .parse()
        .with_context(|| format!("invalid region start in '{text}'"))?;
    let end: u32 = end
        .replace(',', "")
        .parse()
        .with_context(|| format!("invalid region end in '{text}'"))?;
    Ok((chromosome.to_string(), Some(Region::new(start, end))))
}

fn write_alignment(out: &mut impl Write, alignment: &Alignment) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        alignment.read_name(),
        alignment.flags().bits(),
        alignment.reference().unwrap_or("*"),
        alignment.position().unwrap_or(0),
        alignment.mapping_quality(),
        alignment.cigar(),
        alignment.sequence(),
    )
}
