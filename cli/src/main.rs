//! pdfdocx CLI - memory-budgeted PDF to DOCX conversion

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfdocx::backend::DEFAULT_CONVERTER_PROGRAM;
use pdfdocx::budget::DEFAULT_LIMIT_MB;
use pdfdocx::{
    is_valid_limit, BatchConverter, BatchOptions, CommandConverter, ConversionRequest,
    ConversionResult, Converter, MemoryBudget, PageRange,
};

#[derive(Parser)]
#[command(name = "pdfdocx")]
#[command(version)]
#[command(about = "Convert PDF to DOCX within a memory budget", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output DOCX file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct GlobalOpts {
    /// Memory budget in MB
    #[arg(
        long,
        global = true,
        value_name = "MB",
        env = "PDFDOCX_MEMORY_LIMIT_MB",
        default_value_t = DEFAULT_LIMIT_MB,
        value_parser = parse_memory_limit
    )]
    memory_limit: f64,

    /// Fail instead of falling back to text-only conversion
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Do not embed images
    #[arg(long, global = true)]
    no_images: bool,

    /// Rich converter executable
    #[arg(
        long,
        global = true,
        value_name = "PROGRAM",
        env = "PDFDOCX_CONVERTER",
        default_value = DEFAULT_CONVERTER_PROGRAM
    )]
    converter: PathBuf,

    /// Log progress details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single PDF to DOCX
    Convert {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to the input with a .docx extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page window, 0-based with exclusive end (e.g. "0-10", "5-")
        #[arg(long, value_name = "START-END")]
        pages: Option<String>,
    },

    /// Convert every PDF in a folder
    Batch {
        /// Input folder
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Output folder (defaults to the input folder)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Include sub-folders
        #[arg(short, long)]
        recursive: bool,

        /// Convert several files at once (needs more memory)
        #[arg(long)]
        parallel: bool,

        /// Worker threads for --parallel
        #[arg(long, default_value_t = 4, requires = "parallel")]
        workers: usize,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the converters are available
    Check,

    /// Show version information
    Version,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            pages,
        }) => cmd_convert(&cli.global, &input, output.as_deref(), pages.as_deref()),
        Some(Commands::Batch {
            input,
            output,
            recursive,
            parallel,
            workers,
            json,
        }) => {
            let mut options = BatchOptions::new()
                .recursive(recursive)
                .verbose(cli.global.verbose);
            if parallel {
                options = options.parallel(workers);
            }
            cmd_batch(&cli.global, &input, output.as_deref(), options, json)
        }
        Some(Commands::Check) => cmd_check(&cli.global),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&cli.global, &input, cli.output.as_deref(), None)
            } else {
                println!("{}", "Usage: pdfdocx <FILE> [OUTPUT]".yellow());
                println!("       pdfdocx --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(opts: &GlobalOpts) {
    let level = if opts.quiet {
        "error"
    } else if opts.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn parse_memory_limit(value: &str) -> Result<f64, String> {
    let mb: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not a number of megabytes", value))?;
    if is_valid_limit(mb) {
        Ok(mb)
    } else {
        Err(format!("memory limit must be a positive number of MB, got {}", value))
    }
}

fn budget_from(opts: &GlobalOpts) -> MemoryBudget {
    MemoryBudget::new()
        .with_limit_mb(opts.memory_limit)
        .with_images(!opts.no_images)
        .with_fallback(!opts.no_fallback)
}

fn build_converter(opts: &GlobalOpts) -> Converter {
    Converter::new(budget_from(opts)).with_rich_converter(Arc::new(
        CommandConverter::new().with_program(&opts.converter),
    ))
}

fn cmd_convert(
    opts: &GlobalOpts,
    input: &Path,
    output: Option<&Path>,
    pages: Option<&str>,
) -> CliResult {
    let mut request = ConversionRequest::new(input).verbose(opts.verbose);
    if let Some(path) = output {
        request = request.with_output(path);
    }
    if let Some(p) = pages {
        request = request.with_pages(PageRange::parse(p)?);
    }

    let converter = build_converter(opts);

    let pb = if opts.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Converting {}...", request.display_name()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = converter.convert_with_memory_monitoring(&request);
    pb.finish_and_clear();

    match result {
        ConversionResult::Success(doc) => {
            if !opts.quiet {
                println!("{} {}", "Saved to".green(), doc.output_path.display());
                println!("  {} {:.2} MB", "Size:".dimmed(), doc.size_mb());
                println!("  {} {:.2}s", "Time:".dimmed(), doc.elapsed.as_secs_f64());
                for warning in &doc.warnings {
                    println!("  {} {}", "Warning:".yellow(), warning);
                }
            }
            Ok(())
        }
        ConversionResult::Failure { message } => Err(message.into()),
    }
}

fn cmd_batch(
    opts: &GlobalOpts,
    input: &Path,
    output: Option<&Path>,
    options: BatchOptions,
    json: bool,
) -> CliResult {
    let pb = if opts.quiet || json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let observer_pb = pb.clone();
    let batch = BatchConverter::new(build_converter(opts), options).with_observer(move |item| {
        observer_pb.set_length(item.total as u64);
        observer_pb.set_message(item.name.to_string());
        if let Some(message) = item.result.error_message() {
            observer_pb.println(format!("{} {}: {}", "✗".red(), item.name, message));
        }
        observer_pb.inc(1);
    });

    let report = batch.convert_batch(input, output)?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !opts.quiet {
        println!("{}", "Conversion Summary".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        println!("{}: {}/{}", "Success".bold(), report.succeeded, report.total());
        println!("{}: {}/{}", "Failed".bold(), report.failed, report.total());
        if report.text_only > 0 {
            println!("{}: {}", "Text-only".bold(), report.text_only);
        }
        for (name, error) in &report.errors {
            println!("  {} {}: {}", "•".red(), name, error);
        }
        if let Some(avg) = report.average_secs() {
            println!("{}: {:.2}s", "Average time".bold(), avg);
        }
    }

    if report.has_failures() {
        return Err(format!("{} of {} files failed", report.failed, report.total()).into());
    }
    Ok(())
}

fn cmd_check(opts: &GlobalOpts) -> CliResult {
    let converter = build_converter(opts);
    let program = opts.converter.display();

    let rich = converter.rich_converter_available();
    if rich {
        println!("{} {} installed", "✓".green(), program);
    } else {
        println!("{} {} not installed", "✗".red(), program);
        println!("  Install with: pip install pdf2docx");
    }

    if converter.fallback_available() {
        println!("{} text-only fallback available", "✓".green());
    } else {
        println!(
            "{} text-only fallback not compiled in (enable the `fallback` feature)",
            "!".yellow()
        );
    }

    println!(
        "{} {:.0} MB budget, images {}, fallback {}",
        "Config:".dimmed(),
        converter.budget().limit_mb,
        if converter.budget().extract_images { "on" } else { "off" },
        if converter.budget().fallback_enabled { "on" } else { "off" }
    );

    if rich {
        Ok(())
    } else {
        Err(format!("{} is required for full-fidelity conversion", program).into())
    }
}

fn cmd_version() {
    println!("{} {}", "pdfdocx".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Memory-budgeted PDF to DOCX converter");
}
