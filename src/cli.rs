use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::consts::DEFAULT_JOBLIST;
use crate::executor::manager::ContainerManager;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubArgs,

    #[arg(
        short = 'm',
        long = "manager",
        help = "Container manager used to run each tool",
        value_name = "MANAGER",
        required = false,
        default_value = "docker",
        global = true
    )]
    pub manager: ContainerManager,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Increase verbosity",
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long = "quiet", help = "Decrease verbosity", global = true)]
    pub quiet: bool,
}

impl Args {
    /// Log level picked from --verbose / --quiet
    pub fn level(&self) -> log::Level {
        if self.verbose {
            log::Level::Debug
        } else if self.quiet {
            log::Level::Warn
        } else {
            log::Level::Info
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SubArgs {
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    #[command(name = "trim")]
    Trim {
        #[command(flatten)]
        args: TrimArgs,
    },
    #[command(name = "write")]
    Write {
        #[command(flatten)]
        args: WriteArgs,
    },
}

/// Run the preprocessing graph from start to finish
///
/// # Example
///
/// ```bash,no_run
/// gatkpipe run -c config.toml
/// ```
///
/// # Arguments
///
/// * `config` - Path to the configuration file
///
/// # Note
///
/// * The final BAM/BAI are exported to `[global].output_dir`
/// * If not config.toml is provided, it will default to config.toml
#[derive(Debug, Parser)]
pub struct RunArgs {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the configuration file",
        value_name = "CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,
}

/// Adapter-trim a sample with cutadapt
///
/// # Example
///
/// ```bash,no_run
/// gatkpipe trim -c config.toml --r1 R1.fq --r2 R2.fq --fwd AGATCGGAAG --rev AGATCGGAAG
/// gatkpipe trim -c config.toml --r1 R1.fq --fwd AGATCGGAAG
/// ```
///
/// # Note
///
/// * `--r2` requires `--rev`
#[derive(Debug, Parser, Clone)]
pub struct TrimArgs {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the configuration file",
        value_name = "CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[arg(long = "r1", help = "Read 1 FASTQ", value_name = "FASTQ", required = true)]
    pub r1: PathBuf,

    #[arg(long = "r2", help = "Read 2 FASTQ for paired-end data", value_name = "FASTQ")]
    pub r2: Option<PathBuf>,

    #[arg(
        long = "fwd",
        help = "Forward 3' adapter sequence",
        value_name = "ADAPTER",
        required = true
    )]
    pub fwd: String,

    #[arg(
        long = "rev",
        help = "Reverse 3' adapter sequence, required for paired-end data",
        value_name = "ADAPTER"
    )]
    pub rev: Option<String>,
}

/// Dry run: write the container command of every task to a job list
/// with parameters specified in --config
///
/// # Example
///
/// ```bash,no_run
/// gatkpipe write -c config.toml -o jobs
/// ```
///
/// # Arguments
///
/// * `config` - Path to the configuration file
/// * `output` - Job list, one command per line
#[derive(Debug, Parser, Clone)]
pub struct WriteArgs {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the configuration file",
        value_name = "CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'o',
        long = "output",
        help = "Path to the job list",
        value_name = "JOBS",
        default_value = DEFAULT_JOBLIST
    )]
    pub output: PathBuf,
}
