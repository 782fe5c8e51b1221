use clap::Parser;
use log::{error, info};
use simple_logger::init_with_level;

use gatkpipe::{
    cli::{Args, SubArgs},
    config::Config,
    core::{run, trim, write},
    error::PipelineResult,
};

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    if let Err(e) = init_with_level(args.level()) {
        eprintln!("ERROR: Could not initialize logger -> {}", e);
        std::process::exit(1);
    }

    dispatch(args).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}

fn dispatch(args: Args) -> PipelineResult<()> {
    let executor = args.manager.as_executor();

    match args.command {
        SubArgs::Run { args } => {
            let mut config = Config::read(args.config)?;
            let outputs = run(&mut config, &executor)?;

            info!(
                "SUCCESS: recalibrated alignments written to {} and {}",
                outputs.bam.display(),
                outputs.bai.display()
            );
        }
        SubArgs::Trim { args } => {
            let mut config = Config::read(args.config)?;
            let (r1, r2) = trim(
                &mut config,
                &executor,
                &args.r1,
                args.r2.as_deref(),
                &args.fwd,
                args.rev.as_deref(),
            )?;

            info!("SUCCESS: trimmed reads written to {}", r1.display());
            if let Some(r2) = r2 {
                info!("SUCCESS: trimmed mates written to {}", r2.display());
            }
        }
        SubArgs::Write { args } => {
            let mut config = Config::read(args.config)?;
            let joblist = write(&mut config, &args.output)?;

            info!("SUCCESS: job list written to {}", joblist.display());
        }
    }

    Ok(())
}
