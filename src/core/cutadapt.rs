use crate::{
    config::*,
    consts::*,
    core::StageContext,
    error::{PipelineError, PipelineResult},
    executor::job::Job,
    store::FileHandle,
};

/// Fail early when paired-end data comes without a reverse adapter.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::core::cutadapt::check_adapters;
///
/// assert!(check_adapters(true, None).is_err());
/// assert!(check_adapters(false, None).is_ok());
/// ```
pub fn check_adapters(paired: bool, rev_adapter: Option<&str>) -> PipelineResult<()> {
    if paired && rev_adapter.map_or(true, |a| a.is_empty()) {
        return Err(PipelineError::Config(
            "Paired end data requires a reverse 3' adapter sequence.".into(),
        ));
    }

    Ok(())
}

/// Run cutadapt (adapter trimming, reads shorter than 35bp dropped)
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `r1` - Handle of read 1.
/// * `r2` - Handle of read 2, for paired data.
/// * `fwd_adapter` - Forward 3' adapter sequence.
/// * `rev_adapter` - Reverse 3' adapter sequence, required with `r2`.
///
/// # Returns
/// Handles of the trimmed R1 and, for paired data, R2.
pub fn run_cutadapt(
    ctx: &StageContext<'_>,
    r1: &FileHandle,
    r2: Option<&FileHandle>,
    fwd_adapter: &str,
    rev_adapter: Option<&str>,
) -> PipelineResult<(FileHandle, Option<FileHandle>)> {
    check_adapters(r2.is_some(), rev_adapter)?;

    let work_dir = ctx.store.local_temp_dir()?;
    let job = ctx
        .job(PipelineStep::Cutadapt, work_dir.path())
        .args(&["-a", fwd_adapter, "-m", MIN_READ_LENGTH]);

    match (r2, rev_adapter) {
        (Some(r2), Some(rev_adapter)) => {
            ctx.stage_in(work_dir.path(), &[(r1, R1_FASTQ), (r2, R2_FASTQ)])?;

            let job = job
                .args(&["-A", rev_adapter])
                .args(&["-o", &Job::data(R1_CUT_FASTQ)])
                .args(&["-p", &Job::data(R2_CUT_FASTQ)])
                .args(&[&Job::data(R1_FASTQ), &Job::data(R2_FASTQ)])
                .inputs(&[R1_FASTQ, R2_FASTQ])
                .outputs(&[R1_CUT_FASTQ, R2_CUT_FASTQ]);

            ctx.runtime.invoke(&job)?;

            Ok((
                ctx.stage_out(work_dir.path(), R1_CUT_FASTQ)?,
                Some(ctx.stage_out(work_dir.path(), R2_CUT_FASTQ)?),
            ))
        }
        _ => {
            ctx.stage_in(work_dir.path(), &[(r1, R1_FASTQ)])?;

            let job = job
                .args(&["-o", &Job::data(R1_CUT_FASTQ)])
                .arg(Job::data(R1_FASTQ))
                .inputs(&[R1_FASTQ])
                .outputs(&[R1_CUT_FASTQ]);

            ctx.runtime.invoke(&job)?;

            Ok((ctx.stage_out(work_dir.path(), R1_CUT_FASTQ)?, None))
        }
    }
}
