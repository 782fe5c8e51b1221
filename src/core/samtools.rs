use crate::{
    config::*, consts::*, core::StageContext, error::PipelineResult, executor::job::Job,
    store::FileHandle,
};

/// Create the reference index (.fai) with samtools faidx
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `reference` - Handle of the reference genome.
///
/// # Returns
/// Handle of `ref.fasta.fai`.
pub fn run_samtools_faidx(ctx: &StageContext<'_>, reference: &FileHandle) -> PipelineResult<FileHandle> {
    log::info!("INFO [SAMTOOLS]: creating reference index...");

    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(reference, REF_FASTA)])?;

    let job = ctx
        .job(PipelineStep::Faidx, work_dir.path())
        .arg(REF_FASTA)
        .inputs(&[REF_FASTA])
        .outputs(&[REF_FAI]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), REF_FAI)
}

/// Create the BAM index (.bai) with samtools index
pub fn run_samtools_index(ctx: &StageContext<'_>, bam: &FileHandle) -> PipelineResult<FileHandle> {
    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(bam, SAMPLE_BAM)])?;

    let job = ctx
        .job(PipelineStep::SamtoolsIndex, work_dir.path())
        .arg(Job::data(SAMPLE_BAM))
        .inputs(&[SAMPLE_BAM])
        .outputs(&[SAMPLE_BAI]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), SAMPLE_BAI)
}

/// Filter a BAM with `samtools view -F <flag>`, using every local core
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `bam` - Handle of the BAM to filter.
/// * `flag` - SAM flag bits to exclude, e.g. `0x800` drops supplementary
///   alignments.
///
/// # Returns
/// Handle of the filtered BAM.
///
/// # Example
/// ```rust, ignore
/// let filtered = samtools_view(&ctx, &bam, SECONDARY_FLAG)?;
/// ```
pub fn samtools_view(ctx: &StageContext<'_>, bam: &FileHandle, flag: &str) -> PipelineResult<FileHandle> {
    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(bam, SAMPLE_BAM)])?;

    let job = ctx
        .job(PipelineStep::SamtoolsView, work_dir.path())
        .arg("-b")
        .args(&["-o", &Job::data(VIEW_BAM)])
        .args(&["-F", flag])
        .args(&["-@", &num_cpus::get().to_string()])
        .arg(Job::data(SAMPLE_BAM))
        .inputs(&[SAMPLE_BAM])
        .outputs(&[VIEW_BAM]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), VIEW_BAM)
}
