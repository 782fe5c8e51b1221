use crate::{
    config::*,
    consts::*,
    core::{BamPair, StageContext},
    error::PipelineResult,
    store::FileHandle,
};

/// Create the reference sequence dictionary with picard
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `reference` - Handle of the reference genome.
/// * `mem` - Java heap, e.g. `10G`.
///
/// # Returns
/// Handle of `ref.dict`.
pub fn run_picard_create_sequence_dictionary(
    ctx: &StageContext<'_>,
    reference: &FileHandle,
    mem: &str,
) -> PipelineResult<FileHandle> {
    log::info!("INFO [PICARD]: creating sequence dictionary...");

    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(reference, REF_FASTA)])?;

    let job = ctx
        .job(PipelineStep::CreateSequenceDictionary, work_dir.path())
        .java_heap(mem)
        .arg(format!("R={}", REF_FASTA))
        .arg(format!("O={}", REF_DICT))
        .inputs(&[REF_FASTA])
        .outputs(&[REF_DICT]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), REF_DICT)
}

/// Coordinate-sort a BAM and index it
pub fn picard_sort_sam(ctx: &StageContext<'_>, bam: &FileHandle, mem: &str) -> PipelineResult<BamPair> {
    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(bam, SAMPLE_BAM)])?;

    let job = ctx
        .job(PipelineStep::SortSam, work_dir.path())
        .java_heap(mem)
        .arg(format!("INPUT={}", SAMPLE_BAM))
        .arg(format!("OUTPUT={}", SORTED_BAM))
        .arg("SORT_ORDER=coordinate")
        .arg("CREATE_INDEX=true")
        .inputs(&[SAMPLE_BAM])
        .outputs(&[SORTED_BAM, SORTED_BAI]);

    ctx.runtime.invoke(&job)?;

    Ok(BamPair {
        bam: ctx.stage_out(work_dir.path(), SORTED_BAM)?,
        bai: ctx.stage_out(work_dir.path(), SORTED_BAI)?,
    })
}

/// Flag PCR/optical duplicates on a sorted BAM
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `bam` - Handle of the coordinate-sorted BAM.
/// * `bai` - Handle of its index.
/// * `mem` - Java heap.
///
/// # Returns
/// Handles of `sample.mkdups.bam` and `sample.mkdups.bai`. The metrics
/// file stays in the scratch dir.
pub fn picard_mark_duplicates(
    ctx: &StageContext<'_>,
    bam: &FileHandle,
    bai: &FileHandle,
    mem: &str,
) -> PipelineResult<BamPair> {
    let work_dir = ctx.store.local_temp_dir()?;
    ctx.stage_in(work_dir.path(), &[(bam, SORTED_BAM), (bai, SORTED_BAI)])?;

    let job = ctx
        .job(PipelineStep::MarkDuplicates, work_dir.path())
        .java_heap(mem)
        .arg(format!("INPUT={}", SORTED_BAM))
        .arg(format!("OUTPUT={}", MKDUPS_BAM))
        .arg(format!("METRICS_FILE={}", MKDUPS_METRICS))
        .arg("ASSUME_SORTED=true")
        .arg("CREATE_INDEX=true")
        .inputs(&[SORTED_BAM, SORTED_BAI])
        .outputs(&[MKDUPS_BAM, MKDUPS_BAI]);

    ctx.runtime.invoke(&job)?;

    Ok(BamPair {
        bam: ctx.stage_out(work_dir.path(), MKDUPS_BAM)?,
        bai: ctx.stage_out(work_dir.path(), MKDUPS_BAI)?,
    })
}
