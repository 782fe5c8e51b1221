use std::path::Path;

use crate::{
    config::*,
    consts::*,
    core::{BamPair, ReferenceFiles, StageContext},
    error::PipelineResult,
    executor::job::Job,
    store::FileHandle,
};

/// Settings shared by every GATK walker
#[derive(Debug, Clone)]
pub struct GatkOptions {
    pub cores: usize,
    pub memory: String,
    pub unsafe_mode: bool,
}

impl GatkOptions {
    /// Walker skeleton with the Java heap set
    fn job(&self, ctx: &StageContext<'_>, step: PipelineStep, work_dir: &Path) -> Job {
        ctx.job(step, work_dir).java_heap(&self.memory)
    }
}

fn stage_reference(ctx: &StageContext<'_>, work_dir: &Path, reference: &ReferenceFiles) -> PipelineResult<()> {
    ctx.stage_in(
        work_dir,
        &[
            (&reference.reference, REF_FASTA),
            (&reference.fai, REF_FAI),
            (&reference.dict, REF_DICT),
        ],
    )
}

/// Find intervals around known indels that need realignment
///
/// # Arguments
/// * `ctx` - Stage collaborators.
/// * `options` - Cores, heap and unsafe mode.
/// * `pair` - Duplicate-marked BAM and its index.
/// * `reference` - Reference trio.
/// * `phase` - 1000G phase 1 indels.
/// * `mills` - Mills and 1000G gold standard indels.
///
/// # Returns
/// Handle of `sample.intervals`.
pub fn run_realigner_target_creator(
    ctx: &StageContext<'_>,
    options: &GatkOptions,
    pair: &BamPair,
    reference: &ReferenceFiles,
    phase: &FileHandle,
    mills: &FileHandle,
) -> PipelineResult<FileHandle> {
    log::info!("INFO [GATK]: creating realignment targets...");

    let work_dir = ctx.store.local_temp_dir()?;
    stage_reference(ctx, work_dir.path(), reference)?;
    ctx.stage_in(
        work_dir.path(),
        &[
            (&pair.bam, SAMPLE_BAM),
            (&pair.bai, SAMPLE_BAI),
            (phase, PHASE_VCF),
            (mills, MILLS_VCF),
        ],
    )?;

    let job = options
        .job(ctx, PipelineStep::RealignerTargetCreator, work_dir.path())
        .args(&["-nt", &options.cores.to_string()])
        .args(&["-R", &Job::data(REF_FASTA)])
        .args(&["-I", &Job::data(SAMPLE_BAM)])
        .args(&["-known", &Job::data(PHASE_VCF)])
        .args(&["-known", &Job::data(MILLS_VCF)])
        .args(&["--downsampling_type", "NONE"])
        .args(&["-o", &Job::data(INTERVALS)])
        .unsafe_mode(options.unsafe_mode)
        .inputs(&[REF_FASTA, REF_FAI, REF_DICT, SAMPLE_BAM, SAMPLE_BAI, PHASE_VCF, MILLS_VCF])
        .outputs(&[INTERVALS]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), INTERVALS)
}

/// Realign reads around the target intervals
pub fn run_indel_realignment(
    ctx: &StageContext<'_>,
    options: &GatkOptions,
    intervals: &FileHandle,
    pair: &BamPair,
    reference: &ReferenceFiles,
    phase: &FileHandle,
    mills: &FileHandle,
) -> PipelineResult<BamPair> {
    log::info!("INFO [GATK]: realigning indels...");

    let work_dir = ctx.store.local_temp_dir()?;
    stage_reference(ctx, work_dir.path(), reference)?;
    ctx.stage_in(
        work_dir.path(),
        &[
            (&pair.bam, SAMPLE_BAM),
            (&pair.bai, SAMPLE_BAI),
            (phase, PHASE_VCF),
            (mills, MILLS_VCF),
            (intervals, INTERVALS),
        ],
    )?;

    let job = options
        .job(ctx, PipelineStep::IndelRealigner, work_dir.path())
        .args(&["-R", &Job::data(REF_FASTA)])
        .args(&["-I", &Job::data(SAMPLE_BAM)])
        .args(&["-known", &Job::data(PHASE_VCF)])
        .args(&["-known", &Job::data(MILLS_VCF)])
        .args(&["-targetIntervals", &Job::data(INTERVALS)])
        .args(&["--downsampling_type", "NONE"])
        .args(&["-maxReads", &MAX_READS.to_string()])
        .args(&["-maxInMemory", &MAX_IN_MEMORY.to_string()])
        .args(&["-o", &Job::data(INDEL_BAM)])
        .unsafe_mode(options.unsafe_mode)
        .inputs(&[
            REF_FASTA, REF_FAI, REF_DICT, SAMPLE_BAM, SAMPLE_BAI, PHASE_VCF, MILLS_VCF, INTERVALS,
        ])
        .outputs(&[INDEL_BAM, INDEL_BAI]);

    ctx.runtime.invoke(&job)?;

    Ok(BamPair {
        bam: ctx.stage_out(work_dir.path(), INDEL_BAM)?,
        bai: ctx.stage_out(work_dir.path(), INDEL_BAI)?,
    })
}

/// Build the base quality recalibration table against dbSNP
pub fn run_base_recalibration(
    ctx: &StageContext<'_>,
    options: &GatkOptions,
    pair: &BamPair,
    reference: &ReferenceFiles,
    dbsnp: &FileHandle,
) -> PipelineResult<FileHandle> {
    log::info!("INFO [GATK]: computing recalibration table...");

    let work_dir = ctx.store.local_temp_dir()?;
    stage_reference(ctx, work_dir.path(), reference)?;
    ctx.stage_in(
        work_dir.path(),
        &[(&pair.bam, INDEL_BAM), (&pair.bai, INDEL_BAI), (dbsnp, DBSNP_VCF)],
    )?;

    let job = options
        .job(ctx, PipelineStep::BaseRecalibrator, work_dir.path())
        .args(&["-nct", &options.cores.to_string()])
        .args(&["-R", &Job::data(REF_FASTA)])
        .args(&["-I", &Job::data(INDEL_BAM)])
        .args(&["-knownSites", &Job::data(DBSNP_VCF)])
        .args(&["-o", &Job::data(RECAL_TABLE)])
        .unsafe_mode(options.unsafe_mode)
        .inputs(&[REF_FASTA, REF_FAI, REF_DICT, INDEL_BAM, INDEL_BAI, DBSNP_VCF])
        .outputs(&[RECAL_TABLE]);

    ctx.runtime.invoke(&job)?;

    ctx.stage_out(work_dir.path(), RECAL_TABLE)
}

/// Apply the recalibration table, keeping the original qualities
///
/// # Returns
/// Handles of `sample.bqsr.bam` and `sample.bqsr.bai`.
pub fn run_print_reads(
    ctx: &StageContext<'_>,
    options: &GatkOptions,
    table: &FileHandle,
    pair: &BamPair,
    reference: &ReferenceFiles,
) -> PipelineResult<BamPair> {
    log::info!("INFO [GATK]: applying recalibration...");

    let work_dir = ctx.store.local_temp_dir()?;
    stage_reference(ctx, work_dir.path(), reference)?;
    ctx.stage_in(
        work_dir.path(),
        &[(table, RECAL_TABLE), (&pair.bam, INDEL_BAM), (&pair.bai, INDEL_BAI)],
    )?;

    let job = options
        .job(ctx, PipelineStep::PrintReads, work_dir.path())
        .args(&["-nct", &options.cores.to_string()])
        .args(&["-R", &Job::data(REF_FASTA)])
        .arg("--emit_original_quals")
        .args(&["-I", &Job::data(INDEL_BAM)])
        .args(&["-BQSR", &Job::data(RECAL_TABLE)])
        .args(&["-o", &Job::data(BQSR_BAM)])
        .unsafe_mode(options.unsafe_mode)
        .inputs(&[REF_FASTA, REF_FAI, REF_DICT, RECAL_TABLE, INDEL_BAM, INDEL_BAI])
        .outputs(&[BQSR_BAM, BQSR_BAI]);

    ctx.runtime.invoke(&job)?;

    Ok(BamPair {
        bam: ctx.stage_out(work_dir.path(), BQSR_BAM)?,
        bai: ctx.stage_out(work_dir.path(), BQSR_BAI)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{sorted, Fixture};

    fn options(unsafe_mode: bool) -> GatkOptions {
        GatkOptions {
            cores: 4,
            memory: String::from("10G"),
            unsafe_mode,
        }
    }

    #[test]
    fn test_realigner_target_creator_layout() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("mkdups");
        let phase = fx.put("phase.vcf.gz", "phase");
        let mills = fx.put("mills.vcf.gz", "mills");

        run_realigner_target_creator(&fx.ctx(), &options(false), &pair, &reference, &phase, &mills)
            .unwrap();
        let call = fx.only_call();

        assert_eq!(
            call.staged,
            sorted(&[REF_FASTA, REF_FAI, REF_DICT, SAMPLE_BAM, SAMPLE_BAI, PHASE_VCF, MILLS_VCF])
        );
        assert_eq!(call.job.outputs, vec![INTERVALS]);
        assert_eq!(
            call.job.params,
            vec![
                "-T", "RealignerTargetCreator", "-nt", "4",
                "-R", "/data/ref.fasta",
                "-I", "/data/sample.bam",
                "-known", "/data/phase.vcf",
                "-known", "/data/mills.vcf",
                "--downsampling_type", "NONE",
                "-o", "/data/sample.intervals",
            ]
        );
        assert_eq!(call.job.image, GATK_IMAGE);
        assert_eq!(call.job.env, vec![(JAVA_OPTS.to_string(), "-Xmx10G".to_string())]);
    }

    #[test]
    fn test_indel_realignment_layout() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("mkdups");
        let phase = fx.put("phase.vcf", "phase");
        let mills = fx.put("mills.vcf", "mills");
        let intervals = fx.put("targets", "chr1:1-4");

        let indel = run_indel_realignment(
            &fx.ctx(),
            &options(false),
            &intervals,
            &pair,
            &reference,
            &phase,
            &mills,
        )
        .unwrap();
        let call = fx.only_call();

        assert_eq!(
            call.staged,
            sorted(&[
                REF_FASTA, REF_FAI, REF_DICT, SAMPLE_BAM, SAMPLE_BAI, PHASE_VCF, MILLS_VCF,
                INTERVALS,
            ])
        );
        assert_eq!(call.job.outputs, vec![INDEL_BAM, INDEL_BAI]);
        assert_eq!(
            call.job.params,
            vec![
                "-T", "IndelRealigner",
                "-R", "/data/ref.fasta",
                "-I", "/data/sample.bam",
                "-known", "/data/phase.vcf",
                "-known", "/data/mills.vcf",
                "-targetIntervals", "/data/sample.intervals",
                "--downsampling_type", "NONE",
                "-maxReads", "720000",
                "-maxInMemory", "5400000",
                "-o", "/data/sample.indel.bam",
            ]
        );
        assert_ne!(indel.bam, pair.bam);
    }

    #[test]
    fn test_base_recalibration_layout() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("indel");
        let dbsnp = fx.put("dbsnp_138.vcf", "dbsnp");

        run_base_recalibration(&fx.ctx(), &options(false), &pair, &reference, &dbsnp).unwrap();
        let call = fx.only_call();

        assert_eq!(
            call.staged,
            sorted(&[REF_FASTA, REF_FAI, REF_DICT, INDEL_BAM, INDEL_BAI, DBSNP_VCF])
        );
        assert_eq!(call.job.outputs, vec![RECAL_TABLE]);
        assert_eq!(
            call.job.params,
            vec![
                "-T", "BaseRecalibrator", "-nct", "4",
                "-R", "/data/ref.fasta",
                "-I", "/data/sample.indel.bam",
                "-knownSites", "/data/dbsnp.vcf",
                "-o", "/data/sample.recal.table",
            ]
        );
    }

    #[test]
    fn test_print_reads_layout() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("indel");
        let table = fx.put("recal", "table");

        run_print_reads(&fx.ctx(), &options(false), &table, &pair, &reference).unwrap();
        let call = fx.only_call();

        assert_eq!(
            call.staged,
            sorted(&[REF_FASTA, REF_FAI, REF_DICT, RECAL_TABLE, INDEL_BAM, INDEL_BAI])
        );
        assert_eq!(call.job.outputs, vec![BQSR_BAM, BQSR_BAI]);
        assert_eq!(
            call.job.params,
            vec![
                "-T", "PrintReads", "-nct", "4",
                "-R", "/data/ref.fasta",
                "--emit_original_quals",
                "-I", "/data/sample.indel.bam",
                "-BQSR", "/data/sample.recal.table",
                "-o", "/data/sample.bqsr.bam",
            ]
        );
    }

    #[test]
    fn test_unsafe_mode_is_appended_last() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("indel");
        let table = fx.put("recal", "table");
        let dbsnp = fx.put("dbsnp.vcf", "dbsnp");

        run_base_recalibration(&fx.ctx(), &options(true), &pair, &reference, &dbsnp).unwrap();
        run_print_reads(&fx.ctx(), &options(true), &table, &pair, &reference).unwrap();

        for call in fx.calls() {
            let params = &call.job.params;
            assert_eq!(params[params.len() - 2..], [UNSAFE_FLAG, UNSAFE_VALUE]);
        }
    }

    #[test]
    fn test_safe_mode_has_no_unsafe_flag() {
        let fx = Fixture::new();
        let reference = fx.reference();
        let pair = fx.bam("indel");
        let dbsnp = fx.put("dbsnp.vcf", "dbsnp");

        run_base_recalibration(&fx.ctx(), &options(false), &pair, &reference, &dbsnp).unwrap();

        assert!(!fx.only_call().job.params.iter().any(|p| p == UNSAFE_FLAG));
    }
}
