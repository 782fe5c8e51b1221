use crate::{
    config::*,
    consts::*,
    core::{gatk, gatk::GatkOptions, picard, samtools, BamPair, KnownSites, ReferenceFiles},
    error::PipelineResult,
    executor::graph::{HandleRef, Promise, TaskGraph, TaskId},
};

// the view task drops supplementary alignments before sorting
const REMOVE_SECONDARY: &str = "remove-secondary";

/// Index the reference and build its dictionary when either is missing.
///
/// Missing pieces are produced by a chain `parent -> faidx -> dict` so
/// every later task sees both as ancestors.
///
/// # Returns
/// The reference trio (ready handles or promises) and the task later
/// stages should hang from.
pub fn run_reference_preparation(
    graph: &mut TaskGraph,
    parent: TaskId,
    reference: HandleRef,
    fai: Option<HandleRef>,
    dict: Option<HandleRef>,
    mem: &str,
) -> PipelineResult<(ReferenceFiles<HandleRef>, TaskId)> {
    let mut tail = parent;

    let fai = match fai {
        Some(fai) => fai,
        None => {
            let reference = reference.clone();
            let faidx = graph.add_job(PipelineStep::Faidx.to_str(), move |ctx| {
                let reference = ctx.resolve(&reference)?;
                Ok(vec![samtools::run_samtools_faidx(ctx.stage, &reference)?])
            });
            graph.add_child(tail, faidx)?;
            tail = faidx;
            graph.rv(faidx, 0).into()
        }
    };

    let dict = match dict {
        Some(dict) => dict,
        None => {
            let reference = reference.clone();
            let mem = mem.to_string();
            let seq_dict = graph.add_job(PipelineStep::CreateSequenceDictionary.to_str(), move |ctx| {
                let reference = ctx.resolve(&reference)?;
                Ok(vec![picard::run_picard_create_sequence_dictionary(
                    ctx.stage, &reference, &mem,
                )?])
            });
            graph.add_child(tail, seq_dict)?;
            tail = seq_dict;
            graph.rv(seq_dict, 0).into()
        }
    };

    Ok((
        ReferenceFiles {
            reference,
            fai,
            dict,
        },
        tail,
    ))
}

/// Index a BAM that came without its .bai
pub fn run_bam_indexing(
    graph: &mut TaskGraph,
    parent: TaskId,
    bam: HandleRef,
) -> PipelineResult<(BamPair<HandleRef>, TaskId)> {
    let input = bam.clone();
    let index = graph.add_job(PipelineStep::SamtoolsIndex.to_str(), move |ctx| {
        let bam = ctx.resolve(&input)?;
        Ok(vec![samtools::run_samtools_index(ctx.stage, &bam)?])
    });
    graph.add_child(parent, index)?;

    Ok((
        BamPair {
            bam,
            bai: graph.rv(index, 0).into(),
        },
        index,
    ))
}

/// Wire the four GATK stages below `parent`:
/// `parent -> RTC -> IR -> BR -> PR`.
///
/// # Arguments
/// * `graph` - Graph to extend.
/// * `parent` - Task the chain hangs from.
/// * `pair` - Indexed BAM to realign and recalibrate.
/// * `reference` - Reference trio.
/// * `known` - Known-site VCFs.
/// * `options` - Cores, heap and unsafe mode.
///
/// # Returns
/// Promises for the recalibrated BAM and BAI.
///
/// # Example
///
/// ```rust, ignore
/// let mut graph = TaskGraph::new();
/// let last = run_preprocessing(&mut graph, graph.root(), pair, reference, known, options)?;
/// let outputs = graph.execute(&ctx)?;
/// let bqsr = last.resolve(&outputs)?;
/// ```
pub fn run_preprocessing(
    graph: &mut TaskGraph,
    parent: TaskId,
    pair: BamPair<HandleRef>,
    reference: ReferenceFiles<HandleRef>,
    known: KnownSites<HandleRef>,
    options: GatkOptions,
) -> PipelineResult<BamPair<Promise>> {
    wire_gatk(graph, parent, pair, reference, known, options)
}

/// Full chain from an aligned BAM:
/// `parent -> remove-secondary -> sort -> mark-duplicates -> RTC -> IR -> BR -> PR`.
///
/// The duplicate-marked pair feeds both target creation and realignment.
pub fn run_gatk_preprocessing(
    graph: &mut TaskGraph,
    parent: TaskId,
    bam: HandleRef,
    reference: ReferenceFiles<HandleRef>,
    known: KnownSites<HandleRef>,
    options: GatkOptions,
) -> PipelineResult<BamPair<Promise>> {
    let view = graph.add_job(REMOVE_SECONDARY, move |ctx| {
        let bam = ctx.resolve(&bam)?;
        Ok(vec![samtools::samtools_view(ctx.stage, &bam, SECONDARY_FLAG)?])
    });
    graph.add_child(parent, view)?;

    let filtered: HandleRef = graph.rv(view, 0).into();
    let mem = options.memory.clone();
    let sort = graph.add_job(PipelineStep::SortSam.to_str(), move |ctx| {
        let bam = ctx.resolve(&filtered)?;
        Ok(picard::picard_sort_sam(ctx.stage, &bam, &mem)?.into_vec())
    });
    graph.add_child(view, sort)?;

    let sorted = BamPair::promised(graph, sort);
    let mem = options.memory.clone();
    let mkdups = graph.add_job(PipelineStep::MarkDuplicates.to_str(), move |ctx| {
        let pair = sorted.resolve(ctx)?;
        Ok(picard::picard_mark_duplicates(ctx.stage, &pair.bam, &pair.bai, &mem)?.into_vec())
    });
    graph.add_child(sort, mkdups)?;

    let marked = BamPair::promised(graph, mkdups);
    wire_gatk(graph, mkdups, marked, reference, known, options)
}

fn wire_gatk(
    graph: &mut TaskGraph,
    parent: TaskId,
    pair: BamPair<HandleRef>,
    reference: ReferenceFiles<HandleRef>,
    known: KnownSites<HandleRef>,
    options: GatkOptions,
) -> PipelineResult<BamPair<Promise>> {
    let rtc = {
        let (pair, reference, known, options) =
            (pair.clone(), reference.clone(), known.clone(), options.clone());
        graph.add_job(PipelineStep::RealignerTargetCreator.to_str(), move |ctx| {
            let pair = pair.resolve(ctx)?;
            let reference = reference.resolve(ctx)?;
            let known = known.resolve(ctx)?;
            Ok(vec![gatk::run_realigner_target_creator(
                ctx.stage,
                &options,
                &pair,
                &reference,
                &known.phase,
                &known.mills,
            )?])
        })
    };
    graph.add_child(parent, rtc)?;

    let indel = {
        let intervals: HandleRef = graph.rv(rtc, 0).into();
        let (reference, known, options) = (reference.clone(), known.clone(), options.clone());
        graph.add_job(PipelineStep::IndelRealigner.to_str(), move |ctx| {
            let intervals = ctx.resolve(&intervals)?;
            let pair = pair.resolve(ctx)?;
            let reference = reference.resolve(ctx)?;
            let known = known.resolve(ctx)?;
            Ok(gatk::run_indel_realignment(
                ctx.stage,
                &options,
                &intervals,
                &pair,
                &reference,
                &known.phase,
                &known.mills,
            )?
            .into_vec())
        })
    };
    graph.add_child(rtc, indel)?;

    let realigned = BamPair::promised(graph, indel);

    let recal = {
        let (pair, reference, options) = (realigned.clone(), reference.clone(), options.clone());
        let dbsnp = known.dbsnp;
        graph.add_job(PipelineStep::BaseRecalibrator.to_str(), move |ctx| {
            let pair = pair.resolve(ctx)?;
            let reference = reference.resolve(ctx)?;
            let dbsnp = ctx.resolve(&dbsnp)?;
            Ok(vec![gatk::run_base_recalibration(
                ctx.stage, &options, &pair, &reference, &dbsnp,
            )?])
        })
    };
    graph.add_child(indel, recal)?;

    let print = {
        let table: HandleRef = graph.rv(recal, 0).into();
        graph.add_job(PipelineStep::PrintReads.to_str(), move |ctx| {
            let table = ctx.resolve(&table)?;
            let pair = realigned.resolve(ctx)?;
            let reference = reference.resolve(ctx)?;
            Ok(gatk::run_print_reads(ctx.stage, &options, &table, &pair, &reference)?.into_vec())
        })
    };
    graph.add_child(recal, print)?;

    Ok(BamPair {
        bam: graph.rv(print, 0),
        bai: graph.rv(print, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::Fixture;
    use crate::store::{FileHandle, FileStore};

    fn options() -> GatkOptions {
        GatkOptions {
            cores: 2,
            memory: String::from("4G"),
            unsafe_mode: false,
        }
    }

    fn known(fx: &Fixture) -> KnownSites<HandleRef> {
        KnownSites {
            phase: fx.put("phase.vcf", "phase").into(),
            mills: fx.put("mills.vcf", "mills").into(),
            dbsnp: fx.put("dbsnp.vcf", "dbsnp").into(),
        }
    }

    fn reference(fx: &Fixture) -> ReferenceFiles<HandleRef> {
        let reference = fx.reference();
        ReferenceFiles {
            reference: reference.reference.into(),
            fai: reference.fai.into(),
            dict: reference.dict.into(),
        }
    }

    fn edge(parent: &str, child: &str) -> (String, String) {
        (parent.to_string(), child.to_string())
    }

    /// Handle the recording runtime produces for a declared output
    fn produced(fx: &Fixture, name: &str) -> FileHandle {
        let path = fx.dir.path().join(format!("expected.{}", name));
        std::fs::write(&path, name).unwrap();
        fx.store.import_file(&path).unwrap()
    }

    #[test]
    fn test_preprocessing_edges_follow_linear_order() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let pair: BamPair<HandleRef> = fx.bam("input").into();

        run_preprocessing(&mut graph, root, pair, reference(&fx), known(&fx), options()).unwrap();

        assert_eq!(
            graph.edges(),
            vec![
                edge("root", "realigner-target-creator"),
                edge("realigner-target-creator", "indel-realigner"),
                edge("indel-realigner", "base-recalibrator"),
                edge("base-recalibrator", "print-reads"),
            ]
        );
    }

    #[test]
    fn test_gatk_preprocessing_edges_follow_linear_order() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let bam: HandleRef = fx.put("input.bam", "bam").into();

        run_gatk_preprocessing(&mut graph, root, bam, reference(&fx), known(&fx), options())
            .unwrap();

        assert_eq!(
            graph.edges(),
            vec![
                edge("root", "remove-secondary"),
                edge("remove-secondary", "sort-sam"),
                edge("sort-sam", "mark-duplicates"),
                edge("mark-duplicates", "realigner-target-creator"),
                edge("realigner-target-creator", "indel-realigner"),
                edge("indel-realigner", "base-recalibrator"),
                edge("base-recalibrator", "print-reads"),
            ]
        );
    }

    #[test]
    fn test_reference_preparation_is_a_chain() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let reference: HandleRef = fx.put("ref.fa", ">chr1\nACGT\n").into();

        let (files, tail) =
            run_reference_preparation(&mut graph, root, reference, None, None, "4G").unwrap();

        assert_eq!(
            graph.edges(),
            vec![
                edge("root", "faidx"),
                edge("faidx", "create-sequence-dictionary"),
            ]
        );
        assert_eq!(graph.name(tail), "create-sequence-dictionary");
        assert!(matches!(files.fai, HandleRef::Promised(_)));
        assert!(matches!(files.dict, HandleRef::Promised(_)));
    }

    #[test]
    fn test_reference_preparation_skips_present_files() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let files = reference(&fx);

        let (prepared, tail) = run_reference_preparation(
            &mut graph,
            root,
            files.reference.clone(),
            Some(files.fai.clone()),
            Some(files.dict.clone()),
            "4G",
        )
        .unwrap();

        assert_eq!(tail, root);
        assert!(graph.edges().is_empty());
        assert_eq!(prepared, files);
    }

    #[test]
    fn test_full_chain_threads_handles_end_to_end() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let reference: HandleRef = fx.put("genome.fa", ">chr1\nACGT\n").into();
        let bam: HandleRef = fx.put("input.bam", "bam").into();

        let (files, tail) =
            run_reference_preparation(&mut graph, root, reference, None, None, "4G").unwrap();
        let last =
            run_gatk_preprocessing(&mut graph, tail, bam, files, known(&fx), options()).unwrap();

        let ctx = fx.ctx();
        let outputs = graph.execute(&ctx).unwrap();
        let bqsr = last.resolve(&outputs).unwrap();

        assert_eq!(bqsr.bam, produced(&fx, BQSR_BAM));
        assert_eq!(bqsr.bai, produced(&fx, BQSR_BAI));

        let steps: Vec<_> = fx.calls().iter().filter_map(|c| c.job.step).collect();
        assert_eq!(
            steps,
            vec![
                PipelineStep::Faidx,
                PipelineStep::CreateSequenceDictionary,
                PipelineStep::SamtoolsView,
                PipelineStep::SortSam,
                PipelineStep::MarkDuplicates,
                PipelineStep::RealignerTargetCreator,
                PipelineStep::IndelRealigner,
                PipelineStep::BaseRecalibrator,
                PipelineStep::PrintReads,
            ]
        );
    }

    #[test]
    fn test_bam_indexing_feeds_preprocessing() {
        let fx = Fixture::new();
        let mut graph = TaskGraph::new();
        let root = graph.root();
        let bam: HandleRef = fx.put("input.bam", "bam").into();

        let (pair, tail) = run_bam_indexing(&mut graph, root, bam).unwrap();
        let last =
            run_preprocessing(&mut graph, tail, pair, reference(&fx), known(&fx), options())
                .unwrap();

        assert_eq!(graph.edges()[0], edge("root", "index"));

        let ctx = fx.ctx();
        let outputs = graph.execute(&ctx).unwrap();

        assert_eq!(last.resolve(&outputs).unwrap().bam, produced(&fx, BQSR_BAM));
        assert_eq!(fx.calls().len(), 5);
    }
}
