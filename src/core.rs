pub mod cutadapt;
pub mod gatk;
pub mod picard;
pub mod preprocessing;
pub mod samtools;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{
    config::*,
    consts::*,
    error::PipelineResult,
    executor::{
        graph::{GraphOutputs, HandleRef, Promise, TaskContext, TaskGraph, TaskId},
        job::Job,
        manager::{ContainerManager, ContainerRuntime},
    },
    store::{FileHandle, FileStore, LocalFileStore},
};

use gatk::GatkOptions;

/// Collaborators every stage talks to: the file store, the container
/// runtime and the image table.
pub struct StageContext<'a> {
    pub store: &'a dyn FileStore,
    pub runtime: &'a dyn ContainerRuntime,
    images: &'a HashMap<String, String>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        store: &'a dyn FileStore,
        runtime: &'a dyn ContainerRuntime,
        images: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            store,
            runtime,
            images,
        }
    }

    /// Job skeleton for a step: subcommand, image and work dir filled in.
    pub fn job(&self, step: PipelineStep, work_dir: &Path) -> Job {
        Job::new()
            .task(step)
            .image(&resolve_image(self.images, step))
            .work_dir(work_dir)
    }

    /// Copy each handle into `work_dir` under its fixed name.
    pub fn stage_in(&self, work_dir: &Path, files: &[(&FileHandle, &str)]) -> PipelineResult<()> {
        for (handle, name) in files {
            self.store.read_global_file(handle, &work_dir.join(name))?;
        }
        Ok(())
    }

    /// Store `work_dir/name` and return its handle.
    pub fn stage_out(&self, work_dir: &Path, name: &str) -> PipelineResult<FileHandle> {
        self.store.write_global_file(&work_dir.join(name))
    }
}

/// An alignment file and its index, always produced by the same stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BamPair<H = FileHandle> {
    pub bam: H,
    pub bai: H,
}

impl BamPair {
    pub fn into_vec(self) -> Vec<FileHandle> {
        vec![self.bam, self.bai]
    }
}

impl BamPair<HandleRef> {
    /// Outputs 0 and 1 of `task`
    pub fn promised(graph: &TaskGraph, task: TaskId) -> Self {
        Self {
            bam: graph.rv(task, 0).into(),
            bai: graph.rv(task, 1).into(),
        }
    }

    pub fn resolve(&self, ctx: &TaskContext<'_>) -> PipelineResult<BamPair> {
        Ok(BamPair {
            bam: ctx.resolve(&self.bam)?,
            bai: ctx.resolve(&self.bai)?,
        })
    }
}

impl From<BamPair> for BamPair<HandleRef> {
    fn from(pair: BamPair) -> Self {
        Self {
            bam: pair.bam.into(),
            bai: pair.bai.into(),
        }
    }
}

impl BamPair<Promise> {
    pub fn resolve(&self, outputs: &GraphOutputs) -> PipelineResult<BamPair> {
        Ok(BamPair {
            bam: outputs.resolve(&self.bam)?,
            bai: outputs.resolve(&self.bai)?,
        })
    }
}

/// Reference genome with its samtools index and picard dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFiles<H = FileHandle> {
    pub reference: H,
    pub fai: H,
    pub dict: H,
}

impl ReferenceFiles<HandleRef> {
    pub fn resolve(&self, ctx: &TaskContext<'_>) -> PipelineResult<ReferenceFiles> {
        Ok(ReferenceFiles {
            reference: ctx.resolve(&self.reference)?,
            fai: ctx.resolve(&self.fai)?,
            dict: ctx.resolve(&self.dict)?,
        })
    }
}

/// Known-variant VCFs used by realignment and recalibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownSites<H = FileHandle> {
    pub phase: H,
    pub mills: H,
    pub dbsnp: H,
}

impl KnownSites<HandleRef> {
    pub fn resolve(&self, ctx: &TaskContext<'_>) -> PipelineResult<KnownSites> {
        Ok(KnownSites {
            phase: ctx.resolve(&self.phase)?,
            mills: ctx.resolve(&self.mills)?,
            dbsnp: ctx.resolve(&self.dbsnp)?,
        })
    }
}

/// Files exported at the end of a run
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub bam: PathBuf,
    pub bai: PathBuf,
}

/// Run the whole preprocessing graph described by `config`.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::config::Config;
/// use gatkpipe::core::run;
/// use gatkpipe::executor::manager::ContainerManager;
///
/// let mut config = Config::read("config.toml".into()).unwrap();
/// let executor = ContainerManager::Docker.as_executor();
/// let outputs = run(&mut config, &executor).unwrap();
/// ```
pub fn run(config: &mut Config, runtime: &dyn ContainerRuntime) -> PipelineResult<RunOutputs> {
    let (store, pair) = execute(config, runtime)?;

    let output_dir = config.create_global_output_dir()?;
    let run_id = config.get_run_id();

    let bam = output_dir.join(format!("{}.{}", run_id, BQSR_BAM));
    let bai = output_dir.join(format!("{}.{}", run_id, BQSR_BAI));
    store.export_file(&pair.bam, &bam)?;
    store.export_file(&pair.bai, &bai)?;

    Ok(RunOutputs { bam, bai })
}

/// Check inputs, wire and execute the graph; nothing leaves the store.
fn execute(
    config: &mut Config,
    runtime: &dyn ContainerRuntime,
) -> PipelineResult<(LocalFileStore, BamPair)> {
    config.check_inputs()?;
    config.set_run_id();

    log::info!("SUCCESS: All inputs are present, starting pipeline...");
    log::info!("INFO: Running with the following config: {:#?}", config);

    let store = LocalFileStore::new(&config.global.store_dir)?;
    let (graph, last) = plan(config, &store)?;

    log::info!("INFO [GRAPH]: {} tasks wired", graph.len());

    let ctx = StageContext::new(&store, runtime, &config.images);
    let outputs = graph.execute(&ctx)?;
    let pair = last.resolve(&outputs)?;

    Ok((store, pair))
}

/// Import the configured inputs and wire the task graph without running it.
///
/// Returns the graph and the promises for the recalibrated BAM/BAI.
pub fn plan(config: &Config, store: &dyn FileStore) -> PipelineResult<(TaskGraph, BamPair<Promise>)> {
    let inputs = config.inputs()?;
    let import = |path: &Path| -> PipelineResult<HandleRef> { Ok(store.import_file(path)?.into()) };

    let options = GatkOptions {
        cores: config.global.cores,
        memory: config.global.memory.clone(),
        unsafe_mode: config.global.unsafe_mode,
    };

    let mut graph = TaskGraph::new();
    let root = graph.root();

    let (reference, tail) = preprocessing::run_reference_preparation(
        &mut graph,
        root,
        import(&inputs.reference)?,
        inputs.fai.as_deref().map(|p| import(p)).transpose()?,
        inputs.dict.as_deref().map(|p| import(p)).transpose()?,
        &options.memory,
    )?;

    let known = KnownSites {
        phase: import(&inputs.phase)?,
        mills: import(&inputs.mills)?,
        dbsnp: import(&inputs.dbsnp)?,
    };

    let bam = import(&inputs.bam)?;
    let last = match config.global.mode {
        PipelineMode::Full => {
            preprocessing::run_gatk_preprocessing(&mut graph, tail, bam, reference, known, options)?
        }
        PipelineMode::GatkOnly => {
            let (pair, tail) = match inputs.bai.as_deref() {
                Some(bai) => (
                    BamPair {
                        bam,
                        bai: import(bai)?,
                    },
                    tail,
                ),
                None => preprocessing::run_bam_indexing(&mut graph, tail, bam)?,
            };
            preprocessing::run_preprocessing(&mut graph, tail, pair, reference, known, options)?
        }
    };

    Ok((graph, last))
}

/// Adapter-trim one sample with cutadapt and export the trimmed reads as
/// `<run_id>.R1_cutadapt.fastq` (and `R2` for paired data).
pub fn trim(
    config: &mut Config,
    runtime: &dyn ContainerRuntime,
    r1: &Path,
    r2: Option<&Path>,
    fwd_adapter: &str,
    rev_adapter: Option<&str>,
) -> PipelineResult<(PathBuf, Option<PathBuf>)> {
    cutadapt::check_adapters(r2.is_some(), rev_adapter)?;

    config.set_run_id();

    let store = LocalFileStore::new(&config.global.store_dir)?;
    let ctx = StageContext::new(&store, runtime, &config.images);

    let r1 = store.import_file(r1)?;
    let r2 = r2.map(|p| store.import_file(p)).transpose()?;

    let (r1_cut, r2_cut) =
        cutadapt::run_cutadapt(&ctx, &r1, r2.as_ref(), fwd_adapter, rev_adapter)?;

    let output_dir = config.create_global_output_dir()?;
    let run_id = config.get_run_id();

    let r1_path = output_dir.join(format!("{}.{}", run_id, R1_CUT_FASTQ));
    store.export_file(&r1_cut, &r1_path)?;

    let r2_path = match r2_cut {
        Some(handle) => {
            let path = output_dir.join(format!("{}.{}", run_id, R2_CUT_FASTQ));
            store.export_file(&handle, &path)?;
            Some(path)
        }
        None => None,
    };

    Ok((r1_path, r2_path))
}

/// Dry run: mock every tool and write the container command lines to
/// `joblist`. Mock outputs stay in the file store; nothing is exported.
pub fn write(config: &mut Config, joblist: &Path) -> PipelineResult<PathBuf> {
    let runtime = ContainerManager::Mock.as_executor().with_joblist(joblist)?;
    execute(config, &runtime)?;

    Ok(joblist.to_path_buf())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// One invocation as seen by the runtime
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub job: Job,
        pub staged: Vec<String>,
    }

    /// Records each job with the files present in its work dir, then
    /// writes the declared outputs.
    #[derive(Default)]
    pub struct RecordingRuntime {
        calls: Mutex<Vec<Recorded>>,
    }

    impl ContainerRuntime for RecordingRuntime {
        fn invoke(&self, job: &Job) -> PipelineResult<()> {
            let mut staged = std::fs::read_dir(&job.work_dir)?
                .flatten()
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            staged.sort();

            for output in &job.outputs {
                std::fs::write(job.work_dir.join(output), output)?;
            }

            self.calls
                .lock()
                .map_err(|_| PipelineError::Graph("poisoned".into()))?
                .push(Recorded {
                    job: job.clone(),
                    staged,
                });

            Ok(())
        }
    }

    pub struct Fixture {
        pub dir: TempDir,
        pub store: LocalFileStore,
        pub runtime: RecordingRuntime,
        pub images: HashMap<String, String>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = LocalFileStore::new(dir.path().join("store")).unwrap();

            Self {
                dir,
                store,
                runtime: RecordingRuntime::default(),
                images: HashMap::new(),
            }
        }

        pub fn ctx(&self) -> StageContext<'_> {
            StageContext::new(&self.store, &self.runtime, &self.images)
        }

        /// Import a small file with the given content
        pub fn put(&self, name: &str, content: &str) -> FileHandle {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            self.store.import_file(&path).unwrap()
        }

        pub fn calls(&self) -> Vec<Recorded> {
            self.runtime.calls.lock().unwrap().clone()
        }

        /// The single recorded call, panics otherwise
        pub fn only_call(&self) -> Recorded {
            let calls = self.calls();
            assert_eq!(calls.len(), 1, "expected exactly one invocation");
            calls.into_iter().next().unwrap()
        }

        pub fn reference(&self) -> ReferenceFiles {
            ReferenceFiles {
                reference: self.put("ref.fa", ">chr1\nACGT\n"),
                fai: self.put("ref.fa.fai", "chr1\t4\t6\t4\t5\n"),
                dict: self.put("ref.dict", "@SQ\tSN:chr1\tLN:4\n"),
            }
        }

        pub fn bam(&self, tag: &str) -> BamPair {
            BamPair {
                bam: self.put(&format!("{}.bam", tag), &format!("{} bam", tag)),
                bai: self.put(&format!("{}.bai", tag), &format!("{} bai", tag)),
            }
        }
    }

    pub fn sorted(names: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        names.sort();
        names
    }
}
