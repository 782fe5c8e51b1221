use std::path::{Path, PathBuf};

use crate::config::PipelineStep;
use crate::consts::*;

/// One containerized tool invocation: image, parameters, environment and
/// the files it expects in (and leaves behind in) its work directory.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::config::PipelineStep;
/// use gatkpipe::executor::job::Job;
///
/// let job = Job::new()
///     .task(PipelineStep::SortSam)
///     .image("quay.io/ucsc_cgl/picardtools:1.95")
///     .arg("INPUT=sample.bam")
///     .arg("OUTPUT=sample.sorted.bam");
///
/// assert_eq!(job.params, vec!["SortSam", "INPUT=sample.bam", "OUTPUT=sample.sorted.bam"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    pub step: Option<PipelineStep>,
    pub image: String,
    pub params: Vec<String>,
    pub env: Vec<(String, String)>,
    pub work_dir: PathBuf,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Job {
    /// Create an empty job
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step and push its subcommand (`SortSam`, `-T PrintReads`, ...)
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// # use gatkpipe::executor::job::Job;
    /// # use std::path::Path;
    /// let job = Job::new().task(PipelineStep::PrintReads);
    ///
    /// assert_eq!(job.params, vec!["-T", "PrintReads"]);
    /// ```
    pub fn task(mut self, step: PipelineStep) -> Self {
        self.step = Some(step);
        self.params
            .extend(step.subcommand().iter().map(|s| s.to_string()));
        self
    }

    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    pub fn work_dir(mut self, work_dir: &Path) -> Self {
        self.work_dir = work_dir.to_path_buf();
        self
    }

    /// Add an argument to the job
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.params.push(arg.to_string());
        self
    }

    /// Add multiple arguments to the job
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// # use gatkpipe::executor::job::Job;
    /// # use std::path::Path;
    /// let job = Job::new()
    ///     .task(PipelineStep::SamtoolsIndex)
    ///     .args(&["/data/sample.bam"]);
    ///
    /// assert_eq!(job.params, vec!["index", "/data/sample.bam"]);
    /// ```
    pub fn args(mut self, args: &[&str]) -> Self {
        self.params.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Path of a file as seen from inside the container
    pub fn data(name: &str) -> String {
        format!("{}/{}", DATA_MOUNT, name)
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Set `JAVA_OPTS=-Xmx<mem>`, a bare number is read as gigabytes
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// # use gatkpipe::executor::job::Job;
    /// # use std::path::Path;
    /// let job = Job::new().java_heap("8");
    ///
    /// assert_eq!(job.env, vec![("JAVA_OPTS".to_string(), "-Xmx8G".to_string())]);
    /// ```
    pub fn java_heap(self, mem: &str) -> Self {
        let mem = mem.trim();
        let heap = if !mem.is_empty() && mem.chars().all(|c| c.is_ascii_digit()) {
            format!("-Xmx{}G", mem)
        } else {
            format!("-Xmx{}", mem)
        };

        self.env(JAVA_OPTS, &heap)
    }

    /// Append `-U ALLOW_SEQ_DICT_INCOMPATIBILITY` when `unsafe_mode` is set
    pub fn unsafe_mode(self, unsafe_mode: bool) -> Self {
        if unsafe_mode {
            self.args(&[UNSAFE_FLAG, UNSAFE_VALUE])
        } else {
            self
        }
    }

    /// Declare files that must be staged in the work dir before running
    pub fn inputs(mut self, names: &[&str]) -> Self {
        self.inputs.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Declare files the tool must leave in the work dir
    pub fn outputs(mut self, names: &[&str]) -> Self {
        self.outputs.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Step name for log prefixes
    pub fn name(&self) -> &'static str {
        self.step.map(|s| s.to_str()).unwrap_or(GATKPIPE)
    }

    /// Full argument vector handed to `docker`
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            String::from("run"),
            String::from("--rm"),
            String::from("--log-driver=none"),
            String::from("-v"),
            format!("{}:{}", self.work_dir.display(), DATA_MOUNT),
        ];

        for (key, value) in &self.env {
            args.push(String::from("-e"));
            args.push(format!("{}={}", key, value));
        }

        args.push(self.image.clone());
        args.extend(self.params.iter().cloned());

        args
    }

    /// Single-line rendering of the container invocation
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// # use gatkpipe::executor::job::Job;
    /// # use std::path::Path;
    /// let job = Job::new()
    ///     .task(PipelineStep::Faidx)
    ///     .image("samtools:0.1.19")
    ///     .arg("ref.fasta")
    ///     .work_dir(Path::new("/tmp/stage"));
    ///
    /// assert_eq!(
    ///     job.cmd(),
    ///     "docker run --rm --log-driver=none -v /tmp/stage:/data samtools:0.1.19 faidx ref.fasta"
    /// );
    /// ```
    pub fn cmd(&self) -> String {
        let mut cmd = String::from(DOCKER);
        for arg in self.docker_args() {
            cmd.push(' ');
            cmd.push_str(&arg);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_pushes_subcommand() {
        let job = Job::new().task(PipelineStep::RealignerTargetCreator).arg("-nt").arg(4);

        assert_eq!(job.params, vec!["-T", "RealignerTargetCreator", "-nt", "4"]);
        assert_eq!(job.name(), "realigner-target-creator");
    }

    #[test]
    fn test_unsafe_mode_appends_pair() {
        let safe = Job::new().task(PipelineStep::PrintReads).unsafe_mode(false);
        let unsafe_ = Job::new().task(PipelineStep::PrintReads).unsafe_mode(true);

        assert_eq!(safe.params.len(), 2);
        assert_eq!(
            unsafe_.params[2..],
            [String::from("-U"), String::from("ALLOW_SEQ_DICT_INCOMPATIBILITY")]
        );
    }

    #[test]
    fn test_java_heap_units() {
        assert_eq!(Job::new().java_heap("8").env[0].1, "-Xmx8G");
        assert_eq!(Job::new().java_heap("10G").env[0].1, "-Xmx10G");
        assert_eq!(Job::new().java_heap("512m").env[0].1, "-Xmx512m");
    }

    #[test]
    fn test_cmd_layout() {
        let job = Job::new()
            .task(PipelineStep::SortSam)
            .image("picard:1.95")
            .work_dir(Path::new("/scratch/stage-1"))
            .java_heap("8G")
            .arg("INPUT=sample.bam");

        assert_eq!(
            job.cmd(),
            "docker run --rm --log-driver=none -v /scratch/stage-1:/data \
             -e JAVA_OPTS=-Xmx8G picard:1.95 SortSam INPUT=sample.bam"
        );
    }
}
