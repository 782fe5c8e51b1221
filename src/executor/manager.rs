use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use std::sync::Mutex;

use crate::consts::*;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::job::Job;

/// Narrow interface to the container engine: run one job to completion.
///
/// A non-zero exit must surface as [`PipelineError::ToolFailed`]; callers
/// propagate it unchanged.
pub trait ContainerRuntime: Send + Sync {
    fn invoke(&self, job: &Job) -> PipelineResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerManager {
    /// Run every job through the docker CLI
    Docker,

    /// Skip the container and write placeholder outputs, used for CI
    /// and for dry runs
    Mock,
}

impl FromStr for ContainerManager {
    type Err = String;

    /// Convert a string to a ContainerManager
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// # use std::str::FromStr;
    /// use gatkpipe::executor::manager::ContainerManager;
    ///
    /// let manager = ContainerManager::from_str("docker").unwrap();
    /// assert_eq!(manager, ContainerManager::Docker);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(ContainerManager::Docker),
            "mock" => Ok(ContainerManager::Mock),
            _ => Err(format!("ERROR: Unknown container manager: {}", s)),
        }
    }
}

impl std::fmt::Display for ContainerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerManager::Docker => write!(f, "docker"),
            ContainerManager::Mock => write!(f, "mock"),
        }
    }
}

impl ContainerManager {
    /// Build an executor driven by this manager
    pub fn as_executor(&self) -> DockerExecutor {
        DockerExecutor::new(*self)
    }
}

/// Default [`ContainerRuntime`]: mounts the job's work dir at `/data`,
/// checks declared inputs before and declared outputs after each run.
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::executor::manager::{ContainerManager, ContainerRuntime};
///
/// let executor = ContainerManager::Mock
///     .as_executor()
///     .with_joblist("jobs".as_ref())
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct DockerExecutor {
    pub manager: ContainerManager,
    binary: String,
    joblist: Option<Mutex<BufWriter<File>>>,
}

impl DockerExecutor {
    pub fn new(manager: ContainerManager) -> Self {
        Self {
            manager,
            binary: String::from(DOCKER),
            joblist: None,
        }
    }

    /// Use a different container CLI (e.g. `podman`)
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    /// Also record every invocation, one command line per row
    pub fn with_joblist(mut self, path: &Path) -> PipelineResult<Self> {
        let file = File::create(path)?;
        self.joblist = Some(Mutex::new(BufWriter::new(file)));

        log::info!("INFO [{}]: writing job list to {}", GATKPIPE, path.display());

        Ok(self)
    }

    fn record(&self, job: &Job) -> PipelineResult<()> {
        if let Some(joblist) = &self.joblist {
            let mut writer = joblist
                .lock()
                .map_err(|_| PipelineError::Graph("job list writer poisoned".into()))?;
            writeln!(writer, "{}", job.cmd())?;
            writer.flush()?;
        }

        Ok(())
    }

    fn run_docker(&self, job: &Job) -> PipelineResult<()> {
        let output = Command::new(&self.binary)
            .args(job.docker_args())
            .output()?;

        if output.status.success() {
            log::info!("INFO [{}]: finished {}", job.name(), job.image);
            Ok(())
        } else {
            Err(PipelineError::ToolFailed {
                tool: job.name().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    fn run_mock(&self, job: &Job) -> PipelineResult<()> {
        // INFO: content differs per output so each gets its own handle
        for output in &job.outputs {
            std::fs::write(
                job.work_dir.join(output),
                format!("{} {}\n", job.name(), output),
            )?;
        }

        log::info!("INFO [{}]: mocked {} output(s)", job.name(), job.outputs.len());

        Ok(())
    }
}

impl ContainerRuntime for DockerExecutor {
    fn invoke(&self, job: &Job) -> PipelineResult<()> {
        for input in &job.inputs {
            let path = job.work_dir.join(input);
            if !path.is_file() {
                return Err(PipelineError::MissingInput {
                    tool: job.name().to_string(),
                    path,
                });
            }
        }

        log::info!("INFO [{}]: {}", job.name(), job.cmd());
        self.record(job)?;

        match self.manager {
            ContainerManager::Docker => self.run_docker(job)?,
            ContainerManager::Mock => self.run_mock(job)?,
        }

        for output in &job.outputs {
            let path = job.work_dir.join(output);
            if !path.exists() {
                return Err(PipelineError::MissingOutput {
                    tool: job.name().to_string(),
                    path,
                });
            }
        }

        Ok(())
    }
}
