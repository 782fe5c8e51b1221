use serde::Deserialize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::consts::*;
use crate::error::{PipelineError, PipelineResult};

/// A struct representing a configuration file.
///
/// # Fields
///
/// * `metadata` - Free-form key-value pairs, `run_id` is filled at load time.
/// * `images` - Container image overrides keyed by tool (`gatk`, `picard`, ...).
/// * `global` - Resources and switches shared by every stage.
/// * `inputs` - Paths imported into the file store before the run. Only
///   `run` and `write` need them; `trim` works without.
///
/// # Example
///
/// ``` toml
/// [metadata]
/// run_id = ""
///
/// [images]
/// gatk = "quay.io/ucsc_cgl/gatk:3.5--dba6dae49156168a909c43330350c6161dc7ecc2"
///
/// [global]
/// cores = 8
/// memory = "10G"
/// unsafe = false
/// mode = "full"
/// store_dir = "store"
/// output_dir = "results"
///
/// [inputs]
/// bam = "sample.bam"
/// ref = "hg38.fa"
/// phase = "1000G_phase1.indels.hg38.vcf"
/// mills = "Mills_and_1000G_gold_standard.indels.hg38.vcf"
/// dbsnp = "dbsnp_138.hg38.vcf"
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub images: HashMap<String, String>,
    #[serde(default)]
    pub global: GlobalParams,
    #[serde(default)]
    pub inputs: Option<Inputs>,
}

impl Config {
    /// Read a configuration file and return a Config struct.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::{Config, PipelineStep};
    /// # use std::path::PathBuf;
    /// let config = Config::read(PathBuf::from("config.toml"));
    /// ```
    pub fn read(config: PathBuf) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(&config)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(contents: &str) -> PipelineResult<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Check resources and image keys.
    ///
    /// Input paths are checked separately by [`Config::check_inputs`] so a
    /// config can be validated away from the data.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.global.cores == 0 {
            return Err(PipelineError::Config("cores must be at least 1".into()));
        }

        if self.global.memory.trim().is_empty() {
            return Err(PipelineError::Config("memory cannot be empty".into()));
        }

        for tool in self.images.keys() {
            if !TOOLS.contains(&tool.as_str()) {
                return Err(PipelineError::Config(format!(
                    "unknown tool in [images]: {} (expected one of {:?})",
                    tool, TOOLS
                )));
            }
        }

        Ok(())
    }

    /// The `[inputs]` section, required by the preprocessing graph.
    pub fn inputs(&self) -> PipelineResult<&Inputs> {
        self.inputs
            .as_ref()
            .ok_or_else(|| PipelineError::Config("missing [inputs] section".into()))
    }

    /// Make sure every configured input exists on disk.
    pub fn check_inputs(&self) -> PipelineResult<()> {
        for (key, path) in self.inputs()?.iter() {
            if !path.is_file() {
                return Err(PipelineError::Config(format!(
                    "input '{}' not found at {}",
                    key,
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Container image for a step, honoring `[images]` overrides.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::{Config, PipelineStep};
    /// # use std::path::PathBuf;
    /// let config = Config::read(PathBuf::from("config.toml")).unwrap();
    /// let image = config.get_image(PipelineStep::SortSam);
    /// ```
    pub fn get_image(&self, step: PipelineStep) -> String {
        resolve_image(&self.images, step)
    }

    /// Get global output directory from the Config
    /// with a timestamp appended.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::{Config, PipelineStep};
    /// # use std::path::PathBuf;
    /// let config = Config::read(PathBuf::from("config.toml")).unwrap();
    /// let output = config.create_global_output_dir().unwrap();
    /// ```
    pub fn create_global_output_dir(&self) -> PipelineResult<PathBuf> {
        let rs = self.global.output_dir.join(format!(
            "{}_{}",
            OUTPUT,
            chrono::Local::now().format("%Y%m%d%H%M")
        ));

        std::fs::create_dir_all(&rs)?;

        Ok(rs)
    }

    /// Generates a run ID of 4 characters.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::{Config, PipelineStep};
    /// # use std::path::PathBuf;
    /// let mut config = Config::read(PathBuf::from("config.toml")).unwrap();
    /// config.set_run_id();
    /// let run_id = config.get_run_id();
    /// ```
    pub fn set_run_id(&mut self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut id = String::with_capacity(RUN_ID_LEN);

        let mut hash = now;
        for _ in 0..RUN_ID_LEN {
            let idx = (hash % (CHARSET.len() as u128)) as usize;
            id.push(CHARSET[idx] as char);
            hash /= 7;
        }

        self.metadata.insert(RUN_ID.into(), id);
    }

    /// Get the run ID, empty until [`Config::set_run_id`] ran.
    pub fn get_run_id(&self) -> String {
        self.metadata.get(RUN_ID).cloned().unwrap_or_default()
    }
}

/// Resources and switches shared by every stage.
#[derive(Deserialize, Debug, Clone)]
pub struct GlobalParams {
    #[serde(default = "default_cores")]
    pub cores: usize,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default, rename = "unsafe")]
    pub unsafe_mode: bool,
    #[serde(default)]
    pub mode: PipelineMode,
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            cores: default_cores(),
            memory: default_memory(),
            unsafe_mode: false,
            mode: PipelineMode::default(),
            store_dir: default_store_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_cores() -> usize {
    num_cpus::get()
}

fn default_memory() -> String {
    DEFAULT_MEMORY.into()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(format!("{}_store", GATKPIPE))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Which chain to wire under the root task.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// remove-secondary → sort → mark-duplicates → GATK stages
    #[default]
    Full,
    /// GATK stages only, on an already sorted and deduplicated BAM
    GatkOnly,
}

/// Paths imported into the file store before the run.
///
/// `bai`, `fai` and `dict` are optional: when missing, the pipeline builds
/// them with samtools/picard before the main chain.
#[derive(Deserialize, Debug, Clone)]
pub struct Inputs {
    pub bam: PathBuf,
    pub bai: Option<PathBuf>,
    #[serde(rename = "ref")]
    pub reference: PathBuf,
    pub fai: Option<PathBuf>,
    pub dict: Option<PathBuf>,
    pub phase: PathBuf,
    pub mills: PathBuf,
    pub dbsnp: PathBuf,
}

impl Inputs {
    /// All configured paths with their config keys.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        [
            ("bam", Some(self.bam.as_path())),
            ("bai", self.bai.as_deref()),
            ("ref", Some(self.reference.as_path())),
            ("fai", self.fai.as_deref()),
            ("dict", self.dict.as_deref()),
            ("phase", Some(self.phase.as_path())),
            ("mills", Some(self.mills.as_path())),
            ("dbsnp", Some(self.dbsnp.as_path())),
        ]
        .into_iter()
        .filter_map(|(key, path)| path.map(|p| (key, p)))
    }
}

/// Container image for a step, honoring overrides keyed by tool.
pub fn resolve_image(images: &HashMap<String, String>, step: PipelineStep) -> String {
    images
        .get(step.tool())
        .cloned()
        .unwrap_or_else(|| step.default_image().to_string())
}

/// An enum representing pipeline steps, one per external tool invocation.
///
/// # Example
///
/// ``` rust, no_run
/// # use gatkpipe::config::PipelineStep;
/// let step = PipelineStep::SortSam;
/// assert_eq!(step.tool(), "picard");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum PipelineStep {
    Cutadapt,
    Faidx,
    SamtoolsIndex,
    SamtoolsView,
    CreateSequenceDictionary,
    SortSam,
    MarkDuplicates,
    RealignerTargetCreator,
    IndelRealigner,
    BaseRecalibrator,
    PrintReads,
}

impl PipelineStep {
    /// Create a PipelineStep enum from a string.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// let step = PipelineStep::from_str("sort-sam");
    ///
    /// assert_eq!(step, Ok(PipelineStep::SortSam));
    /// ```
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "cutadapt" => Ok(Self::Cutadapt),
            "faidx" => Ok(Self::Faidx),
            "index" => Ok(Self::SamtoolsIndex),
            "view" => Ok(Self::SamtoolsView),
            "create-sequence-dictionary" => Ok(Self::CreateSequenceDictionary),
            "sort-sam" => Ok(Self::SortSam),
            "mark-duplicates" => Ok(Self::MarkDuplicates),
            "realigner-target-creator" => Ok(Self::RealignerTargetCreator),
            "indel-realigner" => Ok(Self::IndelRealigner),
            "base-recalibrator" => Ok(Self::BaseRecalibrator),
            "print-reads" => Ok(Self::PrintReads),
            _ => Err(format!("ERROR: Invalid pipeline step: {}", s)),
        }
    }

    /// Convert a PipelineStep enum to a string.
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Cutadapt => "cutadapt",
            Self::Faidx => "faidx",
            Self::SamtoolsIndex => "index",
            Self::SamtoolsView => "view",
            Self::CreateSequenceDictionary => "create-sequence-dictionary",
            Self::SortSam => "sort-sam",
            Self::MarkDuplicates => "mark-duplicates",
            Self::RealignerTargetCreator => "realigner-target-creator",
            Self::IndelRealigner => "indel-realigner",
            Self::BaseRecalibrator => "base-recalibrator",
            Self::PrintReads => "print-reads",
        }
    }

    /// Tool key used in `[images]` and in log prefixes.
    ///
    /// # Note
    ///
    /// `faidx` and `index` run on the legacy samtools 0.1.19 image,
    /// `view` needs samtools 1.3 for `-@`.
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Cutadapt => CUTADAPT,
            Self::Faidx | Self::SamtoolsIndex => SAMTOOLS_LEGACY,
            Self::SamtoolsView => SAMTOOLS,
            Self::CreateSequenceDictionary | Self::SortSam | Self::MarkDuplicates => PICARD,
            Self::RealignerTargetCreator
            | Self::IndelRealigner
            | Self::BaseRecalibrator
            | Self::PrintReads => GATK,
        }
    }

    pub fn default_image(&self) -> &'static str {
        match self.tool() {
            CUTADAPT => CUTADAPT_IMAGE,
            SAMTOOLS_LEGACY => SAMTOOLS_LEGACY_IMAGE,
            SAMTOOLS => SAMTOOLS_IMAGE,
            PICARD => PICARD_IMAGE,
            _ => GATK_IMAGE,
        }
    }

    /// Leading parameters selecting the tool's subcommand or walker.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// # use gatkpipe::config::PipelineStep;
    /// assert_eq!(PipelineStep::PrintReads.subcommand(), &["-T", "PrintReads"]);
    /// ```
    pub fn subcommand(&self) -> &'static [&'static str] {
        match self {
            Self::Cutadapt => &[],
            Self::Faidx => &["faidx"],
            Self::SamtoolsIndex => &["index"],
            Self::SamtoolsView => &["view"],
            Self::CreateSequenceDictionary => &["CreateSequenceDictionary"],
            Self::SortSam => &["SortSam"],
            Self::MarkDuplicates => &["MarkDuplicates"],
            Self::RealignerTargetCreator => &["-T", "RealignerTargetCreator"],
            Self::IndelRealigner => &["-T", "IndelRealigner"],
            Self::BaseRecalibrator => &["-T", "BaseRecalibrator"],
            Self::PrintReads => &["-T", "PrintReads"],
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [inputs]
        bam = "sample.bam"
        ref = "ref.fasta"
        phase = "phase.vcf"
        mills = "mills.vcf"
        dbsnp = "dbsnp.vcf"
    "#;

    #[test]
    fn test_defaults_are_applied() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.global.memory, "10G");
        assert_eq!(config.global.cores, num_cpus::get());
        assert!(!config.global.unsafe_mode);
        assert_eq!(config.global.mode, PipelineMode::Full);
        let inputs = config.inputs().unwrap();
        assert!(inputs.bai.is_none());
        assert_eq!(inputs.iter().count(), 5);
    }

    #[test]
    fn test_global_section_overrides() {
        let toml = format!(
            "{}\n[global]\ncores = 2\nmemory = \"4G\"\nunsafe = true\nmode = \"gatk-only\"\n",
            MINIMAL
        );
        let config = Config::from_toml(&toml).unwrap();

        assert_eq!(config.global.cores, 2);
        assert_eq!(config.global.memory, "4G");
        assert!(config.global.unsafe_mode);
        assert_eq!(config.global.mode, PipelineMode::GatkOnly);
    }

    #[test]
    fn test_missing_required_input_fails() {
        let toml = r#"
            [inputs]
            bam = "sample.bam"
            ref = "ref.fasta"
        "#;

        assert!(matches!(
            Config::from_toml(toml),
            Err(PipelineError::Toml(_))
        ));
    }

    #[test]
    fn test_inputs_section_is_optional() {
        let config = Config::from_toml("[global]\noutput_dir = \"out\"\n").unwrap();

        assert!(config.inputs.is_none());
        assert_eq!(config.global.output_dir, PathBuf::from("out"));
        assert!(matches!(config.inputs(), Err(PipelineError::Config(_))));
        assert!(matches!(config.check_inputs(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_image_key_is_rejected() {
        let toml = format!("[images]\nbwa = \"bwa:latest\"\n{}", MINIMAL);

        assert!(matches!(
            Config::from_toml(&toml),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_zero_cores_is_rejected() {
        let toml = format!("{}\n[global]\ncores = 0\n", MINIMAL);

        assert!(matches!(
            Config::from_toml(&toml),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_image_override() {
        let toml = format!("[images]\ngatk = \"local/gatk:dev\"\n{}", MINIMAL);
        let config = Config::from_toml(&toml).unwrap();

        assert_eq!(config.get_image(PipelineStep::PrintReads), "local/gatk:dev");
        assert_eq!(config.get_image(PipelineStep::SortSam), PICARD_IMAGE);
        assert_eq!(config.get_image(PipelineStep::Faidx), SAMTOOLS_LEGACY_IMAGE);
        assert_eq!(config.get_image(PipelineStep::SamtoolsView), SAMTOOLS_IMAGE);
    }

    #[test]
    fn test_check_inputs_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let toml = MINIMAL.replace("sample.bam", &dir.path().join("nope.bam").display().to_string());
        let config = Config::from_toml(&toml).unwrap();

        let err = config.check_inputs().unwrap_err();
        assert!(err.to_string().contains("bam"));
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in [
            PipelineStep::Cutadapt,
            PipelineStep::SamtoolsView,
            PipelineStep::RealignerTargetCreator,
            PipelineStep::PrintReads,
        ] {
            assert_eq!(PipelineStep::from_str(step.to_str()), Ok(step));
        }
        assert!(PipelineStep::from_str("bwa").is_err());
    }

    #[test]
    fn test_run_id_length() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        assert!(config.get_run_id().is_empty());

        config.set_run_id();
        assert_eq!(config.get_run_id().len(), RUN_ID_LEN);
    }
}
