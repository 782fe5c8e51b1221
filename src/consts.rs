// container images
pub const CUTADAPT_IMAGE: &str =
    "quay.io/ucsc_cgl/cutadapt:1.9--6bd44edd2b8f8f17e25c5a268fedaab65fa851d2";
pub const SAMTOOLS_LEGACY_IMAGE: &str =
    "quay.io/ucsc_cgl/samtools:0.1.19--dd5ac549b95eb3e5d166a5e310417ef13651994e";
pub const SAMTOOLS_IMAGE: &str =
    "quay.io/ucsc_cgl/samtools:1.3--256539928ea162949d8a65ca5c79a72ef557ce7c";
pub const PICARD_IMAGE: &str =
    "quay.io/ucsc_cgl/picardtools:1.95--dd5ac549b95eb3e5d166a5e310417ef13651994e";
pub const GATK_IMAGE: &str =
    "quay.io/ucsc_cgl/gatk:3.5--dba6dae49156168a909c43330350c6161dc7ecc2";

// tool keys ([images] table in config.toml)
pub const CUTADAPT: &str = "cutadapt";
pub const SAMTOOLS: &str = "samtools";
pub const SAMTOOLS_LEGACY: &str = "samtools-legacy";
pub const PICARD: &str = "picard";
pub const GATK: &str = "gatk";
pub const TOOLS: &[&str] = &[CUTADAPT, SAMTOOLS_LEGACY, SAMTOOLS, PICARD, GATK];

// container layout
pub const DATA_MOUNT: &str = "/data";
pub const JAVA_OPTS: &str = "JAVA_OPTS";
pub const DOCKER: &str = "docker";

// staged filenames
pub const R1_FASTQ: &str = "R1.fastq";
pub const R2_FASTQ: &str = "R2.fastq";
pub const R1_CUT_FASTQ: &str = "R1_cutadapt.fastq";
pub const R2_CUT_FASTQ: &str = "R2_cutadapt.fastq";
pub const REF_FASTA: &str = "ref.fasta";
pub const REF_FAI: &str = "ref.fasta.fai";
pub const REF_DICT: &str = "ref.dict";
pub const SAMPLE_BAM: &str = "sample.bam";
pub const SAMPLE_BAI: &str = "sample.bam.bai";
pub const VIEW_BAM: &str = "sample.output.bam";
pub const SORTED_BAM: &str = "sample.sorted.bam";
pub const SORTED_BAI: &str = "sample.sorted.bai";
pub const MKDUPS_BAM: &str = "sample.mkdups.bam";
pub const MKDUPS_BAI: &str = "sample.mkdups.bai";
pub const MKDUPS_METRICS: &str = "metrics.txt";
pub const PHASE_VCF: &str = "phase.vcf";
pub const MILLS_VCF: &str = "mills.vcf";
pub const DBSNP_VCF: &str = "dbsnp.vcf";
pub const INTERVALS: &str = "sample.intervals";
pub const INDEL_BAM: &str = "sample.indel.bam";
pub const INDEL_BAI: &str = "sample.indel.bai";
pub const RECAL_TABLE: &str = "sample.recal.table";
pub const BQSR_BAM: &str = "sample.bqsr.bam";
pub const BQSR_BAI: &str = "sample.bqsr.bai";

// tool parameters
pub const MIN_READ_LENGTH: &str = "35";
pub const SECONDARY_FLAG: &str = "0x800";
pub const UNSAFE_FLAG: &str = "-U";
pub const UNSAFE_VALUE: &str = "ALLOW_SEQ_DICT_INCOMPATIBILITY";
// INFO: taken from the MC3 pipeline
pub const MAX_READS: u32 = 720000;
pub const MAX_IN_MEMORY: u32 = 5400000;

// config keys
pub const RUN_ID: &str = "run_id";
pub const OUTPUT: &str = "gatkpipe_run";
pub const DEFAULT_MEMORY: &str = "10G";
pub const DEFAULT_JOBLIST: &str = "jobs";

// miscellaneous constants
pub const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const RUN_ID_LEN: usize = 4;
pub const GATKPIPE: &str = "gatkpipe";
