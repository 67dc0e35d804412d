//! Command construction for the direct ProteinMPNN script invocation.
//!
//! Unlike the containerized pipeline, this runs an external Python script
//! straight on the host. The script path and the weights directory must both
//! exist before a command is built, and the uploaded structure must be a
//! `.pdb` or `.cif` file. An optional freeze spec is parsed against the
//! structure and, when anything survives the intersection, serialized to a
//! `fixed_positions.jsonl` side file referenced by flag.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CommandLine;
use crate::config::ProteinMpnnConfig;
use crate::error::{FoldrunError, Result};
use crate::selection;

pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["pdb", "cif"];

/// The released vanilla model weights the script accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelName {
    V48002,
    V48010,
    V48020,
    V48030,
}

impl ModelName {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelName::V48002 => "v_48_002",
            ModelName::V48010 => "v_48_010",
            ModelName::V48020 => "v_48_020",
            ModelName::V48030 => "v_48_030",
        }
    }
}

impl FromStr for ModelName {
    type Err = FoldrunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v_48_002" => Ok(ModelName::V48002),
            "v_48_010" => Ok(ModelName::V48010),
            "v_48_020" => Ok(ModelName::V48020),
            "v_48_030" => Ok(ModelName::V48030),
            other => Err(FoldrunError::Validation(format!(
                "unknown model name: {other}"
            ))),
        }
    }
}

impl Default for ModelName {
    fn default() -> Self {
        ModelName::V48020
    }
}

/// Sampling parameters accepted at submission.
#[derive(Debug, Clone)]
pub struct ProteinMpnnParams {
    pub model: ModelName,
    pub num_seqs: u32,
    pub batch_size: u32,
    pub sampling_temp: f64,
    pub freeze_spec: Option<String>,
}

impl Default for ProteinMpnnParams {
    fn default() -> Self {
        Self {
            model: ModelName::default(),
            num_seqs: 10,
            batch_size: 1,
            sampling_temp: 0.1,
            freeze_spec: None,
        }
    }
}

/// Reject requests that could never run before any filesystem side effect
/// beyond the upload itself.
pub fn validate(cfg: &ProteinMpnnConfig, input_file: &Path, params: &ProteinMpnnParams) -> Result<()> {
    if !cfg.script.exists() {
        return Err(FoldrunError::Config(format!(
            "ProteinMPNN script not found at {}",
            cfg.script.display()
        )));
    }
    if !cfg.weights_dir.exists() {
        return Err(FoldrunError::Config(format!(
            "ProteinMPNN weights missing at {}",
            cfg.weights_dir.display()
        )));
    }
    let ext = input_file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(FoldrunError::Validation(
            "ProteinMPNN expects a .pdb or .cif file".into(),
        ));
    }
    if params.num_seqs == 0 {
        return Err(FoldrunError::Validation("num_seqs must be positive".into()));
    }
    if params.batch_size == 0 {
        return Err(FoldrunError::Validation("batch_size must be positive".into()));
    }
    Ok(())
}

/// Build the script invocation for one job.
///
/// Expects [`validate`] to have passed. Parses and serializes the freeze
/// spec next to the input file; an empty selection adds no flag.
pub fn build_command(
    cfg: &ProteinMpnnConfig,
    input_file: &Path,
    output_dir: &Path,
    params: &ProteinMpnnParams,
) -> Result<CommandLine> {
    let mut fixed_positions = None;
    if let Some(spec) = params.freeze_spec.as_deref() {
        if !spec.trim().is_empty() {
            let available = selection::enumerate_residues(input_file)?;
            let selected = selection::parse_spec(spec, &available);
            fixed_positions = selection::write_fixed_positions(input_file, &selected)?;
        }
    }

    let mut cmd = CommandLine::new(&cfg.python);
    cmd.arg(cfg.script.to_string_lossy().into_owned())
        .arg("--pdb_path")
        .arg(input_file.to_string_lossy().into_owned())
        .arg("--out_folder")
        .arg(output_dir.to_string_lossy().into_owned())
        .arg("--path_to_model_weights")
        .arg(cfg.weights_dir.to_string_lossy().into_owned())
        .arg("--model_name")
        .arg(params.model.as_str())
        .arg("--num_seq_per_target")
        .arg(params.num_seqs.to_string())
        .arg("--batch_size")
        .arg(params.batch_size.to_string())
        .arg("--sampling_temp")
        .arg(params.sampling_temp.to_string());

    if let Some(path) = fixed_positions {
        cmd.arg("--fixed_positions_jsonl")
            .arg(path.to_string_lossy().into_owned());
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn stub_cfg(dir: &Path) -> ProteinMpnnConfig {
        let script = dir.join("protein_mpnn_run.py");
        let weights = dir.join("vanilla_model_weights");
        fs::write(&script, "").unwrap();
        fs::create_dir_all(&weights).unwrap();
        ProteinMpnnConfig {
            python: "python3".to_string(),
            script,
            weights_dir: weights,
        }
    }

    fn stub_structure(dir: &Path) -> PathBuf {
        let path = dir.join("design.pdb");
        let mut body = String::new();
        for res in 1..=10 {
            body.push_str(&format!(
                "ATOM  {res:>5}  CA  GLY A{res:>4}      11.104  13.207   2.100  1.00  0.00           C\n"
            ));
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn model_name_round_trip() {
        for name in ["v_48_002", "v_48_010", "v_48_020", "v_48_030"] {
            assert_eq!(ModelName::from_str(name).unwrap().as_str(), name);
        }
        assert!(matches!(
            ModelName::from_str("v_99_999"),
            Err(FoldrunError::Validation(_))
        ));
    }

    #[test]
    fn missing_script_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = stub_cfg(dir.path());
        cfg.script = dir.path().join("nope.py");
        let input = stub_structure(dir.path());
        let err = validate(&cfg, &input, &ProteinMpnnParams::default()).unwrap_err();
        assert!(matches!(err, FoldrunError::Config(_)));
    }

    #[test]
    fn missing_weights_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = stub_cfg(dir.path());
        cfg.weights_dir = dir.path().join("nowhere");
        let input = stub_structure(dir.path());
        let err = validate(&cfg, &input, &ProteinMpnnParams::default()).unwrap_err();
        assert!(matches!(err, FoldrunError::Config(_)));
    }

    #[test]
    fn bad_extension_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = dir.path().join("sequence.fasta");
        fs::write(&input, "").unwrap();
        let err = validate(&cfg, &input, &ProteinMpnnParams::default()).unwrap_err();
        assert!(matches!(err, FoldrunError::Validation(_)));
    }

    #[test]
    fn uppercase_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = dir.path().join("DESIGN.PDB");
        fs::write(&input, "").unwrap();
        assert!(validate(&cfg, &input, &ProteinMpnnParams::default()).is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = stub_structure(dir.path());
        let params = ProteinMpnnParams {
            num_seqs: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate(&cfg, &input, &params),
            Err(FoldrunError::Validation(_))
        ));
    }

    #[test]
    fn command_shape_without_freeze_spec() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = stub_structure(dir.path());
        let out = dir.path().join("out");
        let cmd = build_command(&cfg, &input, &out, &ProteinMpnnParams::default()).unwrap();

        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args[0], cfg.script.to_string_lossy());
        let flags: Vec<&str> = cmd.args.iter().map(|s| s.as_str()).collect();
        assert!(flags.windows(2).any(|w| w == ["--model_name", "v_48_020"]));
        assert!(flags.windows(2).any(|w| w == ["--num_seq_per_target", "10"]));
        assert!(flags.windows(2).any(|w| w == ["--batch_size", "1"]));
        assert!(flags.windows(2).any(|w| w == ["--sampling_temp", "0.1"]));
        assert!(!flags.contains(&"--fixed_positions_jsonl"));
    }

    #[test]
    fn freeze_spec_writes_side_file_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = stub_structure(dir.path());
        let out = dir.path().join("out");
        let params = ProteinMpnnParams {
            freeze_spec: Some("A:2-4".to_string()),
            ..Default::default()
        };
        let cmd = build_command(&cfg, &input, &out, &params).unwrap();

        let jsonl = dir.path().join("fixed_positions.jsonl");
        assert!(jsonl.exists());
        let payload: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&jsonl).unwrap()).unwrap();
        assert_eq!(payload["design"]["A"], serde_json::json!([2, 3, 4]));
        assert_eq!(payload["design.pdb"], payload["design"]);

        let flags: Vec<&str> = cmd.args.iter().map(|s| s.as_str()).collect();
        let pos = flags.iter().position(|f| *f == "--fixed_positions_jsonl").unwrap();
        assert_eq!(flags[pos + 1], jsonl.to_string_lossy());
    }

    #[test]
    fn freeze_spec_matching_nothing_adds_no_flag() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = stub_cfg(dir.path());
        let input = stub_structure(dir.path());
        let out = dir.path().join("out");
        let params = ProteinMpnnParams {
            freeze_spec: Some("Z:1-5".to_string()),
            ..Default::default()
        };
        let cmd = build_command(&cfg, &input, &out, &params).unwrap();
        assert!(!cmd.args.iter().any(|a| a == "--fixed_positions_jsonl"));
        assert!(!dir.path().join("fixed_positions.jsonl").exists());
    }
}
