//! Command construction for the containerized AlphaFold pipeline.
//!
//! The reference databases are pre-staged under one root with a known
//! subdirectory layout; concrete file names vary between database releases,
//! so each component is discovered by pattern. The monomer and multimer
//! presets require different component sets: multimer needs `uniprot` and
//! `pdb_seqres` and must not be given `pdb70`, monomer is the reverse.
//! Discovery is read-only; a missing required component is a configuration
//! error surfaced before anything is launched.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CommandLine;
use crate::config::AlphaFoldConfig;
use crate::error::{FoldrunError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPreset {
    Monomer,
    Multimer,
}

impl ModelPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelPreset::Monomer => "monomer",
            ModelPreset::Multimer => "multimer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbPreset {
    FullDbs,
    ReducedDbs,
}

impl DbPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            DbPreset::FullDbs => "full_dbs",
            DbPreset::ReducedDbs => "reduced_dbs",
        }
    }
}

/// Pipeline parameters accepted at submission.
#[derive(Debug, Clone)]
pub struct AlphaFoldParams {
    pub model_preset: ModelPreset,
    pub db_preset: DbPreset,
    pub max_template_date: String,
}

impl Default for AlphaFoldParams {
    fn default() -> Self {
        Self {
            model_preset: ModelPreset::Monomer,
            db_preset: DbPreset::FullDbs,
            max_template_date: "2024-12-31".to_string(),
        }
    }
}

/// Container-side paths of the discovered database components. `None`
/// means the component is absent on the host.
#[derive(Debug, Clone, Default)]
pub struct Databases {
    pub uniref90: Option<String>,
    pub mgnify: Option<String>,
    pub uniref30_prefix: Option<String>,
    pub bfd_prefix: Option<String>,
    pub pdb70_prefix: Option<String>,
    pub uniprot: Option<String>,
    pub pdb_seqres: Option<String>,
    pub mmcif_dir: Option<String>,
    pub obsolete: Option<String>,
}

// First directory entry (sorted by name) satisfying the predicate.
fn first_match(dir: &Path, pred: impl Fn(&str) -> bool) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| pred(n))
        .collect();
    names.sort();
    names.into_iter().next()
}

// ffindex files come in `<prefix>_hhm.ffindex` form; the tool wants the
// bare prefix.
fn hh_prefix(dir: &Path) -> Option<String> {
    first_match(dir, |n| n.ends_with("_hhm.ffindex"))
        .map(|n| n.trim_end_matches("_hhm.ffindex").to_string())
}

/// Discover the database components under `db_root`, returning the paths
/// the pipeline expects inside the container (`/db/...`).
pub fn detect_databases(db_root: &Path) -> Databases {
    let uniref90 = first_match(&db_root.join("uniref90"), |n| n.contains(".fa"));
    let mgnify = first_match(&db_root.join("mgnify"), |n| n.contains(".fa"));
    let uniprot = first_match(&db_root.join("uniprot"), |_| true);
    let pdb_seqres = first_match(&db_root.join("pdb_seqres"), |_| true);
    let mmcif_dir = db_root.join("pdb_mmcif").join("mmcif_files");
    let obsolete = db_root.join("pdb_mmcif").join("obsolete.dat");

    Databases {
        uniref90: uniref90.map(|n| format!("/db/uniref90/{n}")),
        mgnify: mgnify.map(|n| format!("/db/mgnify/{n}")),
        uniref30_prefix: hh_prefix(&db_root.join("uniref30")).map(|p| format!("/db/uniref30/{p}")),
        bfd_prefix: hh_prefix(&db_root.join("bfd")).map(|p| format!("/db/bfd/{p}")),
        pdb70_prefix: hh_prefix(&db_root.join("pdb70")).map(|p| format!("/db/pdb70/{p}")),
        uniprot: uniprot.map(|n| format!("/db/uniprot/{n}")),
        pdb_seqres: pdb_seqres.map(|n| format!("/db/pdb_seqres/{n}")),
        mmcif_dir: mmcif_dir.is_dir().then(|| "/db/pdb_mmcif/mmcif_files".to_string()),
        obsolete: obsolete.is_file().then(|| "/db/pdb_mmcif/obsolete.dat".to_string()),
    }
}

/// Build the `docker run` invocation for one job.
///
/// Mounts the database root read-write at `/db`, the job input directory at
/// `/in` and the job output directory at `/out`, under a job-unique
/// container name (`af-<job id>`) used later for inspection and
/// cancellation. Returns the command plus that name.
pub fn build_command(
    cfg: &AlphaFoldConfig,
    job_id: &str,
    input_file: &Path,
    output_dir: &Path,
    params: &AlphaFoldParams,
) -> Result<(CommandLine, String)> {
    let db = detect_databases(&cfg.db_dir);

    // One pass both collects missing component names and moves the present
    // ones into locals, so nothing needs re-checking below.
    let mut missing: Vec<&str> = Vec::new();
    let mut take = |name: &'static str, val: Option<String>| match val {
        Some(v) => v,
        None => {
            missing.push(name);
            String::new()
        }
    };
    let uniref90 = take("uniref90", db.uniref90);
    let mgnify = take("mgnify", db.mgnify);
    let uniref30 = take("uniref30", db.uniref30_prefix);
    let bfd = take("bfd", db.bfd_prefix);
    let mmcif_dir = take("pdb_mmcif/mmcif_files", db.mmcif_dir);
    let obsolete = take("pdb_mmcif/obsolete.dat", db.obsolete);
    let multimer_dbs = match params.model_preset {
        ModelPreset::Multimer => Some((
            take("uniprot", db.uniprot),
            take("pdb_seqres", db.pdb_seqres),
        )),
        ModelPreset::Monomer => None,
    };
    if !missing.is_empty() {
        return Err(FoldrunError::Config(format!(
            "AlphaFold databases incomplete under {}: missing {}",
            cfg.db_dir.display(),
            missing.join(", ")
        )));
    }

    let file_name = input_file
        .file_name()
        .ok_or_else(|| FoldrunError::Validation("input file has no name".into()))?
        .to_string_lossy()
        .into_owned();
    let stem = input_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let input_dir = input_file
        .parent()
        .ok_or_else(|| FoldrunError::Validation("input file has no parent directory".into()))?;

    let container = format!("af-{job_id}");
    let mut cmd = CommandLine::new("docker");
    cmd.arg("run").arg("--rm").arg("--name").arg(&container);
    if cfg.use_gpu {
        cmd.arg("--gpus").arg("all");
    }
    cmd.arg(format!("--shm-size={}", cfg.shm_size))
        .arg("-e")
        .arg(format!("JAX_PLATFORM_NAME={}", cfg.jax_platform))
        .arg("-e")
        .arg("XLA_PYTHON_CLIENT_PREALLOCATE=false")
        .arg("-v")
        .arg(format!("{}:/db", cfg.db_dir.display()))
        .arg("-v")
        .arg(format!("{}:/in", input_dir.display()))
        .arg("-v")
        .arg(format!("{}:/out", output_dir.display()))
        .arg(&cfg.image);

    cmd.arg(format!("--fasta_paths=/in/{file_name}"))
        .arg("--data_dir=/db")
        .arg(format!("--output_dir=/out/{stem}"))
        .arg(format!("--max_template_date={}", params.max_template_date))
        .arg(format!("--db_preset={}", params.db_preset.as_str()))
        .arg(format!("--model_preset={}", params.model_preset.as_str()))
        .arg(format!("--uniref90_database_path={uniref90}"))
        .arg(format!("--mgnify_database_path={mgnify}"))
        .arg(format!("--uniref30_database_path={uniref30}"))
        .arg(format!("--bfd_database_path={bfd}"))
        .arg(format!("--template_mmcif_dir={mmcif_dir}"))
        .arg(format!("--obsolete_pdbs_path={obsolete}"))
        .arg("--models_to_relax=none")
        .arg("--use_gpu_relax=false");

    match multimer_dbs {
        Some((uniprot, pdb_seqres)) => {
            cmd.arg(format!("--uniprot_database_path={uniprot}"))
                .arg(format!("--pdb_seqres_database_path={pdb_seqres}"));
        }
        None => {
            if let Some(pdb70) = db.pdb70_prefix {
                cmd.arg(format!("--pdb70_database_path={pdb70}"));
            }
        }
    }

    Ok((cmd, container))
}
