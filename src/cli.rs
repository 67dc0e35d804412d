//! Command-line interface, built on clap.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (fold, design,
//! selection) and global flags (--config, --log-level).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::archive::ArchiveMode;
use crate::tools::alphafold::{DbPreset, ModelPreset};

/// foldrun — supervise protein structure pipelines and fetch their results.
#[derive(Debug, Parser)]
#[command(name = "foldrun", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file. Environment variables still take
    /// precedence over values from the file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Prediction model preset accepted by the CLI, mapped to
/// [`ModelPreset`](crate::tools::alphafold::ModelPreset) internally.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelPresetArg {
    /// Single-chain prediction.
    Monomer,
    /// Multi-chain complex prediction.
    Multimer,
}

impl From<ModelPresetArg> for ModelPreset {
    fn from(arg: ModelPresetArg) -> Self {
        match arg {
            ModelPresetArg::Monomer => ModelPreset::Monomer,
            ModelPresetArg::Multimer => ModelPreset::Multimer,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DbPresetArg {
    /// Search the full genetic databases.
    FullDbs,
    /// Faster search against reduced databases.
    ReducedDbs,
}

impl From<DbPresetArg> for DbPreset {
    fn from(arg: DbPresetArg) -> Self {
        match arg {
            DbPresetArg::FullDbs => DbPreset::FullDbs,
            DbPresetArg::ReducedDbs => DbPreset::ReducedDbs,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Complete output tree.
    Full,
    /// Output tree without MSAs, per-model results and pickles.
    Lite,
}

impl From<ModeArg> for ArchiveMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Full => ArchiveMode::Full,
            ModeArg::Lite => ArchiveMode::Lite,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the containerized structure-prediction pipeline on a FASTA file.
    Fold {
        /// Input FASTA file.
        input: PathBuf,

        /// Prediction preset.
        #[arg(long, value_enum, default_value = "monomer")]
        model_preset: ModelPresetArg,

        /// Genetic database preset.
        #[arg(long, value_enum, default_value = "full-dbs")]
        db_preset: DbPresetArg,

        /// Latest template release date to consider (YYYY-MM-DD).
        #[arg(long, default_value = "2024-12-31")]
        max_template_date: String,

        /// Write the result archive here once the job finishes.
        #[arg(long)]
        download: Option<PathBuf>,

        /// Which archive variant to download.
        #[arg(long, value_enum, default_value = "full")]
        mode: ModeArg,
    },

    /// Run the sequence-design script on a PDB or mmCIF structure.
    Design {
        /// Input structure file (.pdb or .cif).
        input: PathBuf,

        /// Model weights to use.
        #[arg(long, default_value = "v_48_020")]
        model_name: String,

        /// Number of sequences to generate per target.
        #[arg(long, default_value_t = 10)]
        num_seqs: u32,

        /// Sampling batch size.
        #[arg(long, default_value_t = 1)]
        batch_size: u32,

        /// Sampling temperature.
        #[arg(long, default_value_t = 0.1)]
        sampling_temp: f64,

        /// Residues to keep fixed, e.g. "A:1-10,67-100 B:all".
        #[arg(long)]
        freeze: Option<String>,

        /// Write the result archive here once the job finishes.
        #[arg(long)]
        download: Option<PathBuf>,

        /// Which archive variant to download.
        #[arg(long, value_enum, default_value = "full")]
        mode: ModeArg,
    },

    /// Print the fixed-positions payload for a structure and freeze spec.
    Selection {
        /// Input structure file (.pdb or .cif).
        structure: PathBuf,

        /// Freeze spec, e.g. "A:1-10,67-100 B:all".
        spec: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_fold_subcommand() {
        let cli = Cli::parse_from([
            "foldrun",
            "fold",
            "target.fasta",
            "--model-preset",
            "multimer",
            "--db-preset",
            "reduced-dbs",
        ]);
        match cli.command {
            Command::Fold {
                input,
                model_preset,
                db_preset,
                download,
                ..
            } => {
                assert_eq!(input, PathBuf::from("target.fasta"));
                assert!(matches!(model_preset, ModelPresetArg::Multimer));
                assert!(matches!(db_preset, DbPresetArg::ReducedDbs));
                assert!(download.is_none());
            }
            _ => panic!("expected Fold command"),
        }
    }

    #[test]
    fn cli_parses_design_with_freeze_and_download() {
        let cli = Cli::parse_from([
            "foldrun",
            "design",
            "scaffold.pdb",
            "--freeze",
            "A:1-10 B:all",
            "--num-seqs",
            "32",
            "--download",
            "out.tgz",
            "--mode",
            "lite",
        ]);
        match cli.command {
            Command::Design {
                input,
                num_seqs,
                freeze,
                download,
                mode,
                ..
            } => {
                assert_eq!(input, PathBuf::from("scaffold.pdb"));
                assert_eq!(num_seqs, 32);
                assert_eq!(freeze.as_deref(), Some("A:1-10 B:all"));
                assert_eq!(download, Some(PathBuf::from("out.tgz")));
                assert!(matches!(mode, ModeArg::Lite));
            }
            _ => panic!("expected Design command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "foldrun",
            "--config",
            "foldrun.toml",
            "--log-level",
            "debug",
            "selection",
            "scaffold.pdb",
            "A:all",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("foldrun.toml")));
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Selection { structure, spec } => {
                assert_eq!(structure, PathBuf::from("scaffold.pdb"));
                assert_eq!(spec, "A:all");
            }
            _ => panic!("expected Selection command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
