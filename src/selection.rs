//! Residue freeze-selection parsing.
//!
//! A freeze spec is a compact, human-friendly description of which residues
//! of an uploaded structure must stay fixed during sequence design, e.g.
//! `"A:1-10,67-100 B:all"`. Parsing is intersected against the residues
//! actually present in the structure: unknown chains and absent residues are
//! silently dropped so the same spec text can be reused across structures
//! with different chain sets.
//!
//! The selected positions are serialized as a single JSON object with two
//! equivalent keys — the structure's stem and the stem with its original
//! extension — because the downstream design tool looks the structure up
//! under either name depending on its code path. That dual-key shape is a
//! compatibility requirement and must not change.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::Result;

/// Residues present in a structure, keyed by chain label.
pub type ChainResidues = BTreeMap<String, BTreeSet<i32>>;

/// A parsed freeze selection: chain label to ascending, unique residue
/// numbers. Chains with nothing selected are not present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidueSelection(pub BTreeMap<String, Vec<i32>>);

impl ResidueSelection {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Enumerate `(chain, residue number)` pairs from a PDB file.
///
/// Only `ATOM` records are considered. The chain label lives in column 22
/// and the residue sequence number in columns 23-26 (fixed-column format);
/// a blank chain label is normalized to `"_"`. Records with an unparsable
/// residue number are skipped.
pub fn enumerate_residues(structure: &Path) -> Result<ChainResidues> {
    let contents = fs::read_to_string(structure)?;
    let mut chains = ChainResidues::new();
    for line in contents.lines() {
        if !line.starts_with("ATOM") {
            continue;
        }
        let bytes = line.as_bytes();
        if bytes.len() < 26 {
            continue;
        }
        let chain = match bytes[21] as char {
            ' ' => "_".to_string(),
            c => c.to_string(),
        };
        let res: i32 = match line[22..26].trim().parse() {
            Ok(r) => r,
            Err(_) => continue,
        };
        chains.entry(chain).or_default().insert(res);
    }
    Ok(chains)
}

/// Parse a freeze spec against the residues available in the structure.
///
/// Grammar (keywords case-insensitive): groups are separated by whitespace,
/// `;` or `,`; each group is `chain[:selector]` where the selector is `*`,
/// `all`, or a comma-separated list of residue numbers and `lo-hi` ranges.
/// A bare chain token selects the whole chain. Reversed range bounds are
/// normalized. A bare number or range token continues the most recent chain
/// group. Everything is intersected with what the structure actually
/// contains; unknown chains select nothing and are not an error.
pub fn parse_spec(spec: &str, available: &ChainResidues) -> ResidueSelection {
    let mut out: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();
    let mut current: Option<String> = None;

    let normalized = spec.replace('\n', " ");
    for token in normalized.split(|c: char| c == ';' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some((chain, sel)) = token.split_once(':') {
            let chain = chain.trim().to_string();
            apply_selector(&chain, sel.trim(), available, &mut out);
            current = Some(chain);
            continue;
        }
        // No ':' — the token may mix chain names and residue continuations,
        // comma-separated (',' also acts as a group separator).
        for piece in token.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if available.contains_key(piece) {
                apply_selector(piece, "all", available, &mut out);
                current = Some(piece.to_string());
            } else if let Some(chain) = &current {
                let chain = chain.clone();
                apply_selector(&chain, piece, available, &mut out);
            }
        }
    }

    ResidueSelection(
        out.into_iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(chain, set)| (chain, set.into_iter().collect()))
            .collect(),
    )
}

// Apply one selector ("all", "*", "1-10,67", ...) to a chain, intersecting
// with the residues present. Unknown chains are ignored.
fn apply_selector(
    chain: &str,
    selector: &str,
    available: &ChainResidues,
    out: &mut BTreeMap<String, BTreeSet<i32>>,
) {
    let Some(present) = available.get(chain) else {
        return;
    };
    let selected = out.entry(chain.to_string()).or_default();

    if selector.eq_ignore_ascii_case("all") || selector == "*" {
        selected.extend(present.iter().copied());
        return;
    }
    for item in selector.replace('/', ",").split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((a, b)) = item.split_once('-') {
            let (Ok(a), Ok(b)) = (a.trim().parse::<i32>(), b.trim().parse::<i32>()) else {
                continue;
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            selected.extend(present.range(lo..=hi).copied());
        } else if let Ok(r) = item.parse::<i32>() {
            if present.contains(&r) {
                selected.insert(r);
            }
        }
    }
}

/// Build the dual-key JSON payload consumed by the design tool.
///
/// Both the structure stem and the stem with its original extension map to
/// the same chain → residue-list object.
pub fn freeze_payload(structure: &Path, selection: &ResidueSelection) -> serde_json::Value {
    let stem = structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let named = match structure.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem.clone(),
    };
    let positions = json!(selection.0);
    json!({ stem: positions.clone(), named: positions })
}

/// Serialize a non-empty selection next to the structure file as
/// `fixed_positions.jsonl`, returning the written path. Empty selections
/// write nothing.
pub fn write_fixed_positions(
    structure: &Path,
    selection: &ResidueSelection,
) -> Result<Option<PathBuf>> {
    if selection.is_empty() {
        return Ok(None);
    }
    let dir = structure.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join("fixed_positions.jsonl");
    let payload = freeze_payload(structure, selection);
    fs::write(&path, serde_json::to_string(&payload)?)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    fn pdb_with(chains: &[(&str, std::ops::RangeInclusive<i32>)]) -> String {
        let mut out = String::from("HEADER    TEST STRUCTURE\n");
        let mut serial = 1;
        for (chain, range) in chains {
            for res in range.clone() {
                // Fixed-column ATOM record: chain in col 22, resseq in 23-26.
                writeln!(
                    out,
                    "ATOM  {serial:>5}  CA  GLY {chain}{res:>4}      11.104  13.207   2.100  1.00  0.00           C"
                )
                .unwrap();
                serial += 1;
            }
        }
        out.push_str("END\n");
        out
    }

    fn write_structure(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn avail(chains: &[(&str, std::ops::RangeInclusive<i32>)]) -> ChainResidues {
        let dir = tempfile::tempdir().unwrap();
        let path = write_structure(dir.path(), "s.pdb", &pdb_with(chains));
        enumerate_residues(&path).unwrap()
    }

    #[test]
    fn enumerates_chains_and_residues() {
        let chains = avail(&[("A", 1..=5), ("B", 200..=203)]);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains["A"].len(), 5);
        assert!(chains["B"].contains(&200));
        assert!(chains["B"].contains(&203));
    }

    #[test]
    fn blank_chain_normalized_to_underscore() {
        let chains = avail(&[(" ", 1..=3)]);
        assert!(chains.contains_key("_"));
        assert_eq!(chains["_"].len(), 3);
    }

    #[test]
    fn ranges_expanded_sorted_deduplicated() {
        let chains = avail(&[("A", 1..=120), ("B", 200..=210)]);
        let sel = parse_spec("A:1-10,67-100 B:all", &chains);
        let a: Vec<i32> = (1..=10).chain(67..=100).collect();
        let b: Vec<i32> = (200..=210).collect();
        assert_eq!(sel.0["A"], a);
        assert_eq!(sel.0["B"], b);
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let chains = avail(&[("A", 1..=120)]);
        let reversed = parse_spec("A:50-10", &chains);
        let forward = parse_spec("A:10-50", &chains);
        assert_eq!(reversed, forward);
        assert_eq!(reversed.0["A"], (10..=50).collect::<Vec<i32>>());
    }

    #[test]
    fn unknown_chain_is_ignored() {
        let chains = avail(&[("A", 1..=10)]);
        let sel = parse_spec("Z:1-5", &chains);
        assert!(sel.is_empty());

        let sel = parse_spec("A:1-3 Z:4-5", &chains);
        assert_eq!(sel.0.len(), 1);
        assert_eq!(sel.0["A"], vec![1, 2, 3]);
    }

    #[test]
    fn bare_chain_selects_everything() {
        let chains = avail(&[("B", 200..=205)]);
        let sel = parse_spec("B", &chains);
        assert_eq!(sel.0["B"], (200..=205).collect::<Vec<i32>>());
    }

    #[test]
    fn star_and_all_are_equivalent_case_insensitive() {
        let chains = avail(&[("A", 1..=4)]);
        assert_eq!(parse_spec("A:*", &chains), parse_spec("A:ALL", &chains));
        assert_eq!(parse_spec("A:all", &chains), parse_spec("A", &chains));
    }

    #[test]
    fn out_of_range_residues_are_dropped() {
        let chains = avail(&[("A", 10..=20)]);
        let sel = parse_spec("A:1-12,500", &chains);
        assert_eq!(sel.0["A"], vec![10, 11, 12]);
    }

    #[test]
    fn bare_token_continues_current_chain() {
        let chains = avail(&[("A", 1..=30)]);
        let sel = parse_spec("A:1-3 7 20-22", &chains);
        assert_eq!(sel.0["A"], vec![1, 2, 3, 7, 20, 21, 22]);
    }

    #[test]
    fn comma_separates_chain_groups() {
        let chains = avail(&[("A", 1..=3), ("B", 5..=6)]);
        let sel = parse_spec("A,B", &chains);
        assert_eq!(sel.0["A"], vec![1, 2, 3]);
        assert_eq!(sel.0["B"], vec![5, 6]);
    }

    #[test]
    fn slash_acts_as_comma_inside_selector() {
        let chains = avail(&[("A", 1..=10)]);
        let sel = parse_spec("A:1/3/5", &chains);
        assert_eq!(sel.0["A"], vec![1, 3, 5]);
    }

    #[test]
    fn empty_selection_is_excluded() {
        let chains = avail(&[("A", 1..=10), ("B", 20..=30)]);
        let sel = parse_spec("A:500-600 B:25", &chains);
        assert!(!sel.0.contains_key("A"));
        assert_eq!(sel.0["B"], vec![25]);
    }

    #[test]
    fn payload_has_dual_keys() {
        let chains = avail(&[("A", 1..=5)]);
        let sel = parse_spec("A:2-4", &chains);
        let payload = freeze_payload(Path::new("/in/design9.pdb"), &sel);
        let obj = payload.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["design9"], obj["design9.pdb"]);
        assert_eq!(obj["design9"]["A"], json!([2, 3, 4]));
    }

    #[test]
    fn payload_key_keeps_original_extension() {
        let sel = ResidueSelection(BTreeMap::from([("A".to_string(), vec![1])]));
        let payload = freeze_payload(Path::new("model.cif"), &sel);
        let obj = payload.as_object().unwrap();
        assert!(obj.contains_key("model"));
        assert!(obj.contains_key("model.cif"));
    }

    #[test]
    fn write_fixed_positions_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let structure = write_structure(dir.path(), "s.pdb", &pdb_with(&[("A", 1..=3)]));
        let written = write_fixed_positions(&structure, &ResidueSelection::default()).unwrap();
        assert!(written.is_none());

        let chains = enumerate_residues(&structure).unwrap();
        let sel = parse_spec("A:1-2", &chains);
        let written = write_fixed_positions(&structure, &sel).unwrap().unwrap();
        assert_eq!(written, dir.path().join("fixed_positions.jsonl"));
        let payload: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(payload["s"]["A"], json!([1, 2]));
        assert_eq!(payload["s.pdb"]["A"], json!([1, 2]));
    }
}
