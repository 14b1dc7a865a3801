//! Defect-score loading (§6, §10.4): reads per-method defect prediction
//! scores out of a directory of CSV files and resolves them against the
//! known method pool to decide each target's buggy flag.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::error::{GoalBuildError, SearchError};

/// Defect prediction score for one fully-qualified method.
pub type MethodKey = String;

/// Normalizes a `fqMethodName` per the §6 grammar: collapses varargs
/// (`...` -> `[]`), strips generic type parameters (`<...>`), and
/// rewrites the void-return-type separator (`)void:` -> `):`).
#[must_use]
pub fn normalize_method_name(raw: &str) -> String {
    let mut name = raw.replace("...", "[]");
    name = strip_generics(&name);
    name.replace(")void:", "):")
}

fn strip_generics(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0u32;
    for c in input.chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Loads every `*.csv` file directly under `dir`, each expected to carry a
/// `fqMethodName,defectScore` header, and returns the normalized-name to
/// score table. Rows whose method is not in `known_methods` are skipped
/// with a warn-level log (non-fatal, per §10.4).
pub fn load_defect_scores(
    dir: &Path,
    known_methods: &std::collections::HashSet<MethodKey>,
) -> Result<HashMap<MethodKey, f64>, SearchError> {
    let mut scores = HashMap::new();

    let entries = std::fs::read_dir(dir).map_err(|source| SearchError::DefectScoreIo {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| SearchError::DefectScoreIo {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|source| SearchError::DefectScoreParse {
            path: path.display().to_string(),
            source,
        })?;

        for record in reader.deserialize() {
            let row: DefectScoreRow = record.map_err(|source| SearchError::DefectScoreParse {
                path: path.display().to_string(),
                source,
            })?;
            let normalized = normalize_method_name(&row.fq_method_name);
            if !known_methods.contains(&normalized) {
                // §7 GoalMissing: non-fatal, the method is treated as
                // non-buggy. Constructed as a typed error purely to carry
                // a consistent message; never returned as `Err`.
                let missing = GoalBuildError::GoalMissing(normalized);
                warn!(file = %path.display(), %missing, "skipping defect score entry");
                continue;
            }
            scores.insert(normalized, row.defect_score);
        }
    }

    Ok(scores)
}

#[derive(Debug, serde::Deserialize)]
struct DefectScoreRow {
    #[serde(rename = "fqMethodName")]
    fq_method_name: String,
    #[serde(rename = "defectScore")]
    defect_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalizes_varargs_generics_and_void_separator() {
        let raw = "pkg.Foo.bar(List<String>, int...)void:17";
        assert_eq!(normalize_method_name(raw), "pkg.Foo.bar(List, int[]):17");
    }

    #[test]
    fn loads_known_methods_and_skips_unknown_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("scores.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "fqMethodName,defectScore").unwrap();
        writeln!(file, "pkg.Foo.bar():1,0.8").unwrap();
        writeln!(file, "pkg.Unknown.baz():1,0.5").unwrap();

        let mut known = std::collections::HashSet::new();
        known.insert("pkg.Foo.bar():1".to_string());

        let scores = load_defect_scores(dir.path(), &known).unwrap();
        assert_eq!(scores.get("pkg.Foo.bar():1"), Some(&0.8));
        assert!(!scores.contains_key("pkg.Unknown.baz():1"));
    }

    #[test]
    fn ignores_non_csv_files_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a csv").unwrap();

        let known = std::collections::HashSet::new();
        let scores = load_defect_scores(dir.path(), &known).unwrap();
        assert!(scores.is_empty());
    }
}
