//! Data validation utilities.
//!
//! Every `*.ron` file under a directory must parse as either an
//! [`AbilityCatalog`] or a [`MatchSession`]. Catalogs are checked on their
//! own; sessions are checked against the union of the catalogs found
//! (the standard catalog when there are none).

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use sw_core::ability::{AbilityCatalog, AbilityDef, AbilityEffect};
use sw_core::math::Fixed;
use sw_core::session::MatchSession;
use thiserror::Error;

/// Failure to read the data directory itself.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Directory does not exist.
    #[error("Data directory not found: {0}")]
    NotFound(String),
    /// Failed to read a directory or file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// One problem found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// File the problem was found in.
    pub path: PathBuf,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Outcome of validating a directory.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Catalog files found.
    pub catalogs: usize,
    /// Session files found.
    pub sessions: usize,
    /// Problems, in file order.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, path: &Path, message: impl Into<String>) {
        self.issues.push(Issue {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }
}

enum DataFile {
    Catalog(AbilityCatalog),
    Session(MatchSession),
}

/// Validate all RON data files in a directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be read. Problems inside
/// files are collected in the report instead.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport, ValidateError> {
    if !path.is_dir() {
        return Err(ValidateError::NotFound(path.display().to_string()));
    }
    let mut files = Vec::new();
    collect_ron_files(path, &mut files)?;
    files.sort();

    let mut report = ValidationReport::default();
    let mut parsed = Vec::new();
    for file in files {
        let source = std::fs::read_to_string(&file).map_err(|source| ValidateError::Io {
            path: file.display().to_string(),
            source,
        })?;
        match classify(&source) {
            Some(data) => parsed.push((file, data)),
            None => report.push(&file, "not an ability catalog or a match session"),
        }
    }

    let mut combined = AbilityCatalog::default();
    for (file, data) in &parsed {
        if let DataFile::Catalog(catalog) = data {
            report.catalogs += 1;
            for message in check_catalog(catalog) {
                report.push(file, message);
            }
            combined.abilities.extend(catalog.abilities.iter().cloned());
        }
    }
    if combined.is_empty() {
        combined = AbilityCatalog::standard();
    }

    for (file, data) in &parsed {
        if let DataFile::Session(session) = data {
            report.sessions += 1;
            if let Err(e) = session.validate(&combined) {
                report.push(file, e.to_string());
            }
        }
    }

    tracing::debug!(
        catalogs = report.catalogs,
        sessions = report.sessions,
        issues = report.issues.len(),
        "Validated data directory"
    );
    Ok(report)
}

fn collect_ron_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ValidateError> {
    let io = |source| ValidateError::Io {
        path: dir.display().to_string(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            collect_ron_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ron") {
            out.push(path);
        }
    }
    Ok(())
}

fn classify(source: &str) -> Option<DataFile> {
    if let Ok(catalog) = ron::from_str::<AbilityCatalog>(source) {
        return Some(DataFile::Catalog(catalog));
    }
    ron::from_str::<MatchSession>(source)
        .ok()
        .map(DataFile::Session)
}

/// Problems with a single catalog.
#[must_use]
pub fn check_catalog(catalog: &AbilityCatalog) -> Vec<String> {
    let mut problems = Vec::new();
    if catalog.is_empty() {
        problems.push("catalog has no abilities".to_string());
    }
    let mut seen = BTreeSet::new();
    for ability in &catalog.abilities {
        if !seen.insert(ability.id.as_str()) {
            problems.push(format!("duplicate ability id '{}'", ability.id));
        }
        problems.extend(
            check_ability(ability)
                .into_iter()
                .map(|p| format!("'{}': {p}", ability.id)),
        );
    }
    problems
}

fn check_ability(ability: &AbilityDef) -> Vec<String> {
    let mut problems = Vec::new();
    if ability.id.trim().is_empty() {
        problems.push("empty id".to_string());
    }
    if ability.name.trim().is_empty() {
        problems.push("empty name".to_string());
    }
    if let Some(charge) = ability.charge {
        if charge.min > charge.max {
            problems.push(format!("charge min {} above max {}", charge.min, charge.max));
        }
        if charge.speed <= Fixed::ZERO {
            problems.push(format!("charge speed {} must be positive", charge.speed));
        }
    }
    match ability.effect {
        AbilityEffect::Thrown { flight_ticks: 0, .. } => {
            problems.push("thrown with zero flight time".to_string());
        }
        AbilityEffect::Channel { fuel_ticks: 0 } => {
            problems.push("channel with no fuel".to_string());
        }
        AbilityEffect::Channel { .. } if !ability.holds_turn_open => {
            problems.push("channel must hold the turn open".to_string());
        }
        _ => {}
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_test_utils::fixtures::session_with;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn catalog_ron(catalog: &AbilityCatalog) -> String {
        ron::ser::to_string_pretty(catalog, ron::ser::PrettyConfig::default()).unwrap()
    }

    #[test]
    fn test_standard_catalog_is_clean() {
        assert!(check_catalog(&AbilityCatalog::standard()).is_empty());
    }

    #[test]
    fn test_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "abilities.ron", &catalog_ron(&AbilityCatalog::standard()));
        std::fs::create_dir(dir.path().join("rosters")).unwrap();
        let session = session_with(&[2, 2], &["punch", "grenade"]);
        write(
            &dir.path().join("rosters"),
            "two_v_two.ron",
            &session.to_ron_string().unwrap(),
        );
        write(dir.path(), "notes.txt", "ignored");

        let report = validate_data_directory(dir.path()).unwrap();
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.catalogs, 1);
        assert_eq!(report.sessions, 1);
    }

    #[test]
    fn test_bad_charge_and_duplicates() {
        let mut catalog = AbilityCatalog::standard();
        catalog.abilities.push(
            AbilityDef::new("grenade", "Grenade Again", AbilityEffect::Strike { damage: 1 })
                .with_charge(20.0, 10.0, 0.0),
        );
        let problems = check_catalog(&catalog);
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("duplicate")));
        assert!(problems.iter().any(|p| p.contains("min")));
        assert!(problems.iter().any(|p| p.contains("speed")));
    }

    #[test]
    fn test_channel_must_hold() {
        let catalog = AbilityCatalog {
            abilities: vec![AbilityDef::new(
                "jetpack",
                "Jetpack",
                AbilityEffect::Channel { fuel_ticks: 10 },
            )],
        };
        assert_eq!(check_catalog(&catalog).len(), 1);
    }

    #[test]
    fn test_session_checked_against_directory_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = AbilityCatalog {
            abilities: vec![AbilityDef::new(
                "punch",
                "Punch",
                AbilityEffect::Strike { damage: 12 },
            )],
        };
        write(dir.path(), "abilities.ron", &catalog_ron(&catalog));
        let session = session_with(&[1, 1], &["punch", "gun"]);
        write(dir.path(), "duel.ron", &session.to_ron_string().unwrap());

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("gun"));
    }

    #[test]
    fn test_unparseable_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.ron", "(teams: [");
        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].to_string().contains("broken.ron"));
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            validate_data_directory(Path::new("no/such/dir")),
            Err(ValidateError::NotFound(_))
        ));
    }
}
