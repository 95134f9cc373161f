use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::RuleError;
use crate::rule::Rule;

/// Loads rule documents from a YAML/JSON file or a directory of them.
///
/// Directory entries are read in file-name order and rules keep the order in
/// which they appear. Every rule is validated; the first invalid one is
/// reported with all of its errors.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RuleError::MissingPath(path.display().to_string()));
    }

    let rules = if path.is_dir() {
        load_from_directory(path)?
    } else {
        load_from_file(path)?
    };

    ensure_unique(&rules)?;
    for rule in &rules {
        let errors = rule.validate();
        if !errors.is_empty() {
            return Err(RuleError::Invalid {
                rule_id: rule.id.clone(),
                errors,
            });
        }
    }

    debug!(path = %path.display(), count = rules.len(), "rules loaded");
    Ok(rules)
}

fn load_from_directory(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| RuleError::from_io(path, err))? {
        let entry = entry.map_err(|err| RuleError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| RuleError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }

        let entry_path = entry.path();
        if let Some(ext) = entry_path.extension().and_then(|value| value.to_str()) {
            if matches!(ext, "json" | "yaml" | "yml") {
                files.push(entry_path);
            }
        }
    }
    files.sort();

    let mut rules = Vec::new();
    for file in files {
        rules.append(&mut load_from_file(&file)?);
    }
    Ok(rules)
}

fn load_from_file(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;
    parse_rules(&raw, path)
}

/// Accepts a `{rules: [...]}` document, a bare list or a single rule.
///
/// The document shape picks the target type, so a malformed rule inside a
/// `rules` list is reported as such.
fn parse_rules(raw: &str, path: &Path) -> Result<Vec<Rule>, RuleError> {
    let shape: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|err| RuleError::parse_error(path, err.to_string()))?;

    let parsed = if shape.get("rules").is_some() {
        serde_yaml::from_str::<RuleDocument>(raw).map(|doc| doc.rules)
    } else if shape.is_sequence() {
        serde_yaml::from_str::<Vec<Rule>>(raw)
    } else {
        serde_yaml::from_str::<Rule>(raw).map(|rule| vec![rule])
    };
    parsed.map_err(|err| RuleError::parse_error(path, err.to_string()))
}

fn ensure_unique(rules: &[Rule]) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(RuleError::DuplicateRule {
                id: rule.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    rules: Vec<Rule>,
}
