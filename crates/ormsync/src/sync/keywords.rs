//! Reserved-word check of newly declared identifiers.

use std::collections::HashSet;

use tracing::warn;

use super::diff::SchemaDiff;
use crate::config::KeywordCheck;
use crate::core::identifier::normalize;
use crate::error::{OrmError, Result};

const BUILTIN: &str = include_str!("sql-keywords.txt");

/// Upper-cased union of the built-in SQL-92 list and backend keywords.
pub fn keyword_set<I, S>(catalog_keywords: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words: HashSet<String> = split_keywords(BUILTIN).collect();
    for entry in catalog_keywords {
        words.extend(split_keywords(entry.as_ref()));
    }
    words
}

fn split_keywords(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(normalize)
}

/// Check names of the objects about to be created.
///
/// New tables contribute their name and every column; new columns and new
/// indexes contribute their own names.
pub fn check_keywords(diff: &SchemaDiff, keywords: &HashSet<String>, mode: KeywordCheck) -> Result<()> {
    if mode == KeywordCheck::Off {
        return Ok(());
    }

    let mut names: Vec<(&str, &str)> = Vec::new();
    for table in &diff.new_tables {
        names.push(("table", &table.name));
        names.extend(table.columns.iter().map(|c| ("column", c.name.as_str())));
    }
    names.extend(diff.new_columns.iter().map(|c| ("column", c.column().name.as_str())));
    names.extend(diff.new_indexes.iter().map(|i| ("index", i.index().name.as_str())));

    for (kind, name) in names {
        if !keywords.contains(&normalize(name)) {
            continue;
        }
        match mode {
            KeywordCheck::Error => {
                return Err(OrmError::ReservedWord {
                    kind: kind.to_string(),
                    name: name.to_string(),
                })
            }
            _ => warn!("The database {} name '{}' is a reserved keyword", kind, name),
        }
    }
    Ok(())
}
