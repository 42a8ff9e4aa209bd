//! Decodes the encoded `categories` field into one 0/1 column per category,
//! then removes duplicate rows.
//!
//! The encoded field is a `;`-separated list of `<name>-<digit>` tokens. Column
//! names come from the first row only; every later row is expected to carry the
//! same tokens in the same order.

use crate::config::EtlConfig;
use crate::dataset::{Dataset, Value};
use crate::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>.+)-(?P<value>[0-9])$").expect("valid token pattern"));

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub categories_column: String,
    pub delimiter: char,
    /// Category columns where a value of 2 is folded into 1
    pub binarize_columns: Vec<String>,
    /// Category columns removed after decoding
    pub drop_columns: Vec<String>,
    pub strict_layout: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self::from(&EtlConfig::default())
    }
}

impl From<&EtlConfig> for CleanOptions {
    fn from(config: &EtlConfig) -> Self {
        Self {
            categories_column: config.categories_column.clone(),
            delimiter: config.category_delimiter,
            binarize_columns: config.binarize_columns.clone(),
            drop_columns: config.drop_columns.clone(),
            strict_layout: config.strict_layout,
        }
    }
}

/// What a clean pass did to the dataset
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CleanSummary {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_removed: usize,
    pub values_remapped: usize,
    pub category_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
}

pub struct Transformer {
    options: CleanOptions,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(CleanOptions::default())
    }
}

impl Transformer {
    pub fn new(options: CleanOptions) -> Self {
        Self { options }
    }

    #[instrument(skip_all, fields(rows = joined.len(), strict = self.options.strict_layout))]
    pub fn clean(&self, joined: Dataset) -> Result<(Dataset, CleanSummary)> {
        let cat_idx = joined
            .column_index(&self.options.categories_column)
            .ok_or_else(|| EtlError::MissingColumn {
                dataset: "joined".to_string(),
                column: self.options.categories_column.clone(),
            })?;

        let mut summary = CleanSummary {
            input_rows: joined.len(),
            ..Default::default()
        };

        let decoded = self.decode(&joined, cat_idx)?;
        let names = decoded.names;
        let mut values = decoded.values;

        // Fold every value above 1 into 1. Binarize columns carry a known anomaly,
        // anywhere else it is unexpected and worth a warning.
        for (pos, name) in names.iter().enumerate() {
            let mut remapped = 0usize;
            for row in values.iter_mut() {
                if row[pos] > 1 {
                    row[pos] = 1;
                    remapped += 1;
                }
            }
            if remapped == 0 {
                continue;
            }
            if self.options.binarize_columns.contains(name) {
                debug!("Remapped {} values above 1 to 1 in '{}'", remapped, name);
            } else {
                warn!("Coerced {} out-of-range values to 1 in '{}'", remapped, name);
            }
            crate::metrics::transform::values_remapped(name, remapped);
            summary.values_remapped += remapped;
        }

        let keep: Vec<bool> = names
            .iter()
            .map(|n| !self.options.drop_columns.contains(n))
            .collect();
        for column in &self.options.drop_columns {
            if names.contains(column) {
                summary.dropped_columns.push(column.clone());
            } else if !joined.is_empty() {
                warn!("Category column '{}' not present, nothing to drop", column);
            }
        }

        let mut columns: Vec<String> = joined
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != cat_idx)
            .map(|(_, c)| c.clone())
            .collect();
        let category_columns: Vec<String> = names
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(n, _)| n.clone())
            .collect();
        columns.extend(category_columns.iter().cloned());

        let mut cleaned = Dataset::new(columns);
        cleaned.rows = joined
            .rows
            .into_iter()
            .zip(values)
            .map(|(row, cats)| {
                let mut out: Vec<Value> = row
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i != cat_idx)
                    .map(|(_, v)| v)
                    .collect();
                out.extend(
                    cats.into_iter()
                        .zip(&keep)
                        .filter(|(_, k)| **k)
                        .map(|(v, _)| Value::Integer(i64::from(v))),
                );
                out
            })
            .collect();

        summary.duplicates_removed = drop_duplicates(&mut cleaned);
        summary.output_rows = cleaned.len();
        summary.category_columns = category_columns;

        crate::metrics::transform::duplicates_removed(summary.duplicates_removed);
        crate::metrics::transform::category_columns(summary.category_columns.len());
        info!(
            "Cleaned {} rows into {} ({} duplicates removed, {} category columns)",
            summary.input_rows,
            summary.output_rows,
            summary.duplicates_removed,
            summary.category_columns.len()
        );
        Ok((cleaned, summary))
    }

    /// Split every row's encoded field and decode the trailing digits
    fn decode(&self, joined: &Dataset, cat_idx: usize) -> Result<Decoded> {
        let mut rows = joined.rows.iter().enumerate();
        let Some((_, first)) = rows.next() else {
            warn!("Joined dataset is empty, no category columns to derive");
            return Ok(Decoded {
                names: Vec::new(),
                values: Vec::new(),
            });
        };

        let first_tokens = self.tokens(first, 0, cat_idx)?;
        let names = first_tokens
            .iter()
            .map(|t| self.token_name(t, 0))
            .collect::<Result<Vec<_>>>()?;
        if self.options.strict_layout {
            let mut seen = HashSet::new();
            if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
                return Err(EtlError::Schema(format!("category '{}' appears twice in the first row", dup)));
            }
        }

        let mut values = Vec::with_capacity(joined.len());
        values.push(self.token_values(&first_tokens, &names, 0)?);
        for (row_no, row) in rows {
            let tokens = self.tokens(row, row_no, cat_idx)?;
            values.push(self.token_values(&tokens, &names, row_no)?);
        }

        Ok(Decoded { names, values })
    }

    fn tokens<'a>(&self, row: &'a [Value], row_no: usize, cat_idx: usize) -> Result<Vec<&'a str>> {
        let encoded = row[cat_idx].as_text().ok_or_else(|| {
            EtlError::Schema(format!(
                "row {}: '{}' is not an encoded category string",
                row_no, self.options.categories_column
            ))
        })?;
        Ok(encoded.split(self.options.delimiter).collect())
    }

    /// Category name of a token: the token minus its trailing `-<digit>`
    fn token_name(&self, token: &str, row_no: usize) -> Result<String> {
        if self.options.strict_layout {
            let caps = TOKEN_PATTERN.captures(token).ok_or_else(|| malformed(token, row_no))?;
            return Ok(caps["name"].to_string());
        }
        split_token(token)
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| malformed(token, row_no))
    }

    fn token_values(&self, tokens: &[&str], names: &[String], row_no: usize) -> Result<Vec<u8>> {
        if tokens.len() != names.len() {
            return Err(EtlError::Schema(format!(
                "row {}: expected {} category tokens, found {}",
                row_no,
                names.len(),
                tokens.len()
            )));
        }

        tokens
            .iter()
            .zip(names)
            .map(|(token, expected)| {
                let (name, digit) = split_token(token).ok_or_else(|| malformed(token, row_no))?;
                if self.options.strict_layout && (name != expected || !TOKEN_PATTERN.is_match(token)) {
                    return Err(EtlError::Schema(format!(
                        "row {}: token '{}' does not match category '{}'",
                        row_no, token, expected
                    )));
                }
                digit
                    .to_digit(10)
                    .map(|d| d as u8)
                    .ok_or_else(|| malformed(token, row_no))
            })
            .collect()
    }
}

struct Decoded {
    names: Vec<String>,
    values: Vec<Vec<u8>>,
}

/// Clean with the default options
pub fn clean(joined: Dataset) -> Result<Dataset> {
    Transformer::default().clean(joined).map(|(dataset, _)| dataset)
}

/// Remove rows equal to an earlier row, keeping first occurrences in order.
/// Returns how many rows were removed.
pub fn drop_duplicates(dataset: &mut Dataset) -> usize {
    let before = dataset.rows.len();
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
    dataset.rows.retain(|row| seen.insert(row.clone()));
    before - dataset.rows.len()
}

/// Split a token into everything before its last two characters and its last character
fn split_token(token: &str) -> Option<(&str, char)> {
    let mut chars = token.char_indices().rev();
    let (_, last) = chars.next()?;
    let (cut, _) = chars.next()?;
    Some((&token[..cut], last))
}

fn malformed(token: &str, row_no: usize) -> EtlError {
    EtlError::Schema(format!(
        "row {}: category token '{}' is not of the form <name>-<digit>",
        row_no, token
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn joined(rows: &[(i64, &str, &str)]) -> Dataset {
        Dataset {
            columns: vec!["id".into(), "message".into(), "categories".into()],
            rows: rows
                .iter()
                .map(|(id, msg, cats)| vec![Value::Integer(*id), text(msg), text(cats)])
                .collect(),
        }
    }

    fn lenient() -> Transformer {
        Transformer::new(CleanOptions {
            strict_layout: false,
            ..CleanOptions::default()
        })
    }

    #[test]
    fn test_clean_decodes_remaps_and_drops() {
        let input = joined(&[
            (1, "help", "related-1;request-0;child_alone-0"),
            (2, "water", "related-2;request-1;child_alone-0"),
        ]);

        let (out, summary) = Transformer::default().clean(input).unwrap();
        assert_eq!(out.columns, vec!["id", "message", "related", "request"]);
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Integer(1), text("help"), Value::Integer(1), Value::Integer(0)],
                vec![Value::Integer(2), text("water"), Value::Integer(1), Value::Integer(1)],
            ]
        );
        assert_eq!(summary.values_remapped, 1);
        assert_eq!(summary.dropped_columns, vec!["child_alone".to_string()]);
        assert_eq!(summary.category_columns, vec!["related".to_string(), "request".to_string()]);
    }

    #[test]
    fn test_clean_removes_exact_duplicates_only() {
        let input = joined(&[
            (1, "help", "related-1;request-0"),
            (1, "help", "related-1;request-0"),
            (1, "help", "related-1;request-1"),
        ]);

        let (out, summary) = Transformer::default().clean(input).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(out.rows[1][3], Value::Integer(1));
    }

    #[test]
    fn test_duplicates_after_remap_collapse() {
        // related-2 and related-1 decode to the same row
        let input = joined(&[(5, "fire", "related-1;fire-1"), (5, "fire", "related-2;fire-1")]);

        let (out, _) = Transformer::default().clean(input).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_missing_categories_column() {
        let input = Dataset {
            columns: vec!["id".into(), "message".into()],
            rows: vec![vec![Value::Integer(1), text("help")]],
        };

        let err = Transformer::default().clean(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_non_digit_value_is_schema_error() {
        let input = joined(&[(1, "help", "related-1;request-x")]);
        let err = lenient().clean(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("request-x"));
    }

    #[test]
    fn test_short_token_is_schema_error() {
        let input = joined(&[(1, "help", "related-1;1")]);
        let err = lenient().clean(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_token_count_mismatch_fails_in_both_modes() {
        let rows = [(1, "a", "related-1;request-0"), (2, "b", "related-1")];
        assert!(Transformer::default().clean(joined(&rows)).is_err());
        assert!(lenient().clean(joined(&rows)).is_err());
    }

    #[test]
    fn test_strict_layout_rejects_reordered_names() {
        let rows = [(1, "a", "related-1;request-0"), (2, "b", "request-0;related-1")];

        let err = Transformer::default().clean(joined(&rows)).unwrap_err();
        assert!(err.to_string().contains("does not match category"));

        // Lenient mode trusts the first row's layout
        let (out, _) = lenient().clean(joined(&rows)).unwrap();
        assert_eq!(out.rows[1][2], Value::Integer(0));
        assert_eq!(out.rows[1][3], Value::Integer(1));
    }

    #[test]
    fn test_lenient_strips_last_two_chars() {
        let input = joined(&[(1, "a", "related_1;aid:0")]);
        let (out, _) = lenient().clean(input).unwrap();
        assert_eq!(out.columns[2..], ["related".to_string(), "aid".to_string()]);
    }

    #[test]
    fn test_out_of_range_values_are_coerced_in_any_column() {
        let input = joined(&[(1, "a", "related-1;request-2;child_alone-0"), (2, "b", "related-0;request-7;child_alone-0")]);

        let (out, summary) = Transformer::default().clean(input).unwrap();
        assert_eq!(out.columns, vec!["id", "message", "related", "request"]);
        assert_eq!(out.rows[0][3], Value::Integer(1));
        assert_eq!(out.rows[1][3], Value::Integer(1));
        assert_eq!(summary.values_remapped, 2);
    }

    #[test]
    fn test_empty_dataset_drops_categories_column() {
        let (out, summary) = Transformer::default().clean(joined(&[])).unwrap();
        assert_eq!(out.columns, vec!["id", "message"]);
        assert!(out.is_empty());
        assert!(summary.category_columns.is_empty());
    }

    #[test]
    fn test_drop_duplicates_is_idempotent() {
        let (mut out, _) = Transformer::default()
            .clean(joined(&[(1, "a", "related-1"), (1, "a", "related-1"), (2, "b", "related-0")]))
            .unwrap();
        let snapshot = out.clone();
        assert_eq!(drop_duplicates(&mut out), 0);
        assert_eq!(out, snapshot);
    }

    #[test]
    fn test_split_token_handles_multibyte_names() {
        assert_eq!(split_token("aidé-1"), Some(("aidé", '1')));
        assert_eq!(split_token("x"), None);
    }
}
