//! Reads the messages and categories CSV inputs and joins them on the shared key.

use crate::constants;
use crate::dataset::{ColumnType, Dataset};
use crate::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub const MESSAGES_DATASET: &str = "messages";
pub const CATEGORIES_DATASET: &str = "categories";

/// Inner-joins the two inputs on a key column
pub struct Loader {
    join_key: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(constants::ID_COLUMN)
    }
}

impl Loader {
    pub fn new(join_key: impl Into<String>) -> Self {
        Self {
            join_key: join_key.into(),
        }
    }

    /// Read both inputs and join them
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(&self, messages_path: P, categories_path: Q) -> Result<Dataset> {
        let messages = read_csv(messages_path)?;
        let categories = read_csv(categories_path)?;
        self.join(messages, categories)
    }

    /// Inner join keeping messages row order, then categories row order per match.
    /// Duplicate keys on either side multiply rows.
    #[instrument(skip_all, fields(key = %self.join_key))]
    pub fn join(&self, messages: Dataset, categories: Dataset) -> Result<Dataset> {
        let left_key = self.key_index(&messages, MESSAGES_DATASET)?;
        let right_key = self.key_index(&categories, CATEGORIES_DATASET)?;

        let left_names: HashSet<&str> = messages.columns.iter().map(String::as_str).collect();
        let right_names: HashSet<&str> = categories.columns.iter().map(String::as_str).collect();

        let mut columns = Vec::with_capacity(messages.columns.len() + categories.columns.len() - 1);
        for (i, name) in messages.columns.iter().enumerate() {
            if i != left_key && right_names.contains(name.as_str()) {
                columns.push(format!("{}{}", name, constants::LEFT_SUFFIX));
            } else {
                columns.push(name.clone());
            }
        }
        for (i, name) in categories.columns.iter().enumerate() {
            if i == right_key {
                continue;
            }
            if left_names.contains(name.as_str()) {
                columns.push(format!("{}{}", name, constants::RIGHT_SUFFIX));
            } else {
                columns.push(name.clone());
            }
        }

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in categories.rows.iter().enumerate() {
            let key = &row[right_key];
            if key.is_null() {
                continue;
            }
            index.entry(key.to_string()).or_default().push(i);
        }

        let mut joined = Dataset::new(columns);
        let mut unmatched = 0usize;
        for left_row in messages.rows {
            let key = &left_row[left_key];
            let matches = if key.is_null() {
                None
            } else {
                index.get(&key.to_string())
            };
            let Some(matches) = matches else {
                unmatched += 1;
                continue;
            };
            for &ri in matches {
                let mut row = left_row.clone();
                row.extend(
                    categories.rows[ri]
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != right_key)
                        .map(|(_, v)| v.clone()),
                );
                joined.rows.push(row);
            }
        }

        if unmatched > 0 {
            debug!("{} messages rows had no matching categories row", unmatched);
        }
        info!("Joined {} rows on '{}'", joined.len(), self.join_key);
        crate::metrics::loader::rows_joined(joined.len());
        Ok(joined)
    }

    fn key_index(&self, dataset: &Dataset, name: &str) -> Result<usize> {
        dataset
            .column_index(&self.join_key)
            .ok_or_else(|| EtlError::MissingColumn {
                dataset: name.to_string(),
                column: self.join_key.clone(),
            })
    }
}

/// Read-and-join with the default `id` key
pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(messages_path: P, categories_path: Q) -> Result<Dataset> {
    Loader::default().load(messages_path, categories_path)
}

/// Read a headed CSV file into a typed [`Dataset`]
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let csv_err = |source: csv::Error| EtlError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(EtlError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for record in reader.records() {
        raw.push(record.map_err(csv_err)?);
    }

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|i| ColumnType::infer(raw.iter().map(|r| r.get(i).unwrap_or(""))))
        .collect();

    let mut dataset = Dataset::new(headers);
    dataset.rows = raw
        .iter()
        .map(|record| {
            types
                .iter()
                .enumerate()
                .map(|(i, ty)| ty.parse(record.get(i).unwrap_or("")))
                .collect()
        })
        .collect();

    if dataset.is_empty() {
        warn!("{} has a header but no rows", path.display());
    }
    info!("Read {} rows from {}", dataset.len(), path.display());
    crate::metrics::loader::rows_read(dataset.len());
    Ok(dataset)
}
