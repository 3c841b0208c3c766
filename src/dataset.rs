// 📂 Dataset Store - Crawl export tables
// Holds the CSV exports of a site crawl, keyed by file name. Pure data:
// the metric engine reads these, nothing ever mutates them after load.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Every crawl export file the engine knows how to use. Each is optional;
/// a missing file simply means the calculations keyed to it report 0.
pub const DATASET_FILES: [&str; 14] = [
    "internal_all.csv",
    "external_all.csv",
    "response_codes_all.csv",
    "page_titles_all.csv",
    "meta_descriptions_all.csv",
    "h1_all.csv",
    "h2_all.csv",
    "images_all.csv",
    "canonical_all.csv",
    "directives_all.csv",
    "structured_data_all.csv",
    "sitemap_all.csv",
    "redirect_chains_all.csv",
    "redirect_loops_all.csv",
];

// ============================================================================
// DATASET
// ============================================================================

/// One loaded table: the exact headers the crawler wrote, plus rows of
/// cells aligned to those headers. An expected column being absent is a
/// normal state, not an error.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(name: &str, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        Dataset {
            name: name.to_string(),
            columns,
            column_index,
            rows,
        }
    }

    /// Load a dataset from a crawl export CSV.
    pub fn from_csv(name: &str, path: &Path) -> Result<Self> {
        use csv::ReaderBuilder;

        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header row")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (line_num, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", line_num + 2, name)
            })?;

            // Pad short records so every row aligns to the header width
            let mut row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Dataset::new(name, columns, rows))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    /// Cell value at (row, column index). Empty cells read as None, the
    /// same way the crawler's empty fields behave as missing data.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        let raw = self.rows.get(row)?.get(col)?;
        if raw.is_empty() {
            None
        } else {
            Some(raw.as_str())
        }
    }

    /// Cell value parsed as a number, if present and numeric.
    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.value(row, col)?.trim().parse().ok()
    }
}

// ============================================================================
// DATASET STORE
// ============================================================================

/// All datasets loaded for one run. Built once, then passed by reference
/// through the metric engine and the report updater.
#[derive(Debug, Default)]
pub struct DatasetStore {
    datasets: HashMap<String, Dataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        DatasetStore::default()
    }

    /// Probe the data folder for every known crawl export and load the ones
    /// that exist. A file that fails to parse is logged and skipped; the
    /// run continues with whatever loaded cleanly.
    pub fn load_from_dir(dir: &Path) -> Self {
        let mut store = DatasetStore::new();

        for file_name in DATASET_FILES {
            let path = dir.join(file_name);
            if !path.exists() {
                debug!(file = file_name, "dataset not found (optional)");
                continue;
            }

            match Dataset::from_csv(file_name, &path) {
                Ok(dataset) => {
                    debug!(
                        file = file_name,
                        rows = dataset.row_count(),
                        "loaded dataset"
                    );
                    store.insert(dataset);
                }
                Err(err) => {
                    warn!(file = file_name, error = %err, "failed to load dataset, skipping");
                }
            }
        }

        store
    }

    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
