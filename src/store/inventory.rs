//! Per-branch inventory tables - one CSV file per branch

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

/// Header row written at the top of every branch file.
pub const CSV_HEADER: &str = "Barcode,Quantity";

/// One (barcode, quantity) row in a branch's table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub barcode: String,
    pub quantity: u64,
}

/// A branch's full inventory table, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryTable {
    pub entries: Vec<InventoryEntry>,
}

impl InventoryTable {
    /// Find an entry by (already trimmed) barcode
    pub fn get(&self, barcode: &str) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| e.barcode == barcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether an upsert created a new entry or overwrote an existing one.
/// Advisory only - storage semantics are identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown branch: {0}")]
    UnknownBranch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Barcode not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Corrupt table {path} (line {line}): {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Inventory store operations
///
/// Durable mapping from branch name to a (barcode -> quantity) table.
/// Every mutation rewrites the branch file in full; there is no log or
/// versioning, the file is always the latest snapshot.
#[derive(Clone)]
pub struct InventoryStore {
    dir: PathBuf,
    branches: Vec<String>,
}

impl InventoryStore {
    pub fn new(dir: impl Into<PathBuf>, branches: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            branches,
        }
    }

    /// The configured branch set, in configuration order
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Ensure the data directory exists and every configured branch has a
    /// table file. Existing files are left untouched, so this is safe to
    /// call on every startup.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        for branch in &self.branches {
            let path = self.table_path(branch);
            if !path.exists() {
                fs::write(&path, format!("{}\n", CSV_HEADER))?;
                info!(branch = %branch, path = %path.display(), "created empty branch table");
            }
        }

        Ok(())
    }

    /// Load the persisted table for a branch. A missing file is a valid
    /// empty state, not an error.
    pub fn load(&self, branch: &str) -> Result<InventoryTable, StoreError> {
        let path = self.branch_file(branch)?;

        if !path.exists() {
            return Ok(InventoryTable::default());
        }

        let contents = fs::read_to_string(&path)?;
        parse_table(&contents, &path)
    }

    /// Insert a new entry or overwrite the quantity of an existing one,
    /// keyed by trimmed barcode. Persists the full table before returning.
    pub fn upsert(
        &self,
        branch: &str,
        barcode: &str,
        quantity: i64,
    ) -> Result<(UpsertOutcome, InventoryTable), StoreError> {
        let path = self.branch_file(branch)?;
        let barcode = normalize_barcode(barcode)?;
        let quantity = validate_quantity(quantity)?;

        let mut table = self.load(branch)?;

        let outcome = match table.entries.iter_mut().find(|e| e.barcode == barcode) {
            Some(entry) => {
                entry.quantity = quantity;
                UpsertOutcome::Updated
            }
            None => {
                table.entries.push(InventoryEntry {
                    barcode: barcode.clone(),
                    quantity,
                });
                UpsertOutcome::Created
            }
        };

        self.persist(&path, &table)?;
        info!(branch = %branch, barcode = %barcode, quantity, ?outcome, "upserted entry");

        Ok((outcome, table))
    }

    /// Remove the entry matching the trimmed barcode and persist. An absent
    /// barcode is reported as `NotFound` with no state change.
    pub fn delete(&self, branch: &str, barcode: &str) -> Result<InventoryTable, StoreError> {
        let path = self.branch_file(branch)?;
        let barcode = barcode.trim();

        let mut table = self.load(branch)?;

        let before = table.entries.len();
        table.entries.retain(|e| e.barcode != barcode);

        if table.entries.len() == before {
            return Err(StoreError::NotFound(barcode.to_string()));
        }

        self.persist(&path, &table)?;
        info!(branch = %branch, barcode = %barcode, "deleted entry");

        Ok(table)
    }

    /// Current quantity for a barcode, or `None` when absent. Pure read;
    /// lets the caller decide whether to confirm before overwriting.
    pub fn lookup(&self, branch: &str, barcode: &str) -> Result<Option<u64>, StoreError> {
        let table = self.load(branch)?;
        Ok(table.get(barcode.trim()).map(|e| e.quantity))
    }

    fn persist(&self, path: &Path, table: &InventoryTable) -> Result<(), StoreError> {
        fs::write(path, export_csv(table))?;
        debug!(path = %path.display(), entries = table.len(), "persisted table snapshot");
        Ok(())
    }

    /// Resolve a branch name to its table file, rejecting names outside the
    /// configured set.
    fn branch_file(&self, branch: &str) -> Result<PathBuf, StoreError> {
        if !self.branches.iter().any(|b| b == branch) {
            return Err(StoreError::UnknownBranch(branch.to_string()));
        }
        Ok(self.table_path(branch))
    }

    fn table_path(&self, branch: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", branch))
    }
}

/// Serialize a table to the two-column CSV format. Pure function of the
/// table; the same bytes go to disk and to export downloads.
pub fn export_csv(table: &InventoryTable) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + table.len() * 16);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for entry in &table.entries {
        out.push_str(&entry.barcode);
        out.push(',');
        out.push_str(&entry.quantity.to_string());
        out.push('\n');
    }
    out
}

/// Suggested download name for a branch's export
pub fn export_file_name(branch: &str) -> String {
    format!("{}_inventory.csv", branch)
}

fn parse_table(contents: &str, path: &Path) -> Result<InventoryTable, StoreError> {
    let corrupt = |line: usize, reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = contents.lines().enumerate();

    match lines.next() {
        Some((_, header)) if header.trim_end_matches('\r') == CSV_HEADER => {}
        Some((_, header)) => {
            return Err(corrupt(
                1,
                format!("expected header '{}', got '{}'", CSV_HEADER, header),
            ))
        }
        // Zero-byte file: treat like a missing one
        None => return Ok(InventoryTable::default()),
    }

    let mut entries = Vec::new();
    for (idx, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let (barcode, quantity) = line
            .split_once(',')
            .ok_or_else(|| corrupt(idx + 1, "missing ',' delimiter".to_string()))?;

        let quantity: u64 = quantity
            .parse()
            .map_err(|_| corrupt(idx + 1, format!("bad quantity '{}'", quantity)))?;

        entries.push(InventoryEntry {
            barcode: barcode.to_string(),
            quantity,
        });
    }

    Ok(InventoryTable { entries })
}

/// Trim the barcode and reject values the flat two-column format cannot
/// hold without quoting.
fn normalize_barcode(barcode: &str) -> Result<String, StoreError> {
    let barcode = barcode.trim();
    if barcode.is_empty() {
        return Err(StoreError::InvalidInput(
            "barcode must not be empty".to_string(),
        ));
    }
    if barcode.contains([',', '\n', '\r']) {
        return Err(StoreError::InvalidInput(
            "barcode must not contain commas or line breaks".to_string(),
        ));
    }
    Ok(barcode.to_string())
}

fn validate_quantity(quantity: i64) -> Result<u64, StoreError> {
    if quantity < 1 {
        return Err(StoreError::InvalidInput(
            "quantity must be a positive integer".to_string(),
        ));
    }
    Ok(quantity as u64)
}
