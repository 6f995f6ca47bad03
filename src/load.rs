// src/load.rs

use arrow::{
    array::{ArrayRef, StringArray},
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use calamine::{open_workbook_auto, Data, Reader};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    io::{self, Cursor, Read},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::SourceError;
use crate::process::raw_table::RawTable;
use crate::process::utils::clean_str;
use crate::sources::SourceSlot;

const BOM: &[u8] = b"\xEF\xBB\xBF";
const BUNDLE_PREALLOC_CAP: u64 = 16 * 1024 * 1024;

/// The raw inputs of one pipeline run: a table or a load failure per slot.
#[derive(Debug, Default)]
pub struct SourceSet {
    tables: BTreeMap<SourceSlot, RawTable>,
    failures: BTreeMap<SourceSlot, SourceError>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of loading `slot`; a later insert replaces an earlier one.
    pub fn insert(&mut self, slot: SourceSlot, loaded: Result<RawTable, SourceError>) {
        match loaded {
            Ok(table) => {
                self.failures.remove(&slot);
                self.tables.insert(slot, table);
            }
            Err(e) => {
                self.tables.remove(&slot);
                self.failures.insert(slot, e);
            }
        }
    }

    pub fn with(mut self, slot: SourceSlot, table: RawTable) -> Self {
        self.insert(slot, Ok(table));
        self
    }

    pub fn contains(&self, slot: SourceSlot) -> bool {
        self.tables.contains_key(&slot) || self.failures.contains_key(&slot)
    }

    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<SourceSlot, RawTable>,
        BTreeMap<SourceSlot, SourceError>,
    ) {
        (self.tables, self.failures)
    }
}

/// Parse CSV bytes with a header row into an all-`Utf8` table.
///
/// - a UTF-8 BOM is stripped
/// - blank header names become `column_<n>`, duplicates get a `_<n>` suffix
/// - short rows are padded with nulls
pub fn read_csv(name: &str, bytes: &[u8]) -> Result<RawTable, SourceError> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    if let Err(e) = std::str::from_utf8(bytes) {
        return Err(SourceError::malformed(name, format!("not UTF-8 text: {}", e)));
    }

    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), Some(0))?;
    if inferred.fields().is_empty() {
        return Err(SourceError::malformed(name, "no header row"));
    }

    let schema = utf8_schema(inferred.fields().iter().map(|f| f.name().as_str()));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_truncated_rows(true)
        .build(Cursor::new(bytes))?;
    let mut batches = reader.collect::<Result<Vec<RecordBatch>, _>>()?;
    if batches.is_empty() {
        batches.push(RecordBatch::new_empty(schema));
    }

    let table = RawTable::from_batches(name, &batches)?;
    debug!(
        source = name,
        rows = table.num_rows(),
        columns = ?table.headers(),
        "read csv"
    );
    Ok(table)
}

/// All-`Utf8` schema over cleaned header names: blank names become
/// `column_<n>`, duplicates get a `_<n>` suffix.
fn utf8_schema<'a>(names: impl IntoIterator<Item = &'a str>) -> SchemaRef {
    let mut seen = HashSet::new();
    let fields: Vec<Field> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let mut header = clean_str(name);
            if header.is_empty() {
                header = format!("column_{}", i + 1);
            }
            let mut unique = header.clone();
            let mut n = 2;
            while !seen.insert(unique.clone()) {
                unique = format!("{}_{}", header, n);
                n += 1;
            }
            Field::new(unique, DataType::Utf8, true)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Text of one worksheet cell; empty and error cells are null.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Read the first worksheet of an Excel workbook into an all-`Utf8` table.
/// The first row is the header; short rows are padded with nulls.
pub fn read_workbook(path: &Path) -> Result<RawTable, SourceError> {
    let name = path.display().to_string();
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SourceError::malformed(&name, "workbook has no sheets"))?;
    let range = workbook.worksheet_range(&sheet)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(SourceError::malformed(&name, "no header row"));
    };
    let header_text: Vec<String> = header
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    let schema = utf8_schema(header_text.iter().map(String::as_str));

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header_text.len()];
    for row in rows {
        for (j, column) in columns.iter_mut().enumerate() {
            column.push(row.get(j).and_then(cell_text));
        }
    }
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema, arrays)?;

    let table = RawTable::from_batches(&name, &[batch])?;
    debug!(
        source = %name,
        sheet = %sheet,
        rows = table.num_rows(),
        columns = ?table.headers(),
        "read workbook"
    );
    Ok(table)
}

/// Read every row group of a Parquet file, casting columns to `Utf8`.
pub fn read_parquet(path: &Path) -> Result<RawTable, SourceError> {
    let name = path.display().to_string();
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let mut batches = builder
        .build()?
        .collect::<Result<Vec<RecordBatch>, _>>()?;
    if batches.is_empty() {
        batches.push(RecordBatch::new_empty(schema));
    }
    RawTable::from_batches(&name, &batches)
}

/// Load one file, dispatching on its extension.
pub fn load_path(path: &Path) -> Result<RawTable, SourceError> {
    let name = path.display().to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => read_csv(&name, &fs::read(path)?),
        "parquet" | "pq" => read_parquet(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        other => Err(SourceError::malformed(
            name,
            format!("unsupported format `.{}` (expected csv, parquet or xlsx)", other),
        )),
    }
}

/// Load every file matching `pattern` (sorted) and stack them.
pub fn load_pattern(pattern: &str) -> Result<RawTable, SourceError> {
    let mut paths = glob(pattern)?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(pattern, error = %e, "unreadable glob entry");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    paths.sort();

    match paths.len() {
        0 => Err(SourceError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no file matches `{}`", pattern),
        ))),
        1 => load_path(&paths[0]),
        _ => {
            let tables = paths
                .iter()
                .map(|p| load_path(p))
                .collect::<Result<Vec<_>, _>>()?;
            RawTable::concat(pattern, tables)
        }
    }
}

/// Up-front buffer for a bundle entry. The declared size comes from the
/// archive header and is untrusted.
fn entry_capacity(declared: u64) -> usize {
    declared.min(BUNDLE_PREALLOC_CAP) as usize
}

/// Read a ZIP bundle whose CSV entries are named after source slots.
///
/// Entries that name no slot are skipped; a slot named twice keeps its first entry.
pub fn load_bundle(
    path: &Path,
) -> Result<BTreeMap<SourceSlot, Result<RawTable, SourceError>>, SourceError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut out = BTreeMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let entry_name = entry.name().to_string();
        let entry_path = Path::new(&entry_name);
        let is_csv = entry_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let slot = entry_path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(SourceSlot::from_name);

        let Some(slot) = slot.filter(|_| is_csv) else {
            debug!(entry = %entry_name, "bundle entry names no source, skipped");
            continue;
        };
        if out.contains_key(&slot) {
            warn!(entry = %entry_name, %slot, "duplicate bundle entry, keeping the first");
            continue;
        }

        let mut buf = Vec::with_capacity(entry_capacity(entry.size()));
        let loaded = entry
            .read_to_end(&mut buf)
            .map_err(SourceError::from)
            .and_then(|_| read_csv(&format!("{}:{}", path.display(), entry_name), &buf));
        out.insert(slot, loaded);
    }

    info!(bundle = %path.display(), sources = out.len(), "read source bundle");
    Ok(out)
}

/// Load the configured sources. Explicit paths win over bundle entries; a
/// failure is recorded against its slot and never stops the other slots.
pub fn load_sources(paths: &BTreeMap<SourceSlot, String>, bundle: Option<&Path>) -> SourceSet {
    let mut set = SourceSet::new();

    if let Some(bundle) = bundle {
        match load_bundle(bundle) {
            Ok(entries) => {
                for (slot, loaded) in entries {
                    set.insert(slot, loaded);
                }
            }
            Err(e) => warn!(bundle = %bundle.display(), error = %e, "source bundle unreadable"),
        }
    }

    for (slot, pattern) in paths {
        let loaded = load_pattern(pattern);
        match &loaded {
            Ok(t) => info!(%slot, source = %t.name, rows = t.num_rows(), "loaded source"),
            Err(e) => warn!(%slot, pattern = %pattern, error = %e, "source failed to load"),
        }
        set.insert(*slot, loaded);
    }
    set
}
