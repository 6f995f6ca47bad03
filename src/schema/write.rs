use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Serialize;
use std::{io::Write, path::Path};
use tempfile::NamedTempFile;

/// Write `batch` to `path` as Snappy-compressed Parquet.
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(batch).context("writing batch to parquet")?;
        writer.close().context("closing parquet writer")?;
        Ok(())
    })
}

/// Write `batch` to `path` as CSV with a header row; nulls are empty cells.
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(batch).context("writing batch to csv")?;
        Ok(())
    })
}

/// Pretty-printed JSON with a trailing newline.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    write_atomic(path, |mut file| {
        serde_json::to_writer_pretty(&mut file, value).context("serializing JSON")?;
        file.write_all(b"\n")?;
        Ok(())
    })
}

/// Write into a temp file beside `path`, then persist it over `path`.
fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut std::fs::File) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    fill(tmp.as_file_mut()).with_context(|| format!("writing {}", path.display()))?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path)
        .with_context(|| format!("persisting {}", path.display()))?;
    Ok(())
}
