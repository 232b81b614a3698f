//! Local Parquet warehouse.
//!
//! Layout: `{root}/{table}/part-NNNNN.parquet`, one file per chunk. A
//! truncating write removes the table directory first.

use super::{conform_to_schema, FieldSchema, Sink, SinkError, WriteDisposition};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    /// Part files of a table in write order.
    pub fn parts(&self, table: &str) -> Result<Vec<PathBuf>, SinkError> {
        Ok(self.indexed_parts(table)?.into_iter().map(|(_, path)| path).collect())
    }

    /// Parts keyed by their numeric index; the zero padding is only cosmetic.
    fn indexed_parts(&self, table: &str) -> Result<Vec<(u64, PathBuf)>, SinkError> {
        let dir = self.table_dir(table);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
        let mut parts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| io_error(&dir, source))?.path();
            if let Some(index) = path.file_name().and_then(|n| n.to_str()).and_then(part_index) {
                parts.push((index, path));
            }
        }
        parts.sort_by_key(|(index, _)| *index);
        Ok(parts)
    }

    /// Read every part back into one frame.
    pub fn read_table(&self, table: &str) -> Result<DataFrame, SinkError> {
        let mut combined: Option<DataFrame> = None;
        for path in self.parts(table)? {
            let file = fs::File::open(&path).map_err(|source| io_error(&path, source))?;
            let df = ParquetReader::new(file).finish()?;
            match combined.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&df)?;
                }
                None => combined = Some(df),
            }
        }
        combined.ok_or_else(|| SinkError::Response(format!("table '{table}' has no parts")))
    }
}

impl Sink for ParquetSink {
    fn name(&self) -> &str {
        "parquet"
    }

    fn write_chunk(
        &self,
        destination: &str,
        chunk: &DataFrame,
        schema: &[FieldSchema],
        disposition: WriteDisposition,
    ) -> Result<(), SinkError> {
        let dir = self.table_dir(destination);
        if disposition == WriteDisposition::Truncate && dir.exists() {
            fs::remove_dir_all(&dir).map_err(|source| io_error(&dir, source))?;
        }
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let index = self
            .indexed_parts(destination)?
            .last()
            .map_or(0, |(last, _)| last + 1);
        let path = dir.join(format!("part-{index:05}.parquet"));
        let mut df = conform_to_schema(chunk, schema)?;
        let file = fs::File::create(&path).map_err(|source| io_error(&path, source))?;
        ParquetWriter::new(file).finish(&mut df)?;

        debug!(path = %path.display(), rows = df.height(), "wrote parquet part");
        Ok(())
    }
}

fn part_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("part-")?
        .strip_suffix(".parquet")?
        .parse()
        .ok()
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::upload_table;

    fn table(start: usize, rows: usize) -> DataFrame {
        let ids: Vec<i64> = (start..start + rows).map(|i| i as i64).collect();
        let values: Vec<Option<f64>> = (0..rows).map(|i| (i % 3 != 0).then_some(i as f64)).collect();
        DataFrame::new(vec![
            Column::new("id".into(), ids),
            Column::new("value".into(), values),
        ])
        .unwrap()
    }

    #[test]
    fn chunked_upload_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let df = table(0, 23);

        assert_eq!(upload_table(&sink, &df, "spy", 10).unwrap(), 3);
        assert_eq!(sink.parts("spy").unwrap().len(), 3);

        let back = sink.read_table("spy").unwrap();
        assert!(back.equals_missing(&df));
    }

    #[test]
    fn parts_are_ordered_numerically_past_five_digits() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let table_dir = sink.table_dir("wide");
        fs::create_dir_all(&table_dir).unwrap();
        for name in ["part-100000.parquet", "part-99999.parquet", "part-00002.parquet", "notes.txt"] {
            fs::write(table_dir.join(name), b"").unwrap();
        }

        let names: Vec<String> = sink
            .parts("wide")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["part-00002.parquet", "part-99999.parquet", "part-100000.parquet"]
        );
    }

    #[test]
    fn append_continues_after_highest_part() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let schema = crate::sink::infer_schema(&table(0, 2));
        sink.write_chunk("t", &table(0, 2), &schema, WriteDisposition::Truncate)
            .unwrap();
        fs::rename(
            sink.table_dir("t").join("part-00000.parquet"),
            sink.table_dir("t").join("part-99999.parquet"),
        )
        .unwrap();
        sink.write_chunk("t", &table(2, 2), &schema, WriteDisposition::Append)
            .unwrap();

        assert!(sink.table_dir("t").join("part-100000.parquet").exists());
        let back = sink.read_table("t").unwrap();
        assert!(back.equals_missing(&table(0, 2).vstack(&table(2, 2)).unwrap()));
    }

    #[test]
    fn truncate_replaces_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        upload_table(&sink, &table(0, 30), "spy", 10).unwrap();
        upload_table(&sink, &table(100, 5), "spy", 10).unwrap();

        let back = sink.read_table("spy").unwrap();
        assert_eq!(back.height(), 5);
        assert_eq!(back.column("id").unwrap().i64().unwrap().get(0), Some(100));
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ParquetSink::new(dir.path()).read_table("nope").is_err());
    }
}
