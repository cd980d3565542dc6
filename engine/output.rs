//! Serialization of per-entity results as an `id,sum` table.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write result CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error while writing results: {0}")]
    Io(#[from] std::io::Error),
}

/// One output row. Field names are the CSV header.
#[derive(Debug, Serialize)]
struct ResultRecord {
    id: usize,
    sum: usize,
}

/// Writes `results[i]` as the `sum` of entity `id = i + 1`, with a header row.
pub fn write_results_to<W: Write>(writer: W, results: &[usize]) -> Result<(), OutputError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (index, &sum) in results.iter().enumerate() {
        csv_writer.serialize(ResultRecord { id: index + 1, sum })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_results(path: &Path, results: &[usize]) -> Result<(), OutputError> {
    let file = BufWriter::new(File::create(path)?);
    write_results_to(file, results)?;
    log::info!("Wrote {} results to '{}'", results.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_are_written_with_header_and_one_based_ids() {
        let mut buffer = Vec::new();
        write_results_to(&mut buffer, &[0, 9, 16]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "id,sum\n1,0\n2,9\n3,16\n");
    }

    #[test]
    fn write_results_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy_benchmark.csv");
        write_results(&path, &[4, 0]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,sum\n1,4\n2,0\n");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("out.csv");
        let err = write_results(&path, &[1]).unwrap_err();
        assert!(matches!(err, OutputError::Io(_)), "got {err:?}");
    }
}
