//! Tab-separated numeric text files

use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use std::fs;
use std::path::Path;

/// Parse rows of tab-separated numbers, skipping blank lines
fn parse_rows(path: &Path, content: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .trim_end_matches('\t')
            .split('\t')
            .enumerate()
            .map(|(column, token)| {
                token.trim().parse::<f64>().map_err(|_| BenchError::Parse {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    column: column + 1,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| BenchError::io(path, e))
}

/// Read a sample matrix; every row must have the same width
pub fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let rows = parse_rows(path, &read(path)?)?;
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(BenchError::Shape(format!(
            "{:?}: row {} has {} values, expected {}",
            path,
            i + 1,
            row.len(),
            n_cols
        )));
    }
    let values: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| BenchError::Shape(format!("{:?}: {}", path, e)))
}

/// Read a label file in any row/column layout as class ids below `n_classes`
pub fn read_labels(path: &Path, n_classes: usize) -> Result<Array1<usize>> {
    let values: Vec<f64> = parse_rows(path, &read(path)?)?.into_iter().flatten().collect();
    labels_from_values(&values, n_classes)
}

/// Convert float label tokens to class ids
pub fn labels_from_values(values: &[f64], n_classes: usize) -> Result<Array1<usize>> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let reason = if !value.is_finite() || value.fract() != 0.0 {
                Some("not a whole number".to_string())
            } else if value < 0.0 {
                Some("negative class id".to_string())
            } else if value >= n_classes as f64 {
                Some(format!("class id must be below {}", n_classes))
            } else {
                None
            };
            match reason {
                Some(reason) => Err(BenchError::InvalidLabel {
                    index,
                    value,
                    reason,
                }),
                None => Ok(value as usize),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_matrix_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        fs::write(&path, "1\t2\t3\n\n4\t5\t6\r\n").unwrap();
        let m = read_matrix(&path).unwrap();
        assert_eq!(m.dim(), (2, 3));
        assert_eq!(m[(1, 2)], 6.0);
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        fs::write(&path, "1\t2\n3\n").unwrap();
        assert!(matches!(read_matrix(&path), Err(BenchError::Shape(_))));
    }

    #[test]
    fn test_parse_error_reports_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        fs::write(&path, "1\t2\n3\tabc\n").unwrap();
        match read_matrix(&path) {
            Err(BenchError::Parse { line, column, token, .. }) => {
                assert_eq!((line, column), (2, 2));
                assert_eq!(token, "abc");
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.dim())),
        }
    }

    #[test]
    fn test_labels_flattened_and_validated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("l.txt");
        fs::write(&path, "0.0\t1.0\t2.0\n1.0\n").unwrap();
        assert_eq!(read_labels(&path, 3).unwrap().to_vec(), vec![0, 1, 2, 1]);
        assert!(matches!(
            read_labels(&path, 2),
            Err(BenchError::InvalidLabel { index: 2, .. })
        ));
        assert!(labels_from_values(&[0.5], 2).is_err());
        assert!(labels_from_values(&[-1.0], 2).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_matrix(&dir.path().join("absent.txt")),
            Err(BenchError::Io { .. })
        ));
    }
}
