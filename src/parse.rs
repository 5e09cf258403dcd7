use csv::{ReaderBuilder, StringRecord};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::dataset::{Dataset, DEFAULT_SEED};
use crate::error::{KnnError, Result};

/// Leading columns read as features. The label is always the last column.
pub const FEATURE_COLUMNS: usize = 4;
pub const MIN_COLUMNS: usize = FEATURE_COLUMNS + 1;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub seed: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            seed: DEFAULT_SEED,
        }
    }
}

pub fn load(file_path: impl AsRef<Path>) -> Result<Dataset> {
    load_with(file_path, LoadOptions::default())
}

pub fn load_with(file_path: impl AsRef<Path>, options: LoadOptions) -> Result<Dataset> {
    let file = File::open(file_path.as_ref())?;
    debug!(path = %file_path.as_ref().display(), "loading dataset");

    from_reader(BufReader::new(file), options)
}

/// Reads a headered table, then shuffles the records with `options.seed`.
/// Empty fields are missing values; a missing feature becomes `NaN`.
pub fn from_reader<R: Read>(source: R, options: LoadOptions) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_reader(source);

    let width = reader.headers()?.len();
    if width < MIN_COLUMNS {
        return Err(KnnError::format(format!(
            "expected at least {MIN_COLUMNS} columns, found {width}"
        )));
    }

    let mut values = Vec::new();
    let mut labels = Vec::new();
    let mut missing = 0;

    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);

        let label = record
            .get(width - 1)
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .ok_or_else(|| KnnError::format(format!("line {line}: missing label")))?;

        for (column, field) in record.iter().take(FEATURE_COLUMNS).enumerate() {
            let value = parse_feature(field).map_err(|reason| {
                KnnError::format(format!("line {line}, column {column}: {reason}"))
            })?;
            if value.is_nan() {
                missing += 1;
            }
            values.push(value);
        }

        labels.push(label.to_owned());
    }

    if missing > 0 {
        warn!(missing, "dataset contains missing feature values");
    }

    let features = Array2::from_shape_vec((labels.len(), FEATURE_COLUMNS), values)
        .map_err(|e| KnnError::format(e.to_string()))?;

    let dataset = Dataset::new(features, labels)?.shuffled(options.seed);
    debug!(records = dataset.len(), seed = options.seed, "dataset loaded");

    Ok(dataset)
}

fn parse_feature(field: &str) -> std::result::Result<f64, String> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(f64::NAN);
    }

    match field.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(f64::NAN),
        Ok(value) => Ok(value),
        Err(_) => Err(format!("'{field}' is not a number")),
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRIS: &str = "\
sepal_length,sepal_width,petal_length,petal_width,species
5.1,3.5,1.4,0.2,setosa
4.9,3.0,1.4,0.2,setosa
7.0,3.2,4.7,1.4,versicolor
6.4,3.2,4.5,1.5,versicolor
6.3,3.3,6.0,2.5,virginica
";

    fn read(data: &str) -> Result<Dataset> {
        from_reader(data.as_bytes(), LoadOptions::default())
    }

    #[test]
    fn loads_features_and_labels() {
        let dataset = read(IRIS).unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.n_features(), FEATURE_COLUMNS);

        let mut labels = dataset.labels().to_vec();
        labels.sort();
        assert_eq!(
            labels,
            ["setosa", "setosa", "versicolor", "versicolor", "virginica"]
        );

        let virginica = dataset
            .labels()
            .iter()
            .position(|label| label == "virginica")
            .unwrap();
        assert_eq!(
            dataset.features().row(virginica).to_vec(),
            vec![6.3, 3.3, 6.0, 2.5]
        );
    }

    #[test]
    fn label_comes_from_last_column() {
        let data = "a,b,c,d,extra,label\n1,2,3,4,ignored,x\n";
        let dataset = read(data).unwrap();

        assert_eq!(dataset.labels(), ["x"]);
        assert_eq!(dataset.features().row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn load_order_is_deterministic() {
        let first = read(IRIS).unwrap();
        let second = read(IRIS).unwrap();

        assert_eq!(first.labels(), second.labels());
        assert_eq!(first.features(), second.features());
    }

    #[test]
    fn quoted_empty_fields_are_missing() {
        let data = "a,b,c,d,label\n1,\"\",3,,x\n";
        let dataset = read(data).unwrap();
        let row = dataset.features().row(0).to_vec();

        assert!((row[0] - 1.0).abs() < f64::EPSILON);
        assert!(row[1].is_nan());
        assert!((row[2] - 3.0).abs() < f64::EPSILON);
        assert!(row[3].is_nan());
    }

    #[test]
    fn signed_nan_tokens_are_plain_missing_values() {
        let data = "a,b,c,d,label\n-nan,NaN,-NaN,1,x\n";
        let dataset = read(data).unwrap();
        let row = dataset.features().row(0).to_vec();

        for value in &row[..3] {
            assert!(value.is_nan());
            assert!(value.is_sign_positive());
        }
    }

    #[test]
    fn rejects_narrow_tables() {
        let result = read("a,b,c,label\n1,2,3,x\n");
        assert!(matches!(result, Err(KnnError::Format(_))));
    }

    #[test]
    fn rejects_non_numeric_features() {
        let result = read("a,b,c,d,label\n1,two,3,4,x\n");
        assert!(matches!(result, Err(KnnError::Format(_))));
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = read("a,b,c,d,label\n1,2,3,4,x\n1,2,3,x\n");
        assert!(matches!(result, Err(KnnError::Format(_))));
    }

    #[test]
    fn rejects_missing_labels() {
        let result = read("a,b,c,d,label\n1,2,3,4,\n");
        assert!(matches!(result, Err(KnnError::Format(_))));
    }

    #[test]
    fn honours_custom_delimiter() {
        let options = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let dataset = from_reader("a;b;c;d;label\n1;2;3;4;x\n".as_bytes(), options).unwrap();

        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load("does/not/exist.csv");
        assert!(matches!(result, Err(KnnError::Io(_))));
    }
}
