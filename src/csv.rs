use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::{Amount, RawAmount, RawRequest};

/// Errors that can occur when reading or writing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("failed to write balances: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush balances: {0}")]
    Flush(#[from] io::Error),
}

/// Every column is read as text; the validator decides what is acceptable.
#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: Option<String>,
    user: Option<String>,
    key: Option<String>,
    amount: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    user: &'a str,
    balance: String,
}

impl From<InputRow> for RawRequest {
    fn from(row: InputRow) -> Self {
        RawRequest {
            user_id: row.user,
            amount: row.amount.map(RawAmount::Text),
            kind: row.r#type,
            idempotent_key: row.key,
        }
    }
}

/// Read requests from a csv file with a `type,user,key,amount` header
pub fn read_requests(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<RawRequest, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            Ok(RawRequest::from(row))
        }))
}

/// Write user balances in csv format
pub fn write_balances<'a>(
    writer: impl io::Write,
    balances: impl IntoIterator<Item = (&'a str, Amount)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (user, balance) in balances {
        writer.serialize(OutputRow {
            user,
            balance: balance.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read(content: &str) -> Vec<Result<RawRequest, CsvError>> {
        let file = write_csv(content);
        read_requests(file.path()).unwrap().collect()
    }

    #[test]
    fn read_credit() {
        let results = read("type,user,key,amount\ncredit,u1,k1,10.5\n");
        assert_eq!(results.len(), 1);

        let request = results.into_iter().next().unwrap().unwrap();
        assert_eq!(request, RawRequest::credit("u1", "10.5", "k1"));
    }

    #[test]
    fn read_with_whitespace() {
        let results = read("type, user, key, amount\ndebit, u2 , k3, 5.25\n");
        let request = results.into_iter().next().unwrap().unwrap();
        assert_eq!(request, RawRequest::debit("u2", "5.25", "k3"));
    }

    #[test]
    fn empty_fields_are_missing() {
        let results = read("type,user,key,amount\ncredit,,k1,\n");
        let request = results.into_iter().next().unwrap().unwrap();
        assert_eq!(request.user_id, None);
        assert_eq!(request.amount, None);
        assert_eq!(request.idempotent_key.as_deref(), Some("k1"));
    }

    #[test]
    fn malformed_amount_is_left_to_the_validator() {
        let results = read("type,user,key,amount\ncredit,u1,k1,notanumber\n");
        let request = results.into_iter().next().unwrap().unwrap();
        assert_eq!(
            request.amount,
            Some(RawAmount::Text("notanumber".to_string()))
        );
    }

    #[test]
    fn read_returns_error_for_short_row() {
        let results = read("type,user,key,amount\ncredit,u1,k1,1\ncredit,u1\n");
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::Parse { line: 3, .. }));
    }

    #[test]
    fn open_missing_file_fails() {
        let result = read_requests("/definitely/not/here.csv");
        assert!(matches!(result, Err(CsvError::Open { .. })));
    }

    #[test]
    fn write_balances_formats_rows() {
        let mut out = Vec::new();
        write_balances(
            &mut out,
            [
                ("u1", Amount::from_units(120)),
                ("u2", "125.5".parse().unwrap()),
                ("u3", "0.00015".parse().unwrap()),
            ],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "user,balance\nu1,120\nu2,125.5\nu3,0.00015\n"
        );
    }
}
