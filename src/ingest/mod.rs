// src/ingest/mod.rs
//! Input side of the pipeline: gate uploads on their media type and
//! tokenize CSV text into [`RawRow`]s. No semantic validation happens here.

pub mod utils;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{fs, path::Path};
use tracing::{debug, instrument};

use crate::error::ForecastError;
use crate::records::RawRow;
use utils::{clean_str, is_csv_media_type, media_type_for};

/// A user-supplied file, before anything has looked inside it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Read `path` from disk, inferring the media type from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            media_type: media_type_for(&name).to_string(),
            name,
            bytes,
        })
    }
}

/// Accept an upload only if one was given and it claims to be CSV.
/// Returns the decoded text.
pub fn accept_upload(upload: Option<&Upload>) -> Result<String, ForecastError> {
    let upload = upload.ok_or(ForecastError::NoFileSelected)?;
    if !is_csv_media_type(&upload.media_type) {
        return Err(ForecastError::InvalidFileType {
            name: upload.name.clone(),
            media_type: upload.media_type.clone(),
        });
    }
    String::from_utf8(upload.bytes.clone())
        .map_err(|e| ForecastError::ParseFailure(format!("{} is not UTF-8: {}", upload.name, e)))
}

/// Split CSV text into header-keyed rows.
///
/// The first line is the header. Empty lines and rows whose every cell is
/// blank are skipped. When a header name repeats, the first column wins.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn parse_csv(text: &str) -> Result<Vec<RawRow>, ForecastError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ForecastError::ParseFailure(e.to_string()))?
        .iter()
        .map(clean_str)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .map_err(|e| ForecastError::ParseFailure(format!("record {}: {}", idx + 1, e)))?;

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row = RawRow::with_capacity(headers.len());
        for (name, cell) in headers.iter().zip(record.iter()) {
            if name.is_empty() {
                continue;
            }
            row.entry(name.clone()).or_insert_with(|| clean_str(cell));
        }
        rows.push(row);
    }

    debug!(columns = headers.len(), rows = rows.len(), "tokenized CSV");
    Ok(rows)
}

/// [`accept_upload`] followed by [`parse_csv`].
pub fn load_upload(upload: Option<&Upload>) -> Result<Vec<RawRow>, ForecastError> {
    let text = accept_upload(upload)?;
    parse_csv(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_upload(body: &str) -> Upload {
        Upload {
            name: "enrollment.csv".into(),
            media_type: "text/csv".into(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_missing_upload() {
        let err = accept_upload(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFileSelected);
    }

    #[test]
    fn test_non_csv_upload_rejected() {
        let upload = Upload {
            name: "enrollment.xlsx".into(),
            media_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".into(),
            bytes: vec![0x50, 0x4b, 0x03, 0x04],
        };
        let err = accept_upload(Some(&upload)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFileType);
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let upload = Upload {
            bytes: vec![0xff, 0xfe, 0x00],
            ..csv_upload("")
        };
        let err = accept_upload(Some(&upload)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_parse_header_rows() {
        let text = "semester,course code,total number of students enrolled,room\n\
                    2024-1,ITE102,45,A1\n\
                    \n\
                    2024-1, ITE103 ,58,B2\n\
                    ,,,\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["course code"], "ITE102");
        assert_eq!(rows[1]["course code"], "ITE103");
        assert_eq!(rows[1]["total number of students enrolled"], "58");
        assert_eq!(rows[0]["room"], "A1");
    }

    #[test]
    fn test_short_and_long_rows() {
        let text = "semester,course code,total number of students enrolled\n\
                    2024-1,ITE102\n\
                    2024-2,ITE102,40,extra\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].contains_key("total number of students enrolled"));
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let rows = parse_csv("semester,semester\n2024-1,2099-9\n").unwrap();
        assert_eq!(rows[0]["semester"], "2024-1");
    }

    #[test]
    fn test_empty_text_gives_no_rows() {
        assert!(parse_csv("").unwrap().is_empty());
        assert!(parse_csv("semester,course code\n").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_quote_still_tokenizes() {
        // an open quote runs to EOF
        let out = parse_csv("semester,course code\n\"2024-1,ITE102\n");
        assert!(out.is_ok());
    }

    #[test]
    fn test_upload_from_path() -> Result<()> {
        let mut tmp = Builder::new().suffix(".csv").tempfile()?;
        write!(tmp, "SEMESTER,COURSE CODE\n2024-1,ITE102\n")?;

        let upload = Upload::from_path(tmp.path())?;
        assert_eq!(upload.media_type, "text/csv");

        let rows = load_upload(Some(&upload))?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["COURSE CODE"], "ITE102");
        Ok(())
    }

    #[test]
    fn test_upload_from_path_non_csv() -> Result<()> {
        let tmp = Builder::new().suffix(".txt").tempfile()?;
        let upload = Upload::from_path(tmp.path())?;
        let err = load_upload(Some(&upload)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFileType);
        Ok(())
    }
}
