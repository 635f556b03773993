// Source CSV import, canonical CSV export

use std::io::{Read, Write};
use std::path::Path;

use heartline_pipeline::{CanonicalRecord, Cell, Field, LabeledRecord, RawTable, SourceSchema, CANONICAL_COLUMNS, FEATURES};
use log::debug;

use crate::error::IoError;

/// Read a source file and lay it out as a raw table under `schema`'s
/// header convention.
pub fn read_table(path: &Path, schema: &SourceSchema) -> Result<RawTable, IoError> {
    let content = read_file_as_utf8(path)?;
    parse_table(&content, &path.display().to_string(), schema)
}

/// Parse CSV text. With `header = false` the schema's positional names are
/// used as column names and every record is data.
pub fn parse_table(content: &str, origin: &str, schema: &SourceSchema) -> Result<RawTable, IoError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let expected = (!schema.has_header()).then(|| schema.positional().len());
    let delimiter = sniff_delimiter(content, expected);
    debug!("{origin}: delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = if schema.has_header() {
        match records.next() {
            Some(first) => first
                .map_err(|e| IoError::csv(origin, e))?
                .iter()
                .map(str::to_string)
                .collect(),
            None => return Err(IoError::csv(origin, "empty file, expected a header row")),
        }
    } else {
        schema.positional().to_vec()
    };

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(|e| IoError::csv(origin, e))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::from).collect());
    }
    debug!("{origin}: {} columns, {} rows", headers.len(), rows.len());
    Ok(RawTable::from_rows(headers, rows)?)
}

/// Delimiters seen in heart-disease exports: plain CSV, European-locale
/// spreadsheet saves, and tab-separated dumps.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Pick the field delimiter from the first non-blank lines.
///
/// A candidate must split every sampled line into the same number of fields.
/// If `expected` is given (headerless sources know their width), the first
/// candidate producing exactly that width wins; otherwise the widest split
/// does. Falls back to comma.
pub fn sniff_delimiter(content: &str, expected: Option<usize>) -> u8 {
    let sample = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(8)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best = (b',', 1);
    for delim in DELIMITERS {
        let widths: Vec<usize> = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes())
            .records()
            .filter_map(Result::ok)
            .map(|r| r.len())
            .collect();
        let Some(&width) = widths.first() else {
            continue;
        };
        if widths.iter().any(|&w| w != width) {
            continue;
        }
        if expected == Some(width) {
            return delim;
        }
        if width > best.1 {
            best = (delim, width);
        }
    }
    best.0
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let read_err = |source| IoError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;
    Ok(decode(bytes))
}

/// UTF-8 when valid, otherwise Windows-1252 (spreadsheet exports).
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Write labeled records in the canonical 14-column layout.
pub fn write_canonical<W: Write>(writer: W, rows: &[LabeledRecord]) -> Result<(), IoError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CANONICAL_COLUMNS.iter().map(|f| f.name()))
        .map_err(|e| IoError::csv("canonical output", e))?;
    for row in rows {
        let mut fields = feature_fields(&row.record);
        fields.push(row.target.to_string());
        out.write_record(&fields).map_err(|e| IoError::csv("canonical output", e))?;
    }
    out.flush().map_err(|e| IoError::csv("canonical output", e))
}

/// Write unlabeled records: the canonical layout without `target`.
pub fn write_records<W: Write>(writer: W, records: &[CanonicalRecord]) -> Result<(), IoError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(FEATURES.iter().map(|f| f.name()))
        .map_err(|e| IoError::csv("canonical output", e))?;
    for record in records {
        out.write_record(&feature_fields(record))
            .map_err(|e| IoError::csv("canonical output", e))?;
    }
    out.flush().map_err(|e| IoError::csv("canonical output", e))
}

/// Write a canonical dataset file atomically (temp file, then rename).
pub fn write_canonical_file(path: &Path, rows: &[LabeledRecord]) -> Result<(), IoError> {
    let write_err = |source| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let temp_path = path.with_extension("csv.tmp");
    let file = std::fs::File::create(&temp_path).map_err(write_err)?;
    write_canonical(std::io::BufWriter::new(file), rows)?;
    std::fs::rename(&temp_path, path).map_err(write_err)
}

fn feature_fields(record: &CanonicalRecord) -> Vec<String> {
    FEATURES
        .iter()
        .map(|&f| match f {
            Field::Oldpeak => format_oldpeak(record.oldpeak),
            other => record.code(other).unwrap_or_default().to_string(),
        })
        .collect()
}

fn format_oldpeak(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> CanonicalRecord {
        CanonicalRecord {
            age: 63,
            sex: 1,
            cp: 3,
            trestbps: 145,
            chol: 233,
            fbs: 1,
            restecg: 0,
            thalach: 150,
            exang: 0,
            oldpeak: 2.3,
            slope: 3,
            ca: 0,
            thal: 6,
        }
    }

    #[test]
    fn test_sniff_common_exports() {
        assert_eq!(sniff_delimiter("age,sex,cp\n63,1,3\n67,1,4\n", None), b',');
        assert_eq!(sniff_delimiter("age;sex;oldpeak\n63;1;2,3\n67;1;1,5\n", None), b';');
        assert_eq!(sniff_delimiter("age\tsex\tcp\n63\t1\t3\n", None), b'\t');
    }

    #[test]
    fn test_sniff_ignores_quoted_commas() {
        let content = "Name;Note;Age\n\"Doe, Jane\";\"x, y\";40\nBob;\"z\";50\n";
        assert_eq!(sniff_delimiter(content, None), b';');
    }

    #[test]
    fn test_sniff_prefers_expected_width() {
        let content = "1;2,3;4\n5;6,7;8\n";
        assert_eq!(sniff_delimiter(content, None), b';');
        assert_eq!(sniff_delimiter(content, Some(2)), b',');
    }

    #[test]
    fn test_sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter("", None), b',');
        assert_eq!(sniff_delimiter("single\ncolumn\n", None), b',');
    }

    #[test]
    fn test_parse_with_header() {
        let schema = SourceSchema::builtin("heart_failure").unwrap();
        let content = "\u{feff}Age,Sex,ChestPainType\n40,M,ATA\n\n49,F,NAP\n";
        let table = parse_table(content, "inline", &schema).unwrap();
        assert_eq!(table.column_names(), vec!["Age", "Sex", "ChestPainType"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("Sex").unwrap().values[1], Cell::from("F"));
    }

    #[test]
    fn test_parse_headerless_uses_positional_names() {
        let schema = SourceSchema::builtin("uci_cleveland").unwrap();
        let content = "63.0,1.0,1.0,145.0,233.0,1.0,2.0,150.0,0.0,2.3,3.0,0.0,6.0,0\n\
                       67.0,1.0,4.0,160.0,286.0,0.0,2.0,108.0,1.0,1.5,2.0,3.0,3.0,2\n";
        let table = parse_table(content, "inline", &schema).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names().last(), Some(&"num"));
        assert_eq!(table.column("num").unwrap().values[1], Cell::from("2"));
    }

    #[test]
    fn test_parse_empty_file_with_header_is_error() {
        let schema = SourceSchema::builtin("canonical").unwrap();
        assert!(matches!(parse_table("", "inline", &schema), Err(IoError::Csv { .. })));
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        fs::write(&path, b"age,note\n63,caf\xe9\n").unwrap();
        let content = read_file_as_utf8(&path).unwrap();
        assert!(content.contains("café"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = read_file_as_utf8(Path::new("/nonexistent/heart.csv")).unwrap_err();
        assert!(matches!(err, IoError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/heart.csv"));
    }

    #[test]
    fn test_canonical_output_layout() {
        let mut buf = Vec::new();
        let mut flat = sample();
        flat.oldpeak = 0.0;
        let rows = [
            LabeledRecord { record: sample(), target: 1 },
            LabeledRecord { record: flat, target: 0 },
        ];
        write_canonical(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal,target");
        assert_eq!(lines[1], "63,1,3,145,233,1,0,150,0,2.3,3,0,6,1");
        assert_eq!(lines[2], "63,1,3,145,233,1,0,150,0,0.0,3,0,6,0");
    }

    #[test]
    fn test_unlabeled_output_omits_target() {
        let mut buf = Vec::new();
        write_records(&mut buf, &[sample()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal\n"));
        assert!(!text.contains("target"));
    }

    #[test]
    fn test_canonical_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("heart.csv");
        let rows = [LabeledRecord { record: sample(), target: 1 }];
        write_canonical_file(&path, &rows).unwrap();
        assert!(!path.with_extension("csv.tmp").exists());

        let schema = SourceSchema::builtin("canonical").unwrap();
        let table = read_table(&path, &schema).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("oldpeak").unwrap().values[0], Cell::from("2.3"));
        assert_eq!(table.column("target").unwrap().values[0], Cell::from("1"));
    }
}
