// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};
use crate::extractors::{ExtractionStats, Field, Record};
use crate::utils::error::StorageError;

/// Default output file when none is given on the command line.
pub const DEFAULT_OUTPUT_FILE: &str = "extracted_data.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub delimiter: u8,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self { delimiter: b';' }
    }
}

pub struct StorageManager {
    options: OutputOptions,
}

impl StorageManager {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }

    /// Reads the whole input document as text.
    pub fn read_document<P: AsRef<Path>>(&self, path: P) -> Result<String, StorageError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(StorageError::IoError)?;

        tracing::info!("Read {} bytes from {}", content.len(), path.display());
        Ok(content)
    }

    /// Columns present in at least one record, in the order they are first seen.
    pub fn columns(records: &[Record]) -> Vec<Field> {
        let mut columns: Vec<Field> = Vec::new();
        for field in records.iter().flat_map(|r| r.fields()) {
            if !columns.contains(&field) {
                columns.push(field);
            }
        }
        columns
    }

    /// Writes one row per record. Missing fields become empty cells.
    pub fn save_records<P: AsRef<Path>>(
        &self,
        records: &[Record],
        path: P,
    ) -> Result<PathBuf, StorageError> {
        let file_path = path.as_ref().to_path_buf();

        if records.is_empty() {
            tracing::warn!("No records to write, creating empty file {}", file_path.display());
            fs::File::create(&file_path)
                .map_err(StorageError::IoError)?;
            return Ok(file_path);
        }

        let columns = Self::columns(records);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_path(&file_path)?;

        writer.write_record(columns.iter().map(|f| f.as_str()))?;
        for record in records {
            writer.write_record(columns.iter().map(|f| record.get(*f).unwrap_or("")))?;
        }
        writer.flush()
            .map_err(StorageError::IoError)?;

        tracing::info!(
            "Saved {} rows ({} columns) to {}",
            records.len(),
            columns.len(),
            file_path.display()
        );

        Ok(file_path)
    }

    /// Saves metadata about the run in JSON format, next to the output file.
    pub fn save_run_metadata(
        &self,
        input_path: &Path,
        output_path: &Path,
        columns: &[Field],
        stats: &ExtractionStats,
    ) -> Result<PathBuf, StorageError> {
        let file_path = metadata_path(output_path);

        let metadata = serde_json::json!({
            "input_file": input_path.display().to_string(),
            "output_file": output_path.display().to_string(),
            "delimiter": (self.options.delimiter as char).to_string(),
            "columns": columns.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
            "stats": stats,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str)
            .map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }
}

/// `<output>.meta.json`
pub fn metadata_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// `<output stem>_debug.txt` in the output's directory.
pub fn debug_report_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted_data".to_string());
    output_path.with_file_name(format!("{}_debug.txt", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::FieldExtractor;

    fn record(pairs: &[(Field, &str)]) -> Record {
        let mut r = Record::default();
        for (field, value) in pairs {
            r.insert(*field, *value);
        }
        r
    }

    #[test]
    fn test_read_missing_document_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(OutputOptions::default());
        let result = storage.read_document(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(StorageError::IoError(_))));
    }

    #[test]
    fn test_columns_are_union_of_present_fields() {
        let records = vec![
            record(&[(Field::BuySell, "Buy"), (Field::Stock, "Yes")]),
            record(&[(Field::BuySell, "Sell"), (Field::ProductName, "Acetone")]),
        ];
        assert_eq!(
            StorageManager::columns(&records),
            vec![Field::BuySell, Field::Stock, Field::ProductName]
        );
    }

    #[test]
    fn test_save_records_fills_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            record(&[(Field::BuySell, "Buy"), (Field::Quantity, "5 MT")]),
            record(&[(Field::BuySell, "Sell"), (Field::EmailId, "a@b.example")]),
        ];

        let storage = StorageManager::new(OutputOptions::default());
        storage.save_records(&records, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "Buy/Sell;Quantity;Email id\nBuy;5 MT;\nSell;;a@b.example\n"
        );
    }

    #[test]
    fn test_save_records_quotes_delimiter_and_honors_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let records = vec![record(&[(Field::BuySell, "Buy"), (Field::Market, "EU\tUS")])];

        let storage = StorageManager::new(OutputOptions { delimiter: b'\t' });
        storage.save_records(&records, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Buy/Sell\tMarket\nBuy\t\"EU\tUS\"\n");
    }

    #[test]
    fn test_save_no_records_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let storage = StorageManager::new(OutputOptions::default());
        storage.save_records(&[], &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_header_round_trip_matches_extracted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        let doc = "Buy/Sell: Sell\nProduct: Toluene\n===============\nCompany: Lotus\nPhone: 123\n";
        let records = FieldExtractor::new().extract(doc).records;

        let storage = StorageManager::new(OutputOptions::default());
        storage.save_records(&records, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let header = written.lines().next().unwrap();
        assert_eq!(header, "Buy/Sell;Product Name;Company;Contact No.");
    }

    #[test]
    fn test_fallback_buy_sell_column_comes_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        let doc = "Product: Acetone\nQuantity: 5 MT\nWe want to buy.\n";
        let records = FieldExtractor::new().extract(doc).records;

        let storage = StorageManager::new(OutputOptions::default());
        storage.save_records(&records, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Product Name;Quantity;Buy/Sell\nAcetone;5 MT;Buy\n");
    }

    #[test]
    fn test_save_run_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("leads.csv");
        let stats = ExtractionStats {
            blocks: 3,
            records: 4,
            expanded_blocks: 1,
            skipped_cas_matches: 0,
        };

        let storage = StorageManager::new(OutputOptions::default());
        let meta_path = storage
            .save_run_metadata(
                Path::new("input.txt"),
                &output,
                &[Field::BuySell, Field::CasNo],
                &stats,
            )
            .unwrap();
        assert_eq!(meta_path, dir.path().join("leads.csv.meta.json"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        assert_eq!(value["input_file"], "input.txt");
        assert_eq!(value["delimiter"], ";");
        assert_eq!(value["columns"], serde_json::json!(["Buy/Sell", "CAS No."]));
        assert_eq!(value["stats"]["records"], 4);
        assert_eq!(value["stats"]["expanded_blocks"], 1);
        assert!(value["extraction_timestamp"].is_string());
    }

    #[test]
    fn test_debug_report_path() {
        assert_eq!(
            debug_report_path(Path::new("out/leads.csv")),
            PathBuf::from("out/leads_debug.txt")
        );
    }
}
