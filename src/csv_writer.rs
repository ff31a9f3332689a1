use crate::prelude::*;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends samples as CSV rows. The header comes from the first sample's
/// keys and is only written when the target is stdout or an empty file.
pub struct CsvWriter {
    out: Box<dyn Write + Send>,
    path: String,
    write_header: bool,
    header: Option<Vec<String>>,
    rows_written: u64,
}

impl CsvWriter {
    /// `target` may contain strftime patterns, expanded once against local
    /// time. "stdout" writes to standard output.
    pub fn open(target: &str) -> Result<Self> {
        if target == "stdout" {
            return Ok(Self::new(Box::new(std::io::stdout()), target, true));
        }

        if StrftimeItems::new(target).any(|item| matches!(item, Item::Error)) {
            bail!("invalid strftime pattern in csv path {}", target);
        }
        let path = chrono::Local::now().format(target).to_string();
        info!("Opening CSV file at {}", path);

        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open CSV file {}: {}", path, e);
                return Err(e.into());
            }
        };

        let empty = file.metadata()?.len() == 0;

        Ok(Self::new(Box::new(file), &path, empty))
    }

    pub fn new(out: Box<dyn Write + Send>, path: &str, write_header: bool) -> Self {
        Self {
            out,
            path: path.to_string(),
            write_header,
            header: None,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn row(fields: impl Iterator<Item = String>) -> String {
        fields.map(|f| Self::escape(&f)).collect::<Vec<_>>().join(",")
    }

    fn escape(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

#[async_trait]
impl Sink for CsvWriter {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        let keys: Vec<String> = sample.keys().map(str::to_string).collect();

        if let Some(header) = &self.header {
            if *header != keys {
                bail!("sample columns changed mid-file in {}", self.path);
            }
        } else {
            if self.write_header {
                writeln!(self.out, "{}", Self::row(keys.iter().cloned()))?;
            }
            self.header = Some(keys);
        }

        let fields = std::iter::once(sample.utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string())
            .chain(sample.values().iter().map(|(_, v)| v.to_string()));
        writeln!(self.out, "{}", Self::row(fields))?;

        if let Err(e) = self.out.flush() {
            error!("Failed to flush CSV file {}: {}", self.path, e);
            return Err(e.into());
        }

        self.rows_written += 1;
        debug!("Total rows stored in {}: {}", self.path, self.rows_written);

        Ok(())
    }
}
