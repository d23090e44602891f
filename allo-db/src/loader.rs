//! CSV data loading functions for populating the in-memory SQLite database.
//!
//! Every table loads from a headed CSV whose header names the columns.
//! Columns the schema does not know are added to the table as extras, so
//! descriptive columns (catchment names, use types, ...) can be grouped on.
//! Empty cells are stored as NULL.
//!
//! # Example CSV (`crc_wap_allo`)
//! ```text
//! crc,take_type,allo_block,wap,max_rate_wap,in_sw_allo
//! CRC001,Take Groundwater,A,BS28/5006,12.5,0
//! ```

use crate::schema::TABLES;
use crate::Database;
use flate2::read::GzDecoder;
use rusqlite::params_from_iter;
use std::io::Read;
use std::path::Path;

impl Database {
    /// Load rows for `table` from a headed CSV string.
    pub fn load_table(&self, table: &str, csv_data: &str) -> anyhow::Result<usize> {
        self.load_reader(table, csv_data.as_bytes())
    }

    /// Load rows for `table` from gzip-compressed CSV bytes.
    pub fn load_table_gz(&self, table: &str, gz_data: &[u8]) -> anyhow::Result<usize> {
        self.load_reader(table, GzDecoder::new(gz_data))
    }

    /// Load `<table>.csv` or `<table>.csv.gz` for every known table found in
    /// `dir`. Returns the number of rows loaded.
    pub fn load_dir(&self, dir: &Path) -> anyhow::Result<usize> {
        let mut total = 0;
        for table in TABLES {
            let plain = dir.join(format!("{table}.csv"));
            let gz = dir.join(format!("{table}.csv.gz"));
            if plain.exists() {
                total += self.load_reader(table, std::fs::File::open(&plain)?)?;
            } else if gz.exists() {
                let mut bytes = Vec::new();
                std::fs::File::open(&gz)?.read_to_end(&mut bytes)?;
                total += self.load_table_gz(table, &bytes)?;
            } else {
                log::warn!("loader: no {} file in {}", table, dir.display());
            }
        }
        Ok(total)
    }

    fn load_reader<R: Read>(&self, table: &str, reader: R) -> anyhow::Result<usize> {
        if !TABLES.contains(&table) {
            anyhow::bail!("unknown table '{}'", table);
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Ok(0);
        }

        let known = self.table_columns(table)?;
        let conn = self.conn.borrow();
        for column in headers.iter().filter(|h| !known.contains(h)) {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN \"{}\"", table, column.replace('"', "")),
                [],
            )?;
            log::debug!("loader: added extra column {}.{}", table, column);
        }

        let columns = headers
            .iter()
            .map(|h| format!("\"{}\"", h.replace('"', "")))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=headers.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {table} ({columns}) VALUES ({placeholders})"
        ))?;

        let mut count = 0usize;
        let mut skipped = 0usize;
        for result in rdr.records() {
            let r = result?;
            if r.iter().all(str::is_empty) {
                skipped += 1;
                continue;
            }
            let values = (0..headers.len()).map(|i| r.get(i).filter(|s| !s.is_empty()));
            stmt.execute(params_from_iter(values))?;
            count += 1;
        }
        log::info!(
            "loader: Loaded {} rows into {}, skipped {} empty",
            count,
            table,
            skipped
        );
        Ok(count)
    }
}
