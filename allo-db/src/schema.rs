//! SQL schema definitions for the in-memory SQLite source store.
//!
//! Each table carries the columns the allocation pipeline reads. Loaders add
//! any further CSV columns as untyped extras, so descriptive site and consent
//! columns stay available for grouping.

/// Tables a loader may populate.
pub const TABLES: [&str; 6] = [
    "crc_allo",
    "crc_wap_allo",
    "sites",
    "ts_summary",
    "ts_data",
    "lowflow_restr",
];

/// Returns the full SQL schema as a single batch string.
///
/// - `crc_allo` - consent allocation blocks with validity, season and magnitudes
/// - `crc_wap_allo` - links from allocation blocks to extraction points
/// - `sites` - extraction point sites
/// - `ts_summary` - which sites carry which time series datasets, and when
/// - `ts_data` - daily metered values per site and dataset
/// - `lowflow_restr` - daily low flow restriction percentages per consent block
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS crc_allo (
        crc TEXT NOT NULL,
        take_type TEXT NOT NULL,
        allo_block TEXT NOT NULL,
        from_date TEXT,
        to_date TEXT,
        from_month INTEGER,
        to_month INTEGER,
        max_rate_crc REAL,
        daily_vol REAL,
        feav REAL,
        crc_status TEXT,
        in_gw_allo INTEGER,
        use_type TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_crc_allo_key ON crc_allo(crc, take_type, allo_block);

    CREATE TABLE IF NOT EXISTS crc_wap_allo (
        crc TEXT NOT NULL,
        take_type TEXT NOT NULL,
        allo_block TEXT NOT NULL,
        wap TEXT NOT NULL,
        max_rate_wap REAL,
        in_sw_allo INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_crc_wap_key ON crc_wap_allo(crc, take_type, allo_block);
    CREATE INDEX IF NOT EXISTS idx_crc_wap_wap ON crc_wap_allo(wap);

    CREATE TABLE IF NOT EXISTS sites (
        ext_site_id TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS ts_summary (
        ext_site_id TEXT NOT NULL,
        dataset_type_id INTEGER NOT NULL,
        from_date TEXT,
        to_date TEXT
    );

    CREATE TABLE IF NOT EXISTS ts_data (
        ext_site_id TEXT NOT NULL,
        dataset_type_id INTEGER NOT NULL,
        date_time TEXT NOT NULL,
        value REAL
    );
    CREATE INDEX IF NOT EXISTS idx_ts_data_site ON ts_data(ext_site_id);
    CREATE INDEX IF NOT EXISTS idx_ts_data_date ON ts_data(date_time);

    CREATE TABLE IF NOT EXISTS lowflow_restr (
        crc TEXT NOT NULL,
        allo_block TEXT,
        restr_date TEXT NOT NULL,
        allocation REAL
    );
    CREATE INDEX IF NOT EXISTS idx_lowflow_crc ON lowflow_restr(crc);
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use allo_core::schema::{crc_allo, crc_wap_allo, lowflow, sites, ts_data, ts_summary};
    use rusqlite::Connection;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema())
            .expect("Schema SQL should be valid");
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for table in &TABLES {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[test]
    fn schema_matches_pipeline_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        let expected: [(&str, &[&str]); 6] = [
            (
                crc_allo::TABLE,
                &[
                    crc_allo::CRC,
                    crc_allo::TAKE_TYPE,
                    crc_allo::ALLO_BLOCK,
                    crc_allo::FROM_DATE,
                    crc_allo::TO_DATE,
                    crc_allo::FROM_MONTH,
                    crc_allo::TO_MONTH,
                    crc_allo::MAX_RATE,
                    crc_allo::DAILY_VOL,
                    crc_allo::FEAV,
                    crc_allo::STATUS,
                    crc_allo::IN_GW_ALLO,
                    crc_allo::USE_TYPE,
                ],
            ),
            (
                crc_wap_allo::TABLE,
                &[
                    crc_wap_allo::CRC,
                    crc_wap_allo::TAKE_TYPE,
                    crc_wap_allo::ALLO_BLOCK,
                    crc_wap_allo::WAP,
                    crc_wap_allo::MAX_RATE_WAP,
                    crc_wap_allo::IN_SW_ALLO,
                ],
            ),
            (sites::TABLE, &[sites::SITE_ID]),
            (
                ts_summary::TABLE,
                &[
                    ts_summary::SITE_ID,
                    ts_summary::DATASET_TYPE_ID,
                    ts_summary::FROM_DATE,
                    ts_summary::TO_DATE,
                ],
            ),
            (
                ts_data::TABLE,
                &[
                    ts_data::SITE_ID,
                    ts_data::DATASET_TYPE_ID,
                    ts_data::DATE,
                    ts_data::VALUE,
                ],
            ),
            (
                lowflow::TABLE,
                &[
                    lowflow::CRC,
                    lowflow::ALLO_BLOCK,
                    lowflow::DATE,
                    lowflow::ALLOCATION,
                ],
            ),
        ];

        for (table, wanted) in expected {
            let have = columns(&conn, table);
            for column in wanted {
                assert!(
                    have.iter().any(|c| c == column),
                    "Column '{}.{}' should exist",
                    table,
                    column
                );
            }
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }
}
