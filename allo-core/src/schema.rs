//! Table and column names shared by the store, the filters and the pipeline.

// ── Consent allocation table ────────────────────────────────────────────────
pub mod crc_allo {
    pub const TABLE: &str = "crc_allo";
    pub const CRC: &str = "crc";
    pub const TAKE_TYPE: &str = "take_type";
    pub const ALLO_BLOCK: &str = "allo_block";
    pub const FROM_DATE: &str = "from_date";
    pub const TO_DATE: &str = "to_date";
    pub const FROM_MONTH: &str = "from_month";
    pub const TO_MONTH: &str = "to_month";
    pub const MAX_RATE: &str = "max_rate_crc";
    pub const DAILY_VOL: &str = "daily_vol";
    pub const FEAV: &str = "feav";
    pub const STATUS: &str = "crc_status";
    pub const IN_GW_ALLO: &str = "in_gw_allo";
    pub const USE_TYPE: &str = "use_type";
}

// ── Consent to extraction point links ───────────────────────────────────────
pub mod crc_wap_allo {
    pub const TABLE: &str = "crc_wap_allo";
    pub const CRC: &str = "crc";
    pub const TAKE_TYPE: &str = "take_type";
    pub const ALLO_BLOCK: &str = "allo_block";
    pub const WAP: &str = "wap";
    pub const MAX_RATE_WAP: &str = "max_rate_wap";
    pub const IN_SW_ALLO: &str = "in_sw_allo";
}

// ── Extraction point sites ──────────────────────────────────────────────────
pub mod sites {
    pub const TABLE: &str = "sites";
    pub const SITE_ID: &str = "ext_site_id";
}

// ── Time series summary ─────────────────────────────────────────────────────
pub mod ts_summary {
    pub const TABLE: &str = "ts_summary";
    pub const SITE_ID: &str = "ext_site_id";
    pub const DATASET_TYPE_ID: &str = "dataset_type_id";
    pub const FROM_DATE: &str = "from_date";
    pub const TO_DATE: &str = "to_date";
}

// ── Metered time series values ──────────────────────────────────────────────
pub mod ts_data {
    pub const TABLE: &str = "ts_data";
    pub const SITE_ID: &str = "ext_site_id";
    pub const DATASET_TYPE_ID: &str = "dataset_type_id";
    pub const DATE: &str = "date_time";
    pub const VALUE: &str = "value";
}

// ── Low flow restrictions ───────────────────────────────────────────────────
pub mod lowflow {
    pub const TABLE: &str = "lowflow_restr";
    pub const CRC: &str = "crc";
    pub const ALLO_BLOCK: &str = "allo_block";
    pub const DATE: &str = "restr_date";
    pub const ALLOCATION: &str = "allocation";
}

// ── Output key columns ──────────────────────────────────────────────────────
pub mod key {
    pub const CRC: &str = "crc";
    pub const TAKE_TYPE: &str = "take_type";
    pub const ALLO_BLOCK: &str = "allo_block";
    pub const WAP: &str = "wap";
    pub const DATE: &str = "date";

    pub const PRIMARY: [&str; 5] = [CRC, TAKE_TYPE, ALLO_BLOCK, WAP, DATE];
}
