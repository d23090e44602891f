//! CSV output of computed series.

use allo_core::date_range::format_date;
use allo_core::record::BlockKey;
use allo_core::schema::key;
use allo_usage::OutputTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Write;

/// Open `path` for writing; `-` writes to stdout.
pub fn open_output(path: &str) -> anyhow::Result<Box<dyn Write>> {
    if path == "-" {
        return Ok(Box::new(std::io::stdout()));
    }
    let file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path, e))?;
    Ok(Box::new(std::io::BufWriter::new(file)))
}

/// Write a grouped table with a header row. Missing values are empty cells.
pub fn write_table<W: Write>(table: &OutputTable, writer: W) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.headers())?;
    for record in table.records() {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(table.len())
}

/// Write a per-block allocation series.
pub fn write_block_series<W: Write>(
    series: &BTreeMap<(BlockKey, NaiveDate), f64>,
    writer: W,
) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        key::CRC,
        key::TAKE_TYPE,
        key::ALLO_BLOCK,
        key::DATE,
        "allocation",
    ])?;
    for ((block, date), value) in series {
        wtr.write_record([
            block.crc.clone(),
            block.take_type.to_string(),
            block.allo_block.clone(),
            format_date(date),
            value.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(series.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allo_core::record::TakeType;
    use allo_usage::Dataset;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, m, 1).unwrap()
    }

    #[test]
    fn test_write_table() {
        let table = OutputTable::from_entries(
            vec!["crc".into()],
            vec![Dataset::Allocation, Dataset::Usage],
            vec![
                (vec!["CRC001".to_string()], d(1), 0, 1860.0),
                (vec!["CRC001".to_string()], d(1), 1, 120.5),
                (vec!["CRC001".to_string()], d(2), 0, 1680.0),
            ],
        );
        let mut buf = Vec::new();
        assert_eq!(write_table(&table, &mut buf).unwrap(), 2);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "crc,date,allocation,usage\n\
             CRC001,2019-01-01,1860,120.5\n\
             CRC001,2019-02-01,1680,\n"
        );
    }

    #[test]
    fn test_write_block_series() {
        let mut series = BTreeMap::new();
        series.insert(
            (BlockKey::new("CRC001", TakeType::Groundwater, "A"), d(3)),
            1860.0,
        );
        let mut buf = Vec::new();
        write_block_series(&series, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("CRC001,Take Groundwater,A,2019-03-01,1860")
        );
    }
}
