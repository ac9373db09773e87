use std::io::Write;

use crate::error::AppError;
use crate::models::TradeRecord;

/// CSV header, in [`TradeRecord`] field order.
pub const CSV_HEADER: [&str; 12] = [
    "year",
    "month",
    "reporter_code",
    "reporter_name",
    "partner_code",
    "partner_name",
    "trade_flow",
    "hs_code",
    "hs_description",
    "trade_value",
    "quantity",
    "unit",
];

/// Write records as CSV. The header is written even when there are no rows.
pub fn write_csv<W: Write>(records: &[TradeRecord], writer: W) -> Result<(), AppError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()
        .map_err(|e| AppError::ExportError(e.to_string()))?;
    Ok(())
}

pub fn to_csv_string(records: &[TradeRecord]) -> Result<String, AppError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    String::from_utf8(buf).map_err(|e| AppError::ExportError(e.to_string()))
}
