//! Display helpers shared by the typed values.

/// Convert an OLE Automation date (f64) to a UTC datetime string.
/// OLE date epoch is 1899-12-30; integer part = days, fraction = time-of-day.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn ole_date_to_string(ole_date: f64) -> String {
    // days from 1899-12-30 to 1970-01-01
    const OLE_EPOCH_DAYS: f64 = 25569.0;
    let total_secs = (ole_date - OLE_EPOCH_DAYS) * 86400.0;
    if !total_secs.is_finite() {
        return format!("{ole_date:.6}");
    }
    chrono::DateTime::from_timestamp(total_secs.round() as i64, 0).map_or_else(
        || format!("{ole_date:.6}"),
        |utc| utc.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Map OPC quality code to a human-readable label.
pub fn quality_to_string(quality: u16) -> String {
    let quality_bits = quality & 0xC0; // Top 2 bits define Good/Bad/Uncertain
    match quality_bits {
        0xC0 => "Good".to_string(),
        0x00 => "Bad".to_string(),
        0x40 => "Uncertain".to_string(),
        _ => format!("Unknown(0x{quality:04X})"),
    }
}
