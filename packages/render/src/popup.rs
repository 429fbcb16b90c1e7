//! Marker popup tables.

use std::fmt::Write as _;

use fire_map_detection_models::Detection;

/// Placeholder for absent measurements.
pub const MISSING: &str = "N/A";

const TH: &str = "padding: 6px; text-align: left; border-bottom: 2px solid #fff; white-space: nowrap;";
const TD: &str = "padding: 8px; background-color: #f9f9f9; white-space: nowrap;";
const SUB: &str = "font-size: 12px; color: #e0e0e0;";

/// Formats an optional brightness temperature in Kelvin.
fn kelvin(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v} K"))
}

/// Builds the popup HTML for one detection: date, `HH:MM:SS` time, both
/// brightness temperatures, and FRP.
///
/// # Errors
///
/// Returns [`std::fmt::Error`] if writing to the buffer fails.
pub fn popup_html(detection: &Detection) -> Result<String, std::fmt::Error> {
    let mut buf = String::new();

    write!(
        buf,
        "<div style=\"max-width: 600px; font-family: Arial, sans-serif; font-size: 12px;\">\
         <table style=\"border: none; text-align: left;\"><thead>\
         <tr style=\"background-color: #4a90e2; color: white;\">\
         <th style=\"{TH}\">DATE</th>\
         <th style=\"{TH}\">TIME</th>\
         <th style=\"{TH}\">FIRE HOTSPOTS<br><span style=\"{SUB}\">(bright_ti4)</span></th>\
         <th style=\"{TH}\">GENERAL HEAT DETECTION<br><span style=\"{SUB}\">(bright_ti5)</span></th>\
         <th style=\"{TH}\">FIRE INTENSITY<br><span style=\"{SUB}\">(fire radiative power, FRP)</span></th>\
         </tr></thead><tbody><tr>"
    )?;

    for cell in [
        detection.acq_date.format("%Y-%m-%d").to_string(),
        detection.acq_time.to_hms(),
        kelvin(detection.bright_ti4),
        kelvin(detection.bright_ti5),
        detection.frp.to_string(),
    ] {
        write!(buf, "<td style=\"{TD}\">{cell}</td>")?;
    }

    buf.push_str("</tr></tbody></table></div>");
    Ok(buf)
}
