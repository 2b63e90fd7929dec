//! InfluxDB line-protocol encoding for measurements.

use speedwatch_types::{Measurement, Result};

use crate::write_error;

pub const MEASUREMENT_NAME: &str = "internet_speed";
pub const FIELD_DOWNLOAD: &str = "download_speed";
pub const FIELD_UPLOAD: &str = "upload_speed";
pub const FIELD_PING: &str = "ping";
pub const TAG_SERVER_ID: &str = "server_id";

/// Encodes one measurement as a single point with nanosecond precision.
///
/// The `server_id` tag is only present when the measurement carries one.
pub fn encode_point(measurement: &Measurement) -> Result<String> {
    let nanos = measurement.timestamp().timestamp_nanos_opt().ok_or_else(|| {
        write_error(format!(
            "timestamp {} cannot be expressed in nanoseconds",
            measurement.timestamp()
        ))
    })?;

    let mut line = escape_measurement(MEASUREMENT_NAME);
    if let Some(server_id) = measurement.server_id() {
        line.push_str(&format!(
            ",{}={}",
            escape_key(TAG_SERVER_ID),
            escape_key(server_id)
        ));
    }
    line.push_str(&format!(
        " {}={},{}={},{}={} {}",
        FIELD_DOWNLOAD,
        format_float(measurement.download_mbps()),
        FIELD_UPLOAD,
        format_float(measurement.upload_mbps()),
        FIELD_PING,
        format_float(measurement.ping_ms()),
        nanos
    ));
    Ok(line)
}

fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escaping for tag keys, tag values and field keys.
fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

// Rust never prints f64 in exponent form, so integral values come out as
// "100" which InfluxDB still parses as a float.
fn format_float(value: f64) -> String {
    format!("{value}")
}
