//! Unit codec
//!
//! Pure conversions between raw wire bytes and typed [`Value`]s. All
//! multi-byte quantities on the optolink bus are little-endian.
//!
//! | unit | width | transform |
//! |------|-------|-----------|
//! | `temperature` (UT) | 2 | signed / 10 |
//! | `status`, `return_status`, `counter` (ST/RT/CO) | 1..=4 | unsigned |
//! | `seconds_to_hours` (CS) | 4 | unsigned / 3600 |
//! | `operating_mode` (BA) | 1 | label table |
//! | `device_type` | 2 | magic match |
//! | `fault_code` | 1 | fault table |

mod fault_codes;

use std::borrow::Cow;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{OptolinkError, Result};

pub use fault_codes::fault_label;

/// Device-type probe response of a Vitodens 200 speaking KW1
pub const DEVICE_MAGIC_V200_KW1: [u8; 2] = [0x20, 0x94];

/// Label reported for [`DEVICE_MAGIC_V200_KW1`]
pub const DEVICE_LABEL_V200_KW1: &str = "V200 KW1";

/// Operating mode byte -> label
const OPERATING_MODES: [(u8, &str); 6] = [
    (0x00, "DHW only"),
    (0x01, "Reduced"),
    (0x02, "Normal"),
    (0x03, "Heating and DHW"),
    (0x04, "Heating and DHW (constant)"),
    (0x05, "Off"),
];

/// How the raw bytes of a command are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Signed tenths of a degree
    #[serde(alias = "UT")]
    Temperature,
    /// Plain unsigned state byte(s)
    #[serde(alias = "ST")]
    Status,
    /// Unsigned return status (on/off flags)
    #[serde(alias = "RT")]
    ReturnStatus,
    /// Unsigned event counter
    #[serde(alias = "CO")]
    Counter,
    /// Unsigned seconds, reported in hours
    #[serde(alias = "CS")]
    SecondsToHours,
    /// Operating mode enumeration
    #[serde(alias = "BA")]
    OperatingMode,
    /// Device identification magic
    #[serde(alias = "deviceType")]
    DeviceType,
    /// Fault code enumeration
    #[serde(alias = "ERR")]
    FaultCode,
}

impl Unit {
    /// Raw widths this unit can decode
    pub fn accepted_width(&self) -> RangeInclusive<usize> {
        match self {
            Unit::Temperature | Unit::DeviceType => 2..=2,
            Unit::Status | Unit::ReturnStatus | Unit::Counter => 1..=4,
            Unit::SecondsToHours => 4..=4,
            Unit::OperatingMode | Unit::FaultCode => 1..=1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Temperature => "temperature",
            Unit::Status => "status",
            Unit::ReturnStatus => "return_status",
            Unit::Counter => "counter",
            Unit::SecondsToHours => "seconds_to_hours",
            Unit::OperatingMode => "operating_mode",
            Unit::DeviceType => "device_type",
            Unit::FaultCode => "fault_code",
        }
    }

    /// Decode raw response bytes. Never fails: undecodable input yields
    /// [`Value::Invalid`].
    pub fn decode(&self, raw: &[u8]) -> Value {
        if !self.accepted_width().contains(&raw.len()) {
            return Value::Invalid(DecodeFault::Width {
                unit: *self,
                actual: raw.len(),
            });
        }

        match self {
            Unit::Temperature => {
                let tenths = i16::from_le_bytes([raw[0], raw[1]]);
                Value::Float(f64::from(tenths) / 10.0)
            },
            Unit::Status | Unit::ReturnStatus | Unit::Counter => {
                Value::Integer(unsigned_le(raw))
            },
            Unit::SecondsToHours => Value::Float(unsigned_le(raw) as f64 / 3600.0),
            Unit::OperatingMode => match mode_label(raw[0]) {
                Some(label) => Value::Label(Cow::Borrowed(label)),
                None => Value::Invalid(DecodeFault::UnmappedMode(raw[0])),
            },
            Unit::DeviceType => {
                if raw == DEVICE_MAGIC_V200_KW1 {
                    Value::Label(Cow::Borrowed(DEVICE_LABEL_V200_KW1))
                } else {
                    Value::Invalid(DecodeFault::UnknownDevice([raw[0], raw[1]]))
                }
            },
            Unit::FaultCode => match fault_label(raw[0]) {
                Some(label) => Value::Label(Cow::Borrowed(label)),
                None => Value::Label(Cow::Owned(format!("errorcode_{:02x}", raw[0]))),
            },
        }
    }

    /// Encode a set point into exactly `length` payload bytes.
    ///
    /// Runs once per write command when the registry is built.
    pub fn encode(&self, set_point: &SetPoint, length: usize) -> Result<Vec<u8>> {
        if length == 0 || length > 8 {
            return Err(OptolinkError::config(format!(
                "payload length {} out of range 1..=8",
                length
            )));
        }

        if let SetPoint::Raw(bytes) = set_point {
            if bytes.len() != length {
                return Err(OptolinkError::config(format!(
                    "raw payload has {} bytes, command length is {}",
                    bytes.len(),
                    length
                )));
            }
            return Ok(bytes.clone());
        }

        match (self, set_point) {
            (Unit::Temperature, SetPoint::Number(n)) => signed_le((n * 10.0).round(), length),
            (Unit::Status | Unit::ReturnStatus | Unit::Counter, SetPoint::Number(n)) => {
                unsigned_le_bytes(*n, length)
            },
            (Unit::SecondsToHours, SetPoint::Number(n)) => unsigned_le_bytes(n * 3600.0, length),
            (Unit::OperatingMode, SetPoint::Label(label)) => {
                let byte = mode_byte(label).ok_or_else(|| {
                    OptolinkError::config(format!("unknown operating mode '{}'", label))
                })?;
                unsigned_le_bytes(f64::from(byte), length)
            },
            (Unit::OperatingMode, SetPoint::Number(n)) => {
                let encoded = unsigned_le_bytes(*n, length)?;
                if mode_label(encoded[0]).is_none() {
                    return Err(OptolinkError::config(format!(
                        "operating mode 0x{:02X} is not defined",
                        encoded[0]
                    )));
                }
                Ok(encoded)
            },
            (unit, set_point) => Err(OptolinkError::config(format!(
                "cannot encode {} as {}",
                set_point,
                unit.as_str()
            ))),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for an operating mode byte
pub fn mode_label(byte: u8) -> Option<&'static str> {
    OPERATING_MODES
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, label)| *label)
}

/// Operating mode byte for a label (case-insensitive)
pub fn mode_byte(label: &str) -> Option<u8> {
    OPERATING_MODES
        .iter()
        .find(|(_, l)| l.eq_ignore_ascii_case(label.trim()))
        .map(|(b, _)| *b)
}

fn unsigned_le(raw: &[u8]) -> u64 {
    raw.iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn unsigned_le_bytes(value: f64, length: usize) -> Result<Vec<u8>> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(OptolinkError::config(format!(
            "{} is not a non-negative integer",
            value
        )));
    }
    let max = if length >= 8 {
        u64::MAX as f64
    } else {
        ((1u64 << (length * 8)) - 1) as f64
    };
    if value > max {
        return Err(OptolinkError::config(format!(
            "{} does not fit in {} byte(s)",
            value, length
        )));
    }
    Ok((value as u64).to_le_bytes()[..length].to_vec())
}

fn signed_le(value: f64, length: usize) -> Result<Vec<u8>> {
    let bits = (length * 8) as u32;
    let (min, max) = if bits >= 64 {
        (i64::MIN as f64, i64::MAX as f64)
    } else {
        (-((1i64 << (bits - 1)) as f64), ((1i64 << (bits - 1)) - 1) as f64)
    };
    if value < min || value > max {
        return Err(OptolinkError::config(format!(
            "{} does not fit in {} signed byte(s)",
            value, length
        )));
    }
    Ok((value as i64).to_le_bytes()[..length].to_vec())
}

/// Why a response could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFault {
    /// Raw width outside the unit's accepted range
    Width { unit: Unit, actual: usize },
    /// Operating mode byte without a label
    UnmappedMode(u8),
    /// Device-type probe did not match a known controller
    UnknownDevice([u8; 2]),
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFault::Width { unit, actual } => {
                write!(f, "unexpected width {} for {}", actual, unit)
            },
            DecodeFault::UnmappedMode(byte) => write!(f, "unmapped mode 0x{:02X}", byte),
            DecodeFault::UnknownDevice([hi, lo]) => {
                write!(f, "unknown device 0x{:02X}{:02X}", hi, lo)
            },
        }
    }
}

/// A decoded command value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No successful read yet
    #[default]
    Unavailable,
    /// Unscaled unsigned quantity
    Integer(u64),
    /// Scaled quantity
    Float(f64),
    /// Enumerated label
    Label(Cow<'static, str>),
    /// Decode-error sentinel
    Invalid(DecodeFault),
}

impl Value {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unavailable => f.write_str("n/a"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(v) => write!(f, "{}", v),
            Value::Label(label) => f.write_str(label),
            Value::Invalid(fault) => write!(f, "error ({})", fault),
        }
    }
}

/// Telemetry shape: numbers stay numbers, labels are strings, a missing
/// value is `null` and the decode-error sentinel is the string `"error"`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Unavailable => serializer.serialize_none(),
            Value::Integer(n) => serializer.serialize_u64(*n),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Label(label) => serializer.serialize_str(label),
            Value::Invalid(_) => serializer.serialize_str("error"),
        }
    }
}

/// Configured target of a write command, encoded once into its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SetPoint {
    Number(f64),
    Label(String),
    Raw(Vec<u8>),
}

impl fmt::Display for SetPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetPoint::Number(n) => write!(f, "{}", n),
            SetPoint::Label(label) => write!(f, "'{}'", label),
            SetPoint::Raw(bytes) => write!(f, "raw {}", common::hex::encode_upper(bytes)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_temperature_decode() {
        assert_eq!(Unit::Temperature.decode(&[0x64, 0x00]), Value::Float(10.0));
        assert_eq!(Unit::Temperature.decode(&[0xF6, 0xFF]), Value::Float(-1.0));
        assert_eq!(Unit::Temperature.decode(&[0xE1, 0x00]), Value::Float(22.5));
    }

    #[test]
    fn test_counter_decode() {
        assert_eq!(Unit::Counter.decode(&[0x0A, 0x00]), Value::Integer(10));
        assert_eq!(Unit::Status.decode(&[0x37]), Value::Integer(55));
        assert_eq!(Unit::ReturnStatus.decode(&[0x01]), Value::Integer(1));
        assert_eq!(Unit::Counter.decode(&[0x00, 0x01]), Value::Integer(256));
    }

    #[test]
    fn test_seconds_to_hours_decode() {
        assert_eq!(
            Unit::SecondsToHours.decode(&3600u32.to_le_bytes()),
            Value::Float(1.0)
        );
        assert_eq!(
            Unit::SecondsToHours.decode(&5400u32.to_le_bytes()),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_operating_mode_decode() {
        assert_eq!(
            Unit::OperatingMode.decode(&[0x00]),
            Value::Label(Cow::Borrowed("DHW only"))
        );
        assert_eq!(
            Unit::OperatingMode.decode(&[0x05]),
            Value::Label(Cow::Borrowed("Off"))
        );
        assert_eq!(
            Unit::OperatingMode.decode(&[0x09]),
            Value::Invalid(DecodeFault::UnmappedMode(0x09))
        );
    }

    #[test]
    fn test_device_type_decode() {
        assert_eq!(
            Unit::DeviceType.decode(&DEVICE_MAGIC_V200_KW1),
            Value::Label(Cow::Borrowed(DEVICE_LABEL_V200_KW1))
        );
        assert_eq!(
            Unit::DeviceType.decode(&[0x20, 0x98]),
            Value::Invalid(DecodeFault::UnknownDevice([0x20, 0x98]))
        );
    }

    #[test]
    fn test_fault_code_decode() {
        assert_eq!(
            Unit::FaultCode.decode(&[0x00]),
            Value::Label(Cow::Borrowed("No fault"))
        );
        assert_eq!(
            Unit::FaultCode.decode(&[0x1E]),
            Value::Label(Cow::Borrowed("Flow rate sensor fault (STRS1)"))
        );
        // Codes outside the table still decode, to a generic label
        assert_eq!(Unit::FaultCode.decode(&[0x03]).to_string(), "errorcode_03");
    }

    #[test]
    fn test_width_mismatch_is_sentinel() {
        let value = Unit::Temperature.decode(&[0x64]);
        assert!(value.is_invalid());
        assert_eq!(value.to_string(), "error (unexpected width 1 for temperature)");

        assert!(Unit::SecondsToHours.decode(&[0x10, 0x0E]).is_invalid());
        assert!(Unit::Counter.decode(&[]).is_invalid());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let raw = [0xF6, 0xFF];
        let first = Unit::Temperature.decode(&raw);
        for _ in 0..10 {
            assert_eq!(Unit::Temperature.decode(&raw), first);
        }
    }

    #[test]
    fn test_encode_numbers() {
        assert_eq!(
            Unit::Status.encode(&SetPoint::Number(60.0), 1).unwrap(),
            vec![0x3C]
        );
        assert_eq!(
            Unit::Counter.encode(&SetPoint::Number(300.0), 2).unwrap(),
            vec![0x2C, 0x01]
        );
        assert_eq!(
            Unit::Temperature.encode(&SetPoint::Number(-1.0), 2).unwrap(),
            vec![0xF6, 0xFF]
        );
        assert_eq!(
            Unit::SecondsToHours
                .encode(&SetPoint::Number(1.0), 4)
                .unwrap(),
            3600u32.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_encode_rejects_values_that_do_not_fit() {
        assert!(Unit::Status.encode(&SetPoint::Number(256.0), 1).is_err());
        assert!(Unit::Status.encode(&SetPoint::Number(-1.0), 1).is_err());
        assert!(Unit::Status.encode(&SetPoint::Number(1.5), 1).is_err());
        assert!(Unit::Temperature
            .encode(&SetPoint::Number(20.0), 1)
            .is_err());
        assert!(Unit::Status.encode(&SetPoint::Number(1.0), 0).is_err());
    }

    #[test]
    fn test_encode_operating_mode() {
        assert_eq!(
            Unit::OperatingMode
                .encode(&SetPoint::Label("dhw only".to_string()), 1)
                .unwrap(),
            vec![0x00]
        );
        assert_eq!(
            Unit::OperatingMode
                .encode(&SetPoint::Number(4.0), 1)
                .unwrap(),
            vec![0x04]
        );
        assert!(Unit::OperatingMode
            .encode(&SetPoint::Label("Turbo".to_string()), 1)
            .is_err());
        assert!(Unit::OperatingMode
            .encode(&SetPoint::Number(9.0), 1)
            .is_err());
    }

    #[test]
    fn test_encode_raw_and_unsupported() {
        assert_eq!(
            Unit::ReturnStatus
                .encode(&SetPoint::Raw(vec![0x01]), 1)
                .unwrap(),
            vec![0x01]
        );
        assert!(Unit::ReturnStatus
            .encode(&SetPoint::Raw(vec![0x01, 0x00]), 1)
            .is_err());
        assert!(Unit::DeviceType
            .encode(&SetPoint::Number(1.0), 2)
            .is_err());
    }

    #[test]
    fn test_value_serialization() {
        let json = |value: &Value| serde_json::to_string(value).unwrap();
        assert_eq!(json(&Value::Float(-1.0)), "-1.0");
        assert_eq!(json(&Value::Integer(10)), "10");
        assert_eq!(json(&Value::Label(Cow::Borrowed("Normal"))), "\"Normal\"");
        assert_eq!(json(&Value::Unavailable), "null");
        assert_eq!(
            json(&Value::Invalid(DecodeFault::UnmappedMode(9))),
            "\"error\""
        );
    }

    #[test]
    fn test_unit_aliases() {
        let units: Vec<Unit> =
            serde_yaml::from_str("[UT, ST, RT, CO, CS, BA, deviceType, fault_code]").unwrap();
        assert_eq!(
            units,
            vec![
                Unit::Temperature,
                Unit::Status,
                Unit::ReturnStatus,
                Unit::Counter,
                Unit::SecondsToHours,
                Unit::OperatingMode,
                Unit::DeviceType,
                Unit::FaultCode,
            ]
        );
    }
}
