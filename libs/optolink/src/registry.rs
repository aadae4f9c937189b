//! Command registry
//!
//! Read commands are polled every cycle in registration order; write commands
//! are control actions looked up by an external identifier, each carrying a
//! payload encoded once when the registry is built.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{SetPoint, Unit};
use crate::error::{OptolinkError, Result};

/// KW1 virtual read
pub const OPCODE_READ: u8 = 0xF7;
/// KW1 virtual write
pub const OPCODE_WRITE: u8 = 0xF4;

/// Command direction, carried on the wire as the opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Read,
    Write,
}

impl Opcode {
    pub fn byte(self) -> u8 {
        match self {
            Opcode::Read => OPCODE_READ,
            Opcode::Write => OPCODE_WRITE,
        }
    }
}

/// Immutable identity of a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub opcode: Opcode,
    pub address: u16,
    pub length: u8,
    pub unit: Unit,
    pub description: String,
}

impl CommandSpec {
    /// `opcode || address (big-endian) || length`
    pub fn header(&self) -> [u8; 4] {
        let [hi, lo] = self.address.to_be_bytes();
        [self.opcode.byte(), hi, lo, self.length]
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{:04X}/{}({})",
            self.name, self.address, self.length, self.unit
        )
    }
}

/// A named control action with its pre-encoded payload
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCommand {
    /// External action identifier (control inbox key)
    pub id: String,
    pub spec: CommandSpec,
    frame: Bytes,
}

impl WriteCommand {
    fn new(id: String, spec: CommandSpec, payload: &[u8]) -> Self {
        let mut frame = BytesMut::with_capacity(4 + payload.len());
        frame.put_slice(&spec.header());
        frame.put_slice(payload);
        Self {
            id,
            spec,
            frame: frame.freeze(),
        }
    }

    /// Complete request frame: header followed by the payload
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn payload(&self) -> &[u8] {
        &self.frame[4..]
    }
}

/// Immutable command table, built once at startup
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    reads: Vec<CommandSpec>,
    writes: Vec<Arc<WriteCommand>>,
    write_index: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Validate the configured command set and encode all write payloads.
    pub fn build(config: &CommandSetConfig) -> Result<Self> {
        let mut reads = Vec::with_capacity(config.reads.len());
        let mut names = HashSet::new();

        for read in &config.reads {
            if read.name.trim().is_empty() {
                return Err(OptolinkError::config("read command with empty name"));
            }
            if !names.insert(read.name.as_str()) {
                return Err(OptolinkError::config(format!(
                    "duplicate read command '{}'",
                    read.name
                )));
            }
            if !read.unit.accepted_width().contains(&usize::from(read.length)) {
                return Err(OptolinkError::config(format!(
                    "read command '{}': length {} is not valid for {}",
                    read.name, read.length, read.unit
                )));
            }
            reads.push(CommandSpec {
                name: read.name.clone(),
                opcode: Opcode::Read,
                address: read.address,
                length: read.length,
                unit: read.unit,
                description: description_or_name(&read.description, &read.name),
            });
        }

        let mut writes = Vec::with_capacity(config.writes.len());
        let mut write_index = HashMap::new();

        for write in &config.writes {
            if !is_action_id(&write.id) {
                return Err(OptolinkError::config(format!(
                    "write action id '{}' must match [A-Za-z0-9_-]+",
                    write.id
                )));
            }
            if RESERVED_ACTION_IDS.contains(&write.id.as_str()) {
                return Err(OptolinkError::config(format!(
                    "write action id '{}' is reserved",
                    write.id
                )));
            }
            if write_index.contains_key(&write.id) {
                return Err(OptolinkError::config(format!(
                    "duplicate write action '{}'",
                    write.id
                )));
            }
            let payload = write
                .unit
                .encode(&write.value, usize::from(write.length))
                .map_err(|e| {
                    OptolinkError::config(format!("write action '{}': {}", write.id, e))
                })?;
            let spec = CommandSpec {
                name: write.name.clone(),
                opcode: Opcode::Write,
                address: write.address,
                length: write.length,
                unit: write.unit,
                description: description_or_name(&write.description, &write.id),
            };
            write_index.insert(write.id.clone(), writes.len());
            writes.push(Arc::new(WriteCommand::new(write.id.clone(), spec, &payload)));
        }

        Ok(Self {
            reads,
            writes,
            write_index,
        })
    }

    /// Read commands in poll order
    pub fn reads(&self) -> &[CommandSpec] {
        &self.reads
    }

    /// Write actions in registration order
    pub fn writes(&self) -> &[Arc<WriteCommand>] {
        &self.writes
    }

    pub fn write(&self, id: &str) -> Option<Arc<WriteCommand>> {
        self.write_index
            .get(id)
            .map(|&index| Arc::clone(&self.writes[index]))
    }

    pub fn read_position(&self, name: &str) -> Option<usize> {
        self.reads.iter().position(|r| r.name == name)
    }
}

fn description_or_name(description: &str, fallback: &str) -> String {
    if description.trim().is_empty() {
        fallback.to_string()
    } else {
        description.to_string()
    }
}

/// Paths the control inbox serves itself
const RESERVED_ACTION_IDS: [&str; 2] = ["health", "api"];

fn is_action_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ============================================================================
// Configuration
// ============================================================================

/// A polled read command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadCommandConfig {
    pub name: String,
    #[serde(with = "hex_address")]
    pub address: u16,
    pub length: u8,
    pub unit: Unit,
    #[serde(default)]
    pub description: String,
}

/// A control action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCommandConfig {
    /// External action identifier
    pub id: String,
    pub name: String,
    #[serde(with = "hex_address")]
    pub address: u16,
    pub length: u8,
    pub unit: Unit,
    #[serde(default)]
    pub description: String,
    /// Target encoded into the payload
    pub value: SetPoint,
}

/// Complete command set of one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSetConfig {
    #[serde(default)]
    pub reads: Vec<ReadCommandConfig>,
    #[serde(default)]
    pub writes: Vec<WriteCommandConfig>,
}

impl Default for CommandSetConfig {
    fn default() -> Self {
        Self::kw1()
    }
}

impl CommandSetConfig {
    /// Built-in command set for a Vitodens 200 on the KW1 protocol
    pub fn kw1() -> Self {
        use Unit::*;

        let reads = vec![
            read("operating_mode", 0x2301, 1, OperatingMode, "Operating mode"),
            read("party_mode", 0x2303, 1, ReturnStatus, "Party mode"),
            read("party_temp_target", 0x2308, 1, Status, "Party temperature"),
            read("outside_temp", 0x0800, 2, Temperature, "Outside temperature"),
            read("dhw_temp", 0x0804, 2, Temperature, "Hot water actual"),
            read("dhw_temp_target", 0x6300, 1, Status, "Hot water target"),
            read("boiler_temp", 0x0802, 2, Temperature, "Boiler actual"),
            read("boiler_temp_target", 0x5502, 2, Temperature, "Boiler target"),
            read("room_temp_target", 0x2306, 1, Status, "Room target"),
            read("burner_status", 0x551E, 1, ReturnStatus, "Burner status"),
            read("burner_starts", 0x088A, 2, Counter, "Burner starts"),
            read("burner_hours_1", 0x08A7, 4, SecondsToHours, "Burner hours stage 1"),
            read("burner_hours_2", 0x08AB, 4, SecondsToHours, "Burner hours stage 2"),
            read("heating_pump", 0x2906, 1, ReturnStatus, "Heating pump"),
            read("cylinder_pump", 0x0845, 1, ReturnStatus, "Cylinder pump"),
            read("circulation_pump", 0x0846, 1, ReturnStatus, "Circulation pump"),
            read("fault_status", 0x7579, 1, ReturnStatus, "Fault"),
            read("burner_fault", 0x0883, 1, ReturnStatus, "Burner fault"),
        ];

        let party = |id: &str, on: bool| WriteCommandConfig {
            id: id.to_string(),
            name: "set_party_mode".to_string(),
            address: 0x2303,
            length: 1,
            unit: ReturnStatus,
            description: format!("Party mode {}", if on { "on" } else { "off" }),
            value: SetPoint::Number(if on { 1.0 } else { 0.0 }),
        };
        let mode = |id: &str, label: &str| WriteCommandConfig {
            id: id.to_string(),
            name: "set_operating_mode".to_string(),
            address: 0x2301,
            length: 1,
            unit: OperatingMode,
            description: format!("Mode: {}", label),
            value: SetPoint::Label(label.to_string()),
        };
        let dhw = |target: u8| WriteCommandConfig {
            id: format!("dhw_{}", target),
            name: "set_dhw_temp_target".to_string(),
            address: 0x6300,
            length: 1,
            unit: Status,
            description: format!("Hot water target {}", target),
            value: SetPoint::Number(f64::from(target)),
        };

        let writes = vec![
            party("party_on", true),
            party("party_off", false),
            mode("mode_dhw", "DHW only"),
            mode("mode_all", "Heating and DHW (constant)"),
            dhw(60),
            dhw(55),
            dhw(50),
            dhw(45),
        ];

        Self { reads, writes }
    }
}

fn read(name: &str, address: u16, length: u8, unit: Unit, description: &str) -> ReadCommandConfig {
    ReadCommandConfig {
        name: name.to_string(),
        address,
        length,
        unit,
        description: description.to_string(),
    }
}

/// Addresses are written the way device documentation lists them: hex, with
/// or without a `0x` prefix.
mod hex_address {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(address: &u16, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04X}", address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
        let text = String::deserialize(deserializer)?;
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u16::from_str_radix(digits, 16)
            .map_err(|e| D::Error::custom(format!("invalid address '{}': {}", text, e)))
    }
}
