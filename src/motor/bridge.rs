// Serial line bridge to the vehicle's microcontroller
//
// The microcontroller owns the motor terminals, the shared PWM output and the
// HC-SR04 trigger/echo pins. The host drives it with framed packets:
// [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Responses use the same framing with a status byte in place of the instruction.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::driver::{DriveOutputs, GroupDrive, Side};
use crate::obstacle::{RangeSensor, SensorError};

/// Bridge answers well within this; an echo read takes at most ~30ms
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Id the bridge firmware answers to
pub const BRIDGE_ID: u8 = 0x01;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    SetGroup = 0x10, // params: side, terminal 1, terminal 2
    SetDuty = 0x11,  // params: duty lo, duty hi
    ReadEcho = 0x12, // response: echo width in us, lo/hi (0 = no echo)
}

/// Error types for bridge communication
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from bridge {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for bridge {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Bridge {id} returned error status: 0x{status:02X}")]
    Status { id: u8, status: u8 },

    #[error("Timeout waiting for response from bridge {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// One's complement of the byte sum over id, length and body
fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// `[HEADER, id, len, op, body.., checksum]`, len counting op + body + checksum
fn frame(id: u8, op: u8, body: &[u8]) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    out.extend([id, body.len() as u8 + 2, op]);
    out.extend_from_slice(body);
    out.push(checksum(&out[HEADER.len()..]));
    out
}

fn invalid(id: u8, reason: String) -> BridgeError {
    BridgeError::InvalidResponse { id, reason }
}

/// Read one response frame from `from` and return its body.
/// The op slot of a response carries the bridge status, nonzero is an error.
fn read_frame<R: Read + ?Sized>(from: &mut R, id: u8) -> Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    from.read_exact(&mut prefix).map_err(|e| match e.kind() {
        std::io::ErrorKind::TimedOut => BridgeError::Timeout { id },
        _ => BridgeError::Io(e),
    })?;

    let [h0, h1, got_id, len] = prefix;
    if [h0, h1] != HEADER {
        return Err(invalid(id, format!("bad header {:02X?}", [h0, h1])));
    }
    if got_id != id {
        return Err(invalid(id, format!("answer from id {}", got_id)));
    }
    if len < 2 {
        return Err(invalid(id, format!("length {} below minimum", len)));
    }

    let mut rest = vec![0u8; len as usize];
    from.read_exact(&mut rest)?;
    let Some((&sum, payload)) = rest.split_last() else {
        return Err(invalid(id, "empty frame".into()));
    };
    let expected = !payload
        .iter()
        .fold(got_id.wrapping_add(len), |acc, b| acc.wrapping_add(*b));
    if sum != expected {
        return Err(BridgeError::ChecksumMismatch { id });
    }

    match payload.split_first() {
        Some((0, body)) => Ok(body.to_vec()),
        Some((&status, _)) => Err(BridgeError::Status { id, status }),
        None => Err(invalid(id, "missing status".into())),
    }
}

/// Serial connection to the motor/sensor bridge
pub struct LineBridge {
    port: Box<dyn SerialPort>,
    id: u8,
}

impl LineBridge {
    /// Open a new connection to the bridge
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, crate::config::BRIDGE_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            id: BRIDGE_ID,
        })
    }

    /// Second handle on the same link. Requests are strictly sequential
    /// (main loop only), so the handles never interleave packets.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            port: self.port.try_clone()?,
            id: self.id,
        })
    }

    /// Send a request and wait for its response parameters
    fn transact(&mut self, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        self.port.write_all(&frame(self.id, instruction as u8, params))?;
        self.port.flush()?;
        read_frame(&mut self.port, self.id)
    }

    /// Check that the bridge is answering
    pub fn ping(&mut self) -> Result<bool> {
        match self.transact(Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(BridgeError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drive the two terminals of one motor group
    pub fn set_group(&mut self, side: Side, drive: GroupDrive) -> Result<()> {
        let (in1, in2) = drive.terminals();
        debug!("Set {:?} group: in1={}, in2={}", side, in1, in2);
        self.transact(
            Instruction::SetGroup,
            &[side as u8, in1 as u8, in2 as u8],
        )?;
        Ok(())
    }

    /// Write the shared duty-cycle output
    pub fn set_duty(&mut self, duty: u16) -> Result<()> {
        debug!("Set duty: {}", duty);
        self.transact(Instruction::SetDuty, &duty.to_le_bytes())?;
        Ok(())
    }

    /// Trigger one ultrasonic measurement, returns echo width in us (0 = no echo)
    pub fn read_echo(&mut self) -> Result<u32> {
        let response = self.transact(Instruction::ReadEcho, &[])?;
        if response.len() < 2 {
            return Err(BridgeError::InvalidResponse {
                id: self.id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            });
        }
        Ok(u16::from_le_bytes([response[0], response[1]]) as u32)
    }
}

impl DriveOutputs for LineBridge {
    type Error = BridgeError;

    fn set_group(&mut self, side: Side, drive: GroupDrive) -> Result<()> {
        LineBridge::set_group(self, side, drive)
    }

    fn set_duty(&mut self, duty: u16) -> Result<()> {
        LineBridge::set_duty(self, duty)
    }
}

impl RangeSensor for LineBridge {
    fn echo_us(&mut self) -> std::result::Result<u32, SensorError> {
        Ok(self.read_echo()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // responses share the request framing, status in the op slot
    fn response(id: u8, status: u8, params: &[u8]) -> Vec<u8> {
        frame(id, status, params)
    }

    #[test]
    fn test_checksum() {
        // ~(1+5+0x10+0+1+0) = ~23 = 232
        let data = [1u8, 5, 0x10, 0, 1, 0];
        assert_eq!(checksum(&data), 232);
    }

    #[test]
    fn test_build_set_group_packet() {
        let (in1, in2) = GroupDrive::Backward.terminals();
        let packet = frame(
            BRIDGE_ID,
            Instruction::SetGroup as u8,
            &[Side::Right as u8, in1 as u8, in2 as u8],
        );
        assert_eq!(packet.len(), 9);
        assert_eq!(&packet[..5], &[0xFF, 0xFF, BRIDGE_ID, 5, 0x10]);
        assert_eq!(&packet[5..8], &[1, 0, 1]);
        assert_eq!(packet[8], checksum(&packet[2..8]));
    }

    #[test]
    fn test_read_frame_params() {
        let raw = response(BRIDGE_ID, 0, &[0x10, 0x27]);
        let params = read_frame(&mut Cursor::new(raw), BRIDGE_ID).unwrap();
        assert_eq!(u16::from_le_bytes([params[0], params[1]]), 10_000);
    }

    #[test]
    fn test_read_frame_rejects_bad_checksum() {
        let mut raw = response(BRIDGE_ID, 0, &[0x01]);
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let err = read_frame(&mut Cursor::new(raw), BRIDGE_ID).unwrap_err();
        assert!(matches!(err, BridgeError::ChecksumMismatch { id: BRIDGE_ID }));
    }

    #[test]
    fn test_read_frame_reports_status_and_id() {
        let raw = response(BRIDGE_ID, 0x04, &[]);
        let err = read_frame(&mut Cursor::new(raw), BRIDGE_ID).unwrap_err();
        assert!(matches!(err, BridgeError::Status { status: 0x04, .. }));

        let raw = response(0x02, 0, &[]);
        let err = read_frame(&mut Cursor::new(raw), BRIDGE_ID).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidResponse { .. }));
    }

    #[test]
    fn test_read_frame_short_length_and_timeout() {
        let raw = vec![0xFF, 0xFF, BRIDGE_ID, 1, 0];
        let err = read_frame(&mut Cursor::new(raw), BRIDGE_ID).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidResponse { .. }));

        struct Silent;
        impl Read for Silent {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::ErrorKind::TimedOut.into())
            }
        }
        let err = read_frame(&mut Silent, BRIDGE_ID).unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { id: BRIDGE_ID }));
    }
}
