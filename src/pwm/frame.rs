//wire framing for the serial PWM board
//frame format: [SYNC][TYPE][LEN][PAYLOAD...][CHECKSUM]
//              0xAA  1byte 1byte  LEN bytes   1byte
//checksum is the wrapping sum of TYPE, LEN and PAYLOAD

use crate::error::BackendError;
use super::PinId;

pub const SYNC_BYTE: u8 = 0xAA;
pub const MAX_MSG_SIZE: usize = 244;
pub const SERVO_PULSE_SIZE: usize = 3; //1 * u8 + 1 * u16

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType{
    ServoPulse = 0x03,
    Heartbeat = 0x04,
    Ack = 0x11,
}

impl MsgType{
    pub fn from_u8(val: u8) -> Option<Self>{
        match val{
            0x03 => Some(MsgType::ServoPulse),
            0x04 => Some(MsgType::Heartbeat),
            0x11 => Some(MsgType::Ack),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServoPulseCmd{
    pub pin: PinId,
    pub pulse: u16,   //drive units, 0 = output disabled
}

impl ServoPulseCmd{
    pub fn new(pin: PinId, pulse: u16) -> Self{
        ServoPulseCmd{ pin, pulse }
    }

    pub fn to_bytes(&self) -> [u8; SERVO_PULSE_SIZE]{
        let pulse = self.pulse.to_le_bytes();
        [self.pin, pulse[0], pulse[1]]
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self>{
        if data.len() < SERVO_PULSE_SIZE{
            return None;
        }
        Some(ServoPulseCmd{
            pin: data[0],
            pulse: u16::from_le_bytes([data[1], data[2]]),
        })
    }
}

pub fn calculate_checksum(data: &[u8]) -> u8{
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub fn encode_frame(msg_type: MsgType, payload: &[u8]) -> Result<Vec<u8>, BackendError>{
    if payload.len() > MAX_MSG_SIZE{
        return Err(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Payload too large"
        )));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(SYNC_BYTE);
    frame.push(msg_type as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    let checksum = calculate_checksum(&frame[1..]);
    frame.push(checksum);

    Ok(frame)
}

//pulls one complete frame off the front of `buffer`
//garbage before the sync byte and frames with bad checksums are dropped
pub fn try_parse_frame(buffer: &mut Vec<u8>) -> Option<(MsgType, Vec<u8>)>{
    loop{
        if buffer.len() < 4{
            return None;
        }

        let sync_pos = match buffer.iter().position(|&b| b == SYNC_BYTE){
            Some(pos) => pos,
            None =>{
                buffer.clear();
                return None;
            }
        };
        if sync_pos > 0{
            buffer.drain(0..sync_pos);
        }

        if buffer.len() < 4{
            return None;
        }

        let msg_type_byte = buffer[1];
        let len = buffer[2] as usize;

        if len > MAX_MSG_SIZE{
            buffer.remove(0);
            continue;
        }

        let frame_len = 4 + len; //sync + type + len + payload + checksum
        if buffer.len() < frame_len{
            return None;
        }

        let checksum = buffer[3 + len];
        if checksum != calculate_checksum(&buffer[1..3 + len]){
            buffer.remove(0);
            continue;
        }

        let payload = buffer[3..3 + len].to_vec();
        buffer.drain(0..frame_len);

        match MsgType::from_u8(msg_type_byte){
            Some(msg_type) => return Some((msg_type, payload)),
            None => continue, //unknown type, skip whole frame
        }
    }
}
