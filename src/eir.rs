//! EIR (Extended Inquiry Response) parsing for Mi Scale advertisements.
//!
//! The scale broadcasts its current reading as a service-data field inside the
//! advertised data: a little-endian Weight Scale service UUID (0x181D), one
//! status byte, and a little-endian 16-bit raw weight value. This module walks
//! the length-prefixed EIR fields with bounds-checked indexing and extracts a
//! [`WeightReading`] from every recognized field.

use crate::reading::{MeasureState, WeightReading, WeightUnit};

/// EIR field type for service data (Bluetooth Core Spec assigned number).
pub const EIR_SERVICE_DATA: u8 = 0x16;

/// GATT Weight Scale service UUID.
pub const WEIGHT_SCALE_UUID: u16 = 0x181D;

// Scale status codes for kilogram mode
const STATUS_KG_ACTIVE: u8 = 0x02;
const STATUS_KG_STABLE: u8 = 0x22;
const STATUS_KG_IDLE: u8 = 0xA2;

/// The firmware encodes weight at 20 raw units per 0.1 kg.
const RAW_PER_TENTH_KG: u16 = 20;

/// One field of an EIR sequence: a type byte and its data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EirField<'a> {
    pub field_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the length-prefixed fields of an EIR byte sequence.
///
/// Each field is encoded as `[length, type, data...]` where `length` covers
/// the type byte plus the data. Iteration stops at a zero length byte or when
/// a declared length would run past the end of the buffer; a truncated
/// trailer is not an error, there is simply no more usable data.
#[derive(Debug)]
pub struct EirFields<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> EirFields<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        EirFields { buf, offset: 0 }
    }
}

impl<'a> Iterator for EirFields<'a> {
    type Item = EirField<'a>;

    fn next(&mut self) -> Option<EirField<'a>> {
        let length = *self.buf.get(self.offset)? as usize;
        if length == 0 || self.offset + length + 1 > self.buf.len() {
            return None;
        }

        let field = EirField {
            field_type: self.buf[self.offset + 1],
            data: &self.buf[self.offset + 2..self.offset + 1 + length],
        };
        self.offset += length + 1;
        Some(field)
    }
}

fn state_for_status(code: u8) -> Option<MeasureState> {
    match code {
        STATUS_KG_ACTIVE => Some(MeasureState::Active),
        STATUS_KG_STABLE => Some(MeasureState::Stable),
        STATUS_KG_IDLE => Some(MeasureState::Idle),
        _ => None,
    }
}

/// Decode one service-data payload into a weight reading.
///
/// Layout: UUID low, UUID high, status, value low, value high. Returns `None`
/// for short payloads, foreign UUIDs and unrecognized status codes.
fn reading_from_service_data(data: &[u8]) -> Option<WeightReading> {
    if data.len() < 5 {
        return None;
    }

    let uuid = u16::from_le_bytes([data[0], data[1]]);
    if uuid != WEIGHT_SCALE_UUID {
        return None;
    }

    let state = state_for_status(data[2])?;
    let raw = u16::from_le_bytes([data[3], data[4]]);

    Some(WeightReading {
        state,
        unit: WeightUnit::Kilograms,
        tenths_of_kg: raw / RAW_PER_TENTH_KG,
    })
}

/// Extract weight readings from an EIR byte sequence.
///
/// Every field is visited until the walk hits a truncated trailer; an
/// advertisement carries at most one weight field in practice, but nothing
/// here assumes that. Fields that are not recognizable weight-scale service
/// data are skipped without error.
pub fn decode_readings(eir: &[u8]) -> Vec<WeightReading> {
    EirFields::new(eir)
        .filter(|field| field.field_type == EIR_SERVICE_DATA)
        .filter_map(|field| reading_from_service_data(field.data))
        .collect()
}
