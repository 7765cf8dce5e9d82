use crate::mac_address::MacAddress;

/// A stable scale address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xC8, 0x47, 0x8C, 0x01, 0x23, 0x45]);

/// Encode one EIR field: length byte (type + data), type byte, data.
pub fn eir_field(field_type: u8, data: &[u8]) -> Vec<u8> {
    let mut field = Vec::with_capacity(2 + data.len());
    field.push((data.len() + 1) as u8);
    field.push(field_type);
    field.extend_from_slice(data);
    field
}

/// Encode a weight-scale service-data EIR field with the given status byte
/// and raw value.
pub fn scale_service_data(status: u8, raw: u16) -> Vec<u8> {
    let uuid = crate::eir::WEIGHT_SCALE_UUID.to_le_bytes();
    let value = raw.to_le_bytes();
    eir_field(
        crate::eir::EIR_SERVICE_DATA,
        &[uuid[0], uuid[1], status, value[0], value[1]],
    )
}

/// Build a complete HCI LE advertising report frame carrying `eir` as the
/// advertised data of a single report from `addr`.
pub fn advertising_frame(addr: MacAddress, eir: &[u8]) -> Vec<u8> {
    let mut wire_addr = addr.0;
    wire_addr.reverse(); // reports carry the address LSB first

    // subevent + report count + event type + address type + address
    // + data length + data + RSSI
    let param_len = 4 + 6 + 1 + eir.len() + 1;

    let mut frame = vec![
        0x04, // HCI event packet
        0x3E, // LE meta event
        param_len as u8,
        0x02, // LE advertising report subevent
        0x01, // one report
        0x00, // ADV_IND
        0x00, // public address
    ];
    frame.extend_from_slice(&wire_addr);
    frame.push(eir.len() as u8);
    frame.extend_from_slice(eir);
    frame.push(0xC8); // RSSI
    frame
}
