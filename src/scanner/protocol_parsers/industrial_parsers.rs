// Industrial control and surveillance protocols: Modbus/TCP, DNP3, BACnet/IP, OPC UA binary,
// Siemens S7 over ISO-on-TCP, and the Dahua DVRIP binary protocol.

use super::{be_u16, be_u32, le_u32, too_short, ParsedInfo, ProtocolParser};
use crate::error::Result;

pub struct ModbusParser;

fn modbus_function_name(code: u8) -> String {
    fn base(code: u8) -> Option<&'static str> {
        match code {
            0x01 => Some("Read Coils"),
            0x02 => Some("Read Discrete Inputs"),
            0x03 => Some("Read Holding Registers"),
            0x04 => Some("Read Input Registers"),
            0x05 => Some("Write Single Coil"),
            0x06 => Some("Write Single Register"),
            0x0F => Some("Write Multiple Coils"),
            0x10 => Some("Write Multiple Registers"),
            0x16 => Some("Mask Write Register"),
            0x17 => Some("Read/Write Multiple Registers"),
            _ => None,
        }
    }

    if code >= 0x80 {
        return match base(code - 0x80) {
            Some(name) => format!("{} (Exception)", name),
            None => "Exception Response".to_string(),
        };
    }
    base(code).map_or_else(|| format!("Unknown (0x{:02x})", code), str::to_string)
}

impl ModbusParser {
    // MBAP header: transaction(2) protocol(2) length(2) unit(1), then the function code.
    fn is_adu(data: &[u8]) -> bool {
        if data.len() < 8 || be_u16(data, 2) != Some(0) {
            return false;
        }
        let function = data[7];
        let length_ok = matches!(be_u16(data, 4), Some(len) if (2..=254).contains(&len));
        length_ok && (function <= 0x18 || (0x80..=0x98).contains(&function))
    }
}

impl ProtocolParser for ModbusParser {
    fn protocol(&self) -> &'static str {
        "modbus"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_adu(data) {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 8 {
            return Err(too_short("modbus", 8, data.len()));
        }
        let mut info = ParsedInfo::new("modbus", 80).with_product("Modbus TCP Server");

        let function = data[7];
        let name = modbus_function_name(function);
        info.field("transaction_id", be_u16(data, 0).unwrap_or(0).to_string());
        info.field("protocol_id", be_u16(data, 2).unwrap_or(0).to_string());
        info.field("length", be_u16(data, 4).unwrap_or(0).to_string());
        info.field("unit_id", data[6].to_string());
        info.field("function_code", function.to_string());
        info.field("function_name", name.as_str());

        if function >= 0x80 {
            info.field("exception_response", "true");
            info.field("exception_code", data.get(8).map(|c| c.to_string()).unwrap_or_default());
            info.extra_info = "Modbus Exception Response".into();
        } else {
            info.extra_info = format!("Modbus Function: {}", name);
        }

        info.confidence = if Self::is_adu(data) { 95 } else { 0 };
        Ok(info)
    }
}

pub struct Dnp3Parser;

fn dnp3_function_name(code: u8, primary: bool) -> String {
    let name = if primary {
        match code {
            0 => Some("Reset Link"),
            1 => Some("Reset User Process"),
            2 => Some("Test Link"),
            3 => Some("Confirmed User Data"),
            4 => Some("Unconfirmed User Data"),
            9 => Some("Request Link Status"),
            _ => None,
        }
    } else {
        match code {
            0 => Some("ACK"),
            1 => Some("NACK"),
            11 => Some("Link Status"),
            14 => Some("Link Not Functioning"),
            15 => Some("Link Not Used"),
            _ => None,
        }
    };
    name.map_or_else(|| format!("Unknown ({})", code), str::to_string)
}

impl ProtocolParser for Dnp3Parser {
    fn protocol(&self) -> &'static str {
        "dnp3"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.starts_with(&[0x05, 0x64]) {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("dnp3", 80).with_product("DNP3 Outstation");
        if data.len() < 10 || !data.starts_with(&[0x05, 0x64]) {
            return Ok(info);
        }

        let control = data[3];
        let primary = (control >> 6) & 1 == 1;
        let function = control & 0x0F;
        let name = dnp3_function_name(function, primary);

        info.field("start_bytes", "0x0564");
        info.field("length", data[2].to_string());
        info.field("control", format!("0x{:02x}", control));
        // Link addresses are little-endian on the wire.
        info.field("destination", u16::from_le_bytes([data[4], data[5]]).to_string());
        info.field("source", u16::from_le_bytes([data[6], data[7]]).to_string());
        info.field("direction", ((control >> 7) & 1).to_string());
        info.field("primary", u8::from(primary).to_string());
        info.field("frame_count_bit", ((control >> 5) & 1).to_string());
        info.field("frame_count_valid", ((control >> 4) & 1).to_string());
        info.field("function_code", function.to_string());
        info.field("function_name", name.as_str());
        info.extra_info = format!("DNP3 {}", name);
        info.confidence = 95;
        Ok(info)
    }
}

pub struct BacnetParser;

fn bvlc_function_name(function: u8) -> String {
    let name = match function {
        0x00 => "BVLC-Result",
        0x01 => "Write-Broadcast-Distribution-Table",
        0x02 => "Read-Broadcast-Distribution-Table",
        0x03 => "Read-Broadcast-Distribution-Table-Ack",
        0x04 => "Forwarded-NPDU",
        0x05 => "Register-Foreign-Device",
        0x06 => "Read-Foreign-Device-Table",
        0x07 => "Read-Foreign-Device-Table-Ack",
        0x08 => "Delete-Foreign-Device-Table-Entry",
        0x09 => "Distribute-Broadcast-To-Network",
        0x0A => "Original-Unicast-NPDU",
        0x0B => "Original-Broadcast-NPDU",
        other => return format!("Unknown (0x{:02x})", other),
    };
    name.to_string()
}

impl ProtocolParser for BacnetParser {
    fn protocol(&self) -> &'static str {
        "bacnet"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() >= 4 && data[0] == 0x81 && data[1] <= 0x0B {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 4 {
            return Err(too_short("bacnet", 4, data.len()));
        }
        let mut info = ParsedInfo::new("bacnet", 80).with_product("BACnet Device");

        info.field("bvlc_type", format!("0x{:02x}", data[0]));
        info.field("bvlc_function", format!("0x{:02x}", data[1]));
        info.field("bvlc_length", be_u16(data, 2).unwrap_or(0).to_string());

        if data[0] == 0x81 {
            let name = bvlc_function_name(data[1]);
            info.confidence = 90;
            info.field("network_type", "BACnet/IP");
            info.field("bvlc_function_name", name.as_str());
            if let &[version, control, ..] = &data[4..] {
                info.field("npdu_version", version.to_string());
                info.field("npdu_control", format!("0x{:02x}", control));
                info.field("network_layer_message", ((control >> 7) & 1).to_string());
                info.field("destination_specifier", ((control >> 5) & 1).to_string());
                info.field("source_specifier", ((control >> 3) & 1).to_string());
                info.field("expecting_reply", ((control >> 2) & 1).to_string());
                info.field("network_priority", (control & 0x03).to_string());
            }
            info.extra_info = format!("BACnet/IP {}", name);
        }
        Ok(info)
    }
}

pub struct OpcUaParser;

const OPCUA_MESSAGE_TYPES: [(&[u8; 3], &str, u8); 6] = [
    (b"HEL", "Hello", 95),
    (b"ACK", "Acknowledge", 95),
    (b"ERR", "Error", 95),
    (b"MSG", "Message", 90),
    (b"OPN", "OpenSecureChannel", 90),
    (b"CLO", "CloseSecureChannel", 90),
];

impl OpcUaParser {
    fn message_type(data: &[u8]) -> Option<(&'static str, u8)> {
        let head = data.get(0..3)?;
        // Chunk type: F(inal), C(ontinue) or A(bort).
        if !matches!(data.get(3), Some(b'F' | b'C' | b'A')) {
            return None;
        }
        OPCUA_MESSAGE_TYPES
            .iter()
            .find(|(tag, _, _)| tag.as_slice() == head)
            .map(|(_, name, confidence)| (*name, *confidence))
    }

    /// Hello and Acknowledge share five leading u32 little-endian parameters.
    fn parse_buffer_params(body: &[u8], prefix: &str, info: &mut ParsedInfo) {
        let names = [
            "protocol_version",
            "receive_buffer_size",
            "send_buffer_size",
            "max_message_size",
            "max_chunk_count",
        ];
        if body.len() < 20 {
            return;
        }
        for (i, name) in names.iter().enumerate() {
            if let Some(value) = le_u32(body, i * 4) {
                info.field(&format!("{}{}", prefix, name), value.to_string());
            }
        }
    }
}

impl ProtocolParser for OpcUaParser {
    fn protocol(&self) -> &'static str {
        "opcua"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::message_type(data).is_some() {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 8 {
            return Err(too_short("opcua", 8, data.len()));
        }
        let mut info = ParsedInfo::new("opcua", 80).with_product("OPC UA Server");

        info.field("message_type", String::from_utf8_lossy(&data[0..3]));
        info.field("chunk_type", (data[3] as char).to_string());
        info.field("message_size", le_u32(data, 4).unwrap_or(0).to_string());

        let body = &data[8..];
        let name = match Self::message_type(data) {
            Some((name, confidence)) => {
                info.confidence = confidence;
                name
            }
            None => "Unknown",
        };
        info.field("message_name", name);

        match &data[0..3] {
            b"HEL" => {
                Self::parse_buffer_params(body, "", &mut info);
                if let Some(url_len) = le_u32(body, 20) {
                    if let Some(url) = body.get(24..24 + url_len as usize) {
                        info.field("endpoint_url", String::from_utf8_lossy(url));
                    }
                }
            }
            b"ACK" => Self::parse_buffer_params(body, "server_", &mut info),
            b"ERR" => {
                if let Some(code) = le_u32(body, 0) {
                    info.field("error_code", format!("0x{:08x}", code));
                }
            }
            _ => {}
        }

        info.extra_info = format!("OPC UA {}", name);
        Ok(info)
    }
}

pub struct S7Parser;

impl ProtocolParser for S7Parser {
    fn protocol(&self) -> &'static str {
        "s7"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() < 4 || data[0] != 0x03 || data[1] != 0x00 {
            return 0;
        }
        match data.get(5) {
            Some(0xE0 | 0xD0 | 0xF0) => 95,
            _ => 80,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("s7", 80).with_product("Siemens S7 PLC");
        if data.len() < 4 || data[0] != 0x03 || data[1] != 0x00 {
            return Ok(info);
        }

        info.confidence = 90;
        info.field("tpkt_version", "3");
        info.field("tpkt_length", be_u16(data, 2).unwrap_or(0).to_string());
        info.extra_info = "Siemens S7 Communication".into();

        // COTP: length(1) pdu_type(1) dst_ref(2) src_ref(2) class(1)
        let cotp = &data[4..];
        let Some(&cotp_len) = cotp.first() else {
            return Ok(info);
        };
        info.field("cotp_length", cotp_len.to_string());

        let Some(&pdu_type) = cotp.get(1) else {
            return Ok(info);
        };
        info.field("cotp_pdu_type", format!("0x{:02x}", pdu_type));
        let pdu_name = match pdu_type {
            0xE0 => "Connection Request (CR)",
            0xD0 => "Connection Confirm (CC)",
            0x80 => "Disconnect Request (DR)",
            0xC0 => "Disconnect Confirm (DC)",
            0xF0 => "Data (DT)",
            _ => "Unknown",
        };
        info.field("cotp_pdu_name", pdu_name);

        if pdu_type == 0xE0 || pdu_type == 0xD0 {
            info.confidence = 95;
            let params = &cotp[2..];
            if let (Some(dst), Some(src)) = (be_u16(params, 0), be_u16(params, 2)) {
                info.field("destination_reference", dst.to_string());
                info.field("source_reference", src.to_string());
                if let Some(&class_option) = params.get(4) {
                    info.field("class_option", format!("0x{:02x}", class_option));
                    info.field("transport_class", (class_option >> 4).to_string());
                }
            }
        }
        Ok(info)
    }
}

pub struct DahuaParser;

impl ProtocolParser for DahuaParser {
    fn protocol(&self) -> &'static str {
        "dahua"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() >= 4 && matches!(data[0], 0xa0 | 0xb0) {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("dahua", 85).with_product("Dahua IP Camera");
        if data.len() < 4 || !matches!(data[0], 0xa0 | 0xb0) {
            return Ok(info);
        }

        info.field("protocol_header", format!("0x{:02x}", data[0]));
        info.confidence = 90;
        let length = (u32::from(data[1]) << 16) | (u32::from(data[2]) << 8) | u32::from(data[3]);
        info.field("packet_length", length.to_string());

        if data[0] == 0xb0 {
            // DVRIP login reply.
            info.field("command_name", "Login Response");
            info.confidence = 95;
        } else if let Some(command) = be_u32(data, 4) {
            info.field("command_type", format!("0x{:08x}", command));
            let name = match command {
                0x01 => Some("Login Request"),
                0x02 => Some("Login Response"),
                0x03 => Some("Logout"),
                0x1000 => Some("Keep Alive"),
                _ => None,
            };
            if let Some(name) = name {
                info.field("command_name", name);
            }
            if command == 0x02 {
                info.confidence = 95;
            }
        }

        if let Some(session) = be_u32(data, 12) {
            info.field("session_id", format!("0x{:08x}", session));
        }
        Ok(info)
    }
}
