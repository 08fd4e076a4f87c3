// IoT and message broker protocols: MQTT, AMQP, CoAP and the Semtech LoRaWAN packet forwarder.

use super::{be_u16, be_u32, is_text, too_short, ParsedInfo, ProtocolParser};
use crate::error::Result;

pub struct MqttParser;

/// Decodes an MQTT variable-length integer: 7 bits per byte, high bit set means another byte follows.
///
/// Returns `(value, bytes_used)`. More than four bytes, or a buffer ending mid-integer, is invalid.
pub fn decode_remaining_length(data: &[u8]) -> Option<(u32, usize)> {
    let mut multiplier: u32 = 1;
    let mut value: u32 = 0;

    for (index, &byte) in data.iter().enumerate() {
        if index >= 4 {
            return None;
        }
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Some((value, index + 1));
        }
        multiplier *= 128;
    }
    None
}

fn mqtt_packet_name(kind: u8) -> &'static str {
    match kind {
        1 => "CONNECT",
        2 => "CONNACK",
        3 => "PUBLISH",
        4 => "PUBACK",
        5 => "PUBREC",
        6 => "PUBREL",
        7 => "PUBCOMP",
        8 => "SUBSCRIBE",
        9 => "SUBACK",
        10 => "UNSUBSCRIBE",
        11 => "UNSUBACK",
        12 => "PINGREQ",
        13 => "PINGRESP",
        14 => "DISCONNECT",
        _ => "Reserved",
    }
}

fn mqtt_return_code_name(code: u8) -> String {
    match code {
        0 => "Connection Accepted".into(),
        1 => "Connection Refused: Unacceptable Protocol Version".into(),
        2 => "Connection Refused: Identifier Rejected".into(),
        3 => "Connection Refused: Server Unavailable".into(),
        4 => "Connection Refused: Bad User Name or Password".into(),
        5 => "Connection Refused: Not Authorized".into(),
        other => format!("Unknown ({})", other),
    }
}

/// Fixed header of the first control packet in a buffer.
struct MqttFrame {
    kind: u8,
    remaining: usize,
    /// Offset of the variable header.
    body: usize,
}

impl MqttParser {
    /// Accepts a buffer only when it is a run of whole control packets. Each fixed header must
    /// carry the reserved flag bits its type requires, and its remaining length must land inside
    /// the buffer. Several packets may arrive together, e.g. a CONNACK followed by a retained
    /// PUBLISH.
    fn frame(data: &[u8]) -> Option<MqttFrame> {
        if is_text(data) {
            return None;
        }
        let first = Self::header(data)?;
        let mut end = first.body + first.remaining;
        while end < data.len() {
            let next = Self::header(&data[end..])?;
            end += next.body + next.remaining;
        }
        Some(first)
    }

    fn header(data: &[u8]) -> Option<MqttFrame> {
        let &first = data.first()?;
        let (kind, flags) = (first >> 4, first & 0x0F);
        let (remaining, used) = decode_remaining_length(data.get(1..)?)?;
        let remaining = remaining as usize;
        let body = 1 + used;
        let variable = data.get(body..body + remaining)?;

        let shaped = match kind {
            1 => flags == 0 && variable.len() >= 10,
            2 => flags == 0 && Self::connack_shaped(variable),
            // QoS 3 is reserved; the topic must fit in the packet.
            3 => {
                flags & 0x06 != 0x06
                    && be_u16(variable, 0).map_or(false, |topic| 2 + topic as usize <= remaining)
            }
            4 | 5 | 7 | 11 => flags == 0 && remaining >= 2,
            6 | 8 | 10 => flags == 0x02 && remaining >= 2,
            9 => flags == 0 && remaining >= 3,
            12 | 13 => flags == 0 && remaining == 0,
            14 => flags == 0,
            _ => false,
        };
        shaped.then_some(MqttFrame { kind, remaining, body })
    }

    /// 3.1.1 sends exactly the ack flags and a return code 0-5. MQTT 5 appends properties and
    /// answers with reason code 0 or 0x80-0x9F.
    fn connack_shaped(variable: &[u8]) -> bool {
        match variable {
            [ack, code] => *ack <= 1 && *code <= 5,
            [ack, code, _, ..] => *ack <= 1 && (*code == 0 || (0x80..=0x9F).contains(code)),
            _ => false,
        }
    }

    fn parse_connect(data: &[u8], body: usize, info: &mut ParsedInfo) {
        let Some(name_len) = be_u16(data, body) else {
            return;
        };
        let mut offset = body + 2;
        let Some(name) = data.get(offset..offset + name_len as usize) else {
            return;
        };
        info.field("protocol_name", String::from_utf8_lossy(name));
        offset += name_len as usize;

        // level, flags, keep-alive
        let Some(&[level, flags, ka_hi, ka_lo]) = data.get(offset..offset + 4) else {
            return;
        };
        info.field("protocol_level", level.to_string());
        info.version = match level {
            3 => "3.1".to_string(),
            4 => "3.1.1".to_string(),
            5 => "5.0".to_string(),
            other => format!("Unknown ({})", other),
        };
        info.field("clean_session", ((flags >> 1) & 1).to_string());
        info.field("will_flag", ((flags >> 2) & 1).to_string());
        info.field("will_qos", ((flags >> 3) & 3).to_string());
        info.field("will_retain", ((flags >> 5) & 1).to_string());
        info.field("password_flag", ((flags >> 6) & 1).to_string());
        info.field("username_flag", ((flags >> 7) & 1).to_string());
        info.field("keep_alive", u16::from_be_bytes([ka_hi, ka_lo]).to_string());
    }

    fn parse_connack(data: &[u8], body: usize, info: &mut ParsedInfo) {
        let (Some(&ack_flags), Some(&code)) = (data.get(body), data.get(body + 1)) else {
            return;
        };
        let name = mqtt_return_code_name(code);
        info.field("session_present", (ack_flags & 1).to_string());
        info.field("return_code", code.to_string());
        info.field("return_code_name", name.as_str());
        info.extra_info = if code == 0 {
            "Connection Accepted".to_string()
        } else {
            format!("Connection Refused: {}", name)
        };
    }

    fn parse_publish(data: &[u8], body: usize, info: &mut ParsedInfo) {
        let Some(topic_len) = be_u16(data, body) else {
            return;
        };
        let mut offset = body + 2;
        let Some(topic) = data.get(offset..offset + topic_len as usize) else {
            return;
        };
        info.field("topic", String::from_utf8_lossy(topic));
        offset += topic_len as usize;

        let qos = (data[0] >> 1) & 0x03;
        if qos > 0 {
            if let Some(packet_id) = be_u16(data, offset) {
                info.field("packet_id", packet_id.to_string());
                offset += 2;
            }
        }

        if let Some(payload) = data.get(offset..).filter(|p| !p.is_empty()) {
            info.field("payload_length", payload.len().to_string());
            if payload.len() <= 100 {
                info.field("payload", String::from_utf8_lossy(payload));
            }
        }
    }
}

impl ProtocolParser for MqttParser {
    fn protocol(&self) -> &'static str {
        "mqtt"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        match Self::frame(data) {
            Some(frame) if frame.kind == 2 => 95,
            Some(_) => 80,
            None => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 2 {
            return Err(too_short("mqtt", 2, data.len()));
        }
        let Some(frame) = Self::frame(data) else {
            // Not a whole control packet: nothing past the first byte is trustworthy.
            return Ok(ParsedInfo::new("mqtt", 0));
        };

        let mut info = ParsedInfo::new("mqtt", 80).with_product("MQTT Broker");
        let kind = frame.kind;
        info.field("message_type", kind.to_string());
        info.field("dup", ((data[0] >> 3) & 1).to_string());
        info.field("qos", ((data[0] >> 1) & 3).to_string());
        info.field("retain", (data[0] & 1).to_string());
        info.field("message_type_name", mqtt_packet_name(kind));
        info.field("remaining_length", frame.remaining.to_string());
        info.field("length_bytes", (frame.body - 1).to_string());

        let packet = &data[..frame.body + frame.remaining];
        let body = frame.body;
        match kind {
            1 => Self::parse_connect(packet, body, &mut info),
            2 => {
                Self::parse_connack(packet, body, &mut info);
                info.confidence = 95;
            }
            3 => Self::parse_publish(packet, body, &mut info),
            4 => info.field("message_description", "Publish Acknowledgment"),
            8 => info.field("message_description", "Subscribe Request"),
            9 => info.field("message_description", "Subscribe Acknowledgment"),
            12 => info.field("message_description", "Ping Request"),
            13 => {
                info.field("message_description", "Ping Response");
                info.confidence = 90;
            }
            14 => info.field("message_description", "Disconnect"),
            _ => {}
        }
        Ok(info)
    }
}

pub struct AmqpParser;

impl AmqpParser {
    /// General frame: type(1) channel(2) size(4) payload(size) frame-end 0xCE.
    fn is_frame(data: &[u8]) -> bool {
        if data.len() < 8 || !(1..=4).contains(&data[0]) {
            return false;
        }
        match be_u32(data, 3) {
            // A complete frame must carry the end marker where the size says it is.
            Some(size) => data.get(7 + size as usize).map_or(true, |&end| end == 0xCE),
            None => false,
        }
    }
}

impl ProtocolParser for AmqpParser {
    fn protocol(&self) -> &'static str {
        "amqp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.starts_with(b"AMQP") {
            95
        } else if Self::is_frame(data) {
            80
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 8 {
            return Err(too_short("amqp", 8, data.len()));
        }
        let mut info = ParsedInfo::new("amqp", 80).with_product("AMQP Broker");

        if data.starts_with(b"AMQP") {
            // The broker rejected our version and answered with the header it supports.
            info.confidence = 95;
            info.field("protocol_header", "AMQP");
            info.field("protocol_id", data[4].to_string());
            info.version = format!("{}.{}.{}", data[5], data[6], data[7]);
            info.extra_info = format!("AMQP {}", info.version);
            return Ok(info);
        }

        let frame_type = data[0];
        info.field("frame_type", frame_type.to_string());
        info.field("channel", be_u16(data, 1).unwrap_or(0).to_string());
        info.field("frame_size", be_u32(data, 3).unwrap_or(0).to_string());
        let name = match frame_type {
            1 => "METHOD".to_string(),
            2 => "HEADER".to_string(),
            3 => "BODY".to_string(),
            4 => "HEARTBEAT".to_string(),
            other => format!("Unknown ({})", other),
        };
        info.field("frame_type_name", name);
        if Self::is_frame(data) {
            info.confidence = 90;
        }

        // Connection.Start carries the server properties table in clear text.
        let body = String::from_utf8_lossy(data);
        if body.contains("RabbitMQ") {
            info.product = "RabbitMQ".into();
        } else if body.contains("Apache Qpid") {
            info.product = "Apache Qpid".into();
        }
        Ok(info)
    }
}

pub struct CoapParser;

fn coap_code_name(code: u8) -> String {
    let name = match code {
        0 => "Empty",
        1 => "GET",
        2 => "POST",
        3 => "PUT",
        4 => "DELETE",
        65 => "2.01 Created",
        66 => "2.02 Deleted",
        67 => "2.03 Valid",
        68 => "2.04 Changed",
        69 => "2.05 Content",
        128 => "4.00 Bad Request",
        129 => "4.01 Unauthorized",
        130 => "4.02 Bad Option",
        131 => "4.03 Forbidden",
        132 => "4.04 Not Found",
        160 => "5.00 Internal Server Error",
        161 => "5.01 Not Implemented",
        162 => "5.02 Bad Gateway",
        163 => "5.03 Service Unavailable",
        164 => "5.04 Gateway Timeout",
        _ => return format!("{}.{:02}", code >> 5, code & 0x1F),
    };
    name.to_string()
}

/// Value of an option delta or length nibble plus the extended bytes it consumed.
fn coap_option_value(nibble: u8, ext: &[u8]) -> Option<(usize, usize)> {
    match nibble {
        0..=12 => Some((nibble as usize, 0)),
        13 => Some((13 + *ext.first()? as usize, 1)),
        14 => Some((269 + be_u16(ext, 0)? as usize, 2)),
        _ => None,
    }
}

impl CoapParser {
    fn is_message(data: &[u8]) -> bool {
        if data.len() < 4 || is_text(data) {
            return false;
        }
        let version = data[0] >> 6;
        let token_len = (data[0] & 0x0F) as usize;
        let code = data[1];
        if version != 1 || token_len > 8 || data.len() < 4 + token_len {
            return false;
        }
        match code >> 5 {
            // Empty messages are exactly the four-byte header.
            0 => code == 0 && token_len == 0 && data.len() == 4,
            2 | 4 | 5 => Self::options_fit(&data[4 + token_len..]),
            _ => false,
        }
    }

    /// Options run to the end of the buffer or to a payload marker with a non-empty payload.
    fn options_fit(options: &[u8]) -> bool {
        let mut at = 0;
        while let Some(&head) = options.get(at) {
            if head == 0xFF {
                return at + 1 < options.len();
            }
            at += 1;
            let Some((_, delta_ext)) = coap_option_value(head >> 4, &options[at..]) else {
                return false;
            };
            at += delta_ext;
            let Some((length, length_ext)) = coap_option_value(head & 0x0F, &options[at..]) else {
                return false;
            };
            at += length_ext + length;
            if at > options.len() {
                return false;
            }
        }
        true
    }
}

impl ProtocolParser for CoapParser {
    fn protocol(&self) -> &'static str {
        "coap"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_message(data) {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 4 {
            return Err(too_short("coap", 4, data.len()));
        }
        if !Self::is_message(data) {
            return Ok(ParsedInfo::new("coap", 0));
        }
        let mut info = ParsedInfo::new("coap", 85).with_product("CoAP Server");

        let version = data[0] >> 6;
        let message_type = (data[0] >> 4) & 0x03;
        let code = data[1];
        info.field("version", version.to_string());
        info.field("message_type", message_type.to_string());
        info.field("token_length", (data[0] & 0x0F).to_string());
        info.field("code", code.to_string());
        info.field("message_id", be_u16(data, 2).unwrap_or(0).to_string());
        info.field(
            "message_type_name",
            match message_type {
                0 => "Confirmable (CON)",
                1 => "Non-confirmable (NON)",
                2 => "Acknowledgement (ACK)",
                _ => "Reset (RST)",
            },
        );

        if code > 0 {
            info.field("code_name", coap_code_name(code));
            info.confidence = 90;
        }
        Ok(info)
    }
}

pub struct LoRaWanParser;

impl ProtocolParser for LoRaWanParser {
    fn protocol(&self) -> &'static str {
        "lorawan"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        match data {
            [version, _, _, identifier, ..] if (*version == 1 || *version == 2) && *identifier <= 0x05 => 85,
            _ => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 4 {
            return Err(too_short("lorawan", 4, data.len()));
        }
        let mut info = ParsedInfo::new("lorawan", 80).with_product("LoRaWAN Gateway");

        let version = data[0];
        let identifier = data[3];
        info.field("protocol_version", version.to_string());
        info.field("token", format!("0x{:04x}", be_u16(data, 1).unwrap_or(0)));
        info.field("identifier", format!("0x{:02x}", identifier));
        let name = match identifier {
            0x00 => "PUSH_DATA".to_string(),
            0x01 => "PUSH_ACK".to_string(),
            0x02 => "PULL_DATA".to_string(),
            0x03 => "PULL_RESP".to_string(),
            0x04 => "PULL_ACK".to_string(),
            0x05 => "TX_ACK".to_string(),
            other => format!("Unknown (0x{:02x})", other),
        };
        info.field("identifier_name", name);

        if let Some(eui) = data.get(4..12) {
            let eui: String = eui.iter().map(|b| format!("{:02x}", b)).collect();
            info.field("gateway_eui", eui);
            info.confidence = 95;
        }
        if version == 1 || version == 2 {
            info.confidence = 90;
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connack_accepted() {
        let connack = [0x20, 0x02, 0x00, 0x00];
        assert_eq!(MqttParser.confidence(&connack), 95);

        let info = MqttParser.parse(&connack).unwrap();
        assert_eq!(info.service, "mqtt");
        assert_eq!(info.product, "MQTT Broker");
        assert_eq!(info.confidence, 95);
        assert_eq!(info.fields["session_present"], "0");
        assert_eq!(info.extra_info, "Connection Accepted");
    }

    #[test]
    fn test_connack_refused() {
        let info = MqttParser.parse(&[0x20, 0x02, 0x00, 0x05]).unwrap();
        assert_eq!(info.fields["return_code_name"], "Connection Refused: Not Authorized");
        assert!(info.extra_info.starts_with("Connection Refused"));
    }

    #[test]
    fn test_remaining_length_varint() {
        assert_eq!(decode_remaining_length(&[0x00]), Some((0, 1)));
        assert_eq!(decode_remaining_length(&[0x7F]), Some((127, 1)));
        assert_eq!(decode_remaining_length(&[0x80, 0x01]), Some((128, 2)));
        assert_eq!(decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0x7F]), Some((268_435_455, 4)));
        assert_eq!(decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]), None);
        assert_eq!(decode_remaining_length(&[0x80]), None);
    }

    #[test]
    fn test_overlong_length_is_rejected() {
        let packet = [0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(MqttParser.confidence(&packet), 0);
        assert_eq!(MqttParser.parse(&packet).unwrap().confidence, 0);
    }

    #[test]
    fn test_publish_topic_and_payload() {
        let mut packet = vec![0x30, 0x0C, 0x00, 0x05];
        packet.extend_from_slice(b"a/b/c");
        packet.extend_from_slice(b"hello");
        let info = MqttParser.parse(&packet).unwrap();
        assert_eq!(info.fields["topic"], "a/b/c");
        assert_eq!(info.fields["payload"], "hello");
    }

    #[test]
    fn test_line_protocol_replies_are_not_mqtt() {
        let replies: [&[u8]; 6] = [
            b"+PONG\r\n",
            b"+OK Dovecot ready.\r\n",
            b"* OK [CAPABILITY IMAP4rev1] Dovecot ready.\r\n",
            b"220 ProFTPD Server ready.\r\n",
            b"220 mail.example.org ESMTP Postfix\r\n",
            b"HTTP/1.0 404 Not Found\r\n\r\n",
        ];
        for reply in replies {
            assert_eq!(MqttParser.confidence(reply), 0, "{:?}", String::from_utf8_lossy(reply));
            assert_eq!(MqttParser.parse(reply).unwrap().confidence, 0);
        }
    }

    #[test]
    fn test_asn1_sequences_are_not_publish() {
        // 0x30 reads as PUBLISH, but the "topic length" 0x0201 overruns the packet.
        let ldap = [0x30, 0x0C, 0x02, 0x01, 0x01, 0x61, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00];
        assert_eq!(MqttParser.confidence(&ldap), 0);

        let mut snmp = vec![0x30, 0x0D, 0x02, 0x01, 0x01, 0x04, 0x06];
        snmp.extend_from_slice(b"public");
        snmp.extend_from_slice(&[0xA2, 0x00]);
        assert_eq!(MqttParser.confidence(&snmp), 0);
    }

    #[test]
    fn test_packets_must_cover_the_buffer() {
        // CONNACK and PINGRESP in one read
        let pair = [0x20, 0x02, 0x00, 0x00, 0xD0, 0x00];
        assert_eq!(MqttParser.confidence(&pair), 95);
        let info = MqttParser.parse(&pair).unwrap();
        assert_eq!(info.fields["message_type_name"], "CONNACK");
        assert_eq!(info.fields["remaining_length"], "2");

        assert_eq!(MqttParser.confidence(&[0x20, 0x02, 0x00, 0x00, 0x41]), 0);
        assert_eq!(MqttParser.confidence(&[0x20, 0x02, 0x00]), 0);
        assert_eq!(MqttParser.confidence(&[0x20, 0x02, 0x00, 0x06]), 0);
        assert_eq!(MqttParser.confidence(&[0x21, 0x02, 0x00, 0x00]), 0);
        assert_eq!(MqttParser.confidence(&[0xD0, 0x00]), 80);
        assert_eq!(MqttParser.parse(&[0xD0, 0x00]).unwrap().confidence, 90);
    }

    #[test]
    fn test_single_byte_is_a_parse_error() {
        assert!(MqttParser.parse(&[0x20]).is_err());
        assert!(CoapParser.parse(&[0x60, 0x00]).is_err());
    }

    #[test]
    fn test_amqp_protocol_header() {
        let data = b"AMQP\x00\x00\x09\x01";
        assert_eq!(AmqpParser.confidence(data), 95);
        let info = AmqpParser.parse(data).unwrap();
        assert_eq!(info.version, "0.9.1");
    }

    #[test]
    fn test_amqp_connection_start_frame() {
        let mut frame = vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0C];
        frame.extend_from_slice(b"\x00\x0A\x00\x0ARabbitMQ");
        frame.push(0xCE);
        assert_eq!(AmqpParser.confidence(&frame), 80);
        let info = AmqpParser.parse(&frame).unwrap();
        assert_eq!(info.product, "RabbitMQ");
        assert_eq!(info.fields["frame_type_name"], "METHOD");
    }

    #[test]
    fn test_coap_rejects_text() {
        assert_eq!(CoapParser.confidence(b"SSH-2.0-x"), 0);
        assert_eq!(CoapParser.confidence(&[0x60, 0x45, 0x12, 0x34]), 85);
        let info = CoapParser.parse(&[0x60, 0x45, 0x12, 0x34]).unwrap();
        assert_eq!(info.fields["code_name"], "2.05 Content");
        assert_eq!(info.fields["message_type_name"], "Acknowledgement (ACK)");
    }

    #[test]
    fn test_coap_empty_message_is_bare_header() {
        let empty_ack = [0x60, 0x00, 0x12, 0x34];
        assert_eq!(CoapParser.confidence(&empty_ack), 85);
        let info = CoapParser.parse(&empty_ack).unwrap();
        assert_eq!(info.confidence, 85);
        assert!(!info.fields.contains_key("code_name"));

        assert_eq!(CoapParser.confidence(&[0x60, 0x00, 0x12, 0x34, 0x00]), 0);
        // PostgreSQL auth and error replies: version bits 01, token length set, code 0
        assert_eq!(CoapParser.confidence(&[b'R', 0, 0, 0, 8, 0, 0, 0, 5]), 0);
        let mut pg_error = b"E\x00\x00\x00\x00SFATAL\x00".to_vec();
        pg_error[4] = (pg_error.len() - 1) as u8;
        assert_eq!(CoapParser.confidence(&pg_error), 0);
        assert_eq!(CoapParser.parse(&pg_error).unwrap().confidence, 0);
    }

    #[test]
    fn test_coap_options_and_payload() {
        let mut response = vec![0x60, 0x45, 0x12, 0x34, 0xC1, 0x28, 0xFF];
        response.extend_from_slice(b"hi");
        assert_eq!(CoapParser.confidence(&response), 85);
        assert_eq!(CoapParser.parse(&response).unwrap().confidence, 90);

        // payload marker with nothing after it
        assert_eq!(CoapParser.confidence(&[0x60, 0x45, 0x12, 0x34, 0xFF]), 0);
        // option length runs past the buffer
        assert_eq!(CoapParser.confidence(&[0x60, 0x45, 0x12, 0x34, 0xC4, 0x28]), 0);
    }

    #[test]
    fn test_lorawan_push_ack() {
        let data = [0x02, 0x12, 0x34, 0x01];
        assert_eq!(LoRaWanParser.confidence(&data), 85);
        let info = LoRaWanParser.parse(&data).unwrap();
        assert_eq!(info.fields["identifier_name"], "PUSH_ACK");
        assert_eq!(info.fields["token"], "0x1234");
    }
}
