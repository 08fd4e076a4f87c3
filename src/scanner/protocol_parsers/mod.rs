// Protocol parsers and the confidence-scored dispatch over them.
//
// Every parser scores raw response bytes on its own; the dispatcher runs all of them against the
// same buffer and keeps the single best identification.

pub mod database_parsers;
pub mod industrial_parsers;
pub mod messaging_parsers;
pub mod network_parsers;
pub mod text_parsers;
pub mod tls_parser;
pub mod web_parsers;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{EngineError, Result};

use database_parsers::*;
use industrial_parsers::*;
use messaging_parsers::*;
use network_parsers::*;
use text_parsers::*;
use tls_parser::TlsParser;
use web_parsers::*;

/// Structured identification extracted from one response buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInfo {
    pub protocol: String,
    pub service: String,
    pub product: String,
    pub version: String,
    pub os: String,
    pub device_type: String,
    pub extra_info: String,
    pub confidence: u8,
    pub fields: BTreeMap<String, String>,
}

impl ParsedInfo {
    pub fn new(protocol: &str, confidence: u8) -> Self {
        Self {
            protocol: protocol.to_string(),
            service: protocol.to_string(),
            product: String::new(),
            version: String::new(),
            os: String::new(),
            device_type: String::new(),
            extra_info: String::new(),
            confidence,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.product = product.to_string();
        self
    }

    pub fn field(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }
}

/// A protocol recognizer: a structural score plus a field extractor.
///
/// Implementations hold no mutable state, so scoring the same bytes twice gives the same answer.
pub trait ProtocolParser: Send + Sync {
    fn protocol(&self) -> &'static str;

    /// Certainty (0-100) that `data` belongs to this protocol. Never panics on short input.
    fn confidence(&self, data: &[u8]) -> u8;

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo>;
}

/// Ordered parser registry. Registration order is the tie-break priority.
pub struct ParserDispatch {
    parsers: Vec<Box<dyn ProtocolParser>>,
}

impl ParserDispatch {
    pub fn new() -> Self {
        let parsers: Vec<Box<dyn ProtocolParser>> = vec![
            // Distinctive greetings and fixed binary headers first.
            Box::new(SshParser),
            Box::new(MqttParser),
            Box::new(TlsParser),
            Box::new(ModbusParser),
            Box::new(Dnp3Parser),
            Box::new(S7Parser),
            Box::new(OpcUaParser),
            Box::new(BacnetParser),
            Box::new(MySqlParser),
            Box::new(MongoDbParser),
            Box::new(SqlServerParser),
            Box::new(OracleParser),
            Box::new(CassandraParser),
            Box::new(AmqpParser),
            Box::new(RedisParser),
            Box::new(RtspParser),
            Box::new(SipParser),
            // HTTP-hosted products before plain HTTP.
            Box::new(ElasticsearchParser),
            Box::new(InfluxDbParser),
            Box::new(DockerParser),
            Box::new(KubernetesParser),
            Box::new(HikvisionParser),
            Box::new(OnvifParser),
            Box::new(MqttWebSocketParser),
            Box::new(HttpParser),
            Box::new(SmtpParser),
            Box::new(FtpParser),
            Box::new(Pop3Parser),
            Box::new(ImapParser),
            Box::new(SyslogParser),
            Box::new(PostgreSqlParser),
            Box::new(LdapParser),
            Box::new(KerberosParser),
            Box::new(RadiusParser),
            Box::new(NtpParser),
            Box::new(DnsParser),
            Box::new(SnmpParser),
            Box::new(CoapParser),
            Box::new(LoRaWanParser),
            Box::new(Neo4jParser),
            Box::new(OpenVpnParser),
            Box::new(WireGuardParser),
            Box::new(DahuaParser),
            Box::new(TelnetParser),
        ];
        Self { parsers }
    }

    pub fn with_parsers(parsers: Vec<Box<dyn ProtocolParser>>) -> Self {
        Self { parsers }
    }

    /// Runs every parser against `data` and returns the highest-confidence identification.
    ///
    /// Parsers scoring zero are skipped, a parse error discards only that parser, and equal
    /// confidences go to the parser registered first.
    pub fn dispatch(&self, data: &[u8]) -> Option<ParsedInfo> {
        if data.is_empty() {
            return None;
        }

        let mut best: Option<ParsedInfo> = None;
        for parser in &self.parsers {
            if parser.confidence(data) == 0 {
                continue;
            }
            let mut info = match parser.parse(data) {
                Ok(info) => info,
                Err(e) => {
                    debug!(protocol = parser.protocol(), error = %e, "parser discarded");
                    continue;
                }
            };
            info.confidence = info.confidence.min(100);
            if info.confidence == 0 {
                continue;
            }
            // Strictly greater keeps the earlier parser on ties.
            if best.as_ref().map_or(true, |b| info.confidence > b.confidence) {
                best = Some(info);
            }
        }
        best
    }
}

impl Default for ParserDispatch {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn text(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data)
}

/// True when every byte is printable ASCII or whitespace. Binary parsers whose headers have no
/// magic bytes use this to stay out of line-protocol banners.
pub(crate) fn is_text(data: &[u8]) -> bool {
    data.iter()
        .all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}

pub(crate) fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn too_short(protocol: &str, need: usize, got: usize) -> EngineError {
    EngineError::Parse {
        protocol: protocol.to_string(),
        reason: format!("need at least {} bytes, got {}", need, got),
    }
}

/// Case-insensitive HTTP-style header block. Keys are lowercased; later duplicates win.
pub(crate) fn header_map(content: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for line in content.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(idx) = line.find(':') {
            if idx > 0 {
                let key = line[..idx].trim().to_lowercase();
                let value = line[idx + 1..].trim().to_string();
                headers.insert(key, value);
            }
        }
    }
    headers
}

pub(crate) fn capture<'a>(re: &regex::Regex, haystack: &'a str, group: usize) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, u8);

    impl ProtocolParser for Fixed {
        fn protocol(&self) -> &'static str {
            self.0
        }
        fn confidence(&self, _data: &[u8]) -> u8 {
            self.1
        }
        fn parse(&self, _data: &[u8]) -> Result<ParsedInfo> {
            Ok(ParsedInfo::new(self.0, self.1))
        }
    }

    struct Broken;

    impl ProtocolParser for Broken {
        fn protocol(&self) -> &'static str {
            "broken"
        }
        fn confidence(&self, _data: &[u8]) -> u8 {
            100
        }
        fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
            Err(too_short("broken", 1000, data.len()))
        }
    }

    #[test]
    fn test_ties_go_to_earlier_registration() {
        let dispatch = ParserDispatch::with_parsers(vec![
            Box::new(Fixed("first", 80)),
            Box::new(Fixed("second", 80)),
        ]);
        assert_eq!(dispatch.dispatch(b"x").unwrap().protocol, "first");

        let reversed = ParserDispatch::with_parsers(vec![
            Box::new(Fixed("second", 80)),
            Box::new(Fixed("first", 80)),
        ]);
        assert_eq!(reversed.dispatch(b"x").unwrap().protocol, "second");
    }

    #[test]
    fn test_higher_confidence_beats_priority() {
        let dispatch = ParserDispatch::with_parsers(vec![
            Box::new(Fixed("low", 40)),
            Box::new(Fixed("high", 90)),
        ]);
        assert_eq!(dispatch.dispatch(b"x").unwrap().protocol, "high");
    }

    #[test]
    fn test_parse_error_discards_only_that_parser() {
        let dispatch = ParserDispatch::with_parsers(vec![
            Box::new(Broken),
            Box::new(Fixed("ok", 10)),
        ]);
        assert_eq!(dispatch.dispatch(b"x").unwrap().protocol, "ok");
    }

    #[test]
    fn test_over_range_confidence_is_clamped() {
        let dispatch = ParserDispatch::with_parsers(vec![Box::new(Fixed("loud", 250))]);
        assert_eq!(dispatch.dispatch(b"x").unwrap().confidence, 100);
    }

    #[test]
    fn test_empty_input_has_no_winner() {
        let dispatch = ParserDispatch::new();
        assert!(dispatch.dispatch(&[]).is_none());
        assert!(dispatch.parsers.iter().all(|p| p.confidence(&[]) == 0));
    }

    #[test]
    fn test_builtin_registry_has_unique_protocols() {
        let dispatch = ParserDispatch::new();
        let mut protocols: Vec<&str> = dispatch.parsers.iter().map(|p| p.protocol()).collect();
        assert!(protocols.len() >= 30);
        let total = protocols.len();
        protocols.sort();
        protocols.dedup();
        assert_eq!(protocols.len(), total);
    }

    #[test]
    fn test_short_buffers_never_panic() {
        let dispatch = ParserDispatch::new();
        let samples: Vec<Vec<u8>> = (0..=64u8)
            .flat_map(|len| {
                vec![
                    vec![0x00; len as usize],
                    vec![0xff; len as usize],
                    (0..len).collect(),
                    (0..len).map(|b| b.wrapping_mul(37).wrapping_add(3)).collect(),
                ]
            })
            .collect();
        for sample in &samples {
            for parser in &dispatch.parsers {
                assert!(parser.confidence(sample) <= 100);
            }
            if let Some(info) = dispatch.dispatch(sample) {
                assert!(info.confidence <= 100);
            }
        }
    }

    fn mysql_greeting() -> Vec<u8> {
        let mut payload = vec![10];
        payload.extend_from_slice(b"8.0.27-0ubuntu0.20.04.1\0");
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.extend_from_slice(b"abcdefgh\0");
        payload.extend_from_slice(&0xf7ffu16.to_le_bytes());
        payload.extend_from_slice(&[0x21, 0x02, 0x00]);

        let mut packet = (payload.len() as u32).to_le_bytes()[..3].to_vec();
        packet.push(0);
        packet.extend_from_slice(&payload);
        packet
    }

    fn snmp_get_response() -> Vec<u8> {
        let descr = b"Linux router 5.10.0";
        let mut varbind = network_parsers::SYS_DESCR_OID.to_vec();
        varbind.extend_from_slice(&[0x04, descr.len() as u8]);
        varbind.extend_from_slice(descr);

        let mut msg = vec![0x30, 0x00, 0x02, 0x01, 0x01, 0x04, 0x06];
        msg.extend_from_slice(b"public");
        msg.extend_from_slice(&[0xA2, varbind.len() as u8]);
        msg.extend_from_slice(&varbind);
        msg[1] = (msg.len() - 2) as u8;
        msg
    }

    fn builtin_samples() -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("ssh", b"SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5\r\n".to_vec()),
            ("http", b"HTTP/1.0 404 Not Found\r\n\r\n".to_vec()),
            ("http", b"HTTP/1.1 200 OK\r\nServer: Apache-Coyote/1.1\r\n\r\n".to_vec()),
            ("ftp", b"220 ProFTPD Server ready.\r\n".to_vec()),
            ("smtp", b"220 mail.example.org ESMTP Exim 4.94\r\n".to_vec()),
            ("pop3", b"+OK Dovecot ready.\r\n".to_vec()),
            ("imap", b"* OK [CAPABILITY IMAP4rev1] Dovecot ready.\r\n".to_vec()),
            ("redis", b"+PONG\r\n".to_vec()),
            ("redis", b"-ERR unknown command\r\n".to_vec()),
            ("mysql", mysql_greeting()),
            ("postgresql", vec![b'R', 0, 0, 0, 8, 0, 0, 0, 0]),
            ("postgresql", vec![b'R', 0, 0, 0, 12, 0, 0, 0, 5, 0x01, 0x02, 0x03, 0x04]),
            ("snmp", snmp_get_response()),
            ("ldap", vec![0x30, 0x0C, 0x02, 0x01, 0x01, 0x61, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00]),
            ("tls", vec![0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x28]),
            ("modbus", vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x01, 0x02, 0x00, 0x00]),
            ("mqtt", vec![0x20, 0x02, 0x00, 0x00]),
        ]
    }

    #[test]
    fn test_builtin_dispatch_picks_expected_service() {
        let dispatch = ParserDispatch::new();
        for (expected, bytes) in builtin_samples() {
            let info = dispatch
                .dispatch(&bytes)
                .unwrap_or_else(|| panic!("no identification for {expected} sample {bytes:02x?}"));
            assert_eq!(info.protocol, expected, "sample {:?}", text(&bytes));
            assert!(info.confidence > 0 && info.confidence <= 100);
        }
    }

    #[test]
    fn test_dispatch_is_deterministic() {
        let dispatch = ParserDispatch::new();
        for (_, bytes) in builtin_samples() {
            assert_eq!(dispatch.dispatch(&bytes), dispatch.dispatch(&bytes));
        }
        let again = ParserDispatch::new();
        let sample = snmp_get_response();
        assert_eq!(dispatch.dispatch(&sample), again.dispatch(&sample));
    }

    #[test]
    fn test_builtin_parse_error_drops_candidate() {
        // OPC UA scores a bare chunk header but cannot parse it; nothing else claims it.
        assert!(ParserDispatch::new().dispatch(b"HELF").is_none());
    }

    #[test]
    fn test_integer_helpers_bounds() {
        assert_eq!(be_u16(&[0x12, 0x34], 0), Some(0x1234));
        assert_eq!(be_u16(&[0x12], 0), None);
        assert_eq!(le_u32(&[1, 0, 0, 0, 9], 0), Some(1));
        assert_eq!(be_u32(&[1, 2, 3], 0), None);
        assert_eq!(le_u16(&[0x34, 0x12], 0), Some(0x1234));
    }
}
