// Database wire protocols: MySQL, PostgreSQL, MongoDB, SQL Server (TDS), Oracle (TNS), Cassandra
// (CQL native protocol) and Neo4j (Bolt).

use lazy_static::lazy_static;
use regex::Regex;

use super::{be_u16, be_u32, capture, le_u16, le_u32, too_short, ParsedInfo, ProtocolParser};
use crate::error::Result;

lazy_static! {
    static ref SEMVER_PREFIX: Regex = Regex::new(r"^(\d+\.\d+\.\d+)").unwrap();
    static ref MARIADB: Regex = Regex::new(r"(\d+\.\d+\.\d+)-MariaDB").unwrap();
    static ref UBUNTU_BUILD: Regex = Regex::new(r"ubuntu0\.(\d+\.\d+)").unwrap();
}

const MYSQL_CAPABILITIES: [(u16, &str); 6] = [
    (0x0001, "LONG_PASSWORD"),
    (0x0002, "FOUND_ROWS"),
    (0x0004, "LONG_FLAG"),
    (0x0008, "CONNECT_WITH_DB"),
    (0x0800, "PROTOCOL_41"),
    (0x8000, "SSL"),
];

pub struct MySqlParser;

impl MySqlParser {
    fn parse_version_string(version: &str, info: &mut ParsedInfo) {
        let lower = version.to_lowercase();
        if let Some(v) = capture(&SEMVER_PREFIX, version, 1) {
            info.version = v.into();
        }

        if lower.contains("mariadb") {
            info.product = "MariaDB".into();
            info.confidence = 98;
            // 5.5.5- prefix is a replication compatibility shim; the real version follows it.
            if let Some(v) = capture(&MARIADB, version, 1) {
                info.version = v.into();
            }
        } else if lower.contains("percona") {
            info.product = "Percona Server".into();
            info.confidence = 98;
        }

        if version.contains("ubuntu") {
            info.os = "Ubuntu".into();
            if let Some(v) = capture(&UBUNTU_BUILD, version, 1) {
                info.field("ubuntu_version", v);
            }
        } else if version.contains("debian") {
            info.os = "Debian".into();
        } else if version.contains("el7") {
            info.os = "CentOS/RHEL".into();
            info.field("rhel_version", "7");
        } else if version.contains("el8") {
            info.os = "CentOS/RHEL".into();
            info.field("rhel_version", "8");
        }

        if version.contains("-log") {
            info.field("logging_enabled", "true");
        }
        if version.contains("cll-lve") {
            info.extra_info = "CloudLinux LVE".into();
        }
        if lower.contains("rds") {
            info.field("cloud_provider", "AWS RDS");
        }
    }

    // thread_id(4) auth_data(8) filler(1) capability_flags_lower(2) ...
    fn parse_handshake(rest: &[u8], info: &mut ParsedInfo) {
        if let Some(thread_id) = le_u32(rest, 0) {
            info.field("thread_id", thread_id.to_string());
        }
        if rest.len() < 15 {
            return;
        }
        let Some(caps) = le_u16(rest, 13) else {
            return;
        };
        info.field("capabilities", format!("0x{:04x}", caps));
        let flags: Vec<&str> = MYSQL_CAPABILITIES
            .iter()
            .filter(|(bit, _)| caps & bit != 0)
            .map(|(_, name)| *name)
            .collect();
        if !flags.is_empty() {
            info.field("capability_flags", flags.join(","));
        }
        if caps & 0x8000 != 0 {
            info.field("ssl_support", "true");
        }
    }

    fn parse_error_packet(data: &[u8], info: &mut ParsedInfo) {
        // header(4) 0xff code(2) message
        if let Some(code) = le_u16(data, 5) {
            info.field("error_code", code.to_string());
        }
        if let Some(message) = data.get(7..) {
            // 4.1 protocol inserts "#" plus a five character SQLSTATE before the text.
            let message = match message.first() {
                Some(b'#') => message.get(6..).unwrap_or_default(),
                _ => message,
            };
            let message = String::from_utf8_lossy(message);
            info.field("error_message", message.trim());
            if message.contains("MariaDB") {
                info.product = "MariaDB".into();
            }
        }
        info.extra_info = "Connection rejected".into();
    }
}

impl ProtocolParser for MySqlParser {
    fn protocol(&self) -> &'static str {
        "mysql"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() <= 4 || data[3] != 0 {
            return 0;
        }
        match data[4] {
            10 => 90,
            // Error packet sent instead of a greeting, e.g. "Host ... is not allowed to connect".
            0xFF if String::from_utf8_lossy(data).contains("MySQL")
                || String::from_utf8_lossy(data).contains("MariaDB") =>
            {
                85
            }
            _ => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 5 {
            return Err(too_short("mysql", 5, data.len()));
        }
        let mut info = ParsedInfo::new("mysql", 85).with_product("MySQL");

        let protocol_version = data[4];
        info.field("protocol_version", protocol_version.to_string());
        if protocol_version == 0xFF {
            Self::parse_error_packet(data, &mut info);
            return Ok(info);
        }
        if protocol_version == 10 {
            info.confidence = 95;
        }

        let window = &data[5..data.len().min(5 + 50)];
        if let Some(end) = window.iter().position(|&b| b == 0).filter(|&end| end > 0) {
            let version = String::from_utf8_lossy(&window[..end]).into_owned();
            info.field("server_version", version.as_str());
            Self::parse_version_string(&version, &mut info);
            if let Some(rest) = data.get(5 + end + 1..) {
                Self::parse_handshake(rest, &mut info);
            }
        }
        Ok(info)
    }
}

pub struct PostgreSqlParser;

impl PostgreSqlParser {
    /// Backend message: tag(1) length(4, includes itself) body. Returns the full message size.
    fn message_len(data: &[u8], at: usize) -> Option<usize> {
        let tag = *data.get(at)?;
        let len = be_u32(data, at + 1)? as usize;
        (tag.is_ascii_uppercase() && (4..=16_384).contains(&len)).then_some(len + 1)
    }

    /// `None` unless the buffer opens with an error or authentication message; otherwise whether
    /// whole backend messages account for every byte.
    fn framing(data: &[u8]) -> Option<bool> {
        if !matches!(data.first(), Some(b'E' | b'R')) {
            return None;
        }
        let mut end = Self::message_len(data, 0)?;
        while end < data.len() {
            match Self::message_len(data, end) {
                Some(len) => end += len,
                None => return Some(false),
            }
        }
        Some(end == data.len())
    }
}

impl ProtocolParser for PostgreSqlParser {
    fn protocol(&self) -> &'static str {
        "postgresql"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        match Self::framing(data) {
            Some(true) => 90,
            Some(false) => 75,
            None => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 5 {
            return Err(too_short("postgresql", 5, data.len()));
        }
        let confidence = match Self::framing(data) {
            Some(true) => 90,
            Some(false) => 80,
            None => 0,
        };
        let mut info = ParsedInfo::new("postgresql", confidence).with_product("PostgreSQL");
        if confidence == 0 {
            return Ok(info);
        }
        match data.first() {
            Some(b'E') => {
                info.field("response_type", "error");
                // Error fields: a type byte followed by a NUL-terminated string, repeated.
                for part in data.get(5..).unwrap_or_default().split(|&b| b == 0) {
                    let Some((&kind, value)) = part.split_first() else {
                        continue;
                    };
                    let value = String::from_utf8_lossy(value);
                    match kind {
                        b'S' => info.field("severity", value),
                        b'C' => info.field("sqlstate", value),
                        b'M' => info.field("message", value),
                        _ => {}
                    }
                }
            }
            Some(b'R') => {
                info.field("response_type", "authentication");
                if let Some(method) = be_u32(data, 5) {
                    let name = match method {
                        0 => "ok",
                        3 => "cleartext",
                        5 => "md5",
                        10 => "sasl",
                        _ => "other",
                    };
                    info.field("auth_method", name);
                    if method == 10 && String::from_utf8_lossy(data).contains("SCRAM-SHA-256") {
                        // SCRAM became the default in 14; only its presence is observable.
                        info.extra_info = "SCRAM-SHA-256 authentication".into();
                    }
                }
            }
            _ => {}
        }
        Ok(info)
    }
}

pub struct MongoDbParser;

const MONGO_OPCODES: [(u32, &str); 10] = [
    (1, "OP_REPLY"),
    (1000, "OP_MSG"),
    (2001, "OP_UPDATE"),
    (2002, "OP_INSERT"),
    (2003, "OP_RESERVED"),
    (2004, "OP_QUERY"),
    (2005, "OP_GET_MORE"),
    (2006, "OP_DELETE"),
    (2007, "OP_KILL_CURSORS"),
    (2013, "OP_COMPRESSED"),
];

impl MongoDbParser {
    /// BSON string element lookup: 0x02 key NUL int32-length value.
    fn bson_string(doc: &[u8], key: &str) -> Option<String> {
        let mut needle = vec![0x02];
        needle.extend_from_slice(key.as_bytes());
        needle.push(0);
        let start = doc.windows(needle.len()).position(|w| w == needle.as_slice())? + needle.len();
        let len = le_u32(doc, start)? as usize;
        let value = doc.get(start + 4..start + 4 + len.checked_sub(1)?)?;
        Some(String::from_utf8_lossy(value).into_owned())
    }

    fn parse_reply(body: &[u8], info: &mut ParsedInfo) {
        // flags(4) cursor_id(8) starting_from(4) number_returned(4) documents
        if body.len() < 20 {
            return;
        }
        let flags = le_u32(body, 0).unwrap_or(0);
        let cursor = body
            .get(4..12)
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map_or(0, i64::from_le_bytes);
        let returned = le_u32(body, 16).unwrap_or(0);

        info.field("response_flags", format!("0x{:08x}", flags));
        info.field("cursor_id", cursor.to_string());
        info.field("starting_from", le_u32(body, 12).unwrap_or(0).to_string());
        info.field("number_returned", returned.to_string());
        if flags & 0x01 != 0 {
            info.field("cursor_not_found", "true");
        }
        if flags & 0x02 != 0 {
            info.field("query_failure", "true");
        }
        if returned > 0 {
            Self::parse_is_master(&body[20..], info);
        }
    }

    fn parse_is_master(doc: &[u8], info: &mut ParsedInfo) {
        if let Some(version) = Self::bson_string(doc, "version") {
            info.version = version;
            info.extra_info = "MongoDB Server Response".into();
        }
        let text = String::from_utf8_lossy(doc);
        if text.contains("ismaster") {
            info.field("is_master", "true");
            info.extra_info = "MongoDB Master Server".into();
        }
        if let Some(set) = Self::bson_string(doc, "setName") {
            info.field("replica_set", set);
        }
    }
}

impl ProtocolParser for MongoDbParser {
    fn protocol(&self) -> &'static str {
        "mongodb"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() < 16 {
            return 0;
        }
        let length_ok = matches!(le_u32(data, 0), Some(len) if (16..=48_000_000).contains(&len));
        let opcode = le_u32(data, 12).unwrap_or(0);
        let known = MONGO_OPCODES
            .iter()
            .any(|(code, _)| *code == opcode && *code != 2003);
        if length_ok && known {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 16 {
            return Err(too_short("mongodb", 16, data.len()));
        }
        let mut info = ParsedInfo::new("mongodb", 80).with_product("MongoDB");

        let opcode = le_u32(data, 12).unwrap_or(0);
        info.field("message_length", le_u32(data, 0).unwrap_or(0).to_string());
        info.field("request_id", le_u32(data, 4).unwrap_or(0).to_string());
        info.field("response_to", le_u32(data, 8).unwrap_or(0).to_string());
        info.field("opcode", opcode.to_string());
        let name = MONGO_OPCODES
            .iter()
            .find(|(code, _)| *code == opcode)
            .map_or_else(|| format!("Unknown ({})", opcode), |(_, n)| n.to_string());
        info.field("opcode_name", name);

        if opcode == 1 && data.len() > 36 {
            Self::parse_reply(&data[16..], &mut info);
            info.confidence = 95;
        }
        Ok(info)
    }
}

pub struct SqlServerParser;

impl SqlServerParser {
    // Packet header: type(1) status(1) length(2) spid(2) packet_id(1) window(1)
    fn is_packet(data: &[u8]) -> bool {
        if data.len() < 8 || !matches!(data[0], 0x04 | 0x0E | 0x11) {
            return false;
        }
        let length_ok = matches!(be_u16(data, 2), Some(len) if len >= 8);
        length_ok && data[1] <= 0x1F
    }

    /// PRELOGIN response options: token(1) offset(2) length(2), terminated by 0xFF. Offsets are
    /// relative to the start of the packet body.
    fn parse_prelogin(body: &[u8], info: &mut ParsedInfo) {
        let mut cursor = 0;
        while let Some(&token) = body.get(cursor) {
            if token == 0xFF {
                break;
            }
            let (Some(offset), Some(len)) = (be_u16(body, cursor + 1), be_u16(body, cursor + 3)) else {
                return;
            };
            let value = body.get(offset as usize..offset as usize + len as usize);
            match (token, value) {
                (0x00, Some(v)) if v.len() >= 4 => {
                    let build = u16::from_be_bytes([v[2], v[3]]);
                    info.version = format!("{}.{}.{}", v[0], v[1], build);
                    info.field("prelogin_version", info.version.clone());
                }
                (0x01, Some(&[mode, ..])) => {
                    let name = match mode {
                        0 => "off",
                        1 => "on",
                        2 => "not supported",
                        3 => "required",
                        _ => "unknown",
                    };
                    info.field("encryption", name);
                }
                _ => {}
            }
            cursor += 5;
        }
    }

    fn parse_login_response(body: &[u8], info: &mut ParsedInfo) {
        let Some(&token) = body.first() else {
            return;
        };
        info.field("token_type", format!("0x{:02x}", token));
        match token {
            0xAD => {
                info.field("token_name", "LOGINACK");
                if let Some(v) = body.get(2..6) {
                    let version = u32::from_le_bytes([v[0], v[1], v[2], v[3]]);
                    info.field("server_version", format!("0x{:08x}", version));
                    info.version = format!("{}.{}.{}", version >> 24, (version >> 16) & 0xFF, version & 0xFFFF);
                }
                info.extra_info = "Login Successful".into();
                info.confidence = 98;
            }
            0xAA => {
                info.field("token_name", "ERROR");
                info.extra_info = "Login Error".into();
            }
            0xAB => {
                info.field("token_name", "INFO");
                info.extra_info = "Login Info".into();
            }
            _ => {}
        }
    }
}

impl ProtocolParser for SqlServerParser {
    fn protocol(&self) -> &'static str {
        "sqlserver"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_packet(data) {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 8 {
            return Err(too_short("sqlserver", 8, data.len()));
        }
        let mut info = ParsedInfo::new("sqlserver", 80).with_product("Microsoft SQL Server");

        let kind = data[0];
        info.field("tds_type", format!("0x{:02x}", kind));
        info.field("status", format!("0x{:02x}", data[1]));
        info.field("packet_length", be_u16(data, 2).unwrap_or(0).to_string());

        let body = &data[8..];
        match kind {
            0x04 => {
                info.field("tds_type_name", "Response");
                info.confidence = 95;
                Self::parse_prelogin(body, &mut info);
            }
            0x0E => {
                info.field("tds_type_name", "Login Response");
                info.confidence = 98;
                Self::parse_login_response(body, &mut info);
            }
            0x11 => {
                info.field("tds_type_name", "SQL Batch Response");
                info.confidence = 90;
            }
            _ => info.field("tds_type_name", "Unknown"),
        }
        Ok(info)
    }
}

pub struct OracleParser;

// Connect, Accept, Ack, Refuse, Redirect, Data, Null, Abort, Resend, Marker, Attention, Control.
const TNS_PACKET_TYPES: [u8; 12] = [1, 2, 3, 4, 5, 6, 7, 9, 11, 12, 13, 14];

impl OracleParser {
    // TNS header: length(2) checksum(2) type(1) reserved(1) header_checksum(2)
    fn is_packet(data: &[u8]) -> bool {
        if data.len() < 8 || !TNS_PACKET_TYPES.contains(&data[4]) {
            return false;
        }
        be_u16(data, 0).map(usize::from) == Some(data.len())
    }
}

impl ProtocolParser for OracleParser {
    fn protocol(&self) -> &'static str {
        "oracle"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_packet(data) {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 8 {
            return Err(too_short("oracle", 8, data.len()));
        }
        if !Self::is_packet(data) {
            return Ok(ParsedInfo::new("oracle", 0));
        }
        let mut info = ParsedInfo::new("oracle", 80).with_product("Oracle Database");

        let kind = data[4];
        info.field("packet_length", be_u16(data, 0).unwrap_or(0).to_string());
        info.field("packet_checksum", format!("0x{:04x}", be_u16(data, 2).unwrap_or(0)));
        info.field("packet_type", kind.to_string());

        match kind {
            0x02 => {
                info.field("packet_type_name", "Accept");
                info.confidence = 95;
                let body = &data[8..];
                if body.len() >= 8 {
                    info.field("tns_version", be_u16(body, 0).unwrap_or(0).to_string());
                    info.field("service_options", format!("0x{:04x}", be_u16(body, 2).unwrap_or(0)));
                    info.field("sdu_size", be_u16(body, 4).unwrap_or(0).to_string());
                    info.field("mtu", be_u16(body, 6).unwrap_or(0).to_string());
                    info.extra_info = "Connection Accepted".into();
                }
            }
            0x04 => {
                info.field("packet_type_name", "Refuse");
                info.extra_info = "Connection Refused".into();
                info.confidence = 95;
                // Refuse carries a listener description like "(DESCRIPTION=(ERR=12514)(VSNNUM=...))".
                let text = String::from_utf8_lossy(&data[8..]);
                if let Some(start) = text.find("(ERR=") {
                    let code: String = text[start + 5..].chars().take_while(char::is_ascii_digit).collect();
                    if !code.is_empty() {
                        info.field("tns_error", code);
                    }
                }
            }
            0x05 => {
                info.field("packet_type_name", "Redirect");
                info.extra_info = "Connection Redirect".into();
            }
            0x0B => info.field("packet_type_name", "Resend"),
            _ => info.field("packet_type_name", "Unknown"),
        }
        Ok(info)
    }
}

pub struct CassandraParser;

fn cql_opcode_name(opcode: u8) -> String {
    let name = match opcode {
        0x00 => "ERROR",
        0x01 => "STARTUP",
        0x02 => "READY",
        0x03 => "AUTHENTICATE",
        0x05 => "OPTIONS",
        0x06 => "SUPPORTED",
        0x07 => "QUERY",
        0x08 => "RESULT",
        0x09 => "PREPARE",
        0x0A => "EXECUTE",
        0x0B => "REGISTER",
        0x0C => "EVENT",
        0x0D => "BATCH",
        0x0E => "AUTH_CHALLENGE",
        0x0F => "AUTH_RESPONSE",
        0x10 => "AUTH_SUCCESS",
        other => return format!("Unknown (0x{:02x})", other),
    };
    name.to_string()
}

impl ProtocolParser for CassandraParser {
    fn protocol(&self) -> &'static str {
        "cassandra"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.len() < 9 {
            return 0;
        }
        // The top bit marks a response frame.
        let version = data[0] & 0x7F;
        if (3..=5).contains(&version) && data[4] <= 0x10 {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 9 {
            return Err(too_short("cassandra", 9, data.len()));
        }
        let mut info = ParsedInfo::new("cassandra", 80).with_product("Apache Cassandra");

        let opcode = data[4];
        info.field("protocol_version", (data[0] & 0x7F).to_string());
        info.field("flags", format!("0x{:02x}", data[1]));
        info.field("stream_id", be_u16(data, 2).unwrap_or(0).to_string());
        info.field("opcode", format!("0x{:02x}", opcode));
        info.field("body_length", be_u32(data, 5).unwrap_or(0).to_string());
        info.field("opcode_name", cql_opcode_name(opcode));

        if opcode == 0x06 {
            info.confidence = 95;
            info.extra_info = "Cassandra SUPPORTED Response".into();
            let body = String::from_utf8_lossy(&data[9..]);
            if body.contains("CQL_VERSION") {
                info.field("supports_cql", "true");
            }
            if body.contains("ScyllaDB") || body.contains("SCYLLA") {
                info.product = "ScyllaDB".into();
            }
        }
        Ok(info)
    }
}

pub struct Neo4jParser;

fn bolt_message_name(tag: u8) -> Option<&'static str> {
    match tag {
        0x01 => Some("INIT"),
        0x0E => Some("ACK_FAILURE"),
        0x0F => Some("RESET"),
        0x10 => Some("RUN"),
        0x2F => Some("DISCARD_ALL"),
        0x3F => Some("PULL_ALL"),
        0x70 => Some("SUCCESS"),
        0x7E => Some("IGNORED"),
        0x7F => Some("FAILURE"),
        _ => None,
    }
}

impl ProtocolParser for Neo4jParser {
    fn protocol(&self) -> &'static str {
        "neo4j"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        // The handshake answer is exactly one 4-byte version, or zero when none matched.
        match be_u32(data, 0) {
            Some(version) if data.len() == 4 && version > 0 && version < 0x10000 => 90,
            _ => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if data.len() < 4 {
            return Err(too_short("neo4j", 4, data.len()));
        }
        let mut info = ParsedInfo::new("neo4j", 80).with_product("Neo4j Graph Database");

        if data.len() == 4 {
            // [reserved, range, minor, major]
            let version = be_u32(data, 0).unwrap_or(0);
            let (minor, major) = (data[2], data[3]);
            info.field("protocol_version", format!("{}.{}", major, minor));
            info.version = format!("Bolt {}.{}", major, minor);
            if version != 0 {
                info.confidence = 95;
                info.extra_info = "Neo4j Bolt Protocol Handshake".into();
            }
            return Ok(info);
        }

        let chunk = be_u16(data, 0).unwrap_or(0);
        info.field("chunk_size", chunk.to_string());
        if chunk > 0 {
            // chunk header, then a PackStream struct marker (0xB?) and the message tag.
            let tag = if data[2] & 0xF0 == 0xB0 { data.get(3) } else { data.get(2) };
            if let Some(&tag) = tag {
                info.field("message_type", format!("0x{:02x}", tag));
                if let Some(name) = bolt_message_name(tag) {
                    info.field("message_name", name);
                    if tag == 0x70 {
                        info.confidence = 95;
                    }
                }
            }
        }
        Ok(info)
    }
}
