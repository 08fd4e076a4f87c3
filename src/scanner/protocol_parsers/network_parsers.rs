// Infrastructure protocols: DNS, SNMP, NTP, LDAP, Kerberos, RADIUS, OpenVPN and WireGuard.
//
// None of these open with printable magic, so each recognizer leans on length fields and
// reserved bits agreeing with the buffer, and refuses buffers that are plain text.

use super::{be_u16, be_u32, is_text, le_u32, ParsedInfo, ProtocolParser};
use crate::error::Result;

/// BER definite length at `offset`. Returns `(length, octets_used)`.
fn ber_length(data: &[u8], offset: usize) -> Option<(usize, usize)> {
    let first = *data.get(offset)?;
    if first < 0x80 {
        return Some((first as usize, 1));
    }
    let count = (first & 0x7F) as usize;
    if count == 0 || count > 4 {
        return None;
    }
    let bytes = data.get(offset + 1..offset + 1 + count)?;
    let length = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Some((length, 1 + count))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct DnsParser;

impl DnsParser {
    /// Strips the two-byte TCP length prefix when it matches the buffer.
    fn message(data: &[u8]) -> (&[u8], bool) {
        match be_u16(data, 0) {
            Some(len) if len as usize + 2 == data.len() && len >= 12 => (&data[2..], true),
            _ => (data, false),
        }
    }

    fn is_message(msg: &[u8]) -> bool {
        if msg.len() < 12 || is_text(msg) {
            return false;
        }
        let flags = be_u16(msg, 2).unwrap_or(0xFFFF);
        let opcode = (flags >> 11) & 0x0F;
        let rcode = flags & 0x0F;
        let z = flags & 0x0040;
        let counts = [4, 6, 8, 10].map(|o| be_u16(msg, o).unwrap_or(u16::MAX));

        opcode <= 5
            && opcode != 3
            && rcode <= 10
            && z == 0
            && counts[0] <= 16
            && counts[1..].iter().all(|&c| c <= 512)
    }
}

fn dns_opcode_name(opcode: u16) -> &'static str {
    match opcode {
        0 => "QUERY",
        1 => "IQUERY",
        2 => "STATUS",
        4 => "NOTIFY",
        5 => "UPDATE",
        _ => "Unknown",
    }
}

fn dns_rcode_name(rcode: u16) -> &'static str {
    match rcode {
        0 => "NOERROR",
        1 => "FORMERR",
        2 => "SERVFAIL",
        3 => "NXDOMAIN",
        4 => "NOTIMP",
        5 => "REFUSED",
        6 => "YXDOMAIN",
        7 => "YXRRSET",
        8 => "NXRRSET",
        9 => "NOTAUTH",
        10 => "NOTZONE",
        _ => "Unknown",
    }
}

impl ProtocolParser for DnsParser {
    fn protocol(&self) -> &'static str {
        "dns"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let (msg, _) = Self::message(data);
        if Self::is_message(msg) {
            80
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("dns", 80);
        let (msg, tcp) = Self::message(data);
        if !Self::is_message(msg) {
            info.confidence = 0;
            return Ok(info);
        }

        let id = be_u16(msg, 0).unwrap_or(0);
        let flags = be_u16(msg, 2).unwrap_or(0);
        let opcode = (flags >> 11) & 0x0F;
        let rcode = flags & 0x0F;

        info.field("transaction_id", format!("0x{:04x}", id));
        info.field("flags", format!("0x{:04x}", flags));
        info.field("type", if flags & 0x8000 != 0 { "response" } else { "query" });
        info.field("opcode", dns_opcode_name(opcode));
        info.field("rcode", dns_rcode_name(rcode));
        info.field("authoritative", (flags & 0x0400 != 0).to_string());
        info.field("recursion_available", (flags & 0x0080 != 0).to_string());
        for (name, offset) in [("questions", 4), ("answers", 6), ("authority", 8), ("additional", 10)] {
            info.field(name, be_u16(msg, offset).unwrap_or(0).to_string());
        }
        if tcp {
            info.field("transport", "tcp");
        }
        Ok(info)
    }
}

pub struct SnmpParser;

impl SnmpParser {
    /// Offset of the element following `version`, when the message header is well formed.
    fn header(data: &[u8]) -> Option<(u8, usize)> {
        if *data.first()? != 0x30 {
            return None;
        }
        let (_, used) = ber_length(data, 1)?;
        let at = 1 + used;
        let &[0x02, 0x01, version, next] = data.get(at..at + 4)? else {
            return None;
        };
        let expected = match version {
            0 | 1 => 0x04,
            3 => 0x30,
            _ => return None,
        };
        (next == expected).then_some((version, at + 3))
    }
}

fn snmp_pdu_name(tag: u8) -> &'static str {
    match tag {
        0xA0 => "get-request",
        0xA1 => "get-next-request",
        0xA2 => "get-response",
        0xA3 => "set-request",
        0xA4 => "trap",
        0xA5 => "get-bulk-request",
        0xA6 => "inform-request",
        0xA7 => "snmpv2-trap",
        0xA8 => "report",
        _ => "unknown",
    }
}

// 1.3.6.1.2.1.1.1.0
pub(crate) const SYS_DESCR_OID: [u8; 10] = [0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00];

impl ProtocolParser for SnmpParser {
    fn protocol(&self) -> &'static str {
        "snmp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::header(data).is_some() {
            70
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("snmp", 75);
        info.field("asn1_type", "sequence");
        let Some((version, at)) = Self::header(data) else {
            info.confidence = 0;
            return Ok(info);
        };

        info.version = match version {
            0 => "v1",
            1 => "v2c",
            _ => "v3",
        }
        .to_string();

        if version != 3 {
            if let Some((len, used)) = ber_length(data, at + 1) {
                let start = at + 1 + used;
                if let Some(community) = data.get(start..start + len) {
                    info.field("community", String::from_utf8_lossy(community));
                    if let Some(&tag) = data.get(start + len) {
                        info.field("pdu_type", snmp_pdu_name(tag));
                    }
                }
            }
        }

        if let Some(pos) = data
            .windows(SYS_DESCR_OID.len())
            .position(|w| w == SYS_DESCR_OID)
        {
            let at = pos + SYS_DESCR_OID.len();
            if data.get(at) == Some(&0x04) {
                if let Some((len, used)) = ber_length(data, at + 1) {
                    let start = at + 1 + used;
                    if let Some(descr) = data.get(start..start + len) {
                        let descr = String::from_utf8_lossy(descr).trim().to_string();
                        info.product = descr.split_whitespace().next().unwrap_or("").to_string();
                        info.field("sys_descr", descr);
                        info.confidence = 90;
                    }
                }
            }
        }
        Ok(info)
    }
}

pub struct NtpParser;

impl NtpParser {
    fn is_packet(data: &[u8]) -> bool {
        if data.len() < 48 || is_text(data) {
            return false;
        }
        let version = (data[0] >> 3) & 0x07;
        let mode = data[0] & 0x07;
        (3..=4).contains(&version) && (1..=5).contains(&mode)
    }
}

fn ntp_mode_name(mode: u8) -> &'static str {
    match mode {
        1 => "symmetric active",
        2 => "symmetric passive",
        3 => "client",
        4 => "server",
        5 => "broadcast",
        6 => "control",
        7 => "private",
        _ => "reserved",
    }
}

fn ntp_stratum_name(stratum: u8) -> &'static str {
    match stratum {
        0 => "unspecified",
        1 => "primary reference",
        2..=15 => "secondary reference",
        16 => "unsynchronized",
        _ => "reserved",
    }
}

impl ProtocolParser for NtpParser {
    fn protocol(&self) -> &'static str {
        "ntp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_packet(data) {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("ntp", 85).with_product("NTP");
        if !Self::is_packet(data) {
            info.confidence = 0;
            return Ok(info);
        }

        let leap = data[0] >> 6;
        let version = (data[0] >> 3) & 0x07;
        let mode = data[0] & 0x07;
        let stratum = data[1];

        info.version = format!("v{}", version);
        info.field("leap_indicator", leap.to_string());
        info.field("mode", ntp_mode_name(mode));
        info.field("stratum", stratum.to_string());
        info.field("stratum_name", ntp_stratum_name(stratum));
        info.field("poll", data[2].to_string());
        info.field("precision", (data[3] as i8).to_string());

        if stratum == 1 {
            let refid: String = data[12..16]
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            if refid.chars().all(|c| c.is_ascii_alphanumeric()) && !refid.is_empty() {
                info.field("reference_id", refid);
            }
        }

        if mode == 4 {
            info.confidence = 95;
            info.extra_info = "NTP Server Response".to_string();
        }
        Ok(info)
    }
}

pub struct LdapParser;

struct LdapHeader {
    message_id: u32,
    op: u8,
    body: usize,
}

fn ldap_operation_name(op: u8) -> Option<&'static str> {
    Some(match op {
        0x60 => "bindRequest",
        0x61 => "bindResponse",
        0x42 => "unbindRequest",
        0x63 => "searchRequest",
        0x64 => "searchResEntry",
        0x65 => "searchResDone",
        0x73 => "searchResRef",
        0x66 => "modifyRequest",
        0x67 => "modifyResponse",
        0x68 => "addRequest",
        0x69 => "addResponse",
        0x4A => "delRequest",
        0x6B => "delResponse",
        0x6C => "modDNRequest",
        0x6D => "modDNResponse",
        0x6E => "compareRequest",
        0x6F => "compareResponse",
        0x50 => "abandonRequest",
        0x77 => "extendedRequest",
        0x78 => "extendedResponse",
        _ => return None,
    })
}

fn ldap_result_name(code: u8) -> String {
    match code {
        0 => "success".into(),
        1 => "operationsError".into(),
        2 => "protocolError".into(),
        7 => "authMethodNotSupported".into(),
        8 => "strongerAuthRequired".into(),
        32 => "noSuchObject".into(),
        48 => "inappropriateAuthentication".into(),
        49 => "invalidCredentials".into(),
        50 => "insufficientAccessRights".into(),
        51 => "busy".into(),
        52 => "unavailable".into(),
        53 => "unwillingToPerform".into(),
        other => format!("resultCode {}", other),
    }
}

impl LdapParser {
    fn header(data: &[u8]) -> Option<LdapHeader> {
        if *data.first()? != 0x30 {
            return None;
        }
        let (_, used) = ber_length(data, 1)?;
        let mut at = 1 + used;

        if *data.get(at)? != 0x02 {
            return None;
        }
        let (id_len, used) = ber_length(data, at + 1)?;
        if !(1..=4).contains(&id_len) {
            return None;
        }
        let id_start = at + 1 + used;
        let id_bytes = data.get(id_start..id_start + id_len)?;
        let message_id = id_bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
        at = id_start + id_len;

        let op = *data.get(at)?;
        ldap_operation_name(op)?;
        let (_, used) = ber_length(data, at + 1)?;
        Some(LdapHeader {
            message_id,
            op,
            body: at + 1 + used,
        })
    }

    /// LDAPResult: resultCode ENUMERATED, matchedDN, diagnosticMessage.
    fn parse_result(data: &[u8], body: usize, info: &mut ParsedInfo) {
        let Some(&[0x0A, 0x01, code]) = data.get(body..body + 3) else {
            return;
        };
        info.field("result_code", code.to_string());
        info.field("result_name", ldap_result_name(code));

        let mut at = body + 3;
        let mut strings = Vec::new();
        for _ in 0..2 {
            if data.get(at) != Some(&0x04) {
                break;
            }
            let Some((len, used)) = ber_length(data, at + 1) else {
                break;
            };
            let start = at + 1 + used;
            let Some(value) = data.get(start..start + len) else {
                break;
            };
            strings.push(String::from_utf8_lossy(value).to_string());
            at = start + len;
        }

        if let Some(matched) = strings.first().filter(|s| !s.is_empty()) {
            info.field("matched_dn", matched.as_str());
        }
        if let Some(message) = strings.get(1).filter(|s| !s.is_empty()) {
            if message.contains("LdapErr: DSID") || message.contains("AcceptSecurityContext") {
                info.product = "Microsoft Active Directory".to_string();
                info.os = "Windows".to_string();
            }
            info.field("diagnostic_message", message.as_str());
        }
    }
}

impl ProtocolParser for LdapParser {
    fn protocol(&self) -> &'static str {
        "ldap"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::header(data).is_some() {
            75
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("ldap", 75);
        let Some(header) = Self::header(data) else {
            info.confidence = 0;
            return Ok(info);
        };

        info.field("message_id", header.message_id.to_string());
        info.field(
            "operation",
            ldap_operation_name(header.op).unwrap_or("unknown"),
        );

        if matches!(header.op, 0x61 | 0x65 | 0x67 | 0x69 | 0x6B | 0x6D | 0x6F | 0x78) {
            Self::parse_result(data, header.body, &mut info);
        }
        if header.op == 0x61 {
            info.confidence = 95;
            info.extra_info = "LDAP Bind Response".to_string();
        }
        Ok(info)
    }
}

pub struct KerberosParser;

fn kerberos_message_name(tag: u8) -> Option<&'static str> {
    Some(match tag {
        0x6A => "AS-REQ",
        0x6B => "AS-REP",
        0x6C => "TGS-REQ",
        0x6D => "TGS-REP",
        0x6E => "AP-REQ",
        0x6F => "AP-REP",
        0x74 => "KRB-SAFE",
        0x75 => "KRB-PRIV",
        0x76 => "KRB-CRED",
        0x7E => "KRB-ERROR",
        _ => return None,
    })
}

fn kerberos_error_name(code: u32) -> String {
    match code {
        6 => "KDC_ERR_C_PRINCIPAL_UNKNOWN".into(),
        7 => "KDC_ERR_S_PRINCIPAL_UNKNOWN".into(),
        14 => "KDC_ERR_ETYPE_NOSUPP".into(),
        18 => "KDC_ERR_CLIENT_REVOKED".into(),
        23 => "KDC_ERR_KEY_EXPIRED".into(),
        24 => "KDC_ERR_PREAUTH_FAILED".into(),
        25 => "KDC_ERR_PREAUTH_REQUIRED".into(),
        37 => "KRB_AP_ERR_SKEW".into(),
        68 => "KDC_ERR_WRONG_REALM".into(),
        other => format!("error {}", other),
    }
}

impl KerberosParser {
    /// The application-tagged message, with the TCP record mark removed when present.
    fn message(data: &[u8]) -> Option<&[u8]> {
        let msg = match be_u32(data, 0) {
            Some(mark) if mark as usize + 4 == data.len() && data.len() > 4 => &data[4..],
            _ => data,
        };
        if is_text(msg) {
            return None;
        }
        kerberos_message_name(*msg.first()?)?;
        let (len, used) = ber_length(msg, 1)?;
        if *msg.get(1 + used)? != 0x30 || len + 1 + used > msg.len() {
            return None;
        }
        Some(msg)
    }

    /// A context tag wrapping a single primitive, e.g. `[tag] len INNER len value`.
    fn tagged_value(msg: &[u8], context: u8, inner: u8) -> Option<&[u8]> {
        msg.windows(4).enumerate().find_map(|(i, w)| {
            if w[0] != context || w[2] != inner || w[1] as usize != w[3] as usize + 2 {
                return None;
            }
            msg.get(i + 4..i + 4 + w[3] as usize)
        })
    }
}

impl ProtocolParser for KerberosParser {
    fn protocol(&self) -> &'static str {
        "kerberos"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::message(data).is_some() {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("kerberos", 80);
        let Some(msg) = Self::message(data) else {
            info.confidence = 0;
            return Ok(info);
        };

        let tag = msg[0];
        info.confidence = 90;
        info.field("message_type", kerberos_message_name(tag).unwrap_or("unknown"));

        match tag {
            0x6B | 0x6D => {
                info.confidence = 95;
                if let Some(realm) = Self::tagged_value(msg, 0xA3, 0x1B) {
                    info.field("realm", String::from_utf8_lossy(realm));
                }
            }
            0x7E => {
                info.confidence = 95;
                if let Some(code) = Self::tagged_value(msg, 0xA6, 0x02) {
                    let value = code.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    info.field("error_code", value.to_string());
                    info.field("error_name", kerberos_error_name(value));
                }
                if let Some(realm) = Self::tagged_value(msg, 0xA9, 0x1B) {
                    info.field("realm", String::from_utf8_lossy(realm));
                }
            }
            _ => {}
        }
        Ok(info)
    }
}

pub struct RadiusParser;

fn radius_code_name(code: u8) -> &'static str {
    match code {
        1 => "Access-Request",
        2 => "Access-Accept",
        3 => "Access-Reject",
        4 => "Accounting-Request",
        5 => "Accounting-Response",
        11 => "Access-Challenge",
        12 => "Status-Server",
        13 => "Status-Client",
        _ => "Unknown",
    }
}

fn radius_attribute_name(kind: u8) -> &'static str {
    match kind {
        1 => "User-Name",
        2 => "User-Password",
        4 => "NAS-IP-Address",
        5 => "NAS-Port",
        6 => "Service-Type",
        18 => "Reply-Message",
        24 => "State",
        25 => "Class",
        26 => "Vendor-Specific",
        27 => "Session-Timeout",
        32 => "NAS-Identifier",
        79 => "EAP-Message",
        80 => "Message-Authenticator",
        _ => "Unknown",
    }
}

impl RadiusParser {
    fn packet_length(data: &[u8]) -> Option<usize> {
        if data.len() < 20 || !(1..=13).contains(&data[0]) || is_text(data) {
            return None;
        }
        let length = be_u16(data, 2)? as usize;
        (20..=data.len()).contains(&length).then_some(length)
    }
}

impl ProtocolParser for RadiusParser {
    fn protocol(&self) -> &'static str {
        "radius"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::packet_length(data).is_some() {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("radius", 85);
        let Some(length) = Self::packet_length(data) else {
            info.confidence = 0;
            return Ok(info);
        };

        let code = data[0];
        info.field("code", code.to_string());
        info.field("code_name", radius_code_name(code));
        info.field("identifier", data[1].to_string());
        info.field("length", length.to_string());
        if matches!(code, 2 | 3 | 11) {
            info.confidence = 95;
        }

        let mut at = 20;
        let mut count = 0;
        while at + 2 <= length && count < 5 {
            let kind = data[at];
            let len = data[at + 1] as usize;
            if len < 2 || at + len > length {
                break;
            }
            count += 1;
            info.field(&format!("attr_{}_type", count), radius_attribute_name(kind));
            info.field(&format!("attr_{}_length", count), len.to_string());
            if kind == 18 {
                info.field("reply_message", String::from_utf8_lossy(&data[at + 2..at + len]));
            }
            at += len;
        }
        info.field("attribute_count", count.to_string());
        Ok(info)
    }
}

pub struct OpenVpnParser;

fn openvpn_opcode_name(opcode: u8) -> &'static str {
    match opcode {
        1 => "P_CONTROL_HARD_RESET_CLIENT_V1",
        2 => "P_CONTROL_HARD_RESET_SERVER_V1",
        3 => "P_CONTROL_SOFT_RESET_V1",
        4 => "P_CONTROL_V1",
        5 => "P_ACK_V1",
        6 => "P_DATA_V1",
        7 => "P_CONTROL_HARD_RESET_CLIENT_V2",
        8 => "P_CONTROL_HARD_RESET_SERVER_V2",
        9 => "P_DATA_V2",
        10 => "P_CONTROL_HARD_RESET_CLIENT_V3",
        _ => "Unknown",
    }
}

impl OpenVpnParser {
    /// TCP framing: u16 packet length, then opcode/key-id, then the 8-byte session id.
    fn opcode(data: &[u8]) -> Option<u8> {
        let len = be_u16(data, 0)? as usize;
        if len < 9 || 2 + len > data.len() || is_text(data) {
            return None;
        }
        let opcode = data[2] >> 3;
        (1..=10).contains(&opcode).then_some(opcode)
    }
}

impl ProtocolParser for OpenVpnParser {
    fn protocol(&self) -> &'static str {
        "openvpn"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::opcode(data).is_some() {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("openvpn", 85).with_product("OpenVPN");
        let Some(opcode) = Self::opcode(data) else {
            info.confidence = 0;
            return Ok(info);
        };

        info.field("opcode", opcode.to_string());
        info.field("opcode_name", openvpn_opcode_name(opcode));
        info.field("key_id", (data[2] & 0x07).to_string());
        info.field("session_id", hex(&data[3..11]));

        if matches!(opcode, 2 | 8) {
            info.confidence = 95;
            info.extra_info = "OpenVPN Server Response".to_string();
        }
        Ok(info)
    }
}

pub struct WireGuardParser;

impl WireGuardParser {
    fn message_type(data: &[u8]) -> Option<u8> {
        let &[kind, 0, 0, 0] = data.get(..4)? else {
            return None;
        };
        let sized = match kind {
            1 => data.len() == 148,
            2 => data.len() == 92,
            3 => data.len() == 64,
            4 => data.len() >= 32,
            _ => false,
        };
        sized.then_some(kind)
    }
}

impl ProtocolParser for WireGuardParser {
    fn protocol(&self) -> &'static str {
        "wireguard"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        match Self::message_type(data) {
            Some(2) => 98,
            Some(1) => 95,
            Some(_) => 90,
            None => 0,
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("wireguard", 0).with_product("WireGuard");
        let Some(kind) = Self::message_type(data) else {
            return Ok(info);
        };

        info.confidence = self.confidence(data);
        let name = match kind {
            1 => "Handshake Initiation",
            2 => "Handshake Response",
            3 => "Cookie Reply",
            _ => "Transport Data",
        };
        info.field("message_type", name);
        if let Some(sender) = le_u32(data, 4) {
            info.field("sender_index", format!("0x{:08x}", sender));
        }
        if kind == 2 {
            if let Some(receiver) = le_u32(data, 8) {
                info.field("receiver_index", format!("0x{:08x}", receiver));
            }
            info.extra_info = "WireGuard Handshake Response".to_string();
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns_response() -> Vec<u8> {
        let mut msg = vec![0x12, 0x34, 0x81, 0x80, 0, 1, 0, 1, 0, 0, 0, 0];
        msg.extend_from_slice(b"\x07example\x03com\x00\x00\x01\x00\x01");
        msg
    }

    #[test]
    fn test_dns_response_over_udp_and_tcp() {
        let msg = dns_response();
        assert_eq!(DnsParser.confidence(&msg), 80);
        let info = DnsParser.parse(&msg).unwrap();
        assert_eq!(info.fields["type"], "response");
        assert_eq!(info.fields["flags"], "0x8180");
        assert_eq!(info.fields["rcode"], "NOERROR");
        assert_eq!(info.fields["answers"], "1");

        let mut framed = (msg.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&msg);
        let info = DnsParser.parse(&framed).unwrap();
        assert_eq!(info.fields["transport"], "tcp");
        assert_eq!(info.fields["transaction_id"], "0x1234");
    }

    #[test]
    fn test_dns_rejects_text_banners() {
        assert_eq!(DnsParser.confidence(b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\n"), 0);
        assert_eq!(DnsParser.confidence(b"short"), 0);
    }

    #[test]
    fn test_snmp_get_response_with_sys_descr() {
        let descr = b"Linux router 5.10.0";
        let mut varbind = SYS_DESCR_OID.to_vec();
        varbind.push(0x04);
        varbind.push(descr.len() as u8);
        varbind.extend_from_slice(descr);

        let mut msg = vec![0x30, 0x00, 0x02, 0x01, 0x01, 0x04, 0x06];
        msg.extend_from_slice(b"public");
        msg.extend_from_slice(&[0xA2, varbind.len() as u8]);
        msg.extend_from_slice(&varbind);
        msg[1] = (msg.len() - 2) as u8;

        assert_eq!(SnmpParser.confidence(&msg), 70);
        let info = SnmpParser.parse(&msg).unwrap();
        assert_eq!(info.version, "v2c");
        assert_eq!(info.fields["community"], "public");
        assert_eq!(info.fields["pdu_type"], "get-response");
        assert_eq!(info.fields["sys_descr"], "Linux router 5.10.0");
        assert_eq!(info.product, "Linux");
        assert_eq!(info.confidence, 90);
    }

    #[test]
    fn test_snmp_rejects_ldap_shaped_sequence() {
        let ldap = [0x30, 0x0C, 0x02, 0x01, 0x01, 0x61, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00];
        assert_eq!(SnmpParser.confidence(&ldap), 0);
        assert_eq!(LdapParser.confidence(&ldap), 75);
    }

    #[test]
    fn test_ntp_server_response() {
        let mut packet = vec![0u8; 48];
        packet[0] = 0x24; // leap 0, version 4, mode 4
        packet[1] = 1;
        packet[12..16].copy_from_slice(b"GPS\0");
        assert_eq!(NtpParser.confidence(&packet), 85);

        let info = NtpParser.parse(&packet).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.version, "v4");
        assert_eq!(info.fields["mode"], "server");
        assert_eq!(info.fields["stratum_name"], "primary reference");
        assert_eq!(info.fields["reference_id"], "GPS");
        assert_eq!(info.extra_info, "NTP Server Response");
    }

    #[test]
    fn test_ntp_needs_full_packet() {
        let mut packet = vec![0u8; 47];
        packet[0] = 0x24;
        assert_eq!(NtpParser.confidence(&packet), 0);
    }

    #[test]
    fn test_ldap_bind_response_from_active_directory() {
        let message = b"80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error";
        let mut op = vec![0x0A, 0x01, 49, 0x04, 0x00, 0x04, message.len() as u8];
        op.extend_from_slice(message);
        let mut body = vec![0x02, 0x01, 0x01, 0x61, op.len() as u8];
        body.extend_from_slice(&op);
        let mut msg = vec![0x30, body.len() as u8];
        msg.extend_from_slice(&body);

        let info = LdapParser.parse(&msg).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.extra_info, "LDAP Bind Response");
        assert_eq!(info.fields["operation"], "bindResponse");
        assert_eq!(info.fields["result_name"], "invalidCredentials");
        assert_eq!(info.product, "Microsoft Active Directory");
        assert_eq!(info.os, "Windows");
    }

    #[test]
    fn test_ldap_long_form_lengths() {
        let mut msg = vec![0x30, 0x81, 0x0C, 0x02, 0x01, 0x07, 0x65, 0x07];
        msg.extend_from_slice(&[0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00]);
        let info = LdapParser.parse(&msg).unwrap();
        assert_eq!(info.fields["message_id"], "7");
        assert_eq!(info.fields["operation"], "searchResDone");
        assert_eq!(info.fields["result_name"], "success");
        assert_eq!(info.confidence, 75);
    }

    fn krb_error() -> Vec<u8> {
        let mut inner = vec![0xA0, 0x03, 0x02, 0x01, 0x05];
        inner.extend_from_slice(&[0xA6, 0x03, 0x02, 0x01, 25]);
        inner.extend_from_slice(&[0xA9, 0x0D, 0x1B, 0x0B]);
        inner.extend_from_slice(b"EXAMPLE.COM");
        let mut seq = vec![0x30, inner.len() as u8];
        seq.extend_from_slice(&inner);
        let mut msg = vec![0x7E, seq.len() as u8];
        msg.extend_from_slice(&seq);
        msg
    }

    #[test]
    fn test_kerberos_error_over_tcp() {
        let msg = krb_error();
        let mut framed = (msg.len() as u32).to_be_bytes().to_vec();
        framed.extend_from_slice(&msg);

        assert_eq!(KerberosParser.confidence(&framed), 90);
        let info = KerberosParser.parse(&framed).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.fields["message_type"], "KRB-ERROR");
        assert_eq!(info.fields["error_name"], "KDC_ERR_PREAUTH_REQUIRED");
        assert_eq!(info.fields["realm"], "EXAMPLE.COM");
    }

    #[test]
    fn test_kerberos_ignores_lowercase_text() {
        assert_eq!(KerberosParser.confidence(b"k\t0abcdefghi"), 0);
        assert_eq!(KerberosParser.confidence(b"kerberos is not here"), 0);
    }

    #[test]
    fn test_radius_access_reject_with_reply_message() {
        let mut packet = vec![3, 42, 0, 0];
        packet.extend_from_slice(&[0u8; 16]);
        packet.extend_from_slice(&[18, 8]);
        packet.extend_from_slice(b"denied");
        let len = packet.len() as u16;
        packet[2..4].copy_from_slice(&len.to_be_bytes());

        assert_eq!(RadiusParser.confidence(&packet), 85);
        let info = RadiusParser.parse(&packet).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.fields["code_name"], "Access-Reject");
        assert_eq!(info.fields["attr_1_type"], "Reply-Message");
        assert_eq!(info.fields["reply_message"], "denied");
        assert_eq!(info.fields["attribute_count"], "1");
    }

    #[test]
    fn test_radius_length_must_fit() {
        let mut packet = vec![2, 1, 0, 200];
        packet.extend_from_slice(&[0u8; 16]);
        assert_eq!(RadiusParser.confidence(&packet), 0);
    }

    #[test]
    fn test_openvpn_server_reset() {
        let mut packet = vec![0x00, 0x0E, (8 << 3) | 1];
        packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
        packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00]);

        assert_eq!(OpenVpnParser.confidence(&packet), 85);
        let info = OpenVpnParser.parse(&packet).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.fields["opcode_name"], "P_CONTROL_HARD_RESET_SERVER_V2");
        assert_eq!(info.fields["key_id"], "1");
        assert_eq!(info.fields["session_id"], "deadbeef01020304");
    }

    #[test]
    fn test_openvpn_does_not_claim_http() {
        assert_eq!(OpenVpnParser.confidence(b"HTTP/1.1 200 OK\r\n\r\n"), 0);
    }

    #[test]
    fn test_wireguard_handshake_response() {
        let mut packet = vec![0u8; 92];
        packet[0] = 2;
        packet[4..8].copy_from_slice(&0x0102_0304u32.to_le_bytes());
        assert_eq!(WireGuardParser.confidence(&packet), 98);
        let info = WireGuardParser.parse(&packet).unwrap();
        assert_eq!(info.extra_info, "WireGuard Handshake Response");
        assert_eq!(info.fields["sender_index"], "0x01020304");

        packet.push(0);
        assert_eq!(WireGuardParser.confidence(&packet), 0);
    }
}
