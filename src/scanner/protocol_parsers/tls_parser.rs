// TLS record layer: record header, alerts and ServerHello negotiation details.

use super::{be_u16, ParsedInfo, ProtocolParser};
use crate::error::Result;

const RECORD_HEADER_LEN: usize = 5;

fn record_version_name(version: u16) -> Option<&'static str> {
    match version {
        0x0300 => Some("SSL 3.0"),
        0x0301 => Some("TLS 1.0"),
        0x0302 => Some("TLS 1.1"),
        0x0303 => Some("TLS 1.2"),
        0x0304 => Some("TLS 1.3"),
        _ => None,
    }
}

fn alert_description_name(desc: u8) -> Option<&'static str> {
    let name = match desc {
        0 => "close_notify",
        10 => "unexpected_message",
        20 => "bad_record_mac",
        21 => "decryption_failed",
        22 => "record_overflow",
        30 => "decompression_failure",
        40 => "handshake_failure",
        41 => "no_certificate",
        42 => "bad_certificate",
        43 => "unsupported_certificate",
        44 => "certificate_revoked",
        45 => "certificate_expired",
        46 => "certificate_unknown",
        47 => "illegal_parameter",
        48 => "unknown_ca",
        49 => "access_denied",
        50 => "decode_error",
        51 => "decrypt_error",
        60 => "export_restriction",
        70 => "protocol_version",
        71 => "insufficient_security",
        80 => "internal_error",
        90 => "user_canceled",
        100 => "no_renegotiation",
        110 => "unsupported_extension",
        _ => return None,
    };
    Some(name)
}

fn handshake_type_name(kind: u8) -> Option<&'static str> {
    let name = match kind {
        0 => "HelloRequest",
        1 => "ClientHello",
        2 => "ServerHello",
        11 => "Certificate",
        12 => "ServerKeyExchange",
        13 => "CertificateRequest",
        14 => "ServerHelloDone",
        15 => "CertificateVerify",
        16 => "ClientKeyExchange",
        20 => "Finished",
        _ => return None,
    };
    Some(name)
}

fn cipher_suite_name(suite: u16) -> Option<&'static str> {
    let name = match suite {
        0x002f => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0x003c => "TLS_RSA_WITH_AES_128_CBC_SHA256",
        0x003d => "TLS_RSA_WITH_AES_256_CBC_SHA256",
        0x009c => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009d => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        0xc007 => "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA",
        0xc009 => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        0xc00a => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        0xc011 => "TLS_ECDHE_RSA_WITH_RC4_128_SHA",
        0xc013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xc014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0xc023 => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256",
        0xc024 => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384",
        0xc027 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        0xc028 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
        0xc02b => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xc02c => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xc02f => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xc030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xcca8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0xcca9 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        _ => return None,
    };
    Some(name)
}

pub struct TlsParser;

impl TlsParser {
    /// A known content type and record version plus the full five-byte header.
    fn is_record(data: &[u8]) -> bool {
        if data.len() < RECORD_HEADER_LEN || !(20..=23).contains(&data[0]) {
            return false;
        }
        matches!(be_u16(data, 1), Some(v) if (0x0300..=0x0304).contains(&v))
    }

    fn parse_record(data: &[u8]) -> ParsedInfo {
        let mut info = ParsedInfo::new("tls", 80);

        let content_type = data[0];
        let version = be_u16(data, 1).unwrap_or(0);
        let length = be_u16(data, 3).unwrap_or(0);
        info.field("content_type", content_type.to_string());
        info.field("record_length", length.to_string());

        match record_version_name(version) {
            Some(name) => {
                info.version = name.into();
                info.product = if version == 0x0300 { "SSL" } else { "TLS" }.into();
            }
            None => {
                info.version = format!("Unknown (0x{:04x})", version);
                info.product = "TLS/SSL".into();
            }
        }
        info.field("tls_version", info.version.clone());

        match content_type {
            20 => info.field("message_type", "ChangeCipherSpec"),
            21 => {
                info.field("message_type", "Alert");
                if let (Some(&level), Some(&desc)) = (data.get(5), data.get(6)) {
                    info.field("alert_level", level.to_string());
                    info.field("alert_description", desc.to_string());
                    if let Some(name) = alert_description_name(desc) {
                        info.field("alert_description_name", name);
                    }
                }
            }
            22 => {
                info.field("message_type", "Handshake");
                if let Some(&kind) = data.get(5) {
                    info.field("handshake_type", kind.to_string());
                    if let Some(name) = handshake_type_name(kind) {
                        info.field("handshake_type_name", name);
                    }
                    if kind == 2 {
                        Self::parse_server_hello(&data[5..], &mut info);
                    }
                }
            }
            23 => info.field("message_type", "ApplicationData"),
            other => info.field("message_type", format!("Unknown ({})", other)),
        }

        info.confidence = 95;
        info
    }

    // [type:1][length:3][version:2][random:32][session_id_len:1][session_id][cipher:2][compression:1]
    fn parse_server_hello(handshake: &[u8], info: &mut ParsedInfo) {
        if handshake.len() < 38 {
            return;
        }
        let mut offset = 4;

        if let Some(version) = be_u16(handshake, offset) {
            let negotiated = match version {
                0x0303 => "TLS 1.2".to_string(),
                0x0304 => "TLS 1.3".to_string(),
                other => format!("0x{:04x}", other),
            };
            info.field("negotiated_version", negotiated);
            offset += 2;
        }
        offset += 32;

        if let Some(&session_len) = handshake.get(offset) {
            info.field("session_id_length", session_len.to_string());
            offset += 1 + session_len as usize;
        }

        if let Some(suite) = be_u16(handshake, offset) {
            info.field("cipher_suite", format!("0x{:04x}", suite));
            if let Some(name) = cipher_suite_name(suite) {
                info.field("cipher_suite_name", name);
                let strength = if name.contains("AES_256") || name.contains("CHACHA20") {
                    Some("Strong")
                } else if name.contains("AES_128") {
                    Some("Medium")
                } else if name.contains("RC4") {
                    Some("Weak")
                } else {
                    None
                };
                if let Some(strength) = strength {
                    info.field("encryption_strength", strength);
                }
                // TLS 1.3 suites are always ephemeral.
                let forward = name.contains("DHE") || suite & 0xff00 == 0x1300;
                info.field("forward_secrecy", if forward { "Yes" } else { "No" });
            }
            offset += 2;
        }

        if let Some(&compression) = handshake.get(offset) {
            info.field("compression_method", compression.to_string());
        }
    }
}

impl ProtocolParser for TlsParser {
    fn protocol(&self) -> &'static str {
        "tls"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if Self::is_record(data) {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        if !Self::is_record(data) {
            return Ok(ParsedInfo::new("tls", 0));
        }
        Ok(Self::parse_record(data))
    }
}
