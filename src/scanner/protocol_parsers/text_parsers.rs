// Line-oriented protocols: HTTP, SSH, mail and file transfer greetings, RTSP, SIP, syslog,
// Redis RESP and telnet negotiation.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use super::{capture, header_map, text, ParsedInfo, ProtocolParser};
use crate::error::Result;

lazy_static! {
    static ref HTTP_STATUS: Regex = Regex::new(r"HTTP/(\d+\.\d+)\s+(\d+)\s*(.*)").unwrap();
    static ref NGINX: Regex = Regex::new(r"nginx/(\d+\.\d+(?:\.\d+)?)").unwrap();
    static ref APACHE: Regex = Regex::new(r"Apache/(\d+\.\d+(?:\.\d+)?)").unwrap();
    static ref IIS: Regex = Regex::new(r"Microsoft-IIS/(\d+\.\d+)").unwrap();
    static ref GUNICORN: Regex = Regex::new(r"gunicorn/(\d+\.\d+\.\d+)").unwrap();
    static ref PHP: Regex = Regex::new(r"php/(\d+\.\d+(?:\.\d+)?)").unwrap();
    static ref SSH_IDENT: Regex = Regex::new(r"SSH-([.\d]+)-(.+?)(?:\s(.*))?(?:\r|\n|$)").unwrap();
    static ref OPENSSH: Regex = Regex::new(r"OpenSSH[_\s]+(\d+\.\d+(?:p\d+)?)").unwrap();
    static ref UBUNTU_PACKAGE: Regex = Regex::new(r"Ubuntu-(\d+)ubuntu").unwrap();
    static ref DROPBEAR: Regex = Regex::new(r"dropbear[_\s]+(\d+\.\d+)").unwrap();
    static ref LIBSSH: Regex = Regex::new(r"libssh[_\s]+(\d+\.\d+\.\d+)").unwrap();
    static ref REPLY_CODE: Regex = Regex::new(r"^(\d{3})\s+(.+)").unwrap();
    static ref POSITIVE_REPLY: Regex = Regex::new(r"^2\d{2}\s").unwrap();
    static ref VSFTPD: Regex = Regex::new(r"vsftpd\s+(\S+)").unwrap();
    static ref IMAP_STATUS: Regex = Regex::new(r"^(\*|A\d+)\s+(OK|NO|BAD)\s+(.*)").unwrap();
    static ref IMAP_GREETING: Regex = Regex::new(r"^(\*|A\d+)\s+(OK|NO|BAD)").unwrap();
    static ref RTSP_STATUS: Regex = Regex::new(r"RTSP/(\d+\.\d+)\s+(\d+)\s*(.*)").unwrap();
    static ref HIKVISION_VERSION: Regex = Regex::new(r"hikvision.*?(\d+\.\d+\.\d+)").unwrap();
    static ref SIP_RESPONSE: Regex = Regex::new(r"^SIP/(\d+\.\d+)\s+(\d+)\s*(.*)").unwrap();
    static ref SIP_REQUEST: Regex =
        Regex::new(r"^(OPTIONS|INVITE|ACK|BYE|CANCEL|REGISTER)\s+(.+?)\s+SIP/(\d+\.\d+)").unwrap();
    static ref SIP_METHOD: Regex = Regex::new(r"^(OPTIONS|INVITE|ACK|BYE|CANCEL|REGISTER)").unwrap();
    static ref ASTERISK: Regex = Regex::new(r"asterisk\s+(\d+\.\d+\.\d+)").unwrap();
    static ref SYSLOG: Regex = Regex::new(r"^<(\d+)>(.*)").unwrap();
    static ref SYSLOG_PRI: Regex = Regex::new(r"^<\d+>").unwrap();
}

pub struct HttpParser;

impl HttpParser {
    /// Fills `info` from a status line plus header block. Shared by the HTTP-hosted product parsers.
    pub(crate) fn parse_into(content: &str, info: &mut ParsedInfo) {
        let status_line = content.lines().next().unwrap_or("").trim();
        info.field("status_line", status_line);
        if let Some(caps) = HTTP_STATUS.captures(status_line) {
            info.field("http_version", &caps[1]);
            info.field("status_code", &caps[2]);
            info.field("status_text", caps[3].trim());
        }

        let headers = header_map(content);
        for (key, value) in &headers {
            info.field(&format!("header_{}", key), value.as_str());
        }

        if let Some(server) = headers.get("server") {
            Self::parse_server_header(server, info);
        }
        if let Some(content_type) = headers.get("content-type") {
            info.field("content_type", content_type.as_str());
        }
        if let Some(powered) = headers.get("x-powered-by") {
            info.field("powered_by", powered.as_str());
            Self::parse_powered_by(powered, info);
        }
        Self::detect_web_technology(&headers, info);
    }

    fn parse_server_header(server: &str, info: &mut ParsedInfo) {
        let server = server.trim();
        info.field("server", server);
        let lower = server.to_lowercase();

        if let Some(version) = capture(&NGINX, server, 1) {
            info.product = "nginx".into();
            info.version = version.into();
            info.confidence = 95;
            if server.contains("Ubuntu") {
                info.os = "Ubuntu".into();
            }
        } else if let Some(version) = capture(&APACHE, server, 1) {
            info.product = "Apache httpd".into();
            info.version = version.into();
            info.confidence = 95;
            if server.contains("Ubuntu") {
                info.os = "Ubuntu".into();
            } else if server.contains("CentOS") {
                info.os = "CentOS".into();
            } else if server.contains("Win32") || server.contains("Win64") {
                info.os = "Windows".into();
            }
        } else if let Some(version) = capture(&IIS, server, 1) {
            info.product = "Microsoft IIS".into();
            info.version = version.into();
            info.os = "Windows".into();
            info.confidence = 95;
        } else if lower.contains("gunicorn") {
            info.product = "Gunicorn".into();
            if let Some(version) = capture(&GUNICORN, server, 1) {
                info.version = version.into();
            }
            info.extra_info = "Python WSGI HTTP Server".into();
            info.confidence = 90;
        } else if lower.contains("cloudflare") {
            info.product = "Cloudflare".into();
            info.extra_info = "CDN/Proxy".into();
            info.confidence = 85;
        }
    }

    fn parse_powered_by(powered: &str, info: &mut ParsedInfo) {
        let powered = powered.to_lowercase();
        if powered.contains("php") {
            info.extra_info = "PHP".into();
            if let Some(version) = capture(&PHP, &powered, 1) {
                info.field("php_version", version);
            }
        } else if powered.contains("asp.net") {
            info.extra_info = "ASP.NET".into();
            info.os = "Windows".into();
        } else if powered.contains("express") {
            info.extra_info = "Node.js Express".into();
        }
    }

    fn detect_web_technology(headers: &BTreeMap<String, String>, info: &mut ParsedInfo) {
        let mut technologies: Vec<String> = Vec::new();

        if headers.contains_key("x-aspnet-version") {
            technologies.push("ASP.NET".into());
            info.os = "Windows".into();
        }
        if headers.contains_key("x-powered-by-plesk") {
            technologies.push("Plesk".into());
        }
        if headers.contains_key("x-drupal-cache") {
            technologies.push("Drupal".into());
        }
        if let Some(generator) = headers.get("x-generator") {
            technologies.push(generator.clone());
        }
        if let Some(cookie) = headers.get("set-cookie") {
            let cookie = cookie.to_lowercase();
            if cookie.contains("phpsessid") {
                technologies.push("PHP".into());
            } else if cookie.contains("jsessionid") {
                technologies.push("Java/JSP".into());
            } else if cookie.contains("asp.net_sessionid") {
                technologies.push("ASP.NET".into());
            }
        }

        if !technologies.is_empty() {
            info.field("technologies", technologies.join(", "));
        }
    }
}

impl ProtocolParser for HttpParser {
    fn protocol(&self) -> &'static str {
        "http"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if text(data).contains("HTTP/") {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("http", 70);
        Self::parse_into(&text(data), &mut info);
        Ok(info)
    }
}

pub struct SshParser;

impl SshParser {
    fn parse_software(software: &str, comments: &str, info: &mut ParsedInfo) {
        let software = software.trim();
        let lower = software.to_lowercase();
        // Distribution markers usually sit in the comment part: "OpenSSH_8.2p1 Ubuntu-4ubuntu0.5".
        let full = format!("{} {}", software, comments);

        if let Some(version) = capture(&OPENSSH, software, 1) {
            info.product = "OpenSSH".into();
            info.version = version.into();
            if full.contains("Ubuntu") {
                info.os = "Ubuntu".into();
                if let Some(package) = capture(&UBUNTU_PACKAGE, &full, 1) {
                    info.field("ubuntu_package", package);
                }
            } else if full.contains("Debian") {
                info.os = "Debian".into();
            } else if full.contains("CentOS") || full.contains("Red Hat") {
                info.os = "CentOS/RHEL".into();
            } else if full.contains("FreeBSD") {
                info.os = "FreeBSD".into();
            }
            info.confidence = 98;
        } else if lower.contains("dropbear") {
            info.product = "Dropbear SSH".into();
            if let Some(version) = capture(&DROPBEAR, &lower, 1) {
                info.version = version.into();
            }
            info.extra_info = "Lightweight SSH server".into();
            info.device_type = "embedded".into();
            info.confidence = 95;
        } else if lower.contains("libssh") {
            info.product = "libssh".into();
            if let Some(version) = capture(&LIBSSH, &lower, 1) {
                info.version = version.into();
            }
            info.extra_info = "SSH library implementation".into();
            info.confidence = 90;
        } else if lower.contains("cisco") {
            info.product = "Cisco SSH".into();
            info.device_type = "network device".into();
            info.extra_info = "Cisco network equipment".into();
            info.confidence = 95;
        } else if lower.contains("paramiko") {
            info.product = "Paramiko".into();
            info.extra_info = "Python SSH implementation".into();
            info.confidence = 90;
        }

        if !comments.is_empty() {
            Self::parse_comments(comments, info);
        }
    }

    fn parse_comments(comments: &str, info: &mut ParsedInfo) {
        let comments = comments.to_lowercase();

        for keyword in ["honeypot", "cowrie", "kippo", "dionaea"] {
            if comments.contains(keyword) {
                info.extra_info = "Possible honeypot".into();
                info.field("honeypot_indicator", keyword);
                break;
            }
        }

        if comments.contains("aws") || comments.contains("amazon") {
            info.field("cloud_provider", "AWS");
        } else if comments.contains("azure") {
            info.field("cloud_provider", "Azure");
        } else if comments.contains("gcp") || comments.contains("google") {
            info.field("cloud_provider", "Google Cloud");
        }
    }
}

impl ProtocolParser for SshParser {
    fn protocol(&self) -> &'static str {
        "ssh"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.starts_with(b"SSH-") {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let content = content.trim();
        let mut info = ParsedInfo::new("ssh", 95);

        if let Some(caps) = SSH_IDENT.captures(content) {
            let software = caps.get(2).map_or("", |m| m.as_str());
            let comments = caps.get(3).map_or("", |m| m.as_str().trim());
            info.field("protocol_version", &caps[1]);
            info.field("software_version", software);
            if !comments.is_empty() {
                info.field("comments", comments);
            }
            Self::parse_software(software, comments, &mut info);
        }
        Ok(info)
    }
}

pub struct FtpParser;

impl ProtocolParser for FtpParser {
    fn protocol(&self) -> &'static str {
        "ftp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if POSITIVE_REPLY.is_match(&text(data)) {
            80
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("ftp", 80);

        if let Some(caps) = REPLY_CODE.captures(&content) {
            let message = caps[2].to_string();
            info.field("response_code", &caps[1]);
            info.field("message", message.as_str());
            if message.to_lowercase().contains("vsftpd") {
                info.product = "vsftpd".into();
                if let Some(version) = capture(&VSFTPD, &message, 1) {
                    info.version = version.into();
                }
            }
        }
        Ok(info)
    }
}

pub struct SmtpParser;

impl ProtocolParser for SmtpParser {
    fn protocol(&self) -> &'static str {
        "smtp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        if POSITIVE_REPLY.is_match(&content) && content.contains("SMTP") {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("smtp", 80);

        if let Some(caps) = REPLY_CODE.captures(&content) {
            info.field("response_code", &caps[1]);
            info.field("message", &caps[2]);
            if caps[2].to_lowercase().contains("postfix") {
                info.product = "Postfix".into();
                info.confidence = 90;
            }
        }
        Ok(info)
    }
}

pub struct Pop3Parser;

impl ProtocolParser for Pop3Parser {
    fn protocol(&self) -> &'static str {
        "pop3"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.starts_with(b"+OK") || data.starts_with(b"-ERR") {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("pop3", 80);
        if data.starts_with(b"+OK") {
            info.field("response", "OK");
            info.confidence = 90;
        } else if data.starts_with(b"-ERR") {
            info.field("response", "ERR");
        }
        Ok(info)
    }
}

pub struct ImapParser;

impl ProtocolParser for ImapParser {
    fn protocol(&self) -> &'static str {
        "imap"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if IMAP_GREETING.is_match(&text(data)) {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("imap", 80);
        if let Some(caps) = IMAP_STATUS.captures(&content) {
            info.field("tag", &caps[1]);
            info.field("status", &caps[2]);
            info.field("message", &caps[3]);
            info.confidence = 90;
        }
        Ok(info)
    }
}

pub struct RedisParser;

impl ProtocolParser for RedisParser {
    fn protocol(&self) -> &'static str {
        "redis"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.starts_with(b"+PONG") || data.starts_with(b"-ERR") {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("redis", 95).with_product("Redis");
        if content.starts_with("+PONG") {
            info.field("response", "PONG");
        } else if let Some(rest) = content.strip_prefix("-ERR") {
            info.field("error", rest.trim());
        }
        Ok(info)
    }
}

pub struct TelnetParser;

impl ProtocolParser for TelnetParser {
    fn protocol(&self) -> &'static str {
        "telnet"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if data.first() == Some(&0xFF) {
            80
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let mut info = ParsedInfo::new("telnet", 70);
        if data.first() == Some(&0xFF) {
            info.field("telnet_command", "IAC");
            info.confidence = 85;
        }
        Ok(info)
    }
}

pub struct RtspParser;

impl RtspParser {
    fn parse_server(server: &str, info: &mut ParsedInfo) {
        info.field("server", server);
        let lower = server.to_lowercase();

        if lower.contains("hikvision") {
            info.product = "Hikvision IP Camera".into();
            info.extra_info = "Hikvision RTSP Server".into();
            info.confidence = 98;
            if let Some(version) = capture(&HIKVISION_VERSION, &lower, 1) {
                info.version = version.into();
            }
        } else if lower.contains("dahua") {
            info.product = "Dahua IP Camera".into();
            info.extra_info = "Dahua RTSP Server".into();
            info.confidence = 98;
        } else if lower.contains("axis") {
            info.product = "AXIS IP Camera".into();
            info.extra_info = "AXIS RTSP Server".into();
            info.confidence = 98;
        } else if lower.contains("uniview") || lower.contains("unv") {
            info.product = "Uniview IP Camera".into();
            info.extra_info = "Uniview RTSP Server".into();
            info.confidence = 98;
        } else if lower.contains("gstreamer") {
            info.product = "GStreamer RTSP Server".into();
            info.extra_info = "Open Source RTSP Server".into();
        } else if lower.contains("live555") {
            info.product = "Live555 RTSP Server".into();
            info.extra_info = "Live555 Media Server".into();
        }
    }
}

impl ProtocolParser for RtspParser {
    fn protocol(&self) -> &'static str {
        "rtsp"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        if content.starts_with("RTSP/") {
            95
        } else if content.contains("RTSP/1.0") {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("rtsp", 80).with_product("RTSP Server");

        let status_line = content.lines().next().unwrap_or("").trim();
        info.field("status_line", status_line);
        if let Some(caps) = RTSP_STATUS.captures(status_line) {
            info.version = caps[1].to_string();
            info.field("status_code", &caps[2]);
            info.field("status_text", caps[3].trim());
            info.confidence = 95;
        }

        for (key, value) in header_map(&content) {
            info.field(&format!("header_{}", key), value.as_str());
            match key.as_str() {
                "server" => Self::parse_server(&value, &mut info),
                "public" => info.field("supported_methods", value),
                "cseq" => info.field("sequence", value),
                "session" => info.field("session_id", value),
                _ => {}
            }
        }
        Ok(info)
    }
}

pub struct SipParser;

impl SipParser {
    fn parse_user_agent(user_agent: &str, info: &mut ParsedInfo) {
        let lower = user_agent.to_lowercase();
        if lower.contains("asterisk") {
            info.product = "Asterisk PBX".into();
            if let Some(version) = capture(&ASTERISK, &lower, 1) {
                info.version = version.into();
            }
        } else if lower.contains("opensips") {
            info.product = "OpenSIPS".into();
        } else if lower.contains("kamailio") {
            info.product = "Kamailio".into();
        } else if lower.contains("freeswitch") {
            info.product = "FreeSWITCH".into();
        }
    }
}

impl ProtocolParser for SipParser {
    fn protocol(&self) -> &'static str {
        "sip"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        if content.contains("SIP/2.0") || SIP_METHOD.is_match(&content) {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("sip", 80).with_product("SIP Server");

        let first_line = content.lines().next().unwrap_or("").trim();
        info.field("first_line", first_line);

        if let Some(caps) = SIP_RESPONSE.captures(first_line) {
            info.field("sip_version", &caps[1]);
            info.field("status_code", &caps[2]);
            info.field("reason_phrase", caps[3].trim());
            info.extra_info = format!("SIP {} {}", &caps[2], caps[3].trim());
            info.confidence = 95;
        }
        if let Some(caps) = SIP_REQUEST.captures(first_line) {
            info.field("method", &caps[1]);
            info.field("request_uri", &caps[2]);
            info.field("sip_version", &caps[3]);
            info.confidence = 90;
        }

        // Only the first few headers matter for identification.
        for line in content.lines().skip(1).take(9) {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let Some(idx) = line.find(':').filter(|&i| i > 0) else {
                continue;
            };
            let key = line[..idx].trim().to_lowercase();
            let value = line[idx + 1..].trim();
            match key.as_str() {
                "user-agent" | "server" => {
                    info.field("user_agent", value);
                    Self::parse_user_agent(value, &mut info);
                }
                "via" => info.field("via", value),
                "call-id" => info.field("call_id", value),
                "cseq" => info.field("cseq", value),
                _ => {}
            }
        }
        Ok(info)
    }
}

pub struct SyslogParser;

fn syslog_facility_name(facility: u32) -> String {
    let name = match facility {
        0 => "kernel",
        1 => "user",
        2 => "mail",
        3 => "daemon",
        4 => "auth",
        5 => "syslog",
        6 => "lpr",
        7 => "news",
        8 => "uucp",
        9 => "cron",
        10 => "authpriv",
        11 => "ftp",
        16 => "local0",
        17 => "local1",
        18 => "local2",
        19 => "local3",
        20 => "local4",
        21 => "local5",
        22 => "local6",
        23 => "local7",
        other => return format!("unknown({})", other),
    };
    name.to_string()
}

fn syslog_severity_name(severity: u32) -> &'static str {
    match severity {
        0 => "emerg",
        1 => "alert",
        2 => "crit",
        3 => "err",
        4 => "warning",
        5 => "notice",
        6 => "info",
        _ => "debug",
    }
}

impl ProtocolParser for SyslogParser {
    fn protocol(&self) -> &'static str {
        "syslog"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        if SYSLOG_PRI.is_match(&text(data)) {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("syslog", 70).with_product("Syslog Server");

        let priority = SYSLOG
            .captures(&content)
            .and_then(|caps| caps[1].parse::<u32>().ok());
        if let Some(priority) = priority {
            let facility = priority >> 3;
            let severity = priority & 0x07;
            let facility_name = syslog_facility_name(facility);
            let severity_name = syslog_severity_name(severity);

            info.field("priority", priority.to_string());
            info.field("facility", facility.to_string());
            info.field("severity", severity.to_string());
            info.field("facility_name", facility_name.as_str());
            info.field("severity_name", severity_name);
            info.extra_info = format!("Syslog {}.{}", facility_name, severity_name);
            info.confidence = 90;
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openssh_ubuntu_banner() {
        let banner = b"SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5\r\n";
        assert_eq!(SshParser.confidence(banner), 95);

        let info = SshParser.parse(banner).unwrap();
        assert_eq!(info.product, "OpenSSH");
        assert!(info.version.contains("8.2p1"));
        assert!(info.os.contains("Ubuntu"));
        assert!(info.confidence >= 90);
        assert_eq!(info.fields["comments"], "Ubuntu-4ubuntu0.5");
        assert_eq!(info.fields["ubuntu_package"], "4");
    }

    #[test]
    fn test_dropbear_is_embedded() {
        let info = SshParser.parse(b"SSH-2.0-dropbear_2019.78\r\n").unwrap();
        assert_eq!(info.product, "Dropbear SSH");
        assert_eq!(info.version, "2019.78");
        assert_eq!(info.device_type, "embedded");
    }

    #[test]
    fn test_ssh_honeypot_comment() {
        let info = SshParser.parse(b"SSH-2.0-OpenSSH_6.0p1 cowrie-aws\r\n").unwrap();
        assert_eq!(info.extra_info, "Possible honeypot");
        assert_eq!(info.fields["cloud_provider"], "AWS");
    }

    #[test]
    fn test_nginx_response() {
        let response = b"HTTP/1.1 200 OK\r\nServer: nginx/1.18.0 (Ubuntu)\r\nContent-Type: text/html\r\nSet-Cookie: PHPSESSID=abc\r\n\r\n<html>";
        assert_eq!(HttpParser.confidence(response), 95);

        let info = HttpParser.parse(response).unwrap();
        assert_eq!(info.service, "http");
        assert_eq!(info.product, "nginx");
        assert_eq!(info.version, "1.18.0");
        assert_eq!(info.os, "Ubuntu");
        assert_eq!(info.fields["status_code"], "200");
        assert_eq!(info.fields["content_type"], "text/html");
        assert_eq!(info.fields["technologies"], "PHP");
    }

    #[test]
    fn test_http_without_server_header_is_lower_confidence() {
        let info = HttpParser.parse(b"HTTP/1.0 404 Not Found\r\n\r\n").unwrap();
        assert_eq!(info.confidence, 70);
        assert_eq!(info.fields["status_text"], "Not Found");
    }

    #[test]
    fn test_iis_powered_by_aspnet() {
        let info = HttpParser
            .parse(b"HTTP/1.1 200 OK\r\nServer: Microsoft-IIS/10.0\r\nX-Powered-By: ASP.NET\r\n\r\n")
            .unwrap();
        assert_eq!(info.product, "Microsoft IIS");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.extra_info, "ASP.NET");
    }

    #[test]
    fn test_vsftpd_greeting() {
        let banner = b"220 (vsFTPd 3.0.3)\r\n";
        assert_eq!(FtpParser.confidence(banner), 80);
        let info = FtpParser.parse(b"220 Welcome vsftpd 3.0.3\r\n").unwrap();
        assert_eq!(info.product, "vsftpd");
        assert_eq!(info.version, "3.0.3");
    }

    #[test]
    fn test_postfix_outranks_ftp() {
        let banner = b"220 mail.example.com ESMTP Postfix (Ubuntu)\r\n";
        assert_eq!(SmtpParser.confidence(banner), 85);
        assert_eq!(FtpParser.confidence(banner), 80);
        let info = SmtpParser.parse(banner).unwrap();
        assert_eq!(info.product, "Postfix");
        assert_eq!(info.confidence, 90);
    }

    #[test]
    fn test_mail_greetings() {
        assert_eq!(Pop3Parser.parse(b"+OK Dovecot ready.\r\n").unwrap().confidence, 90);
        assert_eq!(ImapParser.confidence(b"* OK [CAPABILITY IMAP4rev1] ready\r\n"), 85);
        let info = ImapParser.parse(b"* OK [CAPABILITY IMAP4rev1] ready\r\n").unwrap();
        assert_eq!(info.fields["tag"], "*");
        assert_eq!(info.confidence, 90);
    }

    #[test]
    fn test_redis_pong_and_error() {
        assert_eq!(RedisParser.confidence(b"+PONG\r\n"), 95);
        let info = RedisParser.parse(b"-ERR unknown command\r\n").unwrap();
        assert_eq!(info.fields["error"], "unknown command");
    }

    #[test]
    fn test_rtsp_camera_server() {
        let response = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nServer: Hikvision-Webs 5.4.0\r\nPublic: OPTIONS, DESCRIBE\r\n\r\n";
        assert_eq!(RtspParser.confidence(response), 95);
        let info = RtspParser.parse(response).unwrap();
        assert_eq!(info.product, "Hikvision IP Camera");
        assert_eq!(info.version, "5.4.0");
        assert_eq!(info.confidence, 98);
        assert_eq!(info.fields["supported_methods"], "OPTIONS, DESCRIBE");
    }

    #[test]
    fn test_sip_response_with_asterisk() {
        let response = b"SIP/2.0 200 OK\r\nVia: SIP/2.0/TCP nm\r\nServer: Asterisk 18.2.0\r\n\r\n";
        let info = SipParser.parse(response).unwrap();
        assert_eq!(info.confidence, 95);
        assert_eq!(info.product, "Asterisk PBX");
        assert_eq!(info.version, "18.2.0");
    }

    #[test]
    fn test_syslog_priority_split() {
        let info = SyslogParser.parse(b"<34>Oct 11 22:14:15 host su: failed").unwrap();
        assert_eq!(info.fields["facility_name"], "auth");
        assert_eq!(info.fields["severity_name"], "crit");
        assert_eq!(info.confidence, 90);
    }

    #[test]
    fn test_telnet_iac() {
        assert_eq!(TelnetParser.confidence(&[0xff, 0xfd, 0x18]), 80);
        assert_eq!(TelnetParser.parse(&[0xff, 0xfd, 0x18]).unwrap().confidence, 85);
        assert_eq!(TelnetParser.confidence(b""), 0);
    }
}
