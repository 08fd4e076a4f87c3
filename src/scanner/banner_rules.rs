// Substring rules over the printable banner. A fallback when no parser claims the bytes, and a
// source of product names when a parser recognizes the protocol but not the implementation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BannerRule {
    pub service: &'static str,
    pub pattern: &'static str,
    /// Product label reported for a match.
    pub version: &'static str,
    pub confidence: u8,
    pub description: &'static str,
}

const fn rule(
    service: &'static str,
    pattern: &'static str,
    version: &'static str,
    confidence: u8,
    description: &'static str,
) -> BannerRule {
    BannerRule {
        service,
        pattern,
        version,
        confidence,
        description,
    }
}

/// Specific implementations first; the bare reply-code rules last so they only catch leftovers.
pub const BUILTIN_RULES: &[BannerRule] = &[
    rule("ssh", "SSH-2.0-OpenSSH", "OpenSSH", 90, "OpenSSH server"),
    rule("ssh", "SSH-2.0-libssh", "libssh", 85, "libssh server"),
    rule("http", "Server: nginx", "nginx", 95, "nginx web server"),
    rule("http", "Server: Apache", "Apache", 95, "Apache httpd"),
    rule("http", "Server: Microsoft-IIS", "IIS", 95, "Microsoft IIS"),
    rule("mysql", "mysql_native_password", "MySQL", 90, "MySQL handshake"),
    rule("redis", "redis_version:", "Redis", 95, "Redis INFO output"),
    rule("postgresql", "PostgreSQL", "PostgreSQL", 90, "PostgreSQL server"),
    rule("ftp", "vsftpd", "vsftpd", 90, "vsftpd FTP server"),
    rule("smtp", "Postfix", "Postfix", 90, "Postfix MTA"),
    rule("smtp", "ESMTP", "SMTP", 80, "generic SMTP greeting"),
    rule("ftp", "220", "FTP", 80, "generic 220 greeting"),
];

#[derive(Debug, Clone)]
pub struct BannerRuleMatcher {
    rules: Vec<BannerRule>,
    lowered: Vec<String>,
}

impl BannerRuleMatcher {
    pub fn new(rules: Vec<BannerRule>) -> Self {
        let lowered = rules.iter().map(|r| r.pattern.to_lowercase()).collect();
        Self { rules, lowered }
    }

    /// First rule, in declaration order, whose pattern occurs in `banner` ignoring case.
    pub fn find(&self, banner: &str) -> Option<&BannerRule> {
        if banner.is_empty() {
            return None;
        }
        let banner = banner.to_lowercase();
        self.lowered
            .iter()
            .position(|pattern| banner.contains(pattern.as_str()))
            .map(|i| &self.rules[i])
    }
}

impl Default for BannerRuleMatcher {
    fn default() -> Self {
        Self::new(BUILTIN_RULES.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let matcher = BannerRuleMatcher::default();
        let rule = matcher.find("HTTP/1.1 200 OK\r\nSERVER: NGINX/1.18\r\n").unwrap();
        assert_eq!(rule.service, "http");
        assert_eq!(rule.version, "nginx");
    }

    #[test]
    fn test_first_declared_rule_wins() {
        let matcher = BannerRuleMatcher::default();
        let rule = matcher.find("220 mail.example.com ESMTP Postfix").unwrap();
        assert_eq!(rule.version, "Postfix");

        let rule = matcher.find("220 (vsFTPd 3.0.3)").unwrap();
        assert_eq!(rule.version, "vsftpd");

        let rule = matcher.find("220 Welcome").unwrap();
        assert_eq!(rule.service, "ftp");
    }

    #[test]
    fn test_custom_order_is_respected() {
        let matcher = BannerRuleMatcher::new(vec![
            rule("a", "x", "A", 10, ""),
            rule("b", "x", "B", 99, ""),
        ]);
        assert_eq!(matcher.find("xyz").unwrap().service, "a");
    }

    #[test]
    fn test_no_match() {
        let matcher = BannerRuleMatcher::default();
        assert!(matcher.find("").is_none());
        assert!(matcher.find("hello world").is_none());
    }
}
