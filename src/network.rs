use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::EngineError;
use crate::scanner::ports::{DEFAULT_PORTS, TOP_100_PORTS};

const MAX_RANGE: u32 = 10000;
const MAX_V6_HOSTS: usize = 1000;

/// Expands a target list (IPs, hostnames, CIDR blocks, IPv4 ranges, comma separated) into
/// individual target strings. Hostnames are kept as written and resolved at scan time.
pub fn expand_targets(target_spec: &str) -> Result<Vec<String>> {
    let mut addresses = Vec::new();
    let mut hostnames = Vec::new();

    for part in target_spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if part.contains('/') {
            addresses.extend(parse_cidr(part)?);
        } else if part.contains('-') && part.parse::<IpAddr>().is_err() && looks_like_range(part) {
            addresses.extend(parse_ip_range(part)?);
        } else if let Ok(ip) = part.parse::<IpAddr>() {
            addresses.push(ip);
        } else {
            validate_hostname(part)?;
            if !hostnames.iter().any(|h: &String| h.eq_ignore_ascii_case(part)) {
                hostnames.push(part.to_string());
            }
        }
    }

    addresses.sort();
    addresses.dedup();

    let mut targets: Vec<String> = addresses.into_iter().map(|ip| ip.to_string()).collect();
    targets.extend(hostnames);
    Ok(targets)
}

// "a.b.c.d-e.f.g.h" rather than a hostname with a dash in it
fn looks_like_range(part: &str) -> bool {
    part.split('-').all(|side| side.trim().parse::<IpAddr>().is_ok())
}

fn validate_hostname(host: &str) -> Result<()> {
    let valid = host.len() <= 253
        && host
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
    if valid {
        Ok(())
    } else {
        Err(anyhow!("Invalid target: {}", host))
    }
}

fn parse_cidr(cidr: &str) -> Result<Vec<IpAddr>> {
    let network: IpNet = cidr
        .parse()
        .map_err(|_| anyhow!("Invalid CIDR notation: {}", cidr))?;

    match network {
        IpNet::V4(net) => Ok(net.hosts().map(IpAddr::V4).collect()),
        IpNet::V6(net) => Ok(net.hosts().take(MAX_V6_HOSTS).map(IpAddr::V6).collect()),
    }
}

fn parse_ip_range(range: &str) -> Result<Vec<IpAddr>> {
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| anyhow!("Invalid IP range format: {}", range))?;

    let start_ip: IpAddr = start
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid start IP: {}", start))?;
    let end_ip: IpAddr = end
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid end IP: {}", end))?;

    match (start_ip, end_ip) {
        (IpAddr::V4(start), IpAddr::V4(end)) => {
            let start_u32 = u32::from(start);
            let end_u32 = u32::from(end);

            if start_u32 > end_u32 {
                return Err(anyhow!("Start IP must be less than or equal to end IP"));
            }
            if end_u32 - start_u32 > MAX_RANGE {
                return Err(anyhow!("IP range too large (max {} addresses)", MAX_RANGE));
            }

            Ok((start_u32..=end_u32)
                .map(|ip| IpAddr::V4(Ipv4Addr::from(ip)))
                .collect())
        }
        (IpAddr::V6(_), IpAddr::V6(_)) => Err(anyhow!("IPv6 ranges are not supported, use CIDR")),
        _ => Err(anyhow!("Start and end IP must be the same version")),
    }
}

/// Parses a port list: `22,80,8000-8010`, `-` for every port, `default` or `top100`.
///
/// The result is sorted and free of duplicates.
pub fn parse_ports(port_spec: &str) -> Result<Vec<u16>> {
    let spec = port_spec.trim();
    match spec {
        "-" => return Ok((1..=u16::MAX).collect()),
        "" | "default" => return Ok(sorted(DEFAULT_PORTS.to_vec())),
        "top100" => return Ok(sorted(TOP_100_PORTS.to_vec())),
        _ => {}
    }

    let mut ports = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start).with_context(|| format!("in range {}", part))?;
            let end = parse_port(end).with_context(|| format!("in range {}", part))?;
            if start > end {
                return Err(anyhow!("Invalid port range {}: start is after end", part));
            }
            ports.extend(start..=end);
        } else {
            ports.push(parse_port(part)?);
        }
    }

    if ports.is_empty() {
        return Err(anyhow!("No ports in specification: {}", port_spec));
    }
    Ok(sorted(ports))
}

fn parse_port(value: &str) -> Result<u16> {
    let port: u16 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid port: {}", value.trim()))?;
    if port == 0 {
        return Err(anyhow!("Port 0 is not scannable"));
    }
    Ok(port)
}

fn sorted(mut ports: Vec<u16>) -> Vec<u16> {
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Turns a target string into the address to scan.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> crate::error::Result<IpAddr>;
}

/// Literal IPs pass through; hostnames go to the system resolver, first address wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl TargetResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> crate::error::Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let resolve_error = |reason: String| EngineError::Resolve {
            host: host.to_string(),
            reason,
        };
        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| resolve_error(e.to_string()))?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| resolve_error("no addresses returned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_single_ip() {
        assert_eq!(expand_targets("192.168.1.1").unwrap(), vec!["192.168.1.1"]);
    }

    #[test]
    fn test_expand_cidr() {
        let targets = expand_targets("192.168.1.0/30").unwrap();
        assert_eq!(targets, vec!["192.168.1.1", "192.168.1.2"]);
    }

    #[test]
    fn test_expand_ip_range() {
        let targets = expand_targets("192.168.1.1-192.168.1.3").unwrap();
        assert_eq!(targets, vec!["192.168.1.1", "192.168.1.2", "192.168.1.3"]);
    }

    #[test]
    fn test_expand_mixed_keeps_hostnames() {
        let targets =
            expand_targets("scanme.example.com, 192.168.1.10-192.168.1.11,192.168.1.10").unwrap();
        assert_eq!(
            targets,
            vec!["192.168.1.10", "192.168.1.11", "scanme.example.com"]
        );
    }

    #[test]
    fn test_dashed_hostname_is_not_a_range() {
        let targets = expand_targets("edge-router.lan").unwrap();
        assert_eq!(targets, vec!["edge-router.lan"]);
    }

    #[test]
    fn test_invalid_targets() {
        assert!(expand_targets("192.168.1.0/99").is_err());
        assert!(expand_targets("0.0.0.0-255.255.255.255").is_err());
        assert!(expand_targets("bad host!").is_err());
    }

    #[test]
    fn test_parse_port_list_and_ranges() {
        assert_eq!(parse_ports("80,22,8000-8002,22").unwrap(), vec![22, 80, 8000, 8001, 8002]);
    }

    #[test]
    fn test_parse_port_presets() {
        assert_eq!(parse_ports("-").unwrap().len(), 65535);
        assert_eq!(parse_ports("top100").unwrap().len(), 100);
        assert_eq!(parse_ports("default").unwrap().len(), DEFAULT_PORTS.len());
    }

    #[test]
    fn test_parse_ports_rejects_garbage() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("70000").is_err());
        assert!(parse_ports("90-80").is_err());
        assert!(parse_ports("http").is_err());
        assert!(parse_ports(",").is_err());
    }

    #[tokio::test]
    async fn test_resolver_passes_literals_through() {
        let ip = SystemResolver.resolve("10.1.2.3").await.unwrap();
        assert_eq!(ip, "10.1.2.3".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resolver_localhost() {
        let ip = SystemResolver.resolve("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }
}
