// Static port tables: scan presets, the port-number service guess and fast-path protocol hints.

/// Scanned when a task names no ports.
pub const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 102, 110, 135, 139, 143, 443, 445, 502, 554, 993, 995, 1433, 1521,
    1723, 1883, 3306, 3389, 4840, 5432, 5672, 6379, 7687, 8080, 8443, 9042, 9200, 20000, 27017,
];

/// The hundred most frequently open TCP ports.
pub const TOP_100_PORTS: &[u16] = &[
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135, 139, 143,
    144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548, 554, 587, 631, 646,
    873, 990, 993, 995, 1025, 1026, 1027, 1028, 1029, 1110, 1433, 1720, 1723, 1755, 1900, 2000,
    2001, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899, 5000, 5009, 5051, 5060, 5101, 5190,
    5357, 5432, 5631, 5666, 5800, 5900, 6000, 6001, 6646, 7070, 8000, 8008, 8009, 8080, 8081, 8443,
    8888, 9100, 9999, 10000, 32768, 49152, 49153, 49154, 49155, 49156, 49157,
];

/// Ports that get a follow-up HTTP GET when the first probe drew no response.
pub const HTTP_PORTS: &[u16] = &[80, 443, 8000, 8008, 8080, 8081, 8443, 8888, 9000, 9200];

pub const PORT_HEURISTIC_CONFIDENCE: u8 = 50;

pub fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.contains(&port)
}

/// Conventional service name for a port, used when neither parsers nor rules identify anything.
pub fn service_for_port(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 | 587 => "smtp",
        53 => "dns",
        80 | 8000 | 8008 | 8080 | 8081 | 8888 => "http",
        88 => "kerberos",
        102 => "s7",
        110 => "pop3",
        111 => "rpcbind",
        123 => "ntp",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        389 | 3268 => "ldap",
        443 | 8443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        502 => "modbus",
        514 => "syslog",
        554 | 8554 => "rtsp",
        636 => "ldaps",
        993 => "imaps",
        995 => "pop3s",
        1194 => "openvpn",
        1433 => "sqlserver",
        1521 => "oracle",
        1700 => "lorawan",
        1723 => "pptp",
        1812 => "radius",
        1883 => "mqtt",
        2375 => "docker",
        3306 => "mysql",
        3389 => "rdp",
        4840 => "opcua",
        5060 => "sip",
        5432 => "postgresql",
        5672 => "amqp",
        5683 => "coap",
        5900 => "vnc",
        6379 => "redis",
        6443 | 10250 => "kubernetes",
        7687 => "neo4j",
        8086 => "influxdb",
        9001 => "mqtt-ws",
        9042 => "cassandra",
        9200 => "elasticsearch",
        11211 => "memcached",
        20000 => "dnp3",
        27017 => "mongodb",
        37777 => "dahua",
        47808 => "bacnet",
        51820 => "wireguard",
        _ => return None,
    };
    Some(name)
}

/// Probe protocol tag to try first on a port. Ports without a hint fall back to the NULL probe.
pub fn protocol_hint(port: u16) -> Option<&'static str> {
    let hint = match port {
        21 | 2121 => "ftp",
        22 | 2222 => "ssh",
        23 | 2323 => "telnet",
        25 | 587 => "smtp",
        53 => "dns",
        80 | 8000 | 8008 | 8080 | 8081 | 8888 | 9000 => "http",
        102 => "s7",
        110 => "pop3",
        143 => "imap",
        389 | 3268 => "ldap",
        443 | 465 | 636 | 853 | 993 | 995 | 5061 | 8443 => "tls",
        502 => "modbus",
        554 | 8554 => "rtsp",
        1433 => "sqlserver",
        1521 | 1522 => "oracle",
        1883 | 1884 => "mqtt",
        2375 => "docker",
        3306 | 3307 => "mysql",
        4840 | 4843 => "opcua",
        5060 => "sip",
        5432 => "postgresql",
        5672 => "amqp",
        6379 => "redis",
        6443 | 10250 => "kubernetes",
        7687 => "neo4j",
        8086 => "influxdb",
        9001 => "mqtt-ws",
        9042 => "cassandra",
        9200 | 9201 => "elasticsearch",
        19999 | 20000 => "dnp3",
        27017 | 27018 => "mongodb",
        37777 | 37778 => "dahua",
        _ => return None,
    };
    Some(hint)
}
