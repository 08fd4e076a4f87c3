// Built-in probe catalog. Declaration order is the tie-break order for probe selection.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// One request the engine can send to an open port. An empty payload means "just read the banner".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: &'static str,
    pub protocol: &'static str,
    pub payload: Vec<u8>,
    pub ports: &'static [u16],
    /// 1 (common) to 9 (rarely useful).
    pub rarity: u8,
    pub description: &'static str,
}

impl Probe {
    fn new(
        name: &'static str,
        protocol: &'static str,
        payload: impl Into<Vec<u8>>,
        ports: &'static [u16],
        rarity: u8,
        description: &'static str,
    ) -> Self {
        Probe {
            name,
            protocol,
            payload: payload.into(),
            ports,
            rarity,
            description,
        }
    }

    pub fn is_null(&self) -> bool {
        self.payload.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProbeCatalog {
    probes: Vec<Probe>,
}

impl ProbeCatalog {
    pub fn builtin() -> Self {
        Self {
            probes: builtin_probes(),
        }
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.probes.iter().map(|p| p.name)
    }

    pub fn by_protocol(&self, protocol: &str) -> Vec<&Probe> {
        self.probes
            .iter()
            .filter(|p| p.protocol == protocol)
            .collect()
    }
}

impl Default for ProbeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_probes() -> Vec<Probe> {
    vec![
        Probe::new(
            "NULL",
            "tcp",
            Vec::new(),
            &[21, 22, 23, 25, 110, 143, 3306, 5900],
            1,
            "connect and wait for a greeting",
        ),
        Probe::new(
            "GetRequest",
            "http",
            &b"GET / HTTP/1.0\r\n\r\n"[..],
            &[80, 443, 8000, 8008, 8080, 8081, 8443, 8888, 9000],
            2,
            "HTTP GET /",
        ),
        Probe::new(
            "HTTPOptions",
            "http",
            &b"OPTIONS / HTTP/1.0\r\n\r\n"[..],
            &[80, 443, 8080],
            3,
            "HTTP OPTIONS /",
        ),
        Probe::new(
            "SSHVersionExchange",
            "ssh",
            Vec::new(),
            &[22, 2222],
            1,
            "read the SSH identification string",
        ),
        Probe::new(
            "FTPUser",
            "ftp",
            &b"USER anonymous\r\n"[..],
            &[21, 2121],
            4,
            "FTP USER anonymous",
        ),
        Probe::new(
            "SMTPEhlo",
            "smtp",
            &b"EHLO probescope.local\r\n"[..],
            &[25, 465, 587],
            3,
            "SMTP EHLO",
        ),
        Probe::new(
            "POP3Capabilities",
            "pop3",
            &b"CAPA\r\n"[..],
            &[110, 995],
            4,
            "POP3 CAPA",
        ),
        Probe::new(
            "IMAPCapabilities",
            "imap",
            &b"A001 CAPABILITY\r\n"[..],
            &[143, 993],
            4,
            "IMAP CAPABILITY",
        ),
        Probe::new(
            "TelnetOptions",
            "telnet",
            &[0xff, 0xfb, 0x01, 0xff, 0xfb, 0x03, 0xff, 0xfc, 0x27][..],
            &[23, 2323],
            4,
            "telnet WILL ECHO / WILL SGA / WONT NEW-ENVIRON",
        ),
        Probe::new(
            "MySQLGreeting",
            "mysql",
            Vec::new(),
            &[3306, 3307],
            2,
            "read the MySQL server handshake",
        ),
        Probe::new(
            "PostgreSQLStartup",
            "postgresql",
            postgres_startup(),
            &[5432],
            6,
            "PostgreSQL v3 startup message",
        ),
        Probe::new(
            "RedisPing",
            "redis",
            &b"*1\r\n$4\r\nPING\r\n"[..],
            &[6379],
            5,
            "Redis PING",
        ),
        Probe::new(
            "MongoDBIsMaster",
            "mongodb",
            mongodb_is_master(),
            &[27017, 27018],
            5,
            "MongoDB OP_QUERY isMaster",
        ),
        Probe::new(
            "SQLServerPrelogin",
            "sqlserver",
            tds_prelogin(),
            &[1433],
            5,
            "TDS PRELOGIN",
        ),
        Probe::new(
            "OracleTNSConnect",
            "oracle",
            tns_connect(),
            &[1521, 1522],
            6,
            "Oracle TNS CONNECT",
        ),
        Probe::new(
            "CassandraOptions",
            "cassandra",
            &[0x04, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00][..],
            &[9042],
            6,
            "CQL v4 OPTIONS",
        ),
        Probe::new(
            "Neo4jBolt",
            "neo4j",
            bolt_handshake(),
            &[7687],
            6,
            "Bolt magic and version proposals",
        ),
        Probe::new(
            "TLSClientHello",
            "tls",
            tls_client_hello(),
            &[443, 465, 636, 853, 993, 995, 5061, 6443, 8443],
            2,
            "TLS 1.2 ClientHello",
        ),
        Probe::new(
            "MQTTConnect",
            "mqtt",
            mqtt_connect(),
            &[1883, 1884],
            4,
            "MQTT 3.1.1 CONNECT",
        ),
        Probe::new(
            "MQTTWebSocket",
            "mqtt-ws",
            &b"GET /mqtt HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Protocol: mqtt\r\nSec-WebSocket-Version: 13\r\n\r\n"[..],
            &[8000, 8080, 9001],
            6,
            "WebSocket upgrade offering the mqtt subprotocol",
        ),
        Probe::new(
            "RTSPOptions",
            "rtsp",
            &b"OPTIONS rtsp://127.0.0.1/ RTSP/1.0\r\nCSeq: 1\r\nUser-Agent: probescope\r\n\r\n"[..],
            &[554, 8554, 1935],
            3,
            "RTSP OPTIONS",
        ),
        Probe::new(
            "RTSPDescribe",
            "rtsp",
            &b"DESCRIBE rtsp://127.0.0.1/ RTSP/1.0\r\nCSeq: 2\r\nUser-Agent: probescope\r\nAccept: application/sdp\r\n\r\n"[..],
            &[554, 8554],
            4,
            "RTSP DESCRIBE",
        ),
        Probe::new(
            "SIPOptions",
            "sip",
            &b"OPTIONS sip:probe@127.0.0.1 SIP/2.0\r\nVia: SIP/2.0/TCP 127.0.0.1;branch=z9hG4bK-probescope\r\n\
From: <sip:probe@127.0.0.1>;tag=1\r\nTo: <sip:probe@127.0.0.1>\r\nCall-ID: probescope-1\r\nCSeq: 1 OPTIONS\r\n\
Max-Forwards: 70\r\nContent-Length: 0\r\n\r\n"[..],
            &[5060, 5061],
            5,
            "SIP OPTIONS over TCP",
        ),
        Probe::new(
            "ONVIFDeviceService",
            "onvif",
            onvif_device_information(),
            &[80, 8000, 8080, 8899],
            4,
            "ONVIF GetDeviceInformation",
        ),
        Probe::new(
            "HikvisionISAPI",
            "hikvision",
            hikvision_device_info(),
            &[80, 443, 8000, 8080],
            5,
            "Hikvision ISAPI deviceInfo with default credentials",
        ),
        Probe::new(
            "DahuaLogin",
            "dahua",
            dahua_login(),
            &[37777, 37778],
            6,
            "Dahua DVRIP login request",
        ),
        Probe::new(
            "ModbusReadCoils",
            "modbus",
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x10][..],
            &[502],
            4,
            "Modbus/TCP read coils 0..16 on unit 1",
        ),
        Probe::new(
            "DNP3LinkStatus",
            "dnp3",
            dnp3_link_status(),
            &[20000, 19999],
            5,
            "DNP3 request link status",
        ),
        Probe::new(
            "OPCUAHello",
            "opcua",
            opcua_hello(),
            &[4840, 4843],
            4,
            "OPC UA HEL",
        ),
        Probe::new(
            "S7CotpConnect",
            "s7",
            &[
                0x03, 0x00, 0x00, 0x16, 0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00, 0xC1, 0x02, 0x01,
                0x00, 0xC2, 0x02, 0x01, 0x02, 0xC0, 0x01, 0x0A,
            ][..],
            &[102],
            5,
            "ISO-on-TCP COTP connection request",
        ),
        Probe::new(
            "AMQPHeader",
            "amqp",
            &b"AMQP\x00\x00\x09\x01"[..],
            &[5672],
            5,
            "AMQP 0-9-1 protocol header",
        ),
        Probe::new(
            "ElasticsearchRoot",
            "elasticsearch",
            &b"GET / HTTP/1.1\r\nHost: localhost\r\nAccept: application/json\r\nConnection: close\r\n\r\n"[..],
            &[9200, 9201],
            5,
            "Elasticsearch cluster info",
        ),
        Probe::new(
            "InfluxDBPing",
            "influxdb",
            &b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"[..],
            &[8086],
            6,
            "InfluxDB /ping",
        ),
        Probe::new(
            "DockerVersion",
            "docker",
            &b"GET /version HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"[..],
            &[2375],
            6,
            "Docker Engine /version",
        ),
        Probe::new(
            "KubernetesVersion",
            "kubernetes",
            &b"GET /version HTTP/1.1\r\nHost: localhost\r\nAccept: application/json\r\nConnection: close\r\n\r\n"[..],
            &[6443, 8001, 10250],
            6,
            "Kubernetes API /version",
        ),
        Probe::new(
            "LDAPAnonymousBind",
            "ldap",
            &[0x30, 0x0C, 0x02, 0x01, 0x01, 0x60, 0x07, 0x02, 0x01, 0x03, 0x04, 0x00, 0x80, 0x00][..],
            &[389, 3268],
            5,
            "LDAPv3 anonymous simple bind",
        ),
        Probe::new(
            "DNSStatusRequest",
            "dns",
            &[0x00, 0x0C, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..],
            &[53],
            3,
            "DNS STATUS over TCP",
        ),
    ]
}

fn postgres_startup() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    for (key, value) in [("user", "probescope"), ("database", "postgres")] {
        body.extend_from_slice(key.as_bytes());
        body.push(0);
        body.extend_from_slice(value.as_bytes());
        body.push(0);
    }
    body.push(0);

    let mut packet = ((body.len() + 4) as u32).to_be_bytes().to_vec();
    packet.extend_from_slice(&body);
    packet
}

fn mongodb_is_master() -> Vec<u8> {
    // {isMaster: 1}
    let mut doc = Vec::new();
    doc.push(0x10);
    doc.extend_from_slice(b"isMaster\0");
    doc.extend_from_slice(&1i32.to_le_bytes());
    doc.push(0x00);
    let mut bson = ((doc.len() + 4) as i32).to_le_bytes().to_vec();
    bson.extend_from_slice(&doc);

    let mut body = Vec::new();
    body.extend_from_slice(&0i32.to_le_bytes()); // flags
    body.extend_from_slice(b"admin.$cmd\0");
    body.extend_from_slice(&0i32.to_le_bytes()); // numberToSkip
    body.extend_from_slice(&1i32.to_le_bytes()); // numberToReturn
    body.extend_from_slice(&bson);

    let mut packet = Vec::new();
    packet.extend_from_slice(&((body.len() + 16) as i32).to_le_bytes());
    packet.extend_from_slice(&1i32.to_le_bytes()); // requestID
    packet.extend_from_slice(&0i32.to_le_bytes()); // responseTo
    packet.extend_from_slice(&2004i32.to_le_bytes()); // OP_QUERY
    packet.extend_from_slice(&body);
    packet
}

fn tds_prelogin() -> Vec<u8> {
    // (token, data)
    let options: [(u8, &[u8]); 5] = [
        (0x00, &[0x09, 0x00, 0x00, 0x00, 0x00, 0x00]), // VERSION
        (0x01, &[0x02]),                               // ENCRYPTION: not supported
        (0x02, &[0x00]),                               // INSTOPT
        (0x03, &[0x00, 0x00, 0x00, 0x00]),             // THREADID
        (0x04, &[0x00]),                               // MARS
    ];

    let table_len = options.len() * 5 + 1;
    let mut table = Vec::new();
    let mut data = Vec::new();
    for (token, value) in options {
        table.push(token);
        table.extend_from_slice(&((table_len + data.len()) as u16).to_be_bytes());
        table.extend_from_slice(&(value.len() as u16).to_be_bytes());
        data.extend_from_slice(value);
    }
    table.push(0xFF);

    let total = 8 + table.len() + data.len();
    let mut packet = vec![0x12, 0x01];
    packet.extend_from_slice(&(total as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
    packet.extend_from_slice(&table);
    packet.extend_from_slice(&data);
    packet
}

fn tns_connect() -> Vec<u8> {
    let connect_data: &[u8] = b"(DESCRIPTION=(CONNECT_DATA=(SERVICE_NAME=ORCL)(CID=(PROGRAM=probescope)\
(HOST=probe)(USER=probe)))(ADDRESS=(PROTOCOL=TCP)(HOST=127.0.0.1)(PORT=1521)))";
    const DATA_OFFSET: u16 = 58;

    let mut packet = Vec::new();
    packet.extend_from_slice(&((DATA_OFFSET as usize + connect_data.len()) as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00]); // packet checksum
    packet.push(0x01); // CONNECT
    packet.push(0x00);
    packet.extend_from_slice(&[0x00, 0x00]); // header checksum
    packet.extend_from_slice(&314u16.to_be_bytes()); // version
    packet.extend_from_slice(&300u16.to_be_bytes()); // lowest compatible version
    packet.extend_from_slice(&[0x00, 0x00]); // service options
    packet.extend_from_slice(&0x0800u16.to_be_bytes()); // SDU
    packet.extend_from_slice(&0x7FFFu16.to_be_bytes()); // TDU
    packet.extend_from_slice(&0x4F98u16.to_be_bytes()); // NT protocol characteristics
    packet.extend_from_slice(&[0x00, 0x00]); // line turnaround
    packet.extend_from_slice(&[0x01, 0x00]); // value of 1 in hardware byte order
    packet.extend_from_slice(&(connect_data.len() as u16).to_be_bytes());
    packet.extend_from_slice(&DATA_OFFSET.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // max receivable
    packet.extend_from_slice(&[0x41, 0x41]); // connect flags
    packet.resize(DATA_OFFSET as usize, 0);
    packet.extend_from_slice(connect_data);
    packet
}

fn bolt_handshake() -> Vec<u8> {
    let mut packet = vec![0x60, 0x60, 0xB0, 0x17];
    // 5.0, 4.4, 4.0, 3.0 encoded as 00 00 minor major
    for (major, minor) in [(5u8, 0u8), (4, 4), (4, 0), (3, 0)] {
        packet.extend_from_slice(&[0x00, 0x00, minor, major]);
    }
    packet
}

fn tls_client_hello() -> Vec<u8> {
    const SUITES: [u16; 17] = [
        0xC02C, 0xC030, 0x009F, 0xCCA9, 0xCCA8, 0xCCAA, 0xC02B, 0xC02F, 0x009E, 0xC024, 0xC028,
        0x006B, 0xC023, 0xC027, 0x0067, 0xC00A, 0x002F,
    ];
    const SIG_ALGS: [u16; 9] = [
        0x0403, 0x0503, 0x0603, 0x0804, 0x0805, 0x0806, 0x0401, 0x0501, 0x0601,
    ];

    fn extension(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut ext = kind.to_be_bytes().to_vec();
        ext.extend_from_slice(&(body.len() as u16).to_be_bytes());
        ext.extend_from_slice(body);
        ext
    }

    let host = b"localhost";
    let mut sni = ((host.len() + 3) as u16).to_be_bytes().to_vec();
    sni.push(0x00);
    sni.extend_from_slice(&(host.len() as u16).to_be_bytes());
    sni.extend_from_slice(host);

    let groups: [u16; 3] = [0x001D, 0x0017, 0x0018];
    let mut group_list = ((groups.len() * 2) as u16).to_be_bytes().to_vec();
    groups.iter().for_each(|g| group_list.extend_from_slice(&g.to_be_bytes()));

    let mut sig_list = ((SIG_ALGS.len() * 2) as u16).to_be_bytes().to_vec();
    SIG_ALGS.iter().for_each(|s| sig_list.extend_from_slice(&s.to_be_bytes()));

    let mut extensions = Vec::new();
    extensions.extend(extension(0x0000, &sni));
    extensions.extend(extension(0x000A, &group_list));
    extensions.extend(extension(0x000B, &[0x01, 0x00]));
    extensions.extend(extension(0x000D, &sig_list));

    let mut hello = vec![0x03, 0x03];
    hello.extend((0u8..32).map(|b| b.wrapping_mul(7).wrapping_add(0x5A)));
    hello.push(0x00); // session id
    hello.extend_from_slice(&((SUITES.len() * 2) as u16).to_be_bytes());
    SUITES.iter().for_each(|s| hello.extend_from_slice(&s.to_be_bytes()));
    hello.extend_from_slice(&[0x01, 0x00]); // null compression
    hello.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    hello.extend_from_slice(&extensions);

    let mut handshake = vec![0x01];
    handshake.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&hello);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

/// MQTT variable-length integer.
pub fn encode_remaining_length(mut length: usize) -> Vec<u8> {
    let mut encoded = Vec::new();
    loop {
        let mut byte = (length % 128) as u8;
        length /= 128;
        if length > 0 {
            byte |= 0x80;
        }
        encoded.push(byte);
        if length == 0 {
            return encoded;
        }
    }
}

fn mqtt_connect() -> Vec<u8> {
    let client_id = b"probescope";
    let mut body = vec![0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C];
    body.extend_from_slice(&(client_id.len() as u16).to_be_bytes());
    body.extend_from_slice(client_id);

    let mut packet = vec![0x10];
    packet.extend(encode_remaining_length(body.len()));
    packet.extend_from_slice(&body);
    packet
}

fn onvif_device_information() -> Vec<u8> {
    let envelope = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" \
xmlns:tds=\"http://www.onvif.org/ver10/device/wsdl\">\
<s:Body><tds:GetDeviceInformation/></s:Body></s:Envelope>";
    format!(
        "POST /onvif/device_service HTTP/1.1\r\nHost: localhost\r\n\
Content-Type: application/soap+xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        envelope.len(),
        envelope
    )
    .into_bytes()
}

fn hikvision_device_info() -> Vec<u8> {
    format!(
        "GET /ISAPI/System/deviceInfo HTTP/1.1\r\nHost: localhost\r\nUser-Agent: probescope\r\n\
Authorization: Basic {}\r\nConnection: close\r\n\r\n",
        STANDARD.encode("admin:12345")
    )
    .into_bytes()
}

fn dahua_login() -> Vec<u8> {
    let mut packet = vec![0xA0, 0x00, 0x00, 0x60];
    packet.extend_from_slice(&[0x00; 12]);
    for credential in [b"admin", b"admin"] {
        let mut field = [0u8; 32];
        field[..credential.len()].copy_from_slice(credential);
        packet.extend_from_slice(&field);
    }
    packet.extend_from_slice(&[0x00; 8]);
    packet
}

/// CRC-16/DNP over one link-layer block.
pub fn dnp3_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xA6BC
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn dnp3_link_status() -> Vec<u8> {
    // DIR=1 PRM=1 FC=9, destination 1, source 0
    let mut packet = vec![0x05, 0x64, 0x05, 0xC9, 0x01, 0x00, 0x00, 0x00];
    let crc = dnp3_crc(&packet);
    packet.extend_from_slice(&crc.to_le_bytes());
    packet
}

fn opcua_hello() -> Vec<u8> {
    let endpoint = b"opc.tcp://localhost:4840";
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_le_bytes()); // protocol version
    body.extend_from_slice(&65536u32.to_le_bytes()); // receive buffer
    body.extend_from_slice(&65536u32.to_le_bytes()); // send buffer
    body.extend_from_slice(&0u32.to_le_bytes()); // max message size
    body.extend_from_slice(&0u32.to_le_bytes()); // max chunk count
    body.extend_from_slice(&(endpoint.len() as u32).to_le_bytes());
    body.extend_from_slice(endpoint);

    let mut packet = b"HELF".to_vec();
    packet.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
    packet.extend_from_slice(&body);
    packet
}
