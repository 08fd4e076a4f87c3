// Products spoken over HTTP. Each parser only claims a response carrying its own marker; anything
// else is left to the plain HTTP parser.

use lazy_static::lazy_static;
use regex::Regex;

use super::text_parsers::HttpParser;
use super::{capture, header_map, text, ParsedInfo, ProtocolParser};
use crate::error::Result;

lazy_static! {
    static ref ES_VERSION: Regex = Regex::new(r#""version"\s*:\s*\{\s*"number"\s*:\s*"([^"]+)""#).unwrap();
    static ref ES_LUCENE: Regex = Regex::new(r#""lucene_version"\s*:\s*"([^"]+)""#).unwrap();
    static ref ES_CLUSTER: Regex = Regex::new(r#""cluster_name"\s*:\s*"([^"]+)""#).unwrap();
    static ref DOCKER_VERSION: Regex = Regex::new(r#""Version"\s*:\s*"([^"]+)""#).unwrap();
    static ref DOCKER_API: Regex = Regex::new(r#""ApiVersion"\s*:\s*"([^"]+)""#).unwrap();
    static ref DOCKER_COMMIT: Regex = Regex::new(r#""GitCommit"\s*:\s*"([^"]+)""#).unwrap();
    static ref DOCKER_OS: Regex = Regex::new(r#""Os"\s*:\s*"([^"]+)""#).unwrap();
    static ref DOCKER_ARCH: Regex = Regex::new(r#""Arch"\s*:\s*"([^"]+)""#).unwrap();
    static ref K8S_MAJOR: Regex = Regex::new(r#""major"\s*:\s*"([^"]+)""#).unwrap();
    static ref K8S_MINOR: Regex = Regex::new(r#""minor"\s*:\s*"([^"]+)""#).unwrap();
    static ref K8S_GIT_VERSION: Regex = Regex::new(r#""gitVersion"\s*:\s*"([^"]+)""#).unwrap();
    static ref K8S_BUILD_DATE: Regex = Regex::new(r#""buildDate"\s*:\s*"([^"]+)""#).unwrap();
    static ref ONVIF_MANUFACTURER: Regex = Regex::new(r"<tds:Manufacturer>(.*?)</tds:Manufacturer>").unwrap();
    static ref ONVIF_MODEL: Regex = Regex::new(r"<tds:Model>(.*?)</tds:Model>").unwrap();
    static ref ONVIF_FIRMWARE: Regex = Regex::new(r"<tds:FirmwareVersion>(.*?)</tds:FirmwareVersion>").unwrap();
    static ref ONVIF_SERIAL: Regex = Regex::new(r"<tds:SerialNumber>(.*?)</tds:SerialNumber>").unwrap();
    static ref ONVIF_TYPES: Regex = Regex::new(r"<d:Types>(.*?)</d:Types>").unwrap();
    static ref ONVIF_XADDRS: Regex = Regex::new(r"<d:XAddrs>(.*?)</d:XAddrs>").unwrap();
    static ref HIK_MODEL: Regex = Regex::new(r"<model>(.*?)</model>").unwrap();
    static ref HIK_FIRMWARE: Regex = Regex::new(r"<firmwareVersion>(.*?)</firmwareVersion>").unwrap();
    static ref HIK_SERIAL: Regex = Regex::new(r"<serialNumber>(.*?)</serialNumber>").unwrap();
    static ref HIK_DEVICE_NAME: Regex = Regex::new(r"<deviceName>(.*?)</deviceName>").unwrap();
}

/// HTTP fields first, then the product-specific identity on top.
fn http_base(protocol: &str, product: &str, data: &[u8]) -> ParsedInfo {
    let mut info = ParsedInfo::new(protocol, 70);
    HttpParser::parse_into(&text(data), &mut info);
    info.product = product.to_string();
    info
}

fn is_http(content: &str) -> bool {
    content.contains("HTTP/")
}

pub struct ElasticsearchParser;

impl ProtocolParser for ElasticsearchParser {
    fn protocol(&self) -> &'static str {
        "elasticsearch"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data).to_lowercase();
        if content.contains("elasticsearch") || content.contains("you know, for search") {
            95
        } else if content.contains("lucene_version") {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = http_base("elasticsearch", "Elasticsearch", data);

        if self.confidence(data) > 0 {
            info.confidence = 95;
            if let Some(version) = capture(&ES_VERSION, &content, 1) {
                info.version = version.into();
            }
            if let Some(lucene) = capture(&ES_LUCENE, &content, 1) {
                info.field("lucene_version", lucene);
            }
            if let Some(cluster) = capture(&ES_CLUSTER, &content, 1) {
                info.field("cluster_name", cluster);
                info.extra_info = "Elasticsearch Cluster".into();
            }
            // OpenSearch keeps the Elasticsearch response shape but names itself.
            if content.contains("\"distribution\" : \"opensearch\"")
                || content.contains("\"distribution\":\"opensearch\"")
            {
                info.product = "OpenSearch".into();
            }
        }
        Ok(info)
    }
}

pub struct InfluxDbParser;

impl ProtocolParser for InfluxDbParser {
    fn protocol(&self) -> &'static str {
        "influxdb"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        if is_http(&content) && header_map(&content).contains_key("x-influxdb-version") {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = http_base("influxdb", "InfluxDB", data);
        let headers = header_map(&content);

        if let Some(version) = headers.get("x-influxdb-version") {
            info.version = version.clone();
            info.confidence = 98;
        }
        if let Some(build) = headers.get("x-influxdb-build") {
            info.field("build", build.as_str());
        }
        if info.fields.get("status_code").map(String::as_str) == Some("204") {
            info.extra_info = "InfluxDB Ping Response".into();
            info.confidence = info.confidence.max(95);
        }
        Ok(info)
    }
}

pub struct DockerParser;

impl ProtocolParser for DockerParser {
    fn protocol(&self) -> &'static str {
        "docker"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data).to_lowercase();
        if content.contains("docker") && content.contains("version") {
            95
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = http_base("docker", "Docker Engine", data);

        if content.to_lowercase().contains("docker") {
            info.confidence = 95;
            if let Some(version) = capture(&DOCKER_VERSION, &content, 1) {
                info.version = version.into();
            }
            if let Some(api) = capture(&DOCKER_API, &content, 1) {
                info.field("api_version", api);
            }
            if let Some(commit) = capture(&DOCKER_COMMIT, &content, 1) {
                info.field("git_commit", commit);
            }
            if let Some(os) = capture(&DOCKER_OS, &content, 1) {
                info.os = os.into();
            }
            if let Some(arch) = capture(&DOCKER_ARCH, &content, 1) {
                info.field("architecture", arch);
            }
            if info.fields.get("status_code").map(String::as_str) == Some("200") {
                info.extra_info = "Unauthenticated Docker API".into();
            }
        }
        Ok(info)
    }
}

pub struct KubernetesParser;

impl KubernetesParser {
    fn looks_like_version_info(content: &str) -> bool {
        content.contains("\"gitVersion\"") && content.contains("\"major\"")
    }
}

impl ProtocolParser for KubernetesParser {
    fn protocol(&self) -> &'static str {
        "kubernetes"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        let lower = content.to_lowercase();
        if lower.contains("kubernetes") || lower.contains("k8s.io") {
            95
        } else if Self::looks_like_version_info(&content) {
            90
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = http_base("kubernetes", "Kubernetes API Server", data);
        let lower = content.to_lowercase();

        if lower.contains("kubernetes") || lower.contains("k8s.io") {
            info.confidence = 95;
        } else if Self::looks_like_version_info(&content) {
            info.confidence = 90;
        }

        if let (Some(major), Some(minor)) = (capture(&K8S_MAJOR, &content, 1), capture(&K8S_MINOR, &content, 1)) {
            info.version = format!("{}.{}", major, minor);
        }
        if let Some(git) = capture(&K8S_GIT_VERSION, &content, 1) {
            info.field("git_version", git);
            // Distribution suffixes: v1.27.3+k3s1, v1.26.5-eks-...
            if git.contains("k3s") {
                info.product = "K3s".into();
            } else if git.contains("-eks-") {
                info.field("cloud_provider", "AWS EKS");
            } else if git.contains("-gke.") {
                info.field("cloud_provider", "Google GKE");
            }
        }
        if let Some(date) = capture(&K8S_BUILD_DATE, &content, 1) {
            info.field("build_date", date);
        }
        if content.contains("\"groups\"") {
            info.extra_info = "Kubernetes API Groups".into();
        }
        if info.fields.get("status_code").map(String::as_str) == Some("401")
            || info.fields.get("status_code").map(String::as_str) == Some("403")
        {
            info.field("auth_required", "true");
        }
        Ok(info)
    }
}

pub struct HikvisionParser;

impl ProtocolParser for HikvisionParser {
    fn protocol(&self) -> &'static str {
        "hikvision"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data).to_lowercase();
        if content.contains("hikvision") {
            95
        } else if content.contains("isapi") {
            85
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("hikvision", 85).with_product("Hikvision IP Camera");
        info.device_type = "webcam".into();
        if !is_http(&content) {
            return Ok(info);
        }

        let status_line = content.lines().next().unwrap_or("").trim();
        info.field("status_line", status_line);
        if status_line.contains("200 OK") {
            info.confidence = 95;
        } else if status_line.contains("401") {
            info.field("auth_required", "true");
            info.extra_info = "Authentication Required".into();
        }

        if let Some(server) = header_map(&content).get("server") {
            info.field("server", server.as_str());
            if server.to_lowercase().contains("hikvision") {
                info.confidence = 98;
            }
        }

        if content.contains("<DeviceInfo") {
            info.field("response_type", "ISAPI DeviceInfo");
            if let Some(model) = capture(&HIK_MODEL, &content, 1) {
                info.field("model", model.trim());
            }
            if let Some(name) = capture(&HIK_DEVICE_NAME, &content, 1) {
                info.field("device_name", name.trim());
            }
            if let Some(firmware) = capture(&HIK_FIRMWARE, &content, 1) {
                info.version = firmware.trim().into();
            }
            if let Some(serial) = capture(&HIK_SERIAL, &content, 1) {
                info.field("serial_number", serial.trim());
            }
            info.confidence = 98;
        }
        Ok(info)
    }
}

pub struct OnvifParser;

impl ProtocolParser for OnvifParser {
    fn protocol(&self) -> &'static str {
        "onvif"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data).to_lowercase();
        if content.contains("onvif") && content.contains("soap") {
            95
        } else if content.contains("soap:envelope") && content.contains("device") {
            80
        } else {
            0
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("onvif", 80).with_product("ONVIF Device");
        info.device_type = "webcam".into();

        let envelope = ["soap:Envelope", "SOAP-ENV:Envelope", "s:Envelope", "env:Envelope"]
            .iter()
            .any(|tag| content.contains(tag));
        if !envelope {
            return Ok(info);
        }
        info.field("message_type", "SOAP Response");
        info.confidence = 90;

        if content.contains("GetDeviceInformationResponse") {
            info.field("response_type", "DeviceInformation");
            if let Some(manufacturer) = capture(&ONVIF_MANUFACTURER, &content, 1) {
                let manufacturer = manufacturer.trim();
                info.field("manufacturer", manufacturer);
                info.product = format!("{} ONVIF Device", manufacturer);
            }
            if let Some(model) = capture(&ONVIF_MODEL, &content, 1) {
                info.field("model", model.trim());
            }
            if let Some(firmware) = capture(&ONVIF_FIRMWARE, &content, 1) {
                info.version = firmware.trim().into();
            }
            if let Some(serial) = capture(&ONVIF_SERIAL, &content, 1) {
                info.field("serial_number", serial.trim());
            }
            info.confidence = 98;
        }

        if content.contains("ProbeMatches") {
            info.field("response_type", "WS-Discovery ProbeMatches");
            info.service = "onvif-discovery".into();
            if let Some(types) = capture(&ONVIF_TYPES, &content, 1) {
                info.field("device_types", types.trim());
            }
            if let Some(addrs) = capture(&ONVIF_XADDRS, &content, 1) {
                info.field("device_addresses", addrs.trim());
            }
        }

        if content.contains("NotAuthorized") || content.contains("ter:NotAuthorized") {
            info.field("auth_required", "true");
        }
        Ok(info)
    }
}

pub struct MqttWebSocketParser;

impl MqttWebSocketParser {
    fn subprotocol_is_mqtt(content: &str) -> bool {
        header_map(content)
            .get("sec-websocket-protocol")
            .map_or(false, |p| p.to_lowercase().contains("mqtt"))
    }
}

impl ProtocolParser for MqttWebSocketParser {
    fn protocol(&self) -> &'static str {
        "mqtt-ws"
    }

    fn confidence(&self, data: &[u8]) -> u8 {
        let content = text(data);
        let lower = content.to_lowercase();
        if !(lower.contains("http/") && lower.contains("websocket")) {
            return 0;
        }
        if Self::subprotocol_is_mqtt(&content) {
            // An accepted upgrade naming the MQTT subprotocol outranks any generic web server.
            98
        } else if lower.contains("mqtt") {
            90
        } else {
            70
        }
    }

    fn parse(&self, data: &[u8]) -> Result<ParsedInfo> {
        let content = text(data);
        let mut info = ParsedInfo::new("mqtt-ws", 70);
        HttpParser::parse_into(&content, &mut info);
        info.service = "mqtt-websocket".into();

        if content.to_lowercase().contains("mqtt") {
            info.product = "MQTT over WebSocket".into();
            info.extra_info = "WebSocket MQTT Broker".into();
            info.confidence = 90;
        }
        if Self::subprotocol_is_mqtt(&content) {
            info.confidence = 98;
        }
        if info.fields.get("status_code").map(String::as_str) == Some("101") {
            info.field("upgrade_accepted", "true");
        }
        Ok(info)
    }
}
