use crate::scanner::banner_rules::BannerRuleMatcher;
use crate::scanner::ports::{self, PORT_HEURISTIC_CONFIDENCE};
use crate::scanner::protocol_parsers::{is_text, ParsedInfo, ParserDispatch};
use crate::scanner::results::{IdentificationSource, PortResult};

const MAX_BANNER_CHARS: usize = 512;

/// What one probe drew from a port, with the parser verdict on those bytes.
#[derive(Debug, Clone)]
pub struct Observation {
    pub probe: String,
    pub bytes: Vec<u8>,
    pub parsed: Option<ParsedInfo>,
}

impl Observation {
    pub fn confidence(&self) -> u8 {
        self.parsed.as_ref().map_or(0, |p| p.confidence)
    }

    /// Whether this observation should replace `current` as the port's best evidence.
    pub fn beats(&self, current: &Observation) -> bool {
        if self.confidence() != current.confidence() {
            return self.confidence() > current.confidence();
        }
        current.bytes.is_empty() && !self.bytes.is_empty()
    }
}

/// Combines parser output, banner rules and the port table into one `PortResult`.
pub struct ResultAggregator {
    dispatch: ParserDispatch,
    rules: BannerRuleMatcher,
}

impl ResultAggregator {
    pub fn new(dispatch: ParserDispatch, rules: BannerRuleMatcher) -> Self {
        Self { dispatch, rules }
    }

    pub fn identify(&self, bytes: &[u8]) -> Option<ParsedInfo> {
        self.dispatch.dispatch(bytes)
    }

    /// Builds the result for an open port from its best observation, if any.
    ///
    /// Parser verdicts win over banner rules, which win over the port-number guess.
    pub fn finish(&self, port: u16, observation: Option<Observation>) -> PortResult {
        let mut result = PortResult::open(port);

        let Some(observation) = observation else {
            apply_port_heuristic(&mut result);
            return result;
        };

        result.banner = banner_text(&observation.bytes);
        let printable = String::from_utf8_lossy(&observation.bytes);
        let rule = self.rules.find(&printable);

        match observation.parsed.filter(|p| p.confidence > 0) {
            Some(info) => {
                result.service = info.service;
                result.product = info.product;
                result.version = info.version;
                result.os = info.os;
                result.confidence = info.confidence;
                result.source = IdentificationSource::Parser;
                result.fields = info.fields;
                if !info.extra_info.is_empty() {
                    result.fields.insert("extra_info".into(), info.extra_info);
                }
                if !info.device_type.is_empty() {
                    result.fields.insert("device_type".into(), info.device_type);
                }
                if info.protocol != result.service {
                    result.fields.insert("protocol".into(), info.protocol);
                }
                if let Some(rule) = rule {
                    if result.product.is_empty() && rule.service == result.service {
                        result.product = rule.version.to_string();
                    }
                }
                result.probe = Some(observation.probe);
            }
            None => match rule {
                Some(rule) => {
                    result.service = rule.service.to_string();
                    result.product = rule.version.to_string();
                    result.confidence = rule.confidence.min(100);
                    result.source = IdentificationSource::Rule;
                    result.probe = Some(observation.probe);
                }
                None => apply_port_heuristic(&mut result),
            },
        }

        result
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(ParserDispatch::new(), BannerRuleMatcher::default())
    }
}

fn apply_port_heuristic(result: &mut PortResult) {
    match ports::service_for_port(result.port) {
        Some(service) => {
            result.service = service.to_string();
            result.confidence = PORT_HEURISTIC_CONFIDENCE;
            result.source = IdentificationSource::PortHeuristic;
        }
        None => {
            result.service = "unknown".to_string();
            result.confidence = 0;
            result.source = IdentificationSource::None;
        }
    }
}

/// Printable rendition of a response: trimmed text, or escaped bytes for binary replies.
pub fn banner_text(bytes: &[u8]) -> String {
    let rendered = if is_text(bytes) {
        String::from_utf8_lossy(bytes).trim().to_string()
    } else {
        bytes.escape_ascii().to_string()
    };
    if rendered.chars().count() > MAX_BANNER_CHARS {
        rendered.chars().take(MAX_BANNER_CHARS).collect()
    } else {
        rendered
    }
}
