//! Platform log classifier.
//!
//! Maps free-text platform error and exception lines onto an [`ErrorKind`]
//! with ordered keyword rules. The first matching rule wins; lines that
//! match nothing classify as [`ErrorKind::Unknown`].

use crate::kind::ErrorKind;
use regex::Regex;
use tracing::debug;

struct Rule {
    kind: ErrorKind,
    pattern: Regex,
}

/// Keyword-rule classifier for platform log lines
pub struct LogClassifier {
    rules: Vec<Rule>,
}

/// Default rules, most specific first
const DEFAULT_RULES: &[(ErrorKind, &str)] = &[
    (ErrorKind::TrackingLoss, r"tracking|spatial|relocaliz|world ?map"),
    (ErrorKind::CaptureDeviceFailure, r"camera|capture (device|session)|video device"),
    (ErrorKind::AnchorFailure, r"anchor"),
    (ErrorKind::DataCorruption, r"corrupt|checksum|malformed|decode error"),
    (ErrorKind::ResourcePressure, r"memory|out of space|disk full|low resources"),
    (ErrorKind::ThroughputDegradation, r"frame ?rate|fps|dropped frames|performance|thermal"),
    (ErrorKind::AssetLoadFailure, r"image|texture|asset|load(ing)? fail|file not found"),
    (ErrorKind::ProcessingFailure, r"filter|shader|render|processing"),
    (ErrorKind::AnalysisFailure, r"colou?r|analysis|histogram"),
    (ErrorKind::InteractionFailure, r"gesture|touch|\btap\b|interaction"),
];

impl LogClassifier {
    /// Classifier with the built-in keyword rules
    pub fn new() -> Self {
        let mut classifier = Self { rules: Vec::new() };
        for (kind, pattern) in DEFAULT_RULES {
            // Built-in patterns are static and known to compile
            if let Ok(regex) = Regex::new(&format!("(?i){}", pattern)) {
                classifier.rules.push(Rule {
                    kind: *kind,
                    pattern: regex,
                });
            }
        }
        classifier
    }

    /// Classifier with no rules; everything is `Unknown` until rules are added
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a case-insensitive rule, checked after existing rules
    pub fn with_rule(mut self, kind: ErrorKind, pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("(?i){}", pattern))?;
        self.rules.push(Rule {
            kind,
            pattern: regex,
        });
        Ok(self)
    }

    /// Classify a single log line
    pub fn classify(&self, line: &str) -> ErrorKind {
        let kind = self
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(line))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Unknown);
        debug!("Classified log line as {}: {}", kind, line);
        kind
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new()
    }
}
