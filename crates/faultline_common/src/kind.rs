//! Fault taxonomy - the closed set of error kinds and their fixed severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered fault importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of fault raised somewhere in the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Spatial tracking was lost or degraded past usefulness
    TrackingLoss,
    /// An image or other asset could not be loaded
    AssetLoadFailure,
    /// A filter or processing pipeline stage failed
    ProcessingFailure,
    /// Colour or content analysis produced no usable result
    AnalysisFailure,
    /// Memory or other resource pressure
    ResourcePressure,
    /// Frame rate or throughput dropped below target
    ThroughputDegradation,
    /// Gesture, touch, or other interaction handling failed
    InteractionFailure,
    /// Placing or restoring a spatial anchor failed
    AnchorFailure,
    /// Camera or other capture device unavailable
    CaptureDeviceFailure,
    /// Stored session or model data failed validation
    DataCorruption,
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::TrackingLoss,
        ErrorKind::AssetLoadFailure,
        ErrorKind::ProcessingFailure,
        ErrorKind::AnalysisFailure,
        ErrorKind::ResourcePressure,
        ErrorKind::ThroughputDegradation,
        ErrorKind::InteractionFailure,
        ErrorKind::AnchorFailure,
        ErrorKind::CaptureDeviceFailure,
        ErrorKind::DataCorruption,
        ErrorKind::Unknown,
    ];

    /// Fixed severity for this kind. Never changes at runtime.
    pub fn severity(&self) -> Severity {
        match self {
            Self::TrackingLoss | Self::CaptureDeviceFailure | Self::DataCorruption => {
                Severity::Critical
            }
            Self::AssetLoadFailure
            | Self::ProcessingFailure
            | Self::AnchorFailure
            | Self::Unknown => Severity::Error,
            Self::AnalysisFailure | Self::ResourcePressure | Self::InteractionFailure => {
                Severity::Warning
            }
            Self::ThroughputDegradation => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackingLoss => "tracking_loss",
            Self::AssetLoadFailure => "asset_load_failure",
            Self::ProcessingFailure => "processing_failure",
            Self::AnalysisFailure => "analysis_failure",
            Self::ResourcePressure => "resource_pressure",
            Self::ThroughputDegradation => "throughput_degradation",
            Self::InteractionFailure => "interaction_failure",
            Self::AnchorFailure => "anchor_failure",
            Self::CaptureDeviceFailure => "capture_device_failure",
            Self::DataCorruption => "data_corruption",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the snake_case name used in config files and logs
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
