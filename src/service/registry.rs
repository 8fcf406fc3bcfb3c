//! Operation names and name-based dispatch

use super::ReconService;
use crate::error::{ErrorKind, ToolError};
use crate::result::ToolResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub const PING_SWEEP: &str = "recon.ping_sweep";
pub const NMAP_SERVICES_DETECTION: &str = "recon.nmap_services_detection";
pub const HOST_PROBE: &str = "recon.host_probe";
pub const RUSTSCAN_RANGE_PORTS: &str = "recon.rustscan_range_ports";
pub const WHATWEB_SCAN: &str = "enum.whatweb_scan";
pub const GOBUSTER_DIR: &str = "enum.gobuster_dir";
pub const FFUF_FUZZ: &str = "enum.ffuf_fuzz";

/// Published operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: &'static str,
    pub summary: &'static str,
    /// Required parameter
    pub required: &'static str,
}

pub const OPERATIONS: &[OperationInfo] = &[
    OperationInfo {
        name: PING_SWEEP,
        summary: "Find live hosts in a CIDR, range or list (icmp or tcp connect)",
        required: "network",
    },
    OperationInfo {
        name: NMAP_SERVICES_DETECTION,
        summary: "Service and version detection with nmap",
        required: "target",
    },
    OperationInfo {
        name: HOST_PROBE,
        summary: "Liveness check of a single host",
        required: "host",
    },
    OperationInfo {
        name: RUSTSCAN_RANGE_PORTS,
        summary: "List open ports with rustscan, without nmap follow-up",
        required: "target",
    },
    OperationInfo {
        name: WHATWEB_SCAN,
        summary: "Fingerprint web technologies with WhatWeb",
        required: "target",
    },
    OperationInfo {
        name: GOBUSTER_DIR,
        summary: "Brute-force web directories with gobuster",
        required: "url",
    },
    OperationInfo {
        name: FFUF_FUZZ,
        summary: "Fuzz a URL containing FUZZ with ffuf",
        required: "url",
    },
];

/// Look up an operation by name
pub fn operation(name: &str) -> Option<&'static OperationInfo> {
    OPERATIONS.iter().find(|op| op.name == name)
}

fn decode<T: DeserializeOwned>(params: Value) -> crate::Result<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

impl ReconService {
    /// Call an operation by registry name with JSON params
    pub async fn dispatch(&self, name: &str, params: Value) -> ToolResult {
        macro_rules! call {
            ($method:ident) => {
                match decode(params) {
                    Ok(params) => self.$method(params).await,
                    Err(e) => ToolResult::from_error(name, &e),
                }
            };
        }

        match name {
            PING_SWEEP => call!(ping_sweep),
            NMAP_SERVICES_DETECTION => call!(nmap_services_detection),
            HOST_PROBE => call!(host_probe),
            RUSTSCAN_RANGE_PORTS => call!(rustscan_range_ports),
            WHATWEB_SCAN => call!(whatweb_scan),
            GOBUSTER_DIR => call!(gobuster_dir),
            FFUF_FUZZ => call!(ffuf_fuzz),
            _ => ToolResult::failure(name, ErrorKind::InvalidParams, format!("unknown operation '{}'", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_is_listed_once() {
        assert_eq!(OPERATIONS.len(), 7);
        for op in OPERATIONS {
            assert_eq!(OPERATIONS.iter().filter(|o| o.name == op.name).count(), 1);
            assert!(op.name.starts_with("recon.") || op.name.starts_with("enum."));
        }
        assert!(operation(FFUF_FUZZ).is_some());
        assert!(operation("recon.unknown").is_none());
    }

    #[test]
    fn missing_required_field_is_invalid_params() {
        let err = decode::<crate::params::NmapParams>(serde_json::json!({"ports": "22"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn unknown_operation_is_rejected_without_running() {
        let service = ReconService::new(crate::config::AppConfig::default());
        let result = tokio_test::block_on(service.dispatch("recon.teleport", Value::Null));
        assert!(!result.success);
        assert_eq!(result.tool, "recon.teleport");
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidParams));
    }
}
