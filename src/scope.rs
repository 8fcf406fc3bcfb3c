//! Target scope guard
//!
//! Every target passes through [`ScopeGuard`] before a process is spawned or a
//! socket is opened. The check is a literal string-prefix test against the
//! configured allow-list prefix, applied to the network address of a CIDR and
//! to the host part of a URL.
//!
//! Known limitation: the test is not CIDR-aware. A prefix of `10.1` also
//! admits `10.10.0.0/16` and `10.100.3.4`; a prefix of `10.0.0.0` does not
//! admit `10.0.0.0/8` written as `10.0.0.7/8`. Operators should end numeric
//! prefixes with a dot (`10.1.`) to avoid the first case.

use crate::error::ToolError;
use ipnetwork::IpNetwork;
use reqwest::Url;
use std::str::FromStr;

/// Outcome of a scope check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    Allowed,
    Rejected(String),
}

impl ScopeDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ScopeDecision::Allowed)
    }
}

/// Allow-list prefix check
#[derive(Debug, Clone, Default)]
pub struct ScopeGuard {
    allowed_prefix: String,
}

impl ScopeGuard {
    pub fn new<S: Into<String>>(allowed_prefix: S) -> Self {
        Self {
            allowed_prefix: allowed_prefix.into(),
        }
    }

    /// True when no prefix is configured and every target is admitted
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_prefix.is_empty()
    }

    pub fn allowed_prefix(&self) -> &str {
        &self.allowed_prefix
    }

    /// Validate a single target (host, IP, CIDR or URL)
    pub fn validate(&self, target: &str) -> ScopeDecision {
        if self.is_unrestricted() {
            return ScopeDecision::Allowed;
        }

        let subject = match scope_subject(target) {
            Some(subject) => subject,
            None => return ScopeDecision::Rejected("target has no host component".to_string()),
        };

        if subject.starts_with(&self.allowed_prefix) {
            ScopeDecision::Allowed
        } else {
            ScopeDecision::Rejected(format!(
                "'{}' does not start with allowed prefix '{}'",
                subject, self.allowed_prefix
            ))
        }
    }

    /// Validate and convert a rejection into an error
    pub fn check(&self, target: &str) -> Result<(), ToolError> {
        match self.validate(target) {
            ScopeDecision::Allowed => Ok(()),
            ScopeDecision::Rejected(reason) => {
                log::warn!("Rejected out-of-scope target {}: {}", target, reason);
                Err(ToolError::ScopeViolation {
                    target: target.to_string(),
                    reason,
                })
            }
        }
    }

    /// Validate every entry of a comma-separated target list.
    /// The first rejected entry fails the whole list, and a restricted guard
    /// rejects a list with no entries at all.
    pub fn check_list(&self, targets: &str) -> Result<(), ToolError> {
        let mut checked = 0usize;
        for entry in targets.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            self.check(entry)?;
            checked += 1;
        }
        if checked == 0 && !self.is_unrestricted() {
            return Err(ToolError::ScopeViolation {
                target: targets.to_string(),
                reason: "no target entries to check".to_string(),
            });
        }
        Ok(())
    }
}

/// The string the prefix is compared against
fn scope_subject(target: &str) -> Option<String> {
    let target = target.trim();

    if target.contains("://") {
        let url = Url::parse(target).ok()?;
        let host = url.host_str()?;
        return Some(host.trim_start_matches('[').trim_end_matches(']').to_string());
    }

    if let Some((network, _prefix_len)) = target.split_once('/') {
        // CIDR: compare the network address, not whatever host bits were given
        if let Ok(net) = IpNetwork::from_str(target) {
            return Some(net.network().to_string());
        }
        return Some(network.to_string());
    }

    Some(target.to_string())
}
