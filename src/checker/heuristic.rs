//! Offline risk scoring from manifest permissions, CSP and indicators.
//!
//! Each finding adds a weight; the total maps onto a [`RiskScore`]:
//! 0-20 Low, 21-100 Medium, 101-300 High, above that Critical.

use super::{Assessment, RiskAssessor};
use crate::model::{ExtensionRecord, RiskScore};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PermissionLevel {
    pub fn weight(&self) -> u32 {
        match self {
            PermissionLevel::Critical => 100,
            PermissionLevel::High => 50,
            PermissionLevel::Medium => 20,
            PermissionLevel::Low => 5,
        }
    }
}

/// Risk of a single API permission. Unknown names count as low.
pub fn permission_level(permission: &str) -> PermissionLevel {
    match permission {
        "debugger" | "proxy" | "vpnProvider" | "webAuthenticationProxy" => {
            PermissionLevel::Critical
        }

        "tabs" | "webNavigation" | "history" | "bookmarks" | "topSites" | "sessions"
        | "cookies" | "webRequest" | "webRequestBlocking" | "declarativeNetRequest"
        | "declarativeNetRequestWithHostAccess" | "pageCapture" | "tabCapture"
        | "desktopCapture" | "nativeMessaging" | "management" | "privacy" | "browsingData"
        | "contentSettings" | "downloads" | "downloads.open" | "clipboardRead" => {
            PermissionLevel::High
        }

        "activeTab" | "scripting" | "geolocation" | "notifications" | "clipboardWrite"
        | "identity" | "identity.email" | "webRequestAuthProvider" | "userScripts"
        | "offscreen" => PermissionLevel::Medium,

        _ => PermissionLevel::Low,
    }
}

/// How much of the web an extension's host patterns cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostScope {
    #[default]
    None,
    Specific,
    Broad,
    AllUrls,
}

impl HostScope {
    pub fn weight(&self) -> u32 {
        match self {
            HostScope::None => 0,
            HostScope::Specific => 5,
            HostScope::Broad => 30,
            HostScope::AllUrls => 80,
        }
    }
}

fn is_host_pattern(entry: &str) -> bool {
    entry == "<all_urls>" || entry.contains("://")
}

/// Widest scope among `hosts`.
pub fn host_scope<S: AsRef<str>>(hosts: &[S]) -> HostScope {
    hosts
        .iter()
        .map(|h| {
            let host = h.as_ref().trim();
            if matches!(host, "<all_urls>" | "*://*/*" | "http://*/*" | "https://*/*") {
                return HostScope::AllUrls;
            }
            let domain = host
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or(host)
                .split('/')
                .next()
                .unwrap_or("");
            if domain == "*" {
                HostScope::AllUrls
            } else if domain.starts_with("*.") {
                HostScope::Broad
            } else {
                HostScope::Specific
            }
        })
        .max()
        .unwrap_or_default()
}

/// Host patterns from MV3 `host_permissions`, MV2-style entries in
/// `permissions`, and content script `matches`.
fn collect_host_patterns(record: &ExtensionRecord) -> Vec<String> {
    let manifest = &record.manifest_content;
    let strings = |v: &Value| -> Vec<String> {
        v.as_array()
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    };

    let mut hosts = strings(&manifest["host_permissions"]);
    hosts.extend(record.permissions.iter().filter(|p| is_host_pattern(p)).cloned());
    if let Some(scripts) = manifest["content_scripts"].as_array() {
        for script in scripts {
            hosts.extend(strings(&script["matches"]));
        }
    }
    hosts
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspFindings {
    pub unsafe_eval: bool,
    pub unsafe_inline: bool,
    pub remote_script_hosts: Vec<String>,
}

impl CspFindings {
    pub fn weight(&self) -> u32 {
        let mut weight = 10 * self.remote_script_hosts.len() as u32;
        if self.unsafe_eval {
            weight += 40;
        }
        if self.unsafe_inline {
            weight += 30;
        }
        weight
    }
}

/// Reads a CSP in string form or the serialized MV3 object form.
pub fn analyze_csp(csp: &str) -> CspFindings {
    let mut findings = CspFindings::default();

    let policies: Vec<String> = match serde_json::from_str::<Value>(csp) {
        Ok(Value::Object(map)) => map
            .values()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![csp.to_string()],
    };

    for directive in policies.iter().flat_map(|p| p.split(';')) {
        let mut parts = directive.split_whitespace();
        let name = match parts.next() {
            Some(name) => name,
            None => continue,
        };
        if name != "script-src" && name != "default-src" {
            continue;
        }

        for value in parts {
            match value {
                "'unsafe-eval'" => findings.unsafe_eval = true,
                "'unsafe-inline'" => findings.unsafe_inline = true,
                v if v.starts_with("http://") || v.starts_with("https://") => {
                    let host = v.to_string();
                    if !findings.remote_script_hosts.contains(&host) {
                        findings.remote_script_hosts.push(host);
                    }
                }
                _ => {}
            }
        }
    }

    findings
}

/// Total weight plus the reasons that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub total: u32,
    pub reasons: Vec<String>,
}

pub fn evaluate(record: &ExtensionRecord) -> Evaluation {
    let mut eval = Evaluation::default();

    let mut flagged = Vec::new();
    for permission in record.permissions.iter().filter(|p| !is_host_pattern(p)) {
        let level = permission_level(permission);
        eval.total += level.weight();
        if level >= PermissionLevel::High {
            flagged.push(permission.as_str());
        }
    }
    if !flagged.is_empty() {
        eval.reasons.push(format!("sensitive permissions: {}", flagged.join(", ")));
    }

    let scope = host_scope(&collect_host_patterns(record));
    eval.total += scope.weight();
    match scope {
        HostScope::AllUrls => eval.reasons.push("can access all websites".to_string()),
        HostScope::Broad => eval.reasons.push("wildcard host access".to_string()),
        _ => {}
    }

    let csp = analyze_csp(&record.content_security_policy);
    eval.total += csp.weight();
    if csp.unsafe_eval {
        eval.reasons.push("CSP allows eval()".to_string());
    }
    if csp.unsafe_inline {
        eval.reasons.push("CSP allows inline scripts".to_string());
    }
    if !csp.remote_script_hosts.is_empty() {
        eval.reasons.push(format!(
            "CSP loads scripts from {} remote host(s)",
            csp.remote_script_hosts.len()
        ));
    }

    let ips = record.extracted_ips.len() as u32;
    if ips > 0 {
        eval.total += (ips * 10).min(50);
        eval.reasons.push(format!("{} hard-coded IP address(es)", ips));
    }

    let plain_http = record
        .extracted_urls
        .iter()
        .filter(|u| u.starts_with("http://"))
        .count() as u32;
    if plain_http > 0 {
        eval.total += (plain_http * 5).min(25);
        eval.reasons.push(format!("{} plaintext http URL(s)", plain_http));
    }

    eval
}

pub fn score_for_total(total: u32) -> RiskScore {
    match total {
        0..=20 => RiskScore::Low,
        21..=100 => RiskScore::Medium,
        101..=300 => RiskScore::High,
        _ => RiskScore::Critical,
    }
}

/// Deterministic assessor that needs no network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicAssessor;

#[async_trait]
impl RiskAssessor for HeuristicAssessor {
    fn name(&self) -> &'static str {
        "Heuristic"
    }

    async fn assess(&self, record: &ExtensionRecord) -> Assessment {
        let eval = evaluate(record);
        let score = score_for_total(eval.total);
        let reason = if eval.reasons.is_empty() {
            "no notable permissions or indicators".to_string()
        } else {
            eval.reasons.join("; ")
        };

        Assessment::new(
            score,
            format!("Risk: {}\nReason: {} (score {})", score, reason, eval.total),
        )
    }
}
