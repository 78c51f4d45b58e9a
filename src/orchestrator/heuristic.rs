//! Log-text effect heuristic
//!
//! Best-effort fallback used when a frame carries a log line but no
//! structured technique code: the message is classified into a keyword
//! family and mapped to a generic effect. Not authoritative — no match
//! degrades to a neutral activity blip, and classification never blocks
//! task progression.

use super::dispatch::EffectDirective;
use crate::topology::DeviceId;

/// Keyword family a log message falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEffectKind {
    Scan,
    Attack,
    Analysis,
    Exfiltration,
    Success,
    Failure,
    Connection,
    /// No family matched
    Activity,
}

/// Keyword families, checked in order; the first hit wins.
///
/// Success and failure come before the broader attack family so that
/// "exploit succeeded" reads as a result, not as an attack in flight.
const FAMILIES: [(&[&str], LogEffectKind); 7] = [
    (
        &["success", "succeeded", "complete", "cracked", "pwned"],
        LogEffectKind::Success,
    ),
    (
        &["fail", "error", "denied", "refused", "unable"],
        LogEffectKind::Failure,
    ),
    (
        &["scan", "probe", "enumerat", "recon", "discover"],
        LogEffectKind::Scan,
    ),
    (
        &["exfil", "steal", "stolen", "dump", "extract"],
        LogEffectKind::Exfiltration,
    ),
    (
        &["attack", "exploit", "inject", "brute", "payload", "overflow"],
        LogEffectKind::Attack,
    ),
    (
        &["connect", "session", "beacon", "tunnel", "channel"],
        LogEffectKind::Connection,
    ),
    (
        &["analy", "generat", "process", "loading", "preparing"],
        LogEffectKind::Analysis,
    ),
];

/// Classifies a free-text log message.
#[must_use]
pub fn classify(message: &str) -> LogEffectKind {
    let lowered = message.to_lowercase();
    for (keywords, kind) in FAMILIES {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return kind;
        }
    }
    LogEffectKind::Activity
}

/// Maps a keyword family to generic effect directives.
///
/// Uses whatever devices are available; a family that needs both ends
/// of a path degrades to a blip on the device it has, or to nothing.
#[must_use]
pub fn directives_for(
    kind: LogEffectKind,
    source: Option<&DeviceId>,
    target: Option<&DeviceId>,
) -> Vec<EffectDirective> {
    let focus = target.or(source);
    match kind {
        LogEffectKind::Scan => focus
            .map(|device| {
                vec![EffectDirective::Pulse {
                    device: device.clone(),
                }]
            })
            .unwrap_or_default(),
        LogEffectKind::Attack | LogEffectKind::Connection => match (source, target) {
            (Some(source), Some(target)) => vec![EffectDirective::PathTravel {
                source: source.clone(),
                target: target.clone(),
            }],
            _ => focus
                .map(|device| {
                    vec![EffectDirective::Activity {
                        device: device.clone(),
                    }]
                })
                .unwrap_or_default(),
        },
        LogEffectKind::Analysis => source
            .or(target)
            .map(|device| {
                vec![EffectDirective::Thinking {
                    device: device.clone(),
                }]
            })
            .unwrap_or_default(),
        LogEffectKind::Exfiltration => match (source, target) {
            (Some(source), Some(target)) => vec![EffectDirective::Exfiltrate {
                source: source.clone(),
                target: target.clone(),
            }],
            _ => focus
                .map(|device| {
                    vec![EffectDirective::Activity {
                        device: device.clone(),
                    }]
                })
                .unwrap_or_default(),
        },
        LogEffectKind::Success => focus
            .map(|device| {
                vec![EffectDirective::SuccessMarker {
                    device: device.clone(),
                }]
            })
            .unwrap_or_default(),
        LogEffectKind::Failure => focus
            .map(|device| {
                vec![EffectDirective::FailureMarker {
                    device: device.clone(),
                }]
            })
            .unwrap_or_default(),
        LogEffectKind::Activity => focus
            .map(|device| {
                vec![EffectDirective::Activity {
                    device: device.clone(),
                }]
            })
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_family() {
        assert_eq!(classify("Scanning ports 1-1000"), LogEffectKind::Scan);
        assert_eq!(classify("enumerating SMB shares"), LogEffectKind::Scan);
        assert_eq!(classify("service discovery started"), LogEffectKind::Scan);
    }

    #[test]
    fn test_attack_family() {
        assert_eq!(classify("launching brute force"), LogEffectKind::Attack);
        assert_eq!(classify("SQL injection attempt"), LogEffectKind::Attack);
        assert_eq!(classify("delivering payload"), LogEffectKind::Attack);
    }

    #[test]
    fn test_result_families_win_over_attack() {
        assert_eq!(classify("exploit succeeded, got shell"), LogEffectKind::Success);
        assert_eq!(classify("exploit failed on target"), LogEffectKind::Failure);
    }

    #[test]
    fn test_exfiltration_family() {
        assert_eq!(classify("exfiltrating database dump"), LogEffectKind::Exfiltration);
        assert_eq!(classify("credentials stolen"), LogEffectKind::Exfiltration);
    }

    #[test]
    fn test_connection_family() {
        assert_eq!(classify("reverse shell session opened"), LogEffectKind::Connection);
        assert_eq!(classify("beacon checked in"), LogEffectKind::Connection);
    }

    #[test]
    fn test_analysis_family() {
        assert_eq!(classify("analyzing response headers"), LogEffectKind::Analysis);
        assert_eq!(classify("generating phishing lure"), LogEffectKind::Analysis);
    }

    #[test]
    fn test_no_match_is_neutral_activity() {
        assert_eq!(classify("waiting for operator"), LogEffectKind::Activity);
        assert_eq!(classify(""), LogEffectKind::Activity);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(classify("SCANNING TARGET"), LogEffectKind::Scan);
    }

    #[test]
    fn test_directives_prefer_target() {
        let src = DeviceId::from("kali");
        let dst = DeviceId::from("web");
        let directives = directives_for(LogEffectKind::Scan, Some(&src), Some(&dst));
        assert_eq!(directives, vec![EffectDirective::Pulse { device: dst }]);
    }

    #[test]
    fn test_attack_needs_both_ends_for_path() {
        let src = DeviceId::from("kali");
        let directives = directives_for(LogEffectKind::Attack, Some(&src), None);
        assert_eq!(
            directives,
            vec![EffectDirective::Activity {
                device: src.clone()
            }]
        );

        let dst = DeviceId::from("web");
        let directives = directives_for(LogEffectKind::Attack, Some(&src), Some(&dst));
        assert!(matches!(directives[0], EffectDirective::PathTravel { .. }));
    }

    #[test]
    fn test_no_devices_no_directives() {
        assert!(directives_for(LogEffectKind::Success, None, None).is_empty());
        assert!(directives_for(LogEffectKind::Activity, None, None).is_empty());
    }

    #[test]
    fn test_analysis_prefers_source() {
        let src = DeviceId::from("kali");
        let dst = DeviceId::from("web");
        let directives = directives_for(LogEffectKind::Analysis, Some(&src), Some(&dst));
        assert_eq!(directives, vec![EffectDirective::Thinking { device: src }]);
    }
}
