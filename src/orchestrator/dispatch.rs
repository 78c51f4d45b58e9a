//! Phase/technique effect dispatch
//!
//! Pure mapping from a kill-chain signal to effect directives. The
//! orchestrator resolves device references before calling in; a
//! directive that needs a device the frame could not name is simply not
//! emitted (skip the visual, never fail the task).

use crate::backend::StepStatus;
use crate::task::KillChainPhase;
use crate::topology::DeviceId;

/// One scheduler action the orchestrator should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectDirective {
    /// Start (or restart) the repeating scan pulse on a device
    StartScan { target: DeviceId },
    /// Stop the repeating scan pulse on a device
    StopScan { target: DeviceId },
    /// One-shot scan pulse
    Pulse { device: DeviceId },
    /// Activity indicator over a device that is "working"
    Thinking { device: DeviceId },
    /// Path travel from source to target
    PathTravel { source: DeviceId, target: DeviceId },
    /// Set the target to `targeted` with a steady glow
    MarkTargeted { target: DeviceId },
    /// Set the target to `compromised` with a pulsing glow
    MarkCompromised { target: DeviceId },
    /// Start background traffic between attacker and target
    StartTraffic { source: DeviceId, target: DeviceId },
    /// Data exfiltration train from target back to source
    Exfiltrate { source: DeviceId, target: DeviceId },
    /// Success marker over a device
    SuccessMarker { device: DeviceId },
    /// Failure marker over a device
    FailureMarker { device: DeviceId },
    /// Neutral activity blip
    Activity { device: DeviceId },
}

/// Whether a step signal means the technique finished.
const fn step_completed(step: Option<StepStatus>) -> bool {
    matches!(step, Some(StepStatus::Completed))
}

/// Maps a phase/technique signal to effect directives.
///
/// Techniques the table does not know fall back to the phase default,
/// mirroring how an operator would read the stage: reconnaissance
/// pulses the target, weaponization shows work at the source, delivery
/// and exploitation travel the path, installation and later stages mark
/// and exercise the foothold.
#[must_use]
pub fn effects_for(
    phase: KillChainPhase,
    technique: Option<&str>,
    step: Option<StepStatus>,
    source: Option<&DeviceId>,
    target: Option<&DeviceId>,
) -> Vec<EffectDirective> {
    let mut directives = Vec::new();

    match phase {
        KillChainPhase::Reconnaissance => match technique {
            Some("vulnerability_scan") => {
                if let Some(target) = target {
                    directives.push(EffectDirective::Pulse {
                        device: target.clone(),
                    });
                }
            }
            Some("info_gathering") => {
                if let Some(source) = source {
                    directives.push(EffectDirective::Thinking {
                        device: source.clone(),
                    });
                }
            }
            // port_scan, network_scan, and anything unnamed scan the target.
            _ => {
                if let Some(target) = target {
                    if step_completed(step) || matches!(step, Some(StepStatus::Failed)) {
                        directives.push(EffectDirective::StopScan {
                            target: target.clone(),
                        });
                        if step_completed(step) {
                            directives.push(EffectDirective::Pulse {
                                device: target.clone(),
                            });
                        }
                    } else {
                        directives.push(EffectDirective::StartScan {
                            target: target.clone(),
                        });
                    }
                }
            }
        },

        KillChainPhase::Weaponization => {
            // Lure or payload generation happens at the attacker.
            if let Some(source) = source {
                directives.push(EffectDirective::Thinking {
                    device: source.clone(),
                });
            }
        }

        KillChainPhase::Delivery => {
            if let (Some(source), Some(target)) = (source, target) {
                directives.push(EffectDirective::PathTravel {
                    source: source.clone(),
                    target: target.clone(),
                });
            }
        }

        KillChainPhase::Exploitation => {
            if step_completed(step) {
                if let Some(target) = target {
                    directives.push(EffectDirective::MarkTargeted {
                        target: target.clone(),
                    });
                }
            } else {
                if let (Some(source), Some(target)) = (source, target) {
                    directives.push(EffectDirective::PathTravel {
                        source: source.clone(),
                        target: target.clone(),
                    });
                }
                if let Some(target) = target {
                    directives.push(EffectDirective::Pulse {
                        device: target.clone(),
                    });
                }
            }
        }

        KillChainPhase::Installation => {
            if let Some(target) = target {
                if step_completed(step) {
                    directives.push(EffectDirective::MarkCompromised {
                        target: target.clone(),
                    });
                } else {
                    directives.push(EffectDirective::Thinking {
                        device: target.clone(),
                    });
                }
            }
        }

        KillChainPhase::CommandAndControl => {
            if let (Some(source), Some(target)) = (source, target) {
                directives.push(EffectDirective::StartTraffic {
                    source: source.clone(),
                    target: target.clone(),
                });
            }
        }

        KillChainPhase::ActionsOnObjectives => {
            if let (Some(source), Some(target)) = (source, target) {
                directives.push(EffectDirective::Exfiltrate {
                    source: source.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> DeviceId {
        DeviceId::from("kali")
    }

    fn dst() -> DeviceId {
        DeviceId::from("db-server")
    }

    #[test]
    fn test_port_scan_starts_continuous_scan() {
        let directives = effects_for(
            KillChainPhase::Reconnaissance,
            Some("port_scan"),
            Some(StepStatus::Starting),
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(directives, vec![EffectDirective::StartScan { target: dst() }]);
    }

    #[test]
    fn test_port_scan_completed_stops_scan() {
        let directives = effects_for(
            KillChainPhase::Reconnaissance,
            Some("port_scan"),
            Some(StepStatus::Completed),
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(
            directives,
            vec![
                EffectDirective::StopScan { target: dst() },
                EffectDirective::Pulse { device: dst() },
            ]
        );
    }

    #[test]
    fn test_unknown_recon_technique_defaults_to_scan() {
        let directives = effects_for(
            KillChainPhase::Reconnaissance,
            Some("dns_harvest"),
            None,
            None,
            Some(&dst()),
        );
        assert_eq!(directives, vec![EffectDirective::StartScan { target: dst() }]);
    }

    #[test]
    fn test_missing_target_emits_nothing_for_scan() {
        let directives = effects_for(
            KillChainPhase::Reconnaissance,
            Some("port_scan"),
            None,
            Some(&src()),
            None,
        );
        assert!(directives.is_empty());
    }

    #[test]
    fn test_weaponization_thinks_at_source() {
        let directives = effects_for(
            KillChainPhase::Weaponization,
            Some("phishing_email"),
            Some(StepStatus::InProgress),
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(directives, vec![EffectDirective::Thinking { device: src() }]);
    }

    #[test]
    fn test_delivery_travels_path() {
        let directives = effects_for(
            KillChainPhase::Delivery,
            Some("email_delivery"),
            None,
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(
            directives,
            vec![EffectDirective::PathTravel {
                source: src(),
                target: dst()
            }]
        );
    }

    #[test]
    fn test_exploitation_success_marks_targeted() {
        let directives = effects_for(
            KillChainPhase::Exploitation,
            Some("exploit"),
            Some(StepStatus::Completed),
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(directives, vec![EffectDirective::MarkTargeted { target: dst() }]);
    }

    #[test]
    fn test_exploitation_in_progress_shows_attack() {
        let directives = effects_for(
            KillChainPhase::Exploitation,
            Some("exploit"),
            Some(StepStatus::InProgress),
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(directives.len(), 2);
        assert!(matches!(directives[0], EffectDirective::PathTravel { .. }));
        assert!(matches!(directives[1], EffectDirective::Pulse { .. }));
    }

    #[test]
    fn test_installation_success_marks_compromised() {
        let directives = effects_for(
            KillChainPhase::Installation,
            None,
            Some(StepStatus::Completed),
            None,
            Some(&dst()),
        );
        assert_eq!(
            directives,
            vec![EffectDirective::MarkCompromised { target: dst() }]
        );
    }

    #[test]
    fn test_command_and_control_starts_traffic() {
        let directives = effects_for(
            KillChainPhase::CommandAndControl,
            None,
            None,
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(
            directives,
            vec![EffectDirective::StartTraffic {
                source: src(),
                target: dst()
            }]
        );
    }

    #[test]
    fn test_actions_on_objectives_exfiltrates() {
        let directives = effects_for(
            KillChainPhase::ActionsOnObjectives,
            Some("data_theft"),
            None,
            Some(&src()),
            Some(&dst()),
        );
        assert_eq!(
            directives,
            vec![EffectDirective::Exfiltrate {
                source: src(),
                target: dst()
            }]
        );
    }
}
