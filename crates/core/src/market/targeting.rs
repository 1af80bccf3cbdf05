use crate::domain::ids::TenantId;
use crate::domain::investor::Investor;
use crate::domain::mandate::Mandate;
use crate::domain::market::{MarketSignal, Severity, SignalTarget, TargetReason, TargetStatus};
use crate::geo::GeoNormalizer;

const SEGMENT_MATCH_BONUS: f64 = 10.0;
const CONFIDENCE_WEIGHT: f64 = 20.0;

/// Maps signals onto investor mandates. A signal is only routed to investors
/// whose preferred areas cover the signal's geo.
#[derive(Clone, Debug, Default)]
pub struct SignalRouter {
    normalizer: GeoNormalizer,
}

impl SignalRouter {
    pub fn new(normalizer: GeoNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn relevance(&self, signal: &MarketSignal, mandate: &Mandate) -> Option<(f64, TargetReason)> {
        let matched_area = self
            .normalizer
            .first_match(&signal.geo_name, &mandate.preferred_areas)
            .or_else(|| self.normalizer.first_match(&signal.geo_id, &mandate.preferred_areas))?;
        let matched_type = self.normalizer.first_match(&signal.segment, &mandate.property_types);

        let mut score = severity_base(signal.severity)
            + signal.confidence_score.clamp(0.0, 1.0) * CONFIDENCE_WEIGHT;
        if matched_type.is_some() {
            score += SEGMENT_MATCH_BONUS;
        }

        Some((
            score.min(100.0).round(),
            TargetReason {
                matched_area: Some(matched_area.to_string()),
                matched_type: matched_type.map(ToString::to_string),
                severity: Some(signal.severity),
                confidence_score: Some(signal.confidence_score),
            },
        ))
    }

    pub fn route(
        &self,
        tenant_id: &TenantId,
        signals: &[MarketSignal],
        investors: &[Investor],
    ) -> Vec<SignalTarget> {
        let mut targets = Vec::new();
        for investor in investors {
            let Some(mandate) = investor.mandate.as_ref() else {
                continue;
            };
            for signal in signals {
                if let Some((relevance_score, reason)) = self.relevance(signal, mandate) {
                    targets.push(SignalTarget {
                        tenant_id: tenant_id.clone(),
                        signal_id: signal.id.clone(),
                        investor_id: investor.id.clone(),
                        relevance_score,
                        status: TargetStatus::New,
                        reason,
                    });
                }
            }
        }
        targets
    }
}

fn severity_base(severity: Severity) -> f64 {
    match severity {
        Severity::Info => 40.0,
        Severity::Watch => 60.0,
        Severity::Urgent => 80.0,
    }
}
