use std::collections::{HashMap, HashSet};

use crate::domain::ids::{InvestorId, ListingId};
use crate::domain::investor::{DealRoom, Holding, Memo, ShortlistItem};
use crate::domain::listing::Listing;
use crate::domain::mandate::Mandate;
use crate::domain::market::RelevantSignal;
use crate::domain::opportunity::{
    Lifecycle, Opportunity, OpportunityCounts, OpportunityOptions, OpportunityScores,
    OpportunitySources, ShortlistState, SignalSource,
};
use crate::scoring::matcher::MandateMatcher;

const MANDATE_WEIGHT: f64 = 0.5;
const SIGNAL_WEIGHT: f64 = 0.3;
const SHORTLIST_WEIGHT: f64 = 0.2;

/// `round(0.5 * mandate + 0.3 * min(signal, 100) + 0.2 * shortlist)`.
pub fn combined_score(mandate_match: f64, signal_relevance: f64, shortlist_match: f64) -> f64 {
    (MANDATE_WEIGHT * mandate_match
        + SIGNAL_WEIGHT * signal_relevance.min(100.0)
        + SHORTLIST_WEIGHT * shortlist_match)
        .round()
}

/// Everything known about one investor at request time.
#[derive(Clone, Copy, Debug)]
pub struct OpportunityContext<'a> {
    pub investor_id: &'a InvestorId,
    pub mandate: Option<&'a Mandate>,
    pub listings: &'a [Listing],
    pub holdings: &'a [Holding],
    pub shortlist: &'a [ShortlistItem],
    pub memos: &'a [Memo],
    pub deal_rooms: &'a [DealRoom],
    pub signals: &'a [RelevantSignal],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoredOpportunities {
    pub items: Vec<Opportunity>,
    pub counts: OpportunityCounts,
}

#[derive(Default)]
struct ListingState {
    shortlist: Option<ShortlistState>,
    has_memo: bool,
    is_memo_approved: bool,
    is_in_deal: bool,
}

#[derive(Clone, Debug, Default)]
pub struct OpportunityScorer {
    matcher: MandateMatcher,
}

impl OpportunityScorer {
    pub fn new(matcher: MandateMatcher) -> Self {
        Self { matcher }
    }

    pub fn score(
        &self,
        context: &OpportunityContext<'_>,
        options: &OpportunityOptions,
    ) -> ScoredOpportunities {
        let owned: HashSet<&ListingId> =
            context.holdings.iter().map(|holding| &holding.property_id).collect();
        let states = listing_states(context);

        let mut items = Vec::new();
        let mut counts = OpportunityCounts::default();

        for listing in context.listings {
            let is_owned = owned.contains(&listing.id);
            if is_owned && !options.include_owned {
                continue;
            }
            let state = states.get(&listing.id);
            let is_shortlisted = state.is_some_and(|state| state.shortlist.is_some());
            let is_in_deal = state.is_some_and(|state| state.is_in_deal);
            let has_memo = state.is_some_and(|state| state.has_memo);
            let is_memo_approved = state.is_some_and(|state| state.is_memo_approved);

            // Sold or withdrawn stock only stays visible through an existing tie.
            let has_tie = is_owned || is_shortlisted || is_in_deal || has_memo;
            if !listing.is_available() && !has_tie {
                continue;
            }

            let mandate = self.matcher.score(listing, context.mandate);
            let signals = self.attached_signals(listing, context.signals);
            let signal_relevance =
                signals.iter().map(|signal| signal.relevance_score).fold(0.0_f64, f64::max);

            let shortlist = state
                .and_then(|state| state.shortlist.clone())
                .unwrap_or(ShortlistState { in_shortlist: false, match_score: None, rank: None });
            let shortlist_match = shortlist.match_score.unwrap_or(0.0).clamp(0.0, 100.0);

            let included = mandate.score > 0.0 || has_tie || !signals.is_empty();
            if !included {
                continue;
            }

            let lifecycle =
                Lifecycle::resolve(is_owned, is_in_deal, has_memo, is_memo_approved, is_shortlisted);
            counts.record(lifecycle.stage);

            items.push(Opportunity {
                listing_id: listing.id.clone(),
                investor_id: context.investor_id.clone(),
                title: listing.title.clone(),
                area: listing.area.clone(),
                scores: OpportunityScores {
                    combined: combined_score(mandate.score, signal_relevance, shortlist_match),
                    mandate_match: mandate.score,
                    signal_relevance,
                    shortlist_match,
                },
                sources: OpportunitySources {
                    mandate_reasons: mandate.reasons,
                    shortlist,
                    signals,
                },
                lifecycle,
            });
        }

        items.sort_by(|left, right| {
            right
                .scores
                .combined
                .total_cmp(&left.scores.combined)
                .then_with(|| left.listing_id.cmp(&right.listing_id))
        });
        items.truncate(options.effective_limit());
        counts.returned = items.len();

        ScoredOpportunities { items, counts }
    }

    /// Signals that reference the listing directly, then signals whose geo
    /// matches the listing's area. A signal is attached once.
    fn attached_signals(&self, listing: &Listing, signals: &[RelevantSignal]) -> Vec<SignalSource> {
        let mut attached: Vec<SignalSource> = signals
            .iter()
            .filter(|signal| signal.listing_ids.contains(&listing.id))
            .map(|signal| signal_source(signal, true))
            .collect();

        for signal in signals {
            if attached.iter().any(|source| source.signal_id == signal.signal_id) {
                continue;
            }
            if self.matcher.normalizer().matches(&listing.area, &signal.geo_name) {
                attached.push(signal_source(signal, false));
            }
        }

        attached
    }
}

fn signal_source(signal: &RelevantSignal, direct: bool) -> SignalSource {
    SignalSource {
        signal_id: signal.signal_id.clone(),
        signal_type: signal.signal_type,
        severity: signal.severity,
        relevance_score: signal.relevance_score,
        direct,
    }
}

fn listing_states<'a>(context: &OpportunityContext<'a>) -> HashMap<&'a ListingId, ListingState> {
    let mut states: HashMap<&'a ListingId, ListingState> = HashMap::new();

    for item in context.shortlist.iter().filter(|item| &item.investor_id == context.investor_id) {
        let state = states.entry(&item.listing_id).or_default();
        let shortlist = state.shortlist.get_or_insert(ShortlistState {
            in_shortlist: true,
            match_score: None,
            rank: None,
        });
        shortlist.match_score = match (shortlist.match_score, item.match_score) {
            (Some(current), Some(candidate)) => Some(current.max(candidate)),
            (current, candidate) => current.or(candidate),
        };
        shortlist.rank = match (shortlist.rank, item.rank) {
            (Some(current), Some(candidate)) => Some(current.min(candidate)),
            (current, candidate) => current.or(candidate),
        };
    }

    for memo in context.memos.iter().filter(|memo| &memo.investor_id == context.investor_id) {
        let state = states.entry(&memo.listing_id).or_default();
        state.has_memo = true;
        state.is_memo_approved |= memo.is_approved();
    }

    for room in context
        .deal_rooms
        .iter()
        .filter(|room| &room.investor_id == context.investor_id && room.is_active())
    {
        states.entry(&room.property_id).or_default().is_in_deal = true;
    }

    states
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{combined_score, OpportunityContext, OpportunityScorer};
    use crate::domain::ids::{HoldingId, InvestorId, ListingId, SignalId};
    use crate::domain::investor::{DealRoom, Holding, Memo, ShortlistItem};
    use crate::domain::listing::{Listing, ListingSource, ReadinessStatus};
    use crate::domain::mandate::Mandate;
    use crate::domain::market::{RelevantSignal, Severity, SignalType};
    use crate::domain::opportunity::{LifecycleStage, OpportunityOptions};

    fn investor() -> InvestorId {
        InvestorId::new("inv-1")
    }

    fn mandate() -> Mandate {
        Mandate {
            property_types: vec!["apartment".to_string()],
            preferred_areas: vec!["Marina".to_string()],
            min_investment: Some(Decimal::new(1_000_000, 0)),
            max_investment: Some(Decimal::new(5_000_000, 0)),
            ..Mandate::default()
        }
    }

    fn listing(id: &str, area: &str, property_type: &str, price: i64) -> Listing {
        Listing {
            id: ListingId::new(id),
            title: format!("{property_type} in {area}"),
            area: area.to_string(),
            property_type: property_type.to_string(),
            price: Decimal::new(price, 0),
            size: None,
            bedrooms: None,
            status: "available".to_string(),
            trust_score: Some(70.0),
            roi: Some(6.0),
            readiness_status: ReadinessStatus::Ready,
            source: ListingSource::Internal,
        }
    }

    fn holding(property_id: &str) -> Holding {
        Holding {
            id: HoldingId::new(format!("h-{property_id}")),
            investor_id: investor(),
            property_id: ListingId::new(property_id),
            area: Some("Dubai Marina".to_string()),
            purchase_price: Decimal::new(2_000_000, 0),
            purchase_date: NaiveDate::from_ymd_opt(2023, 5, 1).expect("valid date"),
            current_value: Decimal::new(2_300_000, 0),
            monthly_rent: Decimal::new(11_000, 0),
            occupancy_rate: 1.0,
            annual_expenses: Decimal::new(20_000, 0),
        }
    }

    fn signal(id: &str, geo_name: &str, relevance: f64, listing_ids: &[&str]) -> RelevantSignal {
        RelevantSignal {
            signal_id: SignalId::new(id),
            signal_type: SignalType::PriceChange,
            severity: Severity::Watch,
            geo_name: geo_name.to_string(),
            relevance_score: relevance,
            listing_ids: listing_ids.iter().map(|id| ListingId::new(*id)).collect(),
        }
    }

    struct Fixture {
        investor_id: InvestorId,
        mandate: Mandate,
        listings: Vec<Listing>,
        holdings: Vec<Holding>,
        shortlist: Vec<ShortlistItem>,
        memos: Vec<Memo>,
        deal_rooms: Vec<DealRoom>,
        signals: Vec<RelevantSignal>,
    }

    impl Fixture {
        fn context(&self) -> OpportunityContext<'_> {
            OpportunityContext {
                investor_id: &self.investor_id,
                mandate: Some(&self.mandate),
                listings: &self.listings,
                holdings: &self.holdings,
                shortlist: &self.shortlist,
                memos: &self.memos,
                deal_rooms: &self.deal_rooms,
                signals: &self.signals,
            }
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            investor_id: investor(),
            mandate: mandate(),
            listings: vec![
                listing("lst-a", "Dubai Marina", "apartment", 3_000_000),
                listing("lst-b", "Business Bay", "office", 900_000),
                listing("lst-c", "Business Bay", "villa", 20_000_000),
                listing("lst-d", "Dubai Marina", "apartment", 2_000_000),
                listing("lst-e", "Jumeirah Golf Estates", "villa", 9_000_000),
                listing("lst-f", "Al Barsha", "townhouse", 12_000_000),
            ],
            holdings: vec![holding("lst-d")],
            shortlist: vec![ShortlistItem {
                shortlist_id: "sl-1".to_string(),
                investor_id: investor(),
                listing_id: ListingId::new("lst-b"),
                match_score: Some(90.0),
                rank: Some(1),
            }],
            memos: vec![Memo {
                id: "memo-1".to_string(),
                listing_id: ListingId::new("lst-e"),
                investor_id: investor(),
                state: "approved".to_string(),
            }],
            deal_rooms: vec![DealRoom {
                id: "deal-1".to_string(),
                property_id: ListingId::new("lst-f"),
                investor_id: investor(),
                status: "negotiating".to_string(),
            }],
            signals: vec![
                signal("sig-area", "Marina", 70.0, &[]),
                signal("sig-direct", "Downtown", 120.0, &["lst-b"]),
            ],
        }
    }

    #[test]
    fn combined_formula_caps_signal_relevance() {
        assert_eq!(combined_score(80.0, 70.0, 0.0), 61.0);
        assert_eq!(combined_score(0.0, 150.0, 90.0), 48.0);
        assert_eq!(combined_score(55.0, 0.0, 0.0), 28.0);
    }

    #[test]
    fn ranks_stages_and_excludes_unrelated_listings() {
        let fixture = fixture();
        let result = OpportunityScorer::default().score(&fixture.context(), &OpportunityOptions::default());

        let ids: Vec<&str> = result.items.iter().map(|item| item.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["lst-a", "lst-b", "lst-e", "lst-f"]);

        let a = &result.items[0];
        assert_eq!(a.scores.mandate_match, 80.0);
        assert_eq!(a.scores.signal_relevance, 70.0);
        assert_eq!(a.scores.combined, 61.0);
        assert_eq!(a.lifecycle.stage, LifecycleStage::Recommended);

        let b = &result.items[1];
        assert_eq!(b.scores.signal_relevance, 120.0);
        assert_eq!(b.scores.shortlist_match, 90.0);
        assert_eq!(b.scores.combined, 53.0);
        assert!(b.sources.signals.iter().any(|signal| signal.direct));
        assert_eq!(b.lifecycle.stage, LifecycleStage::Shortlisted);

        let e = &result.items[2];
        assert_eq!(e.lifecycle.stage, LifecycleStage::Memo);
        assert!(e.lifecycle.is_memo_approved);
        assert_eq!(result.items[3].lifecycle.stage, LifecycleStage::Deal);

        assert_eq!(result.counts.total, 4);
        assert_eq!(result.counts.holding, 0);
    }

    #[test]
    fn combined_matches_formula_for_every_item() {
        let fixture = fixture();
        let options = OpportunityOptions { include_owned: true, limit: None };
        let result = OpportunityScorer::default().score(&fixture.context(), &options);

        for item in &result.items {
            let scores = item.scores;
            let expected = (0.5 * scores.mandate_match
                + 0.3 * scores.signal_relevance.min(100.0)
                + 0.2 * scores.shortlist_match)
                .round();
            assert_eq!(scores.combined, expected);
        }
    }

    #[test]
    fn include_owned_surfaces_holdings() {
        let fixture = fixture();
        let options = OpportunityOptions { include_owned: true, limit: None };
        let result = OpportunityScorer::default().score(&fixture.context(), &options);

        let owned = result
            .items
            .iter()
            .find(|item| item.listing_id.as_str() == "lst-d")
            .expect("owned listing is included");
        assert_eq!(owned.lifecycle.stage, LifecycleStage::Holding);
        assert!(owned.lifecycle.is_owned);
        assert_eq!(result.counts.holding, 1);
    }

    #[test]
    fn limit_truncates_after_sorting_but_counts_full_set() {
        let fixture = fixture();
        let options = OpportunityOptions { include_owned: false, limit: Some(1) };
        let result = OpportunityScorer::default().score(&fixture.context(), &options);

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].listing_id.as_str(), "lst-a");
        assert_eq!(result.counts.total, 4);
        assert_eq!(result.counts.returned, 1);
    }

    #[test]
    fn missing_mandate_keeps_only_tied_or_signalled_listings() {
        let mut fixture = fixture();
        fixture.signals.clear();
        let context = OpportunityContext { mandate: None, ..fixture.context() };
        let result = OpportunityScorer::default().score(&context, &OpportunityOptions::default());

        let ids: Vec<&str> = result.items.iter().map(|item| item.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["lst-b", "lst-e", "lst-f"]);
    }
}
