use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, optional_currency};
use crate::metrics::mean;
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, ClvTier, ControlKey, CustomerRecord,
    DashboardControls, GoldTable, Insight, InsightKind, MetricCard, RollingMetric, SectionId, SectionView, TableView,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub struct ClvSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierTrendPoint {
    pub order_date: NaiveDate,
    pub tier: ClvTier,
    pub running_clv: f64,
}

/// Mean `current_clv` per tier; tiers without customers are absent.
pub fn tier_averages(customers: &[CustomerRecord]) -> BTreeMap<ClvTier, f64> {
    ClvTier::ALL
        .into_iter()
        .filter_map(|tier| {
            mean(
                customers
                    .iter()
                    .filter(|customer| customer.clv_tier == Some(tier))
                    .map(|customer| customer.current_clv),
            )
            .map(|average| (tier, average))
        })
        .collect()
}

/// Highest `current_clv` first, ties by `user_id`, each user at most once.
pub fn top_customers(customers: &[CustomerRecord], n: usize) -> Vec<&CustomerRecord> {
    let mut ranked = customers.iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        b.current_clv
            .total_cmp(&a.current_clv)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|customer| seen.insert(customer.user_id.as_str()))
        .take(n)
        .collect()
}

/// Sums `running_clv` per (date, tier) after joining snapshots to their
/// customer's tier. Snapshots for unknown or untiered users are dropped.
pub fn clv_trend(rolling: &[RollingMetric], customers: &[CustomerRecord]) -> Vec<TierTrendPoint> {
    let mut tiers: HashMap<&str, ClvTier> = HashMap::new();
    for customer in customers {
        if let Some(tier) = customer.clv_tier {
            tiers.entry(customer.user_id.as_str()).or_insert(tier);
        }
    }

    let mut sums: BTreeMap<(NaiveDate, ClvTier), f64> = BTreeMap::new();
    for metric in rolling {
        if let Some(tier) = tiers.get(metric.user_id.as_str()) {
            *sums.entry((metric.order_date, *tier)).or_insert(0.0) += metric.running_clv;
        }
    }

    sums.into_iter()
        .map(|((order_date, tier), running_clv)| TierTrendPoint {
            order_date,
            tier,
            running_clv,
        })
        .collect()
}

pub fn trend_insight(trend: &[TierTrendPoint]) -> Insight {
    let mut values = Vec::new();
    let mut sentences = Vec::new();
    let mut high_cooled = false;

    for tier in ClvTier::ALL {
        let points = trend.iter().filter(|point| point.tier == tier).collect::<Vec<_>>();
        let (Some(last), Some(peak)) = (
            points.last(),
            points.iter().max_by(|a, b| a.running_clv.total_cmp(&b.running_clv)),
        ) else {
            continue;
        };
        values.push((tier.as_str(), last.running_clv));
        sentences.push(format!(
            "{} segment cumulative CLV peaked at {} on {} and closed at {} on {} across {} active dates.",
            tier.as_str(),
            currency(peak.running_clv, 2),
            peak.order_date,
            currency(last.running_clv, 2),
            last.order_date,
            points.len()
        ));
        if tier == ClvTier::High && last.running_clv < peak.running_clv {
            high_cooled = true;
        }
    }

    let mut text = sentences.join(" ");
    text.push_str(" Missing dates signify inactivity in this transactional view.");
    if high_cooled {
        text.push_str(
            " High-tier activity has cooled since its peak, so retention work should focus on re-engaging top spenders.",
        );
    }

    insight(InsightKind::ClvTrend, &values, text)
}

impl ReportSection for ClvSection {
    fn id(&self) -> SectionId {
        SectionId::Clv
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::CustomerIntelligence, GoldTable::CustomerRollingMetrics]
    }

    fn controls(&self) -> &'static [ControlKey] {
        &[ControlKey::TopN]
    }

    fn render(&self, inputs: &ReportInputs, controls: &DashboardControls) -> AppResult<SectionView> {
        let customers = inputs.customers()?;
        let rolling = inputs.rolling_metrics()?;
        let mut view = SectionView::new(self.id());

        let averages = tier_averages(&customers);
        for tier in ClvTier::ALL {
            view.metrics.push(MetricCard::new(
                format!("{} Tier Avg", tier.as_str()),
                optional_currency(averages.get(&tier).copied(), 2),
            ));
        }

        let top_n = controls.top_n as usize;
        let top = top_customers(&customers, top_n);
        view.charts.push(ChartSpec {
            key: "individual_user_clv_bar".to_string(),
            kind: ChartKind::Bar,
            title: format!("Top {} Customers by Lifetime Value", controls.top_n),
            x_label: "Customer ID".to_string(),
            y_label: "Total Spend ($)".to_string(),
            series: ClvTier::ALL
                .into_iter()
                .filter_map(|tier| {
                    let points = top
                        .iter()
                        .filter(|customer| customer.clv_tier == Some(tier))
                        .map(|customer| ChartPoint {
                            x: AxisValue::Category(customer.user_id.clone()),
                            y: customer.current_clv,
                            size: None,
                        })
                        .collect::<Vec<_>>();
                    (!points.is_empty()).then(|| ChartSeries {
                        name: tier.as_str().to_string(),
                        color: Some(tier.color().to_string()),
                        points,
                    })
                })
                .collect(),
        });
        view.tables.push(TableView {
            title: format!("Top {} Customers", controls.top_n),
            columns: vec!["Rank".into(), "Customer ID".into(), "Lifetime Value".into(), "Tier".into()],
            rows: top
                .iter()
                .enumerate()
                .map(|(index, customer)| {
                    vec![
                        (index + 1).to_string(),
                        customer.user_id.clone(),
                        currency(customer.current_clv, 2),
                        customer.clv_tier.map(|tier| tier.as_str()).unwrap_or("-").to_string(),
                    ]
                })
                .collect(),
            empty_message: "No customers loaded.".to_string(),
        });

        let trend = clv_trend(&rolling, &customers);
        for tier in ClvTier::ALL {
            view.charts.push(ChartSpec {
                key: format!("trend_{}", tier.as_str().to_ascii_lowercase()),
                kind: ChartKind::Line,
                title: format!("{} Segment Growth", tier.as_str()),
                x_label: "Date".to_string(),
                y_label: "Cumulative CLV ($)".to_string(),
                series: vec![ChartSeries {
                    name: tier.as_str().to_string(),
                    color: Some(tier.color().to_string()),
                    points: trend
                        .iter()
                        .filter(|point| point.tier == tier)
                        .map(|point| ChartPoint {
                            x: AxisValue::Date(point.order_date),
                            y: point.running_clv,
                            size: None,
                        })
                        .collect(),
                }],
            });
        }

        if trend.is_empty() {
            view.insights.push(empty_state("No rolling CLV history matched a tiered customer."));
        } else {
            view.insights.push(trend_insight(&trend));
        }

        Ok(view)
    }
}
