use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, thousands};
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, ClvTier, CustomerRecord, DashboardControls, GoldTable,
    Insight, InsightKind, MetricCard, Segment, SectionId, SectionView, TableView,
};
use serde::{Deserialize, Serialize};

pub const FREQUENCY_BINS: usize = 20;

pub struct ChurnSection;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySplit {
    pub active: usize,
    pub inactive: usize,
}

impl ActivitySplit {
    pub fn total(&self) -> usize {
        self.active + self.inactive
    }
}

pub fn high_tier(customers: &[CustomerRecord]) -> Vec<&CustomerRecord> {
    customers
        .iter()
        .filter(|customer| customer.clv_tier == Some(ClvTier::High))
        .collect()
}

/// Every customer lands on one side: no positive order count in the trailing
/// window means inactive.
pub fn activity_split(customers: &[&CustomerRecord]) -> ActivitySplit {
    customers.iter().fold(ActivitySplit::default(), |mut split, customer| {
        if customer.frequency > 0.0 {
            split.active += 1;
        } else {
            split.inactive += 1;
        }
        split
    })
}

/// Equal-width bins spanning `[min, max]`; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);
    if bins == 0 {
        return Vec::new();
    }
    if max == min {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result = (0..bins)
        .map(|index| HistogramBin {
            start: min + width * index as f64,
            end: if index + 1 == bins { max } else { min + width * (index + 1) as f64 },
            count: 0,
        })
        .collect::<Vec<_>>();
    for value in values {
        let index = (((value - min) / width).floor() as usize).min(bins - 1);
        result[index].count += 1;
    }
    result
}

/// High-tier customers currently flagged as churn risk, stalest first.
pub fn churn_gap(customers: &[CustomerRecord]) -> Vec<&CustomerRecord> {
    let mut gap = customers
        .iter()
        .filter(|customer| customer.clv_tier == Some(ClvTier::High) && customer.segment == Some(Segment::ChurnRisk))
        .collect::<Vec<_>>();
    gap.sort_by(|a, b| b.recency.total_cmp(&a.recency).then_with(|| a.user_id.cmp(&b.user_id)));
    gap
}

pub fn inactivity_insight(split: ActivitySplit) -> Insight {
    if split.total() == 0 {
        return empty_state("No High-tier CLV customers are present in the current snapshot.");
    }
    insight(
        InsightKind::HighTierInactivity,
        &[("inactive", split.inactive as f64), ("active", split.active as f64)],
        format!(
            "There are {} High-Tier CLV customers who did not make any orders in the last 6 months. These customers are historically high spenders and are the primary targets for win-back campaigns to prevent permanent churn.",
            split.inactive
        ),
    )
}

impl ReportSection for ChurnSection {
    fn id(&self) -> SectionId {
        SectionId::Churn
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::CustomerIntelligence]
    }

    fn render(&self, inputs: &ReportInputs, _controls: &DashboardControls) -> AppResult<SectionView> {
        let customers = inputs.customers()?;
        let high = high_tier(&customers);
        let split = activity_split(&high);
        let mut view = SectionView::new(self.id());

        view.metrics.push(MetricCard::new("High-Tier Customers", high.len().to_string()));
        view.metrics.push(MetricCard::new("Active (Last 6m)", split.active.to_string()));
        view.metrics.push(MetricCard::new("Inactive (Last 6m)", split.inactive.to_string()));

        let frequencies = high.iter().map(|customer| customer.frequency).collect::<Vec<_>>();
        view.charts.push(ChartSpec {
            key: "high_tier_frequency_histogram".to_string(),
            kind: ChartKind::Histogram,
            title: "Purchase Frequency Distribution (Last 6 Months)".to_string(),
            x_label: "Number of Purchases".to_string(),
            y_label: "Customer Count".to_string(),
            series: vec![ChartSeries {
                name: "High".to_string(),
                color: Some(ClvTier::High.color().to_string()),
                points: histogram(&frequencies, FREQUENCY_BINS)
                    .into_iter()
                    .map(|bin| ChartPoint {
                        x: AxisValue::Number(bin.start),
                        y: bin.count as f64,
                        size: None,
                    })
                    .collect(),
            }],
        });
        view.charts.push(ChartSpec {
            key: "high_tier_activity_pie".to_string(),
            kind: ChartKind::Pie,
            title: "Current Activity Status".to_string(),
            x_label: "Status".to_string(),
            y_label: "Count".to_string(),
            series: vec![ChartSeries {
                name: "Status".to_string(),
                color: None,
                points: vec![
                    ChartPoint {
                        x: AxisValue::Category("Active (Last 6m)".to_string()),
                        y: split.active as f64,
                        size: None,
                    },
                    ChartPoint {
                        x: AxisValue::Category("Inactive (Last 6m)".to_string()),
                        y: split.inactive as f64,
                        size: None,
                    },
                ],
            }],
        });
        view.insights.push(inactivity_insight(split));

        view.tables.push(TableView {
            title: "High CLV Tier customers currently marked as Churn Risk".to_string(),
            columns: ["Customer ID", "Lifetime Value", "Recency", "Frequency"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            rows: churn_gap(&customers)
                .into_iter()
                .map(|customer| {
                    vec![
                        customer.user_id.clone(),
                        currency(customer.current_clv, 2),
                        thousands(customer.recency, 0),
                        thousands(customer.frequency, 0),
                    ]
                })
                .collect(),
            empty_message: "No High-tier customers are currently flagged as Churn Risk.".to_string(),
        });

        Ok(view)
    }
}
