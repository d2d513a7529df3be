use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, optional_percent, thousands};
use crate::metrics::{mean, percent_share};
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, CustomerRecord, DashboardControls, GoldTable, Insight,
    InsightKind, MetricCard, Segment, SectionId, SectionView, TableView,
};
use serde::{Deserialize, Serialize};

pub struct SegmentationSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentProfile {
    pub segment: Segment,
    pub customers: usize,
    pub share_pct: Option<f64>,
    pub avg_clv: Option<f64>,
    pub avg_recency: Option<f64>,
    pub avg_frequency: Option<f64>,
    pub avg_monetary: Option<f64>,
}

/// One profile per known segment, in display order, including empty ones.
pub fn segment_profiles(customers: &[CustomerRecord]) -> Vec<SegmentProfile> {
    let total = customers.len() as f64;
    Segment::ALL
        .into_iter()
        .map(|segment| {
            let members = customers
                .iter()
                .filter(|customer| customer.segment == Some(segment))
                .collect::<Vec<_>>();
            SegmentProfile {
                segment,
                customers: members.len(),
                share_pct: percent_share(members.len() as f64, total),
                avg_clv: mean(members.iter().map(|c| c.current_clv)),
                avg_recency: mean(members.iter().map(|c| c.recency)),
                avg_frequency: mean(members.iter().map(|c| c.frequency)),
                avg_monetary: mean(members.iter().map(|c| c.monetary_value)),
            }
        })
        .collect()
}

pub fn churn_risk_insight(profiles: &[SegmentProfile], total_customers: usize) -> Insight {
    let churn = profiles
        .iter()
        .find(|profile| profile.segment == Segment::ChurnRisk);
    let Some(share) = churn.and_then(|profile| profile.share_pct) else {
        return empty_state("No customers loaded, so churn risk cannot be estimated.");
    };
    let count = churn.map(|profile| profile.customers).unwrap_or(0);

    insight(
        InsightKind::ChurnRiskShare,
        &[
            ("churnRiskPct", share),
            ("churnRiskCustomers", count as f64),
            ("totalCustomers", total_customers as f64),
        ],
        format!(
            "{:.1}% of your base is currently at risk. A re-engagement email targeting the 'Churn Risk' segment could reactivate these customers.",
            share
        ),
    )
}

impl ReportSection for SegmentationSection {
    fn id(&self) -> SectionId {
        SectionId::Segmentation
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::CustomerIntelligence]
    }

    fn render(&self, inputs: &ReportInputs, _controls: &DashboardControls) -> AppResult<SectionView> {
        let customers = inputs.customers()?;
        let profiles = segment_profiles(&customers);
        let mut view = SectionView::new(self.id());

        for profile in &profiles {
            let label = match profile.segment {
                Segment::Vip => "Total VIPs".to_string(),
                Segment::NewCustomer => "New Customers".to_string(),
                other => other.as_str().to_string(),
            };
            view.metrics.push(
                MetricCard::new(label, profile.customers.to_string()).with_help(profile.segment.description()),
            );
        }

        view.charts.push(ChartSpec {
            key: "segment_pie_chart".to_string(),
            kind: ChartKind::Pie,
            title: "Customer Segment Distribution".to_string(),
            x_label: "Segment".to_string(),
            y_label: "Customers".to_string(),
            series: vec![ChartSeries {
                name: "segment".to_string(),
                color: None,
                points: profiles
                    .iter()
                    .filter(|profile| profile.customers > 0)
                    .map(|profile| ChartPoint {
                        x: AxisValue::Category(profile.segment.as_str().to_string()),
                        y: profile.customers as f64,
                        size: None,
                    })
                    .collect(),
            }],
        });

        view.tables.push(TableView {
            title: "Segment Profiles".to_string(),
            columns: ["Segment", "Customers", "Share", "Avg CLV", "Avg Recency", "Avg Frequency", "Avg Monetary"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            rows: profiles
                .iter()
                .map(|profile| {
                    let number = |value: Option<f64>| value.map(|v| thousands(v, 1)).unwrap_or_else(|| "n/a".into());
                    vec![
                        profile.segment.as_str().to_string(),
                        profile.customers.to_string(),
                        optional_percent(profile.share_pct, 1),
                        profile.avg_clv.map(|v| currency(v, 2)).unwrap_or_else(|| "n/a".into()),
                        number(profile.avg_recency),
                        number(profile.avg_frequency),
                        profile.avg_monetary.map(|v| currency(v, 2)).unwrap_or_else(|| "n/a".into()),
                    ]
                })
                .collect(),
            empty_message: "No customers loaded.".to_string(),
        });

        view.insights.push(churn_risk_insight(&profiles, customers.len()));
        Ok(view)
    }
}
