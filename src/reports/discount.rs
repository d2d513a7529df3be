use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, optional_percent};
use crate::metrics::{percent_lift, percent_share};
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, DashboardControls, DiscountRecord, DiscountStatus,
    GoldTable, Insight, InsightKind, MetricCard, SectionId, SectionView,
};
use serde::{Deserialize, Serialize};

pub struct DiscountSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountComparison {
    pub discounted: DiscountRecord,
    pub full_price: DiscountRecord,
    pub aov_lift: Option<f64>,
    pub order_share: Option<f64>,
    pub revenue_share: Option<f64>,
}

pub fn status_color(status: DiscountStatus) -> &'static str {
    match status {
        DiscountStatus::Discounted => "#AB63FA",
        DiscountStatus::FullPrice => "#636EFA",
    }
}

pub fn compare(records: &[DiscountRecord]) -> Option<DiscountComparison> {
    let discounted = records.iter().find(|record| record.status == DiscountStatus::Discounted)?;
    let full_price = records.iter().find(|record| record.status == DiscountStatus::FullPrice)?;
    let total_orders: f64 = records.iter().map(|record| record.order_count).sum();
    let total_revenue: f64 = records.iter().map(|record| record.total_revenue).sum();

    Some(DiscountComparison {
        discounted: discounted.clone(),
        full_price: full_price.clone(),
        aov_lift: percent_lift(discounted.avg_order_value, full_price.avg_order_value),
        order_share: percent_share(discounted.order_count, total_orders),
        revenue_share: percent_share(discounted.total_revenue, total_revenue),
    })
}

pub fn lift_insight(comparison: &DiscountComparison) -> Insight {
    let aov = comparison.discounted.avg_order_value;
    let mut text = format!(
        "While discounted orders represent only {} of total volume, they have an Average Order Value of {}.",
        optional_percent(comparison.order_share, 1),
        currency(aov, 2)
    );
    match comparison.aov_lift {
        Some(lift) if lift > 0.0 => text.push_str(&format!(
            " This is {:.1}% higher than full-price orders, so discounts are driving upselling as customers add items to reach discount thresholds.",
            lift.abs()
        )),
        Some(lift) => text.push_str(&format!(
            " This is {:.1}% lower than full-price orders, so discounts are not lifting basket size.",
            lift.abs()
        )),
        None => text.push_str(" Full-price orders have no average order value to compare against."),
    }

    let mut values = vec![("discountedAov", aov)];
    for (key, value) in [
        ("aovLiftPct", comparison.aov_lift),
        ("orderSharePct", comparison.order_share),
        ("revenueSharePct", comparison.revenue_share),
    ] {
        if let Some(value) = value {
            values.push((key, value));
        }
    }
    insight(InsightKind::DiscountLift, &values, text)
}

impl ReportSection for DiscountSection {
    fn id(&self) -> SectionId {
        SectionId::DiscountEffectiveness
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::DiscountEffectiveness]
    }

    fn render(&self, inputs: &ReportInputs, _controls: &DashboardControls) -> AppResult<SectionView> {
        let records = inputs.discounts()?;
        let mut view = SectionView::new(self.id());
        let Some(comparison) = compare(&records) else {
            view.insights.push(empty_state(
                "Discount comparison needs both a Discounted and a Full Price row.",
            ));
            return Ok(view);
        };
        let rows = [&comparison.discounted, &comparison.full_price];

        view.charts.push(ChartSpec {
            key: "discount_aov_bar".to_string(),
            kind: ChartKind::Bar,
            title: "Average Order Value ($)".to_string(),
            x_label: "Status".to_string(),
            y_label: "AOV".to_string(),
            series: rows
                .iter()
                .map(|record| ChartSeries {
                    name: record.status.as_str().to_string(),
                    color: Some(status_color(record.status).to_string()),
                    points: vec![ChartPoint {
                        x: AxisValue::Category(record.status.as_str().to_string()),
                        y: record.avg_order_value,
                        size: None,
                    }],
                })
                .collect(),
        });
        view.charts.push(ChartSpec {
            key: "discount_revenue_pie".to_string(),
            kind: ChartKind::Pie,
            title: "Share of Total Revenue".to_string(),
            x_label: "Status".to_string(),
            y_label: "Total Revenue ($)".to_string(),
            series: vec![ChartSeries {
                name: "Status".to_string(),
                color: None,
                points: rows
                    .iter()
                    .map(|record| ChartPoint {
                        x: AxisValue::Category(record.status.as_str().to_string()),
                        y: record.total_revenue,
                        size: None,
                    })
                    .collect(),
            }],
        });

        view.metrics.push(
            MetricCard::new("AOV Lift from Discounts", optional_percent(comparison.aov_lift, 1))
                .with_help("Difference in spend per transaction between discounted and full-price orders."),
        );
        view.metrics.push(
            MetricCard::new("Order Share", optional_percent(comparison.order_share, 1))
                .with_help("Percentage of total orders that used a discount."),
        );
        view.metrics.push(
            MetricCard::new("Revenue Contribution", optional_percent(comparison.revenue_share, 1))
                .with_help("Percentage of total revenue driven by discounted orders."),
        );
        view.insights.push(lift_insight(&comparison));

        Ok(view)
    }
}
