use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, optional_percent, thousands};
use crate::metrics::{percent_lift, percent_share, ratio};
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, DashboardControls, GoldTable, Insight, InsightKind,
    LoyaltyRecord, LoyaltyStatus, MetricCard, SectionId, SectionView,
};
use serde::{Deserialize, Serialize};

pub struct LoyaltySection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyComparison {
    pub member: LoyaltyRecord,
    pub non_member: LoyaltyRecord,
    pub aov_lift: Option<f64>,
    pub repeat_lift: Option<f64>,
    pub member_revenue_share: Option<f64>,
    pub member_ltv_per_customer: Option<f64>,
    pub non_member_ltv_per_customer: Option<f64>,
}

pub fn status_color(status: LoyaltyStatus) -> &'static str {
    match status {
        LoyaltyStatus::Member => "#00CC96",
        LoyaltyStatus::NonMember => "#636EFA",
    }
}

/// `None` unless both a member and a non-member row are present.
pub fn compare(records: &[LoyaltyRecord]) -> Option<LoyaltyComparison> {
    let member = records.iter().find(|record| record.status == LoyaltyStatus::Member)?;
    let non_member = records.iter().find(|record| record.status == LoyaltyStatus::NonMember)?;
    let total_lifetime_value: f64 = records.iter().map(|record| record.total_lifetime_value).sum();

    Some(LoyaltyComparison {
        member: member.clone(),
        non_member: non_member.clone(),
        aov_lift: percent_lift(member.avg_order_value, non_member.avg_order_value),
        repeat_lift: percent_lift(member.repeat_order_rate, non_member.repeat_order_rate),
        member_revenue_share: percent_share(member.total_lifetime_value, total_lifetime_value),
        member_ltv_per_customer: ratio(member.total_lifetime_value, member.total_customers),
        non_member_ltv_per_customer: ratio(non_member.total_lifetime_value, non_member.total_customers),
    })
}

pub fn aov_insight(comparison: &LoyaltyComparison) -> Insight {
    let member_aov = comparison.member.avg_order_value;
    let non_member_aov = comparison.non_member.avg_order_value;
    let repeat = optional_percent(comparison.repeat_lift, 1);

    let text = if member_aov < non_member_aov {
        format!(
            "Non-members have a higher AOV ({}), likely driven by large one-off catering or group orders. Loyalty Members spend less per visit ({}) but have a {} higher repeat rate, which suggests the program builds habitual behavior rather than high-ticket transactions.",
            currency(non_member_aov, 2),
            currency(member_aov, 2),
            repeat
        )
    } else {
        format!(
            "Loyalty Members spend at least as much per visit ({}) as non-members ({}) and their repeat rate differs by {}, so the program lifts both basket size and visit frequency.",
            currency(member_aov, 2),
            currency(non_member_aov, 2),
            repeat
        )
    };

    let mut values = vec![("memberAov", member_aov), ("nonMemberAov", non_member_aov)];
    if let Some(lift) = comparison.aov_lift {
        values.push(("aovLiftPct", lift));
    }
    if let Some(lift) = comparison.repeat_lift {
        values.push(("repeatLiftPct", lift));
    }
    insight(InsightKind::LoyaltyAov, &values, text)
}

pub fn ltv_insight(comparison: &LoyaltyComparison) -> Insight {
    let per_customer = |value: Option<f64>| value.map(|v| thousands(v, 2)).unwrap_or_else(|| "n/a".to_string());
    let dominant = if comparison.member.total_lifetime_value >= comparison.non_member.total_lifetime_value {
        LoyaltyStatus::Member
    } else {
        LoyaltyStatus::NonMember
    };

    let mut text = format!(
        "{}s currently dominate the total revenue share; an individual Non-Member is worth {} compared to {} for a Loyalty Member.",
        dominant.as_str(),
        per_customer(comparison.non_member_ltv_per_customer),
        per_customer(comparison.member_ltv_per_customer)
    );
    if dominant == LoyaltyStatus::NonMember {
        text.push_str(
            " The highest-spending customers are operating outside the loyalty program, and recruiting them could shift the program's ROI.",
        );
    }

    let mut values = Vec::new();
    if let Some(value) = comparison.member_ltv_per_customer {
        values.push(("memberLtvPerCustomer", value));
    }
    if let Some(value) = comparison.non_member_ltv_per_customer {
        values.push(("nonMemberLtvPerCustomer", value));
    }
    if let Some(value) = comparison.member_revenue_share {
        values.push(("memberRevenueSharePct", value));
    }
    insight(InsightKind::LoyaltyLtv, &values, text)
}

fn status_bar(key: &str, title: &str, y_label: &str, rows: [(LoyaltyStatus, Option<f64>); 2]) -> ChartSpec {
    ChartSpec {
        key: key.to_string(),
        kind: ChartKind::Bar,
        title: title.to_string(),
        x_label: "Status".to_string(),
        y_label: y_label.to_string(),
        series: rows
            .into_iter()
            .filter_map(|(status, value)| {
                value.map(|y| ChartSeries {
                    name: status.as_str().to_string(),
                    color: Some(status_color(status).to_string()),
                    points: vec![ChartPoint {
                        x: AxisValue::Category(status.as_str().to_string()),
                        y,
                        size: None,
                    }],
                })
            })
            .collect(),
    }
}

impl ReportSection for LoyaltySection {
    fn id(&self) -> SectionId {
        SectionId::Loyalty
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::LoyaltyRoiAnalysis]
    }

    fn render(&self, inputs: &ReportInputs, _controls: &DashboardControls) -> AppResult<SectionView> {
        let records = inputs.loyalty()?;
        let mut view = SectionView::new(self.id());
        let Some(comparison) = compare(&records) else {
            view.insights.push(empty_state(
                "Loyalty comparison needs both a Loyalty Member and a Non-Member row.",
            ));
            return Ok(view);
        };
        let member = &comparison.member;
        let non_member = &comparison.non_member;

        view.metrics.push(
            MetricCard::new("Member AOV", currency(member.avg_order_value, 2)).with_delta(format!(
                "{} vs Non-Member",
                optional_percent(comparison.aov_lift, 1)
            )),
        );
        view.metrics.push(
            MetricCard::new("Repeat Purchase Rate", format!("{:.2}x", member.repeat_order_rate)).with_delta(format!(
                "{} vs Non-Member",
                optional_percent(comparison.repeat_lift, 1)
            )),
        );
        view.metrics.push(MetricCard::new(
            "Loyalty Revenue Share",
            optional_percent(comparison.member_revenue_share, 1),
        ));

        view.charts.push(status_bar(
            "loyalty_aov_bar",
            "Average Order Value (Transaction Size)",
            "Avg Order Value ($)",
            [
                (LoyaltyStatus::Member, Some(member.avg_order_value)),
                (LoyaltyStatus::NonMember, Some(non_member.avg_order_value)),
            ],
        ));
        view.charts.push(status_bar(
            "loyalty_repeat_bar",
            "Repeat Order Rate (Frequency)",
            "Repeat Order Rate",
            [
                (LoyaltyStatus::Member, Some(member.repeat_order_rate)),
                (LoyaltyStatus::NonMember, Some(non_member.repeat_order_rate)),
            ],
        ));
        view.insights.push(aov_insight(&comparison));

        view.charts.push(status_bar(
            "loyalty_ltv_per_customer_bar",
            "Average LTV per Individual Customer",
            "Value per Customer ($)",
            [
                (LoyaltyStatus::Member, comparison.member_ltv_per_customer),
                (LoyaltyStatus::NonMember, comparison.non_member_ltv_per_customer),
            ],
        ));
        view.charts.push(ChartSpec {
            key: "loyalty_revenue_pie".to_string(),
            kind: ChartKind::Pie,
            title: "Cumulative Revenue Contribution".to_string(),
            x_label: "Status".to_string(),
            y_label: "Total Lifetime Value ($)".to_string(),
            series: vec![ChartSeries {
                name: "Status".to_string(),
                color: None,
                points: [member, non_member]
                    .into_iter()
                    .map(|record| ChartPoint {
                        x: AxisValue::Category(record.status.as_str().to_string()),
                        y: record.total_lifetime_value,
                        size: None,
                    })
                    .collect(),
            }],
        });
        view.insights.push(ltv_insight(&comparison));

        Ok(view)
    }
}
