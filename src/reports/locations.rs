use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::format::{currency, optional_currency, thousands};
use crate::metrics::{mean, percent_lift, ratio};
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, DashboardControls, GoldTable, Insight, InsightKind,
    LocationSalesRecord, MetricCard, SectionId, SectionView, TableView,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub struct LocationPerformanceSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRollup {
    pub restaurant_id: String,
    pub total_revenue: f64,
    pub avg_daily_revenue: f64,
    pub avg_daily_orders: f64,
    pub days_active: usize,
    /// `total_revenue / (avg_daily_orders * days_active)`; an approximation
    /// that is exact only with one row per restaurant per date.
    pub avg_order_value: Option<f64>,
}

#[derive(Default)]
struct Accumulator<'a> {
    revenue: f64,
    orders: f64,
    rows: usize,
    dates: HashSet<NaiveDate>,
    first_seen: usize,
    restaurant_id: &'a str,
}

/// Per-restaurant rollup ranked by total revenue, highest first.
pub fn rollup(records: &[LocationSalesRecord]) -> Vec<LocationRollup> {
    let mut groups: HashMap<&str, Accumulator<'_>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let group = groups
            .entry(record.restaurant_id.as_str())
            .or_insert_with(|| Accumulator {
                first_seen: index,
                restaurant_id: record.restaurant_id.as_str(),
                ..Accumulator::default()
            });
        group.revenue += record.daily_revenue;
        group.orders += record.daily_order_count;
        group.rows += 1;
        group.dates.insert(record.order_date);
    }

    let mut groups = groups.into_values().collect::<Vec<_>>();
    groups.sort_by(|a, b| b.revenue.total_cmp(&a.revenue).then_with(|| a.first_seen.cmp(&b.first_seen)));

    groups
        .into_iter()
        .map(|group| {
            let rows = group.rows as f64;
            let avg_daily_orders = group.orders / rows;
            let days_active = group.dates.len();
            LocationRollup {
                restaurant_id: group.restaurant_id.to_string(),
                total_revenue: group.revenue,
                avg_daily_revenue: group.revenue / rows,
                avg_daily_orders,
                days_active,
                avg_order_value: ratio(group.revenue, avg_daily_orders * days_active as f64),
            }
        })
        .collect()
}

/// Needs at least two locations and a non-zero fleet average.
pub fn top_location_insight(ranked: &[LocationRollup]) -> Option<Insight> {
    let (top, second) = match ranked {
        [top, second, ..] => (top, second),
        _ => return None,
    };
    let fleet_average = mean(ranked.iter().map(|location| location.total_revenue))?;
    let pct_above_average = percent_lift(top.total_revenue, fleet_average)?;
    let gap_to_second = top.total_revenue - second.total_revenue;

    Some(insight(
        InsightKind::TopLocation,
        &[
            ("topRevenue", top.total_revenue),
            ("gapToSecond", gap_to_second),
            ("fleetAverageRevenue", fleet_average),
            ("pctAboveAverage", pct_above_average),
        ],
        format!(
            "The top performer, Store {}, generated {} in total revenue, exceeding the next top performer (Store {}) by {}. This location outperformed the fleet average by {}%, making it the primary revenue driver.",
            top.restaurant_id,
            thousands(top.total_revenue, 2),
            second.restaurant_id,
            thousands(gap_to_second, 2),
            thousands(pct_above_average, 1)
        ),
    ))
}

pub fn efficiency_insight(ranked: &[LocationRollup]) -> Option<Insight> {
    let volume_leader = ranked
        .iter()
        .max_by(|a, b| a.avg_daily_orders.total_cmp(&b.avg_daily_orders))?;
    let whale = ranked
        .iter()
        .filter_map(|location| location.avg_order_value.map(|aov| (location, aov)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    let fleet_aov = mean(ranked.iter().filter_map(|location| location.avg_order_value));

    let mut values = vec![("volumeLeaderOrders", volume_leader.avg_daily_orders)];
    let mut lines = Vec::new();
    if let Some((whale, aov)) = whale {
        values.push(("whaleAov", aov));
        lines.push(format!(
            "Whale: Store {} has the highest Average Order Value (AOV) at {} on {:.1} orders/day, a high-ticket profile.",
            whale.restaurant_id,
            currency(aov, 2),
            whale.avg_daily_orders
        ));
    }
    lines.push(format!(
        "Volume Leader: Store {} leads the fleet in foot traffic, averaging {:.1} orders per day.",
        volume_leader.restaurant_id, volume_leader.avg_daily_orders
    ));
    if let Some(fleet_aov) = fleet_aov {
        values.push(("fleetAov", fleet_aov));
        lines.push(format!(
            "Fleet Gap: The average AOV across all locations is {}. Locations well below this line would benefit from upsell training or bundle promotions.",
            currency(fleet_aov, 2)
        ));
    }

    Some(insight(InsightKind::LocationEfficiency, &values, lines.join(" ")))
}

impl ReportSection for LocationPerformanceSection {
    fn id(&self) -> SectionId {
        SectionId::LocationPerformance
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::LocationSalesTrends]
    }

    fn render(&self, inputs: &ReportInputs, _controls: &DashboardControls) -> AppResult<SectionView> {
        let records = inputs.location_sales()?;
        let ranked = rollup(&records);
        let mut view = SectionView::new(self.id());

        let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) else {
            view.insights
                .push(empty_state("No location sales rows are available to rank."));
            return Ok(view);
        };

        view.metrics.push(
            MetricCard::new("Top Performer", currency(best.total_revenue, 0)).with_help(best.restaurant_id.clone()),
        );
        view.metrics.push(
            MetricCard::new("Lowest Performer", currency(worst.total_revenue, 0))
                .with_help(worst.restaurant_id.clone()),
        );

        view.charts.push(ChartSpec {
            key: "store_revenue_ranking".to_string(),
            kind: ChartKind::Bar,
            title: "Total Revenue by Location".to_string(),
            x_label: "Store ID".to_string(),
            y_label: "Total Revenue ($)".to_string(),
            series: vec![ChartSeries {
                name: "total_revenue".to_string(),
                color: None,
                points: ranked
                    .iter()
                    .map(|location| ChartPoint {
                        x: AxisValue::Category(location.restaurant_id.clone()),
                        y: location.total_revenue,
                        size: None,
                    })
                    .collect(),
            }],
        });
        view.insights.extend(top_location_insight(&ranked));

        view.charts.push(ChartSpec {
            key: "location_efficiency_scatter".to_string(),
            kind: ChartKind::Scatter,
            title: "Average Order Value vs. Daily Order Volume".to_string(),
            x_label: "Avg Orders per Day".to_string(),
            y_label: "Avg Order Value ($)".to_string(),
            series: ranked
                .iter()
                .filter_map(|location| {
                    location.avg_order_value.map(|aov| ChartSeries {
                        name: location.restaurant_id.clone(),
                        color: None,
                        points: vec![ChartPoint {
                            x: AxisValue::Number(location.avg_daily_orders),
                            y: aov,
                            size: Some(location.total_revenue),
                        }],
                    })
                })
                .collect(),
        });
        view.insights.extend(efficiency_insight(&ranked));

        view.tables.push(TableView {
            title: "Location Rollup".to_string(),
            columns: [
                "Store ID",
                "Total Revenue",
                "Avg Daily Revenue",
                "Avg Daily Orders",
                "Days Active",
                "Avg Order Value",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            rows: ranked
                .iter()
                .map(|location| {
                    vec![
                        location.restaurant_id.clone(),
                        currency(location.total_revenue, 2),
                        currency(location.avg_daily_revenue, 2),
                        thousands(location.avg_daily_orders, 1),
                        location.days_active.to_string(),
                        optional_currency(location.avg_order_value, 2),
                    ]
                })
                .collect(),
            empty_message: "No locations to rank.".to_string(),
        });

        Ok(view)
    }
}
