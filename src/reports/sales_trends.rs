//! Revenue over time per restaurant at a chosen grain.
//!
//! Bucket labels are calendar-aligned and computed from each date alone:
//! weekly buckets are labelled by the Sunday that ends the week and monthly
//! buckets by the last day of the month. Sparse data never shifts a boundary.

use super::{empty_state, insight, ReportInputs, ReportSection};
use crate::errors::AppResult;
use crate::models::{
    AxisValue, ChartKind, ChartPoint, ChartSeries, ChartSpec, ControlKey, DashboardControls, GoldTable, Insight,
    InsightKind, LocationSalesRecord, MetricCard, SectionId, SectionView, TimeGrain, DEFAULT_LOCATION_COUNT,
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub struct SalesTrendsSection {
    pub default_location_count: usize,
}

impl Default for SalesTrendsSection {
    fn default() -> Self {
        Self {
            default_location_count: DEFAULT_LOCATION_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub bucket: NaiveDate,
    pub restaurant_id: String,
    pub revenue: f64,
}

pub fn bucket_label(date: NaiveDate, grain: TimeGrain) -> NaiveDate {
    match grain {
        TimeGrain::Daily => date,
        TimeGrain::Weekly => {
            let days_to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
            date + Duration::days(days_to_sunday)
        }
        TimeGrain::Monthly => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|first| first.pred_opt())
                .unwrap_or(date)
        }
    }
}

/// Distinct restaurant ids in the order they first appear.
pub fn restaurant_options(records: &[LocationSalesRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.restaurant_id.as_str()))
        .map(|record| record.restaurant_id.clone())
        .collect()
}

pub fn resolve_selection(selected: Option<&[String]>, options: &[String], default_count: usize) -> Vec<String> {
    match selected {
        Some(selected) => selected.to_vec(),
        None => options.iter().take(default_count).cloned().collect(),
    }
}

pub fn aggregate_trend(records: &[LocationSalesRecord], grain: TimeGrain, selected: &[String]) -> Vec<TrendPoint> {
    let selected = selected.iter().map(String::as_str).collect::<HashSet<_>>();
    let mut sums: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for record in records {
        if !selected.contains(record.restaurant_id.as_str()) {
            continue;
        }
        let key = (bucket_label(record.order_date, grain), record.restaurant_id.as_str());
        *sums.entry(key).or_insert(0.0) += record.daily_revenue;
    }

    sums.into_iter()
        .map(|((bucket, restaurant_id), revenue)| TrendPoint {
            bucket,
            restaurant_id: restaurant_id.to_string(),
            revenue,
        })
        .collect()
}

/// Revenue per item category for the selected restaurants, largest first.
pub fn category_mix(records: &[LocationSalesRecord], selected: &[String]) -> Vec<(String, f64)> {
    let selected = selected.iter().map(String::as_str).collect::<HashSet<_>>();
    let mut sums: HashMap<&str, f64> = HashMap::new();
    for record in records {
        if selected.contains(record.restaurant_id.as_str()) {
            *sums.entry(record.item_category.as_str()).or_insert(0.0) += record.daily_revenue;
        }
    }

    let mut mix = sums
        .into_iter()
        .map(|(category, revenue)| (category.to_string(), revenue))
        .collect::<Vec<_>>();
    mix.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    mix
}

pub fn coverage_insight(location_count: usize) -> Insight {
    insight(
        InsightKind::LocationCoverage,
        &[("uniqueLocations", location_count as f64)],
        format!(
            "There are {} unique business locations in this dataset. Use the filters to analyze individual performance trends, identify peak sales periods, item category performance, and compare the revenue trajectory of different storefronts side-by-side.",
            location_count
        ),
    )
}

impl ReportSection for SalesTrendsSection {
    fn id(&self) -> SectionId {
        SectionId::SalesTrends
    }

    fn tables(&self) -> &'static [GoldTable] {
        &[GoldTable::LocationSalesTrends]
    }

    fn controls(&self) -> &'static [ControlKey] {
        &[ControlKey::TimeGrain, ControlKey::Locations]
    }

    fn render(&self, inputs: &ReportInputs, controls: &DashboardControls) -> AppResult<SectionView> {
        let records = inputs.location_sales()?;
        let options = restaurant_options(&records);
        let selected = resolve_selection(
            controls.selected_locations.as_deref(),
            &options,
            self.default_location_count,
        );
        let unknown = selected
            .iter()
            .filter(|id| !options.contains(id))
            .collect::<Vec<_>>();
        if !unknown.is_empty() {
            tracing::warn!(unknown = ?unknown, "selected restaurants are not present in the trends table");
        }

        let grain = controls.time_grain;
        let mut view = SectionView::new(self.id());
        view.insights.push(coverage_insight(options.len()));
        view.metrics.push(MetricCard::new("Unique Locations", options.len().to_string()));
        view.metrics.push(MetricCard::new("Time Grain", grain.as_str()));
        view.metrics.push(
            MetricCard::new("Selected Restaurants", selected.len().to_string()).with_help(selected.join(", ")),
        );

        let trend = aggregate_trend(&records, grain, &selected);
        view.charts.push(ChartSpec {
            key: "sales_trend_line".to_string(),
            kind: ChartKind::Line,
            title: format!("Total Sales Trend ({})", grain.as_str()),
            x_label: "Date".to_string(),
            y_label: "Revenue ($)".to_string(),
            series: selected
                .iter()
                .filter_map(|restaurant| {
                    let points = trend
                        .iter()
                        .filter(|point| &point.restaurant_id == restaurant)
                        .map(|point| ChartPoint {
                            x: AxisValue::Date(point.bucket),
                            y: point.revenue,
                            size: None,
                        })
                        .collect::<Vec<_>>();
                    (!points.is_empty()).then(|| ChartSeries {
                        name: restaurant.clone(),
                        color: None,
                        points,
                    })
                })
                .collect(),
        });

        view.charts.push(ChartSpec {
            key: "category_mix_bar".to_string(),
            kind: ChartKind::Bar,
            title: "Revenue Distribution by Category".to_string(),
            x_label: "Item Category".to_string(),
            y_label: "Revenue ($)".to_string(),
            series: vec![ChartSeries {
                name: "item_category".to_string(),
                color: None,
                points: category_mix(&records, &selected)
                    .into_iter()
                    .map(|(category, revenue)| ChartPoint {
                        x: AxisValue::Category(category),
                        y: revenue,
                        size: None,
                    })
                    .collect(),
            }],
        });

        if trend.is_empty() {
            view.insights
                .push(empty_state("No sales rows match the selected restaurants."));
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate_trend, bucket_label, category_mix, resolve_selection, restaurant_options};
    use crate::models::{LocationSalesRecord, TimeGrain};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn record(restaurant: &str, order_date: NaiveDate, category: &str, revenue: f64) -> LocationSalesRecord {
        LocationSalesRecord {
            restaurant_id: restaurant.to_string(),
            order_date,
            item_category: category.to_string(),
            daily_revenue: revenue,
            daily_order_count: 1.0,
        }
    }

    #[test]
    fn weekly_buckets_end_on_sunday() {
        // 2024-02-18 is a Sunday.
        assert_eq!(bucket_label(date(2024, 2, 12), TimeGrain::Weekly), date(2024, 2, 18));
        assert_eq!(bucket_label(date(2024, 2, 18), TimeGrain::Weekly), date(2024, 2, 18));
        assert_eq!(bucket_label(date(2024, 2, 19), TimeGrain::Weekly), date(2024, 2, 25));
        assert_eq!(bucket_label(date(2023, 12, 28), TimeGrain::Weekly), date(2023, 12, 31));
    }

    #[test]
    fn monthly_buckets_end_on_last_day() {
        assert_eq!(bucket_label(date(2024, 2, 3), TimeGrain::Monthly), date(2024, 2, 29));
        assert_eq!(bucket_label(date(2023, 12, 31), TimeGrain::Monthly), date(2023, 12, 31));
        assert_eq!(bucket_label(date(2023, 4, 1), TimeGrain::Monthly), date(2023, 4, 30));
        assert_eq!(bucket_label(date(2023, 4, 1), TimeGrain::Daily), date(2023, 4, 1));
    }

    #[test]
    fn sparse_dates_do_not_shift_buckets() {
        let dense = (1..=28)
            .map(|day| record("A", date(2024, 2, day), "Salads", 1.0))
            .collect::<Vec<_>>();
        let sparse = vec![record("A", date(2024, 2, 14), "Salads", 1.0)];
        let selected = vec!["A".to_string()];

        let dense_buckets = aggregate_trend(&dense, TimeGrain::Weekly, &selected);
        let sparse_buckets = aggregate_trend(&sparse, TimeGrain::Weekly, &selected);
        assert_eq!(sparse_buckets[0].bucket, date(2024, 2, 18));
        assert!(dense_buckets.iter().any(|point| point.bucket == sparse_buckets[0].bucket));
    }

    #[test]
    fn aggregation_is_a_partition_for_every_grain() {
        let records = vec![
            record("A", date(2024, 1, 30), "Salads", 10.5),
            record("A", date(2024, 1, 30), "Catering", 200.0),
            record("A", date(2024, 2, 1), "Salads", 7.25),
            record("B", date(2024, 2, 4), "Salads", 3.0),
            record("B", date(2024, 3, 9), "Breakfast", 12.0),
            record("C", date(2024, 2, 4), "Salads", 1_000.0),
        ];
        let selected = vec!["A".to_string(), "B".to_string()];
        let expected: f64 = records
            .iter()
            .filter(|record| record.restaurant_id != "C")
            .map(|record| record.daily_revenue)
            .sum();

        for grain in [TimeGrain::Daily, TimeGrain::Weekly, TimeGrain::Monthly] {
            let points = aggregate_trend(&records, grain, &selected);
            let total: f64 = points.iter().map(|point| point.revenue).sum();
            assert!((total - expected).abs() < 1e-9, "{:?}", grain);
            assert!(points.windows(2).all(|pair| pair[0].bucket <= pair[1].bucket));
        }

        let monthly = aggregate_trend(&records, TimeGrain::Monthly, &selected);
        assert_eq!(monthly.len(), 4);
        assert_eq!(monthly[0].bucket, date(2024, 1, 31));
        assert_eq!(monthly[0].revenue, 210.5);
    }

    #[test]
    fn default_selection_takes_first_seen_restaurants() {
        let records = vec![
            record("R9", date(2024, 1, 1), "Salads", 1.0),
            record("R2", date(2024, 1, 1), "Salads", 1.0),
            record("R9", date(2024, 1, 2), "Salads", 1.0),
            record("R5", date(2024, 1, 1), "Salads", 1.0),
            record("R1", date(2024, 1, 1), "Salads", 1.0),
        ];
        let options = restaurant_options(&records);
        assert_eq!(options, vec!["R9", "R2", "R5", "R1"]);
        assert_eq!(resolve_selection(None, &options, 3), vec!["R9", "R2", "R5"]);
        let explicit = vec!["R1".to_string()];
        assert_eq!(resolve_selection(Some(&explicit), &options, 3), vec!["R1"]);
    }

    #[test]
    fn category_mix_is_descending() {
        let records = vec![
            record("A", date(2024, 1, 1), "Salads", 5.0),
            record("A", date(2024, 1, 2), "Catering", 50.0),
            record("A", date(2024, 1, 3), "Salads", 6.0),
            record("B", date(2024, 1, 3), "Breakfast", 500.0),
        ];
        let mix = category_mix(&records, &["A".to_string()]);
        assert_eq!(mix, vec![("Catering".to_string(), 50.0), ("Salads".to_string(), 11.0)]);
    }
}
