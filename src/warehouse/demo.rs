//! Synthetic gold tables for local runs and integration tests.
//!
//! The generator is seeded, so the same seed always produces the same warehouse.

use crate::errors::{AppError, AppResult};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const RESTAURANTS: &[&str] = &["R101", "R102", "R103", "R104", "R105", "R106"];
pub const CATEGORIES: &[&str] = &["Breakfast", "Salads", "Sandwiches", "Catering", "Beverages"];

const CUSTOMER_COUNT: usize = 240;
const DAYS: i64 = 120;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS customer_intelligence (
  user_id TEXT PRIMARY KEY,
  current_clv,
  clv_tier TEXT,
  segment TEXT,
  recency,
  frequency,
  monetary_value,
  avg_gap_between_orders,
  avg_spend_change_pct
);
CREATE TABLE IF NOT EXISTS customer_rolling_metrics (
  user_id TEXT,
  order_date TEXT,
  running_clv
);
CREATE TABLE IF NOT EXISTS location_sales_trends (
  restaurant_id TEXT,
  order_date TEXT,
  item_category TEXT,
  daily_revenue,
  daily_order_count
);
CREATE TABLE IF NOT EXISTS loyalty_roi_analysis (
  is_loyalty,
  avg_order_value,
  repeat_order_rate,
  total_lifetime_value,
  total_customers
);
CREATE TABLE IF NOT EXISTS discount_effectiveness (
  status TEXT,
  order_count,
  total_revenue,
  avg_order_value
);
";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSummary {
    pub customers: usize,
    pub rolling_rows: usize,
    pub trend_rows: usize,
    pub loyalty_rows: usize,
    pub discount_rows: usize,
}

pub fn demo_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 10, 24).expect("valid demo start date")
}

/// Writes all five gold tables into a fresh SQLite file at `path`.
pub fn seed_demo_warehouse(path: &Path, seed: u64) -> AppResult<DemoSummary> {
    if path.exists() {
        return Err(AppError::Io(format!(
            "refusing to overwrite existing file {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA_SQL)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut summary = DemoSummary::default();

    let tx = conn.transaction()?;
    {
        let customers = generate_customers(&mut rng);
        let mut insert_customer = tx.prepare(
            "INSERT INTO customer_intelligence (
               user_id, current_clv, clv_tier, segment, recency, frequency, monetary_value,
               avg_gap_between_orders, avg_spend_change_pct
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        let mut insert_rolling = tx.prepare(
            "INSERT INTO customer_rolling_metrics (user_id, order_date, running_clv) VALUES (?1, ?2, ?3)",
        )?;

        for (index, customer) in customers.iter().enumerate() {
            // Mirror warehouse drivers that hand back decimals as text.
            let clv_value: rusqlite::types::Value = if index % 9 == 0 {
                rusqlite::types::Value::Text(format!("{:.2}", customer.clv))
            } else {
                rusqlite::types::Value::Real(customer.clv)
            };
            insert_customer.execute(params![
                customer.user_id,
                clv_value,
                customer.tier,
                customer.segment,
                customer.recency,
                customer.frequency,
                customer.monetary,
                rng.random_range(3.0..60.0),
                if index % 17 == 0 {
                    rusqlite::types::Value::Text("N/A".to_string())
                } else {
                    rusqlite::types::Value::Real(rng.random_range(-40.0..40.0))
                },
            ])?;

            let orders = rng.random_range(1..8usize);
            let mut running = 0.0;
            let mut date = demo_start_date() + Duration::days(rng.random_range(0..20));
            for step in 0..orders {
                let remaining = customer.clv - running;
                let spend = if step + 1 == orders {
                    remaining
                } else {
                    remaining * rng.random_range(0.1..0.5)
                };
                running += spend;
                insert_rolling.execute(params![
                    customer.user_id,
                    date.format("%Y-%m-%d").to_string(),
                    (running * 100.0).round() / 100.0
                ])?;
                summary.rolling_rows += 1;
                date += Duration::days(rng.random_range(1..15));
            }
        }
        summary.customers = customers.len();

        let mut insert_trend = tx.prepare(
            "INSERT INTO location_sales_trends (
               restaurant_id, order_date, item_category, daily_revenue, daily_order_count
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, restaurant) in RESTAURANTS.iter().enumerate() {
            let scale = 1.0 + position as f64 * 0.35;
            for offset in 0..DAYS {
                if !rng.random_bool(0.85) {
                    continue;
                }
                let date = demo_start_date() + Duration::days(offset);
                for category in CATEGORIES {
                    if !rng.random_bool(0.7) {
                        continue;
                    }
                    let orders = rng.random_range(2..40u32) as f64;
                    let ticket = if *category == "Catering" {
                        rng.random_range(90.0..240.0)
                    } else {
                        rng.random_range(8.0..24.0)
                    };
                    let revenue = (orders * ticket * scale * 100.0).round() / 100.0;
                    insert_trend.execute(params![
                        restaurant,
                        date.format("%Y-%m-%d").to_string(),
                        category,
                        revenue,
                        orders
                    ])?;
                    summary.trend_rows += 1;
                }
            }
        }

        tx.execute(
            "INSERT INTO loyalty_roi_analysis VALUES ('true', 45.00, 3.42, 4120533.10, 21874)",
            [],
        )?;
        tx.execute(
            "INSERT INTO loyalty_roi_analysis VALUES ('false', 52.83, 1.87, 13918750.67, 96211)",
            [],
        )?;
        summary.loyalty_rows = 2;

        tx.execute(
            "INSERT INTO discount_effectiveness VALUES ('Discounted', 9150, 4695684.17, 113.87)",
            [],
        )?;
        tx.execute(
            "INSERT INTO discount_effectiveness VALUES ('Full Price', 122178, 13343599.60, 52.83)",
            [],
        )?;
        summary.discount_rows = 2;
    }
    tx.commit()?;

    tracing::info!(path = %path.display(), seed, customers = summary.customers, trend_rows = summary.trend_rows, "seeded demo warehouse");
    Ok(summary)
}

struct DemoCustomer {
    user_id: String,
    clv: f64,
    tier: &'static str,
    segment: &'static str,
    recency: i64,
    frequency: i64,
    monetary: f64,
}

fn generate_customers(rng: &mut StdRng) -> Vec<DemoCustomer> {
    let mut spends = (0..CUSTOMER_COUNT)
        .map(|index| {
            let base: f64 = rng.random_range(20.0..400.0);
            let whale = if rng.random_bool(0.15) { rng.random_range(4.0..12.0) } else { 1.0 };
            (format!("U{:05}", index + 1), (base * whale * 100.0).round() / 100.0)
        })
        .collect::<Vec<_>>();
    spends.sort_by(|a, b| b.1.total_cmp(&a.1));

    let high_cutoff = CUSTOMER_COUNT / 5;
    let low_cutoff = CUSTOMER_COUNT - CUSTOMER_COUNT / 5;

    spends
        .into_iter()
        .enumerate()
        .map(|(rank, (user_id, clv))| {
            let tier = if rank < high_cutoff {
                "High"
            } else if rank < low_cutoff {
                "Medium"
            } else {
                "Low"
            };
            let recency_score = rng.random_range(1..=5i64);
            let frequency = if tier == "High" && rng.random_bool(0.3) {
                0
            } else {
                rng.random_range(0..18i64)
            };
            let segment = if recency_score >= 4 && frequency >= 8 {
                "VIP"
            } else if recency_score >= 4 && frequency <= 2 {
                "New Customer"
            } else if recency_score <= 2 && frequency <= 2 {
                "Churn Risk"
            } else {
                "Standard"
            };
            DemoCustomer {
                user_id,
                clv,
                tier,
                segment,
                recency: rng.random_range(1..180),
                frequency,
                monetary: (clv * rng.random_range(0.05..0.6) * 100.0).round() / 100.0,
            }
        })
        .collect()
}
