use crate::errors::{AppError, AppResult};
use crate::models::{
    ClvTier, CustomerRecord, DiscountRecord, DiscountStatus, LocationSalesRecord, LoyaltyRecord, LoyaltyStatus,
    RollingMetric, Segment,
};
use crate::normalize::{coerce_f64, parse_date, parse_flag};
use crate::warehouse::{Cell, Table};
use chrono::NaiveDate;

pub fn decode_customers(table: &Table) -> AppResult<Vec<CustomerRecord>> {
    let user_id = table.require_column("user_id")?;
    let current_clv = table.require_column("current_clv")?;
    let clv_tier = table.require_column("clv_tier")?;
    let segment = table.require_column("segment")?;
    let recency = table.column_index("recency");
    let frequency = table.column_index("frequency");
    let monetary_value = table.column_index("monetary_value");

    Ok(table
        .rows
        .iter()
        .map(|row| CustomerRecord {
            user_id: row[user_id].as_text(),
            current_clv: coerce_f64(&row[current_clv]),
            clv_tier: ClvTier::parse(&row[clv_tier].as_text()),
            segment: Segment::parse(&row[segment].as_text()),
            recency: optional_number(row, recency),
            frequency: optional_number(row, frequency),
            monetary_value: optional_number(row, monetary_value),
        })
        .collect())
}

pub fn decode_rolling_metrics(table: &Table) -> AppResult<Vec<RollingMetric>> {
    let user_id = table.require_column("user_id")?;
    let order_date = table.require_column("order_date")?;
    let running_clv = table.require_column("running_clv")?;

    table
        .rows
        .iter()
        .map(|row| {
            Ok(RollingMetric {
                user_id: row[user_id].as_text(),
                order_date: required_date(table, &row[order_date])?,
                running_clv: coerce_f64(&row[running_clv]),
            })
        })
        .collect()
}

pub fn decode_location_sales(table: &Table) -> AppResult<Vec<LocationSalesRecord>> {
    let restaurant_id = table.require_column("restaurant_id")?;
    let order_date = table.require_column("order_date")?;
    let item_category = table.column_index("item_category");
    let daily_revenue = table.require_column("daily_revenue")?;
    let daily_order_count = table.require_column("daily_order_count")?;

    table
        .rows
        .iter()
        .map(|row| {
            Ok(LocationSalesRecord {
                restaurant_id: row[restaurant_id].as_text(),
                order_date: required_date(table, &row[order_date])?,
                item_category: item_category
                    .map(|index| row[index].as_text())
                    .filter(|category| !category.is_empty())
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                daily_revenue: coerce_f64(&row[daily_revenue]),
                daily_order_count: coerce_f64(&row[daily_order_count]),
            })
        })
        .collect()
}

/// Rows whose loyalty flag cannot be read are dropped with a warning.
pub fn decode_loyalty(table: &Table) -> AppResult<Vec<LoyaltyRecord>> {
    let is_loyalty = table.require_column("is_loyalty")?;
    let avg_order_value = table.require_column("avg_order_value")?;
    let repeat_order_rate = table.require_column("repeat_order_rate")?;
    let total_lifetime_value = table.require_column("total_lifetime_value")?;
    let total_customers = table.require_column("total_customers")?;

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(flag) = parse_flag(&row[is_loyalty]) else {
            tracing::warn!(value = ?row[is_loyalty], "skipping loyalty row with unrecognized status");
            continue;
        };
        records.push(LoyaltyRecord {
            status: if flag { LoyaltyStatus::Member } else { LoyaltyStatus::NonMember },
            avg_order_value: coerce_f64(&row[avg_order_value]),
            repeat_order_rate: coerce_f64(&row[repeat_order_rate]),
            total_lifetime_value: coerce_f64(&row[total_lifetime_value]),
            total_customers: coerce_f64(&row[total_customers]),
        });
    }
    Ok(records)
}

pub fn decode_discounts(table: &Table) -> AppResult<Vec<DiscountRecord>> {
    let status = table.require_column("status")?;
    let order_count = table.require_column("order_count")?;
    let total_revenue = table.require_column("total_revenue")?;
    let avg_order_value = table.require_column("avg_order_value")?;

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(parsed) = DiscountStatus::parse(&row[status].as_text()) else {
            tracing::warn!(value = ?row[status], "skipping discount row with unrecognized status");
            continue;
        };
        records.push(DiscountRecord {
            status: parsed,
            order_count: coerce_f64(&row[order_count]),
            total_revenue: coerce_f64(&row[total_revenue]),
            avg_order_value: coerce_f64(&row[avg_order_value]),
        });
    }
    Ok(records)
}

fn optional_number(row: &[Cell], index: Option<usize>) -> f64 {
    index.map(|index| coerce_f64(&row[index])).unwrap_or(0.0)
}

fn required_date(table: &Table, cell: &Cell) -> AppResult<NaiveDate> {
    parse_date(cell).ok_or_else(|| {
        AppError::Schema(format!(
            "table '{}' has an unreadable order_date: {:?}",
            table.name, cell
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_customers, decode_location_sales, decode_loyalty};
    use crate::models::{ClvTier, LoyaltyStatus, Segment};
    use crate::warehouse::{Cell, Table};

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    #[test]
    fn customers_decode_labels_case_insensitively() {
        let mut table = Table::new(
            "customer_intelligence",
            ["user_id", "current_clv", "clv_tier", "segment", "frequency"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        table
            .push_row(vec![text("U1"), Cell::Real(10.0), text("high"), text("Churn Risk"), Cell::Real(0.0)])
            .expect("row");
        table
            .push_row(vec![text("U2"), Cell::Real(5.0), text("Platinum"), text("vip"), Cell::Real(3.0)])
            .expect("row");

        let customers = decode_customers(&table).expect("decode");
        assert_eq!(customers[0].clv_tier, Some(ClvTier::High));
        assert_eq!(customers[0].segment, Some(Segment::ChurnRisk));
        assert_eq!(customers[1].clv_tier, None);
        assert_eq!(customers[1].segment, Some(Segment::Vip));
        assert_eq!(customers[1].recency, 0.0);
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let table = Table::new("customer_intelligence", vec!["user_id".to_string()]);
        let err = decode_customers(&table).expect_err("schema error");
        assert!(err.to_string().contains("current_clv"));
    }

    #[test]
    fn unreadable_dates_fail_the_decode() {
        let mut table = Table::new(
            "location_sales_trends",
            ["restaurant_id", "order_date", "daily_revenue", "daily_order_count"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        table
            .push_row(vec![Cell::Integer(7), text("yesterday"), Cell::Real(1.0), Cell::Real(1.0)])
            .expect("row");
        assert!(decode_location_sales(&table).is_err());
    }

    #[test]
    fn loyalty_rows_with_unknown_flags_are_skipped() {
        let mut table = Table::new(
            "loyalty_roi_analysis",
            ["is_loyalty", "avg_order_value", "repeat_order_rate", "total_lifetime_value", "total_customers"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        table
            .push_row(vec![Cell::Integer(1), Cell::Real(45.0), Cell::Real(3.0), Cell::Real(10.0), Cell::Real(2.0)])
            .expect("row");
        table
            .push_row(vec![text("unknown"), Cell::Real(1.0), Cell::Real(1.0), Cell::Real(1.0), Cell::Real(1.0)])
            .expect("row");
        table
            .push_row(vec![text("False"), Cell::Real(52.83), Cell::Real(1.5), Cell::Real(20.0), Cell::Real(4.0)])
            .expect("row");

        let records = decode_loyalty(&table).expect("decode");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, LoyaltyStatus::Member);
        assert_eq!(records[1].status, LoyaltyStatus::NonMember);
    }
}
