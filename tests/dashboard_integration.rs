use chrono::{Duration, TimeZone, Utc};
use gold_dashboard_lib::config::DashboardConfig;
use gold_dashboard_lib::dashboard::Dashboard;
use gold_dashboard_lib::models::{ControlChange, InsightKind, SectionId, TimeGrain};
use gold_dashboard_lib::render::{render_json, render_text};
use gold_dashboard_lib::warehouse::demo::seed_demo_warehouse;
use gold_dashboard_lib::warehouse::SqliteWarehouse;

fn seeded_dashboard(dir: &tempfile::TempDir) -> Dashboard<SqliteWarehouse> {
    let db_path = dir.path().join("gold.db");
    seed_demo_warehouse(&db_path, 11).expect("seed demo warehouse");
    let config = DashboardConfig {
        warehouse_path: db_path.clone(),
        ..DashboardConfig::default()
    };
    let warehouse = SqliteWarehouse::open(&config.warehouse_path).expect("open warehouse");
    Dashboard::new(warehouse, &config)
}

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 21, 9, 0, 0).single().expect("timestamp")
}

#[test]
fn renders_every_section_from_a_seeded_warehouse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dashboard = seeded_dashboard(&dir);
    let view = dashboard.render_all(start()).expect("render");

    let ids = view.sections.iter().map(|section| section.section).collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec![
            SectionId::Clv,
            SectionId::Segmentation,
            SectionId::Churn,
            SectionId::SalesTrends,
            SectionId::LocationPerformance,
            SectionId::Loyalty,
            SectionId::DiscountEffectiveness,
        ]
    );
    for section in &view.sections {
        assert!(!section.insights.is_empty(), "{:?} has no insight", section.section);
        assert!(!section.metrics.is_empty(), "{:?} has no metrics", section.section);
    }

    let clv = &view.sections[0];
    assert_eq!(clv.tables[0].rows.len(), 20);
    assert_eq!(clv.insights[0].kind, InsightKind::ClvTrend);

    let trends = &view.sections[3];
    let selected = trends
        .metrics
        .iter()
        .find(|metric| metric.label == "Selected Restaurants")
        .expect("selection metric");
    assert_eq!(selected.value, "3");
    assert_eq!(selected.help.as_deref(), Some("R101, R102, R103"));
    assert_eq!(trends.insights[0].values.get("uniqueLocations"), Some(&6.0));

    let loyalty = &view.sections[5];
    assert_eq!(loyalty.metrics[0].delta.as_deref(), Some("-14.8% vs Non-Member"));

    let discount = &view.sections[6];
    let order_share = discount
        .metrics
        .iter()
        .find(|metric| metric.label == "Order Share")
        .expect("order share");
    assert_eq!(order_share.value, "7.0%");

    let text = render_text(&view);
    assert!(text.contains("== 7. Pricing & Discount Effectiveness =="));
    let json: serde_json::Value = serde_json::from_str(&render_json(&view).expect("json")).expect("parse json");
    assert_eq!(json["sections"].as_array().map(Vec::len), Some(7));
}

#[test]
fn control_changes_reuse_cached_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dashboard = seeded_dashboard(&dir);
    dashboard.render_all(start()).expect("render");
    let misses = dashboard.loader().cache().stats().misses;
    assert_eq!(misses, 5);

    let later = start() + Duration::minutes(10);
    let changed = dashboard
        .apply(ControlChange::TimeGrain(TimeGrain::Monthly), later)
        .expect("apply grain");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].section, SectionId::SalesTrends);
    let monthly_points = changed[0].charts[0]
        .series
        .iter()
        .map(|series| series.points.len())
        .max()
        .unwrap_or(0);
    assert!(monthly_points <= 5, "120 days span at most five months");

    let changed = dashboard
        .apply(ControlChange::Locations(vec!["R106".to_string()]), later)
        .expect("apply locations");
    assert_eq!(changed[0].charts[0].series.len(), 1);
    assert_eq!(changed[0].charts[0].series[0].name, "R106");

    let changed = dashboard.apply(ControlChange::TopN(100), later).expect("apply top n");
    assert_eq!(changed[0].section, SectionId::Clv);
    assert_eq!(changed[0].tables[0].rows.len(), 100);

    assert_eq!(dashboard.loader().cache().stats().misses, misses);
    assert!(dashboard.apply(ControlChange::TopN(0), later).is_err());
}

#[test]
fn refresh_after_ttl_refetches_from_the_warehouse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dashboard = seeded_dashboard(&dir);
    dashboard.render_all(start()).expect("render");
    dashboard.render_all(start() + Duration::hours(1)).expect("render after ttl");
    assert_eq!(dashboard.loader().cache().stats().misses, 10);
}
