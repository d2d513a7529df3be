//! Dashboard driver.
//!
//! Holds the current controls and the last rendered view of every section.
//! A full render happens once at start (and on refresh); a control change
//! recomputes only the sections that declared that control, reusing cached
//! tables for everything else.

use crate::cache::CachedTableLoader;
use crate::config::DashboardConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ControlChange, DashboardControls, DashboardView, SectionId, SectionView, TimeGrain, MAX_TOP_N, MIN_TOP_N,
};
use crate::reports::{all_sections, ReportInputs, ReportSection};
use crate::warehouse::WarehouseClient;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// One line of input on the interactive surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Change(ControlChange),
    Refresh,
    Show,
    Help,
    Quit,
}

pub const COMMAND_HELP: &str = "commands: top <5-100> | grain <daily|weekly|monthly> | locations <id,id,...> | refresh | show | help | quit";

pub fn parse_command(line: &str) -> AppResult<ControlCommand> {
    let trimmed = line.trim();
    let (verb, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((trimmed, ""));

    match verb.to_ascii_lowercase().as_str() {
        "top" => {
            let value = rest
                .parse::<u32>()
                .map_err(|_| AppError::Control(format!("top expects a whole number, got '{}'", rest)))?;
            Ok(ControlCommand::Change(ControlChange::TopN(value)))
        }
        "grain" => TimeGrain::parse(rest)
            .map(|grain| ControlCommand::Change(ControlChange::TimeGrain(grain)))
            .ok_or_else(|| AppError::Control(format!("unknown time grain '{}'", rest))),
        "locations" => Ok(ControlCommand::Change(ControlChange::Locations(
            rest.split(',').map(|id| id.trim().to_string()).collect(),
        ))),
        "refresh" => Ok(ControlCommand::Refresh),
        "show" => Ok(ControlCommand::Show),
        "help" | "?" => Ok(ControlCommand::Help),
        "quit" | "exit" | "q" => Ok(ControlCommand::Quit),
        "" => Err(AppError::Control("empty command".to_string())),
        other => Err(AppError::Control(format!("unknown command '{}'", other))),
    }
}

pub struct Dashboard<W: WarehouseClient> {
    loader: CachedTableLoader<W>,
    sections: Vec<Box<dyn ReportSection>>,
    controls: DashboardControls,
    views: BTreeMap<SectionId, SectionView>,
}

impl<W: WarehouseClient> Dashboard<W> {
    pub fn new(warehouse: W, config: &DashboardConfig) -> Self {
        let controls = DashboardControls {
            top_n: config.default_top_n,
            ..DashboardControls::default()
        };
        Self::with_sections(
            CachedTableLoader::new(warehouse, config.cache_ttl()),
            all_sections(config.default_location_count),
            controls,
        )
    }

    pub fn with_sections(
        loader: CachedTableLoader<W>,
        sections: Vec<Box<dyn ReportSection>>,
        controls: DashboardControls,
    ) -> Self {
        Self {
            loader,
            sections,
            controls,
            views: BTreeMap::new(),
        }
    }

    pub fn controls(&self) -> &DashboardControls {
        &self.controls
    }

    pub fn loader(&self) -> &CachedTableLoader<W> {
        &self.loader
    }

    pub fn section_view(&self, id: SectionId) -> Option<&SectionView> {
        self.views.get(&id)
    }

    pub fn render_all(&mut self, now: DateTime<Utc>) -> AppResult<DashboardView> {
        let render_id = Uuid::new_v4().to_string();
        for index in 0..self.sections.len() {
            let view = render_section(&mut self.loader, self.sections[index].as_ref(), &self.controls, now)?;
            self.views.insert(view.section, view);
        }

        let stats = self.loader.cache().stats();
        tracing::info!(
            render_id = %render_id,
            sections = self.sections.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "rendered dashboard"
        );
        Ok(self.snapshot(render_id, now))
    }

    /// Validates and applies a control change, then recomputes the sections
    /// that depend on it. The change is committed only once every dependent
    /// section rendered; on any error the controls and views are unchanged.
    pub fn apply(&mut self, change: ControlChange, now: DateTime<Utc>) -> AppResult<Vec<SectionView>> {
        let key = change.key();
        let mut next = self.controls.clone();
        match change {
            ControlChange::TopN(value) => {
                if !(MIN_TOP_N..=MAX_TOP_N).contains(&value) {
                    return Err(AppError::Control(format!(
                        "top N must be between {} and {}, got {}",
                        MIN_TOP_N, MAX_TOP_N, value
                    )));
                }
                next.top_n = value;
            }
            ControlChange::TimeGrain(grain) => next.time_grain = grain,
            ControlChange::Locations(ids) => {
                let mut seen = HashSet::new();
                let ids = ids
                    .into_iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty() && seen.insert(id.clone()))
                    .collect::<Vec<_>>();
                if ids.is_empty() {
                    return Err(AppError::Control("select at least one location".to_string()));
                }
                next.selected_locations = Some(ids);
            }
        }
        let mut recomputed = Vec::new();
        for index in 0..self.sections.len() {
            let section = self.sections[index].as_ref();
            if !section.controls().contains(&key) {
                continue;
            }
            recomputed.push(render_section(&mut self.loader, section, &next, now)?);
        }

        self.controls = next;
        for view in &recomputed {
            self.views.insert(view.section, view.clone());
        }

        tracing::info!(control = ?key, recomputed = recomputed.len(), "applied control change");
        Ok(recomputed)
    }

    /// Drops every cached table and renders from scratch.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> AppResult<DashboardView> {
        self.loader.cache_mut().clear();
        tracing::info!("cleared table cache");
        self.render_all(now)
    }

    /// Last rendered views in page order.
    pub fn snapshot(&self, render_id: String, now: DateTime<Utc>) -> DashboardView {
        DashboardView {
            render_id,
            rendered_at: now,
            controls: self.controls.clone(),
            sections: self
                .sections
                .iter()
                .filter_map(|section| self.views.get(&section.id()).cloned())
                .collect(),
        }
    }
}

fn render_section<W: WarehouseClient>(
    loader: &mut CachedTableLoader<W>,
    section: &dyn ReportSection,
    controls: &DashboardControls,
    now: DateTime<Utc>,
) -> AppResult<SectionView> {
    let mut inputs = ReportInputs::new();
    for table in section.tables() {
        inputs.insert(*table, loader.load(*table, now)?);
    }
    let view = section.render(&inputs, controls)?;
    tracing::debug!(
        section = ?view.section,
        metrics = view.metrics.len(),
        charts = view.charts.len(),
        insights = view.insights.len(),
        "rendered section"
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ControlCommand, Dashboard};
    use crate::config::DashboardConfig;
    use crate::errors::{AppError, AppResult};
    use crate::models::{ControlChange, GoldTable, SectionId, TimeGrain};
    use crate::warehouse::{Cell, Table, WarehouseClient};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MemoryWarehouse {
        tables: HashMap<String, Table>,
        fetches: Arc<AtomicUsize>,
        offline: Arc<AtomicBool>,
    }

    impl WarehouseClient for MemoryWarehouse {
        fn fetch(&self, table: &str) -> AppResult<Table> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(AppError::Warehouse("warehouse offline".to_string()));
            }
            self.tables
                .get(table)
                .cloned()
                .ok_or_else(|| AppError::Warehouse(format!("no such table {}", table)))
        }
    }

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn table(name: GoldTable, columns: &[&str], rows: Vec<Vec<Cell>>) -> (String, Table) {
        let mut table = Table::new(name.as_str(), columns.iter().map(ToString::to_string).collect());
        for row in rows {
            table.push_row(row).expect("row");
        }
        (name.as_str().to_string(), table)
    }

    fn warehouse(skip: Option<GoldTable>) -> (MemoryWarehouse, Arc<AtomicUsize>) {
        let customers = (0..12)
            .map(|index| {
                let tier = ["High", "Medium", "Low"][index % 3];
                let segment = ["VIP", "New Customer", "Churn Risk", "Standard"][index % 4];
                vec![
                    text(&format!("U{index}")),
                    Cell::Real(100.0 * (index + 1) as f64),
                    text(tier),
                    text(segment),
                    Cell::Real(index as f64 * 10.0),
                    Cell::Integer((index % 3) as i64),
                    Cell::Real(50.0),
                ]
            })
            .collect();
        let rolling = (0..12)
            .map(|index| {
                vec![
                    text(&format!("U{}", index % 6)),
                    text(&format!("2024-01-{:02}", index + 1)),
                    Cell::Real(10.0 * (index + 1) as f64),
                ]
            })
            .collect();
        let trends = (0..20)
            .map(|index| {
                vec![
                    text(&format!("R{}", index % 4)),
                    text(&format!("2024-02-{:02}", index + 1)),
                    text(["Salads", "Catering"][index % 2]),
                    Cell::Real(100.0 + index as f64),
                    Cell::Integer(5),
                ]
            })
            .collect();

        let tables = [
            table(
                GoldTable::CustomerIntelligence,
                &["user_id", "current_clv", "clv_tier", "segment", "recency", "frequency", "monetary_value"],
                customers,
            ),
            table(GoldTable::CustomerRollingMetrics, &["user_id", "order_date", "running_clv"], rolling),
            table(
                GoldTable::LocationSalesTrends,
                &["restaurant_id", "order_date", "item_category", "daily_revenue", "daily_order_count"],
                trends,
            ),
            table(
                GoldTable::LoyaltyRoiAnalysis,
                &["is_loyalty", "avg_order_value", "repeat_order_rate", "total_lifetime_value", "total_customers"],
                vec![
                    vec![text("true"), Cell::Real(45.0), Cell::Real(3.42), Cell::Real(4_120_533.10), Cell::Integer(21_874)],
                    vec![text("false"), Cell::Real(52.83), Cell::Real(1.87), Cell::Real(13_918_750.67), Cell::Integer(96_211)],
                ],
            ),
            table(
                GoldTable::DiscountEffectiveness,
                &["status", "order_count", "total_revenue", "avg_order_value"],
                vec![
                    vec![text("Discounted"), Cell::Integer(9_150), Cell::Real(4_695_684.17), Cell::Real(113.87)],
                    vec![text("Full Price"), Cell::Integer(122_178), Cell::Real(13_343_599.60), Cell::Real(52.83)],
                ],
            ),
        ]
        .into_iter()
        .filter(|(name, _)| skip.map(|table| table.as_str() != name.as_str()).unwrap_or(true))
        .collect();

        let fetches = Arc::new(AtomicUsize::new(0));
        (
            MemoryWarehouse {
                tables,
                fetches: fetches.clone(),
                offline: Arc::new(AtomicBool::new(false)),
            },
            fetches,
        )
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("timestamp")
    }

    #[test]
    fn full_render_fetches_each_table_once() {
        let (warehouse, fetches) = warehouse(None);
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        let view = dashboard.render_all(now()).expect("render");

        assert_eq!(view.sections.len(), 7);
        assert_eq!(view.sections[0].section, SectionId::Clv);
        assert_eq!(view.sections[6].section, SectionId::DiscountEffectiveness);
        assert_eq!(fetches.load(Ordering::SeqCst), 5);
        assert_eq!(dashboard.loader().cache().stats().hits, 3);
        assert!(!view.render_id.is_empty());
    }

    #[test]
    fn control_change_recomputes_only_dependent_sections() {
        let (warehouse, fetches) = warehouse(None);
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        dashboard.render_all(now()).expect("render");
        let segmentation_before = dashboard.section_view(SectionId::Segmentation).cloned();

        let later = now() + Duration::minutes(5);
        let changed = dashboard.apply(ControlChange::TopN(5), later).expect("apply");
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].section, SectionId::Clv);
        assert_eq!(changed[0].tables[0].rows.len(), 5);
        assert_eq!(dashboard.controls().top_n, 5);
        assert_eq!(fetches.load(Ordering::SeqCst), 5);
        assert_eq!(dashboard.section_view(SectionId::Segmentation).cloned(), segmentation_before);

        let changed = dashboard
            .apply(ControlChange::TimeGrain(TimeGrain::Weekly), later)
            .expect("apply");
        assert_eq!(
            changed.iter().map(|view| view.section).collect::<Vec<_>>(),
            vec![SectionId::SalesTrends]
        );

        let changed = dashboard
            .apply(ControlChange::Locations(vec![" R2 ".into(), "R2".into(), "R3".into()]), later)
            .expect("apply");
        assert_eq!(changed.len(), 1);
        assert_eq!(
            dashboard.controls().selected_locations,
            Some(vec!["R2".to_string(), "R3".to_string()])
        );
    }

    #[test]
    fn invalid_controls_are_rejected_without_side_effects() {
        let (warehouse, _) = warehouse(None);
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        dashboard.render_all(now()).expect("render");

        for change in [
            ControlChange::TopN(4),
            ControlChange::TopN(101),
            ControlChange::Locations(vec![" ".into()]),
        ] {
            assert!(matches!(dashboard.apply(change, now()), Err(AppError::Control(_))));
        }
        assert_eq!(dashboard.controls().top_n, 20);
        assert_eq!(dashboard.controls().selected_locations, None);
    }

    #[test]
    fn expired_tables_and_refresh_refetch() {
        let (warehouse, fetches) = warehouse(None);
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        dashboard.render_all(now()).expect("render");

        dashboard.render_all(now() + Duration::seconds(3_599)).expect("render");
        assert_eq!(fetches.load(Ordering::SeqCst), 5);
        dashboard.render_all(now() + Duration::seconds(3_600)).expect("render");
        assert_eq!(fetches.load(Ordering::SeqCst), 10);
        dashboard.refresh(now() + Duration::seconds(3_601)).expect("refresh");
        assert_eq!(fetches.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn failed_recompute_keeps_previous_controls_and_views() {
        let (warehouse, _) = warehouse(None);
        let offline = warehouse.offline.clone();
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        dashboard.render_all(now()).expect("render");
        let clv_before = dashboard.section_view(SectionId::Clv).cloned();

        offline.store(true, Ordering::SeqCst);
        let expired = now() + Duration::seconds(3_600);
        let result = dashboard.apply(ControlChange::TopN(5), expired);
        assert!(matches!(result, Err(AppError::Warehouse(_))));
        assert_eq!(dashboard.controls().top_n, 20);
        assert_eq!(dashboard.section_view(SectionId::Clv).cloned(), clv_before);

        offline.store(false, Ordering::SeqCst);
        let changed = dashboard.apply(ControlChange::TopN(5), expired).expect("apply");
        assert_eq!(changed[0].tables[0].rows.len(), 5);
        assert_eq!(dashboard.controls().top_n, 5);
    }

    #[test]
    fn warehouse_failure_propagates() {
        let (warehouse, _) = warehouse(Some(GoldTable::DiscountEffectiveness));
        let mut dashboard = Dashboard::new(warehouse, &DashboardConfig::default());
        let result = dashboard.render_all(now());
        assert!(matches!(result, Err(AppError::Warehouse(_))));
    }

    #[test]
    fn parses_interactive_commands() {
        assert_eq!(
            parse_command("top 25").expect("top"),
            ControlCommand::Change(ControlChange::TopN(25))
        );
        assert_eq!(
            parse_command("  grain   Monthly ").expect("grain"),
            ControlCommand::Change(ControlChange::TimeGrain(TimeGrain::Monthly))
        );
        assert_eq!(
            parse_command("locations R1, R2").expect("locations"),
            ControlCommand::Change(ControlChange::Locations(vec!["R1".into(), "R2".into()]))
        );
        assert_eq!(parse_command("quit").expect("quit"), ControlCommand::Quit);
        assert_eq!(parse_command("refresh").expect("refresh"), ControlCommand::Refresh);
        assert!(matches!(parse_command("top many"), Err(AppError::Control(_))));
        assert!(matches!(parse_command("grain hourly"), Err(AppError::Control(_))));
        assert!(matches!(parse_command("dance"), Err(AppError::Control(_))));
    }
}
