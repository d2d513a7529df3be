pub mod churn;
pub mod clv;
pub mod discount;
pub mod locations;
pub mod loyalty;
pub mod sales_trends;
pub mod segmentation;

use crate::decode;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ControlKey, CustomerRecord, DashboardControls, DiscountRecord, GoldTable, Insight, InsightKind,
    LocationSalesRecord, LoyaltyRecord, RollingMetric, SectionId, SectionView,
};
use crate::warehouse::Table;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One independently rendered block of the dashboard.
///
/// Sections declare the gold tables they read and the controls they react to;
/// the driver uses both to decide what to load and what to recompute.
pub trait ReportSection: Send + Sync {
    fn id(&self) -> SectionId;
    fn tables(&self) -> &'static [GoldTable];
    fn controls(&self) -> &'static [ControlKey] {
        &[]
    }
    fn render(&self, inputs: &ReportInputs, controls: &DashboardControls) -> AppResult<SectionView>;
}

/// Sections in page order.
pub fn all_sections(default_location_count: usize) -> Vec<Box<dyn ReportSection>> {
    vec![
        Box::new(clv::ClvSection),
        Box::new(segmentation::SegmentationSection),
        Box::new(churn::ChurnSection),
        Box::new(sales_trends::SalesTrendsSection { default_location_count }),
        Box::new(locations::LocationPerformanceSection),
        Box::new(loyalty::LoyaltySection),
        Box::new(discount::DiscountSection),
    ]
}

/// Normalized tables handed to a section render.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    tables: HashMap<GoldTable, Arc<Table>>,
}

impl ReportInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: GoldTable, data: Arc<Table>) {
        self.tables.insert(table, data);
    }

    pub fn with(mut self, table: GoldTable, data: Table) -> Self {
        self.insert(table, Arc::new(data));
        self
    }

    pub fn table(&self, table: GoldTable) -> AppResult<&Table> {
        self.tables
            .get(&table)
            .map(|data| data.as_ref())
            .ok_or_else(|| AppError::Internal(format!("table '{}' was not loaded", table.as_str())))
    }

    pub fn customers(&self) -> AppResult<Vec<CustomerRecord>> {
        decode::decode_customers(self.table(GoldTable::CustomerIntelligence)?)
    }

    pub fn rolling_metrics(&self) -> AppResult<Vec<RollingMetric>> {
        decode::decode_rolling_metrics(self.table(GoldTable::CustomerRollingMetrics)?)
    }

    pub fn location_sales(&self) -> AppResult<Vec<LocationSalesRecord>> {
        decode::decode_location_sales(self.table(GoldTable::LocationSalesTrends)?)
    }

    pub fn loyalty(&self) -> AppResult<Vec<LoyaltyRecord>> {
        decode::decode_loyalty(self.table(GoldTable::LoyaltyRoiAnalysis)?)
    }

    pub fn discounts(&self) -> AppResult<Vec<DiscountRecord>> {
        decode::decode_discounts(self.table(GoldTable::DiscountEffectiveness)?)
    }
}

pub(crate) fn insight(kind: InsightKind, values: &[(&str, f64)], text: String) -> Insight {
    Insight {
        kind,
        values: values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect::<BTreeMap<_, _>>(),
        text,
    }
}

pub(crate) fn empty_state(text: impl Into<String>) -> Insight {
    insight(InsightKind::EmptyState, &[], text.into())
}
