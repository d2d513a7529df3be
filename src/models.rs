use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_TOP_N: u32 = 5;
pub const MAX_TOP_N: u32 = 100;
pub const DEFAULT_TOP_N: u32 = 20;
pub const DEFAULT_LOCATION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldTable {
    CustomerIntelligence,
    CustomerRollingMetrics,
    LocationSalesTrends,
    LoyaltyRoiAnalysis,
    DiscountEffectiveness,
}

impl GoldTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CustomerIntelligence => "customer_intelligence",
            Self::CustomerRollingMetrics => "customer_rolling_metrics",
            Self::LocationSalesTrends => "location_sales_trends",
            Self::LoyaltyRoiAnalysis => "loyalty_roi_analysis",
            Self::DiscountEffectiveness => "discount_effectiveness",
        }
    }

    /// Columns coerced to `f64` right after the table is fetched.
    pub fn numeric_columns(self) -> &'static [&'static str] {
        match self {
            Self::CustomerIntelligence => &[
                "current_clv",
                "monetary_value",
                "frequency",
                "recency",
                "avg_gap_between_orders",
                "avg_spend_change_pct",
            ],
            Self::CustomerRollingMetrics => &["running_clv"],
            Self::LocationSalesTrends => &["daily_revenue", "daily_order_count"],
            Self::LoyaltyRoiAnalysis => &[
                "avg_order_value",
                "repeat_order_rate",
                "total_lifetime_value",
                "total_customers",
            ],
            Self::DiscountEffectiveness => &["order_count", "total_revenue", "avg_order_value"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClvTier {
    High,
    Medium,
    Low,
}

impl ClvTier {
    pub const ALL: [ClvTier; 3] = [ClvTier::High, ClvTier::Medium, ClvTier::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::High => "#00CC96",
            Self::Medium => "#636EFA",
            Self::Low => "#EF553B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "VIP")]
    Vip,
    #[serde(rename = "New Customer")]
    NewCustomer,
    #[serde(rename = "Churn Risk")]
    ChurnRisk,
    #[serde(rename = "Standard")]
    Standard,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::Vip,
        Segment::NewCustomer,
        Segment::ChurnRisk,
        Segment::Standard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vip => "VIP",
            Self::NewCustomer => "New Customer",
            Self::ChurnRisk => "Churn Risk",
            Self::Standard => "Standard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vip" => Some(Self::Vip),
            "new customer" => Some(Self::NewCustomer),
            "churn risk" => Some(Self::ChurnRisk),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Vip => "High Recency, Frequency, and Monetary scores (>=4)",
            Self::NewCustomer => "High Recency (>=4) but Low Frequency (<=2)",
            Self::ChurnRisk => "Low Recency (<=2) and Low Frequency (<=2)",
            Self::Standard => "Mid-range RFM scores (=3)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoyaltyStatus {
    #[serde(rename = "Loyalty Member")]
    Member,
    #[serde(rename = "Non-Member")]
    NonMember,
}

impl LoyaltyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "Loyalty Member",
            Self::NonMember => "Non-Member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountStatus {
    Discounted,
    #[serde(rename = "Full Price")]
    FullPrice,
}

impl DiscountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discounted => "Discounted",
            Self::FullPrice => "Full Price",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "discounted" | "discount" | "true" | "1" => Some(Self::Discounted),
            "fullprice" | "full" | "nodiscount" | "false" | "0" => Some(Self::FullPrice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeGrain {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TimeGrain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Some(Self::Daily),
            "weekly" | "w" => Some(Self::Weekly),
            "monthly" | "m" => Some(Self::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub user_id: String,
    pub current_clv: f64,
    pub clv_tier: Option<ClvTier>,
    pub segment: Option<Segment>,
    pub recency: f64,
    pub frequency: f64,
    pub monetary_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingMetric {
    pub user_id: String,
    pub order_date: NaiveDate,
    pub running_clv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSalesRecord {
    pub restaurant_id: String,
    pub order_date: NaiveDate,
    pub item_category: String,
    pub daily_revenue: f64,
    pub daily_order_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyRecord {
    pub status: LoyaltyStatus,
    pub avg_order_value: f64,
    pub repeat_order_rate: f64,
    pub total_lifetime_value: f64,
    pub total_customers: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRecord {
    pub status: DiscountStatus,
    pub order_count: f64,
    pub total_revenue: f64,
    pub avg_order_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKey {
    TopN,
    TimeGrain,
    Locations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardControls {
    pub top_n: u32,
    pub time_grain: TimeGrain,
    /// `None` selects the first few restaurants in first-seen order.
    pub selected_locations: Option<Vec<String>>,
}

impl Default for DashboardControls {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            time_grain: TimeGrain::Daily,
            selected_locations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "control", content = "value")]
pub enum ControlChange {
    TopN(u32),
    TimeGrain(TimeGrain),
    Locations(Vec<String>),
}

impl ControlChange {
    pub fn key(&self) -> ControlKey {
        match self {
            Self::TopN(_) => ControlKey::TopN,
            Self::TimeGrain(_) => ControlKey::TimeGrain,
            Self::Locations(_) => ControlKey::Locations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionId {
    Clv,
    Segmentation,
    Churn,
    SalesTrends,
    LocationPerformance,
    Loyalty,
    DiscountEffectiveness,
}

impl SectionId {
    pub fn title(self) -> &'static str {
        match self {
            Self::Clv => "1. Customer Lifetime Value (CLV)",
            Self::Segmentation => "2. Customer Segmentation & Behavior",
            Self::Churn => "3. Churn Indicators",
            Self::SalesTrends => "4. Sales Trends Monitoring",
            Self::LocationPerformance => "5. Top-Performing Locations",
            Self::Loyalty => "6. Loyalty Program Impact",
            Self::DiscountEffectiveness => "7. Pricing & Discount Effectiveness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Histogram,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Date(NaiveDate),
    Number(f64),
    Category(String),
}

impl std::fmt::Display for AxisValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date),
            Self::Number(value) => write!(f, "{:.2}", value),
            Self::Category(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub x: AxisValue,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub key: String,
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl MetricCard {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            delta: None,
            help: None,
        }
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Shown in place of the table when `rows` is empty.
    pub empty_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightKind {
    ClvTrend,
    ChurnRiskShare,
    HighTierInactivity,
    LocationCoverage,
    TopLocation,
    LocationEfficiency,
    LoyaltyAov,
    LoyaltyLtv,
    DiscountLift,
    EmptyState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub kind: InsightKind,
    pub values: BTreeMap<String, f64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub section: SectionId,
    pub title: String,
    pub metrics: Vec<MetricCard>,
    pub charts: Vec<ChartSpec>,
    pub tables: Vec<TableView>,
    pub insights: Vec<Insight>,
}

impl SectionView {
    pub fn new(section: SectionId) -> Self {
        Self {
            section,
            title: section.title().to_string(),
            metrics: Vec::new(),
            charts: Vec::new(),
            tables: Vec::new(),
            insights: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub render_id: String,
    pub rendered_at: DateTime<Utc>,
    pub controls: DashboardControls,
    pub sections: Vec<SectionView>,
}
