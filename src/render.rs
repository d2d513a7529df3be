//! Terminal rendering of dashboard views.

use crate::errors::AppResult;
use crate::models::{ChartKind, ChartSpec, DashboardView, InsightKind, SectionView, TableView};
use std::fmt::Write;

/// Points printed per chart series before the rest are summarized.
pub const MAX_SERIES_POINTS: usize = 8;

pub fn render_json(view: &DashboardView) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

pub fn render_text(view: &DashboardView) -> String {
    let mut out = String::new();
    let locations = view
        .controls
        .selected_locations
        .as_ref()
        .map(|ids| ids.join(","))
        .unwrap_or_else(|| "default".to_string());
    let _ = writeln!(
        out,
        "Gold Dashboard  render={}  at={}  top={}  grain={}  locations={}",
        view.render_id,
        view.rendered_at.format("%Y-%m-%d %H:%M:%S UTC"),
        view.controls.top_n,
        view.controls.time_grain.as_str(),
        locations
    );
    for section in &view.sections {
        out.push('\n');
        out.push_str(&render_section(section));
    }
    out
}

pub fn render_section(section: &SectionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", section.title);

    for metric in &section.metrics {
        let _ = write!(out, "  {}: {}", metric.label, metric.value);
        if let Some(delta) = &metric.delta {
            let _ = write!(out, " ({})", delta);
        }
        if let Some(help) = &metric.help {
            let _ = write!(out, "  [{}]", help);
        }
        out.push('\n');
    }
    for chart in &section.charts {
        render_chart(&mut out, chart);
    }
    for table in &section.tables {
        render_table(&mut out, table);
    }
    for insight in &section.insights {
        let label = match insight.kind {
            InsightKind::EmptyState => "Note",
            _ => "Insight",
        };
        let _ = writeln!(out, "  {}: {}", label, insight.text);
    }
    out
}

fn chart_label(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::Bar => "bar",
        ChartKind::Line => "line",
        ChartKind::Pie => "pie",
        ChartKind::Histogram => "histogram",
        ChartKind::Scatter => "scatter",
    }
}

fn render_chart(out: &mut String, chart: &ChartSpec) {
    let _ = writeln!(
        out,
        "  [{}] {} (x: {}, y: {})",
        chart_label(chart.kind),
        chart.title,
        chart.x_label,
        chart.y_label
    );
    if chart.series.iter().all(|series| series.points.is_empty()) {
        let _ = writeln!(out, "    (no data)");
        return;
    }
    for series in &chart.series {
        let shown = series
            .points
            .iter()
            .take(MAX_SERIES_POINTS)
            .map(|point| match point.size {
                Some(size) => format!("{}={:.2} (size {:.0})", point.x, point.y, size),
                None => format!("{}={:.2}", point.x, point.y),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "    {}: {}", series.name, shown);
        if series.points.len() > MAX_SERIES_POINTS {
            let _ = write!(out, ", ... (+{} more)", series.points.len() - MAX_SERIES_POINTS);
        }
        out.push('\n');
    }
}

fn render_table(out: &mut String, table: &TableView) {
    let _ = writeln!(out, "  {}", table.title);
    if table.rows.is_empty() {
        let _ = writeln!(out, "    {}", table.empty_message);
        return;
    }

    let mut widths = table.columns.iter().map(|column| column.chars().count()).collect::<Vec<_>>();
    for row in &table.rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{:<width$}", cell, width = widths.get(index).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    let _ = writeln!(out, "    {}", line(table.columns.as_slice()).trim_end());
    let _ = writeln!(
        out,
        "    {}",
        widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>().join("-+-")
    );
    for row in &table.rows {
        let _ = writeln!(out, "    {}", line(row.as_slice()).trim_end());
    }
}
