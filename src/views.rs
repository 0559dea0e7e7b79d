// Dashboard view models and their text rendering.
//
// `build_dashboard` turns a session into plain data (cards, ranking rows,
// pie slices, matrices) using only engine queries; the `render_*` functions
// format that data and never aggregate anything themselves.
use crate::cli::View;
use crate::config::DisplayConfig;
use crate::engine;
use crate::error::EngineResult;
use crate::session::Session;
use crate::trend::{SyntheticTrend, Trend, TrendSource};
use crate::loader::LoadReport;
use crate::types::{OfficeRankingRow, ServiceRankingRow, SummaryStats};
use crate::util::{bar, format_change, format_int, format_number, shade};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::Table;

pub const TITLE: &str = "Retirement Planning Consultation Services";
const OTHERS: &str = "Others";

#[derive(Debug, Clone, Serialize)]
pub struct MetricCard {
    pub title: String,
    pub value: f64,
    pub trend: Trend,
    pub footnote: String,
    /// Top services, shown on the top-service card only.
    pub highlights: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieSlice {
    pub label: String,
    pub count: u64,
    pub share: f64,
}

/// Office-by-service cross-tab used by the bar chart and the heatmap.
#[derive(Debug, Clone, Serialize)]
pub struct Matrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<u64>>,
}

impl Matrix {
    fn build(session: &Session, rows: Vec<String>, columns: Vec<String>) -> EngineResult<Self> {
        let values = engine::regional_matrix(&session.view, rows.as_slice(), columns.as_slice())?;
        Ok(Self {
            rows,
            columns,
            values,
        })
    }

    pub fn max(&self) -> u64 {
        self.values.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub title: String,
    pub reference_date: String,
    pub region: String,
    pub sort_key: String,
    pub notices: Vec<String>,
    pub cards: Vec<MetricCard>,
    pub ranking: Vec<ServiceRankingRow>,
    pub distribution: Vec<PieSlice>,
    pub office_ranking: Vec<OfficeRankingRow>,
    pub regional: Matrix,
    pub heatmap: Matrix,
}

pub fn build_dashboard(
    session: &Session,
    display: &DisplayConfig,
    total_column: &str,
    trends: &dyn TrendSource,
) -> EngineResult<Dashboard> {
    let sort_key = &session.controls.sort_key;
    let (office_ranking, regional) = regional_view(session, display)?;

    Ok(Dashboard {
        title: TITLE.to_string(),
        reference_date: session.controls.reference_date.format("%Y.%m.%d").to_string(),
        region: session.controls.region.label().to_string(),
        sort_key: sort_key.label(total_column).to_string(),
        notices: session.notices.clone(),
        cards: overview_cards(session, display, trends)?,
        ranking: service_ranking(session, display.ranking_rows)?,
        distribution: distribution(session, display.pie_slices)?,
        office_ranking,
        regional,
        heatmap: heatmap(session, display)?,
    })
}

/// Four headline cards: total, office count, average, top service.
pub fn overview_cards(
    session: &Session,
    display: &DisplayConfig,
    trends: &dyn TrendSource,
) -> EngineResult<Vec<MetricCard>> {
    let data = &session.view;
    let total = engine::total_across_offices(data)? as f64;
    let avg = engine::average_per_office(data)?;
    let offices = data.office_count() as f64;
    let top = engine::top_categories(data, display.card_services)?;
    let (top_name, top_count) = top.first().cloned().unwrap_or_default();
    let top_count = top_count as f64;

    // Whole consultations per office, as displayed on the card.
    let avg_whole = avg.trunc();

    Ok(vec![
        MetricCard {
            title: "Total consultations".to_string(),
            value: total,
            trend: trends.trend(total)?,
            footnote: format!("Average per office: {}", format_number(avg, 0)),
            highlights: Vec::new(),
        },
        MetricCard {
            title: "Offices".to_string(),
            value: offices,
            trend: SyntheticTrend::flat().trend(offices)?,
            footnote: format!("{} services tracked", data.categories().len()),
            highlights: Vec::new(),
        },
        MetricCard {
            title: "Average per office".to_string(),
            value: avg_whole,
            trend: trends.trend(avg_whole)?,
            footnote: format!("Exact: {}", format_number(avg, 2)),
            highlights: Vec::new(),
        },
        MetricCard {
            title: "Top service".to_string(),
            value: top_count,
            trend: trends.trend(top_count)?,
            footnote: format!(
                "{}: {} per office",
                top_name,
                format_number(top_count / offices, 0)
            ),
            highlights: top,
        },
    ])
}

pub fn service_ranking(session: &Session, rows: usize) -> EngineResult<Vec<ServiceRankingRow>> {
    let data = &session.view;
    engine::top_categories(data, rows)?
        .into_iter()
        .enumerate()
        .map(|(i, (service, count))| {
            let share = engine::category_percentage(data, &service)?;
            Ok(ServiceRankingRow {
                rank: i + 1,
                service,
                count,
                share: format!("{:.1}%", share),
            })
        })
        .collect()
}

/// Top services as pie slices; the rest is folded into one "Others" slice
/// so the shares are global percentages and add up to 100.
pub fn distribution(session: &Session, slices: usize) -> EngineResult<Vec<PieSlice>> {
    let data = &session.view;
    let grand = engine::category_totals(data).grand_total();
    let mut out = engine::top_categories(data, slices)?
        .into_iter()
        .map(|(label, count)| {
            let share = engine::category_percentage(data, &label)?;
            Ok(PieSlice {
                label,
                count,
                share,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let shown: u64 = out.iter().map(|s| s.count).sum();
    let rest = grand - shown;
    if rest > 0 {
        out.push(PieSlice {
            label: OTHERS.to_string(),
            count: rest,
            share: engine::percentage(rest, grand),
        });
    }
    Ok(out)
}

/// Top-N offices by the session's sort key against the leading services.
pub fn regional_view(
    session: &Session,
    display: &DisplayConfig,
) -> EngineResult<(Vec<OfficeRankingRow>, Matrix)> {
    let data = &session.view;
    let key = &session.controls.sort_key;
    let offices = engine::top_offices_by(data, key, session.controls.top_n)?;

    let ranking = offices
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(OfficeRankingRow {
                rank: i + 1,
                office: r.office_name.clone(),
                sort_value: engine::sort_value(data, r, key)?,
                total: r.total,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let rows = offices.into_iter().map(|r| r.office_name).collect();
    let columns = category_names(session, display.bar_categories)?;
    Ok((ranking, Matrix::build(session, rows, columns)?))
}

/// Busiest offices by total against the leading services.
pub fn heatmap(session: &Session, display: &DisplayConfig) -> EngineResult<Matrix> {
    let rows = engine::top_offices(&session.view, display.heatmap_offices)?
        .into_iter()
        .map(|r| r.office_name)
        .collect();
    let columns = category_names(session, display.heatmap_categories)?;
    Matrix::build(session, rows, columns)
}

fn category_names(session: &Session, n: usize) -> EngineResult<Vec<String>> {
    Ok(engine::top_categories(&session.view, n)?
        .into_iter()
        .map(|(c, _)| c)
        .collect())
}

/// Headline figures for `summary.json`.
pub fn summary_stats(
    session: &Session,
    report: &LoadReport,
    trends: &dyn TrendSource,
) -> EngineResult<SummaryStats> {
    let data = &session.view;
    let top = engine::top_categories(data, 1)?.into_iter().next();
    Ok(SummaryStats {
        reference_date: session.controls.reference_date.format("%Y-%m-%d").to_string(),
        source: report.source.display().to_string(),
        encoding: report.encoding.to_string(),
        region: session.controls.region.label().to_string(),
        total_offices: data.office_count(),
        total_categories: data.categories().len(),
        total_consultations: engine::total_across_offices(data)?,
        avg_per_office: engine::average_per_office(data)?,
        top_service_count: top.as_ref().map(|(_, n)| *n).unwrap_or(0),
        top_service: top.map(|(c, _)| c),
        inconsistent_rows: data.inconsistent_rows(),
        trends_are_synthetic: trends.is_synthetic(),
    })
}

pub fn render_text(dashboard: &Dashboard, view: View, bar_width: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", dashboard.title));
    out.push_str(&format!(
        "As of {} | Region: {}\n",
        dashboard.reference_date, dashboard.region
    ));
    for n in &dashboard.notices {
        out.push_str(&format!("Note: {}\n", n));
    }
    out.push('\n');

    if view.includes(View::Overview) {
        out.push_str(&render_cards(&dashboard.cards));
        out.push_str("\nService Ranking\n\n");
        out.push_str(&Table::new(&dashboard.ranking).with(Style::markdown()).to_string());
        out.push_str("\n\nService Distribution\n\n");
        out.push_str(&render_distribution(&dashboard.distribution, bar_width));
        out.push_str("\n\n");
    }
    if view.includes(View::Regional) {
        out.push_str(&format!(
            "Regional Services (top {} offices by {})\n\n",
            dashboard.office_ranking.len(),
            dashboard.sort_key
        ));
        out.push_str(&render_grouped_bars(&dashboard.regional, bar_width));
        out.push_str("\n\n");
    }
    if view.includes(View::Heatmap) {
        out.push_str("Office x Service Heatmap\n\n");
        out.push_str(&render_heatmap(&dashboard.heatmap));
        out.push_str("\n\n");
    }
    out
}

fn render_cards(cards: &[MetricCard]) -> String {
    let mut b = Builder::default();
    b.push_record(["Metric", "Current", "vs Prior", "vs Plan", "Note"]);
    for c in cards {
        b.push_record([
            c.title.clone(),
            format_number(c.value, 0),
            format_change(c.trend.mom_change_pct),
            format_change(c.trend.plan_change_pct),
            c.footnote.clone(),
        ]);
    }
    let mut table = b.build();
    table.with(Style::markdown());

    let mut out = table.to_string();
    out.push('\n');
    if cards.iter().any(|c| c.trend.is_synthetic) {
        out.push_str("(vs Prior / vs Plan are synthetic estimates, not measured history)\n");
    }
    if let Some(card) = cards.iter().find(|c| !c.highlights.is_empty()) {
        let list: Vec<String> = card
            .highlights
            .iter()
            .map(|(name, n)| format!("{} ({})", name, format_int(*n)))
            .collect();
        out.push_str(&format!(
            "Top {} services: {}\n",
            card.highlights.len(),
            list.join(", ")
        ));
    }
    out
}

fn render_distribution(slices: &[PieSlice], width: usize) -> String {
    let mut b = Builder::default();
    b.push_record(["Service", "Share", "", "Count"]);
    for s in slices {
        let cells = (s.share / 100.0 * width as f64).round() as u64;
        b.push_record([
            s.label.clone(),
            format!("{:.1}%", s.share),
            bar(cells, width as u64, width),
            format_int(s.count),
        ]);
    }
    let mut table = b.build();
    table.with(Style::markdown());
    table.to_string()
}

fn render_grouped_bars(m: &Matrix, width: usize) -> String {
    let max = m.max();
    let mut b = Builder::default();
    b.push_record(["Office", "Service", "", "Count"]);
    for (office, row) in m.rows.iter().zip(&m.values) {
        for (j, (service, v)) in m.columns.iter().zip(row).enumerate() {
            let label = if j == 0 { office.clone() } else { String::new() };
            b.push_record([label, service.clone(), bar(*v, max, width), format_int(*v)]);
        }
    }
    let mut table = b.build();
    table.with(Style::markdown());
    table.to_string()
}

fn render_heatmap(m: &Matrix) -> String {
    let max = m.max();
    let mut b = Builder::default();
    let mut header = vec!["Office".to_string()];
    header.extend(m.columns.iter().cloned());
    b.push_record(header);
    for (office, row) in m.rows.iter().zip(&m.values) {
        let mut record = vec![office.clone()];
        record.extend(row.iter().map(|v| format!("{} {}", shade(*v, max), format_int(*v))));
        b.push_record(record);
    }
    let mut table = b.build();
    table.with(Style::markdown());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::sample;
    use crate::session::Controls;
    use crate::types::{Dataset, OfficeRecord, RegionFilter, SortKey};
    use chrono::NaiveDate;

    fn session_for(dataset: Dataset, top_n: usize, sort_key: SortKey) -> Session {
        Session::resolve(
            dataset,
            Controls {
                region: RegionFilter::All,
                reference_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                top_n,
                sort_key,
            },
        )
    }

    fn wide() -> Dataset {
        let cats: Vec<String> = (1..=10).map(|i| format!("s{}", i)).collect();
        let records = (1..=6)
            .map(|o| {
                let counts: Vec<u64> = (1..=10).map(|c| (c * o) as u64).collect();
                let total = counts.iter().sum();
                OfficeRecord::new(format!("office{}", o), counts, total)
            })
            .collect();
        Dataset::new(cats, records).unwrap()
    }

    #[test]
    fn test_overview_cards() {
        let s = session_for(sample(), 5, SortKey::Total);
        let cards = overview_cards(&s, &DisplayConfig::default(), &SyntheticTrend::default()).unwrap();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].value, 65.0);
        assert_eq!(cards[1].value, 3.0);
        assert_eq!(cards[1].trend.mom_change_pct, 0.0);
        assert_eq!(cards[2].value, 21.0);
        assert_eq!(cards[3].value, 35.0);
        assert_eq!(cards[3].highlights[0], ("svc2".to_string(), 35));
        assert!(cards[3].footnote.starts_with("svc2"));
    }

    #[test]
    fn test_cards_refuse_empty_dataset() {
        let empty = Dataset::new(vec!["svc1".to_string()], vec![]).unwrap();
        let s = session_for(empty, 5, SortKey::Total);
        let err = overview_cards(&s, &DisplayConfig::default(), &SyntheticTrend::default()).unwrap_err();
        assert_eq!(err, crate::error::EngineError::EmptyDataset);
    }

    #[test]
    fn test_service_ranking_rows() {
        let s = session_for(sample(), 5, SortKey::Total);
        let rows = service_ranking(&s, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].service, "svc2");
        assert_eq!(rows[0].share, "53.8%");
        assert_eq!(rows[1].share, "46.2%");
    }

    #[test]
    fn test_distribution_folds_remainder() {
        let s = session_for(wide(), 5, SortKey::Total);
        let slices = distribution(&s, 8).unwrap();
        assert_eq!(slices.len(), 9);
        assert_eq!(slices.last().unwrap().label, "Others");
        let total: f64 = slices.iter().map(|s| s.share).sum();
        assert!((total - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_distribution_without_remainder() {
        let s = session_for(sample(), 5, SortKey::Total);
        let slices = distribution(&s, 8).unwrap();
        assert_eq!(slices.len(), 2);
        assert!(slices.iter().all(|s| s.label != "Others"));
    }

    #[test]
    fn test_regional_view_uses_sort_key() {
        let s = session_for(sample(), 5, SortKey::Category("svc1".to_string()));
        let (ranking, m) = regional_view(&s, &DisplayConfig::default()).unwrap();
        assert_eq!(ranking[0].office, "B");
        assert_eq!(ranking[0].sort_value, 20);
        assert_eq!(m.rows, vec!["B", "A", "C"]);
        assert_eq!(m.columns, vec!["svc2", "svc1"]);
        assert_eq!(m.values[0], vec![0, 20]);
    }

    #[test]
    fn test_heatmap_dimensions() {
        let s = session_for(wide(), 5, SortKey::Total);
        let mut display = DisplayConfig::default();
        display.heatmap_offices = 4;
        display.heatmap_categories = 3;
        let m = heatmap(&s, &display).unwrap();
        assert_eq!(m.rows.len(), 4);
        assert_eq!(m.columns, vec!["s10", "s9", "s8"]);
        assert!(m.values.iter().all(|r| r.len() == 3));
        assert_eq!(m.rows[0], "office6");
        assert_eq!(m.max(), 60);
    }

    #[test]
    fn test_summary_stats() {
        let s = session_for(sample(), 5, SortKey::Total);
        let report = LoadReport {
            source: std::path::PathBuf::from("offices.csv"),
            encoding: "UTF-8",
            rows: 3,
            categories: 2,
            inconsistent_rows: 0,
        };
        let stats = summary_stats(&s, &report, &SyntheticTrend::default()).unwrap();
        assert_eq!(stats.total_consultations, 65);
        assert_eq!(stats.top_service.as_deref(), Some("svc2"));
        assert_eq!(stats.top_service_count, 35);
        assert_eq!(stats.reference_date, "2023-12-31");
        assert!(stats.trends_are_synthetic);
    }

    #[test]
    fn test_render_text_sections() {
        let s = session_for(sample(), 5, SortKey::Total);
        let d = build_dashboard(&s, &DisplayConfig::default(), "합계", &SyntheticTrend::default()).unwrap();
        assert_eq!(d.sort_key, "합계");
        assert_eq!(d.reference_date, "2023.12.31");

        let all = render_text(&d, View::All, 20);
        assert!(all.contains("Service Ranking"));
        assert!(all.contains("Regional Services"));
        assert!(all.contains("Heatmap"));
        assert!(all.contains("synthetic"));

        let overview = render_text(&d, View::Overview, 20);
        assert!(overview.contains("Total consultations"));
        assert!(!overview.contains("Heatmap"));
    }
}
