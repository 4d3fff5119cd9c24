use {
    crate::{
        acquisition::controller::AcquisitionState,
        engine::DashboardViews,
        runtime::Snapshot,
        ui::renderer::{format_amount, format_percent, truncate},
    },
    ratatui::{
        layout::{Constraint, Direction, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        symbols::Marker,
        text::{Line, Span},
        widgets::{
            Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph,
            Row, Sparkline, Table, Wrap,
        },
        Frame,
    },
};

const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::Red,
    Color::LightCyan,
    Color::LightGreen,
];

/// Render the dashboard
///
/// `plotted` holds the jittered scatter coordinates, parallel to `views.points`.
pub fn render_layout(
    f: &mut Frame,
    area: Rect,
    snapshot: &Snapshot,
    plotted: &[(f64, f64)],
) -> Result<(), Box<dyn std::error::Error>> {
    let views = snapshot.views.as_ref();

    let chunks = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Header
            Constraint::Percentage(30), // Categories / buckets / daily
            Constraint::Percentage(35), // Scatter / anomalies
            Constraint::Min(0),         // Ranking / merchants
            Constraint::Length(3),      // Footer
        ])
        .split(area);

    render_header(f, chunks[0], &snapshot.state);

    let top = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(chunks[1]);
    render_categories_table(f, top[0], views);
    render_time_buckets(f, top[1], views);
    render_daily_trend(f, top[2], views);

    let middle = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[2]);
    render_scatter(f, middle[0], views, plotted);
    render_anomalies(f, middle[1], views);

    let bottom = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[3]);
    render_ranking_table(f, bottom[0], views);
    render_merchants_table(f, bottom[1], views);

    render_footer(f, chunks[4], views);

    Ok(())
}

fn state_style(state: &AcquisitionState) -> Style {
    let color = match state {
        AcquisitionState::Idle => Color::Gray,
        AcquisitionState::Loading { .. } | AcquisitionState::Retrying { .. } => Color::Yellow,
        AcquisitionState::Ready => Color::Green,
        AcquisitionState::Empty => Color::DarkGray,
        AcquisitionState::Failed { .. } => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn category_color(views: &DashboardViews, category: &str) -> Color {
    views
        .category_domain
        .iter()
        .position(|c| c == category)
        .map(|i| PALETTE[i % PALETTE.len()])
        .unwrap_or(Color::White)
}

fn render_header(f: &mut Frame, area: Rect, state: &AcquisitionState) {
    let header = Block::default()
        .borders(Borders::ALL)
        .title("SpendLens - Transaction Analytics");

    let hint = match state {
        AcquisitionState::Empty | AcquisitionState::Failed { .. } => "  press 'r' to try again",
        _ => "",
    };

    let text = vec![Line::from(vec![
        Span::styled("SpendLens", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(state.label(), state_style(state)),
        Span::styled(hint, Style::default().fg(Color::DarkGray)),
        Span::raw(" | r refresh  t ranking  c category  q quit"),
    ])];

    f.render_widget(Paragraph::new(text).block(header), area);
}

fn render_categories_table(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let header = Row::new(vec!["Category", "Total", "Count", "Share"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = views
        .categories
        .entries
        .iter()
        .map(|entry| {
            Row::new(vec![
                truncate(&entry.category, 16),
                format_amount(entry.total),
                entry.count.to_string(),
                format_percent(views.categories.share_of_total(entry)),
            ])
            .style(Style::default().fg(category_color(views, &entry.category)))
        })
        .collect();

    let widths = [
        Constraint::Length(16),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(7),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("By Category ({})", format_amount(views.categories.grand_total))),
    );

    f.render_widget(table, area);
}

fn render_time_buckets(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let bars: Vec<Bar> = views
        .time_buckets
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.total.max(0.0).round() as u64)
                .text_value(format_amount(b.total))
                .label(Line::from(b.bucket.as_str()))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Time of Day"))
        .data(BarGroup::default().bars(&bars))
        .bar_width(9)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_daily_trend(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let data: Vec<u64> = views
        .daily
        .iter()
        .map(|d| d.total.max(0.0).round() as u64)
        .collect();

    let title = match (views.daily.first(), views.daily.last()) {
        (Some(first), Some(last)) => format!("Daily ({} → {})", first.date, last.date),
        _ => "Daily".to_string(),
    };

    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .style(Style::default().fg(Color::Green));

    f.render_widget(sparkline, area);
}

fn render_scatter(f: &mut Frame, area: Rect, views: &DashboardViews, plotted: &[(f64, f64)]) {
    // One dataset per category, in domain order
    let mut series: Vec<(&str, Vec<(f64, f64)>)> = Vec::new();
    for (point, xy) in views.points.iter().zip(plotted) {
        match series.iter_mut().find(|(c, _)| *c == point.category) {
            Some((_, coords)) => coords.push(*xy),
            None => series.push((point.category.as_str(), vec![*xy])),
        }
    }

    let max_amount = views
        .points
        .iter()
        .map(|p| p.amount)
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let min_amount = views
        .points
        .iter()
        .map(|p| p.amount)
        .fold(0.0_f64, f64::min);

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(category, coords)| {
            Dataset::default()
                .name(category.to_string())
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(category_color(views, category)))
                .data(coords)
        })
        .collect();

    let title = match &views.category_filter {
        Some(category) => format!("Amount by Time of Day [{}]", category),
        None => "Amount by Time of Day [all]".to_string(),
    };

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title("hour")
                .bounds([0.0, 24.0])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw("6"),
                    Span::raw("12"),
                    Span::raw("18"),
                    Span::raw("24"),
                ]),
        )
        .y_axis(
            Axis::default()
                .bounds([min_amount, max_amount])
                .labels(vec![
                    Span::raw(format_amount(min_amount)),
                    Span::raw(format_amount(max_amount)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_anomalies(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let anomalies = &views.anomalies;

    let mut text = vec![Line::from(Span::styled(
        anomalies.explain(),
        Style::default().fg(if anomalies.count > 0 { Color::Red } else { Color::Green }),
    ))];

    for record in &anomalies.top {
        text.push(Line::from(vec![
            Span::styled(
                format!("{:>10} ", format_amount(record.amount)),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{} ", record.occurred_at.format("%Y-%m-%d %H:%M"))),
            Span::styled(
                truncate(&record.category, 14),
                Style::default().fg(category_color(views, &record.category)),
            ),
            Span::raw(format!(" {}", truncate(&record.merchant, 16))),
        ]));
    }

    for insight in views.patterns.insights() {
        text.push(Line::from(Span::styled(
            insight,
            Style::default().fg(Color::Yellow),
        )));
    }

    let block = Block::default().borders(Borders::ALL).title(format!(
        "Anomalies ({}) | Patterns ({})",
        anomalies.count,
        views.patterns.flag_count()
    ));

    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_ranking_table(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let header = Row::new(vec!["#", "Date", "Amount", "Category", "Merchant"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = views
        .ranking
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let record = &entry.record;
            Row::new(vec![
                (i + 1).to_string(),
                record.occurred_at.format("%Y-%m-%d %H:%M").to_string(),
                format_amount(record.amount),
                truncate(&record.category, 14),
                truncate(&record.merchant, 20),
            ])
            .style(Style::default().fg(category_color(views, &record.category)))
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Length(17),
        Constraint::Length(11),
        Constraint::Length(14),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("{} Transactions", views.ranking_direction.as_str())),
    );

    f.render_widget(table, area);
}

fn render_merchants_table(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let header = Row::new(vec!["Merchant", "Total", "Count"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = views
        .merchants
        .iter()
        .map(|m| {
            Row::new(vec![
                truncate(&m.merchant, 20),
                format_amount(m.total),
                m.count.to_string(),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(12),
        Constraint::Length(11),
        Constraint::Length(6),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Top Merchants"));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, views: &DashboardViews) {
    let summary = &views.summary;

    let text = vec![Line::from(vec![
        Span::styled("Transactions: ", Style::default().fg(Color::Cyan)),
        Span::raw(summary.num_transactions.to_string()),
        Span::raw(" | "),
        Span::styled("Spending: ", Style::default().fg(Color::Cyan)),
        Span::raw(format_amount(summary.total_spending)),
        Span::raw(" | "),
        Span::styled("Income: ", Style::default().fg(Color::Cyan)),
        Span::raw(format_amount(summary.total_income)),
        Span::raw(" | "),
        Span::styled("Net: ", Style::default().fg(Color::Cyan)),
        Span::styled(
            format_amount(summary.net),
            Style::default().fg(if summary.net < 0.0 { Color::Red } else { Color::Green }),
        ),
        Span::raw(" | "),
        Span::styled("Avg: ", Style::default().fg(Color::Cyan)),
        Span::raw(format_amount(summary.avg_transaction)),
    ])];

    let footer = Block::default().borders(Borders::ALL).title("Summary");

    f.render_widget(Paragraph::new(text).block(footer), area);
}
