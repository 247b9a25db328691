//! HTML page served at `/`

use std::fmt::Write;

use super::text::{direction_arrow, format_time};
use super::RenderFrame;
use crate::pyramid::{Direction, ProgressStatus, RenderedNode};

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn direction_class(dir: Direction) -> &'static str {
    match dir {
        Direction::Up => "green",
        Direction::Down => "red",
        Direction::Neutral => "gray",
    }
}

fn write_block(out: &mut String, node: &RenderedNode) {
    let mut classes = vec!["block", node.tf.as_str(), direction_class(node.dir)];
    if !node.own_timeframe_visible {
        classes.push("container");
    }
    if node.expanded {
        classes.push("expanded");
    }

    let _ = write!(
        out,
        r#"<div class="{}" data-id="{}"><div class="block-header">"#,
        classes.join(" "),
        escape(node.id.as_str())
    );
    if node.has_children() {
        let _ = write!(
            out,
            r#"<span class="toggle">{}</span>"#,
            if node.expanded { "▾" } else { "▸" }
        );
    }
    let _ = write!(
        out,
        r#"<span class="tf">{}</span><span class="time">{}</span>"#,
        node.tf,
        escape(&format_time(&node.time))
    );

    let _ = write!(out, r#"<span class="dir">{}</span>"#, direction_arrow(node.dir));
    if let Some(size) = node.range_size {
        let _ = write!(out, r#"<span class="range">{}</span>"#, size);
    }
    if let Some(progress) = node.progress {
        let state = match progress.status {
            Some(ProgressStatus::Complete) => "complete",
            Some(ProgressStatus::Partial) => "partial",
            None => "pending",
        };
        let _ = write!(
            out,
            r#"<span class="progress {}">{}/{}</span>"#,
            state, progress.completed, progress.total
        );
    }
    if let Some(summary) = &node.momentum_summary {
        let _ = write!(out, r#"<span class="momentum">{}</span>"#, escape(summary));
    }
    out.push_str("</div>");

    if !node.shown_children().is_empty() {
        out.push_str(r#"<div class="children">"#);
        for child in node.shown_children() {
            write_block(out, child);
        }
        out.push_str("</div>");
    }
    out.push_str("</div>");
}

/// Full dashboard page; refreshes itself at the current polling cadence
pub fn render_html(frame: &RenderFrame) -> String {
    let mut blocks = String::new();
    if frame.tree.is_empty() {
        blocks.push_str(r#"<div class="placeholder">Loading market data...</div>"#);
    }
    for node in &frame.tree.roots {
        write_block(&mut blocks, node);
    }

    let mut strengths = String::new();
    for s in &frame.strengths {
        let class = s.class().as_str();
        let _ = write!(
            strengths,
            r#"<div class="strength-item"><span class="tf">{tf}</span><span class="strength-fill {class}" style="width: {pct}%"></span><span class="strength-value {class}">{pct}%</span></div>"#,
            tf = s.tf,
            class = class,
            pct = s.percent()
        );
    }

    let mut alerts = String::new();
    for alert in frame.active_alerts() {
        let _ = write!(
            alerts,
            r#"<li class="alert {}">{}</li>"#,
            alert.priority.as_str(),
            escape(&alert.message)
        );
    }

    let refresh_secs = (frame.polling.current_interval_ms / 1000).max(1);

    format!(
        r##"<!DOCTYPE html>
<html>
<head>
    <title>{pair} - Flowz Dashboard</title>
    <meta http-equiv="refresh" content="{refresh_secs}">
    <style>
        :root {{
            --bg-dark: #0d0d12;
            --bg-panel: #16161f;
            --border: #2a2a3a;
            --text-primary: #e6e6e6;
            --text-secondary: #9494a8;
            --up: #00c2a2;
            --down: #ff3b69;
        }}
        body {{ background: var(--bg-dark); color: var(--text-primary); font-family: sans-serif; margin: 0; }}
        .app-header {{ background: var(--bg-panel); border-bottom: 1px solid var(--border); padding: 12px 20px; display: flex; justify-content: space-between; }}
        .status-detail, .polling {{ color: var(--text-secondary); font-size: 12px; }}
        .offline {{ color: var(--down); font-weight: 600; }}
        .pyramid {{ padding: 20px; font-family: monospace; }}
        .block {{ margin: 2px 0; }}
        .block-header span {{ margin-right: 10px; }}
        .children {{ margin-left: 24px; border-left: 1px solid var(--border); padding-left: 8px; }}
        .green .dir {{ color: var(--up); }}
        .red .dir {{ color: var(--down); }}
        .gray .dir, .container .tf {{ color: var(--text-secondary); }}
        .progress.complete {{ color: var(--up); }}
        .strengths {{ padding: 0 20px; font-family: monospace; }}
        .strength-fill {{ display: inline-block; height: 8px; margin-right: 10px; }}
        .strong {{ color: var(--up); background: var(--up); }}
        .weak {{ color: var(--down); background: var(--down); }}
        .moderate {{ color: var(--text-secondary); background: var(--text-secondary); }}
        .strength-value {{ background: none; }}
    </style>
</head>
<body>
    <div class="app-header">
        <div>
            <div class="status">{headline}{offline}</div>
            <div class="status-detail">{detail}</div>
        </div>
        <div class="polling">{mode:?} polling &middot; {interval}ms &middot; {count}/{max}</div>
    </div>
    <div class="pyramid">{blocks}</div>
    <div class="strengths">{strengths}</div>
    <div class="chart-status">{chart_status}</div>
    <ul class="alerts">{alerts}</ul>
</body>
</html>"##,
        pair = escape(&frame.pair),
        refresh_secs = refresh_secs,
        headline = escape(&frame.status.headline),
        offline = if frame.status.backend_online {
            ""
        } else {
            r#" <span class="offline">OFFLINE</span>"#
        },
        detail = escape(&frame.status.detail),
        mode = frame.polling.mode,
        interval = frame.polling.current_interval_ms,
        count = frame.polling.active_poll_count,
        max = frame.polling.max_active_polls,
        blocks = blocks,
        strengths = strengths,
        chart_status = escape(&frame.chart_status),
        alerts = alerts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::polling::PollingScheduler;
    use crate::pyramid::{Block, BlockId, BlockTreeSnapshot, PyramidStyle, Timeframe};
    use chrono::Utc;

    #[test]
    fn test_nested_divs_follow_expansion() {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1);
        state.apply_refresh(
            Ok(BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
                .with_direction(Direction::Down)
                .with_children(vec![Block::new(Timeframe::H1, 3600)])])),
            Utc::now(),
        );

        let page = render_html(&state.frame(PollingScheduler::default().status()));
        assert!(page.contains(r#"<div class="block H4 red" data-id="H4_0">"#));
        assert!(!page.contains("H1_3600"));

        state.toggle_expand(&BlockId::from("H4_0"));
        let page = render_html(&state.frame(PollingScheduler::default().status()));
        assert!(page.contains(r#"class="block H4 red expanded""#));
        assert!(page.contains(r#"<div class="children"><div class="block H1 gray" data-id="H1_3600">"#));
        assert!(page.contains(r#"content="30""#));
    }

    #[test]
    fn test_hidden_container_keeps_derived_fields() {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Intraday, Timeframe::H1);
        state.apply_refresh(
            Ok(BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
                .with_ohlc(1.1000, 1.1050, 1.1000, 1.1030)
                .with_direction(Direction::Up)
                .with_momentum("Strong up")
                .with_children(vec![Block::new(Timeframe::H1, 3600)])])),
            Utc::now(),
        );

        let page = render_html(&state.frame(PollingScheduler::default().status()));
        assert!(page.contains(r#"<div class="block H4 green container" data-id="H4_0">"#));
        assert!(page.contains(r#"<span class="dir">↑</span><span class="range">50pips</span>"#));
        assert!(page.contains(r#"<span class="progress partial">1/4</span>"#));
        assert!(page.contains(r#"<span class="momentum">Strong up</span>"#));
        assert!(page.contains(r#"style="width: 90%"></span><span class="strength-value strong">90%</span>"#));
    }

    #[test]
    fn test_alert_items_use_lowercase_priority_class() {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1);
        state.alerts_mut().test_alert();
        state.alerts_mut().check_rsi(&Default::default(), 82.0);

        let page = render_html(&state.frame(PollingScheduler::default().status()));
        assert!(page.contains(r#"<li class="alert high">RSI overbought: 82.0</li>"#));
        assert!(page.contains(r#"<li class="alert low">Test alert - alert system is working</li>"#));
        assert!(!page.contains("alert High"));
    }

    #[test]
    fn test_empty_tree_shows_placeholder() {
        let state = DashboardState::new("<script>", PyramidStyle::Daily, Timeframe::H1);
        let page = render_html(&state.frame(PollingScheduler::default().status()));
        assert!(page.contains("Loading market data..."));
        assert!(page.contains("&lt;script&gt; - Flowz Dashboard"));
    }
}
