//! Plain-text rendering for the terminal

use std::fmt::Write;

use chrono::DateTime;

use super::RenderFrame;
use crate::pyramid::{BlockTime, Direction, ProgressStatus, RenderedNode};

pub(crate) fn format_time(time: &BlockTime) -> String {
    match time {
        BlockTime::Unix(ts) => DateTime::from_timestamp(*ts, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ts.to_string()),
        BlockTime::Label(label) => label.clone(),
    }
}

pub(crate) fn direction_arrow(dir: Direction) -> &'static str {
    match dir {
        Direction::Up => "↑",
        Direction::Down => "↓",
        Direction::Neutral => "→",
    }
}

/// Render a frame as an indented outline
pub fn render_text(frame: &RenderFrame) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}   [{:?} {}ms {}/{}]{}",
        frame.status.headline,
        frame.polling.mode,
        frame.polling.current_interval_ms,
        frame.polling.active_poll_count,
        frame.polling.max_active_polls,
        if frame.status.backend_online { "" } else { "  OFFLINE" }
    );
    if !frame.status.detail.is_empty() {
        let _ = writeln!(out, "{}", frame.status.detail);
    }

    if frame.tree.is_empty() {
        let _ = writeln!(out, "  (no blocks)");
    }
    for node in &frame.tree.roots {
        write_node(&mut out, node, 0);
    }

    if !frame.strengths.is_empty() {
        let parts: Vec<String> = frame
            .strengths
            .iter()
            .map(|s| format!("{} {}% {}", s.tf, s.percent(), s.class().as_str()))
            .collect();
        let _ = writeln!(out, "Strength: {}", parts.join(" | "));
    }
    if !frame.chart_status.is_empty() {
        let price = frame
            .latest_price
            .map(|p| format!(" @ {}", p))
            .unwrap_or_default();
        let _ = writeln!(out, "Chart: {}{}", frame.chart_status, price);
    }
    for alert in frame.active_alerts().take(5) {
        let _ = writeln!(out, "! [{}] {}", alert.priority.as_str(), alert.message);
    }
    out
}

fn write_node(out: &mut String, node: &RenderedNode, depth: usize) {
    let marker = match (node.has_children(), node.expanded) {
        (false, _) => "   ",
        (true, true) => "[-]",
        (true, false) => "[+]",
    };
    let _ = write!(
        out,
        "{}{} {} {}",
        "  ".repeat(depth),
        marker,
        node.tf,
        format_time(&node.time)
    );

    let _ = write!(out, " {}", direction_arrow(node.dir));
    if let Some(size) = node.range_size {
        let _ = write!(out, " {}", size);
    }
    if let Some(progress) = node.progress {
        let label = match progress.status {
            Some(ProgressStatus::Complete) => " complete",
            Some(ProgressStatus::Partial) => " partial",
            None => "",
        };
        let _ = write!(out, " {}/{}{}", progress.completed, progress.total, label);
    }
    if let Some(summary) = &node.momentum_summary {
        let _ = write!(out, " {}", summary);
    }
    // Emitted only for its visible descendants
    if !node.own_timeframe_visible {
        out.push_str(" (container)");
    }
    out.push('\n');

    for child in node.shown_children() {
        write_node(out, child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::polling::PollingScheduler;
    use crate::pyramid::{Block, BlockId, BlockTreeSnapshot, PyramidStyle, Timeframe};
    use chrono::Utc;

    fn state() -> DashboardState {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1);
        let snapshot = BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
            .with_ohlc(1.1000, 1.1050, 1.1000, 1.1030)
            .with_direction(Direction::Up)
            .with_children(vec![Block::new(Timeframe::H1, 3600).with_momentum("flat")])]);
        state.apply_refresh(Ok(snapshot), Utc::now());
        state
    }

    #[test]
    fn test_collapsed_children_hidden() {
        let state = state();
        let text = render_text(&state.frame(PollingScheduler::default().status()));

        assert!(text.starts_with("EUR/USD • Daily"));
        assert!(text.contains("[+] H4 1970-01-01 00:00 ↑ 50pips 1/4 partial"));
        assert!(!text.contains("H1 1970-01-01 01:00"));
        assert!(text.contains("\nStrength: H4 50% moderate\n"));
    }

    #[test]
    fn test_expanded_children_indented() {
        let mut state = state();
        state.toggle_expand(&BlockId::from("H4_0"));
        let text = render_text(&state.frame(PollingScheduler::default().status()));

        assert!(text.contains("[-] H4"));
        assert!(text.contains("\n      H1 1970-01-01 01:00 → flat\n"));
    }

    #[test]
    fn test_hidden_container_keeps_derived_fields() {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Intraday, Timeframe::H1);
        let snapshot = BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
            .with_ohlc(1.1000, 1.1050, 1.1000, 1.1030)
            .with_direction(Direction::Down)
            .with_momentum("Strong down")
            .with_children(vec![Block::new(Timeframe::H1, 3600).with_momentum("up")])]);
        state.apply_refresh(Ok(snapshot), Utc::now());
        assert!(!state.tree().roots[0].own_timeframe_visible);

        let text = render_text(&state.frame(PollingScheduler::default().status()));
        assert!(text.contains("[+] H4 1970-01-01 00:00 ↓ 50pips 1/4 partial Strong down (container)"));
    }

    #[test]
    fn test_label_time_kept_verbatim() {
        assert_eq!(format_time(&BlockTime::from("Mon 14:00")), "Mon 14:00");
    }
}
