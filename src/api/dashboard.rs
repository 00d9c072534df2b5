//! HTML rendering for the dashboard page.

use std::fmt::Write;

use crate::analytics::Stats;
use crate::pricing::format_cost;
use crate::record::UsageRecord;

/// Rows shown in the recent calls table.
const RECENT_CALLS: usize = 50;

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background-color: #f5f5f7; }
        .container { max-width: 1200px; margin: 0 auto; }
        .header { text-align: center; margin-bottom: 40px; }
        .header h1 { color: #1d1d1f; margin-bottom: 10px; }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(250px, 1fr)); gap: 20px; margin-bottom: 40px; }
        .stat-card { background: white; padding: 24px; border-radius: 12px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        .stat-card h3 { margin: 0 0 8px 0; color: #666; font-size: 14px; font-weight: 500; }
        .stat-card .value { font-size: 32px; font-weight: 600; color: #1d1d1f; }
        .calls-table { background: white; border-radius: 12px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); overflow: hidden; }
        .table-header { padding: 20px; border-bottom: 1px solid #e5e5e7; }
        table { width: 100%; border-collapse: collapse; }
        th, td { padding: 12px 20px; text-align: left; border-bottom: 1px solid #e5e5e7; }
        th { background-color: #f5f5f7; font-weight: 600; color: #666; font-size: 12px; text-transform: uppercase; letter-spacing: 0.5px; }
        .status-success { color: #34c759; }
        .status-error { color: #ff3b30; }
        .refresh-btn { background: #007aff; color: white; border: none; padding: 10px 20px; border-radius: 6px; cursor: pointer; font-size: 14px; margin-left: 10px; }
        .refresh-btn:hover { background: #0051d5; }
"#;

/// Render the full dashboard page.
pub fn render(records: &[UsageRecord], stats: &Stats) -> String {
    let mut rows = String::new();
    for record in records.iter().take(RECENT_CALLS) {
        // Writing to a String cannot fail
        let _ = write!(
            rows,
            r#"
                    <tr>
                        <td>{time}</td>
                        <td>{model}</td>
                        <td>{tokens}</td>
                        <td>{cost}</td>
                        <td>{duration}ms</td>
                        <td class="status-{status}">{status}</td>
                    </tr>"#,
            time = format_timestamp(record.timestamp),
            model = escape_html(&record.model),
            tokens = record.total_tokens(),
            cost = format_cost(record.cost_cents),
            duration = record.duration_ms,
            status = record.status,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Miharu AI Dashboard</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Miharu AI Dashboard</h1>
            <p>OpenAI API Usage Analytics</p>
        </div>

        <div class="stats">
            <div class="stat-card"><h3>Total Calls</h3><div class="value">{total_calls}</div></div>
            <div class="stat-card"><h3>Total Cost</h3><div class="value">{total_cost}</div></div>
            <div class="stat-card"><h3>Total Tokens</h3><div class="value">{total_tokens}</div></div>
            <div class="stat-card"><h3>Avg Response Time</h3><div class="value">{avg}ms</div></div>
        </div>

        <div class="calls-table">
            <div class="table-header">
                <h3>Recent API Calls
                    <button class="refresh-btn" onclick="location.reload()">Refresh</button>
                </h3>
            </div>
            <table>
                <thead>
                    <tr>
                        <th>Time</th>
                        <th>Model</th>
                        <th>Tokens</th>
                        <th>Cost</th>
                        <th>Duration</th>
                        <th>Status</th>
                    </tr>
                </thead>
                <tbody>{rows}
                </tbody>
            </table>
        </div>
    </div>

    <script>
        setTimeout(() => location.reload(), 30000);
    </script>
</body>
</html>
"#,
        style = STYLE,
        total_calls = stats.total_calls,
        total_cost = format_cost(stats.total_cost),
        total_tokens = group_thousands(stats.total_tokens),
        avg = stats.avg_response_time,
        rows = rows,
    )
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

/// `1234567` -> `1,234,567`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
