//! HTML pages

use crate::stats::StatusReport;

/// Body of `/view`
pub const VIEW_PAGE: &str = "<img src='frame.mjpg'>";

/// Body of `/`: stream list and the status as pretty-printed JSON
pub fn index_page(report: &StatusReport) -> serde_json::Result<String> {
    let status = serde_json::to_string_pretty(report)?;

    let mut html = String::from("<h2>Available streams</h2>\n<ul>\n");
    html.push_str("<li><a href='view'>view</a>\n");
    html.push_str("<li><a href='frame.mjpg'>frame.mjpg</a>\n");
    html.push_str("<li><a href='frame.jpeg'>frame.jpeg</a>\n");
    html.push_str("</ul>\n<h2>Status</h2>\n<pre>");
    html.push_str(&escape_html(&status));
    html.push_str("</pre>\n");
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
