//! Standalone HTML report.
//!
//! Markdown goes through pulldown-cmark and lands inside a fixed page
//! template with an embedded stylesheet. The output depends only on the
//! markdown, the branding and the date passed in.

use crate::models::Branding;
use chrono::NaiveDate;
use pulldown_cmark::{Event, Options, Parser, html};

const STYLESHEET: &str = r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "PingFang SC", "Microsoft YaHei", Arial, sans-serif;
            line-height: 1.8;
            color: #333;
            max-width: 800px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f4f7f6;
        }
        .container {
            background-color: #ffffff;
            padding: 40px;
            border-radius: 12px;
            box-shadow: 0 4px 15px rgba(0, 0, 0, 0.05);
        }
        h2 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; margin-top: 30px; }
        h3 { color: #d35400; margin-top: 25px; margin-bottom: 10px; font-size: 1.15em; font-weight: 600; }
        p { margin-bottom: 15px; text-align: justify; }
        ul {
            background-color: #f8f9fa;
            padding: 15px 15px 15px 35px;
            border-radius: 8px;
            border-left: 5px solid #3498db;
            margin-bottom: 20px;
        }
        li { margin-bottom: 8px; font-size: 0.95em; word-break: break-all; color: #555; }
        a { color: #007bff; text-decoration: none; font-weight: 500; }
        a:hover { text-decoration: underline; }
        hr { border: none; border-top: 1px solid #e5e8eb; margin: 30px 0; }
        table { border-collapse: collapse; width: 100%; }
        th, td { border: 1px solid #e5e8eb; padding: 6px 10px; }
        .footer { margin-top: 40px; text-align: center; font-size: 0.8em; color: #aaa; }
        @media only screen and (max-width: 600px) {
            body { padding: 10px; }
            .container { padding: 20px; }
            h2 { font-size: 1.4em; }
            h3 { font-size: 1.1em; }
        }
"#;

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// Markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    let mut fragment = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut fragment, parser);
    fragment
}

/// Like [`markdown_to_html`], but raw HTML in the markdown is shown as text
/// instead of being passed through. Used where the fragment is embedded in a
/// live page.
pub fn markdown_to_inert_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut fragment = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut fragment, parser);
    fragment
}

/// Escape text for use inside HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}

/// Full HTML document for the report.
pub fn render_html(markdown: &str, branding: &Branding, date: NaiveDate) -> String {
    let body = markdown_to_html(markdown);
    let org = escape_html(&branding.organization);
    let date = date.format("%Y-%m-%d");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{org} 每日新闻 {date}</title>
    <style>{STYLESHEET}    </style>
</head>
<body>
    <div class="container">
{body}
        <div class="footer">
            ⚡ Generated by {org} AI Assistant • {date}
        </div>
    </div>
</body>
</html>
"#
    )
}
