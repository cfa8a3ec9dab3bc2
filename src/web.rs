//! Browser front end.
//!
//! A single form page plus two stateless download routes. The digest page
//! embeds the generated markdown in hidden fields, and the download routes
//! render whatever markdown they are posted, so nothing is kept between
//! requests.
//!
//! | Route                  | Purpose                                   |
//! |------------------------|-------------------------------------------|
//! | `GET /`                | input form                                |
//! | `POST /digest`         | run the pipeline, show status and preview |
//! | `POST /download/html`  | standalone HTML attachment                |
//! | `POST /download/docx`  | Word attachment                           |

use crate::models::{Branding, LanguageMode, ScrapeResult};
use crate::outputs::docx::render_docx;
use crate::outputs::html::{escape_html, markdown_to_inert_html, render_html};
use crate::pipeline::DigestPipeline;
use crate::scrapers::{LogProgress, ProgressSink};
use axum::{
    Form, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::error::Error;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<DigestPipeline>,
}

impl AppState {
    pub fn new(pipeline: DigestPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    fn branding(&self) -> &Branding {
        self.pipeline.branding()
    }
}

#[derive(Debug, Deserialize)]
pub struct DigestForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mode: LanguageMode,
}

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub markdown: String,
    /// `YYYY-MM-DD` of the digest run; today when absent or unparsable.
    #[serde(default)]
    pub date: String,
}

impl DownloadForm {
    fn report_date(&self) -> NaiveDate {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .unwrap_or_else(|_| Local::now().date_naive())
    }
}

/// Status lines for the page, also forwarded to the log.
#[derive(Default)]
struct PageProgress {
    lines: Mutex<Vec<String>>,
}

impl ProgressSink for PageProgress {
    fn scraped(&self, done: usize, total: usize, result: &ScrapeResult) {
        LogProgress.scraped(done, total, result);
        let glyph = if result.is_ok() { "✅" } else { "❌" };
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{glyph} {}", result.url));
        }
    }
}

impl PageProgress {
    fn into_lines(self) -> Vec<String> {
        self.lines.into_inner().unwrap_or_default()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/digest", post(digest))
        .route("/download/html", post(download_html))
        .route("/download/docx", post(download_docx))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Web front end listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page(
        &state.branding().organization,
        &input_form("", LanguageMode::default(), None),
    ))
}

#[instrument(level = "info", skip_all)]
async fn digest(State(state): State<AppState>, Form(form): Form<DigestForm>) -> Html<String> {
    let org = state.branding().organization.clone();
    let date = Local::now().date_naive();
    let progress = PageProgress::default();
    info!(mode = form.mode.as_str(), "Digest requested");

    let digest = match state.pipeline.run(&form.text, form.mode, date, &progress).await {
        Ok(digest) => digest,
        Err(e) => {
            info!(error = %e, "Rejected input");
            return Html(page(
                &org,
                &input_form(&form.text, form.mode, Some(e.user_message())),
            ));
        }
    };

    let markdown = digest.brief.markdown();
    let mut body = input_form(&form.text, form.mode, None);
    let _ = write!(
        body,
        "<h2>🔗 发现 {} 条链接</h2>\n<ul class=\"status\">\n",
        digest.urls.len()
    );
    for line in progress.into_lines() {
        let _ = writeln!(body, "<li>{}</li>", escape_html(&line));
    }
    body.push_str("</ul>\n");
    if !digest.brief.is_report() {
        let _ = writeln!(
            body,
            "<p class=\"warning\">{}</p>",
            escape_html(&markdown)
        );
    }
    let _ = write!(
        body,
        "<div class=\"downloads\">\n{}\n{}\n</div>\n<div class=\"preview\">\n{}\n</div>\n",
        download_form("/download/html", "📥 下载 HTML", &markdown, date),
        download_form("/download/docx", "📥 下载 Word", &markdown, date),
        markdown_to_inert_html(&markdown)
    );
    Html(page(&org, &body))
}

async fn download_html(State(state): State<AppState>, Form(form): Form<DownloadForm>) -> Response {
    let date = form.report_date();
    let html = render_html(&form.markdown, state.branding(), date);
    attachment(
        "text/html; charset=utf-8",
        &state.branding().report_filename(date, "html"),
        html.into_bytes(),
    )
}

async fn download_docx(State(state): State<AppState>, Form(form): Form<DownloadForm>) -> Response {
    let date = form.report_date();
    match render_docx(&form.markdown) {
        Ok(bytes) => attachment(
            DOCX_MIME,
            &state.branding().report_filename(date, "docx"),
            bytes,
        ),
        Err(e) => {
            error!(error = %e, "Word rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Word rendering failed: {e}")).into_response()
        }
    }
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    );
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

fn input_form(text: &str, selected: LanguageMode, warning: Option<&str>) -> String {
    let mut form = String::new();
    if let Some(warning) = warning {
        let _ = writeln!(form, "<p class=\"warning\">{}</p>", escape_html(warning));
    }
    form.push_str("<form method=\"post\" action=\"/digest\">\n");
    let _ = writeln!(
        form,
        "<textarea name=\"text\" rows=\"12\" placeholder=\"粘贴包含新闻链接的消息\">{}</textarea>",
        escape_html(text)
    );
    for mode in LanguageMode::ALL {
        let checked = if mode == selected { " checked" } else { "" };
        let _ = writeln!(
            form,
            "<label><input type=\"radio\" name=\"mode\" value=\"{}\"{checked}> {}</label>",
            mode.as_str(),
            mode.label()
        );
    }
    form.push_str("<button type=\"submit\">🚀 生成简报</button>\n</form>\n");
    form
}

fn download_form(action: &str, label: &str, markdown: &str, date: NaiveDate) -> String {
    format!(
        "<form method=\"post\" action=\"{action}\">\
         <input type=\"hidden\" name=\"markdown\" value=\"{}\">\
         <input type=\"hidden\" name=\"date\" value=\"{}\">\
         <button type=\"submit\">{label}</button></form>",
        escape_html(markdown),
        date.format("%Y-%m-%d")
    )
}

fn page(organization: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{org} 新闻简报</title>
    <style>
        body {{ font-family: -apple-system, "Segoe UI", "PingFang SC", "Microsoft YaHei", sans-serif; max-width: 900px; margin: 0 auto; padding: 20px; }}
        textarea {{ width: 100%; box-sizing: border-box; }}
        label {{ margin-right: 16px; }}
        .warning {{ color: #c0392b; font-weight: 600; }}
        .status li {{ word-break: break-all; }}
        .downloads form {{ display: inline-block; margin-right: 8px; }}
        .preview {{ border-top: 1px solid #e5e8eb; margin-top: 20px; }}
    </style>
</head>
<body>
<h1>📰 {org} 新闻简报</h1>
{body}
</body>
</html>
"#,
        org = escape_html(organization)
    )
}
