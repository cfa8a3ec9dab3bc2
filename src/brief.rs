//! Prompt assembly and report generation.
//!
//! The prompt is a fixed layout block shared by every [`LanguageMode`],
//! followed by exactly one language block. The layout block fixes the line
//! prefixes the Word renderer later keys on (`### `, `🔗`, `* `, `---`).

use crate::api::{AskAsync, LlmError};
use crate::models::LanguageMode;
use chrono::NaiveDate;
use tracing::{error, info, instrument};

/// The generated report, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Brief {
    Report(String),
    Failed(LlmError),
}

impl Brief {
    /// Markdown shown and rendered downstream. Failures become a placeholder
    /// report so both renderers still produce a file.
    pub fn markdown(&self) -> String {
        match self {
            Brief::Report(markdown) => markdown.clone(),
            Brief::Failed(e) => format!("AI 思考出错: {e}"),
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, Brief::Report(_))
    }
}

/// Layout rules shared by all language modes.
fn layout_block(organization: &str, date: NaiveDate) -> String {
    format!(
        r#"你是一位 {organization} 能源公司的情报专家。
请根据提供的【原始消息框架】和【抓取的详细正文】，写一份排版精美的新闻日报。

【排版严格要求】：
每一条新闻都必须严格使用以下 Markdown 格式，不要增加其他标题层级：

### 🍊 [新闻标题]

[详细的新闻摘要，包含具体数据。摘要写完后必须换行]

**🔗 来源链接：**
* [链接标题](链接地址)

---

【内容要求】：
1. 结构复刻：保留原始消息中的分类与顺序。
2. 深度摘要：概括核心事实，保留金额、装机容量、日期等关键数字。
3. 链接：只使用原始消息中出现过的链接，不要编造。
4. 如果某条链接的正文标注为抓取出错，请只根据原始消息中的文字撰写该条。

【时间】：{date}
"#,
        date = date.format("%Y-%m-%d")
    )
}

fn language_block(mode: LanguageMode) -> &'static str {
    match mode {
        LanguageMode::SourceGlossary => {
            r#"【语言要求】：
全文使用中文撰写。机构名、法规名、项目名等专有名词在中文译名后用括号保留西班牙语原文，
例如：国家能源委员会（Comisión Nacional de Energía）。"#
        }
        LanguageMode::TargetOnly => {
            r#"【语言要求】：
全文只使用中文撰写，标题和摘要中都不要出现西班牙语原文；专有名词使用通行的中文译名。"#
        }
        LanguageMode::Bilingual => {
            r#"【语言要求】：
每条新闻先给出完整的西班牙语标题和摘要段落，再给出完整的中文标题和摘要段落。
两种语言各自成段，不要逐句交替，也不要在同一句中混排两种语言。
标题行写作：### 🍊 [西班牙语标题] / [中文标题]"#
        }
    }
}

/// Full instruction text for one report.
pub fn build_prompt(mode: LanguageMode, organization: &str, date: NaiveDate) -> String {
    format!("{}\n{}\n", layout_block(organization, date), language_block(mode))
}

/// Prompt followed by the raw chat text and the scraped block.
pub fn build_request_text(prompt: &str, raw_input: &str, scraped_block: &str) -> String {
    format!("{prompt}\n\n【原始消息框架】:\n{raw_input}\n\n【抓取的详细正文】:\n{scraped_block}")
}

/// Ask the model once. Failures never escape: they come back as [`Brief::Failed`].
#[instrument(level = "info", skip_all, fields(?mode, raw_chars = raw_input.chars().count(), block_chars = scraped_block.chars().count()))]
pub async fn compose_brief(
    llm: &dyn AskAsync,
    mode: LanguageMode,
    organization: &str,
    date: NaiveDate,
    raw_input: &str,
    scraped_block: &str,
) -> Brief {
    let prompt = build_prompt(mode, organization, date);
    let request = build_request_text(&prompt, raw_input, scraped_block);
    match llm.ask(&request).await {
        Ok(markdown) => {
            info!(chars = markdown.chars().count(), "Report generated");
            Brief::Report(markdown)
        }
        Err(e) => {
            error!(error = %e, "Report generation failed; using placeholder");
            Brief::Failed(e)
        }
    }
}
