//! Word (.docx) report.
//!
//! This is not a markdown parser. The model is told to emit a fixed set of
//! line shapes, and [`classify`] maps each non-blank line to one [`Element`]
//! by prefix, first match wins:
//!
//! | Line                         | Element        |
//! |------------------------------|----------------|
//! | `#…` (any heading level)     | [`Element::Heading`]    |
//! | `* `, `- `, `+ `             | [`Element::Bullet`]     |
//! | contains `🔗`                | [`Element::SourceLink`] |
//! | `---` (three or more dashes) | [`Element::Rule`]       |
//! | anything else                | [`Element::Paragraph`]  |
//!
//! [`render_docx`] then writes one WordprocessingML paragraph per element.

use once_cell::sync::Lazy;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Marker the prompt puts on the source-link line.
pub const SOURCE_MARKER: &str = "🔗";

const BULLET_MARKERS: [&str; 3] = ["* ", "- ", "+ "];

/// Characters kept at the start of a heading even though they are not alphanumeric.
const HEADING_OPENERS: [char; 10] = ['[', '(', '（', '【', '《', '「', '"', '“', '¿', '¡'];

const HEADING_COLOR: &str = "D35400";
const MUTED_COLOR: &str = "808080";
const RULE_TEXT: &str = "________________________________________";

static INLINE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static link regex"));

static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|\*(.+?)\*").expect("static emphasis regex"));

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("xml write failed: {0}")]
    Xml(String),
    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One rendered block of the Word document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Heading(String),
    Bullet(String),
    SourceLink(String),
    Rule,
    Paragraph(String),
}

/// Classify a single markdown line. Blank lines yield `None`.
pub fn classify(line: &str) -> Option<Element> {
    let cleaned = strip_xml_illegal(line);
    let line = cleaned.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('#') {
        let title = EMPHASIS.replace_all(line.trim_start_matches('#'), "${1}${2}");
        let title = strip_bold(strip_decoration(&title));
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        return Some(Element::Heading(title.to_string()));
    }

    if let Some(rest) = BULLET_MARKERS.iter().find_map(|m| line.strip_prefix(m)) {
        let item = INLINE_LINK.replace_all(rest.trim(), "$1");
        return Some(Element::Bullet(strip_bold(&item)));
    }

    if line.contains(SOURCE_MARKER) {
        return Some(Element::SourceLink(strip_bold(line)));
    }

    if line.len() >= 3 && line.chars().all(|c| c == '-') {
        return Some(Element::Rule);
    }

    Some(Element::Paragraph(strip_bold(line)))
}

/// Classify every line of `markdown`, skipping blanks.
pub fn classify_document(markdown: &str) -> Vec<Element> {
    markdown.lines().filter_map(classify).collect()
}

/// Drop leading whitespace and emoji-like glyphs from a heading.
fn strip_decoration(text: &str) -> &str {
    text.trim_start_matches(|c: char| {
        c.is_whitespace() || !(c.is_alphanumeric() || HEADING_OPENERS.contains(&c))
    })
}

/// Characters XML 1.0 does not allow anywhere in a document.
fn strip_xml_illegal(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'))
        .collect()
}

fn strip_bold(text: &str) -> String {
    text.replace("**", "")
}

/// Render the markdown report as a .docx file.
pub fn render_docx(markdown: &str) -> Result<Vec<u8>, DocxError> {
    let elements = classify_document(markdown);
    let document = document_xml(&elements)?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS_XML.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.as_bytes()),
        ("word/styles.xml", STYLES_XML.as_bytes()),
        ("word/numbering.xml", NUMBERING_XML.as_bytes()),
        ("word/document.xml", &document),
    ];
    for (name, bytes) in parts {
        zip.start_file(name, part_options())?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Fixed timestamp so identical markdown gives identical bytes.
fn part_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), DocxError> {
    writer
        .write_event(event)
        .map_err(|e| DocxError::Xml(e.to_string()))
}

fn empty(writer: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), DocxError> {
    emit(
        writer,
        Event::Empty(BytesStart::new(name).with_attributes(attrs.iter().copied())),
    )
}

fn start(writer: &mut XmlWriter, name: &str) -> Result<(), DocxError> {
    emit(writer, Event::Start(BytesStart::new(name)))
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<(), DocxError> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Run formatting for one paragraph.
#[derive(Default)]
struct RunStyle<'a> {
    bold: bool,
    color: Option<&'a str>,
    half_points: Option<&'a str>,
}

fn paragraph(
    writer: &mut XmlWriter,
    style: Option<&str>,
    bullet: bool,
    run: RunStyle<'_>,
    text: &str,
) -> Result<(), DocxError> {
    start(writer, "w:p")?;
    if style.is_some() || bullet {
        start(writer, "w:pPr")?;
        if let Some(style) = style {
            empty(writer, "w:pStyle", &[("w:val", style)])?;
        }
        if bullet {
            start(writer, "w:numPr")?;
            empty(writer, "w:ilvl", &[("w:val", "0")])?;
            empty(writer, "w:numId", &[("w:val", "1")])?;
            end(writer, "w:numPr")?;
        }
        end(writer, "w:pPr")?;
    }

    start(writer, "w:r")?;
    if run.bold || run.color.is_some() || run.half_points.is_some() {
        start(writer, "w:rPr")?;
        if run.bold {
            empty(writer, "w:b", &[])?;
        }
        if let Some(color) = run.color {
            empty(writer, "w:color", &[("w:val", color)])?;
        }
        if let Some(size) = run.half_points {
            empty(writer, "w:sz", &[("w:val", size)])?;
            empty(writer, "w:szCs", &[("w:val", size)])?;
        }
        end(writer, "w:rPr")?;
    }
    emit(
        writer,
        Event::Start(BytesStart::new("w:t").with_attributes([("xml:space", "preserve")])),
    )?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    end(writer, "w:t")?;
    end(writer, "w:r")?;
    end(writer, "w:p")
}

fn document_xml(elements: &[Element]) -> Result<Vec<u8>, DocxError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("w:document").with_attributes([(
            "xmlns:w",
            "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
        )])),
    )?;
    start(&mut writer, "w:body")?;

    for element in elements {
        match element {
            Element::Heading(text) => paragraph(
                &mut writer,
                Some("Heading2"),
                false,
                RunStyle {
                    bold: true,
                    color: Some(HEADING_COLOR),
                    ..RunStyle::default()
                },
                text,
            )?,
            Element::Bullet(text) => paragraph(
                &mut writer,
                Some("ListBullet"),
                true,
                RunStyle::default(),
                text,
            )?,
            Element::SourceLink(text) => paragraph(
                &mut writer,
                None,
                false,
                RunStyle {
                    color: Some(MUTED_COLOR),
                    half_points: Some("18"),
                    ..RunStyle::default()
                },
                text,
            )?,
            Element::Rule => paragraph(
                &mut writer,
                None,
                false,
                RunStyle {
                    color: Some("BBBBBB"),
                    ..RunStyle::default()
                },
                RULE_TEXT,
            )?,
            Element::Paragraph(text) => {
                paragraph(&mut writer, None, false, RunStyle::default(), text)?
            }
        }
    }

    start(&mut writer, "w:sectPr")?;
    empty(&mut writer, "w:pgSz", &[("w:w", "11906"), ("w:h", "16838")])?;
    empty(
        &mut writer,
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "708"),
            ("w:footer", "708"),
            ("w:gutter", "0"),
        ],
    )?;
    end(&mut writer, "w:sectPr")?;
    end(&mut writer, "w:body")?;
    end(&mut writer, "w:document")?;
    Ok(writer.into_inner().into_inner())
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="Microsoft YaHei" w:cs="Calibri"/><w:sz w:val="22"/><w:szCs w:val="22"/><w:lang w:val="es-CL" w:eastAsia="zh-CN"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="300" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="360" w:after="120"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/><w:szCs w:val="28"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr><w:spacing w:after="60"/><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>
</w:styles>"#;

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;
