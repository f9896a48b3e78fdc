//! WordprocessingML (`.docx`) to Markdown.
//!
//! Only the parts that matter for citation checking are rendered: headings,
//! paragraphs, list items, inline formatting and hyperlinks. Tables are
//! flattened to their paragraphs and images are dropped; both are reported
//! as warnings.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::numbering::NumberingDefinitions;
use crate::{Conversion, ConvertError, Converter};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const RELATIONSHIPS_PART: &str = "word/_rels/document.xml.rels";

/// Paragraph styles rendered as plain paragraphs without a warning
/// (compared lowercase with whitespace removed).
const PLAIN_STYLES: &[&str] = &[
    "normal",
    "default",
    "listparagraph",
    "bodytext",
    "nospacing",
    "bibliography",
];

/// Converts `.docx` bytes to Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxConverter;

impl Converter for DocxConverter {
    fn convert(&self, bytes: &[u8]) -> Result<Conversion, ConvertError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let document = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| ConvertError::MissingPart(DOCUMENT_PART.to_string()))?;

        let mut warnings = Vec::new();
        let styles = match read_part(&mut archive, STYLES_PART)? {
            Some(xml) => parse_styles(&xml)?,
            None => {
                warnings.push(
                    "document has no styles part; headings are detected from style ids only"
                        .to_string(),
                );
                HashMap::new()
            }
        };
        let numbering = match read_part(&mut archive, NUMBERING_PART)? {
            Some(xml) => NumberingDefinitions::parse(&xml)?,
            None => NumberingDefinitions::default(),
        };
        let relationships = match read_part(&mut archive, RELATIONSHIPS_PART)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut walker = BodyWalker::new(&styles, &numbering, &relationships);
        walker.walk(&document)?;
        let (markdown, body_warnings) = walker.finish();
        warnings.extend(body_warnings);

        log::debug!(
            "converted docx: {} bytes of markdown, {} warning(s)",
            markdown.len(),
            warnings.len()
        );

        Ok(Conversion { markdown, warnings })
    }
}

/// Read a part of the archive as UTF-8, `None` if the part does not exist.
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ConvertError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Extract an attribute value by qualified name.
pub(crate) fn attr(e: &BytesStart, decoder: Decoder, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.decode_and_unescape_value(decoder).ok().map(|v| v.into_owned()))
}

pub(crate) fn xml_error(part: &str, e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

/// `w:val="0"` / `"false"` / `"off"` switches a toggle property off.
fn is_off(e: &BytesStart, decoder: Decoder) -> bool {
    attr(e, decoder, b"w:val").is_some_and(|v| matches!(v.as_str(), "0" | "false" | "off"))
}

#[derive(Debug, Clone, Default)]
struct StyleInfo {
    name: Option<String>,
    /// 1-based heading level from `w:outlineLvl`.
    outline_level: Option<usize>,
}

fn parse_styles(xml: &str) -> Result<HashMap<String, StyleInfo>, ConvertError> {
    let mut styles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;
    let decoder = reader.decoder();

    let mut current: Option<(String, StyleInfo)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:style" => {
                    if let Some((id, info)) = current.take() {
                        styles.insert(id, info);
                    }
                    current = attr(&e, decoder, b"w:styleId").map(|id| (id, StyleInfo::default()));
                }
                b"w:name" => {
                    if let Some((_, info)) = current.as_mut() {
                        info.name = attr(&e, decoder, b"w:val");
                    }
                }
                b"w:outlineLvl" => {
                    if let Some((_, info)) = current.as_mut() {
                        info.outline_level = outline_level(&e, decoder);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => {
                if let Some((id, info)) = current.take() {
                    styles.insert(id, info);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(STYLES_PART, e)),
            _ => {}
        }
    }

    Ok(styles)
}

/// Map relationship ids (`rId7`) to their targets.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut relationships = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;
    let decoder = reader.decoder();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, decoder, b"Id"), attr(&e, decoder, b"Target")) {
                    relationships.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(RELATIONSHIPS_PART, e)),
            _ => {}
        }
    }

    Ok(relationships)
}

/// `w:outlineLvl` is 0-based; 9 means body text.
fn outline_level(e: &BytesStart, decoder: Decoder) -> Option<usize> {
    attr(e, decoder, b"w:val")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|level| *level < 9)
        .map(|level| level + 1)
}

fn compact_style_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// `Heading 2`, `heading2`, `Heading2` → 2; `Title` → 1.
fn heading_from_name(name: &str) -> Option<usize> {
    let compact = compact_style_name(name);
    if compact == "title" {
        return Some(1);
    }
    compact
        .strip_prefix("heading")?
        .parse::<usize>()
        .ok()
        .filter(|level| (1..=9).contains(level))
}

fn heading_level(styles: &HashMap<String, StyleInfo>, style_id: &str) -> Option<usize> {
    let info = styles.get(style_id);
    info.and_then(|s| s.outline_level)
        .or_else(|| info.and_then(|s| s.name.as_deref()).and_then(heading_from_name))
        .or_else(|| heading_from_name(style_id))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunFormat {
    bold: bool,
    italic: bool,
    superscript: bool,
    subscript: bool,
}

#[derive(Debug, Clone)]
struct Segment {
    text: String,
    format: RunFormat,
    /// Already rendered Markdown (hyperlinks); never merged or wrapped.
    literal: bool,
}

fn push_segment(segments: &mut Vec<Segment>, text: &str, format: RunFormat) {
    if let Some(last) = segments.last_mut() {
        if !last.literal && last.format == format {
            last.text.push_str(text);
            return;
        }
    }
    segments.push(Segment {
        text: text.to_string(),
        format,
        literal: false,
    });
}

/// Wrap text in Markdown emphasis, keeping surrounding whitespace outside
/// the markers.
fn wrap(text: &str, format: RunFormat) -> String {
    let core = text.trim();
    if format == RunFormat::default() || core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let lead = &text[..start];
    let trail = &text[start + core.len()..];

    let mut inner = core.to_string();
    if format.superscript {
        inner = format!("^{inner}^");
    } else if format.subscript {
        inner = format!("~{inner}~");
    }
    if format.italic {
        inner = format!("*{inner}*");
    }
    if format.bold {
        inner = format!("**{inner}**");
    }
    format!("{lead}{inner}{trail}")
}

fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.literal {
                s.text.clone()
            } else {
                wrap(&s.text, s.format)
            }
        })
        .collect()
}

fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

#[derive(Debug, Default)]
struct Paragraph {
    style_id: Option<String>,
    outline_level: Option<usize>,
    num_id: Option<i32>,
    ilvl: i32,
    segments: Vec<Segment>,
}

#[derive(Debug)]
struct Hyperlink {
    target: Option<String>,
    segments: Vec<Segment>,
}

#[derive(Debug)]
struct Block {
    text: String,
    list_item: bool,
}

/// Streaming walk over `word/document.xml`.
struct BodyWalker<'a> {
    styles: &'a HashMap<String, StyleInfo>,
    numbering: &'a NumberingDefinitions,
    relationships: &'a HashMap<String, String>,

    blocks: Vec<Block>,
    paragraph: Option<Paragraph>,
    /// Text boxes nest paragraphs inside paragraphs; inner ones are folded
    /// into the outer paragraph.
    paragraph_depth: usize,
    hyperlink: Option<Hyperlink>,
    run_format: RunFormat,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,

    /// numId → running counter per level
    list_counters: HashMap<i32, Vec<usize>>,
    tables: usize,
    images: usize,
    unknown_styles: Vec<String>,
}

impl<'a> BodyWalker<'a> {
    fn new(
        styles: &'a HashMap<String, StyleInfo>,
        numbering: &'a NumberingDefinitions,
        relationships: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            styles,
            numbering,
            relationships,
            blocks: Vec::new(),
            paragraph: None,
            paragraph_depth: 0,
            hyperlink: None,
            run_format: RunFormat::default(),
            in_paragraph_props: false,
            in_run_props: false,
            in_text: false,
            list_counters: HashMap::new(),
            tables: 0,
            images: 0,
            unknown_styles: Vec::new(),
        }
    }

    fn walk(&mut self, xml: &str) -> Result<(), ConvertError> {
        let mut reader = Reader::from_str(xml);
        // w:t text is significant including surrounding spaces
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        let decoder = reader.decoder();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(&e, decoder),
                Ok(Event::Empty(e)) => self.handle_empty(&e, decoder),
                Ok(Event::Text(e)) => {
                    if self.in_text {
                        let text = e.unescape().map_err(|err| xml_error(DOCUMENT_PART, err))?;
                        self.push_text(&text);
                    }
                }
                Ok(Event::End(e)) => self.handle_end(e.name().as_ref()),
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(DOCUMENT_PART, e)),
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_start(&mut self, e: &BytesStart, decoder: Decoder) {
        match e.name().as_ref() {
            b"w:p" => self.begin_paragraph(),
            b"w:pPr" => self.in_paragraph_props = true,
            b"w:r" => self.run_format = RunFormat::default(),
            b"w:rPr" => self.in_run_props = true,
            b"w:t" => self.in_text = true,
            b"w:hyperlink" => self.begin_hyperlink(e, decoder),
            b"w:tbl" => self.tables += 1,
            b"w:drawing" | b"w:pict" => self.images += 1,
            _ => self.handle_property(e, decoder),
        }
    }

    fn handle_empty(&mut self, e: &BytesStart, decoder: Decoder) {
        match e.name().as_ref() {
            b"w:tab" if !self.in_paragraph_props => self.push_text("\t"),
            b"w:br" | b"w:cr" if !self.in_paragraph_props => self.push_text(" "),
            b"w:drawing" | b"w:pict" => self.images += 1,
            _ => self.handle_property(e, decoder),
        }
    }

    fn handle_end(&mut self, name: &[u8]) {
        match name {
            b"w:p" => self.end_paragraph(),
            b"w:pPr" => self.in_paragraph_props = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:t" => self.in_text = false,
            b"w:hyperlink" => self.end_hyperlink(),
            _ => {}
        }
    }

    fn handle_property(&mut self, e: &BytesStart, decoder: Decoder) {
        if self.in_paragraph_props {
            // Run properties of the paragraph mark do not format any text,
            // and a text box paragraph must not restyle the one holding it.
            if self.in_run_props || self.paragraph_depth > 1 {
                return;
            }
            let Some(paragraph) = self.paragraph.as_mut() else {
                return;
            };
            match e.name().as_ref() {
                b"w:pStyle" => paragraph.style_id = attr(e, decoder, b"w:val"),
                b"w:outlineLvl" => paragraph.outline_level = outline_level(e, decoder),
                b"w:numId" => {
                    paragraph.num_id = attr(e, decoder, b"w:val")
                        .and_then(|v| v.parse::<i32>().ok())
                        .filter(|id| *id != 0);
                }
                b"w:ilvl" => {
                    paragraph.ilvl = attr(e, decoder, b"w:val")
                        .and_then(|v| v.parse::<i32>().ok())
                        .unwrap_or(0)
                        .clamp(0, 8);
                }
                _ => {}
            }
            return;
        }

        if self.in_run_props {
            match e.name().as_ref() {
                b"w:b" => self.run_format.bold = !is_off(e, decoder),
                b"w:i" => self.run_format.italic = !is_off(e, decoder),
                b"w:vertAlign" => match attr(e, decoder, b"w:val").as_deref() {
                    Some("superscript") => self.run_format.superscript = true,
                    Some("subscript") => self.run_format.subscript = true,
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn begin_paragraph(&mut self) {
        self.paragraph_depth += 1;
        if self.paragraph_depth == 1 {
            self.paragraph = Some(Paragraph::default());
        }
    }

    fn push_text(&mut self, text: &str) {
        let format = self.run_format;
        if let Some(link) = self.hyperlink.as_mut() {
            push_segment(&mut link.segments, text, format);
        } else if let Some(paragraph) = self.paragraph.as_mut() {
            push_segment(&mut paragraph.segments, text, format);
        }
    }

    fn begin_hyperlink(&mut self, e: &BytesStart, decoder: Decoder) {
        let target = attr(e, decoder, b"r:id").and_then(|id| self.relationships.get(&id).cloned());
        self.hyperlink = Some(Hyperlink {
            target,
            segments: Vec::new(),
        });
    }

    fn end_hyperlink(&mut self) {
        let Some(link) = self.hyperlink.take() else {
            return;
        };
        let Some(paragraph) = self.paragraph.as_mut() else {
            return;
        };
        let text = render_segments(&link.segments);
        match link.target {
            Some(url) if !text.trim().is_empty() => paragraph.segments.push(Segment {
                text: format!("[{}]({url})", text.trim()),
                format: RunFormat::default(),
                literal: true,
            }),
            _ => paragraph.segments.extend(link.segments),
        }
    }

    fn end_paragraph(&mut self) {
        self.paragraph_depth = self.paragraph_depth.saturating_sub(1);
        if self.paragraph_depth > 0 {
            return;
        }
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };

        let level = paragraph.outline_level.or_else(|| {
            paragraph
                .style_id
                .as_deref()
                .and_then(|id| heading_level(self.styles, id))
        });
        if level.is_none() {
            if let Some(id) = paragraph.style_id.as_deref() {
                self.note_style(id);
            }
        }

        let text = match level {
            Some(_) => plain_text(&paragraph.segments),
            None => render_segments(&paragraph.segments),
        };
        let text = text.replace(['\r', '\n'], " ");
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let block = if let Some(level) = level {
            Block {
                text: format!("{} {text}", "#".repeat(level.min(6))),
                list_item: false,
            }
        } else if let Some(num_id) = paragraph.num_id {
            let marker = self.list_marker(num_id, paragraph.ilvl);
            Block {
                text: format!("{}{marker}{text}", "   ".repeat(paragraph.ilvl as usize)),
                list_item: true,
            }
        } else {
            Block {
                text: text.to_string(),
                list_item: false,
            }
        };
        self.blocks.push(block);
    }

    fn list_marker(&mut self, num_id: i32, ilvl: i32) -> String {
        let depth = ilvl.max(0) as usize;
        let count = {
            let counters = self.list_counters.entry(num_id).or_default();
            counters.truncate(depth + 1);
            counters.resize(depth + 1, 0);
            counters[depth] += 1;
            counters[depth]
        };
        if self.numbering.is_bullet(num_id, ilvl) {
            "- ".to_string()
        } else {
            format!("{count}. ")
        }
    }

    fn note_style(&mut self, style_id: &str) {
        let name = self
            .styles
            .get(style_id)
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| style_id.to_string());
        if PLAIN_STYLES.contains(&compact_style_name(&name).as_str())
            || PLAIN_STYLES.contains(&compact_style_name(style_id).as_str())
        {
            return;
        }
        let warning = format!("unrecognised paragraph style: '{name}' (style id: {style_id})");
        if !self.unknown_styles.contains(&warning) {
            self.unknown_styles.push(warning);
        }
    }

    fn finish(self) -> (String, Vec<String>) {
        let mut markdown = String::new();
        let mut previous_list_item = false;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                markdown.push_str(if block.list_item && previous_list_item {
                    "\n"
                } else {
                    "\n\n"
                });
            }
            markdown.push_str(&block.text);
            previous_list_item = block.list_item;
        }
        if !markdown.is_empty() {
            markdown.push('\n');
        }

        let mut warnings = self.unknown_styles;
        if self.tables > 0 {
            warnings.push(format!(
                "{} table(s) flattened to paragraphs",
                self.tables
            ));
        }
        if self.images > 0 {
            warnings.push(format!("{} image(s) omitted", self.images));
        }
        (markdown, warnings)
    }
}
