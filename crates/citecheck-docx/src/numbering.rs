//! List definitions from `word/numbering.xml`.
//!
//! A paragraph refers to a list through `w:numId` + `w:ilvl`. The `w:num`
//! element maps the numId to an abstract definition whose `w:lvl` children
//! carry the number format for each nesting level.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};

use crate::ConvertError;
use crate::docx::{attr, xml_error};

#[derive(Debug, Clone, Default)]
pub(crate) struct NumberingDefinitions {
    /// abstractNumId → (ilvl → numFmt)
    formats: HashMap<i32, HashMap<i32, String>>,
    /// numId → abstractNumId
    num_to_abstract: HashMap<i32, i32>,
}

impl NumberingDefinitions {
    pub(crate) fn parse(xml: &str) -> Result<Self, ConvertError> {
        let mut defs = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;
        let decoder = reader.decoder();

        let mut current_abstract: Option<i32> = None;
        let mut current_level: Option<i32> = None;
        let mut current_num: Option<i32> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => {
                        current_abstract = attr_i32(&e, decoder, b"w:abstractNumId");
                    }
                    b"w:lvl" if current_abstract.is_some() => {
                        current_level = attr_i32(&e, decoder, b"w:ilvl");
                    }
                    b"w:numFmt" => {
                        if let (Some(abs), Some(lvl), Some(fmt)) =
                            (current_abstract, current_level, attr(&e, decoder, b"w:val"))
                        {
                            defs.formats.entry(abs).or_default().insert(lvl, fmt);
                        }
                    }
                    b"w:num" => {
                        current_num = attr_i32(&e, decoder, b"w:numId");
                    }
                    b"w:abstractNumId" => {
                        if let (Some(num), Some(abs)) = (current_num, attr_i32(&e, decoder, b"w:val")) {
                            defs.num_to_abstract.insert(num, abs);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => {
                        current_abstract = None;
                        current_level = None;
                    }
                    b"w:lvl" => current_level = None,
                    b"w:num" => current_num = None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error("word/numbering.xml", &e)),
                _ => {}
            }
        }

        Ok(defs)
    }

    /// Whether the list level renders with bullets rather than numbers.
    ///
    /// Lists without a definition are treated as bulleted.
    pub(crate) fn is_bullet(&self, num_id: i32, ilvl: i32) -> bool {
        self.num_to_abstract
            .get(&num_id)
            .and_then(|abs| self.formats.get(abs))
            .and_then(|levels| levels.get(&ilvl))
            .is_none_or(|fmt| matches!(fmt.as_str(), "bullet" | "none"))
    }
}

fn attr_i32(e: &BytesStart, decoder: Decoder, key: &[u8]) -> Option<i32> {
    attr(e, decoder, key).and_then(|v| v.parse().ok())
}
