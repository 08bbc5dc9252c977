use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::{TbaiError, round_half_up};

fn xml_io(e: std::io::Error) -> TbaiError {
    TbaiError::Xml(format!("write error: {e}"))
}

/// Output shape of a serialized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// XML declaration, no whitespace between elements.
    Compact,
    /// XML declaration, two-space indentation.
    Indented,
    /// No declaration and no whitespace. The form handed to the signer.
    Canonical,
}

pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new(layout: Layout) -> Result<Self, TbaiError> {
        let mut writer = match layout {
            Layout::Indented => Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
            Layout::Compact | Layout::Canonical => Writer::new(Cursor::new(Vec::new())),
        };
        if layout != Layout::Canonical {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(xml_io)?;
        }
        Ok(Self { writer })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    pub fn into_string(self) -> Result<String, TbaiError> {
        String::from_utf8(self.into_bytes())
            .map_err(|e| TbaiError::Xml(format!("UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, TbaiError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, TbaiError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, TbaiError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, TbaiError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Like `text_element`, but writes nothing for an empty value.
    pub fn text_element_opt(&mut self, name: &str, text: &str) -> Result<&mut Self, TbaiError> {
        if text.is_empty() {
            return Ok(self);
        }
        self.text_element(name, text)
    }

    /// Write pre-rendered XML verbatim.
    pub fn raw(&mut self, xml: &str) -> Result<&mut Self, TbaiError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(xml)))
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Amount at exactly two decimal places, rounded half away from zero.
pub fn format_amount(d: Decimal) -> String {
    let mut r = round_half_up(d, 2);
    r.rescale(2);
    r.to_string()
}

/// Percentage as a positive magnitude at two decimal places.
pub fn format_percent(d: Decimal) -> String {
    format_amount(d.abs())
}
