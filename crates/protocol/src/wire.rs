//! Request body and header formats.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::ProtocolError;
use crate::block_id::BlockId;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Builds the commit body listing `ids` in the given order.
///
/// The service assembles the object in list order, so callers pass ids
/// sorted by block index.
pub fn block_list_xml(ids: &[BlockId]) -> String {
    let mut xml = String::with_capacity(XML_DECLARATION.len() + 24 + ids.len() * 25);
    xml.push_str(XML_DECLARATION);
    xml.push_str("<BlockList>");
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(&id.encoded());
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// Parses a commit body back into its ordered ids.
///
/// Accepts `Latest`, `Committed` and `Uncommitted` entries, which is what
/// the service allows in a block list. Namespaces, comments and processing
/// instructions are ignored.
pub fn parse_block_list(xml: &str) -> Result<Vec<BlockId>, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_list = false;
    let mut closed = false;
    let mut entry: Option<String> = None;
    let mut ids = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = element_name(e.local_name().as_ref())?;
                match (in_list, entry.is_some(), name.as_str()) {
                    (false, _, "BlockList") if !closed => in_list = true,
                    (true, false, "Latest" | "Committed" | "Uncommitted") => {
                        entry = Some(String::new());
                    }
                    _ => {
                        return Err(ProtocolError::BlockList(format!(
                            "unexpected element <{name}>"
                        )));
                    }
                }
            }
            Event::Empty(e) => {
                let name = element_name(e.local_name().as_ref())?;
                match (in_list, entry.is_some(), name.as_str()) {
                    (false, _, "BlockList") if !closed => closed = true,
                    (true, false, "Latest" | "Committed" | "Uncommitted") => {
                        ids.push(BlockId::from_encoded("")?);
                    }
                    _ => {
                        return Err(ProtocolError::BlockList(format!(
                            "unexpected element <{name}/>"
                        )));
                    }
                }
            }
            Event::Text(t) => match entry.as_mut() {
                Some(text) => text.push_str(&t.unescape().map_err(xml_error)?),
                None => {
                    return Err(ProtocolError::BlockList(format!(
                        "unexpected text: {}",
                        t.unescape().map_err(xml_error)?
                    )));
                }
            },
            Event::CData(c) => match entry.as_mut() {
                Some(text) => {
                    let bytes = c.into_inner();
                    let value = std::str::from_utf8(&bytes)
                        .map_err(|e| ProtocolError::BlockList(e.to_string()))?;
                    text.push_str(value);
                }
                None => return Err(ProtocolError::BlockList("unexpected CDATA".into())),
            },
            Event::End(_) => match entry.take() {
                Some(text) => ids.push(BlockId::from_encoded(text.trim())?),
                None if in_list => {
                    in_list = false;
                    closed = true;
                }
                None => return Err(ProtocolError::BlockList("unbalanced end tag".into())),
            },
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if !closed {
        return Err(ProtocolError::BlockList("missing <BlockList>".into()));
    }
    Ok(ids)
}

fn element_name(local: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(local)
        .map(str::to_owned)
        .map_err(|e| ProtocolError::BlockList(e.to_string()))
}

fn xml_error(err: quick_xml::Error) -> ProtocolError {
    ProtocolError::BlockList(err.to_string())
}

/// Formats a request date as RFC 1123 for the `x-ms-date` header.
pub fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
