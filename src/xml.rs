//! OFXv2 (XML) tree builder
//!
//! OFXv2 bodies are well-formed XML, so the work is delegated to quick-xml
//! and the events are folded into the same [`ElementTree`] the SGML builder
//! produces. Childless elements become leaves unless the registry knows the
//! tag as an aggregate.

use crate::error::Result;
use crate::schema::Registry;
use crate::tree::{ElementTree, NodeId, Origin};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use tracing::debug;

struct Frame {
    id: NodeId,
    has_children: bool,
    has_text: bool,
}

struct XmlBuilder<'r> {
    registry: &'r Registry,
    tree: ElementTree,
    stack: Vec<Frame>,
    closed_root: bool,
}

impl<'r> XmlBuilder<'r> {
    fn open(&mut self, tag: &str, offset: usize) -> std::result::Result<NodeId, String> {
        if self.closed_root {
            return Err(format!("element <{tag}> after the end of the document"));
        }
        let parent = match self.stack.last_mut() {
            Some(frame) if frame.has_text => {
                return Err(format!("element <{tag}> mixed with text content"));
            }
            Some(frame) => {
                frame.has_children = true;
                Some(frame.id)
            }
            None => None,
        };
        let id = self.tree.push(parent, tag, offset);
        self.stack.push(Frame {
            id,
            has_children: false,
            has_text: false,
        });
        Ok(id)
    }

    fn text(&mut self, text: String) -> std::result::Result<(), String> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None if text.trim().is_empty() => return Ok(()),
            None => return Err("text outside of the root element".into()),
        };
        if frame.has_children {
            return Err(format!(
                "text mixed with child elements in <{}>",
                self.tree.node(frame.id).tag()
            ));
        }
        frame.has_text = true;
        let id = frame.id;
        let value = match self.tree.node(id).text() {
            Some(existing) => format!("{existing}{text}"),
            None => text,
        };
        self.tree.set_text(id, value.trim().to_string());
        Ok(())
    }

    fn close(&mut self) {
        if let Some(frame) = self.stack.pop() {
            let tag = self.tree.node(frame.id).tag();
            if !frame.has_children && !frame.has_text && !self.registry.is_container(tag) {
                self.tree.set_text(frame.id, String::new());
            }
        }
        if self.stack.is_empty() {
            self.closed_root = true;
        }
    }
}

fn decode_text(raw: &[u8], unescaped: std::result::Result<Cow<'_, str>, quick_xml::Error>) -> String {
    match unescaped {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Build the element tree of a decoded OFXv2 body.
pub fn build_tree(body: &str, registry: &Registry, origin: Origin) -> Result<ElementTree> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut builder = XmlBuilder {
        registry,
        tree: ElementTree::new(),
        stack: Vec::new(),
        closed_root: false,
    };

    loop {
        let position = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|err| {
            let at = reader.error_position() as usize;
            origin.markup_error(body, at, err.to_string())
        })?;

        let step = match event {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                builder.open(&tag, origin.offset + position).map(|_| ())
            }
            Event::Empty(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                builder.open(&tag, origin.offset + position).map(|_| builder.close())
            }
            Event::End(_) => {
                builder.close();
                Ok(())
            }
            Event::Text(text) => {
                let value = decode_text(&text, text.unescape());
                builder.text(value)
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                builder.text(value)
            }
            Event::Eof => break,
            // Declarations, processing instructions, comments, doctype
            _ => Ok(()),
        };
        step.map_err(|message| origin.markup_error(body, position, message))?;
    }

    if let Some(frame) = builder.stack.last() {
        let tag = builder.tree.node(frame.id).tag().to_string();
        return Err(origin.markup_error(body, body.len(), format!("unclosed element <{tag}>")));
    }
    if builder.tree.is_empty() {
        return Err(origin.markup_error(body, body.len(), "document body contains no elements"));
    }
    debug!(nodes = builder.tree.len(), "built XML element tree");
    Ok(builder.tree)
}
