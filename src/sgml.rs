//! OFXv1 (SGML) tree builder
//!
//! OFXv1 bodies are tag soup: leaf elements usually omit their closing tag
//! and aggregates sometimes do too. The builder keeps a stack of open nodes
//! and uses the schema registry to decide whether an opening tag starts a
//! leaf (text follows, closed implicitly by the next tag) or a container.

use crate::error::{ParseError, Result};
use crate::schema::{Registry, TagClass};
use crate::tree::{ElementTree, NodeId, Origin};
use std::borrow::Cow;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Open { tag: &'a str, at: usize },
    Close { tag: &'a str, at: usize },
    Text { text: &'a str, at: usize },
}

struct MarkupError {
    message: String,
    at: usize,
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Raw text between the current position and the next tag.
    fn upcoming_text(&self) -> &'a str {
        let rest = &self.src[self.pos..];
        let end = memchr::memchr(b'<', rest.as_bytes()).unwrap_or(rest.len());
        &rest[..end]
    }

    /// Name of the tag after the upcoming text, and whether it closes.
    fn upcoming_tag(&self) -> Option<(bool, &'a str)> {
        let start = self.pos + self.upcoming_text().len();
        let rest = self.src.get(start..)?.strip_prefix('<')?;
        if rest.starts_with('!') || rest.starts_with('?') {
            return None;
        }
        let end = memchr::memchr2(b'<', b'>', rest.as_bytes())?;
        let inner = rest[..end].trim();
        let (closing, name) = match inner.strip_prefix('/') {
            Some(name) => (true, name.trim()),
            None => (false, inner),
        };
        let name = name.split_ascii_whitespace().next()?;
        Some((closing, name))
    }

    fn skip_past(&mut self, start: usize, terminator: &[u8]) -> std::result::Result<(), MarkupError> {
        match memchr::memmem::find(&self.src.as_bytes()[start..], terminator) {
            Some(rel) => {
                self.pos = start + rel + terminator.len();
                Ok(())
            }
            None => Err(MarkupError {
                message: "unterminated markup declaration".into(),
                at: start,
            }),
        }
    }

    fn next_token(&mut self) -> std::result::Result<Option<Token<'a>>, MarkupError> {
        loop {
            let bytes = self.src.as_bytes();
            let start = self.pos;
            if start >= bytes.len() {
                return Ok(None);
            }

            if bytes[start] != b'<' {
                let end = memchr::memchr(b'<', &bytes[start..])
                    .map(|rel| start + rel)
                    .unwrap_or(bytes.len());
                self.pos = end;
                return Ok(Some(Token::Text {
                    text: &self.src[start..end],
                    at: start,
                }));
            }

            let rest = &bytes[start..];
            if rest.starts_with(b"<!--") {
                self.skip_past(start, b"-->")?;
                continue;
            }
            if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                self.skip_past(start, b">")?;
                continue;
            }

            let close = memchr::memchr2(b'<', b'>', &bytes[start + 1..])
                .map(|rel| start + 1 + rel)
                .filter(|&idx| bytes[idx] == b'>')
                .ok_or_else(|| MarkupError {
                    message: "unterminated tag".into(),
                    at: start,
                })?;
            self.pos = close + 1;

            let inner = self.src[start + 1..close].trim();
            let (closing, name) = match inner.strip_prefix('/') {
                Some(name) => (true, name.trim()),
                None => (false, inner),
            };
            let name = name.split_ascii_whitespace().next().unwrap_or("");
            if name.is_empty() {
                return Err(MarkupError {
                    message: "empty tag name".into(),
                    at: start,
                });
            }

            return Ok(Some(if closing {
                Token::Close { tag: name, at: start }
            } else {
                Token::Open { tag: name, at: start }
            }));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InBody,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    id: NodeId,
    leaf: bool,
}

struct SgmlBuilder<'r> {
    registry: &'r Registry,
    tree: ElementTree,
    stack: Vec<OpenNode>,
    state: State,
    origin: Origin,
}

impl<'r> SgmlBuilder<'r> {
    fn new(registry: &'r Registry, origin: Origin) -> Self {
        Self {
            registry,
            tree: ElementTree::new(),
            stack: Vec::new(),
            state: State::InBody,
            origin,
        }
    }

    fn open(
        &mut self,
        tag: &str,
        at: usize,
        upcoming: &str,
        next_tag: Option<(bool, &str)>,
    ) -> std::result::Result<(), MarkupError> {
        if self.state == State::Done {
            return Err(MarkupError {
                message: format!("element <{tag}> after the end of the document"),
                at,
            });
        }

        if self.stack.last().is_some_and(|top| top.leaf) {
            self.pop();
        }

        let leaf = match self.registry.classify(tag) {
            TagClass::Leaf => true,
            TagClass::Container => false,
            TagClass::Unknown => {
                let leaf = !upcoming.trim().is_empty() || self.is_empty_leaf(tag, next_tag);
                debug!(tag, leaf, "classified undeclared element by content");
                leaf
            }
        };

        let parent = self.stack.last().map(|top| top.id);
        let id = self.tree.push(parent, tag, self.origin.offset + at);
        self.stack.push(OpenNode { id, leaf });
        Ok(())
    }

    /// An undeclared element with no text is an empty leaf when the next tag
    /// closes it or is a declared child of the nearest known aggregate.
    fn is_empty_leaf(&self, tag: &str, next_tag: Option<(bool, &str)>) -> bool {
        match next_tag {
            Some((true, name)) => name == tag,
            Some((false, name)) => self
                .stack
                .iter()
                .rev()
                .find_map(|open| self.registry.lookup(self.tree.node(open.id).tag()))
                .is_some_and(|def| def.field(name).is_some()),
            None => false,
        }
    }

    fn text(&mut self, text: &str) {
        match self.stack.last() {
            Some(top) if top.leaf && self.tree.node(top.id).text().is_none() => {
                let value = unescape(text.trim());
                self.tree.set_text(top.id, value);
            }
            _ if !text.trim().is_empty() => {
                trace!(text = text.trim(), "ignoring text outside of a leaf element");
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: &str, at: usize) -> std::result::Result<(), MarkupError> {
        if self.state == State::Done {
            return Err(MarkupError {
                message: format!("closing tag </{tag}> after the end of the document"),
                at,
            });
        }

        let position = self
            .stack
            .iter()
            .rposition(|open| self.tree.node(open.id).tag() == tag)
            .ok_or_else(|| MarkupError {
                message: format!("closing tag </{tag}> does not match any open element"),
                at,
            })?;

        while self.stack.len() > position {
            self.pop();
        }
        if self.stack.is_empty() {
            self.state = State::Done;
        }
        Ok(())
    }

    fn pop(&mut self) {
        if let Some(open) = self.stack.pop() {
            if open.leaf && self.tree.node(open.id).text().is_none() {
                self.tree.set_text(open.id, String::new());
            }
            trace!(tag = self.tree.node(open.id).tag(), "closed element");
        }
    }

    fn finish(mut self) -> ElementTree {
        if !self.stack.is_empty() {
            debug!(open = self.stack.len(), "closing elements left open at end of input");
        }
        while !self.stack.is_empty() {
            self.pop();
        }
        self.tree
    }

    fn error(&self, body: &str, err: MarkupError) -> ParseError {
        self.origin.markup_error(body, err.at, err.message)
    }
}

/// Decode character entities; text with stray `&` is kept verbatim.
fn unescape(text: &str) -> String {
    match quick_xml::escape::unescape(text) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        Err(_) => text.to_string(),
    }
}

/// Build the element tree of a decoded OFXv1 body.
pub fn build_tree(body: &str, registry: &Registry, origin: Origin) -> Result<ElementTree> {
    let mut tokenizer = Tokenizer::new(body);
    let mut builder = SgmlBuilder::new(registry, origin);

    loop {
        let token = match tokenizer.next_token() {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(err) => return Err(builder.error(body, err)),
        };
        let step = match token {
            Token::Open { tag, at } => builder.open(
                tag,
                at,
                tokenizer.upcoming_text(),
                tokenizer.upcoming_tag(),
            ),
            Token::Close { tag, at } => builder.close(tag, at),
            Token::Text { text, .. } => {
                builder.text(text);
                Ok(())
            }
        };
        if let Err(err) = step {
            return Err(builder.error(body, err));
        }
    }

    let tree = builder.finish();
    if tree.is_empty() {
        return Err(origin.markup_error(body, body.len(), "document body contains no elements"));
    }
    debug!(nodes = tree.len(), "built SGML element tree");
    Ok(tree)
}
