//! Pull-based markup tokens.
//!
//! [`HtmlTokenizer`] is a streaming tag lexer: every call to
//! [`Tokenize::next_token`] hands out one classified token, reading and
//! lexing another chunk of the underlying stream only when the queue of
//! already lexed tokens is empty. No tree is ever built.
//!
//! Tag and attribute names are lower-cased, attribute values and text have
//! their character references resolved, and every attribute of a tag is
//! reported in source order, repeated names included.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use tracing::debug;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest character reference body looked at, `#x10FFFF` fits
const MAX_CHAR_REF_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// A start or end tag. Names are lower-cased by the tokenizer and the
/// attribute list keeps the order the tokenizer reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<Attribute>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attribute {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag(Tag),
    EndTag(Tag),
    Text(String),
    Comment(String),
    /// Doctypes and anything else that is neither a tag, text nor a comment
    Other,
    /// End of document, or the stream could not be read any further
    End,
}

/// Capability to hand out the next classified token of a document.
///
/// Once [`Token::End`] has been returned every later call returns it again.
pub trait Tokenize {
    fn next_token(&mut self) -> Token;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Unquoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    TagOpen,
    EndTagOpen,
    TagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValue(Quote),
    AfterAttrValue,
    SelfClosing,
    /// After `<!`, waiting to see whether a comment follows
    MarkupDeclaration,
    Comment,
    /// Doctypes, `<?...>` and other declarations
    BogusComment,
    RawText,
    RawLessThan,
    RawEndTagName,
    Plaintext,
}

/// Element whose content is text up to its own end tag
struct RawContent {
    name: &'static str,
    char_refs: bool,
}

fn raw_content(name: &str) -> Option<RawContent> {
    let (name, char_refs) = match name {
        "script" => ("script", false),
        "style" => ("style", false),
        "xmp" => ("xmp", false),
        "iframe" => ("iframe", false),
        "noembed" => ("noembed", false),
        "noframes" => ("noframes", false),
        "noscript" => ("noscript", false),
        "plaintext" => ("plaintext", false),
        "title" => ("title", true),
        "textarea" => ("textarea", true),
        _ => return None,
    };
    Some(RawContent { name, char_refs })
}

#[derive(Default)]
struct PendingTag {
    end: bool,
    name: Vec<u8>,
    attrs: Vec<(Vec<u8>, Vec<u8>)>,
}

impl PendingTag {
    fn start_attr(&mut self) {
        self.attrs.push((Vec::new(), Vec::new()));
    }

    fn push_attr_name(&mut self, b: u8) {
        if let Some((name, _)) = self.attrs.last_mut() {
            name.push(b.to_ascii_lowercase());
        }
    }

    fn push_attr_value(&mut self, b: u8) {
        if let Some((_, value)) = self.attrs.last_mut() {
            value.push(b);
        }
    }

    fn into_tag(self) -> Tag {
        Tag {
            name: lossy(&self.name),
            attrs: self
                .attrs
                .into_iter()
                .map(|(key, value)| Attribute {
                    key: lossy(&key),
                    value: resolve_char_refs(&lossy(&value)),
                })
                .collect(),
        }
    }
}

/// Byte level state machine. Everything significant to markup is ASCII, so
/// bytes are only decoded once a whole token has been collected, which also
/// keeps multi-byte characters intact across read boundaries.
struct Lexer {
    state: State,
    text: Vec<u8>,
    tag: PendingTag,
    markup: Vec<u8>,
    raw: Option<RawContent>,
    tokens: VecDeque<Token>,
}

impl Lexer {
    fn new() -> Self {
        Self {
            state: State::Data,
            text: Vec::new(),
            tag: PendingTag::default(),
            markup: Vec::new(),
            raw: None,
            tokens: VecDeque::new(),
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.consume(b);
        }
    }

    fn consume(&mut self, b: u8) {
        match self.state {
            State::Data => match b {
                b'<' => self.state = State::TagOpen,
                _ => self.text.push(b),
            },
            State::TagOpen => match b {
                b'!' => {
                    self.markup.clear();
                    self.state = State::MarkupDeclaration;
                }
                b'/' => self.state = State::EndTagOpen,
                b'?' => {
                    self.markup.clear();
                    self.markup.push(b);
                    self.state = State::BogusComment;
                }
                _ if b.is_ascii_alphabetic() => self.open_tag(false, b),
                _ => {
                    self.text.push(b'<');
                    self.reconsume(State::Data, b);
                }
            },
            State::EndTagOpen => match b {
                b'>' => self.state = State::Data,
                _ if b.is_ascii_alphabetic() => self.open_tag(true, b),
                _ => {
                    self.markup.clear();
                    self.reconsume(State::BogusComment, b);
                }
            },
            State::TagName => match b {
                b'/' => self.state = State::SelfClosing,
                b'>' => self.emit_tag(),
                _ if b.is_ascii_whitespace() => self.state = State::BeforeAttrName,
                _ => self.tag.name.push(b.to_ascii_lowercase()),
            },
            State::BeforeAttrName => match b {
                b'/' | b'>' => self.reconsume(State::AfterAttrName, b),
                _ if b.is_ascii_whitespace() => {}
                _ => {
                    self.tag.start_attr();
                    if b == b'=' {
                        self.tag.push_attr_name(b);
                        self.state = State::AttrName;
                    } else {
                        self.reconsume(State::AttrName, b);
                    }
                }
            },
            State::AttrName => match b {
                b'/' | b'>' => self.reconsume(State::AfterAttrName, b),
                b'=' => self.state = State::BeforeAttrValue,
                _ if b.is_ascii_whitespace() => self.state = State::AfterAttrName,
                _ => self.tag.push_attr_name(b),
            },
            State::AfterAttrName => match b {
                b'/' => self.state = State::SelfClosing,
                b'=' => self.state = State::BeforeAttrValue,
                b'>' => self.emit_tag(),
                _ if b.is_ascii_whitespace() => {}
                _ => {
                    self.tag.start_attr();
                    self.reconsume(State::AttrName, b);
                }
            },
            State::BeforeAttrValue => match b {
                b'"' => self.state = State::AttrValue(Quote::Double),
                b'\'' => self.state = State::AttrValue(Quote::Single),
                b'>' => self.emit_tag(),
                _ if b.is_ascii_whitespace() => {}
                _ => self.reconsume(State::AttrValue(Quote::Unquoted), b),
            },
            State::AttrValue(quote) => match (quote, b) {
                (Quote::Double, b'"') | (Quote::Single, b'\'') => {
                    self.state = State::AfterAttrValue
                }
                (Quote::Unquoted, b'>') => self.emit_tag(),
                (Quote::Unquoted, _) if b.is_ascii_whitespace() => {
                    self.state = State::BeforeAttrName
                }
                _ => self.tag.push_attr_value(b),
            },
            State::AfterAttrValue => match b {
                b'/' => self.state = State::SelfClosing,
                b'>' => self.emit_tag(),
                _ if b.is_ascii_whitespace() => self.state = State::BeforeAttrName,
                _ => self.reconsume(State::BeforeAttrName, b),
            },
            State::SelfClosing => match b {
                b'>' => self.emit_tag(),
                _ => self.reconsume(State::BeforeAttrName, b),
            },
            State::MarkupDeclaration => match b {
                b'-' if self.markup.is_empty() => self.markup.push(b),
                b'-' => {
                    self.markup.clear();
                    self.state = State::Comment;
                }
                _ => self.reconsume(State::BogusComment, b),
            },
            State::Comment => match b {
                b'>' if self.markup.ends_with(b"--") => {
                    self.markup.truncate(self.markup.len() - 2);
                    self.emit_comment();
                }
                // `<!-->` and `<!--->` close straight away
                b'>' if self.markup.is_empty() || self.markup == b"-" => {
                    self.markup.clear();
                    self.emit_comment();
                }
                _ => self.markup.push(b),
            },
            State::BogusComment => match b {
                b'>' => self.emit_declaration(),
                _ => self.markup.push(b),
            },
            State::RawText => match b {
                b'<' => self.state = State::RawLessThan,
                _ => self.text.push(b),
            },
            State::RawLessThan => match b {
                b'/' => {
                    self.markup.clear();
                    self.state = State::RawEndTagName;
                }
                _ => {
                    self.text.push(b'<');
                    self.reconsume(State::RawText, b);
                }
            },
            State::RawEndTagName => {
                if b.is_ascii_alphabetic() {
                    self.markup.push(b);
                } else if (b == b'/' || b == b'>' || b.is_ascii_whitespace())
                    && self.closes_raw_content()
                {
                    self.flush_text();
                    let name = std::mem::take(&mut self.markup);
                    self.raw = None;
                    self.open_end_tag(name);
                    self.reconsume(State::TagName, b);
                } else {
                    self.text.extend_from_slice(b"</");
                    self.text.append(&mut self.markup);
                    self.reconsume(State::RawText, b);
                }
            }
            State::Plaintext => self.text.push(b),
        }
    }

    fn reconsume(&mut self, state: State, b: u8) {
        self.state = state;
        self.consume(b);
    }

    fn closes_raw_content(&self) -> bool {
        self.raw
            .as_ref()
            .is_some_and(|raw| self.markup.eq_ignore_ascii_case(raw.name.as_bytes()))
    }

    fn open_tag(&mut self, end: bool, first: u8) {
        self.tag = PendingTag {
            end,
            name: vec![first.to_ascii_lowercase()],
            attrs: Vec::new(),
        };
        self.state = State::TagName;
    }

    fn open_end_tag(&mut self, mut name: Vec<u8>) {
        name.make_ascii_lowercase();
        self.tag = PendingTag {
            end: true,
            name,
            attrs: Vec::new(),
        };
    }

    fn emit_tag(&mut self) {
        self.flush_text();
        let tag = std::mem::take(&mut self.tag);
        let end = tag.end;
        let tag = tag.into_tag();

        self.state = State::Data;
        if end {
            self.tokens.push_back(Token::EndTag(tag));
            return;
        }
        if let Some(raw) = raw_content(&tag.name) {
            self.state = if raw.name == "plaintext" {
                State::Plaintext
            } else {
                State::RawText
            };
            self.raw = Some(raw);
        }
        self.tokens.push_back(Token::StartTag(tag));
    }

    fn emit_comment(&mut self) {
        self.flush_text();
        let body = lossy(&std::mem::take(&mut self.markup));
        self.tokens.push_back(Token::Comment(body));
        self.state = State::Data;
    }

    fn emit_declaration(&mut self) {
        let is_doctype = self.markup.len() >= 7 && self.markup[..7].eq_ignore_ascii_case(b"doctype");
        if is_doctype {
            self.flush_text();
            self.markup.clear();
            self.tokens.push_back(Token::Other);
            self.state = State::Data;
        } else {
            self.emit_comment();
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = lossy(&std::mem::take(&mut self.text));
        let char_refs = self.raw.as_ref().is_none_or(|raw| raw.char_refs);
        let text = if char_refs {
            resolve_char_refs(&text)
        } else {
            text
        };
        self.tokens.push_back(Token::Text(text));
    }

    /// End of input. Half-read tags are dropped, anything else pending is
    /// emitted as it stands.
    fn finish(&mut self) {
        match self.state {
            State::TagOpen | State::RawLessThan => self.text.push(b'<'),
            State::EndTagOpen => self.text.extend_from_slice(b"</"),
            State::RawEndTagName => {
                self.text.extend_from_slice(b"</");
                self.text.append(&mut self.markup);
            }
            State::MarkupDeclaration | State::Comment => self.emit_comment(),
            State::BogusComment => self.emit_declaration(),
            _ => {}
        }
        self.flush_text();
        self.state = State::Data;
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Replace `&name;`, `&#123;` and `&#x7b;` references. Unknown names and
/// references without the closing `;` are kept as written.
fn resolve_char_refs(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match char_ref(rest) {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// The character a reference at the start of `s` stands for, and how many
/// bytes it spans
fn char_ref(s: &str) -> Option<(char, usize)> {
    let end = s
        .bytes()
        .take(MAX_CHAR_REF_LEN + 2)
        .position(|b| b == b';')?;
    let body = &s[1..end];

    let c = match body.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
                .filter(|c| *c != '\0')
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        }
        None => match body {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            _ => return None,
        },
    };
    Some((c, end + 1))
}

/// [`Tokenize`] over any byte stream.
pub struct HtmlTokenizer<R> {
    reader: R,
    lexer: Lexer,
    chunk: Box<[u8]>,
    exhausted: bool,
}

impl<R: Read> HtmlTokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lexer: Lexer::new(),
            chunk: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
            exhausted: false,
        }
    }

    fn pump(&mut self) {
        match self.reader.read(&mut self.chunk) {
            Ok(0) => {
                self.lexer.finish();
                self.exhausted = true;
            }
            Ok(n) => self.lexer.feed(&self.chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                debug!("Markup stream failed, treating as end of document: {}", e);
                self.lexer.finish();
                self.exhausted = true;
            }
        }
    }
}

impl<R: Read> Tokenize for HtmlTokenizer<R> {
    fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.lexer.tokens.pop_front() {
                return token;
            }
            if self.exhausted {
                return Token::End;
            }
            self.pump();
        }
    }
}
