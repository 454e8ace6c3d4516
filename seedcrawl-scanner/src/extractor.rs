use crate::token::{Attribute, HtmlTokenizer, Tag, Token, Tokenize};
use std::io::Read;
use std::iter::FusedIterator;

/// Links are only accepted when they start with this prefix. It is a plain
/// prefix match, so `https://` passes and so does anything else spelled
/// `http...`, while relative and protocol-relative links never do.
pub const LINK_PREFIX: &str = "http";

/// Lazily extract absolute links from the anchors of a markup stream
pub fn extract<R: Read>(stream: R) -> Links<HtmlTokenizer<R>> {
    Links::new(HtmlTokenizer::new(stream))
}

/// Single pass iterator over the links of one document.
///
/// Pulls one token at a time and never looks further ahead. The stream is
/// released when the iterator is dropped.
pub struct Links<T> {
    tokens: T,
    finished: bool,
}

impl<T: Tokenize> Links<T> {
    pub fn new(tokens: T) -> Self {
        Self {
            tokens,
            finished: false,
        }
    }
}

impl<T: Tokenize> Iterator for Links<T> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        loop {
            match self.tokens.next_token() {
                Token::End => {
                    self.finished = true;
                    return None;
                }
                Token::StartTag(tag) => {
                    if let Some(link) = anchor_link(tag) {
                        return Some(link);
                    }
                }
                Token::EndTag(_) | Token::Text(_) | Token::Comment(_) | Token::Other => {}
            }
        }
    }
}

impl<T: Tokenize> FusedIterator for Links<T> {}

fn anchor_link(tag: Tag) -> Option<String> {
    if tag.name != "a" {
        return None;
    }
    href(&tag.attrs)
        .filter(|candidate| is_absolute(candidate))
        .map(str::to_string)
}

/// Value of the `href` attribute; the last one wins when it is repeated
pub fn href(attrs: &[Attribute]) -> Option<&str> {
    attrs
        .iter()
        .rev()
        .find(|attr| attr.key == "href")
        .map(|attr| attr.value.as_str())
}

pub fn is_absolute(candidate: &str) -> bool {
    candidate.starts_with(LINK_PREFIX)
}
