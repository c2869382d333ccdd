//! Incremental parser for streamed turn content.
//!
//! The completion arrives as arbitrary text fragments whose concatenation
//! is one JSON object. [`ContentParser`] is a character-level state
//! machine over that object: it never needs the whole document, keeps
//! partial string values as they grow and reports which known fields
//! changed after every fragment. Unknown keys, and values of any shape
//! under them, are skipped. Text before the first `{` and after the
//! closing `}` is ignored, which tolerates Markdown code fences.

use serde::Serialize;
use troupe_core::error::DomainError;
use troupe_production::domain::{ContentField, TurnContent, VectorField};

/// The latest value of one field after a fragment was consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    /// The field that changed.
    pub field: ContentField,
    /// Its full value so far.
    pub value: String,
}

/// Result of a finished parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContent {
    /// Everything recovered from the stream.
    pub content: TurnContent,
    /// False when the stream ended before the object was closed.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    Vectors,
    Ignored,
}

#[derive(Debug)]
enum Frame {
    Object { scope: Scope, key: String },
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode { code: u32, digits: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    KeyOrEnd,
    Key(Escape),
    Colon,
    Value,
    ValueOrEnd,
    Str {
        sink: Option<ContentField>,
        escape: Escape,
    },
    Literal,
    AfterValue,
    Done,
}

enum StrStep {
    Char(char),
    Continue(Escape),
    End,
}

/// Streaming parser producing [`TurnContent`].
#[derive(Debug)]
pub struct ContentParser {
    state: State,
    frames: Vec<Frame>,
    content: TurnContent,
    high_surrogate: Option<u32>,
    touched: Vec<ContentField>,
    offset: usize,
}

impl Default for ContentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentParser {
    /// A parser waiting for the opening brace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Preamble,
            frames: Vec::new(),
            content: TurnContent::default(),
            high_surrogate: None,
            touched: Vec::new(),
            offset: 0,
        }
    }

    /// Content recovered so far.
    #[must_use]
    pub fn content(&self) -> &TurnContent {
        &self.content
    }

    /// Whether the top-level object has been closed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    /// Consume one fragment and return the fields it changed, in the order
    /// they were first touched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StreamParse` when the text cannot be part of a
    /// JSON object.
    pub fn feed(&mut self, fragment: &str) -> Result<Vec<FieldUpdate>, DomainError> {
        for c in fragment.chars() {
            self.step(c)?;
            self.offset += 1;
        }
        Ok(self
            .touched
            .drain(..)
            .map(|field| FieldUpdate {
                field,
                value: self.content.get(field).unwrap_or_default().to_owned(),
            })
            .collect())
    }

    /// End the parse.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StreamParse` if no object was ever opened.
    pub fn finish(self) -> Result<ParsedContent, DomainError> {
        match self.state {
            State::Preamble => Err(DomainError::StreamParse(
                "completion contained no JSON object".to_owned(),
            )),
            state => Ok(ParsedContent {
                content: self.content,
                complete: state == State::Done,
            }),
        }
    }

    fn step(&mut self, c: char) -> Result<(), DomainError> {
        match self.state {
            State::Preamble => {
                if c == '{' {
                    self.open_object(Scope::Root);
                }
            }
            State::Done => {}
            State::KeyOrEnd => match c {
                _ if c.is_ascii_whitespace() => {}
                '"' => {
                    if let Some(Frame::Object { key, .. }) = self.frames.last_mut() {
                        key.clear();
                    }
                    self.state = State::Key(Escape::None);
                }
                '}' => self.close(c)?,
                _ => return Err(self.unexpected(c, "a key or '}'")),
            },
            State::Key(escape) => {
                let (orphan, step) = self.string_char(c, escape)?;
                if let Some(Frame::Object { key, .. }) = self.frames.last_mut() {
                    key.extend(orphan);
                    if let StrStep::Char(ch) = step {
                        key.push(ch);
                    }
                }
                self.state = match step {
                    StrStep::Char(_) => State::Key(Escape::None),
                    StrStep::Continue(escape) => State::Key(escape),
                    StrStep::End => State::Colon,
                };
            }
            State::Colon => match c {
                _ if c.is_ascii_whitespace() => {}
                ':' => self.state = State::Value,
                _ => return Err(self.unexpected(c, "':'")),
            },
            State::Value => {
                if !c.is_ascii_whitespace() {
                    self.begin_value(c)?;
                }
            }
            State::ValueOrEnd => match c {
                _ if c.is_ascii_whitespace() => {}
                ']' => self.close(c)?,
                _ => self.begin_value(c)?,
            },
            State::Str { sink, escape } => {
                let (orphan, step) = self.string_char(c, escape)?;
                if let Some(field) = sink {
                    let value = self.content.field_mut(field);
                    value.extend(orphan);
                    if let StrStep::Char(ch) = step {
                        value.push(ch);
                    }
                    if orphan.is_some() || matches!(step, StrStep::Char(_)) {
                        self.touch(field);
                    }
                }
                self.state = match step {
                    StrStep::Char(_) => State::Str {
                        sink,
                        escape: Escape::None,
                    },
                    StrStep::Continue(escape) => State::Str { sink, escape },
                    StrStep::End => State::AfterValue,
                };
            }
            State::Literal => {
                if !is_literal_char(c) {
                    self.state = State::AfterValue;
                    return self.step(c);
                }
            }
            State::AfterValue => match c {
                _ if c.is_ascii_whitespace() => {}
                ',' => {
                    self.state = match self.frames.last() {
                        Some(Frame::Array) => State::ValueOrEnd,
                        _ => State::KeyOrEnd,
                    };
                }
                '}' | ']' => self.close(c)?,
                _ => return Err(self.unexpected(c, "',' or a closing bracket")),
            },
        }
        Ok(())
    }

    /// Decode one string character. The first element is the replacement
    /// for a high surrogate that this character leaves unpaired.
    fn string_char(
        &mut self,
        c: char,
        escape: Escape,
    ) -> Result<(Option<char>, StrStep), DomainError> {
        let step = match escape {
            Escape::None => match c {
                '"' => StrStep::End,
                '\\' => StrStep::Continue(Escape::Backslash),
                _ => StrStep::Char(c),
            },
            Escape::Backslash => match c {
                '"' | '\\' | '/' => StrStep::Char(c),
                'b' => StrStep::Char('\u{8}'),
                'f' => StrStep::Char('\u{c}'),
                'n' => StrStep::Char('\n'),
                'r' => StrStep::Char('\r'),
                't' => StrStep::Char('\t'),
                'u' => StrStep::Continue(Escape::Unicode { code: 0, digits: 0 }),
                _ => return Err(self.unexpected(c, "an escape character")),
            },
            Escape::Unicode { code, digits } => {
                let digit = c
                    .to_digit(16)
                    .ok_or_else(|| self.unexpected(c, "a hex digit"))?;
                let code = code * 16 + digit;
                if digits < 3 {
                    StrStep::Continue(Escape::Unicode {
                        code,
                        digits: digits + 1,
                    })
                } else {
                    return Ok(self.code_point(code));
                }
            }
        };
        let orphan = match step {
            // A low surrogate escape may still follow the backslash.
            StrStep::Continue(_) => None,
            StrStep::Char(_) | StrStep::End => self.orphaned_surrogate(),
        };
        Ok((orphan, step))
    }

    fn code_point(&mut self, code: u32) -> (Option<char>, StrStep) {
        match code {
            0xD800..=0xDBFF => {
                let orphan = self.orphaned_surrogate();
                self.high_surrogate = Some(code);
                (orphan, StrStep::Continue(Escape::None))
            }
            0xDC00..=0xDFFF => {
                let combined = self
                    .high_surrogate
                    .take()
                    .map(|high| 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00));
                let ch = combined
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                (None, StrStep::Char(ch))
            }
            _ => {
                let ch = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                (self.orphaned_surrogate(), StrStep::Char(ch))
            }
        }
    }

    fn orphaned_surrogate(&mut self) -> Option<char> {
        self.high_surrogate
            .take()
            .map(|_| char::REPLACEMENT_CHARACTER)
    }

    fn begin_value(&mut self, c: char) -> Result<(), DomainError> {
        match c {
            '"' => {
                let sink = self.sink();
                if let Some(field) = sink {
                    self.content.field_mut(field).clear();
                    self.touch(field);
                }
                self.state = State::Str {
                    sink,
                    escape: Escape::None,
                };
            }
            '{' => {
                let scope = match self.frames.last() {
                    Some(Frame::Object {
                        scope: Scope::Root,
                        key,
                    }) if key == "vectors" => Scope::Vectors,
                    _ => Scope::Ignored,
                };
                self.open_object(scope);
            }
            '[' => {
                self.frames.push(Frame::Array);
                self.state = State::ValueOrEnd;
            }
            _ if is_literal_char(c) => self.state = State::Literal,
            _ => return Err(self.unexpected(c, "a value")),
        }
        Ok(())
    }

    /// The field a string value under the current key is written to.
    fn sink(&self) -> Option<ContentField> {
        match self.frames.last()? {
            Frame::Object {
                scope: Scope::Root,
                key,
            } => ContentField::from_key(key),
            Frame::Object {
                scope: Scope::Vectors,
                key,
            } => VectorField::from_key(key).map(ContentField::Vector),
            _ => None,
        }
    }

    fn open_object(&mut self, scope: Scope) {
        self.frames.push(Frame::Object {
            scope,
            key: String::new(),
        });
        self.state = State::KeyOrEnd;
    }

    fn close(&mut self, bracket: char) -> Result<(), DomainError> {
        match (self.frames.last(), bracket) {
            (Some(Frame::Object { .. }), '}') | (Some(Frame::Array), ']') => {
                self.frames.pop();
            }
            _ => return Err(self.unexpected(bracket, "a matching bracket")),
        }
        self.state = if self.frames.is_empty() {
            State::Done
        } else {
            State::AfterValue
        };
        Ok(())
    }

    fn touch(&mut self, field: ContentField) {
        if !self.touched.contains(&field) {
            self.touched.push(field);
        }
    }

    fn unexpected(&self, c: char, expected: &str) -> DomainError {
        DomainError::StreamParse(format!(
            "unexpected {c:?} at character {}, expected {expected}",
            self.offset
        ))
    }
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')
}
