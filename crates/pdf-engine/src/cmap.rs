//! ToUnicode CMap parsing (`bfchar` and `bfrange` sections)

use std::collections::HashMap;

/// Ranges wider than this are truncated
const MAX_RANGE_SPAN: u32 = 0xFFFF;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ToUnicodeMap {
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Hex(Vec<u8>),
    Word(&'a [u8]),
    ArrayStart,
    ArrayEnd,
}

struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&byte) = self.data.get(self.pos) {
            if byte == b'%' {
                while let Some(&c) = self.data.get(self.pos) {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if byte.is_ascii_whitespace() || byte == 0 {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'%' | b'{' | b'}')
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let byte = *self.data.get(start)?;

        match byte {
            b'[' => {
                self.pos += 1;
                Some(Token::ArrayStart)
            }
            b']' => {
                self.pos += 1;
                Some(Token::ArrayEnd)
            }
            b'<' if self.data.get(start + 1) == Some(&b'<') => {
                self.pos += 2;
                Some(Token::Word(&self.data[start..self.pos]))
            }
            b'>' if self.data.get(start + 1) == Some(&b'>') => {
                self.pos += 2;
                Some(Token::Word(&self.data[start..self.pos]))
            }
            b'<' => {
                self.pos += 1;
                let body_start = self.pos;
                while self.data.get(self.pos).is_some_and(|&c| c != b'>') {
                    self.pos += 1;
                }
                let body = &self.data[body_start..self.pos];
                self.pos = (self.pos + 1).min(self.data.len());
                Some(Token::Hex(decode_hex(body)))
            }
            b'(' => {
                // Literal strings never carry mappings; skip them with nesting.
                let mut depth = 0usize;
                while let Some(&c) = self.data.get(self.pos) {
                    self.pos += 1;
                    match c {
                        b'\\' => self.pos += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Some(Token::Word(&self.data[start..self.pos.min(self.data.len())]))
            }
            _ => {
                self.pos += 1;
                while self
                    .data
                    .get(self.pos)
                    .is_some_and(|&c| !c.is_ascii_whitespace() && !is_delimiter(c))
                {
                    self.pos += 1;
                }
                Some(Token::Word(&self.data[start..self.pos]))
            }
        }
    }
}

fn decode_hex(body: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = body
        .iter()
        .filter_map(|&c| match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        })
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_from_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

impl ToUnicodeMap {
    pub(crate) fn parse(data: &[u8]) -> Self {
        let mut map = HashMap::new();
        let mut tokens = Tokenizer::new(data);

        while let Some(token) = tokens.next() {
            match token {
                Token::Word(b"beginbfchar") => parse_bfchar(&mut tokens, &mut map),
                Token::Word(b"beginbfrange") => parse_bfrange(&mut tokens, &mut map),
                _ => {}
            }
        }

        Self { map }
    }

    pub(crate) fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn parse_bfchar(tokens: &mut Tokenizer<'_>, map: &mut HashMap<u32, String>) {
    loop {
        let src = match tokens.next() {
            Some(Token::Hex(bytes)) => bytes,
            Some(Token::Word(b"endbfchar")) | None => return,
            Some(_) => continue,
        };
        if let Some(Token::Hex(dst)) = tokens.next() {
            map.insert(code_from_bytes(&src), String::from_utf16_lossy(&utf16_units(&dst)));
        }
    }
}

fn parse_bfrange(tokens: &mut Tokenizer<'_>, map: &mut HashMap<u32, String>) {
    loop {
        let low = match tokens.next() {
            Some(Token::Hex(bytes)) => code_from_bytes(&bytes),
            Some(Token::Word(b"endbfrange")) | None => return,
            Some(_) => continue,
        };
        let Some(Token::Hex(high)) = tokens.next() else {
            return;
        };
        let high = code_from_bytes(&high).min(low.saturating_add(MAX_RANGE_SPAN));

        match tokens.next() {
            Some(Token::Hex(dst)) => {
                let base = utf16_units(&dst);
                for (offset, code) in (low..=high).enumerate() {
                    let mut units = base.clone();
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(offset as u16);
                    }
                    map.insert(code, String::from_utf16_lossy(&units));
                }
            }
            Some(Token::ArrayStart) => {
                let mut code = low;
                while let Some(token) = tokens.next() {
                    match token {
                        Token::Hex(dst) => {
                            if code <= high {
                                map.insert(code, String::from_utf16_lossy(&utf16_units(&dst)));
                            }
                            code = code.saturating_add(1);
                        }
                        Token::ArrayEnd => break,
                        _ => {}
                    }
                }
            }
            _ => return,
        }
    }
}
