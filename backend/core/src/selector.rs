//! Selector parsing.
//!
//! Covers the part of Selectors Level 4 that stored rules use in practice:
//! type and universal selectors, `#id`, `.class`, attribute selectors,
//! structural pseudo-classes, `:not()` / `:is()` / `:where()`, the four
//! combinators, and comma-separated lists. Everything else is rejected with
//! [`VeilError::InvalidSelector`] so callers can skip the rule.

use std::str::FromStr;

use crate::error::{Result, VeilError};

/// Relation between a compound selector and the one on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    NextSibling,
    /// `a ~ b`
    SubsequentSibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[attr]`
    Exists,
    /// `[attr=v]`
    Equals,
    /// `[attr~=v]`
    Includes,
    /// `[attr|=v]`
    DashMatch,
    /// `[attr^=v]`
    Prefix,
    /// `[attr$=v]`
    Suffix,
    /// `[attr*=v]`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub name: String,
    pub operator: AttrOperator,
    pub value: String,
    pub case_insensitive: bool,
}

/// An `an+b` expression, matched against 1-based positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    pub a: i64,
    pub b: i64,
}

impl Nth {
    pub fn matches(&self, index: usize) -> bool {
        // i128 holds every difference of an i64 and a usize position.
        let (a, b) = (i128::from(self.a), i128::from(self.b));
        let index = index as i128;
        if a == 0 {
            return index == b;
        }
        let diff = index - b;
        diff % a == 0 && diff / a >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    Root,
    Empty,
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Not(SelectorList),
    /// `:is()` and `:where()` (specificity is irrelevant here).
    Is(SelectorList),
}

/// A sequence of simple selectors with no combinator, e.g. `div.card:nth-of-type(2)`.
///
/// `tag == None` means any element (`*` or no type selector at all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
    pub pseudos: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub compound: Compound,
    /// Relation to the previous (left) part; `None` for the first part.
    pub combinator: Option<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    pub parts: Vec<Part>,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        let list = parser.parse_list(false)?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(list)
    }
}

impl FromStr for SelectorList {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Number of compound selectors in the longest complex selector of `selector`.
///
/// Returns 0 for input that does not parse.
pub fn segment_count(selector: &str) -> usize {
    SelectorList::parse(selector)
        .map(|list| list.selectors.iter().map(|c| c.parts.len()).max().unwrap_or(0))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000C}')
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> VeilError {
        VeilError::invalid_selector(
            self.source,
            format!("{} at offset {}", reason.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Returns whether any whitespace was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_ws) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_list(&mut self, nested: bool) -> Result<SelectorList> {
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_complex(nested)?);
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self, nested: bool) -> Result<Complex> {
        let mut parts = vec![Part {
            compound: self.parse_compound()?,
            combinator: None,
        }];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some(')') if nested => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected character '{c}'"))),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_ws();
            }
            parts.push(Part {
                compound: self.parse_compound()?,
                combinator: Some(combinator),
            });
        }
        Ok(Complex { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut empty = true;

        if self.eat('*') {
            empty = false;
        } else if self.at_ident_start() {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            empty = false;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    compound.ids.push(id);
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.parse_ident()?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    let attr = self.parse_attr()?;
                    compound.attrs.push(attr);
                }
                Some(':') => {
                    let pseudo = self.parse_pseudo()?;
                    compound.pseudos.push(pseudo);
                }
                _ => break,
            }
            empty = false;
        }

        if empty {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn at_ident_start(&self) -> bool {
        let valid_escape = |next: Option<char>| next.is_some_and(|c| c != '\n');
        match self.peek() {
            Some('-') => match self.peek_at(1) {
                Some('\\') => valid_escape(self.peek_at(2)),
                Some(c) => is_name_start(c) || c == '-',
                None => false,
            },
            Some('\\') => valid_escape(self.peek_at(1)),
            Some(c) => is_name_start(c),
            None => false,
        }
    }

    fn parse_ident(&mut self) -> Result<String> {
        if !self.at_ident_start() {
            return Err(self.error("expected an identifier"));
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                out.push(self.parse_escape()?);
            } else if is_name_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Consume a backslash escape and return the character it denotes.
    fn parse_escape(&mut self) -> Result<char> {
        self.pos += 1;
        match self.peek() {
            None | Some('\n') => Err(self.error("invalid escape")),
            Some(c) if c.is_ascii_hexdigit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 6 {
                    let Some(digit) = self.peek().and_then(|h| h.to_digit(16)) else {
                        break;
                    };
                    value = value * 16 + digit;
                    digits += 1;
                    self.pos += 1;
                }
                if self.peek().is_some_and(is_ws) {
                    self.pos += 1;
                }
                Ok(char::from_u32(value)
                    .filter(|_| value != 0)
                    .unwrap_or('\u{FFFD}'))
            }
            Some(c) => {
                self.pos += 1;
                Ok(c)
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') if self.peek_at(1) == Some('\n') => self.pos += 2,
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_attr(&mut self) -> Result<AttrSelector> {
        self.pos += 1;
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        let operator = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    operator: AttrOperator::Exists,
                    value: String::new(),
                    case_insensitive: false,
                });
            }
            (Some('='), _) => {
                self.pos += 1;
                AttrOperator::Equals
            }
            (Some(c @ ('~' | '|' | '^' | '$' | '*')), Some('=')) => {
                self.pos += 2;
                match c {
                    '~' => AttrOperator::Includes,
                    '|' => AttrOperator::DashMatch,
                    '^' => AttrOperator::Prefix,
                    '$' => AttrOperator::Suffix,
                    _ => AttrOperator::Substring,
                }
            }
            _ => return Err(self.error("expected an attribute operator")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.parse_string(q)?,
            _ => self.parse_ident()?,
        };
        self.skip_ws();

        let mut case_insensitive = false;
        match self.peek() {
            Some('i' | 'I') => {
                self.pos += 1;
                case_insensitive = true;
            }
            Some('s' | 'S') => self.pos += 1,
            _ => {}
        }
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }

        Ok(AttrSelector {
            name,
            operator,
            value,
            case_insensitive,
        })
    }

    fn parse_pseudo(&mut self) -> Result<PseudoClass> {
        self.pos += 1;
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-elements are not supported"));
        }
        let name = self.parse_ident()?.to_ascii_lowercase();

        if self.eat('(') {
            self.skip_ws();
            let pseudo = match name.as_str() {
                "nth-child" => PseudoClass::NthChild(self.parse_nth()?),
                "nth-last-child" => PseudoClass::NthLastChild(self.parse_nth()?),
                "nth-of-type" => PseudoClass::NthOfType(self.parse_nth()?),
                "nth-last-of-type" => PseudoClass::NthLastOfType(self.parse_nth()?),
                "not" => PseudoClass::Not(self.parse_list(true)?),
                "is" | "where" => PseudoClass::Is(self.parse_list(true)?),
                _ => return Err(self.error(format!("unsupported pseudo-class ':{name}()'"))),
            };
            self.skip_ws();
            if !self.eat(')') {
                return Err(self.error("expected ')'"));
            }
            return Ok(pseudo);
        }

        match name.as_str() {
            "root" => Ok(PseudoClass::Root),
            "empty" => Ok(PseudoClass::Empty),
            "first-child" => Ok(PseudoClass::FirstChild),
            "last-child" => Ok(PseudoClass::LastChild),
            "only-child" => Ok(PseudoClass::OnlyChild),
            "first-of-type" => Ok(PseudoClass::FirstOfType),
            "last-of-type" => Ok(PseudoClass::LastOfType),
            "only-of-type" => Ok(PseudoClass::OnlyOfType),
            _ => Err(self.error(format!("unsupported pseudo-class ':{name}'"))),
        }
    }

    fn parse_nth(&mut self) -> Result<Nth> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')') {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| !is_ws(**c))
            .collect::<String>()
            .to_ascii_lowercase();
        parse_nth_expr(&raw).ok_or_else(|| self.error(format!("invalid nth expression '{raw}'")))
    }
}

fn parse_nth_expr(raw: &str) -> Option<Nth> {
    match raw {
        "odd" => return Some(Nth { a: 2, b: 1 }),
        "even" => return Some(Nth { a: 2, b: 0 }),
        _ => {}
    }

    let Some((a_part, b_part)) = raw.split_once('n') else {
        return raw.parse::<i64>().ok().map(|b| Nth { a: 0, b });
    };

    let a = match a_part {
        "" | "+" => 1,
        "-" => -1,
        s => s.parse::<i64>().ok()?,
    };
    let unsigned = |digits: &str| -> Option<i64> {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<i64>().ok()
    };
    let b = if b_part.is_empty() {
        0
    } else if let Some(digits) = b_part.strip_prefix('+') {
        unsigned(digits)?
    } else if let Some(digits) = b_part.strip_prefix('-') {
        -unsigned(digits)?
    } else {
        return None;
    };
    Some(Nth { a, b })
}
