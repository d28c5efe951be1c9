//! Finite-language expansion of domain name patterns.
//!
//! A pattern is a small regular-expression dialect that always denotes a
//! finite set of names:
//!
//! ```text
//! www|mail            -> www, mail
//! node[1-3]           -> node1, node2, node3
//! (api|cdn)\.eu       -> api.eu, cdn.eu
//! srv\d{2}            -> srv00 .. srv99
//! ```
//!
//! Patterns are parsed into an AST and enumerated directly. Constructs that
//! would make the language infinite (`*`, `+`, `{m,}`) are rejected at parse
//! time, and the size of the language is computed before anything is
//! enumerated so an oversized pattern fails without partial output. The
//! size is counted before duplicates are removed, so it is an upper bound:
//! `(a|a){17}` names one host but is rejected as too large.

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

/// Upper bound on the number of names a single pattern may expand to.
pub const MAX_EXPANSION: usize = 65_536;

/// Characters matched by `.` and used as the universe for negated classes.
const HOSTNAME_ALPHABET: &str = "-0123456789abcdefghijklmnopqrstuvwxyz";

/// Errors produced while parsing or expanding a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The pattern contains an unbounded repetition.
    #[error("unbounded repetition `{op}` at offset {offset}")]
    Unbounded {
        /// Byte offset of the repetition operator.
        offset: usize,
        /// The operator as written.
        op: String,
    },

    /// The pattern denotes more names than the enumeration ceiling.
    #[error("pattern expands to more than {limit} names")]
    TooLarge {
        /// The ceiling that was exceeded.
        limit: usize,
    },

    /// The pattern is not valid in the supported dialect.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset where parsing failed.
        offset: usize,
        /// Description of the problem.
        message: String,
    },
}

/// Parsed pattern AST.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    /// Matches only the empty string (also used for anchors).
    Empty,
    Literal(char),
    /// Sorted, deduplicated set of characters.
    Class(Vec<char>),
    Concat(Vec<Node>),
    Alternate(Vec<Node>),
    Repeat { node: Box<Node>, min: u32, max: u32 },
}

impl Node {
    /// Number of strings this node enumerates (counting duplicates),
    /// saturating at `cap`.
    fn size(&self, cap: usize) -> usize {
        match self {
            Node::Empty | Node::Literal(_) => 1,
            Node::Class(chars) => chars.len().min(cap),
            Node::Concat(nodes) => {
                let sizes: Vec<usize> = nodes.iter().map(|n| n.size(cap)).collect();
                if sizes.contains(&0) {
                    return 0;
                }
                sizes
                    .into_iter()
                    .fold(1usize, |acc, s| acc.saturating_mul(s).min(cap))
            }
            Node::Alternate(nodes) => nodes
                .iter()
                .fold(0usize, |acc, n| acc.saturating_add(n.size(cap)).min(cap)),
            Node::Repeat { node, min, max } => {
                let inner = node.size(cap);
                match inner {
                    0 => usize::from(*min == 0),
                    1 => ((max - min) as usize).saturating_add(1).min(cap),
                    _ => {
                        let mut total = 0usize;
                        let mut power = 1usize;
                        for k in 0..=*max {
                            if k >= *min {
                                total = total.saturating_add(power);
                            }
                            if total >= cap {
                                return cap;
                            }
                            power = power.saturating_mul(inner).min(cap);
                        }
                        total
                    }
                }
            }
        }
    }

    fn enumerate(&self) -> Vec<String> {
        match self {
            Node::Empty => vec![String::new()],
            Node::Literal(c) => vec![c.to_string()],
            Node::Class(chars) => chars.iter().map(|c| c.to_string()).collect(),
            Node::Concat(nodes) => {
                // An empty factor empties the product; stop before building the rest.
                if nodes.iter().any(|n| n.size(1) == 0) {
                    return Vec::new();
                }
                nodes
                    .iter()
                    .fold(vec![String::new()], |acc, n| product(&acc, &n.enumerate()))
            }
            Node::Alternate(nodes) => nodes.iter().flat_map(Node::enumerate).collect(),
            Node::Repeat { node, min, max } => {
                if *max == 0 {
                    return vec![String::new()];
                }
                let inner = node.enumerate();
                let mut out = Vec::new();
                let mut current = vec![String::new()];
                for k in 0..=*max {
                    if k >= *min {
                        out.extend(current.iter().cloned());
                    }
                    if k == *max || current.is_empty() || inner.is_empty() {
                        break;
                    }
                    current = product(&current, &inner);
                }
                out
            }
        }
    }
}

/// Cartesian product with the right-hand side varying fastest.
fn product(left: &[String], right: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for a in left {
        for b in right {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            out.push(s);
        }
    }
    out
}

/// A parsed domain pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    root: Option<Node>,
}

impl Pattern {
    /// Parse a pattern. An empty string parses to a pattern with no names.
    pub fn parse(input: &str) -> Result<Self, PatternError> {
        if input.is_empty() {
            return Ok(Self { root: None });
        }

        let mut parser = Parser::new(input);
        let root = parser.parse_alternation()?;
        if let Some((offset, c)) = parser.peek() {
            return Err(syntax(offset, format!("unexpected `{c}`")));
        }
        Ok(Self { root: Some(root) })
    }

    /// Upper bound on the number of names, saturating just past `limit`.
    pub fn size_hint(&self, limit: usize) -> usize {
        self.root
            .as_ref()
            .map_or(0, |n| n.size(limit.saturating_add(1)))
    }

    /// Enumerate every name, failing if the language exceeds `limit`.
    ///
    /// Output order is canonical: alternation branches in order, shortest
    /// repetition first, characters of a class ascending, rightmost element
    /// varying fastest. Duplicates keep their first position.
    pub fn expand_with_limit(&self, limit: usize) -> Result<Vec<String>, PatternError> {
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };

        if self.size_hint(limit) > limit {
            return Err(PatternError::TooLarge { limit });
        }

        let mut seen = HashSet::new();
        Ok(root
            .enumerate()
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    /// Enumerate every name under the default ceiling.
    pub fn expand(&self) -> Result<Vec<String>, PatternError> {
        self.expand_with_limit(MAX_EXPANSION)
    }
}

/// Parse and expand a pattern in one step.
pub fn expand(pattern: &str) -> Result<Vec<String>, PatternError> {
    Pattern::parse(pattern)?.expand()
}

fn syntax(offset: usize, message: impl Into<String>) -> PatternError {
    PatternError::Syntax {
        offset,
        message: message.into(),
    }
}

fn digit_class() -> Vec<char> {
    ('0'..='9').collect()
}

fn word_class() -> Vec<char> {
    ('0'..='9')
        .chain('A'..='Z')
        .chain(std::iter::once('_'))
        .chain('a'..='z')
        .collect()
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.peek();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.input.len(), |(o, _)| o)
    }

    fn eat(&mut self, want: char) -> bool {
        match self.peek() {
            Some((_, c)) if c == want => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_alternation(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.parse_concat()?];
        while self.eat('|') {
            branches.push(self.parse_concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Node::Alternate(branches)
        })
    }

    fn parse_concat(&mut self) -> Result<Node, PatternError> {
        let mut items = Vec::new();
        while let Some((_, c)) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            items.push(self.parse_quantifier(atom)?);
        }
        Ok(match items.len() {
            0 => Node::Empty,
            1 => items.remove(0),
            _ => Node::Concat(items),
        })
    }

    fn parse_atom(&mut self) -> Result<Node, PatternError> {
        let Some((offset, c)) = self.bump() else {
            return Err(syntax(self.input.len(), "unexpected end of pattern"));
        };

        match c {
            '(' => {
                if self.eat('?') && !self.eat(':') {
                    return Err(syntax(offset, "only `(?:` groups are supported"));
                }
                let inner = self.parse_alternation()?;
                if !self.eat(')') {
                    return Err(syntax(offset, "unbalanced parenthesis"));
                }
                Ok(inner)
            }
            '[' => self.parse_class(offset),
            '.' => Ok(Node::Class(HOSTNAME_ALPHABET.chars().collect())),
            '^' | '$' => Ok(Node::Empty),
            '\\' => self.parse_escape(offset),
            '*' | '+' | '?' | '{' => Err(syntax(
                offset,
                format!("nothing to repeat before `{c}` (escape it as `\\{c}` for a literal)"),
            )),
            other => Ok(Node::Literal(other)),
        }
    }

    fn parse_escape(&mut self, offset: usize) -> Result<Node, PatternError> {
        match self.bump() {
            None => Err(syntax(offset, "trailing backslash")),
            Some((_, 'd')) => Ok(Node::Class(digit_class())),
            Some((_, 'w')) => Ok(Node::Class(word_class())),
            Some((at, c)) if c.is_ascii_alphanumeric() => {
                Err(syntax(at, format!("unsupported escape `\\{c}`")))
            }
            Some((_, c)) => Ok(Node::Literal(c)),
        }
    }

    fn parse_class(&mut self, open: usize) -> Result<Node, PatternError> {
        let negated = self.eat('^');
        let mut set = BTreeSet::new();
        let mut first = true;

        loop {
            let Some((at, c)) = self.bump() else {
                return Err(syntax(open, "unterminated character class"));
            };

            if c == ']' && !first {
                break;
            }
            first = false;

            let start = match c {
                '\\' => match self.bump() {
                    None => return Err(syntax(at, "trailing backslash")),
                    Some((_, 'd')) => {
                        set.extend(digit_class());
                        continue;
                    }
                    Some((_, 'w')) => {
                        set.extend(word_class());
                        continue;
                    }
                    Some((e, x)) if x.is_ascii_alphanumeric() => {
                        return Err(syntax(e, format!("unsupported escape `\\{x}`")));
                    }
                    Some((_, x)) => x,
                },
                other => other,
            };

            // A `-` between two members forms a range; leading/trailing `-` is literal.
            let is_range = matches!(self.peek(), Some((_, '-')))
                && !matches!(self.chars.get(self.pos + 1), Some((_, ']')) | None);
            if !is_range {
                set.insert(start);
                continue;
            }

            self.bump();
            let (end_at, end) = match self.bump() {
                Some((e, '\\')) => match self.bump() {
                    Some((_, x)) if !x.is_ascii_alphanumeric() => (e, x),
                    _ => return Err(syntax(e, "invalid range end")),
                },
                Some(pair) => pair,
                None => return Err(syntax(open, "unterminated character class")),
            };
            if end < start {
                return Err(syntax(end_at, format!("bad range `{start}-{end}`")));
            }
            set.extend(start..=end);
        }

        let chars: Vec<char> = if negated {
            HOSTNAME_ALPHABET
                .chars()
                .filter(|c| !set.contains(c))
                .collect()
        } else {
            set.into_iter().collect()
        };
        Ok(Node::Class(chars))
    }

    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, PatternError> {
        let Some((offset, c)) = self.peek() else {
            return Ok(atom);
        };

        let (min, max) = match c {
            '*' | '+' => {
                return Err(PatternError::Unbounded {
                    offset,
                    op: c.to_string(),
                })
            }
            '?' => {
                self.bump();
                (0, 1)
            }
            '{' => {
                self.bump();
                self.parse_braces(offset)?
            }
            _ => return Ok(atom),
        };

        // Lazy marker does not change the language.
        self.eat('?');

        if let Some((at, next)) = self.peek() {
            if matches!(next, '*' | '+' | '?' | '{') {
                return Err(syntax(at, "multiple repeat"));
            }
        }

        Ok(Node::Repeat {
            node: Box::new(atom),
            min,
            max,
        })
    }

    fn parse_braces(&mut self, open: usize) -> Result<(u32, u32), PatternError> {
        let min = self.parse_number()?;
        let (min, max) = if self.eat(',') {
            let max = self.parse_number()?;
            match max {
                Some(max) => (min.unwrap_or(0), max),
                None => {
                    return Err(PatternError::Unbounded {
                        offset: open,
                        op: format!("{{{},}}", min.unwrap_or(0)),
                    });
                }
            }
        } else {
            match min {
                Some(n) => (n, n),
                None => return Err(syntax(open, "expected repetition count")),
            }
        };

        if !self.eat('}') {
            return Err(syntax(open, "unterminated repetition"));
        }
        if min > max {
            return Err(syntax(open, format!("min {min} exceeds max {max}")));
        }
        Ok((min, max))
    }

    fn parse_number(&mut self) -> Result<Option<u32>, PatternError> {
        let start = self.offset();
        let mut value: Option<u32> = None;
        while let Some((_, c)) = self.peek() {
            let Some(digit) = c.to_digit(10) else { break };
            self.bump();
            value = Some(
                value
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| syntax(start, "repetition count too large"))?,
            );
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pattern: &str) -> Vec<String> {
        expand(pattern).unwrap()
    }

    #[test]
    fn test_literal_pattern() {
        assert_eq!(names("www"), vec!["www"]);
    }

    #[test]
    fn test_alternation_keeps_branch_order() {
        assert_eq!(names("mail|www|api"), vec!["mail", "www", "api"]);
    }

    #[test]
    fn test_character_class_range() {
        assert_eq!(names("node[1-3]"), vec!["node1", "node2", "node3"]);
    }

    #[test]
    fn test_class_is_sorted_and_deduplicated() {
        assert_eq!(names("[cab]"), vec!["a", "b", "c"]);
        assert_eq!(names("[aa]"), vec!["a"]);
    }

    #[test]
    fn test_class_leading_and_trailing_dash_is_literal() {
        assert_eq!(names("[-a]"), vec!["-", "a"]);
        assert_eq!(names("[a-]"), vec!["-", "a"]);
    }

    #[test]
    fn test_class_closing_bracket_first_is_literal() {
        assert_eq!(names("[]a]"), vec!["]", "a"]);
    }

    #[test]
    fn test_negated_class_uses_hostname_alphabet() {
        let out = names("[^a-z]");
        assert_eq!(out.len(), 11);
        assert_eq!(out[0], "-");
        assert_eq!(out[10], "9");
    }

    #[test]
    fn test_empty_negated_class_yields_nothing() {
        assert!(names("x[^-0-9a-z]").is_empty());
    }

    #[test]
    fn test_group_concatenation_rightmost_fastest() {
        assert_eq!(
            names("(a|b)(1|2)"),
            vec!["a1", "a2", "b1", "b2"]
        );
    }

    #[test]
    fn test_non_capturing_group() {
        assert_eq!(names("(?:x|y)z"), vec!["xz", "yz"]);
    }

    #[test]
    fn test_optional_is_shortest_first() {
        assert_eq!(names("www?"), vec!["ww", "www"]);
        assert_eq!(names("(www\\.)?app"), vec!["app", "www.app"]);
    }

    #[test]
    fn test_bounded_repetition() {
        assert_eq!(names("a{2}"), vec!["aa"]);
        assert_eq!(names("a{1,3}"), vec!["a", "aa", "aaa"]);
        assert_eq!(names("x{,1}"), vec!["", "x"]);
    }

    #[test]
    fn test_repetition_of_class() {
        let out = names("[ab]{2}");
        assert_eq!(out, vec!["aa", "ab", "ba", "bb"]);
    }

    #[test]
    fn test_digit_escape() {
        let out = names("srv\\d{2}");
        assert_eq!(out.len(), 100);
        assert_eq!(out.first().unwrap(), "srv00");
        assert_eq!(out.last().unwrap(), "srv99");
    }

    #[test]
    fn test_escaped_punctuation_is_literal() {
        assert_eq!(names("a\\.b"), vec!["a.b"]);
        assert_eq!(names("\\*"), vec!["*"]);
    }

    #[test]
    fn test_anchors_are_ignored() {
        assert_eq!(names("^www$"), vec!["www"]);
    }

    #[test]
    fn test_dot_matches_hostname_alphabet() {
        assert_eq!(names("a.").len(), HOSTNAME_ALPHABET.len());
    }

    #[test]
    fn test_duplicates_removed_keeping_first() {
        assert_eq!(names("a|b|a"), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_pattern_yields_empty_sequence() {
        assert!(names("").is_empty());
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let pattern = "(api|cdn)-[a-c]{1,2}(\\.eu)?";
        assert_eq!(names(pattern), names(pattern));
    }

    #[test]
    fn test_star_is_unbounded() {
        let err = expand("a*").unwrap_err();
        assert_eq!(
            err,
            PatternError::Unbounded {
                offset: 1,
                op: "*".to_string()
            }
        );
    }

    #[test]
    fn test_plus_is_unbounded() {
        assert!(matches!(
            expand("(ab)+"),
            Err(PatternError::Unbounded { .. })
        ));
    }

    #[test]
    fn test_open_ended_braces_are_unbounded() {
        assert!(matches!(
            expand("a{2,}"),
            Err(PatternError::Unbounded { offset: 1, .. })
        ));
    }

    #[test]
    fn test_oversized_pattern_fails_without_output() {
        let err = expand("[a-z]{4}").unwrap_err();
        assert_eq!(
            err,
            PatternError::TooLarge {
                limit: MAX_EXPANSION
            }
        );
    }

    #[test]
    fn test_huge_repetition_count_is_too_large() {
        assert!(matches!(
            expand("a{0,4000000000}"),
            Err(PatternError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_factor_short_circuits_large_product() {
        // 10^8 candidate prefixes, none of which survive the empty class.
        assert_eq!(expand("[0-9]{4}[0-9]{4}[^-0-9a-z]").unwrap(), Vec::<String>::new());
        assert_eq!(expand("(x[0-9]{4}[0-9]{4}[^-0-9a-z]|y)").unwrap(), vec!["y"]);
    }

    #[test]
    fn test_zero_repetition_skips_operand() {
        assert_eq!(expand("www([0-9]{4}[0-9]{4}){0}").unwrap(), vec!["www"]);
    }

    #[test]
    fn test_size_bound_counts_duplicates() {
        // One distinct name, but the bound is taken before deduplication.
        assert!(matches!(
            expand("(a|a){17}"),
            Err(PatternError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_custom_limit() {
        let pattern = Pattern::parse("[0-9]").unwrap();
        assert!(pattern.expand_with_limit(9).is_err());
        assert_eq!(pattern.expand_with_limit(10).unwrap().len(), 10);
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["(a", "a)", "[ab", "*", "a{x}", "a{3,1}", "\\q", "a??b?+", "(?=a)"] {
            assert!(
                matches!(Pattern::parse(bad), Err(PatternError::Syntax { .. })),
                "{bad} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_multiple_repeat_rejected() {
        assert!(matches!(
            Pattern::parse("a{2}{3}"),
            Err(PatternError::Syntax { .. })
        ));
    }
}
