//! Path expressions for addressing nested config values
//!
//! A path is a dotted and/or bracketed expression such as `owner.name`,
//! `orgs.0.username` or `owner['credit card.number']`. Parsing yields a
//! [`Path`] of typed [`Segment`]s; the navigation helpers walk a
//! [`ConfigContents`](crate::ConfigContents) tree with them.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// One component of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key
    Key(String),
    /// Array index (also addresses objects by its decimal key)
    Index(usize),
}

impl Segment {
    /// The segment as an object key
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Segment::Key(key) => Cow::Borrowed(key),
            Segment::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    /// Build a segment from an unquoted token, treating canonical digit
    /// strings as indices
    ///
    /// `a.0` and `a[0]` address index 0; the quoted `a['0']` is the key `"0"`.
    pub fn key(token: &str) -> Self {
        match parse_index(token) {
            Some(index) => Segment::Index(index),
            None => Segment::Key(token.to_string()),
        }
    }

    fn empty_container(&self) -> Value {
        match self {
            Segment::Key(_) => Value::Object(Map::new()),
            Segment::Index(_) => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

fn parse_index(token: &str) -> Option<usize> {
    let canonical = token == "0" || (!token.starts_with('0') && !token.is_empty());
    if canonical && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// A parsed, non-empty sequence of segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a path expression
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for empty expressions, empty segments,
    /// unterminated brackets or quotes, and stray characters after a
    /// closing quote.
    ///
    /// # Example
    ///
    /// ```
    /// use crmkit::path::{Path, Segment};
    ///
    /// let path = Path::parse("owner['credit.card'].0")?;
    /// assert_eq!(path.segments(), &[
    ///     Segment::Key("owner".into()),
    ///     Segment::Key("credit.card".into()),
    ///     Segment::Index(0),
    /// ]);
    /// # Ok::<(), crmkit::Error>(())
    /// ```
    pub fn parse(expression: &str) -> Result<Self> {
        Parser::new(expression).parse()
    }

    /// Build a path from already-split segments
    ///
    /// Use this for keys taken from user data (usernames, aliases) so that
    /// dots, quotes or digits inside them are never interpreted as syntax.
    /// Segments are kept exactly as given.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if `segments` is empty.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidPath {
                expression: String::new(),
                reason: "path must have at least one segment".into(),
            });
        }
        Ok(Self { segments })
    }

    /// Single-segment path naming a top-level entry
    pub(crate) fn top_level(key: &str) -> Self {
        Self {
            segments: vec![Segment::Key(key.to_string())],
        }
    }

    /// Shorthand for a path made only of object keys
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if `keys` is empty.
    pub fn from_keys<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::from_segments(
            keys.into_iter()
                .map(|k| Segment::Key(k.into()))
                .collect(),
        )
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment; names the top-level entry the path lives under
    pub fn root(&self) -> &Segment {
        &self.segments[0]
    }

    /// Last segment; the unit the masking policy matches against
    pub fn terminal(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }

    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// A new path with `segment` appended
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Index(index) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{index}")?;
                }
                Segment::Key(key) if is_bare_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Key(key) => {
                    f.write_str("['")?;
                    for c in key.chars() {
                        if c == '\'' || c == '\\' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                    f.write_str("']")?;
                }
            }
        }
        Ok(())
    }
}

/// A key renders bare only if it re-parses to the same `Key` segment
fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && parse_index(key).is_none()
        && !key.contains(['.', '[', ']', '\'', '"'])
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    expression: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            chars: expression.char_indices().peekable(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidPath {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> Result<Path> {
        if self.expression.is_empty() {
            return Err(self.error("expression is empty"));
        }

        let mut segments = Vec::new();
        loop {
            match self.chars.peek() {
                Some((_, '[')) => {
                    self.chars.next();
                    segments.push(self.bracket()?);
                }
                Some(_) => segments.push(self.bare()?),
                None => return Err(self.error("expected a segment")),
            }

            // After a segment: end, '.', or another bracket
            match self.chars.peek() {
                None => break,
                Some((_, '.')) => {
                    self.chars.next();
                    if matches!(self.chars.peek(), None | Some((_, '.'))) {
                        return Err(self.error("empty segment after '.'"));
                    }
                }
                Some((_, '[')) => {}
                Some(&(pos, c)) => {
                    return Err(self.error(format!("unexpected '{c}' at position {pos}")));
                }
            }
        }

        Ok(Path { segments })
    }

    fn bare(&mut self) -> Result<Segment> {
        let mut token = String::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                '.' | '[' => break,
                ']' => return Err(self.error(format!("unmatched ']' at position {pos}"))),
                _ => {
                    token.push(c);
                    self.chars.next();
                }
            }
        }
        if token.is_empty() {
            return Err(self.error("empty segment"));
        }
        Ok(Segment::key(&token))
    }

    fn bracket(&mut self) -> Result<Segment> {
        match self.chars.peek() {
            Some(&(_, quote @ ('\'' | '"'))) => {
                self.chars.next();
                let key = self.quoted(quote)?;
                match self.chars.next() {
                    Some((_, ']')) => Ok(Segment::Key(key)),
                    Some((pos, c)) => {
                        Err(self.error(format!("expected ']' but found '{c}' at position {pos}")))
                    }
                    None => Err(self.error("unterminated '['")),
                }
            }
            _ => {
                let mut token = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, ']')) => break,
                        Some((_, c)) => token.push(c),
                        None => return Err(self.error("unterminated '['")),
                    }
                }
                let token = token.trim();
                if token.is_empty() {
                    return Err(self.error("empty brackets"));
                }
                Ok(Segment::key(token))
            }
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut key = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => key.push(escaped),
                    None => return Err(self.error("dangling escape")),
                },
                Some((_, c)) if c == quote => return Ok(key),
                Some((_, c)) => key.push(c),
                None => return Err(self.error(format!("unterminated {quote} quote"))),
            }
        }
    }
}

// =============================================================================
// IntoPath
// =============================================================================

/// Anything a store method accepts as an address
pub trait IntoPath {
    /// Convert into a parsed path
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the expression does not parse.
    fn into_path(self) -> Result<Path>;
}

impl IntoPath for &str {
    fn into_path(self) -> Result<Path> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<Path> {
        Path::parse(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Result<Path> {
        Path::parse(self)
    }
}

impl IntoPath for Path {
    fn into_path(self) -> Result<Path> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Result<Path> {
        Ok(self.clone())
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Resolve `path` for reading; missing segments yield `None`
pub(crate) fn lookup<'a>(root: &'a Map<String, Value>, path: &Path) -> Option<&'a Value> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = root.get(first.as_key().as_ref())?;
    for segment in rest {
        current = match (segment, current) {
            (_, Value::Object(map)) => map.get(segment.as_key().as_ref())?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable counterpart of [`lookup`]; never creates anything
pub(crate) fn lookup_mut<'a>(
    root: &'a mut Map<String, Value>,
    path: &Path,
) -> Option<&'a mut Value> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = root.get_mut(first.as_key().as_ref())?;
    for segment in rest {
        current = child_mut(current, segment)?;
    }
    Some(current)
}

fn child_mut<'a>(node: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (segment, node) {
        (_, Value::Object(map)) => map.get_mut(segment.as_key().as_ref()),
        (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
        _ => None,
    }
}

/// Most `null` slots a single write may pad an array with
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Resolve `path` for writing, creating intermediate containers
///
/// Returns the slot for the terminal segment (`null` if newly created).
/// The path is checked before anything is created, so on error `root` is
/// unchanged.
///
/// # Errors
///
/// Returns `Error::InvalidPath` if an index lies more than
/// [`MAX_ARRAY_PADDING`] past the end of its array.
pub(crate) fn slot_mut<'a>(
    root: &'a mut Map<String, Value>,
    path: &Path,
) -> Result<&'a mut Value> {
    check_writable(root, path)?;

    let mut current = root
        .entry(path.root().as_key().into_owned())
        .or_insert(Value::Null);
    for segment in &path.segments[1..] {
        current = child_slot(current, segment);
    }
    Ok(current)
}

fn check_writable(root: &Map<String, Value>, path: &Path) -> Result<()> {
    let mut current = root.get(path.root().as_key().as_ref());
    for segment in &path.segments[1..] {
        if let Segment::Index(index) = segment {
            let len = match current {
                Some(Value::Object(_)) => None,
                Some(Value::Array(items)) => Some(items.len()),
                _ => Some(0),
            };
            if let Some(len) = len {
                if index.saturating_sub(len) > MAX_ARRAY_PADDING {
                    return Err(Error::InvalidPath {
                        expression: path.to_string(),
                        reason: format!(
                            "index {index} is too far past the end of an array of length {len}"
                        ),
                    });
                }
            }
        }
        current = current.and_then(|node| match (segment, node) {
            (_, Value::Object(map)) => map.get(segment.as_key().as_ref()),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        });
    }
    Ok(())
}

fn child_slot<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match (segment, node) {
        (_, Value::Object(map)) => map
            .entry(segment.as_key().into_owned())
            .or_insert(Value::Null),
        (Segment::Index(index), Value::Array(items)) => {
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[*index]
        }
        (_, node) => {
            // Scalars (and arrays addressed by key) are replaced wholesale
            *node = segment.empty_container();
            child_slot(node, segment)
        }
    }
}

/// Remove the value at `path`, returning it if it was present
pub(crate) fn remove(root: &mut Map<String, Value>, path: &Path) -> Option<Value> {
    let Some((last, parents)) = path.segments.split_last() else {
        return None;
    };
    if parents.is_empty() {
        return root.shift_remove(last.as_key().as_ref());
    }

    let parent_path = Path {
        segments: parents.to_vec(),
    };
    match (last, lookup_mut(root, &parent_path)?) {
        (_, Value::Object(map)) => map.shift_remove(last.as_key().as_ref()),
        (Segment::Index(index), Value::Array(items)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        _ => None,
    }
}
