//! `.dockerignore`-style exclusion rules.
//!
//! One pattern per line. Blank lines and `#` comments are skipped, a leading
//! `!` re-includes, `*`/`?`/`[...]` match within one path segment and `**`
//! spans any number of segments. A pattern that matches a directory also
//! matches everything beneath it. The last matching pattern decides.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Parsed ignore rules for one source tree.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
struct Pattern {
    negate: bool,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    AnyDirs,
    Glob(Vec<Token>),
}

#[derive(Debug, Clone)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl IgnoreRules {
    /// Read `file_name` under `root`. A missing file means "ignore nothing".
    pub fn load(root: &Path, file_name: &str) -> Result<Self, IgnoreError> {
        let path = root.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ignore file");
                Ok(Self::default())
            }
            Err(e) => Err(IgnoreError::Read { path, source: e }),
        }
    }

    /// Parse ignore file content. `origin` is only used in error messages.
    pub fn parse(origin: &Path, content: &str) -> Result<Self, IgnoreError> {
        let mut patterns = Vec::new();

        for (n, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pattern_error = |reason: &'static str| IgnoreError::Pattern {
                path: origin.to_path_buf(),
                line: n + 1,
                pattern: line.to_owned(),
                reason,
            };

            let (negate, body) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            if body.is_empty() {
                return Err(pattern_error("negation without a pattern"));
            }

            let segments = compile(body).map_err(pattern_error)?;
            if segments.is_empty() {
                continue;
            }
            patterns.push(Pattern { negate, segments });
        }

        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a `/`-separated path relative to the root is excluded.
    pub fn matches(&self, rel: &str) -> bool {
        let parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(&parts) {
                ignored = !pattern.negate;
            }
        }
        ignored
    }

    /// Whether a directory can be skipped without walking into it: it is
    /// excluded and no `!` rule could bring back anything below it.
    pub fn prunes_dir(&self, rel: &str) -> bool {
        self.matches(rel) && !self.patterns.iter().any(|p| p.negate)
    }
}

impl Pattern {
    fn matches(&self, parts: &[&str]) -> bool {
        // Prefix semantics: matching any leading run of directories counts.
        (1..=parts.len()).any(|k| match_segments(&self.segments, &parts[..k]))
    }
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDirs, rest)) => {
            (0..=parts.len()).any(|i| match_segments(rest, &parts[i..]))
        }
        Some((Segment::Glob(tokens), rest)) => match parts.split_first() {
            Some((part, tail)) => {
                let chars: Vec<char> = part.chars().collect();
                match_tokens(tokens, &chars) && match_segments(rest, tail)
            }
            None => false,
        },
    }
}

fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return text.is_empty();
    };

    match token {
        Token::AnyRun => (0..=text.len()).any(|i| match_tokens(rest, &text[i..])),
        Token::AnyChar => !text.is_empty() && match_tokens(rest, &text[1..]),
        Token::Literal(c) => text.first() == Some(c) && match_tokens(rest, &text[1..]),
        Token::Class { negated, ranges } => match text.first() {
            Some(c) => {
                let hit = ranges.iter().any(|(lo, hi)| lo <= c && c <= hi);
                hit != *negated && match_tokens(rest, &text[1..])
            }
            None => false,
        },
    }
}

fn compile(body: &str) -> Result<Vec<Segment>, &'static str> {
    let mut cleaned = body;
    loop {
        if let Some(rest) = cleaned.strip_prefix("./") {
            cleaned = rest;
        } else if let Some(rest) = cleaned.strip_prefix('/') {
            cleaned = rest;
        } else {
            break;
        }
    }

    cleaned
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| {
            if s == "**" {
                Ok(Segment::AnyDirs)
            } else {
                tokenize(s).map(Segment::Glob)
            }
        })
        .collect()
}

fn tokenize(segment: &str) -> Result<Vec<Token>, &'static str> {
    let mut tokens = Vec::new();
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // Consecutive stars inside a segment behave like one.
                if !matches!(tokens.last(), Some(Token::AnyRun)) {
                    tokens.push(Token::AnyRun);
                }
            }
            '?' => tokens.push(Token::AnyChar),
            '\\' => match chars.next() {
                Some(escaped) => tokens.push(Token::Literal(escaped)),
                None => return Err("trailing escape character"),
            },
            '[' => tokens.push(parse_class(&mut chars)?),
            other => tokens.push(Token::Literal(other)),
        }
    }

    Ok(tokens)
}

fn parse_class(chars: &mut std::str::Chars<'_>) -> Result<Token, &'static str> {
    let mut negated = false;
    let mut ranges = Vec::new();
    let mut first = true;

    loop {
        let Some(c) = chars.next() else {
            return Err("unterminated character class");
        };

        match c {
            '!' | '^' if first => negated = true,
            ']' if !ranges.is_empty() => return Ok(Token::Class { negated, ranges }),
            ']' => return Err("empty character class"),
            _ => {
                let lo = if c == '\\' {
                    chars.next().ok_or("unterminated character class")?
                } else {
                    c
                };

                let mut lookahead = chars.clone();
                if lookahead.next() == Some('-') && lookahead.clone().next().is_some_and(|n| n != ']') {
                    chars.next();
                    let hi = chars.next().ok_or("unterminated character class")?;
                    if hi < lo {
                        return Err("inverted character range");
                    }
                    ranges.push((lo, hi));
                } else {
                    ranges.push((lo, lo));
                }
            }
        }
        first = false;
    }
}

/// Warn when a `.env` file at the root would be shipped to the builder.
///
/// Returns `true` if the warning fired.
pub fn warn_unignored_env(root: &Path, rules: &IgnoreRules) -> bool {
    let leaked = root.join(".env").is_file() && !rules.matches(".env");
    if leaked {
        warn!(
            root = %root.display(),
            "a .env file is not covered by the ignore file and will be uploaded"
        );
    }
    leaked
}

#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    #[error("failed to read ignore file {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid ignore pattern {pattern:?} at {path}:{line}: {reason}")]
    Pattern {
        path: PathBuf,
        line: usize,
        pattern: String,
        reason: &'static str,
    },
}
