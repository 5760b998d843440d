//! Parsing and expansion of `$(NAME)` variable references.
//!
//! Values and target commands may reference other variables. References are
//! expanded against the resolved configuration, never against the process
//! environment.
//!
//! # Reference Formats
//!
//! - `$(NAME)` - value of `NAME`, empty when undefined
//! - `$($(PREFIX)_NAME)` - computed name: the inner reference is expanded
//!   first, then the resulting text is looked up as a name
//!
//! # Shell Variables
//!
//! A `$` not followed by `(` passes through unchanged, so `$HOME` and
//! `${HOME}` reach the shell as written.
//!
//! # Escaping
//!
//! `$$` produces a literal `$`, so `$$(date)` reaches the shell as `$(date)`.
//!
//! # Example
//!
//! ```
//! use openbar_lib::config::expand::{parse, Segment};
//!
//! let segments = parse("$(OB_BUILD_DIR)/out:$HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Reference(vec![Segment::Literal("OB_BUILD_DIR".to_string())]),
//!     Segment::Literal("/out:$HOME".to_string()),
//! ]);
//! ```

use super::types::ConfigError;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text.
  Literal(String),

  /// A reference whose name is itself made of segments.
  Reference(Vec<Segment>),
}

/// Looks up variable values during expansion.
pub trait Resolver {
  /// Return the fully expanded value of `name`, or an empty string.
  fn resolve(&mut self, name: &str) -> Result<String, ConfigError>;
}

/// Parse a string into literal and reference segments.
///
/// # Errors
///
/// Returns [`ConfigError::Unclosed`] if a `$(` has no matching `)`.
pub fn parse(input: &str) -> Result<Vec<Segment>, ConfigError> {
  let chars: Vec<char> = input.chars().collect();
  let mut pos = 0;
  let segments = parse_segments(input, &chars, &mut pos, None)?;
  Ok(segments)
}

fn parse_segments(
  input: &str,
  chars: &[char],
  pos: &mut usize,
  opened_at: Option<usize>,
) -> Result<Vec<Segment>, ConfigError> {
  let mut segments = Vec::new();
  let mut literal = String::new();

  while *pos < chars.len() {
    let ch = chars[*pos];

    if ch == ')' && opened_at.is_some() {
      *pos += 1;
      if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
      }
      return Ok(segments);
    }

    if ch == '$' {
      match chars.get(*pos + 1) {
        Some('$') => {
          literal.push('$');
          *pos += 2;
          continue;
        }
        Some('(') => {
          if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
          }
          let start = *pos;
          *pos += 2;
          let name = parse_segments(input, chars, pos, Some(start))?;
          segments.push(Segment::Reference(name));
          continue;
        }
        _ => {}
      }
    }

    literal.push(ch);
    *pos += 1;
  }

  if let Some(position) = opened_at {
    return Err(ConfigError::Unclosed {
      input: input.to_string(),
      position,
    });
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Expand parsed segments using the provided resolver.
pub fn expand_segments(segments: &[Segment], resolver: &mut impl Resolver) -> Result<String, ConfigError> {
  let mut out = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Reference(name) => {
        // First pass builds the name, second pass looks it up.
        let name = expand_segments(name, resolver)?;
        out.push_str(&resolver.resolve(name.trim())?);
      }
    }
  }
  Ok(out)
}

/// Parse and expand in one step.
pub fn expand(input: &str, resolver: &mut impl Resolver) -> Result<String, ConfigError> {
  let segments = parse(input)?;
  expand_segments(&segments, resolver)
}

/// Returns true if the string contains at least one `$(` reference.
pub fn has_references(input: &str) -> bool {
  parse(input)
    .map(|segments| segments.iter().any(|s| matches!(s, Segment::Reference(_))))
    .unwrap_or(false)
}
