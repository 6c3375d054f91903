//! Source locations for tokens, AST items and diagnostics.

use std::fmt;

/// Represents a position in the program source.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default)]
pub enum Location {
    /// A 1-based line and column in the source being compiled.
    SrcPos { line: u32, column: u32 },
    /// Location unknown.
    #[default]
    Unknown,
}

impl Location {
    /// The first character of a source.
    pub fn start() -> Self {
        Location::SrcPos { line: 1, column: 1 }
    }

    /// Move past `c`.
    pub fn advance(&mut self, c: char) {
        if let Location::SrcPos { line, column } = self {
            if c == '\n' {
                *line += 1;
                *column = 1;
            } else {
                *column += 1;
            }
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Location::SrcPos { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::SrcPos { line, column } => write!(f, "{}:{}", line, column),
            Location::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Objects with a [Location].
pub trait Located {
    fn loc(&self) -> Location;
    fn set_loc(&mut self, loc: Location);
}

#[cfg(test)]
mod tests {
    use super::Location;

    #[test]
    fn advance_tracks_lines() {
        let mut loc = Location::start();
        for c in "ab\ncd".chars() {
            loc.advance(c);
        }
        assert_eq!(loc, Location::SrcPos { line: 2, column: 3 });
        assert_eq!(loc.to_string(), "2:3");

        let mut unknown = Location::Unknown;
        unknown.advance('x');
        assert!(!unknown.is_known());
    }
}
