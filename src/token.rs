#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Eof,

    // Commands.
    Def,
    Extern,

    // Control flow.
    If,
    Then,
    Else,
    For,
    In,

    // Primary.
    Identifier(String),
    Number(f64),

    // Operators and punctuation.
    Char(char),
}

pub const KW_DEF: &str = "def";
pub const KW_EXTERN: &str = "extern";
pub const KW_IF: &str = "if";
pub const KW_THEN: &str = "then";
pub const KW_ELSE: &str = "else";
pub const KW_FOR: &str = "for";
pub const KW_IN: &str = "in";

impl Token {
    /// Map an identifier-shaped word to its keyword token, if it is one.
    pub fn keyword(word: &str) -> Option<Token> {
        Some(match word {
            KW_DEF => Token::Def,
            KW_EXTERN => Token::Extern,
            KW_IF => Token::If,
            KW_THEN => Token::Then,
            KW_ELSE => Token::Else,
            KW_FOR => Token::For,
            KW_IN => Token::In,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),

            // Commands.
            Token::Def => write!(f, "'{}'", KW_DEF),
            Token::Extern => write!(f, "'{}'", KW_EXTERN),

            // Control flow.
            Token::If => write!(f, "'{}'", KW_IF),
            Token::Then => write!(f, "'{}'", KW_THEN),
            Token::Else => write!(f, "'{}'", KW_ELSE),
            Token::For => write!(f, "'{}'", KW_FOR),
            Token::In => write!(f, "'{}'", KW_IN),

            // Primary.
            Token::Identifier(s) => write!(f, "identifier '{}'", s),
            Token::Number(n) => write!(f, "number {}", n),

            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}
