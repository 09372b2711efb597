use super::CompileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(u64),
    Eq,
    NotEq,
    LParen,
    RParen,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Character index of the first character of the token.
    pub pos: usize,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Str(value) => format!("string '{}'", value),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Split query text into tokens. Positions are character indexes into `input`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '=' => {
                i += 1;
                TokenKind::Eq
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    TokenKind::NotEq
                } else {
                    return Err(CompileError::UnexpectedChar { ch: c, pos: start });
                }
            }
            '\'' => {
                i += 1;
                let body_start = i;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(CompileError::UnterminatedString { pos: start });
                }
                let value: String = chars[body_start..i].iter().collect();
                i += 1;
                TokenKind::Str(value)
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse::<u64>()
                    .map_err(|_| CompileError::InvalidValue {
                        found: digits.clone(),
                        pos: start,
                    })?;
                TokenKind::Number(n)
            }
            c if is_ident_start(c) => {
                while i < chars.len() && is_ident_continue(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if word.eq_ignore_ascii_case("and") {
                    TokenKind::And
                } else if word.eq_ignore_ascii_case("or") {
                    TokenKind::Or
                } else {
                    TokenKind::Ident(word)
                }
            }
            other => return Err(CompileError::UnexpectedChar { ch: other, pos: start }),
        };
        tokens.push(Token { kind, pos: start });
    }
    Ok(tokens)
}
