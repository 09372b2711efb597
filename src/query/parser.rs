use super::lexer::{tokenize, Token, TokenKind};
use super::{map_field, valid_fields, CompileError, Condition, Connective, Operator, Value};

/// Recursive-descent parser over a token stream.
///
/// ```text
/// expr      := condition ((AND | OR) condition)*
/// condition := '(' expr ')' | field op value
/// ```
struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    /// Character length of the input, reported as the position of end-of-input.
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Description and position of the current token, or of end-of-input.
    fn found(&self) -> (String, usize) {
        match self.peek() {
            Some(token) => (token.kind.describe(), token.pos),
            None => ("end of input".to_string(), self.end),
        }
    }

    fn expr(&mut self) -> Result<Condition, CompileError> {
        let mut node = self.condition()?;
        loop {
            let connective = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::And) => Connective::And,
                Some(TokenKind::Or) => Connective::Or,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.condition()?;
            node = match node {
                Condition::Composite {
                    connective: current,
                    mut children,
                } if current == connective => {
                    children.push(rhs);
                    Condition::Composite {
                        connective,
                        children,
                    }
                }
                other => Condition::Composite {
                    connective,
                    children: vec![other, rhs],
                },
            };
        }
        Ok(node)
    }

    fn condition(&mut self) -> Result<Condition, CompileError> {
        if let Some(Token {
            kind: TokenKind::LParen,
            pos,
        }) = self.peek().cloned()
        {
            self.cursor += 1;
            let inner = self.expr()?;
            return match self.peek() {
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => {
                    self.cursor += 1;
                    Ok(inner)
                }
                _ => {
                    let (found, at) = self.found();
                    Err(CompileError::MissingCloseParen {
                        open: pos,
                        found,
                        pos: at,
                    })
                }
            };
        }

        let (field, field_pos) = match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                pos,
            }) => (name.clone(), *pos),
            _ => {
                let (found, pos) = self.found();
                return Err(CompileError::ExpectedField { found, pos });
            }
        };
        let column = map_field(&field).ok_or_else(|| CompileError::UnknownField {
            field: field.clone(),
            pos: field_pos,
            valid: valid_fields(),
        })?;
        self.cursor += 1;

        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Eq) => Operator::Eq,
            Some(TokenKind::NotEq) => Operator::NotEq,
            _ => {
                let (found, pos) = self.found();
                return Err(CompileError::ExpectedOperator { found, pos });
            }
        };
        self.cursor += 1;

        let value = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => Value::Str(s.clone()),
            Some(TokenKind::Number(n)) => Value::Number(*n),
            _ => {
                let (found, pos) = self.found();
                return Err(CompileError::InvalidValue { found, pos });
            }
        };
        self.cursor += 1;

        Ok(Condition::Leaf {
            field: column,
            op,
            value,
        })
    }
}

/// Parse query text into a condition tree. Blank input yields `None`.
pub fn parse(text: &str) -> Result<Option<Condition>, CompileError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: text.chars().count(),
    };
    let condition = parser.expr()?;
    if let Some(token) = parser.next() {
        return Err(CompileError::TrailingTokens {
            found: token.kind.describe(),
            pos: token.pos,
        });
    }
    Ok(Some(condition))
}
