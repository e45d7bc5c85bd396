//! JavaScript lexer/tokenizer
//!
//! Converts source text into a stream of tokens. Each token records whether
//! a line terminator preceded it, which the parser needs for automatic
//! semicolon insertion and restricted productions (`return`, postfix `++`).

use crate::util::unicode::{is_id_continue, is_id_start, is_line_terminator, is_whitespace};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Ident(String),

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,   // **
    PlusPlus,   // ++
    MinusMinus, // --

    Eq,       // =
    EqEq,     // ==
    EqEqEq,   // ===
    Bang,     // !
    BangEq,   // !=
    BangEqEq, // !==

    Lt,   // <
    LtEq, // <=
    Gt,   // >
    GtEq, // >=

    LtLt,   // <<
    GtGt,   // >>
    GtGtGt, // >>>

    Amp,      // &
    AmpAmp,   // &&
    Pipe,     // |
    PipePipe, // ||
    Caret,    // ^
    Tilde,    // ~

    Question,  // ?
    Colon,     // :
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    LtLtEq,
    GtGtEq,
    GtGtGtEq,
    AmpEq,
    PipeEq,
    CaretEq,

    // Keywords
    Break,
    Case,
    Catch,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    InstanceOf,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    TypeOf,
    Var,
    Void,
    While,

    // Block-scoped declarations, treated like `var`
    Const,
    Let,

    // Special
    Eof,
    Error(String),
}

impl Token {
    /// Keyword spelling, for keywords used as property names
    pub fn keyword_name(&self) -> Option<&'static str> {
        let name = match self {
            Token::Break => "break",
            Token::Case => "case",
            Token::Catch => "catch",
            Token::Const => "const",
            Token::Continue => "continue",
            Token::Debugger => "debugger",
            Token::Default => "default",
            Token::Delete => "delete",
            Token::Do => "do",
            Token::Else => "else",
            Token::False => "false",
            Token::Finally => "finally",
            Token::For => "for",
            Token::Function => "function",
            Token::If => "if",
            Token::In => "in",
            Token::InstanceOf => "instanceof",
            Token::Let => "let",
            Token::New => "new",
            Token::Null => "null",
            Token::Return => "return",
            Token::Switch => "switch",
            Token::This => "this",
            Token::Throw => "throw",
            Token::True => "true",
            Token::Try => "try",
            Token::TypeOf => "typeof",
            Token::Var => "var",
            Token::Void => "void",
            Token::While => "while",
            _ => return None,
        };
        Some(name)
    }
}

/// Source position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// A token with its position
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: SourcePos,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

/// Lexer for JavaScript source code
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            pos: 0,
            line: 1,
            column: 1,
            saw_newline: false,
        }
    }

    /// Get the current source position
    pub fn position(&self) -> SourcePos {
        SourcePos {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    /// Peek at the current character without consuming it
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// Peek at the next character
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Consume the current character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if is_line_terminator(c) {
            self.line += 1;
            self.column = 1;
            self.saw_newline = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(c) if is_whitespace(c) || is_line_terminator(c) => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    // Line comment
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    // Block comment
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => return Err("unterminated comment".to_string()),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read the next token along with its position
    pub fn next_spanned(&mut self) -> Spanned {
        self.saw_newline = false;
        let skipped = self.skip_whitespace();
        let newline_before = self.saw_newline;
        let pos = self.position();
        let token = match skipped {
            Ok(()) => self.next_token(),
            Err(message) => Token::Error(message),
        };
        Spanned {
            token,
            pos,
            newline_before,
        }
    }

    /// Read the next token
    fn next_token(&mut self) -> Token {
        let Some(c) = self.peek() else {
            return Token::Eof;
        };

        // Identifiers and keywords
        if c == '\\' || is_id_start(c) {
            return self.read_identifier();
        }

        // Numbers
        if c.is_ascii_digit() || (c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit())) {
            return self.read_number();
        }

        // Strings
        if c == '"' || c == '\'' {
            return self.read_string();
        }

        // Operators and punctuation
        self.advance();
        match c {
            '+' => {
                if self.eat('+') {
                    Token::PlusPlus
                } else if self.eat('=') {
                    Token::PlusEq
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Token::MinusMinus
                } else if self.eat('=') {
                    Token::MinusEq
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') { Token::StarStarEq } else { Token::StarStar }
                } else if self.eat('=') {
                    Token::StarEq
                } else {
                    Token::Star
                }
            }
            '/' => if self.eat('=') { Token::SlashEq } else { Token::Slash },
            '%' => if self.eat('=') { Token::PercentEq } else { Token::Percent },
            '=' => {
                if self.eat('=') {
                    if self.eat('=') { Token::EqEqEq } else { Token::EqEq }
                } else {
                    Token::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') { Token::BangEqEq } else { Token::BangEq }
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') { Token::LtLtEq } else { Token::LtLt }
                } else if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        if self.eat('=') { Token::GtGtGtEq } else { Token::GtGtGt }
                    } else if self.eat('=') {
                        Token::GtGtEq
                    } else {
                        Token::GtGt
                    }
                } else if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::AmpAmp
                } else if self.eat('=') {
                    Token::AmpEq
                } else {
                    Token::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::PipePipe
                } else if self.eat('=') {
                    Token::PipeEq
                } else {
                    Token::Pipe
                }
            }
            '^' => if self.eat('=') { Token::CaretEq } else { Token::Caret },
            '~' => Token::Tilde,
            '?' => Token::Question,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            _ => Token::Error(format!("unexpected character '{c}'")),
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        let mut escaped = false;

        while let Some(c) = self.peek() {
            if c == '\\' {
                self.advance();
                if !self.eat('u') {
                    return Token::Error("invalid escape in identifier".to_string());
                }
                match self.read_unicode_escape() {
                    Ok(ch) => ident.push(ch),
                    Err(message) => return Token::Error(message),
                }
                escaped = true;
            } else if is_id_continue(c) {
                self.advance();
                ident.push(c);
            } else {
                break;
            }
        }

        // Escaped identifiers never form keywords
        if escaped {
            return Token::Ident(ident);
        }

        // Check for keywords
        match ident.as_str() {
            "break" => Token::Break,
            "case" => Token::Case,
            "catch" => Token::Catch,
            "const" => Token::Const,
            "continue" => Token::Continue,
            "debugger" => Token::Debugger,
            "default" => Token::Default,
            "delete" => Token::Delete,
            "do" => Token::Do,
            "else" => Token::Else,
            "false" => Token::False,
            "finally" => Token::Finally,
            "for" => Token::For,
            "function" => Token::Function,
            "if" => Token::If,
            "in" => Token::In,
            "instanceof" => Token::InstanceOf,
            "let" => Token::Let,
            "new" => Token::New,
            "null" => Token::Null,
            "return" => Token::Return,
            "switch" => Token::Switch,
            "this" => Token::This,
            "throw" => Token::Throw,
            "true" => Token::True,
            "try" => Token::Try,
            "typeof" => Token::TypeOf,
            "var" => Token::Var,
            "void" => Token::Void,
            "while" => Token::While,
            _ => Token::Ident(ident),
        }
    }

    fn read_digits(&mut self, radix: u32) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_digit(radix)) {
            self.advance();
        }
        &self.source[start..self.pos]
    }

    /// Read a number literal
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        if self.peek() == Some('0') {
            let radix = match self.peek_next() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits = self.read_digits(radix);
                if digits.is_empty() {
                    return Token::Error("missing digits after radix prefix".to_string());
                }
                let value = digits
                    .chars()
                    .filter_map(|c| c.to_digit(radix))
                    .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
                return self.finish_number(value);
            }
        }

        // Integer part
        self.read_digits(10);

        // Decimal part
        if self.peek() == Some('.') {
            self.advance();
            self.read_digits(10);
        }

        // Exponent part
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if self.read_digits(10).is_empty() {
                return Token::Error("missing exponent".to_string());
            }
        }

        let num_str = &self.source[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) => self.finish_number(n),
            Err(_) => Token::Error(format!("invalid number: {num_str}")),
        }
    }

    fn finish_number(&self, value: f64) -> Token {
        // `3in` or `1x` is an error, not two tokens
        match self.peek() {
            Some(c) if c == '\\' || is_id_start(c) || c.is_ascii_digit() => {
                Token::Error("identifier starts immediately after numeric literal".to_string())
            }
            _ => Token::Number(value),
        }
    }

    fn read_hex(&mut self, count: usize) -> Result<u32, String> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| "invalid hexadecimal escape".to_string())?;
            self.advance();
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// Read the part of a `\u` escape after the `u`
    fn read_unicode_escape(&mut self) -> Result<char, String> {
        let code = if self.eat('{') {
            let mut value = 0u32;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                self.advance();
                value = value.saturating_mul(16).saturating_add(d);
                digits += 1;
            }
            if digits == 0 || !self.eat('}') || value > 0x10FFFF {
                return Err("invalid unicode escape".to_string());
            }
            value
        } else {
            let high = self.read_hex(4)?;
            // Combine an escaped surrogate pair
            if (0xD800..0xDC00).contains(&high) && self.source[self.pos..].starts_with("\\u") {
                let save = (self.pos, self.line, self.column);
                self.advance();
                self.advance();
                match self.read_hex(4) {
                    Ok(low) if (0xDC00..0xE000).contains(&low) => {
                        0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                    }
                    _ => {
                        (self.pos, self.line, self.column) = save;
                        high
                    }
                }
            } else {
                high
            }
        };
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Read a string literal
    fn read_string(&mut self) -> Token {
        let Some(quote) = self.advance() else {
            return Token::Eof;
        };
        let mut s = String::new();

        loop {
            match self.peek() {
                None => return Token::Error("unterminated string literal".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(c) if c == '\n' || c == '\r' => {
                    return Token::Error("unterminated string literal".to_string());
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('v') => '\u{b}',
                        Some('0') if !self.peek().is_some_and(|c| c.is_ascii_digit()) => '\0',
                        Some('x') => match self.read_hex(2) {
                            Ok(code) => char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
                            Err(message) => return Token::Error(message),
                        },
                        Some('u') => match self.read_unicode_escape() {
                            Ok(ch) => ch,
                            Err(message) => return Token::Error(message),
                        },
                        // Line continuation
                        Some('\r') => {
                            self.eat('\n');
                            continue;
                        }
                        Some(c) if is_line_terminator(c) => continue,
                        Some(c) => c,
                        None => return Token::Error("unterminated string literal".to_string()),
                    };
                    s.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    s.push(c);
                }
            }
        }

        Token::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_spanned().token;
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_numbers() {
        let toks = tokens("42 3.14 1e10 .5 0xff 0b101 0o17");
        let values: Vec<f64> = toks
            .iter()
            .map(|t| match t {
                Token::Number(n) => *n,
                other => panic!("expected number, got {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![42.0, 3.14, 1e10, 0.5, 255.0, 5.0, 15.0]);
    }

    #[test]
    fn test_number_followed_by_identifier() {
        assert!(matches!(tokens("3in")[0], Token::Error(_)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokens(r#""hello" 'world'"#),
            vec![
                Token::String("hello".to_string()),
                Token::String("world".to_string())
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\tb\x41B\u{1F600}😀""#),
            vec![Token::String("a\tbAB\u{1F600}\u{1F600}".to_string())]
        );
    }

    #[test]
    fn test_utf8_source() {
        assert_eq!(
            tokens("'héllo' ünïcode"),
            vec![
                Token::String("héllo".to_string()),
                Token::Ident("ünïcode".to_string())
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(tokens("'abc")[0], Token::Error(_)));
    }

    #[test]
    fn test_identifiers_and_keywords() {
        assert_eq!(
            tokens("foo var if else $x _y"),
            vec![
                Token::Ident("foo".to_string()),
                Token::Var,
                Token::If,
                Token::Else,
                Token::Ident("$x".to_string()),
                Token::Ident("_y".to_string()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("+ ++ += === !== >>>= **"),
            vec![
                Token::Plus,
                Token::PlusPlus,
                Token::PlusEq,
                Token::EqEqEq,
                Token::BangEqEq,
                Token::GtGtGtEq,
                Token::StarStar,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            tokens("1 // comment\n2 /* block */ 3"),
            vec![Token::Number(1.0), Token::Number(2.0), Token::Number(3.0)]
        );
    }

    #[test]
    fn test_newline_before() {
        let mut lexer = Lexer::new("a\nb /* x\n */ c d");
        assert!(!lexer.next_spanned().newline_before);
        let b = lexer.next_spanned();
        assert!(b.newline_before);
        assert_eq!(b.pos.line, 2);
        assert!(lexer.next_spanned().newline_before);
        assert!(!lexer.next_spanned().newline_before);
    }
}
