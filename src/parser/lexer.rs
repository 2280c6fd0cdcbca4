//! JavaScript lexer/tokenizer
//!
//! Converts source text into a stream of tokens. String and template
//! contents are produced as UTF-16 code units, matching the engine's string
//! representation.

use crate::object::JSString;
use crate::util::dtoa::parse_radix_digits;
use crate::util::unicode::{is_id_continue, is_id_start, is_line_terminator, is_whitespace, push_code_point};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    /// BigInt literal, decimal digits
    BigInt(String),
    /// Big-decimal literal, source digits
    BigDecimal(String),
    String(JSString),
    Ident(String),
    /// Template text up to `${` (`tail == false`) or the closing backtick
    Template { cooked: JSString, tail: bool },

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
    Arrow,    // =>

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

    Question,         // ?
    QuestionQuestion, // ??
    QuestionDot,      // ?.
    Colon,            // :
    Semicolon,        // ;
    Comma,            // ,
    Dot,              // .
    Ellipsis,         // ...

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
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,

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
    Export,
    False,
    Finally,
    For,
    Function,
    If,
    Import,
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
    Const,
    Let,

    /// Reserved word of a construct this engine does not implement
    Reserved(&'static str),

    // Special
    Eof,
    Error(String),
}

impl Token {
    /// Keyword text, for property names such as `a.default`
    pub fn keyword_name(&self) -> Option<&'static str> {
        Some(match self {
            Token::Break => "break",
            Token::Case => "case",
            Token::Catch => "catch",
            Token::Continue => "continue",
            Token::Debugger => "debugger",
            Token::Default => "default",
            Token::Delete => "delete",
            Token::Do => "do",
            Token::Else => "else",
            Token::Export => "export",
            Token::False => "false",
            Token::Finally => "finally",
            Token::For => "for",
            Token::Function => "function",
            Token::If => "if",
            Token::Import => "import",
            Token::In => "in",
            Token::InstanceOf => "instanceof",
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
            Token::Const => "const",
            Token::Let => "let",
            Token::Reserved(name) => *name,
            _ => return None,
        })
    }
}

/// Source position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Lexer for JavaScript source code
#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    /// A line terminator preceded the last token
    newline_before: bool,
    /// Start of the last token
    token_start: SourcePos,
}

fn keyword(ident: &str) -> Option<Token> {
    Some(match ident {
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
        "export" => Token::Export,
        "false" => Token::False,
        "finally" => Token::Finally,
        "for" => Token::For,
        "function" => Token::Function,
        "if" => Token::If,
        "import" => Token::Import,
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
        "class" => Token::Reserved("class"),
        "enum" => Token::Reserved("enum"),
        "extends" => Token::Reserved("extends"),
        "super" => Token::Reserved("super"),
        "with" => Token::Reserved("with"),
        "yield" => Token::Reserved("yield"),
        "await" => Token::Reserved("await"),
        _ => return None,
    })
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            newline_before: false,
            token_start: SourcePos::default(),
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

    /// Start position of the token last returned
    pub fn token_start(&self) -> SourcePos {
        self.token_start
    }

    /// Whether a line break separates the last token from the one before
    pub fn newline_before(&self) -> bool {
        self.newline_before
    }

    /// Peek at the current byte without consuming it
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// Peek at the next byte
    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    /// Decode the character at the current position
    fn peek_char(&self) -> Option<char> {
        let rest = self.source.get(self.pos..)?;
        let len = match *rest.first()? {
            b if b < 0x80 => 1,
            b if b >= 0xF0 => 4,
            b if b >= 0xE0 => 3,
            _ => 2,
        };
        let bytes = rest.get(..len.min(rest.len()))?;
        std::str::from_utf8(bytes).ok()?.chars().next()
    }

    /// Consume the current character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if is_line_terminator(c as u32) {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments, noting line breaks
    fn skip_whitespace(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    while let Some(c) = self.peek_char() {
                        if is_line_terminator(c as u32) {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some(b'/') => {
                                self.advance();
                                break;
                            }
                            Some(c) if is_line_terminator(c as u32) => self.newline_before = true,
                            Some(_) => {}
                            None => return Err("unterminated comment".to_string()),
                        }
                    }
                }
                _ => match self.peek_char() {
                    Some(c) if is_line_terminator(c as u32) => {
                        self.newline_before = true;
                        self.advance();
                    }
                    Some(c) if is_whitespace(c as u32) => {
                        self.advance();
                    }
                    _ => return Ok(()),
                },
            }
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Token {
        self.newline_before = false;
        if let Err(e) = self.skip_whitespace() {
            return Token::Error(e);
        }
        self.token_start = self.position();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        // Identifiers and keywords
        if c == '\\' || is_id_start(c as u32) {
            return self.read_identifier();
        }

        // Numbers
        if c.is_ascii_digit() || (c == '.' && self.peek_next().is_some_and(|b| b.is_ascii_digit())) {
            return self.read_number();
        }

        // Strings
        if c == '"' || c == '\'' {
            return self.read_string();
        }
        if c == '`' {
            self.advance();
            return self.read_template();
        }

        // Operators and punctuation
        self.advance();
        match c {
            '+' => {
                if self.eat(b'+') {
                    Token::PlusPlus
                } else if self.eat(b'=') {
                    Token::PlusEq
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat(b'-') {
                    Token::MinusMinus
                } else if self.eat(b'=') {
                    Token::MinusEq
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat(b'*') {
                    if self.eat(b'=') { Token::StarStarEq } else { Token::StarStar }
                } else if self.eat(b'=') {
                    Token::StarEq
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat(b'=') { Token::SlashEq } else { Token::Slash }
            }
            '%' => {
                if self.eat(b'=') { Token::PercentEq } else { Token::Percent }
            }
            '=' => {
                if self.eat(b'=') {
                    if self.eat(b'=') { Token::EqEqEq } else { Token::EqEq }
                } else if self.eat(b'>') {
                    Token::Arrow
                } else {
                    Token::Eq
                }
            }
            '!' => {
                if self.eat(b'=') {
                    if self.eat(b'=') { Token::BangEqEq } else { Token::BangEq }
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') { Token::LtLtEq } else { Token::LtLt }
                } else if self.eat(b'=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat(b'>') {
                    if self.eat(b'>') {
                        if self.eat(b'=') { Token::GtGtGtEq } else { Token::GtGtGt }
                    } else if self.eat(b'=') {
                        Token::GtGtEq
                    } else {
                        Token::GtGt
                    }
                } else if self.eat(b'=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '&' => {
                if self.eat(b'&') {
                    if self.eat(b'=') { Token::AmpAmpEq } else { Token::AmpAmp }
                } else if self.eat(b'=') {
                    Token::AmpEq
                } else {
                    Token::Amp
                }
            }
            '|' => {
                if self.eat(b'|') {
                    if self.eat(b'=') { Token::PipePipeEq } else { Token::PipePipe }
                } else if self.eat(b'=') {
                    Token::PipeEq
                } else {
                    Token::Pipe
                }
            }
            '^' => {
                if self.eat(b'=') { Token::CaretEq } else { Token::Caret }
            }
            '?' => {
                if self.eat(b'?') {
                    if self.eat(b'=') { Token::QuestionQuestionEq } else { Token::QuestionQuestion }
                } else if self.peek() == Some(b'.') && !self.peek_next().is_some_and(|b| b.is_ascii_digit()) {
                    self.advance();
                    Token::QuestionDot
                } else {
                    Token::Question
                }
            }
            '.' => {
                if self.peek() == Some(b'.') && self.peek_next() == Some(b'.') {
                    self.advance();
                    self.advance();
                    Token::Ellipsis
                } else {
                    Token::Dot
                }
            }
            '~' => Token::Tilde,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            _ => Token::Error(format!("unexpected character '{}'", c)),
        }
    }

    /// Read a `\uXXXX` or `\u{X..}` escape after the backslash
    fn read_unicode_escape(&mut self) -> Result<u32, String> {
        if !self.eat(b'u') {
            return Err("invalid escape sequence".to_string());
        }
        if self.eat(b'{') {
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|b| (b as char).to_digit(16)) {
                self.advance();
                value = value.saturating_mul(16).saturating_add(d);
                digits += 1;
            }
            if digits == 0 || !self.eat(b'}') || value > 0x10FFFF {
                return Err("invalid Unicode escape".to_string());
            }
            Ok(value)
        } else {
            self.read_hex(4).ok_or_else(|| "invalid Unicode escape".to_string())
        }
    }

    fn read_hex(&mut self, count: usize) -> Option<u32> {
        let mut value = 0;
        for _ in 0..count {
            let d = (self.peek()? as char).to_digit(16)?;
            self.advance();
            value = value * 16 + d;
        }
        Some(value)
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        let mut escaped = false;
        loop {
            match self.peek_char() {
                Some('\\') => {
                    self.advance();
                    match self.read_unicode_escape() {
                        Ok(cp) => match char::from_u32(cp) {
                            Some(c) if is_id_continue(cp) => ident.push(c),
                            _ => return Token::Error("invalid identifier escape".to_string()),
                        },
                        Err(e) => return Token::Error(e),
                    }
                    escaped = true;
                }
                Some(c) if is_id_continue(c as u32) => {
                    self.advance();
                    ident.push(c);
                }
                _ => break,
            }
        }
        if escaped {
            return Token::Ident(ident);
        }
        keyword(&ident).unwrap_or(Token::Ident(ident))
    }

    fn take_digits(&mut self, radix: u32, out: &mut String) {
        while let Some(b) = self.peek() {
            if (b as char).is_digit(radix) {
                out.push(b as char);
                self.advance();
            } else if b == b'_' && self.peek_next().is_some_and(|n| (n as char).is_digit(radix)) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read a number literal, including BigInt (`n`) and big-decimal (`l`)
    /// suffixes
    fn read_number(&mut self) -> Token {
        let radix = if self.peek() == Some(b'0') {
            match self.peek_next() {
                Some(b'x' | b'X') => 16,
                Some(b'o' | b'O') => 8,
                Some(b'b' | b'B') => 2,
                _ => 10,
            }
        } else {
            10
        };

        let token = if radix != 10 {
            self.advance();
            self.advance();
            let mut digits = String::new();
            self.take_digits(radix, &mut digits);
            if digits.is_empty() {
                return Token::Error("invalid number literal".to_string());
            }
            if self.eat(b'n') {
                match num_bigint::BigInt::parse_bytes(digits.as_bytes(), radix) {
                    Some(n) => Token::BigInt(n.to_string()),
                    None => return Token::Error("invalid BigInt literal".to_string()),
                }
            } else {
                match parse_radix_digits(&digits, radix) {
                    Some(n) => Token::Number(n),
                    None => return Token::Error("invalid number literal".to_string()),
                }
            }
        } else {
            let mut text = String::new();
            self.take_digits(10, &mut text);
            let mut integral = true;
            if self.peek() == Some(b'.') {
                integral = false;
                self.advance();
                text.push('.');
                self.take_digits(10, &mut text);
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                integral = false;
                self.advance();
                text.push('e');
                if let Some(sign @ (b'+' | b'-')) = self.peek() {
                    self.advance();
                    text.push(sign as char);
                }
                let before = text.len();
                self.take_digits(10, &mut text);
                if text.len() == before {
                    return Token::Error("invalid number literal".to_string());
                }
            }
            if self.peek() == Some(b'n') {
                self.advance();
                if !integral {
                    return Token::Error("invalid BigInt literal".to_string());
                }
                let digits = text.trim_start_matches('0');
                Token::BigInt(if digits.is_empty() { "0" } else { digits }.to_string())
            } else if self.peek() == Some(b'l') {
                self.advance();
                Token::BigDecimal(text)
            } else {
                match text.parse::<f64>() {
                    Ok(n) => Token::Number(n),
                    Err(_) => return Token::Error(format!("invalid number: {}", text)),
                }
            }
        };

        // A literal may not run straight into an identifier
        match self.peek_char() {
            Some(c) if is_id_start(c as u32) || c.is_ascii_digit() => {
                Token::Error("invalid number literal".to_string())
            }
            _ => token,
        }
    }

    /// Read a string literal
    fn read_string(&mut self) -> Token {
        let Some(quote) = self.advance() else {
            return Token::Eof;
        };
        let mut units: Vec<u16> = Vec::new();

        loop {
            match self.peek_char() {
                None => return Token::Error("unterminated string literal".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Err(e) = self.read_escape(&mut units) {
                        return Token::Error(e);
                    }
                }
                Some(c) if c == '\n' || c == '\r' => {
                    return Token::Error("unterminated string literal".to_string());
                }
                Some(c) => {
                    self.advance();
                    push_code_point(&mut units, c as u32);
                }
            }
        }

        Token::String(JSString::from_units(units))
    }

    /// Read an escape sequence after the backslash
    fn read_escape(&mut self, units: &mut Vec<u16>) -> Result<(), String> {
        let Some(c) = self.peek_char() else {
            return Err("unterminated string literal".to_string());
        };
        match c {
            'u' => {
                let cp = self.read_unicode_escape()?;
                push_code_point(units, cp);
                return Ok(());
            }
            'x' => {
                self.advance();
                let cp = self.read_hex(2).ok_or_else(|| "invalid hexadecimal escape".to_string())?;
                units.push(cp as u16);
                return Ok(());
            }
            _ => {}
        }
        self.advance();
        match c {
            'n' => units.push(0x0A),
            'r' => units.push(0x0D),
            't' => units.push(0x09),
            'b' => units.push(0x08),
            'f' => units.push(0x0C),
            'v' => units.push(0x0B),
            '0' if !self.peek().is_some_and(|b| b.is_ascii_digit()) => units.push(0),
            '1'..='9' | '0' => return Err("octal escape sequences are not allowed".to_string()),
            // Line continuation
            '\r' => {
                self.eat(b'\n');
            }
            c if is_line_terminator(c as u32) => {}
            c => push_code_point(units, c as u32),
        }
        Ok(())
    }

    /// Read template text after a backtick or a closing `}` of a
    /// substitution
    pub fn read_template(&mut self) -> Token {
        let mut units: Vec<u16> = Vec::new();
        loop {
            match self.peek_char() {
                None => return Token::Error("unterminated template literal".to_string()),
                Some('`') => {
                    self.advance();
                    return Token::Template {
                        cooked: JSString::from_units(units),
                        tail: true,
                    };
                }
                Some('$') if self.peek_next() == Some(b'{') => {
                    self.advance();
                    self.advance();
                    return Token::Template {
                        cooked: JSString::from_units(units),
                        tail: false,
                    };
                }
                Some('\\') => {
                    self.advance();
                    if let Err(e) = self.read_escape(&mut units) {
                        return Token::Error(e);
                    }
                }
                Some('\r') => {
                    // CRLF and CR are normalized to LF
                    self.advance();
                    self.eat(b'\n');
                    units.push(0x0A);
                }
                Some(c) => {
                    self.advance();
                    push_code_point(&mut units, c as u32);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            match lexer.next_token() {
                Token::Eof => return out,
                t => out.push(t),
            }
        }
    }

    fn js(s: &str) -> JSString {
        JSString::from_str(s)
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 3.14 1e10 .5 0x1F 0o17 0b101 1_000");

        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 42.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if (n - 3.14).abs() < 0.001));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 1e10));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 0.5));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 31.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 15.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 5.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 1000.0));
    }

    #[test]
    fn test_big_literals() {
        assert_eq!(
            tokens("128n 0x10n 0n 128l 1.5l"),
            vec![
                Token::BigInt("128".to_string()),
                Token::BigInt("16".to_string()),
                Token::BigInt("0".to_string()),
                Token::BigDecimal("128".to_string()),
                Token::BigDecimal("1.5".to_string()),
            ]
        );
        assert!(matches!(tokens("1.5n")[0], Token::Error(_)));
        assert!(matches!(tokens("12abc")[0], Token::Error(_)));
    }

    #[test]
    fn test_strings() {
        let mut lexer = Lexer::new(r#""hello" 'world' "a\tb\x41B\u{1F600}""#);

        assert_eq!(lexer.next_token(), Token::String(js("hello")));
        assert_eq!(lexer.next_token(), Token::String(js("world")));
        assert_eq!(lexer.next_token(), Token::String(js("a\tbAB\u{1F600}")));
        assert!(matches!(tokens("'abc")[0], Token::Error(_)));
        assert!(matches!(tokens("'a\nb'")[0], Token::Error(_)));
    }

    #[test]
    fn test_template_parts() {
        let mut lexer = Lexer::new("`a${x}b`");
        assert_eq!(
            lexer.next_token(),
            Token::Template { cooked: js("a"), tail: false }
        );
        assert_eq!(lexer.next_token(), Token::Ident("x".to_string()));
        assert_eq!(lexer.next_token(), Token::RBrace);
        assert_eq!(
            lexer.read_template(),
            Token::Template { cooked: js("b"), tail: true }
        );
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn test_identifiers_and_keywords() {
        assert_eq!(
            tokens("foo var if else $x _y café class"),
            vec![
                Token::Ident("foo".to_string()),
                Token::Var,
                Token::If,
                Token::Else,
                Token::Ident("$x".to_string()),
                Token::Ident("_y".to_string()),
                Token::Ident("café".to_string()),
                Token::Reserved("class"),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("+ ++ += === !== => ?? ?. ?.5 ... **= >>>="),
            vec![
                Token::Plus,
                Token::PlusPlus,
                Token::PlusEq,
                Token::EqEqEq,
                Token::BangEqEq,
                Token::Arrow,
                Token::QuestionQuestion,
                Token::QuestionDot,
                Token::Question,
                Token::Number(0.5),
                Token::Ellipsis,
                Token::StarStarEq,
                Token::GtGtGtEq,
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut lexer = Lexer::new("1 // comment\n2 /* block */ 3 /* a\nb */ 4");

        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 1.0));
        assert!(!lexer.newline_before());
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 2.0));
        assert!(lexer.newline_before());
        assert_eq!(lexer.token_start().line, 2);
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 3.0));
        assert!(!lexer.newline_before());
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 4.0));
        assert!(lexer.newline_before());
        assert!(matches!(tokens("/* open")[0], Token::Error(_)));
    }
}
