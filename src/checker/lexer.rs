use serde::Serialize;

/// Token kinds for the checked language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    True,
    False,
    Null,
    New,
    Typeof,
    Void,
    Delete,
    In,
    Instanceof,
    This,

    // Literals
    Number(f64),
    BigInt(String),
    Str(String),
    Ident(String),
    Regex { pattern: String, flags: String },
    /// `` `text` `` with no substitutions.
    Template { cooked: String, raw: String },
    /// `` `text${ ``
    TemplateHead { cooked: String, raw: String },
    /// `` }text${ ``
    TemplateMiddle { cooked: String, raw: String },
    /// `` }text` ``
    TemplateTail { cooked: String, raw: String },

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    UShr,
    AndAnd,
    OrOr,
    Bang,
    Eq,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Arrow,    // =>
    Ellipsis, // ...
    Dot,
    Question,
    Colon,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,

    // Special
    Eof,
}

impl TokenKind {
    /// Whether a `/` following this token starts a regex literal.
    fn allows_regex_after(&self) -> bool {
        !matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Number(_)
                | TokenKind::BigInt(_)
                | TokenKind::Str(_)
                | TokenKind::Regex { .. }
                | TokenKind::Template { .. }
                | TokenKind::TemplateTail { .. }
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::This
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        )
    }
}

/// Source location information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A token with its kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }
}

/// The lexer for checked source code.
pub struct Lexer<'a> {
    filename: &'a str,
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    /// Open `{` count per enclosing template substitution.
    template_braces: Vec<usize>,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self {
            filename,
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            template_braces: Vec::new(),
            saw_newline: false,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            self.saw_newline = false;
            self.skip_whitespace_and_comments()?;

            let span = Span::new(self.line, self.column);
            let newline_before = self.saw_newline;

            let Some((_, ch)) = self.peek() else {
                if !self.template_braces.is_empty() {
                    return Err(self.error("unterminated template literal"));
                }
                tokens.push(Token::new(TokenKind::Eof, span, newline_before));
                break;
            };

            let kind = match ch {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semi),
                ':' => self.single(TokenKind::Colon),
                '?' => self.single(TokenKind::Question),
                '~' => self.single(TokenKind::Tilde),
                '{' => {
                    if let Some(depth) = self.template_braces.last_mut() {
                        *depth += 1;
                    }
                    self.single(TokenKind::LBrace)
                }
                '}' => match self.template_braces.last().copied() {
                    Some(0) => {
                        self.advance();
                        self.scan_template_continuation()?
                    }
                    Some(depth) => {
                        if let Some(top) = self.template_braces.last_mut() {
                            *top = depth - 1;
                        }
                        self.single(TokenKind::RBrace)
                    }
                    None => self.single(TokenKind::RBrace),
                },
                '.' => {
                    if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.scan_number()?
                    } else if self.peek_nth(1) == Some('.') && self.peek_nth(2) == Some('.') {
                        self.advance();
                        self.advance();
                        self.advance();
                        TokenKind::Ellipsis
                    } else {
                        self.single(TokenKind::Dot)
                    }
                }
                '+' => {
                    self.advance();
                    if self.match_char('+') {
                        TokenKind::PlusPlus
                    } else {
                        TokenKind::Plus
                    }
                }
                '-' => {
                    self.advance();
                    if self.match_char('-') {
                        TokenKind::MinusMinus
                    } else {
                        TokenKind::Minus
                    }
                }
                '*' => self.single(TokenKind::Star),
                '%' => self.single(TokenKind::Percent),
                '^' => self.single(TokenKind::Caret),
                '/' => {
                    let regex_allowed = tokens
                        .last()
                        .is_none_or(|token| token.kind.allows_regex_after());
                    if regex_allowed {
                        self.scan_regex()?
                    } else {
                        self.single(TokenKind::Slash)
                    }
                }
                '!' => {
                    self.advance();
                    if self.match_char('=') {
                        if self.match_char('=') {
                            TokenKind::NotEqEq
                        } else {
                            TokenKind::NotEq
                        }
                    } else {
                        TokenKind::Bang
                    }
                }
                '=' => {
                    self.advance();
                    if self.match_char('=') {
                        if self.match_char('=') {
                            TokenKind::EqEqEq
                        } else {
                            TokenKind::EqEq
                        }
                    } else if self.match_char('>') {
                        TokenKind::Arrow
                    } else {
                        TokenKind::Eq
                    }
                }
                '<' => {
                    self.advance();
                    if self.match_char('<') {
                        TokenKind::Shl
                    } else if self.match_char('=') {
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.advance();
                    if self.match_char('>') {
                        if self.match_char('>') {
                            TokenKind::UShr
                        } else {
                            TokenKind::Shr
                        }
                    } else if self.match_char('=') {
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '&' => {
                    self.advance();
                    if self.match_char('&') {
                        TokenKind::AndAnd
                    } else {
                        TokenKind::Amp
                    }
                }
                '|' => {
                    self.advance();
                    if self.match_char('|') {
                        TokenKind::OrOr
                    } else {
                        TokenKind::Pipe
                    }
                }
                '"' | '\'' => self.scan_string(ch)?,
                '`' => {
                    self.advance();
                    self.scan_template_start()?
                }
                '0'..='9' => self.scan_number()?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier(),
                _ => return Err(self.error(&format!("unexpected character '{}'", ch))),
            };

            tokens.push(Token::new(kind, span, newline_before));
        }

        Ok(tokens)
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.peek().map(|(i, _)| i).unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek().map(|(_, c)| c) == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some((_, '\n')) => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some((_, c)) if c.is_whitespace() => {
                    self.advance();
                }
                Some((_, '/')) => match self.peek_nth(1) {
                    Some('/') => {
                        while let Some((_, ch)) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                None => return Err(self.error("unterminated block comment")),
                                Some((_, '\n')) => self.saw_newline = true,
                                Some((_, '*')) if self.match_char('/') => break,
                                Some(_) => {}
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_number(&mut self) -> Result<TokenKind, String> {
        let start = self.offset();

        if self.peek().map(|(_, c)| c) == Some('0')
            && let Some(prefix) = self.peek_nth(1)
            && let Some(radix) = match prefix {
                'x' | 'X' => Some(16),
                'o' | 'O' => Some(8),
                'b' | 'B' => Some(2),
                _ => None,
            }
        {
            self.advance();
            self.advance();
            let mut digits = String::new();
            while let Some((_, ch)) = self.peek() {
                if ch.is_digit(radix) {
                    digits.push(ch);
                    self.advance();
                } else if ch == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(self.error("missing digits after numeric prefix"));
            }
            let value = u128::from_str_radix(&digits, radix)
                .map_err(|_| self.error(&format!("invalid number '{}'", digits)))?;
            if self.match_char('n') {
                return Ok(TokenKind::BigInt(value.to_string()));
            }
            return Ok(TokenKind::Number(value as f64));
        }

        let mut is_integer = true;
        self.consume_digits();
        if self.peek().map(|(_, c)| c) == Some('.') {
            is_integer = false;
            self.advance();
            self.consume_digits();
        }
        if let Some((_, 'e' | 'E')) = self.peek() {
            let sign = self.peek_nth(1);
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_integer = false;
                for _ in 0..digit_at {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let end = self.offset();
        let text: String = self.source[start..end].chars().filter(|c| *c != '_').collect();

        if is_integer && self.match_char('n') {
            let digits = text.trim_start_matches('0');
            let digits = if digits.is_empty() { "0" } else { digits };
            return Ok(TokenKind::BigInt(digits.to_string()));
        }

        let value: f64 = text
            .parse()
            .map_err(|_| self.error(&format!("invalid number '{}'", text)))?;
        Ok(TokenKind::Number(value))
    }

    fn consume_digits(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_escape(&mut self, cooked: &mut String, raw: &mut String) -> Result<(), String> {
        let Some((_, ch)) = self.advance() else {
            return Err(self.error("unterminated escape sequence"));
        };
        raw.push(ch);
        match ch {
            'n' => cooked.push('\n'),
            't' => cooked.push('\t'),
            'r' => cooked.push('\r'),
            'b' => cooked.push('\u{8}'),
            'f' => cooked.push('\u{c}'),
            'v' => cooked.push('\u{b}'),
            '0' => cooked.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.scan_hex_digits(2, raw)?;
                cooked.push(char::from_u32(code).ok_or_else(|| self.error("invalid escape"))?);
            }
            'u' => {
                let code = if self.match_char('{') {
                    raw.push('{');
                    let mut code = 0u32;
                    loop {
                        match self.advance() {
                            Some((_, '}')) => {
                                raw.push('}');
                                break;
                            }
                            Some((_, c)) if c.is_ascii_hexdigit() => {
                                raw.push(c);
                                code = code.saturating_mul(16).saturating_add(c.to_digit(16).unwrap_or(0));
                            }
                            _ => return Err(self.error("invalid unicode escape")),
                        }
                    }
                    code
                } else {
                    self.scan_hex_digits(4, raw)?
                };
                cooked.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => cooked.push(other),
        }
        Ok(())
    }

    fn scan_hex_digits(&mut self, count: usize, raw: &mut String) -> Result<u32, String> {
        let mut code = 0u32;
        for _ in 0..count {
            match self.advance() {
                Some((_, c)) if c.is_ascii_hexdigit() => {
                    raw.push(c);
                    code = code.saturating_mul(16).saturating_add(c.to_digit(16).unwrap_or(0));
                }
                _ => return Err(self.error("invalid hexadecimal escape")),
            }
        }
        Ok(code)
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, String> {
        self.advance(); // consume opening quote

        let mut value = String::new();
        let mut raw = String::new();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some((_, c)) if c == quote => {
                    self.advance();
                    break;
                }
                Some((_, '\\')) => {
                    self.advance();
                    self.scan_escape(&mut value, &mut raw)?;
                }
                Some((_, '\n')) => {
                    return Err(self.error("unterminated string (newline in string)"));
                }
                Some((_, ch)) => {
                    self.advance();
                    value.push(ch);
                }
            }
        }

        Ok(TokenKind::Str(value))
    }

    /// Scans template text up to the closing backtick or the next `${`.
    /// Returns the cooked and raw text and whether a substitution follows.
    fn scan_template_text(&mut self) -> Result<(String, String, bool), String> {
        let mut cooked = String::new();
        let mut raw = String::new();

        loop {
            match self.advance() {
                None => return Err(self.error("unterminated template literal")),
                Some((_, '`')) => return Ok((cooked, raw, false)),
                Some((_, '$')) if self.match_char('{') => return Ok((cooked, raw, true)),
                Some((_, '\\')) => {
                    raw.push('\\');
                    self.scan_escape(&mut cooked, &mut raw)?;
                }
                Some((_, '\r')) => {
                    self.match_char('\n');
                    cooked.push('\n');
                    raw.push('\n');
                }
                Some((_, ch)) => {
                    cooked.push(ch);
                    raw.push(ch);
                }
            }
        }
    }

    fn scan_template_start(&mut self) -> Result<TokenKind, String> {
        let (cooked, raw, substitution) = self.scan_template_text()?;
        if substitution {
            self.template_braces.push(0);
            Ok(TokenKind::TemplateHead { cooked, raw })
        } else {
            Ok(TokenKind::Template { cooked, raw })
        }
    }

    fn scan_template_continuation(&mut self) -> Result<TokenKind, String> {
        let (cooked, raw, substitution) = self.scan_template_text()?;
        if substitution {
            Ok(TokenKind::TemplateMiddle { cooked, raw })
        } else {
            self.template_braces.pop();
            Ok(TokenKind::TemplateTail { cooked, raw })
        }
    }

    fn scan_regex(&mut self) -> Result<TokenKind, String> {
        self.advance(); // consume opening slash

        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            match self.advance() {
                None | Some((_, '\n')) => return Err(self.error("unterminated regular expression")),
                Some((_, '\\')) => {
                    pattern.push('\\');
                    match self.advance() {
                        Some((_, c)) if c != '\n' => pattern.push(c),
                        _ => return Err(self.error("unterminated regular expression")),
                    }
                }
                Some((_, '/')) if !in_class => break,
                Some((_, ch)) => {
                    match ch {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        _ => {}
                    }
                    pattern.push(ch);
                }
            }
        }

        let mut flags = String::new();
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphabetic() {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Ok(TokenKind::Regex { pattern, flags })
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.offset();

        while let Some((_, ch)) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.advance();
            } else {
                break;
            }
        }

        let end = self.offset();
        let ident = &self.source[start..end];

        match ident {
            "var" => TokenKind::Var,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "new" => TokenKind::New,
            "typeof" => TokenKind::Typeof,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::Instanceof,
            "this" => TokenKind::This,
            _ => TokenKind::Ident(ident.to_string()),
        }
    }

    fn error(&self, message: &str) -> String {
        format!(
            "error: {}\n  --> {}:{}:{}",
            message, self.filename, self.line, self.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new("test.js", source);
        lexer
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("var x = 42;"),
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".to_string()),
                TokenKind::Eq,
                TokenKind::Number(42.0),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a === b !== c >>> d => ...e"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::EqEqEq,
                TokenKind::Ident("b".to_string()),
                TokenKind::NotEqEq,
                TokenKind::Ident("c".to_string()),
                TokenKind::UShr,
                TokenKind::Ident("d".to_string()),
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::Ident("e".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1.5 .5 1e3 0x1F 0b11 42n 1_000"),
            vec![
                TokenKind::Number(1.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(31.0),
                TokenKind::Number(3.0),
                TokenKind::BigInt("42".to_string()),
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb" "\x41B""#),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Str("a\tb".to_string()),
                TokenKind::Str("AB".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_with_substitutions() {
        assert_eq!(
            kinds("int`a${ {x: 1} }b${y}c`"),
            vec![
                TokenKind::Ident("int".to_string()),
                TokenKind::TemplateHead {
                    cooked: "a".to_string(),
                    raw: "a".to_string()
                },
                TokenKind::LBrace,
                TokenKind::Ident("x".to_string()),
                TokenKind::Colon,
                TokenKind::Number(1.0),
                TokenKind::RBrace,
                TokenKind::TemplateMiddle {
                    cooked: "b".to_string(),
                    raw: "b".to_string()
                },
                TokenKind::Ident("y".to_string()),
                TokenKind::TemplateTail {
                    cooked: "c".to_string(),
                    raw: "c".to_string()
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_raw_keeps_escapes() {
        assert_eq!(
            kinds(r"`a\nb`"),
            vec![
                TokenKind::Template {
                    cooked: "a\nb".to_string(),
                    raw: r"a\nb".to_string()
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        assert_eq!(
            kinds("a / b; x = /fo+[/]o/gi"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Slash,
                TokenKind::Ident("b".to_string()),
                TokenKind::Semi,
                TokenKind::Ident("x".to_string()),
                TokenKind::Eq,
                TokenKind::Regex {
                    pattern: "fo+[/]o".to_string(),
                    flags: "gi".to_string()
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut lexer = Lexer::new("test.js", "a // one\n/* two\n */ b");
        let tokens = lexer.scan_tokens().unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].span, Span::new(3, 5));
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("test.js", "\"abc").scan_tokens().is_err());
        assert!(Lexer::new("test.js", "`abc").scan_tokens().is_err());
        assert!(Lexer::new("test.js", "a # b").scan_tokens().is_err());
        let err = Lexer::new("test.js", "/* open").scan_tokens().unwrap_err();
        assert!(err.contains("test.js:1:"));
    }
}
