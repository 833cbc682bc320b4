use crate::error::AsmError;
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum TokenKind {
    /// `.class`, `.method`, `.line`, ...
    #[regex(r"\.[a-z]+", |lex| lex.slice()[1..].to_string())]
    Directive(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*:", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    Label(String),

    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLit(i64),
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    #[token("NaN", |_| f64::NAN)]
    #[token("Infinity", |_| f64::INFINITY)]
    #[token("-Infinity", |_| f64::NEG_INFINITY)]
    FloatLit(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    StringLit(String),

    /// A method descriptor such as `(JLjava/lang/String;)Z`.
    #[regex(r"\([^)\s]*\)[^\s#]+", |lex| lex.slice().to_string())]
    Descriptor(String),

    /// Mnemonics, class names, member names, field descriptors and labels.
    #[regex(r"[A-Za-z_$<\[][A-Za-z0-9_/.$<>;\[]*", |lex| lex.slice().to_string())]
    Word(String),

    #[token("\n")]
    Newline,
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

pub fn lex(source: &str) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut line_start = 0usize;

    let mut lexer = TokenKind::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let col = span.start - line_start + 1;
        match result {
            Ok(TokenKind::Newline) => {
                tokens.push(Token { kind: TokenKind::Newline, line, col });
                line += 1;
                line_start = span.end;
            }
            Ok(kind) => tokens.push(Token { kind, line, col }),
            Err(_) => {
                return Err(AsmError::Lexer {
                    line,
                    col,
                    msg: format!("unexpected input: {:?}", &source[span.start..span.end]),
                });
            }
        }
    }

    Ok(tokens)
}
