use logos::Logos;

/// Raw character runs. Escapes are resolved by [`Lexer`](super::Lexer).
///
/// A trailing backslash is only possible at the end of the input, since any
/// other character following it is taken as the escaped character.
#[derive(Debug, PartialEq, Logos, Clone, Copy)]
pub enum Token {
    #[regex(r"\s+")]
    WhiteSpace,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[regex(r#""([^"\\]|\\(.|\n))*(\\|")?"#)]
    Quoted,

    #[regex(r#"([^\s()"\\]|\\(.|\n))+\\?"#)]
    #[token("\\")]
    Bare,

    #[error]
    Error,
}
