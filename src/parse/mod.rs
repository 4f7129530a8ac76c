mod lexer;
mod machine;
mod parser;
mod token;

pub use lexer::{Lexeme, Lexer};
pub use machine::{Flow, Function, Machine, Operands, Outcome, SILENCE};
pub use parser::Parser;
pub use token::Token;
