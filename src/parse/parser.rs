use super::lexer::Lexer;
use super::machine::{Flow, Machine, Operands, Outcome};
use crate::functions::{Value, CORE_FUNCTIONS};
use crate::{Context, Error, ErrorType};
use log::info;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Runs ledger source against a [`Context`].
///
/// A parser starts with whatever functions it is given; [`Parser::default`]
/// installs the built-in vocabulary. Functions registered later replace
/// built-ins of the same name, which is how callers observe or cut short a
/// run.
pub struct Parser<'f> {
    machine: Machine<'f, Value, Context>,
    ctx: Context,
}

impl<'f> Default for Parser<'f> {
    fn default() -> Self {
        let mut parser = Parser::new();
        parser.add_core_functions();
        parser
    }
}

impl<'f> Parser<'f> {
    /// Creates a parser without any functions.
    pub fn new() -> Self {
        Parser {
            machine: Machine::new(),
            ctx: Context::new(),
        }
    }

    /// Registers every built-in, replacing functions of the same name.
    pub fn add_core_functions(&mut self) {
        for (name, f) in CORE_FUNCTIONS {
            self.machine.register(name, move |fn_name, op, ctx| {
                f(fn_name, op, ctx).map(|_| Flow::Continue)
            });
        }
    }

    /// Registers `f` under `name`, replacing any function already there.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: FnMut(&str, Operands<'_, Value>, &mut Context) -> Result<Flow, Error> + 'f,
    {
        self.machine.register(name, f);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.machine.is_registered(name)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn into_context(self) -> Context {
        self.ctx
    }

    /// Runs `src` to its end or until a function stops the run. A run that
    /// reaches the end must leave no operands, scopes, or silence behind.
    pub fn parse_str(&mut self, src: &str) -> Result<Outcome, Error> {
        let mut lexer = Lexer::new(src);
        let outcome = self.machine.run(&mut lexer, &mut self.ctx)?;
        if outcome == Outcome::Finished {
            self.machine.finish()?;
        }
        info!(
            "{} accounts, {} commodities, {} tags",
            self.ctx.accounts.len(),
            self.ctx.commodities.len(),
            self.ctx.tags.len()
        );
        Ok(outcome)
    }

    /// Reads everything from `reader` and runs it. Invalid UTF-8 sequences
    /// are replaced with U+FFFD.
    pub fn parse<R: Read>(&mut self, mut reader: R) -> Result<Outcome, Error> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| read_error(format!("Couldn't read input: {}", e)))?;
        self.parse_str(&String::from_utf8_lossy(&bytes))
    }

    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Outcome, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| read_error(format!("Couldn't read {}: {}", path.display(), e)))?;
        self.parse_str(&String::from_utf8_lossy(&bytes))
    }
}

fn read_error(msg: String) -> Error {
    Error::new(ErrorType::Io, msg).at_line(1)
}
