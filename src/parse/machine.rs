use super::lexer::{Lexeme, Lexer};
use crate::{Error, ErrorType};
use log::{debug, info, trace};
use std::collections::HashMap;

/// The reserved word that suppresses evaluation until the enclosing scope
/// closes.
pub const SILENCE: &str = "silence";

/// What a called function asks the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop reading input without an error.
    Stop,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The input was consumed completely.
    Finished,
    /// A function returned [`Flow::Stop`].
    Stopped,
}

/// A function callable by name from ledger source. It receives the name it was
/// called by, its operands, and the caller's context.
pub type Function<'f, V, C> =
    Box<dyn FnMut(&str, Operands<'_, V>, &mut C) -> Result<Flow, Error> + 'f>;

/// The window of the operand stack visible to one function call: everything
/// pushed since the innermost open scope.
pub struct Operands<'a, V> {
    stack: &'a mut Vec<V>,
    floor: usize,
}

impl<'a, V> Operands<'a, V> {
    fn new(stack: &'a mut Vec<V>, floor: usize) -> Self {
        debug_assert!(floor <= stack.len());
        Operands { stack, floor }
    }

    /// Returns the visible values, bottom first.
    pub fn values(&self) -> &[V] {
        &self.stack[self.floor..]
    }

    pub fn len(&self) -> usize {
        self.stack.len() - self.floor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts the values at the top of the view that satisfy `pred`, stopping
    /// at the first one that does not.
    pub fn count_trailing(&self, pred: impl Fn(&V) -> bool) -> usize {
        self.values().iter().rev().take_while(|v| pred(v)).count()
    }

    pub fn push(&mut self, value: V) {
        self.stack.push(value);
    }

    /// Pops up to `n` values, returned bottom first. Never pops below the
    /// view's floor.
    pub fn pop(&mut self, n: usize) -> Vec<V> {
        let start = self.stack.len() - n.min(self.len());
        self.stack.split_off(start)
    }

    /// Pops exactly `n` values, bottom first, or fails without popping.
    pub fn pop_exact(&mut self, n: usize, fn_name: &str, what: &str) -> Result<Vec<V>, Error> {
        if self.len() < n {
            return Err(Error::new(
                ErrorType::Operand,
                format!(
                    "{}: {} operands required, but too few given",
                    fn_name, what
                ),
            ));
        }
        Ok(self.pop(n))
    }
}

/// A reverse Polish notation evaluator over a stream of [`Lexeme`]s.
///
/// Unquoted text naming a registered function calls it; any other text is
/// pushed onto the operand stack as a `V`. Parentheses push and pop markers
/// that bound what a function can see, and a scope must leave the operand
/// stack exactly as long as it found it.
pub struct Machine<'f, V, C> {
    stack: Vec<V>,
    markers: Vec<usize>,
    /// Marker depth at which `silence` was seen, or 0.
    silenced: usize,
    line: usize,
    functions: HashMap<String, Function<'f, V, C>>,
}

impl<'f, V, C> Default for Machine<'f, V, C> {
    fn default() -> Self {
        Machine {
            stack: Vec::new(),
            markers: Vec::new(),
            silenced: 0,
            line: 1,
            functions: HashMap::new(),
        }
    }
}

impl<'f, V: From<String>, C> Machine<'f, V, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`, replacing any function already there.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: FnMut(&str, Operands<'_, V>, &mut C) -> Result<Flow, Error> + 'f,
    {
        self.functions.insert(name.to_string(), Box::new(f));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the visible operand stack, bottom first.
    pub fn stack(&self) -> &[V] {
        &self.stack
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced != 0
    }

    /// Evaluates every lexeme `lexer` produces. Errors carry the line on which
    /// they were detected and end the run.
    pub fn run(&mut self, lexer: &mut Lexer<'_>, ctx: &mut C) -> Result<Outcome, Error> {
        loop {
            let lexeme = lexer.next_lexeme();
            self.line = lexer.line();
            let lexeme = lexeme?;
            if lexeme == Lexeme::End {
                info!("reached end of input at line {}", self.line);
                return Ok(Outcome::Finished);
            }
            let flow = self
                .step(lexeme, ctx)
                .map_err(|e| e.at_line(self.line))?;
            if flow == Flow::Stop {
                info!("stopped at line {}", self.line);
                return Ok(Outcome::Stopped);
            }
        }
    }

    /// Applies one lexeme.
    pub fn step(&mut self, lexeme: Lexeme, ctx: &mut C) -> Result<Flow, Error> {
        match lexeme {
            Lexeme::Text(text) => {
                if self.is_silenced() {
                    return Ok(Flow::Continue);
                }
                if text == SILENCE {
                    if self.markers.is_empty() {
                        return Err(syntax("found \"silence\" outside parentheses"));
                    }
                    debug!("silenced at depth {}", self.markers.len());
                    self.silenced = self.markers.len();
                } else if let Some(f) = self.functions.get_mut(&text) {
                    trace!("calling {} at line {}", text, self.line);
                    let floor = self.markers.last().copied().unwrap_or(0);
                    return f(text.as_str(), Operands::new(&mut self.stack, floor), ctx);
                } else {
                    self.stack.push(V::from(text));
                }
            }
            Lexeme::QuotedText(text) => {
                if !self.is_silenced() {
                    self.stack.push(V::from(text));
                }
            }
            Lexeme::OpenScope => self.markers.push(self.stack.len()),
            Lexeme::CloseScope => self.close_scope()?,
            Lexeme::End => {}
        }
        Ok(Flow::Continue)
    }

    fn close_scope(&mut self) -> Result<(), Error> {
        let depth = self.markers.len();
        let marker = self
            .markers
            .pop()
            .ok_or_else(|| syntax("closing parenthesis does not have a matching open parenthesis"))?;
        if depth == self.silenced {
            debug!("silence lifted at depth {}", depth);
            self.silenced = 0;
        }
        if self.stack.len() != marker {
            return Err(syntax(&format!(
                "{} unconsumed operands at closing parenthesis",
                self.stack.len() - marker
            )));
        }
        Ok(())
    }

    /// Checks that a completed run left nothing behind.
    pub fn finish(&self) -> Result<(), Error> {
        let err = if !self.stack.is_empty() {
            syntax(&format!(
                "{} unconsumed tokens left on stack at EOF",
                self.stack.len()
            ))
        } else if !self.markers.is_empty() {
            syntax(&format!(
                "{} unclosed parentheses at EOF",
                self.markers.len()
            ))
        } else if self.is_silenced() {
            syntax("parser evaluation silenced at EOF")
        } else {
            return Ok(());
        };
        Err(err.at_line(self.line))
    }
}

fn syntax(msg: &str) -> Error {
    Error::new(ErrorType::Syntax, msg)
}
