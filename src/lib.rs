//! A translator from Jack classes to stack machine (VM) code.
//!
//! Each class is compiled in a single pass: there's no intermediate tree, the
//! recursive descent translator emits code as it recognizes the grammar.

use crate::codegen::labels::{LabelCounter, LabelSource};

pub use crate::{
    error::{Error, ErrorKind},
    translator::{translate, CompiledUnit},
};

/// The lexer takes the source input, mapping it into a stream of tokens.
pub mod lexer;

/// Class and subroutine scopes.
pub mod symbol_table;

/// The translator consumes the token stream, emitting VM code as it goes.
pub mod translator;

pub mod codegen;
pub mod error;
pub mod token;

pub mod util {
    #[cfg(test)]
    pub(crate) mod test_utils;
}

/// Compiles the classes of a program, one unit at a time.
///
/// Labels are global in the target, so every unit of a program must go
/// through the same compiler (or through compilers sharing a
/// [`SharedLabels`](codegen::labels::SharedLabels) source).
#[derive(Debug, Default)]
pub struct Compiler<L = LabelCounter> {
    labels: L,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler::default()
    }
}

impl<L: LabelSource> Compiler<L> {
    pub fn with_labels(labels: L) -> Compiler<L> {
        Compiler { labels }
    }

    /// Compiles the class in `src`. `unit` names it in error messages.
    pub fn compile(&mut self, unit: &str, src: &str) -> Result<CompiledUnit, Error> {
        translate(unit, src, &mut self.labels)
    }

    pub fn labels(&self) -> &L {
        &self.labels
    }

    pub fn into_labels(self) -> L {
        self.labels
    }
}
