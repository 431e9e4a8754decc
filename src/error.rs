//! Recolección y presentación de diagnósticos.
//!
//! Todas las fases reportan errores como valores tipados con su
//! ubicación ([`Located`]). Este módulo los reúne en una colección
//! [`Diagnostics`] que conoce el archivo de origen y los presenta
//! en el formato `FILE:LINE:COL:clase: MENSAJE`. La clase del
//! diagnóstico determina además el código de salida del compilador.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

/// Código de salida para errores sintácticos.
pub const EXIT_SYNTAX: i32 = 100;

/// Código de salida para errores semánticos.
pub const EXIT_SEMANTIC: i32 = 200;

/// Clase de un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Class {
    Syntax,
    Semantic,
}

impl Display for Class {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Syntax => fmt.write_str("error"),
            Class::Semantic => fmt.write_str("semantic error"),
        }
    }
}

/// Un error ya clasificado y presentable.
#[derive(Debug)]
pub struct Diagnostic {
    class: Class,
    location: Location,
    message: String,
}

impl Diagnostic {
    /// Clasifica un error como sintáctico.
    pub fn syntax<M: Display>(location: Location, message: M) -> Self {
        Diagnostic {
            class: Class::Syntax,
            location,
            message: message.to_string(),
        }
    }

    /// Clasifica un error como semántico.
    pub fn semantic<M: Display>(location: Location, message: M) -> Self {
        Diagnostic {
            class: Class::Semantic,
            location,
            message: message.to_string(),
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: Error> From<Located<E>> for Diagnostic {
    fn from(error: Located<E>) -> Self {
        let (location, error) = error.split();
        Diagnostic::syntax(location, error)
    }
}

/// Diagnósticos acumulados para un mismo archivo fuente.
pub struct Diagnostics {
    file: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Crea una colección vacía para un archivo.
    pub fn new<S: Into<String>>(file: S) -> Self {
        Diagnostics {
            file: file.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        self.entries.extend(diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Código de salida que corresponde a lo acumulado.
    ///
    /// Los errores sintácticos dominan sobre los semánticos, ya que
    /// un error de sintaxis invalida el resto del análisis.
    pub fn exit_code(&self) -> i32 {
        let syntax = self
            .entries
            .iter()
            .any(|entry| entry.class() == Class::Syntax);

        if syntax {
            EXIT_SYNTAX
        } else {
            EXIT_SEMANTIC
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for Diagnostic {
            class,
            location,
            message,
        } in &self.entries
        {
            writeln!(fmt, "{}:{}:{}: {}", self.file, location, class, message)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_dominate_exit_code() {
        let mut diagnostics = Diagnostics::new("f.wacc");
        diagnostics.push(Diagnostic::semantic(Location::default(), "bad types"));
        diagnostics.push(Diagnostic::syntax(Location::default(), "bad shape"));

        assert_eq!(diagnostics.exit_code(), EXIT_SYNTAX);
    }

    #[test]
    fn renders_file_line_column_and_class() {
        let mut diagnostics = Diagnostics::new("f.wacc");
        let location = Location::default().newline().advance();
        diagnostics.push(Diagnostic::semantic(location, "type mismatch"));

        assert_eq!(
            diagnostics.to_string(),
            "f.wacc:2:2:semantic error: type mismatch\n"
        );
    }
}
