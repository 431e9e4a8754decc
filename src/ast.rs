//! Árbol de sintaxis abstracta.
//!
//! A diferencia del árbol de parseo ([`crate::peg`]), el AST ya no
//! conserva reglas gramaticales: cada nodo es una entidad del
//! lenguaje. Las secuencias `;` se representan como contenedores
//! [`Vec<Stat>`] en orden de programa, de manera que las fases
//! posteriores (análisis semántico, optimización, generación de
//! código) operan sobre posiciones y no sobre punteros de sucesor.
//!
//! El AST es inmutable luego de su construcción, con la excepción
//! del optimizador, que toma ownership de los subárboles que
//! reemplaza.

use crate::{lex::Identifier, source::Located, types::Type};

/// Raíz de un programa: funciones definidas y cuerpo principal.
#[derive(Debug)]
pub struct Program {
    pub functions: Vec<Function>,
    pub main: Vec<Stat>,
}

/// Definición de función de usuario.
#[derive(Debug)]
pub struct Function {
    pub returns: Type,
    pub name: Located<Identifier>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Stat>,
}

#[derive(Debug)]
pub struct Parameter {
    pub of: Type,
    pub name: Located<Identifier>,
}

/// Una sentencia.
#[derive(Debug)]
pub enum Stat {
    Skip,

    Declare {
        of: Type,
        name: Located<Identifier>,
        value: Located<Rhs>,
    },

    Assign {
        target: Lhs,
        value: Located<Rhs>,
    },

    Read(Lhs),
    Free(Located<Expr>),
    Return(Located<Expr>),
    Exit(Located<Expr>),
    Print(Located<Expr>),
    Println(Located<Expr>),

    If {
        condition: Located<Expr>,
        on_true: Vec<Stat>,
        on_false: Vec<Stat>,
    },

    While {
        condition: Located<Expr>,
        body: Vec<Stat>,
    },

    /// `begin ... end` anidado; abre un scope propio.
    Block(Vec<Stat>),
}

/// Una expresión. Inmutable luego de su construcción.
#[derive(Debug, Clone)]
pub enum Expr {
    Int(i32),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
    Ident(Identifier),

    ArrayElem {
        array: Located<Identifier>,
        indices: Vec<Located<Expr>>,
    },

    Unary(UnaryOp, Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Paren(Box<Located<Expr>>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Len,
    Ord,
    Chr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

/// Destino de una asignación o lectura.
#[derive(Debug)]
pub enum Lhs {
    Var(Located<Identifier>),

    ArrayElem {
        array: Located<Identifier>,
        indices: Vec<Located<Expr>>,
    },

    PairElem(PairField, Box<Located<Expr>>),
}

impl Lhs {
    /// Ubicación representativa del destino.
    pub fn location(&self) -> crate::source::Location {
        match self {
            Lhs::Var(name) => name.location(),
            Lhs::ArrayElem { array, .. } => array.location(),
            Lhs::PairElem(_, operand) => operand.location(),
        }
    }
}

/// Lado derecho de una asignación o declaración.
#[derive(Debug)]
pub enum Rhs {
    Expr(Located<Expr>),
    ArrayLiter(Vec<Located<Expr>>),
    NewPair(Located<Expr>, Located<Expr>),
    PairElem(PairField, Box<Located<Expr>>),

    Call {
        function: Located<Identifier>,
        args: Vec<Located<Expr>>,
    },
}

/// Selector de componente de par.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PairField {
    Fst,
    Snd,
}
