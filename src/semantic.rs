//! Análisis semántico.
//!
//! El análisis ocurre en dos pasadas que corren en paralelo y
//! reportan a un mismo flujo de diagnósticos:
//!
//! - **Pasada A** (tipos y scopes): un recorrido post-orden del AST
//!   con el scope actual a cuestas. Cada expresión infiere su tipo;
//!   una inferencia fallida produce [`Type::Invalid`], que suprime
//!   diagnósticos derivados del mismo error.
//! - **Pasada B** (rutas de retorno): una tarea por función verifica
//!   que toda ruta de control termine en `return` o `exit`. Una
//!   función que no lo cumple es un error *sintáctico*, no semántico.
//!
//! Ninguna pasada se detiene en el primer error: el objetivo es
//! reportar todos los problemas del programa en una sola ejecución.

use std::{
    collections::HashMap,
    sync::mpsc::{self, Sender},
    thread,
};

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Function, Lhs, PairField, Program, Rhs, Stat, UnaryOp},
    error::Diagnostic,
    lex::Identifier,
    source::{Located, Location},
    task,
    types::Type,
};

/// Error semántico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    /// El identificador ya existe en el frame actual.
    #[error("Redeclaration of variable `{name}`, previously declared as {previous}")]
    Redeclaration { name: Identifier, previous: Type },

    /// Referencia a un identificador desconocido.
    #[error("Undeclared variable `{0}`")]
    Undeclared(Identifier),

    /// Un operando, asignación o condición tiene el tipo equivocado.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },

    /// Sintaxis de llamada aplicada a una variable.
    #[error("`{0}` is not a function")]
    CallingNonFunction(Identifier),

    /// Cantidad de argumentos distinta a la declarada.
    #[error("Function `{name}` expects {expected} argument(s), found {found}")]
    WrongArity {
        name: Identifier,
        expected: usize,
        found: usize,
    },

    /// Dos funciones con el mismo nombre.
    #[error("Redefinition of function `{0}`")]
    FunctionRedefinition(Identifier),

    /// `return` fuera de toda función.
    #[error("Cannot return from the program body")]
    ReturnFromMain,
}

/// Firma de una función de usuario.
#[derive(Debug, Clone)]
pub struct Signature {
    pub returns: Type,
    pub parameters: Vec<Type>,
}

/// Pila de frames de variables sobre una tabla plana de funciones.
///
/// La tabla de funciones se comparte en modo lectura entre todos
/// los frames; cada frame de variables pertenece a exactamente un
/// nivel léxico. Redeclarar es ilegal solamente dentro de un mismo
/// frame: un frame interior puede hacer sombra a un nombre exterior
/// sin destruirlo.
pub struct Scope<'t> {
    functions: &'t HashMap<Identifier, Signature>,
    base: HashMap<Identifier, Type>,
    frames: Vec<HashMap<Identifier, Type>>,
}

impl<'t> Scope<'t> {
    pub fn new(functions: &'t HashMap<Identifier, Signature>) -> Self {
        Scope {
            functions,
            base: HashMap::new(),
            frames: Vec::new(),
        }
    }

    /// Abre un frame interior.
    pub fn child(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Cierra el frame interior más reciente.
    pub fn leave(&mut self) {
        self.frames.pop();
    }

    /// Instala una variable en el frame actual.
    ///
    /// Si el nombre ya existía en este mismo frame, retorna el tipo
    /// anterior para que el llamador reporte la redeclaración.
    pub fn declare(&mut self, name: Identifier, of: Type) -> Option<Type> {
        let frame = self.frames.last_mut().unwrap_or(&mut self.base);
        frame.insert(name, of)
    }

    /// Busca una variable desde el frame actual hacia afuera.
    pub fn lookup(&self, name: &Identifier) -> Option<&Type> {
        self.frames
            .iter()
            .rev()
            .chain(std::iter::once(&self.base))
            .find_map(|frame| frame.get(name))
    }

    /// Consulta la tabla plana de funciones.
    pub fn function(&self, name: &Identifier) -> Option<&Signature> {
        self.functions.get(name)
    }
}

/// Ejecuta ambas pasadas sobre un programa y reúne sus diagnósticos.
///
/// El orden relativo entre diagnósticos de tareas distintas no está
/// definido; dentro de una misma pasada se preserva el orden del
/// recorrido.
pub fn analyse(program: &Program) -> Vec<Diagnostic> {
    thread::scope(|tasks| {
        let mut streams = Vec::new();

        {
            let (sender, receiver) = mpsc::channel();
            streams.push(receiver);
            tasks.spawn(move || Checker::new(sender).program(program));
        }

        for function in &program.functions {
            let (sender, receiver) = mpsc::channel();
            streams.push(receiver);
            tasks.spawn(move || check_returns(function, &sender));
        }

        task::merge(streams).into_iter().collect()
    })
}

/// Pasada A: tipos y scopes.
struct Checker {
    sink: Sender<Diagnostic>,
}

impl Checker {
    fn new(sink: Sender<Diagnostic>) -> Self {
        Checker { sink }
    }

    fn program(&self, program: &Program) {
        let mut functions = HashMap::new();
        for function in &program.functions {
            let signature = Signature {
                returns: function.returns.clone(),
                parameters: function
                    .parameters
                    .iter()
                    .map(|parameter| parameter.of.clone())
                    .collect(),
            };

            let name = function.name.as_ref().clone();
            if functions.insert(name.clone(), signature).is_some() {
                self.emit(
                    function.name.location(),
                    SemanticError::FunctionRedefinition(name),
                );
            }
        }

        for function in &program.functions {
            let mut scope = Scope::new(&functions);
            for parameter in &function.parameters {
                let name = parameter.name.as_ref().clone();
                if let Some(previous) = scope.declare(name.clone(), parameter.of.clone()) {
                    self.emit(
                        parameter.name.location(),
                        SemanticError::Redeclaration { name, previous },
                    );
                }
            }

            // El cuerpo puede hacer sombra a los parámetros
            scope.child();
            self.body(&mut scope, &function.body, Some(&function.returns));
        }

        let mut scope = Scope::new(&functions);
        self.body(&mut scope, &program.main, None);
    }

    fn body(&self, scope: &mut Scope, body: &[Stat], returns: Option<&Type>) {
        for statement in body {
            self.statement(scope, statement, returns);
        }
    }

    fn statement(&self, scope: &mut Scope, statement: &Stat, returns: Option<&Type>) {
        match statement {
            Stat::Skip => (),

            Stat::Declare { of, name, value } => {
                // El lado derecho se evalúa antes de declarar, de
                // forma que `int x = x` refiere al `x` exterior
                let found = self.rhs(scope, value);
                self.require(value.location(), of, found);

                let name_value = name.as_ref().clone();
                if let Some(previous) = scope.declare(name_value.clone(), of.clone()) {
                    self.emit(
                        name.location(),
                        SemanticError::Redeclaration {
                            name: name_value,
                            previous,
                        },
                    );
                }
            }

            Stat::Assign { target, value } => {
                let expected = self.lhs(scope, target);
                let found = self.rhs(scope, value);
                self.require(value.location(), &expected, found);
            }

            Stat::Read(target) => {
                let found = self.lhs(scope, target);
                if !matches!(found, Type::Invalid | Type::Int | Type::Char) {
                    self.emit(
                        target.location(),
                        SemanticError::TypeMismatch {
                            expected: Type::Int,
                            found,
                        },
                    );
                }
            }

            Stat::Free(operand) => {
                let found = self.expr(scope, operand);
                if !(found == Type::Invalid || found.is_pair() || found.is_array()) {
                    self.emit(
                        operand.location(),
                        SemanticError::TypeMismatch {
                            expected: Type::wild_pair(),
                            found,
                        },
                    );
                }
            }

            Stat::Return(operand) => {
                let found = self.expr(scope, operand);
                match returns {
                    Some(expected) => self.require(operand.location(), expected, found),
                    None => self.emit(operand.location(), SemanticError::ReturnFromMain),
                }
            }

            Stat::Exit(operand) => {
                let found = self.expr(scope, operand);
                self.require(operand.location(), &Type::Int, found);
            }

            Stat::Print(operand) | Stat::Println(operand) => {
                self.expr(scope, operand);
            }

            Stat::If {
                condition,
                on_true,
                on_false,
            } => {
                let found = self.expr(scope, condition);
                self.require(condition.location(), &Type::Bool, found);

                scope.child();
                self.body(scope, on_true, returns);
                scope.leave();

                scope.child();
                self.body(scope, on_false, returns);
                scope.leave();
            }

            Stat::While { condition, body } => {
                let found = self.expr(scope, condition);
                self.require(condition.location(), &Type::Bool, found);

                scope.child();
                self.body(scope, body, returns);
                scope.leave();
            }

            Stat::Block(body) => {
                scope.child();
                self.body(scope, body, returns);
                scope.leave();
            }
        }
    }

    fn lhs(&self, scope: &Scope, lhs: &Lhs) -> Type {
        match lhs {
            Lhs::Var(name) => self.variable(scope, name.as_ref(), name.location()),
            Lhs::ArrayElem { array, indices } => self.array_elem(scope, array, indices),
            Lhs::PairElem(field, operand) => self.pair_elem(scope, *field, operand),
        }
    }

    fn rhs(&self, scope: &Scope, rhs: &Located<Rhs>) -> Type {
        match rhs.as_ref() {
            Rhs::Expr(expr) => self.expr(scope, expr),

            Rhs::ArrayLiter(elements) => {
                let mut base: Option<Type> = None;
                for element in elements {
                    let found = self.expr(scope, element);
                    if found == Type::Invalid {
                        continue;
                    }

                    match &base {
                        None => base = Some(found),
                        Some(expected) => self.require(element.location(), expected, found),
                    }
                }

                Type::Array(base.map(Box::new))
            }

            Rhs::NewPair(first, second) => {
                let first = self.expr(scope, first);
                let second = self.expr(scope, second);

                if first == Type::Invalid || second == Type::Invalid {
                    Type::Invalid
                } else {
                    Type::Pair(Some(Box::new(first)), Some(Box::new(second)))
                }
            }

            Rhs::PairElem(field, operand) => self.pair_elem(scope, *field, operand),

            Rhs::Call { function, args } => {
                let found: Vec<(Location, Type)> = args
                    .iter()
                    .map(|arg| (arg.location(), self.expr(scope, arg)))
                    .collect();

                let signature = match scope.function(function.as_ref()) {
                    Some(signature) => signature,
                    None => {
                        let name = function.as_ref().clone();
                        let error = if scope.lookup(function.as_ref()).is_some() {
                            SemanticError::CallingNonFunction(name)
                        } else {
                            SemanticError::Undeclared(name)
                        };

                        self.emit(function.location(), error);
                        return Type::Invalid;
                    }
                };

                if signature.parameters.len() != found.len() {
                    self.emit(
                        function.location(),
                        SemanticError::WrongArity {
                            name: function.as_ref().clone(),
                            expected: signature.parameters.len(),
                            found: found.len(),
                        },
                    );
                } else {
                    for (expected, (location, found)) in signature.parameters.iter().zip(found) {
                        self.require(location, expected, found);
                    }
                }

                signature.returns.clone()
            }
        }
    }

    fn expr(&self, scope: &Scope, expr: &Located<Expr>) -> Type {
        match expr.as_ref() {
            Expr::Int(_) => Type::Int,
            Expr::Bool(_) => Type::Bool,
            Expr::Char(_) => Type::Char,
            Expr::Str(_) => Type::string(),
            Expr::Null => Type::wild_pair(),

            Expr::Ident(name) => self.variable(scope, name, expr.location()),

            Expr::ArrayElem { array, indices } => self.array_elem(scope, array, indices),

            Expr::Unary(operator, operand) => {
                let found = self.expr(scope, operand);
                if found == Type::Invalid {
                    return Type::Invalid;
                }

                let (expected, result) = match operator {
                    UnaryOp::Not => (Type::Bool, Type::Bool),
                    UnaryOp::Negate => (Type::Int, Type::Int),
                    UnaryOp::Ord => (Type::Char, Type::Int),
                    UnaryOp::Chr => (Type::Int, Type::Char),

                    UnaryOp::Len => {
                        if found.is_array() {
                            return Type::Int;
                        }

                        self.emit(
                            operand.location(),
                            SemanticError::TypeMismatch {
                                expected: Type::Array(None),
                                found,
                            },
                        );

                        return Type::Invalid;
                    }
                };

                if expected.matches(&found) {
                    result
                } else {
                    self.emit(
                        operand.location(),
                        SemanticError::TypeMismatch { expected, found },
                    );

                    Type::Invalid
                }
            }

            Expr::Binary(left, operator, right) => self.binary(scope, left, *operator, right),

            Expr::Paren(inner) => self.expr(scope, inner),
        }
    }

    fn binary(
        &self,
        scope: &Scope,
        left: &Located<Expr>,
        operator: BinOp,
        right: &Located<Expr>,
    ) -> Type {
        use BinOp::*;

        let lhs = self.expr(scope, left);
        let rhs = self.expr(scope, right);
        if lhs == Type::Invalid || rhs == Type::Invalid {
            return Type::Invalid;
        }

        match operator {
            Mul | Div | Mod | Add | Sub => {
                self.require(left.location(), &Type::Int, lhs);
                self.require(right.location(), &Type::Int, rhs);
                Type::Int
            }

            Greater | GreaterEqual | Less | LessEqual => {
                if !matches!(lhs, Type::Int | Type::Char) {
                    self.emit(
                        left.location(),
                        SemanticError::TypeMismatch {
                            expected: Type::Int,
                            found: lhs,
                        },
                    );
                } else if !lhs.matches(&rhs) {
                    self.emit(
                        right.location(),
                        SemanticError::TypeMismatch {
                            expected: lhs,
                            found: rhs,
                        },
                    );
                }

                Type::Bool
            }

            Equal | NotEqual => {
                if !lhs.matches(&rhs) {
                    self.emit(
                        right.location(),
                        SemanticError::TypeMismatch {
                            expected: lhs,
                            found: rhs,
                        },
                    );
                }

                Type::Bool
            }

            And | Or => {
                self.require(left.location(), &Type::Bool, lhs);
                self.require(right.location(), &Type::Bool, rhs);
                Type::Bool
            }
        }
    }

    fn variable(&self, scope: &Scope, name: &Identifier, location: Location) -> Type {
        match scope.lookup(name) {
            Some(of) => of.clone(),
            None => {
                self.emit(location, SemanticError::Undeclared(name.clone()));
                Type::Invalid
            }
        }
    }

    fn array_elem(
        &self,
        scope: &Scope,
        array: &Located<Identifier>,
        indices: &[Located<Expr>],
    ) -> Type {
        let mut of = self.variable(scope, array.as_ref(), array.location());

        for index in indices {
            let found = self.expr(scope, index);
            self.require(index.location(), &Type::Int, found);

            of = match of {
                Type::Array(Some(base)) => *base,

                // Base comodín: el tipo del elemento no se conoce
                Type::Array(None) | Type::Invalid => Type::Invalid,

                found => {
                    self.emit(
                        array.location(),
                        SemanticError::TypeMismatch {
                            expected: Type::Array(None),
                            found,
                        },
                    );

                    Type::Invalid
                }
            };
        }

        of
    }

    fn pair_elem(&self, scope: &Scope, field: PairField, operand: &Located<Expr>) -> Type {
        let found = self.expr(scope, operand);

        match found {
            Type::Pair(first, second) => {
                let component = match field {
                    PairField::Fst => first,
                    PairField::Snd => second,
                };

                // Componente comodín: tipo desconocido, sin cascada
                component.map(|inner| *inner).unwrap_or(Type::Invalid)
            }

            Type::Invalid => Type::Invalid,

            found => {
                self.emit(
                    operand.location(),
                    SemanticError::TypeMismatch {
                        expected: Type::wild_pair(),
                        found,
                    },
                );

                Type::Invalid
            }
        }
    }

    /// Verifica un tipo inferido contra una expectativa concreta.
    ///
    /// `Invalid` en cualquiera de los lados suprime el diagnóstico,
    /// ya que el error original fue reportado donde ocurrió.
    fn require(&self, location: Location, expected: &Type, found: Type) {
        if found == Type::Invalid || *expected == Type::Invalid {
            return;
        }

        if !expected.matches(&found) {
            self.emit(
                location,
                SemanticError::TypeMismatch {
                    expected: expected.clone(),
                    found,
                },
            );
        }
    }

    fn emit(&self, location: Location, error: SemanticError) {
        // El receptor vive hasta que el análisis completo termina
        let _ = self.sink.send(Diagnostic::semantic(location, error));
    }
}

/// Pasada B: rutas de retorno de una función.
fn check_returns(function: &Function, sink: &Sender<Diagnostic>) {
    if !has_return(&function.body) {
        let message = format!("Expecting function '{}' to return", function.name.as_ref());
        let _ = sink.send(Diagnostic::syntax(function.name.location(), message));
    }
}

/// Predicado recursivo de completitud de rutas.
///
/// Una secuencia satisface el predicado si alguna de sus posiciones
/// lo hace; un `if` lo satisface solo cuando ambas ramas lo hacen.
fn has_return(body: &[Stat]) -> bool {
    body.iter().any(|statement| match statement {
        Stat::Return(_) | Stat::Exit(_) => true,

        Stat::If {
            on_true, on_false, ..
        } => has_return(on_true) && has_return(on_false),

        Stat::Block(body) => has_return(body),

        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Class, lex::Lexer, peg, tree};

    fn analyse_source(source: &str) -> Vec<Diagnostic> {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        let root = peg::parse(&tokens).expect("parser failure");
        let program = tree::build(&root).expect("adapter failure");

        analyse(&program)
    }

    #[test]
    fn accepts_well_typed_program() {
        assert!(analyse_source("begin int x = 1 + 2 * 3 ; exit x end").is_empty());
    }

    #[test]
    fn shadowing_restores_outer_binding() {
        let functions = HashMap::new();
        let mut scope = Scope::new(&functions);
        let x = Identifier::new("x");

        assert!(scope.declare(x.clone(), Type::Bool).is_none());

        scope.child();
        assert!(scope.declare(x.clone(), Type::Int).is_none());
        assert_eq!(scope.lookup(&x), Some(&Type::Int));
        scope.leave();

        assert_eq!(scope.lookup(&x), Some(&Type::Bool));
    }

    #[test]
    fn redeclaration_in_same_frame_is_reported_once() {
        let diagnostics = analyse_source("begin int x = 1 ; int x = 2 end");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message().contains("Redeclaration"));
    }

    #[test]
    fn declaration_type_mismatch_is_a_single_semantic_error() {
        let diagnostics = analyse_source("begin int x = true end");

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].class(), Class::Semantic);
        assert!(diagnostics[0].message().contains("expected int, found bool"));
    }

    #[test]
    fn undeclared_variable_is_reported() {
        let diagnostics = analyse_source("begin x = 1 end");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message().contains("Undeclared variable `x`"));
    }

    #[test]
    fn return_paths_must_cover_both_branches() {
        let good = "begin int f() is if true then return 0 else return 1 fi end skip end";
        assert!(analyse_source(good).is_empty());

        let bad = "begin int f() is if true then return 0 else skip fi end skip end";
        let diagnostics = analyse_source(bad);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].class(), Class::Syntax);
        assert!(diagnostics[0]
            .message()
            .contains("Expecting function 'f' to return"));
    }

    #[test]
    fn null_initializes_any_pair() {
        assert!(analyse_source("begin pair(int, bool) p = null end").is_empty());
    }

    #[test]
    fn call_arguments_match_parameter_types() {
        let source = "begin int f(int a) is return a end int y = call f(true) end";
        let diagnostics = analyse_source(source);

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message().contains("expected int, found bool"));
    }

    #[test]
    fn return_outside_of_functions_is_rejected() {
        let diagnostics = analyse_source("begin return 0 end");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message().contains("Cannot return"));
    }

    #[test]
    fn invalid_suppresses_cascading_diagnostics() {
        // Un solo error: `y` no existe; los usos de `x` no agregan más
        let diagnostics = analyse_source("begin int x = y ; exit x + 1 end");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message().contains("Undeclared variable `y`"));
    }
}
