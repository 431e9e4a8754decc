//! Análisis sintáctico.
//!
//! El parser es de descenso recursivo con backtracking y produce un
//! árbol de parseo genérico ([`Node`]) en vez de un AST: cada nodo
//! lleva la regla gramatical que lo originó, un lexema opcional y
//! sus hijos en orden de declaración. El adaptador en [`crate::tree`]
//! consume este árbol de forma read-only para construir el AST.

use std::{fmt, iter::Peekable};
use thiserror::Error;

use crate::{
    lex::{Keyword, Token},
    source::{Located, Location},
};

/// Regla gramatical que produjo un nodo del árbol de parseo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Program,
    Func,
    Param,
    Body,
    Skip,
    Declare,
    Assign,
    Read,
    Free,
    Return,
    Exit,
    Print,
    Println,
    If,
    While,
    Block,
    TypeInt,
    TypeBool,
    TypeChar,
    TypeString,
    TypeArray,
    TypePair,
    IntLiter,
    BoolLiter,
    CharLiter,
    StrLiter,
    PairLiter,
    Ident,
    ArrayElem,
    Unary,
    Binary,
    Paren,
    ArrayLiter,
    NewPair,
    PairElem,
    Call,
}

impl Rule {
    /// Nombre de la regla, como aparece en diagnósticos y volcados.
    pub fn name(self) -> &'static str {
        use Rule::*;

        match self {
            Program => "program",
            Func => "func",
            Param => "param",
            Body => "body",
            Skip => "skip",
            Declare => "declare",
            Assign => "assign",
            Read => "read",
            Free => "free",
            Return => "return",
            Exit => "exit",
            Print => "print",
            Println => "println",
            If => "if",
            While => "while",
            Block => "block",
            TypeInt => "type-int",
            TypeBool => "type-bool",
            TypeChar => "type-char",
            TypeString => "type-string",
            TypeArray => "type-array",
            TypePair => "type-pair",
            IntLiter => "int-liter",
            BoolLiter => "bool-liter",
            CharLiter => "char-liter",
            StrLiter => "str-liter",
            PairLiter => "pair-liter",
            Ident => "ident",
            ArrayElem => "array-elem",
            Unary => "unary-op",
            Binary => "binary-op",
            Paren => "paren",
            ArrayLiter => "array-liter",
            NewPair => "newpair",
            PairElem => "pair-elem",
            Call => "call",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Un nodo del árbol de parseo.
///
/// Los nodos hoja (identificadores, literales, operadores) llevan su
/// lexema; los interiores solo llevan hijos.
#[derive(Debug, Clone)]
pub struct Node {
    pub rule: Rule,
    pub lexeme: Option<String>,
    pub children: Vec<Node>,
    pub location: Location,
}

impl Node {
    fn new(rule: Rule, location: Location) -> Self {
        Node {
            rule,
            lexeme: None,
            children: Vec::new(),
            location,
        }
    }

    fn leaf<S: Into<String>>(rule: Rule, lexeme: S, location: Location) -> Self {
        Node {
            rule,
            lexeme: Some(lexeme.into()),
            children: Vec::new(),
            location,
        }
    }

    fn with(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    fn dump(&self, fmt: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(fmt, "{:depth$}{}", "", self.rule, depth = depth * 2)?;
        if let Some(lexeme) = &self.lexeme {
            write!(fmt, " `{}`", lexeme)?;
        }

        writeln!(fmt, " @{}", self.location)?;
        for child in &self.children {
            child.dump(fmt, depth + 1)?;
        }

        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(fmt, 0)
    }
}

/// Error de parseo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected token {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected token {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier")]
    ExpectedId,

    #[error("Expected a statement")]
    ExpectedStatement,

    #[error("Expected a type")]
    ExpectedType,

    #[error("Expected an expression")]
    ExpectedExpr,

    #[error("Expected an assignment right-hand side")]
    ExpectedRhs,

    #[error("Trailing input after program end")]
    TrailingInput,

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

/// Construye el árbol de parseo de un programa completo.
pub fn parse(tokens: &[Located<Token>]) -> Result<Node, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.iter().peekable(),
        last_known: Location::default(),
    };

    parser.program().map_err(Failure::coerce)
}

#[derive(Clone)]
struct Parser<'a> {
    tokens: Peekable<std::slice::Iter<'a, Located<Token>>>,
    last_known: Location,
}

/// Un fallo débil permite backtracking; uno estricto aborta el parseo.
enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<Node> {
        let start = self.peek_location();
        self.keyword(Keyword::Begin)?;

        let mut program = Node::new(Rule::Program, start);
        loop {
            match self.attempt(Parser::function) {
                Ok(function) => program.children.push(function),
                Err(Failure::Weak(_)) => break,
                Err(error) => return Err(error),
            }
        }

        let body = self.body()?;
        self.keyword(Keyword::End)?;

        if self.tokens.peek().is_some() {
            return self.fail(ParserError::TrailingInput);
        }

        Ok(program.with(body))
    }

    fn function(&mut self) -> Parse<Node> {
        let returns = self.typ().map_err(Failure::weak)?;
        let name = self.id().map_err(Failure::weak)?;

        // Una declaración de variable comparte este prefijo; solo el
        // `(` confirma que se trata de una función
        self.expect(Token::OpenParen).map_err(Failure::weak)?;

        let mut function = Node::new(Rule::Func, returns.location);
        function.children.push(returns);
        function.children.push(name);

        if self.attempt(|s| s.expect(Token::CloseParen)).is_err() {
            loop {
                function.children.push(self.parameter()?);
                match self.attempt(|s| s.expect(Token::Comma)) {
                    Ok(()) => continue,
                    Err(Failure::Weak(_)) => break,
                    Err(error) => return Err(error),
                }
            }

            self.expect(Token::CloseParen)?;
        }

        self.keyword(Keyword::Is)?;
        let body = self.body()?;
        self.keyword(Keyword::End)?;

        Ok(function.with(body))
    }

    fn parameter(&mut self) -> Parse<Node> {
        let typ = self.typ()?;
        let name = self.id()?;

        let location = typ.location;
        Ok(Node::new(Rule::Param, location).with(typ).with(name))
    }

    /// Secuencia de sentencias unidas por `;`.
    fn body(&mut self) -> Parse<Node> {
        let start = self.peek_location();
        let mut body = Node::new(Rule::Body, start);

        body.children.push(self.statement()?);
        loop {
            match self.attempt(|s| s.expect(Token::Semicolon)) {
                Ok(()) => body.children.push(self.statement()?),
                Err(Failure::Weak(_)) => break Ok(body),
                Err(error) => break Err(error),
            }
        }
    }

    fn statement(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        let keyword = self.lookahead(|s| s.next().map(Located::into_inner));

        match keyword {
            Ok(Token::Keyword(Keyword::Skip)) => {
                self.next()?;
                Ok(Node::new(Rule::Skip, location))
            }

            Ok(Token::Keyword(Keyword::Read)) => {
                self.next()?;
                let target = self.lhs()?;
                Ok(Node::new(Rule::Read, location).with(target))
            }

            Ok(Token::Keyword(Keyword::Free)) => self.unary_statement(Rule::Free, location),
            Ok(Token::Keyword(Keyword::Return)) => self.unary_statement(Rule::Return, location),
            Ok(Token::Keyword(Keyword::Exit)) => self.unary_statement(Rule::Exit, location),
            Ok(Token::Keyword(Keyword::Print)) => self.unary_statement(Rule::Print, location),
            Ok(Token::Keyword(Keyword::Println)) => self.unary_statement(Rule::Println, location),

            Ok(Token::Keyword(Keyword::If)) => {
                self.next()?;
                let condition = self.expr().map_err(Failure::strict)?;
                self.keyword(Keyword::Then)?;
                let on_true = self.body()?;
                self.keyword(Keyword::Else)?;
                let on_false = self.body()?;
                self.keyword(Keyword::Fi)?;

                Ok(Node::new(Rule::If, location)
                    .with(condition)
                    .with(on_true)
                    .with(on_false))
            }

            Ok(Token::Keyword(Keyword::While)) => {
                self.next()?;
                let condition = self.expr().map_err(Failure::strict)?;
                self.keyword(Keyword::Do)?;
                let body = self.body()?;
                self.keyword(Keyword::Done)?;

                Ok(Node::new(Rule::While, location).with(condition).with(body))
            }

            Ok(Token::Keyword(Keyword::Begin)) => {
                self.next()?;
                let body = self.body()?;
                self.keyword(Keyword::End)?;

                Ok(Node::new(Rule::Block, location).with(body))
            }

            // Tipos comienzan declaraciones
            Ok(Token::Keyword(
                Keyword::Int | Keyword::Bool | Keyword::Char | Keyword::String | Keyword::Pair,
            )) => {
                let typ = self.typ()?;
                let name = self.id()?;
                self.expect(Token::Assign)?;
                let value = self.rhs().map_err(Failure::strict)?;

                Ok(Node::new(Rule::Declare, location)
                    .with(typ)
                    .with(name)
                    .with(value))
            }

            // Asignación a variable, elemento de arreglo o de par
            Ok(Token::Id(_) | Token::Keyword(Keyword::Fst | Keyword::Snd)) => {
                let target = self.lhs()?;
                self.expect(Token::Assign)?;
                let value = self.rhs().map_err(Failure::strict)?;

                Ok(Node::new(Rule::Assign, location).with(target).with(value))
            }

            _ => {
                self.next()?;
                self.fail(ParserError::ExpectedStatement)
                    .map_err(Failure::weak)
            }
        }
    }

    fn unary_statement(&mut self, rule: Rule, location: Location) -> Parse<Node> {
        self.next()?;
        let operand = self.expr().map_err(Failure::strict)?;
        Ok(Node::new(rule, location).with(operand))
    }

    fn lhs(&mut self) -> Parse<Node> {
        match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::Keyword(keyword @ (Keyword::Fst | Keyword::Snd))) => {
                let location = self.peek_location();
                self.next()?;
                let operand = self.expr().map_err(Failure::strict)?;

                Ok(Node::leaf(Rule::PairElem, keyword.to_string(), location).with(operand))
            }

            _ => self.id_or_array_elem(),
        }
    }

    fn rhs(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::OpenSquare) => {
                self.next()?;
                let mut liter = Node::new(Rule::ArrayLiter, location);

                if self.attempt(|s| s.expect(Token::CloseSquare)).is_err() {
                    loop {
                        liter.children.push(self.expr().map_err(Failure::strict)?);
                        match self.attempt(|s| s.expect(Token::Comma)) {
                            Ok(()) => continue,
                            Err(Failure::Weak(_)) => break,
                            Err(error) => return Err(error),
                        }
                    }

                    self.expect(Token::CloseSquare)?;
                }

                Ok(liter)
            }

            Ok(Token::Keyword(Keyword::Newpair)) => {
                self.next()?;
                self.expect(Token::OpenParen)?;
                let first = self.expr().map_err(Failure::strict)?;
                self.expect(Token::Comma)?;
                let second = self.expr().map_err(Failure::strict)?;
                self.expect(Token::CloseParen)?;

                Ok(Node::new(Rule::NewPair, location).with(first).with(second))
            }

            Ok(Token::Keyword(keyword @ (Keyword::Fst | Keyword::Snd))) => {
                self.next()?;
                let operand = self.expr().map_err(Failure::strict)?;

                Ok(Node::leaf(Rule::PairElem, keyword.to_string(), location).with(operand))
            }

            Ok(Token::Keyword(Keyword::Call)) => {
                self.next()?;
                let name = self.id()?;
                self.expect(Token::OpenParen)?;

                let mut call = Node::new(Rule::Call, location).with(name);
                if self.attempt(|s| s.expect(Token::CloseParen)).is_err() {
                    loop {
                        call.children.push(self.expr().map_err(Failure::strict)?);
                        match self.attempt(|s| s.expect(Token::Comma)) {
                            Ok(()) => continue,
                            Err(Failure::Weak(_)) => break,
                            Err(error) => return Err(error),
                        }
                    }

                    self.expect(Token::CloseParen)?;
                }

                Ok(call)
            }

            Ok(_) => self.expr(),
            Err(_) => self.fail(ParserError::ExpectedRhs),
        }
    }

    fn typ(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        let base = match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::Keyword(Keyword::Int)) => self.consume(Rule::TypeInt, location)?,
            Ok(Token::Keyword(Keyword::Bool)) => self.consume(Rule::TypeBool, location)?,
            Ok(Token::Keyword(Keyword::Char)) => self.consume(Rule::TypeChar, location)?,
            Ok(Token::Keyword(Keyword::String)) => self.consume(Rule::TypeString, location)?,

            Ok(Token::Keyword(Keyword::Pair)) => {
                self.next()?;
                self.expect(Token::OpenParen)?;
                let first = self.pair_elem_type()?;
                self.expect(Token::Comma)?;
                let second = self.pair_elem_type()?;
                self.expect(Token::CloseParen)?;

                Node::new(Rule::TypePair, location).with(first).with(second)
            }

            _ => return self.fail(ParserError::ExpectedType).map_err(Failure::weak),
        };

        self.array_suffixes(base)
    }

    /// Tipo de componente de par: un tipo completo, o `pair` a secas
    /// que denota un par de componentes desconocidos.
    fn pair_elem_type(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        match self.lookahead(|s| s.pair_wildcard()) {
            Ok(()) => {
                self.pair_wildcard()?;
                self.array_suffixes(Node::new(Rule::TypePair, location))
            }

            Err(_) => self.typ(),
        }
    }

    /// Reconoce `pair` que no va seguido de `(`.
    fn pair_wildcard(&mut self) -> Parse<()> {
        self.keyword(Keyword::Pair)?;
        match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::OpenParen) => self.fail(ParserError::ExpectedType).map_err(Failure::weak),
            _ => Ok(()),
        }
    }

    /// Envuelve un tipo base en tantos `[]` como sigan.
    fn array_suffixes(&mut self, mut base: Node) -> Parse<Node> {
        loop {
            let suffix = self.attempt(|s| {
                s.expect(Token::OpenSquare)?;
                s.expect(Token::CloseSquare)
            });

            match suffix {
                Ok(()) => {
                    let location = base.location;
                    base = Node::new(Rule::TypeArray, location).with(base);
                }

                Err(Failure::Weak(_)) => break Ok(base),
                Err(error) => break Err(error),
            }
        }
    }

    // Expresiones, por niveles de precedencia. Todos los operadores
    // binarios asocian a la izquierda.

    fn expr(&mut self) -> Parse<Node> {
        self.binary_level(0)
    }

    fn binary_level(&mut self, level: usize) -> Parse<Node> {
        const LEVELS: &[&[(Token, &str)]] = &[
            &[(Token::Or, "||")],
            &[(Token::And, "&&")],
            &[(Token::Equal, "=="), (Token::NotEqual, "!=")],
            &[
                (Token::Greater, ">"),
                (Token::GreaterEqual, ">="),
                (Token::Less, "<"),
                (Token::LessEqual, "<="),
            ],
            &[(Token::Plus, "+"), (Token::Minus, "-")],
            &[
                (Token::Times, "*"),
                (Token::Divide, "/"),
                (Token::Modulo, "%"),
            ],
        ];

        let operators = match LEVELS.get(level) {
            Some(operators) => operators,
            None => return self.unary(),
        };

        let mut lhs = self.binary_level(level + 1)?;
        loop {
            let found = operators.iter().find_map(|(token, name)| {
                self.attempt(|s| s.expect(token.clone())).ok().map(|_| name)
            });

            match found {
                Some(name) => {
                    let rhs = self.binary_level(level + 1).map_err(Failure::strict)?;
                    let location = lhs.location;

                    lhs = Node::leaf(Rule::Binary, *name, location).with(lhs).with(rhs);
                }

                None => break Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        let operator = match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::Bang) => Some("!"),
            Ok(Token::Minus) => Some("-"),
            Ok(Token::Keyword(Keyword::Len)) => Some("len"),
            Ok(Token::Keyword(Keyword::Ord)) => Some("ord"),
            Ok(Token::Keyword(Keyword::Chr)) => Some("chr"),
            _ => None,
        };

        match operator {
            Some(operator) => {
                self.next()?;
                let operand = self.unary().map_err(Failure::strict)?;

                Ok(Node::leaf(Rule::Unary, operator, location).with(operand))
            }

            None => self.atom(),
        }
    }

    fn atom(&mut self) -> Parse<Node> {
        let location = self.peek_location();
        match self.lookahead(|s| s.next().map(Located::into_inner)) {
            Ok(Token::IntLiteral(integer)) => {
                self.next()?;
                Ok(Node::leaf(Rule::IntLiter, integer.to_string(), location))
            }

            Ok(Token::Keyword(Keyword::True)) => self.consume_leaf(Rule::BoolLiter, "true"),
            Ok(Token::Keyword(Keyword::False)) => self.consume_leaf(Rule::BoolLiter, "false"),
            Ok(Token::Keyword(Keyword::Null)) => self.consume_leaf(Rule::PairLiter, "null"),

            Ok(Token::CharLiteral(c)) => {
                self.next()?;
                Ok(Node::leaf(Rule::CharLiter, c.to_string(), location))
            }

            Ok(Token::StrLiteral(string)) => {
                self.next()?;
                Ok(Node::leaf(Rule::StrLiter, string, location))
            }

            Ok(Token::OpenParen) => {
                self.next()?;
                let inner = self.expr().map_err(Failure::strict)?;
                self.expect(Token::CloseParen)?;

                Ok(Node::new(Rule::Paren, location).with(inner))
            }

            Ok(Token::Id(_)) => self.id_or_array_elem(),

            _ => self.fail(ParserError::ExpectedExpr).map_err(Failure::weak),
        }
    }

    /// Identificador, opcionalmente seguido de índices `[e]`.
    fn id_or_array_elem(&mut self) -> Parse<Node> {
        let name = self.id()?;
        let location = name.location;

        let mut indices = Vec::new();
        loop {
            let index = self.attempt(|s| {
                s.expect(Token::OpenSquare)?;
                let index = s.expr().map_err(Failure::strict)?;
                s.expect(Token::CloseSquare)?;
                Ok(index)
            });

            match index {
                Ok(index) => indices.push(index),
                Err(Failure::Weak(_)) => break,
                Err(error) => return Err(error),
            }
        }

        if indices.is_empty() {
            Ok(name)
        } else {
            let mut elem = Node::new(Rule::ArrayElem, location).with(name);
            elem.children.extend(indices);
            Ok(elem)
        }
    }

    fn consume(&mut self, rule: Rule, location: Location) -> Parse<Node> {
        self.next()?;
        Ok(Node::new(rule, location))
    }

    fn consume_leaf(&mut self, rule: Rule, lexeme: &str) -> Parse<Node> {
        let location = self.peek_location();
        self.next()?;
        Ok(Node::leaf(rule, lexeme, location))
    }

    fn peek_location(&mut self) -> Location {
        self.tokens
            .peek()
            .map(|token| token.location())
            .unwrap_or(self.last_known)
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn lookahead<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        rule(&mut self.clone())
    }

    fn id(&mut self) -> Parse<Node> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Node::leaf(Rule::Ident, id.as_ref(), location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self
                .fail(ParserError::UnexpectedToken(token, found))
                .map_err(Failure::weak),
            Err(_) => self
                .fail(ParserError::MissingToken(token))
                .map_err(Failure::weak),
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;

    fn tree(source: &str) -> Node {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        parse(&tokens).expect("parser failure")
    }

    #[test]
    fn trivial_program_is_a_body_of_skip() {
        let program = tree("begin skip end");

        assert_eq!(program.rule, Rule::Program);
        assert_eq!(program.children.len(), 1);
        assert_eq!(program.children[0].rule, Rule::Body);
        assert_eq!(program.children[0].children[0].rule, Rule::Skip);
    }

    #[test]
    fn declarations_are_not_functions() {
        let program = tree("begin int f(int x) is return x end int y = 0 end");

        assert_eq!(program.children.len(), 2);
        assert_eq!(program.children[0].rule, Rule::Func);
        assert_eq!(program.children[1].children[0].rule, Rule::Declare);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = tree("begin int x = 1 + 2 * 3 end");

        let declare = &program.children[0].children[0];
        let sum = &declare.children[2];
        assert_eq!(sum.lexeme.as_deref(), Some("+"));
        assert_eq!(sum.children[1].lexeme.as_deref(), Some("*"));
    }

    #[test]
    fn nested_array_types_wrap_outermost() {
        let program = tree("begin int[][] m = [] end");

        let typ = &program.children[0].children[0].children[0];
        assert_eq!(typ.rule, Rule::TypeArray);
        assert_eq!(typ.children[0].rule, Rule::TypeArray);
        assert_eq!(typ.children[0].children[0].rule, Rule::TypeInt);
    }

    #[test]
    fn bare_pair_inside_pair_type_has_no_children() {
        let program = tree("begin pair(pair, int) p = null end");

        let typ = &program.children[0].children[0].children[0];
        assert_eq!(typ.rule, Rule::TypePair);
        assert_eq!(typ.children[0].rule, Rule::TypePair);
        assert!(typ.children[0].children.is_empty());
        assert_eq!(typ.children[1].rule, Rule::TypeInt);
    }

    #[test]
    fn missing_fi_is_rejected() {
        let tokens = Lexer::new("begin if true then skip else skip end")
            .try_exhaustive()
            .expect("lexer failure");

        assert!(parse(&tokens).is_err());
    }
}
