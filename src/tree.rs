//! Adaptador del árbol de parseo.
//!
//! Recorre el árbol genérico producido por [`crate::peg`] y
//! construye el AST de [`crate::ast`]. El recorrido es puramente
//! sintáctico: nunca consulta tipos ni scopes, solo la forma de
//! cada nodo. Una forma que no corresponde a ninguna producción
//! reconocida produce [`BuildError::UnexpectedRule`].
//!
//! Decisiones de representación:
//! - Los tipos de arreglo se envuelven de afuera hacia adentro:
//!   `int[][]` resulta en `Array(Array(Int))`.
//! - `string` se reduce a `Array(Char)`.
//! - `pair` como tipo de componente produce un par de componentes
//!   ausentes (comodines).
//! - El signo de un literal negativo se resuelve aquí, de manera
//!   que `-2147483648` es representable.

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Function, Lhs, PairField, Parameter, Program, Rhs, Stat, UnaryOp},
    lex::Identifier,
    peg::{Node, Rule},
    source::Located,
    types::Type,
};

/// Error de construcción del AST.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// El nodo no corresponde a ninguna producción esperada aquí.
    #[error("Unexpected rule `{0}` in parse tree")]
    UnexpectedRule(&'static str),

    /// Un literal entero no cabe en 32 bits con signo.
    #[error("Integer literal `{0}` out of range")]
    IntRange(String),
}

type Build<T> = Result<T, Located<BuildError>>;

/// Construye el AST de un programa a partir de la raíz del árbol
/// de parseo.
pub fn build(root: &Node) -> Build<Program> {
    if root.rule != Rule::Program || root.children.is_empty() {
        return Err(unexpected(root));
    }

    let (main, functions) = root.children.split_last().unwrap();

    let functions = functions.iter().map(function).collect::<Build<_>>()?;
    let main = body(main)?;

    Ok(Program { functions, main })
}

fn function(node: &Node) -> Build<Function> {
    if node.rule != Rule::Func || node.children.len() < 3 {
        return Err(unexpected(node));
    }

    let returns = typ(&node.children[0])?;
    let name = ident(&node.children[1])?;

    let parameters = &node.children[2..node.children.len() - 1];
    let parameters = parameters
        .iter()
        .map(|node| {
            if node.rule != Rule::Param || node.children.len() != 2 {
                return Err(unexpected(node));
            }

            Ok(Parameter {
                of: typ(&node.children[0])?,
                name: ident(&node.children[1])?,
            })
        })
        .collect::<Build<_>>()?;

    let body = body(node.children.last().unwrap())?;

    Ok(Function {
        returns,
        name,
        parameters,
        body,
    })
}

fn body(node: &Node) -> Build<Vec<Stat>> {
    if node.rule != Rule::Body {
        return Err(unexpected(node));
    }

    node.children.iter().map(statement).collect()
}

fn statement(node: &Node) -> Build<Stat> {
    let children = &node.children;
    match (node.rule, children.as_slice()) {
        (Rule::Skip, []) => Ok(Stat::Skip),

        (Rule::Declare, [of, name, value]) => Ok(Stat::Declare {
            of: typ(of)?,
            name: ident(name)?,
            value: rhs(value)?,
        }),

        (Rule::Assign, [target, value]) => Ok(Stat::Assign {
            target: lhs(target)?,
            value: rhs(value)?,
        }),

        (Rule::Read, [target]) => Ok(Stat::Read(lhs(target)?)),
        (Rule::Free, [operand]) => Ok(Stat::Free(expr(operand)?)),
        (Rule::Return, [operand]) => Ok(Stat::Return(expr(operand)?)),
        (Rule::Exit, [operand]) => Ok(Stat::Exit(expr(operand)?)),
        (Rule::Print, [operand]) => Ok(Stat::Print(expr(operand)?)),
        (Rule::Println, [operand]) => Ok(Stat::Println(expr(operand)?)),

        (Rule::If, [condition, on_true, on_false]) => Ok(Stat::If {
            condition: expr(condition)?,
            on_true: body(on_true)?,
            on_false: body(on_false)?,
        }),

        (Rule::While, [condition, block]) => Ok(Stat::While {
            condition: expr(condition)?,
            body: body(block)?,
        }),

        (Rule::Block, [block]) => Ok(Stat::Block(body(block)?)),

        _ => Err(unexpected(node)),
    }
}

fn typ(node: &Node) -> Build<Type> {
    let children = &node.children;
    match (node.rule, children.as_slice()) {
        (Rule::TypeInt, []) => Ok(Type::Int),
        (Rule::TypeBool, []) => Ok(Type::Bool),
        (Rule::TypeChar, []) => Ok(Type::Char),
        (Rule::TypeString, []) => Ok(Type::string()),

        (Rule::TypeArray, [base]) => Ok(Type::array_of(typ(base)?)),

        // `pair` a secas: componentes comodín
        (Rule::TypePair, []) => Ok(Type::wild_pair()),

        (Rule::TypePair, [first, second]) => Ok(Type::Pair(
            Some(Box::new(typ(first)?)),
            Some(Box::new(typ(second)?)),
        )),

        _ => Err(unexpected(node)),
    }
}

fn lhs(node: &Node) -> Build<Lhs> {
    match (node.rule, node.children.as_slice()) {
        (Rule::Ident, []) => Ok(Lhs::Var(ident(node)?)),

        (Rule::ArrayElem, [array, indices @ ..]) => Ok(Lhs::ArrayElem {
            array: ident(array)?,
            indices: indices.iter().map(expr).collect::<Build<_>>()?,
        }),

        (Rule::PairElem, [operand]) => {
            Ok(Lhs::PairElem(pair_field(node)?, Box::new(expr(operand)?)))
        }

        _ => Err(unexpected(node)),
    }
}

fn rhs(node: &Node) -> Build<Located<Rhs>> {
    let location = node.location;
    let rhs = match (node.rule, node.children.as_slice()) {
        (Rule::ArrayLiter, elements) => Rhs::ArrayLiter(
            elements
                .iter()
                .map(expr)
                .collect::<Build<_>>()?,
        ),

        (Rule::NewPair, [first, second]) => Rhs::NewPair(expr(first)?, expr(second)?),

        (Rule::PairElem, [operand]) => {
            Rhs::PairElem(pair_field(node)?, Box::new(expr(operand)?))
        }

        (Rule::Call, [function, args @ ..]) => Rhs::Call {
            function: ident(function)?,
            args: args.iter().map(expr).collect::<Build<_>>()?,
        },

        _ => Rhs::Expr(expr(node)?),
    };

    Ok(Located::at(rhs, location))
}

fn expr(node: &Node) -> Build<Located<Expr>> {
    let location = node.location;
    let expr = match (node.rule, node.children.as_slice()) {
        (Rule::IntLiter, []) => Expr::Int(int_literal(node, false)?),
        (Rule::BoolLiter, []) => Expr::Bool(lexeme(node)? == "true"),
        (Rule::PairLiter, []) => Expr::Null,
        (Rule::StrLiter, []) => Expr::Str(lexeme(node)?.to_owned()),

        (Rule::CharLiter, []) => {
            let mut chars = lexeme(node)?.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Expr::Char(c),
                _ => return Err(unexpected(node)),
            }
        }

        (Rule::Ident, []) => Expr::Ident(Identifier::new(lexeme(node)?)),

        (Rule::ArrayElem, [array, indices @ ..]) => Expr::ArrayElem {
            array: ident(array)?,
            indices: indices.iter().map(expr).collect::<Build<_>>()?,
        },

        // El signo de un literal se resuelve aquí, con el literal
        // todavía en 64 bits
        (Rule::Unary, [operand])
            if lexeme(node)? == "-" && operand.rule == Rule::IntLiter =>
        {
            Expr::Int(int_literal(operand, true)?)
        }

        (Rule::Unary, [operand]) => {
            let operator = match lexeme(node)? {
                "!" => UnaryOp::Not,
                "-" => UnaryOp::Negate,
                "len" => UnaryOp::Len,
                "ord" => UnaryOp::Ord,
                "chr" => UnaryOp::Chr,
                _ => return Err(unexpected(node)),
            };

            Expr::Unary(operator, Box::new(expr(operand)?))
        }

        (Rule::Binary, [left, right]) => {
            let operator = match lexeme(node)? {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "%" => BinOp::Mod,
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                ">" => BinOp::Greater,
                ">=" => BinOp::GreaterEqual,
                "<" => BinOp::Less,
                "<=" => BinOp::LessEqual,
                "==" => BinOp::Equal,
                "!=" => BinOp::NotEqual,
                "&&" => BinOp::And,
                "||" => BinOp::Or,
                _ => return Err(unexpected(node)),
            };

            Expr::Binary(Box::new(expr(left)?), operator, Box::new(expr(right)?))
        }

        (Rule::Paren, [inner]) => Expr::Paren(Box::new(expr(inner)?)),

        _ => return Err(unexpected(node)),
    };

    Ok(Located::at(expr, location))
}

fn int_literal(node: &Node, negate: bool) -> Build<i32> {
    let digits = lexeme(node)?;
    let magnitude = digits
        .parse::<i64>()
        .map_err(|_| Located::at(BuildError::IntRange(digits.to_owned()), node.location))?;

    let value = if negate { -magnitude } else { magnitude };
    i32::try_from(value)
        .map_err(|_| Located::at(BuildError::IntRange(digits.to_owned()), node.location))
}

fn pair_field(node: &Node) -> Build<PairField> {
    match lexeme(node)? {
        "fst" => Ok(PairField::Fst),
        "snd" => Ok(PairField::Snd),
        _ => Err(unexpected(node)),
    }
}

fn ident(node: &Node) -> Build<Located<Identifier>> {
    if node.rule != Rule::Ident {
        return Err(unexpected(node));
    }

    Ok(Located::at(Identifier::new(lexeme(node)?), node.location))
}

fn lexeme(node: &Node) -> Build<&str> {
    node.lexeme.as_deref().ok_or_else(|| unexpected(node))
}

fn unexpected(node: &Node) -> Located<BuildError> {
    Located::at(BuildError::UnexpectedRule(node.rule.name()), node.location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, peg};

    fn program(source: &str) -> Program {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        let tree = peg::parse(&tokens).expect("parser failure");
        build(&tree).expect("adapter failure")
    }

    #[test]
    fn string_desugars_to_char_array() {
        let program = program("begin string s = \"x\" end");

        match &program.main[0] {
            Stat::Declare { of, .. } => assert_eq!(*of, Type::string()),
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn sequences_flatten_into_bodies() {
        let program = program("begin skip ; skip ; skip end");
        assert_eq!(program.main.len(), 3);
    }

    #[test]
    fn negative_literal_edge_is_representable() {
        let program = program("begin int x = -2147483648 end");

        match &program.main[0] {
            Stat::Declare { value, .. } => match value.as_ref() {
                Rhs::Expr(expr) => match expr.as_ref() {
                    Expr::Int(i32::MIN) => (),
                    other => panic!("expected i32::MIN, got {:?}", other),
                },
                other => panic!("expected expression, got {:?}", other),
            },
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_literal_is_rejected() {
        let tokens = Lexer::new("begin int x = 2147483648 end")
            .try_exhaustive()
            .expect("lexer failure");
        let tree = peg::parse(&tokens).expect("parser failure");

        assert!(matches!(
            build(&tree).map_err(Located::into_inner),
            Err(BuildError::IntRange(_)),
        ));
    }

    #[test]
    fn functions_precede_main() {
        let program = program("begin bool id(bool b) is return b end skip end");

        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].parameters.len(), 1);
        assert_eq!(program.functions[0].returns, Type::Bool);
    }
}
