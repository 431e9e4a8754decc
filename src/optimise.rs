//! Simplificaciones AST-a-AST.
//!
//! El optimizador reescribe cuerpos de sentencias en post-orden:
//! cada sentencia produce su reemplazo, que puede ser ella misma,
//! otra sentencia o nada (se elimina de la secuencia). Las
//! transformaciones son puramente estructurales:
//!
//! - eliminación de `skip`,
//! - elisión de bloques y lazos vacíos,
//! - plegado de condicionales con condición literal,
//! - intercambio de ramas cuando la rama verdadera queda vacía,
//! - truncado de colas inalcanzables después de `return`/`exit`.
//!
//! No se hace aritmética de constantes: las expresiones se conservan
//! tal cual. Cada función se optimiza en su propia tarea; no existe
//! estado compartido entre funciones.

use std::{mem, thread};

use crate::{
    ast::{Expr, Program, Stat, UnaryOp},
    source::Located,
};

/// Optimiza un programa completo, una tarea por función.
///
/// El resultado es determinista: cada tarea trabaja sobre un cuerpo
/// disjunto y el driver espera a todas antes de retornar.
pub fn optimise(program: &mut Program) {
    thread::scope(|tasks| {
        for function in &mut program.functions {
            tasks.spawn(move || {
                let body = mem::take(&mut function.body);
                function.body = block(body);
            });
        }

        let main = mem::take(&mut program.main);
        program.main = block(main);
    });
}

/// Optimiza una secuencia de sentencias.
///
/// La secuencia resultante se trunca después de la primera sentencia
/// terminal, ya que nada de lo que sigue es alcanzable.
fn block(body: Vec<Stat>) -> Vec<Stat> {
    let mut result = Vec::new();

    for statement in body {
        match rewrite(statement) {
            None => (),

            Some(terminal @ (Stat::Return(_) | Stat::Exit(_))) => {
                result.push(terminal);
                break;
            }

            Some(statement) => result.push(statement),
        }
    }

    result
}

/// Produce el reemplazo de una sentencia, o `None` para eliminarla.
fn rewrite(statement: Stat) -> Option<Stat> {
    match statement {
        Stat::Skip => None,

        Stat::Block(body) => {
            let body = block(body);
            if body.is_empty() {
                None
            } else {
                Some(Stat::Block(body))
            }
        }

        Stat::If {
            condition,
            on_true,
            on_false,
        } => {
            let on_true = block(on_true);
            let on_false = block(on_false);

            // Plegado de condición literal: la rama sobreviviente
            // conserva su propio scope
            if let Expr::Bool(value) = condition.as_ref() {
                let branch = if *value { on_true } else { on_false };

                return if branch.is_empty() {
                    None
                } else {
                    Some(Stat::Block(branch))
                };
            }

            if on_true.is_empty() && !on_false.is_empty() {
                let location = condition.location();
                let negated = Expr::Unary(UnaryOp::Not, Box::new(condition));

                return Some(Stat::If {
                    condition: Located::at(negated, location),
                    on_true: on_false,
                    on_false: Vec::new(),
                });
            }

            Some(Stat::If {
                condition,
                on_true,
                on_false,
            })
        }

        Stat::While { condition, body } => {
            let body = block(body);

            if body.is_empty() || matches!(condition.as_ref(), Expr::Bool(false)) {
                None
            } else {
                Some(Stat::While { condition, body })
            }
        }

        // Las demás sentencias (y sus expresiones) quedan intactas
        statement => Some(statement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, peg, tree};

    fn program(source: &str) -> Program {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        let root = peg::parse(&tokens).expect("parser failure");
        tree::build(&root).expect("adapter failure")
    }

    fn optimised(source: &str) -> Program {
        let mut program = program(source);
        optimise(&mut program);
        program
    }

    #[test]
    fn is_idempotent() {
        let source = "begin \
            int f() is if true then return 0 else return 1 fi end \
            int a = 1 ; \
            skip ; \
            if a == 1 then skip else print 1 fi ; \
            while false do print 2 done ; \
            begin skip end ; \
            exit 0 ; \
            print 3 \
        end";

        let mut once = optimised(source);
        let snapshot = format!("{:?}", once);

        optimise(&mut once);
        assert_eq!(format!("{:?}", once), snapshot);
    }

    #[test]
    fn nothing_follows_an_exit() {
        let program = optimised("begin exit 0 ; print 1 ; print 2 end");

        assert_eq!(program.main.len(), 1);
        assert!(matches!(program.main[0], Stat::Exit(_)));
    }

    #[test]
    fn constant_conditional_keeps_only_the_taken_branch() {
        let program = optimised("begin if true then exit 0 else exit 1 fi end");

        match &program.main[..] {
            [Stat::Block(body)] => match &body[..] {
                [Stat::Exit(operand)] => {
                    assert!(matches!(operand.as_ref(), Expr::Int(0)));
                }
                other => panic!("expected a single exit, got {:?}", other),
            },
            other => panic!("expected a single block, got {:?}", other),
        }
    }

    #[test]
    fn empty_true_branch_swaps_and_negates() {
        let program = optimised("begin int a = 1 ; if a == 1 then skip else print 1 fi end");

        match &program.main[1] {
            Stat::If {
                condition,
                on_true,
                on_false,
            } => {
                assert!(matches!(condition.as_ref(), Expr::Unary(UnaryOp::Not, _)));
                assert_eq!(on_true.len(), 1);
                assert!(on_false.is_empty());
            }
            other => panic!("expected a conditional, got {:?}", other),
        }
    }

    #[test]
    fn dead_loops_and_empty_blocks_disappear() {
        let program = optimised(
            "begin while false do print 1 done ; begin skip end ; int a = 1 ; while a == 1 do skip done end",
        );

        assert_eq!(program.main.len(), 1);
        assert!(matches!(program.main[0], Stat::Declare { .. }));
    }

    #[test]
    fn skips_are_removed_from_sequences() {
        let program = optimised("begin skip ; print 1 ; skip end");

        assert_eq!(program.main.len(), 1);
        assert!(matches!(program.main[0], Stat::Print(_)));
    }

    #[test]
    fn function_bodies_are_optimised_in_parallel() {
        let program = optimised(
            "begin \
             int f() is skip ; return 0 end \
             int g() is exit 1 ; print 2 end \
             skip \
             end",
        );

        assert_eq!(program.functions[0].body.len(), 1);
        assert_eq!(program.functions[1].body.len(), 1);
        assert!(program.main.is_empty());
    }
}
