//! Escenarios de compilación de punta a punta.
//!
//! Cada caso recorre la pipeline completa igual que el driver:
//! léxico, sintáctico, adaptación, análisis semántico, optimización
//! y generación, verificando tanto los programas aceptados como los
//! códigos de salida y el formato de los rechazados.

use wacc::{
    codegen::{Generator, RuntimeSet},
    error::{Diagnostics, EXIT_SEMANTIC, EXIT_SYNTAX},
    ir::{Address, Cond, Instruction, Operand, Reg},
    lex::Lexer,
    optimise, peg, semantic, tree,
};

enum Outcome {
    Code(Vec<Instruction>, RuntimeSet),
    Rejected(Diagnostics),
}

fn compile(file: &str, source: &str) -> Outcome {
    let mut diagnostics = Diagnostics::new(file);

    let tokens = match Lexer::new(source).try_exhaustive() {
        Ok(tokens) => tokens,
        Err(errors) => {
            diagnostics.extend(errors.into_iter().map(Into::into));
            return Outcome::Rejected(diagnostics);
        }
    };

    let root = match peg::parse(&tokens) {
        Ok(root) => root,
        Err(error) => {
            diagnostics.push(error.into());
            return Outcome::Rejected(diagnostics);
        }
    };

    let mut program = match tree::build(&root) {
        Ok(program) => program,
        Err(error) => {
            diagnostics.push(error.into());
            return Outcome::Rejected(diagnostics);
        }
    };

    diagnostics.extend(semantic::analyse(&program));
    if !diagnostics.is_empty() {
        return Outcome::Rejected(diagnostics);
    }

    optimise::optimise(&mut program);

    let mut code = Vec::new();
    let runtime = Generator::new(&program).emit(&mut code);

    Outcome::Code(code, runtime)
}

fn accepted(source: &str) -> (Vec<Instruction>, RuntimeSet) {
    match compile("test.wacc", source) {
        Outcome::Code(code, runtime) => (code, runtime),
        Outcome::Rejected(diagnostics) => panic!("program rejected:\n{}", diagnostics),
    }
}

fn rejected(source: &str) -> Diagnostics {
    match compile("test.wacc", source) {
        Outcome::Rejected(diagnostics) => diagnostics,
        Outcome::Code(..) => panic!("program should have been rejected"),
    }
}

#[test]
fn hello_world_compiles_to_a_print_sequence() {
    let (code, runtime) = accepted("begin print \"hello\" end");

    assert!(code.contains(&Instruction::Data));
    assert!(code.contains(&Instruction::Label("msg_0".into())));
    assert!(code.contains(&Instruction::Word(5)));
    assert!(code.contains(&Instruction::Ascii("hello".into())));
    assert!(code.contains(&Instruction::Text));
    assert!(code.contains(&Instruction::Label("main".into())));

    assert!(code
        .iter()
        .any(|i| matches!(i, Instruction::Ldr(_, Address::Label(label)) if label == "msg_0")));
    assert!(code
        .iter()
        .any(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "p_print_string")));
    assert!(code.contains(&Instruction::Mov(Cond::Al, Reg(0), Operand::Imm(0))));

    assert!(runtime.contains(RuntimeSet::PRINT_STRING));
}

#[test]
fn arithmetic_evaluates_the_heavier_subtree_first() {
    let (code, _) = accepted("begin int x = 1 + 2 * 3 ; exit x end");

    let mul = code
        .iter()
        .position(|i| matches!(i, Instruction::Mul(..)))
        .expect("no MUL emitted");
    let add = code
        .iter()
        .position(|i| matches!(i, Instruction::Add(dst, ..) if *dst != Reg::SP))
        .expect("no ADD emitted");

    assert!(mul < add);
    assert!(code
        .iter()
        .any(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "exit")));
}

#[test]
fn type_mismatch_is_a_single_semantic_error() {
    let diagnostics = rejected("begin int x = true end");
    let rendered = diagnostics.to_string();

    assert_eq!(diagnostics.exit_code(), EXIT_SEMANTIC);
    assert_eq!(rendered.lines().count(), 1);
    assert!(rendered.contains(":semantic error: "));
    assert!(rendered.contains("expected int, found bool"));
    assert!(rendered.starts_with("test.wacc:"));
}

#[test]
fn undeclared_variable_is_a_semantic_error() {
    let diagnostics = rejected("begin x = 1 end");
    let rendered = diagnostics.to_string();

    assert_eq!(diagnostics.exit_code(), EXIT_SEMANTIC);
    assert!(rendered.contains("Undeclared variable `x`"));
}

#[test]
fn missing_return_path_is_a_syntax_error() {
    let diagnostics =
        rejected("begin int f(bool c) is if c then return 0 else skip fi end skip end");
    let rendered = diagnostics.to_string();

    assert_eq!(diagnostics.exit_code(), EXIT_SYNTAX);
    assert!(rendered.contains("Expecting function 'f' to return"));
}

#[test]
fn lexical_failures_are_syntax_errors() {
    let diagnostics = rejected("begin int x = ^ end");

    assert_eq!(diagnostics.exit_code(), EXIT_SYNTAX);
    assert!(diagnostics.to_string().contains("error: "));
}

#[test]
fn constant_conditional_folds_to_one_exit() {
    let (code, _) = accepted("begin if true then exit 0 else exit 1 fi end");

    let exits = code
        .iter()
        .filter(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "exit"))
        .count();

    assert_eq!(exits, 1);
    assert!(!code.iter().any(|i| matches!(i, Instruction::B(..))));
}

#[test]
fn functions_calls_and_loops_compile_together() {
    let source = "begin \
        int double(int n) is return n + n end \
        int i = 0 ; \
        int total = 0 ; \
        while i < 4 do \
            int d = call double(i) ; \
            total = total + d ; \
            i = i + 1 \
        done ; \
        println total \
        end";

    let (code, runtime) = accepted(source);

    assert!(code.contains(&Instruction::Label("f_double".into())));
    assert!(code
        .iter()
        .any(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "f_double")));
    assert!(runtime.contains(RuntimeSet::PRINT_INT));
    assert!(runtime.contains(RuntimeSet::PRINT_LN));
}
