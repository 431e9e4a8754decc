//! Impresión del AST en sintaxis de superficie.
//!
//! Reconstruye un programa fuente a partir del AST. La salida es
//! re-parseable: los operadores se parentizan según precedencia
//! solo donde la estructura del árbol lo exige, y los literales se
//! imprimen con sus secuencias de escape originales. Un cuerpo
//! vacío (posible después de optimizar) se imprime como `skip`.

use crate::{
    ast::{BinOp, Expr, Function, Lhs, PairField, Program, Rhs, Stat, UnaryOp},
    lex::escape,
    source::Located,
};

/// Imprime un programa completo.
pub fn pretty(program: &Program) -> String {
    let mut printer = Printer {
        out: String::new(),
        indent: 0,
    };

    printer.program(program);
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn program(&mut self, program: &Program) {
        self.push_line("begin");
        self.indent += 1;

        for function in &program.functions {
            self.function(function);
        }

        self.body(&program.main);

        self.indent -= 1;
        self.push_line("end");
    }

    fn function(&mut self, function: &Function) {
        self.margin();
        self.push(&format!("{} {}(", function.returns, function.name.as_ref()));

        for (i, parameter) in function.parameters.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }

            self.push(&format!("{} {}", parameter.of, parameter.name.as_ref()));
        }

        self.push(") is\n");

        self.indent += 1;
        self.body(&function.body);
        self.indent -= 1;

        self.push_line("end");
    }

    fn body(&mut self, body: &[Stat]) {
        if body.is_empty() {
            self.push_line("skip");
            return;
        }

        for (i, statement) in body.iter().enumerate() {
            self.statement(statement, i + 1 < body.len());
        }
    }

    fn statement(&mut self, statement: &Stat, separated: bool) {
        self.margin();

        match statement {
            Stat::Skip => self.push("skip"),

            Stat::Declare { of, name, value } => {
                self.push(&format!("{} {} = ", of, name.as_ref()));
                self.rhs(value.as_ref());
            }

            Stat::Assign { target, value } => {
                self.lhs(target);
                self.push(" = ");
                self.rhs(value.as_ref());
            }

            Stat::Read(target) => {
                self.push("read ");
                self.lhs(target);
            }

            Stat::Free(operand) => self.keyword_operand("free", operand),
            Stat::Return(operand) => self.keyword_operand("return", operand),
            Stat::Exit(operand) => self.keyword_operand("exit", operand),
            Stat::Print(operand) => self.keyword_operand("print", operand),
            Stat::Println(operand) => self.keyword_operand("println", operand),

            Stat::If {
                condition,
                on_true,
                on_false,
            } => {
                self.push("if ");
                self.expr(condition.as_ref(), 0);
                self.push(" then\n");

                self.indent += 1;
                self.body(on_true);
                self.indent -= 1;

                self.push_line("else");

                self.indent += 1;
                self.body(on_false);
                self.indent -= 1;

                self.margin();
                self.push("fi");
            }

            Stat::While { condition, body } => {
                self.push("while ");
                self.expr(condition.as_ref(), 0);
                self.push(" do\n");

                self.indent += 1;
                self.body(body);
                self.indent -= 1;

                self.margin();
                self.push("done");
            }

            Stat::Block(body) => {
                self.push("begin\n");

                self.indent += 1;
                self.body(body);
                self.indent -= 1;

                self.margin();
                self.push("end");
            }
        }

        if separated {
            self.push(" ;");
        }

        self.push("\n");
    }

    fn keyword_operand(&mut self, keyword: &str, operand: &Located<Expr>) {
        self.push(keyword);
        self.push(" ");
        self.expr(operand.as_ref(), 0);
    }

    fn lhs(&mut self, lhs: &Lhs) {
        match lhs {
            Lhs::Var(name) => self.push(name.as_ref().as_ref()),

            Lhs::ArrayElem { array, indices } => self.array_elem(array.as_ref(), indices),

            Lhs::PairElem(field, operand) => {
                self.pair_field(*field);
                self.expr(operand.as_ref().as_ref(), UNARY);
            }
        }
    }

    fn rhs(&mut self, rhs: &Rhs) {
        match rhs {
            Rhs::Expr(expr) => self.expr(expr.as_ref(), 0),

            Rhs::ArrayLiter(elements) => {
                self.push("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }

                    self.expr(element.as_ref(), 0);
                }
                self.push("]");
            }

            Rhs::NewPair(first, second) => {
                self.push("newpair(");
                self.expr(first.as_ref(), 0);
                self.push(", ");
                self.expr(second.as_ref(), 0);
                self.push(")");
            }

            Rhs::PairElem(field, operand) => {
                self.pair_field(*field);
                self.expr(operand.as_ref().as_ref(), UNARY);
            }

            Rhs::Call { function, args } => {
                self.push(&format!("call {}(", function.as_ref()));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }

                    self.expr(arg.as_ref(), 0);
                }
                self.push(")");
            }
        }
    }

    /// Imprime una expresión en un contexto de precedencia dado.
    ///
    /// Se agregan paréntesis solo cuando el nivel propio es menor al
    /// del contexto, con asociatividad izquierda para los binarios.
    fn expr(&mut self, expr: &Expr, context: u8) {
        match expr {
            Expr::Int(value) => self.push(&value.to_string()),
            Expr::Bool(true) => self.push("true"),
            Expr::Bool(false) => self.push("false"),
            Expr::Null => self.push("null"),
            Expr::Ident(name) => self.push(name.as_ref()),

            Expr::Char(c) => {
                self.push("'");
                self.push_escaped(*c);
                self.push("'");
            }

            Expr::Str(string) => {
                self.push("\"");
                for c in string.chars() {
                    self.push_escaped(c);
                }
                self.push("\"");
            }

            Expr::ArrayElem { array, indices } => self.array_elem(array.as_ref(), indices),

            Expr::Unary(operator, operand) => {
                self.push(match operator {
                    UnaryOp::Not => "!",
                    UnaryOp::Negate => "-",
                    UnaryOp::Len => "len ",
                    UnaryOp::Ord => "ord ",
                    UnaryOp::Chr => "chr ",
                });

                self.expr(operand.as_ref().as_ref(), UNARY);
            }

            Expr::Binary(left, operator, right) => {
                let level = precedence(*operator);
                if level < context {
                    self.push("(");
                }

                self.expr(left.as_ref().as_ref(), level);
                self.push(&format!(" {} ", symbol(*operator)));
                self.expr(right.as_ref().as_ref(), level + 1);

                if level < context {
                    self.push(")");
                }
            }

            Expr::Paren(inner) => {
                self.push("(");
                self.expr(inner.as_ref().as_ref(), 0);
                self.push(")");
            }
        }
    }

    fn array_elem(&mut self, array: &crate::lex::Identifier, indices: &[Located<Expr>]) {
        self.push(array.as_ref());
        for index in indices {
            self.push("[");
            self.expr(index.as_ref(), 0);
            self.push("]");
        }
    }

    fn pair_field(&mut self, field: PairField) {
        self.push(match field {
            PairField::Fst => "fst ",
            PairField::Snd => "snd ",
        });
    }

    fn push_escaped(&mut self, c: char) {
        match escape(c) {
            Some(sequence) => self.push(sequence),
            None => self.out.push(c),
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn push_line(&mut self, text: &str) {
        self.margin();
        self.push(text);
        self.push("\n");
    }

    fn margin(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }
}

/// Nivel de los operadores unarios y de los átomos con prefijo.
const UNARY: u8 = 7;

fn precedence(operator: BinOp) -> u8 {
    use BinOp::*;

    match operator {
        Or => 1,
        And => 2,
        Equal | NotEqual => 3,
        Greater | GreaterEqual | Less | LessEqual => 4,
        Add | Sub => 5,
        Mul | Div | Mod => 6,
    }
}

fn symbol(operator: BinOp) -> &'static str {
    use BinOp::*;

    match operator {
        Mul => "*",
        Div => "/",
        Mod => "%",
        Add => "+",
        Sub => "-",
        Greater => ">",
        GreaterEqual => ">=",
        Less => "<",
        LessEqual => "<=",
        Equal => "==",
        NotEqual => "!=",
        And => "&&",
        Or => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, peg, tree};

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        let root = peg::parse(&tokens).expect("parser failure");
        tree::build(&root).expect("adapter failure")
    }

    fn roundtrips(source: &str) {
        let first = pretty(&parse(source));
        let second = pretty(&parse(&first));

        assert_eq!(first, second, "unstable rendering for {:?}", source);
    }

    #[test]
    fn rendering_reaches_a_fixpoint() {
        roundtrips("begin skip end");
        roundtrips("begin int x = 1 + 2 * 3 ; exit x end");
        roundtrips("begin int x = (1 + 2) * 3 ; println x > 4 end");
        roundtrips("begin bool b = true && (false || true) ; print !b end");
        roundtrips("begin char c = 'a' ; string s = \"hi\\n\" ; print s end");
        roundtrips("begin pair(int, bool) p = newpair(1, true) ; int x = fst p end");
        roundtrips("begin int[] a = [1, 2, 3] ; print a[0] ; read a[1] end");
        roundtrips(
            "begin int f(int a, int b) is return a - b end \
             int y = call f(3, 4) ; \
             if y >= 0 then print y else print -y fi \
             end",
        );
        roundtrips("begin while 1 < 2 do begin skip end done end");
    }

    #[test]
    fn subtraction_groups_to_the_left() {
        // `a - b - c` debe re-parsear como `(a - b) - c`
        let program = parse("begin int a = 1 ; int r = a - a - a end");
        let output = pretty(&program);

        assert!(output.contains("a - a - a"), "got:\n{}", output);

        let reparsed = pretty(&parse(&output));
        assert_eq!(output, reparsed);
    }

    #[test]
    fn empty_optimised_bodies_render_as_skip() {
        let mut program = parse("begin skip ; skip end");
        crate::optimise::optimise(&mut program);

        assert!(program.main.is_empty());
        assert!(pretty(&program).contains("skip"));
    }
}
