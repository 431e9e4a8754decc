//! Generación de código ARM.
//!
//! El generador consume un AST válido y ya optimizado, y produce la
//! secuencia lineal de instrucciones hacia un [`Sink`]. La raíz del
//! programa expone dos productores: [`Generator::function_defs`]
//! para las funciones de usuario y [`Generator::main`] para el punto
//! de entrada; [`Generator::emit`] los encadena junto a la sección
//! de datos.
//!
//! Convenciones del código emitido:
//!
//! - Variables en pila, una palabra cada una; `sp` se reserva por
//!   scope y los offsets se corrigen con el contador de bytes
//!   empujados temporalmente durante armado de argumentos.
//! - Expresiones en registros del pool `r4`-`r11`; `r0`-`r3` quedan
//!   para convenciones de llamada y del runtime.
//! - El dividendo de `DIV` viaja en `r0`; el cociente regresa en
//!   `r0` y el residuo en `r1`.
//! - Los argumentos se empujan de derecha a izquierda con
//!   `STR reg, [sp, #-4]!`; el llamador limpia la pila.
//! - Los registros vivos se preservan alrededor de llamadas a
//!   funciones de usuario con ventanas `PUSH`/`POP`; las rutinas
//!   del runtime preservan el pool por convención de llamada.
//!
//! El conjunto [`RuntimeSet`] reporta qué rutinas del runtime
//! referencia el programa emitido, para que el enlace incluya solo
//! las necesarias.

pub mod regs;

use std::cell::Cell;

use bitflags::bitflags;

use crate::{
    ast::{BinOp, Expr, Function, Lhs, PairField, Program, Rhs, Stat, UnaryOp},
    ir::{Address, Cond, Instruction, Operand, Reg, Sink},
    lex::Identifier,
    source::Located,
    types::Type,
};

use self::regs::Allocator;

bitflags! {
    /// Rutinas del runtime referenciadas por el programa emitido.
    pub struct RuntimeSet: u32 {
        const PRINT_STRING = 1 << 0;
        const PRINT_INT = 1 << 1;
        const PRINT_BOOL = 1 << 2;
        const PRINT_REFERENCE = 1 << 3;
        const PRINT_LN = 1 << 4;
        const READ_INT = 1 << 5;
        const READ_CHAR = 1 << 6;
        const FREE_PAIR = 1 << 7;
        const FREE_ARRAY = 1 << 8;
        const CHECK_NULL_POINTER = 1 << 9;
        const CHECK_ARRAY_BOUNDS = 1 << 10;
    }
}

/// Generador para un programa completo.
pub struct Generator<'p> {
    program: &'p Program,
    strings: Vec<String>,
    labels: Cell<u32>,
}

impl<'p> Generator<'p> {
    /// Prepara el generador, recolectando los literales de cadena
    /// del programa en orden de aparición.
    pub fn new(program: &'p Program) -> Self {
        let mut strings = Vec::new();
        for function in &program.functions {
            collect_strings(&function.body, &mut strings);
        }
        collect_strings(&program.main, &mut strings);

        Generator {
            program,
            strings,
            labels: Cell::new(0),
        }
    }

    /// Emite el programa completo: datos, funciones y entrada.
    pub fn emit<S: Sink>(&self, sink: &mut S) -> RuntimeSet {
        self.data(sink);
        sink.emit(Instruction::Text);
        sink.emit(Instruction::Global("main".into()));

        self.function_defs(sink) | self.main(sink)
    }

    /// Sección `.data`: un `msg_N` por literal de cadena, con su
    /// longitud en caracteres seguida del texto.
    pub fn data<S: Sink>(&self, sink: &mut S) {
        if self.strings.is_empty() {
            return;
        }

        sink.emit(Instruction::Data);
        for (i, string) in self.strings.iter().enumerate() {
            sink.emit(Instruction::Label(format!("msg_{}", i)));
            sink.emit(Instruction::Word(string.chars().count() as u32));
            sink.emit(Instruction::Ascii(string.clone()));
        }
    }

    /// Instrucciones de todas las funciones de usuario.
    pub fn function_defs<S: Sink>(&self, sink: &mut S) -> RuntimeSet {
        let mut runtime = RuntimeSet::empty();
        for function in &self.program.functions {
            runtime |= self.function(function, sink);
        }

        runtime
    }

    /// Punto de entrada del programa.
    pub fn main<S: Sink>(&self, sink: &mut S) -> RuntimeSet {
        sink.emit(Instruction::Label("main".into()));
        sink.emit(Instruction::Push(vec![Reg::LR]));

        let mut body = Body::new(self);
        body.block(&self.program.main, sink);

        sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Imm(0)));
        sink.emit(Instruction::Pop(vec![Reg::PC]));

        body.runtime
    }

    fn function<S: Sink>(&self, function: &Function, sink: &mut S) -> RuntimeSet {
        sink.emit(Instruction::Label(format!("f_{}", function.name.as_ref())));
        sink.emit(Instruction::Push(vec![Reg::LR]));

        let mut body = Body::new(self);
        body.bind_parameters(function);
        body.block(&function.body, sink);

        // Alcanzable solo si la última ruta retornó dentro de un `if`
        sink.emit(Instruction::Pop(vec![Reg::PC]));

        body.runtime
    }

    fn label(&self) -> String {
        let n = self.labels.get();
        self.labels.set(n + 1);

        format!("L{}", n)
    }

    fn string_label(&self, string: &str) -> String {
        let index = self
            .strings
            .iter()
            .position(|collected| collected == string)
            .expect("string literal not collected");

        format!("msg_{}", index)
    }
}

fn collect_strings(body: &[Stat], strings: &mut Vec<String>) {
    fn expr(e: &Expr, strings: &mut Vec<String>) {
        match e {
            Expr::Str(string) => {
                if !strings.iter().any(|collected| collected == string) {
                    strings.push(string.clone());
                }
            }

            Expr::ArrayElem { indices, .. } => {
                for index in indices {
                    expr(index.as_ref(), strings);
                }
            }

            Expr::Unary(_, operand) => expr(operand.as_ref().as_ref(), strings),

            Expr::Binary(left, _, right) => {
                expr(left.as_ref().as_ref(), strings);
                expr(right.as_ref().as_ref(), strings);
            }

            Expr::Paren(inner) => expr(inner.as_ref().as_ref(), strings),

            _ => (),
        }
    }

    fn rhs(r: &Rhs, strings: &mut Vec<String>) {
        match r {
            Rhs::Expr(e) => expr(e.as_ref(), strings),

            Rhs::ArrayLiter(elements) => {
                for element in elements {
                    expr(element.as_ref(), strings);
                }
            }

            Rhs::NewPair(first, second) => {
                expr(first.as_ref(), strings);
                expr(second.as_ref(), strings);
            }

            Rhs::PairElem(_, operand) => expr(operand.as_ref().as_ref(), strings),

            Rhs::Call { args, .. } => {
                for arg in args {
                    expr(arg.as_ref(), strings);
                }
            }
        }
    }

    fn lhs(l: &Lhs, strings: &mut Vec<String>) {
        match l {
            Lhs::Var(_) => (),

            Lhs::ArrayElem { indices, .. } => {
                for index in indices {
                    expr(index.as_ref(), strings);
                }
            }

            Lhs::PairElem(_, operand) => expr(operand.as_ref().as_ref(), strings),
        }
    }

    for statement in body {
        match statement {
            Stat::Skip => (),

            Stat::Declare { value, .. } => rhs(value.as_ref(), strings),

            Stat::Assign { target, value } => {
                lhs(target, strings);
                rhs(value.as_ref(), strings);
            }

            Stat::Read(target) => lhs(target, strings),

            Stat::Free(operand)
            | Stat::Return(operand)
            | Stat::Exit(operand)
            | Stat::Print(operand)
            | Stat::Println(operand) => expr(operand.as_ref(), strings),

            Stat::If {
                condition,
                on_true,
                on_false,
            } => {
                expr(condition.as_ref(), strings);
                collect_strings(on_true, strings);
                collect_strings(on_false, strings);
            }

            Stat::While { condition, body } => {
                expr(condition.as_ref(), strings);
                collect_strings(body, strings);
            }

            Stat::Block(inner) => collect_strings(inner, strings),
        }
    }
}

/// Un nivel léxico del frame.
struct Level {
    /// Bytes reservados por este nivel al entrar.
    size: i32,

    /// Offset del próximo declare, desde el `sp` del nivel.
    next: i32,

    vars: Vec<(Identifier, Type, i32)>,
}

/// Estado de compilación de un cuerpo de función.
struct Body<'g, 'p> {
    generator: &'g Generator<'p>,
    allocator: Allocator,
    levels: Vec<Level>,
    pushed: i32,
    runtime: RuntimeSet,
}

impl<'g, 'p> Body<'g, 'p> {
    fn new(generator: &'g Generator<'p>) -> Self {
        Body {
            generator,
            allocator: Allocator::new(),
            levels: Vec::new(),
            pushed: 0,
            runtime: RuntimeSet::empty(),
        }
    }

    /// Instala los parámetros como un nivel sin espacio propio: el
    /// espacio pertenece al llamador. El `lr` del prólogo desplaza
    /// todos los offsets en una palabra.
    fn bind_parameters(&mut self, function: &Function) {
        let vars = function
            .parameters
            .iter()
            .enumerate()
            .map(|(i, parameter)| {
                let name = parameter.name.as_ref().clone();
                (name, parameter.of.clone(), 4 + 4 * i as i32)
            })
            .collect();

        self.levels.push(Level {
            size: 0,
            next: 0,
            vars,
        });
    }

    /// Compila un cuerpo en su propio nivel léxico, reservando una
    /// palabra por declaración directa.
    fn block<S: Sink>(&mut self, body: &[Stat], sink: &mut S) {
        let declares = body
            .iter()
            .filter(|statement| matches!(statement, Stat::Declare { .. }))
            .count();
        let size = 4 * declares as i32;

        if size > 0 {
            sink.emit(Instruction::Sub(Reg::SP, Reg::SP, Operand::Imm(size)));
        }

        self.levels.push(Level {
            size,
            next: size,
            vars: Vec::new(),
        });

        for statement in body {
            self.statement(statement, sink);
        }

        self.levels.pop();

        if size > 0 {
            sink.emit(Instruction::Add(Reg::SP, Reg::SP, Operand::Imm(size)));
        }
    }

    fn statement<S: Sink>(&mut self, statement: &Stat, sink: &mut S) {
        match statement {
            Stat::Skip => (),

            Stat::Declare { of, name, value } => {
                let target = self.allocator.acquire();
                self.rhs(value.as_ref(), target, sink);

                let offset = self.declare(name.as_ref().clone(), of.clone());
                sink.emit(Instruction::Str(target, Address::Offset(Reg::SP, offset)));
                self.allocator.release(target);
            }

            Stat::Assign { target, value } => {
                let reg = self.allocator.acquire();
                self.rhs(value.as_ref(), reg, sink);
                self.store(target, reg, sink);
                self.allocator.release(reg);
            }

            Stat::Read(target) => {
                let of = self.lhs_type(target);
                self.read_address(target, sink);

                let routine = match of {
                    Type::Char => {
                        self.runtime |= RuntimeSet::READ_CHAR;
                        "p_read_char"
                    }

                    _ => {
                        self.runtime |= RuntimeSet::READ_INT;
                        "p_read_int"
                    }
                };

                sink.emit(Instruction::Bl(Cond::Al, routine.into()));
            }

            Stat::Free(operand) => {
                let of = self.infer(operand.as_ref());
                let reg = self.allocator.acquire();
                self.expr(operand.as_ref(), reg, sink);

                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(reg)));
                self.allocator.release(reg);

                let routine = if of.is_array() {
                    self.runtime |= RuntimeSet::FREE_ARRAY;
                    "p_free_array"
                } else {
                    self.runtime |= RuntimeSet::FREE_PAIR;
                    "p_free_pair"
                };

                sink.emit(Instruction::Bl(Cond::Al, routine.into()));
            }

            Stat::Return(operand) => {
                let reg = self.allocator.acquire();
                self.expr(operand.as_ref(), reg, sink);
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(reg)));
                self.allocator.release(reg);

                let locals: i32 = self.levels.iter().map(|level| level.size).sum();
                if locals > 0 {
                    sink.emit(Instruction::Add(Reg::SP, Reg::SP, Operand::Imm(locals)));
                }

                sink.emit(Instruction::Pop(vec![Reg::PC]));
            }

            Stat::Exit(operand) => {
                let reg = self.allocator.acquire();
                self.expr(operand.as_ref(), reg, sink);
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(reg)));
                self.allocator.release(reg);

                sink.emit(Instruction::Bl(Cond::Al, "exit".into()));
            }

            Stat::Print(operand) | Stat::Println(operand) => {
                let of = self.infer(operand.as_ref());

                let reg = self.allocator.acquire();
                self.expr(operand.as_ref(), reg, sink);
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(reg)));
                self.allocator.release(reg);

                self.print_value(of, sink);

                if matches!(statement, Stat::Println(_)) {
                    self.runtime |= RuntimeSet::PRINT_LN;
                    sink.emit(Instruction::Bl(Cond::Al, "p_print_ln".into()));
                }
            }

            Stat::If {
                condition,
                on_true,
                on_false,
            } => {
                let reg = self.allocator.acquire();
                self.expr(condition.as_ref(), reg, sink);
                sink.emit(Instruction::Cmp(reg, Operand::Imm(0)));
                self.allocator.release(reg);

                let on_false_label = self.generator.label();
                let end_label = self.generator.label();

                sink.emit(Instruction::B(Cond::Eq, on_false_label.clone()));
                self.block(on_true, sink);
                sink.emit(Instruction::B(Cond::Al, end_label.clone()));

                sink.emit(Instruction::Label(on_false_label));
                self.block(on_false, sink);
                sink.emit(Instruction::Label(end_label));
            }

            Stat::While { condition, body } => {
                let check_label = self.generator.label();
                let body_label = self.generator.label();

                sink.emit(Instruction::B(Cond::Al, check_label.clone()));
                sink.emit(Instruction::Label(body_label.clone()));
                self.block(body, sink);

                sink.emit(Instruction::Label(check_label));
                let reg = self.allocator.acquire();
                self.expr(condition.as_ref(), reg, sink);
                sink.emit(Instruction::Cmp(reg, Operand::Imm(1)));
                self.allocator.release(reg);

                sink.emit(Instruction::B(Cond::Eq, body_label));
            }

            Stat::Block(body) => self.block(body, sink),
        }
    }

    /// Deja el valor de la expresión en `target`.
    fn expr<S: Sink>(&mut self, expr: &Expr, target: Reg, sink: &mut S) {
        match expr {
            Expr::Int(value) => sink.emit(Instruction::Ldr(target, Address::Constant(*value))),

            Expr::Bool(value) => {
                sink.emit(Instruction::Mov(
                    Cond::Al,
                    target,
                    Operand::Imm(*value as i32),
                ));
            }

            Expr::Char(c) => {
                sink.emit(Instruction::Mov(Cond::Al, target, Operand::Imm(*c as i32)));
            }

            Expr::Str(string) => {
                let label = self.generator.string_label(string);
                sink.emit(Instruction::Ldr(target, Address::Label(label)));
            }

            Expr::Null => sink.emit(Instruction::Mov(Cond::Al, target, Operand::Imm(0))),

            Expr::Ident(name) => {
                let (_, offset) = self.lookup(name);
                sink.emit(Instruction::Ldr(target, Address::Offset(Reg::SP, offset)));
            }

            Expr::ArrayElem { array, indices } => {
                let (_, offset) = self.lookup(array.as_ref());
                sink.emit(Instruction::Ldr(target, Address::Offset(Reg::SP, offset)));

                for index in indices {
                    let idx = self.allocator.acquire();
                    self.expr(index.as_ref(), idx, sink);
                    self.bounds_check(idx, target, sink);

                    // Saltar la palabra de longitud e indexar
                    sink.emit(Instruction::Add(target, target, Operand::Imm(4)));
                    sink.emit(Instruction::Ldr(target, Address::Indexed(target, idx)));

                    self.allocator.release(idx);
                }
            }

            Expr::Unary(operator, operand) => {
                self.expr(operand.as_ref().as_ref(), target, sink);

                match operator {
                    UnaryOp::Not => {
                        sink.emit(Instruction::Eor(target, target, Operand::Imm(1)));
                    }

                    UnaryOp::Negate => sink.emit(Instruction::Neg(target, target)),

                    UnaryOp::Len => {
                        sink.emit(Instruction::Ldr(target, Address::Base(target)));
                    }

                    // Misma representación en ambas direcciones
                    UnaryOp::Ord | UnaryOp::Chr => (),
                }
            }

            Expr::Binary(left, operator, right) => {
                self.binary(left.as_ref(), *operator, right.as_ref(), target, sink);
            }

            Expr::Paren(inner) => self.expr(inner.as_ref().as_ref(), target, sink),
        }
    }

    /// Evalúa un binario, el subárbol más pesado primero.
    fn binary<S: Sink>(
        &mut self,
        left: &Located<Expr>,
        operator: BinOp,
        right: &Located<Expr>,
        target: Reg,
        sink: &mut S,
    ) {
        let (left_weight, right_weight) = (weight(left.as_ref()), weight(right.as_ref()));
        let right_first = left_weight >= 0 && right_weight > left_weight;

        let other = self.allocator.acquire();
        let (lhs, rhs) = if right_first {
            self.expr(right.as_ref(), target, sink);
            self.expr(left.as_ref(), other, sink);
            (other, target)
        } else {
            self.expr(left.as_ref(), target, sink);
            self.expr(right.as_ref(), other, sink);
            (target, other)
        };

        use BinOp::*;

        match operator {
            Add => sink.emit(Instruction::Add(target, lhs, Operand::Reg(rhs))),
            Mul => sink.emit(Instruction::Mul(target, lhs, rhs)),
            And => sink.emit(Instruction::And(target, lhs, Operand::Reg(rhs))),
            Or => sink.emit(Instruction::Orr(target, lhs, Operand::Reg(rhs))),

            Sub => {
                if rhs == target {
                    // El destino quedó con el operando derecho
                    sink.emit(Instruction::Rsb(target, target, Operand::Reg(lhs)));
                } else {
                    sink.emit(Instruction::Sub(target, target, Operand::Reg(rhs)));
                }
            }

            Div | Mod => {
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(lhs)));
                sink.emit(Instruction::Div(rhs));

                let result = if let Div = operator { Reg(0) } else { Reg(1) };
                sink.emit(Instruction::Mov(Cond::Al, target, Operand::Reg(result)));
            }

            Greater | GreaterEqual | Less | LessEqual | Equal | NotEqual => {
                let cond = match operator {
                    Greater => Cond::Gt,
                    GreaterEqual => Cond::Ge,
                    Less => Cond::Lt,
                    LessEqual => Cond::Le,
                    Equal => Cond::Eq,
                    _ => Cond::Ne,
                };

                sink.emit(Instruction::Cmp(lhs, Operand::Reg(rhs)));
                sink.emit(Instruction::Mov(cond, target, Operand::Imm(1)));
                sink.emit(Instruction::Mov(cond.negate(), target, Operand::Imm(0)));
            }
        }

        self.allocator.release(other);
    }

    fn rhs<S: Sink>(&mut self, rhs: &Rhs, target: Reg, sink: &mut S) {
        match rhs {
            Rhs::Expr(expr) => self.expr(expr.as_ref(), target, sink),

            Rhs::ArrayLiter(elements) => {
                let bytes = 4 + 4 * elements.len() as i32;
                sink.emit(Instruction::Ldr(Reg(0), Address::Constant(bytes)));
                sink.emit(Instruction::Bl(Cond::Al, "malloc".into()));
                sink.emit(Instruction::Mov(Cond::Al, target, Operand::Reg(Reg(0))));

                let tmp = self.allocator.acquire();
                sink.emit(Instruction::Ldr(
                    tmp,
                    Address::Constant(elements.len() as i32),
                ));
                sink.emit(Instruction::Str(tmp, Address::Base(target)));

                for (i, element) in elements.iter().enumerate() {
                    self.expr(element.as_ref(), tmp, sink);
                    sink.emit(Instruction::Str(
                        tmp,
                        Address::Offset(target, 4 * (i as i32 + 1)),
                    ));
                }

                self.allocator.release(tmp);
            }

            Rhs::NewPair(first, second) => {
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Imm(8)));
                sink.emit(Instruction::Bl(Cond::Al, "malloc".into()));
                sink.emit(Instruction::Mov(Cond::Al, target, Operand::Reg(Reg(0))));

                let tmp = self.allocator.acquire();
                self.expr(first.as_ref(), tmp, sink);
                sink.emit(Instruction::Str(tmp, Address::Base(target)));

                self.expr(second.as_ref(), tmp, sink);
                sink.emit(Instruction::Str(tmp, Address::Offset(target, 4)));

                self.allocator.release(tmp);
            }

            Rhs::PairElem(field, operand) => {
                self.expr(operand.as_ref().as_ref(), target, sink);
                self.null_check(target, sink);

                sink.emit(Instruction::Ldr(
                    target,
                    Address::Offset(target, pair_offset(*field)),
                ));
            }

            Rhs::Call { function, args } => {
                // Ventana de preservación: todo registro vivo del
                // llamador menos el destino, que recibe el resultado
                let saved: Vec<Reg> = self
                    .allocator
                    .live()
                    .iter()
                    .copied()
                    .filter(|&reg| reg != target)
                    .collect();

                if !saved.is_empty() {
                    sink.emit(Instruction::Push(saved.clone()));
                    self.pushed += 4 * saved.len() as i32;
                }

                for arg in args.iter().rev() {
                    let reg = self.allocator.acquire();
                    self.expr(arg.as_ref(), reg, sink);
                    sink.emit(Instruction::Str(reg, Address::PreIndexed(Reg::SP, -4)));
                    self.pushed += 4;
                    self.allocator.release(reg);
                }

                sink.emit(Instruction::Bl(
                    Cond::Al,
                    format!("f_{}", function.as_ref()),
                ));

                let arg_bytes = 4 * args.len() as i32;
                if arg_bytes > 0 {
                    sink.emit(Instruction::Add(Reg::SP, Reg::SP, Operand::Imm(arg_bytes)));
                    self.pushed -= arg_bytes;
                }

                sink.emit(Instruction::Mov(Cond::Al, target, Operand::Reg(Reg(0))));

                if !saved.is_empty() {
                    sink.emit(Instruction::Pop(saved.clone()));
                    self.pushed -= 4 * saved.len() as i32;
                }
            }
        }
    }

    /// Guarda `value` en un destino de asignación.
    fn store<S: Sink>(&mut self, target: &Lhs, value: Reg, sink: &mut S) {
        match target {
            Lhs::Var(name) => {
                let (_, offset) = self.lookup(name.as_ref());
                sink.emit(Instruction::Str(value, Address::Offset(Reg::SP, offset)));
            }

            Lhs::ArrayElem { array, indices } => {
                let addr = self.element_address(array, indices, sink);
                sink.emit(Instruction::Str(value, Address::Base(addr)));
                self.allocator.release(addr);
            }

            Lhs::PairElem(field, operand) => {
                let addr = self.pair_address(*field, operand.as_ref(), sink);
                sink.emit(Instruction::Str(value, Address::Base(addr)));
                self.allocator.release(addr);
            }
        }
    }

    /// Deja en `r0` la dirección del destino de un `read`.
    fn read_address<S: Sink>(&mut self, target: &Lhs, sink: &mut S) {
        match target {
            Lhs::Var(name) => {
                let (_, offset) = self.lookup(name.as_ref());
                sink.emit(Instruction::Add(Reg(0), Reg::SP, Operand::Imm(offset)));
            }

            Lhs::ArrayElem { array, indices } => {
                let addr = self.element_address(array, indices, sink);
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(addr)));
                self.allocator.release(addr);
            }

            Lhs::PairElem(field, operand) => {
                let addr = self.pair_address(*field, operand.as_ref(), sink);
                sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(addr)));
                self.allocator.release(addr);
            }
        }
    }

    /// Calcula la dirección de un elemento de arreglo. El registro
    /// retornado queda adquirido; el llamador lo libera.
    fn element_address<S: Sink>(
        &mut self,
        array: &Located<Identifier>,
        indices: &[Located<Expr>],
        sink: &mut S,
    ) -> Reg {
        let addr = self.allocator.acquire();
        let (_, offset) = self.lookup(array.as_ref());
        sink.emit(Instruction::Ldr(addr, Address::Offset(Reg::SP, offset)));

        let (last, front) = indices.split_last().expect("array element without indices");

        for index in front {
            let idx = self.allocator.acquire();
            self.expr(index.as_ref(), idx, sink);
            self.bounds_check(idx, addr, sink);

            sink.emit(Instruction::Add(addr, addr, Operand::Imm(4)));
            sink.emit(Instruction::Ldr(addr, Address::Indexed(addr, idx)));

            self.allocator.release(idx);
        }

        let idx = self.allocator.acquire();
        self.expr(last.as_ref(), idx, sink);
        self.bounds_check(idx, addr, sink);

        sink.emit(Instruction::Add(addr, addr, Operand::Imm(4)));
        sink.emit(Instruction::Lsl(idx, idx, 2));
        sink.emit(Instruction::Add(addr, addr, Operand::Reg(idx)));

        self.allocator.release(idx);
        addr
    }

    /// Calcula la dirección de un componente de par, con chequeo de
    /// `null`. El registro retornado queda adquirido.
    fn pair_address<S: Sink>(
        &mut self,
        field: PairField,
        operand: &Located<Expr>,
        sink: &mut S,
    ) -> Reg {
        let addr = self.allocator.acquire();
        self.expr(operand.as_ref(), addr, sink);
        self.null_check(addr, sink);

        let offset = pair_offset(field);
        if offset != 0 {
            sink.emit(Instruction::Add(addr, addr, Operand::Imm(offset)));
        }

        addr
    }

    fn bounds_check<S: Sink>(&mut self, index: Reg, array: Reg, sink: &mut S) {
        self.runtime |= RuntimeSet::CHECK_ARRAY_BOUNDS;

        sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(index)));
        sink.emit(Instruction::Mov(Cond::Al, Reg(1), Operand::Reg(array)));
        sink.emit(Instruction::Bl(Cond::Al, "p_check_array_bounds".into()));
    }

    fn null_check<S: Sink>(&mut self, pair: Reg, sink: &mut S) {
        self.runtime |= RuntimeSet::CHECK_NULL_POINTER;

        sink.emit(Instruction::Mov(Cond::Al, Reg(0), Operand::Reg(pair)));
        sink.emit(Instruction::Bl(Cond::Al, "p_check_null_pointer".into()));
    }

    fn print_value<S: Sink>(&mut self, of: Type, sink: &mut S) {
        let (flag, routine) = match of {
            Type::Int => (RuntimeSet::PRINT_INT, "p_print_int"),
            Type::Bool => (RuntimeSet::PRINT_BOOL, "p_print_bool"),

            Type::Char => {
                sink.emit(Instruction::Bl(Cond::Al, "putchar".into()));
                return;
            }

            of if of == Type::string() => (RuntimeSet::PRINT_STRING, "p_print_string"),

            // Pares y arreglos se imprimen por referencia
            _ => (RuntimeSet::PRINT_REFERENCE, "p_print_reference"),
        };

        self.runtime |= flag;
        sink.emit(Instruction::Bl(Cond::Al, routine.into()));
    }

    /// Instala una variable en el nivel actual y retorna su offset
    /// desde el `sp` en curso.
    fn declare(&mut self, name: Identifier, of: Type) -> i32 {
        let level = self.levels.last_mut().expect("declare outside of a block");
        level.next -= 4;

        let offset = level.next;
        level.vars.push((name, of, offset));

        offset + self.pushed
    }

    /// Resuelve una variable a su tipo y su offset desde el `sp`
    /// actual, contando niveles interiores y bytes empujados.
    fn lookup(&self, name: &Identifier) -> (Type, i32) {
        let mut below = self.pushed;

        for level in self.levels.iter().rev() {
            let var = level
                .vars
                .iter()
                .rev()
                .find(|(declared, ..)| declared == name);

            if let Some((_, of, offset)) = var {
                return (of.clone(), below + offset);
            }

            below += level.size;
        }

        unreachable!("variable `{}` not in frame", name)
    }

    fn lhs_type(&self, target: &Lhs) -> Type {
        match target {
            Lhs::Var(name) => self.lookup(name.as_ref()).0,

            Lhs::ArrayElem { array, indices } => {
                peel_arrays(self.lookup(array.as_ref()).0, indices.len())
            }

            Lhs::PairElem(field, operand) => {
                pair_component(self.infer(operand.as_ref().as_ref()), *field)
            }
        }
    }

    /// Tipo de una expresión ya validada por el análisis semántico.
    fn infer(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Int(_) => Type::Int,
            Expr::Bool(_) => Type::Bool,
            Expr::Char(_) => Type::Char,
            Expr::Str(_) => Type::string(),
            Expr::Null => Type::wild_pair(),

            Expr::Ident(name) => self.lookup(name).0,

            Expr::ArrayElem { array, indices } => {
                peel_arrays(self.lookup(array.as_ref()).0, indices.len())
            }

            Expr::Unary(operator, _) => match operator {
                UnaryOp::Not => Type::Bool,
                UnaryOp::Negate | UnaryOp::Len | UnaryOp::Ord => Type::Int,
                UnaryOp::Chr => Type::Char,
            },

            Expr::Binary(_, operator, _) => match operator {
                BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Add | BinOp::Sub => Type::Int,
                _ => Type::Bool,
            },

            Expr::Paren(inner) => self.infer(inner.as_ref().as_ref()),
        }
    }
}

fn pair_offset(field: PairField) -> i32 {
    match field {
        PairField::Fst => 0,
        PairField::Snd => 4,
    }
}

fn pair_component(of: Type, field: PairField) -> Type {
    match of {
        Type::Pair(first, second) => {
            let component = match field {
                PairField::Fst => first,
                PairField::Snd => second,
            };

            component.map(|inner| *inner).unwrap_or(Type::Invalid)
        }

        _ => Type::Invalid,
    }
}

fn peel_arrays(mut of: Type, layers: usize) -> Type {
    for _ in 0..layers {
        of = match of {
            Type::Array(Some(base)) => *base,
            _ => Type::Invalid,
        };
    }

    of
}

/// Peso de una expresión, para ordenar la evaluación de operandos.
///
/// `-1` marca un subárbol de costo no computable y fuerza la
/// evaluación izquierda-primero del binario que lo contiene.
fn weight(expr: &Expr) -> i32 {
    match expr {
        Expr::Int(_)
        | Expr::Bool(_)
        | Expr::Char(_)
        | Expr::Str(_)
        | Expr::Null
        | Expr::Ident(_) => 1,

        Expr::ArrayElem { .. } => -1,

        Expr::Unary(_, operand) => weight(operand.as_ref().as_ref()),

        Expr::Binary(left, _, right) => {
            let left = weight(left.as_ref().as_ref());
            let right = weight(right.as_ref().as_ref());

            if left < 0 || right < 0 {
                -1
            } else if left == right {
                left + 1
            } else {
                left.max(right)
            }
        }

        Expr::Paren(inner) => weight(inner.as_ref().as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, optimise, peg, semantic, tree};

    fn compile(source: &str) -> (Vec<Instruction>, RuntimeSet) {
        let tokens = Lexer::new(source).try_exhaustive().expect("lexer failure");
        let root = peg::parse(&tokens).expect("parser failure");
        let mut program = tree::build(&root).expect("adapter failure");

        assert!(
            semantic::analyse(&program).is_empty(),
            "semantic failure in test program",
        );

        optimise::optimise(&mut program);

        let mut code = Vec::new();
        let runtime = Generator::new(&program).emit(&mut code);

        (code, runtime)
    }

    fn position<P>(code: &[Instruction], predicate: P) -> usize
    where
        P: FnMut(&Instruction) -> bool,
    {
        let mut predicate = predicate;
        code.iter()
            .position(|instruction| predicate(instruction))
            .unwrap_or_else(|| panic!("missing instruction in:\n{:#?}", code))
    }

    #[test]
    fn hello_world_has_the_expected_layout() {
        let (code, runtime) = compile("begin print \"hello\" end");

        let data = position(&code, |i| *i == Instruction::Data);
        let msg = position(&code, |i| *i == Instruction::Label("msg_0".into()));
        let text = position(&code, |i| *i == Instruction::Text);
        let main = position(&code, |i| *i == Instruction::Label("main".into()));
        let load = position(&code, |i| {
            matches!(i, Instruction::Ldr(_, Address::Label(label)) if label == "msg_0")
        });
        let print = position(&code, |i| {
            matches!(i, Instruction::Bl(Cond::Al, label) if label == "p_print_string")
        });
        let result = position(&code, |i| {
            *i == Instruction::Mov(Cond::Al, Reg(0), Operand::Imm(0))
        });

        assert!(data < msg && msg < text && text < main);
        assert!(main < load && load < print && print < result);

        assert!(code.contains(&Instruction::Word(5)));
        assert!(code.contains(&Instruction::Ascii("hello".into())));
        assert!(runtime.contains(RuntimeSet::PRINT_STRING));
    }

    #[test]
    fn heavier_operand_is_evaluated_first() {
        let (code, _) = compile("begin int x = 1 + 2 * 3 ; exit x end");

        let mul = position(&code, |i| matches!(i, Instruction::Mul(..)));
        let add = position(&code, |i| {
            matches!(i, Instruction::Add(dst, ..) if *dst != Reg::SP)
        });

        assert!(mul < add, "MUL must precede ADD");
        assert!(code
            .iter()
            .any(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "exit")));
    }

    #[test]
    fn folded_conditional_compiles_to_a_single_exit() {
        let (code, _) = compile("begin if true then exit 0 else exit 1 fi end");

        let exits = code
            .iter()
            .filter(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "exit"))
            .count();

        assert_eq!(exits, 1);
        assert!(
            !code.iter().any(|i| matches!(i, Instruction::B(..))),
            "no branches should remain after folding",
        );
    }

    #[test]
    fn calls_push_arguments_right_to_left_and_clean_up() {
        let (code, _) = compile(
            "begin int f(int a, int b) is return a end int y = call f(1, 2) end",
        );

        let pushes = code
            .iter()
            .filter(|i| matches!(i, Instruction::Str(_, Address::PreIndexed(Reg::SP, -4))))
            .count();
        assert_eq!(pushes, 2);

        let call = position(&code, |i| {
            matches!(i, Instruction::Bl(Cond::Al, label) if label == "f_f")
        });
        let cleanup = position(&code, |i| {
            *i == Instruction::Add(Reg::SP, Reg::SP, Operand::Imm(8))
        });

        assert!(call < cleanup);
    }

    #[test]
    fn read_takes_the_address_of_its_target() {
        let (code, runtime) = compile("begin int x = 0 ; read x end");

        let address = position(&code, |i| {
            matches!(i, Instruction::Add(Reg(0), Reg::SP, Operand::Imm(_)))
        });
        let read = position(&code, |i| {
            matches!(i, Instruction::Bl(Cond::Al, label) if label == "p_read_int")
        });

        assert!(address < read);
        assert!(runtime.contains(RuntimeSet::READ_INT));
    }

    #[test]
    fn division_follows_the_runtime_convention() {
        let (code, _) = compile("begin int q = 10 / 3 ; int r = 10 % 3 end");

        let divisions = code
            .iter()
            .filter(|i| matches!(i, Instruction::Div(_)))
            .count();
        assert_eq!(divisions, 2);

        // El cociente regresa en r0 y el residuo en r1
        let div = position(&code, |i| matches!(i, Instruction::Div(_)));
        let quotient = position(&code, |i| {
            matches!(i, Instruction::Mov(Cond::Al, Reg(4), Operand::Reg(Reg(0))))
        });
        let remainder = position(&code, |i| {
            matches!(i, Instruction::Mov(Cond::Al, Reg(4), Operand::Reg(Reg(1))))
        });

        assert!(div < quotient && quotient < remainder);
    }

    #[test]
    fn array_access_is_bounds_checked() {
        let (code, runtime) = compile("begin int[] a = [1, 2] ; print a[0] end");

        assert!(runtime.contains(RuntimeSet::CHECK_ARRAY_BOUNDS));
        assert!(code
            .iter()
            .any(|i| matches!(i, Instruction::Ldr(_, Address::Indexed(..)))));
        assert!(code
            .iter()
            .any(|i| matches!(i, Instruction::Bl(Cond::Al, label) if label == "malloc")));
    }

    #[test]
    fn pair_element_access_is_null_checked() {
        let (code, runtime) =
            compile("begin pair(int, int) p = newpair(1, 2) ; int x = snd p ; free p end");

        assert!(runtime.contains(RuntimeSet::CHECK_NULL_POINTER));
        assert!(runtime.contains(RuntimeSet::FREE_PAIR));
        assert!(code
            .iter()
            .any(|i| matches!(i, Instruction::Ldr(_, Address::Offset(_, 4)))));
    }

    #[test]
    fn while_loops_test_the_condition_at_the_bottom() {
        let (code, _) = compile("begin int i = 0 ; while i < 2 do i = i + 1 done end");

        let entry = position(&code, |i| matches!(i, Instruction::B(Cond::Al, _)));
        let test = position(&code, |i| *i == Instruction::Cmp(Reg(4), Operand::Imm(1)));
        let back = position(&code, |i| matches!(i, Instruction::B(Cond::Eq, _)));

        assert!(entry < test && test < back);
    }
}
