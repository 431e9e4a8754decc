//! Modelo de instrucciones ARM.
//!
//! Cada instrucción es un registro inmutable cuya representación
//! textual está fija: el renderizador externo solamente escribe la
//! forma [`Display`] de cada una, línea por línea. Las directivas de
//! segmento y las etiquetas se imprimen sin sangría; el resto de las
//! instrucciones con un tabulador, como espera el ensamblador.
//!
//! La generación de código produce instrucciones hacia un [`Sink`]:
//! un vector para acumulación directa o un canal sincrónico cuando
//! el renderizador corre en su propia tarea.

use std::{
    fmt::{self, Display},
    sync::mpsc::SyncSender,
};

use crate::lex::escape;

/// Un registro físico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg(pub u8);

impl Reg {
    pub const SP: Reg = Reg(13);
    pub const LR: Reg = Reg(14);
    pub const PC: Reg = Reg(15);
}

impl Display for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            13 => fmt.write_str("sp"),
            14 => fmt.write_str("lr"),
            15 => fmt.write_str("pc"),
            n => write!(fmt, "r{}", n),
        }
    }
}

/// Código de condición; [`Cond::Al`] se imprime vacío.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Al,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cond {
    /// Condición opuesta, para invertir saltos.
    pub fn negate(self) -> Cond {
        match self {
            Cond::Al => Cond::Al,
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ge => Cond::Lt,
        }
    }
}

impl Display for Cond {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cond::Al => Ok(()),
            Cond::Eq => fmt.write_str("EQ"),
            Cond::Ne => fmt.write_str("NE"),
            Cond::Lt => fmt.write_str("LT"),
            Cond::Le => fmt.write_str("LE"),
            Cond::Gt => fmt.write_str("GT"),
            Cond::Ge => fmt.write_str("GE"),
        }
    }
}

/// Segundo operando flexible: registro o inmediato.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => reg.fmt(fmt),
            Operand::Imm(value) => write!(fmt, "#{}", value),
        }
    }
}

/// Modo de direccionamiento de `LDR`/`STR`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// `[base]`
    Base(Reg),

    /// `[base, #off]`
    Offset(Reg, i32),

    /// `[base, index, LSL #2]`
    Indexed(Reg, Reg),

    /// `[base, #off]!`, escritura con pre-decremento
    PreIndexed(Reg, i32),

    /// `=label`, carga de dirección desde el pool de literales
    Label(String),

    /// `=value`, carga de constante desde el pool de literales
    Constant(i32),
}

impl Display for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Base(base) => write!(fmt, "[{}]", base),
            Address::Offset(base, offset) => write!(fmt, "[{}, #{}]", base, offset),
            Address::Indexed(base, index) => write!(fmt, "[{}, {}, LSL #2]", base, index),
            Address::PreIndexed(base, offset) => write!(fmt, "[{}, #{}]!", base, offset),
            Address::Label(label) => write!(fmt, "={}", label),
            Address::Constant(value) => write!(fmt, "={}", value),
        }
    }
}

/// Una instrucción o directiva del programa emitido.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Data,
    Text,
    Global(String),
    Label(String),
    Word(u32),
    Ascii(String),

    Mov(Cond, Reg, Operand),
    Neg(Reg, Reg),
    Not(Reg, Reg),

    /// Desplazamiento lógico a la izquierda por un inmediato.
    Lsl(Reg, Reg, u8),

    Add(Reg, Reg, Operand),
    Sub(Reg, Reg, Operand),
    Rsb(Reg, Reg, Operand),
    And(Reg, Reg, Operand),
    Eor(Reg, Reg, Operand),
    Orr(Reg, Reg, Operand),
    Bic(Reg, Reg, Operand),
    Mul(Reg, Reg, Reg),

    Cmp(Reg, Operand),
    Cmn(Reg, Operand),
    Tst(Reg, Operand),
    Teq(Reg, Operand),

    /// División por convención: dividendo en `r0`, cociente en `r0`
    /// y residuo en `r1` al retornar del runtime.
    Div(Reg),

    Ldr(Reg, Address),
    Str(Reg, Address),

    Push(Vec<Reg>),
    Pop(Vec<Reg>),

    B(Cond, String),
    Bl(Cond, String),
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            Data => fmt.write_str(".data"),
            Text => fmt.write_str(".text"),
            Global(name) => write!(fmt, ".global {}", name),
            Label(name) => write!(fmt, "{}:", name),

            Word(value) => write!(fmt, "\t.word {}", value),
            Ascii(text) => {
                fmt.write_str("\t.ascii \"")?;
                for c in text.chars() {
                    match escape(c) {
                        Some(sequence) => fmt.write_str(sequence)?,
                        None => write!(fmt, "{}", c)?,
                    }
                }
                fmt.write_str("\"")
            }

            Mov(cond, dst, src) => write!(fmt, "\tMOV{} {}, {}", cond, dst, src),
            Neg(dst, src) => write!(fmt, "\tNEG {}, {}", dst, src),
            Not(dst, src) => write!(fmt, "\tNOT {}, {}", dst, src),
            Lsl(dst, src, shift) => write!(fmt, "\tLSL {}, {}, #{}", dst, src, shift),

            Add(dst, lhs, rhs) => write!(fmt, "\tADD {}, {}, {}", dst, lhs, rhs),
            Sub(dst, lhs, rhs) => write!(fmt, "\tSUB {}, {}, {}", dst, lhs, rhs),
            Rsb(dst, lhs, rhs) => write!(fmt, "\tRSB {}, {}, {}", dst, lhs, rhs),
            And(dst, lhs, rhs) => write!(fmt, "\tAND {}, {}, {}", dst, lhs, rhs),
            Eor(dst, lhs, rhs) => write!(fmt, "\tEOR {}, {}, {}", dst, lhs, rhs),
            Orr(dst, lhs, rhs) => write!(fmt, "\tORR {}, {}, {}", dst, lhs, rhs),
            Bic(dst, lhs, rhs) => write!(fmt, "\tBIC {}, {}, {}", dst, lhs, rhs),
            Mul(dst, lhs, rhs) => write!(fmt, "\tMUL {}, {}, {}", dst, lhs, rhs),

            Cmp(lhs, rhs) => write!(fmt, "\tCMP {}, {}", lhs, rhs),
            Cmn(lhs, rhs) => write!(fmt, "\tCMN {}, {}", lhs, rhs),
            Tst(lhs, rhs) => write!(fmt, "\tTST {}, {}", lhs, rhs),
            Teq(lhs, rhs) => write!(fmt, "\tTEQ {}, {}", lhs, rhs),

            Div(divisor) => write!(fmt, "\tDIV {}", divisor),

            Ldr(reg, address) => write!(fmt, "\tLDR {}, {}", reg, address),
            Str(reg, address) => write!(fmt, "\tSTR {}, {}", reg, address),

            Push(regs) => render_reg_list(fmt, "PUSH", regs),
            Pop(regs) => render_reg_list(fmt, "POP", regs),

            B(cond, label) => write!(fmt, "\tB{} {}", cond, label),
            Bl(cond, label) => write!(fmt, "\tBL{} {}", cond, label),
        }
    }
}

fn render_reg_list(fmt: &mut fmt::Formatter<'_>, mnemonic: &str, regs: &[Reg]) -> fmt::Result {
    write!(fmt, "\t{} {{", mnemonic)?;
    for (i, reg) in regs.iter().enumerate() {
        if i > 0 {
            fmt.write_str(", ")?;
        }

        reg.fmt(fmt)?;
    }
    fmt.write_str("}")
}

/// Destino unidireccional de instrucciones.
///
/// El generador escribe en orden de programa; el sink decide si
/// acumula o transfiere a otra tarea. Escribir en un canal lleno
/// suspende al productor hasta que el renderizador drene.
pub trait Sink {
    fn emit(&mut self, instruction: Instruction);
}

impl Sink for Vec<Instruction> {
    fn emit(&mut self, instruction: Instruction) {
        self.push(instruction);
    }
}

impl Sink for SyncSender<Instruction> {
    fn emit(&mut self, instruction: Instruction) {
        // El renderizador solo se descarta junto al proceso entero
        let _ = self.send(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_directives_without_indentation() {
        assert_eq!(Instruction::Data.to_string(), ".data");
        assert_eq!(Instruction::Global("main".into()).to_string(), ".global main");
        assert_eq!(Instruction::Label("msg_0".into()).to_string(), "msg_0:");
    }

    #[test]
    fn renders_instructions_with_operand_rules() {
        use Instruction::*;

        assert_eq!(
            Mov(Cond::Al, Reg(0), Operand::Imm(0)).to_string(),
            "\tMOV r0, #0",
        );
        assert_eq!(
            Mov(Cond::Eq, Reg(4), Operand::Imm(1)).to_string(),
            "\tMOVEQ r4, #1",
        );
        assert_eq!(
            Add(Reg(4), Reg(4), Operand::Reg(Reg(5))).to_string(),
            "\tADD r4, r4, r5",
        );
        assert_eq!(
            Ldr(Reg(4), Address::Indexed(Reg(4), Reg(5))).to_string(),
            "\tLDR r4, [r4, r5, LSL #2]",
        );
        assert_eq!(
            Str(Reg(0), Address::PreIndexed(Reg::SP, -4)).to_string(),
            "\tSTR r0, [sp, #-4]!",
        );
        assert_eq!(
            Push(vec![Reg(4), Reg::LR]).to_string(),
            "\tPUSH {r4, lr}",
        );
        assert_eq!(Bl(Cond::Al, "exit".into()).to_string(), "\tBL exit");
    }

    #[test]
    fn escapes_ascii_data() {
        assert_eq!(
            Instruction::Ascii("hi\n".into()).to_string(),
            "\t.ascii \"hi\\n\"",
        );
    }

    #[test]
    fn condition_negation_is_involutive() {
        for cond in [Cond::Eq, Cond::Ne, Cond::Lt, Cond::Le, Cond::Gt, Cond::Ge] {
            assert_eq!(cond.negate().negate(), cond);
        }
    }
}
