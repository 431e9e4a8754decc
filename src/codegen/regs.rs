//! Asignador de registros.
//!
//! Cada compilación de cuerpo de función posee su propio asignador,
//! que entrega registros del pool `r4`-`r11` y los acepta de vuelta.
//! Es un servicio cooperativo: nunca bloquea ni hace spill por su
//! cuenta. La política es "quien adquiere, libera": toda rutina de
//! generación que adquiere un registro lo devuelve en cada una de
//! sus salidas. El generador decide cuándo preservar registros vivos
//! alrededor de llamadas mediante ventanas `PUSH`/`POP`, consultando
//! [`Allocator::live`].

use crate::ir::Reg;

/// Primer y último registro del pool de expresiones. Los registros
/// `r0`-`r3` quedan como scratch para convenciones de llamada.
const POOL_FIRST: u8 = 4;
const POOL_LAST: u8 = 11;

pub struct Allocator {
    /// En orden descendente; `pop()` entrega el más bajo disponible.
    free: Vec<Reg>,

    /// En orden de adquisición.
    live: Vec<Reg>,
}

impl Allocator {
    pub fn new() -> Self {
        Allocator {
            free: (POOL_FIRST..=POOL_LAST).rev().map(Reg).collect(),
            live: Vec::new(),
        }
    }

    /// Entrega el registro libre más bajo.
    ///
    /// La evaluación dirigida por pesos acota la presión de
    /// registros muy por debajo del tamaño del pool; agotarlo
    /// indica un error del generador, no del programa fuente.
    pub fn acquire(&mut self) -> Reg {
        let reg = self.free.pop().expect("register pool exhaustion");
        self.live.push(reg);

        reg
    }

    /// Devuelve un registro al pool.
    pub fn release(&mut self, reg: Reg) {
        let index = self
            .live
            .iter()
            .position(|&live| live == reg)
            .expect("released register is not live");

        self.live.remove(index);
        self.free.push(reg);

        // Mantiene la entrega determinista de menor a mayor
        self.free.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    }

    /// Registros actualmente adquiridos, en orden de adquisición.
    pub fn live(&self) -> &[Reg] {
        &self.live
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Allocator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_lowest_register_first() {
        let mut allocator = Allocator::new();

        assert_eq!(allocator.acquire(), Reg(4));
        assert_eq!(allocator.acquire(), Reg(5));
    }

    #[test]
    fn released_registers_are_reused_in_order() {
        let mut allocator = Allocator::new();

        let a = allocator.acquire();
        let b = allocator.acquire();
        allocator.release(a);

        assert_eq!(allocator.acquire(), a);
        assert_eq!(allocator.live(), &[b, a]);
    }

    #[test]
    fn live_tracks_acquisition_order() {
        let mut allocator = Allocator::new();

        let a = allocator.acquire();
        let b = allocator.acquire();
        let c = allocator.acquire();
        allocator.release(b);

        assert_eq!(allocator.live(), &[a, c]);
    }

    #[test]
    #[should_panic(expected = "register pool exhaustion")]
    fn panics_when_the_pool_is_exhausted() {
        let mut allocator = Allocator::new();
        for _ in 0..16 {
            allocator.acquire();
        }
    }
}
