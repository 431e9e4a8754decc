//! Utilidades de coordinación entre tareas.
//!
//! El compilador reparte trabajo entre hilos que se comunican por
//! canales de una sola dirección: cada tarea escribe en su propio
//! canal y lo cierra al terminar. Este módulo aporta el punto de
//! reunión: [`merge`] une varios receptores en uno solo, que se
//! cierra exactamente cuando todos los de entrada se han cerrado.

use std::{
    sync::mpsc::{self, Receiver},
    thread,
};

/// Une varios canales en uno.
///
/// Por cada fuente se lanza un hilo reenviador que copia sus
/// elementos al canal de salida. El emisor de salida se clona una
/// vez por fuente y se suelta al agotarse cada una, de manera que
/// el receptor retornado termina cuando la última fuente cierra.
///
/// El orden entre elementos de fuentes distintas no está definido;
/// dentro de una misma fuente se preserva.
pub fn merge<T: Send + 'static>(sources: Vec<Receiver<T>>) -> Receiver<T> {
    let (sender, receiver) = mpsc::channel();

    for source in sources {
        let sender = sender.clone();

        thread::spawn(move || {
            for item in source {
                // El receptor puede haberse descartado; no es un error
                if sender.send(item).is_err() {
                    break;
                }
            }
        });
    }

    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn merges_every_source() {
        let mut sources = Vec::new();
        for base in 0..4 {
            let (sender, receiver) = mpsc::channel();
            sources.push(receiver);

            for i in 0..8 {
                sender.send(base * 8 + i).unwrap();
            }
        }

        let mut merged: Vec<i32> = merge(sources).into_iter().collect();
        merged.sort_unstable();

        assert_eq!(merged, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn preserves_order_within_a_source() {
        let (sender, receiver) = mpsc::channel();
        for i in 0..16 {
            sender.send(i).unwrap();
        }
        drop(sender);

        let merged: Vec<i32> = merge(vec![receiver]).into_iter().collect();
        assert_eq!(merged, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn closes_when_no_sources_exist() {
        let merged = merge(Vec::<Receiver<()>>::new());
        assert!(merged.into_iter().next().is_none());
    }
}
