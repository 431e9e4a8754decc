//! Compilador para WACC.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente. Este
//! archivo se somete primero a análisis léxico en [`lex`], de lo
//! cual se obtiene un flujo de tokens. El flujo de tokens se dispone
//! en un árbol de parseo genérico por medio de análisis sintáctico
//! en [`peg`], y el adaptador en [`tree`] lo reduce al AST de
//! [`ast`]. El árbol es procesado por análisis semántico en
//! [`semantic`] (tipos y scopes en una pasada, rutas de retorno en
//! otra, concurrentes entre sí), con lo cual concluyen las fases
//! delanteras del compilador.
//!
//! # Back end
//! Un AST válido pasa por las simplificaciones de [`optimise`] y
//! llega al generador en [`codegen`], que lo traduce al modelo de
//! instrucciones ARM de [`ir`]. El renderizado textual y el enlace
//! contra el runtime quedan fuera de este crate: el generador
//! escribe instrucciones a un sink y cada instrucción conoce su
//! propia forma textual.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lex;
pub mod optimise;
pub mod peg;
pub mod pretty;
pub mod semantic;
pub mod source;
pub mod task;
pub mod tree;
pub mod types;
