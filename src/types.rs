//! Modelo de tipos del lenguaje.
//!
//! La familia de tipos es cerrada: `int`, `bool`, `char`, pares y
//! arreglos. Tanto los componentes de un par como la base de un
//! arreglo pueden estar ausentes ("comodín"), lo cual ocurre con el
//! literal `null` y con literales de arreglo vacíos cuyo tipo de
//! elemento aún no se conoce. El tipo centinela [`Type::Invalid`]
//! marca expresiones cuya inferencia falló; no empareja con nada y
//! de esa forma suprime diagnósticos en cascada.

use std::fmt::{self, Display};

/// Un tipo del lenguaje.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Char,

    /// Par en heap; componentes ausentes son comodines.
    Pair(Option<Box<Type>>, Option<Box<Type>>),

    /// Arreglo de tamaño dinámico; base ausente es comodín.
    Array(Option<Box<Type>>),

    /// Centinela de inferencia fallida.
    Invalid,
}

impl Type {
    /// Arreglo con base conocida.
    pub fn array_of(base: Type) -> Type {
        Type::Array(Some(Box::new(base)))
    }

    /// `string` es azúcar sintáctico para `char[]`.
    pub fn string() -> Type {
        Type::array_of(Type::Char)
    }

    /// Par de componentes desconocidos, el tipo del literal `null`.
    pub fn wild_pair() -> Type {
        Type::Pair(None, None)
    }

    /// Emparejamiento estructural.
    ///
    /// Los tipos base solo emparejan consigo mismos. Pares y
    /// arreglos emparejan componente a componente, donde un
    /// componente ausente empareja con cualquier contraparte. La
    /// relación es simétrica y reflexiva sobre tipos concretos,
    /// pero NO es transitiva a través de comodines:
    /// `pair(?, int)` empareja con `pair(bool, ?)`.
    pub fn matches(&self, other: &Type) -> bool {
        use Type::*;

        match (self, other) {
            (Invalid, _) | (_, Invalid) => false,

            (Int, Int) | (Bool, Bool) | (Char, Char) => true,

            (Pair(a, b), Pair(c, d)) => {
                component_matches(a.as_deref(), c.as_deref())
                    && component_matches(b.as_deref(), d.as_deref())
            }

            (Array(a), Array(b)) => component_matches(a.as_deref(), b.as_deref()),

            _ => false,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Type::Pair(..))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }
}

fn component_matches(a: Option<&Type>, b: Option<&Type>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => a.matches(b),
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::Bool => fmt.write_str("bool"),
            Type::Char => fmt.write_str("char"),

            Type::Pair(None, None) => fmt.write_str("pair"),
            Type::Pair(first, second) => {
                let component = |fmt: &mut fmt::Formatter<'_>, c: &Option<Box<Type>>| match c {
                    Some(c) => c.fmt(fmt),
                    None => fmt.write_str("pair"),
                };

                fmt.write_str("pair(")?;
                component(fmt, first)?;
                fmt.write_str(", ")?;
                component(fmt, second)?;
                fmt.write_str(")")
            }

            Type::Array(Some(base)) if **base == Type::Char => fmt.write_str("string"),
            Type::Array(Some(base)) => write!(fmt, "{}[]", base),
            Type::Array(None) => fmt.write_str("[]"),

            Type::Invalid => fmt.write_str("<invalid>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concrete() -> Vec<Type> {
        vec![
            Type::Int,
            Type::Bool,
            Type::Char,
            Type::string(),
            Type::array_of(Type::Int),
            Type::Pair(Some(Box::new(Type::Int)), Some(Box::new(Type::Bool))),
        ]
    }

    #[test]
    fn matching_is_symmetric_and_reflexive_on_concrete_types() {
        for a in concrete() {
            assert!(a.matches(&a), "{} should match itself", a);

            for b in concrete() {
                assert_eq!(a.matches(&b), b.matches(&a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn wildcards_match_any_concrete_counterpart() {
        for concrete in concrete() {
            let pair = Type::Pair(Some(Box::new(concrete.clone())), Some(Box::new(Type::Int)));
            assert!(Type::wild_pair().matches(&pair));
            assert!(pair.matches(&Type::wild_pair()));

            let array = Type::array_of(concrete);
            assert!(Type::Array(None).matches(&array));
            assert!(array.matches(&Type::Array(None)));
        }
    }

    #[test]
    fn wildcard_matching_is_not_transitive() {
        let left = Type::Pair(None, Some(Box::new(Type::Int)));
        let right = Type::Pair(Some(Box::new(Type::Bool)), None);

        // Ambos emparejan entre sí, pero sus partes concretas no
        assert!(left.matches(&right));
        assert!(!Type::Int.matches(&Type::Bool));
    }

    #[test]
    fn invalid_matches_nothing() {
        for typ in concrete() {
            assert!(!Type::Invalid.matches(&typ));
            assert!(!typ.matches(&Type::Invalid));
        }

        assert!(!Type::Invalid.matches(&Type::Invalid));
    }

    #[test]
    fn base_types_do_not_cross_match() {
        assert!(!Type::Int.matches(&Type::Bool));
        assert!(!Type::Char.matches(&Type::Int));
        assert!(!Type::array_of(Type::Int).matches(&Type::Int));
        assert!(!Type::wild_pair().matches(&Type::Array(None)));
    }
}
