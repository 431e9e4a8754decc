//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco y
//! los comentarios (`#` hasta el fin de línea) se descartan durante
//! esta operación. Cada token emitido está asociado a una ubicación
//! en el código fuente original.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores empiezan con letra o `_` y el lenguaje es
//!   case-sensitive: `begin` es palabra clave, `Begin` es identificador.
//! - Las constantes enteras son decimales; la verificación de rango
//!   final ocurre al construir el AST, donde ya se conoce el signo.
//! - Literales de carácter y de cadena admiten los escapes
//!   `\0 \b \t \n \f \r \" \' \\`.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de
//! error: descarta la línea donde ocurrió el problema y continúa, lo
//! cual permite reportar más de un error léxico por ejecución.

use crate::source::{Located, Location};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    str::{Chars, FromStr},
    sync::Arc,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera excede todo rango representable.
    #[error("Integer literal overflow")]
    IntOverflow,

    /// Secuencia de escape desconocida.
    #[error("Unknown escape sequence '\\{0}'")]
    BadEscape(char),

    /// Literal de cadena o carácter sin terminar.
    #[error("Unterminated literal")]
    Unterminated,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Identifier(Arc::from(name.as_ref()))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero, sin signo todavía.
    IntLiteral(i64),

    /// Literal de carácter.
    CharLiteral(char),

    /// Literal de cadena, ya sin escapes.
    StrLiteral(String),

    /// `=`
    Assign,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Divide,

    /// `%`
    Modulo,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `&&`
    And,

    /// `||`
    Or,

    /// `!`
    Bang,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            CharLiteral(c) => write!(fmt, "literal `'{}'`", c),
            StrLiteral(s) => write!(fmt, "literal `{:?}`", s),
            Assign => fmt.write_str("`=`"),
            Semicolon => fmt.write_str("`;`"),
            Comma => fmt.write_str("`,`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Divide => fmt.write_str("`/`"),
            Modulo => fmt.write_str("`%`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            And => fmt.write_str("`&&`"),
            Or => fmt.write_str("`||`"),
            Bang => fmt.write_str("`!`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Begin,
    End,
    Is,
    Skip,
    Read,
    Free,
    Return,
    Exit,
    Print,
    Println,
    If,
    Then,
    Else,
    Fi,
    While,
    Do,
    Done,
    Newpair,
    Call,
    Fst,
    Snd,
    Int,
    Bool,
    Char,
    String,
    Pair,
    True,
    False,
    Null,
    Len,
    Ord,
    Chr,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("begin", Keyword::Begin),
    ("end", Keyword::End),
    ("is", Keyword::Is),
    ("skip", Keyword::Skip),
    ("read", Keyword::Read),
    ("free", Keyword::Free),
    ("return", Keyword::Return),
    ("exit", Keyword::Exit),
    ("print", Keyword::Print),
    ("println", Keyword::Println),
    ("if", Keyword::If),
    ("then", Keyword::Then),
    ("else", Keyword::Else),
    ("fi", Keyword::Fi),
    ("while", Keyword::While),
    ("do", Keyword::Do),
    ("done", Keyword::Done),
    ("newpair", Keyword::Newpair),
    ("call", Keyword::Call),
    ("fst", Keyword::Fst),
    ("snd", Keyword::Snd),
    ("int", Keyword::Int),
    ("bool", Keyword::Bool),
    ("char", Keyword::Char),
    ("string", Keyword::String),
    ("pair", Keyword::Pair),
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("null", Keyword::Null),
    ("len", Keyword::Len),
    ("ord", Keyword::Ord),
    ("chr", Keyword::Chr),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap();

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Resuelve una secuencia de escape a su carácter.
pub fn unescape(c: char) -> Option<char> {
    match c {
        '0' => Some('\0'),
        'b' => Some('\u{8}'),
        't' => Some('\t'),
        'n' => Some('\n'),
        'f' => Some('\u{c}'),
        'r' => Some('\r'),
        '"' => Some('"'),
        '\'' => Some('\''),
        '\\' => Some('\\'),
        _ => None,
    }
}

/// Operación inversa de [`unescape`], para impresión de literales.
pub fn escape(c: char) -> Option<&'static str> {
    match c {
        '\0' => Some("\\0"),
        '\u{8}' => Some("\\b"),
        '\t' => Some("\\t"),
        '\n' => Some("\\n"),
        '\u{c}' => Some("\\f"),
        '\r' => Some("\\r"),
        '"' => Some("\\\""),
        '\'' => Some("\\'"),
        '\\' => Some("\\\\"),
        _ => None,
    }
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define a
/// partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    state: State,
    start: Location,
    next: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error; descarta hasta el fin de línea.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Comentario de línea (`#`).
    Comment,

    /// Constante entera en acumulación.
    Integer(i64),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),

    /// Se encontró `>`, `<`, `=` o `!` y puede seguir `=`.
    MaybeEqual(char),

    /// Se encontró `&` o `|`, debe duplicarse.
    Doubled(char),

    /// Se encontró `'`.
    CharOpen,

    /// Se encontró `'\`.
    CharEscape,

    /// Carácter leído, se espera el `'` de cierre.
    CharClose(char),

    /// Interior de un literal de cadena.
    Str(String),

    /// Escape dentro de un literal de cadena.
    StrEscape(String),
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial sobre un texto fuente.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            state: State::Start,
            start: Location::default(),
            next: Location::default(),
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens o
    /// una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará de
    /// buscar tokens exitosos y comenzará a acumular solamente
    /// errores, lo cual permite reportar múltiples errores léxicos
    /// en una misma ejecución del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start;
        let token = loop {
            let next_char = self.source.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente mientras no se haya encontrado una frontera
            // de token
            if let Start = self.state {
                self.start = self.next;
            }

            // Switch table principal, determina cambios de estado y
            // de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error y el lexer se reinicia
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('[')) => self.state = Complete(OpenSquare),
                (Start, Some(']')) => self.state = Complete(CloseSquare),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = Complete(Divide),
                (Start, Some('%')) => self.state = Complete(Modulo),

                // Operadores que pueden continuar con `=`
                (Start, Some(c @ ('>' | '<' | '=' | '!'))) => self.state = MaybeEqual(c),

                // `&&` y `||`
                (Start, Some(c @ ('&' | '|'))) => self.state = Doubled(c),

                // Comentarios y literales
                (Start, Some('#')) => self.state = Comment,
                (Start, Some('\'')) => self.state = CharOpen,
                (Start, Some('"')) => self.state = Str(Default::default()),

                // Identificadores, palabras clave y constantes
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Plus)),

                (MaybeEqual('>'), Some('=')) => self.state = Complete(GreaterEqual),
                (MaybeEqual('<'), Some('=')) => self.state = Complete(LessEqual),
                (MaybeEqual('='), Some('=')) => self.state = Complete(Equal),
                (MaybeEqual('!'), Some('=')) => self.state = Complete(NotEqual),
                (MaybeEqual('>'), _) => break Ok(Greater),
                (MaybeEqual('<'), _) => break Ok(Less),
                (MaybeEqual('='), _) => break Ok(Assign),
                (MaybeEqual(_), _) => break Ok(Bang),

                (Doubled('&'), Some('&')) => self.state = Complete(And),
                (Doubled('|'), Some('|')) => self.state = Complete(Or),
                (Doubled(c), _) => break Err(LexerError::Expected(*c)),

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit.to_digit(10).unwrap() as i64;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier::new(std::mem::take(word))));
                    }
                }

                // Literales de carácter
                (CharOpen, Some('\\')) => self.state = CharEscape,
                (CharOpen, Some(c)) if c != '\'' => self.state = CharClose(c),
                (CharOpen, _) => break Err(LexerError::Unterminated),

                (CharEscape, Some(c)) => match unescape(c) {
                    Some(escaped) => self.state = CharClose(escaped),
                    None => break Err(LexerError::BadEscape(c)),
                },

                (CharEscape, None) => break Err(LexerError::Unterminated),

                (CharClose(c), Some('\'')) => self.state = Complete(CharLiteral(*c)),
                (CharClose(_), _) => break Err(LexerError::Expected('\'')),

                // Literales de cadena
                (Str(string), Some('"')) => {
                    self.state = Complete(StrLiteral(std::mem::take(string)))
                }

                (Str(string), Some('\\')) => self.state = StrEscape(std::mem::take(string)),
                (Str(_), Some('\n') | None) => break Err(LexerError::Unterminated),
                (Str(string), Some(c)) => string.push(c),

                (StrEscape(string), Some(c)) => match unescape(c) {
                    Some(escaped) => {
                        string.push(escaped);
                        self.state = Str(std::mem::take(string));
                    }

                    None => break Err(LexerError::BadEscape(c)),
                },

                (StrEscape(_), None) => break Err(LexerError::Unterminated),
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(c) = self.source.next() {
                last_accepted = self.next;
                self.next = match c {
                    '\n' => self.next.newline(),
                    _ => self.next.advance(),
                };
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some((token, _))) => {
                self.state = State::Start;
                Some(Ok(Located::at(token, self.start)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.next)))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .try_exhaustive()
            .expect("lexer failure")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    #[test]
    fn scans_trivial_program() {
        assert_eq!(
            tokens("begin skip end"),
            vec![
                Token::Keyword(Keyword::Begin),
                Token::Keyword(Keyword::Skip),
                Token::Keyword(Keyword::End),
            ],
        );
    }

    #[test]
    fn distinguishes_two_char_operators() {
        assert_eq!(
            tokens("< <= == = ! !="),
            vec![
                Token::Less,
                Token::LessEqual,
                Token::Equal,
                Token::Assign,
                Token::Bang,
                Token::NotEqual,
            ],
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            tokens("begin Begin"),
            vec![
                Token::Keyword(Keyword::Begin),
                Token::Id(Identifier::new("Begin")),
            ],
        );
    }

    #[test]
    fn resolves_escapes_in_literals() {
        assert_eq!(
            tokens(r#"'\n' "a\tb""#),
            vec![
                Token::CharLiteral('\n'),
                Token::StrLiteral("a\tb".into()),
            ],
        );
    }

    #[test]
    fn comments_reach_end_of_line() {
        assert_eq!(
            tokens("skip # print 1\nskip"),
            vec![Token::Keyword(Keyword::Skip), Token::Keyword(Keyword::Skip)],
        );
    }

    #[test]
    fn collects_every_error() {
        let errors = Lexer::new("^\n~\nskip")
            .try_exhaustive()
            .expect_err("lexer should fail");

        assert_eq!(errors.len(), 2);
    }
}
