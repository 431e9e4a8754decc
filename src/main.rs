//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI. Los errores del programa fuente se
//! reportan por stderr con los códigos de salida convencionales
//! (100 sintácticos, 200 semánticos); las fallas de E/S o internas
//! terminan con otro código distinto de cero.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    process,
    sync::mpsc,
    thread,
};

use anyhow::{anyhow, Context};
use clap::{crate_version, Arg, ArgAction, Command};

use wacc::{
    codegen::Generator,
    error::Diagnostics,
    ir::Instruction,
    lex::Lexer,
    optimise, peg, pretty, semantic, tree,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("WACC compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("WACC source file"),
        )
        .arg(
            Arg::new("peg")
                .long("peg")
                .action(ArgAction::SetTrue)
                .help("Print the parse tree and exit"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .action(ArgAction::SetTrue)
                .help("Pretty-print the program and exit"),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .action(ArgAction::SetTrue)
                .help("Print a structural dump of the AST and exit"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .value_name("FILE")
                .help("Output file ('-' for stdout)"),
        )
        .get_matches();

    let input = args.get_one::<String>("input").expect("required argument");
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read source file: {}", input))?;

    let mut diagnostics = Diagnostics::new(input.as_str());

    let tokens = match Lexer::new(&source).try_exhaustive() {
        Ok(tokens) => tokens,
        Err(errors) => {
            diagnostics.extend(errors.into_iter().map(Into::into));
            return fail(diagnostics);
        }
    };

    let root = match peg::parse(&tokens) {
        Ok(root) => root,
        Err(error) => {
            diagnostics.push(error.into());
            return fail(diagnostics);
        }
    };

    if args.get_flag("peg") {
        print!("{}", root);
        return Ok(());
    }

    let mut program = match tree::build(&root) {
        Ok(program) => program,
        Err(error) => {
            diagnostics.push(error.into());
            return fail(diagnostics);
        }
    };

    if args.get_flag("pretty") {
        print!("{}", pretty::pretty(&program));
        return Ok(());
    }

    if args.get_flag("ast") {
        println!("{:#?}", program);
        return Ok(());
    }

    diagnostics.extend(semantic::analyse(&program));
    if !diagnostics.is_empty() {
        return fail(diagnostics);
    }

    optimise::optimise(&mut program);

    // El renderizador corre en su propia tarea; el generador se
    // suspende cuando el canal se llena
    let output = args
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| "-".into());

    let (sender, receiver) = mpsc::sync_channel::<Instruction>(64);

    let renderer = thread::spawn(move || -> anyhow::Result<()> {
        let mut sink: Box<dyn Write> = match output.as_str() {
            "-" => Box::new(io::stdout().lock()),

            path => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to open for writing: {}", path))?;

                Box::new(BufWriter::new(file))
            }
        };

        for instruction in receiver {
            writeln!(sink, "{}", instruction)?;
        }

        sink.flush()?;
        Ok(())
    });

    let mut producer = sender;
    Generator::new(&program).emit(&mut producer);
    drop(producer);

    renderer
        .join()
        .map_err(|_| anyhow!("renderer task panicked"))??;

    Ok(())
}

/// Reporta los diagnósticos acumulados y termina el proceso.
fn fail(diagnostics: Diagnostics) -> anyhow::Result<()> {
    eprint!("{}", diagnostics);
    process::exit(diagnostics.exit_code())
}
