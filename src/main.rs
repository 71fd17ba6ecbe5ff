use std::fs::File;
use std::io::{self, BufReader};

use anyhow::Context as _;
use clap::{crate_version, App, Arg, ArgMatches};
use inkwell::context::Context;
use log::LevelFilter;

use klang::driver::{Driver, Options};
use klang::lexer::{Lexer, ReadChars};

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_env("KLANG_LOG");
    builder.init();
}

fn options(matches: &ArgMatches) -> Options {
    Options {
        evaluate: !matches.is_present("no-eval"),
        emit_ast: matches.is_present("emit-ast"),
        print_ir: !matches.is_present("quiet"),
        dump_module: matches.is_present("dump-module"),
        prompt: !matches.is_present("input"),
    }
}

fn main() -> anyhow::Result<()> {
    let matches = App::new("klang")
        .version(crate_version!())
        .about("reads klang units, lowers them to LLVM and runs top-level expressions")
        .arg(
            Arg::with_name("input")
                .help("source file, standard input when absent")
                .index(1),
        )
        .arg(
            Arg::with_name("no-eval")
                .long("no-eval")
                .help("print top-level expressions without evaluating them"),
        )
        .arg(
            Arg::with_name("emit-ast")
                .long("emit-ast")
                .help("print every parsed unit as an s-expression"),
        )
        .arg(
            Arg::with_name("dump-module")
                .long("dump-module")
                .help("print the whole module at end of input"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("do not print the lowered form of each unit"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("raise log verbosity, repeatable"),
        )
        .get_matches();

    init_logging(matches.occurrences_of("verbose"));
    let context = Context::create();
    let mut driver = Driver::new(&context, options(&matches));

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let summary = match matches.value_of("input") {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {}", path))?;
            let mut lexer = Lexer::new(ReadChars::new(BufReader::new(file)));
            driver.run(&mut lexer, &mut out, &mut err)?
        }
        None => {
            let stdin = io::stdin();
            let mut lexer = Lexer::new(ReadChars::new(stdin.lock()));
            driver.run(&mut lexer, &mut out, &mut err)?
        }
    };

    if summary.failures > 0 {
        log::warn!("{} of {} units failed", summary.failures, summary.units);
    }

    Ok(())
}
