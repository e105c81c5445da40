use anyhow::Context;
use clap::{value_t, App, Arg, ArgMatches, ErrorKind};
use classy::callable::standard_library;
use classy::scanner::scan_tokens;
use classy::{Error, Interpreter, InterpreterConfig, ScanLimits, Value};
use std::fs;
use std::io::{self, Read};
use std::process;

struct Options {
    script: Option<String>,
    limits: ScanLimits,
    config: InterpreterConfig,
    dump_tokens: bool,
    dump_ast: bool,
}

fn main() {
    env_logger::init();
    let options = match options() {
        Ok(options) => options,
        Err(err) => match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => err.exit(),
            _ => {
                eprintln!("{}", err);
                process::exit(64);
            }
        },
    };
    if let Err(err) = run(&options) {
        eprintln!("{:#}", err);
        process::exit(exit_code(&err));
    }
}

fn options() -> Result<Options, clap::Error> {
    let matches = App::new("classy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs programs written in a small class-based language")
        .arg(
            Arg::with_name("SCRIPT")
                .help("Program to run, read from stdin when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("ident-length")
                .long("ident-length")
                .value_name("N")
                .takes_value(true)
                .help("Longest identifier accepted by the scanner"),
        )
        .arg(
            Arg::with_name("string-length")
                .long("string-length")
                .value_name("N")
                .takes_value(true)
                .help("Longest string literal accepted by the scanner"),
        )
        .arg(
            Arg::with_name("max-depth")
                .long("max-depth")
                .value_name("N")
                .takes_value(true)
                .help("Deepest nesting of calls and object constructions"),
        )
        .arg(
            Arg::with_name("tokens")
                .long("tokens")
                .help("Print the token stream and exit"),
        )
        .arg(
            Arg::with_name("ast")
                .long("ast")
                .conflicts_with("tokens")
                .help("Print the parsed program and exit"),
        )
        .get_matches_safe()?;

    let limits = ScanLimits::default();
    let config = InterpreterConfig::default();
    Ok(Options {
        script: matches.value_of("SCRIPT").map(String::from),
        limits: ScanLimits {
            max_identifier_length: number(&matches, "ident-length", limits.max_identifier_length)?,
            max_string_length: number(&matches, "string-length", limits.max_string_length)?,
        },
        config: InterpreterConfig {
            max_call_depth: number(&matches, "max-depth", config.max_call_depth)?,
        },
        dump_tokens: matches.is_present("tokens"),
        dump_ast: matches.is_present("ast"),
    })
}

fn number(matches: &ArgMatches, name: &str, default: usize) -> Result<usize, clap::Error> {
    if matches.is_present(name) {
        value_t!(matches, name, usize)
    } else {
        Ok(default)
    }
}

fn run(options: &Options) -> anyhow::Result<()> {
    let source = read_source(options.script.as_deref())?;
    if options.dump_tokens {
        let tokens = scan_tokens(&source, options.limits).map_err(Error::from)?;
        for token in tokens {
            println!("{:>7} {:?}", token.start.to_string(), token.tokentype);
        }
        return Ok(());
    }

    let program = classy::parse_source(&source, options.limits)?;
    if options.dump_ast {
        println!("{:#?}", program);
        return Ok(());
    }

    let result = Interpreter::with_config(&program, standard_library(), options.config)
        .run()
        .map_err(Error::from)?;
    match result {
        Value::Void => (),
        value => println!("Returned {}.", value),
    }
    Ok(())
}

fn read_source(script: Option<&str>) -> anyhow::Result<String> {
    match script {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("could not read '{}'", path))
        }
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("could not read stdin")?;
            Ok(source)
        }
    }
}

// Exit codes follow sysexits: 65 for bad input, 66 for unreadable input and
// 70 for failures while running.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::Runtime(_)) => 70,
        Some(_) => 65,
        None => 66,
    }
}
