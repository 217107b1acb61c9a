//! Command-line front-end: compile one regular expression and print the
//! generated matcher source on stdout.

use std::process;

use anyhow::Context;
use clap::Parser;

use re2dfa::InputKind;

/// Transform regular expressions into finite state machines.
#[derive(Parser)]
#[command(
    name = "re2dfa",
    version,
    about,
    after_help = "EXAMPLE: re2dfa '^a+$' matchers.a_plus str"
)]
struct Args {
    /// Perl-flavoured regular expression to compile
    regexp: String,
    /// Where the generated matcher goes, as MODULE.FUNCTION
    target: String,
    /// Input type of the generated function: str or bytes
    kind: String,
}

fn run(args: &Args) -> anyhow::Result<String> {
    let (module, function) = args.target.rsplit_once('.').with_context(|| {
        format!(
            "target {:?} is not of the form MODULE.FUNCTION",
            args.target,
        )
    })?;
    let kind: InputKind = args.kind.parse()?;
    let source = re2dfa::compile(&args.regexp, module, function, kind)
        .with_context(|| format!("cannot compile {:?}", args.regexp))?;
    return Ok(source);
}

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // clap would exit with its own status; keep the contract of
            // exiting 1 on any invalid invocation
            let code = match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            process::exit(code);
        }
    };

    match run(&args) {
        Ok(source) => println!("{source}"),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}
