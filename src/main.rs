use std::env;
use std::process::ExitCode;

use mdict_query::{Dictionary, Mdx};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: mdict-query <file.mdx> <word>...");
        return ExitCode::FAILURE;
    };

    let dict = match Dictionary::<Mdx>::open(&path) {
        Ok(dict) => dict,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };
    eprintln!("{}: {} entries", dict.title(), dict.num_entries());

    let mut status = ExitCode::SUCCESS;
    for word in args {
        match dict.lookup(&word) {
            Ok(definitions) => {
                for definition in definitions {
                    println!("{}", definition);
                }
            }
            Err(e) => {
                eprintln!("{}: {}", word, e);
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}
