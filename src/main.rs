//! Schemetron CLI: flags, startup, and the top-level loop.

use std::process;

use tracing_subscriber::EnvFilter;

use schemetron::{repl, Interp};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const INIT_FILE: &str = "scheme.ini";

struct Options {
    silent: bool,
    compile_debug: bool,
    eval_debug: bool,
    gc_debug: bool,
    torture: bool,
}

fn print_usage() {
    println!("\nSchemetron - Version {}", VERSION);
    println!();
    println!("Command line options:");
    println!("\t-?\t\tDisplay command-line options and quit.");
    println!("\t-c\t\tCompiler debug ON - Dump compiler statistics.");
    println!("\t-e\t\tEval debug ON - Dump evaluation statistics.");
    println!("\t-g\t\tGC debug ON - Dump garbage-collection stats.");
    println!("\t-t\t\tTorture test ON - GC before every allocation.");
    println!("\t-s\t\tSilent Mode - Skip startup header.");
    println!();
}

fn parse_args() -> Options {
    let mut opts = Options {
        silent: false,
        compile_debug: false,
        eval_debug: false,
        gc_debug: false,
        torture: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-s" => opts.silent = true,
            "-c" => opts.compile_debug = true,
            "-e" => opts.eval_debug = true,
            "-g" => opts.gc_debug = true,
            "-t" => opts.torture = true,
            "-?" | "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                process::exit(1);
            }
        }
    }
    opts
}

fn init_tracing(opts: &Options) {
    let mut directives = vec!["warn".to_string()];
    if opts.eval_debug {
        directives.push("schemetron::eval=trace".to_string());
    }
    if opts.compile_debug {
        directives.push("schemetron::compile=debug".to_string());
    }
    if opts.gc_debug {
        directives.push("schemetron::gc=debug".to_string());
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives.join(",")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let opts = parse_args();
    init_tracing(&opts);

    if !opts.silent {
        println!("\nSchemetron - Version {}", VERSION);
        println!("A Scheme with an explicit-continuation stack machine\n");
    }

    let mut interp = match Interp::new() {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("Error: can't initialize interpreter: {}", e);
            process::exit(1);
        }
    };
    interp.heap.torture = opts.torture;
    interp.eval_debug = opts.eval_debug;
    interp.cp_debug = opts.compile_debug;
    interp.gc_debug = opts.gc_debug;

    // The initialization file is optional, but an error inside it is not
    // recoverable.
    match interp.load_file(INIT_FILE) {
        Ok(true) => {
            if let Err(e) = interp.eval() {
                eprintln!("Error in {}: {}", INIT_FILE, e);
                eprintln!("Can't recover.");
                process::exit(1);
            }
        }
        Ok(false) => {}
        Err(e) => {
            eprintln!("Error in {}: {}", INIT_FILE, e);
            eprintln!("Can't recover.");
            process::exit(1);
        }
    }

    repl::run(&mut interp);
}
