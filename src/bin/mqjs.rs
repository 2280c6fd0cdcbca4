//! mqjs - embedding walkthrough and shell
//!
//! Without arguments, runs through the embedding API: evaluation, bytecode,
//! big numbers, host functions and global enumeration. Trailing arguments are
//! joined and evaluated as one expression. `--repl` starts an interactive
//! shell instead.

use std::process::ExitCode;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use mquickjs_host::{Context, Error, EvalKind, EvalOptions, Result, Runtime, RuntimeOptions, Value};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Start an interactive shell
    #[arg(long)]
    repl: bool,

    /// Heap limit in bytes
    #[arg(long)]
    memory_limit: Option<usize>,

    /// Skip the walkthrough
    #[arg(long, short)]
    quiet: bool,

    /// Expression to evaluate after the walkthrough
    expr: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut options = RuntimeOptions::new();
    if let Some(limit) = cli.memory_limit {
        options = options.memory_limit(limit);
    }
    let rt = Runtime::with_options(&options);
    let ctx = rt.new_context();

    let outcome = if cli.repl {
        repl(&ctx)
    } else {
        run(&ctx, &cli)
    };
    ctx.free();
    rt.free();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &Error) {
    eprintln!("{}", e.cause());
    if !e.stack().is_empty() {
        eprint!("{}", e.stack());
    }
}

fn run(ctx: &Context, cli: &Cli) -> Result<()> {
    if !cli.quiet {
        walkthrough(ctx)?;
    }
    if cli.expr.is_empty() {
        return Ok(());
    }
    let result = ctx.eval(&cli.expr.join(" "), EvalKind::Global)?;
    if result.is_object() && !result.is_function() {
        println!("Object:");
        print_properties(&result)?;
    } else {
        println!("{}", result);
    }
    Ok(())
}

fn print_properties(obj: &Value) -> Result<()> {
    for name in obj.property_names()? {
        let value = obj.get_by_atom(name.atom)?;
        println!("'{}': {}", name.name, value);
    }
    Ok(())
}

fn walkthrough(ctx: &Context) -> Result<()> {
    let result = ctx.eval("`Hello world! 2 ** 8 = ${2 ** 8}.`", EvalKind::Global)?;
    println!("{}\n", result);

    let opts = EvalOptions::new().filename("<code>");
    let bytes = ctx.compile_with(
        "(function (global) { global.Deaf = function () { return 1; }; })(this)",
        &opts,
    )?;
    println!("compiled {} bytes of bytecode", bytes.len());
    let result = ctx.eval_binary(&bytes)?;
    println!("{}", result);
    println!("Deaf() = {}\n", ctx.eval("Deaf()", EvalKind::Global)?);

    let result = ctx.eval("1 + 2 * 100 - 3 + Math.sin(10)", EvalKind::Global)?;
    println!("{}\n", result.as_f64()?.trunc() as i64);

    let result = ctx.eval("128n ** 16n", EvalKind::Global)?;
    println!("{}\n", result.as_big_int()?);

    let result = ctx.eval("128l ** 12l", EvalKind::Global)?;
    println!("{}\n", result.as_big_decimal()?);

    let result = ctx.eval("false && true", EvalKind::Global)?;
    println!("{}\n", result.as_bool()?);

    let a = ctx.function("A", |ctx, _this, _args| {
        println!("A got called!");
        ctx.null()
    })?;
    let b = ctx.function("B", |ctx, _this, _args| {
        println!("B got called!");
        ctx.null()
    })?;
    ctx.set_global("A", a)?;
    ctx.set_global("B", b)?;
    ctx.eval(
        "for (let i = 0; i < 10; i++) { if (i % 2 === 0) A(); else B(); }",
        EvalKind::Global,
    )?;
    println!();

    ctx.eval("HELLO = 'world'; TEST = false;", EvalKind::Global)?;
    println!("Globals:");
    print_properties(&ctx.globals())?;
    println!();
    Ok(())
}

fn repl(ctx: &Context) -> Result<()> {
    println!("mqjs - type JavaScript to evaluate, Ctrl+D to exit\n");
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("cannot start line editor: {}", e);
            return Ok(());
        }
    };
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                let opts = EvalOptions::new().filename("<repl>");
                match ctx.eval_with(line, &opts) {
                    Ok(v) => println!("{}", v),
                    Err(e) => report(&e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("read error: {}", e);
                break;
            }
        }
    }
    Ok(())
}
