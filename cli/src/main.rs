mod test_runner;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process;

use clap::{Parser as _, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mexdown::{ParseError, Parser};

#[derive(clap::Parser)]
#[command(name = "mexdown", version, about = "mexdown document parser")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a document and report any errors
    Check(InputArgs),

    /// Dump the parsed document
    Ast(AstArgs),

    /// List citation labels and their sources
    Citations(InputArgs),

    /// Run .test.mx fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct InputArgs {
    /// Source file to read; standard input when omitted or `-`
    file: Option<String>,
}

#[derive(clap::Args)]
struct AstArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Print the document as JSON instead of an outline
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.mx file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mexdown=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Ast(args) => do_ast(args, cli.no_color),
        Command::Citations(args) => do_citations(args),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// A source loaded into the codespan file database.
struct Input {
    name: String,
    files: SimpleFiles<String, String>,
    parser: Parser,
}

fn load(args: &InputArgs) -> Input {
    let (name, reader): (String, Box<dyn Read>) = match args.file.as_deref() {
        None | Some("-") => ("<stdin>".to_string(), Box::new(io::stdin())),
        Some(path) => match File::open(path) {
            Ok(file) => (path.to_string(), Box::new(file)),
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", path, e);
                process::exit(1);
            }
        },
    };

    let decoded = match Parser::from_reader(reader, 0) {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", name, e);
            process::exit(1);
        }
    };

    let source = decoded.source().to_string();
    debug!(input = %name, bytes = source.len(), "loaded source");
    let mut files = SimpleFiles::new();
    let file_id = files.add(name.clone(), source.clone());
    Input {
        name,
        files,
        parser: Parser::new(source, file_id),
    }
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn emit_errors(files: &SimpleFiles<String, String>, errors: &[ParseError], no_color: bool) {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}

fn do_check(args: InputArgs, no_color: bool) {
    let input = load(&args);
    match input.parser.parse() {
        Ok(_) => eprintln!("ok: {} parsed successfully", input.name),
        Err(failure) => {
            emit_errors(&input.files, &failure.errors, no_color);
            process::exit(1);
        }
    }
}

fn do_ast(args: AstArgs, no_color: bool) {
    let input = load(&args.input);
    let parsed = input.parser.parse_lenient();

    if args.json {
        match serde_json::to_string_pretty(&parsed.document) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: cannot serialize document: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", parsed.document);
    }

    if parsed.has_errors() {
        emit_errors(&input.files, &parsed.errors, no_color);
        process::exit(1);
    }
}

fn do_citations(args: InputArgs) {
    let input = load(&args);
    let parsed = input.parser.parse_lenient();
    for (label, source) in &parsed.document.citations {
        println!("{}: {}", label, source.trim());
    }
}
