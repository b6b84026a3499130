// cppscan: dump the declarations found in C++ files

use std::process::ExitCode;

use cppscan::parser::Node;
use cppscan::{parse_files, BuildOptions, FileSystem};
use tracing_subscriber::EnvFilter;

fn print_nodes(nodes: &[Node], depth: usize) {
    for node in nodes {
        println!("{:indent$}{}", "", node, indent = depth * 2);
        if let Node::Class(class) = node {
            if let Some(body) = class.body() {
                print_nodes(body, depth + 1);
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("cppscan");

    let mut quiet = false;
    let mut paths = Vec::new();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--quiet" | "-q" => quiet = true,
            "--help" | "-h" => {
                println!("Usage: {} [--quiet] FILE...", program_name);
                println!("  --quiet  only report files that fail to parse");
                return ExitCode::SUCCESS;
            }
            _ => paths.push(arg.as_str()),
        }
    }

    if paths.is_empty() {
        eprintln!("Error: No input file provided");
        eprintln!();
        eprintln!("Usage: {} [--quiet] FILE...", program_name);
        return ExitCode::FAILURE;
    }

    // failures are reported below, not through the log
    let options = BuildOptions::new().with_quiet(true);
    let mut failed = false;
    for parsed in parse_files(&paths, &FileSystem, &options) {
        match parsed.result {
            Ok(_) if quiet => {}
            Ok(nodes) => {
                println!("{}:", parsed.path.display());
                print_nodes(&nodes, 1);
            }
            Err(e) => {
                eprintln!("{}", e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
