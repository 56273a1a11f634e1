//
// main.rs
//
// kestrel binary entry point
//

use std::env;

fn print_usage() {
    println!(
        "kestrel {}, a file and symbol search server for R projects.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: kestrel [OPTIONS]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Logging is controlled with RUST_LOG (e.g. RUST_LOG=kestrel=trace).

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    for arg in argv {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("kestrel {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    kestrel::backend::start_lsp().await
}
