use std::path::PathBuf;

use clap::Parser;

/// Writes the generated OpenAPI document to disk.
#[derive(Parser)]
#[command(name = "dump_openapi")]
struct Args {
    /// Output path
    #[arg(long, default_value = "openapi.json")]
    out: PathBuf,

    /// Port used for the `servers` entry
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = virtue_authz::docs::build_openapi(args.port)?;
    std::fs::write(&args.out, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {}", args.out.display());
    Ok(())
}
