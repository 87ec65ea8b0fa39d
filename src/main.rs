use clap::{Parser, Subcommand};
use gbf::{CompressionMode, GbfValue, NumericArray, ReadOptions, WriteOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gbf-cli", version = "1.0.0", about = "The GBF container format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the file's header as formatted JSON
    Header {
        input: PathBuf,
    },
    /// Print the variable tree (paths, kinds, shapes) without reading payload bytes
    Tree {
        input: PathBuf,
    },
    /// Print one variable's value
    Show {
        input: PathBuf,
        var_path: String,
        /// Skip per-field CRC validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Pack a single scalar double value into a new .gbf file (smoke-test helper)
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Dot-separated variable name for the scalar
        #[arg(short, long, default_value = "x")]
        name: String,
        value: f64,
        /// Compression: auto (default), always, never
        #[arg(short, long, default_value = "auto")]
        compression: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        // ── Header ───────────────────────────────────────────────────────────
        Commands::Header { input } => {
            let header = gbf::read_header_only(&input)?;
            println!("{}", header.to_json());
        }

        // ── Tree ─────────────────────────────────────────────────────────────
        Commands::Tree { input } => {
            let header = gbf::read_header_only(&input)?;
            println!("{}", input.display());
            for field in &header.fields {
                let shape = format!("{:?}", field.shape);
                println!(
                    "  {:<32} {:<10} {:<8} shape={:<14} compression={}",
                    field.path, field.kind, field.class, shape, field.compression
                );
            }
        }

        // ── Show ─────────────────────────────────────────────────────────────
        Commands::Show { input, var_path, no_validate } => {
            let opts = ReadOptions { validate: !no_validate };
            let value = gbf::read_var(&input, &var_path, opts)?;
            print_value(&var_path, &value, 0);
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, name, value, compression } => {
            let mode = match compression.as_str() {
                "auto" => CompressionMode::Auto,
                "always" => CompressionMode::Always,
                "never" => CompressionMode::Never,
                other => {
                    eprintln!("Unknown compression mode '{other}', defaulting to auto");
                    CompressionMode::Auto
                }
            };
            let root = GbfValue::Struct(gbf::StructValue {
                fields: vec![(name.clone(), GbfValue::Numeric(NumericArray::scalar(value)))],
            });
            let opts = WriteOptions { compression_mode: mode, ..WriteOptions::default() };
            gbf::write_file(&output, &root, opts)?;
            let size = std::fs::metadata(&output)?.len();
            println!("Created: {} ({} B on disk)", output.display(), size);
        }
    }

    Ok(())
}

fn print_value(path: &str, value: &GbfValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        GbfValue::Struct(s) => {
            println!("{indent}{path} (struct)");
            for (name, child) in &s.fields {
                print_value(name, child, depth + 1);
            }
        }
        GbfValue::EmptyStruct => println!("{indent}{path} (struct, empty)"),
        GbfValue::Numeric(n) => println!("{indent}{path} (numeric/{}, shape={:?})", n.class.name(), n.shape),
        GbfValue::Logical(l) => println!("{indent}{path} (logical, shape={:?})", l.shape),
        GbfValue::String(s) => println!("{indent}{path} (string, shape={:?})", s.shape),
        GbfValue::Char(c) => println!("{indent}{path} (char) = {:?}", c.to_string_lossy()),
        GbfValue::Datetime(d) => println!("{indent}{path} (datetime, shape={:?})", d.shape),
        GbfValue::Duration(d) => println!("{indent}{path} (duration, shape={:?})", d.shape),
        GbfValue::CalendarDuration(d) => println!("{indent}{path} (calendarDuration, shape={:?})", d.shape),
        GbfValue::Categorical(c) => println!("{indent}{path} (categorical, shape={:?})", c.shape),
        GbfValue::Opaque(o) => println!("{indent}{path} (opaque/{}, shape={:?})", o.class_name, o.shape),
    }
}
