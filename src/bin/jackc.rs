use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::Parser;
use jack::{CompiledUnit, Compiler};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SOURCE_EXTENSION: &str = "jack";
const OUTPUT_EXTENSION: &str = "vm";

/// Translates Jack classes into VM code.
#[derive(Debug, Parser)]
#[command(name = "jackc", version)]
struct Cli {
    /// A `.jack` file, or a directory whose `.jack` files form one program.
    path: PathBuf,

    /// Where to write the `.vm` files. Defaults to next to each source.
    #[arg(long, conflicts_with = "stdout")]
    out_dir: Option<PathBuf>,

    /// Write the translated code to standard output instead of files.
    #[arg(long)]
    stdout: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let sources = collect_sources(&cli.path)?;
    if let Some(out_dir) = &cli.out_dir {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
    }

    let mut compiler = Compiler::new();
    for source in &sources {
        let src = fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?;
        let unit_name = source
            .file_name()
            .unwrap_or(source.as_os_str())
            .to_string_lossy();

        let unit = compiler.compile(&unit_name, &src)?;
        emit(&cli, source, &unit)?;
    }
    debug!(units = sources.len(), "done");
    Ok(())
}

/// Returns the single source file, or every source file directly inside the
/// directory, sorted by name.
fn collect_sources(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        if !is_source(path) {
            bail!("{} is not a .{SOURCE_EXTENSION} file", path.display());
        }
        return Ok(vec![path.to_owned()]);
    }

    let mut sources = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))?
    {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_source(&entry_path) {
            sources.push(entry_path);
        }
    }
    if sources.is_empty() {
        bail!("no .{SOURCE_EXTENSION} files in {}", path.display());
    }
    sources.sort();
    Ok(sources)
}

fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// The `.vm` file next to `source`, or with the same name inside `out_dir`.
fn output_path(source: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = source.with_extension(OUTPUT_EXTENSION);
    match out_dir {
        Some(dir) => dir.join(file_name.file_name().unwrap_or_default()),
        None => file_name,
    }
}

fn emit(cli: &Cli, source: &Path, unit: &CompiledUnit) -> anyhow::Result<()> {
    if cli.stdout {
        io::stdout().write_all(unit.as_str().as_bytes())?;
        return Ok(());
    }

    let out = output_path(source, cli.out_dir.as_deref());
    fs::write(&out, unit.as_str())
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(class = unit.class_name(), path = %out.display(), "wrote unit");
    Ok(())
}
