use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use gdxgraph::config::ChartConfig;
use gdxgraph::container::SymbolKind;
use gdxgraph::graph::render_figure;
use gdxgraph::{describe_container, verify, Dimension, Figure, MemoryContainer, RecordTable, Selection};

#[derive(Parser, Debug)]
#[command(name = "gdxgraph")]
#[command(about = "Compare scenario results across years as stacked bar, line, area or bar charts", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a chart described in JSON over CSV scenario tables
    Plot {
        /// Chart description (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output image; written to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a selection exists in every container before plotting
    Verify {
        /// Container snapshot (JSON); repeat for several scenarios
        #[arg(long = "container", required = true)]
        containers: Vec<PathBuf>,

        /// Symbol to look up in each container
        #[arg(long)]
        name: String,

        #[arg(long)]
        x_var: String,

        #[arg(long)]
        y_var: String,

        #[arg(long, num_args = 1.., required = true)]
        years: Vec<String>,

        #[arg(long, num_args = 1.., required = true)]
        data: Vec<String>,

        #[arg(long, requires = "z_values")]
        z_var: Option<String>,

        #[arg(long, num_args = 1.., requires = "z_var")]
        z_values: Vec<String>,
    },

    /// List the aliases, equations, parameters, sets and variables of a container
    Describe {
        #[arg(long)]
        container: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Plot { config, output } => plot(config, output),
        Command::Verify { containers, name, x_var, y_var, years, data, z_var, z_values } => {
            let sources = containers
                .iter()
                .map(|path| MemoryContainer::load(path))
                .collect::<Result<Vec<_>>>()?;
            let selection = Selection {
                name,
                x_var,
                y_var,
                years,
                data,
                z: z_var.map(|column| Dimension { column, values: z_values }),
            };
            match verify(&sources, &selection) {
                Ok(tables) => {
                    for (path, table) in containers.iter().zip(&tables) {
                        println!("{}: '{}' has {} records", path.display(), selection.name, table.len());
                    }
                    Ok(())
                }
                Err(diagnostic) => {
                    eprintln!("{}", diagnostic);
                    std::process::exit(1);
                }
            }
        }
        Command::Describe { container } => describe(container),
    }
}

fn plot(config: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = ChartConfig::load(&config)?;
    let scenarios = config.load_scenarios()?;

    let mut fig = Figure::new();
    let wide = config.draw(&mut fig, &scenarios).context("Failed to build chart")?;
    log::info!("drew {} rows x {} series", wide.row_count(), wide.columns.len());

    let bytes = render_figure(&fig, &config.render).context("Failed to render chart")?;
    match output {
        Some(path) => fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&bytes).context("Failed to write image to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

fn describe(path: PathBuf) -> Result<()> {
    let container = MemoryContainer::load(&path)?;
    let (tables, names) = describe_container(&container);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (kind, table) in SymbolKind::ALL.iter().zip(&tables) {
        writeln!(out, "# {}", kind.plural())?;
        write_table(&mut out, table)?;
        writeln!(out)?;
    }

    writeln!(out, "# names")?;
    let mut names: Vec<_> = names.into_iter().collect();
    names.sort();
    for (name, description) in names {
        writeln!(out, "{}: {}", name, description)?;
    }
    Ok(())
}

fn write_table<W: Write>(out: &mut W, table: &RecordTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&table.headers).context("Failed to write table header")?;
    for row in &table.rows {
        writer.write_record(row).context("Failed to write table row")?;
    }
    writer.flush().context("Failed to flush table")?;
    Ok(())
}
