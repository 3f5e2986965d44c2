use clap::{Parser, Subcommand};
use derive_more::Display;
use log::info;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use perishable_irp::generator::InstanceGenerator;
use perishable_irp::{IrpModel, MilpSolver, Parameters, Solution, SolutionReporter};

#[derive(Debug, Parser)]
#[clap(author, version, about = "Perishable inventory routing with chance-constrained demand")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a random instance as JSON
    Generate {
        #[clap(long, default_value_t = 6)]
        nodes: usize,
        #[clap(long, default_value_t = 2)]
        vehicles: usize,
        #[clap(long, default_value_t = 3)]
        periods: usize,
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// Output file, stdout if omitted
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Build the model of an instance and write it in CPLEX LP format
    Export {
        instance: PathBuf,
        #[clap(long, short)]
        output: PathBuf,
    },
    /// Build and solve the model of an instance and print the report as JSON
    Solve {
        instance: PathBuf,
        #[clap(long, default_value = "microlp")]
        solver: Backend,
        /// Time limit in seconds. Only the gurobi backend honours it; microlp always solves to
        /// optimality
        #[clap(long)]
        time_limit: Option<f64>,
        /// The period whose per-customer costs are reported
        #[clap(long, default_value_t = 1)]
        period: usize,
    },
}

#[derive(Debug, Display, Clone, Copy)]
enum Backend {
    #[display(fmt = "microlp")]
    MicroLp,
    #[display(fmt = "gurobi")]
    Gurobi,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "microlp" => Ok(Backend::MicroLp),
            "gurobi" => Ok(Backend::Gurobi),
            other => Err(format!("unknown solver {}, expected microlp or gurobi", other)),
        }
    }
}

impl Backend {
    fn solve(&self, model: &IrpModel, time_limit: Option<Duration>) -> Result<Solution, Box<dyn Error>> {
        match self {
            #[cfg(feature = "microlp")]
            Backend::MicroLp => Ok(perishable_irp::solvers::microlp::MicroLp.solve(model, time_limit)?),
            #[cfg(feature = "gurobi")]
            Backend::Gurobi => Ok(perishable_irp::solvers::gurobi::Gurobi::default().solve(model, time_limit)?),
            #[allow(unreachable_patterns)]
            other => Err(format!("this build does not include the {} solver", other).into()),
        }
    }
}

fn read_parameters(path: &Path) -> Result<Parameters, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(Parameters::from_reader(reader)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Generate {
            nodes,
            vehicles,
            periods,
            seed,
            output,
        } => {
            let generator = InstanceGenerator {
                nodes,
                vehicles,
                periods,
                seed,
                ..Default::default()
            };
            // validate before writing
            let parameters = generator.generate()?;
            match output {
                Some(path) => serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), parameters.file())?,
                None => println!("{}", serde_json::to_string_pretty(parameters.file())?),
            }
        }
        Command::Export { instance, output } => {
            let model = IrpModel::build(&read_parameters(&instance)?)?;
            model.write(&output)?;
            info!("Wrote {} to {}", model.name(), output.display());
        }
        Command::Solve {
            instance,
            solver,
            time_limit,
            period,
        } => {
            let model = IrpModel::build(&read_parameters(&instance)?)?;
            let time_limit = time_limit.map(Duration::try_from_secs_f64).transpose()?;
            let solution = solver.solve(&model, time_limit)?;
            solution.check()?;

            let report = SolutionReporter::new(&model, &solution)?.report(period)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
