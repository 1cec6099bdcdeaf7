use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use helmflow::debug::{format_f64, format_polar_vec, format_rect_vec};
use helmflow::{Calculator, HelmOpt, PivotKind, PrecisionMode, PrintProgress, SolverKind, J};
use num_complex::Complex64;

/// Holomorphic embedding load flow.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load bus fed from the slack bus through one line
    #[clap(name = "pq")]
    PQ(PqArgs),

    /// Generator bus connected to the slack bus through one line
    #[clap(name = "pv")]
    PV(PvArgs),
}

#[derive(Args)]
struct LineArgs {
    /// Series resistance of the line (p.u.).
    #[arg(short, long, default_value_t = 0.01)]
    r: f64,

    /// Series reactance of the line (p.u.).
    #[arg(short, long, default_value_t = 0.1)]
    x: f64,

    /// Slack bus voltage magnitude (p.u.).
    #[arg(long, default_value_t = 1.0)]
    slack: f64,
}

#[derive(Args)]
struct PqArgs {
    #[command(flatten)]
    line: LineArgs,

    /// Real power consumed at the bus (p.u.).
    #[arg(short, long)]
    p: f64,

    /// Reactive power consumed at the bus (p.u.).
    #[arg(short, long, default_value_t = 0.0)]
    q: f64,

    #[command(flatten)]
    opt: OptArgs,
}

#[derive(Args)]
struct PvArgs {
    #[command(flatten)]
    line: LineArgs,

    /// Real power injected at the bus (p.u.).
    #[arg(short, long)]
    p: f64,

    /// Voltage magnitude set point (p.u.).
    #[arg(short, long, default_value_t = 1.0)]
    v: f64,

    #[command(flatten)]
    opt: OptArgs,
}

#[derive(Copy, Clone, ValueEnum)]
enum Solver {
    Lu,
    LuNatural,
    Bicgstab,
    Sor,
}

#[derive(Args)]
struct OptArgs {
    /// Arbitrary precision bits. Hardware floats are used if omitted.
    #[arg(long)]
    bits: Option<usize>,

    /// Number of power series coefficients.
    #[arg(short = 'n', long)]
    coefficients: Option<usize>,

    /// Total relative error reported as converged.
    #[arg(long)]
    target: Option<f64>,

    /// Linear solver.
    #[arg(long, value_enum, default_value_t = Solver::Lu)]
    solver: Solver,

    /// SOR relaxation factor.
    #[arg(long, default_value_t = 1.0)]
    omega: f64,

    /// Maximum number of SOR sweeps.
    #[arg(long, default_value_t = 10_000)]
    sweeps: usize,

    /// Build right-hand sides on a single thread.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Print the error of every coefficient step.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn helm_opt(args: &OptArgs) -> Result<HelmOpt> {
    let mut builder = HelmOpt::builder();
    if let Some(bits) = args.bits {
        builder.precision(PrecisionMode::Multi { bits });
    }
    if let Some(n) = args.coefficients {
        builder.max_coefficients(n);
    }
    if let Some(target) = args.target {
        builder.target_precision(target);
    }
    builder.solver(match args.solver {
        Solver::Lu => SolverKind::LU(PivotKind::BiggestElement),
        Solver::LuNatural => SolverKind::LU(PivotKind::Natural),
        Solver::Bicgstab => SolverKind::BiCGSTAB,
        Solver::Sor => SolverKind::SOR {
            omega: args.omega,
            max_iterations: args.sweeps,
        },
    });
    builder.parallel(!args.sequential);
    Ok(builder.build()?)
}

/// Single node behind a line to the slack bus, whose voltage enters as a
/// constant current injection.
fn feeder(line: &LineArgs, opt: HelmOpt, pq: usize, pv: usize) -> Result<Calculator> {
    let z = Complex64::new(line.r, line.x);
    if z.norm() == 0.0 {
        return Err(anyhow::format_err!("line impedance must not be zero"));
    }
    let y = 1.0 / z;

    let mut calc = Calculator::new(opt, 1, pq, pv)?;
    calc.set_admittance(0, 0, y)?;
    calc.set_constant_current(0, y * line.slack)?;
    Ok(calc)
}

fn execute(cli: &Cli) -> Result<()> {
    let (mut calc, opt_args) = match &cli.command {
        Commands::PQ(args) => {
            let mut calc = feeder(&args.line, helm_opt(&args.opt)?, 1, 0)?;
            calc.set_pq_bus(0, 0, -(args.p + J * args.q))?;
            (calc, &args.opt)
        }
        Commands::PV(args) => {
            let mut calc = feeder(&args.line, helm_opt(&args.opt)?, 0, 1)?;
            calc.set_pv_bus(0, 0, args.p, args.v)?;
            (calc, &args.opt)
        }
    };
    if opt_args.verbose {
        calc.set_monitor(Box::new(PrintProgress {}));
    }

    let error = calc.calculate()?;
    let v = calc.voltages()?;

    println!("V (polar) = {}", format_polar_vec(&v));
    println!("V (rect)  = {}", format_rect_vec(&v));
    println!("total relative error = {}", format_f64(error));
    println!(
        "coefficients = {}, progress = {}",
        calc.coefficient_count(),
        calc.progress().fraction
    );
    if !calc.converged() {
        return Err(anyhow::anyhow!(
            "the error is above the target of {:e}",
            calc.options().target_precision
        ));
    }

    Ok(())
}
