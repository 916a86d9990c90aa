use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tdmc::device::DeviceSpec;
use tdmc::engine::{Engine, VacuumSampler};
use tdmc::tdm::{RunOptions, TdmProgram};
use tdmc::{compile, Compiler};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Layout,
    Limits,
    Fingerprint,
    Compiled,
    Samples,
}

#[derive(Parser, Debug)]
#[command(
    name = "tdmc",
    version,
    about = "Time-domain multiplexing compiler — validates and compiles programs against photonic device records"
)]
struct Cli {
    /// Device record (JSON)
    #[arg(long)]
    device: PathBuf,

    /// Device name used in diagnostics (defaults to the file stem)
    #[arg(long)]
    name: Option<String>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Compiled)]
    emit: EmitStage,

    /// Bind a layout parameter: NAME=v1,v2,... (repeatable)
    #[arg(long = "bind", value_parser = parse_binding)]
    bindings: Vec<(String, Vec<f64>)>,

    /// Concurrent modes per spatial channel (defaults to the device limits)
    #[arg(long, value_delimiter = ',')]
    concurrent: Vec<usize>,

    /// Shots for --emit samples
    #[arg(long)]
    shots: Option<usize>,

    /// Keep only timebins every channel measured (for --emit samples)
    #[arg(long)]
    crop: bool,

    /// RNG seed for --emit samples
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn parse_binding(s: &str) -> Result<(String, Vec<f64>), String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=v1,v2,..., got '{}'", s))?;
    let values = values
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("'{}': {}", v, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name.trim().to_string(), values))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn fail(err: tdmc::Error) -> ! {
    eprintln!("tdmc: {}", err.to_diagnostic());
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    // ── Load device record ──
    let text = match std::fs::read_to_string(&cli.device) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tdmc: error: {}: {}", cli.device.display(), e);
            std::process::exit(2);
        }
    };
    let name = cli.name.clone().unwrap_or_else(|| {
        cli.device
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "device".to_string())
    });
    let device = DeviceSpec::from_json(name, &text).unwrap_or_else(|e| fail(e.into()));
    debug!(device = device.name(), "device loaded");

    match cli.emit {
        EmitStage::Layout => print!("{}", device.layout()),
        EmitStage::Limits => {
            let modes = device.modes();
            println!("concurrent   = {}", modes.concurrent);
            println!("spatial      = {}", modes.spatial);
            println!("temporal_max = {}", modes.temporal_max);
            println!("compiler     = {}", device.compiler_targets().join(", "));
            for (gate, allowed) in device.gate_parameters() {
                println!("{} = {}", gate, allowed);
            }
        }
        EmitStage::Fingerprint => println!("{}", device.fingerprint()),
        EmitStage::Compiled | EmitStage::Samples => {
            // ── Instantiate the layout ──
            let concurrent = if cli.concurrent.is_empty() {
                let modes = device.modes();
                vec![modes.concurrent; modes.spatial]
            } else {
                cli.concurrent.clone()
            };
            let values: BTreeMap<String, Vec<f64>> = cli.bindings.iter().cloned().collect();
            let prog = TdmProgram::from_layout(device.layout(), concurrent, &values)
                .unwrap_or_else(|e| fail(e));
            let compiled =
                compile(&prog, Compiler::Tdm, Some(&device)).unwrap_or_else(|e| fail(e));

            if let EmitStage::Compiled = cli.emit {
                print!("{}", compiled);
                return;
            }

            // ── Run ──
            let prog = prog.with_run_options(RunOptions {
                shots: cli.shots,
                crop: cli.crop,
            });
            let engine = Engine::new(VacuumSampler::default());
            let mut rng = StdRng::seed_from_u64(cli.seed);
            let result = engine
                .run(&prog, None, &mut rng)
                .unwrap_or_else(|e| fail(e));
            for (i, shot) in result.samples.outer_iter().enumerate() {
                for (s, channel) in shot.outer_iter().enumerate() {
                    let row: Vec<String> = channel.iter().map(|v| format!("{:.6}", v)).collect();
                    println!("shot {} channel {}: {}", i, s, row.join(" "));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_parses_name_and_values() {
        assert_eq!(
            parse_binding("p0=0.5, 1,2").unwrap(),
            ("p0".to_string(), vec![0.5, 1.0, 2.0])
        );
        assert!(parse_binding("p0").is_err());
        assert!(parse_binding("p0=a").is_err());
    }

    #[test]
    fn cli_accepts_repeated_bindings() {
        let cli = Cli::try_parse_from([
            "tdmc",
            "--device",
            "td2.json",
            "--bind",
            "p1=1,1",
            "--bind",
            "p2=2,2",
            "--concurrent",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.bindings.len(), 2);
        assert_eq!(cli.concurrent, vec![2]);
        assert!(matches!(cli.emit, EmitStage::Compiled));
    }
}
