use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shim_core::{DType, Device, Result, Shape, ShimError, Tensor};
use shim_ops::{PadDispatch, PadMode, PadOptions, PadWidth, ReflectType, check_pad};
use shim_torch::nn::functional as F;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shim")]
#[command(about = "Development CLI for the numpy/torch frontend")]
struct Args {
    /// Log dispatch decisions (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a quick smoke test of the frontend.
    Smoke,
    /// Report whether a pad request takes the native kernel.
    PadCheck {
        /// Input shape, e.g. `2,3`.
        shape: String,
        /// Widths as `before:after` per axis, e.g. `1:1,0:2`, or one integer.
        widths: String,
        #[arg(long, default_value = "constant")]
        mode: PadMode,
        /// Use odd reflection for `reflect`/`symmetric`.
        #[arg(long)]
        odd: bool,
    },
    /// Broadcast shapes together, e.g. `2,1 3`.
    Broadcast {
        #[arg(required = true)]
        shapes: Vec<String>,
    },
}

fn parse_dims(s: &str) -> std::result::Result<Vec<i64>, String> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|d| d.trim().parse::<i64>().map_err(|e| format!("bad dim '{d}': {e}")))
        .collect()
}

fn parse_widths(s: &str) -> std::result::Result<PadWidth, String> {
    if !s.contains(':') {
        return s
            .trim()
            .parse::<usize>()
            .map(PadWidth::Uniform)
            .map_err(|e| format!("bad width '{s}': {e}"));
    }
    s.split(',')
        .map(|pair| {
            let (before, after) = pair
                .split_once(':')
                .ok_or_else(|| format!("expected before:after, got '{pair}'"))?;
            let before = before.trim().parse::<usize>().map_err(|e| e.to_string())?;
            let after = after.trim().parse::<usize>().map_err(|e| e.to_string())?;
            Ok((before, after))
        })
        .collect::<std::result::Result<Vec<_>, String>>()
        .map(PadWidth::PerAxis)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let outcome = match args.cmd {
        Cmd::Smoke => smoke(),
        Cmd::PadCheck {
            shape,
            widths,
            mode,
            odd,
        } => pad_check(&shape, &widths, mode, odd),
        Cmd::Broadcast { shapes } => broadcast(&shapes),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn smoke() -> Result<()> {
    let dev = Device::default();
    println!("Device: {dev:?}");
    println!("Backend: lazy graph + CPU reference\n");

    let x = Tensor::from_f32(&[1.0, 2.0, 3.0], &Shape::new(vec![3]), &dev)?;

    let padded = shim_torch::pad(&x, vec![(2, 2)], &PadOptions::new(PadMode::Reflect))?;
    println!("pad reflect [1,2,3] (2,2) = {:?}", padded.to_vec_f32()?);

    let ramp = shim_torch::pad(
        &x,
        vec![(2, 1)],
        &PadOptions::new(PadMode::LinearRamp).end_values(0.0),
    )?;
    println!("pad linear_ramp [1,2,3] (2,1) = {:?}", ramp.to_vec_f32()?);

    let idx = Tensor::from_data_on(
        &x.stream(),
        vec![-1.0, 0.0, 5.0],
        &Shape::new(vec![3]),
        DType::I64,
    )?;
    let gathered = shim_torch::take_along_axis(&x, &idx, 0, "fill")?;
    println!("take_along_axis fill [-1,0,5] = {:?}", gathered.to_vec_f32()?);

    let m = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &Shape::new(vec![2, 2]), &dev)?;
    println!(
        "rot90 [[1,2],[3,4]] = {:?}",
        shim_torch::rot90(&m, 1, (0, 1))?.to_vec_f32()?
    );

    let top = shim_torch::top_k(&x, 2, 0, true)?;
    println!(
        "top_k 2 of [1,2,3] = {:?} at {:?}",
        top.values.to_vec_f32()?,
        top.indices.to_vec_f32()?
    );

    println!("gelu [1,2,3] = {:?}", F::gelu(&x, "tanh")?.to_vec_f32()?);
    println!("mish [1,2,3] = {:?}", F::mish(&x).to_vec_f32()?);

    println!("\nAll smoke tests passed.");
    Ok(())
}

fn pad_check(shape: &str, widths: &str, mode: PadMode, odd: bool) -> Result<()> {
    let shape = parse_dims(shape).map_err(ShimError::InvalidArgument)?;
    let pad_width = parse_widths(widths).map_err(ShimError::InvalidArgument)?;
    let mut options = PadOptions::new(mode);
    if odd {
        options = options.reflect_type(ReflectType::Odd);
    }
    match check_pad(&Shape::new(shape), &pad_width, &options)? {
        PadDispatch::FastPath(native) => {
            println!(
                "fast path: {:?} widths={:?} value={}",
                native.mode, native.widths, native.value
            );
        }
        PadDispatch::Fallback(reason) => println!("fallback: {reason}"),
    }
    Ok(())
}

fn broadcast(shapes: &[String]) -> Result<()> {
    let shapes = shapes
        .iter()
        .map(|s| parse_dims(s))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ShimError::InvalidArgument)?;
    let views: Vec<&[i64]> = shapes.iter().map(Vec::as_slice).collect();
    let out = shim_torch::broadcast_shapes(&views)?;
    println!("{out:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_widths() {
        assert_eq!(parse_widths("2").unwrap(), PadWidth::Uniform(2));
        assert_eq!(
            parse_widths("1:1, 0:2").unwrap(),
            PadWidth::PerAxis(vec![(1, 1), (0, 2)])
        );
        assert!(parse_widths("1-2").is_err());
    }

    #[test]
    fn test_parse_dims() {
        assert_eq!(parse_dims("2,3").unwrap(), vec![2, 3]);
        assert_eq!(parse_dims("").unwrap(), Vec::<i64>::new());
        assert!(parse_dims("2,x").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "shim", "-v", "pad-check", "2,3", "1:1,0:2", "--mode", "reflect",
        ])
        .unwrap();
        assert!(args.verbose);
        assert!(matches!(args.cmd, Cmd::PadCheck { mode: PadMode::Reflect, .. }));

        let args = Args::try_parse_from(["shim", "broadcast", "2,1", "3"]).unwrap();
        match args.cmd {
            Cmd::Broadcast { shapes } => assert_eq!(shapes, vec!["2,1", "3"]),
            _ => panic!("expected broadcast"),
        }
    }
}
