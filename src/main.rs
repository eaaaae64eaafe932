//! ov64a40-sensor binary: runs a board description through the simulated sensor.
//!
//! Usage: `ov64a40-sensor <board.json> [width height]`

use std::env;

use ov64a40_sensor::mock::{MockPower, SimulatedBus};
use ov64a40_sensor::traits::Result;
use ov64a40_sensor::{
    settle_delay, BoardConfig, ControlId, Format, FormatWhich, FourCC, RegOp, Sensor, SensorError,
    SensorHandle,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn parse_dimension(arg: Option<String>, default: u32) -> Result<u32> {
    arg.map_or(Ok(default), |arg| {
        arg.parse()
            .map_err(|_| SensorError::InvalidArgument(format!("invalid dimension: {arg}")))
    })
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or_else(|| {
        SensorError::InvalidArgument("usage: ov64a40-sensor <board.json> [width height]".to_owned())
    })?;
    let width = parse_dimension(args.next(), 1920)?;
    let height = parse_dimension(args.next(), 1080)?;

    let board = BoardConfig::load(&path)?;
    let sensor = Sensor::probe(SimulatedBus::new(), MockPower::new(), &board)?;
    let handle = SensorHandle::new(sensor);

    let format = handle.set_format(
        FormatWhich::Active,
        &Format::new(width, height, FourCC::SBGGR10),
    )?;
    println!(
        "Format: {}x{} {} (stride {}, {} bytes)",
        format.width, format.height, format.fourcc, format.stride, format.size
    );

    let controls =
        handle.with(|sensor| Ok(sensor.controls().iter().cloned().collect::<Vec<_>>()))?;
    for ctrl in &controls {
        let flags = match (ctrl.read_only, ctrl.modifies_layout) {
            (true, _) => " (read-only)",
            (false, true) => " (changes pixel format)",
            (false, false) => "",
        };
        println!(
            "{}: {} [{}..{}] default {}{flags}",
            ctrl.id, ctrl.value, ctrl.minimum, ctrl.maximum, ctrl.default
        );
    }

    handle.with(|sensor| {
        sensor.bus_mut().clear_log();
        Ok(())
    })?;
    handle.set_stream(true)?;

    let (timings, exposure, writes) = handle.with(|sensor| {
        Ok((
            sensor.timings()?,
            sensor.controls().value(ControlId::Exposure)?,
            sensor.bus().writes().to_vec(),
        ))
    })?;
    for op in &writes {
        match op {
            RegOp::Write { reg, value } => println!("  write  {reg} = {value:#x}"),
            RegOp::Update { reg, mask, value } => {
                println!("  update {reg} &{mask:#x} = {value:#x}");
            }
        }
    }
    println!(
        "Streaming: {} register writes, line length {}, frame length {}, settled after {}us",
        writes.len(),
        timings.line_length,
        timings.frame_length,
        settle_delay(timings, exposure).as_micros()
    );

    handle.set_stream(false)?;
    println!("Stopped: {:?}", handle.state()?);

    Ok(())
}
