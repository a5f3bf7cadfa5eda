//! wavetap entrypoint: parse arguments, bring up the capture session, run
//! the foreground loop until the target duration or an interrupt.

use anyhow::Result;
use clap::Parser;

use wavetap::audio::Recorder;
use wavetap::config::Args;
use wavetap::session::CaptureSession;
use wavetap::{midi, telemetry};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_input_devices {
        for name in Recorder::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }
    if args.list_midi_devices {
        for name in midi::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    args.validate()?;
    telemetry::init_tracing(&args);

    let mut session = CaptureSession::new(args.session_config()?);
    session.start()?;
    session.run()?;

    println!("Done.");
    Ok(())
}
