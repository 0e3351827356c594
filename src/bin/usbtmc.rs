//! Command line tool for talking to USBTMC instruments.
//!
//! ```text
//! usbtmc                        print this help
//! usbtmc /L                     list available devices
//! usbtmc 0 "*IDN?"              send a command to device number 0
//! usbtmc "Rigol" "*IDN?"        send a command to the device whose identity
//!                               string starts with "Rigol" (no read)
//! usbtmc /R "Rigol" "*IDN?"     send, then read the response until EOM and
//!                               write it to stdout (redirectable to a file)
//! ```
//!
//! Logging goes to stderr and is controlled via the `RUST_LOG` environment
//! variable.
use usbtmc::{Error, TmcBuilder, UsbTmc};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::io::Write;

/// Receive buffer used when draining a response
const RECV_CHUNK: usize = 8192;

fn print_help() {
    println!();
    println!("simple usbtmc command line tool");
    println!();
    println!("available commands");
    println!();
    println!("usbtmc /L                    list all available devices");
    println!("usbtmc 0 \"*IDN?\"             send a command to device number 0");
    println!("usbtmc \"Rigol\" \"*IDN?\"       send a command to the device whose identity string");
    println!("                             begins with \"Rigol\" (the response is not read)");
    println!("usbtmc /R \"Rigol\" \"*IDN?\"    send a command and write the response to stdout;");
    println!("                             it can be redirected to a file");
}

fn list_devices(tmc: &UsbTmc) -> Result<(), Error> {
    let count = tmc.device_count()?;
    println!("{count} usbtmc device(s) present.");
    for index in 0..count as u32 {
        println!("Device #{index}: \"{}\"", tmc.device_string(index));
    }
    println!();
    Ok(())
}

fn send_command(
    tmc: &mut UsbTmc,
    device: &str,
    command: &str,
    get_response: bool,
) -> Result<(), Error> {
    let index = tmc.find_device(device)?;
    tmc.send_string(index, command)?;

    if get_response {
        let mut stdout = std::io::stdout();
        loop {
            let (chunk, eom) = tmc.recv_string(index, RECV_CHUNK)?;
            if stdout.write_all(chunk.as_bytes()).is_err() {
                // stdout gone (e.g. broken pipe), nothing sensible left to do
                break;
            }
            if eom {
                break;
            }
        }
        let _ = stdout.flush();
    }
    Ok(())
}

fn execute() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => {
            print_help();
            Ok(())
        }
        [switch] if switch.eq_ignore_ascii_case("/l") => {
            let tmc = TmcBuilder::new().build()?;
            list_devices(&tmc)
        }
        [device, command] => {
            let mut tmc = TmcBuilder::new().build()?;
            send_command(&mut tmc, device, command, false)
        }
        [switch, device, command] if switch.eq_ignore_ascii_case("/r") => {
            let mut tmc = TmcBuilder::new().build()?;
            send_command(&mut tmc, device, command, true)
        }
        _ => {
            print_help();
            Ok(())
        }
    }
}

fn main() {
    env_logger::builder().init();

    match execute() {
        Ok(()) => {}
        Err(e) => {
            error!("{e}");
            println!("ERROR: {}", e.code());
            std::process::exit(1);
        }
    }
}
