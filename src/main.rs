/*!
Kataster is a command-line tool for preparing cadastral graphics for the
Slovenian heritage register (ISeD): it finds parcels in a GeoPackage cadastre
extract, shapes the monument and influence-area polygons, and exports them as
the zipped shapefile the register ingests.
*/

#![warn(noop_method_call)]
#![warn(single_use_lifetimes)] // This caught a few places where I didn't need to specify lifetimes but did.
#![warn(unused_lifetimes)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unused_crate_dependencies)]
#![warn(meta_variable_misuse)]
#![warn(unused_macro_rules)]
#![warn(unused_qualifications)]
#![warn(unused_results)] // Mostly this flags ignored io counts; `_ = ` makes those explicit.

use clap::Parser;

pub(crate) mod errors;
pub(crate) mod commands;
pub(crate) mod progress;
pub(crate) mod parcels;
pub(crate) mod cadastre;
pub(crate) mod graphics;
pub(crate) mod export;

use commands::Kataster;
use commands::Task;
use errors::ProgramError;
use progress::ConsoleProgressBar;

/**
Runs Kataster with arbitrary arguments. The first item in the arguments will be ignored. All output will be printed to Stdout or Stderr.
*/
pub fn run<Arg, Args>(args: &mut Args) -> Result<(),ProgramError>
where
    Arg: Clone + Into<std::ffi::OsString>,
    Args: Iterator<Item = Arg>
{
    let mut progress = ConsoleProgressBar::new();
    let command = Kataster::try_parse_from(args)?;
    command.run(&mut progress)?;
    Ok(())
}

fn main() -> std::process::ExitCode {
    let mut args = std::env::args();
    // A Result<(),Box<dyn Error>> return would format the error with debug
    // instead of display, which makes for a poor message.
    match run(&mut args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}",err);
            std::process::ExitCode::FAILURE
        }
    }
}
