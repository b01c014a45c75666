// Entry point: `qview [+set name value]...`
//
//   1. Apply command-line cvars
//   2. Start logging
//   3. Load the map and run the scripted timedemo

use log::error;

use qview_common::cvar::CvarContext;
use qview_sys::host;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cvars = CvarContext::with_defaults();
    if let Err(err) = cvars.parse_command_line(&args) {
        eprintln!("{}", err);
        eprintln!("usage: qview [+set <variable> <value>]...");
        std::process::exit(1);
    }

    host::init_logging(&cvars);

    if let Err(err) = host::run(&cvars) {
        error!("{}", err);
        std::process::exit(1);
    }
}
