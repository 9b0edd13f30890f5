mod bench;
mod opts;
mod util;

use std::fmt::Arguments;

use ipcsem::log::Level;
use structopt::StructOpt;

use bench::{owner_main, peer_main};
use opts::Opts;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn log_to_stderr(level: Level, args: Arguments<'_>) {
    eprintln!("\x1b[{}m[{}] {}\x1b[0m", level.term_fmt(), level, args);
}

fn main() {
    let opts = Opts::from_args();
    unsafe { ipcsem::log::set_handler(log_to_stderr) };
    if let Err(e) = ipcsem::host::signal::install(libc::SIGINT) {
        eprintln!("ipcsem-bench: cannot catch SIGINT: {}", e);
    }
    let res = match opts.peer {
        true => peer_main(&opts),
        false => owner_main(&opts),
    };
    if let Err(e) = res {
        eprintln!("ipcsem-bench: {}", e);
        std::process::exit(1);
    }
}
