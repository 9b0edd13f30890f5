
use std::fmt;
use std::str::FromStr;

use structopt::StructOpt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    BusyWait,
    Posix,
    All,
}

impl Kind {
    pub fn expand(self) -> &'static [Kind] {
        match self {
            Kind::BusyWait => &[Kind::BusyWait],
            Kind::Posix => &[Kind::Posix],
            Kind::All => &[Kind::Posix, Kind::BusyWait],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kind::BusyWait => "BusyWait",
            Kind::Posix => "POSIX",
            Kind::All => "all",
        }
    }
}

impl FromStr for Kind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "busy-wait" => Ok(Kind::BusyWait),
            "posix" => Ok(Kind::Posix),
            "all" => Ok(Kind::All),
            _ => Err(format!("unknown semaphore kind '{}'", s)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::BusyWait => "busy-wait",
            Kind::Posix => "posix",
            Kind::All => "all",
        })
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = "ipcsem-bench")]
pub struct Opts {
    /// Round trips per semaphore kind
    #[structopt(long, default_value = "1000")]
    pub loops: usize,
    /// busy-wait, posix or all
    #[structopt(long, default_value = "all")]
    pub kind: Kind,
    /// Release the host lock while spinning (busy-wait only)
    #[structopt(long)]
    pub yielding: bool,
    /// Prefix of the shared memory and semaphore names
    #[structopt(long)]
    pub prefix: Option<String>,
    /// Run as the second process of a ping-pong
    #[structopt(long, hidden = true)]
    pub peer: bool,
}

impl Opts {
    pub fn prefix(&self) -> String {
        match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => format!("ipcsem-bench-{}", std::process::id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind() {
        assert_eq!("busy-wait".parse::<Kind>(), Ok(Kind::BusyWait));
        assert_eq!("posix".parse::<Kind>(), Ok(Kind::Posix));
        assert!("sysv".parse::<Kind>().is_err());
        assert_eq!(Kind::All.expand(), &[Kind::Posix, Kind::BusyWait]);
    }

    #[test]
    fn peer_flags() {
        let opts = Opts::from_iter(&[
            "ipcsem-bench",
            "--peer",
            "--kind",
            "busy-wait",
            "--prefix",
            "p",
            "--loops",
            "10",
        ]);
        assert!(opts.peer);
        assert_eq!(opts.kind, Kind::BusyWait);
        assert_eq!(opts.loops, 10);
        assert_eq!(opts.prefix(), "p");
    }
}
