use std::time::{Duration, Instant};

use duct::{cmd, Handle};
use ipcsem::host::SignalHost;
use ipcsem::shm::{self, SharedMemory};
use ipcsem::sync::named;
use ipcsem::{NamedKernelSemaphore, OpenFlags, Sem, SharedCounterSemaphore};

use crate::opts::{Kind, Opts};
use crate::util::CleanupGuard;
use crate::Result;

type Hook<'a> = &'a mut dyn FnMut() -> Result<()>;

struct Yielding<'a>(SharedCounterSemaphore<'a, SignalHost>);

impl Sem for Yielding<'_> {
    fn acquire(&self) -> ipcsem::Result<()> {
        self.0.acquire_yielding_host_lock()
    }
    fn release(&self) -> ipcsem::Result<()> {
        self.0.release()
    }
}

fn names(prefix: &str, kind: Kind) -> [String; 2] {
    let tag = match kind {
        Kind::Posix => "posix",
        _ => "busywait",
    };
    [
        format!("/{}-{}-0", prefix, tag),
        format!("/{}-{}-1", prefix, tag),
    ]
}

// (ours, theirs)
fn ordered(names: &[String; 2], owner: bool) -> (&str, &str) {
    match owner {
        true => (names[0].as_str(), names[1].as_str()),
        false => (names[1].as_str(), names[0].as_str()),
    }
}

fn ping_pong(
    sem0: &dyn Sem,
    sem1: &dyn Sem,
    first_move: bool,
    loops: usize,
) -> ipcsem::Result<Duration> {
    if first_move {
        sem0.acquire()?;
    }
    sem1.release()?;
    let start = Instant::now();
    for _ in 0..loops {
        sem0.acquire()?;
        sem1.release()?;
    }
    Ok(start.elapsed())
}

fn open_shm(name: &str, owner: bool) -> Result<SharedMemory> {
    Ok(match owner {
        true => SharedMemory::create_for_semaphore(name)?,
        false => SharedMemory::open(name)?,
    })
}

fn busy_wait(opts: &Opts, names: &[String; 2], owner: bool, hook: Hook<'_>) -> Result<Duration> {
    let (ours, theirs) = ordered(names, owner);
    let mut shm0 = open_shm(ours, owner)?;
    let mut shm1 = open_shm(theirs, owner)?;
    let sem0 = SharedCounterSemaphore::bind_with_host(shm0.bytes_mut()?, owner, SignalHost)?;
    let sem1 = SharedCounterSemaphore::bind_with_host(shm1.bytes_mut()?, owner, SignalHost)?;
    hook()?;
    let elapsed = match opts.yielding {
        true => ping_pong(&Yielding(sem0), &Yielding(sem1), owner, opts.loops)?,
        false => ping_pong(&sem0, &sem1, owner, opts.loops)?,
    };
    Ok(elapsed)
}

fn posix(opts: &Opts, names: &[String; 2], owner: bool, hook: Hook<'_>) -> Result<Duration> {
    let (ours, theirs) = ordered(names, owner);
    let flags = match owner {
        true => OpenFlags::CREATE | OpenFlags::EXCLUSIVE,
        false => OpenFlags::empty(),
    };
    let sem0 = NamedKernelSemaphore::open(ours, flags, 0)?;
    let sem1 = NamedKernelSemaphore::open(theirs, flags, 0)?;
    hook()?;
    Ok(ping_pong(&sem0, &sem1, owner, opts.loops)?)
}

fn run_kind(
    opts: &Opts,
    names: &[String; 2],
    kind: Kind,
    owner: bool,
    hook: Hook<'_>,
) -> Result<Duration> {
    match kind {
        Kind::BusyWait => busy_wait(opts, names, owner, hook),
        Kind::Posix => posix(opts, names, owner, hook),
        Kind::All => Err("a single ping-pong runs one kind".into()),
    }
}

fn spawn_peer(opts: &Opts, prefix: &str, kind: Kind) -> Result<Handle> {
    let exe = std::env::current_exe()?;
    let mut args = vec![
        "--peer".to_string(),
        "--kind".into(),
        kind.to_string(),
        "--loops".into(),
        opts.loops.to_string(),
        "--prefix".into(),
        prefix.to_string(),
    ];
    if opts.yielding {
        args.push("--yielding".into());
    }
    Ok(cmd(exe, args).start()?)
}

pub fn owner_main(opts: &Opts) -> Result<()> {
    let prefix = opts.prefix();
    for &kind in opts.kind.expand() {
        println!("{} Semaphore", kind.label());
        let names = names(&prefix, kind);
        let _cleanup = CleanupGuard::new(|| {
            for name in &names {
                let _ = match kind {
                    Kind::Posix => named::unlink(name),
                    _ => shm::unlink(name),
                };
            }
        });

        let mut peer = None;
        let res = run_kind(opts, &names, kind, true, &mut || {
            peer = Some(spawn_peer(opts, &prefix, kind)?);
            Ok(())
        });
        let elapsed = match res {
            Ok(elapsed) => {
                if let Some(peer) = &peer {
                    peer.wait()?;
                }
                elapsed
            }
            Err(e) => {
                if let Some(peer) = &peer {
                    let _ = peer.kill();
                }
                return Err(e);
            }
        };
        println!("{}: {}ms", kind.label(), elapsed.as_secs_f64() * 1000.0);
    }
    Ok(())
}

pub fn peer_main(opts: &Opts) -> Result<()> {
    let names = names(&opts.prefix(), opts.kind);
    run_kind(opts, &names, opts.kind, false, &mut || Ok(()))?;
    Ok(())
}
