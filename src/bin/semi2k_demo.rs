//! N-party demo: secure multiply and matrix multiply over private
//! inputs, on in-process channels or TCP sockets.

use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use semi2k::context::basic::{input, matmul, mul, open};
use semi2k::context::factory::{make_private, to_f64_vec};
use semi2k::context::{Config, Context};
use semi2k::mpc::{SeededPrep, Semi2k};
use semi2k::network::{run_parties, MultiPartyPlayer, SocketPlayer};

/// Channel types used to connect the parties.
#[derive(Clone, Copy, ValueEnum, Debug)]
enum ChannelType {
    /// In-process channels, every party on its own thread.
    Local,
    /// TCP sockets on localhost.
    Tcp,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Local => write!(f, "local"),
            ChannelType::Tcp => write!(f, "tcp"),
        }
    }
}

/// Demo arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of participating parties.
    #[arg(short = 'N', long, default_value_t = 2)]
    num_parties: usize,

    /// Channel type.
    #[arg(short = 'c', long = "channel", default_value_t = ChannelType::Local)]
    channel_type: ChannelType,

    /// Base port for TCP channels; party i listens on base + i.
    #[arg(short = 'p', long = "port", default_value_t = 9700)]
    port: u16,

    /// Fractional bits of the fixed-point encoding.
    #[arg(short = 'f', long, default_value_t = 40)]
    fracbits: u32,

    /// Seed of the mock preprocessing shared by all parties.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
}

fn party_computation<P>(pid: usize, player: P, args: &Args) -> Result<()>
where
    P: MultiPartyPlayer + 'static,
{
    let n = args.num_parties;
    let ctx = Context::new(
        Config::with_fracbits(args.fracbits),
        Semi2k::new(Box::new(player), SeededPrep::new(args.seed, pid, n)),
    );

    // party 0 holds x, the last party holds y
    let x_owner = 0;
    let y_owner = n - 1;
    let x = make_private::<_, 128>(
        &ctx,
        x_owner,
        (pid == x_owner).then_some(&[3.5, -1.25][..]),
        &[2],
    )?;
    let y = make_private::<_, 128>(
        &ctx,
        y_owner,
        (pid == y_owner).then_some(&[2.0, 4.0][..]),
        &[2],
    )?;

    let xs = input(&ctx, &x)?;
    let ys = input(&ctx, &y)?;
    let prod = mul(&ctx, &xs, &ys)?;
    let prod = to_f64_vec(&open(&ctx, &prod)?)?;

    let a = make_private::<_, 128>(
        &ctx,
        x_owner,
        (pid == x_owner).then_some(&[1.0, 2.0, 3.0, 4.0][..]),
        &[2, 2],
    )?;
    let b = make_private::<_, 128>(
        &ctx,
        y_owner,
        (pid == y_owner).then_some(&[5.0, 6.0, 7.0, 8.0][..]),
        &[2, 2],
    )?;
    let sa = input(&ctx, &a)?;
    let sb = input(&ctx, &b)?;
    let c = matmul(&ctx, &sa, &sb)?;
    let c = to_f64_vec(&open(&ctx, &c)?)?;

    if pid == 0 {
        println!("open(x * y)      = {prod:?}");
        println!("open(A matmul B) = {c:?}");
        println!("transport: {}", ctx.statistics());
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    anyhow::ensure!(args.num_parties >= 2, "need at least two parties");

    match args.channel_type {
        ChannelType::Local => {
            let results = run_parties(args.num_parties, |pid, player| {
                party_computation(pid, player, &args)
            });
            for r in results {
                r?;
            }
        }
        ChannelType::Tcp => {
            let endpoints: Vec<SocketAddr> = (0..args.num_parties)
                .map(|i| SocketAddr::from(([127, 0, 0, 1], args.port + i as u16)))
                .collect();
            let args_ref = &args;
            let endpoints_ref = &endpoints;
            std::thread::scope(|scope| -> Result<()> {
                let handles: Vec<_> = (0..args.num_parties)
                    .map(|pid| {
                        scope.spawn(move || -> Result<()> {
                            let player = SocketPlayer::connect_plain(
                                pid,
                                endpoints_ref,
                                2,
                                Duration::from_secs(10),
                            )?;
                            party_computation(pid, player, args_ref)
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("party thread panicked")?;
                }
                Ok(())
            })?;
        }
    }
    Ok(())
}
