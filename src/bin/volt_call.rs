use std::{
    error::Error,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use log::info;
use voltwire::{
    cli::{parse_param, render_response},
    connection::{Connection, ConnectionConfig, Timeouts},
    protocol::{Credential, DecodePolicy, Value},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address as host:port
    #[arg(short, long, default_value = "localhost:21212")]
    address: String,
    /// User name sent at login
    #[arg(short, long, default_value = "")]
    user: String,
    /// Password, hashed before it is sent
    #[arg(long, env = "VOLT_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
    /// Decode every row as soon as the response arrives
    #[arg(long)]
    eager: bool,
    /// Repeat the call every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
    /// Ping the server before calling
    #[arg(long)]
    ping: bool,
    /// Seconds to wait for each call
    #[arg(long, default_value_t = 120)]
    call_timeout: u64,
    /// Stored procedure to invoke
    procedure: String,
    /// Parameters as type:value literals (int:5, str:hello, bool:true, ...)
    #[arg(value_parser = parse_param)]
    params: Vec<Value>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = ConnectionConfig {
        timeouts: Timeouts {
            call: Duration::from_secs(cli.call_timeout),
            ..Timeouts::default()
        },
        decode_policy: if cli.eager {
            DecodePolicy::Eager
        } else {
            DecodePolicy::Lazy
        },
    };

    let credential = Credential::new(cli.user, cli.password);
    let mut connection = Connection::connect(&credential, &cli.address, config)?;

    if cli.ping && !connection.test_connection()? {
        return Err(format!("{} did not answer the ping", cli.address).into());
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler = Arc::clone(&running);
    ctrlc::set_handler(move || handler.store(false, Ordering::SeqCst))?;

    let mut stdout = io::stdout().lock();
    loop {
        let mut response = connection.call(&cli.procedure, 0, cli.params.clone())?;
        render_response(&mut response, &mut stdout)?;

        let Some(secs) = cli.watch else {
            break;
        };
        let next = Instant::now() + Duration::from_secs(secs);
        while running.load(Ordering::SeqCst) && Instant::now() < next {
            thread::sleep(Duration::from_millis(100));
        }
        if !running.load(Ordering::SeqCst) {
            info!("interrupted, closing connection");
            break;
        }
    }

    connection.close();
    Ok(())
}
