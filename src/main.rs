use clap::Parser;
use log::info;

use scrcbot::{ClientConfig, Driver, SessionClient, SharedOverrides, Stage, UdpTransport};

#[derive(Parser, Debug)]
#[command(version, about = "Client to connect to the TORCS SCRC server.", long_about = None)]
struct Args {
    /// Host IP address
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Host port number
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Bot ID
    #[arg(long, default_value = "SCR")]
    id: String,

    /// Maximum number of learning episodes
    #[arg(long, default_value_t = 1)]
    max_episodes: u32,

    /// Maximum number of steps per episode, 0 for unlimited
    #[arg(long, default_value_t = 0)]
    max_steps: u32,

    /// Name of the track
    #[arg(long)]
    track: Option<String>,

    /// Stage (0 - Warm-Up, 1 - Qualifying, 2 - Race, 3 - Unknown)
    #[arg(long, default_value_t = 3)]
    stage: u8,
}

fn main() {
    colog::init();

    let args = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    let config = ClientConfig {
        host: args.host,
        port: args.port,
        bot_id: args.id,
        max_episodes: args.max_episodes,
        max_steps: args.max_steps,
        track: args.track,
        stage: Stage::from_arg(args.stage),
    };
    info!(
        "client configuration: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );

    let transport = UdpTransport::connect(&config.host, config.port)
        .expect("Could not open a socket to the server");

    // Manual overrides are fed from outside the core (key bindings, an
    // external controller); the session only polls them.
    let overrides = SharedOverrides::new();

    let mut client = SessionClient::new(config, transport, Driver::new(overrides));
    client.run().expect("Error while driving session");
}
