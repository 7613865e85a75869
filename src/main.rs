use clap::Parser;
use log::{error, info, warn, LevelFilter};
use pow_ledger::cli::apply_node_flags;
use pow_ledger::{
    parse_snapshot, Blockchain, Command, Config, Console, MemoryPool, Miner, Opt, Server,
    SharedState, Shutdown,
};
use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    // Info by default; RUST_LOG still wins when set.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            config,
            listen,
            peers,
            miner,
            signature,
            strict,
        } => {
            let mut config = Config::load_or_default(config.as_deref())?;
            config.apply_env()?;
            apply_node_flags(&mut config, listen, peers, miner, signature, strict);
            config.validate()?;
            start_node(config)?;
        }
        Command::Validate { file } => {
            validate_snapshot_file(&file)?;
        }
    }
    Ok(())
}

fn start_node(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_shutdown.trigger();
    })?;

    let chain = Blockchain::create_blockchain(&config.node.signature)?;
    let state = SharedState::new(chain);
    info!(
        "Node {} starting on {} (mining: {}, strict sync: {})",
        config.node.signature,
        config.node.listen_addr,
        config.mining.enabled,
        config.sync.strict
    );

    let listener = Server::bind(&config)?;
    let server = Server::new(state.clone(), &config, shutdown.clone());
    let server_handle = thread::spawn(move || server.run_with_listener(listener));

    let miner_handle = if config.mining.enabled {
        let miner = Miner::new(
            state.clone(),
            &config.node.signature,
            config.mining.interval(),
            config.mining.pause(),
            config.mining.batch_limit,
        );
        let shutdown = shutdown.clone();
        Some(thread::spawn(move || miner.run(&shutdown)))
    } else {
        None
    };

    // Stdin blocks, so the console thread is left running at exit.
    let console = Console::new(state, &config.node.signature, shutdown.clone());
    thread::spawn(move || {
        if let Err(e) = console.run(io::stdin().lock(), io::stdout()) {
            warn!("Console stopped: {e}");
        }
    });

    while shutdown.sleep(Duration::from_secs(1)) {}
    info!("Shutting down");

    match server_handle.join() {
        Ok(result) => result?,
        Err(_) => error!("Server thread panicked"),
    }
    if let Some(handle) = miner_handle {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => error!("Miner thread panicked"),
        }
    }
    Ok(())
}

fn validate_snapshot_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    let snapshot = parse_snapshot(&bytes)?;
    let (blocks, utxos) = snapshot.into_parts();
    let chain = Blockchain::from_blocks(blocks)?;

    let mut pool = MemoryPool::from_records(utxos);
    let received = pool.len();
    pool.filter(chain.get_blocks());

    match chain.is_valid() {
        Ok(()) => println!("Chain of {} blocks is valid", chain.len()),
        Err(e) => println!("Chain of {} blocks is invalid: {e}", chain.len()),
    }
    println!(
        "Pending records: {} valid of {received} received",
        pool.len()
    );
    Ok(())
}
