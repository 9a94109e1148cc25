use std::error::Error;
use std::{env, process};

use addr_resolver::config::Config;
use addr_resolver::{ResolutionQuery, Resolver, SystemResolver};
use log::*;

/// Resolves the wildcard listen address; a failure here aborts startup.
async fn prepare_server<R: Resolver>(resolver: &R, port: u16) {
    match resolver.resolve(ResolutionQuery::passive(port)).await {
        Ok(candidates) => {
            for candidate in candidates {
                debug!("Bind candidate: {candidate} ({})", candidate.family());
            }
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

async fn server_info<R: Resolver>(resolver: &R, host: &str, port: u16) {
    let candidates = match resolver.resolve(ResolutionQuery::active(host, port)).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("Lookup of {host} failed: {e}");
            return;
        }
    };
    if candidates.is_empty() {
        info!("No candidates for {host}:{port}");
    }
    for candidate in candidates {
        println!(
            "Server info: \n\tIP: {}\n\tport: {}",
            candidate.text(),
            candidate.port()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let config = Config::build(env::args()).unwrap_or_else(|err| {
        error!("Problem parsing arguments: {err}");
        process::exit(1);
    });

    let resolver = SystemResolver;
    prepare_server(&resolver, config.listen_port).await;
    server_info(&resolver, &config.host, config.port).await;
    Ok(())
}
