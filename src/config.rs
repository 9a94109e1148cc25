use std::num::ParseIntError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub listen_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse {0} from {1:?}: {2}")]
    BadPort(&'static str, String, ParseIntError),
    #[error("Too many arguments, usage: [host] [port] [listen_port]")]
    TooManyArguments,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl Config {
    /// Builds from positional `[host] [port] [listen_port]`; the first item is
    /// the program name.
    pub fn build(mut args: impl Iterator<Item = String>) -> Result<Config, ConfigError> {
        args.next();

        let mut config = Config::default();
        if let Some(host) = args.next() {
            config.host = host;
        }
        if let Some(port) = args.next() {
            config.port = parse_port("port", port)?;
        }
        if let Some(port) = args.next() {
            config.listen_port = parse_port("listen_port", port)?;
        }
        if args.next().is_some() {
            return Err(ConfigError::TooManyArguments);
        }
        Ok(config)
    }
}

fn parse_port(name: &'static str, input: String) -> Result<u16, ConfigError> {
    input
        .parse::<u16>()
        .map_err(|e| ConfigError::BadPort(name, input, e))
}
