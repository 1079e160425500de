use std::io::ErrorKind;
use std::sync::Arc;

use log::{error, info};

use chat_relay::config::{ConfigError, ServerConfig, DEFAULT_CONFIG_PATH};
use chat_relay::{api, Broadcaster, Registry};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());

    let config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(ConfigError::Io(ref e)) if e.kind() == ErrorKind::NotFound => {
            info!("no config file at {}, using defaults", config_path);
            ServerConfig::default()
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // One registry and one broadcaster for the life of the process,
    // threaded through the filters rather than living in a global.
    let registry = Arc::new(Registry::new());
    let broadcaster = Broadcaster::new(registry);
    let routes = api::build_filters(broadcaster);

    info!("listening on {}", addr);
    warp::serve(routes).run(addr).await;
}
