use tracing::{info, warn};
use wlbridge::{
    bridge::{BridgeConfig, CompositorBridge},
    reexports::calloop::EventLoop,
};

pub struct CalloopData {
    bridge: CompositorBridge,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().init();
    }

    let mut event_loop: EventLoop<'static, CalloopData> = EventLoop::try_new()?;

    let handle = event_loop.handle();
    let bridge = CompositorBridge::create_if_necessary(BridgeConfig::from_env(), &handle)?;
    match bridge.socket_name() {
        Some(socket_name) => {
            info!(name = ?socket_name, "Listening on wayland socket");
            std::env::set_var("WAYLAND_DISPLAY", socket_name);
        }
        None => warn!(error = ?bridge.wire_error(), "No wayland socket, clients cannot connect"),
    }

    let mut data = CalloopData { bridge };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if let "-c" | "--client" = arg.as_str() {
            match args.next() {
                Some(client) => {
                    if let Err(err) = std::process::Command::new(&client).spawn() {
                        warn!(%client, %err, "Failed to start client");
                    }
                }
                None => warn!("{} needs a command to run", arg),
            }
        }
    }

    event_loop.run(None, &mut data, |data| {
        data.bridge.dispatch_clients();
    })?;

    Ok(())
}
