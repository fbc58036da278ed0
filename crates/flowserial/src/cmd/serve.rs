use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flowserial_peer::{Link, Socket};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{connection_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_bytes, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut link = Link::new(Socket::new(usize::from(args.size)));
    link.connect(&args.device.serial_config())
        .map_err(|err| connection_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(port = %args.device.port, size = args.size, "serving register");

    let mut processed = 0usize;
    while running.load(Ordering::SeqCst) {
        let dispatched = link
            .poll()
            .map_err(|err| connection_error("receive failed", err))?;
        if !dispatched {
            continue;
        }

        let snapshot = link.socket().register().to_vec();
        print_bytes("register", 0, &snapshot, format);
        processed = processed.saturating_add(1);

        if let Some(count) = args.count {
            if processed >= count {
                break;
            }
        }
    }

    link.close()
        .map_err(|err| connection_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
