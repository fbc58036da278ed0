use flowserial_peer::{Link, Socket, SocketConfig};
use tracing::debug;

use crate::cmd::{parse_duration, ReadArgs};
use crate::exit::{connection_error, CliResult, SUCCESS};
use crate::output::{print_bytes, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = SocketConfig::default();
    if let Some(timeout) = &args.timeout {
        config.read_timeout = parse_duration(timeout)?;
    }
    if let Some(attempts) = args.attempts {
        config.read_attempts = attempts;
    }

    // Nothing to expose; the peer's reads of us get empty answers.
    let mut link = Link::new(Socket::with_config(Vec::new(), config));
    link.connect(&args.device.serial_config())
        .map_err(|err| connection_error("connect failed", err))?;
    link.start_update_thread()
        .map_err(|err| connection_error("connect failed", err))?;

    let mut out = vec![0u8; usize::from(args.count)];
    let received = link
        .socket()
        .read(args.address, &mut out)
        .map_err(|err| connection_error("read failed", err))?;
    out.truncate(received);
    debug!(requested = args.count, received, "read complete");

    print_bytes("read", args.address, &out, format);
    link.close()
        .map_err(|err| connection_error("close failed", err))?;
    Ok(SUCCESS)
}
