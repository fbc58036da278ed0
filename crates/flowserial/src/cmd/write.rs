use flowserial_peer::{Link, Socket};

use crate::cmd::WriteArgs;
use crate::exit::{connection_error, CliResult, SUCCESS};

pub fn run(args: WriteArgs) -> CliResult<i32> {
    let mut link = Link::new(Socket::new(0));
    link.connect(&args.device.serial_config())
        .map_err(|err| connection_error("connect failed", err))?;

    link.socket()
        .write_to_peer(args.address, &args.data)
        .map_err(|err| connection_error("write failed", err))?;

    link.close()
        .map_err(|err| connection_error("close failed", err))?;
    Ok(SUCCESS)
}
