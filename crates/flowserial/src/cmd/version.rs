use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("flowserial {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: flowserial");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("FLOWSERIAL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "protocol: start=0x{:02X} capacity={} max_payload={}",
        flowserial_frame::START_BYTE,
        flowserial_frame::BUFFER_CAPACITY,
        flowserial_frame::MAX_PAYLOAD
    );
    println!(
        "features: peer={}, serial={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "serial")
    );

    Ok(SUCCESS)
}
