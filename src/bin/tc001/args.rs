use anyhow::Result;
use clap::value_t_or_exit;
use tc001::{args_parser, opt};

pub struct Args {
    /// Index of the `/dev/video*` node.
    pub device: u32,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("tc001")
            .about("Live view, zone statistics and logging for the TOPDON TC001.")
            .after_help(
                "Set TC001_CONFIG to a JSON file to override zones, telemetry and output paths.",
            )
            .arg(
                opt!("device")
                    .short("d")
                    .default_value("0")
                    .help("Video device index, as in /dev/video<N>"),
            )
            .get_matches();

        let device = value_t_or_exit!(matches, "device", u32);
        Ok(Args { device })
    }
}
