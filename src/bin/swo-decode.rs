use anyhow::{bail, Context as _, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use swo::{Context, DecodeFlags, Flow, LogLevel};

#[derive(StructOpt, Debug)]
#[structopt(
    about = "A decoder for the SWO trace stream (ITM/DWT packet protocol) of ARM Cortex-M microcontrollers, as specified in the ARMv7-M architecture reference manual, Appendix D4. See <https://developer.arm.com/documentation/ddi0403/ed/>."
)]
struct Opt {
    #[structopt(
        long = "--buffer-size",
        default_value = "8192",
        help = "Capacity of the decoder ring buffer in bytes."
    )]
    buffer_size: usize,

    #[structopt(
        long = "--chunk-size",
        default_value = "1024",
        help = "Number of bytes read from FILE at a time."
    )]
    chunk_size: usize,

    #[structopt(
        long = "--log-level",
        default_value = "warning",
        help = "Decoder log level: none, error, warning, info or debug."
    )]
    log_level: LogLevel,

    #[structopt(long = "--log-domain", help = "Prefix of decoder log messages.")]
    log_domain: Option<String>,

    #[structopt(long = "--limit", help = "Maximum number of packets per decode call.")]
    limit: Option<usize>,

    #[structopt(name = "FILE", parse(from_os_str), help = "Raw trace input file.")]
    file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {} {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f_UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .init();

    let opt = Opt::from_args();
    if opt.chunk_size == 0 {
        bail!("chunk size must be non-zero");
    }

    let mut file = File::open(&opt.file)
        .with_context(|| format!("failed to open {}", opt.file.display()))?;

    let mut ctx = Context::new(opt.buffer_size).context("failed to create decoder")?;
    ctx.set_log_level(opt.log_level);
    if let Some(domain) = &opt.log_domain {
        ctx.set_log_domain(domain);
    }
    ctx.set_packet_callback(|packet, _| {
        println!("{:?}", packet);
        Flow::Continue
    });

    let mut chunk = vec![0; opt.chunk_size];
    loop {
        let n = file.read(&mut chunk).context("failed to read trace data")?;
        if n == 0 {
            break; // EOF
        }

        let mut data = &chunk[..n];
        while !data.is_empty() {
            let free = ctx.capacity() - ctx.bytes_available();
            if free == 0 {
                let decoded = ctx
                    .decode(opt.limit, DecodeFlags::default())
                    .context("Decoder error")?;
                if decoded == 0 {
                    bail!(
                        "no packet fits into a buffer of {} bytes; increase --buffer-size",
                        ctx.capacity()
                    );
                }
                continue;
            }

            let (head, tail) = data.split_at(free.min(data.len()));
            ctx.feed(head).context("failed to feed decoder")?;
            data = tail;
        }

        ctx.decode(opt.limit, DecodeFlags::default())
            .context("Decoder error")?;
    }

    let eos = DecodeFlags {
        end_of_stream: true,
    };
    while ctx.decode(opt.limit, eos).context("Decoder error")? > 0 {}

    Ok(())
}
