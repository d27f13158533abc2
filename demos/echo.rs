use std::sync::Arc;

use tun_duplex::{BoxError, DeviceBuilder, Error};

fn hex_dump(buf: &[u8]) {
    for (row, chunk) in buf.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<32}  |{}|", row * 16, hex::encode(chunk), ascii);
    }
}

fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let name = std::env::args().nth(1).unwrap_or_else(|| "tun0".into());
    let dev = Arc::new(DeviceBuilder::new().name(name).build()?);
    dev.bind()?;
    println!("listening on {:?}", dev.name());

    let dev_c = dev.clone();
    let _handle = ctrlc2::set_handler(move || {
        dev_c.shutdown();
        true
    })
    .expect("Error setting Ctrl-C handler");

    loop {
        let packet = match dev.read() {
            Ok(packet) => packet,
            Err(Error::QueueClosed) => break,
            Err(err) => return Err(err.into()),
        };
        hex_dump(packet.as_bytes());
        if let Err(err) = dev.write(packet) {
            log::warn!("echo failed: {err}");
            break;
        }
    }
    println!("{:?}", dev.stats());
    Ok(())
}
