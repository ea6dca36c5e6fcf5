//! MIDI port and audio device listing.

use pling_io::{default_device, list_devices, list_ports};

pub fn run() -> anyhow::Result<()> {
    println!("MIDI Input Ports");
    println!("================\n");
    match list_ports() {
        Ok(ports) if ports.is_empty() => println!("  None"),
        Ok(ports) => {
            for (idx, name) in ports.iter().enumerate() {
                println!("  [{idx}] {name}");
            }
        }
        Err(e) => println!("  Unavailable: {e}"),
    }
    println!();

    let devices = list_devices()?;
    let default_name = default_device().map(|d| d.name);

    println!("Audio Output Devices");
    println!("====================\n");
    if devices.is_empty() {
        println!("  None");
    }
    for (idx, device) in devices.iter().enumerate() {
        let marker = if default_name.as_deref() == Some(device.name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, marker
        );
    }

    println!();
    println!("Tip: Use a partial name with --port/--device:");
    println!("  pling play --port \"Keystation\" --device \"USB\"");
    Ok(())
}
