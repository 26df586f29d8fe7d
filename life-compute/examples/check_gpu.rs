//! Lists the wgpu adapters and the one the simulator would run on
use life_compute::{device_info, preferred_device};
use life_core::config::{ComputeBackendType, LifeConfig};

fn main() {
    let config = LifeConfig::from_env();
    let devices = device_info();

    println!("{} adapter(s):", devices.len());
    for device in &devices {
        println!("  {} [{} / {}] vendor {}", device.name, device.device_type, device.backend, device.vendor);
    }

    match (config.compute.backend, preferred_device(config.compute.prefer_discrete)) {
        (ComputeBackendType::Cpu, _) => println!("LIFE_BACKEND=cpu: the CPU reference backend will run"),
        (_, Some(device)) => println!("Simulation adapter: {} ({})", device.name, device.device_type),
        (ComputeBackendType::Gpu, None) => println!("LIFE_BACKEND=gpu but no adapter: startup will fail"),
        (ComputeBackendType::Auto, None) => println!("No adapter: falling back to the CPU backend"),
    }
}
