use candle_core::Device;

/// Metal when built with the `metal` feature and available, else CPU.
/// `DOCQA_DEVICE=cpu` forces CPU.
pub fn select_device() -> Device {
    let force_cpu = std::env::var("DOCQA_DEVICE").is_ok_and(|v| v.eq_ignore_ascii_case("cpu"));
    #[cfg(feature = "metal")]
    if !force_cpu {
        match Device::new_metal(0) {
            Ok(dev) => {
                tracing::info!(device = "metal", "selected embedding device");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "metal unavailable, using CPU"),
        }
    }
    tracing::info!(device = "cpu", forced = force_cpu, "selected embedding device");
    Device::Cpu
}
