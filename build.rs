fn main() {
    // Build scripts run on the host; the target is only visible through env vars.
    // Covers both Xtensa and RISC-V ESP32 variants.
    let espidf = std::env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "espidf");
    let esp32_feature = std::env::var_os("CARGO_FEATURE_ESP32").is_some();

    if espidf && esp32_feature {
        embuild::espidf::sysenv::output();
    }
}
