fn main() {
    // Only the ESP-IDF build needs the sysenv exported by embuild; host
    // builds (simulator, tests) skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
