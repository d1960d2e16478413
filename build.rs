fn main() {
    // Only the ESP-IDF build needs the sysenv passthrough; host builds
    // (gateway, tests, fuzz) compile without embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
