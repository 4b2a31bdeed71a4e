/// Get the version string for reap and libreap
pub fn get_version_string() -> String {
    format!(
        "reap {}\nlibreap {}",
        env!("CARGO_PKG_VERSION"),
        libreap::version()
    )
}

/// Print version information to stdout
pub fn print_version() {
    println!("{}", get_version_string());
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
