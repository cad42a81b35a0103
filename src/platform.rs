/// Returns the current platform triple (e.g. `x86_64-unknown-linux-gnu`)
/// based on the host architecture and operating system. Bundle variants
/// are matched against this string exactly, with no fuzzy fallback.
pub fn current_triple() -> String {
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;

    match (arch, os) {
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "macos") => "x86_64-apple-macosx".to_string(),
        ("aarch64", "macos") => "arm64-apple-macosx".to_string(),
        ("x86", "windows") => "i686-pc-windows-msvc".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        _ => format!("{}-unknown-{}", arch, os),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_triple_has_arch_and_os() {
        let triple = current_triple();
        assert!(triple.contains('-'));
        assert!(!triple.is_empty());
    }
}
